//! Envelope definitions
//!
//! Requests and responses are JSON documents. On the stdio transport each
//! envelope is one line of JSON.

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::{ErrorKind, ProtocolError};
use crate::types::MessageId;
use crate::CUSTOM_PREFIX;

/// Operations the dispatcher routes by name
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Function {
    Mount,
    Unmount,
    GetMetadata,
    BatchGetMetadata,
    ReadDirectory,
    OpenFile,
    ReadFile,
    WriteFile,
    CloseFile,
    CreateFile,
    CreateDirectory,
    DeleteEntry,
    Truncate,
    MoveEntry,
    CopyEntry,
}

impl Function {
    pub const ALL: [Function; 15] = [
        Function::Mount,
        Function::Unmount,
        Function::GetMetadata,
        Function::BatchGetMetadata,
        Function::ReadDirectory,
        Function::OpenFile,
        Function::ReadFile,
        Function::WriteFile,
        Function::CloseFile,
        Function::CreateFile,
        Function::CreateDirectory,
        Function::DeleteEntry,
        Function::Truncate,
        Function::MoveEntry,
        Function::CopyEntry,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Function::Mount => "mount",
            Function::Unmount => "unmount",
            Function::GetMetadata => "getMetadata",
            Function::BatchGetMetadata => "batchGetMetadata",
            Function::ReadDirectory => "readDirectory",
            Function::OpenFile => "openFile",
            Function::ReadFile => "readFile",
            Function::WriteFile => "writeFile",
            Function::CloseFile => "closeFile",
            Function::CreateFile => "createFile",
            Function::CreateDirectory => "createDirectory",
            Function::DeleteEntry => "deleteEntry",
            Function::Truncate => "truncate",
            Function::MoveEntry => "moveEntry",
            Function::CopyEntry => "copyEntry",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        Self::ALL.into_iter().find(|f| f.name() == name)
    }
}

/// How a function name should be routed
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Route<'a> {
    Builtin(Function),
    Custom(&'a str),
    Unknown,
}

pub fn route(function_name: &str) -> Route<'_> {
    if let Some(function) = Function::from_name(function_name) {
        Route::Builtin(function)
    } else if function_name.starts_with(CUSTOM_PREFIX) {
        Route::Custom(function_name)
    } else {
        Route::Unknown
    }
}

/// Inbound envelope
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Request {
    pub function_name: String,
    pub message_id: MessageId,
    #[serde(default)]
    pub args: Vec<Value>,
}

impl Request {
    pub fn new(function_name: impl Into<String>, message_id: MessageId, args: Vec<Value>) -> Self {
        Self {
            function_name: function_name.into(),
            message_id,
            args,
        }
    }

    /// Decode `args[0]` into a typed options struct
    pub fn options<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        self.arg(0)
    }

    /// Decode `args[1]`, the provider-specific payload of a mount request
    pub fn extra<T: DeserializeOwned>(&self) -> Result<T, ProtocolError> {
        self.arg(1)
    }

    fn arg<T: DeserializeOwned>(&self, index: usize) -> Result<T, ProtocolError> {
        let value = self.args.get(index).cloned().unwrap_or(Value::Null);
        serde_json::from_value(value).map_err(|e| ProtocolError::InvalidOptions {
            function: self.function_name.clone(),
            reason: format!("args[{}]: {}", index, e),
        })
    }
}

/// Result of one operation, or one part of a streamed operation
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OpResult {
    Value(Value),
    Error(ErrorKind),
}

impl OpResult {
    /// Success without a payload
    pub fn empty() -> Self {
        OpResult::Value(Value::Null)
    }

    pub fn is_error(&self) -> bool {
        matches!(self, OpResult::Error(_))
    }
}

/// Outbound envelope
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Response {
    pub function_name: String,
    pub message_id: MessageId,
    pub result: OpResult,
    pub has_more: bool,
}

// === Serialization ===

/// Decode one inbound envelope
pub fn deserialize_request(data: &str) -> Result<Request, ProtocolError> {
    let value: Value = serde_json::from_str(data)?;
    let object = value.as_object().ok_or(ProtocolError::NotAnObject)?;

    let function_name = object
        .get("functionName")
        .ok_or(ProtocolError::MissingField("functionName"))?
        .as_str()
        .ok_or_else(|| ProtocolError::InvalidField {
            field: "functionName",
            reason: "expected a string".into(),
        })?
        .to_string();

    let message_id = object
        .get("messageId")
        .ok_or(ProtocolError::MissingField("messageId"))?
        .as_i64()
        .ok_or_else(|| ProtocolError::InvalidField {
            field: "messageId",
            reason: "expected an integer".into(),
        })?;

    let args = match object.get("args") {
        None | Some(Value::Null) => Vec::new(),
        Some(Value::Array(items)) => items.clone(),
        Some(_) => {
            return Err(ProtocolError::InvalidField {
                field: "args",
                reason: "expected an array".into(),
            })
        }
    };

    Ok(Request {
        function_name,
        message_id,
        args,
    })
}

/// Encode one outbound envelope as a single line (no trailing newline)
pub fn serialize_response(response: &Response) -> Result<String, ProtocolError> {
    serde_json::to_string(response).map_err(|e| ProtocolError::Serialization(e.to_string()))
}
