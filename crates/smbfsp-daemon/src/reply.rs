//! Response emission
//!
//! Streaming operations send any number of parts (`hasMore=true`) followed
//! by exactly one final envelope (`hasMore=false`). [`Responder`] enforces
//! that shape for a single request.

use serde::Serialize;
use serde_json::Value;
use tracing::error;

use smbfsp_core::{ErrorKind, MessageId, OpResult, Response};

/// Destination of outbound envelopes
pub trait ResponseSink {
    fn send(&mut self, response: Response);
}

impl ResponseSink for Vec<Response> {
    fn send(&mut self, response: Response) {
        self.push(response);
    }
}

/// Emits the envelopes of one request
pub struct Responder<'a> {
    function_name: String,
    message_id: MessageId,
    sink: &'a mut dyn ResponseSink,
    parts_sent: usize,
}

impl<'a> Responder<'a> {
    pub fn new(
        function_name: impl Into<String>,
        message_id: MessageId,
        sink: &'a mut dyn ResponseSink,
    ) -> Self {
        Self {
            function_name: function_name.into(),
            message_id,
            sink,
            parts_sent: 0,
        }
    }

    /// Send a non-final part
    pub fn send_part<T: Serialize + ?Sized>(&mut self, payload: &T) {
        let result = encode(payload);
        self.emit(result, true);
        self.parts_sent += 1;
    }

    /// Send the final envelope
    pub fn finish(mut self, result: OpResult) {
        self.emit(result, false);
    }

    pub fn parts_sent(&self) -> usize {
        self.parts_sent
    }

    fn emit(&mut self, result: OpResult, has_more: bool) {
        self.sink.send(Response {
            function_name: self.function_name.clone(),
            message_id: self.message_id,
            result,
            has_more,
        });
    }
}

/// Encode a payload as a success result
pub fn encode<T: Serialize + ?Sized>(payload: &T) -> OpResult {
    match serde_json::to_value(payload) {
        Ok(value) => OpResult::Value(value),
        Err(e) => {
            error!("failed to encode response payload: {}", e);
            OpResult::Error(ErrorKind::Failed)
        }
    }
}

/// Encode a payload as a bare value; encoding failures become `null`
pub fn payload<T: Serialize + ?Sized>(value: &T) -> Value {
    match encode(value) {
        OpResult::Value(value) => value,
        OpResult::Error(_) => Value::Null,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_parts_then_final() {
        let mut sent: Vec<Response> = Vec::new();
        let mut responder = Responder::new("readDirectory", 7, &mut sent);
        responder.send_part(&json!([1]));
        responder.send_part(&json!([2]));
        assert_eq!(responder.parts_sent(), 2);
        responder.finish(OpResult::Value(json!([3])));

        assert_eq!(sent.len(), 3);
        assert!(sent.iter().all(|r| r.message_id == 7));
        assert!(sent[0].has_more && sent[1].has_more);
        assert!(!sent[2].has_more);
    }

    #[test]
    fn test_single_final() {
        let mut sent: Vec<Response> = Vec::new();
        Responder::new("mount", 1, &mut sent).finish(OpResult::empty());
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].result, OpResult::Value(Value::Null));
        assert!(!sent[0].has_more);
    }
}
