//! Operation dispatcher
//!
//! Decodes the options of an inbound envelope, runs the matching operation
//! on the [`Provider`] and emits the response envelopes. Unknown function
//! names are logged and dropped without a response. Names with the
//! `custom_` prefix go to registered custom handlers.

use std::collections::HashMap;

use serde_json::Value;
use tracing::{debug, warn};

use smbfsp_core::{
    route, BatchGetMetadataOptions, CloseFileOptions, CopyEntryOptions, CreateDirectoryOptions,
    CreateFileOptions, DeleteEntryOptions, Function, GetMetadataOptions, HostMap, MountInfo,
    MountOptions, MoveEntryOptions, OpResult, OpenFileOptions, ReadDirectoryOptions,
    ReadFileOptions, Request, Route, TruncateOptions, UnmountOptions, WriteFileOptions,
};

use crate::error::{ProviderError, ProviderResult};
use crate::provider::Provider;
use crate::reply::{payload, Responder, ResponseSink};

/// Name of the built-in share enumeration extension
pub const ENUMERATE_FILE_SHARES: &str = "custom_enumerateFileShares";

/// Handler for a `custom_` function; returns the value of the final envelope
pub type CustomHandler =
    Box<dyn FnMut(&mut Provider, &Request) -> ProviderResult<Value> + Send>;

pub struct Dispatcher {
    provider: Provider,
    custom: HashMap<String, CustomHandler>,
}

impl Dispatcher {
    pub fn new(provider: Provider) -> Self {
        let mut dispatcher = Self {
            provider,
            custom: HashMap::new(),
        };
        dispatcher.register_custom(
            ENUMERATE_FILE_SHARES,
            Box::new(|provider: &mut Provider, request: &Request| -> ProviderResult<Value> {
                let hosts: HostMap = request.options()?;
                Ok(payload(&provider.enumerate_file_shares(&hosts)))
            }),
        );
        dispatcher
    }

    /// Register (or replace) the handler of a `custom_` function
    pub fn register_custom(&mut self, name: impl Into<String>, handler: CustomHandler) {
        self.custom.insert(name.into(), handler);
    }

    pub fn provider(&self) -> &Provider {
        &self.provider
    }

    /// Handle one request to completion, sending all of its envelopes
    pub fn dispatch(&mut self, request: &Request, sink: &mut dyn ResponseSink) {
        let mut responder = Responder::new(&request.function_name, request.message_id, sink);

        let result = match route(&request.function_name) {
            Route::Unknown => {
                warn!(
                    function = %request.function_name,
                    message_id = request.message_id,
                    "unknown function, ignoring"
                );
                return;
            }
            Route::Custom(name) => match self.custom.get_mut(name) {
                Some(handler) => handler(&mut self.provider, request),
                None => Err(ProviderError::UnknownCustom(name.to_string())),
            },
            Route::Builtin(function) => self.run(function, request, &mut responder),
        };

        let result = match result {
            Ok(value) => OpResult::Value(value),
            Err(e) => {
                warn!(
                    function = %request.function_name,
                    message_id = request.message_id,
                    kind = %e.kind(),
                    "operation failed: {}",
                    e
                );
                OpResult::Error(e.kind())
            }
        };
        debug!(
            function = %request.function_name,
            message_id = request.message_id,
            parts = responder.parts_sent(),
            "request complete"
        );
        responder.finish(result);
    }

    fn run(
        &mut self,
        function: Function,
        request: &Request,
        responder: &mut Responder<'_>,
    ) -> ProviderResult<Value> {
        let provider = &mut self.provider;
        match function {
            Function::Mount => {
                let options: MountOptions = request.options()?;
                let info: MountInfo = request.extra()?;
                provider.mount(&options, &info).map(done)
            }
            Function::Unmount => {
                let options: UnmountOptions = request.options()?;
                provider.unmount(&options).map(done)
            }
            Function::GetMetadata => {
                let options: GetMetadataOptions = request.options()?;
                provider.get_metadata(&options).map(|e| payload(&e))
            }
            Function::BatchGetMetadata => {
                let options: BatchGetMetadataOptions = request.options()?;
                provider.batch_get_metadata(&options).map(|e| payload(&e))
            }
            Function::ReadDirectory => {
                let options: ReadDirectoryOptions = request.options()?;
                provider.read_directory(&options, responder)
            }
            Function::OpenFile => {
                let options: OpenFileOptions = request.options()?;
                provider.open_file(&options).map(done)
            }
            Function::ReadFile => {
                let options: ReadFileOptions = request.options()?;
                provider.read_file(&options, responder)
            }
            Function::WriteFile => {
                let options: WriteFileOptions = request.options()?;
                provider.write_file(&options).map(done)
            }
            Function::CloseFile => {
                let options: CloseFileOptions = request.options()?;
                provider.close_file(&options).map(done)
            }
            Function::CreateFile => {
                let options: CreateFileOptions = request.options()?;
                provider.create_file(&options).map(done)
            }
            Function::CreateDirectory => {
                let options: CreateDirectoryOptions = request.options()?;
                provider.create_directory(&options).map(done)
            }
            Function::DeleteEntry => {
                let options: DeleteEntryOptions = request.options()?;
                provider.delete_entry(&options).map(done)
            }
            Function::Truncate => {
                let options: TruncateOptions = request.options()?;
                provider.truncate(&options).map(done)
            }
            Function::MoveEntry => {
                let options: MoveEntryOptions = request.options()?;
                provider.move_entry(&options).map(done)
            }
            Function::CopyEntry => {
                let options: CopyEntryOptions = request.options()?;
                provider.copy_entry(&options).map(done)
            }
        }
    }
}

fn done(_: ()) -> Value {
    Value::Null
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use serde_json::json;
    use smbfsp_core::{ErrorKind, ProviderConfig, Response};

    use crate::credentials::CredentialStore;
    use crate::remote::MemoryFs;

    fn dispatcher() -> (Arc<MemoryFs>, Dispatcher) {
        let credentials = CredentialStore::new();
        let fs = Arc::new(MemoryFs::with_credentials(credentials.clone()));
        fs.add_share("10.0.0.5", "media");
        fs.add_dir("smb://10.0.0.5/media/music");
        fs.add_file("smb://10.0.0.5/media/music/a.mp3", b"abcdefgh");
        fs.require_credentials("10.0.0.5", "media", "bob", "secret");
        let provider = Provider::new(fs.clone(), credentials, ProviderConfig::default());
        (fs, Dispatcher::new(provider))
    }

    fn call(d: &mut Dispatcher, function: &str, id: i64, args: Vec<Value>) -> Vec<Response> {
        let mut sent: Vec<Response> = Vec::new();
        d.dispatch(&Request::new(function, id, args), &mut sent);
        sent
    }

    fn mount(d: &mut Dispatcher) -> Vec<Response> {
        call(
            d,
            "mount",
            1,
            vec![
                json!({"fileSystemId": "fs1", "displayName": "Media", "writable": true}),
                json!({
                    "sharePath": "smb://10.0.0.5/media/",
                    "domain": "WORKGROUP",
                    "user": "bob",
                    "password": "secret",
                    "server": "nas",
                    "serverIP": "10.0.0.5",
                    "path": "",
                    "share": "media"
                }),
            ],
        )
    }

    fn single(sent: &[Response]) -> &OpResult {
        assert_eq!(sent.len(), 1);
        assert!(!sent[0].has_more);
        &sent[0].result
    }

    #[test]
    fn test_mount_and_root_metadata() {
        let (fs, mut d) = dispatcher();
        let sent = mount(&mut d);
        assert_eq!(single(&sent), &OpResult::Value(Value::Null));
        assert_eq!(sent[0].function_name, "mount");
        assert_eq!(sent[0].message_id, 1);

        let sent = call(
            &mut d,
            "getMetadata",
            2,
            vec![json!({"fileSystemId": "fs1", "requestId": 2, "entryPath": "/", "fieldMask": 15})],
        );
        assert_eq!(
            single(&sent),
            &OpResult::Value(json!({"name": "", "isDirectory": true, "size": 0, "modificationTime": 0}))
        );
        assert_eq!(fs.calls("stat"), 0);
    }

    #[test]
    fn test_unknown_function_gets_no_response() {
        let (_fs, mut d) = dispatcher();
        assert!(call(&mut d, "configure", 3, vec![]).is_empty());
    }

    #[test]
    fn test_unknown_custom_function_is_invalid_operation() {
        let (_fs, mut d) = dispatcher();
        let sent = call(&mut d, "custom_reboot", 4, vec![]);
        assert_eq!(single(&sent), &OpResult::Error(ErrorKind::InvalidOperation));
    }

    #[test]
    fn test_registered_custom_handler() {
        let (_fs, mut d) = dispatcher();
        d.register_custom(
            "custom_ping",
            Box::new(|provider: &mut Provider, _request: &Request| -> ProviderResult<Value> {
                Ok(json!(provider.mounts().len()))
            }),
        );
        let sent = call(&mut d, "custom_ping", 4, vec![]);
        assert_eq!(single(&sent), &OpResult::Value(json!(0)));
    }

    #[test]
    fn test_enumerate_file_shares() {
        let (_fs, mut d) = dispatcher();
        let sent = call(
            &mut d,
            ENUMERATE_FILE_SHARES,
            5,
            vec![json!({"nas": "10.0.0.5", "gone": ""})],
        );
        let value = match single(&sent) {
            OpResult::Value(v) => v.clone(),
            other => panic!("unexpected {:?}", other),
        };
        assert_eq!(value["nas"][0]["name"], "media");
        assert_eq!(value["nas"][0]["isDirectory"], true);
        assert_eq!(value["gone"], json!([]));
    }

    #[test]
    fn test_bad_options_answer_failed() {
        let (_fs, mut d) = dispatcher();
        mount(&mut d);
        let sent = call(
            &mut d,
            "readFile",
            6,
            vec![json!({"fileSystemId": "fs1", "requestId": 6})],
        );
        assert_eq!(sent[0].message_id, 6);
        assert_eq!(single(&sent), &OpResult::Error(ErrorKind::Failed));
    }

    #[test]
    fn test_wrong_credentials_fail_mount() {
        let (_fs, mut d) = dispatcher();
        let sent = call(
            &mut d,
            "mount",
            1,
            vec![
                json!({"fileSystemId": "fs1"}),
                json!({"sharePath": "smb://10.0.0.5/media", "serverIP": "10.0.0.5", "share": "media", "user": "bob", "password": "nope"}),
            ],
        );
        assert_eq!(single(&sent), &OpResult::Error(ErrorKind::AccessDenied));
        assert!(d.provider().credentials().is_empty());
        assert!(d.provider().mounts().is_empty());
    }

    #[test]
    fn test_open_read_close_flow() {
        let (fs, mut d) = dispatcher();
        mount(&mut d);

        let sent = call(
            &mut d,
            "openFile",
            10,
            vec![json!({"fileSystemId": "fs1", "requestId": 10, "filePath": "/music/a.mp3", "mode": "READ"})],
        );
        assert_eq!(single(&sent), &OpResult::Value(Value::Null));

        let read = |d: &mut Dispatcher, id: i64, offset: u64| {
            call(
                d,
                "readFile",
                id,
                vec![json!({"fileSystemId": "fs1", "requestId": id, "openRequestId": 10, "offset": offset, "length": 3})],
            )
        };
        let sent = read(&mut d, 11, 0);
        assert_eq!(single(&sent), &OpResult::Value(json!(b"abc".to_vec())));
        let sent = read(&mut d, 12, 3);
        assert_eq!(single(&sent), &OpResult::Value(json!(b"def".to_vec())));
        assert_eq!(fs.calls("lseek"), 0);

        let sent = read(&mut d, 13, 100);
        assert_eq!(single(&sent), &OpResult::Value(json!([])));

        let sent = call(
            &mut d,
            "closeFile",
            14,
            vec![json!({"fileSystemId": "fs1", "requestId": 14, "openRequestId": 10})],
        );
        assert_eq!(single(&sent), &OpResult::Value(Value::Null));

        let sent = read(&mut d, 15, 0);
        assert_eq!(single(&sent), &OpResult::Error(ErrorKind::InvalidOperation));
    }

    #[test]
    fn test_read_directory_streams_batches() {
        let (fs, mut d) = dispatcher();
        for i in 0..20 {
            fs.add_file(&format!("smb://10.0.0.5/media/music/t{:02}.mp3", i), b"x");
        }
        mount(&mut d);

        let sent = call(
            &mut d,
            "readDirectory",
            20,
            vec![json!({"fileSystemId": "fs1", "requestId": 20, "directoryPath": "/music", "fieldMask": 15})],
        );
        assert_eq!(sent.len(), 2);
        assert!(sent[0].has_more);
        assert!(!sent[1].has_more);
        assert!(sent.iter().all(|r| r.message_id == 20 && r.function_name == "readDirectory"));
    }

    #[test]
    fn test_unmount_then_request_fails_cleanly() {
        let (_fs, mut d) = dispatcher();
        mount(&mut d);
        let sent = call(&mut d, "unmount", 30, vec![json!({"fileSystemId": "fs1"})]);
        assert_eq!(single(&sent), &OpResult::Value(Value::Null));

        let sent = call(
            &mut d,
            "deleteEntry",
            31,
            vec![json!({"fileSystemId": "fs1", "requestId": 31, "entryPath": "/music", "recursive": true})],
        );
        assert_eq!(single(&sent), &OpResult::Error(ErrorKind::InvalidOperation));

        let sent = call(&mut d, "unmount", 32, vec![json!({"fileSystemId": "fs1"})]);
        assert_eq!(single(&sent), &OpResult::Value(Value::Null));
    }

    #[test]
    fn test_copy_entry_always_fails() {
        let (_fs, mut d) = dispatcher();
        mount(&mut d);
        let sent = call(
            &mut d,
            "copyEntry",
            40,
            vec![json!({"fileSystemId": "fs1", "requestId": 40, "sourcePath": "/music/a.mp3", "targetPath": "/b.mp3"})],
        );
        assert_eq!(single(&sent), &OpResult::Error(ErrorKind::Failed));
    }
}
