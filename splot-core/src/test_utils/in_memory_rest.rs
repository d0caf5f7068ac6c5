//! InMemoryRestClient — records calls and replays canned responses, for
//! tests that exercise action dispatch without a real transport.

use crate::error::CoreError;
use crate::modifier::Modifier;
use crate::resource_link::RestClient;
use crate::value::Value;
use async_trait::async_trait;
use std::sync::Mutex;

/// A single recorded call, in the order it was made.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// `"GET"` or `"POST"`.
    pub method: &'static str,
    /// Target URI.
    pub uri: String,
    /// Body, if this was a POST.
    pub body: Option<Value>,
}

/// A `RestClient` that records every call and, optionally, fails calls
/// whose URI is in its failure set — used to exercise
/// `sync=stop-on-error` action-list semantics.
pub struct InMemoryRestClient {
    calls: Mutex<Vec<RecordedCall>>,
    failing_uris: Mutex<Vec<String>>,
}

impl InMemoryRestClient {
    /// Create a client that succeeds on every call.
    pub fn new() -> Self {
        InMemoryRestClient {
            calls: Mutex::new(Vec::new()),
            failing_uris: Mutex::new(Vec::new()),
        }
    }

    /// Mark `uri` to fail on the next and all subsequent calls.
    pub fn fail_uri(&self, uri: impl Into<String>) {
        self.failing_uris.lock().unwrap().push(uri.into());
    }

    /// Snapshot of every call made so far, in order.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().unwrap().clone()
    }
}

impl Default for InMemoryRestClient {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RestClient for InMemoryRestClient {
    async fn get(&self, uri: &str, _modifier: &Modifier) -> Result<Value, CoreError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: "GET",
            uri: uri.to_owned(),
            body: None,
        });
        if self.failing_uris.lock().unwrap().iter().any(|f| f == uri) {
            return Err(CoreError::Technology(format!("simulated failure: {uri}")));
        }
        Ok(Value::Null)
    }

    async fn post(
        &self,
        uri: &str,
        body: Option<Value>,
        _modifier: &Modifier,
    ) -> Result<(), CoreError> {
        self.calls.lock().unwrap().push(RecordedCall {
            method: "POST",
            uri: uri.to_owned(),
            body,
        });
        if self.failing_uris.lock().unwrap().iter().any(|f| f == uri) {
            return Err(CoreError::Technology(format!("simulated failure: {uri}")));
        }
        Ok(())
    }
}
