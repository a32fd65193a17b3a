//! Transport layer abstraction for API calls.

use crate::auth::SessionToken;
use crate::error::{SyncError, SyncResult};
use fitsync_protocol::{ApiRequest, HttpMethod};
use parking_lot::Mutex;
use std::collections::{HashMap, VecDeque};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::sync::{Notify, Semaphore};

/// Carries one REST call to the API and returns its JSON body.
///
/// Implementations map non-success statuses through
/// [`SyncError::from_status`] so the synchronizer can tell transient failures
/// from terminal ones. An empty success body is returned as `null`.
pub trait ApiTransport: Send + Sync {
    /// Executes `request`, authenticated with `auth` when given.
    fn execute(
        &self,
        request: &ApiRequest,
        auth: Option<&SessionToken>,
    ) -> impl Future<Output = SyncResult<serde_json::Value>> + Send;
}

/// A scripted reply of the [`MockTransport`].
#[derive(Debug, Clone)]
pub enum MockReply {
    /// 2xx with this body.
    Json(serde_json::Value),
    /// Non-success status with a message.
    Status(u16, String),
    /// The connection failed before a response arrived.
    ConnectionLost,
    /// The request timed out.
    Timeout,
}

impl MockReply {
    fn into_result(self) -> SyncResult<serde_json::Value> {
        match self {
            MockReply::Json(body) => Ok(body),
            MockReply::Status(status, message) => Err(SyncError::from_status(status, message)),
            MockReply::ConnectionLost => Err(SyncError::transport_retryable("connection lost")),
            MockReply::Timeout => Err(SyncError::Timeout),
        }
    }
}

/// A call the [`MockTransport`] received.
#[derive(Debug, Clone)]
pub struct RecordedCall {
    /// The request.
    pub request: ApiRequest,
    /// Token the call carried.
    pub token: Option<String>,
}

/// A mock transport for testing.
///
/// Replies are scripted per `(method, path)`. Each call pops the next
/// reply of its route; the last reply of a route repeats. A call to an
/// unscripted route fails with 404. While [`pause`](Self::pause) is in
/// effect calls are recorded but wait for [`release`](Self::release)
/// before replying.
#[derive(Debug)]
pub struct MockTransport {
    connected: AtomicBool,
    routes: Mutex<HashMap<(HttpMethod, String), VecDeque<MockReply>>>,
    calls: Mutex<Vec<RecordedCall>>,
    gate: Mutex<Option<Arc<Semaphore>>>,
    arrived: Notify,
}

impl Default for MockTransport {
    fn default() -> Self {
        Self::new()
    }
}

impl MockTransport {
    /// Creates a new mock transport.
    pub fn new() -> Self {
        Self {
            connected: AtomicBool::new(true),
            routes: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
            gate: Mutex::new(None),
            arrived: Notify::new(),
        }
    }

    /// Queues a reply for `method path`.
    pub fn reply(&self, method: HttpMethod, path: impl Into<String>, reply: MockReply) {
        self.routes
            .lock()
            .entry((method, path.into()))
            .or_default()
            .push_back(reply);
    }

    /// Queues a JSON reply for `method path`.
    pub fn respond(&self, method: HttpMethod, path: impl Into<String>, body: serde_json::Value) {
        self.reply(method, path, MockReply::Json(body));
    }

    /// Queues a status failure for `method path`.
    pub fn fail(&self, method: HttpMethod, path: impl Into<String>, status: u16) {
        self.reply(method, path, MockReply::Status(status, format!("status {status}")));
    }

    /// Sets the connected state. Calls made while disconnected fail with a
    /// retryable transport error.
    pub fn set_connected(&self, connected: bool) {
        self.connected.store(connected, Ordering::SeqCst);
    }

    /// Holds every subsequent call until released.
    pub fn pause(&self) {
        *self.gate.lock() = Some(Arc::new(Semaphore::new(0)));
    }

    /// Lets `n` held calls proceed.
    pub fn release(&self, n: usize) {
        if let Some(gate) = self.gate.lock().as_ref() {
            gate.add_permits(n);
        }
    }

    /// Stops holding calls and lets every waiting call proceed.
    pub fn resume(&self) {
        if let Some(gate) = self.gate.lock().take() {
            gate.close();
        }
    }

    /// Calls received so far.
    pub fn calls(&self) -> Vec<RecordedCall> {
        self.calls.lock().clone()
    }

    /// Number of calls received so far.
    pub fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    /// Number of calls received for `method path`.
    pub fn calls_to(&self, method: HttpMethod, path: &str) -> usize {
        self.calls
            .lock()
            .iter()
            .filter(|c| c.request.method == method && c.request.path == path)
            .count()
    }

    /// Waits until at least `n` calls have been received.
    pub async fn wait_for_calls(&self, n: usize) {
        loop {
            let arrived = self.arrived.notified();
            if self.call_count() >= n {
                return;
            }
            arrived.await;
        }
    }

    fn next_reply(&self, request: &ApiRequest) -> MockReply {
        let mut routes = self.routes.lock();
        let Some(queue) = routes.get_mut(&(request.method, request.path.clone())) else {
            return MockReply::Status(404, format!("no route for {request}"));
        };
        if queue.len() > 1 {
            queue.pop_front().unwrap_or(MockReply::Status(404, String::new()))
        } else {
            queue
                .front()
                .cloned()
                .unwrap_or(MockReply::Status(404, String::new()))
        }
    }
}

impl ApiTransport for MockTransport {
    async fn execute(
        &self,
        request: &ApiRequest,
        auth: Option<&SessionToken>,
    ) -> SyncResult<serde_json::Value> {
        self.calls.lock().push(RecordedCall {
            request: request.clone(),
            token: auth.map(|t| t.expose().to_string()),
        });
        self.arrived.notify_waiters();

        let gate = self.gate.lock().clone();
        if let Some(gate) = gate {
            // a closed gate means resume() was called
            if let Ok(permit) = gate.acquire().await {
                permit.forget();
            }
        }

        if !self.connected.load(Ordering::SeqCst) {
            return Err(SyncError::transport_retryable("not connected"));
        }
        self.next_reply(request).into_result()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn replies_in_order_and_repeat_last() {
        let transport = MockTransport::new();
        transport.reply(HttpMethod::Get, "/users/me/", MockReply::ConnectionLost);
        transport.respond(HttpMethod::Get, "/users/me/", json!({"id": 1}));

        let request = ApiRequest::get("/users/me/");
        assert!(transport.execute(&request, None).await.is_err());
        assert_eq!(transport.execute(&request, None).await.unwrap(), json!({"id": 1}));
        assert_eq!(transport.execute(&request, None).await.unwrap(), json!({"id": 1}));
        assert_eq!(transport.calls_to(HttpMethod::Get, "/users/me/"), 3);
    }

    #[tokio::test]
    async fn unscripted_route_is_not_found() {
        let transport = MockTransport::new();
        let result = transport.execute(&ApiRequest::delete("/posts/1/"), None).await;
        assert!(matches!(result, Err(SyncError::NotFound(_))));
    }

    #[tokio::test]
    async fn records_token() {
        let transport = MockTransport::new();
        transport.respond(HttpMethod::Get, "/gyms/", json!([]));
        let token = SessionToken::new("t0k");
        transport
            .execute(&ApiRequest::get("/gyms/"), Some(&token))
            .await
            .unwrap();
        assert_eq!(transport.calls()[0].token.as_deref(), Some("t0k"));
    }

    #[tokio::test]
    async fn disconnected_is_retryable() {
        let transport = MockTransport::new();
        transport.set_connected(false);
        let err = transport
            .execute(&ApiRequest::get("/gyms/"), None)
            .await
            .unwrap_err();
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn paused_calls_wait_for_release() {
        let transport = Arc::new(MockTransport::new());
        transport.respond(HttpMethod::Post, "/posts/1/like/", json!({}));
        transport.pause();

        let call = {
            let transport = Arc::clone(&transport);
            tokio::spawn(async move {
                transport
                    .execute(&ApiRequest::post("/posts/1/like/"), None)
                    .await
            })
        };
        transport.wait_for_calls(1).await;
        assert!(!call.is_finished());

        transport.release(1);
        assert!(call.await.unwrap().is_ok());
    }
}
