//! Request gateway and authentication state for the PART API.

use crate::config::PartApiConfig;
use crate::error::{PartApiError, Result};
use crate::events::{ClientEvent, EventRegistry, Listener};
use crate::session::{AuthStatus, Session};
use crate::transport::{ReqwestTransport, Transport, TransportRequest, TransportResponse, UploadRequest};
use crate::types::{Credentials, Envelope, ProgressCallback, UploadFile};
use bytes::Bytes;
use parking_lot::Mutex;
use reqwest::Method;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::time::Instant;

pub(crate) const AUTHENTICATE_PATH: &str = "/authenticate";
pub(crate) const SESSION_CHECK_PATH: &str = "/authenticated";

/// Outcome of [`PartClient::revalidate`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Revalidation {
    /// The previous check was too recent; nothing was sent.
    Skipped,
    /// The server confirmed the session.
    Confirmed,
    /// The check failed; the session is now unauthenticated.
    Rejected,
}

/// PART API client.
///
/// Every endpoint method funnels through one gateway that classifies the
/// response. A 401 from any call schedules a background session check
/// (at most one per configured interval) whose result is published as
/// [`ClientEvent::Authenticated`].
///
/// Cloning is cheap; clones share session state and listeners.
#[derive(Clone)]
pub struct PartClient {
    inner: Arc<Inner>,
}

struct Inner {
    config: PartApiConfig,
    transport: Arc<dyn Transport>,
    session: Mutex<Session>,
    events: EventRegistry,
}

impl PartClient {
    /// Create a client using the reqwest transport.
    ///
    /// reqwest needs absolute URLs, so the base endpoint must be set. Custom
    /// transports passed to [`PartClient::with_transport`] may resolve
    /// relative paths themselves.
    pub fn new(config: PartApiConfig) -> Result<Self> {
        if config.base_endpoint.trim().is_empty() {
            return Err(PartApiError::Input(
                "base endpoint must be set for the HTTP transport".to_string(),
            ));
        }
        let transport = ReqwestTransport::new(&config)?;
        Ok(Self::with_transport(config, Arc::new(transport)))
    }

    /// Create a client configured from `PART_API_*` environment variables.
    pub fn from_env() -> Result<Self> {
        Self::new(PartApiConfig::from_env())
    }

    pub fn with_transport(config: PartApiConfig, transport: Arc<dyn Transport>) -> Self {
        let session = Session::new(config.revalidate_interval);
        Self {
            inner: Arc::new(Inner {
                config,
                transport,
                session: Mutex::new(session),
                events: EventRegistry::new(),
            }),
        }
    }

    pub fn config(&self) -> &PartApiConfig {
        &self.inner.config
    }

    // ---------- Session ----------

    pub fn status(&self) -> AuthStatus {
        self.inner.session.lock().status()
    }

    /// `None` until a login or session check has completed.
    pub fn is_authenticated(&self) -> Option<bool> {
        self.status().as_bool()
    }

    pub fn token(&self) -> Option<String> {
        self.inner.session.lock().token().map(str::to_string)
    }

    /// Consistent copy of the whole session.
    pub fn session(&self) -> Session {
        self.inner.session.lock().clone()
    }

    // ---------- Listeners ----------

    pub fn subscribe(&self, event: ClientEvent, listener: Listener) {
        self.inner.events.subscribe(event, listener);
    }

    pub fn unsubscribe(&self, event: ClientEvent, listener: &Listener) {
        self.inner.events.unsubscribe(event, listener);
    }

    // ---------- Authentication ----------

    /// Log in. On success the session holds the returned token; on failure
    /// it is cleared. Listeners are notified either way before this returns.
    pub async fn authenticate(
        &self,
        username: impl Into<String>,
        password: impl Into<String>,
    ) -> Result<()> {
        let credentials = Credentials::new(username, password);
        if credentials.username.trim().is_empty() {
            return Err(PartApiError::Input("username must not be empty".to_string()));
        }

        let outcome = self
            .send_json(Method::POST, AUTHENTICATE_PATH, &credentials)
            .await
            .and_then(session_token);
        match outcome {
            Ok(token) => {
                tracing::info!(username = %credentials.username, "authenticated");
                self.set_authenticated(token);
                Ok(())
            }
            Err(err) => {
                tracing::info!(username = %credentials.username, error = %err, "authentication failed");
                self.set_unauthenticated();
                Err(err)
            }
        }
    }

    /// Ask the server whether the session is still valid.
    ///
    /// Rate-gated: returns [`Revalidation::Skipped`] without any network
    /// traffic if the previous check started less than the configured
    /// interval ago. Failures are not returned; they mark the session
    /// unauthenticated and notify listeners.
    pub async fn revalidate(&self) -> Revalidation {
        if !self.begin_check() {
            return Revalidation::Skipped;
        }
        self.check_session().await
    }

    fn begin_check(&self) -> bool {
        let started = self.inner.session.lock().begin_check(Instant::now());
        if !started {
            tracing::debug!("session check skipped; previous check is too recent");
        }
        started
    }

    /// Run a session check on a detached task. The caller does not wait for it.
    fn spawn_revalidation(&self) {
        if !self.begin_check() {
            return;
        }
        let client = self.clone();
        tokio::spawn(async move {
            client.check_session().await;
        });
    }

    /// Unconditional probe of the session endpoint. Uses the raw exchange so a
    /// 401 here does not schedule yet another check.
    async fn check_session(&self) -> Revalidation {
        let request = TransportRequest::new(Method::GET, self.inner.config.url(SESSION_CHECK_PATH));
        match self.exchange(request).await.and_then(session_token) {
            Ok(token) => {
                self.set_authenticated(token);
                Revalidation::Confirmed
            }
            Err(err) => {
                tracing::debug!(error = %err, "session check failed");
                self.set_unauthenticated();
                Revalidation::Rejected
            }
        }
    }

    fn set_authenticated(&self, token: String) {
        self.inner.session.lock().mark_authenticated(token);
        self.inner.events.publish(ClientEvent::Authenticated, true);
    }

    fn set_unauthenticated(&self) {
        self.inner.session.lock().mark_unauthenticated();
        self.inner.events.publish(ClientEvent::Authenticated, false);
    }

    // ---------- Gateway ----------

    /// Send a request to `path` (appended to the base endpoint) and return the
    /// whole response envelope.
    ///
    /// A 401 schedules a background session check before the error is
    /// returned; the check is not awaited.
    pub async fn request(
        &self,
        method: Method,
        path: &str,
        headers: &[(&str, &str)],
        body: Option<Bytes>,
    ) -> Result<Envelope> {
        let mut request = TransportRequest::new(method, self.inner.config.url(path));
        for (name, value) in headers {
            request = request.header(*name, *value);
        }
        request.body = body;
        self.dispatch(request).await
    }

    pub(crate) async fn get(&self, path: &str) -> Result<Envelope> {
        self.dispatch(TransportRequest::new(Method::GET, self.inner.config.url(path)))
            .await
    }

    pub(crate) async fn send_json<B>(&self, method: Method, path: &str, body: &B) -> Result<Envelope>
    where
        B: Serialize + ?Sized,
    {
        let body = serde_json::to_vec(body)?;
        let request = TransportRequest::new(method, self.inner.config.url(path)).json_body(body);
        self.dispatch(request).await
    }

    /// Multipart upload through the same unauthorized-response policy.
    pub(crate) async fn upload(
        &self,
        path: &str,
        file: UploadFile,
        progress: Option<ProgressCallback>,
    ) -> Result<Envelope> {
        let url = self.inner.config.url(path);
        tracing::debug!(%url, bytes = file.len(), "uploading file");
        let request = UploadRequest { url, file };
        let response = self.inner.transport.upload(request, progress).await?;
        self.note_unauthorized(&response);
        classify_upload(response)
    }

    async fn dispatch(&self, request: TransportRequest) -> Result<Envelope> {
        tracing::debug!(method = %request.method, url = %request.url, "sending request");
        let response = self.inner.transport.send(request).await?;
        self.note_unauthorized(&response);
        classify(response)
    }

    async fn exchange(&self, request: TransportRequest) -> Result<Envelope> {
        let response = self.inner.transport.send(request).await?;
        classify(response)
    }

    fn note_unauthorized(&self, response: &TransportResponse) {
        if response.status == 401 {
            tracing::debug!("unauthorized response; scheduling session check");
            self.spawn_revalidation();
        }
    }
}

/// Success → the parsed envelope. Failure → error carrying the envelope's
/// `message` (status reason if absent). Only bodies that are not JSON at all
/// are fatal.
fn classify(response: TransportResponse) -> Result<Envelope> {
    let status = response.status;
    let body: Value = serde_json::from_slice(&response.body)
        .map_err(|source| PartApiError::Decode { status, source })?;
    let envelope = Envelope::from(body);
    if response.is_success() {
        return Ok(envelope);
    }
    let message = envelope
        .message
        .unwrap_or_else(|| response.reason().to_string());
    tracing::debug!(status, %message, "request failed");
    Err(failure(status, message))
}

/// Uploads fall back to `"Error {status}: {reason}"` when the server did not
/// send a JSON message.
fn classify_upload(response: TransportResponse) -> Result<Envelope> {
    let status = response.status;
    if response.is_success() {
        return serde_json::from_slice::<Value>(&response.body)
            .map(Envelope::from)
            .map_err(|source| PartApiError::Decode { status, source });
    }
    let message = serde_json::from_slice::<Value>(&response.body)
        .ok()
        .and_then(|body| Envelope::from(body).message)
        .unwrap_or_else(|| format!("Error {status}: {}", response.reason()));
    tracing::debug!(status, %message, "upload failed");
    Err(failure(status, message))
}

fn failure(status: u16, message: String) -> PartApiError {
    if status == 401 {
        PartApiError::NotAuthenticated { message }
    } else {
        PartApiError::Server { status, message }
    }
}

/// The login and session-check endpoints return the session token as `data`.
fn session_token(envelope: Envelope) -> Result<String> {
    match envelope.data {
        Some(Value::String(token)) => Ok(token),
        Some(Value::Null) | None => Err(PartApiError::Server {
            status: 200,
            message: "response did not include a session token".to_string(),
        }),
        Some(other) => Ok(other.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::events::listener;
    use async_trait::async_trait;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use std::collections::HashMap;
    use std::time::Duration;
    use tokio::sync::mpsc;
    use tokio::time::timeout;

    const BASE: &str = "http://part.test";

    enum Reply {
        Respond(u16, Bytes),
        Unreachable,
    }

    /// Fixed reply per URL, records every call.
    #[derive(Default)]
    struct FakeTransport {
        replies: Mutex<HashMap<String, Reply>>,
        calls: Mutex<Vec<(Method, String)>>,
    }

    impl FakeTransport {
        fn reply(&self, path: &str, status: u16, body: Value) {
            self.replies.lock().insert(
                format!("{BASE}{path}"),
                Reply::Respond(status, Bytes::from(body.to_string())),
            );
        }

        fn reply_raw(&self, path: &str, status: u16, body: &'static str) {
            self.replies
                .lock()
                .insert(format!("{BASE}{path}"), Reply::Respond(status, Bytes::from(body)));
        }

        fn unreachable(&self, path: &str) {
            self.replies
                .lock()
                .insert(format!("{BASE}{path}"), Reply::Unreachable);
        }

        fn calls_to(&self, path: &str) -> usize {
            let url = format!("{BASE}{path}");
            self.calls.lock().iter().filter(|(_, u)| *u == url).count()
        }

        fn answer(&self, method: Method, url: String) -> Result<TransportResponse> {
            self.calls.lock().push((method, url.clone()));
            match self.replies.lock().get(&url) {
                Some(Reply::Respond(status, body)) => Ok(TransportResponse::new(*status, body.clone())),
                Some(Reply::Unreachable) => Err(PartApiError::Connection("connection refused".to_string())),
                None => Ok(TransportResponse::new(404, r#"{"message":"no route"}"#)),
            }
        }
    }

    #[async_trait]
    impl Transport for FakeTransport {
        async fn send(&self, request: TransportRequest) -> Result<TransportResponse> {
            self.answer(request.method, request.url)
        }

        async fn upload(
            &self,
            request: UploadRequest,
            _progress: Option<ProgressCallback>,
        ) -> Result<TransportResponse> {
            self.answer(Method::POST, request.url)
        }
    }

    fn client() -> (PartClient, Arc<FakeTransport>) {
        let transport = Arc::new(FakeTransport::default());
        let client = PartClient::with_transport(
            PartApiConfig::new().base_endpoint(BASE),
            transport.clone(),
        );
        (client, transport)
    }

    fn event_channel(client: &PartClient) -> mpsc::UnboundedReceiver<bool> {
        let (tx, rx) = mpsc::unbounded_channel();
        client.subscribe(
            ClientEvent::Authenticated,
            listener(move |value: bool| {
                let _ = tx.send(value);
            }),
        );
        rx
    }

    async fn next_event(rx: &mut mpsc::UnboundedReceiver<bool>) -> bool {
        timeout(Duration::from_secs(5), rx.recv())
            .await
            .expect("event timeout")
            .expect("channel open")
    }

    /// Give detached tasks a chance to run.
    async fn settle() {
        for _ in 0..10 {
            tokio::task::yield_now().await;
        }
    }

    #[tokio::test]
    async fn success_returns_whole_envelope() {
        let (client, transport) = client();
        transport.reply("/getActiveSurvey", 200, json!({"data": {"id": 1}, "message": "ok"}));

        let envelope = client.get("/getActiveSurvey").await.expect("envelope");

        assert_eq!(envelope.message.as_deref(), Some("ok"));
        assert_eq!(envelope.into_data(), json!({"id": 1}));
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_raises_and_schedules_one_check() {
        let (client, transport) = client();
        transport.reply("/getQuestions", 401, json!({"message": "expired"}));
        transport.reply(SESSION_CHECK_PATH, 401, json!({"message": "no session"}));
        let mut events = event_channel(&client);

        let err = client.get("/getQuestions").await.expect_err("401 must fail");

        assert!(err.is_not_authenticated(), "got {err:?}");
        assert_eq!(err.message(), "expired");
        assert!(!next_event(&mut events).await);
        assert_eq!(transport.calls_to(SESSION_CHECK_PATH), 1);
        assert_eq!(client.status(), AuthStatus::Unauthenticated);
    }

    #[tokio::test(start_paused = true)]
    async fn server_error_does_not_schedule_check() {
        let (client, transport) = client();
        transport.reply("/getQuestions", 500, json!({"message": "boom"}));

        let err = client.get("/getQuestions").await.expect_err("500 must fail");
        settle().await;

        match err {
            PartApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, "boom");
            }
            other => panic!("unexpected error: {other:?}"),
        }
        assert_eq!(transport.calls_to(SESSION_CHECK_PATH), 0);
        assert_eq!(client.status(), AuthStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn unauthorized_bursts_collapse_to_one_check_per_interval() {
        let (client, transport) = client();
        transport.reply("/getSurveys", 401, json!({"message": "expired"}));
        transport.reply(SESSION_CHECK_PATH, 200, json!({"data": "tok-2"}));
        let mut events = event_channel(&client);

        for _ in 0..5 {
            let _ = client.get("/getSurveys").await;
        }
        assert!(next_event(&mut events).await);
        settle().await;
        assert_eq!(transport.calls_to(SESSION_CHECK_PATH), 1);

        tokio::time::advance(Duration::from_millis(500)).await;
        let _ = client.get("/getSurveys").await;
        settle().await;
        assert_eq!(transport.calls_to(SESSION_CHECK_PATH), 1);

        tokio::time::advance(Duration::from_millis(600)).await;
        let _ = client.get("/getSurveys").await;
        assert!(next_event(&mut events).await);
        assert_eq!(transport.calls_to(SESSION_CHECK_PATH), 2);
        assert_eq!(client.token().as_deref(), Some("tok-2"));
    }

    #[tokio::test]
    async fn non_json_error_body_is_fatal_but_still_checks_session() {
        let (client, transport) = client();
        transport.reply_raw("/getMetrics", 401, "<html>login</html>");
        transport.reply(SESSION_CHECK_PATH, 401, json!({"message": "no"}));
        let mut events = event_channel(&client);

        let err = client.get("/getMetrics").await.expect_err("must fail");

        assert!(matches!(err, PartApiError::Decode { status: 401, .. }), "got {err:?}");
        assert!(!next_event(&mut events).await);
        assert_eq!(transport.calls_to(SESSION_CHECK_PATH), 1);
    }

    #[tokio::test]
    async fn missing_error_message_falls_back_to_reason() {
        let (client, transport) = client();
        transport.reply("/logout", 503, json!({}));

        let err = client.get("/logout").await.expect_err("must fail");

        assert_eq!(err.message(), "Service Unavailable");
        assert_eq!(err.status(), Some(503));
    }

    #[tokio::test]
    async fn structured_error_message_stays_a_server_error() {
        let (client, transport) = client();
        transport.reply("/getSurveys", 500, json!({"message": {"code": 7}}));

        let err = client.get("/getSurveys").await.expect_err("must fail");

        match err {
            PartApiError::Server { status, message } => {
                assert_eq!(status, 500);
                assert_eq!(message, r#"{"code":7}"#);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[tokio::test]
    async fn non_object_success_body_becomes_data() {
        let (client, transport) = client();
        transport.reply("/getMetrics", 200, json!([1, 2]));

        let envelope = client.get("/getMetrics").await.expect("envelope");

        assert_eq!(envelope.message, None);
        assert_eq!(envelope.into_data(), json!([1, 2]));
    }

    #[tokio::test]
    async fn connection_failure_propagates() {
        let (client, transport) = client();
        transport.unreachable("/getQuestions");

        let err = client.get("/getQuestions").await.expect_err("must fail");

        assert!(matches!(err, PartApiError::Connection(_)), "got {err:?}");
    }

    #[tokio::test]
    async fn authenticate_success_stores_token_and_notifies_once() {
        let (client, transport) = client();
        transport.reply(AUTHENTICATE_PATH, 200, json!({"data": "tok-1"}));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            client.subscribe(
                ClientEvent::Authenticated,
                listener(move |value: bool| seen.lock().push(value)),
            );
        }

        client.authenticate("u", "p").await.expect("login");

        assert_eq!(client.status(), AuthStatus::Authenticated);
        assert_eq!(client.token().as_deref(), Some("tok-1"));
        assert_eq!(*seen.lock(), vec![true]);
    }

    #[tokio::test]
    async fn authenticate_failure_clears_session_notifies_then_errors() {
        let (client, transport) = client();
        transport.reply(AUTHENTICATE_PATH, 200, json!({"data": "tok-1"}));
        client.authenticate("u", "p").await.expect("first login");

        transport.reply(AUTHENTICATE_PATH, 403, json!({"message": "bad credentials"}));
        let seen = Arc::new(Mutex::new(Vec::new()));
        {
            let seen = Arc::clone(&seen);
            client.subscribe(
                ClientEvent::Authenticated,
                listener(move |value: bool| seen.lock().push(value)),
            );
        }

        let err = client.authenticate("u", "wrong").await.expect_err("login must fail");

        assert_eq!(err.message(), "bad credentials");
        assert_eq!(*seen.lock(), vec![false]);
        assert_eq!(client.status(), AuthStatus::Unauthenticated);
        assert!(client.token().is_none());
    }

    #[tokio::test]
    async fn authenticate_rejects_blank_username_without_network() {
        let (client, transport) = client();

        let err = client.authenticate("  ", "p").await.expect_err("must fail");

        assert!(matches!(err, PartApiError::Input(_)));
        assert_eq!(transport.calls_to(AUTHENTICATE_PATH), 0);
        assert_eq!(client.status(), AuthStatus::Unknown);
    }

    #[tokio::test(start_paused = true)]
    async fn revalidate_is_gated_and_swallows_failures() {
        let (client, transport) = client();
        transport.unreachable(SESSION_CHECK_PATH);
        let mut events = event_channel(&client);

        assert_eq!(client.revalidate().await, Revalidation::Rejected);
        assert!(!next_event(&mut events).await);
        assert_eq!(client.revalidate().await, Revalidation::Skipped);
        assert_eq!(transport.calls_to(SESSION_CHECK_PATH), 1);

        transport.reply(SESSION_CHECK_PATH, 200, json!({"data": {"user": "u"}}));
        tokio::time::advance(Duration::from_secs(1)).await;
        assert_eq!(client.revalidate().await, Revalidation::Confirmed);
        assert!(next_event(&mut events).await);
        assert_eq!(client.token().as_deref(), Some(r#"{"user":"u"}"#));
    }

    #[tokio::test]
    async fn listeners_never_observe_split_flag_and_token() {
        let (client, transport) = client();
        let violations = Arc::new(Mutex::new(0usize));
        {
            let observer = client.clone();
            let violations = Arc::clone(&violations);
            client.subscribe(
                ClientEvent::Authenticated,
                listener(move |_: bool| {
                    let session = observer.session();
                    let consistent = match session.status() {
                        AuthStatus::Authenticated => session.token().is_some(),
                        AuthStatus::Unauthenticated => session.token().is_none(),
                        AuthStatus::Unknown => false,
                    };
                    if !consistent {
                        *violations.lock() += 1;
                    }
                }),
            );
        }

        transport.reply(AUTHENTICATE_PATH, 200, json!({"data": "a"}));
        client.authenticate("u", "p").await.expect("login");
        transport.reply(AUTHENTICATE_PATH, 401, json!({"message": "nope"}));
        let _ = client.authenticate("u", "p").await;
        transport.reply(AUTHENTICATE_PATH, 200, json!({"data": "b"}));
        client.authenticate("u", "p").await.expect("login");

        assert_eq!(*violations.lock(), 0);
    }

    #[tokio::test]
    async fn upload_failure_uses_status_line_message() {
        let (client, transport) = client();
        transport.reply_raw("/dataFileUpload", 413, "");

        let err = client
            .upload("/dataFileUpload", UploadFile::new("a.csv", "x,y"), None)
            .await
            .expect_err("must fail");

        assert_eq!(err.message(), "Error 413: Payload Too Large");
    }

    #[test]
    fn session_token_accepts_strings_and_json() {
        let token = session_token(Envelope {
            data: Some(json!("abc")),
            ..Default::default()
        });
        assert_eq!(token.expect("token"), "abc");
        assert!(session_token(Envelope::default()).is_err());
    }
}
