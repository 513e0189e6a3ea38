//! Shared fixtures for unit tests: scripted backend, recording notifier,
//! token and profile builders, and a wired-up session harness.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};

use base64::Engine;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use reqwest::Method;
use tokio::sync::watch;

use crate::net::{ApiResponse, HttpBackend, OutboundRequest, Transport, TransportError};
use crate::notify::{Notice, Notifier};
use crate::services::ledger::Ledger;
use crate::services::session::SessionMachine;
use crate::storage::MemoryStorage;
use crate::storage::credentials::CredentialStore;

pub const BASE_URL: &str = "http://api.test/api";

// =============================================================================
// MockBackend
// =============================================================================

#[derive(Clone)]
enum Scripted {
    Respond(ApiResponse),
    NetworkDown,
}

/// Queued responses for one route. Once the last one has been served it
/// repeats until something new is scripted.
#[derive(Default)]
struct Route {
    queue: VecDeque<Scripted>,
    drained: bool,
}

type RouteKey = (Method, String);

/// Responses scripted per method + path. Unscripted routes answer 404.
#[derive(Default)]
pub struct MockBackend {
    routes: Mutex<HashMap<RouteKey, Route>>,
    gates: Mutex<HashMap<RouteKey, watch::Receiver<bool>>>,
    requests: Mutex<Vec<OutboundRequest>>,
}

impl MockBackend {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn key(method: &Method, path: &str) -> RouteKey {
        (method.clone(), path.trim_start_matches('/').to_string())
    }

    fn push(&self, method: Method, path: &str, scripted: Scripted) {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.entry(Self::key(&method, path)).or_default();
        if route.drained {
            route.queue.clear();
            route.drained = false;
        }
        route.queue.push_back(scripted);
    }

    pub fn respond(&self, method: Method, path: &str, status: u16, body: serde_json::Value) {
        self.push(method, path, Scripted::Respond(ApiResponse::new(status, body.to_string())));
    }

    pub fn network_down(&self, method: Method, path: &str) {
        self.push(method, path, Scripted::NetworkDown);
    }

    /// Hold every response on this route until the returned gate opens.
    pub fn hold(&self, method: Method, path: &str) -> Gate {
        let (tx, rx) = watch::channel(false);
        self.gates.lock().unwrap().insert(Self::key(&method, path), rx);
        Gate(tx)
    }

    pub fn requests(&self) -> Vec<OutboundRequest> {
        self.requests.lock().unwrap().clone()
    }

    pub fn count(&self, method: &Method, path: &str) -> usize {
        let url = format!("{BASE_URL}/{}", path.trim_start_matches('/'));
        self.requests
            .lock()
            .unwrap()
            .iter()
            .filter(|r| &r.method == method && r.url == url)
            .count()
    }

    pub fn last_request(&self, method: &Method, path: &str) -> Option<OutboundRequest> {
        let url = format!("{BASE_URL}/{}", path.trim_start_matches('/'));
        self.requests
            .lock()
            .unwrap()
            .iter()
            .rev()
            .find(|r| &r.method == method && r.url == url)
            .cloned()
    }

    fn next(&self, key: &RouteKey) -> Option<Scripted> {
        let mut routes = self.routes.lock().unwrap();
        let route = routes.get_mut(key)?;
        if route.queue.len() > 1 {
            return route.queue.pop_front();
        }
        route.drained = true;
        route.queue.front().cloned()
    }
}

#[async_trait::async_trait]
impl HttpBackend for MockBackend {
    async fn execute(&self, request: OutboundRequest) -> Result<ApiResponse, TransportError> {
        let path = request
            .url
            .strip_prefix(BASE_URL)
            .unwrap_or(request.url.as_str())
            .trim_start_matches('/')
            .to_string();
        let key = (request.method.clone(), path);
        self.requests.lock().unwrap().push(request);

        let gate = self.gates.lock().unwrap().get(&key).cloned();
        if let Some(mut gate) = gate {
            // A dropped gate releases its waiters too.
            let _ = gate.wait_for(|open| *open).await;
        }

        match self.next(&key) {
            Some(Scripted::Respond(response)) => Ok(response),
            Some(Scripted::NetworkDown) => Err(TransportError::Network("connection refused".into())),
            None => Ok(ApiResponse::new(404, r#"{"detail":"Not found."}"#)),
        }
    }
}

/// Releases responses held by [`MockBackend::hold`].
pub struct Gate(watch::Sender<bool>);

impl Gate {
    pub fn open(&self) {
        self.0.send_replace(true);
    }
}

// =============================================================================
// RecordingNotifier
// =============================================================================

#[derive(Default)]
pub struct RecordingNotifier {
    notices: Mutex<Vec<Notice>>,
}

impl RecordingNotifier {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn notices(&self) -> Vec<Notice> {
        self.notices.lock().unwrap().clone()
    }

    pub fn messages(&self) -> Vec<String> {
        self.notices().into_iter().map(|n| n.message).collect()
    }

    pub fn count(&self, message: &str) -> usize {
        self.notices().iter().filter(|n| n.message == message).count()
    }
}

impl Notifier for RecordingNotifier {
    fn notify(&self, notice: Notice) {
        self.notices.lock().unwrap().push(notice);
    }
}

// =============================================================================
// Fixtures
// =============================================================================

/// Unsigned three-segment token carrying `claims`.
pub fn make_jwt(claims: &serde_json::Value) -> String {
    let header = URL_SAFE_NO_PAD.encode(br#"{"alg":"HS256","typ":"JWT"}"#);
    let payload = URL_SAFE_NO_PAD.encode(claims.to_string());
    format!("{header}.{payload}.sig")
}

pub fn user_json(uid: &str, display_name: &str, balance: i64) -> serde_json::Value {
    serde_json::json!({
        "uid": uid,
        "email": format!("{uid}@example.com"),
        "displayName": display_name,
        "photoURL": null,
        "role": "STUDENT",
        "membershipStatus": "approved",
        "parasStones": balance,
        "coins": 0,
        "parasHistory": []
    })
}

// =============================================================================
// Harness
// =============================================================================

/// A session wired to a scripted backend and shared in-memory storage.
pub struct Harness {
    pub backend: Arc<MockBackend>,
    pub notifier: Arc<RecordingNotifier>,
    pub storage: Arc<MemoryStorage>,
    pub transport: Arc<Transport>,
    pub session: Arc<SessionMachine>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_parts(MockBackend::new(), Arc::new(MemoryStorage::new()))
    }

    fn with_parts(backend: Arc<MockBackend>, storage: Arc<MemoryStorage>) -> Self {
        let notifier = RecordingNotifier::new();
        let transport = Arc::new(Transport::new(BASE_URL, backend.clone(), notifier.clone()));
        let session = SessionMachine::new(transport.clone(), CredentialStore::new(storage.clone()));
        Self { backend, notifier, storage, transport, session }
    }

    /// Fresh transport and session over the same storage and server.
    pub fn reload(&self) -> Self {
        Self::with_parts(self.backend.clone(), self.storage.clone())
    }

    pub fn credentials(&self) -> CredentialStore {
        CredentialStore::new(self.storage.clone())
    }

    pub fn ledger(&self) -> Ledger {
        Ledger::new(self.session.clone())
    }

    /// Script a successful login for `uid` with the given balance.
    pub fn script_login(&self, uid: &str, balance: i64) -> String {
        let token = make_jwt(&serde_json::json!({ "user_id": uid }));
        self.backend.respond(Method::POST, "token/", 200, serde_json::json!({ "access": token, "refresh": "r" }));
        self.backend
            .respond(Method::GET, &format!("users/{uid}/"), 200, user_json(uid, "Asha", balance));
        token
    }

    /// Log in as `uid` and return the issued token.
    pub async fn logged_in(&self, uid: &str, balance: i64) -> String {
        let token = self.script_login(uid, balance);
        self.session.login("asha@example.com", "pw").await.unwrap();
        token
    }
}
