//! Shared helpers for client integration tests: scripted prompts, cached
//! key pairs, and an in-memory messaging server on top of wiremock.

#![allow(dead_code)]

use async_trait::async_trait;
use cipherpost_client::ClientConfig;
use cipherpost_crypto::{KdfParams, KeyPair, generate_key_pair};
use cipherpost_session::{PasswordPrompt, PromptOutcome, SessionConfig};
use serde_json::{Value, json};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock};
use std::time::Duration;
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, ResponseTemplate};

pub const PASSWORD: &str = "Sup3r$ecret!";

pub fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
        .with_test_writer()
        .try_init();
}

pub fn fast_kdf() -> KdfParams {
    KdfParams::new(1_000)
}

pub fn session_config() -> SessionConfig {
    SessionConfig {
        kdf: fast_kdf(),
        prompt_timeout: Some(Duration::from_secs(5)),
    }
}

pub fn alice_keys() -> &'static KeyPair {
    static KEY: OnceLock<KeyPair> = OnceLock::new();
    KEY.get_or_init(|| generate_key_pair().unwrap())
}

pub fn bob_keys() -> &'static KeyPair {
    static KEY: OnceLock<KeyPair> = OnceLock::new();
    KEY.get_or_init(|| generate_key_pair().unwrap())
}

/// A plausible three-page PDF body.
pub fn three_page_pdf() -> Vec<u8> {
    let mut pdf = b"%PDF-1.7\n".to_vec();
    for page in 1..=3 {
        pdf.extend_from_slice(
            format!("{page} 0 obj << /Type /Page /Parent 4 0 R >> endobj\n").as_bytes(),
        );
        pdf.extend((0..40_000u32).map(|i| (i.wrapping_mul(31).wrapping_add(page)) as u8));
    }
    pdf.extend_from_slice(b"\n%%EOF\n");
    pdf
}

// ── Prompts ──

/// Answers prompts from a queue; `None` entries cancel. Counts requests.
pub struct ScriptedPrompt {
    script: Mutex<VecDeque<Option<String>>>,
    calls: AtomicUsize,
}

impl ScriptedPrompt {
    pub fn new<I, S>(script: I) -> Arc<Self>
    where
        I: IntoIterator<Item = Option<S>>,
        S: Into<String>,
    {
        Arc::new(Self {
            script: Mutex::new(script.into_iter().map(|s| s.map(Into::into)).collect()),
            calls: AtomicUsize::new(0),
        })
    }

    pub fn silent() -> Arc<Self> {
        Self::new(Vec::<Option<String>>::new())
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl PasswordPrompt for ScriptedPrompt {
    async fn request_password(&self) -> PromptOutcome {
        self.calls.fetch_add(1, Ordering::SeqCst);
        match self.script.lock().unwrap().pop_front().flatten() {
            Some(pw) => PromptOutcome::password(pw),
            None => PromptOutcome::Cancelled,
        }
    }
}

// ── Fake server ──

struct User {
    id: i64,
    username: String,
    email: String,
    password: String,
    public_key: String,
    encrypted_private_key: String,
}

struct StoredMessage {
    id: i64,
    sender_id: i64,
    receiver_id: i64,
    request: Value,
    is_read: bool,
    attachment_ids: Vec<i64>,
}

struct StoredAttachment {
    id: i64,
    filename: String,
    mime_type: String,
    size: u64,
    encrypted_data: String,
}

#[derive(Default)]
struct State {
    next_id: i64,
    users: Vec<User>,
    access: HashMap<String, i64>,
    refresh: HashMap<String, i64>,
    messages: Vec<StoredMessage>,
    attachments: Vec<StoredAttachment>,
    reset_tokens: HashMap<String, i64>,
    refresh_calls: usize,
    fail_next_refresh: bool,
}

impl State {
    fn next_id(&mut self) -> i64 {
        self.next_id += 1;
        self.next_id
    }

    fn caller(&self, req: &Request) -> Option<i64> {
        let header = req.headers.get("authorization")?.to_str().ok()?;
        let token = header.strip_prefix("Bearer ")?;
        self.access.get(token).copied()
    }

    fn issue_tokens(&mut self, user_id: i64) -> (String, String) {
        let n = self.next_id();
        let access = format!("at-{user_id}-{n}");
        let refresh = format!("rt-{user_id}-{n}");
        self.access.insert(access.clone(), user_id);
        self.refresh.insert(refresh.clone(), user_id);
        (access, refresh)
    }

    fn user(&self, id: i64) -> Option<&User> {
        self.users.iter().find(|u| u.id == id)
    }

    fn profile(user: &User) -> Value {
        json!({
            "id": user.id,
            "username": user.username,
            "email": user.email,
            "public_key": user.public_key,
        })
    }

    fn render(&self, msg: &StoredMessage, with_recipient: bool) -> Value {
        let sender = self.user(msg.sender_id).map(|u| u.username.clone());
        let recipient = self.user(msg.receiver_id).map(|u| u.username.clone());
        let attachments: Vec<Value> = msg
            .attachment_ids
            .iter()
            .filter_map(|id| self.attachments.iter().find(|a| a.id == *id))
            .map(|a| {
                json!({
                    "id": a.id,
                    "filename": a.filename,
                    "mime_type": a.mime_type,
                    "size": a.size,
                })
            })
            .collect();

        json!({
            "id": msg.id,
            "sender_id": msg.sender_id,
            "sender_username": sender,
            "recipient_id": if with_recipient { json!(msg.receiver_id) } else { Value::Null },
            "recipient_username": if with_recipient { json!(recipient) } else { Value::Null },
            "encrypted_content": msg.request["encrypted_content"],
            "encrypted_symmetric_key": msg.request["encrypted_symmetric_key"],
            "encrypted_symmetric_key_sender": msg.request.get("encrypted_symmetric_key_sender").cloned().unwrap_or(Value::Null),
            "signature": msg.request["signature"],
            "is_read": msg.is_read,
            "created_at": "2025-06-01T10:00:00.000000",
            "attachments": attachments,
        })
    }
}

fn reply(status: u16, body: Value) -> ResponseTemplate {
    ResponseTemplate::new(status).set_body_json(body)
}

fn unauthorized() -> ResponseTemplate {
    reply(401, json!({ "detail": "Could not validate credentials" }))
}

fn id_segment(req: &Request, index: usize) -> Option<i64> {
    req.url.path().split('/').nth(index)?.parse().ok()
}

/// In-memory stand-in for the messaging API. Stores only what the real
/// server would: ciphertext, envelopes, signatures and wrapped keys.
pub struct FakeServer {
    pub server: MockServer,
    state: Arc<Mutex<State>>,
}

impl FakeServer {
    pub async fn start() -> Self {
        let server = MockServer::start().await;
        let state = Arc::new(Mutex::new(State::default()));
        let fake = Self { server, state };
        fake.mount_auth().await;
        fake.mount_reset().await;
        fake.mount_users().await;
        fake.mount_messages().await;
        fake
    }

    pub fn client_config(&self) -> ClientConfig {
        ClientConfig::with_base_url(self.server.uri())
    }

    /// Invalidates every access token; refresh tokens stay valid.
    pub fn expire_access_tokens(&self) {
        self.state.lock().unwrap().access.clear();
    }

    /// The token a reset email would have carried.
    pub fn reset_token(&self, email: &str) -> Option<String> {
        let state = self.state.lock().unwrap();
        let id = state.users.iter().find(|u| u.email == email)?.id;
        state
            .reset_tokens
            .iter()
            .find(|(_, user)| **user == id)
            .map(|(token, _)| token.clone())
    }

    /// The next refresh answers 500 without touching the refresh token.
    pub fn fail_next_refresh(&self) {
        self.state.lock().unwrap().fail_next_refresh = true;
    }

    pub fn refresh_calls(&self) -> usize {
        self.state.lock().unwrap().refresh_calls
    }

    /// Everything the server persisted for a message, as raw JSON text.
    pub fn stored_message_text(&self, id: i64) -> Option<String> {
        let state = self.state.lock().unwrap();
        let msg = state.messages.iter().find(|m| m.id == id)?;
        let mut text = msg.request.to_string();
        for attachment in state.attachments.iter().filter(|a| msg.attachment_ids.contains(&a.id)) {
            text.push_str(&attachment.encrypted_data);
        }
        Some(text)
    }

    async fn mount<R>(&self, verb: &str, matcher: R, responder: impl Fn(&mut State, &Request) -> ResponseTemplate + Send + Sync + 'static)
    where
        R: wiremock::Match + 'static,
    {
        let state = Arc::clone(&self.state);
        Mock::given(method(verb))
            .and(matcher)
            .respond_with(move |req: &Request| responder(&mut state.lock().unwrap(), req))
            .mount(&self.server)
            .await;
    }

    async fn mount_auth(&self) {
        self.mount("POST", path("/auth/register"), |state, req| {
            let Ok(body) = req.body_json::<Value>() else {
                return reply(422, json!({ "detail": "bad body" }));
            };
            let username = body["username"].as_str().unwrap_or_default().to_string();
            if state.users.iter().any(|u| u.username == username) {
                return reply(400, json!({ "detail": "Username already registered" }));
            }
            let id = state.next_id();
            state.users.push(User {
                id,
                username,
                email: body["email"].as_str().unwrap_or_default().to_string(),
                password: body["password"].as_str().unwrap_or_default().to_string(),
                public_key: body["public_key"].as_str().unwrap_or_default().to_string(),
                encrypted_private_key: body["encrypted_private_key"]
                    .as_str()
                    .unwrap_or_default()
                    .to_string(),
            });
            reply(200, json!({ "message": "User registered successfully" }))
        })
        .await;

        self.mount("POST", path("/auth/login"), |state, req| {
            let Ok(body) = req.body_json::<Value>() else {
                return reply(422, json!({ "detail": "bad body" }));
            };
            let found = state
                .users
                .iter()
                .find(|u| u.email == body["email"] && u.password == body["password"])
                .map(|u| (u.id, u.encrypted_private_key.clone()));
            let Some((id, blob)) = found else {
                return reply(401, json!({ "detail": "Incorrect email or password" }));
            };
            let (access, refresh) = state.issue_tokens(id);
            reply(
                200,
                json!({
                    "access_token": access,
                    "refresh_token": refresh,
                    "token_type": "bearer",
                    "encrypted_private_key": blob,
                }),
            )
        })
        .await;

        self.mount("POST", path("/auth/refresh"), |state, req| {
            state.refresh_calls += 1;
            if std::mem::take(&mut state.fail_next_refresh) {
                return reply(500, json!({ "detail": "refresh unavailable" }));
            }
            let token = req
                .body_json::<Value>()
                .ok()
                .and_then(|b| b["refresh_token"].as_str().map(str::to_string));
            let Some(user_id) = token.and_then(|t| state.refresh.remove(&t)) else {
                return unauthorized();
            };
            let (access, refresh) = state.issue_tokens(user_id);
            reply(200, json!({ "access_token": access, "refresh_token": refresh }))
        })
        .await;

        self.mount("POST", path("/auth/logout"), |state, req| {
            if let Some((_, token)) = req.url.query_pairs().find(|(k, _)| k == "refresh_token") {
                state.refresh.remove(&*token);
            }
            reply(200, json!({ "message": "Logged out" }))
        })
        .await;

        self.mount("GET", path("/auth/me"), |state, req| {
            match state.caller(req).and_then(|id| state.user(id)) {
                Some(user) => reply(
                    200,
                    json!({ "id": user.id, "username": user.username, "email": user.email }),
                ),
                None => unauthorized(),
            }
        })
        .await;

        self.mount("POST", path("/auth/get-private-key"), |state, req| {
            let Some(user) = state.caller(req).and_then(|id| state.user(id)) else {
                return unauthorized();
            };
            let body = req.body_json::<Value>().unwrap_or_default();
            if body["password"] != user.password.as_str() {
                return reply(403, json!({ "detail": "Invalid password" }));
            }
            reply(200, json!({ "encrypted_private_key": user.encrypted_private_key }))
        })
        .await;
    }

    async fn mount_reset(&self) {
        self.mount("POST", path("/auth/request-password-reset"), |state, req| {
            let body = req.body_json::<Value>().unwrap_or_default();
            if let Some(id) = state.users.iter().find(|u| u.email == body["email"]).map(|u| u.id) {
                state.reset_tokens.insert(format!("reset-{id}"), id);
            }
            reply(200, json!({ "message": "If the email exists, a reset link was sent" }))
        })
        .await;

        self.mount("POST", path("/auth/reset-password"), |state, req| {
            let body = req.body_json::<Value>().unwrap_or_default();
            let token = body["token"].as_str().unwrap_or_default();
            let Some(id) = state.reset_tokens.remove(token) else {
                return reply(400, json!({ "detail": "Invalid or expired token" }));
            };
            let Some(user) = state.users.iter_mut().find(|u| u.id == id) else {
                return reply(404, json!({ "detail": "User not found" }));
            };
            user.password = body["new_password"].as_str().unwrap_or_default().to_string();
            user.public_key = body["public_key"].as_str().unwrap_or_default().to_string();
            user.encrypted_private_key = body["encrypted_private_key"]
                .as_str()
                .unwrap_or_default()
                .to_string();
            reply(200, json!({ "message": "Password reset successfully" }))
        })
        .await;
    }

    async fn mount_users(&self) {
        self.mount("GET", path_regex(r"^/users/by-username/[^/]+$"), |state, req| {
            if state.caller(req).is_none() {
                return unauthorized();
            }
            let name = req.url.path().rsplit('/').next().unwrap_or_default();
            match state.users.iter().find(|u| u.username == name) {
                Some(user) => reply(200, State::profile(user)),
                None => reply(404, json!({ "detail": "User not found" })),
            }
        })
        .await;

        self.mount("GET", path_regex(r"^/users/\d+$"), |state, req| {
            if state.caller(req).is_none() {
                return unauthorized();
            }
            match id_segment(req, 2).and_then(|id| state.user(id)) {
                Some(user) => reply(200, State::profile(user)),
                None => reply(404, json!({ "detail": "User not found" })),
            }
        })
        .await;

        self.mount("GET", path("/users"), |state, req| {
            if state.caller(req).is_none() {
                return unauthorized();
            }
            let users: Vec<Value> = state.users.iter().map(State::profile).collect();
            reply(200, json!(users))
        })
        .await;
    }

    async fn mount_messages(&self) {
        self.mount("POST", path("/messages/send"), |state, req| {
            let Some(sender_id) = state.caller(req) else {
                return unauthorized();
            };
            let Ok(mut body) = req.body_json::<Value>() else {
                return reply(422, json!({ "detail": "bad body" }));
            };
            let Some(receiver_id) = body["receiver_id"].as_i64().filter(|id| state.user(*id).is_some())
            else {
                return reply(404, json!({ "detail": "Receiver not found" }));
            };

            let mut attachment_ids = Vec::new();
            let uploads = body
                .get_mut("attachments")
                .map(Value::take)
                .and_then(|v| v.as_array().cloned())
                .unwrap_or_default();
            for upload in uploads {
                let size = upload["size"].as_u64().unwrap_or(0);
                if size == 0 || size > 10_000_000 {
                    return reply(422, json!({ "detail": "invalid attachment size" }));
                }
                let id = state.next_id();
                state.attachments.push(StoredAttachment {
                    id,
                    filename: upload["filename"].as_str().unwrap_or_default().to_string(),
                    mime_type: upload["mime_type"].as_str().unwrap_or_default().to_string(),
                    size,
                    encrypted_data: upload["encrypted_data"].as_str().unwrap_or_default().to_string(),
                });
                attachment_ids.push(id);
            }

            let id = state.next_id();
            state.messages.push(StoredMessage {
                id,
                sender_id,
                receiver_id,
                request: body,
                is_read: false,
                attachment_ids,
            });
            reply(200, json!({ "message_id": id }))
        })
        .await;

        self.mount("GET", path("/messages/inbox"), |state, req| {
            let Some(user_id) = state.caller(req) else {
                return unauthorized();
            };
            let inbox: Vec<Value> = state
                .messages
                .iter()
                .filter(|m| m.receiver_id == user_id)
                .map(|m| state.render(m, false))
                .collect();
            reply(200, json!(inbox))
        })
        .await;

        self.mount("GET", path("/messages/sent"), |state, req| {
            let Some(user_id) = state.caller(req) else {
                return unauthorized();
            };
            let sent: Vec<Value> = state
                .messages
                .iter()
                .filter(|m| m.sender_id == user_id)
                .map(|m| state.render(m, true))
                .collect();
            reply(200, json!(sent))
        })
        .await;

        self.mount("GET", path_regex(r"^/messages/attachments/\d+$"), |state, req| {
            if state.caller(req).is_none() {
                return unauthorized();
            }
            let found = id_segment(req, 3)
                .and_then(|id| state.attachments.iter().find(|a| a.id == id));
            match found {
                Some(a) => reply(
                    200,
                    json!({
                        "id": a.id,
                        "filename": a.filename,
                        "mime_type": a.mime_type,
                        "size": a.size,
                        "encrypted_data": a.encrypted_data,
                    }),
                ),
                None => reply(404, json!({ "detail": "Attachment not found" })),
            }
        })
        .await;

        self.mount("POST", path_regex(r"^/messages/\d+/read$"), |state, req| {
            let Some(user_id) = state.caller(req) else {
                return unauthorized();
            };
            let id = id_segment(req, 2);
            match state
                .messages
                .iter_mut()
                .find(|m| Some(m.id) == id && m.receiver_id == user_id)
            {
                Some(msg) => {
                    msg.is_read = true;
                    reply(200, json!({ "status": "success" }))
                }
                None => reply(404, json!({ "detail": "Message not found" })),
            }
        })
        .await;

        self.mount("DELETE", path_regex(r"^/messages/\d+$"), |state, req| {
            let Some(user_id) = state.caller(req) else {
                return unauthorized();
            };
            let id = id_segment(req, 2);
            let before = state.messages.len();
            state
                .messages
                .retain(|m| !(Some(m.id) == id && (m.sender_id == user_id || m.receiver_id == user_id)));
            if state.messages.len() == before {
                return reply(404, json!({ "detail": "Message not found" }));
            }
            reply(200, json!({ "status": "success", "message": "Message deleted" }))
        })
        .await;
    }
}
