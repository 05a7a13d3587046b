use std::sync::{Arc, Mutex, PoisonError};

use axum::extract::{FromRequestParts, Request, State};
use axum::http::request::Parts;
use axum::http::{HeaderValue, StatusCode, header};
use axum::middleware::Next;
use axum::response::Response;
use jsonwebtoken::{DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

pub const SESSION_COOKIE: &str = "modkit_session";
const SESSION_TTL_SECS: i64 = 7 * 24 * 60 * 60;

/// State for the session layer; present only when a signing secret is
/// configured.
#[derive(Clone)]
pub struct SessionConfig {
    secret: String,
}

impl SessionConfig {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }
}

#[derive(Debug, Default, Clone, Serialize, Deserialize)]
pub struct SessionData {
    #[serde(default)]
    pub values: serde_json::Map<String, serde_json::Value>,
    #[serde(default)]
    pub flash: Vec<FlashMessage>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlashMessage {
    pub kind: String,
    pub message: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct SessionClaims {
    exp: usize,
    #[serde(default)]
    data: SessionData,
}

/// Per-request session handle, stored in request extensions by the session
/// layer and extractable in handlers.
#[derive(Clone, Default)]
pub struct Session(Arc<Mutex<SessionData>>);

impl Session {
    fn from_data(data: SessionData) -> Self {
        Self(Arc::new(Mutex::new(data)))
    }

    pub fn get(&self, key: &str) -> Option<serde_json::Value> {
        self.lock().values.get(key).cloned()
    }

    pub fn set(&self, key: impl Into<String>, value: serde_json::Value) {
        self.lock().values.insert(key.into(), value);
    }

    /// Queues a one-shot message for the next read.
    pub fn flash(&self, kind: impl Into<String>, message: impl Into<String>) {
        self.lock().flash.push(FlashMessage {
            kind: kind.into(),
            message: message.into(),
        });
    }

    /// Drains the queued flash messages.
    pub fn take_flash(&self) -> Vec<FlashMessage> {
        std::mem::take(&mut self.lock().flash)
    }

    fn snapshot(&self) -> SessionData {
        self.lock().clone()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, SessionData> {
        self.0.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[axum::async_trait]
impl<S> FromRequestParts<S> for Session
where
    S: Send + Sync,
{
    type Rejection = StatusCode;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        parts
            .extensions
            .get::<Session>()
            .cloned()
            .ok_or(StatusCode::INTERNAL_SERVER_ERROR)
    }
}

/// Session + flash support as a middleware layer: decodes the signed session
/// cookie on the way in, re-signs and sets it on the way out.
pub async fn session_middleware(
    State(cfg): State<SessionConfig>,
    mut request: Request,
    next: Next,
) -> Response {
    let data = request
        .headers()
        .get(header::COOKIE)
        .and_then(|value| value.to_str().ok())
        .and_then(|raw| cookie_value(raw, SESSION_COOKIE))
        .and_then(|token| decode_session(&cfg.secret, token))
        .unwrap_or_default();

    let session = Session::from_data(data);
    request.extensions_mut().insert(session.clone());

    let mut response = next.run(request).await;

    if let Ok(token) = encode_session(&cfg.secret, session.snapshot()) {
        let cookie = format!("{SESSION_COOKIE}={token}; Path=/; HttpOnly; SameSite=Lax");
        if let Ok(value) = HeaderValue::from_str(&cookie) {
            response.headers_mut().append(header::SET_COOKIE, value);
        }
    }
    response
}

fn cookie_value<'a>(raw: &'a str, name: &str) -> Option<&'a str> {
    raw.split(';')
        .filter_map(|pair| pair.trim().split_once('='))
        .find(|(key, _)| *key == name)
        .map(|(_, value)| value)
}

fn decode_session(secret: &str, token: &str) -> Option<SessionData> {
    jsonwebtoken::decode::<SessionClaims>(
        token,
        &DecodingKey::from_secret(secret.as_bytes()),
        &Validation::default(),
    )
    .ok()
    .map(|decoded| decoded.claims.data)
}

fn encode_session(secret: &str, data: SessionData) -> jsonwebtoken::errors::Result<String> {
    let exp = (chrono::Utc::now().timestamp() + SESSION_TTL_SECS) as usize;
    jsonwebtoken::encode(
        &Header::default(),
        &SessionClaims { exp, data },
        &EncodingKey::from_secret(secret.as_bytes()),
    )
}
