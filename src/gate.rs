use serde::Serialize;
use std::{collections::HashMap, sync::Arc, time::Duration};
use subtle::ConstantTimeEq;
use tokio::{sync::Mutex, time::Instant};
use uuid::Uuid;

pub const SESSION_COOKIE: &str = "entry_session";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum FlashKind {
    Success,
    Error,
}

/// A message shown once on the next page render.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Flash {
    pub kind: FlashKind,
    pub message: String,
}

impl Flash {
    pub fn success(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Success,
            message: message.into(),
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            kind: FlashKind::Error,
            message: message.into(),
        }
    }
}

/// Per-browser state, loaded at the start of a request and saved back by the handler.
#[derive(Debug, Clone)]
pub struct SessionContext {
    pub id: Uuid,
    pub unlocked: bool,
    pub flash: Option<Flash>,
}

impl SessionContext {
    fn fresh() -> Self {
        Self {
            id: Uuid::new_v4(),
            unlocked: false,
            flash: None,
        }
    }

    pub fn cookie(&self) -> String {
        format!(
            "{SESSION_COOKIE}={}; Path=/; HttpOnly; SameSite=Lax",
            self.id
        )
    }
}

/// How long a session survives without being saved again.
pub const SESSION_IDLE_TIMEOUT: Duration = Duration::from_secs(12 * 60 * 60);

struct StoredSession {
    context: SessionContext,
    saved_at: Instant,
}

#[derive(Clone)]
pub struct SessionStore {
    sessions: Arc<Mutex<HashMap<Uuid, StoredSession>>>,
    idle_timeout: Duration,
}

impl Default for SessionStore {
    fn default() -> Self {
        Self::with_idle_timeout(SESSION_IDLE_TIMEOUT)
    }
}

impl SessionStore {
    pub fn with_idle_timeout(idle_timeout: Duration) -> Self {
        Self {
            sessions: Arc::default(),
            idle_timeout,
        }
    }

    /// Loads the session named by the cookie value, or starts a new locked one.
    pub async fn load(&self, cookie: Option<&str>) -> SessionContext {
        let Some(id) = cookie.and_then(|raw| Uuid::parse_str(raw).ok()) else {
            return SessionContext::fresh();
        };
        self.sessions
            .lock()
            .await
            .get(&id)
            .filter(|stored| stored.saved_at.elapsed() < self.idle_timeout)
            .map(|stored| stored.context.clone())
            .unwrap_or_else(SessionContext::fresh)
    }

    /// Stores `session` and drops every session idle past the timeout.
    pub async fn save(&self, session: &SessionContext) {
        let mut sessions = self.sessions.lock().await;
        sessions.retain(|_, stored| stored.saved_at.elapsed() < self.idle_timeout);
        sessions.insert(
            session.id,
            StoredSession {
                context: session.clone(),
                saved_at: Instant::now(),
            },
        );
    }

    pub async fn count(&self) -> usize {
        self.sessions.lock().await.len()
    }
}

/// Extracts the session id from a `Cookie` header value.
pub fn session_cookie_value(header: &str) -> Option<&str> {
    header.split(';').find_map(|pair| {
        let (name, value) = pair.trim().split_once('=')?;
        (name == SESSION_COOKIE).then_some(value)
    })
}

/// Single shared secret guarding the whole application.
pub struct AccessGate {
    secret: String,
}

impl AccessGate {
    pub fn new(secret: impl Into<String>) -> Self {
        Self {
            secret: secret.into(),
        }
    }

    pub fn check(&self, candidate: &str) -> bool {
        bool::from(self.secret.as_bytes().ct_eq(candidate.as_bytes()))
    }

    /// Applies one password entry to `session`. The entered value is consumed.
    pub fn unlock(&self, session: &mut SessionContext, entered: String) -> bool {
        let granted = self.check(&entered);
        drop(entered);
        session.unlocked = granted;
        if !granted {
            session.flash = Some(Flash::error("Password incorrect"));
        }
        granted
    }
}
