//! Session lifecycle authority.
//!
//! ```text
//!            start                check (lead time)        check (expiresAt)
//!   NONE ───────────▶ ACTIVE ───────────────────▶ WARNING ─────────────────▶ EXPIRED
//!    ▲                  │  ▲        extend            │                         │
//!    │                  │  └──────────────────────────┘                         │
//!    └──────────────────┴──────────── logout (explicit/idle/suspend) ───────────┘
//! ```
//!
//! Exactly one session is live at a time. Every transition is mirrored to
//! durable storage and announced through the [`SessionBroadcaster`] on a
//! best-effort basis. The warning fires at most once per expiry window,
//! guarded by `warning_shown`. Logout is idempotent whatever triggered it.

use std::sync::Arc;
use std::time::Duration;

use keel_core::Clock;
use keel_settings::SessionSettings;
use keel_store::KeyValueStore;
use parking_lot::{Mutex, RwLock};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::collaborators::{AuthIndicator, SessionBroadcaster};
use crate::errors::AuthError;
use crate::token::{TokenClaims, TokenIssuer};

/// Storage key of the live session snapshot.
pub const SESSION_KEY: &str = "keel_session";
/// Broadcast kind for a new session.
pub const LOGIN_EVENT: &str = "SESSION_LOGIN";
/// Broadcast kind for an extension.
pub const EXTENDED_EVENT: &str = "SESSION_EXTENDED";
/// Broadcast kind for the expiry warning.
pub const WARNING_EVENT: &str = "SESSION_WARNING";
/// Broadcast kind for any logout.
pub const LOGOUT_EVENT: &str = "SESSION_LOGOUT";

// ─────────────────────────────────────────────────────────────────────────────
// Types
// ─────────────────────────────────────────────────────────────────────────────

/// Who is logging in.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionSubject {
    /// User id.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Profile id.
    pub profile_id: String,
    /// Plan tier.
    pub plan_level: String,
}

/// Lifecycle phase.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum SessionPhase {
    /// No session.
    None,
    /// Live, outside the warning window.
    Active,
    /// Live, warning already fired.
    Warning,
    /// Ran past `expires_at`; token cleared.
    Expired,
}

/// What ended a session.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum LogoutReason {
    /// User or caller asked.
    Explicit,
    /// No qualifying activity for too long.
    Idle,
    /// Reached `expires_at`.
    Timeout,
    /// Host process is being suspended.
    Suspend,
}

/// Input and browser events that count as user activity.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ActivityKind {
    /// Pointer button pressed.
    MouseDown,
    /// Key pressed.
    KeyDown,
    /// Scrolled.
    Scroll,
    /// Touch started.
    TouchStart,
    /// Pointer moved.
    MouseMove,
    /// The wallet's tab became active.
    TabActivated,
    /// The wallet's window gained focus.
    WindowFocused,
}

impl ActivityKind {
    /// Map a DOM or browser event name.
    pub fn from_event_name(name: &str) -> Option<Self> {
        match name {
            "mousedown" => Some(Self::MouseDown),
            "keydown" => Some(Self::KeyDown),
            "scroll" => Some(Self::Scroll),
            "touchstart" => Some(Self::TouchStart),
            "mousemove" => Some(Self::MouseMove),
            "tabActivated" => Some(Self::TabActivated),
            "windowFocused" => Some(Self::WindowFocused),
            _ => None,
        }
    }
}

/// The live session.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Session {
    /// Session id.
    pub session_id: String,
    /// User id.
    pub user_id: String,
    /// Display name.
    pub username: String,
    /// Profile id.
    pub profile_id: String,
    /// Plan tier.
    pub plan_level: String,
    /// Bearer token.
    pub token: Option<String>,
    /// Expiry, Unix milliseconds.
    pub expires_at: i64,
    /// Last qualifying activity, Unix milliseconds.
    pub last_activity: i64,
    /// Whether the warning already fired in this window.
    pub warning_shown: bool,
    /// Login time, Unix milliseconds.
    pub started_at: i64,
}

impl Session {
    fn subject(&self) -> SessionSubject {
        SessionSubject {
            user_id: self.user_id.clone(),
            username: self.username.clone(),
            profile_id: self.profile_id.clone(),
            plan_level: self.plan_level.clone(),
        }
    }
}

/// Payload of every session broadcast.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionBroadcast {
    /// Current token, `None` after logout.
    pub token: Option<String>,
    /// User the transition concerns.
    pub user_id: Option<String>,
    /// Whether a session is live after the transition.
    pub authenticated: bool,
    /// Expiry after the transition.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<i64>,
    /// What ended the session.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub reason: Option<LogoutReason>,
}

impl SessionBroadcast {
    fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}

/// Timing configuration.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SessionConfig {
    /// Lifetime from start or extension.
    pub timeout: Duration,
    /// Lead time before expiry at which the warning fires.
    pub warning_lead: Duration,
    /// Inactivity that triggers an idle logout.
    pub max_inactivity: Duration,
    /// Extend on activity inside the warning window.
    pub auto_extend_on_activity: bool,
    /// Checker period.
    pub check_interval: Duration,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self::from_settings(&SessionSettings::default())
    }
}

impl SessionConfig {
    /// Build from settings.
    pub fn from_settings(settings: &SessionSettings) -> Self {
        Self {
            timeout: Duration::from_secs(settings.timeout_minutes * 60),
            warning_lead: Duration::from_secs(settings.warning_minutes * 60),
            max_inactivity: Duration::from_secs(settings.max_inactivity_minutes * 60),
            auto_extend_on_activity: settings.auto_extend_on_activity,
            check_interval: Duration::from_millis(settings.check_interval_ms.max(1)),
        }
    }
}

fn ms(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

/// Hooks fired on lifecycle transitions.
pub trait SessionObserver: Send + Sync {
    /// The warning window was entered; fires once per window.
    fn on_warning(&self, _remaining_ms: i64) {}
    /// The session ended.
    fn on_expired(&self, _reason: LogoutReason) {}
    /// The session was extended.
    fn on_extended(&self, _expires_at: i64) {}
}

struct SessionSlot {
    phase: SessionPhase,
    session: Option<Session>,
}

enum Tick {
    Idle,
    Warn { remaining_ms: i64, session: Session },
    Expire,
    IdleLogout,
}

// ─────────────────────────────────────────────────────────────────────────────
// Authority
// ─────────────────────────────────────────────────────────────────────────────

/// Owner of the live session.
pub struct SessionAuthority {
    config: SessionConfig,
    tokens: TokenIssuer,
    clock: Arc<dyn Clock>,
    store: Arc<dyn KeyValueStore>,
    broadcaster: Arc<dyn SessionBroadcaster>,
    indicator: Arc<dyn AuthIndicator>,
    slot: Mutex<SessionSlot>,
    observer: RwLock<Option<Arc<dyn SessionObserver>>>,
}

impl SessionAuthority {
    /// Create an authority with no session.
    pub fn new(
        config: SessionConfig,
        tokens: TokenIssuer,
        clock: Arc<dyn Clock>,
        store: Arc<dyn KeyValueStore>,
        broadcaster: Arc<dyn SessionBroadcaster>,
        indicator: Arc<dyn AuthIndicator>,
    ) -> Self {
        Self {
            config,
            tokens,
            clock,
            store,
            broadcaster,
            indicator,
            slot: Mutex::new(SessionSlot {
                phase: SessionPhase::None,
                session: None,
            }),
            observer: RwLock::new(None),
        }
    }

    /// Register the lifecycle observer, replacing any previous one.
    pub fn set_observer(&self, observer: Arc<dyn SessionObserver>) {
        *self.observer.write() = Some(observer);
    }

    fn observer(&self) -> Option<Arc<dyn SessionObserver>> {
        self.observer.read().clone()
    }

    /// Timing configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Current phase.
    pub fn phase(&self) -> SessionPhase {
        self.slot.lock().phase
    }

    /// Copy of the live session.
    pub fn session(&self) -> Option<Session> {
        self.slot.lock().session.clone()
    }

    /// Current bearer token.
    pub fn token(&self) -> Option<String> {
        self.slot.lock().session.as_ref().and_then(|s| s.token.clone())
    }

    /// Whether a session is live and not past its expiry.
    pub fn is_live(&self) -> bool {
        let now = self.clock.now_ms();
        let slot = self.slot.lock();
        matches!(slot.phase, SessionPhase::Active | SessionPhase::Warning)
            && slot.session.as_ref().is_some_and(|s| now < s.expires_at)
    }

    /// Log in, replacing any live session. Returns the bearer token.
    pub async fn start_session(&self, subject: SessionSubject) -> Result<String, AuthError> {
        let now = self.clock.now_ms();
        let session_id = format!("session-{}", uuid::Uuid::now_v7().simple());
        let token = self.tokens.issue(&subject, &session_id, now)?;

        let session = Session {
            session_id: session_id.clone(),
            user_id: subject.user_id,
            username: subject.username,
            profile_id: subject.profile_id,
            plan_level: subject.plan_level,
            token: Some(token.clone()),
            expires_at: now.saturating_add(ms(self.config.timeout)),
            last_activity: now,
            warning_shown: false,
            started_at: now,
        };
        {
            let mut slot = self.slot.lock();
            slot.session = Some(session.clone());
            slot.phase = SessionPhase::Active;
        }

        self.persist(&session).await;
        self.indicator.set_authenticated(true);
        info!(session_id = %session_id, user_id = %session.user_id, expires_at = session.expires_at, "session started");
        self.broadcaster
            .broadcast(
                LOGIN_EVENT,
                SessionBroadcast {
                    token: Some(token.clone()),
                    user_id: Some(session.user_id.clone()),
                    authenticated: true,
                    expires_at: Some(session.expires_at),
                    reason: None,
                }
                .to_value(),
            )
            .await;
        Ok(token)
    }

    /// Push expiry to `now + extra`. Only valid while ACTIVE or WARNING;
    /// otherwise nothing changes and `None` is returned.
    pub async fn extend_session(&self, extra: Duration) -> Option<i64> {
        let now = self.clock.now_ms();
        let session = {
            let mut slot = self.slot.lock();
            if !matches!(slot.phase, SessionPhase::Active | SessionPhase::Warning) {
                debug!(phase = ?slot.phase, "extend ignored, no live session");
                return None;
            }
            let session = slot.session.as_mut()?;
            session.expires_at = now.saturating_add(ms(extra));
            session.last_activity = now;
            session.warning_shown = false;

            let token_expiry = session
                .token
                .as_deref()
                .and_then(|t| self.tokens.expiry_ms(t))
                .unwrap_or(0);
            if token_expiry < session.expires_at {
                match self.tokens.issue(&session.subject(), &session.session_id, now) {
                    Ok(token) => session.token = Some(token),
                    Err(e) => warn!(error = %e, "token reissue failed, keeping current token"),
                }
            }
            let snapshot = session.clone();
            slot.phase = SessionPhase::Active;
            snapshot
        };

        self.persist(&session).await;
        if let Some(observer) = self.observer() {
            observer.on_extended(session.expires_at);
        }
        debug!(session_id = %session.session_id, expires_at = session.expires_at, "session extended");
        self.broadcaster
            .broadcast(
                EXTENDED_EVENT,
                SessionBroadcast {
                    token: session.token.clone(),
                    user_id: Some(session.user_id.clone()),
                    authenticated: true,
                    expires_at: Some(session.expires_at),
                    reason: None,
                }
                .to_value(),
            )
            .await;
        Some(session.expires_at)
    }

    /// Note qualifying activity. Inside the warning window, before the
    /// warning fired, this extends the session when auto-extend is on.
    pub async fn record_activity(&self, kind: ActivityKind) {
        let now = self.clock.now_ms();
        let extend = {
            let mut slot = self.slot.lock();
            let phase = slot.phase;
            let Some(session) = slot.session.as_mut() else {
                return;
            };
            if !matches!(phase, SessionPhase::Active | SessionPhase::Warning) {
                return;
            }
            session.last_activity = now;
            self.config.auto_extend_on_activity
                && phase == SessionPhase::Active
                && !session.warning_shown
                && session.expires_at - now <= ms(self.config.warning_lead)
        };
        if extend {
            debug!(?kind, "activity inside warning window, extending");
            let _ = self.extend_session(self.config.timeout).await;
        }
    }

    /// One checker pass: expire, idle out, or fire the warning.
    pub async fn check(&self) -> SessionPhase {
        let now = self.clock.now_ms();
        let tick = {
            let mut slot = self.slot.lock();
            let Some(session) = slot.session.as_mut() else {
                return slot.phase;
            };
            if now >= session.expires_at {
                Tick::Expire
            } else if now - session.last_activity >= ms(self.config.max_inactivity) {
                Tick::IdleLogout
            } else if !session.warning_shown
                && session.expires_at - now <= ms(self.config.warning_lead)
            {
                session.warning_shown = true;
                let remaining_ms = session.expires_at - now;
                let session = session.clone();
                slot.phase = SessionPhase::Warning;
                Tick::Warn {
                    remaining_ms,
                    session,
                }
            } else {
                Tick::Idle
            }
        };

        match tick {
            Tick::Idle => {}
            Tick::Expire => self.end(LogoutReason::Timeout).await,
            Tick::IdleLogout => self.end(LogoutReason::Idle).await,
            Tick::Warn {
                remaining_ms,
                session,
            } => {
                self.persist(&session).await;
                info!(session_id = %session.session_id, remaining_ms, "session expiring soon");
                if let Some(observer) = self.observer() {
                    observer.on_warning(remaining_ms);
                }
                self.broadcaster
                    .broadcast(
                        WARNING_EVENT,
                        SessionBroadcast {
                            token: session.token.clone(),
                            user_id: Some(session.user_id.clone()),
                            authenticated: true,
                            expires_at: Some(session.expires_at),
                            reason: None,
                        }
                        .to_value(),
                    )
                    .await;
            }
        }
        self.phase()
    }

    /// Run [`check`](Self::check) every `check_interval` until cancelled.
    /// The first pass runs immediately.
    pub fn spawn_checker(self: &Arc<Self>, cancel: CancellationToken) -> JoinHandle<()> {
        let this = Arc::clone(self);
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(this.config.check_interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                tokio::select! {
                    () = cancel.cancelled() => {
                        debug!("session checker stopped");
                        break;
                    }
                    _ = ticker.tick() => {
                        let _ = this.check().await;
                    }
                }
            }
        })
    }

    /// End the session for `reason`. Safe to call repeatedly.
    pub async fn logout(&self, reason: LogoutReason) {
        self.end(reason).await;
    }

    /// End the session because the host is suspending.
    pub async fn suspend(&self) {
        self.end(LogoutReason::Suspend).await;
    }

    async fn end(&self, reason: LogoutReason) {
        let ended = {
            let mut slot = self.slot.lock();
            match slot.session.take() {
                Some(session) => {
                    slot.phase = if reason == LogoutReason::Timeout {
                        SessionPhase::Expired
                    } else {
                        SessionPhase::None
                    };
                    Some(session)
                }
                None => {
                    if reason != LogoutReason::Timeout {
                        slot.phase = SessionPhase::None;
                    }
                    None
                }
            }
        };
        let Some(session) = ended else {
            return;
        };

        if let Err(e) = self.store.remove(SESSION_KEY).await {
            warn!(error = %e, "failed to clear persisted session");
        }
        self.indicator.set_authenticated(false);
        info!(session_id = %session.session_id, ?reason, "session ended");
        if let Some(observer) = self.observer() {
            observer.on_expired(reason);
        }
        self.broadcaster
            .broadcast(
                LOGOUT_EVENT,
                SessionBroadcast {
                    token: None,
                    user_id: Some(session.user_id),
                    authenticated: false,
                    expires_at: None,
                    reason: Some(reason),
                }
                .to_value(),
            )
            .await;
    }

    /// Reload a persisted session after a restart. Expired or unreadable
    /// snapshots are discarded.
    pub async fn restore(&self) -> SessionPhase {
        let now = self.clock.now_ms();
        let stored = match self.store.get(SESSION_KEY).await {
            Ok(Some(value)) => value,
            Ok(None) => return self.phase(),
            Err(e) => {
                warn!(error = %e, "failed to read persisted session");
                return self.phase();
            }
        };

        match serde_json::from_value::<Session>(stored) {
            Ok(mut session) if session.expires_at > now => {
                session.last_activity = now;
                let near_expiry = session.expires_at - now <= ms(self.config.warning_lead);
                let phase = if session.warning_shown {
                    SessionPhase::Warning
                } else {
                    SessionPhase::Active
                };
                info!(session_id = %session.session_id, expires_at = session.expires_at, "session restored");
                {
                    let mut slot = self.slot.lock();
                    slot.session = Some(session);
                    slot.phase = phase;
                }
                self.indicator.set_authenticated(true);
                if near_expiry && self.config.auto_extend_on_activity {
                    let _ = self.extend_session(self.config.timeout).await;
                }
            }
            Ok(_) => {
                debug!("persisted session already expired, discarding");
                if let Err(e) = self.store.remove(SESSION_KEY).await {
                    warn!(error = %e, "failed to clear expired session");
                }
            }
            Err(e) => {
                warn!(error = %e, "persisted session unreadable, discarding");
                if let Err(e) = self.store.remove(SESSION_KEY).await {
                    warn!(error = %e, "failed to clear unreadable session");
                }
            }
        }
        self.phase()
    }

    /// Verify `token` and that it belongs to the live session.
    pub fn verify_token(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let claims = self.tokens.verify(token, self.clock.now_ms())?;
        let live = self.is_live()
            && self
                .slot
                .lock()
                .session
                .as_ref()
                .is_some_and(|s| s.session_id == claims.sid);
        if !live {
            return Err(AuthError::TokenInvalidOrExpired(
                "session is no longer live".to_string(),
            ));
        }
        Ok(claims)
    }

    /// Exchange the current token for a fresh one. No refresh backend is
    /// wired, so this always reports the capability as unavailable.
    pub async fn refresh_token(&self) -> Result<String, AuthError> {
        Err(AuthError::NotAvailable("token refresh"))
    }

    async fn persist(&self, session: &Session) {
        let value = match serde_json::to_value(session) {
            Ok(v) => v,
            Err(e) => {
                warn!(error = %e, "failed to serialize session");
                return;
            }
        };
        if let Err(e) = self.store.set(SESSION_KEY, value).await {
            warn!(error = %e, "failed to persist session");
        }
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────
