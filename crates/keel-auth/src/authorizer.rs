//! Request authorization.
//!
//! Methods fall into two fixed, disjoint sets. PUBLIC methods pass
//! immediately. PROTECTED methods must clear every step of a chain that
//! stops at the first failure:
//!
//! 1. wallet settings exist
//! 2. wallet initialized
//! 3. legal terms accepted
//! 4. wallet unlocked
//! 5. a live session exists
//! 6. a profile is present
//! 7. the origin's domain holds an unexpired grant with at least one account
//!
//! Anything else is an unknown method. [`evaluate`] is the pure decision
//! over an [`AuthSnapshot`]; [`RequestAuthorizer`] only gathers the
//! snapshot from the collaborator stores.

use std::fmt;
use std::sync::Arc;

use keel_core::{Clock, ErrorKind, ProviderRpcError};
use serde::Serialize;
use tracing::debug;

use crate::collaborators::{PermissionGrant, PermissionStore, SettingsStore, WalletSettings};
use crate::session::SessionAuthority;

/// Methods that need no authentication.
pub const PUBLIC_METHODS: &[&str] = &[
    "eth_chainId",
    "net_version",
    "eth_accounts",
    "eth_blockNumber",
    "eth_gasPrice",
    "eth_getBalance",
    "eth_getCode",
    "eth_getTransactionCount",
    "eth_getTransactionReceipt",
    "eth_call",
    "eth_estimateGas",
    "eth_getLogs",
];

/// Methods that need the full authorization chain.
pub const PROTECTED_METHODS: &[&str] = &[
    "eth_requestAccounts",
    "eth_sendTransaction",
    "eth_signTransaction",
    "eth_sign",
    "personal_sign",
    "eth_signTypedData",
    "eth_signTypedData_v3",
    "eth_signTypedData_v4",
    "wallet_addEthereumChain",
    "wallet_switchEthereumChain",
    "wallet_requestPermissions",
    "wallet_getPermissions",
    "wallet_revokePermissions",
];

/// Method classification.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MethodClass {
    /// No authentication required.
    Public,
    /// Full chain required.
    Protected,
    /// In neither set.
    Unknown,
}

/// Classify a method name.
pub fn classify(method: &str) -> MethodClass {
    if PUBLIC_METHODS.contains(&method) {
        MethodClass::Public
    } else if PROTECTED_METHODS.contains(&method) {
        MethodClass::Protected
    } else {
        MethodClass::Unknown
    }
}

/// Why a request was refused.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum DenialReason {
    /// No settings, or onboarding incomplete.
    NotInitialized,
    /// Terms not accepted.
    TermsNotAccepted,
    /// Vault locked.
    Locked,
    /// No live session.
    NoSession,
    /// No profile.
    NoProfile,
    /// Domain lacks a usable grant.
    OriginNotAuthorized,
    /// Method in neither set.
    UnknownMethod,
}

impl DenialReason {
    /// Reason text.
    pub fn as_str(self) -> &'static str {
        match self {
            Self::NotInitialized => "Wallet not initialized",
            Self::TermsNotAccepted => "Legal terms not accepted",
            Self::Locked => "Wallet is locked",
            Self::NoSession => "No active session",
            Self::NoProfile => "No valid profile found",
            Self::OriginNotAuthorized => "Origin not authorized for this method",
            Self::UnknownMethod => "Unknown method",
        }
    }

    /// Page-facing classification.
    pub fn kind(self) -> ErrorKind {
        match self {
            Self::OriginNotAuthorized => ErrorKind::PermissionDenied,
            Self::UnknownMethod => ErrorKind::UnknownMethod,
            Self::NotInitialized
            | Self::TermsNotAccepted
            | Self::Locked
            | Self::NoSession
            | Self::NoProfile => ErrorKind::AuthRequired,
        }
    }

    /// Page-facing error.
    pub fn to_error(self) -> ProviderRpcError {
        ProviderRpcError::new(self.kind(), self.as_str())
    }
}

impl fmt::Display for DenialReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl Serialize for DenialReason {
    fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

/// Authorization outcome.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Validation {
    /// Whether the request may proceed.
    pub is_valid: bool,
    /// Why not, when refused.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<DenialReason>,
    /// Whether every authentication step passed.
    pub is_authenticated: bool,
    /// Whether the origin's permission requirement is met.
    pub has_required_permissions: bool,
}

impl Validation {
    fn pass(is_authenticated: bool) -> Self {
        Self {
            is_valid: true,
            reason: None,
            is_authenticated,
            has_required_permissions: true,
        }
    }

    fn deny(reason: DenialReason, is_authenticated: bool) -> Self {
        Self {
            is_valid: false,
            reason: Some(reason),
            is_authenticated,
            has_required_permissions: false,
        }
    }
}

/// Everything [`evaluate`] looks at.
#[derive(Clone, Debug, Default)]
pub struct AuthSnapshot {
    /// Wallet flags.
    pub settings: Option<WalletSettings>,
    /// A live session exists.
    pub session_live: bool,
    /// A profile exists.
    pub has_profile: bool,
    /// Grant for the requesting domain.
    pub grant: Option<PermissionGrant>,
    /// Evaluation time, for grant expiry.
    pub now_ms: i64,
}

/// Decide whether `method` may run given `snapshot`.
pub fn evaluate(method: &str, snapshot: &AuthSnapshot) -> Validation {
    match classify(method) {
        MethodClass::Public => Validation::pass(false),
        MethodClass::Unknown => Validation::deny(DenialReason::UnknownMethod, false),
        MethodClass::Protected => {
            let Some(settings) = &snapshot.settings else {
                return Validation::deny(DenialReason::NotInitialized, false);
            };
            if !settings.init {
                return Validation::deny(DenialReason::NotInitialized, false);
            }
            if !settings.terms_agreed {
                return Validation::deny(DenialReason::TermsNotAccepted, false);
            }
            if settings.is_locked {
                return Validation::deny(DenialReason::Locked, false);
            }
            if !snapshot.session_live {
                return Validation::deny(DenialReason::NoSession, false);
            }
            if !snapshot.has_profile {
                return Validation::deny(DenialReason::NoProfile, false);
            }
            let permitted = snapshot
                .grant
                .as_ref()
                .is_some_and(|g| !g.is_expired(snapshot.now_ms) && !g.accounts.is_empty());
            if !permitted {
                return Validation::deny(DenialReason::OriginNotAuthorized, true);
            }
            Validation::pass(true)
        }
    }
}

/// Host name of `origin`; the origin itself when it does not parse.
pub fn extract_domain(origin: &str) -> String {
    url::Url::parse(origin)
        .ok()
        .and_then(|u| u.host_str().map(str::to_string))
        .unwrap_or_else(|| origin.to_string())
}

/// Gathers an [`AuthSnapshot`] and evaluates it.
pub struct RequestAuthorizer {
    settings: Arc<dyn SettingsStore>,
    permissions: Arc<dyn PermissionStore>,
    session: Arc<SessionAuthority>,
    clock: Arc<dyn Clock>,
}

impl RequestAuthorizer {
    /// Create an authorizer.
    pub fn new(
        settings: Arc<dyn SettingsStore>,
        permissions: Arc<dyn PermissionStore>,
        session: Arc<SessionAuthority>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            settings,
            permissions,
            session,
            clock,
        }
    }

    /// Authorize `method` for `origin`.
    pub async fn validate(&self, method: &str, origin: &str) -> Validation {
        if classify(method) != MethodClass::Protected {
            return evaluate(method, &AuthSnapshot::default());
        }

        let domain = extract_domain(origin);
        let snapshot = AuthSnapshot {
            settings: self.settings.wallet_settings().await,
            session_live: self.session.is_live(),
            has_profile: self.settings.has_profile().await,
            grant: self.permissions.get_permission(&domain).await,
            now_ms: self.clock.now_ms(),
        };
        let validation = evaluate(method, &snapshot);
        debug!(method, %domain, valid = validation.is_valid, reason = ?validation.reason, "authorized request");
        validation
    }
}

// ─────────────────────────────────────────────────────────────────────────────
// Tests
// ─────────────────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn ready_snapshot() -> AuthSnapshot {
        AuthSnapshot {
            settings: Some(WalletSettings::ready()),
            session_live: true,
            has_profile: true,
            grant: Some(PermissionGrant {
                domain: "dapp.test".into(),
                accounts: vec!["0xabc".into()],
                expiry: None,
            }),
            now_ms: 1_000,
        }
    }

    fn locked_snapshot() -> AuthSnapshot {
        let mut s = ready_snapshot();
        if let Some(settings) = s.settings.as_mut() {
            settings.is_locked = true;
        }
        s
    }

    #[test]
    fn sets_are_disjoint() {
        for m in PUBLIC_METHODS {
            assert!(!PROTECTED_METHODS.contains(m), "{m} in both sets");
        }
    }

    #[test]
    fn public_methods_pass_even_when_locked() {
        for m in PUBLIC_METHODS {
            let v = evaluate(m, &locked_snapshot());
            assert!(v.is_valid, "{m}");
            assert!(v.reason.is_none());
        }
        assert!(evaluate("eth_chainId", &AuthSnapshot::default()).is_valid);
    }

    #[test]
    fn protected_methods_fail_when_locked() {
        for m in PROTECTED_METHODS {
            let v = evaluate(m, &locked_snapshot());
            assert!(!v.is_valid, "{m}");
            assert_eq!(v.reason, Some(DenialReason::Locked));
        }
    }

    #[test]
    fn locked_send_transaction_result() {
        let v = evaluate("eth_sendTransaction", &locked_snapshot());
        assert_eq!(
            v,
            Validation {
                is_valid: false,
                reason: Some(DenialReason::Locked),
                is_authenticated: false,
                has_required_permissions: false,
            }
        );
        let json = serde_json::to_value(v).unwrap();
        assert_eq!(json["reason"], "Wallet is locked");
        assert_eq!(json["isAuthenticated"], false);
    }

    #[test]
    fn chain_short_circuits_in_order() {
        let mut s = ready_snapshot();
        s.settings = Some(WalletSettings {
            init: false,
            terms_agreed: false,
            is_locked: true,
        });
        s.session_live = false;
        assert_eq!(evaluate("personal_sign", &s).reason, Some(DenialReason::NotInitialized));

        s.settings = Some(WalletSettings {
            init: true,
            terms_agreed: false,
            is_locked: true,
        });
        assert_eq!(evaluate("personal_sign", &s).reason, Some(DenialReason::TermsNotAccepted));

        s.settings = Some(WalletSettings::ready());
        assert_eq!(evaluate("personal_sign", &s).reason, Some(DenialReason::NoSession));

        s.session_live = true;
        s.has_profile = false;
        assert_eq!(evaluate("personal_sign", &s).reason, Some(DenialReason::NoProfile));
    }

    #[test]
    fn missing_settings_is_not_initialized() {
        let s = AuthSnapshot {
            settings: None,
            ..ready_snapshot()
        };
        assert_eq!(evaluate("eth_sign", &s).reason, Some(DenialReason::NotInitialized));
    }

    #[test]
    fn grant_must_have_accounts_and_be_current() {
        let mut s = ready_snapshot();
        assert!(evaluate("eth_sendTransaction", &s).is_valid);

        s.grant = Some(PermissionGrant {
            domain: "dapp.test".into(),
            accounts: vec![],
            expiry: None,
        });
        let v = evaluate("eth_sendTransaction", &s);
        assert_eq!(v.reason, Some(DenialReason::OriginNotAuthorized));
        assert!(v.is_authenticated);
        assert!(!v.has_required_permissions);

        s.grant = Some(PermissionGrant {
            domain: "dapp.test".into(),
            accounts: vec!["0xabc".into()],
            expiry: Some(500),
        });
        assert_eq!(
            evaluate("eth_sendTransaction", &s).reason,
            Some(DenialReason::OriginNotAuthorized)
        );
    }

    #[test]
    fn unknown_methods_rejected() {
        let v = evaluate("eth_mine_bitcoin", &ready_snapshot());
        assert_eq!(v.reason, Some(DenialReason::UnknownMethod));
        assert_eq!(DenialReason::UnknownMethod.to_error().code, 4200);
    }

    #[test]
    fn denial_kinds() {
        assert_eq!(DenialReason::Locked.kind(), ErrorKind::AuthRequired);
        assert_eq!(DenialReason::OriginNotAuthorized.kind(), ErrorKind::PermissionDenied);
    }

    #[test]
    fn domain_extraction() {
        assert_eq!(extract_domain("https://dapp.test"), "dapp.test");
        assert_eq!(extract_domain("https://app.dapp.test:8443/path"), "app.dapp.test");
        assert_eq!(extract_domain("not a url"), "not a url");
    }

    #[tokio::test]
    async fn authorizer_reads_live_state() {
        use crate::collaborators::{MemoryPermissionStore, MemorySettingsStore, NoopIndicator, SessionBroadcaster};
        use crate::session::{SessionConfig, SessionSubject};
        use crate::token::TokenIssuer;
        use keel_core::ManualClock;
        use keel_store::MemoryStore;
        use std::time::Duration;

        struct Quiet;

        #[async_trait::async_trait]
        impl SessionBroadcaster for Quiet {
            async fn broadcast(&self, _kind: &str, _payload: serde_json::Value) {}
        }

        let clock = Arc::new(ManualClock::new(1_000));
        let settings = Arc::new(MemorySettingsStore::new(Some(WalletSettings::ready()), true));
        let permissions = Arc::new(MemoryPermissionStore::new());
        let session = Arc::new(SessionAuthority::new(
            SessionConfig::default(),
            TokenIssuer::new(b"k", Duration::from_secs(60)),
            clock.clone(),
            Arc::new(MemoryStore::new()),
            Arc::new(Quiet),
            Arc::new(NoopIndicator),
        ));
        let authorizer = RequestAuthorizer::new(settings.clone(), permissions.clone(), session.clone(), clock);

        let v = authorizer.validate("eth_sendTransaction", "https://dapp.test").await;
        assert_eq!(v.reason, Some(DenialReason::NoSession));

        let _ = session
            .start_session(SessionSubject {
                user_id: "u1".into(),
                username: "alice".into(),
                profile_id: "p1".into(),
                plan_level: "basic".into(),
            })
            .await
            .unwrap();
        permissions
            .grant(PermissionGrant {
                domain: "dapp.test".into(),
                accounts: vec!["0xabc".into()],
                expiry: None,
            })
            .await;
        assert!(authorizer.validate("eth_sendTransaction", "https://dapp.test").await.is_valid);

        settings.set_locked(true);
        let v = authorizer.validate("eth_sendTransaction", "https://dapp.test").await;
        assert_eq!(v.reason, Some(DenialReason::Locked));
        assert!(!v.is_authenticated);
        assert!(authorizer.validate("eth_chainId", "https://dapp.test").await.is_valid);
    }
}
