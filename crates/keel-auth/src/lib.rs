//! # keel-auth
//!
//! Authentication and authorization for the Keel background.
//!
//! - [`SessionAuthority`]: login/extend/activity/expiry/logout lifecycle with
//!   a bearer token per session and best-effort broadcast of transitions
//! - [`TokenIssuer`]: HS256 bearer tokens
//! - [`RequestAuthorizer`]: public/protected method gating over wallet state,
//!   session state, and origin permissions ([`evaluate`] is the pure core)
//! - [`validate_params`]: structural parameter checks
//! - Collaborator traits for the stores and hooks the background consumes

#![deny(unsafe_code)]

pub mod authorizer;
pub mod collaborators;
pub mod errors;
pub mod params;
pub mod session;
pub mod token;

pub use authorizer::{
    AuthSnapshot, DenialReason, MethodClass, RequestAuthorizer, Validation, classify, evaluate,
    extract_domain,
};
pub use collaborators::{
    AuthIndicator, MemoryPermissionStore, MemorySettingsStore, NoopIndicator, PermissionGrant,
    PermissionStore, SessionBroadcaster, SettingsStore, WalletSettings,
};
pub use errors::AuthError;
pub use params::{ParamError, validate_params};
pub use session::{
    ActivityKind, LogoutReason, Session, SessionAuthority, SessionBroadcast, SessionConfig,
    SessionObserver, SessionPhase, SessionSubject,
};
pub use token::{TokenClaims, TokenIssuer};
