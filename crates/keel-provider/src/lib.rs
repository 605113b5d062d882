//! # keel-provider
//!
//! The page-facing end of the Keel wallet.
//!
//! [`ProviderFacade`] implements the EIP-1193 `request` surface: it assigns
//! request ids, answers pure reads from a small cache, correlates responses
//! through a pending map with a per-request timeout, and re-emits provider
//! events. [`Announcer`] carries the EIP-6963 [`ProviderInfo`] handshake.

#![deny(unsafe_code)]

pub mod announce;
pub mod facade;

pub use announce::{ANNOUNCE_EVENT, Announcer, ProviderInfo, REQUEST_PROVIDER_EVENT};
pub use facade::{FacadeConfig, ProviderFacade, Transport};
