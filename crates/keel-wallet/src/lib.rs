//! # keel-wallet
//!
//! In-process assembly of the Keel wallet: one [`WalletRuntime`] per
//! background process, one [`PageContext`] per hosting page.

#![deny(unsafe_code)]

pub mod bridge;
pub mod runtime;

pub use bridge::{RelayTransport, spawn_window_pump};
pub use runtime::{PageContext, RuntimeParts, STORE_FILE, WalletRuntime};
