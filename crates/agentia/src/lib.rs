//! An out-of-the-box agent with a few built-in plugins.
//!
//! The crate includes a CLI tool for chatting in the terminal. You can also
//! use it as a library, adding [`plugins::with_builtin_plugins`] to your own
//! [`AgentBuilder`](agentia_core::AgentBuilder).

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

pub mod plugins;

/// Re-exports of [`agentia_core`] crate.
pub mod core {
    pub use agentia_core::*;
}
