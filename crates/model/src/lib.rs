//! An abstraction layer for different LLMs.
//!
//! This crate establishes an unified protocol for the agent to interact
//! with various supported chat-completion backends, so that the agent can
//! seamlessly switch between them without modifying the core codebase.
//!
//! Besides the provider traits, the crate owns the conversation data
//! model ([`Message`] and friends), since every layer above speaks it.
//!
//! Types in this crate don't define any behavior, instead they are the
//! constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod error;
mod message;
mod provider;
mod request;
mod response;

pub use error::*;
pub use message::*;
pub use provider::*;
pub use request::*;
pub use response::*;
