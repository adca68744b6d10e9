//! The data model and service boundary shared by every chat widget.
//!
//! This crate establishes the protocol the conversation controller speaks
//! with the two remote collaborators it depends on: the chat endpoint that
//! answers questions, and the session store that persists conversations.
//! Both are abstract here, so the controller can be driven by an HTTP
//! implementation in production and by scripted fakes in tests.
//!
//! Types in this crate don't define any behavior beyond trivial accessors,
//! instead they are the constraints that the implementors should adhere to.

#![deny(missing_docs)]

mod conversation;
mod error;
mod service;
mod topic;
mod wire;

pub use conversation::*;
pub use error::*;
pub use service::*;
pub use topic::*;
pub use wire::*;
