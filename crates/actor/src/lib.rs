//! A lightweight actor framework.
//!
//! An actor owns its state and handles messages one at a time on its own
//! task, which gives the single-threaded, event-loop-like execution model
//! the conversation controller relies on.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod error;
mod handle;
mod mailbox;
mod request;
mod scheduler;

pub use error::ActorDeadError;
pub use handle::Actor;
pub use mailbox::Message;
pub use request::Request;
