//! Core logic of the chat widgets: the conversation controller, the
//! suggested-questions policy and the profile completion calculator.

#![deny(missing_docs)]

#[macro_use]
extern crate tracing;

mod config;
mod context;
mod controller;
mod failure;
pub mod profile;
mod service_client;
pub mod suggestions;

pub use config::{ControllerConfig, ControllerConfigBuilder};
pub use context::UserContext;
pub use controller::{
    Controller, ControllerBuilder, Operation, Rejected, Snapshot, Status,
};
pub use failure::Failure;
