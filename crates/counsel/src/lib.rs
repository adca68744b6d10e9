//! Chat widgets for the admissions guidance client, assembled from the
//! conversation controller and the HTTP services.
//!
//! The crate includes a CLI tool for chatting in the terminal. And you can
//! also use it as a library to embed the widgets into your own host apps.

#![deny(missing_docs)]

mod widget;

pub use widget::{ChatWidget, ChatWidgetBuilder, UnknownWidgetKind, WidgetKind};

/// Re-exports of [`counsel_core`] crate.
pub mod core {
    pub use counsel_core::*;
}

/// Re-exports of [`counsel_http`] crate.
pub mod http {
    pub use counsel_http::*;
}
