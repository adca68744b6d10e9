use counsel_actor::Actor;
use counsel_model::{ChatEndpoint, SessionStore};

use super::Controller;
use super::state::ControllerState;
use crate::service_client::{ChatClient, StoreClient};
use crate::{ControllerConfig, UserContext};

/// [`Controller`] builder.
pub struct ControllerBuilder {
    chat: ChatClient,
    store: StoreClient,
    user: UserContext,
    config: ControllerConfig,
}

impl ControllerBuilder {
    /// Creates a new builder with the services the controller talks to,
    /// and the user it acts for.
    #[inline]
    pub fn new<E, S>(endpoint: E, store: S, user: UserContext) -> Self
    where
        E: ChatEndpoint + 'static,
        S: SessionStore + 'static,
    {
        Self {
            chat: ChatClient::new(endpoint),
            store: StoreClient::new(store),
            user,
            config: ControllerConfig::default(),
        }
    }

    /// Replaces the default configuration.
    #[inline]
    pub fn with_config(mut self, config: ControllerConfig) -> Self {
        self.config = config;
        self
    }

    /// Builds the controller.
    ///
    /// This must be called within a tokio runtime.
    pub fn build(self) -> Controller {
        let Self {
            chat,
            store,
            user,
            config,
        } = self;
        let (state, snapshot_rx) =
            ControllerState::new(chat, store, user, config);
        Controller {
            handle: Actor::spawn(state, Some("controller")),
            snapshot_rx,
        }
    }
}
