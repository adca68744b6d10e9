use std::sync::Arc;

use tokio::sync::oneshot;
use tracing::Instrument;

use crate::mailbox::{Mailbox, MailboxParts};
use crate::request::Call;
use crate::scheduler::run_actor;
use crate::{ActorDeadError, Message, Request};

/// Handle to an actor.
///
/// The actor keeps running as long as any handle is alive, or until
/// [`Actor::stop`] is called. Its state is dropped on the actor task when
/// it stops.
pub struct Actor<S> {
    mailbox: Arc<Mailbox<S>>,
}

impl<S: Send + 'static> Actor<S> {
    /// Spawns a new actor with the specified state and an optional label.
    ///
    /// This must be called within a tokio runtime.
    pub fn spawn(state: S, label: Option<&str>) -> Self {
        let MailboxParts {
            mailbox,
            msg_rx,
            stop_rx,
        } = Mailbox::new();
        let mailbox = Arc::new(mailbox);
        tokio::spawn(
            run_actor(Arc::downgrade(&mailbox), state, msg_rx, stop_rx)
                .instrument(trace_span!("actor", label = label)),
        );
        Self { mailbox }
    }

    #[inline]
    pub(crate) fn from_mailbox(mailbox: Arc<Mailbox<S>>) -> Self {
        Self { mailbox }
    }

    /// Sends a message to the actor without waiting for it to be handled.
    #[inline]
    pub fn send<M: Message<S>>(&self, msg: M) -> Result<(), ActorDeadError> {
        self.mailbox.post(Box::new(msg))
    }

    /// Sends a request to the actor and waits for the reply.
    ///
    /// # Cancel safety
    ///
    /// The request is enqueued before the first poll, so it will be
    /// handled even if the returned future is dropped. Only the reply is
    /// lost in that case.
    pub fn call<R: Request<S>>(
        &self,
        request: R,
    ) -> impl Future<Output = Result<R::Reply, ActorDeadError>> + Send + 'static
    {
        let (reply_tx, reply_rx) = oneshot::channel();
        let posted = self.mailbox.post(Box::new(Call { request, reply_tx }));
        async move {
            posted?;
            reply_rx.await.map_err(|_| ActorDeadError)
        }
    }

    /// Asks the actor to stop.
    ///
    /// The actor is not guaranteed to stop immediately, but it will not
    /// handle further messages once it notices the request.
    #[inline]
    pub fn stop(&self) {
        self.mailbox.stop();
    }

    /// Returns `true` if the actor no longer accepts messages.
    #[inline]
    pub fn is_stopped(&self) -> bool {
        self.mailbox.is_closed()
    }
}

impl<S> Clone for Actor<S> {
    #[inline]
    fn clone(&self) -> Self {
        Self {
            mailbox: Arc::clone(&self.mailbox),
        }
    }
}
