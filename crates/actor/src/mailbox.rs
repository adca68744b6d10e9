use std::fmt::Debug;

use tokio::sync::{mpsc, watch};

use crate::{Actor, ActorDeadError};

/// Type-erased form of a message, as stored in the mailbox.
pub trait Envelope<S>: Send + Debug + 'static {
    fn deliver(self: Box<Self>, state: &mut S, handle: &Actor<S>);
}

/// The message that an actor can handle.
///
/// Messages are handled one at a time, in the order they were sent, with
/// exclusive access to the actor's state. Handlers must not block; long
/// running work should be spawned and report back with another message.
pub trait Message<S>: Send + Debug + 'static {
    /// Handles the message with mutable access to the actor's state.
    fn handle(self, state: &mut S, handle: &Actor<S>);
}

impl<S, M: Message<S>> Envelope<S> for M {
    #[inline]
    fn deliver(self: Box<Self>, state: &mut S, handle: &Actor<S>) {
        (*self).handle(state, handle)
    }
}

pub struct MailboxParts<S> {
    pub mailbox: Mailbox<S>,
    pub msg_rx: mpsc::UnboundedReceiver<Box<dyn Envelope<S>>>,
    pub stop_rx: watch::Receiver<bool>,
}

pub struct Mailbox<S> {
    msg_tx: mpsc::UnboundedSender<Box<dyn Envelope<S>>>,
    stop_tx: watch::Sender<bool>,
}

impl<S: Send + 'static> Mailbox<S> {
    #[inline]
    pub fn new() -> MailboxParts<S> {
        let (msg_tx, msg_rx) = mpsc::unbounded_channel();
        let (stop_tx, stop_rx) = watch::channel(false);
        MailboxParts {
            mailbox: Mailbox { msg_tx, stop_tx },
            msg_rx,
            stop_rx,
        }
    }

    #[inline]
    pub fn post(&self, msg: Box<dyn Envelope<S>>) -> Result<(), ActorDeadError> {
        self.msg_tx.send(msg).map_err(|_| ActorDeadError)
    }

    #[inline]
    pub fn stop(&self) {
        self.stop_tx.send(true).ok();
    }

    #[inline]
    pub fn is_closed(&self) -> bool {
        self.msg_tx.is_closed()
    }
}
