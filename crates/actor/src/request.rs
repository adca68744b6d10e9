use std::fmt::{self, Debug};

use tokio::sync::oneshot;

use crate::{Actor, Message};

/// A message that produces a reply for the sender.
///
/// Use [`Actor::call`] to send a request and wait for its reply.
pub trait Request<S>: Send + Debug + 'static {
    /// The type of the reply.
    type Reply: Send + 'static;

    /// Handles the request with mutable access to the actor's state.
    fn handle(self, state: &mut S, handle: &Actor<S>) -> Self::Reply;
}

pub(crate) struct Call<R, T> {
    pub request: R,
    pub reply_tx: oneshot::Sender<T>,
}

impl<R: Debug, T> Debug for Call<R, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Call")
            .field("request", &self.request)
            .finish_non_exhaustive()
    }
}

impl<S, R, T> Message<S> for Call<R, T>
where
    R: Request<S, Reply = T>,
    T: Send + 'static,
{
    #[inline]
    fn handle(self, state: &mut S, handle: &Actor<S>) {
        let reply = self.request.handle(state, handle);
        // The caller may have given up waiting.
        self.reply_tx.send(reply).ok();
    }
}
