mod builder;
mod state;
#[cfg(test)]
mod tests;
mod writes;

use std::error::Error;
use std::fmt::{self, Display};

use counsel_actor::{Actor, ActorDeadError};
use counsel_model::{Conversation, ConversationSummary, Topic};
use tokio::sync::watch;

pub use builder::ControllerBuilder;
use state::{
    ControllerState, LoadConversation, OpenTopic, RefreshHistory, Remove,
    Rename, Retry, SendText, StartNew,
};

use crate::Failure;

/// An operation that holds the controller while it talks to a remote
/// service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Operation {
    /// Waiting for an answer.
    Sending,
    /// Loading a saved conversation.
    Loading,
    /// Saving a new title.
    Renaming,
    /// Deleting a saved conversation.
    Removing,
}

/// What the controller is doing.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum Status {
    /// Ready for the next operation.
    #[default]
    Idle,
    /// An operation is in flight; other gated operations are rejected.
    Pending(Operation),
    /// The last question failed. The failure notice is shown as the last
    /// message, and [`Controller::retry`] can ask the question again.
    Failed(Failure),
}

/// Why a controller operation was not started.
///
/// Rejected operations have no effect at all.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum Rejected {
    /// The text or title is blank.
    EmptyInput,
    /// The conversation identifier is blank.
    MissingIdentifier,
    /// No topic has been opened.
    NoTopic,
    /// Another operation is in flight.
    Busy(Operation),
    /// There is no failed question to retry.
    NothingToRetry,
    /// The controller has stopped.
    Stopped,
}

impl Display for Rejected {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::EmptyInput => write!(f, "input is empty"),
            Self::MissingIdentifier => write!(f, "conversation id is empty"),
            Self::NoTopic => write!(f, "no topic is open"),
            Self::Busy(op) => write!(f, "busy with {op:?}"),
            Self::NothingToRetry => write!(f, "nothing to retry"),
            Self::Stopped => write!(f, "the controller has stopped"),
        }
    }
}

impl Error for Rejected {}

impl From<ActorDeadError> for Rejected {
    #[inline]
    fn from(_: ActorDeadError) -> Self {
        Self::Stopped
    }
}

/// An immutable view of the controller state, published after every
/// change.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Snapshot {
    /// The open topic.
    pub topic: Option<Topic>,
    /// The active conversation.
    pub conversation: Conversation,
    /// What the controller is doing.
    pub status: Status,
    /// Saved conversations of the open topic, most recent first.
    pub summaries: Vec<ConversationSummary>,
    /// Questions to offer next to the input.
    pub suggestions: Vec<String>,
    /// Number of session store writes not yet finished.
    pub pending_writes: usize,
}

impl Snapshot {
    /// Returns `true` if a gated operation is in flight.
    #[inline]
    pub fn is_pending(&self) -> bool {
        matches!(self.status, Status::Pending(_))
    }

    /// Returns `true` if nothing is in flight, including writes.
    #[inline]
    pub fn is_settled(&self) -> bool {
        !self.is_pending() && self.pending_writes == 0
    }
}

/// The conversation controller of one chat widget.
///
/// The controller owns the active conversation and talks to the chat
/// endpoint and the session store on its behalf. All state changes happen
/// on a dedicated actor task, one at a time. Methods return as soon as the
/// operation has been started; observe [`Snapshot`]s to follow its
/// progress.
///
/// Only one operation that talks to a remote service for the active
/// conversation can be in flight. While it is, `send`, `select_suggestion`,
/// `retry`, `load_conversation`, `rename` and `remove` are rejected with
/// [`Rejected::Busy`]. [`Controller::open`] and [`Controller::start_new`]
/// are always accepted and abandon the operation in flight.
///
/// The controller stops when the last clone is dropped and every
/// background write has finished, or when [`Controller::close`] is called.
#[derive(Clone)]
pub struct Controller {
    handle: Actor<ControllerState>,
    snapshot_rx: watch::Receiver<Snapshot>,
}

impl Controller {
    /// Opens a topic with a fresh conversation, and fetches its saved
    /// conversations in the background.
    pub async fn open(&self, topic: Topic) -> Result<(), Rejected> {
        self.handle.call(OpenTopic(topic)).await?;
        Ok(())
    }

    /// Asks a question.
    ///
    /// The question shows up in the conversation right away. Once the
    /// answer arrives the conversation is saved in the background.
    pub async fn send<S: Into<String>>(&self, text: S) -> Result<(), Rejected> {
        self.handle.call(SendText(text.into())).await?
    }

    /// Asks one of the offered questions. Same as [`Controller::send`].
    #[inline]
    pub async fn select_suggestion<S: Into<String>>(
        &self,
        text: S,
    ) -> Result<(), Rejected> {
        self.send(text).await
    }

    /// Asks the last failed question again.
    pub async fn retry(&self) -> Result<(), Rejected> {
        self.handle.call(Retry).await?
    }

    /// Replaces the active conversation with a saved one.
    ///
    /// If loading fails, the active conversation is kept.
    pub async fn load_conversation<S: Into<String>>(
        &self,
        conversation_id: S,
    ) -> Result<(), Rejected> {
        self.handle
            .call(LoadConversation(conversation_id.into()))
            .await?
    }

    /// Starts over with an empty conversation of the same topic. Nothing is
    /// deleted.
    pub async fn start_new(&self) -> Result<(), Rejected> {
        self.handle.call(StartNew).await?;
        Ok(())
    }

    /// Gives a saved conversation a new title.
    pub async fn rename<S1, S2>(
        &self,
        conversation_id: S1,
        title: S2,
    ) -> Result<(), Rejected>
    where
        S1: Into<String>,
        S2: Into<String>,
    {
        self.handle
            .call(Rename {
                conversation_id: conversation_id.into(),
                title: title.into(),
            })
            .await?
    }

    /// Deletes a saved conversation. Deleting the active conversation
    /// starts a new one.
    pub async fn remove<S: Into<String>>(
        &self,
        conversation_id: S,
    ) -> Result<(), Rejected> {
        self.handle.call(Remove(conversation_id.into())).await?
    }

    /// Fetches the saved conversations of the open topic again.
    pub async fn refresh_history(&self) -> Result<(), Rejected> {
        self.handle.call(RefreshHistory).await?
    }

    /// Returns the latest snapshot.
    #[inline]
    pub fn snapshot(&self) -> Snapshot {
        self.snapshot_rx.borrow().clone()
    }

    /// Returns a receiver that is notified of every new snapshot.
    #[inline]
    pub fn subscribe(&self) -> watch::Receiver<Snapshot> {
        self.snapshot_rx.clone()
    }

    /// Waits until a snapshot satisfies `predicate`, and returns it.
    pub async fn wait_for(
        &self,
        mut predicate: impl FnMut(&Snapshot) -> bool,
    ) -> Result<Snapshot, Rejected> {
        let mut rx = self.snapshot_rx.clone();
        let snapshot = rx
            .wait_for(|snapshot| predicate(snapshot))
            .await
            .map_err(|_| Rejected::Stopped)?;
        Ok(snapshot.clone())
    }

    /// Stops the controller. Operations and writes in flight are
    /// abandoned.
    #[inline]
    pub fn close(&self) {
        self.handle.stop();
    }
}
