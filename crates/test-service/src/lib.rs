//! Local fake services for testing purpose.

mod preset;
mod store;

use std::collections::HashMap;
use std::error::Error as StdError;
use std::fmt::{self, Debug, Display, Formatter};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use counsel_model::{
    AskRequest, AskResponse, ChatEndpoint, ErrorKind, Message, Role,
    ServiceError,
};
use tokio::time::sleep;

pub use preset::*;
pub use store::*;

#[derive(Debug)]
pub struct Error {
    #[allow(dead_code)]
    message: &'static str,
    kind: ErrorKind,
}

impl Error {
    #[inline]
    pub(crate) fn new(message: &'static str, kind: ErrorKind) -> Self {
        Self { message, kind }
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut Formatter<'_>) -> fmt::Result {
        Debug::fmt(self, f)
    }
}

impl StdError for Error {}

impl ServiceError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

#[inline]
pub(crate) fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

#[derive(Default)]
struct EndpointState {
    script: Vec<PresetReply>,
    attempts: HashMap<usize, u64>,
    requests: Vec<AskRequest>,
    delay: Option<Duration>,
}

/// A local fake chat endpoint for testing purpose.
///
/// Before sending requests, you need to setup the script, which is how the
/// endpoint should answer. The reply is selected by the number of user
/// turns in the request history, so the first question gets the first
/// reply, and so on. If there are no enough replies in the script, a
/// transport error will be returned.
///
/// Clones share the same script and request log, so a test can keep one
/// clone to inspect what the code under test has sent.
///
/// # Note
///
/// This type is not optimized for production use, there are heavy memory
/// copies involved. You should only use it for testing.
#[derive(Clone, Default)]
pub struct ScriptedChatEndpoint {
    state: Arc<Mutex<EndpointState>>,
}

impl ScriptedChatEndpoint {
    /// Appends a reply for the next user turn.
    #[inline]
    pub fn add_reply(&self, reply: PresetReply) {
        lock(&self.state).script.push(reply);
    }

    /// Delays every answer by `duration`.
    #[inline]
    pub fn set_delay(&self, duration: Duration) {
        lock(&self.state).delay = Some(duration);
    }

    /// Returns every request received so far.
    #[inline]
    pub fn requests(&self) -> Vec<AskRequest> {
        lock(&self.state).requests.clone()
    }

    /// Returns the number of requests received so far.
    #[inline]
    pub fn request_count(&self) -> usize {
        lock(&self.state).requests.len()
    }

    fn answer(
        &self,
        req: &AskRequest,
    ) -> (Result<AskResponse, Error>, Option<Duration>) {
        let mut state = lock(&self.state);
        state.requests.push(req.clone());
        let delay = state.delay;

        let turn = req
            .conversation_history
            .iter()
            .filter(|msg| msg.role() == Role::User)
            .count();
        let Some(reply) = state.script.get(turn).cloned() else {
            return (
                Err(Error::new("no enough replies", ErrorKind::Transport)),
                delay,
            );
        };

        let attempt = state.attempts.entry(turn).or_default();
        *attempt += 1;
        let attempt = *attempt;
        if let Some(failures) = reply.failures {
            if failures == 0 || attempt <= failures {
                return (
                    Err(Error::new("scripted failure", ErrorKind::Transport)),
                    delay,
                );
            }
        }

        if let Some(error) = reply.rejection {
            let resp = AskResponse {
                success: false,
                error: Some(error),
                ..Default::default()
            };
            return (Ok(resp), delay);
        }

        let mut history = req.conversation_history.clone();
        history.push(Message::user(req.question.clone()));
        history.push(Message::assistant(reply.answer.clone()));
        let history = match reply.history {
            HistoryMode::Echo => Some(history),
            HistoryMode::Omit => None,
            HistoryMode::KeepLast(n) => {
                let skip = history.len().saturating_sub(n);
                Some(history.split_off(skip))
            }
        };

        let resp = AskResponse {
            success: true,
            answer: Some(reply.answer),
            conversation_history: history,
            suggested_follow_ups: reply.follow_ups,
            error: None,
        };
        (Ok(resp), delay)
    }
}

impl ChatEndpoint for ScriptedChatEndpoint {
    type Error = crate::Error;

    fn ask(
        &self,
        req: &AskRequest,
    ) -> impl Future<Output = Result<AskResponse, Self::Error>> + Send + 'static
    {
        let (result, delay) = self.answer(req);
        async move {
            sleep(delay.unwrap_or(Duration::from_millis(1))).await;
            result
        }
    }
}
