use std::collections::HashMap;
use std::fmt::{self, Debug};

use chrono::Utc;
use counsel_actor::{Actor, Message, Request};
use counsel_model::{
    AskRequest, Conversation, ConversationSummary, LoadRequest, ListRequest,
    Message as ChatMessage, Role, SaveRequest, StoredConversation, Topic,
};
use tokio::sync::watch;
use tokio::task::JoinHandle;

use super::writes::{WriteJob, WriteOutcome, WriteQueue, Writer, default_title};
use super::{Operation, Rejected, Snapshot, Status};
use crate::service_client::{Answer, ChatClient, StoreClient, bounded};
use crate::suggestions::suggestions;
use crate::{ControllerConfig, Failure, UserContext};

/// The operation holding the controller, and the task or write job that
/// will release it.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
struct Gate {
    op: Operation,
    ticket: u64,
}

#[derive(Clone, Debug)]
struct FailedExchange {
    question: String,
    failure: Failure,
}

/// A rename of the active conversation, applied locally before its save.
#[derive(Clone, Debug)]
struct TitleChange {
    job_id: u64,
    generation: u64,
    previous: Option<String>,
}

pub struct ControllerState {
    chat: ChatClient,
    store: StoreClient,
    user: UserContext,
    config: ControllerConfig,

    topic: Option<Topic>,
    conversation: Conversation,
    /// Bumped whenever `conversation` is replaced.
    generation: u64,
    gate: Option<Gate>,
    failed: Option<FailedExchange>,
    server_follow_ups: Option<Vec<String>>,
    title_change: Option<TitleChange>,

    summaries: Vec<ConversationSummary>,
    list_seq: u64,
    applied_list_seq: u64,

    writes: WriteQueue,
    running_tasks: HashMap<u64, JoinHandle<()>>,
    next_task_id: u64,
    snapshot_tx: watch::Sender<Snapshot>,
}

impl ControllerState {
    pub fn new(
        chat: ChatClient,
        store: StoreClient,
        user: UserContext,
        config: ControllerConfig,
    ) -> (Self, watch::Receiver<Snapshot>) {
        let conversation = Conversation::empty(String::new());
        let (snapshot_tx, snapshot_rx) = watch::channel(Snapshot {
            topic: None,
            conversation: conversation.clone(),
            status: Status::Idle,
            summaries: vec![],
            suggestions: vec![],
            pending_writes: 0,
        });
        let state = Self {
            chat,
            store,
            user,
            config,
            topic: None,
            conversation,
            generation: 0,
            gate: None,
            failed: None,
            server_follow_ups: None,
            title_change: None,
            summaries: vec![],
            list_seq: 0,
            applied_list_seq: 0,
            writes: WriteQueue::default(),
            running_tasks: HashMap::new(),
            next_task_id: 1,
            snapshot_tx,
        };
        (state, snapshot_rx)
    }

    fn status(&self) -> Status {
        if let Some(gate) = &self.gate {
            return Status::Pending(gate.op);
        }
        match &self.failed {
            Some(failed) => Status::Failed(failed.failure.clone()),
            None => Status::Idle,
        }
    }

    fn snapshot(&self) -> Snapshot {
        let category = self.topic.as_ref().and_then(|topic| topic.category);
        Snapshot {
            topic: self.topic.clone(),
            conversation: self.conversation.clone(),
            status: self.status(),
            summaries: self.summaries.clone(),
            suggestions: suggestions(
                category,
                self.conversation.exchanges(),
                self.server_follow_ups.as_deref(),
            ),
            pending_writes: self.writes.len(),
        }
    }

    fn publish(&self) {
        let snapshot = self.snapshot();
        self.snapshot_tx.send_if_modified(|current| {
            if *current == snapshot {
                return false;
            }
            *current = snapshot;
            true
        });
    }

    #[inline]
    fn check_gate(&self) -> Result<(), Rejected> {
        match &self.gate {
            Some(gate) => Err(Rejected::Busy(gate.op)),
            None => Ok(()),
        }
    }

    /// Releases the gate if `op` with `ticket` holds it.
    fn release(&mut self, op: Operation, ticket: u64) -> bool {
        if self.gate == Some(Gate { op, ticket }) {
            self.gate = None;
            return true;
        }
        false
    }

    /// Abandons the gated operation in flight. Writes keep running, only
    /// their effect on the active conversation is skipped.
    fn supersede(&mut self) {
        let Some(gate) = self.gate.take() else {
            return;
        };
        debug!("abandoning {:?}", gate.op);
        if matches!(gate.op, Operation::Sending | Operation::Loading) {
            if let Some(task) = self.running_tasks.remove(&gate.ticket) {
                task.abort();
            }
        }
    }

    fn reset_conversation(&mut self, topic_id: String) {
        self.generation += 1;
        self.conversation = Conversation::empty(topic_id);
        self.failed = None;
        self.server_follow_ups = None;
        self.writes.prune(self.generation);
    }

    #[inline]
    fn touch(&mut self) {
        self.conversation.updated_at = Utc::now();
    }

    fn open(&mut self, topic: Topic, handle: &Actor<Self>) {
        self.supersede();
        let same_topic = self
            .topic
            .as_ref()
            .is_some_and(|current| current.id == topic.id);
        if !same_topic {
            self.summaries.clear();
        }
        debug!("opening topic {}", topic.id);
        self.reset_conversation(topic.id.clone());
        self.topic = Some(topic);
        self.refresh_summaries(handle);
    }

    fn start_new(&mut self) {
        self.supersede();
        let topic_id = self.conversation.topic_id.clone();
        self.reset_conversation(topic_id);
    }

    fn send(&mut self, text: String, handle: &Actor<Self>) -> Result<(), Rejected> {
        let question = text.trim();
        if question.is_empty() {
            return Err(Rejected::EmptyInput);
        }
        if self.topic.is_none() {
            return Err(Rejected::NoTopic);
        }
        self.check_gate()?;

        let question = question.to_owned();
        let history = self.conversation.context();
        self.conversation
            .messages
            .push(ChatMessage::user(question.clone()));
        self.touch();
        self.failed = None;
        self.ask(question, history, handle);
        Ok(())
    }

    fn retry(&mut self, handle: &Actor<Self>) -> Result<(), Rejected> {
        self.check_gate()?;
        let Some(failed) = &self.failed else {
            return Err(Rejected::NothingToRetry);
        };

        let question = failed.question.clone();

        // Expect `[.., question, notice]` at the tail.
        let asked = match self.conversation.messages.as_slice() {
            [.., asked, _] => {
                asked.role() == Role::User && asked.content() == question
            }
            _ => false,
        };
        if !asked || self.conversation.retract_failure().is_none() {
            return Err(Rejected::NothingToRetry);
        }

        debug!("retrying the last question");
        let mut history = self.conversation.context();
        history.pop();
        self.failed = None;
        self.ask(question, history, handle);
        Ok(())
    }

    /// Sends `question` with `history`, where the question is already the
    /// last local message.
    fn ask(
        &mut self,
        question: String,
        history: Vec<ChatMessage>,
        handle: &Actor<Self>,
    ) {
        let request = AskRequest {
            user_identifier: self.user.user_id().to_owned(),
            topic_id: self.conversation.topic_id.clone(),
            question: question.clone(),
            conversation_history: history,
        };
        let chat = self.chat.clone();
        let limit = self.config.request_timeout;
        let generation = self.generation;
        let handle_clone = handle.clone();
        let task_id = self.spawn_task(
            |task_id| async move {
                let result = bounded(limit, chat.ask(request)).await;
                handle_clone
                    .send(ExchangeFinished {
                        task_id,
                        generation,
                        question,
                        result,
                    })
                    .ok();
            },
            handle,
        );
        self.gate = Some(Gate {
            op: Operation::Sending,
            ticket: task_id,
        });
    }

    fn finish_exchange(&mut self, msg: ExchangeFinished, handle: &Actor<Self>) {
        if msg.generation != self.generation
            || !self.release(Operation::Sending, msg.task_id)
        {
            debug!("discarding the answer of an abandoned question");
            return;
        }

        match msg.result {
            Ok(Answer {
                text,
                history,
                follow_ups,
            }) => {
                self.conversation.messages.push(ChatMessage::assistant(text));
                if let Some(history) = history {
                    // Failure notices stay visible unless the server
                    // actually rewrote the history.
                    if history != self.conversation.context() {
                        trace!("adopting server history of {} messages", history.len());
                        self.conversation.set_messages(history);
                    }
                }
                self.server_follow_ups = follow_ups;
                self.touch();
                self.enqueue_save(handle);
            }
            Err(failure) => {
                warn!("question failed: {failure}");
                self.conversation
                    .push_failure(ChatMessage::assistant(failure.notice()));
                self.failed = Some(FailedExchange {
                    question: msg.question,
                    failure,
                });
            }
        }
    }

    fn load(
        &mut self,
        conversation_id: String,
        handle: &Actor<Self>,
    ) -> Result<(), Rejected> {
        let conversation_id = conversation_id.trim();
        if conversation_id.is_empty() {
            return Err(Rejected::MissingIdentifier);
        }
        self.check_gate()?;

        let request = LoadRequest {
            user_identifier: self.user.user_id().to_owned(),
            conversation_id: conversation_id.to_owned(),
        };
        let store = self.store.clone();
        let limit = self.config.request_timeout;
        let handle_clone = handle.clone();
        let task_id = self.spawn_task(
            |task_id| async move {
                let result = bounded(limit, store.load(request)).await;
                handle_clone.send(LoadFinished { task_id, result }).ok();
            },
            handle,
        );
        self.gate = Some(Gate {
            op: Operation::Loading,
            ticket: task_id,
        });
        Ok(())
    }

    fn finish_load(&mut self, msg: LoadFinished) {
        if !self.release(Operation::Loading, msg.task_id) {
            debug!("discarding an abandoned load");
            return;
        }
        let stored = match msg.result {
            Ok(stored) => stored,
            Err(failure) => {
                warn!("could not load conversation: {failure}");
                return;
            }
        };

        let StoredConversation {
            conversation_id,
            topic_id,
            title,
            messages,
            ..
        } = stored;
        debug!("loaded conversation {conversation_id}");
        self.reset_conversation(topic_id);
        self.writes.assign(self.generation, conversation_id.clone());
        self.conversation.conversation_id = Some(conversation_id);
        self.conversation.title = title;
        self.conversation.set_messages(messages);
    }

    fn rename(
        &mut self,
        conversation_id: String,
        title: String,
        handle: &Actor<Self>,
    ) -> Result<(), Rejected> {
        let title = title.trim();
        if title.is_empty() {
            return Err(Rejected::EmptyInput);
        }
        let conversation_id = conversation_id.trim();
        if conversation_id.is_empty() {
            return Err(Rejected::MissingIdentifier);
        }
        self.check_gate()?;

        let active =
            self.conversation.conversation_id.as_deref() == Some(conversation_id);
        let ticket = if active {
            let previous = self.conversation.title.replace(title.to_owned());
            let job = self.save_job();
            let job_id = self.writes.push(job);
            self.title_change = Some(TitleChange {
                job_id,
                generation: self.generation,
                previous,
            });
            job_id
        } else {
            self.writes.push(WriteJob::Rename {
                conversation_id: conversation_id.to_owned(),
                title: title.to_owned(),
            })
        };
        self.gate = Some(Gate {
            op: Operation::Renaming,
            ticket,
        });
        self.pump_writes(handle);
        Ok(())
    }

    fn remove(
        &mut self,
        conversation_id: String,
        handle: &Actor<Self>,
    ) -> Result<(), Rejected> {
        let conversation_id = conversation_id.trim();
        if conversation_id.is_empty() {
            return Err(Rejected::MissingIdentifier);
        }
        self.check_gate()?;

        let ticket = self.writes.push(WriteJob::Delete {
            conversation_id: conversation_id.to_owned(),
        });
        self.gate = Some(Gate {
            op: Operation::Removing,
            ticket,
        });
        self.pump_writes(handle);
        Ok(())
    }

    fn save_job(&self) -> WriteJob {
        let topic_display_name = match &self.topic {
            Some(topic) if topic.id == self.conversation.topic_id => {
                topic.display_name.clone()
            }
            _ => self.conversation.topic_id.clone(),
        };
        WriteJob::Save {
            generation: Some(self.generation),
            request: SaveRequest {
                user_identifier: self.user.user_id().to_owned(),
                topic_id: self.conversation.topic_id.clone(),
                topic_display_name,
                messages: self.conversation.context(),
                conversation_id: self.conversation.conversation_id.clone(),
                title: self.conversation.title.clone(),
            },
        }
    }

    fn enqueue_save(&mut self, handle: &Actor<Self>) {
        let messages = self.conversation.context();
        if messages.is_empty() {
            return;
        }
        if self.conversation.title.is_none() {
            self.conversation.title = default_title(&messages);
        }
        let job = self.save_job();
        self.writes.push(job);
        self.pump_writes(handle);
    }

    fn pump_writes(&mut self, handle: &Actor<Self>) {
        let Some((job_id, job)) = self.writes.next() else {
            return;
        };
        let writer = Writer {
            store: self.store.clone(),
            user_identifier: self.user.user_id().to_owned(),
            timeout: self.config.request_timeout,
            retry_interval: self.config.save_retry_interval,
            retry_budget: self.config.save_retry_budget,
        };
        let handle_clone = handle.clone();
        self.spawn_task(
            |_| async move {
                let outcome = writer.run(job).await;
                handle_clone.send(WriteFinished { job_id, outcome }).ok();
            },
            handle,
        );
    }

    fn finish_write(&mut self, msg: WriteFinished, handle: &Actor<Self>) {
        let WriteFinished { job_id, outcome } = msg;
        self.writes.finish(job_id);
        if !self.release(Operation::Renaming, job_id) {
            self.release(Operation::Removing, job_id);
        }
        let title_change = self
            .title_change
            .take_if(|change| change.job_id == job_id);

        let refresh = match outcome {
            WriteOutcome::Saved {
                generation,
                result: Ok(conversation_id),
            } => {
                trace!("saved conversation {conversation_id}");
                if let Some(generation) = generation {
                    if generation == self.generation {
                        if self.conversation.conversation_id.is_none() {
                            self.conversation.conversation_id =
                                Some(conversation_id.clone());
                        }
                        self.remember_summary();
                    }
                    self.writes.assign(generation, conversation_id);
                }
                true
            }
            WriteOutcome::Saved {
                result: Err(failure),
                ..
            } => {
                warn!("could not save conversation: {failure}");
                match title_change {
                    Some(change) => {
                        if change.generation == self.generation {
                            debug!("restoring the title of a failed rename");
                            self.conversation.title = change.previous;
                        }
                        true
                    }
                    None => false,
                }
            }
            WriteOutcome::Renamed {
                conversation_id,
                result,
            } => {
                if let Err(failure) = result {
                    warn!("could not rename conversation {conversation_id}: {failure}");
                }
                true
            }
            WriteOutcome::Deleted {
                conversation_id,
                result: Ok(()),
            } => {
                debug!("deleted conversation {conversation_id}");
                self.summaries
                    .retain(|summary| summary.conversation_id != conversation_id);
                if self.conversation.conversation_id.as_deref()
                    == Some(conversation_id.as_str())
                {
                    self.start_new();
                }
                true
            }
            WriteOutcome::Deleted {
                conversation_id,
                result: Err(failure),
            } => {
                warn!("could not delete conversation {conversation_id}: {failure}");
                true
            }
        };

        if refresh {
            self.refresh_summaries(handle);
        }
        self.pump_writes(handle);
        self.writes.prune(self.generation);
    }

    /// Puts the active conversation on top of the list, until the next
    /// listing replaces it.
    fn remember_summary(&mut self) {
        let Some(summary) = self.conversation.summary() else {
            return;
        };
        self.summaries
            .retain(|known| known.conversation_id != summary.conversation_id);
        self.summaries.insert(0, summary);
    }

    fn refresh_summaries(&mut self, handle: &Actor<Self>) {
        let Some(topic_id) = self.topic.as_ref().map(|topic| topic.id.clone())
        else {
            return;
        };
        self.list_seq += 1;
        let seq = self.list_seq;
        let request = ListRequest {
            user_identifier: self.user.user_id().to_owned(),
            topic_id: topic_id.clone(),
            limit: self.config.history_limit,
        };
        let store = self.store.clone();
        let limit = self.config.request_timeout;
        let handle_clone = handle.clone();
        self.spawn_task(
            |_| async move {
                let result = bounded(limit, store.list(request)).await;
                handle_clone
                    .send(ListFinished {
                        seq,
                        topic_id,
                        result,
                    })
                    .ok();
            },
            handle,
        );
    }

    fn finish_list(&mut self, msg: ListFinished) {
        let current_topic = self.topic.as_ref().map(|topic| topic.id.as_str());
        if msg.seq <= self.applied_list_seq
            || current_topic != Some(msg.topic_id.as_str())
        {
            trace!("discarding a stale conversation list");
            return;
        }
        self.applied_list_seq = msg.seq;
        match msg.result {
            Ok(summaries) => self.summaries = summaries,
            Err(failure) => {
                warn!("could not list conversations: {failure}");
            }
        }
    }

    fn spawn_task<F, Fut>(&mut self, f: F, handle: &Actor<Self>) -> u64
    where
        F: FnOnce(u64) -> Fut,
        Fut: Future<Output = ()> + Send + 'static,
    {
        let task_id = self.next_task_id;
        self.next_task_id += 1;

        let handle = handle.clone();
        let fut = f(task_id);
        let task = tokio::spawn(async move {
            fut.await;
            handle.send(TaskEndedMessage(task_id)).ok();
        });
        self.running_tasks.insert(task_id, task);
        task_id
    }
}

impl Drop for ControllerState {
    fn drop(&mut self) {
        for (_, task) in self.running_tasks.drain() {
            task.abort();
        }
    }
}

#[derive(Debug)]
pub struct OpenTopic(pub Topic);

impl Request<ControllerState> for OpenTopic {
    type Reply = ();

    fn handle(self, state: &mut ControllerState, handle: &Actor<ControllerState>) {
        state.open(self.0, handle);
        state.publish();
    }
}

#[derive(Debug)]
pub struct SendText(pub String);

impl Request<ControllerState> for SendText {
    type Reply = Result<(), Rejected>;

    fn handle(
        self,
        state: &mut ControllerState,
        handle: &Actor<ControllerState>,
    ) -> Self::Reply {
        let reply = state.send(self.0, handle);
        state.publish();
        reply
    }
}

#[derive(Debug)]
pub struct Retry;

impl Request<ControllerState> for Retry {
    type Reply = Result<(), Rejected>;

    fn handle(
        self,
        state: &mut ControllerState,
        handle: &Actor<ControllerState>,
    ) -> Self::Reply {
        let reply = state.retry(handle);
        state.publish();
        reply
    }
}

#[derive(Debug)]
pub struct LoadConversation(pub String);

impl Request<ControllerState> for LoadConversation {
    type Reply = Result<(), Rejected>;

    fn handle(
        self,
        state: &mut ControllerState,
        handle: &Actor<ControllerState>,
    ) -> Self::Reply {
        let reply = state.load(self.0, handle);
        state.publish();
        reply
    }
}

#[derive(Debug)]
pub struct StartNew;

impl Request<ControllerState> for StartNew {
    type Reply = ();

    fn handle(self, state: &mut ControllerState, _handle: &Actor<ControllerState>) {
        state.start_new();
        state.publish();
    }
}

#[derive(Debug)]
pub struct Rename {
    pub conversation_id: String,
    pub title: String,
}

impl Request<ControllerState> for Rename {
    type Reply = Result<(), Rejected>;

    fn handle(
        self,
        state: &mut ControllerState,
        handle: &Actor<ControllerState>,
    ) -> Self::Reply {
        let reply = state.rename(self.conversation_id, self.title, handle);
        state.publish();
        reply
    }
}

#[derive(Debug)]
pub struct Remove(pub String);

impl Request<ControllerState> for Remove {
    type Reply = Result<(), Rejected>;

    fn handle(
        self,
        state: &mut ControllerState,
        handle: &Actor<ControllerState>,
    ) -> Self::Reply {
        let reply = state.remove(self.0, handle);
        state.publish();
        reply
    }
}

#[derive(Debug)]
pub struct RefreshHistory;

impl Request<ControllerState> for RefreshHistory {
    type Reply = Result<(), Rejected>;

    fn handle(
        self,
        state: &mut ControllerState,
        handle: &Actor<ControllerState>,
    ) -> Self::Reply {
        if state.topic.is_none() {
            return Err(Rejected::NoTopic);
        }
        state.refresh_summaries(handle);
        Ok(())
    }
}

struct ExchangeFinished {
    task_id: u64,
    generation: u64,
    question: String,
    result: Result<Answer, Failure>,
}

impl Debug for ExchangeFinished {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExchangeFinished")
            .field("task_id", &self.task_id)
            .field("generation", &self.generation)
            .field("ok", &self.result.is_ok())
            .finish_non_exhaustive()
    }
}

impl Message<ControllerState> for ExchangeFinished {
    fn handle(self, state: &mut ControllerState, handle: &Actor<ControllerState>) {
        state.finish_exchange(self, handle);
        state.publish();
    }
}

#[derive(Debug)]
struct LoadFinished {
    task_id: u64,
    result: Result<StoredConversation, Failure>,
}

impl Message<ControllerState> for LoadFinished {
    fn handle(self, state: &mut ControllerState, _handle: &Actor<ControllerState>) {
        state.finish_load(self);
        state.publish();
    }
}

#[derive(Debug)]
struct ListFinished {
    seq: u64,
    topic_id: String,
    result: Result<Vec<ConversationSummary>, Failure>,
}

impl Message<ControllerState> for ListFinished {
    fn handle(self, state: &mut ControllerState, _handle: &Actor<ControllerState>) {
        state.finish_list(self);
        state.publish();
    }
}

#[derive(Debug)]
struct WriteFinished {
    job_id: u64,
    outcome: WriteOutcome,
}

impl Message<ControllerState> for WriteFinished {
    fn handle(self, state: &mut ControllerState, handle: &Actor<ControllerState>) {
        state.finish_write(self, handle);
        state.publish();
    }
}

#[derive(Debug)]
struct TaskEndedMessage(u64);

impl Message<ControllerState> for TaskEndedMessage {
    #[inline]
    fn handle(self, state: &mut ControllerState, _handle: &Actor<ControllerState>) {
        // Aborted tasks are removed before they end.
        state.running_tasks.remove(&self.0);
    }
}
