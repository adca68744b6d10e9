use std::collections::BTreeMap;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use chrono::{DateTime, Utc};
use counsel_model::{
    ConversationSummary, DeleteRequest, DeleteResponse, ErrorKind, ListRequest,
    ListResponse, LoadRequest, LoadResponse, Message, SaveRequest, SaveResponse,
    SessionStore, StoredConversation,
};
use tokio::time::sleep;

use crate::{Error, lock};

#[derive(Clone, Debug)]
struct Record {
    user_identifier: String,
    topic_id: String,
    topic_display_name: String,
    title: Option<String>,
    messages: Vec<Message>,
    updated_at: DateTime<Utc>,
    revision: u64,
}

#[derive(Default)]
struct StoreState {
    records: BTreeMap<String, Record>,
    next_id: u64,
    revision: u64,
    saves: Vec<SaveRequest>,
    deletes: Vec<String>,
    failing_saves: u64,
    unavailable: bool,
    delay: Option<Duration>,
}

impl StoreState {
    fn check_available(&self) -> Result<(), Error> {
        if self.unavailable {
            return Err(Error::new("store unavailable", ErrorKind::Transport));
        }
        Ok(())
    }

    fn next_revision(&mut self) -> u64 {
        self.revision += 1;
        self.revision
    }
}

/// An in-memory session store for testing purpose.
///
/// Conversations get identifiers `conv-1`, `conv-2`, ... in creation
/// order. Listing returns the most recently saved conversations first.
/// Clones share the same storage.
#[derive(Clone, Default)]
pub struct MemorySessionStore {
    state: Arc<Mutex<StoreState>>,
}

impl MemorySessionStore {
    /// Stores a conversation directly, as if saved by an earlier session,
    /// and returns its identifier.
    pub fn seed(
        &self,
        user_identifier: &str,
        topic_id: &str,
        title: &str,
        messages: Vec<Message>,
    ) -> String {
        let mut state = lock(&self.state);
        state.next_id += 1;
        let id = format!("conv-{}", state.next_id);
        let revision = state.next_revision();
        state.records.insert(
            id.clone(),
            Record {
                user_identifier: user_identifier.to_owned(),
                topic_id: topic_id.to_owned(),
                topic_display_name: topic_id.to_owned(),
                title: Some(title.to_owned()),
                messages,
                updated_at: Utc::now(),
                revision,
            },
        );
        id
    }

    /// Returns every save request received so far.
    #[inline]
    pub fn saves(&self) -> Vec<SaveRequest> {
        lock(&self.state).saves.clone()
    }

    /// Returns the identifiers of every delete request received so far.
    #[inline]
    pub fn deletes(&self) -> Vec<String> {
        lock(&self.state).deletes.clone()
    }

    /// Returns a stored conversation.
    pub fn get(&self, conversation_id: &str) -> Option<StoredConversation> {
        let state = lock(&self.state);
        let record = state.records.get(conversation_id)?;
        Some(stored_conversation(conversation_id, record))
    }

    /// Returns the number of stored conversations.
    #[inline]
    pub fn len(&self) -> usize {
        lock(&self.state).records.len()
    }

    /// Returns `true` if nothing is stored.
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Makes the next `count` saves fail with a transport error.
    #[inline]
    pub fn fail_next_saves(&self, count: u64) {
        lock(&self.state).failing_saves = count;
    }

    /// Makes every operation fail with a transport error.
    #[inline]
    pub fn set_unavailable(&self, unavailable: bool) {
        lock(&self.state).unavailable = unavailable;
    }

    /// Delays every operation by `duration`.
    #[inline]
    pub fn set_delay(&self, duration: Duration) {
        lock(&self.state).delay = Some(duration);
    }

    fn do_save(&self, req: &SaveRequest) -> Result<SaveResponse, Error> {
        let mut state = lock(&self.state);
        state.saves.push(req.clone());
        state.check_available()?;
        if state.failing_saves > 0 {
            state.failing_saves -= 1;
            return Err(Error::new("scripted failure", ErrorKind::Transport));
        }

        let revision = state.next_revision();
        let id = match &req.conversation_id {
            Some(id) => {
                let Some(record) = state.records.get_mut(id) else {
                    return Ok(SaveResponse {
                        success: false,
                        conversation_id: id.clone(),
                        error: Some("conversation not found".to_owned()),
                    });
                };
                record.messages = req.messages.clone();
                if req.title.is_some() {
                    record.title = req.title.clone();
                }
                record.updated_at = Utc::now();
                record.revision = revision;
                id.clone()
            }
            None => {
                state.next_id += 1;
                let id = format!("conv-{}", state.next_id);
                state.records.insert(
                    id.clone(),
                    Record {
                        user_identifier: req.user_identifier.clone(),
                        topic_id: req.topic_id.clone(),
                        topic_display_name: req.topic_display_name.clone(),
                        title: req.title.clone(),
                        messages: req.messages.clone(),
                        updated_at: Utc::now(),
                        revision,
                    },
                );
                id
            }
        };

        Ok(SaveResponse {
            success: true,
            conversation_id: id,
            error: None,
        })
    }

    fn do_list(&self, req: &ListRequest) -> Result<ListResponse, Error> {
        let state = lock(&self.state);
        state.check_available()?;

        let mut records: Vec<_> = state
            .records
            .iter()
            .filter(|(_, record)| {
                record.user_identifier == req.user_identifier
                    && record.topic_id == req.topic_id
            })
            .collect();
        records.sort_by(|a, b| b.1.revision.cmp(&a.1.revision));

        let conversations = records
            .into_iter()
            .take(req.limit as usize)
            .map(|(id, record)| ConversationSummary {
                conversation_id: id.clone(),
                title: record.title.clone().unwrap_or_default(),
                message_count: record.messages.len(),
                updated_at: record.updated_at,
            })
            .collect();
        Ok(ListResponse {
            success: true,
            conversations,
            error: None,
        })
    }

    fn do_load(&self, req: &LoadRequest) -> Result<LoadResponse, Error> {
        let state = lock(&self.state);
        state.check_available()?;

        let record = state
            .records
            .get(&req.conversation_id)
            .filter(|record| record.user_identifier == req.user_identifier);
        let Some(record) = record else {
            return Ok(LoadResponse {
                success: false,
                conversation: None,
                error: Some("conversation not found".to_owned()),
            });
        };
        Ok(LoadResponse {
            success: true,
            conversation: Some(stored_conversation(&req.conversation_id, record)),
            error: None,
        })
    }

    fn do_delete(&self, req: &DeleteRequest) -> Result<DeleteResponse, Error> {
        let mut state = lock(&self.state);
        state.deletes.push(req.conversation_id.clone());
        state.check_available()?;

        let owned = state
            .records
            .get(&req.conversation_id)
            .is_some_and(|record| record.user_identifier == req.user_identifier);
        if !owned {
            return Ok(DeleteResponse {
                success: false,
                error: Some("conversation not found".to_owned()),
            });
        }
        state.records.remove(&req.conversation_id);
        Ok(DeleteResponse {
            success: true,
            error: None,
        })
    }

    fn delay(&self) -> Duration {
        lock(&self.state).delay.unwrap_or(Duration::from_millis(1))
    }
}

fn stored_conversation(id: &str, record: &Record) -> StoredConversation {
    StoredConversation {
        conversation_id: id.to_owned(),
        topic_id: record.topic_id.clone(),
        topic_display_name: record.topic_display_name.clone(),
        title: record.title.clone(),
        messages: record.messages.clone(),
    }
}

async fn delayed<T>(delay: Duration, result: T) -> T {
    sleep(delay).await;
    result
}

impl SessionStore for MemorySessionStore {
    type Error = crate::Error;

    fn save(
        &self,
        req: &SaveRequest,
    ) -> impl Future<Output = Result<SaveResponse, Self::Error>> + Send + 'static
    {
        delayed(self.delay(), self.do_save(req))
    }

    fn list(
        &self,
        req: &ListRequest,
    ) -> impl Future<Output = Result<ListResponse, Self::Error>> + Send + 'static
    {
        delayed(self.delay(), self.do_list(req))
    }

    fn load(
        &self,
        req: &LoadRequest,
    ) -> impl Future<Output = Result<LoadResponse, Self::Error>> + Send + 'static
    {
        delayed(self.delay(), self.do_load(req))
    }

    fn delete(
        &self,
        req: &DeleteRequest,
    ) -> impl Future<Output = Result<DeleteResponse, Self::Error>>
    + Send
    + 'static {
        delayed(self.delay(), self.do_delete(req))
    }
}
