use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;

use counsel_model::{
    AskRequest, AskResponse, ChatEndpoint, ConversationSummary, DeleteRequest,
    DeleteResponse, ErrorKind, ListRequest, ListResponse, LoadRequest,
    LoadResponse, Message, SaveRequest, SaveResponse, ServiceError,
    SessionStore, StoredConversation,
};
use tokio::time::timeout;
use tracing::Instrument;

use crate::Failure;

type BoxFuture<T> = Pin<Box<dyn Future<Output = T> + Send>>;
type CallResult<T> = Result<T, Failure>;
#[rustfmt::skip]
type AskFn = Arc<
    dyn Fn(AskRequest) -> BoxFuture<CallResult<AskResponse>> + Send + Sync
>;

/// Runs `fut`, failing with a timeout once `limit` has elapsed.
pub(crate) async fn bounded<T>(
    limit: Duration,
    fut: impl Future<Output = CallResult<T>>,
) -> CallResult<T> {
    match timeout(limit, fut).await {
        Ok(result) => result,
        Err(_) => {
            warn!("request timed out after {limit:?}");
            Err(Failure::timeout())
        }
    }
}

/// A successful answer from the chat endpoint.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Answer {
    pub text: String,
    /// The history the server wants kept, if it sent one.
    pub history: Option<Vec<Message>>,
    pub follow_ups: Option<Vec<String>>,
}

/// A wrapper around a chat endpoint that provides a type-erased interface
/// for the controller, and turns `success: false` answers into failures.
#[derive(Clone)]
pub struct ChatClient {
    ask_fn: AskFn,
}

impl ChatClient {
    pub fn new<E: ChatEndpoint + 'static>(endpoint: E) -> Self {
        // Erase `E` so the controller state doesn't need a type parameter.
        let ask_fn: AskFn = Arc::new(move |req| {
            let history_len = req.conversation_history.len();
            let fut = endpoint.ask(&req);
            Box::pin(
                async move {
                    trace!("asking with {history_len} prior messages");
                    fut.await.map_err(|err| {
                        error!("got an error: {err:?}");
                        Failure::from_service(&err)
                    })
                }
                .instrument(trace_span!("chat endpoint req")),
            )
        });
        Self { ask_fn }
    }

    /// Asks a question.
    ///
    /// # Cancel safety
    ///
    /// This method is cancel safe. Dropping the future drops the
    /// underlying request.
    pub async fn ask(&self, req: AskRequest) -> CallResult<Answer> {
        let resp = (self.ask_fn)(req).await?;
        if !resp.success {
            debug!("question rejected: {:?}", resp.error);
            return Err(Failure::rejected(resp.error));
        }
        let Some(text) = resp.answer else {
            return Err(Failure::new(ErrorKind::Malformed)
                .with_reason("answer is missing"));
        };
        Ok(Answer {
            text,
            history: resp.conversation_history.filter(|h| !h.is_empty()),
            follow_ups: resp.suggested_follow_ups.filter(|f| !f.is_empty()),
        })
    }
}

trait StoreObject: Send + Sync + 'static {
    fn save(&self, req: SaveRequest) -> BoxFuture<CallResult<SaveResponse>>;

    fn list(&self, req: ListRequest) -> BoxFuture<CallResult<ListResponse>>;

    fn load(&self, req: LoadRequest) -> BoxFuture<CallResult<LoadResponse>>;

    fn delete(
        &self,
        req: DeleteRequest,
    ) -> BoxFuture<CallResult<DeleteResponse>>;
}

struct AnyStore<S: SessionStore>(S);

fn erase<T, E>(
    op: &'static str,
    fut: impl Future<Output = Result<T, E>> + Send + 'static,
) -> BoxFuture<CallResult<T>>
where
    T: Send + 'static,
    E: ServiceError,
{
    Box::pin(
        async move {
            fut.await.map_err(|err| {
                warn!("got an error: {err:?}");
                Failure::from_service(&err)
            })
        }
        .instrument(trace_span!("session store req", op)),
    )
}

impl<S: SessionStore + 'static> StoreObject for AnyStore<S> {
    #[inline]
    fn save(&self, req: SaveRequest) -> BoxFuture<CallResult<SaveResponse>> {
        erase("save", self.0.save(&req))
    }

    #[inline]
    fn list(&self, req: ListRequest) -> BoxFuture<CallResult<ListResponse>> {
        erase("list", self.0.list(&req))
    }

    #[inline]
    fn load(&self, req: LoadRequest) -> BoxFuture<CallResult<LoadResponse>> {
        erase("load", self.0.load(&req))
    }

    #[inline]
    fn delete(
        &self,
        req: DeleteRequest,
    ) -> BoxFuture<CallResult<DeleteResponse>> {
        erase("delete", self.0.delete(&req))
    }
}

/// A type-erased session store, which checks the `success` flag of every
/// answer.
#[derive(Clone)]
pub struct StoreClient {
    store: Arc<dyn StoreObject>,
}

impl StoreClient {
    #[inline]
    pub fn new<S: SessionStore + 'static>(store: S) -> Self {
        Self {
            store: Arc::new(AnyStore(store)),
        }
    }

    /// Saves a conversation and returns its identifier.
    pub async fn save(&self, req: SaveRequest) -> CallResult<String> {
        let resp = self.store.save(req).await?;
        if !resp.success {
            return Err(Failure::rejected(resp.error));
        }
        if resp.conversation_id.is_empty() {
            return Err(Failure::new(ErrorKind::Malformed)
                .with_reason("conversation id is missing"));
        }
        Ok(resp.conversation_id)
    }

    pub async fn list(
        &self,
        req: ListRequest,
    ) -> CallResult<Vec<ConversationSummary>> {
        let resp = self.store.list(req).await?;
        if !resp.success {
            return Err(Failure::rejected(resp.error));
        }
        Ok(resp.conversations)
    }

    pub async fn load(&self, req: LoadRequest) -> CallResult<StoredConversation> {
        let resp = self.store.load(req).await?;
        if !resp.success {
            return Err(Failure::rejected(resp.error));
        }
        resp.conversation.ok_or_else(|| {
            Failure::new(ErrorKind::Malformed)
                .with_reason("conversation is missing")
        })
    }

    pub async fn delete(&self, req: DeleteRequest) -> CallResult<()> {
        let resp = self.store.delete(req).await?;
        if !resp.success {
            return Err(Failure::rejected(resp.error));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use counsel_test_service::{
        MemorySessionStore, PresetReply, ScriptedChatEndpoint,
    };

    use super::*;

    fn ask_request(question: &str) -> AskRequest {
        AskRequest {
            user_identifier: "u-1".to_owned(),
            topic_id: "mit".to_owned(),
            question: question.to_owned(),
            conversation_history: vec![],
        }
    }

    #[tokio::test]
    async fn test_ask() {
        let endpoint = ScriptedChatEndpoint::default();
        endpoint.add_reply(
            PresetReply::answer("About 4%.").with_follow_ups(Vec::<String>::new()),
        );
        let client = ChatClient::new(endpoint.clone());

        for _ in 0..3 {
            let answer = client.ask(ask_request("Acceptance rate?")).await.unwrap();
            assert_eq!(answer.text, "About 4%.");
            assert_eq!(answer.history.map(|h| h.len()), Some(2));
            // Empty suggestion lists are treated as absent.
            assert!(answer.follow_ups.is_none());
        }
        assert_eq!(endpoint.request_count(), 3);
    }

    #[tokio::test]
    async fn test_ask_rejected() {
        let endpoint = ScriptedChatEndpoint::default();
        endpoint.add_reply(PresetReply::rejected("out of credits"));
        let client = ChatClient::new(endpoint);

        let failure = client.ask(ask_request("Hi")).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Rejected);
        assert_eq!(failure.reason(), "out of credits");
    }

    #[tokio::test]
    async fn test_ask_transport_error() {
        let client = ChatClient::new(ScriptedChatEndpoint::default());
        let failure = client.ask(ask_request("Hi")).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Transport);
    }

    #[tokio::test(start_paused = true)]
    async fn test_bounded() {
        let endpoint = ScriptedChatEndpoint::default();
        endpoint.add_reply(PresetReply::answer("Late."));
        endpoint.set_delay(Duration::from_secs(30));
        let client = ChatClient::new(endpoint);

        let result =
            bounded(Duration::from_secs(5), client.ask(ask_request("Hi"))).await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Timeout);
    }

    #[tokio::test]
    async fn test_store_round_trip() {
        let store = MemorySessionStore::default();
        let client = StoreClient::new(store.clone());

        let id = client
            .save(SaveRequest {
                user_identifier: "u-1".to_owned(),
                topic_id: "mit".to_owned(),
                topic_display_name: "MIT".to_owned(),
                messages: vec![Message::user("Hi")],
                conversation_id: None,
                title: Some("Hi".to_owned()),
            })
            .await
            .unwrap();

        let summaries = client
            .list(ListRequest {
                user_identifier: "u-1".to_owned(),
                topic_id: "mit".to_owned(),
                limit: 5,
            })
            .await
            .unwrap();
        assert_eq!(summaries.len(), 1);
        assert_eq!(summaries[0].conversation_id, id);

        let loaded = client
            .load(LoadRequest {
                user_identifier: "u-1".to_owned(),
                conversation_id: id.clone(),
            })
            .await
            .unwrap();
        assert_eq!(loaded.messages, vec![Message::user("Hi")]);

        let delete = DeleteRequest {
            user_identifier: "u-1".to_owned(),
            conversation_id: id,
        };
        client.delete(delete.clone()).await.unwrap();
        let failure = client.delete(delete).await.unwrap_err();
        assert_eq!(failure.kind(), ErrorKind::Rejected);
        assert!(store.is_empty());
    }
}
