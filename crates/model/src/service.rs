use std::error::Error;

use crate::error::ErrorKind;
use crate::wire::*;

/// The error type for a remote service.
pub trait ServiceError: Error + Send + Sync + 'static {
    /// Returns the kind of this error.
    fn kind(&self) -> ErrorKind;
}

/// The remote endpoint that answers questions about a topic.
///
/// Once created, the endpoint should behave like a stateless object. It
/// can still have internal state, but callers should not rely on it, and
/// the endpoint should be prepared for being dropped anytime.
pub trait ChatEndpoint: Send + Sync {
    /// The error type that may be returned by the endpoint.
    type Error: ServiceError;

    /// Asks a question.
    ///
    /// An `Ok` value only means the exchange completed at the transport
    /// level; callers must still check [`AskResponse::success`].
    fn ask(
        &self,
        req: &AskRequest,
    ) -> impl Future<Output = Result<AskResponse, Self::Error>> + Send + 'static;
}

/// The remote persistence service for saved conversations, keyed by user
/// and topic.
///
/// Every save is a full replace of the stored message array. The store
/// doesn't support partial updates or locking.
pub trait SessionStore: Send + Sync {
    /// The error type that may be returned by the store.
    type Error: ServiceError;

    /// Creates or replaces a conversation.
    fn save(
        &self,
        req: &SaveRequest,
    ) -> impl Future<Output = Result<SaveResponse, Self::Error>> + Send + 'static;

    /// Lists conversations of a topic.
    fn list(
        &self,
        req: &ListRequest,
    ) -> impl Future<Output = Result<ListResponse, Self::Error>> + Send + 'static;

    /// Loads a conversation.
    fn load(
        &self,
        req: &LoadRequest,
    ) -> impl Future<Output = Result<LoadResponse, Self::Error>> + Send + 'static;

    /// Deletes a conversation.
    fn delete(
        &self,
        req: &DeleteRequest,
    ) -> impl Future<Output = Result<DeleteResponse, Self::Error>>
    + Send
    + 'static;
}
