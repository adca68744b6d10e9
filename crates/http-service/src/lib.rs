//! The chat endpoint and session store of the counseling service, spoken
//! to as JSON over HTTP.

#[macro_use]
extern crate tracing;

mod config;
mod route;

use std::error::Error as StdError;
use std::fmt::{self, Display};
use std::sync::Arc;

use counsel_model::{
    AskRequest, AskResponse, ChatEndpoint, DeleteRequest, DeleteResponse,
    ErrorKind, ListRequest, ListResponse, LoadRequest, LoadResponse,
    SaveRequest, SaveResponse, ServiceError, SessionStore,
};
use mime::Mime;
use reqwest::{Client, RequestBuilder, StatusCode, header};
use serde::Serialize;
use serde::de::DeserializeOwned;
use tracing::Instrument;

pub use config::{HttpServiceConfig, HttpServiceConfigBuilder};
use route::Route;

/// Error type for [`HttpService`].
#[derive(Debug)]
pub struct Error {
    message: String,
    kind: ErrorKind,
}

impl Error {
    fn new(message: impl Into<String>, kind: ErrorKind) -> Self {
        Self {
            message: message.into(),
            kind,
        }
    }

    fn from_reqwest(err: reqwest::Error) -> Self {
        let kind = if err.is_timeout() {
            ErrorKind::Timeout
        } else if err.is_decode() {
            ErrorKind::Malformed
        } else {
            ErrorKind::Transport
        };
        Self::new(format!("{err}"), kind)
    }

    fn from_status(status: StatusCode) -> Self {
        let kind = if status == StatusCode::TOO_MANY_REQUESTS {
            ErrorKind::RateLimited
        } else {
            ErrorKind::Transport
        };
        Self::new(format!("Unexpected status: {status}"), kind)
    }

    /// Returns the error message.
    #[inline]
    pub fn message(&self) -> &str {
        &self.message
    }
}

impl Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.message)
    }
}

impl StdError for Error {}

impl ServiceError for Error {
    #[inline]
    fn kind(&self) -> ErrorKind {
        self.kind
    }
}

fn is_json(content_type: Option<&str>) -> bool {
    content_type
        .and_then(|v| v.parse::<Mime>().ok())
        .is_some_and(|m| {
            m.type_() == mime::APPLICATION
                && (m.subtype() == mime::JSON || m.suffix() == Some(mime::JSON))
        })
}

/// Sends a prepared request and decodes the JSON answer.
fn send<T>(
    route: Route,
    builder: RequestBuilder,
) -> impl Future<Output = Result<T, Error>> + Send + 'static
where
    T: DeserializeOwned + Send + 'static,
{
    async move {
        let resp = builder.send().await.map_err(Error::from_reqwest)?;
        let status = resp.status();
        if !status.is_success() {
            warn!("got status {status}");
            return Err(Error::from_status(status));
        }

        let content_type = resp
            .headers()
            .get(header::CONTENT_TYPE)
            .and_then(|v| v.to_str().ok())
            .map(ToOwned::to_owned);
        if !is_json(content_type.as_deref()) {
            return Err(Error::new(
                format!("Unexpected content type: {content_type:?}"),
                ErrorKind::Malformed,
            ));
        }

        resp.json().await.map_err(Error::from_reqwest)
    }
    .instrument(trace_span!("http req", path = route.path()))
}

/// The counseling service, reached over HTTP.
///
/// Both [`ChatEndpoint`] and [`SessionStore`] are served by the same
/// backend, so one value implements both. Clones share the connection
/// pool.
#[derive(Clone, Debug)]
pub struct HttpService {
    client: Client,
    config: Arc<HttpServiceConfig>,
}

impl HttpService {
    /// Creates a new `HttpService` with the given configuration.
    #[inline]
    pub fn new(config: HttpServiceConfig) -> Self {
        Self {
            client: Client::new(),
            config: Arc::new(config),
        }
    }

    fn request<B: Serialize>(&self, route: Route, body: &B) -> RequestBuilder {
        let builder = self
            .client
            .post(route.url(&self.config.base_url))
            .header(header::ACCEPT, "application/json")
            .json(body);
        match &self.config.api_token {
            Some(token) => builder.bearer_auth(token),
            None => builder,
        }
    }
}

impl ChatEndpoint for HttpService {
    type Error = Error;

    fn ask(
        &self,
        req: &AskRequest,
    ) -> impl Future<Output = Result<AskResponse, Self::Error>> + Send + 'static
    {
        send(Route::Chat, self.request(Route::Chat, req))
    }
}

impl SessionStore for HttpService {
    type Error = Error;

    fn save(
        &self,
        req: &SaveRequest,
    ) -> impl Future<Output = Result<SaveResponse, Self::Error>> + Send + 'static
    {
        send(Route::Save, self.request(Route::Save, req))
    }

    fn list(
        &self,
        req: &ListRequest,
    ) -> impl Future<Output = Result<ListResponse, Self::Error>> + Send + 'static
    {
        send(Route::List, self.request(Route::List, req))
    }

    fn load(
        &self,
        req: &LoadRequest,
    ) -> impl Future<Output = Result<LoadResponse, Self::Error>> + Send + 'static
    {
        send(Route::Load, self.request(Route::Load, req))
    }

    fn delete(
        &self,
        req: &DeleteRequest,
    ) -> impl Future<Output = Result<DeleteResponse, Self::Error>>
    + Send
    + 'static {
        send(Route::Delete, self.request(Route::Delete, req))
    }
}
