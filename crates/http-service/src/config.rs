use std::fmt::Debug;

const DEFAULT_BASE_URL: &str = "http://localhost:8000/api";

/// Builder for [`HttpServiceConfig`].
#[derive(Clone, Default, PartialEq, Eq, Hash)]
pub struct HttpServiceConfigBuilder {
    base_url: Option<String>,
    api_token: Option<String>,
}

impl HttpServiceConfigBuilder {
    /// Creates a builder with every option unset.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets the base URL the endpoint paths are appended to.
    #[inline]
    pub fn with_base_url<S: Into<String>>(mut self, base_url: S) -> Self {
        self.base_url = Some(base_url.into());
        self
    }

    /// Sets the bearer token sent with every request.
    #[inline]
    pub fn with_api_token<S: Into<String>>(mut self, api_token: S) -> Self {
        self.api_token = Some(api_token.into());
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> HttpServiceConfig {
        let base_url = self
            .base_url
            .unwrap_or_else(|| DEFAULT_BASE_URL.to_owned());
        HttpServiceConfig {
            base_url: base_url.trim_end_matches('/').to_owned(),
            api_token: self.api_token.filter(|token| !token.is_empty()),
        }
    }
}

impl Debug for HttpServiceConfigBuilder {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServiceConfigBuilder")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<deducted>"))
            .finish()
    }
}

/// Configuration for [`HttpService`](crate::HttpService).
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct HttpServiceConfig {
    pub(crate) base_url: String,
    pub(crate) api_token: Option<String>,
}

impl HttpServiceConfig {
    /// Returns the base URL, without a trailing slash.
    #[inline]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }
}

impl Debug for HttpServiceConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpServiceConfig")
            .field("base_url", &self.base_url)
            .field("api_token", &self.api_token.as_ref().map(|_| "<deducted>"))
            .finish()
    }
}
