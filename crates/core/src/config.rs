use std::time::Duration;

/// Builder for [`ControllerConfig`].
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct ControllerConfigBuilder {
    request_timeout: Option<Duration>,
    history_limit: Option<u32>,
    save_retry_interval: Option<Duration>,
    save_retry_budget: Option<Duration>,
}

impl ControllerConfigBuilder {
    /// Creates a builder with every option unset.
    #[inline]
    pub fn new() -> Self {
        Self::default()
    }

    /// Sets how long a question, load, rename or delete may take before
    /// it's treated as failed.
    #[inline]
    pub fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Sets how many saved conversations a history list shows.
    #[inline]
    pub fn with_history_limit(mut self, limit: u32) -> Self {
        self.history_limit = Some(limit);
        self
    }

    /// Sets the first retry interval of a failed save, and the total time
    /// spent retrying before the save is dropped.
    #[inline]
    pub fn with_save_retry(mut self, interval: Duration, budget: Duration) -> Self {
        self.save_retry_interval = Some(interval);
        self.save_retry_budget = Some(budget);
        self
    }

    /// Builds the configuration.
    #[inline]
    pub fn build(self) -> ControllerConfig {
        ControllerConfig {
            request_timeout: self
                .request_timeout
                .unwrap_or(Duration::from_secs(60)),
            history_limit: self.history_limit.unwrap_or(20),
            save_retry_interval: self
                .save_retry_interval
                .unwrap_or(Duration::from_millis(500)),
            save_retry_budget: self
                .save_retry_budget
                .unwrap_or(Duration::from_secs(30)),
        }
    }
}

/// Configuration for the conversation controller.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct ControllerConfig {
    pub(crate) request_timeout: Duration,
    pub(crate) history_limit: u32,
    pub(crate) save_retry_interval: Duration,
    pub(crate) save_retry_budget: Duration,
}

impl ControllerConfig {
    /// Returns the request timeout.
    #[inline]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    /// Returns the history list limit.
    #[inline]
    pub fn history_limit(&self) -> u32 {
        self.history_limit
    }
}

impl Default for ControllerConfig {
    #[inline]
    fn default() -> Self {
        ControllerConfigBuilder::new().build()
    }
}
