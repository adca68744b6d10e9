use serde::{Deserialize, Serialize};

/// How a preset reply reports the conversation history back.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(tag = "mode", content = "keep", rename_all = "snake_case")]
pub enum HistoryMode {
    /// Returns the request history plus this exchange.
    #[default]
    Echo,
    /// Returns no history.
    Omit,
    /// Like `Echo`, but keeps only the last `n` messages.
    KeepLast(usize),
}

/// The preset reply for one user turn.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct PresetReply {
    /// The answer text.
    pub answer: String,
    /// Follow-up questions to suggest.
    #[serde(default)]
    pub follow_ups: Option<Vec<String>>,
    /// How the history is reported.
    #[serde(default)]
    pub history: HistoryMode,
    /// If set, the endpoint answers `success: false` with this error.
    #[serde(default)]
    pub rejection: Option<String>,
    /// If set, the request will fail in the first `failures` attempts.
    /// `Some(0)` means the request will fail infinitely.
    #[serde(default)]
    pub failures: Option<u64>,
}

impl PresetReply {
    /// Creates a successful reply with the given answer.
    #[inline]
    pub fn answer<S: Into<String>>(answer: S) -> Self {
        Self {
            answer: answer.into(),
            follow_ups: None,
            history: HistoryMode::Echo,
            rejection: None,
            failures: None,
        }
    }

    /// Creates a reply that the endpoint rejects with `error`.
    #[inline]
    pub fn rejected<S: Into<String>>(error: S) -> Self {
        Self {
            rejection: Some(error.into()),
            ..Self::answer("")
        }
    }

    /// Attaches suggested follow-up questions.
    #[inline]
    pub fn with_follow_ups<I, S>(mut self, follow_ups: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.follow_ups = Some(follow_ups.into_iter().map(Into::into).collect());
        self
    }

    /// Sets how the history is reported.
    #[inline]
    pub fn with_history(mut self, history: HistoryMode) -> Self {
        self.history = history;
        self
    }

    /// Sets failure times before a successful response. `0` means the
    /// response will always be a failure.
    #[inline]
    pub fn with_failures(mut self, failures: u64) -> Self {
        self.failures = Some(failures);
        self
    }
}
