use std::borrow::Cow;
use std::error::Error;
use std::fmt::{self, Display};

use counsel_model::{ErrorKind, ServiceError};

/// Describes why a call to a remote service failed.
#[derive(Clone, Debug, PartialEq, Eq, Hash)]
pub struct Failure {
    kind: ErrorKind,
    reason: Option<String>,
}

impl Failure {
    /// Creates a failure of the given kind.
    #[inline]
    pub fn new(kind: ErrorKind) -> Self {
        Self { kind, reason: None }
    }

    /// Creates a failure for a request that ran out of time.
    #[inline]
    pub fn timeout() -> Self {
        Self::new(ErrorKind::Timeout)
    }

    /// Creates a failure for a `success: false` answer.
    #[inline]
    pub fn rejected(reason: Option<String>) -> Self {
        Self {
            kind: ErrorKind::Rejected,
            reason: reason.filter(|reason| !reason.trim().is_empty()),
        }
    }

    /// Creates a failure from a service error.
    #[inline]
    pub fn from_service<E: ServiceError>(err: &E) -> Self {
        Self::new(err.kind()).with_reason(err.to_string())
    }

    /// Attaches a reason to the failure.
    #[inline]
    pub fn with_reason<S: Into<String>>(self, reason: S) -> Self {
        Self {
            kind: self.kind,
            reason: Some(reason.into()),
        }
    }

    /// Returns the kind of the failure.
    #[inline]
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// Returns the reason for the failure.
    #[inline]
    pub fn reason(&self) -> Cow<'_, str> {
        match self.reason.as_deref() {
            Some(reason) => Cow::Borrowed(reason),
            None => Cow::Owned(format!("{}", self.kind)),
        }
    }

    /// Returns the text shown to the user in place of the missing answer.
    pub fn notice(&self) -> String {
        match self.kind {
            ErrorKind::Timeout => {
                "The request timed out. Please try again.".to_owned()
            }
            ErrorKind::RateLimited => {
                "Too many questions at once. Please wait a moment and try again."
                    .to_owned()
            }
            ErrorKind::Rejected => match &self.reason {
                Some(reason) => format!("Sorry, I couldn't answer that: {reason}"),
                None => "Sorry, I couldn't answer that. Please try again."
                    .to_owned(),
            },
            ErrorKind::Transport | ErrorKind::Malformed => {
                "Sorry, I couldn't reach the counseling service. Please try again."
                    .to_owned()
            }
        }
    }
}

impl Display for Failure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.reason {
            Some(reason) => write!(f, "{}: {reason}", self.kind),
            None => write!(f, "{}", self.kind),
        }
    }
}

impl Error for Failure {}
