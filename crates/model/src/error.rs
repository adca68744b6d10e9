use std::fmt::{self, Display};

/// The kind of error that occurred while talking to a remote service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// The request could not be delivered or the connection failed.
    Transport,
    /// The request did not complete in time.
    Timeout,
    /// The service is rate limited.
    RateLimited,
    /// The service answered with `success: false`.
    Rejected,
    /// The response could not be understood.
    Malformed,
}

impl ErrorKind {
    /// Returns `true` if retrying the same request may succeed.
    #[inline]
    pub fn is_transient(self) -> bool {
        matches!(
            self,
            ErrorKind::Transport | ErrorKind::Timeout | ErrorKind::RateLimited
        )
    }
}

impl Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ErrorKind::Transport => write!(f, "Transport error"),
            ErrorKind::Timeout => write!(f, "Timed out"),
            ErrorKind::RateLimited => write!(f, "Rate limited"),
            ErrorKind::Rejected => write!(f, "Rejected by the service"),
            ErrorKind::Malformed => write!(f, "Malformed response"),
        }
    }
}
