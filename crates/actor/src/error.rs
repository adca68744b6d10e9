use std::fmt::{self, Display};

/// Returned when a message or request is posted to an actor that no
/// longer runs, either because it was stopped or because its task ended.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ActorDeadError;

impl Display for ActorDeadError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("actor is no longer running")
    }
}

impl std::error::Error for ActorDeadError {}
