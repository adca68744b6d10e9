use std::fmt::{self, Debug};

/// The signed-in user on whose behalf the controller talks to the remote
/// services.
///
/// This is passed explicitly to the controller instead of being read from
/// an ambient session, so tests can use any identity they like.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct UserContext {
    user_id: String,
    display_name: Option<String>,
}

impl UserContext {
    /// Creates a context for the user with the given identifier.
    #[inline]
    pub fn new<S: Into<String>>(user_id: S) -> Self {
        Self {
            user_id: user_id.into(),
            display_name: None,
        }
    }

    /// Sets the name shown for the user.
    #[inline]
    pub fn with_display_name<S: Into<String>>(mut self, name: S) -> Self {
        self.display_name = Some(name.into());
        self
    }

    /// Returns the user identifier sent with every request.
    #[inline]
    pub fn user_id(&self) -> &str {
        &self.user_id
    }

    /// Returns the name shown for the user, if known.
    #[inline]
    pub fn display_name(&self) -> Option<&str> {
        self.display_name.as_deref()
    }
}

impl Debug for UserContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("UserContext")
            .field("user_id", &"<redacted>")
            .field("display_name", &self.display_name)
            .finish()
    }
}
