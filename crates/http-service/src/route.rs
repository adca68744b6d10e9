/// The remote operations, relative to the configured base URL.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub(crate) enum Route {
    Chat,
    Save,
    List,
    Load,
    Delete,
}

impl Route {
    #[inline]
    pub fn path(self) -> &'static str {
        match self {
            Self::Chat => "/chat",
            Self::Save => "/conversations/save",
            Self::List => "/conversations/list",
            Self::Load => "/conversations/load",
            Self::Delete => "/conversations/delete",
        }
    }

    #[inline]
    pub fn url(self, base_url: &str) -> String {
        format!("{base_url}{}", self.path())
    }
}
