use std::error::Error;
use std::fmt::{self, Display};
use std::str::FromStr;

use counsel_core::{
    Controller, ControllerBuilder, ControllerConfig, Rejected, UserContext,
};
use counsel_http::{HttpService, HttpServiceConfig};
use counsel_model::{ChatEndpoint, FitCategory, SessionStore, Topic};

/// The chat widgets of the product.
///
/// Every widget runs the same conversation controller. They differ in how
/// they introduce a topic.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash)]
pub enum WidgetKind {
    /// Questions about one university.
    #[default]
    University,
    /// Questions about how a profile fits a university.
    FitAnalysis,
    /// Open-ended counseling.
    Counselor,
}

impl WidgetKind {
    /// Returns the heading of the widget.
    #[inline]
    pub fn title(self) -> &'static str {
        match self {
            Self::University => "University chat",
            Self::FitAnalysis => "Fit analysis",
            Self::Counselor => "Counselor",
        }
    }

    /// Returns the text shown above an empty conversation.
    pub fn greeting(self, topic: &Topic) -> String {
        let name = &topic.display_name;
        match (self, topic.category) {
            (Self::University, _) => format!("Hi! Ask me anything about {name}."),
            (Self::FitAnalysis, Some(category)) => format!(
                "{name} looks like a {} school for you. Ask me why, or how \
                 to improve your chances.",
                category_label(category)
            ),
            (Self::FitAnalysis, None) => {
                format!("Ask me how your profile fits {name}.")
            }
            (Self::Counselor, _) => format!(
                "I'm your admissions counselor. What would you like to work \
                 on for {name}?"
            ),
        }
    }
}

fn category_label(category: FitCategory) -> &'static str {
    match category {
        FitCategory::Safety => "safety",
        FitCategory::Target => "target",
        FitCategory::Reach => "reach",
        FitCategory::SuperReach => "super reach",
    }
}

/// Error returned when parsing an unknown widget kind.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownWidgetKind(pub String);

impl Display for UnknownWidgetKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown widget: {}", self.0)
    }
}

impl Error for UnknownWidgetKind {}

impl FromStr for WidgetKind {
    type Err = UnknownWidgetKind;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "university" => Ok(Self::University),
            "fit" | "fit-analysis" => Ok(Self::FitAnalysis),
            "counselor" => Ok(Self::Counselor),
            _ => Err(UnknownWidgetKind(s.to_owned())),
        }
    }
}

/// A chat widget builder.
///
/// See [`ChatWidget`].
pub struct ChatWidgetBuilder {
    kind: WidgetKind,
    controller_builder: ControllerBuilder,
}

impl ChatWidgetBuilder {
    /// Creates a widget builder talking to the given services.
    pub fn with_services<E, S>(
        kind: WidgetKind,
        endpoint: E,
        store: S,
        user: UserContext,
    ) -> Self
    where
        E: ChatEndpoint + 'static,
        S: SessionStore + 'static,
    {
        Self {
            kind,
            controller_builder: ControllerBuilder::new(endpoint, store, user),
        }
    }

    /// Creates a widget builder talking to the counseling service over
    /// HTTP.
    pub fn with_http(
        kind: WidgetKind,
        config: HttpServiceConfig,
        user: UserContext,
    ) -> Self {
        let service = HttpService::new(config);
        Self::with_services(kind, service.clone(), service, user)
    }

    /// Replaces the default controller configuration.
    #[inline]
    pub fn with_controller_config(mut self, config: ControllerConfig) -> Self {
        self.controller_builder = self.controller_builder.with_config(config);
        self
    }

    /// Builds a new widget.
    ///
    /// This must be called within a tokio runtime.
    pub fn build(self) -> ChatWidget {
        ChatWidget {
            kind: self.kind,
            controller: self.controller_builder.build(),
        }
    }
}

/// A chat widget, like a panel that shows a conversation, the offered
/// questions and the saved conversations of a topic.
///
/// The widget is basically a wrapper around [`Controller`].
pub struct ChatWidget {
    kind: WidgetKind,
    controller: Controller,
}

impl ChatWidget {
    /// Returns the kind of this widget.
    #[inline]
    pub fn kind(&self) -> WidgetKind {
        self.kind
    }

    /// Returns the controller driving this widget.
    #[inline]
    pub fn controller(&self) -> &Controller {
        &self.controller
    }

    /// Opens a topic, and returns the greeting to show for it.
    pub async fn open(&self, topic: Topic) -> Result<String, Rejected> {
        let greeting = self.kind.greeting(&topic);
        self.controller.open(topic).await?;
        Ok(greeting)
    }
}
