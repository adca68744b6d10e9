use std::fmt::{self, Display};
use std::str::FromStr;

use serde::{Deserialize, Serialize};

/// How selective a university is relative to a student's profile, as
/// computed by the fit analysis service.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum FitCategory {
    /// Admission is very likely.
    Safety,
    /// The profile matches typical admits.
    Target,
    /// Admission is possible but uncertain.
    Reach,
    /// Admission is unlikely for almost every applicant.
    SuperReach,
}

impl FitCategory {
    /// Returns the wire name of this category.
    #[inline]
    pub fn as_str(self) -> &'static str {
        match self {
            FitCategory::Safety => "SAFETY",
            FitCategory::Target => "TARGET",
            FitCategory::Reach => "REACH",
            FitCategory::SuperReach => "SUPER_REACH",
        }
    }
}

impl Display for FitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Error returned when parsing an unknown fit category.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct UnknownFitCategory(pub String);

impl Display for UnknownFitCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "unknown fit category: {}", self.0)
    }
}

impl std::error::Error for UnknownFitCategory {}

impl FromStr for FitCategory {
    type Err = UnknownFitCategory;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.trim().to_ascii_uppercase().replace(['-', ' '], "_");
        match normalized.as_str() {
            "SAFETY" => Ok(FitCategory::Safety),
            "TARGET" => Ok(FitCategory::Target),
            "REACH" => Ok(FitCategory::Reach),
            "SUPER_REACH" => Ok(FitCategory::SuperReach),
            _ => Err(UnknownFitCategory(s.to_owned())),
        }
    }
}

/// The subject a conversation is about, e.g. a university.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Topic {
    /// Stable identifier, e.g. a university id.
    pub id: String,
    /// Name shown to the user and stored alongside saved conversations.
    pub display_name: String,
    /// Fit category, when the topic comes from a fit analysis.
    pub category: Option<FitCategory>,
}

impl Topic {
    /// Creates a topic without a fit category.
    #[inline]
    pub fn new<S1: Into<String>, S2: Into<String>>(
        id: S1,
        display_name: S2,
    ) -> Self {
        Self {
            id: id.into(),
            display_name: display_name.into(),
            category: None,
        }
    }

    /// Sets the fit category.
    #[inline]
    pub fn with_category(mut self, category: FitCategory) -> Self {
        self.category = Some(category);
        self
    }
}
