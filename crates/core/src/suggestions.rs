//! Quick-reply questions offered next to the chat input.
//!
//! Everything here is a pure lookup, so what a widget shows depends only on
//! the topic's fit category, how far the conversation has progressed, and
//! what the server suggested last.

use counsel_model::FitCategory;

const SAFETY: [&str; 3] = [
    "Why is this a safety school for me?",
    "Which programs here match my interests?",
    "Are there merit scholarships I could qualify for?",
];

const TARGET: [&str; 3] = [
    "How can I stand out among similar applicants?",
    "Should I apply early to this school?",
    "What do admitted students typically have in common?",
];

const REACH: [&str; 3] = [
    "What's the acceptance rate?",
    "What would strengthen my application here?",
    "Is applying early worth it for a reach school?",
];

const SUPER_REACH: [&str; 3] = [
    "What's the acceptance rate?",
    "What do admitted students have that my profile lacks?",
    "How should I balance this with safer choices?",
];

const GENERAL: [&str; 3] = [
    "What's the acceptance rate?",
    "What are the application deadlines?",
    "What is this school known for?",
];

const FOLLOW_UP: [&str; 3] = [
    "Can you tell me more about that?",
    "How does this affect my chances?",
    "What should I do next?",
];

const FALLBACK: [&str; 3] = [
    "Can you summarize what we discussed?",
    "What else should I consider?",
    "Which deadlines should I keep track of?",
];

/// Returns the questions offered before the first exchange.
#[inline]
pub fn initial_suggestions(category: Option<FitCategory>) -> &'static [&'static str] {
    match category {
        Some(FitCategory::Safety) => &SAFETY,
        Some(FitCategory::Target) => &TARGET,
        Some(FitCategory::Reach) => &REACH,
        Some(FitCategory::SuperReach) => &SUPER_REACH,
        None => &GENERAL,
    }
}

/// Returns the static follow-up questions after `exchanges` completed
/// exchanges.
#[inline]
pub fn follow_up_suggestions(exchanges: usize) -> &'static [&'static str] {
    if exchanges > 2 { &FALLBACK } else { &FOLLOW_UP }
}

/// Returns the questions to show.
///
/// `server` holds the follow-ups carried by the latest server answer; when
/// present they replace the static lists.
pub fn suggestions(
    category: Option<FitCategory>,
    exchanges: usize,
    server: Option<&[String]>,
) -> Vec<String> {
    if exchanges == 0 {
        return to_owned(initial_suggestions(category));
    }
    match server {
        Some(server) if !server.is_empty() => server.to_vec(),
        _ => to_owned(follow_up_suggestions(exchanges)),
    }
}

#[inline]
fn to_owned(list: &[&str]) -> Vec<String> {
    list.iter().map(|s| (*s).to_owned()).collect()
}
