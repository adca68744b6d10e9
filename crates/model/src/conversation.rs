use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Who authored a message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// The person using the widget.
    User,
    /// The counseling assistant.
    Assistant,
}

/// A single turn in a conversation.
///
/// Messages are immutable once created. The order of messages in a
/// conversation is significant, since it forms the context sent to the
/// chat endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Message {
    role: Role,
    content: String,
}

impl Message {
    /// Creates a message authored by the user.
    #[inline]
    pub fn user<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    /// Creates a message authored by the assistant.
    #[inline]
    pub fn assistant<S: Into<String>>(content: S) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }

    /// Returns the author of this message.
    #[inline]
    pub fn role(&self) -> Role {
        self.role
    }

    /// Returns the text of this message.
    #[inline]
    pub fn content(&self) -> &str {
        &self.content
    }
}

/// A conversation about one topic.
///
/// A conversation starts empty and without an identifier; the session
/// store assigns `conversation_id` on the first save.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Conversation {
    /// Identifier assigned by the session store, absent until first saved.
    pub conversation_id: Option<String>,
    /// The topic this conversation is about.
    pub topic_id: String,
    /// A human readable title.
    pub title: Option<String>,
    /// Messages in chronological order.
    pub messages: Vec<Message>,
    /// When this conversation last changed locally.
    pub updated_at: DateTime<Utc>,
    /// Positions in `messages` of failed exchanges, kept for display only.
    failed: Vec<usize>,
}

impl Conversation {
    /// Creates an empty conversation for the topic.
    #[inline]
    pub fn empty<S: Into<String>>(topic_id: S) -> Self {
        Self {
            conversation_id: None,
            topic_id: topic_id.into(),
            title: None,
            messages: vec![],
            updated_at: Utc::now(),
            failed: vec![],
        }
    }

    /// Returns the number of answered exchanges, i.e. assistant messages
    /// that are not failure notices.
    pub fn exchanges(&self) -> usize {
        self.messages
            .iter()
            .enumerate()
            .filter(|(i, msg)| msg.role() == Role::Assistant && !self.is_failed(*i))
            .count()
    }

    /// Returns `true` if the message at `index` belongs to a failed
    /// exchange.
    #[inline]
    pub fn is_failed(&self, index: usize) -> bool {
        self.failed.contains(&index)
    }

    /// Appends a failure notice for the trailing question. Both are
    /// excluded from [`context`](Self::context) from now on.
    pub fn push_failure(&mut self, notice: Message) {
        if let Some(last) = self.messages.len().checked_sub(1) {
            if self.messages[last].role() == Role::User && !self.is_failed(last) {
                self.failed.push(last);
            }
        }
        self.failed.push(self.messages.len());
        self.messages.push(notice);
    }

    /// Removes a trailing failure notice and makes its question the
    /// trailing unanswered turn again.
    ///
    /// Returns the notice, or `None` if the last message is not one.
    pub fn retract_failure(&mut self) -> Option<Message> {
        let last = self.messages.len().checked_sub(1)?;
        if !self.is_failed(last) || self.messages[last].role() != Role::Assistant {
            return None;
        }
        let notice = self.messages.pop();
        self.failed.retain(|&i| i + 1 < last);
        notice
    }

    /// Replaces every message, forgetting earlier failures.
    pub fn set_messages(&mut self, messages: Vec<Message>) {
        self.messages = messages;
        self.failed.clear();
    }

    /// Returns the messages that form the conversation as the services see
    /// it, leaving out failed exchanges.
    pub fn context(&self) -> Vec<Message> {
        self.messages
            .iter()
            .enumerate()
            .filter(|(i, _)| !self.is_failed(*i))
            .map(|(_, msg)| msg.clone())
            .collect()
    }

    /// Projects this conversation into a listing entry.
    ///
    /// Returns `None` if the conversation has never been persisted.
    pub fn summary(&self) -> Option<ConversationSummary> {
        Some(ConversationSummary {
            conversation_id: self.conversation_id.clone()?,
            title: self.title.clone().unwrap_or_default(),
            message_count: self.context().len(),
            updated_at: self.updated_at,
        })
    }
}

/// A lightweight listing entry of a persisted conversation.
///
/// Summaries are derived from the session store and never authoritative.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationSummary {
    /// Identifier of the persisted conversation.
    pub conversation_id: String,
    /// Title shown in history lists.
    #[serde(default)]
    pub title: String,
    /// Number of messages stored.
    #[serde(default)]
    pub message_count: usize,
    /// When the store last saved the conversation.
    pub updated_at: DateTime<Utc>,
}
