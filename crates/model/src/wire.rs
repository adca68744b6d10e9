use serde::{Deserialize, Serialize};

use crate::{ConversationSummary, Message};

// -----------------
// Chat exchange
// -----------------

/// A question sent to the chat endpoint.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskRequest {
    /// The user asking.
    pub user_identifier: String,
    /// The topic of the conversation.
    pub topic_id: String,
    /// The new question.
    pub question: String,
    /// Prior turns, oldest first, not including `question`.
    pub conversation_history: Vec<Message>,
}

/// The chat endpoint's answer.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AskResponse {
    /// Whether the question was answered.
    pub success: bool,
    /// The answer text.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub answer: Option<String>,
    /// The full history as the server wants it kept, including this
    /// exchange. The server may trim or summarize older turns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_history: Option<Vec<Message>>,
    /// Follow-up questions proposed by the server.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub suggested_follow_ups: Option<Vec<String>>,
    /// The reason of a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// -----------------
// Session store
// -----------------

/// Saves a conversation, creating it when `conversation_id` is absent and
/// fully replacing the stored messages otherwise.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveRequest {
    /// The owner of the conversation.
    pub user_identifier: String,
    /// The topic of the conversation.
    pub topic_id: String,
    /// Name of the topic, stored for listing.
    pub topic_display_name: String,
    /// All messages of the conversation.
    pub messages: Vec<Message>,
    /// The conversation to update, or `None` to create one.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation_id: Option<String>,
    /// The title to store.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
}

/// Result of a save.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SaveResponse {
    /// Whether the conversation was stored.
    pub success: bool,
    /// Identifier of the stored conversation.
    #[serde(default)]
    pub conversation_id: String,
    /// The reason of a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Lists the saved conversations of a topic.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListRequest {
    /// The owner of the conversations.
    pub user_identifier: String,
    /// The topic to list.
    pub topic_id: String,
    /// Maximum number of summaries to return.
    pub limit: u32,
}

/// Result of a listing.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ListResponse {
    /// Whether the listing succeeded.
    pub success: bool,
    /// Summaries, most recently updated first.
    #[serde(default)]
    pub conversations: Vec<ConversationSummary>,
    /// The reason of a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Loads a saved conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadRequest {
    /// The owner of the conversation.
    pub user_identifier: String,
    /// The conversation to load.
    pub conversation_id: String,
}

/// A conversation as stored by the session store.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StoredConversation {
    /// Identifier of the conversation.
    pub conversation_id: String,
    /// The topic of the conversation.
    pub topic_id: String,
    /// Name of the topic.
    #[serde(default)]
    pub topic_display_name: String,
    /// The stored title.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    /// All stored messages.
    #[serde(default)]
    pub messages: Vec<Message>,
}

/// Result of a load.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LoadResponse {
    /// Whether the conversation was found.
    pub success: bool,
    /// The loaded conversation.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub conversation: Option<StoredConversation>,
    /// The reason of a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

/// Deletes a saved conversation.
#[derive(Clone, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteRequest {
    /// The owner of the conversation.
    pub user_identifier: String,
    /// The conversation to delete.
    pub conversation_id: String,
}

/// Result of a delete.
#[derive(Clone, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeleteResponse {
    /// Whether the conversation was deleted.
    pub success: bool,
    /// The reason of a failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;

    #[test]
    fn test_ask_request_field_names() {
        let req = AskRequest {
            user_identifier: "u-1".to_owned(),
            topic_id: "mit".to_owned(),
            question: "Deadlines?".to_owned(),
            conversation_history: vec![Message::user("Hi")],
        };
        assert_eq!(
            serde_json::to_value(&req).unwrap(),
            json!({
                "userIdentifier": "u-1",
                "topicId": "mit",
                "question": "Deadlines?",
                "conversationHistory": [{ "role": "user", "content": "Hi" }],
            })
        );
    }

    #[test]
    fn test_save_request_omits_absent_id() {
        let req = SaveRequest {
            user_identifier: "u-1".to_owned(),
            topic_id: "mit".to_owned(),
            topic_display_name: "MIT".to_owned(),
            messages: vec![],
            conversation_id: None,
            title: None,
        };
        let value = serde_json::to_value(&req).unwrap();
        assert!(value.get("conversationId").is_none());
        assert!(value.get("title").is_none());
    }

    #[test]
    fn test_partial_ask_response() {
        let resp: AskResponse = serde_json::from_value(json!({
            "success": false,
            "error": "quota exceeded",
        }))
        .unwrap();
        assert!(!resp.success);
        assert_eq!(resp.error.as_deref(), Some("quota exceeded"));
        assert!(resp.answer.is_none());
        assert!(resp.suggested_follow_ups.is_none());
    }
}
