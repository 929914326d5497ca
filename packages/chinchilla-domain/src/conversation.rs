use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
	User,
	Assistant,
}

/// One prior message of the conversation. Histories are ordered oldest first.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationTurn {
	pub role: Role,
	pub content: String,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatRole {
	System,
	User,
	Assistant,
}

/// A chat-completion message in the wire shape most providers accept.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
	pub role: ChatRole,
	pub content: String,
}
impl ChatMessage {
	pub fn system(content: impl Into<String>) -> Self {
		Self { role: ChatRole::System, content: content.into() }
	}

	pub fn user(content: impl Into<String>) -> Self {
		Self { role: ChatRole::User, content: content.into() }
	}

	pub fn assistant(content: impl Into<String>) -> Self {
		Self { role: ChatRole::Assistant, content: content.into() }
	}
}
impl From<&ConversationTurn> for ChatMessage {
	fn from(turn: &ConversationTurn) -> Self {
		match turn.role {
			Role::User => Self::user(turn.content.trim()),
			Role::Assistant => Self::assistant(turn.content.trim()),
		}
	}
}

/// Keeps the most recent `limit` turns that carry content, oldest first.
pub fn trim_history(history: &[ConversationTurn], limit: usize) -> Vec<ConversationTurn> {
	let usable: Vec<&ConversationTurn> =
		history.iter().filter(|turn| !turn.content.trim().is_empty()).collect();
	let skip = usable.len().saturating_sub(limit);

	usable.into_iter().skip(skip).cloned().collect()
}
