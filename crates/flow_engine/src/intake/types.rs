use std::fmt;

use serde::{Deserialize, Serialize};

/// Identifies one overlay, one per tracked video cell.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamId(pub String);

impl StreamId {
    pub fn new(id: impl Into<String>) -> Self {
        Self(id.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StreamId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StreamId {
    fn from(value: &str) -> Self {
        Self(value.to_string())
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rank {
    Owner,
    Moderator,
    Member,
    #[default]
    Normal,
}

impl Rank {
    pub const ALL: [Rank; 4] = [Rank::Owner, Rank::Moderator, Rank::Member, Rank::Normal];

    /// Unknown categories (super chats, missing values) display as normal.
    pub fn parse_lenient(raw: &str) -> Self {
        match raw.trim().to_ascii_lowercase().as_str() {
            "owner" => Rank::Owner,
            "moderator" => Rank::Moderator,
            "member" => Rank::Member,
            _ => Rank::Normal,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Rank::Owner => "owner",
            Rank::Moderator => "moderator",
            Rank::Member => "member",
            Rank::Normal => "normal",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Fragment {
    Text(String),
    Image { src: String, alt: String },
}

/// Canonical message handed to the placement engine. Immutable once built.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChatMessage {
    pub id: String,
    pub stream_id: StreamId,
    pub author: Option<String>,
    pub rank: Rank,
    pub fragments: Vec<Fragment>,
    pub avatar_ref: Option<String>,
}

impl ChatMessage {
    pub fn has_avatar(&self) -> bool {
        self.avatar_ref.is_some()
    }

    /// Text rendition with images replaced by their alt text.
    pub fn plain_text(&self) -> String {
        let mut output = String::new();
        for fragment in &self.fragments {
            match fragment {
                Fragment::Text(text) => output.push_str(text),
                Fragment::Image { alt, .. } => output.push_str(alt),
            }
        }
        output
    }
}

/// Raw record as delivered by the chat widget bridge. Nothing here is trusted.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InboundEvent {
    #[serde(alias = "videoId")]
    pub stream_id: String,
    #[serde(default)]
    pub id: Option<String>,
    #[serde(default)]
    pub author: Option<String>,
    #[serde(default, alias = "type")]
    pub rank: Option<String>,
    #[serde(default)]
    pub fragments: Option<Vec<InboundFragment>>,
    #[serde(default, alias = "avatar")]
    pub avatar_ref: Option<String>,
    #[serde(default)]
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum InboundFragment {
    Text {
        #[serde(default)]
        content: String,
    },
    #[serde(alias = "emoji")]
    Image {
        #[serde(default)]
        src: String,
        #[serde(default)]
        alt: String,
    },
    #[serde(other)]
    Unsupported,
}
