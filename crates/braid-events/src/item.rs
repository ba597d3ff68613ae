//! Unified conversation-item model
//!
//! Both input sources (the durable state snapshot and the live streaming
//! feed) are reduced to [`ConversationItem`]s, the single representation the
//! rendering layer consumes.

use chrono::{DateTime, FixedOffset};
use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};

/// What a conversation item renders as
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemKind {
    Message,
    Reasoning,
    ToolCall,
    ToolList,
    ApprovalRequest,
    WebSearch,
    Error,
    StatusPlaceholder,
}

impl ItemKind {
    /// Classify a raw type string into an item kind.
    ///
    /// The backend emits dotted, versioned type names, so matching is by
    /// substring category rather than exact value. Order matters:
    /// `mcp_list_tools` must win over the bare `mcp` check.
    pub fn classify(type_str: &str) -> Self {
        if type_str.contains("reasoning") {
            ItemKind::Reasoning
        } else if type_str.contains("web_search") {
            ItemKind::WebSearch
        } else if type_str.contains("mcp_list_tools") {
            ItemKind::ToolList
        } else if type_str.contains("mcp") {
            ItemKind::ToolCall
        } else if type_str.contains("approval") {
            ItemKind::ApprovalRequest
        } else if type_str.contains("status") {
            ItemKind::StatusPlaceholder
        } else {
            ItemKind::Message
        }
    }
}

/// Who authored a message item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    #[default]
    Assistant,
}

/// Lifecycle status of a conversation item
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    #[default]
    Pending,
    InProgress,
    Completed,
    Failed,
}

impl ItemStatus {
    /// Parse a loosely-specified status string from an item snapshot.
    pub fn parse(status: &str) -> Self {
        match status {
            "completed" | "done" | "success" => ItemStatus::Completed,
            "failed" | "error" => ItemStatus::Failed,
            "in_progress" | "running" | "streaming" => ItemStatus::InProgress,
            _ => ItemStatus::Pending,
        }
    }

    /// Check if this status is terminal (completed or failed)
    pub fn is_terminal(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Failed)
    }
}

/// Where an error item originated
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum ErrorSource {
    #[default]
    Backend,
    Network,
    Mcp,
    Model,
}

/// Error payload attached to error items and failed tool calls
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, Default)]
pub struct ErrorDetail {
    #[serde(default)]
    pub source: ErrorSource,
    #[serde(rename = "type", default)]
    pub error_type: Option<String>,
    #[serde(default)]
    pub message: String,
}

impl ErrorDetail {
    /// Create an error detail with a source and message
    pub fn new(source: ErrorSource, message: impl Into<String>) -> Self {
        Self {
            source,
            error_type: None,
            message: message.into(),
        }
    }
}

/// One tool advertised by an MCP server listing
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    #[serde(default)]
    pub description: Option<String>,
}

/// Item object embedded in lifecycle events and durable snapshots.
///
/// The raw `type` string is kept verbatim; [`ItemKind::classify`] turns it
/// into a display category.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ItemSnapshot {
    pub id: String,
    #[serde(rename = "type")]
    pub item_type: String,
    #[serde(default)]
    pub role: Option<Role>,
    /// Text content segments for message items
    #[serde(default)]
    pub content: Option<Vec<String>>,
    /// Reasoning summary segments
    #[serde(default)]
    pub summary: Option<Vec<String>>,
    /// Tool name for tool-call and approval items
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub arguments: Option<serde_json::Value>,
    #[serde(default)]
    pub output: Option<String>,
    /// Tool listing for mcp_list_tools items
    #[serde(default)]
    pub tools: Option<Vec<ToolDescriptor>>,
    /// Search query for web_search items
    #[serde(default)]
    pub query: Option<String>,
    #[serde(default)]
    pub status: Option<String>,
    #[serde(default)]
    pub error: Option<ErrorDetail>,
}

impl ItemSnapshot {
    /// Create a minimal snapshot with an id and type string
    pub fn new(id: impl Into<String>, item_type: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            item_type: item_type.into(),
            role: None,
            content: None,
            summary: None,
            name: None,
            arguments: None,
            output: None,
            tools: None,
            query: None,
            status: None,
            error: None,
        }
    }

    /// Create a message snapshot with text content
    pub fn message(id: impl Into<String>, role: Role, text: impl Into<String>) -> Self {
        let mut snap = Self::new(id, "message");
        snap.role = Some(role);
        snap.content = Some(vec![text.into()]);
        snap
    }

    /// The display kind of this snapshot
    pub fn kind(&self) -> ItemKind {
        ItemKind::classify(&self.item_type)
    }
}

/// Structured payload of a conversation item; one variant per kind
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum ItemPayload {
    Message {
        role: Role,
        segments: Vec<String>,
    },
    Reasoning {
        summary: Vec<String>,
    },
    ToolCall {
        name: Option<String>,
        arguments: Option<serde_json::Value>,
        output: Option<String>,
    },
    ToolList {
        tools: Vec<ToolDescriptor>,
    },
    Approval {
        name: Option<String>,
        arguments: Option<serde_json::Value>,
    },
    WebSearch {
        query: Option<String>,
    },
    Error {
        error: ErrorDetail,
    },
    Placeholder {
        label: Option<String>,
    },
}

impl ItemPayload {
    /// Build the payload variant matching a snapshot's kind
    pub fn from_snapshot(snap: &ItemSnapshot) -> Self {
        match snap.kind() {
            ItemKind::Message => ItemPayload::Message {
                role: snap.role.unwrap_or_default(),
                segments: snap.content.clone().unwrap_or_default(),
            },
            ItemKind::Reasoning => ItemPayload::Reasoning {
                summary: snap.summary.clone().unwrap_or_default(),
            },
            ItemKind::ToolCall => ItemPayload::ToolCall {
                name: snap.name.clone(),
                arguments: snap.arguments.clone(),
                output: snap.output.clone(),
            },
            ItemKind::ToolList => ItemPayload::ToolList {
                tools: snap.tools.clone().unwrap_or_default(),
            },
            ItemKind::ApprovalRequest => ItemPayload::Approval {
                name: snap.name.clone(),
                arguments: snap.arguments.clone(),
            },
            ItemKind::WebSearch => ItemPayload::WebSearch {
                query: snap.query.clone(),
            },
            ItemKind::Error => ItemPayload::Error {
                error: snap.error.clone().unwrap_or_default(),
            },
            ItemKind::StatusPlaceholder => ItemPayload::Placeholder {
                label: snap.content.as_ref().and_then(|c| c.first().cloned()),
            },
        }
    }

    /// Check if the primary content of this payload is empty
    pub fn is_empty(&self) -> bool {
        match self {
            ItemPayload::Message { segments, .. } => {
                segments.iter().all(|s| s.trim().is_empty())
            }
            ItemPayload::Reasoning { summary } => summary.iter().all(|s| s.trim().is_empty()),
            ItemPayload::ToolCall { name, output, .. } => name.is_none() && output.is_none(),
            ItemPayload::ToolList { tools } => tools.is_empty(),
            ItemPayload::Approval { name, .. } => name.is_none(),
            ItemPayload::WebSearch { query } => query.is_none(),
            ItemPayload::Error { .. } => false,
            ItemPayload::Placeholder { label } => label.is_none(),
        }
    }
}

/// The unit of display: one entry in the merged conversation
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ConversationItem {
    /// Stable identifier, unique within a conversation
    pub id: String,
    pub kind: ItemKind,
    /// RFC 3339 timestamp, when the source provided one
    #[serde(default)]
    pub timestamp: Option<String>,
    pub payload: ItemPayload,
    #[serde(default)]
    pub status: ItemStatus,
    /// True while the item is still being assembled from delta events
    #[serde(default)]
    pub is_streaming: bool,
    #[serde(default)]
    pub started_at: Option<String>,
    #[serde(default)]
    pub ended_at: Option<String>,
    #[serde(default)]
    pub duration_seconds: Option<i64>,
    /// Error detail for failed items
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<ErrorDetail>,
    /// Diagnostic back-reference to the last raw event that touched this item
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_event: Option<Box<crate::event::RawEvent>>,
}

impl ConversationItem {
    /// Build an item from a snapshot embedded in an event or durable list
    pub fn from_snapshot(snap: &ItemSnapshot) -> Self {
        Self {
            id: snap.id.clone(),
            kind: snap.kind(),
            timestamp: None,
            payload: ItemPayload::from_snapshot(snap),
            status: snap
                .status
                .as_deref()
                .map(ItemStatus::parse)
                .unwrap_or_default(),
            is_streaming: false,
            started_at: None,
            ended_at: None,
            duration_seconds: None,
            error: snap.error.clone(),
            source_event: None,
        }
    }

    /// Build an empty skeleton item for an id first seen via a delta or
    /// failure event, before any snapshot arrived.
    pub fn skeleton(id: impl Into<String>, kind: ItemKind) -> Self {
        let payload = match kind {
            ItemKind::Message => ItemPayload::Message {
                role: Role::Assistant,
                segments: vec![],
            },
            ItemKind::Reasoning => ItemPayload::Reasoning { summary: vec![] },
            ItemKind::ToolCall => ItemPayload::ToolCall {
                name: None,
                arguments: None,
                output: None,
            },
            ItemKind::ToolList => ItemPayload::ToolList { tools: vec![] },
            ItemKind::ApprovalRequest => ItemPayload::Approval {
                name: None,
                arguments: None,
            },
            ItemKind::WebSearch => ItemPayload::WebSearch { query: None },
            ItemKind::Error => ItemPayload::Error {
                error: ErrorDetail::default(),
            },
            ItemKind::StatusPlaceholder => ItemPayload::Placeholder { label: None },
        };
        Self {
            id: id.into(),
            kind,
            timestamp: None,
            payload,
            status: ItemStatus::Pending,
            is_streaming: false,
            started_at: None,
            ended_at: None,
            duration_seconds: None,
            error: None,
            source_event: None,
        }
    }

    /// Replace the payload's primary text field. Used both for recomputing
    /// a partially-streamed field from the buffer and for overlaying the
    /// complete text carried by a terminal event, which wins over any
    /// buffered reconstruction.
    pub fn set_text(&mut self, text: &str) {
        match &mut self.payload {
            ItemPayload::Message { segments, .. } => *segments = vec![text.to_string()],
            ItemPayload::Reasoning { summary } => *summary = vec![text.to_string()],
            ItemPayload::ToolCall { output, .. } => *output = Some(text.to_string()),
            ItemPayload::WebSearch { query } => *query = Some(text.to_string()),
            ItemPayload::Placeholder { label } => *label = Some(text.to_string()),
            _ => {}
        }
    }

    /// Absorb non-empty fields from a later snapshot of the same item.
    /// Empty snapshot fields never erase content already accumulated.
    pub fn absorb_snapshot(&mut self, snap: &ItemSnapshot) {
        let incoming = ItemPayload::from_snapshot(snap);
        if !incoming.is_empty() {
            self.payload = incoming;
        }
        if let Some(status) = snap.status.as_deref() {
            self.status = ItemStatus::parse(status);
        }
        if self.error.is_none() {
            self.error = snap.error.clone();
        }
    }

    /// Combined primary text of the payload (for display and tests)
    pub fn text(&self) -> String {
        match &self.payload {
            ItemPayload::Message { segments, .. } => segments.concat(),
            ItemPayload::Reasoning { summary } => summary.concat(),
            ItemPayload::ToolCall { output, .. } => output.clone().unwrap_or_default(),
            ItemPayload::WebSearch { query } => query.clone().unwrap_or_default(),
            ItemPayload::Error { error } => error.message.clone(),
            ItemPayload::Placeholder { label } => label.clone().unwrap_or_default(),
            _ => String::new(),
        }
    }

    /// Check if the item reached a terminal state
    pub fn is_terminal(&self) -> bool {
        self.status.is_terminal()
    }
}

/// Parse an RFC 3339 timestamp string
pub fn parse_timestamp(value: &str) -> Result<DateTime<FixedOffset>> {
    DateTime::parse_from_rfc3339(value).map_err(|_| Error::InvalidTimestamp(value.to_string()))
}
