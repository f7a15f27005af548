//! Chat-completions request types.

use serde::Serialize;

use conclave_protocols::types::{AgentMessage, AttachmentKind, MessageRole, ToolCall};

#[derive(Debug, Serialize)]
pub struct ChatRequest<'a> {
    pub model: &'a str,
    pub messages: Vec<&'a ChatMessage>,
    pub stream: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_tokens: Option<u32>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub temperature: Option<f32>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tools: Vec<serde_json::Value>,
}

/// One conversation turn as the provider sees it.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ChatMessage {
    pub role: &'static str,
    pub content: ChatContent,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub tool_calls: Vec<ApiToolCall>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tool_call_id: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum ChatContent {
    Text(String),
    Parts(Vec<ContentPart>),
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum ContentPart {
    Text { text: String },
    ImageUrl { image_url: ImageUrl },
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ImageUrl {
    pub url: String,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiToolCall {
    pub id: String,
    #[serde(rename = "type")]
    pub call_type: &'static str,
    pub function: ApiFunctionCall,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ApiFunctionCall {
    pub name: String,
    pub arguments: String,
}

fn role_name(role: MessageRole) -> &'static str {
    match role {
        MessageRole::System => "system",
        MessageRole::User => "user",
        MessageRole::Assistant => "assistant",
        MessageRole::Tool => "tool",
    }
}

impl ChatMessage {
    pub fn system(text: impl Into<String>) -> Self {
        Self {
            role: "system",
            content: ChatContent::Text(text.into()),
            tool_calls: Vec::new(),
            tool_call_id: None,
        }
    }

    /// Assistant turn produced by a completed exchange.
    pub fn assistant(content: impl Into<String>, calls: &[ToolCall]) -> Self {
        Self {
            role: "assistant",
            content: ChatContent::Text(content.into()),
            tool_calls: calls
                .iter()
                .map(|call| ApiToolCall {
                    id: call.id.clone(),
                    call_type: "function",
                    function: ApiFunctionCall {
                        name: call.name.clone(),
                        arguments: call.parameters.to_string(),
                    },
                })
                .collect(),
            tool_call_id: None,
        }
    }
}

impl From<&AgentMessage> for ChatMessage {
    fn from(message: &AgentMessage) -> Self {
        // Documents have no portable chat-completions part; they travel as text.
        let content = if message.attachments.is_empty() {
            ChatContent::Text(message.content.clone())
        } else {
            let mut parts = vec![ContentPart::Text {
                text: message.content.clone(),
            }];
            for attachment in &message.attachments {
                parts.push(match attachment.kind {
                    AttachmentKind::Image => ContentPart::ImageUrl {
                        image_url: ImageUrl {
                            url: format!(
                                "data:{};base64,{}",
                                attachment.media_type, attachment.data
                            ),
                        },
                    },
                    AttachmentKind::Document => ContentPart::Text {
                        text: format!(
                            "[document {}: {}]",
                            attachment.name.as_deref().unwrap_or("attachment"),
                            attachment.media_type
                        ),
                    },
                });
            }
            ChatContent::Parts(parts)
        };

        Self {
            role: role_name(message.role),
            content,
            tool_calls: Vec::new(),
            tool_call_id: message
                .metadata
                .get("tool_call_id")
                .and_then(|v| v.as_str())
                .map(str::to_string),
        }
    }
}
