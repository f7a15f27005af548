//! Outbound line format for agent processes.
//!
//! One JSON object per line: `{role, content, timestamp}` plus `metadata`
//! when present. With attachments, `content` becomes an array of typed parts.

use serde::Serialize;
use serde_json::Value;

use conclave_protocols::types::{
    AgentMessage, AttachmentKind, Metadata, MessageRole, ToolCall,
};

#[derive(Serialize)]
struct OutboundLine<'a> {
    role: MessageRole,
    content: OutboundContent<'a>,
    timestamp: String,
    #[serde(skip_serializing_if = "no_metadata")]
    metadata: &'a Metadata,
}

fn no_metadata(metadata: &&Metadata) -> bool {
    metadata.is_empty()
}

#[derive(Serialize)]
#[serde(untagged)]
enum OutboundContent<'a> {
    Text(&'a str),
    Parts(Vec<ContentPart<'a>>),
}

#[derive(Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
enum ContentPart<'a> {
    Text {
        text: &'a str,
    },
    Image {
        media_type: &'a str,
        data: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<&'a str>,
    },
    Document {
        media_type: &'a str,
        data: &'a str,
        #[serde(skip_serializing_if = "Option::is_none")]
        name: Option<&'a str>,
    },
}

/// Encode `message` as one newline-terminated line.
pub fn encode_message(message: &AgentMessage) -> Result<String, serde_json::Error> {
    let content = if message.attachments.is_empty() {
        OutboundContent::Text(&message.content)
    } else {
        let mut parts = Vec::with_capacity(message.attachments.len() + 1);
        if !message.content.is_empty() {
            parts.push(ContentPart::Text {
                text: &message.content,
            });
        }
        for attachment in &message.attachments {
            let media_type = attachment.media_type.as_str();
            let data = attachment.data.as_str();
            let name = attachment.name.as_deref();
            parts.push(match attachment.kind {
                AttachmentKind::Image => ContentPart::Image { media_type, data, name },
                AttachmentKind::Document => ContentPart::Document { media_type, data, name },
            });
        }
        OutboundContent::Parts(parts)
    };

    let line = OutboundLine {
        role: message.role,
        content,
        timestamp: message.timestamp.to_rfc3339(),
        metadata: &message.metadata,
    };
    let mut encoded = serde_json::to_string(&line)?;
    encoded.push('\n');
    Ok(encoded)
}

/// Tool-role message asking the process to run `call`.
pub fn tool_message(call: &ToolCall) -> AgentMessage {
    let payload = serde_json::json!({
        "tool_call": {
            "id": call.id,
            "name": call.name,
            "parameters": call.parameters,
        }
    });
    AgentMessage::tool(payload.to_string())
        .with_metadata("tool_call_id", Value::String(call.id.clone()))
}
