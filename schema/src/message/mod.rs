mod content_block;
mod events;
mod request;
mod response;

pub use content_block::{ContentBlock, ImageSource, ToolDefinition, ToolResultContent};
pub use events::{
    ContentBlockDelta, MessageDelta, MessageStartPayload, MessageStreamEvent, StartBlock, StopReason,
};
pub use request::{Message, MessageRequest, Role, SystemPrompt, SystemTextBlock, ThinkingConfig};
pub use response::{MessageResponse, Usage};
