pub mod gemini;
pub mod message;
pub mod upstream_envelope;

pub use gemini::{
    Content, FunctionDeclaration, GenerateContentResponse, GenerationConfig,
    GenerateContentRequest, Part, Tool, ToolConfig,
};
pub use message::{ContentBlock, MessageRequest, MessageResponse, Usage};
pub use upstream_envelope::UpstreamRequestEnvelope;
