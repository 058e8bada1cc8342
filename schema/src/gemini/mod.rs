mod content;
mod generation;
mod request;
mod response;
mod tool;

pub use content::{Content, Part};
pub use generation::GenerationConfig;
pub use request::GenerateContentRequest;
pub use response::{Candidate, GenerateContentResponse, UsageMetadata};
pub use tool::{FunctionDeclaration, Tool, ToolConfig};
