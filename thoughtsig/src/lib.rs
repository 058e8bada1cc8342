mod engine;
mod normalize;

pub use engine::{CachedSignature, ThoughtSignatureCache};
pub use normalize::normalize_text_variants;
