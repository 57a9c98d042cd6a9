pub mod classifier;
pub mod image_source;
pub mod llm;
pub mod pipeline;
pub mod progress;
pub mod templates;
