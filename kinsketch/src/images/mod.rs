//! Image generation and storage module
//!
//! Provides:
//! - Conversation-to-image bridge over a remote text model
//! - Per-session content-addressed gallery

mod gen;
mod store;

pub use gen::{
    build_prompt, context_window, decode_image, extract_base64_image, generate_image,
    ConversationTurn, GenerateError, GenerateOptions, GeneratedImage, Role,
    DEFAULT_CONTEXT_WINDOW, IMAGE_INSTRUCTION,
};
pub use store::{Gallery, ImageData, ImageSummary, MAX_THUMBNAILS};
