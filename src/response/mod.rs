//! Agent output interpretation and multi-modal response assembly
//!
//! Raw agent text is segmented into text and content references, optionally
//! voiced, then assembled into outbound messages with signed media URLs.

pub mod assembler;
pub mod materializer;
pub mod reference;
pub mod segment;
pub mod voice;

pub use assembler::{MessageAssembler, OutboundMessage};
pub use materializer::{ContentMaterializer, MaterializeError, SignedLocator};
pub use reference::{is_content_reference, ContentReference};
pub use segment::{segment, Segment};
pub use voice::VoiceAugmenter;
