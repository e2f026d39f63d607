#![deny(missing_docs)]
//! Companion bot
//!
//! A Telegram companion chatbot with a configurable personality. An LLM agent
//! plans each turn and may call tools (search, image and selfie generation,
//! spoken audio, reminders); its text answer is turned into an ordered list of
//! text and media messages.

/// Agent adapter and tools
pub mod agent;
/// Telegram bot implementation
pub mod bot;
/// Configuration management
pub mod config;
/// Logging setup and secret redaction
pub mod logging;
/// Bot personalities
pub mod personality;
/// Turn pipeline
pub mod pipeline;
/// Agent output interpretation and response assembly
pub mod response;
/// Deferred invocations (reminders)
pub mod scheduler;
/// Storage layer (R2/S3)
pub mod storage;
pub mod utils;
