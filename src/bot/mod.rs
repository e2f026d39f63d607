/// Update handlers
pub mod handlers;
/// Text and media delivery
pub mod messaging;
/// Telegram calls with retry
pub mod resilient;
/// Telegram chat transport
pub mod telegram;
/// Transport seam
pub mod transport;

pub use telegram::TelegramTransport;
pub use transport::ChatTransport;
