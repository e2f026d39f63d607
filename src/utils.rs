//! Text helpers for chat delivery and retry of Telegram API calls

use anyhow::Result;
use std::time::Duration;
use tokio_retry::strategy::{jitter, ExponentialBackoff};
use tokio_retry::Retry;
use tracing::warn;
use unicode_segmentation::UnicodeSegmentation;

/// Splits `message` into parts of at most `max_chars` characters.
///
/// Breaks prefer paragraph boundaries, then line boundaries, then word
/// boundaries; a single word longer than the limit is cut between grapheme
/// clusters. Empty input yields no parts.
///
/// # Examples
///
/// ```
/// use companion_bot::utils::split_long_message;
/// let long_msg = "A very long message...\n".repeat(300);
/// let parts = split_long_message(&long_msg, 4000);
/// assert!(parts.len() > 1);
/// assert!(parts.iter().all(|p| p.chars().count() <= 4000));
/// ```
#[must_use]
pub fn split_long_message(message: &str, max_chars: usize) -> Vec<String> {
    let message = message.trim_end();
    if message.is_empty() || max_chars == 0 {
        return Vec::new();
    }
    if message.chars().count() <= max_chars {
        return vec![message.to_string()];
    }

    let mut parts = Vec::new();
    let mut current = String::new();
    let mut current_len = 0;

    for word in message.split_word_bounds() {
        let word_len = word.chars().count();

        if word_len > max_chars {
            for grapheme in word.graphemes(true) {
                let len = grapheme.chars().count();
                if current_len + len > max_chars {
                    flush(&mut parts, &mut current, &mut current_len);
                }
                current.push_str(grapheme);
                current_len += len;
            }
            continue;
        }

        if current_len + word_len > max_chars && word.trim().is_empty() {
            flush(&mut parts, &mut current, &mut current_len);
            continue;
        }

        if current_len + word_len > max_chars {
            let cut = best_break(&current);
            let carry = current.split_off(cut);
            flush(&mut parts, &mut current, &mut current_len);
            current = carry.trim_start().to_string();
            current_len = current.chars().count();
            if current_len + word_len > max_chars {
                flush(&mut parts, &mut current, &mut current_len);
            }
        }

        if current.is_empty() && word.trim().is_empty() {
            continue;
        }
        current.push_str(word);
        current_len += word_len;
    }

    flush(&mut parts, &mut current, &mut current_len);
    parts
}

/// Byte offset to cut a full buffer at: last paragraph break, else last line
/// break, else the whole buffer
fn best_break(buffer: &str) -> usize {
    buffer
        .rfind("\n\n")
        .or_else(|| buffer.rfind('\n'))
        .filter(|&pos| pos > 0)
        .unwrap_or(buffer.len())
}

fn flush(parts: &mut Vec<String>, current: &mut String, current_len: &mut usize) {
    let trimmed = current.trim();
    if !trimmed.is_empty() {
        parts.push(trimmed.to_string());
    }
    current.clear();
    *current_len = 0;
}

/// Safely truncates a string to a maximum character length (not bytes).
///
/// # Examples
///
/// ```
/// use companion_bot::utils::truncate_str;
/// assert_eq!(truncate_str("Привет, мир!", 6), "Привет");
/// ```
pub fn truncate_str(s: impl AsRef<str>, max_chars: usize) -> String {
    let s = s.as_ref();
    s.char_indices()
        .nth(max_chars)
        .map_or_else(|| s.to_string(), |(pos, _)| s[..pos].to_string())
}

/// Retries a Telegram API operation with exponential backoff and jitter.
///
/// Delays start at `TELEGRAM_API_INITIAL_BACKOFF_MS`, are capped at
/// `TELEGRAM_API_MAX_BACKOFF_MS`, and at most `TELEGRAM_API_MAX_RETRIES`
/// retries follow the first attempt.
///
/// # Errors
///
/// Returns the last error once every attempt has failed.
pub async fn retry_telegram_operation<F, Fut, T>(operation: F) -> Result<T>
where
    F: FnMut() -> Fut,
    Fut: std::future::Future<Output = Result<T>>,
{
    use crate::config::{
        TELEGRAM_API_INITIAL_BACKOFF_MS, TELEGRAM_API_MAX_BACKOFF_MS, TELEGRAM_API_MAX_RETRIES,
    };

    let retry_strategy = ExponentialBackoff::from_millis(TELEGRAM_API_INITIAL_BACKOFF_MS)
        .max_delay(Duration::from_millis(TELEGRAM_API_MAX_BACKOFF_MS))
        .map(jitter)
        .take(TELEGRAM_API_MAX_RETRIES);

    Retry::spawn(retry_strategy, operation).await.inspect_err(|e| {
        warn!(
            attempts = TELEGRAM_API_MAX_RETRIES + 1,
            error = %e,
            "Telegram API operation failed"
        );
    })
}
