//! Logging setup
//!
//! Log output passes through a writer that masks secrets (bot token, storage
//! keys, API keys, presigned URL signatures) before it reaches stderr.

use regex::Regex;
use std::io::{self, Write};
use std::sync::Arc;
use tracing::subscriber::DefaultGuard;
use tracing_subscriber::{prelude::*, EnvFilter};

/// Regex patterns for redacting sensitive data
pub struct RedactionPatterns {
    rules: Vec<(Regex, &'static str)>,
}

impl RedactionPatterns {
    /// Compiles all patterns
    ///
    /// # Errors
    ///
    /// Returns an error if any regex pattern is invalid
    pub fn new() -> Result<Self, regex::Error> {
        let rules = [
            (r"(https?://[^/]+/bot)([0-9]+:[A-Za-z0-9_-]+)(/['\s]*)", "$1[TELEGRAM_TOKEN]$3"),
            (r"([0-9]{8,10}:[A-Za-z0-9_-]{35})", "[TELEGRAM_TOKEN]"),
            (r"(bot[0-9]{8,10}:)[A-Za-z0-9_-]+", "$1[TELEGRAM_TOKEN]"),
            (r"R2_ACCESS_KEY_ID=[^\s&]+", "R2_ACCESS_KEY_ID=[MASKED]"),
            (r"R2_SECRET_ACCESS_KEY=[^\s&]+", "R2_SECRET_ACCESS_KEY=[MASKED]"),
            (r"'aws_access_key_id': '[^']*'", "'aws_access_key_id': '[MASKED]'"),
            (r"'aws_secret_access_key': '[^']*'", "'aws_secret_access_key': '[MASKED]'"),
            (r"ELEVENLABS_API_KEY=[^\s&]+", "ELEVENLABS_API_KEY=[MASKED]"),
            (r"(?i)(xi-api-key[\x22']?\s*[:=]\s*[\x22']?)[A-Za-z0-9_-]+", "$1[MASKED]"),
            (r"(Bearer\s+)[A-Za-z0-9._-]{8,}", "$1[MASKED]"),
            (r"(X-Amz-Signature=)[0-9a-fA-F]+", "$1[MASKED]"),
            (r"(X-Amz-Credential=)[^&\s]+", "$1[MASKED]"),
        ];

        Ok(Self {
            rules: rules
                .into_iter()
                .map(|(pattern, replacement)| Regex::new(pattern).map(|re| (re, replacement)))
                .collect::<Result<_, _>>()?,
        })
    }

    /// Returns `input` with every secret masked
    #[must_use]
    pub fn redact(&self, input: &str) -> String {
        self.rules
            .iter()
            .fold(input.to_string(), |acc, (re, replacement)| {
                re.replace_all(&acc, *replacement).into_owned()
            })
    }
}

struct RedactingWriter<W: Write> {
    inner: W,
    patterns: Arc<RedactionPatterns>,
}

impl<W: Write> Write for RedactingWriter<W> {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        let s = String::from_utf8_lossy(buf);
        let redacted = self.patterns.redact(&s);
        self.inner.write_all(redacted.as_bytes())?;
        // The caller's buffer was consumed in full, whatever the redacted length
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        self.inner.flush()
    }
}

struct RedactingMakeWriter<F> {
    make_inner: F,
    patterns: Arc<RedactionPatterns>,
}

impl<'a, F, W> tracing_subscriber::fmt::MakeWriter<'a> for RedactingMakeWriter<F>
where
    F: Fn() -> W + 'static,
    W: Write,
{
    type Writer = RedactingWriter<W>;

    fn make_writer(&'a self) -> Self::Writer {
        RedactingWriter {
            inner: (self.make_inner)(),
            patterns: Arc::clone(&self.patterns),
        }
    }
}

/// Installs the global subscriber: `RUST_LOG` filter (default `info`),
/// redacted output on stderr.
///
/// # Errors
///
/// Returns an error if the redaction patterns fail to compile.
pub fn init_logging() -> Result<(), regex::Error> {
    let patterns = Arc::new(RedactionPatterns::new()?);
    let make_writer = RedactingMakeWriter {
        make_inner: io::stderr,
        patterns,
    };
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    tracing_subscriber::registry()
        .with(filter)
        .with(tracing_subscriber::fmt::layer().with_writer(make_writer))
        .init();
    Ok(())
}

/// Silences all logging on the current thread until dropped
pub struct LoggingDisabled {
    _guard: DefaultGuard,
}

impl LoggingDisabled {
    /// Starts the silent scope
    #[must_use]
    pub fn new() -> Self {
        Self {
            _guard: tracing::subscriber::set_default(tracing::subscriber::NoSubscriber::default()),
        }
    }
}

impl Default for LoggingDisabled {
    fn default() -> Self {
        Self::new()
    }
}
