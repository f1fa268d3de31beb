//! Structured Logging with Sensitive Data Redaction
//!
//! `init_logging` installs the process-wide `tracing` subscriber. Each
//! invocation then carries its own span, so request ids and message ids are
//! attached to every event without mutating global state.
//!
//! Redaction helpers shorten addresses and hashes and hide secrets before
//! they reach a log field.

use tracing_subscriber::{fmt, EnvFilter};

/// Install the global subscriber. Safe to call more than once.
pub fn init_logging(level: &str, json: bool) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    if json {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .json()
            .with_current_span(true)
            .with_writer(std::io::stderr)
            .try_init();
    } else {
        let _ = fmt::Subscriber::builder()
            .with_env_filter(env_filter)
            .pretty()
            .with_writer(std::io::stderr)
            .try_init();
    }
}

/// Fully redact a sensitive value
pub fn redact_value(value: &str) -> String {
    if value.is_empty() {
        return "[EMPTY]".to_string();
    }

    let len = value.chars().count();
    if len <= 4 {
        "[REDACTED]".to_string()
    } else {
        format!("[REDACTED:{}chars]", len)
    }
}

/// Partially redact an address (show prefix and last 4 chars)
pub fn redact_address(address: &str) -> String {
    let trimmed = address.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    // names such as "mara.eth" are not secret
    if !trimmed.starts_with("0x") {
        return trimmed.to_string();
    }

    let prefix_len = 8;
    let suffix_len = 4;
    if trimmed.len() <= prefix_len + suffix_len + 3 {
        return redact_value(trimmed);
    }

    keep_ends(trimmed, prefix_len, suffix_len).unwrap_or_else(|| redact_value(trimmed))
}

/// Partially redact a hash (show first 10 and last 6 chars)
pub fn redact_hash(hash: &str) -> String {
    let trimmed = hash.trim();

    if trimmed.is_empty() {
        return "[EMPTY]".to_string();
    }

    if trimmed.len() <= 20 {
        return trimmed.to_string();
    }

    let prefix_len = if trimmed.starts_with("0x") { 12 } else { 10 };
    let suffix_len = 6;

    keep_ends(trimmed, prefix_len, suffix_len).unwrap_or_else(|| redact_value(trimmed))
}

/// `None` when either cut would split a character
fn keep_ends(value: &str, prefix_len: usize, suffix_len: usize) -> Option<String> {
    let head = value.get(..prefix_len)?;
    let tail = value.get(value.len().checked_sub(suffix_len)?..)?;
    Some(format!("{}...{}", head, tail))
}

/// Redact a connection string down to its scheme and host
pub fn redact_dsn(dsn: &str) -> String {
    match url::Url::parse(dsn) {
        Ok(url) => format!("{}://{}", url.scheme(), url.host_str().unwrap_or("?")),
        Err(_) => redact_value(dsn),
    }
}
