use crate::config::HttpSettings;
use reqwest::Client;
use std::time::Duration;

/// Shared client for the product directory and media library adapters.
pub fn build_client(settings: &HttpSettings) -> Client {
    Client::builder()
        .timeout(Duration::from_secs(settings.timeout_secs))
        .connect_timeout(Duration::from_secs(settings.connect_timeout_secs))
        .user_agent(concat!("sku-media-sync/", env!("CARGO_PKG_VERSION")))
        .build()
        .unwrap_or_else(|_| Client::new())
}

/// Keeps upstream error bodies readable in logs.
pub fn truncate_body(body: &str) -> String {
    const MAX_CHARS: usize = 512;
    let trimmed = body.trim();
    if trimmed.chars().count() <= MAX_CHARS {
        return trimmed.to_string();
    }
    let mut out: String = trimmed.chars().take(MAX_CHARS).collect();
    out.push('…');
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn truncate_body_keeps_short_bodies() {
        assert_eq!(truncate_body("  {\"code\":\"x\"} "), "{\"code\":\"x\"}");
    }

    #[test]
    fn truncate_body_cuts_long_bodies_on_char_boundary() {
        let body = "é".repeat(600);
        let out = truncate_body(&body);
        assert_eq!(out.chars().count(), 513);
        assert!(out.ends_with('…'));
    }
}
