//! Tests for the full validation pipeline.

use super::*;
use crate::schema::*;
use parley_common::Identity;

fn grant(token: &str, channels: &[&str]) -> TokenGrant {
    TokenGrant {
        token: token.into(),
        identity: Identity::new(1),
        channels: channels.iter().map(|c| c.to_string()).collect(),
    }
}

#[test]
fn default_config_validates() {
    let config = ParleyConfig::default();
    assert!(validate(&config).is_ok());
}

#[test]
fn catches_zero_outbound_queue() {
    let mut config = ParleyConfig::default();
    config.channels.outbound_queue = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("channels.outbound_queue"));
}

#[test]
fn catches_zero_max_connections() {
    let mut config = ParleyConfig::default();
    config.server.max_connections = 0;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("server.max_connections"));
}

#[test]
fn catches_idle_timeout_not_exceeding_ping_interval() {
    let mut config = ParleyConfig::default();
    config.server.ping_interval_secs = 60;
    config.server.idle_timeout_secs = 60;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("must exceed server.ping_interval_secs"));
}

#[test]
fn catches_empty_host() {
    let mut config = ParleyConfig::default();
    config.server.host = "  ".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("server.host"));
}

#[test]
fn catches_short_publisher_secret() {
    let mut config = ParleyConfig::default();
    config.auth.publisher_secret = Some("short".into());
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("auth.publisher_secret"));
}

#[test]
fn catches_non_http_boundary_urls() {
    let mut config = ParleyConfig::default();
    config.auth.boundary = BoundaryKind::Http;
    config.auth.http.identity_url = "ftp://nope".into();
    config.auth.http.access_url = "http://app/auth".into();
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("auth.http.identity_url"));
    assert!(!err.contains("auth.http.access_url"));
}

#[test]
fn catches_duplicate_and_bad_tokens() {
    let mut config = ParleyConfig::default();
    config.auth.tokens = vec![
        grant("t1", &["private-chat.*"]),
        grant("t1", &[]),
        grant("", &[]),
        grant("t2", &[">.chat", "a..b"]),
    ];
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("auth.tokens[1].token is a duplicate"));
    assert!(err.contains("auth.tokens[2].token must not be empty"));
    assert!(err.contains("> wildcard can only be at the end"));
    assert!(err.contains("empty segment in pattern"));
}

#[test]
fn collects_multiple_errors() {
    let mut config = ParleyConfig::default();
    config.channels.outbound_queue = 0;
    config.auth.timeout_ms = 1;
    let err = validate(&config).unwrap_err().to_string();
    assert!(err.contains("channels.outbound_queue"));
    assert!(err.contains("auth.timeout_ms"));
    assert!(err.contains("; "));
}

#[test]
fn channel_name_rules() {
    assert!(is_valid_channel_name("public.chat"));
    assert!(is_valid_channel_name("presence-room.1"));
    assert!(is_valid_channel_name("private-user@example.com;x=1"));
    assert!(!is_valid_channel_name(""));
    assert!(!is_valid_channel_name("has space"));
    assert!(!is_valid_channel_name("slash/not/allowed"));
    assert!(is_valid_channel_name(&"a".repeat(CHANNEL_NAME_MAX_LEN)));
    assert!(!is_valid_channel_name(&"a".repeat(CHANNEL_NAME_MAX_LEN + 1)));
}
