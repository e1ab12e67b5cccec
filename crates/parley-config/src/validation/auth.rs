use std::collections::HashSet;

use crate::schema::{BoundaryKind, ParleyConfig};

use super::helpers::validate_range;

const MIN_PUBLISHER_SECRET_LEN: usize = 16;

/// Validate a channel grant pattern. Returns the problem, if any.
fn pattern_problem(pattern: &str) -> Option<&'static str> {
    if pattern.is_empty() {
        return Some("empty pattern");
    }
    let parts: Vec<&str> = pattern.split('.').collect();
    for (i, part) in parts.iter().enumerate() {
        if part.is_empty() {
            return Some("empty segment in pattern");
        }
        if *part == ">" && i != parts.len() - 1 {
            return Some("> wildcard can only be at the end");
        }
    }
    None
}

pub(crate) fn validate_auth(errors: &mut Vec<String>, config: &ParleyConfig) {
    let auth = &config.auth;
    validate_range(errors, "auth.timeout_ms", auth.timeout_ms, 10, 60_000);

    if let Some(secret) = &auth.publisher_secret {
        if secret.len() < MIN_PUBLISHER_SECRET_LEN {
            errors.push(format!(
                "auth.publisher_secret must be at least {MIN_PUBLISHER_SECRET_LEN} characters"
            ));
        }
    }

    if auth.boundary == BoundaryKind::Http {
        for (name, url) in [
            ("auth.http.identity_url", &auth.http.identity_url),
            ("auth.http.access_url", &auth.http.access_url),
        ] {
            if !(url.starts_with("http://") || url.starts_with("https://")) {
                errors.push(format!("{name} = {url:?} is not an http(s) URL"));
            }
        }
    }

    let mut seen = HashSet::new();
    for (i, grant) in auth.tokens.iter().enumerate() {
        if grant.token.is_empty() {
            errors.push(format!("auth.tokens[{i}].token must not be empty"));
        } else if !seen.insert(grant.token.as_str()) {
            errors.push(format!("auth.tokens[{i}].token is a duplicate"));
        }
        if Some(&grant.token) == auth.publisher_secret.as_ref() {
            errors.push(format!("auth.tokens[{i}].token collides with auth.publisher_secret"));
        }
        for pattern in &grant.channels {
            if let Some(problem) = pattern_problem(pattern) {
                errors.push(format!("auth.tokens[{i}].channels {pattern:?}: {problem}"));
            }
        }
    }
}
