use std::sync::OnceLock;

use regex::Regex;

use crate::schema::ParleyConfig;

use super::helpers::validate_range;

/// Longest channel name the hub accepts, in bytes.
pub const CHANNEL_NAME_MAX_LEN: usize = 164;

fn channel_name_regex() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9_\-=@,.;]+$").expect("static regex"))
}

/// Check a channel name against the allowed alphabet and length.
pub fn is_valid_channel_name(name: &str) -> bool {
    name.len() <= CHANNEL_NAME_MAX_LEN && channel_name_regex().is_match(name)
}

pub(crate) fn validate_channels(errors: &mut Vec<String>, config: &ParleyConfig) {
    let channels = &config.channels;
    validate_range(errors, "channels.outbound_queue", channels.outbound_queue, 1, 1_000_000);
    validate_range(
        errors,
        "channels.max_channels_per_connection",
        channels.max_channels_per_connection,
        1,
        10_000,
    );
}
