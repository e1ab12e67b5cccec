use crate::schema::ParleyConfig;

use super::helpers::validate_range;

pub(crate) fn validate_server(errors: &mut Vec<String>, config: &ParleyConfig) {
    let server = &config.server;

    if server.host.trim().is_empty() {
        errors.push("server.host must not be empty".into());
    }
    validate_range(errors, "server.max_connections", server.max_connections, 1, 1_000_000);
    validate_range(
        errors,
        "server.handshake_timeout_secs",
        server.handshake_timeout_secs,
        1,
        120,
    );
    validate_range(errors, "server.ping_interval_secs", server.ping_interval_secs, 1, 3600);
    validate_range(errors, "server.idle_timeout_secs", server.idle_timeout_secs, 2, 86_400);
    if server.idle_timeout_secs <= server.ping_interval_secs {
        errors.push(format!(
            "server.idle_timeout_secs = {} must exceed server.ping_interval_secs = {}",
            server.idle_timeout_secs, server.ping_interval_secs
        ));
    }
    validate_range(errors, "server.max_frame_bytes", server.max_frame_bytes, 256, 16 * 1024 * 1024);
    validate_range(errors, "server.shutdown_grace_secs", server.shutdown_grace_secs, 0, 300);
}
