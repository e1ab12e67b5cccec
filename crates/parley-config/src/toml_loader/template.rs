//! Default TOML config template with inline documentation comments.

/// Generate the default TOML config content with comments.
pub(crate) fn default_config_toml() -> String {
    r##"# Parley hub configuration
# Schema version 1
# Only override what you want to change -- missing fields use defaults.

[server]
# host = "127.0.0.1"
# port = 8080
# max_connections = 10000      # 1-1000000
# handshake_timeout_secs = 10  # 1-120
# ping_interval_secs = 30      # 1-3600
# idle_timeout_secs = 120      # must exceed ping_interval_secs
# max_frame_bytes = 65536      # 256-16777216
# shutdown_grace_secs = 5      # 0-300

[channels]
# outbound_queue = 256                      # frames buffered per connection
# max_channels_per_connection = 100
# client_events = ["private", "presence"]   # kinds allowing client-* events
# client_publish = []                       # kinds allowing plain client publishes

[auth]
# boundary = "static"          # static, http, deny
# timeout_ms = 2000            # 10-60000
# publisher_secret = "change-me-to-a-long-random-string"

# [[auth.tokens]]
# token = "ann-secret-token"
# identity = { id = 1, name = "Ann" }
# channels = ["private-chat.*", "presence-room.>"]

# [auth.http]
# identity_url = "http://127.0.0.1:8000/broadcasting/identity"
# access_url = "http://127.0.0.1:8000/broadcasting/auth"

[logging]
# level = "info"               # trace, debug, info, warn, error
"##
    .to_string()
}
