//! WebSocket upgrade with credential capture.
//!
//! The token comes from `Authorization: Bearer <token>` or, for browsers that
//! cannot set headers on a WebSocket, the `token` query parameter. The header
//! wins when both are present.

use std::net::SocketAddr;

use parley_common::HubError;
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::handshake::server::{ErrorResponse, Request, Response};
use tokio_tungstenite::tungstenite::http::header::AUTHORIZATION;
use tokio_tungstenite::tungstenite::protocol::WebSocketConfig;
use tokio_tungstenite::{accept_hdr_async_with_config, WebSocketStream};

use super::TransportSettings;
use crate::connection::Credentials;

const BEARER: &str = "Bearer ";

/// Pull the client token out of an upgrade request.
pub(crate) fn token_from_request(req: &Request) -> Option<String> {
    let header = req
        .headers()
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| value.strip_prefix(BEARER))
        .map(str::trim)
        .filter(|token| !token.is_empty());
    if let Some(token) = header {
        return Some(token.to_string());
    }

    req.uri()
        .query()?
        .split('&')
        .find_map(|pair| pair.strip_prefix("token="))
        .filter(|token| !token.is_empty())
        .map(str::to_string)
}

fn ws_config(settings: &TransportSettings) -> WebSocketConfig {
    let mut config = WebSocketConfig::default();
    config.max_message_size = Some(settings.max_frame_bytes);
    config.max_frame_size = Some(settings.max_frame_bytes);
    config
}

/// Complete the upgrade within the handshake timeout.
pub(crate) async fn accept(
    stream: TcpStream,
    peer: SocketAddr,
    settings: &TransportSettings,
) -> Result<(WebSocketStream<TcpStream>, Credentials), HubError> {
    let mut token = None;
    let callback = |req: &Request, response: Response| -> Result<Response, ErrorResponse> {
        token = token_from_request(req);
        Ok(response)
    };

    let upgrade = accept_hdr_async_with_config(stream, callback, Some(ws_config(settings)));
    let ws = match tokio::time::timeout(settings.handshake_timeout, upgrade).await {
        Ok(Ok(ws)) => ws,
        Ok(Err(e)) => return Err(HubError::Protocol(format!("handshake failed: {e}"))),
        Err(_) => {
            return Err(HubError::Protocol(format!(
                "handshake not completed within {}s",
                settings.handshake_timeout.as_secs()
            )))
        }
    };

    Ok((
        ws,
        Credentials {
            token,
            peer: Some(peer),
        },
    ))
}
