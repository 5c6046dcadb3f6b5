//! Connection establishment: headers, TLS, and writer/handle wiring.
//!
//! One call to [`connect`] performs one attempt. On success the inbound
//! reader is installed and the session is bound (draining any backlog)
//! *before* the handle is returned, so no outbound call can race ahead of
//! the binding.

use std::sync::Arc;

use futures_util::StreamExt;
use tokio_tungstenite::tungstenite::client::IntoClientRequest;
use tokio_tungstenite::tungstenite::handshake::client::Request;
use tokio_tungstenite::tungstenite::http::header::{
    HeaderName, HeaderValue, AUTHORIZATION, ORIGIN, USER_AGENT,
};
use tokio_tungstenite::tungstenite::http::Uri;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{client_async_tls_with_config, Connector};
use tracing::{debug, info, warn};
use uuid::Uuid;

use tether_protocol::{CloseInfo, ProxyConfig};
use tether_transport::{
    inbound_websocket_config, ConnectionHandle, ConnectionState, InboundSink, MessageTransport,
    OutboundWriter, SessionState, TransportError, WsSession, WsSource,
};

use crate::dial::dial;
use crate::error::ConnectError;

/// Everything needed for one connection attempt.
pub struct ConnectOptions {
    /// `ws://` or `wss://` endpoint.
    pub url: String,
    /// Explicit Origin header; derived from the endpoint when `None`.
    pub origin: Option<String>,
    pub user_agent: String,
    pub client_version: String,
    /// Bearer token for the Authorization header.
    pub token: String,
    /// Proxy entries, tried in order; `direct` and unknown types are
    /// skipped (the latter with a warning).
    pub proxies: Vec<ProxyConfig>,
    /// Custom TLS connector; platform roots when `None`.
    pub tls: Option<Connector>,
}

/// Establish one connection, wire it into `writer` and `inbound`, and
/// return the handle over its lifetime.
///
/// Handshake failures are the only errors returned here; once this
/// resolves `Ok`, every later outcome is delivered through the handle.
pub async fn connect(
    opts: ConnectOptions,
    writer: Arc<OutboundWriter<WsSession>>,
    inbound: Arc<dyn InboundSink>,
) -> Result<ConnectionHandle, ConnectError> {
    let request = build_request(&opts)?;
    let (host, port) = endpoint_parts(request.uri())?;

    let stream = dial(&host, port, &opts.proxies).await?;
    let (ws, _response) =
        client_async_tls_with_config(request, stream, Some(inbound_websocket_config()), opts.tls)
            .await?;
    let (sink, source) = ws.split();

    let state = SessionState::new();
    let session = WsSession::new(sink, state.clone());
    let session_id = session.id();
    let handle = ConnectionHandle::new(state.clone());

    tokio::spawn(read_loop(
        source,
        inbound,
        handle.clone(),
        state,
        writer.clone(),
        session_id,
    ));
    writer.bind(session).await;
    handle.mark_open();
    info!(url = %opts.url, "connected");
    Ok(handle)
}

/// Derive the default Origin (`http(s)://<host>/`) from the endpoint URL.
pub fn derive_origin(url: &str) -> String {
    let (scheme, rest) = match url.split_once("://") {
        Some(("wss", rest)) => ("https", rest),
        Some((_, rest)) => ("http", rest),
        None => ("http", url),
    };
    let authority = rest.split(['/', '?', '#']).next().unwrap_or("");
    let host = authority.rsplit_once('@').map_or(authority, |(_, host)| host);
    let host = host.split(':').next().unwrap_or("");
    if host.is_empty() {
        format!("{scheme}://localhost/")
    } else {
        format!("{scheme}://{host}/")
    }
}

fn build_request(opts: &ConnectOptions) -> Result<Request, ConnectError> {
    let mut request =
        opts.url
            .as_str()
            .into_client_request()
            .map_err(|err| ConnectError::InvalidUrl {
                url: opts.url.clone(),
                reason: err.to_string(),
            })?;

    let origin = opts
        .origin
        .clone()
        .unwrap_or_else(|| derive_origin(&opts.url));

    let headers = request.headers_mut();
    headers.insert(ORIGIN, header_value(&origin)?);
    headers.insert(
        AUTHORIZATION,
        header_value(&format!("Bearer {}", opts.token))?,
    );
    headers.insert(USER_AGENT, header_value(&opts.user_agent)?);
    headers.insert(
        HeaderName::from_static("x-client-version"),
        header_value(&opts.client_version)?,
    );
    Ok(request)
}

fn header_value(value: &str) -> Result<HeaderValue, ConnectError> {
    HeaderValue::from_str(value).map_err(|_| ConnectError::InvalidHeader(value.to_string()))
}

fn endpoint_parts(uri: &Uri) -> Result<(String, u16), ConnectError> {
    let host = uri
        .host()
        .ok_or_else(|| ConnectError::InvalidUrl {
            url: uri.to_string(),
            reason: "missing host".into(),
        })?
        .to_string();
    let port = uri.port_u16().unwrap_or(match uri.scheme_str() {
        Some("wss") => 443,
        _ => 80,
    });
    Ok((host, port))
}

/// Owns the receive half until the handle reaches a terminal state, then
/// releases the writer binding exactly once.
async fn read_loop(
    mut source: WsSource,
    inbound: Arc<dyn InboundSink>,
    handle: ConnectionHandle,
    state: SessionState,
    writer: Arc<OutboundWriter<WsSession>>,
    session_id: Uuid,
) {
    let mut lifecycle = handle.subscribe();
    loop {
        tokio::select! {
            _ = lifecycle.wait_for(ConnectionState::is_terminal) => {
                debug!("connection reached a terminal state, stopping reader");
                break;
            }
            incoming = source.next() => match incoming {
                Some(Ok(Message::Text(text))) => inbound.on_message(text.as_str().to_owned()),
                Some(Ok(Message::Close(frame))) => {
                    let info = frame
                        .map(|frame| CloseInfo::new(u16::from(frame.code), frame.reason.as_str()))
                        .unwrap_or_else(CloseInfo::no_status);
                    info!(%info, "session closed by peer");
                    // Closed before resolved: a send racing this teardown
                    // must buffer, not hit the dying session.
                    state.mark_closed();
                    handle.complete_closed(info);
                    break;
                }
                Some(Ok(Message::Binary(payload))) => {
                    debug!(len = payload.len(), "ignoring binary message on text protocol");
                }
                Some(Ok(_)) => {} // ping/pong are answered by the library
                Some(Err(err)) => {
                    warn!(%err, "session errored");
                    state.mark_closed();
                    handle.complete_errored(TransportError::from(err));
                    break;
                }
                None => {
                    state.mark_closed();
                    handle.complete_errored(TransportError::UnexpectedEof);
                    break;
                }
            }
        }
    }
    state.mark_closed();
    writer.release(session_id).await;
}
