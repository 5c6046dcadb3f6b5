//! TCP path establishment: ordered proxy attempts, then a direct dial.

use std::fmt::Write as _;

use base64::Engine as _;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::{debug, warn};

use tether_protocol::{ProxyConfig, ProxyScheme};

use crate::error::ConnectError;

/// Dial the endpoint, trying proxy entries in order.
///
/// `direct` entries mean "no proxy" and contribute nothing; unknown
/// schemes are logged and skipped, never fatal. When no proxy entry
/// produces a stream, the endpoint is dialed directly.
pub(crate) async fn dial(
    host: &str,
    port: u16,
    proxies: &[ProxyConfig],
) -> Result<TcpStream, ConnectError> {
    for proxy in proxies {
        match proxy.scheme {
            ProxyScheme::Direct => continue,
            ProxyScheme::Http => match http_connect(proxy, host, port).await {
                Ok(stream) => {
                    debug!(%proxy, "connected through http proxy");
                    return Ok(stream);
                }
                Err(err) => warn!(%proxy, %err, "http proxy failed, trying next entry"),
            },
            ProxyScheme::Socks5 => match socks5_connect(proxy, host, port).await {
                Ok(stream) => {
                    debug!(%proxy, "connected through socks5 proxy");
                    return Ok(stream);
                }
                Err(err) => warn!(%proxy, %err, "socks5 proxy failed, trying next entry"),
            },
            ProxyScheme::Other(ref scheme) => {
                warn!(%proxy, scheme = scheme.as_str(), "unsupported proxy type, skipping");
            }
        }
    }
    Ok(TcpStream::connect((host, port)).await?)
}

// ─────────────────────────────────────────────────────────────────────────────
// HTTP CONNECT
// ─────────────────────────────────────────────────────────────────────────────

async fn http_connect(
    proxy: &ProxyConfig,
    host: &str,
    port: u16,
) -> Result<TcpStream, ConnectError> {
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;

    let mut request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n");
    if let Some(credentials) = basic_credentials(proxy) {
        let _ = write!(request, "Proxy-Authorization: Basic {credentials}\r\n");
    }
    request.push_str("\r\n");
    stream.write_all(request.as_bytes()).await?;

    let head = read_response_head(&mut stream, proxy).await?;
    let status = head.lines().next().unwrap_or_default();
    if status.split_whitespace().nth(1) != Some("200") {
        return Err(proxy_err(
            proxy,
            format!("CONNECT rejected: {}", status.trim()),
        ));
    }
    Ok(stream)
}

/// Read up to the blank line ending the CONNECT response head, one byte at
/// a time so no tunneled bytes are consumed.
async fn read_response_head(
    stream: &mut TcpStream,
    proxy: &ProxyConfig,
) -> Result<String, ConnectError> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() > 16 * 1024 {
            return Err(proxy_err(proxy, "oversized CONNECT response"));
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(proxy_err(proxy, "proxy closed the connection mid-handshake"));
        }
        head.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}

fn basic_credentials(proxy: &ProxyConfig) -> Option<String> {
    let username = proxy.username.as_deref()?;
    let password = proxy.password.as_deref().unwrap_or_default();
    Some(base64::engine::general_purpose::STANDARD.encode(format!("{username}:{password}")))
}

// ─────────────────────────────────────────────────────────────────────────────
// SOCKS5
// ─────────────────────────────────────────────────────────────────────────────

const SOCKS_VERSION: u8 = 0x05;

async fn socks5_connect(
    proxy: &ProxyConfig,
    host: &str,
    port: u16,
) -> Result<TcpStream, ConnectError> {
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;

    let with_auth = proxy.username.is_some();
    let method: u8 = if with_auth { 0x02 } else { 0x00 };
    stream.write_all(&[SOCKS_VERSION, 1, method]).await?;

    let mut reply = [0u8; 2];
    stream.read_exact(&mut reply).await?;
    if reply[0] != SOCKS_VERSION || reply[1] != method {
        return Err(proxy_err(
            proxy,
            format!("greeting rejected (method {:#04x})", reply[1]),
        ));
    }

    if with_auth {
        let username = proxy.username.as_deref().unwrap_or_default();
        let password = proxy.password.as_deref().unwrap_or_default();
        if username.len() > 255 || password.len() > 255 {
            return Err(proxy_err(proxy, "credentials longer than 255 bytes"));
        }
        let mut auth = vec![0x01, username.len() as u8];
        auth.extend_from_slice(username.as_bytes());
        auth.push(password.len() as u8);
        auth.extend_from_slice(password.as_bytes());
        stream.write_all(&auth).await?;

        let mut auth_reply = [0u8; 2];
        stream.read_exact(&mut auth_reply).await?;
        if auth_reply[1] != 0x00 {
            return Err(proxy_err(proxy, "credentials rejected"));
        }
    }

    if host.len() > 255 {
        return Err(proxy_err(proxy, "hostname longer than 255 bytes"));
    }
    let mut request = vec![SOCKS_VERSION, 0x01, 0x00, 0x03, host.len() as u8];
    request.extend_from_slice(host.as_bytes());
    request.extend_from_slice(&port.to_be_bytes());
    stream.write_all(&request).await?;

    let mut reply = [0u8; 4];
    stream.read_exact(&mut reply).await?;
    if reply[1] != 0x00 {
        return Err(proxy_err(
            proxy,
            format!("connect rejected: {}", socks5_reply_name(reply[1])),
        ));
    }

    // Drain the bound address: 4 (ipv4) or 16 (ipv6) bytes, or a
    // length-prefixed domain, plus 2 port bytes.
    let addr_len = match reply[3] {
        0x01 => 4,
        0x04 => 16,
        0x03 => {
            let mut len = [0u8; 1];
            stream.read_exact(&mut len).await?;
            len[0] as usize
        }
        other => return Err(proxy_err(proxy, format!("unknown address type {other:#04x}"))),
    };
    let mut bound = vec![0u8; addr_len + 2];
    stream.read_exact(&mut bound).await?;

    Ok(stream)
}

fn socks5_reply_name(code: u8) -> &'static str {
    match code {
        0x01 => "general failure",
        0x02 => "connection not allowed",
        0x03 => "network unreachable",
        0x04 => "host unreachable",
        0x05 => "connection refused",
        0x06 => "ttl expired",
        0x07 => "command not supported",
        0x08 => "address type not supported",
        _ => "unknown error",
    }
}

fn proxy_err(proxy: &ProxyConfig, reason: impl Into<String>) -> ConnectError {
    ConnectError::ProxyHandshake {
        proxy: proxy.to_string(),
        reason: reason.into(),
    }
}
