//! HTTP `CONNECT` tunnelling for SSH sessions behind a forward proxy.

use anpost_common::ProxyConfig;
use data_encoding::BASE64;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};
use tokio::net::TcpStream;
use tracing::*;

const MAX_RESPONSE_HEAD: usize = 8 * 1024;

#[derive(thiserror::Error, Debug)]
pub enum ProxyError {
    #[error("proxy I/O error: {0}")]
    Io(#[from] std::io::Error),
    #[error("proxy closed the connection before answering")]
    UnexpectedEof,
    #[error("proxy response header too large")]
    ResponseTooLarge,
    #[error("proxy refused tunnel: {0}")]
    Refused(String),
}

/// Connects to the proxy and asks it to tunnel to `host:port`.
pub async fn connect_through(
    proxy: &ProxyConfig,
    host: &str,
    port: u16,
) -> Result<TcpStream, ProxyError> {
    debug!(proxy = %proxy.host, proxy_port = proxy.port, %host, port, "Opening proxy tunnel");
    let mut stream = TcpStream::connect((proxy.host.as_str(), proxy.port)).await?;
    establish_tunnel(&mut stream, host, port, proxy.credentials()).await?;
    Ok(stream)
}

pub async fn establish_tunnel<S: AsyncRead + AsyncWrite + Unpin>(
    stream: &mut S,
    host: &str,
    port: u16,
    credentials: Option<(&str, &str)>,
) -> Result<(), ProxyError> {
    stream
        .write_all(connect_request(host, port, credentials).as_bytes())
        .await?;
    stream.flush().await?;

    let head = read_response_head(stream).await?;
    let status_line = head.lines().next().unwrap_or_default().to_owned();
    match status_line.split_whitespace().nth(1) {
        Some(code) if code.starts_with('2') => Ok(()),
        _ => Err(ProxyError::Refused(status_line)),
    }
}

fn connect_request(host: &str, port: u16, credentials: Option<(&str, &str)>) -> String {
    let mut request = format!("CONNECT {host}:{port} HTTP/1.1\r\nHost: {host}:{port}\r\n");
    if let Some((username, password)) = credentials {
        let token = BASE64.encode(format!("{username}:{password}").as_bytes());
        request.push_str(&format!("Proxy-Authorization: Basic {token}\r\n"));
    }
    request.push_str("\r\n");
    request
}

// Reads byte by byte so nothing past the header is consumed; the SSH banner follows.
async fn read_response_head<S: AsyncRead + Unpin>(stream: &mut S) -> Result<String, ProxyError> {
    let mut head = Vec::with_capacity(256);
    let mut byte = [0u8; 1];
    while !head.ends_with(b"\r\n\r\n") {
        if head.len() >= MAX_RESPONSE_HEAD {
            return Err(ProxyError::ResponseTooLarge);
        }
        if stream.read(&mut byte).await? == 0 {
            return Err(ProxyError::UnexpectedEof);
        }
        head.push(byte[0]);
    }
    Ok(String::from_utf8_lossy(&head).into_owned())
}
