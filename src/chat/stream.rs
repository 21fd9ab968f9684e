//! Chat connection stream abstraction.
//!
//! Provides a unified stream type for plaintext and TLS chat connections.

use crate::error::ChatError;
use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::TlsConnector;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tracing::{info, warn};

/// A chat server connection, either plaintext or TLS.
pub enum ChatStream {
    Plain(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl ChatStream {
    /// Open a connection to `address` (`host:port`).
    pub async fn connect(address: &str, tls: bool) -> Result<Self, ChatError> {
        let tcp = TcpStream::connect(address).await?;
        tcp.set_nodelay(true)?;
        if !tls {
            return Ok(Self::Plain(tcp));
        }

        let host = address.rsplit_once(':').map_or(address, |(host, _)| host);
        let stream = upgrade_to_tls(tcp, host).await?;
        Ok(Self::Tls(Box::new(stream)))
    }

    pub fn is_tls(&self) -> bool {
        matches!(self, Self::Tls(_))
    }
}

async fn upgrade_to_tls(tcp: TcpStream, hostname: &str) -> Result<TlsStream<TcpStream>, ChatError> {
    let mut roots = RootCertStore::empty();
    let certs = rustls_native_certs::load_native_certs();
    for cert in certs.certs {
        if let Err(e) = roots.add(cert) {
            warn!(error = %e, "Failed to add root cert");
        }
    }
    for e in &certs.errors {
        warn!(error = %e, "Error loading native certs");
    }

    let config = ClientConfig::builder()
        .with_root_certificates(roots)
        .with_no_client_auth();
    let connector = TlsConnector::from(Arc::new(config));
    let server_name =
        ServerName::try_from(hostname.to_string()).map_err(|e| ChatError::Tls(e.to_string()))?;

    let stream = connector.connect(server_name, tcp).await?;
    info!(hostname = %hostname, "TLS handshake completed for chat connection");
    Ok(stream)
}

impl AsyncRead for ChatStream {
    fn poll_read(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &mut ReadBuf<'_>,
    ) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ChatStream::Plain(stream) => Pin::new(stream).poll_read(cx, buf),
            ChatStream::Tls(stream) => Pin::new(stream.as_mut()).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for ChatStream {
    fn poll_write(
        self: Pin<&mut Self>,
        cx: &mut Context<'_>,
        buf: &[u8],
    ) -> Poll<io::Result<usize>> {
        match self.get_mut() {
            ChatStream::Plain(stream) => Pin::new(stream).poll_write(cx, buf),
            ChatStream::Tls(stream) => Pin::new(stream.as_mut()).poll_write(cx, buf),
        }
    }

    fn poll_flush(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ChatStream::Plain(stream) => Pin::new(stream).poll_flush(cx),
            ChatStream::Tls(stream) => Pin::new(stream.as_mut()).poll_flush(cx),
        }
    }

    fn poll_shutdown(self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match self.get_mut() {
            ChatStream::Plain(stream) => Pin::new(stream).poll_shutdown(cx),
            ChatStream::Tls(stream) => Pin::new(stream.as_mut()).poll_shutdown(cx),
        }
    }
}
