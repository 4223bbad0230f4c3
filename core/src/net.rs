/*
 * net.rs
 * Copyright (C) 2026 Chris Burdess
 *
 * This file is part of wire, an HTTP/1.x wire codec and client round-trip engine.
 *
 * wire is free software: you can redistribute it and/or modify
 * it under the terms of the GNU General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * wire is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE.  See the
 * GNU General Public License for more details.
 *
 * You should have received a copy of the GNU General Public License
 * along with wire.  If not, see <http://www.gnu.org/licenses/>.
 */

//! TCP/TLS dialing and listening: the concrete connections the round-trip
//! engine and pool drive. A `Stream` is plain TCP or TLS over TCP; a
//! `Dialer` produces one on demand; a `Listener` accepts them.

use std::io;
use std::pin::Pin;
use std::sync::Arc;
use std::task::{Context, Poll};
use std::time::Duration;

use tokio::io::{AsyncRead, AsyncWrite, ReadBuf};
use tokio::net::TcpStream;
use tokio_rustls::client::TlsStream;
use tokio_rustls::rustls::pki_types::ServerName;
use tokio_rustls::rustls::{ClientConfig, RootCertStore};
use tokio_rustls::TlsConnector;

use crate::error::{Result, WireError};

/// Root store: platform-native certs first, falling back to the Mozilla
/// bundle when native loading yields nothing (e.g. minimal containers).
fn build_root_store() -> RootCertStore {
    let mut store = RootCertStore::empty();
    if let Ok(certs) = rustls_native_certs::load_native_certs() {
        for cert in certs {
            let _ = store.add(cert);
        }
    }
    if store.is_empty() {
        store.roots = webpki_roots::TLS_SERVER_ROOTS.to_vec();
    }
    store
}

fn default_client_config() -> Arc<ClientConfig> {
    Arc::new(ClientConfig::builder().with_root_certificates(build_root_store()).with_no_client_auth())
}

/// Either side of a round trip: plain TCP, or TLS over TCP. No ALPN
/// negotiation here — this crate speaks HTTP/1.x only.
#[derive(Debug)]
pub enum Stream {
    Tcp(TcpStream),
    Tls(Box<TlsStream<TcpStream>>),
}

impl AsyncRead for Stream {
    fn poll_read(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &mut ReadBuf<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Stream::Tcp(s) => Pin::new(s).poll_read(cx, buf),
            Stream::Tls(s) => Pin::new(s).poll_read(cx, buf),
        }
    }
}

impl AsyncWrite for Stream {
    fn poll_write(mut self: Pin<&mut Self>, cx: &mut Context<'_>, buf: &[u8]) -> Poll<io::Result<usize>> {
        match &mut *self {
            Stream::Tcp(s) => Pin::new(s).poll_write(cx, buf),
            Stream::Tls(s) => Pin::new(s).poll_write(cx, buf),
        }
    }

    fn poll_flush(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Stream::Tcp(s) => Pin::new(s).poll_flush(cx),
            Stream::Tls(s) => Pin::new(s).poll_flush(cx),
        }
    }

    fn poll_shutdown(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<io::Result<()>> {
        match &mut *self {
            Stream::Tcp(s) => Pin::new(s).poll_shutdown(cx),
            Stream::Tls(s) => Pin::new(s).poll_shutdown(cx),
        }
    }
}

/// Produces a fresh connection for an address not currently available in
/// the pool. Implementations are expected to honour their own per-attempt
/// timeout; the pool imposes none of its own.
///
/// `Conn` is an associated type rather than a fixed `Stream` so that tests
/// can plug in an in-memory duplex pipe instead of a real socket.
pub trait Dialer: Send + Sync + 'static {
    type Conn: tokio::io::AsyncRead + tokio::io::AsyncWrite + Unpin + Send + 'static;

    fn dial_tcp(&self, addr: &str) -> impl std::future::Future<Output = Result<Self::Conn>> + Send;
    fn dial_tls(&self, addr: &str) -> impl std::future::Future<Output = Result<Self::Conn>> + Send;
}

/// `Dialer` over real sockets, with a bounded connect timeout and a shared
/// TLS client configuration.
pub struct TcpDialer {
    connect_timeout: Duration,
    tls_config: Arc<ClientConfig>,
}

impl TcpDialer {
    pub fn new(connect_timeout: Duration) -> Self {
        Self { connect_timeout, tls_config: default_client_config() }
    }
}

/// Races `fut` against `timeout`, remapping expiry to the `TimedOut` io
/// error the rest of the crate expects from a dial attempt. Split out so
/// the racing behaviour itself can be unit-tested without a real socket.
async fn with_connect_timeout<F: std::future::Future>(timeout: Duration, fut: F) -> Result<F::Output>
where
    F::Output: Sized,
{
    tokio::time::timeout(timeout, fut)
        .await
        .map_err(|_| WireError::Io(io::Error::new(io::ErrorKind::TimedOut, "dial timed out")))
}

impl Dialer for TcpDialer {
    type Conn = Stream;

    async fn dial_tcp(&self, addr: &str) -> Result<Stream> {
        let tcp = with_connect_timeout(self.connect_timeout, TcpStream::connect(addr)).await??;
        Ok(Stream::Tcp(tcp))
    }

    async fn dial_tls(&self, addr: &str) -> Result<Stream> {
        let tcp = with_connect_timeout(self.connect_timeout, TcpStream::connect(addr)).await??;

        let host = addr.rsplit_once(':').map(|(host, _)| host).unwrap_or(addr);
        let server_name = ServerName::try_from(host.to_string())
            .map_err(|_| WireError::Io(io::Error::new(io::ErrorKind::InvalidInput, "invalid host name")))?;

        let connector = TlsConnector::from(self.tls_config.clone());
        let tls = connector
            .connect(server_name, tcp)
            .await
            .map_err(|e| WireError::Io(io::Error::new(io::ErrorKind::ConnectionRefused, e)))?;

        Ok(Stream::Tls(Box::new(tls)))
    }
}

/// Accepts inbound `Stream`s. Out of the round-trip engine's critical path;
/// provided because the collaborator surface names a listener alongside the
/// dialer.
pub struct TcpListener {
    inner: tokio::net::TcpListener,
}

impl TcpListener {
    pub async fn bind(addr: &str) -> Result<Self> {
        let inner = tokio::net::TcpListener::bind(addr).await?;
        Ok(Self { inner })
    }

    pub async fn accept(&self) -> Result<Stream> {
        let (tcp, _) = self.inner.accept().await?;
        Ok(Stream::Tcp(tcp))
    }

    pub fn local_addr(&self) -> Result<std::net::SocketAddr> {
        Ok(self.inner.local_addr()?)
    }
}
