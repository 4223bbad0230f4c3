/*
 * roundtrip.rs
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

//! Client-side round trip: dial, send a request, read a response header,
//! and hand back a body reader that settles the connection's fate (recycle
//! or close) once it's drained.

use tokio::io::AsyncRead;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, trace};

use crate::body::{body_reader, body_size, write_body, BodyContext, BodySize, BodySource};
use crate::buf::AsyncBuf;
use crate::error::{HeaderSide, Result, WireError};
use crate::fields::HeaderFields;
use crate::message::{
    parse_header_fields, parse_request_line, parse_status_line, scan_header_block, write_header_fields,
    write_request_line, RequestLine, StatusLine, HTTP_1_0, HTTP_1_1,
};
use crate::net::Dialer;
use crate::pool::{ConnJoin, ConnReader, ConnWriter, Pool, PooledConn};

/// A request body: any byte-stream the caller owns.
pub type RequestBody = Box<dyn AsyncRead + Unpin + Send>;

/// The sender half of a round trip's cancellation channel. Sending `None`
/// cancels with [`WireError::NilCancel`]; sending `Some(e)` cancels with `e`.
/// Dropping it without sending lets the round trip run to completion.
pub type Cancel = oneshot::Sender<Option<WireError>>;

/// A fresh cancellation channel for a single [`RoundTripper::round_trip`] call.
pub fn cancel_channel() -> (Cancel, oneshot::Receiver<Option<WireError>>) {
    oneshot::channel()
}

/// An outgoing request: everything the round-trip engine needs to dial the
/// right place and put it on the wire.
pub struct Request {
    pub method: String,
    pub uri: String,
    pub version: u8,
    pub headers: HeaderFields,
    pub body: Option<RequestBody>,
    pub scheme: String,
    pub remote_addr: String,
}

impl Request {
    pub fn new(
        method: impl Into<String>,
        uri: impl Into<String>,
        scheme: impl Into<String>,
        remote_addr: impl Into<String>,
    ) -> Self {
        Self {
            method: method.into(),
            uri: uri.into(),
            version: HTTP_1_1,
            headers: HeaderFields::new(),
            body: None,
            scheme: scheme.into(),
            remote_addr: remote_addr.into(),
        }
    }
}

/// A response header plus a body the caller drains at their own pace. The
/// connection underneath is recycled or closed once the body reaches its end.
pub struct Response<D: Dialer> {
    pub status: u16,
    pub reason: String,
    pub version: u8,
    pub headers: HeaderFields,
    pub body: BodyReader<D>,
}

/// The terminal status of the concurrent body-write task (§4.G step 4):
/// either it finished (successfully or not), or it was aborted before it
/// could finish because the round trip settled without it (cancellation,
/// header failure, or the reader being abandoned early).
type WriteOutcome<D> = std::result::Result<(Result<()>, ConnWriter<D>), tokio::task::JoinError>;

/// Which half of the engine a [`BodyReader`] is driving: a plain connection
/// when there was no request body to stream concurrently, or a read half
/// paired with the in-flight body-write task when there was (§4.G, §5).
enum BodyReaderState<D: Dialer> {
    Simple(Option<PooledConn<D>>),
    Split { reader: Option<ConnReader<D>>, write: Option<JoinHandle<(Result<()>, ConnWriter<D>)>>, join: Option<ConnJoin<D>> },
}

/// A response body bound to the connection it arrived on. Reading it to
/// completion recycles the connection (unless the round trip decided it
/// couldn't be reused, or the concurrent body-send failed); an error, or
/// dropping the reader early, closes it. Once settled, further reads just
/// return `0`, or [`WireError::BodyClosed`] after an explicit [`close`](
/// BodyReader::close).
pub struct BodyReader<D: Dialer> {
    state: BodyReaderState<D>,
    source: BodySource,
    recyclable: bool,
    settled: bool,
    closed: bool,
}

impl<D: Dialer> BodyReader<D> {
    /// No request body was sent concurrently; `conn` is still whole.
    fn new_simple(conn: PooledConn<D>, source: BodySource, recyclable: bool) -> Self {
        let mut reader =
            Self { state: BodyReaderState::Simple(Some(conn)), source, recyclable, settled: false, closed: false };
        // A zero-length body has already reached its end; nothing will ever
        // call read() to observe that, so settle the connection right away.
        if matches!(reader.source, BodySource::Empty) {
            reader.abandon_sync(recyclable);
        }
        reader
    }

    /// A request body is streaming out on `write` concurrently with this
    /// reader draining the response off `reader` (§4.G steps 4-9).
    fn new_split(reader: ConnReader<D>, write: JoinHandle<(Result<()>, ConnWriter<D>)>, join: ConnJoin<D>, source: BodySource, recyclable: bool) -> Self {
        if matches!(source, BodySource::Empty) {
            // Step 7: nothing to read back — arm the release on the write
            // task alone, without making the caller call read() to learn that.
            tokio::spawn(async move {
                if let Ok((write_result, writer)) = write.await {
                    let recycle = write_result.is_ok() && recyclable;
                    join.finish(reader, writer, recycle);
                }
                // A `JoinError` here means the write task was aborted by
                // someone else settling the reader first; nothing to do.
            });
            return Self {
                state: BodyReaderState::Split { reader: None, write: None, join: None },
                source,
                recyclable,
                settled: true,
                closed: false,
            };
        }
        Self {
            state: BodyReaderState::Split { reader: Some(reader), write: Some(write), join: Some(join) },
            source,
            recyclable,
            settled: false,
            closed: false,
        }
    }

    pub async fn read(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.closed {
            return Err(WireError::BodyClosed);
        }
        if self.settled {
            return Ok(0);
        }
        let result = match &mut self.state {
            BodyReaderState::Simple(conn) => self.source.read(conn.as_mut().unwrap(), out).await,
            BodyReaderState::Split { reader, .. } => self.source.read(reader.as_mut().unwrap(), out).await,
        };
        match result {
            Ok(0) => {
                self.settle(self.recyclable).await;
                Ok(0)
            }
            Ok(n) => Ok(n),
            Err(e) => {
                self.settle(false).await;
                Err(e)
            }
        }
    }

    /// End the body early. The connection is never recycled after this —
    /// matching the cost of abandoning a response mid-stream — and
    /// subsequent reads report [`WireError::BodyClosed`] instead of a
    /// silent `0`.
    pub fn close(&mut self) {
        self.closed = true;
        self.abandon_sync(false);
    }

    /// Settle with a real recycle decision once the body has reached a
    /// clean EOF or an error. For the split case this must await the
    /// concurrent write task before it can know whether *that* side also
    /// succeeded (§4.G step 9).
    async fn settle(&mut self, recyclable: bool) {
        if self.settled {
            return;
        }
        self.settled = true;
        match std::mem::replace(&mut self.state, BodyReaderState::Simple(None)) {
            BodyReaderState::Simple(conn) => finish_simple(conn, recyclable),
            BodyReaderState::Split { reader, write, join } => {
                if let (Some(reader), Some(write), Some(join)) = (reader, write, join) {
                    finish_split(reader, write, join, recyclable).await;
                }
            }
        }
    }

    /// Abandon without waiting on anything: used by [`close`](Self::close)
    /// and [`Drop`], where the outcome is always "don't recycle" and there
    /// is nothing worth awaiting to learn that.
    fn abandon_sync(&mut self, recyclable: bool) {
        if self.settled {
            return;
        }
        self.settled = true;
        match std::mem::replace(&mut self.state, BodyReaderState::Simple(None)) {
            BodyReaderState::Simple(conn) => finish_simple(conn, recyclable),
            BodyReaderState::Split { reader, write, join } => {
                // Abort the in-flight write rather than let it run on
                // unobserved: closing both halves now is what interrupts it
                // (§5: "no cancellation is propagated to the in-flight write
                // task explicitly — the connection close interrupts it").
                if let Some(handle) = write {
                    handle.abort();
                }
                drop(reader);
                drop(join);
            }
        }
    }
}

fn finish_simple<D: Dialer>(conn: Option<PooledConn<D>>, recycle: bool) {
    if let Some(conn) = conn {
        if recycle {
            trace!("body drained cleanly, recycling connection");
            conn.recycle();
        } else {
            trace!("closing connection after body read");
            conn.close();
        }
    }
}

async fn finish_split<D: Dialer>(reader: ConnReader<D>, write: JoinHandle<(Result<()>, ConnWriter<D>)>, join: ConnJoin<D>, recyclable: bool) {
    let outcome: WriteOutcome<D> = write.await;
    match outcome {
        Ok((Ok(()), writer)) => {
            trace!("body write and read both finished cleanly");
            join.finish(reader, writer, recyclable);
        }
        Ok((Err(e), writer)) => {
            trace!(error = %e, "request body write failed, closing connection");
            join.finish(reader, writer, false);
        }
        Err(_) => {
            // The write task was aborted (we never do this to ourselves
            // here; only a concurrent `close()`/drop would have, and that
            // already settled the reader) or it panicked.
        }
    }
}

impl<D: Dialer> Drop for BodyReader<D> {
    fn drop(&mut self) {
        // A reader abandoned before its body was fully drained leaves the
        // connection in an indeterminate read position; it can't be reused.
        self.abandon_sync(false);
    }
}

fn default_port(scheme: &str) -> Result<u16> {
    match scheme {
        "http" => Ok(80),
        "https" => Ok(443),
        _ => Err(WireError::UnsupportedScheme),
    }
}

fn with_default_port(remote_addr: &str, port: u16) -> String {
    let has_port = remote_addr
        .rsplit_once(':')
        .is_some_and(|(_, p)| !p.is_empty() && p.bytes().all(|b| b.is_ascii_digit()));
    if has_port {
        remote_addr.to_string()
    } else {
        format!("{remote_addr}:{port}")
    }
}

/// Add `Transfer-Encoding: chunked` when a body is present and the caller
/// named no framing of their own.
fn prepare_request_framing(request: &mut Request) {
    if request.body.is_some()
        && !request.headers.has("Content-Length")
        && !request.headers.has("Transfer-Encoding")
    {
        request.headers.add("Transfer-Encoding", "chunked");
    }
}

/// Decide the response body's framing and whether the connection can be
/// recycled afterwards, from the response header plus the request side's own
/// closing signal.
fn response_framing(
    headers: &HeaderFields,
    method: &str,
    status_line: &StatusLine,
    req_version: u8,
    req_headers: &HeaderFields,
) -> Result<(BodySize, bool)> {
    let response_size = body_size(headers, BodyContext::Response { method, status: status_line.status })?;
    let must_close = closing(status_line.version, headers) || closing(req_version, req_headers);
    let recyclable = !must_close && response_size != BodySize::Unbounded;
    Ok((response_size, recyclable))
}

/// Whether a connection must close after this message, per RFC 7230 §6.3.
fn closing(version: u8, headers: &HeaderFields) -> bool {
    let has_token = |target: &str| headers.split("Connection", b',').any(|t| t.eq_ignore_ascii_case(target));
    match version {
        HTTP_1_1 => has_token("close"),
        HTTP_1_0 => !has_token("keep-alive"),
        _ => true,
    }
}

/// Grow `buf` until a header-fields block (start-line already consumed) is
/// fully buffered, and return its length.
async fn peek_fields_block<S: AsyncRead + Unpin>(buf: &mut AsyncBuf<S>) -> Result<usize> {
    let mut from = 0;
    loop {
        let chunk = buf.peek_to(b'\n', from).await?;
        if let Some(len) = scan_header_block(chunk) {
            return Ok(len);
        }
        from = chunk.len();
    }
}

async fn read_response_head<S: AsyncRead + Unpin>(buf: &mut AsyncBuf<S>) -> Result<(StatusLine, HeaderFields)> {
    let line_len = buf.peek_to(b'\n', 0).await?.len();
    let status_line = parse_status_line(buf.peek(line_len).await?)?;
    buf.consume(line_len);

    let field_len = peek_fields_block(buf).await?;
    let headers = parse_header_fields(buf.peek(field_len).await?, HeaderSide::Response)?;
    buf.consume(field_len);

    Ok((status_line, headers))
}

/// Read and parse a request header (request-line plus header fields) off a
/// buffered connection. Server-side request *handling* beyond this parse is
/// out of scope here; this is the receiving half of §4.C's request codec,
/// the mirror of [`write_request_line`]/[`write_header_fields`] on the send
/// side and of [`read_response_head`] on the client's own response side.
pub async fn parse_request_header<S: AsyncRead + Unpin>(buf: &mut AsyncBuf<S>) -> Result<(RequestLine, HeaderFields)> {
    let line_len = buf.peek_to(b'\n', 0).await?.len();
    let request_line = parse_request_line(buf.peek(line_len).await?)?;
    buf.consume(line_len);

    let field_len = peek_fields_block(buf).await?;
    let headers = parse_header_fields(buf.peek(field_len).await?, HeaderSide::Request)?;
    buf.consume(field_len);

    Ok((request_line, headers))
}

async fn wait_cancel(rx: oneshot::Receiver<Option<WireError>>) -> WireError {
    match rx.await {
        Ok(Some(err)) => err,
        Ok(None) => WireError::NilCancel,
        // Sender dropped without cancelling: never resolve this branch.
        Err(_) => std::future::pending().await,
    }
}

/// Drives requests across a [`Pool`]: dial, write, read the response header,
/// hand back a body that settles the connection when it's drained.
pub struct RoundTripper<D: Dialer> {
    pool: Pool<D>,
}

impl<D: Dialer> RoundTripper<D> {
    pub fn new(pool: Pool<D>) -> Self {
        Self { pool }
    }

    pub async fn round_trip(
        &self,
        mut request: Request,
        mut cancel: oneshot::Receiver<Option<WireError>>,
    ) -> Result<Response<D>> {
        let port = default_port(&request.scheme)?;
        let addr = with_default_port(&request.remote_addr, port);

        debug!(addr, scheme = request.scheme.as_str(), "dialing");
        let mut conn = if request.scheme == "https" {
            self.pool.dial_tls(&addr).await?
        } else {
            self.pool.dial_tcp(&addr).await?
        };

        if let Ok(payload) = cancel.try_recv() {
            debug!(addr, "cancelled before any bytes were sent");
            conn.recycle();
            return Err(payload.unwrap_or(WireError::NilCancel));
        }

        prepare_request_framing(&mut request);
        let req_body_size = body_size(&request.headers, BodyContext::Request)?;

        let mut head = Vec::new();
        write_request_line(&mut head, &request.method, &request.uri, request.version);
        write_header_fields(&mut head, &request.headers);
        conn.write_buffered(&head);
        conn.flush().await?;
        trace!(addr, "wrote request header");

        let (status_line, headers, body) = if let Some(mut req_body) = request.body.take() {
            // Stream the body out on its own task while this task races the
            // response header against cancellation, instead of blocking the
            // header read on the whole body having gone out first (§4.G).
            let (mut reader, mut writer, join) = conn.split();
            let write_handle: JoinHandle<(Result<()>, ConnWriter<D>)> = tokio::spawn(async move {
                let result = async {
                    write_body(writer.get_mut(), Some(req_body.as_mut()), req_body_size).await?;
                    writer.flush().await
                }
                .await;
                (result, writer)
            });
            trace!(addr, "streaming request body concurrently with response header read");

            let head_result = tokio::select! {
                result = read_response_head(&mut reader) => result,
                err = wait_cancel(cancel) => {
                    debug!(addr, "cancelled while waiting for response header");
                    write_handle.abort();
                    return Err(err);
                }
            };
            let (status_line, headers) = match head_result {
                Ok(v) => v,
                Err(e) => {
                    write_handle.abort();
                    return Err(e);
                }
            };
            debug!(addr, status = status_line.status, "received response header");

            let (response_size, recyclable) =
                response_framing(&headers, &request.method, &status_line, request.version, &request.headers)?;
            let source = body_reader(response_size)?;
            let body = BodyReader::new_split(reader, write_handle, join, source, recyclable);
            (status_line, headers, body)
        } else {
            let (status_line, headers) = tokio::select! {
                result = read_response_head(&mut conn) => result?,
                err = wait_cancel(cancel) => {
                    debug!(addr, "cancelled while waiting for response header");
                    conn.close();
                    return Err(err);
                }
            };
            debug!(addr, status = status_line.status, "received response header");

            let (response_size, recyclable) =
                response_framing(&headers, &request.method, &status_line, request.version, &request.headers)?;
            let source = body_reader(response_size)?;
            let body = BodyReader::new_simple(conn, source, recyclable);
            (status_line, headers, body)
        };

        Ok(Response { status: status_line.status, reason: status_line.reason, version: status_line.version, headers, body })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt, DuplexStream};

    struct DuplexDialer(Mutex<Option<DuplexStream>>);

    impl DuplexDialer {
        fn new(stream: DuplexStream) -> Self {
            Self(Mutex::new(Some(stream)))
        }
    }

    impl Dialer for DuplexDialer {
        type Conn = DuplexStream;

        async fn dial_tcp(&self, _addr: &str) -> Result<DuplexStream> {
            Ok(self.0.lock().unwrap().take().expect("dialer used more than once in this test"))
        }

        async fn dial_tls(&self, addr: &str) -> Result<DuplexStream> {
            self.dial_tcp(addr).await
        }
    }

    #[tokio::test]
    async fn fixed_length_response_round_trips() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0);
            server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 5\r\n\r\nhello").await.unwrap();
        });

        let pool = Pool::new(DuplexDialer::new(client), Duration::from_secs(60));
        let rt = RoundTripper::new(pool);

        let request = Request::new("GET", "/", "http", "example.com");
        let (_tx, rx) = cancel_channel();
        let mut response = rt.round_trip(request, rx).await.unwrap();
        assert_eq!(response.status, 200);

        let mut collected = Vec::new();
        let mut tmp = [0u8; 16];
        loop {
            let n = response.body.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&tmp[..n]);
        }
        assert_eq!(collected, b"hello");
    }

    #[tokio::test]
    async fn chunked_response_round_trips() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0);
            server
                .write_all(b"HTTP/1.1 200 OK\r\nTransfer-Encoding: chunked\r\n\r\n5\r\nhello\r\n0\r\n\r\n")
                .await
                .unwrap();
        });

        let pool = Pool::new(DuplexDialer::new(client), Duration::from_secs(60));
        let rt = RoundTripper::new(pool);

        let request = Request::new("GET", "/", "http", "example.com");
        let (_tx, rx) = cancel_channel();
        let mut response = rt.round_trip(request, rx).await.unwrap();

        let mut collected = Vec::new();
        let mut tmp = [0u8; 4];
        loop {
            let n = response.body.read(&mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&tmp[..n]);
        }
        assert_eq!(collected, b"hello");
    }

    #[tokio::test]
    async fn cancellation_before_send_returns_nil_cancel() {
        let (client, server) = tokio::io::duplex(4096);
        drop(server);

        let pool = Pool::new(DuplexDialer::new(client), Duration::from_secs(60));
        let rt = RoundTripper::new(pool);

        let request = Request::new("GET", "/", "http", "example.com");
        let (tx, rx) = cancel_channel();
        tx.send(None).unwrap();

        let err = match rt.round_trip(request, rx).await {
            Err(e) => e,
            Ok(_) => panic!("expected cancellation error"),
        };
        assert!(matches!(err, WireError::NilCancel));
    }

    #[tokio::test]
    async fn unsupported_scheme_is_rejected_before_dialing() {
        let (client, _server) = tokio::io::duplex(64);
        let pool = Pool::new(DuplexDialer::new(client), Duration::from_secs(60));
        let rt = RoundTripper::new(pool);

        let request = Request::new("GET", "/", "ftp", "example.com");
        let (_tx, rx) = cancel_channel();
        let err = match rt.round_trip(request, rx).await {
            Err(e) => e,
            Ok(_) => panic!("expected unsupported scheme error"),
        };
        assert!(matches!(err, WireError::UnsupportedScheme));
    }

    #[tokio::test]
    async fn connection_is_recycled_and_reused_for_a_second_request() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            for _ in 0..2 {
                let n = server.read(&mut buf).await.unwrap();
                assert!(n > 0);
                server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await.unwrap();
            }
        });

        // A single preset stream: if the pool dialed twice, the second dial
        // would find nothing left and panic.
        let pool = Pool::new(DuplexDialer::new(client), Duration::from_secs(60));
        let rt = RoundTripper::new(pool.clone());

        for _ in 0..2 {
            let request = Request::new("GET", "/", "http", "example.com");
            let (_tx, rx) = cancel_channel();
            let mut response = rt.round_trip(request, rx).await.unwrap();
            assert_eq!(response.status, 200);
            assert_eq!(response.body.read(&mut [0u8; 8]).await.unwrap(), 0);
        }
    }

    #[tokio::test]
    async fn connection_close_header_prevents_reuse() {
        let (client, mut server) = tokio::io::duplex(4096);
        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0);
            server
                .write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\nConnection: close\r\n\r\n")
                .await
                .unwrap();
        });

        let pool = Pool::new(DuplexDialer::new(client), Duration::from_secs(60));
        let rt = RoundTripper::new(pool.clone());

        let request = Request::new("GET", "/", "http", "example.com");
        let (_tx, rx) = cancel_channel();
        let response = rt.round_trip(request, rx).await.unwrap();
        drop(response);

        assert_eq!(pool.idle_len(false, "example.com:80"), 0);
    }

    #[tokio::test]
    async fn response_header_arrives_while_request_body_write_is_still_in_flight() {
        let (client, mut server) = tokio::io::duplex(8192);
        let (body_client, mut body_server) = tokio::io::duplex(64);

        // Only the first slice of the body is ever written during this test;
        // a round trip that waited for the whole body before reading the
        // response would never return.
        body_server.write_all(b"first-half").await.unwrap();

        tokio::spawn(async move {
            let mut buf = [0u8; 1024];
            let n = server.read(&mut buf).await.unwrap();
            assert!(n > 0);
            server.write_all(b"HTTP/1.1 200 OK\r\nContent-Length: 0\r\n\r\n").await.unwrap();
            let _ = server.read(&mut buf).await;
        });

        let pool = Pool::new(DuplexDialer::new(client), Duration::from_secs(60));
        let rt = RoundTripper::new(pool);

        let mut request = Request::new("POST", "/", "http", "example.com");
        request.body = Some(Box::new(body_client));
        let (_tx, rx) = cancel_channel();

        let response = tokio::time::timeout(Duration::from_millis(500), rt.round_trip(request, rx))
            .await
            .expect("round trip must not block on a request body that hasn't finished sending")
            .unwrap();
        assert_eq!(response.status, 200);

        // Let the still-running body-write task reach its own end so it
        // doesn't outlive the test as a dangling reader on the duplex pipe.
        drop(body_server);
    }

    #[tokio::test]
    async fn parse_request_header_reads_request_line_and_fields() {
        let (client, mut server) = tokio::io::duplex(256);
        tokio::spawn(async move {
            server.write_all(b"GET /x HTTP/1.1\r\nHost: h\r\nX-Fold: a\r\n b\r\n\r\n").await.unwrap();
        });
        let mut buf = AsyncBuf::new(client);
        let (line, headers) = parse_request_header(&mut buf).await.unwrap();
        assert_eq!(line.method, "GET");
        assert_eq!(line.uri, "/x");
        assert_eq!(line.version, HTTP_1_1);
        assert_eq!(headers.get("Host"), Some("h"));
        assert_eq!(headers.get("X-Fold"), Some("a b"));
    }

    #[tokio::test]
    async fn parse_request_header_rejects_malformed_request_line() {
        let (client, mut server) = tokio::io::duplex(256);
        tokio::spawn(async move {
            server.write_all(b"GET HTTP/1.1\r\n\r\n").await.unwrap();
        });
        let mut buf = AsyncBuf::new(client);
        let err = parse_request_header(&mut buf).await.unwrap_err();
        assert!(matches!(err, WireError::MalformedRequestHeader));
    }
}
