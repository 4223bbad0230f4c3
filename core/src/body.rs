/*
 * body.rs
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

//! Message body framing: deciding how large a body is from its headers, and
//! reading/writing a body of that size.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite};

use crate::buf::AsyncBuf;
use crate::chunked::{ChunkedReader, ChunkedWriter};
use crate::error::{Result, WireError};
use crate::fields::HeaderFields;
use crate::message::atoi;

/// How large a message body is, and how its end is signaled.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BodySize {
    /// Exactly this many bytes.
    Fixed(u64),
    /// Terminated by an empty chunk and trailers (§4.E).
    Chunked,
    /// Terminated by a MIME boundary. Reserved; not currently produced by
    /// [`body_size`] and rejected by the reader/writer if ever passed in.
    Multipart,
    /// Terminated by the connection closing.
    Unbounded,
}

/// Which side of a round trip a body belongs to, since the size decision
/// differs for requests and responses.
#[derive(Debug, Clone, Copy)]
pub enum BodyContext<'a> {
    Request,
    Response { method: &'a str, status: u16 },
}

/// Decide a message's body size from its headers, per §4.D.
pub fn body_size(headers: &HeaderFields, context: BodyContext<'_>) -> Result<BodySize> {
    if let BodyContext::Response { method, status } = context {
        if method.eq_ignore_ascii_case("HEAD")
            || (100..200).contains(&status)
            || status == 204
            || status == 304
        {
            return Ok(BodySize::Fixed(0));
        }
    }

    if headers
        .split("Transfer-Encoding", b',')
        .any(|tok| !tok.is_empty() && !tok.eq_ignore_ascii_case("identity"))
    {
        return Ok(BodySize::Chunked);
    }

    let mut content_length: Option<u64> = None;
    let mut from = 0;
    while let Some(i) = headers.index("Content-Length", from) {
        let n = atoi(headers[i].value.as_bytes()).ok_or(WireError::InvalidContentLength)?;
        match content_length {
            None => content_length = Some(n),
            Some(v) if v != n => return Err(WireError::InvalidContentLength),
            Some(_) => {}
        }
        from = i + 1;
    }
    if let Some(n) = content_length {
        return Ok(BodySize::Fixed(n));
    }

    match context {
        BodyContext::Request => Ok(BodySize::Fixed(0)),
        BodyContext::Response { .. } => Ok(BodySize::Unbounded),
    }
}

/// Copy exactly `n` bytes from `src` to `dst`; any short read from `src` is
/// reported as [`WireError::UnexpectedEof`].
async fn copy_exact<R, W>(src: &mut R, dst: &mut W, n: u64) -> Result<()>
where
    R: AsyncRead + Unpin + ?Sized,
    W: AsyncWrite + Unpin + ?Sized,
{
    use tokio::io::AsyncWriteExt;
    let mut remaining = n;
    let mut tmp = [0u8; 8 * 1024];
    while remaining > 0 {
        let want = (tmp.len() as u64).min(remaining) as usize;
        let got = src.read(&mut tmp[..want]).await?;
        if got == 0 {
            return Err(WireError::UnexpectedEof);
        }
        dst.write_all(&tmp[..got]).await?;
        remaining -= got as u64;
    }
    Ok(())
}

/// Write a body of the given `size` from `src` to `dst`, per §4.D.
pub async fn write_body<W, R>(dst: &mut W, src: Option<&mut R>, size: BodySize) -> Result<()>
where
    W: AsyncWrite + Unpin + ?Sized,
    R: AsyncRead + Unpin + ?Sized,
{
    match size {
        BodySize::Fixed(0) => Ok(()),
        BodySize::Multipart => Err(WireError::InvalidMessageSize),
        BodySize::Fixed(n) => {
            let src = src.ok_or(WireError::NilMessageBody)?;
            copy_exact(src, dst, n).await
        }
        BodySize::Chunked => {
            let src = src.ok_or(WireError::NilMessageBody)?;
            let mut writer = ChunkedWriter::new(dst);
            let mut tmp = [0u8; 8 * 1024];
            loop {
                let n = src.read(&mut tmp).await?;
                if n == 0 {
                    break;
                }
                writer.write_chunk(&tmp[..n]).await?;
            }
            writer.finish().await
        }
        BodySize::Unbounded => {
            let src = src.ok_or(WireError::NilMessageBody)?;
            tokio::io::copy(src, dst).await.map(|_| ()).map_err(WireError::from)
        }
    }
}

/// A body byte-stream of a decided size. Holds no reference to the
/// connection's buffered surface — it's passed in on each [`read`](
/// BodySource::read) call — so a `BodySource` can be stored alongside its
/// connection in a longer-lived owner without a self-referential borrow.
pub enum BodySource {
    Empty,
    Fixed { remaining: u64 },
    Chunked(ChunkedReader),
    Unbounded,
}

impl BodySource {
    /// Read up to `out.len()` bytes from `buf`. Returns `0` at the body's end.
    pub async fn read<S: AsyncRead + Unpin>(&mut self, buf: &mut AsyncBuf<S>, out: &mut [u8]) -> Result<usize> {
        match self {
            BodySource::Empty => Ok(0),
            BodySource::Fixed { remaining } => {
                if *remaining == 0 {
                    return Ok(0);
                }
                let want = (out.len() as u64).min(*remaining) as usize;
                let n = buf.read_some(&mut out[..want]).await?;
                if n == 0 {
                    return Err(WireError::UnexpectedEof);
                }
                *remaining -= n as u64;
                Ok(n)
            }
            BodySource::Chunked(reader) => reader.read(buf, out).await,
            BodySource::Unbounded => buf.read_some(out).await,
        }
    }
}

/// Construct the appropriately-framed [`BodySource`] for a decided body size.
pub fn body_reader(size: BodySize) -> Result<BodySource> {
    match size {
        BodySize::Fixed(0) => Ok(BodySource::Empty),
        BodySize::Fixed(n) => Ok(BodySource::Fixed { remaining: n }),
        BodySize::Chunked => Ok(BodySource::Chunked(ChunkedReader::new())),
        BodySize::Unbounded => Ok(BodySource::Unbounded),
        BodySize::Multipart => Err(WireError::InvalidMessageSize),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokio::io::AsyncWriteExt;

    fn headers(pairs: &[(&str, &str)]) -> HeaderFields {
        let mut h = HeaderFields::new();
        for (n, v) in pairs {
            h.add(*n, *v);
        }
        h
    }

    #[test]
    fn transfer_encoding_wins_over_content_length() {
        let h = headers(&[("Transfer-Encoding", "chunked"), ("Content-Length", "10")]);
        assert_eq!(body_size(&h, BodyContext::Request).unwrap(), BodySize::Chunked);
    }

    #[test]
    fn identity_transfer_encoding_is_ignored() {
        let h = headers(&[("Transfer-Encoding", "identity"), ("Content-Length", "5")]);
        assert_eq!(body_size(&h, BodyContext::Request).unwrap(), BodySize::Fixed(5));
    }

    #[test]
    fn conflicting_content_lengths_are_rejected() {
        let h = headers(&[("Content-Length", "5"), ("Content-Length", "6")]);
        assert!(matches!(body_size(&h, BodyContext::Request), Err(WireError::InvalidContentLength)));
    }

    #[test]
    fn repeated_identical_content_lengths_are_accepted() {
        let h = headers(&[("Content-Length", "5"), ("Content-Length", "5")]);
        assert_eq!(body_size(&h, BodyContext::Request).unwrap(), BodySize::Fixed(5));
    }

    #[test]
    fn request_with_no_framing_headers_has_no_body() {
        let h = headers(&[]);
        assert_eq!(body_size(&h, BodyContext::Request).unwrap(), BodySize::Fixed(0));
    }

    #[test]
    fn response_with_no_framing_headers_is_unbounded() {
        let h = headers(&[]);
        let ctx = BodyContext::Response { method: "GET", status: 200 };
        assert_eq!(body_size(&h, ctx).unwrap(), BodySize::Unbounded);
    }

    #[test]
    fn head_response_has_no_body_regardless_of_headers() {
        let h = headers(&[("Content-Length", "100")]);
        let ctx = BodyContext::Response { method: "HEAD", status: 200 };
        assert_eq!(body_size(&h, ctx).unwrap(), BodySize::Fixed(0));
    }

    #[test]
    fn status_204_and_304_and_1xx_have_no_body() {
        let h = headers(&[("Content-Length", "100")]);
        for status in [101, 204, 304] {
            let ctx = BodyContext::Response { method: "GET", status };
            assert_eq!(body_size(&h, ctx).unwrap(), BodySize::Fixed(0), "status={status}");
        }
    }

    #[tokio::test]
    async fn write_body_fixed_then_read_back_via_async_buf() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut src: &[u8] = b"hello";
        write_body(&mut client, Some(&mut src), BodySize::Fixed(5)).await.unwrap();
        client.shutdown().await.unwrap();

        let mut buf = AsyncBuf::new(server);
        let mut reader = body_reader(BodySize::Fixed(5)).unwrap();
        let mut out = [0u8; 5];
        let n = reader.read(&mut buf, &mut out).await.unwrap();
        assert_eq!(&out[..n], b"hello");
    }

    #[tokio::test]
    async fn write_body_fixed_short_source_is_nil_body_error() {
        let mut dst = Vec::new();
        let err = write_body::<_, &[u8]>(&mut dst, None, BodySize::Fixed(5)).await.unwrap_err();
        assert!(matches!(err, WireError::NilMessageBody));
    }

    #[tokio::test]
    async fn fixed_reader_reports_unexpected_eof_on_short_stream() {
        let (client, server) = tokio::io::duplex(256);
        drop(client);
        let mut buf = AsyncBuf::new(server);
        let mut reader = body_reader(BodySize::Fixed(5)).unwrap();
        let err = reader.read(&mut buf, &mut [0u8; 5]).await.unwrap_err();
        assert!(matches!(err, WireError::UnexpectedEof));
    }

    #[tokio::test]
    async fn chunked_round_trip_through_write_and_read() {
        let (mut client, server) = tokio::io::duplex(256);
        let mut src: &[u8] = b"streamed body";
        write_body(&mut client, Some(&mut src), BodySize::Chunked).await.unwrap();
        client.shutdown().await.unwrap();

        let mut buf = AsyncBuf::new(server);
        let mut reader = body_reader(BodySize::Chunked).unwrap();
        let mut collected = Vec::new();
        let mut tmp = [0u8; 4];
        loop {
            let n = reader.read(&mut buf, &mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&tmp[..n]);
        }
        assert_eq!(collected, b"streamed body".to_vec());
    }

    #[tokio::test]
    async fn unbounded_reader_ends_when_connection_closes() {
        let (mut client, server) = tokio::io::duplex(256);
        client.write_all(b"rest of the response").await.unwrap();
        client.shutdown().await.unwrap();

        let mut buf = AsyncBuf::new(server);
        let mut reader = body_reader(BodySize::Unbounded).unwrap();
        let mut collected = Vec::new();
        let mut tmp = [0u8; 6];
        loop {
            let n = reader.read(&mut buf, &mut tmp).await.unwrap();
            if n == 0 {
                break;
            }
            collected.extend_from_slice(&tmp[..n]);
        }
        assert_eq!(collected, b"rest of the response".to_vec());
    }
}
