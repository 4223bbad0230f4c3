/*
 * chunked.rs
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

//! RFC 7230 §4.1 chunked transfer-coding: writer and reader.

use tokio::io::{AsyncRead, AsyncWrite, AsyncWriteExt};

use crate::buf::AsyncBuf;
use crate::error::{Result, WireError};

const HEX: &[u8; 16] = b"0123456789abcdef";

/// Maps an ASCII byte to its hex digit value, or `0xff` if it isn't one.
const fn dehex_table() -> [u8; 256] {
    let mut table = [0xffu8; 256];
    let mut i = 0;
    while i < 10 {
        table[b'0' as usize + i] = i as u8;
        i += 1;
    }
    let mut i = 0;
    while i < 6 {
        table[b'a' as usize + i] = 10 + i as u8;
        table[b'A' as usize + i] = 10 + i as u8;
        i += 1;
    }
    table
}

const DEHEX: [u8; 256] = dehex_table();

/// Chunk sizes beyond this are rejected, matching the original codec's
/// overflow guard (chosen so `size << 4` never overflows an `i64`).
const MAX_CHUNK_SIZE: u64 = 0x07ff_ffff_ffff_ffff;

/// Writes chunked transfer-coding framing around an inner sink. Empty chunks
/// are silently dropped, since an empty write would otherwise be
/// indistinguishable from the terminating chunk.
pub struct ChunkedWriter<W> {
    inner: W,
}

impl<W: AsyncWrite + Unpin> ChunkedWriter<W> {
    pub fn new(inner: W) -> Self {
        Self { inner }
    }

    pub async fn write_chunk(&mut self, chunk: &[u8]) -> Result<()> {
        if chunk.is_empty() {
            return Ok(());
        }

        let mut size_buf = [0u8; 16];
        let mut i = size_buf.len();
        let mut x = chunk.len();
        loop {
            i -= 1;
            size_buf[i] = HEX[x & 0xf];
            x >>= 4;
            if x == 0 {
                break;
            }
        }

        self.inner.write_all(&size_buf[i..]).await?;
        self.inner.write_all(b"\r\n").await?;
        self.inner.write_all(chunk).await?;
        self.inner.write_all(b"\r\n").await?;
        Ok(())
    }

    /// Write the terminating zero-length chunk and empty trailer block.
    pub async fn finish(mut self) -> Result<()> {
        self.inner.write_all(b"0\r\n\r\n").await?;
        Ok(())
    }
}

/// Reads chunked transfer-coding framing, delivering only chunk data to the
/// caller; trailers are discarded. Holds no reference to the buffered I/O
/// surface itself — it's passed in on each call — so a `ChunkedReader` can
/// sit alongside its connection in a longer-lived owner (e.g. a response
/// body handed back to a caller) without a self-referential borrow.
#[derive(Default)]
pub struct ChunkedReader {
    remaining: u64,
    done: bool,
}

impl ChunkedReader {
    pub fn new() -> Self {
        Self { remaining: 0, done: false }
    }

    /// Read up to `out.len()` bytes of chunk data. Returns `0` at the
    /// logical end of the chunked stream (after trailers are discarded).
    pub async fn read<S: AsyncRead + Unpin>(&mut self, buf: &mut AsyncBuf<S>, out: &mut [u8]) -> Result<usize> {
        if self.done {
            return Ok(0);
        }

        if self.remaining == 0 {
            self.remaining = self.read_chunk_size(buf).await?;
            if self.remaining == 0 {
                self.discard_trailers(buf).await?;
                self.done = true;
                return Ok(0);
            }
        }

        let want = (out.len() as u64).min(self.remaining) as usize;
        let n = buf.read_some(&mut out[..want]).await?;
        if n == 0 {
            return Err(WireError::UnexpectedEof);
        }
        self.remaining -= n as u64;

        if self.remaining == 0 {
            let crlf = buf.peek(2).await?;
            if crlf != b"\r\n" {
                return Err(WireError::InvalidChunkedEncoding);
            }
            buf.consume(2);
        }

        Ok(n)
    }

    async fn read_chunk_size<S: AsyncRead + Unpin>(&mut self, buf: &mut AsyncBuf<S>) -> Result<u64> {
        let line = buf.peek_to(b'\n', 0).await?;
        if line.len() < 3 || line[line.len() - 2] != b'\r' {
            return Err(WireError::InvalidChunkedEncoding);
        }

        let mut size: u64 = 0;
        let mut have_digit = false;
        for (i, &c) in line.iter().enumerate() {
            let digit = DEHEX[c as usize];
            if digit <= 0xf {
                if size > MAX_CHUNK_SIZE {
                    return Err(WireError::InvalidChunkedEncoding);
                }
                size = (size << 4) | digit as u64;
                have_digit = true;
                continue;
            }

            if i > 0 {
                if c == b'\r' && i == line.len() - 2 {
                    break;
                }
                // RFC 7230 §4.1.1: unrecognized chunk-extensions must be
                // tolerated, so ignore everything up to the closing CRLF.
                if c == b';' {
                    break;
                }
            }
            return Err(WireError::InvalidChunkedEncoding);
        }

        if !have_digit {
            return Err(WireError::InvalidChunkedEncoding);
        }

        let consumed = line.len();
        buf.consume(consumed);
        Ok(size)
    }

    async fn discard_trailers<S: AsyncRead + Unpin>(&mut self, buf: &mut AsyncBuf<S>) -> Result<()> {
        loop {
            let line = buf.peek_to(b'\n', 0).await?;
            let done = line.len() < 2 || line[0] == b'\r';
            let n = line.len();
            buf.consume(n);
            if done {
                return Ok(());
            }
        }
    }
}
