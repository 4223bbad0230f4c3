/*
 * buf.rs
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

//! Buffered I/O surface over any `AsyncRead + AsyncWrite`: one read buffer,
//! one write buffer, peek-without-consuming on the read side and
//! reserve-then-commit on the write side.

use bytes::{Buf, BytesMut};
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt};

use crate::error::{Result, WireError};

const INITIAL_CAPACITY: usize = 8 * 1024;

/// Wraps a duplex stream with read/write scratch buffers. Parsing code reads
/// via [`AsyncBuf::peek_to`] and advances past consumed bytes with
/// [`AsyncBuf::consume`]; serializing code stages bytes with
/// [`AsyncBuf::reserve`]/[`AsyncBuf::commit`] and pushes them out with
/// [`AsyncBuf::flush`].
pub struct AsyncBuf<S> {
    io: S,
    read_buf: BytesMut,
    write_buf: BytesMut,
    reserved: usize,
}

impl<S> AsyncBuf<S> {
    pub fn new(io: S) -> Self {
        Self {
            io,
            read_buf: BytesMut::with_capacity(INITIAL_CAPACITY),
            write_buf: BytesMut::with_capacity(INITIAL_CAPACITY),
            reserved: 0,
        }
    }

    pub fn get_ref(&self) -> &S {
        &self.io
    }

    /// Raw access to the underlying stream, bypassing both buffers. Used to
    /// hand a body writer/reader direct access once the staged header bytes
    /// have been flushed ahead of it.
    pub fn get_mut(&mut self) -> &mut S {
        &mut self.io
    }

    pub fn into_inner(self) -> S {
        self.io
    }
}

impl<S: AsyncRead + Unpin> AsyncBuf<S> {
    /// Grow the read buffer until it holds a `delim` byte at or after
    /// `from`, and return everything up to and including it. Returns
    /// [`WireError::UnexpectedEof`] if the stream ends first.
    pub async fn peek_to(&mut self, delim: u8, from: usize) -> Result<&[u8]> {
        let mut scanned = from;
        loop {
            if let Some(rel) = self.read_buf[scanned..].iter().position(|&b| b == delim) {
                return Ok(&self.read_buf[..scanned + rel + 1]);
            }
            scanned = self.read_buf.len();
            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Err(WireError::UnexpectedEof);
            }
        }
    }

    /// Grow the read buffer until at least `n` bytes are available, and
    /// return the first `n` of them.
    pub async fn peek(&mut self, n: usize) -> Result<&[u8]> {
        while self.read_buf.len() < n {
            let read = self.io.read_buf(&mut self.read_buf).await?;
            if read == 0 {
                return Err(WireError::UnexpectedEof);
            }
        }
        Ok(&self.read_buf[..n])
    }

    /// Read whatever is immediately available (buffered or not) into `out`,
    /// up to `out.len()` bytes. Returns 0 only at end of stream.
    pub async fn read_some(&mut self, out: &mut [u8]) -> Result<usize> {
        if self.read_buf.is_empty() {
            let n = self.io.read_buf(&mut self.read_buf).await?;
            if n == 0 {
                return Ok(0);
            }
        }
        let n = out.len().min(self.read_buf.len());
        out[..n].copy_from_slice(&self.read_buf[..n]);
        self.read_buf.advance(n);
        Ok(n)
    }

    /// Drop the first `n` bytes of the read buffer. Infallible.
    pub fn consume(&mut self, n: usize) {
        self.read_buf.advance(n);
    }
}

impl<S: AsyncWrite + Unpin> AsyncBuf<S> {
    /// Reserve `n` bytes at the tail of the write buffer and return them for
    /// the caller to fill. Must be followed by [`AsyncBuf::commit`] before
    /// any other method is called.
    pub fn reserve(&mut self, n: usize) -> &mut [u8] {
        let start = self.write_buf.len();
        self.write_buf.resize(start + n, 0);
        self.reserved = n;
        &mut self.write_buf[start..]
    }

    /// Keep the first `n` bytes of the most recent [`AsyncBuf::reserve`]
    /// call and drop the rest.
    pub fn commit(&mut self, n: usize) {
        debug_assert!(n <= self.reserved);
        let total = self.write_buf.len();
        self.write_buf.truncate(total - self.reserved + n);
        self.reserved = 0;
    }

    /// Append bytes directly to the write buffer without a reserve/commit
    /// round trip.
    pub fn write_buffered(&mut self, bytes: &[u8]) {
        self.write_buf.extend_from_slice(bytes);
    }

    /// Push the write buffer's contents to the underlying stream and clear
    /// it.
    pub async fn flush(&mut self) -> Result<()> {
        self.io.write_all(&self.write_buf).await?;
        self.write_buf.clear();
        self.io.flush().await?;
        Ok(())
    }
}
