/*
 * lib.rs
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

//! HTTP/1.x wire codec and client-side round-trip engine: header field
//! lists, message framing, chunked transfer-coding, a pooled connection
//! layer, and the round-trip engine that drives a request across them.

pub mod body;
pub mod buf;
pub mod chunked;
pub mod error;
pub mod fields;
pub mod message;
pub mod net;
pub mod pool;
pub mod roundtrip;

pub use buf::AsyncBuf;
pub use error::{Result, WireError};
pub use fields::{HeaderField, HeaderFields};
pub use message::RequestLine;
pub use net::{Dialer, Stream, TcpDialer, TcpListener};
pub use pool::{Pool, PooledConn};
pub use roundtrip::{cancel_channel, parse_request_header, BodyReader, Cancel, Request, Response, RoundTripper};
