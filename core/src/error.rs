/*
 * error.rs
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

//! Wire-level errors: malformed messages, framing violations, and the handful
//! of programmer errors the codec can detect (nil bodies, out-of-range sizes).

use std::fmt;
use std::io;

pub type Result<T> = std::result::Result<T, WireError>;

/// Which side of a message a header-parse failure occurred on; used to remap
/// the codec's internal "malformed header" / "invalid version" failures to
/// the request- or response-specific public kind.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HeaderSide {
    Request,
    Response,
}

#[derive(Debug)]
pub enum WireError {
    MalformedRequestHeader,
    RequestVersion,
    MalformedResponseHeader,
    ResponseVersion,
    InvalidChunkedEncoding,
    InvalidContentLength,
    InvalidMessageSize,
    NilMessageBody,
    UnsupportedScheme,
    NilCancel,
    UnexpectedEof,
    /// A read was attempted on a [`crate::roundtrip::BodyReader`] after the
    /// caller had already called [`crate::roundtrip::BodyReader::close`].
    BodyClosed,
    Io(io::Error),
}

impl WireError {
    pub(crate) fn malformed_header(side: HeaderSide) -> Self {
        match side {
            HeaderSide::Request => WireError::MalformedRequestHeader,
            HeaderSide::Response => WireError::MalformedResponseHeader,
        }
    }

    pub(crate) fn invalid_version(side: HeaderSide) -> Self {
        match side {
            HeaderSide::Request => WireError::RequestVersion,
            HeaderSide::Response => WireError::ResponseVersion,
        }
    }
}

impl fmt::Display for WireError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            WireError::MalformedRequestHeader => write!(f, "wire: malformed request header"),
            WireError::RequestVersion => {
                write!(f, "wire: invalid or unsupported protocol version in request header")
            }
            WireError::MalformedResponseHeader => write!(f, "wire: malformed response header"),
            WireError::ResponseVersion => {
                write!(f, "wire: invalid or unsupported protocol version in response header")
            }
            WireError::InvalidChunkedEncoding => write!(f, "wire: invalid chunked encoding"),
            WireError::InvalidContentLength => write!(f, "wire: invalid content-length"),
            WireError::InvalidMessageSize => write!(f, "wire: invalid message size"),
            WireError::NilMessageBody => write!(f, "wire: message size implies a body but none was given"),
            WireError::UnsupportedScheme => write!(f, "wire: unsupported scheme"),
            WireError::NilCancel => write!(f, "wire: cancellation signal carried no payload"),
            WireError::UnexpectedEof => write!(f, "wire: unexpected end of stream"),
            WireError::BodyClosed => write!(f, "wire: read from a body reader after close"),
            WireError::Io(e) => write!(f, "wire: {e}"),
        }
    }
}

impl std::error::Error for WireError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        match self {
            WireError::Io(e) => Some(e),
            _ => None,
        }
    }
}

impl From<io::Error> for WireError {
    fn from(e: io::Error) -> Self {
        if e.kind() == io::ErrorKind::UnexpectedEof {
            WireError::UnexpectedEof
        } else {
            WireError::Io(e)
        }
    }
}
