/*
 * pool.rs
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

//! Connection reuse on top of a [`Dialer`]. Idle connections are kept per
//! address, most-recently-used first, and swept out after they have sat
//! idle past the pool's timeout.

use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use std::time::{Duration, Instant};

use tokio::io::{ReadHalf, WriteHalf};
use tracing::{debug, trace};

use crate::buf::AsyncBuf;
use crate::error::Result;
use crate::net::Dialer;

const SWEEP_INTERVAL: Duration = Duration::from_secs(5);

struct Idle<C> {
    buf: AsyncBuf<C>,
    idle_since: Instant,
}

struct State<C> {
    idle_tcp: HashMap<String, VecDeque<Idle<C>>>,
    idle_tls: HashMap<String, VecDeque<Idle<C>>>,
    looping: bool,
}

impl<C> Default for State<C> {
    fn default() -> Self {
        Self { idle_tcp: HashMap::new(), idle_tls: HashMap::new(), looping: false }
    }
}

struct Inner<D: Dialer> {
    dialer: D,
    timeout: Duration,
    sweep_interval: Duration,
    state: Mutex<State<D::Conn>>,
}

impl<D: Dialer> Inner<D> {
    fn take_idle(&self, tls: bool, addr: &str) -> Option<AsyncBuf<D::Conn>> {
        let mut state = self.state.lock().unwrap();
        let map = if tls { &mut state.idle_tls } else { &mut state.idle_tcp };
        let list = map.get_mut(addr)?;
        let idle = list.pop_front();
        if list.is_empty() {
            map.remove(addr);
        }
        idle.map(|idle| idle.buf)
    }

    fn recycle(self: &Arc<Self>, buf: AsyncBuf<D::Conn>, addr: String, tls: bool) {
        let mut state = self.state.lock().unwrap();
        let map = if tls { &mut state.idle_tls } else { &mut state.idle_tcp };
        map.entry(addr).or_default().push_front(Idle { buf, idle_since: Instant::now() });

        if !state.looping {
            state.looping = true;
            let inner = self.clone();
            tokio::spawn(async move { inner.sweep_loop().await });
        }
    }

    fn close_idle(&self) {
        let mut state = self.state.lock().unwrap();
        state.idle_tcp.clear();
        state.idle_tls.clear();
    }

    async fn sweep_loop(self: Arc<Self>) {
        let mut ticker = tokio::time::interval(self.sweep_interval);
        ticker.tick().await;

        loop {
            ticker.tick().await;
            let cutoff = Instant::now() - self.timeout;

            let mut state = self.state.lock().unwrap();
            sweep(&mut state.idle_tcp, cutoff);
            sweep(&mut state.idle_tls, cutoff);

            if state.idle_tcp.is_empty() && state.idle_tls.is_empty() {
                state.looping = false;
                trace!("pool sweeper stopping: no idle connections remain");
                return;
            }
        }
    }
}

/// Drop every entry at the stale (oldest) end of each address's list. Since
/// `recycle` pushes the newest connection to the front, idle times increase
/// moving from front to back, so the first fresh entry from the back ends
/// the sweep for that address.
fn sweep<C>(map: &mut HashMap<String, VecDeque<Idle<C>>>, cutoff: Instant) {
    map.retain(|addr, list| {
        let mut dropped = 0;
        while let Some(idle) = list.back() {
            if idle.idle_since < cutoff {
                list.pop_back();
                dropped += 1;
            } else {
                break;
            }
        }
        if dropped > 0 {
            trace!(addr, dropped, "swept idle connections");
        }
        !list.is_empty()
    });
}

/// Extends a [`Dialer`] with connection reuse. Cheap to clone: every clone
/// shares the same idle-connection state.
pub struct Pool<D: Dialer> {
    inner: Arc<Inner<D>>,
}

impl<D: Dialer> Clone for Pool<D> {
    fn clone(&self) -> Self {
        Self { inner: self.inner.clone() }
    }
}

impl<D: Dialer> Pool<D> {
    pub fn new(dialer: D, idle_timeout: Duration) -> Self {
        Self::with_sweep_interval(dialer, idle_timeout, SWEEP_INTERVAL)
    }

    /// Like [`new`](Pool::new), but with a configurable sweep period instead
    /// of the default 5 seconds. Exposed for testing.
    pub fn with_sweep_interval(dialer: D, idle_timeout: Duration, sweep_interval: Duration) -> Self {
        assert!(idle_timeout > Duration::ZERO, "wire::Pool::new: idle_timeout must be positive");
        Self {
            inner: Arc::new(Inner {
                dialer,
                timeout: idle_timeout,
                sweep_interval,
                state: Mutex::new(State::default()),
            }),
        }
    }

    pub async fn dial_tcp(&self, addr: &str) -> Result<PooledConn<D>> {
        if let Some(buf) = self.inner.take_idle(false, addr) {
            debug!(addr, "reusing idle tcp connection");
            return Ok(PooledConn::new(buf, self.inner.clone(), addr.to_string(), false));
        }
        let stream = self.inner.dialer.dial_tcp(addr).await?;
        Ok(PooledConn::new(AsyncBuf::new(stream), self.inner.clone(), addr.to_string(), false))
    }

    pub async fn dial_tls(&self, addr: &str) -> Result<PooledConn<D>> {
        if let Some(buf) = self.inner.take_idle(true, addr) {
            debug!(addr, "reusing idle tls connection");
            return Ok(PooledConn::new(buf, self.inner.clone(), addr.to_string(), true));
        }
        let stream = self.inner.dialer.dial_tls(addr).await?;
        Ok(PooledConn::new(AsyncBuf::new(stream), self.inner.clone(), addr.to_string(), true))
    }

    /// Close every idle connection the pool is currently holding.
    pub fn close_idle(&self) {
        self.inner.close_idle();
    }

    #[cfg(test)]
    pub(crate) fn idle_len(&self, tls: bool, addr: &str) -> usize {
        let state = self.inner.state.lock().unwrap();
        let map = if tls { &state.idle_tls } else { &state.idle_tcp };
        map.get(addr).map_or(0, |l| l.len())
    }
}

/// A connection checked out of a [`Pool`]. Dropping it without calling
/// [`recycle`](PooledConn::recycle) closes it — reuse is opt-in, matching
/// the cost of forgetting to report a clean round trip.
pub struct PooledConn<D: Dialer> {
    buf: Option<AsyncBuf<D::Conn>>,
    pool: Arc<Inner<D>>,
    addr: String,
    tls: bool,
}

impl<D: Dialer> PooledConn<D> {
    fn new(buf: AsyncBuf<D::Conn>, pool: Arc<Inner<D>>, addr: String, tls: bool) -> Self {
        Self { buf: Some(buf), pool, addr, tls }
    }

    /// Return the connection to the pool for reuse by a later round trip.
    pub fn recycle(mut self) {
        if let Some(buf) = self.buf.take() {
            self.pool.recycle(buf, self.addr.clone(), self.tls);
        }
    }

    /// Close the connection; it will not be reused.
    pub fn close(mut self) {
        self.buf.take();
    }

    /// Split into independent read and write halves so a request body can
    /// be streamed out while the response header is read back, without the
    /// two sides ever touching the same buffer (§5: the writer touches only
    /// the send half, the reader only the receive half). The returned
    /// [`ConnJoin`] reunites the halves once both sides have settled.
    pub fn split(mut self) -> (ConnReader<D>, ConnWriter<D>, ConnJoin<D>) {
        let buf = self.buf.take().expect("PooledConn used after close/recycle");
        let (read_half, write_half) = tokio::io::split(buf.into_inner());
        let join = ConnJoin { pool: self.pool.clone(), addr: self.addr.clone(), tls: self.tls };
        (ConnReader { buf: AsyncBuf::new(read_half) }, ConnWriter { buf: AsyncBuf::new(write_half) }, join)
    }
}

/// The receive half of a [`PooledConn`] taken apart by [`PooledConn::split`].
pub struct ConnReader<D: Dialer> {
    buf: AsyncBuf<ReadHalf<D::Conn>>,
}

/// The send half; see [`ConnReader`].
pub struct ConnWriter<D: Dialer> {
    buf: AsyncBuf<WriteHalf<D::Conn>>,
}

impl<D: Dialer> std::ops::Deref for ConnReader<D> {
    type Target = AsyncBuf<ReadHalf<D::Conn>>;
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl<D: Dialer> std::ops::DerefMut for ConnReader<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

impl<D: Dialer> std::ops::Deref for ConnWriter<D> {
    type Target = AsyncBuf<WriteHalf<D::Conn>>;
    fn deref(&self) -> &Self::Target {
        &self.buf
    }
}

impl<D: Dialer> std::ops::DerefMut for ConnWriter<D> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        &mut self.buf
    }
}

/// Reunites a [`ConnReader`]/[`ConnWriter`] pair produced by the same
/// [`PooledConn::split`] call and settles the connection's fate once both
/// the body send and the body receive have reached a terminal state.
pub struct ConnJoin<D: Dialer> {
    pool: Arc<Inner<D>>,
    addr: String,
    tls: bool,
}

impl<D: Dialer> ConnJoin<D> {
    /// Rejoin the two halves into a single stream. Recycles it when
    /// `recycle` holds; otherwise the stream is simply dropped, closing the
    /// transport.
    pub fn finish(self, reader: ConnReader<D>, writer: ConnWriter<D>, recycle: bool) {
        let stream = reader.buf.into_inner().unsplit(writer.buf.into_inner());
        if recycle {
            self.pool.recycle(AsyncBuf::new(stream), self.addr, self.tls);
        }
    }
}

impl<D: Dialer> std::ops::Deref for PooledConn<D> {
    type Target = AsyncBuf<D::Conn>;
    fn deref(&self) -> &AsyncBuf<D::Conn> {
        self.buf.as_ref().expect("PooledConn used after close/recycle")
    }
}

impl<D: Dialer> std::ops::DerefMut for PooledConn<D> {
    fn deref_mut(&mut self) -> &mut AsyncBuf<D::Conn> {
        self.buf.as_mut().expect("PooledConn used after close/recycle")
    }
}
