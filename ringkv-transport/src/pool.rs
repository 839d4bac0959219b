//! Blocking connection pool for the peer client.
//!
//! Bounded idle/total connections with RAII return-to-pool, the same shape
//! as a synchronous client's connection pool: a mutex around idle
//! connections plus a total counter, acquire/release without holding the
//! lock across I/O.

use std::collections::VecDeque;
use std::io::{Read, Write};
use std::net::{SocketAddr, TcpStream};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use ringkv_common::wire::Frame;

use crate::error::TransportError;

#[derive(Debug, Clone)]
pub struct PoolConfig {
    pub addr: String,
    pub max_idle: usize,
    pub max_total: usize,
    pub connect_timeout: Option<Duration>,
    pub read_timeout: Option<Duration>,
    pub write_timeout: Option<Duration>,
}

impl PoolConfig {
    pub fn new(addr: impl Into<String>) -> Self {
        PoolConfig {
            addr: addr.into(),
            max_idle: 8,
            max_total: 32,
            connect_timeout: Some(Duration::from_secs(2)),
            read_timeout: Some(Duration::from_secs(5)),
            write_timeout: Some(Duration::from_secs(5)),
        }
    }
}

struct PoolState {
    idle: VecDeque<Connection>,
    total: usize,
}

struct PoolInner {
    config: PoolConfig,
    state: Mutex<PoolState>,
}

#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    pub fn new(config: PoolConfig) -> Self {
        ConnectionPool {
            inner: Arc::new(PoolInner {
                state: Mutex::new(PoolState {
                    idle: VecDeque::with_capacity(config.max_idle),
                    total: 0,
                }),
                config,
            }),
        }
    }

    pub fn acquire(&self) -> Result<PooledConnection, TransportError> {
        if let Some(conn) = self.pop_idle() {
            return Ok(PooledConnection::new(Arc::clone(&self.inner), conn));
        }
        if !self.try_reserve() {
            return Err(TransportError::PoolExhausted);
        }
        match Connection::connect(&self.inner.config) {
            Ok(conn) => Ok(PooledConnection::new(Arc::clone(&self.inner), conn)),
            Err(err) => {
                self.release_slot();
                Err(err)
            }
        }
    }

    fn pop_idle(&self) -> Option<Connection> {
        self.inner.state.lock().expect("pool mutex poisoned").idle.pop_front()
    }

    fn try_reserve(&self) -> bool {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        if state.total >= self.inner.config.max_total {
            return false;
        }
        state.total += 1;
        true
    }

    fn release_slot(&self) {
        let mut state = self.inner.state.lock().expect("pool mutex poisoned");
        state.total = state.total.saturating_sub(1);
    }
}

fn return_connection(inner: &Arc<PoolInner>, conn: Connection) {
    let mut state = inner.state.lock().expect("pool mutex poisoned");
    if state.idle.len() < inner.config.max_idle {
        state.idle.push_back(conn);
    } else {
        state.total = state.total.saturating_sub(1);
    }
}

fn release_slot(inner: &Arc<PoolInner>) {
    let mut state = inner.state.lock().expect("pool mutex poisoned");
    state.total = state.total.saturating_sub(1);
}

pub struct PooledConnection {
    inner: Arc<PoolInner>,
    conn: Option<Connection>,
    valid: bool,
}

impl PooledConnection {
    fn new(inner: Arc<PoolInner>, conn: Connection) -> Self {
        PooledConnection {
            inner,
            conn: Some(conn),
            valid: true,
        }
    }

    pub fn exec(&mut self, frame: &Frame) -> Result<Frame, TransportError> {
        let conn = self.conn.as_mut().expect("connection exists");
        let result = conn.exec(frame);
        if result.is_err() {
            self.valid = false;
        }
        result
    }
}

impl Drop for PooledConnection {
    fn drop(&mut self) {
        let Some(conn) = self.conn.take() else {
            return;
        };
        if self.valid {
            return_connection(&self.inner, conn);
        } else {
            release_slot(&self.inner);
        }
    }
}

struct Connection {
    stream: TcpStream,
}

impl Connection {
    fn connect(config: &PoolConfig) -> Result<Self, TransportError> {
        let addr: SocketAddr = config
            .addr
            .parse()
            .map_err(|_| TransportError::InvalidAddress)?;
        let stream = match config.connect_timeout {
            Some(timeout) => TcpStream::connect_timeout(&addr, timeout)?,
            None => TcpStream::connect(addr)?,
        };
        stream.set_nodelay(true)?;
        stream.set_read_timeout(config.read_timeout)?;
        stream.set_write_timeout(config.write_timeout)?;
        Ok(Connection { stream })
    }

    fn exec(&mut self, frame: &Frame) -> Result<Frame, TransportError> {
        let payload = frame.encode();
        self.stream.write_all(&(payload.len() as u32).to_be_bytes())?;
        self.stream.write_all(&payload)?;
        self.stream.flush()?;

        let mut len_buf = [0u8; 4];
        self.stream.read_exact(&mut len_buf)?;
        let len = u32::from_be_bytes(len_buf) as usize;
        let mut buf = vec![0u8; len];
        self.stream.read_exact(&mut buf)?;
        Ok(Frame::decode(&buf)?)
    }
}
