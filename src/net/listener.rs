//! TCP listener with backpressure.
//!
//! # Responsibilities
//! - Bind the listen address
//! - Accept incoming TCP connections
//! - Enforce `max_connections` via a semaphore

use std::net::SocketAddr;
use std::sync::Arc;

use thiserror::Error;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{OwnedSemaphorePermit, Semaphore};

#[derive(Debug, Error)]
pub enum ListenerError {
    #[error("failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        source: std::io::Error,
    },

    #[error("failed to accept: {0}")]
    Accept(std::io::Error),

    #[error("connection limiter closed")]
    Closed,
}

/// A TCP listener that limits concurrent connections.
///
/// When the limit is reached, accepting waits until a slot is released.
pub struct Listener {
    inner: TcpListener,
    connection_limit: Arc<Semaphore>,
    max_connections: usize,
}

impl Listener {
    pub async fn bind(addr: SocketAddr, max_connections: usize) -> Result<Self, ListenerError> {
        let listener = TcpListener::bind(addr)
            .await
            .map_err(|source| ListenerError::Bind { addr, source })?;
        Ok(Self::from_tcp(listener, max_connections))
    }

    /// Wrap an already bound listener (tests bind port 0 themselves).
    pub fn from_tcp(inner: TcpListener, max_connections: usize) -> Self {
        Self {
            inner,
            connection_limit: Arc::new(Semaphore::new(max_connections)),
            max_connections,
        }
    }

    /// Accept a connection. The returned permit must live as long as the
    /// connection does.
    pub async fn accept(&self) -> Result<(TcpStream, SocketAddr, ConnectionPermit), ListenerError> {
        let permit = self
            .connection_limit
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| ListenerError::Closed)?;

        let (stream, addr) = self.inner.accept().await.map_err(ListenerError::Accept)?;

        tracing::trace!(
            peer_addr = %addr,
            available_permits = self.connection_limit.available_permits(),
            "Connection accepted"
        );

        Ok((stream, addr, ConnectionPermit { _permit: permit }))
    }

    pub fn local_addr(&self) -> Result<SocketAddr, std::io::Error> {
        self.inner.local_addr()
    }

    pub fn available_permits(&self) -> usize {
        self.connection_limit.available_permits()
    }

    pub fn max_connections(&self) -> usize {
        self.max_connections
    }
}

/// A connection slot; released on drop, even if the handler panics.
#[derive(Debug)]
pub struct ConnectionPermit {
    _permit: OwnedSemaphorePermit,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_permits_are_held_per_connection() {
        let listener = Listener::bind("127.0.0.1:0".parse().unwrap(), 2).await.unwrap();
        let addr = listener.local_addr().unwrap();
        assert_eq!(listener.max_connections(), 2);

        let _client = TcpStream::connect(addr).await.unwrap();
        let (_stream, _peer, permit) = listener.accept().await.unwrap();
        assert_eq!(listener.available_permits(), 1);

        drop(permit);
        assert_eq!(listener.available_permits(), 2);
    }

    #[tokio::test]
    async fn test_bind_conflict_reports_address() {
        let first = Listener::bind("127.0.0.1:0".parse().unwrap(), 1).await.unwrap();
        let addr = first.local_addr().unwrap();
        match Listener::bind(addr, 1).await {
            Err(ListenerError::Bind { addr: reported, .. }) => assert_eq!(reported, addr),
            Err(other) => panic!("unexpected error: {other}"),
            Ok(_) => panic!("second bind should fail"),
        }
    }
}
