//! Network layer subsystem.
//!
//! # Data Flow
//! ```text
//! Incoming TCP connection
//!     → listener.rs (accept, connection limit)
//!     → connection.rs (ID, lifetime tracking for drain)
//!     → hand off to the HTTP layer
//! ```
//!
//! # Design Decisions
//! - Bounded accepts prevent resource exhaustion
//! - Each connection tracked so shutdown can wait for in-flight work

pub mod connection;
pub mod listener;

pub use connection::{ConnectionGuard, ConnectionId, ConnectionTracker};
pub use listener::{ConnectionPermit, Listener, ListenerError};
