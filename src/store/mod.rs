//! Local state store.
//!
//! # Data Flow
//! ```text
//! <state dir>/.env
//!     → EnvSnapshot::load (missing file = empty)
//!     → EnvSnapshot::apply (set / delete / ignore empty)
//!     → EnvSnapshot::save (sorted, header, mode 0600)
//! ```
//!
//! # Design Decisions
//! - Keys are kept in a BTreeMap so output order never depends on input order
//! - Writes are not locked; a single operator is expected during setup

pub mod env_file;

pub use env_file::{apply_updates, EnvSnapshot, StoreError, Updates};
