//! `vecstore` is an embedded key-to-vector store with exact nearest-neighbour
//! search.
//!
//! A store is three collections kept in lockstep:
//! - the key ledger: keys in insertion order, duplicate free
//! - the inverse lookup: key -> position in the ledger
//! - the vector index: one row per ledger position, searched by L2 distance
//!
//! `VectorDb` is the only mutating entry point. It persists the three
//! collections as separate artifacts in one directory and refuses to open
//! them if they disagree.

pub mod db;
pub mod embed;
pub mod error;
#[doc(hidden)]
pub mod fuzzing;
pub mod index;
pub mod ledger;
pub mod linalg;
pub mod options;
pub mod storage;
pub mod types;

pub use db::{Keys, OpenState, VectorDb};
pub use embed::Embedder;
pub use error::{Result, StoreError};
pub use options::StoreOptions;
pub use types::{Neighbor, VectorIndex};

/// Library version string exposed to the CLI.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
