//! Best-effort local mirror of server state.
//!
//! This module provides:
//! - A time-bounded cache for raw content such as the model schema
//! - A per-entry ETag cache used as the precondition for updates
//! - A cache-first fetch layer in front of the network

mod layer;
mod storage;
mod traits;

pub use layer::CacheLayer;
pub use storage::{CacheStorage, FileStorage};
pub use traits::CacheSource;
