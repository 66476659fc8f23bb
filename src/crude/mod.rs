//! Client core for the crude content API.

pub mod api_types;
pub mod cached_client;
pub mod client;
mod compound_id;
mod error;
pub mod schema;
pub mod writer;

#[cfg(test)]
pub mod testing;

pub use compound_id::CompoundId;
pub use error::{CrudeError, Result};
