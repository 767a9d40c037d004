//! Job store with actor pattern
//!
//! JobStore owns the list of known export jobs and processes mutations via
//! channels, so the poller and user actions never race on the list.

mod manager;
mod messages;

pub use manager::JobStore;
pub use messages::{StoreCommand, StoreError, StoreEvent, StoreResponse};
