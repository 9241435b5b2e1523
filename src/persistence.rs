//! Cross-session window and application state.

pub mod state;
pub mod store;

pub use state::{PersistedWindowState, StateStore, WindowFlags, parse_key, state_key};
pub use store::{FileStore, KvStore, MemoryStore, StoreError};
