//! Stream registry.
//!
//! Maps caller-supplied stream keys to stream configurations and is the
//! only shared mutable state in the service.
//!
//! # Architecture
//!
//! ```text
//!                    Arc<StreamRegistry>
//!              ┌──────────────────────────────┐
//!              │ RwLock<RegistryState {       │
//!              │   entries: HashMap<Key,      │
//!              │     StreamEntry>,            │
//!              │   next_seq,                  │
//!              │ }>                           │
//!              └───────────────┬──────────────┘
//!                              │ lock released
//!                              ▼
//!                   Arc<dyn StreamProcessor>
//!                 start / stop / restart / info
//! ```
//!
//! Decisions that must be atomic with a write (capacity checks, victim
//! selection) run inside `StreamRegistry::transact`. Processor notifications
//! always happen afterwards, outside the lock.

pub mod entry;
pub mod store;

pub use entry::{RegistryState, StreamEntry};
pub use store::StreamRegistry;
