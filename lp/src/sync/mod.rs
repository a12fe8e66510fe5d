//! Synchronization with the remote store
//!
//! - [`hydration`] - pull remote records into the store when the identity changes
//! - [`queue`] - actor that mirrors local commits to the remote, one task at a time
//! - [`notice`] - transient user-facing outcome messages

pub mod hydration;
pub mod notice;
pub mod queue;

pub use hydration::{HydrationCoordinator, Readiness};
pub use notice::{Notice, NoticeTone, drain_notices};
pub use queue::{SyncQueue, SyncResult, SyncTask, SyncTicket};
