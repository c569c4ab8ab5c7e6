//! Time-boxed resource lifecycle for hoaxify.
//!
//! Two kinds of rows expire on their own: session tokens (sliding TTL since
//! last use) and uploaded attachments nobody claimed within the grace window.
//! [`SessionManager`] and [`AttachmentReaper`] own the write paths for those
//! rows and each exposes a periodic sweep driven by [`sweep::spawn`].
//!
//! The stores are the synchronization boundary. Nothing here holds an
//! in-process lock across a store call; every state transition that can race
//! (touch vs. expiry, claim vs. reap) is a single conditional statement on
//! the store side.

pub mod clock;
pub mod config;
pub mod error;
pub mod gate;
pub mod reaper;
pub mod sessions;
pub mod store;
pub mod sweep;

#[cfg(test)]
pub(crate) mod memory;

pub use clock::{Clock, ManualClock, SystemClock};
pub use config::LifecycleConfig;
pub use error::LifecycleError;
pub use gate::{Gate, Identity, bearer_token};
pub use reaper::AttachmentReaper;
pub use sessions::SessionManager;
pub use store::{AttachmentStore, BlobStore, TokenStore};
pub use sweep::{Sweep, SweepHandle};
