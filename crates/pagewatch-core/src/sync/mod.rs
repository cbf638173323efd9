//! Publishing to the remote mirror
//!
//! Pushes the snapshots written during a run to the mirror as one batch.
//!
//! ## Guarantees
//!
//! - Only documents whose bytes differ from the published copy are sent
//! - All changed documents become visible together or not at all
//! - The run's dirty set is cleared only after the mirror accepted the batch
//!
//! ## Usage
//!
//! ```ignore
//! let sync = SyncManager::from_config(&remote, mirror);
//! match sync.publish(&store, &mut ctx).await {
//!     Ok(outcome) => println!("{}", outcome),
//!     Err(e) => eprintln!("{}", e),
//! }
//! ```

mod error;
mod manager;

pub use error::SyncError;
pub use manager::{PublishOutcome, PublishStep, SyncManager};
