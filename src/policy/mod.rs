//! Policy Module
//!
//! Pure decision logic run once while a store initializes.
//!
//! ## Flow
//! ```text
//!  StorageEstimate ──► select() ──► Selection ──► partition() ──► Partition
//!        ▲                 ▲                          ▲
//!   CapacityProbe     Capabilities,              total length,
//!                     only_mem, root_dir         chunk length
//! ```

mod partition;
mod selector;

pub use partition::{partition, Partition};
pub use selector::{select, PersistentKind, Selection};
