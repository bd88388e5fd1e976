//! Partition Policy
//!
//! Splits the chunk index space between the persistent tier and the
//! overflow tier.

/// How the chunk index space is divided
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Partition {
    /// The persistent backend absorbs every index
    Whole,

    /// Indices `[0, split_index)` go to the persistent backend, the rest to
    /// an overflow backend at `index - split_index`
    Split {
        split_index: u64,
        persistent_length: u64,
        /// `None` when the store itself is unbounded
        overflow_length: Option<u64>,
    },

    /// Capacity is smaller than one chunk; nothing is persisted
    NoCapacity,
}

/// Compute the partition for a persistent backend of `target_length` bytes
///
/// `target_length = None` means unknown capacity and never splits.
/// `total_length = None` means an unbounded store.
pub fn partition(
    target_length: Option<u64>,
    total_length: Option<u64>,
    chunk_length: usize,
) -> Partition {
    let target = match target_length {
        Some(target) if target > 0 => target,
        _ => return Partition::Whole,
    };
    if matches!(total_length, Some(total) if target >= total) {
        return Partition::Whole;
    }

    let split_index = target / chunk_length as u64;
    if split_index == 0 {
        return Partition::NoCapacity;
    }

    let persistent_length = split_index * chunk_length as u64;
    Partition::Split {
        split_index,
        persistent_length,
        overflow_length: total_length.map(|total| total - persistent_length),
    }
}
