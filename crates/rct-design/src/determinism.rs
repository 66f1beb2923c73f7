use rct_core::{working_seed, Dataset};

/// Substream reserved for the uniform pick among retained candidates.
pub const PICK_SUBSTREAM: u64 = 0x7069_636b;

/// Working seed of a design run over `dataset`.
pub fn design_seed(dataset: &Dataset, seed_shift: u64) -> u64 {
    working_seed(dataset.content_hash(), seed_shift)
}

