//! Compile-time limits and defaults shared by the index and the join.

/// Maximum number of dimensions a cube may have.
pub const MAX_CUBE_DIM: usize = 100;

/// Entries per segment of the pending stack and result queue.
pub const DEFAULT_SEGMENT_CAPACITY: usize = 256;

/// Upper bound on pages visited while following one right-link chain.
///
/// A chain longer than this can only come from a cycle in the sibling
/// links, so the reader reports corruption instead of looping.
pub const DEFAULT_MAX_RIGHT_LINK_CHAIN: usize = 1_000_000;

/// Default maximum number of tuples per index page.
pub const DEFAULT_MAX_FANOUT: usize = 64;

/// Smallest fan-out for which a page split leaves both halves non-empty.
pub const MIN_FANOUT: usize = 2;
