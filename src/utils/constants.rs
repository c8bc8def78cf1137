use crate::utils::types::HashPos;

/// Width of the identifier space. The ring holds 2^RING_BITS positions and
/// the finger table carries one entry per bit. Any value up to 64 works.
pub const RING_BITS: u32 = 10;
pub const RING_SIZE: HashPos = 1 << RING_BITS;
pub const RING_MASK: HashPos = RING_SIZE - 1;

/// A lookup visiting more hops than there are ring positions is cycling.
pub const MAX_LOOKUP_HOPS: usize = RING_SIZE as usize;

pub static CONNECT_TIMEOUT_MILLIS: u64 = 1_000;
pub static RPC_DEADLINE_MILLIS: u64 = 3_000;

pub static JOIN_MAX_RETRIES: u64 = 15;
pub static JOIN_RETRY_SLEEP_MILLIS: u64 = 100;
