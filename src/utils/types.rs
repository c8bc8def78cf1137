use std::collections::HashMap;

/// gRPC endpoint of a node, "host:port".
pub type Address = String;

/// Position on the hash ring.
pub type HashPos = u64;

/// Locally stored key/value pairs.
pub type Bucket = HashMap<String, Vec<u8>>;
