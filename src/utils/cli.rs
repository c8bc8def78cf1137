use std::path::PathBuf;

use clap::Parser;

/// Command line surface of the node. Every option can also come from the
/// INI file given via --config; flags win over the file.
#[derive(Parser, Debug)]
#[command(name = "chord-node", about = "A Chord distributed hash table node")]
pub struct Cli {
    /// Address to bind the gRPC endpoint to
    #[arg(short = 'a', long = "address")]
    pub bind_address: Option<String>,

    /// Port to bind the gRPC endpoint to
    #[arg(short = 'p', long = "port")]
    pub port: Option<u16>,

    /// Address of an existing ring member to join via
    #[arg(long = "ja")]
    pub join_address: Option<String>,

    /// Port of an existing ring member to join via
    #[arg(long = "jp")]
    pub join_port: Option<u16>,

    /// Milliseconds between stabilize rounds
    #[arg(long = "ts")]
    pub stabilize_ms: Option<u64>,

    /// Milliseconds between fix-fingers rounds
    #[arg(long = "tff")]
    pub fix_fingers_ms: Option<u64>,

    /// Milliseconds between check-predecessor rounds
    #[arg(long = "tcp")]
    pub check_predecessor_ms: Option<u64>,

    /// Number of immediate successors to keep
    #[arg(short = 'r', long = "successors")]
    pub successor_count: Option<usize>,

    /// Diagnostic node identifier, logged but never used for routing
    #[arg(short = 'i', long = "id")]
    pub id_override: Option<String>,

    /// Serve the node state as JSON on this address
    #[arg(long = "http")]
    pub http_address: Option<String>,

    /// INI file supplying defaults for the options above
    #[arg(long = "config")]
    pub config: Option<PathBuf>,
}
