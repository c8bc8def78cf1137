use std::io::Write;
use std::sync::Arc;

use tokio::io::{stdin, AsyncBufReadExt, BufReader};

use crate::node::{Node, NodeSummary};
use crate::utils::crypto::hash;

/// Why the command loop ended: the operator asked to quit, or stdin went
/// away (the node keeps serving in that case).
pub enum ShellOutcome {
    Quit,
    Eof,
}

/// Operator command loop on stdin. Drives the client operations only; ring
/// state is never mutated from here.
pub async fn run(node: Arc<Node>) -> ShellOutcome {
    let mut lines = BufReader::new(stdin()).lines();
    loop {
        print!("> ");
        let _ = std::io::stdout().flush();
        let line = match lines.next_line().await {
            Ok(Some(line)) => line,
            _ => return ShellOutcome::Eof,
        };
        let mut words = line.split_whitespace();
        match (words.next(), words.next()) {
            (Some("StoreFile"), Some(path)) => store_file(&node, path).await,
            (Some("LookUp"), Some(key)) => look_up(&node, key).await,
            (Some("PrintState"), _) => print_state(node.summary(), false),
            (Some("Dump"), _) => print_state(node.summary(), true),
            (Some("Quit"), _) => {
                println!("Quitting!");
                return ShellOutcome::Quit;
            }
            (None, _) => continue,
            _ => println!("Commands: StoreFile <file> | LookUp <name> | PrintState | Dump | Quit"),
        }
    }
}

/// Read a local file and hand its bytes to the node owning the file name.
async fn store_file(node: &Arc<Node>, path: &str) {
    let content = match tokio::fs::read(path).await {
        Ok(content) => content,
        Err(e) => {
            println!("Cannot read the file: {}", e);
            return;
        }
    };
    match node.store(path, content).await {
        Ok(owner) => println!(
            "Stored {:?} on {} (position {})",
            path,
            owner,
            hash(owner.as_bytes())
        ),
        Err(e) => println!("Store failed: {}", e),
    }
}

async fn look_up(node: &Arc<Node>, key: &str) {
    let owner = match node.lookup(key).await {
        Ok(owner) => owner,
        Err(e) => {
            println!("LookUp failed: {}", e);
            return;
        }
    };
    println!("{} {}", hash(key.as_bytes()), owner);
    match node.retrieve(key).await {
        Ok(value) => println!("Content: {}", String::from_utf8_lossy(&value)),
        Err(e) => println!("Retrieve failed: {}", e),
    }
}

fn print_state(summary: NodeSummary, with_bucket: bool) {
    println!("Node: {} (position {})", summary.address, summary.id);
    match &summary.predecessor {
        Some(predecessor) => println!(
            "Predecessor: {} (position {})",
            predecessor,
            hash(predecessor.as_bytes())
        ),
        None => println!("Predecessor: none"),
    }
    println!("Successors:");
    for successor in &summary.successors {
        println!("  {} (position {})", successor, hash(successor.as_bytes()));
    }
    println!("Finger table:");
    for finger in &summary.fingers {
        println!(
            "  start {:>4} -> {} (position {})",
            finger.start, finger.address, finger.node_id
        );
    }
    if with_bucket {
        println!("Bucket:");
        for entry in &summary.bucket {
            println!("  {:?} ({} bytes)", entry.key, entry.size);
        }
    }
}
