use std::env;
use std::process::exit;

use tonic::transport::Channel;
use tonic::Request;

use chord_node::utils::crypto::hash;
use chord_node::utils::types::HashPos;

use crate::chord_proto::chord_client::ChordClient;
use crate::chord_proto::{Empty, NodeSummaryMsg};

pub mod chord_proto {
    tonic::include_proto!("chord");
}

/// Pulls a summary from every listed node and verifies the ring invariants:
/// the successor cycle, predecessor agreement, successor-list order and
/// finger correctness. Exits nonzero when the cluster is inconsistent.
#[tokio::main]
async fn main() {
    let args: Vec<String> = env::args().skip(1).collect();
    if args.is_empty() {
        eprintln!("Provide at least one node url, e.g. 127.0.0.1:4600");
        exit(2);
    }

    let mut node_summaries: Vec<NodeSummaryMsg> = Vec::new();
    for host in &args {
        let url = if host.starts_with("http") {
            host.clone()
        } else {
            format!("http://{}", host)
        };
        let mut client: ChordClient<Channel> = match ChordClient::connect(url).await {
            Ok(client) => client,
            Err(e) => {
                eprintln!("Cannot reach {}: {}", host, e);
                exit(1);
            }
        };
        match client.get_node_summary(Request::new(Empty {})).await {
            Ok(summary) => node_summaries.push(summary.into_inner()),
            Err(e) => {
                eprintln!("Cannot fetch summary from {}: {}", host, e);
                exit(1);
            }
        }
    }

    node_summaries.sort_by_key(|summary| summary.id);
    let node_ids: Vec<HashPos> = node_summaries.iter().map(|summary| summary.id).collect();
    let count = node_summaries.len();
    let mut is_valid = true;

    // each node's primary successor must be the next node in id order
    for i in 0..count {
        let current = &node_summaries[i];
        let expected = &node_summaries[(i + 1) % count].address;
        match current.successors.first() {
            Some(successor) if successor == expected => {}
            other => {
                eprintln!("-----");
                eprintln!(
                    "Node ({}, {}): wrong successor! Expected {}, got {:?}",
                    current.id, current.address, expected, other
                );
                is_valid = false;
            }
        }
    }

    // every node must be known as predecessor by its successor
    for i in 0..count {
        let current = &node_summaries[i].address;
        let next = &node_summaries[(i + 1) % count];
        if next.predecessor.as_ref() != Some(current) {
            eprintln!("-----");
            eprintln!(
                "Node ({}, {}): wrong predecessor: {:?}, expected {}",
                next.id, next.address, next.predecessor, current
            );
            is_valid = false;
        }
    }

    // successor lists must follow ring order
    for (i, summary) in node_summaries.iter().enumerate() {
        for (j, listed) in summary.successors.iter().enumerate() {
            let actual = &node_summaries[(i + j + 1) % count].address;
            if listed != actual {
                eprintln!("-----");
                eprintln!(
                    "Node ({}, {}): wrong successor list entry {}: {} instead of {}",
                    summary.id, summary.address, j, listed, actual
                );
                is_valid = false;
            }
        }
    }

    // every finger must point at the node actually responsible for its start
    for summary in &node_summaries {
        for (j, finger) in summary.fingers.iter().enumerate() {
            let pointed_to = hash(finger.address.as_bytes());
            let responsible = responsible_node_for(finger.start, &node_ids);
            if pointed_to != responsible {
                eprintln!("-----");
                eprintln!(
                    "Node ({}, {}): finger {} for start {} points at ({}, {})",
                    summary.id, summary.address, j, finger.start, pointed_to, finger.address
                );
                eprintln!("But position {} is responsible for {}", responsible, finger.start);
                is_valid = false;
            }
        }
    }

    if is_valid {
        eprintln!("Looks good!");
    } else {
        eprintln!("Cluster is invalid!");
        exit(1);
    }
}

/// The id of the node owning `key`: the smallest node id at or after the
/// key, wrapping to the smallest id overall.
fn responsible_node_for(key: HashPos, node_ids: &[HashPos]) -> HashPos {
    *node_ids
        .iter()
        .filter(|&&id| key <= id)
        .min()
        .unwrap_or_else(|| node_ids.iter().min().unwrap())
}
