use std::sync::Arc;
use std::time::Duration;

use log::info;
use tokio::task::JoinHandle;
use tokio::time::sleep;

use crate::node::Node;
use crate::utils::config::Config;

/// Spawns the three periodic repair tasks. Each runs one round, sleeps its
/// own period and goes again; a failed round only logs. The tasks live
/// until the process quits or the handle aborts them.
pub fn spawn(node: Arc<Node>, config: &Config) -> Vec<JoinHandle<()>> {
    info!(
        "Starting maintenance loops (stabilize {}ms, fix_fingers {}ms, check_predecessor {}ms)",
        config.stabilize_ms, config.fix_fingers_ms, config.check_predecessor_ms
    );
    vec![
        tokio::spawn(stabilize_loop(
            node.clone(),
            Duration::from_millis(config.stabilize_ms),
        )),
        tokio::spawn(fix_fingers_loop(
            node.clone(),
            Duration::from_millis(config.fix_fingers_ms),
        )),
        tokio::spawn(check_predecessor_loop(
            node,
            Duration::from_millis(config.check_predecessor_ms),
        )),
    ]
}

async fn stabilize_loop(node: Arc<Node>, period: Duration) {
    loop {
        node.stabilize().await;
        sleep(period).await;
    }
}

async fn fix_fingers_loop(node: Arc<Node>, period: Duration) {
    loop {
        node.fix_fingers().await;
        sleep(period).await;
    }
}

async fn check_predecessor_loop(node: Arc<Node>, period: Duration) {
    loop {
        node.check_predecessor().await;
        sleep(period).await;
    }
}
