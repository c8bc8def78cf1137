use std::error::Error;
use std::sync::Arc;

use log::{error, info};
use tokio::net::TcpListener;
use tokio::task::JoinHandle;
use tokio_stream::wrappers::TcpListenerStream;
use tonic::transport::Server;

use crate::node::Node;
use crate::threads::chord::chord_proto::chord_server::ChordServer;
use crate::threads::chord::{chord_proto, ChordService};
use crate::threads::maintenance;
use crate::utils::config::Config;

/// A running node: the shared record plus the tasks serving and repairing
/// it. Dropping the handle does not stop the node; call shutdown.
pub struct NodeHandle {
    pub node: Arc<Node>,
    tasks: Vec<JoinHandle<()>>,
}

impl NodeHandle {
    pub async fn shutdown(&mut self) {
        for task in self.tasks.drain(..) {
            task.abort();
        }
        self.node.disconnect_all().await;
    }
}

/// Brings a node up: bind the listen socket (fatal on failure), serve the
/// gRPC surface, then create a fresh ring or join via the configured seed,
/// and finally start the maintenance loops. The two startup paths are the
/// only places a ring membership begins.
pub async fn bootstrap(config: &Config) -> Result<NodeHandle, Box<dyn Error + Send + Sync>> {
    let listen_address = config.listen_address();
    let node = Node::new(listen_address.clone(), config.successor_count);

    let listener = TcpListener::bind(&listen_address).await?;
    info!("Listening for peers on {}", listen_address);

    let reflection_service = tonic_reflection::server::Builder::configure()
        .register_encoded_file_descriptor_set(chord_proto::FILE_DESCRIPTOR_SET)
        .build()?;
    let chord_service = ChordServer::new(ChordService::new(node.clone()));

    let mut tasks = Vec::new();
    tasks.push(tokio::spawn(async move {
        if let Err(e) = Server::builder()
            .add_service(chord_service)
            .add_service(reflection_service)
            .serve_with_incoming(TcpListenerStream::new(listener))
            .await
        {
            error!("gRPC service terminated: {}", e);
        }
    }));

    let membership = match &config.seed {
        Some(seed) => {
            info!("Joining existing ring via {}", seed);
            node.join(seed).await
        }
        None => node.create(),
    };
    if let Err(e) = membership {
        for task in tasks {
            task.abort();
        }
        return Err(e.into());
    }

    tasks.extend(maintenance::spawn(node.clone(), config));
    Ok(NodeHandle { node, tasks })
}
