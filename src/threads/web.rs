use std::sync::Arc;
use std::thread;

use actix_web::{get, web, App, HttpResponse, HttpServer, Responder};
use log::{error, info};
use serde::Serialize;

use crate::node::Node;
use crate::utils::crypto::hash;
use crate::utils::types::{Address, HashPos};

#[derive(Serialize)]
struct LookupReply {
    key: String,
    id: HashPos,
    owner: Address,
}

/// Node state as JSON.
#[get("/")]
async fn index(node: web::Data<Arc<Node>>) -> impl Responder {
    HttpResponse::Ok().json(node.summary())
}

/// Resolve the owner of a key through the ring.
#[get("/lookup/{key}")]
async fn lookup(node: web::Data<Arc<Node>>, key: web::Path<String>) -> impl Responder {
    let key = key.into_inner();
    let id = hash(key.as_bytes());
    match node.lookup(&key).await {
        Ok(owner) => HttpResponse::Ok().json(LookupReply { key, id, owner }),
        Err(e) => HttpResponse::BadGateway().body(e.to_string()),
    }
}

/// Serves the status endpoints on a dedicated actix system thread.
pub fn spawn(node: Arc<Node>, address: String) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        info!("Starting up HTTP status surface on {}", address);
        let system = actix_web::rt::System::new();
        if let Err(e) = system.block_on(serve(node, address)) {
            error!("HTTP status surface terminated: {}", e);
        }
    })
}

async fn serve(node: Arc<Node>, address: String) -> std::io::Result<()> {
    HttpServer::new(move || {
        App::new()
            .app_data(web::Data::new(node.clone()))
            .service(index)
            .service(lookup)
    })
    .bind(address)?
    .run()
    .await
}
