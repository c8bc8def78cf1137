use std::process::exit;

use clap::Parser;
use log::{info, LevelFilter};

use chord_node::threads::setup::bootstrap;
use chord_node::threads::shell::{self, ShellOutcome};
use chord_node::threads::web;
use chord_node::utils::cli::Cli;
use chord_node::utils::config::Config;
use chord_node::utils::crypto::hash;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();
    simple_logger::SimpleLogger::new()
        .env()
        .with_level(LevelFilter::Info)
        .init()
        .unwrap();

    let config = match Config::resolve(cli) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Invalid configuration: {}", e);
            exit(2);
        }
    };

    if let Some(ref id) = config.id_override {
        info!(
            "Diagnostic id {:?} given; ring position stays {}",
            id,
            hash(config.listen_address().as_bytes())
        );
    }

    let mut handle = match bootstrap(&config).await {
        Ok(handle) => handle,
        Err(e) => {
            eprintln!("Startup failed: {}", e);
            exit(1);
        }
    };

    if let Some(ref http_address) = config.http_address {
        web::spawn(handle.node.clone(), http_address.clone());
    }

    match shell::run(handle.node.clone()).await {
        ShellOutcome::Quit => {
            handle.shutdown().await;
        }
        ShellOutcome::Eof => {
            info!("stdin closed, serving until killed");
            std::future::pending::<()>().await;
        }
    }
}
