//! TCP acceptor (spec.md §4, component C8): binds the configured host and
//! port and spawns one connection handler task per accepted socket.

use crate::config::AppConfig;
use crate::kafka::Publisher;
use crate::mllp::connection;
use log::{error, info};
use std::sync::Arc;
use tokio::net::TcpListener;

pub async fn run(config: Arc<AppConfig>, publisher: Arc<Publisher>) -> std::io::Result<()> {
    let address = format!("{}:{}", config.tcp.host, config.tcp.port);
    let listener = TcpListener::bind(&address).await?;
    info!("MLLP gateway listening on {address}");

    loop {
        let (socket, peer) = match listener.accept().await {
            Ok(accepted) => accepted,
            Err(e) => {
                error!("failed to accept connection: {e}");
                continue;
            }
        };

        info!("accepted connection from {peer}");
        let config = config.clone();
        let publisher = publisher.clone();
        tokio::spawn(async move {
            connection::handle(socket, peer, config, publisher).await;
        });
    }
}
