extern crate core;

mod acceptor;
mod config;
mod dispatch;
mod fhir;
mod hl7;
mod idgen;
mod kafka;
mod mllp;

use config::AppConfig;
use kafka::Publisher;
use log::info;
use std::sync::Arc;

#[tokio::main]
async fn main() {
    let config = match AppConfig::new() {
        Ok(c) => c,
        Err(e) => panic!("Failed to parse app settings: {e:?}"),
    };
    let env = env_logger::Env::default().filter_or("RUST_LOG", config.app.log_level.clone());
    env_logger::init_from_env(env);

    let publisher = Publisher::new(&config.kafka).expect("failed to create kafka producer");

    info!("starting mllp-fhir-gateway");
    if let Err(e) = acceptor::run(Arc::new(config), Arc::new(publisher)).await {
        panic!("acceptor failed: {e}");
    }
}
