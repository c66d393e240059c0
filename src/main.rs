use clap::{value_parser, Arg, ArgAction, Command};
use std::net::IpAddr;
use tracing::info;
use tracing_subscriber::EnvFilter;

use shardstore::{Config, Result, Service};

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let matches = Command::new("shardstore")
        .version("0.1.0")
        .about("Object store spreading each object over a pool of storage nodes")
        .arg(
            Arg::new("ip")
                .long("ip")
                .env("SHARDSTORE_IP")
                .help("IP address to listen on")
                .value_parser(value_parser!(IpAddr))
        )
        .arg(
            Arg::new("port")
                .long("port")
                .env("SHARDSTORE_PORT")
                .help("Port to listen on")
                .value_parser(value_parser!(u16))
        )
        .arg(
            Arg::new("storage-path")
                .long("storage-path")
                .env("SHARDSTORE_STORAGE_PATH")
                .help("Directory holding one subdirectory per storage node")
        )
        .arg(
            Arg::new("nodes")
                .long("nodes")
                .env("SHARDSTORE_NODES")
                .help("Number of storage nodes created at startup")
                .value_parser(value_parser!(usize))
        )
        .arg(
            Arg::new("node-capacity")
                .long("node-capacity")
                .env("SHARDSTORE_NODE_CAPACITY")
                .help("Capacity in bytes of each storage node")
                .value_parser(value_parser!(u64))
        )
        .arg(
            Arg::new("fixed-capacity")
                .long("fixed-capacity")
                .help("Start with empty nodes instead of randomized usage")
                .action(ArgAction::SetTrue)
        )
        .arg(
            Arg::new("add-node-after")
                .long("add-node-after")
                .env("SHARDSTORE_ADD_NODE_AFTER")
                .help("Add one storage node this many seconds after startup")
                .value_parser(value_parser!(u64))
        )
        .arg(
            Arg::new("max-upload-size")
                .long("max-upload-size")
                .env("SHARDSTORE_MAX_UPLOAD_SIZE")
                .help("Largest accepted upload in bytes")
                .value_parser(value_parser!(u64))
        )
        .get_matches();

    info!("Starting shardstore");

    let mut config = Config::default();
    if let Some(ip) = matches.get_one::<IpAddr>("ip") {
        config.bind_ip = *ip;
    }
    if let Some(port) = matches.get_one::<u16>("port") {
        config.port = *port;
    }
    if let Some(path) = matches.get_one::<String>("storage-path") {
        config.storage_path = path.clone();
    }
    if let Some(nodes) = matches.get_one::<usize>("nodes") {
        config.initial_nodes = *nodes;
    }
    if let Some(capacity) = matches.get_one::<u64>("node-capacity") {
        config.node_capacity = *capacity;
    }
    if matches.get_flag("fixed-capacity") {
        config.randomize_capacity = false;
    }
    config.add_node_after_secs = matches.get_one::<u64>("add-node-after").copied();
    if let Some(limit) = matches.get_one::<u64>("max-upload-size") {
        config.max_upload_size = *limit;
    }

    config.validate()?;
    info!("Node configuration: {:?}", config);

    let service = Service::new(config).await?;
    service.start().await?;

    Ok(())
}
