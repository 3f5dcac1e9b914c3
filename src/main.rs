use clap::Parser;
use std::sync::Arc;
use tokio::signal;

use bitverse::{
    config::{Config, NodeConfig, NodeRole},
    constants::*,
    events::{dispatcher::emit_system_event, model::LogLevel},
    network::{NodeId, TcpTransport},
    node::{EdgeNode, NodeObserver, SuperNode},
};

#[derive(Parser, Debug)]
#[command(author, version, about = "Bitverse overlay node")]
struct Args {
    /// Optional path to config file (TOML)
    #[arg(short, long)]
    config: Option<String>,

    /// Run as super node
    #[arg(long = "super")]
    super_node: bool,

    /// Address a super node listens on, e.g. localhost:1111
    #[arg(long)]
    local: Option<String>,

    /// Super node address an edge node joins, e.g. localhost:1111
    #[arg(long)]
    join: Option<String>,

    /// Lower the console log level to debug
    #[arg(long)]
    debug: bool,
}

/// Logs membership changes seen by a monitoring edge node.
struct MonitorObserver;

impl NodeObserver for MonitorObserver {
    fn on_connected(&self, _node: &EdgeNode, super_id: &NodeId) {
        println!("{}connected to super node {}", ICON_PLACEHOLDER, super_id);
    }

    fn on_disconnected(&self, _node: &EdgeNode, super_id: &NodeId) {
        println!("{}lost uplink to {}", ICON_PLACEHOLDER, super_id);
    }

    fn on_sibling_joined(&self, _node: &EdgeNode, sibling: &NodeId) {
        println!("{}sibling joined: {}", ICON_PLACEHOLDER, sibling);
    }

    fn on_sibling_left(&self, _node: &EdgeNode, sibling: &NodeId) {
        println!("{}sibling left: {}", ICON_PLACEHOLDER, sibling);
    }

    fn on_sibling_heartbeat(&self, _node: &EdgeNode, sibling: &NodeId) {
        emit_system_event(
            LogLevel::Debug,
            "sibling_heartbeat",
            Some(sibling.to_string()),
        );
    }

    fn on_children_reply(&self, _node: &EdgeNode, _from: &NodeId, children: &[NodeId]) {
        println!("{}{} children attached", ICON_PLACEHOLDER, children.len());
    }
}

fn load_config(args: &Args) -> anyhow::Result<Config> {
    let mut config = match &args.config {
        Some(path) => {
            let cfg = Config::load(path)?;
            println!("{}Loaded config from: {}", ICON_PLACEHOLDER, path);
            cfg
        }
        None => Config::default(),
    };

    // flags win over the file
    let node = config.node.get_or_insert_with(NodeConfig::default);
    if args.super_node {
        node.role = Some(NodeRole::Super);
    }
    if let Some(local) = &args.local {
        node.listen = Some(local.clone());
    }
    if let Some(join) = &args.join {
        node.join = Some(join.clone());
        if !args.super_node {
            node.role = Some(NodeRole::Edge);
        }
    }
    if args.debug {
        config.logging.get_or_insert_with(Default::default).debug = Some(true);
    }
    Ok(config)
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();
    let config = match load_config(&args) {
        Ok(cfg) => cfg,
        Err(err) => {
            eprintln!("❌ Failed to load config: {}", err);
            std::process::exit(1);
        }
    };

    bitverse::events::init_events_from_config(config.logging.as_ref()).await;
    emit_system_event(
        LogLevel::Info,
        "startup",
        Some(format!("app={} version={}", config.app_name(), full_version())),
    );

    let app_name = config.app_name().to_string();
    let transport = Arc::new(TcpTransport::new());

    match config.role() {
        NodeRole::Super => {
            let (node, handle) =
                SuperNode::start(transport, &config.listen_addr(), &config).await?;
            println!(
                "🟢 {} super node {} listening on {}. Press Ctrl+C to shut down...",
                app_name,
                node.id(),
                node.local_addr()
            );
            signal::ctrl_c().await?;
            node.shutdown();
            let _ = handle.await;
        }
        NodeRole::Edge => {
            let observer: Arc<dyn NodeObserver> = Arc::new(MonitorObserver);
            let (node, handle) = EdgeNode::start(transport, Some(observer), &config);
            let super_id = node.connect(&config.join_addr()).await?;
            println!(
                "🟢 {} edge node {} joined {}. Press Ctrl+C to shut down...",
                app_name,
                node.id(),
                super_id
            );
            node.request_children()?;
            signal::ctrl_c().await?;
            node.shutdown();
            let _ = handle.await;
        }
    }

    println!("🛑 {} shutting down gracefully.", app_name);
    // let the event queue reach the sinks
    tokio::time::sleep(std::time::Duration::from_millis(100)).await;
    Ok(())
}
