//! Two edge nodes chatting through an in-process super node.
//!
//! Run with `cargo run --example messaging`.

use std::sync::Arc;
use std::time::Duration;

use bitverse::prelude::*;

const SERVICE: &str = "chat";

struct Chat;

impl MessageServiceObserver for Chat {
    fn on_deliver(&self, service: &MessageService, msg: &Envelope) {
        println!(
            "[{}] got '{}' from {}",
            short(service.node_id().as_str()),
            msg.payload,
            short(&msg.src)
        );
        match msg.payload.as_str() {
            "hello" => {
                let _ = service.send(&msg.src, "hi dude!");
            }
            "how are you doing?" => {
                let _ = service.reply(msg, "i am fine");
            }
            _ => {}
        }
    }
}

/// Greets every sibling that joins after us.
struct Greeter;

impl NodeObserver for Greeter {
    fn on_sibling_joined(&self, node: &EdgeNode, sibling: &NodeId) {
        println!("[{}] sibling {} joined", short(node.id().as_str()), short(sibling.as_str()));
        let Some(chat) = node.message_service(SERVICE) else {
            return;
        };
        let _ = chat.send(sibling.as_str(), "hello");
        let me = short(node.id().as_str());
        let _ = chat.send_and_get_reply(sibling.as_str(), "how are you doing?", 10, move |reply| {
            match reply {
                Ok(Some(text)) => println!("[{}] reply: {}", me, text),
                Ok(None) => println!("[{}] empty reply", me),
                Err(e) => println!("[{}] no reply: {}", me, e),
            }
        });
    }

    fn on_sibling_left(&self, node: &EdgeNode, sibling: &NodeId) {
        println!("[{}] sibling {} left", short(node.id().as_str()), short(sibling.as_str()));
    }
}

fn short(id: &str) -> String {
    id.chars().take(8).collect()
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bitverse::events::init_default_events().await;
    let config = Config::default();
    let secret = AesKey::generate();

    let (hub, _) = SuperNode::start(Arc::new(TcpTransport::quiet()), "127.0.0.1:0", &config).await?;
    let addr = hub.local_addr().to_string();

    let mut edges = Vec::new();
    for _ in 0..2 {
        let observer: Arc<dyn NodeObserver> = Arc::new(Greeter);
        let (edge, _) = EdgeNode::start(Arc::new(TcpTransport::quiet()), Some(observer), &config);
        edge.create_message_service(secret.clone(), SERVICE, Some(Arc::new(Chat)))?;
        edge.connect(&addr).await?;
        edges.push(edge);
    }

    tokio::time::sleep(Duration::from_secs(2)).await;
    for edge in &edges {
        edge.shutdown();
    }
    hub.shutdown();
    Ok(())
}
