//! Claim a repository, store a value and read it back.
//!
//! Run with `cargo run --example repo`.

use std::sync::Arc;

use bitverse::prelude::*;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    bitverse::events::init_default_events().await;
    let config = Config::default();

    let (hub, _) = SuperNode::start(Arc::new(TcpTransport::quiet()), "127.0.0.1:0", &config).await?;
    let (edge, _) = EdgeNode::start(Arc::new(TcpTransport::quiet()), None, &config);
    edge.connect(&hub.local_addr().to_string()).await?;

    // 2048 bits keeps the demo snappy; bitverse-keys defaults to 3072
    let (private_key, public_key) = generate_keypair(2048)?;
    let repo = edge
        .claim_repository_async("test", AesKey::generate(), private_key, public_key, 10)
        .await?;
    println!("claimed repo {}", repo.repo_id());

    let previous = repo.store_async("name", "alice", 10).await?;
    println!("stored name=alice (previous: {:?})", previous);
    let previous = repo.store_async("name", "bob", 10).await?;
    println!("stored name=bob (previous: {:?})", previous);

    let value = repo.lookup_async("name", 10).await?;
    println!("lookup name -> {:?}", value);
    let missing = repo.lookup_async("age", 10).await?;
    println!("lookup age -> {:?}", missing);

    edge.shutdown();
    hub.shutdown();
    Ok(())
}
