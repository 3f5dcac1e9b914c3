mod common;

use bitverse::prelude::*;
use common::{start_edge, start_super};

fn keys() -> (RsaPrivateKey, RsaPublicKey) {
    generate_keypair(1024).unwrap()
}

#[tokio::test]
async fn claim_store_and_lookup() {
    let (_hub, addr) = start_super().await;
    let (edge, _) = start_edge(&addr).await;
    let (prv, public) = keys();

    let repo = edge
        .claim_repository_async("test", AesKey::generate(), prv, public, 5)
        .await
        .unwrap();
    assert_eq!(repo.repo_id(), "test");

    assert_eq!(repo.store_async("key1", "value1", 5).await.unwrap(), None);
    assert_eq!(
        repo.store_async("key1", "value2", 5).await.unwrap(),
        Some("value1".to_string())
    );
    assert_eq!(
        repo.lookup_async("key1", 5).await.unwrap(),
        Some("value2".to_string())
    );
    assert_eq!(repo.lookup_async("missing", 5).await.unwrap(), None);
}

#[tokio::test]
async fn repo_name_belongs_to_the_first_claimer() {
    let (_hub, addr) = start_super().await;
    let (first, _) = start_edge(&addr).await;
    let (second, _) = start_edge(&addr).await;

    let (prv, public) = keys();
    first
        .claim_repository_async("test", AesKey::generate(), prv, public, 5)
        .await
        .unwrap();

    let (prv2, public2) = keys();
    let err = second
        .claim_repository_async("test", AesKey::generate(), prv2, public2, 5)
        .await
        .unwrap_err();
    assert!(
        matches!(err, NodeError::Reply(ReplyError::Remote(ref text)) if text == "repo already claimed"),
        "unexpected {:?}",
        err
    );
    // the failed claim released its service name
    assert!(second.message_service("test").is_none());
}

#[tokio::test]
async fn store_with_the_wrong_private_key_is_rejected() {
    let (_hub, addr) = start_super().await;
    let (owner, _) = start_edge(&addr).await;
    let (impostor, _) = start_edge(&addr).await;
    let key = AesKey::generate();

    let (prv, public) = keys();
    let repo = owner
        .claim_repository_async("test", key.clone(), prv, public.clone(), 5)
        .await
        .unwrap();
    repo.store_async("k", "v", 5).await.unwrap();

    // same public key, so the claim itself is accepted
    let (wrong_prv, _) = keys();
    let fake = impostor
        .claim_repository_async("test", key, wrong_prv, public, 5)
        .await
        .unwrap();
    let err = fake.store_async("k", "evil", 5).await.unwrap_err();
    assert!(
        matches!(err, NodeError::Reply(ReplyError::Remote(ref text))
            if text == "failed to verify signature for repo <test>"),
        "unexpected {:?}",
        err
    );
    assert_eq!(repo.lookup_async("k", 5).await.unwrap(), Some("v".to_string()));
}

#[tokio::test]
async fn claim_fails_fast_when_service_name_is_taken() {
    let (_hub, addr) = start_super().await;
    let (edge, _) = start_edge(&addr).await;
    edge.create_message_service(AesKey::generate(), "test", None)
        .unwrap();
    let (prv, public) = keys();
    let err = edge
        .claim_repository("test", AesKey::generate(), prv, public, 5, |_| {})
        .unwrap_err();
    assert!(matches!(err, NodeError::ServiceExists(_)));
}
