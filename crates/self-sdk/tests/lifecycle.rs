//! Connection lifecycle: welcome auto-accept, key-package establishment,
//! introduction token storage, close semantics and config validation.

mod common;

use self_account::{AccountEvent, AccountPrimitive, Environment};
use self_core::SelfError;
use self_message::{IntroductionContent, MessageContent};
use self_sdk::{Client, ClientConfig};
use self_testkit::{MemoryAccount, MemoryNetwork};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn connect_and_disconnect_are_broadcast() {
    let (alice, _bob) = common::peer_pair().await;

    let (connect_tx, mut connect_rx) = mpsc::unbounded_channel();
    alice.client.on_connect(move |()| {
        let connect_tx = connect_tx.clone();
        async move {
            let _ = connect_tx.send(());
        }
    });

    let (disconnect_tx, mut disconnect_rx) = mpsc::unbounded_channel();
    alice.client.on_disconnect(move |reason| {
        let disconnect_tx = disconnect_tx.clone();
        async move {
            let _ = disconnect_tx.send(reason);
        }
    });

    alice.account.inject(AccountEvent::Connect);
    alice.account.inject(AccountEvent::Disconnect {
        reason: Some("transport reset".into()),
    });

    tokio::time::timeout(Duration::from_secs(5), connect_rx.recv())
        .await
        .expect("connect broadcast")
        .unwrap();
    let reason = tokio::time::timeout(Duration::from_secs(5), disconnect_rx.recv())
        .await
        .expect("disconnect broadcast")
        .unwrap();
    assert_eq!(reason.as_deref(), Some("transport reset"));
}

#[tokio::test]
async fn welcome_is_accepted_automatically() {
    let (alice, bob) = common::peer_pair().await;

    let (welcomed_tx, mut welcomed_rx) = mpsc::unbounded_channel();
    alice.client.on_welcome(move |event| {
        let welcomed_tx = welcomed_tx.clone();
        async move {
            let _ = welcomed_tx.send(event);
        }
    });

    alice.account.inject(AccountEvent::Welcome {
        from: bob.account.address(),
        welcome: vec![1, 2, 3, 4],
    });

    let event = tokio::time::timeout(Duration::from_secs(5), welcomed_rx.recv())
        .await
        .expect("welcome forwarded")
        .unwrap();

    assert_eq!(event.from, bob.account.address());
    assert_eq!(
        alice.client.group_with(&bob.account.address()),
        Some(event.group)
    );
}

#[tokio::test]
async fn key_package_establishes_connection() {
    let (alice, bob) = common::peer_pair().await;

    let (established_tx, mut established_rx) = mpsc::unbounded_channel();
    alice.client.on_key_package(move |event| {
        let established_tx = established_tx.clone();
        async move {
            let _ = established_tx.send(event);
        }
    });

    alice.account.inject(AccountEvent::KeyPackage {
        from: bob.account.address(),
        package: vec![9; 48],
    });

    let event = tokio::time::timeout(Duration::from_secs(5), established_rx.recv())
        .await
        .expect("key package forwarded")
        .unwrap();

    assert_eq!(event.from, bob.account.address());
    assert!(alice.client.group_with(&bob.account.address()).is_some());
}

#[tokio::test]
async fn introduction_tokens_stored_in_order_with_inbox_as_group() {
    let (alice, bob) = common::peer_pair().await;

    let (noted_tx, mut noted_rx) = mpsc::unbounded_channel();
    alice.client.on_introduction(move |event| {
        let noted_tx = noted_tx.clone();
        async move {
            let _ = noted_tx.send(event);
        }
    });

    let introduction = IntroductionContent::new(vec![b"t-one".to_vec(), b"t-two".to_vec()])
        .into_content()
        .unwrap();
    bob.account
        .message_send(&alice.client.address(), &introduction)
        .await
        .unwrap();

    let event = tokio::time::timeout(Duration::from_secs(5), noted_rx.recv())
        .await
        .expect("introduction forwarded")
        .unwrap();
    assert_eq!(event.from, bob.account.address());
    assert_eq!(event.tokens, 2);

    let stored = alice.account.stored_tokens();
    assert_eq!(stored.len(), 2);
    for (record, token) in stored.iter().zip([b"t-one".as_slice(), b"t-two".as_slice()]) {
        assert_eq!(record.from, bob.account.address());
        // the inbox address is passed as both recipient and group
        assert_eq!(record.to, alice.client.address());
        assert_eq!(record.group, alice.client.address());
        assert_eq!(record.token, token);
    }
}

#[tokio::test]
async fn failed_welcome_is_dropped_silently() {
    let (alice, bob) = common::peer_pair().await;

    let (welcomed_tx, mut welcomed_rx) = mpsc::unbounded_channel();
    alice.client.on_welcome(move |event| {
        let welcomed_tx = welcomed_tx.clone();
        async move {
            let _ = welcomed_tx.send(event);
        }
    });

    // an empty welcome makes connection_accept fail; nothing is forwarded
    alice.account.inject(AccountEvent::Welcome {
        from: bob.account.address(),
        welcome: Vec::new(),
    });

    // the dispatcher survives and processes the next welcome normally
    alice.account.inject(AccountEvent::Welcome {
        from: bob.account.address(),
        welcome: vec![5, 6, 7],
    });

    let event = tokio::time::timeout(Duration::from_secs(5), welcomed_rx.recv())
        .await
        .expect("second welcome forwarded")
        .unwrap();
    assert_eq!(event.from, bob.account.address());

    // only one welcome made it through
    assert!(welcomed_rx.try_recv().is_err());
}

#[tokio::test]
async fn unroutable_and_malformed_content_is_ignored() {
    let (alice, bob) = common::peer_pair().await;

    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    alice.client.chat().on_message(move |message| {
        let seen_tx = seen_tx.clone();
        async move {
            let _ = seen_tx.send(message.text);
        }
    });

    // an unknown content type
    let unknown = self_message::Content::new(
        self_message::ContentType::Unknown(4242),
        b"???".to_vec(),
    );
    bob.account
        .message_send(&alice.client.address(), &unknown)
        .await
        .unwrap();

    // a chat envelope whose payload does not decode
    let garbage = self_message::Content::new(
        self_message::ContentType::Chat,
        vec![0xff, 0xfe, 0xfd],
    );
    bob.account
        .message_send(&alice.client.address(), &garbage)
        .await
        .unwrap();

    // dispatch continues: a well-formed message still arrives
    bob.client.chat().send(&alice.did(), "still alive").await.unwrap();

    let text = tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
        .await
        .expect("well-formed chat delivered")
        .unwrap();
    assert_eq!(text, "still alive");
}

#[tokio::test]
async fn close_is_idempotent_and_fails_later_operations() {
    let (alice, bob) = common::peer_pair().await;

    assert!(!alice.did().is_empty());
    alice.client.close().await.unwrap();
    alice.client.close().await.unwrap();

    assert_eq!(alice.client.did(), "");
    assert_eq!(
        alice.client.chat().send(&bob.did(), "hello").await,
        Err(SelfError::ClientClosed)
    );
    assert_eq!(
        alice.client.value_store("k", b"v").await,
        Err(SelfError::ClientClosed)
    );
    assert!(matches!(
        alice.client.discovery().generate_qr().await,
        Err(SelfError::ClientClosed)
    ));
}

#[tokio::test]
async fn close_cancels_pending_waits() {
    let (alice, bob) = common::peer_pair().await;

    let handle = alice
        .client
        .credentials()
        .request_verification(&bob.did(), vec!["VerifiableCredential".into()])
        .await
        .unwrap();
    assert_eq!(alice.client.pending_requests(), 1);

    alice.client.close().await.unwrap();

    let err = handle
        .wait_for_response(Duration::from_secs(5))
        .await
        .unwrap_err();
    assert_eq!(err, SelfError::Cancelled);
    assert_eq!(alice.client.pending_requests(), 0);
}

#[tokio::test]
async fn config_validation() {
    let network = MemoryNetwork::new();

    let account = MemoryAccount::new(Arc::clone(&network));
    let err = Client::new(
        ClientConfig::new(Vec::new(), "/tmp/self-sdk-tests"),
        Arc::clone(&account) as Arc<dyn AccountPrimitive>,
    )
    .await
    .unwrap_err();
    assert_eq!(err, SelfError::MissingStorageKey);

    let err = Client::new(
        ClientConfig::new(self_testkit::fixtures::storage_key(), ""),
        Arc::clone(&account) as Arc<dyn AccountPrimitive>,
    )
    .await
    .unwrap_err();
    assert_eq!(err, SelfError::MissingStoragePath);
}

#[tokio::test]
async fn environment_endpoints_reach_the_primitive() {
    let network = MemoryNetwork::new();
    let account = MemoryAccount::new(Arc::clone(&network));

    let mut config = ClientConfig::new(
        self_testkit::fixtures::storage_key(),
        "/tmp/self-sdk-tests",
    );
    config.environment = Environment::Production;

    let _client = Client::new(config, Arc::clone(&account) as Arc<dyn AccountPrimitive>)
        .await
        .unwrap();

    let seen = account.configured_with().unwrap();
    assert_eq!(seen.rpc_url, "https://rpc.joinself.com/");
    assert_eq!(seen.object_url, "https://object.joinself.com/");
    assert_eq!(seen.message_url, "wss://message.joinself.com/");
}

#[tokio::test]
async fn notification_and_value_helpers_pass_through() {
    let (alice, bob) = common::peer_pair().await;

    alice
        .client
        .send_notification(&bob.did(), "new message waiting")
        .await
        .unwrap();
    assert_eq!(
        alice.account.sent_notifications(),
        vec![(bob.account.address(), "new message waiting".to_string())]
    );

    alice.client.value_store("greeting", b"hello").await.unwrap();
    assert_eq!(
        alice.client.value_lookup("greeting").await.unwrap(),
        Some(b"hello".to_vec())
    );
    alice.client.value_remove("greeting").await.unwrap();
    assert_eq!(alice.client.value_lookup("greeting").await.unwrap(), None);
}
