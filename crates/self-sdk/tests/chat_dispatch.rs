//! Chat dispatch: per-peer ordering, group double-fire policy, handler
//! isolation.

mod common;

use parking_lot::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

#[tokio::test]
async fn messages_from_one_peer_arrive_in_order() {
    let (alice, bob) = common::peer_pair().await;

    let seen = Arc::new(Mutex::new(Vec::new()));
    let (done_tx, mut done_rx) = mpsc::unbounded_channel();

    let sink = Arc::clone(&seen);
    alice.client.chat().on_message(move |message| {
        let sink = Arc::clone(&sink);
        let done_tx = done_tx.clone();
        async move {
            sink.lock().push(message.text.clone());
            if sink.lock().len() == 50 {
                let _ = done_tx.send(());
            }
        }
    });

    for n in 0..50 {
        bob.client
            .chat()
            .send(&alice.did(), &format!("message {n}"))
            .await
            .unwrap();
    }

    tokio::time::timeout(Duration::from_secs(5), done_rx.recv())
        .await
        .expect("all messages delivered")
        .unwrap();

    let expected: Vec<String> = (0..50).map(|n| format!("message {n}")).collect();
    assert_eq!(*seen.lock(), expected);
}

#[tokio::test]
async fn reply_carries_the_referenced_id() {
    let (alice, bob) = common::peer_pair().await;

    let (got_tx, mut got_rx) = mpsc::unbounded_channel();
    alice.client.chat().on_message(move |message| {
        let got_tx = got_tx.clone();
        async move {
            let _ = got_tx.send(message);
        }
    });

    bob.client.chat().send(&alice.did(), "original").await.unwrap();
    let original = tokio::time::timeout(Duration::from_secs(5), got_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(original.text, "original");
    assert!(original.referenced_id.is_none());

    // Alice replies; Bob observes the reference
    let (bob_tx, mut bob_rx) = mpsc::unbounded_channel();
    bob.client.chat().on_message(move |message| {
        let bob_tx = bob_tx.clone();
        async move {
            let _ = bob_tx.send(message);
        }
    });

    alice
        .client
        .chat()
        .reply(&bob.did(), original.id.to_vec(), "the reply")
        .await
        .unwrap();

    let reply = tokio::time::timeout(Duration::from_secs(5), bob_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(reply.text, "the reply");
    assert_eq!(reply.referenced_id, Some(original.id.to_vec()));
}

#[tokio::test]
async fn attachments_are_carried_on_the_wire() {
    let (alice, bob) = common::peer_pair().await;

    let (got_tx, mut got_rx) = mpsc::unbounded_channel();
    alice.client.chat().on_message(move |message| {
        let got_tx = got_tx.clone();
        async move {
            let _ = got_tx.send(message);
        }
    });

    let attachment = self_message::Attachment {
        name: "photo.png".into(),
        mime: "image/png".into(),
        object_id: vec![7; 32],
    };
    bob.client
        .chat()
        .send_with_attachments(&alice.did(), "see attached", vec![attachment.clone()])
        .await
        .unwrap();

    let message = tokio::time::timeout(Duration::from_secs(5), got_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(message.text, "see attached");
    assert_eq!(message.attachments, vec![attachment]);
}

#[tokio::test]
async fn group_framed_messages_fire_both_chat_and_group_handlers() {
    let (alice, bob) = common::peer_pair().await;

    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    alice.client.chat().on_message(move |message| {
        let chat_tx = chat_tx.clone();
        async move {
            let _ = chat_tx.send(message.text);
        }
    });

    let (group_tx, mut group_rx) = mpsc::unbounded_channel();
    alice.client.group_chat().on_message(move |message| {
        let group_tx = group_tx.clone();
        async move {
            let _ = group_tx.send((message.group, message.text));
        }
    });

    bob.client
        .group_chat()
        .create("rust-users", &[alice.did().as_str()])
        .unwrap();
    bob.client
        .group_chat()
        .send("rust-users", "hello group")
        .await
        .unwrap();

    // the group layer sees the parsed frame
    let (group, text) = tokio::time::timeout(Duration::from_secs(5), group_rx.recv())
        .await
        .expect("group handler fired")
        .unwrap();
    assert_eq!(group, "rust-users");
    assert_eq!(text, "hello group");

    // the plain chat handler also fires, with the raw framed text
    let raw = tokio::time::timeout(Duration::from_secs(5), chat_rx.recv())
        .await
        .expect("chat handler fired")
        .unwrap();
    assert!(raw.contains("hello group"));
    assert!(raw.starts_with("rust-users"));
}

#[tokio::test]
async fn plain_messages_do_not_reach_the_group_layer() {
    let (alice, bob) = common::peer_pair().await;

    let group_hits = Arc::new(AtomicUsize::new(0));
    let hits = Arc::clone(&group_hits);
    alice.client.group_chat().on_message(move |_| {
        let hits = Arc::clone(&hits);
        async move {
            hits.fetch_add(1, Ordering::SeqCst);
        }
    });

    let (chat_tx, mut chat_rx) = mpsc::unbounded_channel();
    alice.client.chat().on_message(move |message| {
        let chat_tx = chat_tx.clone();
        async move {
            let _ = chat_tx.send(message.text);
        }
    });

    bob.client.chat().send(&alice.did(), "just chat").await.unwrap();

    tokio::time::timeout(Duration::from_secs(5), chat_rx.recv())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(group_hits.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn panicking_handler_does_not_break_dispatch() {
    let (alice, bob) = common::peer_pair().await;

    // first handler panics on the first message
    alice.client.chat().on_message(|message| async move {
        if message.text == "poison" {
            panic!("handler exploded");
        }
    });

    // second handler keeps counting
    let (seen_tx, mut seen_rx) = mpsc::unbounded_channel();
    alice.client.chat().on_message(move |message| {
        let seen_tx = seen_tx.clone();
        async move {
            let _ = seen_tx.send(message.text);
        }
    });

    bob.client.chat().send(&alice.did(), "poison").await.unwrap();
    bob.client.chat().send(&alice.did(), "after").await.unwrap();

    let mut seen = Vec::new();
    for _ in 0..2 {
        seen.push(
            tokio::time::timeout(Duration::from_secs(5), seen_rx.recv())
                .await
                .expect("dispatch survived the panic")
                .unwrap(),
        );
    }
    assert_eq!(seen, vec!["poison".to_string(), "after".to_string()]);
}

#[tokio::test]
async fn unknown_group_send_fails() {
    let (alice, _bob) = common::peer_pair().await;

    let err = alice
        .client
        .group_chat()
        .send("nonexistent", "anyone?")
        .await
        .unwrap_err();
    assert!(matches!(err, self_core::SelfError::Invalid { .. }));
}
