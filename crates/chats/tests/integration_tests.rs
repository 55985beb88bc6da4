//! Integration tests for the message relay against a real database.

use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use relaychat_auth::Identity;
use relaychat_chats::{
    AttachmentError, AttachmentSink, ChatError, ClientFrame, ConnectionHandle, InlineFile,
    MessageRelay, OutgoingMessage, PresenceRegistry, ServerFrame,
};
use relaychat_config::DatabaseConfig;
use relaychat_database::{initialize_database, MessageRepository, UserRepository};
use tempfile::TempDir;
use tokio::sync::mpsc;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct TestContext {
    relay: MessageRelay,
    messages: MessageRepository,
    presence: PresenceRegistry,
    uploads: TempDir,
    alice: Identity,
    bob: Identity,
    _db_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        Self::with_limit(1024 * 1024).await
    }

    async fn with_limit(max_attachment_bytes: u64) -> TestResult<Self> {
        let db_dir = TempDir::new()?;
        let pool = initialize_database(&DatabaseConfig {
            url: format!("sqlite://{}", db_dir.path().join("chats.sqlite").display()),
            max_connections: 4,
        })
        .await?;

        let users = UserRepository::new(pool.clone());
        let messages = MessageRepository::new(pool.clone());
        let alice = Identity::from(&users.create("alice", "hash").await?);
        let bob = Identity::from(&users.create("bob", "hash").await?);

        let uploads = TempDir::new()?;
        let presence = PresenceRegistry::new();
        let relay = MessageRelay::new(
            users,
            messages.clone(),
            AttachmentSink::new(uploads.path(), max_attachment_bytes),
            presence.clone(),
        );

        Ok(Self {
            relay,
            messages,
            presence,
            uploads,
            alice,
            bob,
            _db_dir: db_dir,
        })
    }

    async fn connect(&self, identity: &Identity) -> (ConnectionHandle, mpsc::Receiver<ServerFrame>) {
        let (tx, mut rx) = mpsc::channel(16);
        let handle = ConnectionHandle::new(identity.clone(), tx);
        self.presence.add(handle.clone()).await;
        while rx.try_recv().is_ok() {}
        (handle, rx)
    }

    fn stored_files(&self) -> usize {
        std::fs::read_dir(self.uploads.path())
            .map(|entries| entries.count())
            .unwrap_or(0)
    }
}

fn text_to(recipient: &Identity, text: &str) -> OutgoingMessage {
    OutgoingMessage {
        recipient: recipient.id.clone(),
        text: Some(text.into()),
        file: None,
    }
}

#[tokio::test]
async fn message_without_text_or_file_is_rejected_before_persisting() -> TestResult {
    let ctx = TestContext::new().await?;

    for text in [None, Some(String::new()), Some("   ".to_string())] {
        let result = ctx
            .relay
            .relay(
                &ctx.alice,
                OutgoingMessage {
                    recipient: ctx.bob.id.clone(),
                    text,
                    file: None,
                },
            )
            .await;
        assert!(matches!(result, Err(ChatError::EmptyMessage)));
    }

    assert_eq!(ctx.messages.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn missing_and_unknown_recipients_are_rejected() -> TestResult {
    let ctx = TestContext::new().await?;

    let missing = ctx
        .relay
        .relay(&ctx.alice, OutgoingMessage {
            recipient: " ".into(),
            text: Some("hi".into()),
            file: None,
        })
        .await;
    assert!(matches!(missing, Err(ChatError::MissingRecipient)));

    let unknown = ctx
        .relay
        .relay(&ctx.alice, OutgoingMessage {
            recipient: "nobody".into(),
            text: Some("hi".into()),
            file: None,
        })
        .await;
    assert!(matches!(unknown, Err(ChatError::UnknownRecipient(id)) if id == "nobody"));

    assert_eq!(ctx.messages.count().await?, 0);
    Ok(())
}

#[tokio::test]
async fn online_recipient_receives_exactly_one_delivery() -> TestResult {
    let ctx = TestContext::new().await?;
    let (_alice_conn, mut alice_rx) = ctx.connect(&ctx.alice).await;
    let (_bob_conn, mut bob_rx) = ctx.connect(&ctx.bob).await;
    while alice_rx.try_recv().is_ok() {}

    let outcome = ctx.relay.relay(&ctx.alice, text_to(&ctx.bob, "hi")).await?;
    assert_eq!(outcome.delivered, 1);

    let ServerFrame::Message(delivered) = bob_rx.recv().await.expect("bob receives a frame") else {
        panic!("expected a message frame");
    };
    assert_eq!(delivered.sender, ctx.alice.id);
    assert_eq!(delivered.recipient, ctx.bob.id);
    assert_eq!(delivered.text.as_deref(), Some("hi"));
    assert_eq!(delivered.id, outcome.message.public_id);
    assert!(bob_rx.try_recv().is_err(), "exactly one delivery");
    assert!(alice_rx.try_recv().is_err(), "no echo to the sender");

    let history = ctx.relay.history(&ctx.alice, &ctx.bob.id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].public_id, delivered.id);
    Ok(())
}

#[tokio::test]
async fn offline_recipient_still_gets_message_in_history() -> TestResult {
    let ctx = TestContext::new().await?;

    let outcome = ctx.relay.relay(&ctx.alice, text_to(&ctx.bob, "later")).await?;
    assert_eq!(outcome.delivered, 0);

    let history = ctx.relay.history(&ctx.bob, &ctx.alice.id).await?;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].text.as_deref(), Some("later"));
    assert_eq!(history[0].sender_id, ctx.alice.id);
    Ok(())
}

#[tokio::test]
async fn payload_cannot_choose_the_sender() -> TestResult {
    let ctx = TestContext::new().await?;
    let frame = format!(
        r#"{{"recipient":"{}","text":"spoof","sender":"{}"}}"#,
        ctx.bob.id, ctx.bob.id
    );
    let ClientFrame::Message(outgoing) = ClientFrame::parse(&frame)? else {
        panic!("expected a message frame");
    };

    let outcome = ctx.relay.relay(&ctx.alice, outgoing).await?;
    assert_eq!(outcome.message.sender_id, ctx.alice.id);
    Ok(())
}

#[tokio::test]
async fn attachment_round_trips_byte_identical() -> TestResult {
    let ctx = TestContext::new().await?;
    let (_bob_conn, mut bob_rx) = ctx.connect(&ctx.bob).await;
    let bytes: Vec<u8> = (0u8..=255).collect();

    let outcome = ctx
        .relay
        .relay(&ctx.alice, OutgoingMessage {
            recipient: ctx.bob.id.clone(),
            text: None,
            file: Some(InlineFile {
                name: "ramp.bin".into(),
                data: format!("data:application/octet-stream;base64,{}", STANDARD.encode(&bytes)),
            }),
        })
        .await?;

    let ServerFrame::Message(delivered) = bob_rx.recv().await.expect("delivery") else {
        panic!("expected a message frame");
    };
    let stored_name = delivered.file.expect("delivery references the file");
    assert_eq!(delivered.file_name.as_deref(), Some("ramp.bin"));

    let history = ctx.relay.history(&ctx.bob, &ctx.alice.id).await?;
    assert_eq!(history[0].file.as_deref(), Some(stored_name.as_str()));
    assert_eq!(outcome.message.file.as_deref(), Some(stored_name.as_str()));

    let on_disk = std::fs::read(ctx.uploads.path().join(&stored_name))?;
    assert_eq!(on_disk, bytes);
    Ok(())
}

#[tokio::test]
async fn attachment_failure_aborts_the_relay() -> TestResult {
    let ctx = TestContext::with_limit(4).await?;
    let (_bob_conn, mut bob_rx) = ctx.connect(&ctx.bob).await;

    let bad = ctx
        .relay
        .relay(&ctx.alice, OutgoingMessage {
            recipient: ctx.bob.id.clone(),
            text: Some("see attached".into()),
            file: Some(InlineFile {
                name: "x.txt".into(),
                data: "%%%".into(),
            }),
        })
        .await;
    assert!(matches!(
        bad,
        Err(ChatError::AttachmentPersistFailure(AttachmentError::Decode(_)))
    ));

    let big = ctx
        .relay
        .relay(&ctx.alice, OutgoingMessage {
            recipient: ctx.bob.id.clone(),
            text: None,
            file: Some(InlineFile {
                name: "big.bin".into(),
                data: STANDARD.encode([0u8; 32]),
            }),
        })
        .await;
    assert!(matches!(
        big,
        Err(ChatError::AttachmentPersistFailure(AttachmentError::TooLarge { .. }))
    ));

    assert_eq!(ctx.messages.count().await?, 0);
    assert!(bob_rx.try_recv().is_err());
    assert_eq!(ctx.stored_files(), 0);
    Ok(())
}

#[tokio::test]
async fn persistence_failure_discards_attachment_and_skips_delivery() -> TestResult {
    let ctx = TestContext::new().await?;
    let (_bob_conn, mut bob_rx) = ctx.connect(&ctx.bob).await;
    let ghost = Identity {
        id: "not-a-registered-user".into(),
        username: "ghost".into(),
    };

    let result = ctx
        .relay
        .relay(&ghost, OutgoingMessage {
            recipient: ctx.bob.id.clone(),
            text: None,
            file: Some(InlineFile {
                name: "orphan.txt".into(),
                data: STANDARD.encode(b"orphan"),
            }),
        })
        .await;

    assert!(matches!(result, Err(ChatError::PersistenceFailure(_))));
    assert!(bob_rx.try_recv().is_err(), "nothing delivered before persistence");
    assert_eq!(ctx.stored_files(), 0, "orphaned attachment removed");
    Ok(())
}

#[tokio::test]
async fn empty_attachment_is_not_persisted() -> TestResult {
    let ctx = TestContext::new().await?;
    let (_bob_conn, mut bob_rx) = ctx.connect(&ctx.bob).await;

    for data in ["data:image/png;base64", ""] {
        let result = ctx
            .relay
            .relay(&ctx.alice, OutgoingMessage {
                recipient: ctx.bob.id.clone(),
                text: None,
                file: Some(InlineFile {
                    name: "x.png".into(),
                    data: data.into(),
                }),
            })
            .await;
        assert!(matches!(
            result,
            Err(ChatError::AttachmentPersistFailure(AttachmentError::Malformed(_)))
        ));
    }

    assert_eq!(ctx.messages.count().await?, 0);
    assert!(bob_rx.try_recv().is_err());
    assert_eq!(ctx.stored_files(), 0);
    Ok(())
}
