use relaychat_config::DatabaseConfig;
use relaychat_database::{
    initialize_database, DatabaseError, MessageRepository, NewMessage, UserRepository,
};
use sqlx::SqlitePool;
use tempfile::TempDir;

type TestResult<T = ()> = Result<T, Box<dyn std::error::Error>>;

struct TestContext {
    pool: SqlitePool,
    users: UserRepository,
    messages: MessageRepository,
    _temp_dir: TempDir,
}

impl TestContext {
    async fn new() -> TestResult<Self> {
        let temp_dir = TempDir::new()?;
        let config = DatabaseConfig {
            url: format!("sqlite://{}", temp_dir.path().join("repos.sqlite").display()),
            max_connections: 4,
        };
        let pool = initialize_database(&config).await?;

        Ok(Self {
            users: UserRepository::new(pool.clone()),
            messages: MessageRepository::new(pool.clone()),
            pool,
            _temp_dir: temp_dir,
        })
    }
}

fn text(sender: &str, recipient: &str, body: &str) -> NewMessage {
    NewMessage {
        sender_id: sender.to_owned(),
        recipient_id: recipient.to_owned(),
        text: Some(body.to_owned()),
        ..NewMessage::default()
    }
}

#[tokio::test]
async fn create_user_assigns_public_id_and_is_findable() -> TestResult {
    let ctx = TestContext::new().await?;

    let user = ctx.users.create("alice", "$argon2-placeholder").await?;
    assert!(!user.public_id.is_empty());

    let by_name = ctx.users.find_by_username("alice").await?.expect("user by name");
    assert_eq!(by_name.public_id, user.public_id);

    let by_id = ctx
        .users
        .find_by_public_id(&user.public_id)
        .await?
        .expect("user by public id");
    assert_eq!(by_id.username, "alice");
    assert!(ctx.users.exists(&user.public_id).await?);
    assert!(!ctx.users.exists("missing").await?);

    Ok(())
}

#[tokio::test]
async fn duplicate_username_is_reported_as_duplicate() -> TestResult {
    let ctx = TestContext::new().await?;
    ctx.users.create("bob", "hash").await?;

    let error = ctx
        .users
        .create("bob", "other-hash")
        .await
        .expect_err("second insert must fail");
    assert!(matches!(error, DatabaseError::Duplicate(_)), "got {error:?}");
    assert_eq!(ctx.users.count().await?, 1);

    Ok(())
}

#[tokio::test]
async fn list_all_returns_users_in_registration_order() -> TestResult {
    let ctx = TestContext::new().await?;
    for name in ["carol", "alice", "bob"] {
        ctx.users.create(name, "hash").await?;
    }

    let names: Vec<String> = ctx
        .users
        .list_all()
        .await?
        .into_iter()
        .map(|user| user.username)
        .collect();
    assert_eq!(names, vec!["carol", "alice", "bob"]);

    Ok(())
}

#[tokio::test]
async fn conversation_returns_both_directions_oldest_first() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.users.create("alice", "hash").await?;
    let bob = ctx.users.create("bob", "hash").await?;
    let carol = ctx.users.create("carol", "hash").await?;

    ctx.messages.create(&text(&alice.public_id, &bob.public_id, "one")).await?;
    ctx.messages.create(&text(&bob.public_id, &alice.public_id, "two")).await?;
    ctx.messages.create(&text(&alice.public_id, &carol.public_id, "elsewhere")).await?;
    ctx.messages.create(&text(&alice.public_id, &bob.public_id, "three")).await?;

    let history = ctx
        .messages
        .conversation(&bob.public_id, &alice.public_id)
        .await?;
    let bodies: Vec<_> = history.iter().filter_map(|m| m.text.as_deref()).collect();
    assert_eq!(bodies, vec!["one", "two", "three"]);
    assert!(history
        .windows(2)
        .all(|pair| pair[0].created_at <= pair[1].created_at));

    Ok(())
}

#[tokio::test]
async fn message_without_text_or_file_violates_schema() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.users.create("alice", "hash").await?;
    let bob = ctx.users.create("bob", "hash").await?;

    let empty = NewMessage {
        sender_id: alice.public_id.clone(),
        recipient_id: bob.public_id.clone(),
        ..NewMessage::default()
    };
    assert!(ctx.messages.create(&empty).await.is_err());
    assert_eq!(ctx.messages.count().await?, 0);

    Ok(())
}

#[tokio::test]
async fn message_for_unknown_user_violates_foreign_key() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.users.create("alice", "hash").await?;

    let result = ctx
        .messages
        .create(&text(&alice.public_id, "nobody", "hello?"))
        .await;
    assert!(result.is_err());

    let stored: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM messages")
        .fetch_one(&ctx.pool)
        .await?;
    assert_eq!(stored, 0);

    Ok(())
}

#[tokio::test]
async fn attachment_columns_round_trip() -> TestResult {
    let ctx = TestContext::new().await?;
    let alice = ctx.users.create("alice", "hash").await?;
    let bob = ctx.users.create("bob", "hash").await?;

    let stored = ctx
        .messages
        .create(&NewMessage {
            sender_id: alice.public_id.clone(),
            recipient_id: bob.public_id.clone(),
            text: None,
            file: Some("0f3c.png".into()),
            file_name: Some("cat.png".into()),
        })
        .await?;

    let history = ctx
        .messages
        .conversation(&alice.public_id, &bob.public_id)
        .await?;
    assert_eq!(history, vec![stored]);
    assert_eq!(history[0].file.as_deref(), Some("0f3c.png"));
    assert_eq!(history[0].file_name.as_deref(), Some("cat.png"));

    Ok(())
}
