use anyhow::Context;
use clap::{Parser, Subcommand};
use relaychat_config::load as load_config;
use relaychat_database::{MessageRepository, UserRepository};
use relaychat_gateway::{create_router, GatewayState};
use relaychat_runtime::{telemetry, BackendServices};
use sqlx::Row;
use tokio::net::TcpListener;
use tracing::info;

#[derive(Parser)]
#[command(name = "relaychat-server")]
#[command(about = "relaychat backend (serves HTTP and WebSocket by default)")]
struct Cli {
    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Start the HTTP and WebSocket server (default)
    Serve,
    /// Print users and messages stored in the database
    DumpData,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    match cli.command.unwrap_or(Commands::Serve) {
        Commands::Serve => run_server().await,
        Commands::DumpData => dump_data().await,
    }
}

async fn run_server() -> anyhow::Result<()> {
    info!("starting relaychat backend");

    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let state = GatewayState::new(services.db_pool.clone(), &config);
    let app = create_router(state);

    let address = format!("{}:{}", config.http.address, config.http.port);
    let listener = TcpListener::bind(&address)
        .await
        .with_context(|| format!("failed to bind http listener on {address}"))?;

    info!(%address, "http server listening");

    axum::serve(listener, app)
        .with_graceful_shutdown(relaychat_runtime::shutdown_signal())
        .await
        .context("http server error")?;

    services.db_pool.close().await;
    info!("backend shut down");
    Ok(())
}

async fn dump_data() -> anyhow::Result<()> {
    let config = load_config().context("failed to load configuration")?;

    let services = BackendServices::initialise(&config)
        .await
        .context("failed to initialise backend services")?;

    let users = UserRepository::new(services.db_pool.clone())
        .list_all()
        .await
        .context("failed to fetch users")?;

    println!("=== USERS ===");
    if users.is_empty() {
        println!("No users found in database");
    } else {
        println!("Found {} users:", users.len());
        println!("{:<28} {:<34} {:<30}", "Public ID", "Username", "Created At");
        println!("{}", "-".repeat(92));
        for user in &users {
            println!(
                "{:<28} {:<34} {:<30}",
                user.public_id, user.username, user.created_at
            );
        }
    }

    println!("\n=== MESSAGES ===");
    let total = MessageRepository::new(services.db_pool.clone())
        .count()
        .await
        .context("failed to count messages")?;

    let messages = sqlx::query(
        r#"
        SELECT public_id, sender_id, recipient_id, text, file, created_at
        FROM messages
        ORDER BY created_at ASC, id ASC
        "#,
    )
    .fetch_all(&services.db_pool)
    .await
    .context("failed to fetch messages")?;

    if messages.is_empty() {
        println!("No messages found in database");
    } else {
        println!("Found {total} messages:");
        println!(
            "{:<28} {:<28} {:<28} {:<40} {:<30}",
            "Public ID", "Sender", "Recipient", "Text / File", "Created At"
        );
        println!("{}", "-".repeat(158));

        for message in messages {
            let public_id: String = message.try_get("public_id")?;
            let sender_id: String = message.try_get("sender_id")?;
            let recipient_id: String = message.try_get("recipient_id")?;
            let text: Option<String> = message.try_get("text")?;
            let file: Option<String> = message.try_get("file")?;
            let created_at: String = message.try_get("created_at")?;

            let body = match (text, file) {
                (Some(text), _) => truncate(&text, 37),
                (None, Some(file)) => format!("[file] {file}"),
                (None, None) => String::new(),
            };

            println!(
                "{:<28} {:<28} {:<28} {:<40} {:<30}",
                public_id, sender_id, recipient_id, body, created_at
            );
        }
    }

    Ok(())
}

fn truncate(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{cut}...")
    } else {
        text.to_string()
    }
}
