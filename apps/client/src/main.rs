use std::collections::HashMap;
use std::path::Path;
use std::time::Duration;

use anyhow::{bail, Context, Result};
use base64::engine::general_purpose::STANDARD;
use base64::Engine as _;
use clap::Parser;
use relaychat_client::{
    ApiClient, ChatSession, ClientCommand, ClientEvent, InlineFile, OutgoingMessage,
    ReconnectPolicy,
};
use relaychat_runtime::telemetry;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::mpsc;
use tracing::warn;

#[derive(Parser)]
#[command(name = "relaychat-cli")]
#[command(about = "Chat with other relaychat users from the terminal")]
struct Cli {
    /// Base URL of the relaychat server
    #[arg(long, default_value = "http://127.0.0.1:4000")]
    server: String,

    #[arg(long)]
    username: String,

    #[arg(long, env = "RELAYCHAT_PASSWORD")]
    password: String,

    /// Create the account before signing in
    #[arg(long)]
    register: bool,

    /// Give up after this many failed reconnects (default: keep trying)
    #[arg(long)]
    max_reconnects: Option<u32>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    telemetry::init_tracing().context("failed to initialise tracing")?;

    let api = ApiClient::new(&cli.server).context("failed to build http client")?;
    let session = if cli.register {
        api.register(&cli.username, &cli.password).await
    } else {
        api.login(&cli.username, &cli.password).await
    }
    .context("failed to sign in")?;

    println!("Signed in as {} ({})", session.username, session.id);
    println!("Commands: /to <user> <text>, /file <user> <path>, /history <user>, /people, /quit");

    let mut directory = Directory::default();
    directory.refresh(&api).await;

    let policy = ReconnectPolicy {
        max_attempts: cli.max_reconnects,
        ..ReconnectPolicy::default()
    };
    let chat = ChatSession::new(api.websocket_url()?, session.token.clone(), policy);
    let (commands_tx, commands_rx) = mpsc::channel(32);
    let (events_tx, mut events_rx) = mpsc::channel(64);
    let mut chat_task = tokio::spawn(async move { chat.run(commands_rx, events_tx).await });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        tokio::select! {
            event = events_rx.recv() => match event {
                Some(event) => print_event(&event, &directory, &session.id),
                None => break,
            },
            line = lines.next_line() => {
                let Some(line) = line? else {
                    let _ = commands_tx.send(ClientCommand::Quit).await;
                    break;
                };
                match parse_line(line.trim(), &mut directory, &api, &session.token).await {
                    Ok(Some(ClientCommand::Quit)) => {
                        let _ = commands_tx.send(ClientCommand::Quit).await;
                        break;
                    }
                    Ok(Some(command)) => {
                        if commands_tx.send(command).await.is_err() {
                            break;
                        }
                    }
                    Ok(None) => {}
                    Err(error) => println!("! {error:#}"),
                }
            }
        }
    }

    match tokio::time::timeout(Duration::from_secs(2), &mut chat_task).await {
        Ok(Ok(Ok(()))) => {}
        Ok(Ok(Err(error))) => bail!("chat session ended: {error}"),
        Ok(Err(error)) => bail!("chat session panicked: {error}"),
        Err(_) => {
            warn!("chat session did not close in time");
            chat_task.abort();
        }
    }

    Ok(())
}

/// Username and id lookups for the people known to the server.
#[derive(Default)]
struct Directory {
    by_username: HashMap<String, String>,
    by_id: HashMap<String, String>,
}

impl Directory {
    async fn refresh(&mut self, api: &ApiClient) {
        match api.people().await {
            Ok(people) => {
                self.by_username.clear();
                self.by_id.clear();
                for person in people {
                    self.by_username.insert(person.username.clone(), person.id.clone());
                    self.by_id.insert(person.id, person.username);
                }
            }
            Err(error) => warn!(%error, "failed to load people"),
        }
    }

    fn resolve(&self, user: &str) -> Option<String> {
        if self.by_id.contains_key(user) {
            return Some(user.to_string());
        }
        self.by_username.get(user).cloned()
    }

    fn name_of<'a>(&'a self, id: &'a str) -> &'a str {
        self.by_id.get(id).map(String::as_str).unwrap_or(id)
    }
}

async fn parse_line(
    line: &str,
    directory: &mut Directory,
    api: &ApiClient,
    token: &str,
) -> Result<Option<ClientCommand>> {
    if line.is_empty() {
        return Ok(None);
    }

    let (command, rest) = line.split_once(' ').unwrap_or((line, ""));
    match command {
        "/quit" | "/q" => Ok(Some(ClientCommand::Quit)),
        "/people" => {
            directory.refresh(api).await;
            let mut names: Vec<_> = directory.by_username.keys().cloned().collect();
            names.sort();
            println!("people: {}", names.join(", "));
            Ok(None)
        }
        "/history" => {
            let peer = resolve(directory, api, rest.trim()).await?;
            for message in api.history(token, &peer).await? {
                let body = message
                    .text
                    .or(message.file_name.map(|name| format!("[file] {name}")))
                    .unwrap_or_default();
                println!("[{}] {}: {}", message.created_at, directory.name_of(&message.sender), body);
            }
            Ok(None)
        }
        "/to" => {
            let (user, text) = rest.split_once(' ').context("usage: /to <user> <text>")?;
            let recipient = resolve(directory, api, user).await?;
            Ok(Some(ClientCommand::Send(OutgoingMessage {
                recipient,
                text: Some(text.to_string()),
                file: None,
            })))
        }
        "/file" => {
            let (user, path) = rest.split_once(' ').context("usage: /file <user> <path>")?;
            let recipient = resolve(directory, api, user).await?;
            let path = Path::new(path.trim());
            let bytes = tokio::fs::read(path)
                .await
                .with_context(|| format!("failed to read {}", path.display()))?;
            let name = path
                .file_name()
                .map(|name| name.to_string_lossy().into_owned())
                .unwrap_or_default();
            Ok(Some(ClientCommand::Send(OutgoingMessage {
                recipient,
                text: None,
                file: Some(InlineFile {
                    name,
                    data: STANDARD.encode(bytes),
                }),
            })))
        }
        other => bail!("unknown command {other}"),
    }
}

async fn resolve(directory: &mut Directory, api: &ApiClient, user: &str) -> Result<String> {
    if let Some(id) = directory.resolve(user) {
        return Ok(id);
    }
    directory.refresh(api).await;
    directory
        .resolve(user)
        .with_context(|| format!("no such user {user}"))
}

fn print_event(event: &ClientEvent, directory: &Directory, me: &str) {
    match event {
        ClientEvent::Connected => println!("* connected"),
        ClientEvent::Presence(online) => {
            let names: Vec<_> = online
                .iter()
                .filter(|entry| entry.user_id != me)
                .map(|entry| entry.username.as_str())
                .collect();
            println!("* online: {}", if names.is_empty() { "nobody else".to_string() } else { names.join(", ") });
        }
        ClientEvent::Message(message) => {
            let from = directory.name_of(&message.sender);
            match (&message.text, &message.file_name, &message.file) {
                (Some(text), _, _) => println!("{from}: {text}"),
                (None, Some(name), Some(stored)) => println!("{from} sent {name} (/uploads/{stored})"),
                _ => println!("{from} sent an empty message"),
            }
        }
        ClientEvent::ServerError(error) => println!("! {error}"),
        ClientEvent::Disconnected { retry_in } => {
            println!("* disconnected, retrying in {:.1}s", retry_in.as_secs_f64())
        }
    }
}
