//! koach - interactive coach chat CLI

mod config;

use anyhow::Context as _;
use clap::Parser;
use std::io::Write as _;
use tokio::io::{AsyncBufReadExt, BufReader};

use koach_api::CoachClient;
use koach_session::{CoachTransport, Session, format_transcript};

use crate::config::Config;

/// koach - chat with the coach backend
#[derive(Parser, Debug)]
#[command(name = "koach")]
#[command(author, version, about, long_about = None)]
struct Args {
    /// Backend host (overrides config and KOACH_HOST)
    #[arg(long)]
    host: Option<String>,

    /// User id
    #[arg(short, long)]
    user_id: Option<String>,

    /// Legacy user id, resolved to the canonical id on startup
    #[arg(long)]
    legacy_user_id: Option<String>,

    /// Agent to request at turn start (default coaching flow otherwise)
    #[arg(short, long)]
    agent: Option<String>,

    /// Set the user's display name before starting
    #[arg(long)]
    name: Option<String>,

    /// Verbose output
    #[arg(short, long)]
    verbose: bool,

    /// Initialize config file
    #[arg(long)]
    init_config: bool,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args = Args::parse();

    let filter = if args.verbose {
        "koach_api=debug,koach_session=debug,koach_cli=debug"
    } else {
        "warn"
    };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_writer(std::io::stderr)
        .init();

    if args.init_config {
        let path = Config::init()?;
        println!("Config file: {}", path.display());
        println!("\nExample configuration:\n{}", config::example_config());
        return Ok(());
    }

    let config = Config::load();

    let host = args
        .host
        .or_else(|| config.get_host())
        .context("no backend host configured (use --host, config, or KOACH_HOST)")?;
    let api_token = config
        .get_api_token()
        .context("no API token configured (use config or KOACH_API_TOKEN)")?;
    let client = CoachClient::new(host, api_token);

    let user_id = match (&args.user_id, &args.legacy_user_id) {
        (Some(id), _) => id.clone(),
        (None, Some(legacy)) => client
            .resolve_user_id(legacy)
            .await
            .context("failed to resolve legacy user id")?,
        (None, None) => config
            .user_id
            .clone()
            .context("no user id configured (use --user-id or config)")?,
    };

    if let Some(name) = &args.name {
        client.set_user_name(&user_id, name).await?;
    }
    let display_name = client.get_user_name(&user_id).await.unwrap_or(None);

    let mut session = Session::new(user_id);
    let selected_agent = args.agent.or(config.agent);

    match &display_name {
        Some(name) => println!("Hallo {name}! Session {}", session.session_id),
        None => println!("Session {}", session.session_id),
    }
    println!("Type a message, or /agents, /elements, /download [path], /quit\n");

    // First fetch seeds the snapshot; diffs start from the next one.
    if let Ok(snapshot) = client.fetch_profile(&session.user_id).await {
        session.refresh_profile(snapshot);
    }

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        print!("> ");
        std::io::stdout().flush()?;

        let Some(line) = lines.next_line().await? else {
            break;
        };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }

        match line.split_once(' ').map_or((line, ""), |(cmd, rest)| (cmd, rest.trim())) {
            ("/quit", _) | ("/exit", _) => break,
            ("/agents", _) => show_agents(&client).await,
            ("/elements", _) => show_brand_elements(&client, &session).await,
            ("/download", path) => {
                let path = if path.is_empty() { "conversation.txt" } else { path };
                download_transcript(&session, path)?;
            }
            _ => {
                if run_turn(&client, &mut session, line, selected_agent.as_deref()).await {
                    if let Ok(snapshot) = client.fetch_profile(&session.user_id).await {
                        for field in session.refresh_profile(snapshot) {
                            println!("[saved] {field}");
                        }
                    }
                }
            }
        }
    }

    Ok(())
}

/// One chat turn: stream the reply to stdout and surface any failure
/// inline. A failed turn never tears down the conversation; the transcript
/// keeps the user's message either way. Returns whether the turn
/// completed without an error.
async fn run_turn(
    transport: &dyn CoachTransport,
    session: &mut Session,
    text: &str,
    selected_agent: Option<&str>,
) -> bool {
    let result = session
        .send_with_handler(transport, text, selected_agent, |fragment| {
            print!("{fragment}");
            let _ = std::io::stdout().flush();
        })
        .await;
    println!();

    if let Err(e) = result {
        println!("[error] {e}");
        return false;
    }
    if let Some(error) = &session.last_error {
        println!("[error] {error}");
        return false;
    }
    true
}

async fn show_agents(client: &CoachClient) {
    match client.list_agents().await {
        Ok(agents) => {
            for agent in agents {
                match agent.description {
                    Some(description) => println!("{} - {}", agent.name, description),
                    None => println!("{}", agent.name),
                }
            }
        }
        Err(e) => println!("[error] {e}"),
    }
}

async fn show_brand_elements(client: &CoachClient, session: &Session) {
    match client.list_brand_elements().await {
        Ok(elements) => {
            for element in elements {
                let mark = if session
                    .profile
                    .as_ref()
                    .is_some_and(|profile| profile.is_complete(&element.name))
                {
                    "x"
                } else {
                    " "
                };
                println!("[{mark}] {}", element.name);
            }
        }
        Err(e) => println!("[error] {e}"),
    }
}

fn download_transcript(session: &Session, path: &str) -> anyhow::Result<()> {
    let mut contents = format!(
        "User {} ({})\n",
        session.user_id,
        chrono::Utc::now().format("%Y-%m-%d %H:%M:%S UTC")
    );
    contents.push_str(&format_transcript(&session.messages));
    std::fs::write(path, contents)?;
    println!("Wrote {path}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use koach_api::{ChatRequest, ReplyEventStream, Role};

    /// Transport whose reply setup fails with a non-transport error
    struct BrokenTransport;

    #[async_trait]
    impl CoachTransport for BrokenTransport {
        async fn stream_chat(
            &self,
            _request: &ChatRequest,
        ) -> koach_api::Result<ReplyEventStream> {
            Err(koach_api::Error::UnexpectedResponse(
                "no stream".to_string(),
            ))
        }
    }

    #[tokio::test]
    async fn test_failed_turn_is_reported_not_fatal() {
        let mut session = Session::new("user-1");

        let completed = run_turn(&BrokenTransport, &mut session, "hi", None).await;

        assert!(!completed);
        // The conversation survives with the user's message intact.
        assert_eq!(session.messages.len(), 1);
        assert_eq!(session.messages[0].role, Role::User);
    }
}
