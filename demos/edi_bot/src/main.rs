//! EDI Bot Demo
//!
//! Answers greetings, `ping` and one very specific question when addressed
//! by name (`edi hello`) or by mention (`<@UXXXX> ping`). Configured
//! aliases only count after the first word (`so normandy, ping`) and are
//! seen by the logging handler.
//!
//! # Usage
//!
//! ```bash
//! # Against Slack, token from gobble.toml or GOBBLE_API_TOKEN
//! cargo run --package edi-bot
//!
//! # Offline, with a scripted mock session
//! cargo run --package edi-bot -- --mock
//! ```

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use clap::Parser;
use gobble::framework::builtin;
use gobble::prelude::*;
use serde_json::json;
use tracing::info;

#[derive(Debug, Parser)]
#[command(name = "edi-bot", about = "A greeting bot for the Gobble runtime")]
struct Args {
    /// Config file to load instead of searching for gobble.toml.
    #[arg(short, long)]
    config: Option<PathBuf>,

    /// Config profile, e.g. "production".
    #[arg(short, long)]
    profile: Option<String>,

    /// API token, overriding the configured one.
    #[arg(short, long)]
    token: Option<String>,

    /// Run against a scripted in-memory session.
    #[arg(long)]
    mock: bool,
}

async fn log_message(message: Message, _captures: Captures) -> HandlerResult {
    info!(
        channel = message.channel(),
        sender = message.sender().unwrap_or("unknown"),
        "{}",
        message.text()
    );
    Ok(())
}

fn registry() -> Result<HandlerRegistry> {
    let builder = HandlerRegistry::builder().listen(".*", log_message);
    Ok(builtin::greetings(builder).build()?)
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    let mut builder = GobbleRuntime::builder().registry(registry()?);
    if let Some(path) = &args.config {
        builder = builder.config_file(path);
    }
    if let Some(profile) = &args.profile {
        builder = builder.profile(profile);
    }
    if let Some(token) = args.token {
        builder = builder.token(token);
    } else if args.mock {
        builder = builder.token("mock-token");
    }
    let runtime = builder.build()?;

    if args.mock {
        let session = Arc::new(MockSession::new());
        session.push_events([
            json!({"type": "message", "user": "U1", "channel": "C1", "text": "edi hello"}),
            json!({"type": "message", "user": "U2", "channel": "C1", "text": "EDI good evening"}),
            json!({"type": "message", "user": "U3", "channel": "C1", "text": "<@UJFIDFJDFAKE> ping"}),
            json!({"type": "message", "user": "U1", "channel": "C1",
                   "text": "edi How's the new body working out?"}),
        ]);

        runtime
            .run_until(session.clone(), tokio::time::sleep(Duration::from_millis(200)))
            .await?;
        for sent in session.sent() {
            println!("[{}] edi: {}", sent.channel, sent.text);
        }
        return Ok(());
    }

    runtime.run(Arc::new(SlackRtmSession::new())).await?;
    Ok(())
}
