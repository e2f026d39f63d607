//! Console client for trying the bot without Telegram.
//!
//! Runs inside a temporary storage workspace that is deleted on exit.
//! Logging stays off unless `VERBOSE` is set.

use anyhow::Result;
use async_trait::async_trait;
use companion_bot::bot::transport::{send_all, ChatTransport};
use companion_bot::config::Settings;
use companion_bot::logging::{init_logging, LoggingDisabled};
use companion_bot::pipeline::{build_pipeline, IncomingMessage, ResponsePipeline};
use companion_bot::response::OutboundMessage;
use companion_bot::scheduler::{dispatch_deferred, TokioScheduler};
use companion_bot::storage::{with_temporary_workspace, R2Storage};
use dotenvy::dotenv;
use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio_util::sync::CancellationToken;

const LOCAL_CHAT_ID: &str = "123";

/// Prints messages to stdout: media as its URL, text as is
struct ConsoleTransport;

#[async_trait]
impl ChatTransport for ConsoleTransport {
    async fn send(&self, message: &OutboundMessage) -> Result<()> {
        match message {
            OutboundMessage::Text { text, .. } => println!("{text}\n"),
            OutboundMessage::Media { locator, .. } => println!("{locator}\n"),
        }
        Ok(())
    }
}

// Single-threaded so the LoggingDisabled guard covers every task.
#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    dotenv().ok();

    let _quiet = if std::env::var_os("VERBOSE").is_some() {
        init_logging()?;
        None
    } else {
        Some(LoggingDisabled::new())
    };

    let settings = Settings::new()?;
    let settings = &settings;

    let outcome = match with_temporary_workspace(settings, |storage| run_session(settings, storage)).await {
        Ok(result) => result,
        Err(e) => Err(e.into()),
    };

    if let Err(e) = &outcome {
        eprintln!("Aborting! There was an error encountered when running: {e:#}");
    }
    outcome
}

async fn run_session(settings: &Settings, storage: Arc<R2Storage>) -> Result<()> {
    let cancel = CancellationToken::new();
    let (scheduler, due) = TokioScheduler::new(cancel.clone());
    let pipeline = build_pipeline(settings, storage, Arc::new(scheduler))?;

    let console: Arc<dyn ChatTransport> = Arc::new(ConsoleTransport);
    let reminders = tokio::spawn(dispatch_deferred(due, console.clone(), cancel.clone()));

    println!("Starting Agent...");
    println!("Press CTRL+D to exit at any time.\n");

    let result = repl(&pipeline, console.as_ref()).await;
    cancel.cancel();
    reminders.await?;
    result
}

async fn repl(
    pipeline: &ResponsePipeline,
    console: &dyn ChatTransport,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    for count in 1.. {
        println!("----- Agent Run {count} -----");
        print!("Prompt: ");
        std::io::stdout().flush()?;

        let Some(prompt) = lines.next_line().await? else {
            println!();
            break;
        };
        if prompt.trim().is_empty() {
            continue;
        }

        match pipeline
            .create_response(&IncomingMessage::new(LOCAL_CHAT_ID, prompt))
            .await
        {
            Ok(messages) => {
                println!("\nResults: ");
                send_all(console, &messages).await?;
            }
            Err(e) => eprintln!("There was an error encountered when running: {e}"),
        }
    }
    Ok(())
}
