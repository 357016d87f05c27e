//! Line-oriented chat loop.

use crate::error::ChatError;
use crate::service::CopilotService;
use crate::session::Conversation;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};
use tracing::{error, info};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Ask(String),
    Clear,
    History,
    Quit,
    Help,
    /// Blank line
    Skip,
    Unknown(String),
}

impl Command {
    pub fn parse(line: &str) -> Self {
        let line = line.trim();
        match line {
            "" => Command::Skip,
            "/clear" => Command::Clear,
            "/history" => Command::History,
            "/quit" | "/exit" => Command::Quit,
            "/help" => Command::Help,
            _ if line.starts_with('/') => Command::Unknown(line.to_string()),
            _ => Command::Ask(line.to_string()),
        }
    }
}

const HELP: &str = "Type a question and press Enter.\n\
                    /history  show this session's messages\n\
                    /clear    forget this session's messages\n\
                    /quit     exit";

/// Reads one query per line from `input` until EOF or `/quit`.
///
/// Answers and command output go to `output`. A failed turn is reported and
/// the loop continues.
pub async fn run_repl<R, W>(
    service: &CopilotService,
    conversation: &mut Conversation,
    input: R,
    mut output: W,
) -> std::io::Result<()>
where
    R: AsyncBufRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut lines = input.lines();
    prompt(&mut output).await?;

    while let Some(line) = lines.next_line().await? {
        match Command::parse(&line) {
            Command::Skip => {}
            Command::Quit => break,
            Command::Help => write_block(&mut output, HELP).await?,
            Command::Clear => {
                conversation.clear();
                write_block(&mut output, "History cleared.").await?;
            }
            Command::History => {
                if conversation.is_empty() {
                    write_block(&mut output, "No messages yet.").await?;
                }
                for message in conversation.messages() {
                    let entry = format!(
                        "[{}] {}: {}",
                        message.timestamp.format("%H:%M:%S"),
                        message.role,
                        message.content
                    );
                    write_block(&mut output, &entry).await?;
                }
            }
            Command::Unknown(command) => {
                write_block(&mut output, &format!("Unknown command {command}; try /help")).await?;
            }
            Command::Ask(query) => match service.ask(conversation, &query).await {
                Ok(answer) => write_block(&mut output, &answer.text).await?,
                Err(e) => {
                    error!("Turn failed: {e}");
                    write_block(&mut output, &failure_message(&e)).await?;
                }
            },
        }
        prompt(&mut output).await?;
    }

    info!("Chat session ended after {} turns", conversation.turns());
    Ok(())
}

fn failure_message(e: &ChatError) -> String {
    if e.is_retryable() {
        format!("Error: {e}\nThe question was not answered; please try again.")
    } else {
        format!("Error: {e}")
    }
}

async fn prompt<W: AsyncWrite + Unpin>(output: &mut W) -> std::io::Result<()> {
    output.write_all(b"> ").await?;
    output.flush().await
}

async fn write_block<W: AsyncWrite + Unpin>(output: &mut W, text: &str) -> std::io::Result<()> {
    output.write_all(text.as_bytes()).await?;
    output.write_all(b"\n\n").await?;
    output.flush().await
}
