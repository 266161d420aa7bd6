//! Interactive client loop.
//!
//! Group selection and chatting alternate until the user quits:
//!
//! 1. show the group table, ask for a group and a nickname
//! 2. join; on rejection show the reason and start over
//! 3. chat until `/end`, then leave and go back to 1

use std::io::Write;

use chatrelay_shared::{
    protocol::Reply,
    time::{Clock, SystemClock, local_offset},
};
use rustyline::{DefaultEditor, error::ReadlineError};
use tokio::sync::mpsc;

use super::{
    error::ClientError,
    formatter::MessageFormatter,
    session::{ChatClient, JoinOutcome},
};

/// Typed at any prompt to quit, or while chatting to leave the group.
pub const QUIT_COMMAND: &str = "/end";

const CHAT_PROMPT: &str = "> ";

/// Connect to `address` and run the interactive session until the user quits
pub async fn run_client(address: String) -> Result<(), ClientError> {
    tracing::info!("Connecting to {}", address);
    let mut client = ChatClient::connect(&address).await?;
    tracing::info!("Connected to chat server!");

    let mut input = LineInput::spawn();
    let clock = SystemClock;

    loop {
        let groups = client.list_groups().await?;
        print!("{}", MessageFormatter::format_group_table(&groups));

        let Some(group) = input.read_line("which group? ").await.filter(|l| !is_quit(l)) else {
            return Ok(());
        };
        let Some(member) = input.read_line("what nickname? ").await.filter(|l| !is_quit(l)) else {
            return Ok(());
        };

        match client.join(&group, &member).await? {
            JoinOutcome::Rejected(reason) => {
                print!("{}", MessageFormatter::format_rejected(&reason));
                continue;
            }
            JoinOutcome::Accepted => {
                let joined_at = clock.now_millis();
                let offset = local_offset();
                print!("{}", MessageFormatter::format_joined(&group, &member, joined_at, offset));
            }
        }

        if !chat(&mut client, &mut input).await? {
            return Ok(());
        }
        print!("{}", MessageFormatter::format_left(&group, clock.now_millis(), local_offset()));
    }
}

/// Chat inside the joined group.
///
/// Returns `Ok(true)` after `/end` (group left, back to selection) and
/// `Ok(false)` when input is closed (Ctrl+C / Ctrl+D).
async fn chat(client: &mut ChatClient, input: &mut LineInput) -> Result<bool, ClientError> {
    loop {
        tokio::select! {
            reply = client.recv() => match reply? {
                Reply::UserText { sender, text } => {
                    print!("\n{}", MessageFormatter::format_chat_message(&sender, &text));
                    redisplay_prompt(CHAT_PROMPT);
                }
                other => return Err(ClientError::UnexpectedReply(other.kind())),
            },
            line = input.read_line(CHAT_PROMPT) => match line {
                None => {
                    client.leave().await?;
                    return Ok(false);
                }
                Some(line) if line.starts_with(QUIT_COMMAND) => {
                    client.leave().await?;
                    return Ok(true);
                }
                Some(line) if line.trim().is_empty() => {}
                Some(line) => client.send_text(&line).await?,
            },
        }
    }
}

/// Empty input or the quit command ends the session at a selection prompt.
fn is_quit(line: &str) -> bool {
    line.trim().is_empty() || line.starts_with(QUIT_COMMAND)
}

/// Redisplay the prompt after printing a received message
fn redisplay_prompt(prompt: &str) {
    print!("{}", prompt);
    std::io::stdout().flush().ok();
}

/// Line input on a blocking rustyline thread.
///
/// The thread reads one line per prompt it is sent; `None` means the input
/// was closed.
struct LineInput {
    prompts: std::sync::mpsc::Sender<String>,
    lines: mpsc::UnboundedReceiver<Option<String>>,
    waiting: bool,
}

impl LineInput {
    fn spawn() -> Self {
        let (prompts, prompt_rx) = std::sync::mpsc::channel::<String>();
        let (line_tx, lines) = mpsc::unbounded_channel();

        // Spawn a blocking thread for rustyline (synchronous readline)
        std::thread::spawn(move || {
            let mut rl = match DefaultEditor::new() {
                Ok(rl) => rl,
                Err(e) => {
                    eprintln!("Failed to initialize readline: {}", e);
                    line_tx.send(None).ok();
                    return;
                }
            };

            while let Ok(prompt) = prompt_rx.recv() {
                let line = match rl.readline(&prompt) {
                    Ok(line) => {
                        if !line.trim().is_empty() {
                            rl.add_history_entry(line.as_str()).ok();
                        }
                        Some(line)
                    }
                    Err(ReadlineError::Interrupted) => {
                        // Ctrl+C
                        tracing::info!("Interrupted");
                        None
                    }
                    Err(ReadlineError::Eof) => {
                        // Ctrl+D
                        tracing::info!("EOF");
                        None
                    }
                    Err(err) => {
                        tracing::error!("Readline error: {}", err);
                        None
                    }
                };

                let closed = line.is_none();
                if line_tx.send(line).is_err() || closed {
                    break;
                }
            }
        });

        Self {
            prompts,
            lines,
            waiting: false,
        }
    }

    /// Read one line. Cancel safe: a cancelled read keeps its prompt open.
    async fn read_line(&mut self, prompt: &str) -> Option<String> {
        if !self.waiting {
            self.prompts.send(prompt.to_string()).ok()?;
            self.waiting = true;
        }
        let line = self.lines.recv().await.flatten();
        self.waiting = false;
        line
    }
}
