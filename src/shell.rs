//! Interactive mailbox shell
//!
//! A line-oriented front end over a [`DeviceEndpoint`]. Each line is one command:
//!
//! ```text
//! open <minor>            open a mailbox
//! close <minor>           close a mailbox opened by this shell
//! write <minor> <text>    append <text> as one message
//! read <minor>            remove and print the next message
//! clear <minor>           drop every queued message
//! status [<minor>]        show open mailboxes or one mailbox
//! help                    list commands
//! quit                    close everything this shell opened and exit
//! ```
//!
//! With signal handling enabled, Ctrl-C while a command waits for a mailbox lock
//! abandons the wait (the command reports `busy`); Ctrl-C at the prompt exits.

use crate::device::{DeviceEndpoint, ReadData};
use crate::mailbox::{Interrupt, MailboxError};
use std::collections::BTreeSet;
use std::str::FromStr;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, AsyncWrite, AsyncWriteExt};

const HELP: &str = "\
commands:
  open <minor>            open a mailbox
  close <minor>           close a mailbox opened by this shell
  write <minor> <text>    append <text> as one message
  read <minor>            remove and print the next message
  clear <minor>           drop every queued message
  status [<minor>]        show open mailboxes or one mailbox
  help                    list commands
  quit                    close everything and exit";

/// Placeholder printed for a read of an empty mailbox
pub const NO_MESSAGE: &str = "No message to read";

/// A parsed shell command
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Command {
    Open(u32),
    Close(u32),
    Write(u32, String),
    Read(u32),
    Clear(u32),
    Status(Option<u32>),
    Help,
    Quit,
}

fn parse_minor(arg: Option<&str>, command: &str) -> std::result::Result<u32, String> {
    let arg = arg.ok_or_else(|| format!("usage: {} <minor>", command))?;
    arg.parse()
        .map_err(|_| format!("invalid minor number: {}", arg))
}

impl FromStr for Command {
    type Err = String;

    fn from_str(line: &str) -> std::result::Result<Self, Self::Err> {
        let line = line.trim();
        let (word, rest) = match line.split_once(char::is_whitespace) {
            Some((word, rest)) => (word, rest.trim_start()),
            None => (line, ""),
        };
        let mut args = rest.split_whitespace();

        match word.to_lowercase().as_str() {
            "open" => Ok(Command::Open(parse_minor(args.next(), "open")?)),
            "close" => Ok(Command::Close(parse_minor(args.next(), "close")?)),
            "read" => Ok(Command::Read(parse_minor(args.next(), "read")?)),
            "clear" => Ok(Command::Clear(parse_minor(args.next(), "clear")?)),
            "write" => {
                let (minor, text) = match rest.split_once(char::is_whitespace) {
                    Some((minor, text)) => (minor, text),
                    None => (rest, ""),
                };
                let minor = parse_minor(Some(minor).filter(|m| !m.is_empty()), "write")?;
                Ok(Command::Write(minor, text.to_string()))
            }
            "status" => match args.next() {
                Some(arg) => Ok(Command::Status(Some(parse_minor(Some(arg), "status")?))),
                None => Ok(Command::Status(None)),
            },
            "help" | "?" => Ok(Command::Help),
            "quit" | "exit" => Ok(Command::Quit),
            other => Err(format!("unknown command: {} (try `help`)", other)),
        }
    }
}

/// Command interpreter bound to one endpoint
pub struct Shell {
    device: DeviceEndpoint,
    /// Mailboxes this shell holds open
    opened: BTreeSet<u32>,
    handle_signals: bool,
}

impl Shell {
    /// Create a shell that reacts to Ctrl-C
    pub fn new(device: DeviceEndpoint) -> Self {
        Self {
            device,
            opened: BTreeSet::new(),
            handle_signals: true,
        }
    }

    /// Enable or disable Ctrl-C handling
    pub fn with_signals(mut self, handle_signals: bool) -> Self {
        self.handle_signals = handle_signals;
        self
    }

    /// Mailboxes this shell holds open
    pub fn opened(&self) -> impl Iterator<Item = u32> + '_ {
        self.opened.iter().copied()
    }

    /// Execute one command, returning the text to print
    ///
    /// Mailbox failures are rendered into the output rather than returned, so a
    /// failed command never ends the session.
    pub async fn execute(&mut self, command: Command, interrupt: &Interrupt) -> String {
        match self.dispatch(command, interrupt).await {
            Ok(output) => output,
            Err(e) => format!("error ({}): {}", e.reason(), e),
        }
    }

    async fn dispatch(
        &mut self,
        command: Command,
        interrupt: &Interrupt,
    ) -> std::result::Result<String, MailboxError> {
        match command {
            Command::Open(minor) => {
                self.device.open(minor)?;
                self.opened.insert(minor);
                Ok(format!("opened mailbox {}", minor))
            }
            Command::Close(minor) => {
                self.require_open(minor)?;
                self.device.close(minor, interrupt).await?;
                self.opened.remove(&minor);
                Ok(format!("closed mailbox {}", minor))
            }
            Command::Write(minor, text) => {
                self.require_open(minor)?;
                let accepted = self.device.write(minor, text.as_bytes(), interrupt).await?;
                if accepted < text.len() {
                    Ok(format!("wrote {} of {} bytes (truncated)", accepted, text.len()))
                } else {
                    Ok(format!("wrote {} bytes", accepted))
                }
            }
            Command::Read(minor) => {
                self.require_open(minor)?;
                let outcome = self.device.read(minor, 0, interrupt).await?;
                Ok(match outcome.data {
                    ReadData::Message(msg) => msg.to_string_lossy().into_owned(),
                    ReadData::NoData | ReadData::EndOfCycle => NO_MESSAGE.to_string(),
                })
            }
            Command::Clear(minor) => {
                self.require_open(minor)?;
                let id = self.device.resolve(minor)?;
                let discarded = self.device.registry().clear(id, interrupt).await?;
                Ok(format!("discarded {} messages", discarded))
            }
            Command::Status(Some(minor)) => {
                let id = self.device.resolve(minor)?;
                let stats = self.device.registry().stats(id, interrupt).await?;
                Ok(format!(
                    "mailbox {}: {}, {}/{} queued",
                    stats.id,
                    if stats.opened { "open" } else { "closed" },
                    stats.queued,
                    stats.capacity
                ))
            }
            Command::Status(None) => {
                let registry = self.device.registry();
                let held: Vec<String> = self.opened.iter().map(|m| m.to_string()).collect();
                Ok(format!(
                    "{} of {} mailboxes open; held by this shell: [{}]",
                    registry.open_count(),
                    registry.capacity(),
                    held.join(", ")
                ))
            }
            Command::Help => Ok(HELP.to_string()),
            Command::Quit => Ok(String::new()),
        }
    }

    fn require_open(&self, minor: u32) -> std::result::Result<(), MailboxError> {
        if self.opened.contains(&minor) {
            Ok(())
        } else {
            Err(MailboxError::NotOpen(minor as usize))
        }
    }

    /// Close every mailbox this shell still holds
    pub async fn close_all(&mut self) {
        let interrupt = Interrupt::never();
        let held: Vec<u32> = self.opened.iter().copied().collect();

        for minor in held {
            match self.device.close(minor, &interrupt).await {
                Ok(()) => {
                    self.opened.remove(&minor);
                }
                Err(e) => tracing::warn!(minor, error = %e, "Failed to close mailbox on exit"),
            }
        }
    }

    /// Run the command loop until `quit`, end of input or Ctrl-C at the prompt
    pub async fn run<R, W>(&mut self, input: R, mut output: W) -> crate::Result<()>
    where
        R: AsyncBufRead + Unpin,
        W: AsyncWrite + Unpin,
    {
        let mut lines = input.lines();

        loop {
            output.write_all(b"mailslot> ").await?;
            output.flush().await?;

            let line = tokio::select! {
                line = lines.next_line() => line?,
                _ = ctrl_c(self.handle_signals) => {
                    tracing::info!("Received Ctrl-C at prompt, leaving shell");
                    output.write_all(b"\n").await?;
                    break;
                }
            };

            let Some(line) = line else { break };
            if line.trim().is_empty() {
                continue;
            }

            let command = match line.parse::<Command>() {
                Ok(command) => command,
                Err(e) => {
                    output.write_all(format!("{}\n", e).as_bytes()).await?;
                    continue;
                }
            };
            if command == Command::Quit {
                break;
            }

            let text = self.execute_interruptible(command).await;
            if !text.is_empty() {
                output.write_all(format!("{}\n", text).as_bytes()).await?;
            }
        }

        self.close_all().await;
        output.flush().await?;
        Ok(())
    }

    async fn execute_interruptible(&mut self, command: Command) -> String {
        let (handle, interrupt) = Interrupt::pair();
        let handle_signals = self.handle_signals;

        let execution = self.execute(command, &interrupt);
        tokio::pin!(execution);

        loop {
            tokio::select! {
                text = &mut execution => return text,
                _ = ctrl_c(handle_signals), if !interrupt.is_triggered() => {
                    tracing::info!("Received Ctrl-C, interrupting pending lock wait");
                    handle.trigger();
                }
            }
        }
    }
}

async fn ctrl_c(enabled: bool) {
    if !enabled || tokio::signal::ctrl_c().await.is_err() {
        std::future::pending::<()>().await;
    }
}
