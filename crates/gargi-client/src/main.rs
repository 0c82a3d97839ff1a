//! `gargi`: line-oriented terminal chat against a Gargi relay.

use std::io::{self, Write};

use clap::Parser;
use gargi_client::session::{CURSOR, PENDING_TEXT};
use gargi_client::{ChatSession, RelayClient, SessionUpdate};
use tokio::io::{AsyncBufReadExt, BufReader};
use tracing::warn;
use tracing_subscriber::EnvFilter;

/// Terminal chat with the Gargi assistant.
#[derive(Parser, Debug)]
#[command(name = "gargi", about = "Terminal chat with the Gargi assistant")]
struct Args {
    /// Relay base URL
    #[arg(long, env = "GARGI_RELAY_URL", default_value = "http://127.0.0.1:5000")]
    url: String,
}

const ASSISTANT_PREFIX: &str = "gargi> ";
const USER_PROMPT: &str = "you> ";
const CLEAR_LINE: &str = "\r\x1b[2K";
const CLEAR_BELOW: &str = "\r\x1b[J";
/// Back over the two-column cursor marker and clear to end of line.
const ERASE_CURSOR: &str = "\x08\x08\x1b[K";

/// Prints streaming updates to a plain terminal.
///
/// Only new text is written. The cursor marker and the pending indicator are
/// erased before more text goes out, and a failed reply is wiped so the error
/// takes its place.
struct Renderer<W: Write> {
    out: W,
    printed: usize,
    lines: usize,
    pending_shown: bool,
    cursor_shown: bool,
}

impl<W: Write> Renderer<W> {
    fn new(out: W) -> Self {
        Self {
            out,
            printed: 0,
            lines: 0,
            pending_shown: false,
            cursor_shown: false,
        }
    }

    fn render(&mut self, update: &SessionUpdate) -> io::Result<()> {
        match update {
            SessionUpdate::Pending => {
                write!(self.out, "{}{}", ASSISTANT_PREFIX, PENDING_TEXT)?;
                self.pending_shown = true;
            }
            SessionUpdate::Progress(text) => {
                self.erase_transient()?;
                self.write_new(text)?;
                write!(self.out, "{}", CURSOR)?;
                self.cursor_shown = true;
            }
            SessionUpdate::Final(text) => {
                self.erase_transient()?;
                self.write_new(text)?;
                writeln!(self.out)?;
            }
            SessionUpdate::Failed(_) => {
                self.erase_reply()?;
                writeln!(self.out, "{}{}", ASSISTANT_PREFIX, update.render())?;
            }
        }
        self.out.flush()
    }

    fn erase_transient(&mut self) -> io::Result<()> {
        if self.pending_shown {
            write!(self.out, "{}{}", CLEAR_LINE, ASSISTANT_PREFIX)?;
            self.pending_shown = false;
        }
        if self.cursor_shown {
            write!(self.out, "{}", ERASE_CURSOR)?;
            self.cursor_shown = false;
        }
        Ok(())
    }

    fn write_new(&mut self, text: &str) -> io::Result<()> {
        if let Some(new) = text.get(self.printed..) {
            write!(self.out, "{}", new)?;
            self.lines += new.matches('\n').count();
            self.printed = text.len();
        }
        Ok(())
    }

    /// Move back to the start of the reply and clear everything below.
    fn erase_reply(&mut self) -> io::Result<()> {
        if self.lines > 0 {
            write!(self.out, "\x1b[{}A", self.lines)?;
        }
        write!(self.out, "{}", CLEAR_BELOW)?;
        self.printed = 0;
        self.lines = 0;
        self.pending_shown = false;
        self.cursor_shown = false;
        Ok(())
    }
}

fn prompt() {
    print!("{}", USER_PROMPT);
    let _ = io::stdout().flush();
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let args = Args::parse();

    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(io::stderr)
        .init();

    let client = RelayClient::new(&args.url)?;
    match client.health().await {
        Ok(status) => println!("Connected to {} ({})", client.base_url(), status),
        Err(e) => warn!(url = %client.base_url(), error = %e, "Relay is not reachable yet"),
    }
    println!("Type a message. /clear forgets the conversation, /quit exits, Ctrl-C stops a reply.");

    let mut session = ChatSession::new();
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    loop {
        prompt();
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else {
            println!();
            break;
        };

        match line.trim() {
            "" => continue,
            "/quit" => break,
            "/clear" => {
                match session.clear() {
                    Ok(()) => println!("Conversation cleared."),
                    Err(e) => println!("Cannot clear: {}", e),
                }
                continue;
            }
            _ => {}
        }

        let mut renderer = Renderer::new(io::stdout());
        let on_update = |update: &SessionUpdate| {
            if let Err(e) = renderer.render(update) {
                warn!(error = %e, "Failed to write to the terminal");
            }
        };
        let cancelled = tokio::select! {
            result = client.chat(&mut session, &line, on_update) => {
                if let Err(e) = result {
                    println!("{}", e);
                }
                false
            }
            _ = tokio::signal::ctrl_c() => true,
        };

        if cancelled && session.cancel() {
            println!("\n(reply cancelled)");
        }
    }

    Ok(())
}
