//! Colored console output for the wrapper.
//!
//! Everything the operator sees on the wrapper's own console goes through
//! here: status lines, decoded server events with a kind tag, and raw
//! pass-through server output.

use std::io::{self, Write};

use owo_colors::OwoColorize;

use crate::server::{EventKind, ServerEvent};

/// Print a wrapper status line.
pub fn print_status(message: &str) {
    println!("{} {}", "[WRAPPER]".blue().bold(), message);
    let _ = io::stdout().flush();
}

/// Print a decoded event with a tag matching its kind.
pub fn print_event(event: &ServerEvent) {
    let text = event.content.as_deref().unwrap_or(&event.raw_content);
    match &event.kind {
        EventKind::ServerReady => {
            println!("{} {}", "[READY]".green().bold(), text);
        }
        EventKind::ServerStopped => {
            println!("{} {}", "[STOP]".red().bold(), text);
        }
        EventKind::PlayerJoined { player } => {
            println!("{} {} {}", "[JOIN]".green().bold(), player.cyan(), "joined the game".dimmed());
        }
        EventKind::PlayerLeft { player } => {
            println!("{} {} {}", "[LEAVE]".yellow().bold(), player.cyan(), "left the game".dimmed());
        }
        EventKind::PlayerChat => {
            println!("{} {}", "[CHAT]".cyan().bold(), text);
        }
        EventKind::PlayerDeath { .. } => {
            println!("{} {}", "[DEATH]".magenta().bold(), text);
        }
        EventKind::Other => {
            println!("{text}");
        }
    }
    let _ = io::stdout().flush();
}

/// Print a server line verbatim, dimmed so wrapper output stands out.
pub fn print_raw_line(line: &str) {
    println!("{}", line.dimmed());
    let _ = io::stdout().flush();
}

/// Print an error message.
pub fn print_error(message: &str) {
    eprintln!("{} {}", "[ERROR]".red().bold(), message);
    let _ = io::stderr().flush();
}
