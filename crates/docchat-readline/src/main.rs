use std::borrow::Cow::{self, Borrowed, Owned};

use anyhow::Result;
use colored::Colorize;
use rustyline::completion::{Completer, Pair};
use rustyline::highlight::Highlighter;
use rustyline::hint::Hinter;
use rustyline::validate::Validator;
use rustyline::{Context, Editor, Helper};

use docchat_core::content::{MediaTypePolicy, ingest_file, ingest_text};
use docchat_core::conversation::{Phase, Role};
use docchat_interaction::{ChatSession, GeminiClient, SendOutcome};

/// CLI helper for rustyline that provides completion, highlighting, and hints.
#[derive(Clone)]
struct CliHelper {
    commands: Vec<String>,
}

impl CliHelper {
    fn new() -> Self {
        Self {
            commands: vec![
                "/load".to_string(),
                "/text".to_string(),
                "/start".to_string(),
                "/reset".to_string(),
                "/quit".to_string(),
            ],
        }
    }
}

impl Helper for CliHelper {}

impl Completer for CliHelper {
    type Candidate = Pair;

    fn complete(
        &self,
        line: &str,
        pos: usize,
        _ctx: &Context<'_>,
    ) -> rustyline::Result<(usize, Vec<Pair>)> {
        let line = &line[..pos];

        if line.starts_with('/') {
            let candidates: Vec<Pair> = self
                .commands
                .iter()
                .filter(|cmd| cmd.starts_with(line))
                .map(|cmd| Pair {
                    display: cmd.clone(),
                    replacement: cmd.clone(),
                })
                .collect();
            Ok((0, candidates))
        } else {
            Ok((0, vec![]))
        }
    }
}

impl Highlighter for CliHelper {
    fn highlight<'l>(&self, line: &'l str, _pos: usize) -> Cow<'l, str> {
        if line.starts_with('/') {
            Owned(line.bright_cyan().to_string())
        } else {
            Borrowed(line)
        }
    }

    fn highlight_char(&self, _line: &str, _pos: usize, _forced: bool) -> bool {
        true
    }
}

impl Hinter for CliHelper {
    type Hint = String;

    fn hint(&self, line: &str, pos: usize, _ctx: &Context<'_>) -> Option<String> {
        let line = &line[..pos];

        if line.starts_with('/') && !line.contains(' ') {
            self.commands
                .iter()
                .find(|cmd| cmd.starts_with(line) && cmd.len() > line.len())
                .map(|cmd| cmd[line.len()..].to_string())
        } else {
            None
        }
    }
}

impl Validator for CliHelper {}

fn print_model_reply(session_text: &str) {
    for line in session_text.lines() {
        println!("{}", line.bright_blue());
    }
}

/// The main entry point for the DocChat readline REPL.
///
/// Loads a document with `/load <path>` or `/text <pasted text>`, starts
/// the conversation with `/start`, then chats line by line. `/reset`
/// returns to an empty session.
#[tokio::main]
async fn main() -> Result<()> {
    let client = match GeminiClient::try_from_env() {
        Ok(client) => client,
        Err(err) => {
            eprintln!("{}", format!("{err}").red());
            eprintln!(
                "{}",
                "Set GEMINI_API_KEY or add ~/.config/docchat/secret.json".bright_black()
            );
            std::process::exit(1);
        }
    };

    let session = ChatSession::new(client);
    let policy = MediaTypePolicy::default();

    let helper = CliHelper::new();
    let mut rl = Editor::new()?;
    rl.set_helper(Some(helper));

    println!("{}", "=== DocChat ===".bright_magenta().bold());
    println!(
        "{}",
        "Load a document with '/load <path>' or '/text <content>', then '/start' chatting."
            .bright_black()
    );
    println!();

    loop {
        let readline = rl.readline(">> ");

        let line = match readline {
            Ok(line) => line,
            Err(_) => break,
        };
        let trimmed = line.trim();

        if trimmed.is_empty() {
            continue;
        }
        let _ = rl.add_history_entry(trimmed);

        if trimmed == "/quit" || trimmed == "quit" || trimmed == "exit" {
            println!("{}", "Goodbye!".bright_green());
            break;
        }

        if let Some(path) = trimmed.strip_prefix("/load ") {
            match ingest_file(path.trim(), &policy).await {
                Ok(descriptor) => {
                    let name = descriptor.display_name.clone();
                    match session.load_content(descriptor).await {
                        Ok(()) => println!("{}", format!("Loaded {name}").green()),
                        Err(err) => println!("{}", format!("{err}").red()),
                    }
                }
                Err(err) => println!("{}", format!("{err}").red()),
            }
            continue;
        }

        if let Some(text) = trimmed.strip_prefix("/text ") {
            match ingest_text(text, "Pasted Text") {
                Ok(descriptor) => match session.load_content(descriptor).await {
                    Ok(()) => println!("{}", "Loaded pasted text".green()),
                    Err(err) => println!("{}", format!("{err}").red()),
                },
                Err(err) => println!("{}", format!("{err}").red()),
            }
            continue;
        }

        match trimmed {
            "/start" => {
                match session.start_chat().await {
                    Ok(()) => {
                        if let Some(greeting) = session.transcript().await.last() {
                            print_model_reply(&greeting.text());
                        }
                    }
                    Err(err) => println!("{}", format!("{err}").red()),
                }
                continue;
            }
            "/reset" => {
                session.reset().await;
                println!("{}", "Session reset".bright_black());
                continue;
            }
            _ => {}
        }

        if session.phase().await != Phase::Active {
            println!(
                "{}",
                "No active chat. Load a document and '/start' first.".bright_black()
            );
            continue;
        }

        match session.send_message(trimmed).await {
            Ok(SendOutcome::Answered) => {
                if let Some(banner) = session.take_last_error().await {
                    println!("{}", banner.red());
                }
                if let Some(turn) = session.transcript().await.last() {
                    if turn.role == Role::Model {
                        print_model_reply(&turn.text());
                    }
                }
            }
            Ok(SendOutcome::Busy) => {
                println!("{}", "Still waiting for the previous answer...".yellow());
            }
            Ok(SendOutcome::EmptyInput) | Ok(SendOutcome::Stale) => {}
            Err(err) => println!("{}", format!("{err}").red()),
        }
    }

    Ok(())
}
