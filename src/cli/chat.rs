// src/cli/chat.rs — Interactive REPL

use crate::chat::{Role, TurnStatus};
use crate::session::{ChatSession, SendOutcome};
use crate::upstream::http::HttpAnswerSource;

use super::documents::{format_listing, pick_document};

/// Run the interactive chat REPL.
pub async fn run_chat(session: &ChatSession, source: &HttpAnswerSource) -> anyhow::Result<()> {
    let documents = session.documents();
    let current = documents
        .selected()
        .map(|id| documents.filename_of(id).unwrap_or(id).to_string())
        .unwrap_or_else(|| "none".into());
    eprintln!(
        "docchat v{} | {} | document: {}\n",
        env!("CARGO_PKG_VERSION"),
        source.base_url(),
        current,
    );
    if let Some(welcome) = session.snapshot().first() {
        println!("{}\n", welcome.content);
    }

    let watcher = super::spawn_interrupt_watcher(session.stop_handle());
    let mut answered = 0u32;
    let mut stopped = 0u32;

    while let Some(input) = read_input() {
        let trimmed = input.trim();

        if trimmed == "quit" || trimmed == "exit" || trimmed == "/quit" {
            break;
        }

        if trimmed.starts_with('/') {
            handle_slash_command(trimmed, session, source).await;
            continue;
        }

        if trimmed.is_empty() {
            continue;
        }

        match super::send_and_render(session, trimmed, true).await {
            SendOutcome::Completed { .. } => answered += 1,
            SendOutcome::Stopped { .. } => stopped += 1,
            SendOutcome::Failed { error, .. } => {
                tracing::debug!(error = %error, "answer failed");
            }
            SendOutcome::Ignored(_) => {}
        }
        println!();
    }

    watcher.abort();
    eprintln!("\nSession total: {answered} answer(s), {stopped} stopped");
    Ok(())
}

fn read_input() -> Option<String> {
    use std::io::{self, BufRead, Write};

    print!("> ");
    io::stdout().flush().ok();

    let stdin = io::stdin();
    let mut line = String::new();
    match stdin.lock().read_line(&mut line) {
        Ok(0) => None, // EOF
        Ok(_) => Some(line),
        Err(_) => None,
    }
}

async fn handle_slash_command(input: &str, session: &ChatSession, source: &HttpAnswerSource) {
    let parts: Vec<&str> = input.splitn(2, ' ').collect();
    let cmd = parts[0];
    let arg = parts.get(1).map(|s| s.trim()).unwrap_or("");

    match cmd {
        "/documents" => match source.list_documents().await {
            Ok(documents) => {
                session.set_documents(documents);
                let selection = session.documents();
                if selection.known().is_empty() {
                    eprintln!("  No documents uploaded yet.");
                } else {
                    eprint!("{}", format_listing(&selection, selection.known()));
                }
            }
            Err(e) => eprintln!("  Could not list documents: {}", e.user_message()),
        },

        "/use" => {
            let selection = session.documents();
            if arg.is_empty() {
                match pick_document(selection.known()) {
                    Some(id) => {
                        session.select_document(id.clone());
                        eprintln!("  Using {id}");
                    }
                    None => eprintln!("  Usage: /use <document-id>"),
                }
            } else if selection.has_known() && selection.filename_of(arg).is_none() {
                eprintln!("  Unknown document: {arg} (try /documents)");
            } else {
                session.select_document(arg);
                eprintln!("  Using {arg}");
            }
        }

        "/history" => {
            for turn in session.snapshot() {
                let who = match turn.role {
                    Role::User => "you",
                    Role::Assistant => "assistant",
                };
                let status = match turn.status {
                    TurnStatus::Complete => String::new(),
                    other => format!(" [{}]", format!("{other:?}").to_lowercase()),
                };
                eprintln!("  {who}{status}: {}", turn.content.trim_end());
            }
        }

        "/help" => {
            eprintln!("  /documents      List documents and refresh the selection");
            eprintln!("  /use [id]       Select a document (picker when no id)");
            eprintln!("  /history        Show this conversation");
            eprintln!("  /quit           Exit");
            eprintln!("  Ctrl-C stops a streaming answer; at the prompt it exits.");
        }

        _ => {
            eprintln!("  Unknown command: {cmd}. Type /help for available commands.");
        }
    }
}
