// src/cli/mod.rs — CLI definition (clap derive)

pub mod ask;
pub mod chat;
pub mod documents;
pub mod render;

use clap::{Parser, Subcommand};
use tokio::task::JoinHandle;

use crate::cancel::CancelController;
use crate::session::{ChatSession, IgnoreReason, SendOutcome};
use render::TerminalRenderer;

/// Exit status after an interrupt at the prompt (128 + SIGINT).
pub const INTERRUPTED_EXIT: i32 = 130;

#[derive(Parser)]
#[command(name = "docchat", about = "Chat with your PDF documents", version)]
pub struct Cli {
    /// Config file path
    #[arg(long)]
    pub config: Option<String>,

    /// Document service base URL (overrides config and DOCCHAT_API_BASE_URL)
    #[arg(long)]
    pub base_url: Option<String>,

    /// Document id to ask about (defaults to the first listed document)
    #[arg(short, long)]
    pub document: Option<String>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Ask one question and stream the answer to stdout
    Ask {
        /// The question
        #[arg(trailing_var_arg = true, required = true)]
        question: Vec<String>,
        /// Print the final turn as JSON instead of streaming text
        #[arg(long)]
        json: bool,
    },
    /// Interactive chat session (default)
    Chat,
    /// List documents known to the service
    Documents,
    /// Check that the document service is up
    Health,
}

/// What a Ctrl-C means right now.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Interrupt {
    /// An answer was streaming and has been told to stop.
    StopAnswer,
    /// Nothing to stop: leave the program.
    Exit,
}

pub fn on_interrupt(stopper: &CancelController) -> Interrupt {
    if stopper.is_active() {
        stopper.stop();
        Interrupt::StopAnswer
    } else {
        Interrupt::Exit
    }
}

/// Listen for Ctrl-C for as long as the returned task lives. While an answer
/// streams it is stopped; otherwise the process exits with status 130.
pub fn spawn_interrupt_watcher(stopper: CancelController) -> JoinHandle<()> {
    tokio::spawn(async move {
        loop {
            if let Err(e) = tokio::signal::ctrl_c().await {
                tracing::warn!("cannot listen for Ctrl-C: {e}");
                return;
            }
            if on_interrupt(&stopper) == Interrupt::Exit {
                eprintln!();
                std::process::exit(INTERRUPTED_EXIT);
            }
        }
    })
}

/// Run one `send()` while painting the log view as it changes.
/// Error turns and ignored-send notices are printed only when `show_errors` is set.
pub async fn send_and_render(
    session: &ChatSession,
    question: &str,
    show_errors: bool,
) -> SendOutcome {
    let mut rx = session.subscribe();
    let mut renderer = TerminalRenderer::after(&rx.borrow_and_update()).show_errors(show_errors);

    let send = session.send(question);
    tokio::pin!(send);

    let outcome = loop {
        tokio::select! {
            outcome = &mut send => break outcome,
            changed = rx.changed() => {
                if changed.is_err() {
                    continue;
                }
                let view = rx.borrow_and_update().clone();
                render::emit(&renderer.update(&view));
            }
        }
    };

    // Paint whatever landed between the last change and completion.
    render::emit(&renderer.update(&session.view()));

    match &outcome {
        _ if !show_errors => {}
        SendOutcome::Ignored(IgnoreReason::NoDocument) => {
            eprintln!("Please select a PDF document first");
        }
        SendOutcome::Ignored(IgnoreReason::Busy) => {
            eprintln!("An answer is still streaming; stop it first");
        }
        SendOutcome::Stopped { .. } => {
            tracing::debug!("answer stopped by user");
        }
        _ => {}
    }
    outcome
}
