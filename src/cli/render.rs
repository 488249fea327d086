// src/cli/render.rs — Terminal renderer that follows the log view
//
// Prints only the new suffix of each assistant turn as it grows, so the
// terminal shows the same paced updates a GUI would paint.

use std::collections::HashSet;
use std::io::Write;

use crate::chat::{LogView, Role, TurnId, TurnStatus};

/// One piece of terminal output derived from a view change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RenderEvent {
    /// New answer text for stdout.
    Text(String),
    /// A replacement error turn's message, for stderr.
    Error(String),
    /// The turn reached a terminal state.
    EndOfTurn(TurnStatus),
}

#[derive(Debug)]
pub struct TerminalRenderer {
    /// Turns already on screen before rendering started, or finished since.
    done: HashSet<TurnId>,
    current: Option<(TurnId, usize)>,
    show_errors: bool,
}

impl TerminalRenderer {
    /// Start after `view`: everything already in it is treated as printed.
    pub fn after(view: &LogView) -> Self {
        Self {
            done: view.turns.iter().map(|t| t.id.clone()).collect(),
            current: None,
            show_errors: true,
        }
    }

    /// When off, replacement error turns are skipped; the caller reports the error itself.
    pub fn show_errors(mut self, show: bool) -> Self {
        self.show_errors = show;
        self
    }

    pub fn update(&mut self, view: &LogView) -> Vec<RenderEvent> {
        let mut events = Vec::new();
        for turn in view.turns.iter().filter(|t| t.role == Role::Assistant) {
            if self.done.contains(&turn.id) {
                continue;
            }
            if turn.status == TurnStatus::Errored && turn.id.as_str().starts_with("error-") {
                if self.show_errors {
                    events.push(RenderEvent::Error(turn.content.clone()));
                }
                self.done.insert(turn.id.clone());
                continue;
            }

            let printed = match &self.current {
                Some((id, n)) if id == &turn.id => *n,
                _ => 0,
            };
            // Content only grows while streaming; guard against a shorter view anyway.
            if let Some(delta) = turn.content.get(printed..).filter(|d| !d.is_empty()) {
                events.push(RenderEvent::Text(delta.to_string()));
            }
            self.current = Some((turn.id.clone(), turn.content.len().max(printed)));

            if turn.status.is_terminal() {
                events.push(RenderEvent::EndOfTurn(turn.status));
                self.done.insert(turn.id.clone());
                self.current = None;
            }
        }
        events
    }
}

/// Write events to stdout/stderr.
pub fn emit(events: &[RenderEvent]) {
    let mut out = std::io::stdout().lock();
    for event in events {
        match event {
            RenderEvent::Text(text) => {
                let _ = write!(out, "{text}");
            }
            RenderEvent::Error(message) => {
                let _ = out.flush();
                eprintln!("{message}");
            }
            RenderEvent::EndOfTurn(TurnStatus::Errored) => {
                let _ = writeln!(out);
                eprintln!("[error] answer failed");
            }
            RenderEvent::EndOfTurn(_) => {
                let _ = writeln!(out);
            }
        }
    }
    let _ = out.flush();
}
