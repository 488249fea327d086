// src/cli/ask.rs — One-shot question

use serde::Serialize;

use crate::chat::{Turn, TurnStatus};
use crate::session::{ChatSession, IgnoreReason, SendOutcome};

#[derive(Debug, Serialize)]
struct AskReport<'a> {
    question: &'a str,
    document_id: Option<&'a str>,
    status: TurnStatus,
    answer: &'a str,
}

/// Ask a single question. Streams to stdout, or prints one JSON object with `json`.
pub async fn run_ask(session: &ChatSession, question: &str, json: bool) -> anyhow::Result<()> {
    let watcher = super::spawn_interrupt_watcher(session.stop_handle());
    // The error is reported once, by the caller of this function.
    let outcome = if json {
        session.send(question).await
    } else {
        super::send_and_render(session, question, false).await
    };
    watcher.abort();

    if let SendOutcome::Ignored(reason) = &outcome {
        match reason {
            IgnoreReason::EmptyQuestion => anyhow::bail!("question is empty"),
            IgnoreReason::NoDocument => anyhow::bail!("no document selected"),
            IgnoreReason::Busy => anyhow::bail!("an answer is already streaming"),
        }
    }

    if json {
        let turns = session.snapshot();
        let answer = outcome
            .turn()
            .and_then(|id| turns.iter().find(|t| &t.id == id))
            .map(Turn::clone);
        let documents = session.documents();
        if let Some(answer) = answer {
            let report = AskReport {
                question,
                document_id: documents.selected(),
                status: answer.status,
                answer: &answer.content,
            };
            println!("{}", serde_json::to_string_pretty(&report)?);
        }
    }

    match outcome {
        SendOutcome::Failed { error, .. } => Err(error.into()),
        _ => Ok(()),
    }
}
