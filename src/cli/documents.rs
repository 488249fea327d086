// src/cli/documents.rs — Document listing, health check, and the document picker

use std::fmt;

use inquire::Select;

use crate::upstream::documents::DocumentSelection;
use crate::upstream::http::HttpAnswerSource;
use crate::upstream::DocumentInfo;

pub async fn run_documents(source: &HttpAnswerSource) -> anyhow::Result<()> {
    let documents = source.list_documents().await?;
    if documents.is_empty() {
        eprintln!("No documents uploaded yet.");
        return Ok(());
    }
    print!("{}", format_listing(&DocumentSelection::new(), &documents));
    Ok(())
}

pub async fn run_health(source: &HttpAnswerSource) -> anyhow::Result<()> {
    let health = source.health().await?;
    println!("{} ({})", health.status, source.base_url());
    Ok(())
}

/// One line per document; the selected one is starred.
pub fn format_listing(selection: &DocumentSelection, documents: &[DocumentInfo]) -> String {
    let mut out = String::new();
    for doc in documents {
        let marker = if selection.selected() == Some(doc.document_id.as_str()) {
            "*"
        } else {
            " "
        };
        out.push_str(&format!("{marker} {}  {}\n", doc.document_id, doc.filename));
    }
    out
}

struct DocumentOption<'a>(&'a DocumentInfo);

impl fmt::Display for DocumentOption<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}  ({})", self.0.filename, self.0.document_id)
    }
}

/// Interactive picker. `None` when the list is empty or the prompt was cancelled.
pub fn pick_document(documents: &[DocumentInfo]) -> Option<String> {
    if documents.is_empty() {
        return None;
    }
    let options: Vec<DocumentOption<'_>> = documents.iter().map(DocumentOption).collect();
    match Select::new("Select a document:", options).prompt() {
        Ok(choice) => Some(choice.0.document_id.clone()),
        Err(e) => {
            tracing::debug!("document picker closed: {e}");
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn docs() -> Vec<DocumentInfo> {
        vec![
            DocumentInfo {
                document_id: "a1".into(),
                filename: "cats.pdf".into(),
            },
            DocumentInfo {
                document_id: "b2".into(),
                filename: "dogs.pdf".into(),
            },
        ]
    }

    #[test]
    fn test_listing_marks_selected() {
        let mut selection = DocumentSelection::new();
        selection.set_known(docs());
        selection.select("b2");
        let out = format_listing(&selection, selection.known());
        assert_eq!(out, "  a1  cats.pdf\n* b2  dogs.pdf\n");
    }

    #[test]
    fn test_picker_label() {
        let d = docs();
        assert_eq!(DocumentOption(&d[0]).to_string(), "cats.pdf  (a1)");
    }

    #[test]
    fn test_picker_empty_list() {
        assert!(pick_document(&[]).is_none());
    }
}
