// src/upstream/documents.rs — Which document questions are asked against
//
// The id is opaque: it is passed through to the service unvalidated.

use super::types::DocumentInfo;

#[derive(Debug, Clone, Default)]
pub struct DocumentSelection {
    known: Vec<DocumentInfo>,
    selected: Option<String>,
}

impl DocumentSelection {
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the known list. Keeps the current selection if it still exists,
    /// otherwise falls back to the first document (or nothing).
    pub fn set_known(&mut self, documents: Vec<DocumentInfo>) {
        let still_there = self
            .selected
            .as_ref()
            .is_some_and(|id| documents.iter().any(|d| &d.document_id == id));
        if !still_there {
            self.selected = documents.first().map(|d| d.document_id.clone());
        }
        self.known = documents;
    }

    pub fn select(&mut self, id: impl Into<String>) {
        self.selected = Some(id.into());
    }

    pub fn clear_selection(&mut self) {
        self.selected = None;
    }

    pub fn selected(&self) -> Option<&str> {
        self.selected.as_deref()
    }

    pub fn known(&self) -> &[DocumentInfo] {
        &self.known
    }

    pub fn has_known(&self) -> bool {
        !self.known.is_empty()
    }

    pub fn filename_of(&self, id: &str) -> Option<&str> {
        self.known
            .iter()
            .find(|d| d.document_id == id)
            .map(|d| d.filename.as_str())
    }
}
