use anyhow::Result;
use serde::Deserialize;
use serde_json::json;

use super::Tool;
use crate::api::{ApiClient, API_NOTE_EDIT};
use crate::document::{BlockSpec, DocumentConverter};
use crate::upload::Uploader;

/// Input for the `edit_note` tool.
#[derive(Debug, Deserialize)]
pub struct EditNoteInput {
    pub note_id: String,
    pub paragraphs: Vec<BlockSpec>,
}

/// Replaces an existing note's content wholesale.
pub struct EditNote<'a> {
    api: &'a ApiClient,
}

impl<'a> EditNote<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Tool for EditNote<'_> {
    type Input = EditNoteInput;
    type Output = String;

    fn name(&self) -> &str {
        "edit_note"
    }

    async fn run(&self, input: EditNoteInput) -> Result<String> {
        if input.note_id.is_empty() {
            anyhow::bail!("note_id must not be empty");
        }
        log::info!(
            "edit_note: {} with {} block(s)",
            input.note_id,
            input.paragraphs.len()
        );

        let uploader = Uploader::new(self.api);
        let doc = DocumentConverter::new(&uploader)
            .convert(&input.paragraphs)
            .await?;

        let payload = json!({
            "note_id": input.note_id,
            "paragraphs": [doc],
        });

        let resp = self.api.post_json(API_NOTE_EDIT, &payload).await?;
        if !resp.is_ok() {
            anyhow::bail!("note edit failed with status {}: {}", resp.status, resp.raw);
        }

        Ok(format!(
            "✅ Note updated!\n\nNote ID: {}\nBlocks: {}",
            input.note_id,
            input.paragraphs.len()
        ))
    }
}
