use anyhow::Result;
use serde::Deserialize;
use serde_json::json;

use super::Tool;
use crate::api::{ApiClient, API_NOTE_CREATE};
use crate::document::{BlockSpec, DocumentConverter};
use crate::store::NoteStore;
use crate::upload::Uploader;

/// Input for the `create_note` tool.
#[derive(Debug, Deserialize)]
pub struct CreateNoteInput {
    pub paragraphs: Vec<BlockSpec>,
    #[serde(default)]
    pub auto_publish: bool,
    #[serde(default)]
    pub tags: Vec<String>,
}

/// Creates a note on the remote service and records it in the local store.
pub struct CreateNote<'a> {
    api: &'a ApiClient,
    store: &'a NoteStore,
}

impl<'a> CreateNote<'a> {
    pub fn new(api: &'a ApiClient, store: &'a NoteStore) -> Self {
        Self { api, store }
    }
}

#[async_trait::async_trait]
impl Tool for CreateNote<'_> {
    type Input = CreateNoteInput;
    type Output = String;

    fn name(&self) -> &str {
        "create_note"
    }

    async fn run(&self, input: CreateNoteInput) -> Result<String> {
        log::info!("create_note: {} block(s)", input.paragraphs.len());

        let uploader = Uploader::new(self.api);
        let doc = DocumentConverter::new(&uploader)
            .convert(&input.paragraphs)
            .await?;

        let mut settings = json!({ "autoPublish": input.auto_publish });
        if !input.tags.is_empty() {
            settings["tags"] = json!(input.tags);
        }
        let payload = json!({ "body": doc, "settings": settings });

        let resp = self.api.post_json(API_NOTE_CREATE, &payload).await?;
        if !resp.is_ok() {
            anyhow::bail!("note create failed with status {}: {}", resp.status, resp.raw);
        }

        let note_id = resp.str_field("/noteId").unwrap_or("unknown").to_string();

        // Local record is best effort; a store failure must not fail the call.
        let content = serde_json::to_string(&input.paragraphs).unwrap_or_default();
        if let Err(e) = self.store.save(&note_id, &content, "").await {
            log::warn!("create_note: failed to record note {} locally: {}", note_id, e);
        }

        Ok(format!(
            "✅ Note created!\n\nNote ID: {}\nBlocks: {}\nAuto publish: {}\nTags: {}",
            note_id,
            input.paragraphs.len(),
            input.auto_publish,
            input.tags.join(", ")
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_input_defaults() {
        let input: CreateNoteInput = serde_json::from_value(json!({
            "paragraphs": [{"texts": [{"text": "hello"}]}]
        }))
        .unwrap();
        assert_eq!(input.paragraphs.len(), 1);
        assert!(!input.auto_publish);
        assert!(input.tags.is_empty());
    }

    #[test]
    fn test_input_with_settings() {
        let input: CreateNoteInput = serde_json::from_value(json!({
            "paragraphs": [],
            "auto_publish": true,
            "tags": ["work", "ideas"]
        }))
        .unwrap();
        assert!(input.auto_publish);
        assert_eq!(input.tags, vec!["work", "ideas"]);
    }
}
