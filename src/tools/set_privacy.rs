use anyhow::Result;
use serde::Deserialize;
use serde_json::json;

use super::Tool;
use crate::api::{ApiClient, API_NOTE_SET};

/// Note visibility mode.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PrivacyKind {
    Public,
    Private,
    /// Public under a rule: optionally unsharable, optionally expiring.
    Rule,
}

impl PrivacyKind {
    fn as_str(self) -> &'static str {
        match self {
            PrivacyKind::Public => "public",
            PrivacyKind::Private => "private",
            PrivacyKind::Rule => "rule",
        }
    }
}

/// Input for the `set_note_privacy` tool.
#[derive(Debug, Deserialize)]
pub struct SetNotePrivacyInput {
    pub note_id: String,
    pub privacy_type: PrivacyKind,
    #[serde(default)]
    pub no_share: bool,
    /// Unix timestamp; 0 means the rule never expires.
    #[serde(default)]
    pub expire_at: i64,
}

/// Sets the privacy mode of an existing note.
pub struct SetNotePrivacy<'a> {
    api: &'a ApiClient,
}

impl<'a> SetNotePrivacy<'a> {
    pub fn new(api: &'a ApiClient) -> Self {
        Self { api }
    }
}

#[async_trait::async_trait]
impl Tool for SetNotePrivacy<'_> {
    type Input = SetNotePrivacyInput;
    type Output = String;

    fn name(&self) -> &str {
        "set_note_privacy"
    }

    async fn run(&self, input: SetNotePrivacyInput) -> Result<String> {
        if input.note_id.is_empty() {
            anyhow::bail!("note_id must not be empty");
        }
        log::info!(
            "set_note_privacy: {} -> {}",
            input.note_id,
            input.privacy_type.as_str()
        );

        let mut privacy = json!({ "type": input.privacy_type.as_str() });
        if input.privacy_type == PrivacyKind::Rule {
            // The service expects the expiry as a stringified timestamp.
            privacy["rule"] = json!({
                "noShare": input.no_share,
                "expireAt": input.expire_at.to_string(),
            });
        }

        let payload = json!({
            "noteId": input.note_id,
            "section": 1,
            "settings": { "privacy": privacy },
        });

        let resp = self.api.post_json(API_NOTE_SET, &payload).await?;
        if !resp.is_ok() {
            anyhow::bail!(
                "privacy update failed with status {}: {}",
                resp.status,
                resp.raw
            );
        }

        let mut text = format!(
            "✅ Privacy updated!\n\nNote ID: {}\nMode: {}",
            input.note_id,
            input.privacy_type.as_str()
        );
        if input.privacy_type == PrivacyKind::Rule {
            text.push_str(&format!("\nSharing blocked: {}", input.no_share));
            if input.expire_at == 0 {
                text.push_str("\nExpires: never");
            } else {
                text.push_str(&format!("\nExpires at: {}", input.expire_at));
            }
        }
        Ok(text)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_privacy_kind_parsing() {
        let input: SetNotePrivacyInput = serde_json::from_value(json!({
            "note_id": "n-1",
            "privacy_type": "rule",
            "no_share": true,
            "expire_at": 1735689600
        }))
        .unwrap();
        assert_eq!(input.privacy_type, PrivacyKind::Rule);
        assert!(input.no_share);
        assert_eq!(input.expire_at, 1735689600);
    }

    #[test]
    fn test_unknown_privacy_kind_rejected() {
        let parsed: Result<SetNotePrivacyInput, _> = serde_json::from_value(json!({
            "note_id": "n-1",
            "privacy_type": "friends-only"
        }));
        assert!(parsed.is_err());
    }

    #[test]
    fn test_rule_fields_default() {
        let input: SetNotePrivacyInput = serde_json::from_value(json!({
            "note_id": "n-1",
            "privacy_type": "private"
        }))
        .unwrap();
        assert!(!input.no_share);
        assert_eq!(input.expire_at, 0);
    }
}
