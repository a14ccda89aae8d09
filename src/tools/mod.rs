pub mod create_note;
pub mod edit_note;
pub mod search_notes;
pub mod set_privacy;

pub use create_note::{CreateNote, CreateNoteInput};
pub use edit_note::{EditNote, EditNoteInput};
pub use search_notes::{SearchNotes, SearchNotesInput};
pub use set_privacy::{SetNotePrivacy, SetNotePrivacyInput};

use anyhow::Result;

/// Tool trait for agent-invoked operations.
///
/// Not object-safe (associated types) — intentional.
/// The server dispatches to tools by concrete type, not `dyn Tool`.
#[async_trait::async_trait]
pub trait Tool: Send + Sync {
    type Input: Send;
    type Output: Send;

    fn name(&self) -> &str;
    async fn run(&self, input: Self::Input) -> Result<Self::Output>;
}
