use anyhow::{Context, Result};
use sqlx::sqlite::{SqliteConnectOptions, SqlitePool, SqliteRow};
use sqlx::Row;
use std::path::Path;
use std::str::FromStr;

/// One cached note row.
#[derive(Debug, Clone)]
pub struct NoteRecord {
    pub id: i64,
    pub note_id: String,
    pub content: String,
    pub summary: String,
    pub created_at: String,
}

/// SQLite-backed record of notes created through the tools, queried by the
/// `search_notes` tool.
pub struct NoteStore {
    pool: SqlitePool,
}

impl NoteStore {
    pub async fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                tokio::fs::create_dir_all(parent)
                    .await
                    .context("Failed to create the note database directory")?;
            }
        }

        let options = SqliteConnectOptions::from_str(&format!("sqlite://{}", path.display()))
            .context("Invalid note database path")?
            .create_if_missing(true);
        let pool = SqlitePool::connect_with(options)
            .await
            .context("Failed to open the note database")?;

        Self::init(pool).await
    }

    /// In-memory store, used by tests.
    pub async fn in_memory() -> Result<Self> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .context("Failed to open in-memory note database")?;
        Self::init(pool).await
    }

    async fn init(pool: SqlitePool) -> Result<Self> {
        sqlx::query(
            "CREATE TABLE IF NOT EXISTS notes (\
                id INTEGER PRIMARY KEY AUTOINCREMENT, \
                note_id TEXT NOT NULL, \
                content TEXT NOT NULL, \
                summary TEXT NOT NULL DEFAULT '', \
                created_at DATETIME DEFAULT CURRENT_TIMESTAMP\
            )",
        )
        .execute(&pool)
        .await
        .context("Failed to create the notes table")?;

        Ok(Self { pool })
    }

    pub async fn save(&self, note_id: &str, content: &str, summary: &str) -> Result<()> {
        if note_id.is_empty() || content.is_empty() {
            anyhow::bail!("note id and content must not be empty");
        }

        sqlx::query("INSERT INTO notes(note_id, content, summary) VALUES (?1, ?2, ?3)")
            .bind(note_id)
            .bind(content)
            .bind(summary)
            .execute(&self.pool)
            .await
            .context("Failed to save the note record")?;

        log::info!("Recorded note {} ({} bytes)", note_id, content.len());
        Ok(())
    }

    /// Notes created on one calendar day (`YYYY-MM-DD`), newest first.
    pub async fn find_by_date(&self, date: &str) -> Result<Vec<NoteRecord>> {
        let rows = sqlx::query(
            "SELECT id, note_id, content, summary, created_at FROM notes \
             WHERE DATE(created_at) = DATE(?1) ORDER BY created_at DESC",
        )
        .bind(date)
        .fetch_all(&self.pool)
        .await
        .context("Note query failed")?;

        rows.iter().map(Self::record).collect()
    }

    /// Notes created between two calendar days inclusive, newest first.
    pub async fn find_by_date_range(&self, start: &str, end: &str) -> Result<Vec<NoteRecord>> {
        let rows = sqlx::query(
            "SELECT id, note_id, content, summary, created_at FROM notes \
             WHERE DATE(created_at) BETWEEN DATE(?1) AND DATE(?2) \
             ORDER BY created_at DESC",
        )
        .bind(start)
        .bind(end)
        .fetch_all(&self.pool)
        .await
        .context("Note query failed")?;

        rows.iter().map(Self::record).collect()
    }

    fn record(row: &SqliteRow) -> Result<NoteRecord> {
        Ok(NoteRecord {
            id: row.try_get("id")?,
            note_id: row.try_get("note_id")?,
            content: row.try_get("content")?,
            summary: row.try_get("summary")?,
            created_at: row.try_get("created_at")?,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_save_and_query_range() {
        let store = NoteStore::in_memory().await.unwrap();
        store.save("n-1", "{\"texts\":[]}", "").await.unwrap();
        store.save("n-2", "{\"texts\":[]}", "a summary").await.unwrap();

        let all = store
            .find_by_date_range("2000-01-01", "3000-01-01")
            .await
            .unwrap();
        assert_eq!(all.len(), 2);
        assert!(all.iter().any(|r| r.note_id == "n-1"));
        assert_eq!(
            all.iter().find(|r| r.note_id == "n-2").unwrap().summary,
            "a summary"
        );
    }

    #[tokio::test]
    async fn test_find_by_date_no_match() {
        let store = NoteStore::in_memory().await.unwrap();
        store.save("n-1", "content", "").await.unwrap();

        let none = store.find_by_date("2000-01-01").await.unwrap();
        assert!(none.is_empty());
    }

    #[tokio::test]
    async fn test_save_rejects_empty_fields() {
        let store = NoteStore::in_memory().await.unwrap();
        assert!(store.save("", "content", "").await.is_err());
        assert!(store.save("n-1", "", "").await.is_err());
    }
}
