use anyhow::Result;
use chrono::{Datelike, Duration, Local, NaiveDate};
use serde::Deserialize;

use super::Tool;
use crate::store::NoteStore;

/// Time window selector for note queries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum QueryKind {
    #[default]
    Today,
    Yesterday,
    SpecificDate,
    DateRange,
    ThisWeek,
    LastWeek,
    ThisMonth,
    LastMonth,
}

/// Input for the `search_notes` tool. Dates are `YYYY-MM-DD`.
#[derive(Debug, Deserialize)]
pub struct SearchNotesInput {
    #[serde(default)]
    pub query_type: QueryKind,
    pub specific_date: Option<String>,
    pub start_date: Option<String>,
    pub end_date: Option<String>,
}

/// Queries the local note store by creation time.
pub struct SearchNotes<'a> {
    store: &'a NoteStore,
}

impl<'a> SearchNotes<'a> {
    pub fn new(store: &'a NoteStore) -> Self {
        Self { store }
    }
}

#[async_trait::async_trait]
impl Tool for SearchNotes<'_> {
    type Input = SearchNotesInput;
    type Output = String;

    fn name(&self) -> &str {
        "search_notes"
    }

    async fn run(&self, input: SearchNotesInput) -> Result<String> {
        let today = Local::now().date_naive();
        log::info!("search_notes: {:?}", input.query_type);

        let records = match input.query_type {
            QueryKind::Today => self.store.find_by_date(&today.to_string()).await?,
            QueryKind::Yesterday => {
                let yesterday = today - Duration::days(1);
                self.store.find_by_date(&yesterday.to_string()).await?
            }
            QueryKind::SpecificDate => {
                let date = input.specific_date.unwrap_or_else(|| today.to_string());
                self.store.find_by_date(&date).await?
            }
            QueryKind::DateRange => {
                let (Some(start), Some(end)) = (input.start_date, input.end_date) else {
                    anyhow::bail!("date_range queries need start_date and end_date");
                };
                self.store.find_by_date_range(&start, &end).await?
            }
            kind => {
                let (start, end) = calendar_range(kind, today);
                self.store
                    .find_by_date_range(&start.to_string(), &end.to_string())
                    .await?
            }
        };

        if records.is_empty() {
            return Ok("📝 No notes found for that period.".to_string());
        }

        let mut out = format!("📝 Found {} note(s):\n\n", records.len());
        for (i, note) in records.iter().enumerate() {
            out.push_str(&format!("**{}. Note {}**\n", i + 1, note.note_id));
            out.push_str(&format!("Created: {}\n", note.created_at));

            let preview: String = note.content.chars().take(100).collect();
            if note.content.chars().count() > 100 {
                out.push_str(&format!("Content: {}...\n", preview));
            } else {
                out.push_str(&format!("Content: {}\n", preview));
            }

            if !note.summary.is_empty() {
                out.push_str(&format!("Summary: {}\n", note.summary));
            }
            out.push('\n');
        }

        Ok(out)
    }
}

/// Resolve a calendar window to inclusive start/end dates. Weeks run
/// Monday to Sunday.
fn calendar_range(kind: QueryKind, today: NaiveDate) -> (NaiveDate, NaiveDate) {
    match kind {
        QueryKind::ThisWeek => {
            let start = today - Duration::days(today.weekday().num_days_from_monday() as i64);
            (start, start + Duration::days(6))
        }
        QueryKind::LastWeek => {
            let this_monday =
                today - Duration::days(today.weekday().num_days_from_monday() as i64);
            let start = this_monday - Duration::days(7);
            (start, start + Duration::days(6))
        }
        QueryKind::ThisMonth => {
            let start = today.with_day(1).unwrap_or(today);
            (start, end_of_month(start))
        }
        QueryKind::LastMonth => {
            let first_of_this = today.with_day(1).unwrap_or(today);
            let last_of_prev = first_of_this - Duration::days(1);
            let start = last_of_prev.with_day(1).unwrap_or(last_of_prev);
            (start, last_of_prev)
        }
        _ => (today, today),
    }
}

fn end_of_month(first: NaiveDate) -> NaiveDate {
    let next_first = if first.month() == 12 {
        NaiveDate::from_ymd_opt(first.year() + 1, 1, 1)
    } else {
        NaiveDate::from_ymd_opt(first.year(), first.month() + 1, 1)
    };
    next_first.map(|d| d - Duration::days(1)).unwrap_or(first)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn test_this_week_is_monday_to_sunday() {
        // 2024-05-15 is a Wednesday
        let (start, end) = calendar_range(QueryKind::ThisWeek, date(2024, 5, 15));
        assert_eq!(start, date(2024, 5, 13));
        assert_eq!(end, date(2024, 5, 19));
    }

    #[test]
    fn test_this_week_on_a_sunday() {
        // 2024-05-19 is a Sunday; the week should not roll forward
        let (start, end) = calendar_range(QueryKind::ThisWeek, date(2024, 5, 19));
        assert_eq!(start, date(2024, 5, 13));
        assert_eq!(end, date(2024, 5, 19));
    }

    #[test]
    fn test_last_week() {
        let (start, end) = calendar_range(QueryKind::LastWeek, date(2024, 5, 15));
        assert_eq!(start, date(2024, 5, 6));
        assert_eq!(end, date(2024, 5, 12));
    }

    #[test]
    fn test_this_month() {
        let (start, end) = calendar_range(QueryKind::ThisMonth, date(2024, 2, 10));
        assert_eq!(start, date(2024, 2, 1));
        assert_eq!(end, date(2024, 2, 29));
    }

    #[test]
    fn test_last_month_across_year_boundary() {
        let (start, end) = calendar_range(QueryKind::LastMonth, date(2024, 1, 20));
        assert_eq!(start, date(2023, 12, 1));
        assert_eq!(end, date(2023, 12, 31));
    }

    #[test]
    fn test_end_of_month_december() {
        assert_eq!(end_of_month(date(2023, 12, 1)), date(2023, 12, 31));
    }

    #[test]
    fn test_query_kind_default() {
        let input: SearchNotesInput = serde_json::from_value(json!({})).unwrap();
        assert_eq!(input.query_type, QueryKind::Today);

        let input: SearchNotesInput =
            serde_json::from_value(json!({"query_type": "last_week"})).unwrap();
        assert_eq!(input.query_type, QueryKind::LastWeek);
    }
}
