//! Meeting record persistence.
//!
//! One row per processing attempt. The outcome is a tagged variant so a
//! success never shares columns with a failure diagnostic: a record is
//! `in_flight` until exactly one terminal transition lands, and the
//! terminal updates are conditional on the row still being in flight.

use anyhow::{Context, Result};
use rusqlite::{params, Connection, Row};
use serde::{Deserialize, Serialize};

/// Terminal or in-flight outcome of one processing attempt.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum MeetingOutcome {
    InFlight,
    Success {
        summary_path: String,
        transcript_path: String,
    },
    Failed {
        reason: String,
    },
}

impl MeetingOutcome {
    pub fn is_terminal(&self) -> bool {
        !matches!(self, MeetingOutcome::InFlight)
    }
}

/// A meeting record from the database.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MeetingRecord {
    pub id: i64,
    pub meet_link: String,
    pub user_email: String,
    pub start_time: String,
    pub end_time: Option<String>,
    #[serde(flatten)]
    pub outcome: MeetingOutcome,
}

const STATUS_IN_FLIGHT: &str = "in_flight";
const STATUS_SUCCESS: &str = "success";
const STATUS_ERROR: &str = "error";

const SELECT_COLUMNS: &str =
    "id, meet_link, user_email, status, start_time, end_time, summary_path, transcript_path, error";

/// Repository for meeting records. The pipeline is the only writer.
pub struct MeetingRepository;

impl MeetingRepository {
    /// Insert a new in-flight record. Returns the new meeting ID
    /// (AUTOINCREMENT, so ids are unique and monotonically increasing).
    pub fn insert(
        conn: &Connection,
        meet_link: &str,
        user_email: &str,
        start_time: &str,
    ) -> Result<i64> {
        conn.execute(
            "INSERT INTO meetings (meet_link, user_email, status, start_time) \
             VALUES (?1, ?2, ?3, ?4)",
            params![meet_link, user_email, STATUS_IN_FLIGHT, start_time],
        )
        .context("Failed to insert meeting")?;

        Ok(conn.last_insert_rowid())
    }

    /// Mark an attempt as succeeded. Returns false when the record was
    /// already terminal; the existing outcome is left untouched.
    pub fn complete_success(
        conn: &Connection,
        id: i64,
        end_time: &str,
        summary_path: &str,
        transcript_path: &str,
    ) -> Result<bool> {
        let changed = conn
            .execute(
                "UPDATE meetings SET status = ?1, end_time = ?2, summary_path = ?3, \
                 transcript_path = ?4 WHERE id = ?5 AND status = ?6",
                params![
                    STATUS_SUCCESS,
                    end_time,
                    summary_path,
                    transcript_path,
                    id,
                    STATUS_IN_FLIGHT,
                ],
            )
            .context("Failed to complete meeting")?;

        Ok(changed > 0)
    }

    /// Mark an attempt as failed with the failure's message. Same
    /// in-flight guard as `complete_success`.
    pub fn complete_error(conn: &Connection, id: i64, end_time: &str, reason: &str) -> Result<bool> {
        let changed = conn
            .execute(
                "UPDATE meetings SET status = ?1, end_time = ?2, error = ?3 \
                 WHERE id = ?4 AND status = ?5",
                params![STATUS_ERROR, end_time, reason, id, STATUS_IN_FLIGHT],
            )
            .context("Failed to mark meeting as failed")?;

        Ok(changed > 0)
    }

    /// Get a meeting by ID.
    pub fn get(conn: &Connection, id: i64) -> Result<Option<MeetingRecord>> {
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM meetings WHERE id = ?1"
            ))
            .context("Failed to prepare meeting query")?;

        let mut rows = stmt
            .query_map(params![id], record_from_row)
            .context("Failed to query meeting")?;

        match rows.next() {
            Some(Ok(record)) => Ok(Some(record)),
            Some(Err(e)) => Err(e.into()),
            None => Ok(None),
        }
    }

    /// List meetings ordered by start time, newest first.
    pub fn list(conn: &Connection, limit: Option<usize>) -> Result<Vec<MeetingRecord>> {
        let limit = limit.map(|l| l as i64).unwrap_or(-1);
        let mut stmt = conn
            .prepare(&format!(
                "SELECT {SELECT_COLUMNS} FROM meetings \
                 ORDER BY start_time DESC, id DESC LIMIT ?1"
            ))
            .context("Failed to prepare meetings list query")?;

        let rows = stmt
            .query_map(params![limit], record_from_row)
            .context("Failed to list meetings")?;

        let mut meetings = Vec::new();
        for row in rows {
            meetings.push(row?);
        }

        Ok(meetings)
    }
}

fn record_from_row(row: &Row) -> rusqlite::Result<MeetingRecord> {
    let status: String = row.get(3)?;
    let summary_path: Option<String> = row.get(6)?;
    let transcript_path: Option<String> = row.get(7)?;
    let error: Option<String> = row.get(8)?;

    let outcome = match status.as_str() {
        STATUS_SUCCESS => MeetingOutcome::Success {
            summary_path: summary_path.unwrap_or_default(),
            transcript_path: transcript_path.unwrap_or_default(),
        },
        STATUS_ERROR => MeetingOutcome::Failed {
            reason: error.unwrap_or_default(),
        },
        _ => MeetingOutcome::InFlight,
    };

    Ok(MeetingRecord {
        id: row.get(0)?,
        meet_link: row.get(1)?,
        user_email: row.get(2)?,
        start_time: row.get(4)?,
        end_time: row.get(5)?,
        outcome,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::migrate;

    fn setup_db() -> Connection {
        let conn = Connection::open_in_memory().unwrap();
        migrate(&conn).unwrap();
        conn
    }

    fn insert(conn: &Connection, start_time: &str) -> i64 {
        MeetingRepository::insert(conn, "https://meet/x", "a@b.com", start_time).unwrap()
    }

    #[test]
    fn test_insert_returns_monotonic_ids() {
        let conn = setup_db();
        let first = insert(&conn, "2025-01-01T10:00:00Z");
        let second = insert(&conn, "2025-01-01T11:00:00Z");
        assert!(second > first);
    }

    #[test]
    fn test_insert_starts_in_flight() {
        let conn = setup_db();
        let id = insert(&conn, "2025-01-01T10:00:00Z");

        let record = MeetingRepository::get(&conn, id).unwrap().unwrap();
        assert_eq!(record.outcome, MeetingOutcome::InFlight);
        assert_eq!(record.meet_link, "https://meet/x");
        assert_eq!(record.user_email, "a@b.com");
        assert!(record.end_time.is_none());
    }

    #[test]
    fn test_get_nonexistent_meeting() {
        let conn = setup_db();
        assert!(MeetingRepository::get(&conn, 9999).unwrap().is_none());
    }

    #[test]
    fn test_complete_success() {
        let conn = setup_db();
        let id = insert(&conn, "2025-01-01T10:00:00Z");

        let applied = MeetingRepository::complete_success(
            &conn,
            id,
            "2025-01-01T10:05:00Z",
            "summaries/meeting_1.txt",
            "transcripts/meeting_1.txt",
        )
        .unwrap();
        assert!(applied);

        let record = MeetingRepository::get(&conn, id).unwrap().unwrap();
        assert_eq!(record.end_time.as_deref(), Some("2025-01-01T10:05:00Z"));
        assert_eq!(
            record.outcome,
            MeetingOutcome::Success {
                summary_path: "summaries/meeting_1.txt".into(),
                transcript_path: "transcripts/meeting_1.txt".into(),
            }
        );
    }

    #[test]
    fn test_complete_error() {
        let conn = setup_db();
        let id = insert(&conn, "2025-01-01T10:00:00Z");

        let applied =
            MeetingRepository::complete_error(&conn, id, "2025-01-01T10:05:00Z", "dispatch failed")
                .unwrap();
        assert!(applied);

        let record = MeetingRepository::get(&conn, id).unwrap().unwrap();
        assert!(record.end_time.is_some());
        assert_eq!(
            record.outcome,
            MeetingOutcome::Failed {
                reason: "dispatch failed".into()
            }
        );
    }

    #[test]
    fn test_completion_is_at_most_once() {
        let conn = setup_db();
        let id = insert(&conn, "2025-01-01T10:00:00Z");

        assert!(MeetingRepository::complete_success(
            &conn,
            id,
            "2025-01-01T10:05:00Z",
            "summaries/meeting_1.txt",
            "transcripts/meeting_1.txt",
        )
        .unwrap());

        // A racing error completion must not revert a terminal record.
        let applied =
            MeetingRepository::complete_error(&conn, id, "2025-01-01T10:06:00Z", "too late")
                .unwrap();
        assert!(!applied);

        let record = MeetingRepository::get(&conn, id).unwrap().unwrap();
        assert!(matches!(record.outcome, MeetingOutcome::Success { .. }));
        assert_eq!(record.end_time.as_deref(), Some("2025-01-01T10:05:00Z"));
    }

    #[test]
    fn test_list_orders_by_start_time_desc() {
        let conn = setup_db();

        // Insertion order deliberately disagrees with start_time order.
        let mid = insert(&conn, "2025-01-02T10:00:00Z");
        let newest = insert(&conn, "2025-01-03T10:00:00Z");
        let oldest = insert(&conn, "2025-01-01T10:00:00Z");

        let meetings = MeetingRepository::list(&conn, None).unwrap();
        let ids: Vec<i64> = meetings.iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![newest, mid, oldest]);
    }

    #[test]
    fn test_list_limit() {
        let conn = setup_db();
        for hour in 10..15 {
            insert(&conn, &format!("2025-01-01T{hour}:00:00Z"));
        }

        assert_eq!(MeetingRepository::list(&conn, Some(2)).unwrap().len(), 2);
        assert_eq!(MeetingRepository::list(&conn, None).unwrap().len(), 5);
    }

    #[test]
    fn test_no_deduplication() {
        let conn = setup_db();
        let first = insert(&conn, "2025-01-01T10:00:00Z");
        let second = insert(&conn, "2025-01-01T10:00:00Z");

        assert_ne!(first, second);
        assert_eq!(MeetingRepository::list(&conn, None).unwrap().len(), 2);
    }
}
