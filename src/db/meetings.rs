//! Meetings repository.
//!
//! One meeting row plus its participants are written in a single transaction;
//! a partial write (meeting without participants or vice versa) is never
//! observable. `filename` is unique and serves as the pipeline's idempotency
//! key.

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};

use super::Database;
use crate::domain::{Meeting, NewMeeting, Participant};

/// Lightweight projection for listings (no transcript payload)
#[derive(Debug, Clone)]
pub struct MeetingSummary {
    pub id: i64,
    pub filename: String,
    pub title: String,
    pub short_summary: String,
    pub duration_ms: u64,
    pub created_at: DateTime<Utc>,
}

impl Database {
    /// Insert a meeting and its participants atomically, returning the new
    /// meeting id
    pub fn insert_meeting(&self, record: &NewMeeting) -> Result<i64> {
        self.with_connection(|conn| {
            let tx = conn
                .transaction()
                .context("Failed to begin meeting transaction")?;

            let meeting_id = insert_meeting_impl(&tx, record)?;

            tx.commit().context("Failed to commit meeting insert")?;
            Ok(meeting_id)
        })
    }

    /// Idempotency check: has this object key already produced a meeting?
    pub fn meeting_exists(&self, filename: &str) -> Result<bool> {
        self.with_connection(|conn| {
            let count: i64 = conn
                .query_row(
                    "SELECT COUNT(*) FROM meetings WHERE filename = ?1",
                    params![filename],
                    |row| row.get(0),
                )
                .context("Failed to check meeting existence")?;
            Ok(count > 0)
        })
    }

    /// Look up a meeting by its source object key
    pub fn find_by_filename(&self, filename: &str) -> Result<Option<Meeting>> {
        self.with_connection(|conn| {
            query_meeting(
                conn,
                "SELECT id, filename, title, summary, short_summary, transcription, \
                 duration_ms, created_at FROM meetings WHERE filename = ?1",
                params![filename],
            )
        })
    }

    /// Look up a meeting by id
    pub fn get_meeting(&self, id: i64) -> Result<Option<Meeting>> {
        self.with_connection(|conn| {
            query_meeting(
                conn,
                "SELECT id, filename, title, summary, short_summary, transcription, \
                 duration_ms, created_at FROM meetings WHERE id = ?1",
                params![id],
            )
        })
    }

    /// Participants of one meeting
    pub fn participants_for(&self, meeting_id: i64) -> Result<Vec<Participant>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, name, role, meeting_id FROM participants \
                     WHERE meeting_id = ?1 ORDER BY id",
                )
                .context("Failed to prepare participants query")?;

            let rows = stmt
                .query_map(params![meeting_id], |row| {
                    Ok(Participant {
                        id: row.get(0)?,
                        name: row.get(1)?,
                        role: row.get(2)?,
                        meeting_id: row.get(3)?,
                    })
                })
                .context("Failed to query participants")?;

            let mut participants = Vec::new();
            for row in rows {
                participants.push(row.context("Failed to read participant row")?);
            }
            Ok(participants)
        })
    }

    /// Most recent meetings, newest first
    pub fn list_recent(&self, limit: usize) -> Result<Vec<MeetingSummary>> {
        self.with_connection(|conn| {
            let mut stmt = conn
                .prepare(
                    "SELECT id, filename, title, short_summary, duration_ms, created_at \
                     FROM meetings ORDER BY id DESC LIMIT ?1",
                )
                .context("Failed to prepare listing query")?;

            let rows = stmt
                .query_map(params![limit as i64], |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, String>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, i64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                })
                .context("Failed to query meetings")?;

            let mut summaries = Vec::new();
            for row in rows {
                let (id, filename, title, short_summary, duration_ms, created_at) =
                    row.context("Failed to read meeting row")?;
                summaries.push(MeetingSummary {
                    id,
                    filename,
                    title,
                    short_summary,
                    duration_ms: duration_ms.max(0) as u64,
                    created_at: parse_timestamp(&created_at)?,
                });
            }
            Ok(summaries)
        })
    }
}

fn insert_meeting_impl(conn: &Connection, record: &NewMeeting) -> Result<i64> {
    conn.execute(
        "INSERT INTO meetings (filename, title, summary, short_summary, transcription, \
         duration_ms, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        params![
            record.filename,
            record.title,
            record.summary,
            record.short_summary,
            record.transcription,
            record.duration_ms as i64,
            Utc::now().to_rfc3339(),
        ],
    )
    .context("Failed to insert meeting")?;

    let meeting_id = conn.last_insert_rowid();

    for participant in &record.participants {
        conn.execute(
            "INSERT INTO participants (name, role, meeting_id) VALUES (?1, ?2, ?3)",
            params![participant.name, participant.role, meeting_id],
        )
        .context("Failed to insert participant")?;
    }

    Ok(meeting_id)
}

fn query_meeting(
    conn: &Connection,
    sql: &str,
    params: impl rusqlite::Params,
) -> Result<Option<Meeting>> {
    let result = conn.query_row(sql, params, map_meeting_row);

    match result {
        Ok(meeting) => Ok(Some(meeting)),
        Err(rusqlite::Error::QueryReturnedNoRows) => Ok(None),
        Err(e) => Err(e).context("Failed to query meeting"),
    }
}

fn map_meeting_row(row: &Row<'_>) -> rusqlite::Result<Meeting> {
    let duration_ms: i64 = row.get(6)?;
    let created_at: String = row.get(7)?;

    Ok(Meeting {
        id: row.get(0)?,
        filename: row.get(1)?,
        title: row.get(2)?,
        summary: row.get(3)?,
        short_summary: row.get(4)?,
        transcription: row.get(5)?,
        duration_ms: duration_ms.max(0) as u64,
        created_at: DateTime::parse_from_rfc3339(&created_at)
            .map(|dt| dt.with_timezone(&Utc))
            .map_err(|e| {
                rusqlite::Error::FromSqlConversionFailure(
                    7,
                    rusqlite::types::Type::Text,
                    Box::new(e),
                )
            })?,
    })
}

fn parse_timestamp(raw: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .with_context(|| format!("Unparseable created_at timestamp: {}", raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::ParticipantEntry;

    fn sample_record(filename: &str) -> NewMeeting {
        NewMeeting {
            filename: filename.to_string(),
            title: "Weekly sync".to_string(),
            summary: "Discussed roadmap and hiring.".to_string(),
            short_summary: "Roadmap + hiring".to_string(),
            transcription: "1\n00:00:00,000 --> 00:00:02,000\nhello\n".to_string(),
            duration_ms: 1_200_000,
            participants: vec![
                ParticipantEntry {
                    name: "Ana".to_string(),
                    role: "PM".to_string(),
                },
                ParticipantEntry {
                    name: "Luis".to_string(),
                    role: "Engineer".to_string(),
                },
            ],
        }
    }

    #[test]
    fn test_insert_and_find_by_filename() {
        let db = Database::in_memory().unwrap();

        let id = db.insert_meeting(&sample_record("sync.mkv")).unwrap();
        assert!(id > 0);

        let meeting = db.find_by_filename("sync.mkv").unwrap().unwrap();
        assert_eq!(meeting.id, id);
        assert_eq!(meeting.title, "Weekly sync");
        assert_eq!(meeting.duration_ms, 1_200_000);

        let participants = db.participants_for(id).unwrap();
        assert_eq!(participants.len(), 2);
        assert_eq!(participants[0].name, "Ana");
    }

    #[test]
    fn test_meeting_exists() {
        let db = Database::in_memory().unwrap();

        assert!(!db.meeting_exists("sync.mkv").unwrap());
        db.insert_meeting(&sample_record("sync.mkv")).unwrap();
        assert!(db.meeting_exists("sync.mkv").unwrap());
    }

    #[test]
    fn test_filename_is_unique() {
        let db = Database::in_memory().unwrap();

        db.insert_meeting(&sample_record("sync.mkv")).unwrap();
        let duplicate = db.insert_meeting(&sample_record("sync.mkv"));
        assert!(duplicate.is_err());

        // The failed duplicate must not have left partial rows behind
        let count: i64 = db
            .with_connection(|conn| {
                Ok(conn.query_row("SELECT COUNT(*) FROM participants", [], |row| row.get(0))?)
            })
            .unwrap();
        assert_eq!(count, 2);
    }

    #[test]
    fn test_list_recent_newest_first() {
        let db = Database::in_memory().unwrap();

        db.insert_meeting(&sample_record("a.mkv")).unwrap();
        db.insert_meeting(&sample_record("b.mkv")).unwrap();

        let listed = db.list_recent(10).unwrap();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[0].filename, "b.mkv");
        assert_eq!(listed[1].filename, "a.mkv");
    }
}
