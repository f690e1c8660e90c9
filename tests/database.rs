//! Persistence Integration Tests
//!
//! The meeting insert is the one place the pipeline needs atomicity from the
//! store: a meeting without its participants (or the reverse) must never be
//! observable, and `filename` is the idempotency key.

use recapd::db::Database;
use recapd::domain::{NewMeeting, ParticipantEntry};
use rusqlite::params;
use tempfile::TempDir;

fn sample_record(filename: &str) -> NewMeeting {
    NewMeeting {
        filename: filename.to_string(),
        title: "Architecture review".to_string(),
        summary: "Reviewed the ingestion pipeline design.".to_string(),
        short_summary: "Pipeline design review".to_string(),
        transcription: "1\n00:00:00,000 --> 00:00:03,000\nhello\n".to_string(),
        duration_ms: 2_700_000,
        participants: vec![
            ParticipantEntry {
                name: "Mara".to_string(),
                role: "Architect".to_string(),
            },
            ParticipantEntry {
                name: "Jon".to_string(),
                role: "Engineer".to_string(),
            },
        ],
    }
}

fn row_counts(db: &Database) -> (i64, i64) {
    db.with_connection(|conn| {
        let meetings: i64 = conn.query_row("SELECT COUNT(*) FROM meetings", [], |r| r.get(0))?;
        let participants: i64 =
            conn.query_row("SELECT COUNT(*) FROM participants", [], |r| r.get(0))?;
        Ok((meetings, participants))
    })
    .unwrap()
}

#[test]
fn test_meeting_and_participants_committed_together() {
    let db = Database::in_memory().unwrap();

    let id = db.insert_meeting(&sample_record("review.mkv")).unwrap();

    assert_eq!(row_counts(&db), (1, 2));

    let participants = db.participants_for(id).unwrap();
    assert_eq!(participants.len(), 2);
    assert!(participants.iter().all(|p| p.meeting_id == id));
}

#[test]
fn test_failure_between_inserts_rolls_everything_back() {
    let db = Database::in_memory().unwrap();
    let record = sample_record("review.mkv");

    // Replay the writer's sequence, but inject a failure after the meeting
    // insert and before any participant insert.
    let result: anyhow::Result<()> = db.with_connection(|conn| {
        let tx = conn.transaction()?;

        tx.execute(
            "INSERT INTO meetings (filename, title, summary, short_summary, transcription, \
             duration_ms, created_at) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
            params![
                record.filename,
                record.title,
                record.summary,
                record.short_summary,
                record.transcription,
                record.duration_ms as i64,
                chrono::Utc::now().to_rfc3339(),
            ],
        )?;

        // Simulated failure: the transaction is dropped without commit
        anyhow::bail!("injected failure before participant insert")
    });

    assert!(result.is_err());
    assert_eq!(row_counts(&db), (0, 0));
}

#[test]
fn test_filename_unique_constraint_guards_duplicates() {
    let db = Database::in_memory().unwrap();

    db.insert_meeting(&sample_record("review.mkv")).unwrap();
    assert!(db.insert_meeting(&sample_record("review.mkv")).is_err());

    // The failed insert left nothing behind
    assert_eq!(row_counts(&db), (1, 2));
}

#[test]
fn test_idempotency_lookup_by_filename() {
    let db = Database::in_memory().unwrap();

    assert!(db.find_by_filename("review.mkv").unwrap().is_none());
    assert!(!db.meeting_exists("review.mkv").unwrap());

    db.insert_meeting(&sample_record("review.mkv")).unwrap();

    assert!(db.meeting_exists("review.mkv").unwrap());
    let meeting = db.find_by_filename("review.mkv").unwrap().unwrap();
    assert_eq!(meeting.title, "Architecture review");
    assert_eq!(meeting.duration_ms, 2_700_000);
}

#[test]
fn test_meeting_without_participants_is_valid() {
    let db = Database::in_memory().unwrap();

    let record = NewMeeting {
        participants: vec![],
        ..sample_record("solo.mkv")
    };

    let id = db.insert_meeting(&record).unwrap();
    assert!(db.participants_for(id).unwrap().is_empty());
}

#[test]
fn test_database_persists_across_reopen() {
    let dir = TempDir::new().unwrap();
    let db_path = dir.path().join("meetings.db");

    {
        let db = Database::open(&db_path).unwrap();
        db.insert_meeting(&sample_record("review.mkv")).unwrap();
    }

    let db = Database::open(&db_path).unwrap();
    assert!(db.meeting_exists("review.mkv").unwrap());
}
