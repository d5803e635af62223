use anyhow::{bail, Result};
use rusqlite::{params, Connection, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_event_kind, to_u8},
    models::{Event, NewEvent},
};

fn row_to_event(row: &Row) -> Result<Event> {
    let kind: String = row.get("kind")?;
    let confidence: i64 = row.get("confidence")?;
    let created_at: String = row.get("created_at")?;

    Ok(Event {
        id: row.get("id")?,
        session_id: row.get("session_id")?,
        kind: parse_event_kind(&kind)?,
        message: row.get("message")?,
        confidence: to_u8(confidence, "confidence")?,
        created_at: parse_datetime(&created_at, "created_at")?,
    })
}

pub(crate) fn query_events_for_session(conn: &Connection, session_id: &str) -> Result<Vec<Event>> {
    let mut stmt = conn.prepare(
        "SELECT id, session_id, kind, message, confidence, created_at
         FROM events
         WHERE session_id = ?1
         ORDER BY created_at ASC, id ASC",
    )?;

    let mut rows = stmt.query(params![session_id])?;
    let mut events = Vec::new();
    while let Some(row) = rows.next()? {
        events.push(row_to_event(row)?);
    }
    Ok(events)
}

impl Database {
    /// Append an event to a session owned by `user_id`.
    ///
    /// Fails when the session does not exist or belongs to someone else.
    /// Ended sessions still accept events.
    pub async fn insert_event(&self, user_id: &str, event: &NewEvent) -> Result<Event> {
        let user_id = user_id.to_string();
        let record = event.clone();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "INSERT INTO events (session_id, kind, message, confidence, created_at)
                 SELECT ?1, ?2, ?3, ?4, ?5
                 WHERE EXISTS (SELECT 1 FROM sessions WHERE id = ?1 AND user_id = ?6)",
                params![
                    record.session_id,
                    record.kind.as_str(),
                    record.message,
                    i64::from(record.confidence),
                    format_datetime(&record.created_at),
                    user_id,
                ],
            )?;

            if rows_affected == 0 {
                bail!(
                    "session {} not found for user {}",
                    record.session_id,
                    user_id
                );
            }

            Ok(Event {
                id: conn.last_insert_rowid(),
                session_id: record.session_id,
                kind: record.kind,
                message: record.message,
                confidence: record.confidence,
                created_at: record.created_at,
            })
        })
        .await
    }

    pub async fn get_events_for_session(&self, session_id: &str) -> Result<Vec<Event>> {
        let session_id = session_id.to_string();
        self.execute(move |conn| query_events_for_session(conn, &session_id))
            .await
    }
}
