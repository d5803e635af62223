use anyhow::{anyhow, Result};
use chrono::{DateTime, Utc};
use rusqlite::{params, Row};

use crate::db::{
    connection::Database,
    helpers::{format_datetime, parse_datetime, parse_optional_datetime, to_u8},
    models::{Session, SessionWithEvents},
    repositories::events::query_events_for_session,
};

const SESSION_COLUMNS: &str =
    "id, user_id, task, started_at, ended_at, focus_score, created_at, updated_at";

fn row_to_session(row: &Row) -> Result<Session> {
    let started_at: String = row.get("started_at")?;
    let ended_at: Option<String> = row.get("ended_at")?;
    let focus_score: Option<i64> = row.get("focus_score")?;
    let created_at: String = row.get("created_at")?;
    let updated_at: String = row.get("updated_at")?;
    let id: String = row.get("id")?;

    let ended_at = parse_optional_datetime(ended_at, "ended_at")?;
    let focus_score = focus_score
        .map(|score| to_u8(score, "focus_score"))
        .transpose()?;
    if ended_at.is_some() != focus_score.is_some() {
        return Err(anyhow!(
            "session {id} has mismatched ended_at/focus_score columns"
        ));
    }

    Ok(Session {
        id,
        user_id: row.get("user_id")?,
        task: row.get("task")?,
        started_at: parse_datetime(&started_at, "started_at")?,
        ended_at,
        focus_score,
        created_at: parse_datetime(&created_at, "created_at")?,
        updated_at: parse_datetime(&updated_at, "updated_at")?,
    })
}

fn collect_sessions(mut rows: rusqlite::Rows<'_>) -> Result<Vec<Session>> {
    let mut sessions = Vec::new();
    while let Some(row) = rows.next()? {
        sessions.push(row_to_session(row)?);
    }
    Ok(sessions)
}

impl Database {
    pub async fn insert_session(&self, session: &Session) -> Result<()> {
        let record = session.clone();
        self.execute(move |conn| {
            conn.execute(
                "INSERT INTO sessions (id, user_id, task, started_at, ended_at, focus_score, created_at, updated_at)
                 VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
                params![
                    record.id,
                    record.user_id,
                    record.task,
                    format_datetime(&record.started_at),
                    record.ended_at.as_ref().map(format_datetime),
                    record.focus_score.map(i64::from),
                    format_datetime(&record.created_at),
                    format_datetime(&record.updated_at),
                ],
            )?;
            Ok(())
        })
        .await
    }

    /// Look up a session by id, scoped to its owner.
    pub async fn get_session_for_user(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Option<Session>> {
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1 AND user_id = ?2"
            ))?;

            let mut rows = stmt.query(params![session_id, user_id])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }

    pub async fn get_session_with_events(
        &self,
        session_id: &str,
        user_id: &str,
    ) -> Result<Option<SessionWithEvents>> {
        let session_id = session_id.to_string();
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let session = {
                let mut stmt = conn.prepare(&format!(
                    "SELECT {SESSION_COLUMNS} FROM sessions WHERE id = ?1 AND user_id = ?2"
                ))?;
                let mut rows = stmt.query(params![session_id, user_id])?;
                match rows.next()? {
                    Some(row) => row_to_session(row)?,
                    None => return Ok(None),
                }
            };

            let events = query_events_for_session(conn, &session.id)?;
            Ok(Some(SessionWithEvents { session, events }))
        })
        .await
    }

    /// Set the end timestamp and frozen score of a still-active session.
    ///
    /// Returns `false` when no active session with that id exists, so two
    /// racing end requests cannot both finalize the same row.
    pub async fn finalize_session(
        &self,
        session_id: &str,
        ended_at: DateTime<Utc>,
        focus_score: u8,
    ) -> Result<bool> {
        let session_id = session_id.to_string();
        self.execute(move |conn| {
            let rows_affected = conn.execute(
                "UPDATE sessions
                 SET ended_at = ?1,
                     focus_score = ?2,
                     updated_at = ?1
                 WHERE id = ?3 AND ended_at IS NULL",
                params![
                    format_datetime(&ended_at),
                    i64::from(focus_score),
                    session_id
                ],
            )?;
            Ok(rows_affected == 1)
        })
        .await
    }

    /// Most recent sessions of a user, newest first.
    pub async fn list_sessions_for_user(&self, user_id: &str, limit: usize) -> Result<Vec<Session>> {
        let user_id = user_id.to_string();
        let limit = limit as i64;
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE user_id = ?1
                 ORDER BY started_at DESC, rowid DESC
                 LIMIT ?2"
            ))?;

            let rows = stmt.query(params![user_id, limit])?;
            collect_sessions(rows)
        })
        .await
    }

    pub async fn list_ended_sessions_for_user(&self, user_id: &str) -> Result<Vec<Session>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE user_id = ?1 AND ended_at IS NOT NULL
                 ORDER BY started_at DESC, rowid DESC"
            ))?;

            let rows = stmt.query(params![user_id])?;
            collect_sessions(rows)
        })
        .await
    }

    /// The newest session of a user that has not been ended yet.
    pub async fn get_active_session_for_user(&self, user_id: &str) -> Result<Option<Session>> {
        let user_id = user_id.to_string();
        self.execute(move |conn| {
            let mut stmt = conn.prepare(&format!(
                "SELECT {SESSION_COLUMNS} FROM sessions
                 WHERE user_id = ?1 AND ended_at IS NULL
                 ORDER BY started_at DESC, rowid DESC
                 LIMIT 1"
            ))?;

            let mut rows = stmt.query(params![user_id])?;
            let session = match rows.next()? {
                Some(row) => Some(row_to_session(row)?),
                None => None,
            };
            Ok(session)
        })
        .await
    }
}
