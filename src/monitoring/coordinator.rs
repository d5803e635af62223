use chrono::{DateTime, Utc};
use log::info;
use serde::Serialize;
use uuid::Uuid;

use crate::{
    db::{helpers::now, Database, Session, SessionWithEvents},
    error::{MonitorError, Result},
};

use super::scoring::{average_score, focus_score};

/// Number of sessions returned by `recent_sessions`.
pub const HISTORY_LIMIT: usize = 20;

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SessionStats {
    pub total_sessions: usize,
    pub avg_focus_score: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub active_session: Option<Session>,
    pub current_focus_score: u8,
    pub session_duration_seconds: u64,
}

/// Owns the session state machine: active, then ended, never back.
#[derive(Clone)]
pub struct SessionCoordinator {
    db: Database,
}

impl SessionCoordinator {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn start_session(&self, user_id: &str, task: &str) -> Result<Session> {
        let started_at = now();
        let session = Session {
            id: Uuid::new_v4().to_string(),
            user_id: user_id.to_string(),
            task: task.to_string(),
            started_at,
            ended_at: None,
            focus_score: None,
            created_at: started_at,
            updated_at: started_at,
        };

        self.db.insert_session(&session).await?;
        info!("Session {} started for user {}", session.id, user_id);
        Ok(session)
    }

    /// Freeze the score of an active session.
    pub async fn end_session(&self, user_id: &str, session_id: &str) -> Result<Session> {
        let SessionWithEvents { mut session, events } = self
            .db
            .get_session_with_events(session_id, user_id)
            .await?
            .ok_or_else(|| MonitorError::SessionNotFound(session_id.to_string()))?;

        if !session.is_active() {
            return Err(MonitorError::SessionAlreadyEnded(session_id.to_string()));
        }

        let score = focus_score(&events);
        let ended_at = now();

        // Another request may have ended it since we read it.
        if !self.db.finalize_session(session_id, ended_at, score).await? {
            return Err(MonitorError::SessionAlreadyEnded(session_id.to_string()));
        }

        session.ended_at = Some(ended_at);
        session.focus_score = Some(score);
        session.updated_at = ended_at;

        info!(
            "Session {} ended with focus score {} over {} events",
            session_id,
            score,
            events.len()
        );
        Ok(session)
    }

    pub async fn session_stats(&self, user_id: &str) -> Result<SessionStats> {
        self.session_stats_at(user_id, now()).await
    }

    /// Stats as of `now`; the live duration is measured against it.
    pub async fn session_stats_at(&self, user_id: &str, now: DateTime<Utc>) -> Result<SessionStats> {
        let ended = self.db.list_ended_sessions_for_user(user_id).await?;
        let avg_focus_score = average_score(ended.iter().filter_map(|s| s.focus_score));

        let active_session = self.db.get_active_session_for_user(user_id).await?;
        let (current_focus_score, session_duration_seconds) = match &active_session {
            Some(active) => {
                let events = self.db.get_events_for_session(&active.id).await?;
                (focus_score(&events), active.elapsed_secs(now))
            }
            None => (0, 0),
        };

        Ok(SessionStats {
            total_sessions: ended.len(),
            avg_focus_score,
            active_session,
            current_focus_score,
            session_duration_seconds,
        })
    }

    /// Most recent sessions, newest first.
    pub async fn recent_sessions(&self, user_id: &str) -> Result<Vec<Session>> {
        Ok(self.db.list_sessions_for_user(user_id, HISTORY_LIMIT).await?)
    }

    pub async fn session(&self, user_id: &str, session_id: &str) -> Result<SessionWithEvents> {
        self.db
            .get_session_with_events(session_id, user_id)
            .await?
            .ok_or_else(|| MonitorError::SessionNotFound(session_id.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EventKind, NewEvent};
    use chrono::Duration;

    async fn coordinator() -> (tempfile::TempDir, Database, SessionCoordinator) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("sessions.sqlite3")).unwrap();
        let coordinator = SessionCoordinator::new(db.clone());
        (dir, db, coordinator)
    }

    async fn record(db: &Database, user_id: &str, session_id: &str, kind: EventKind) {
        db.insert_event(
            user_id,
            &NewEvent {
                session_id: session_id.to_string(),
                kind,
                message: kind.fallback_message().to_string(),
                confidence: 75,
                created_at: Utc::now(),
            },
        )
        .await
        .unwrap();
    }

    #[tokio::test]
    async fn started_session_is_active() {
        let (_dir, _db, sessions) = coordinator().await;
        let session = sessions.start_session("alice", "write report").await.unwrap();

        assert!(session.is_active());
        assert_eq!(session.focus_score, None);
        assert_eq!(session.task, "write report");
        assert!(Uuid::parse_str(&session.id).is_ok());
    }

    #[tokio::test]
    async fn ending_without_events_scores_100() {
        let (_dir, _db, sessions) = coordinator().await;
        let session = sessions.start_session("alice", "read").await.unwrap();

        let ended = sessions.end_session("alice", &session.id).await.unwrap();
        assert_eq!(ended.focus_score, Some(100));
        assert!(ended.ended_at.is_some());
        assert!(!ended.is_active());
    }

    #[tokio::test]
    async fn ending_twice_keeps_first_score() {
        let (_dir, db, sessions) = coordinator().await;
        let session = sessions.start_session("alice", "read").await.unwrap();
        record(&db, "alice", &session.id, EventKind::Distraction).await;

        let first = sessions.end_session("alice", &session.id).await.unwrap();
        assert_eq!(first.focus_score, Some(0));

        record(&db, "alice", &session.id, EventKind::Focus).await;
        let err = sessions.end_session("alice", &session.id).await.unwrap_err();
        assert!(matches!(err, MonitorError::SessionAlreadyEnded(_)));

        let stored = sessions.session("alice", &session.id).await.unwrap();
        assert_eq!(stored.session.focus_score, Some(0));
        assert_eq!(stored.session.ended_at, first.ended_at);
    }

    #[tokio::test]
    async fn other_users_cannot_end_or_read() {
        let (_dir, _db, sessions) = coordinator().await;
        let session = sessions.start_session("alice", "read").await.unwrap();

        let err = sessions.end_session("bob", &session.id).await.unwrap_err();
        assert!(err.is_not_found());
        assert!(sessions.session("bob", &session.id).await.unwrap_err().is_not_found());
        assert!(sessions.end_session("alice", "missing").await.unwrap_err().is_not_found());
    }

    #[tokio::test]
    async fn stats_without_sessions_are_zero() {
        let (_dir, _db, sessions) = coordinator().await;
        let stats = sessions.session_stats("nobody").await.unwrap();

        assert_eq!(
            stats,
            SessionStats {
                total_sessions: 0,
                avg_focus_score: 0,
                active_session: None,
                current_focus_score: 0,
                session_duration_seconds: 0,
            }
        );
    }

    #[tokio::test]
    async fn stats_report_live_score_and_duration() {
        let (_dir, db, sessions) = coordinator().await;

        let done = sessions.start_session("alice", "one").await.unwrap();
        record(&db, "alice", &done.id, EventKind::Focus).await;
        record(&db, "alice", &done.id, EventKind::Distraction).await;
        sessions.end_session("alice", &done.id).await.unwrap(); // 50

        let also_done = sessions.start_session("alice", "two").await.unwrap();
        sessions.end_session("alice", &also_done.id).await.unwrap(); // 100

        let live = sessions.start_session("alice", "three").await.unwrap();
        for kind in [EventKind::Focus, EventKind::Focus, EventKind::Distraction] {
            record(&db, "alice", &live.id, kind).await;
        }

        let stats = sessions
            .session_stats_at("alice", live.started_at + Duration::milliseconds(90_500))
            .await
            .unwrap();
        assert_eq!(stats.total_sessions, 2);
        assert_eq!(stats.avg_focus_score, 75);
        assert_eq!(stats.current_focus_score, 67);
        assert_eq!(stats.session_duration_seconds, 90);
        assert_eq!(stats.active_session.map(|s| s.id), Some(live.id.clone()));

        let before_start = sessions
            .session_stats_at("alice", live.started_at - Duration::seconds(5))
            .await
            .unwrap();
        assert_eq!(before_start.session_duration_seconds, 0);
    }

    #[tokio::test]
    async fn history_is_newest_first_and_capped() {
        let (_dir, _db, sessions) = coordinator().await;
        let mut ids = Vec::new();
        for i in 0..(HISTORY_LIMIT + 3) {
            let session = sessions.start_session("alice", &format!("task {i}")).await.unwrap();
            ids.push(session.id);
        }
        sessions.start_session("bob", "elsewhere").await.unwrap();

        let history = sessions.recent_sessions("alice").await.unwrap();
        assert_eq!(history.len(), HISTORY_LIMIT);
        assert_eq!(history[0].id, *ids.last().unwrap());
        assert!(history.iter().all(|s| s.user_id == "alice"));
        assert!(history
            .windows(2)
            .all(|pair| pair[0].started_at >= pair[1].started_at));
    }
}
