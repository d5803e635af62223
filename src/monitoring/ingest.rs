//! Turns successful verdicts into session events.
//!
//! Persistence here is best effort: a failed write is logged and reported in
//! the returned `Ingestion`, but the caller still gets its verdict.

use crate::{
    analysis::{Fate, Verdict},
    db::{helpers::now, Database, Event, NewEvent},
};

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::log_warn;

/// What ingestion did with a verdict.
#[derive(Debug, Clone, PartialEq)]
pub enum Ingestion {
    /// Zero confidence; never stored.
    Discarded,
    /// No session id was supplied.
    Unattached,
    Recorded(Event),
    /// The write failed and was logged.
    Failed,
}

#[derive(Clone)]
pub struct VerdictIngestor {
    db: Database,
}

impl VerdictIngestor {
    pub fn new(db: Database) -> Self {
        Self { db }
    }

    pub async fn ingest(
        &self,
        user_id: &str,
        session_id: Option<&str>,
        verdict: &Verdict,
    ) -> Ingestion {
        let Fate::Record(kind) = verdict.fate() else {
            return Ingestion::Discarded;
        };
        let Some(session_id) = session_id else {
            return Ingestion::Unattached;
        };

        let reason = verdict.reason.trim();
        let message = if reason.is_empty() {
            kind.fallback_message().to_string()
        } else {
            reason.to_string()
        };

        let event = NewEvent {
            session_id: session_id.to_string(),
            kind,
            message,
            confidence: verdict.confidence,
            created_at: now(),
        };

        match self.db.insert_event(user_id, &event).await {
            Ok(stored) => Ingestion::Recorded(stored),
            Err(err) => {
                log_warn!("Failed to save event for session {session_id}: {err:#}");
                Ingestion::Failed
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{EventKind, Session};
    use chrono::Utc;

    async fn seeded() -> (tempfile::TempDir, Database) {
        let dir = tempfile::tempdir().unwrap();
        let db = Database::new(dir.path().join("ingest.sqlite3")).unwrap();
        let now = Utc::now();
        db.insert_session(&Session {
            id: "s1".into(),
            user_id: "alice".into(),
            task: "deep work".into(),
            started_at: now,
            ended_at: None,
            focus_score: None,
            created_at: now,
            updated_at: now,
        })
        .await
        .unwrap();
        (dir, db)
    }

    fn verdict(distracted: bool, confidence: u8, reason: &str) -> Verdict {
        Verdict {
            distracted,
            confidence,
            reason: reason.into(),
            level: None,
        }
    }

    #[tokio::test]
    async fn zero_confidence_is_never_stored() {
        let (_dir, db) = seeded().await;
        let ingestor = VerdictIngestor::new(db.clone());

        for distracted in [true, false] {
            for session_id in [Some("s1"), None] {
                let outcome = ingestor
                    .ingest("alice", session_id, &verdict(distracted, 0, "rate limited"))
                    .await;
                assert_eq!(outcome, Ingestion::Discarded);
            }
        }
        assert!(db.get_events_for_session("s1").await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn successful_verdict_becomes_event() {
        let (_dir, db) = seeded().await;
        let ingestor = VerdictIngestor::new(db.clone());

        let outcome = ingestor
            .ingest("alice", Some("s1"), &verdict(true, 88, "using a phone"))
            .await;
        let Ingestion::Recorded(event) = outcome else {
            panic!("expected a recorded event, got {outcome:?}");
        };
        assert_eq!(event.kind, EventKind::Distraction);
        assert_eq!(event.message, "using a phone");
        assert_eq!(event.confidence, 88);

        let stored = db.get_events_for_session("s1").await.unwrap();
        assert_eq!(stored, vec![event]);
    }

    #[tokio::test]
    async fn empty_reason_gets_generic_message() {
        let (_dir, db) = seeded().await;
        let ingestor = VerdictIngestor::new(db);

        let Ingestion::Recorded(focus) = ingestor.ingest("alice", Some("s1"), &verdict(false, 40, "")).await else {
            panic!("focus verdict not recorded");
        };
        assert_eq!(focus.message, "Focus maintained");

        let Ingestion::Recorded(distraction) = ingestor.ingest("alice", Some("s1"), &verdict(true, 40, "  ")).await else {
            panic!("distraction verdict not recorded");
        };
        assert_eq!(distraction.message, "Distraction detected");
    }

    #[tokio::test]
    async fn missing_session_is_swallowed() {
        let (_dir, db) = seeded().await;
        let ingestor = VerdictIngestor::new(db.clone());

        let good = verdict(false, 70, "reading");
        assert_eq!(ingestor.ingest("alice", None, &good).await, Ingestion::Unattached);
        assert_eq!(ingestor.ingest("alice", Some("nope"), &good).await, Ingestion::Failed);
        assert_eq!(ingestor.ingest("bob", Some("s1"), &good).await, Ingestion::Failed);
        assert!(db.get_events_for_session("s1").await.unwrap().is_empty());
    }
}
