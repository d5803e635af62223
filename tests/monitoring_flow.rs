use std::{collections::VecDeque, io::Cursor, sync::Arc, sync::Mutex};

use async_trait::async_trait;
use base64::{engine::general_purpose::STANDARD, Engine as _};
use flowstate_lib::{
    AudioSubmission, ClassifierError, ClassifyRequest, Database, EventKind, FrameClassifier,
    FrameSubmission, MonitorConfig, MonitorError, MonitoringService,
};

/// Replies with queued responses in order, then fails.
struct ScriptedClassifier {
    replies: Mutex<VecDeque<Result<String, ClassifierError>>>,
}

impl ScriptedClassifier {
    fn new(replies: Vec<Result<String, ClassifierError>>) -> Self {
        Self {
            replies: Mutex::new(replies.into()),
        }
    }
}

#[async_trait]
impl FrameClassifier for ScriptedClassifier {
    async fn classify(&self, _request: ClassifyRequest<'_>) -> Result<String, ClassifierError> {
        self.replies
            .lock()
            .unwrap()
            .pop_front()
            .unwrap_or_else(|| Err(ClassifierError::Transport("script exhausted".into())))
    }
}

fn monitoring(replies: Vec<Result<String, ClassifierError>>) -> (tempfile::TempDir, MonitoringService) {
    flowstate_lib::utils::logging::init();
    let dir = tempfile::tempdir().unwrap();
    let config = MonitorConfig {
        gemini_api_key: Some("server-key".into()),
        database_path: dir.path().join("flow.sqlite3"),
        ..MonitorConfig::default()
    };
    let db = Database::new(config.database_path.clone()).unwrap();
    let service =
        MonitoringService::with_classifier(&config, Arc::new(ScriptedClassifier::new(replies)), db);
    (dir, service)
}

fn frame(session_id: &str, timestamp: &str) -> FrameSubmission {
    FrameSubmission {
        image: format!("data:image/png;base64,{}", STANDARD.encode(b"\x89PNG\r\n\x1a\nrest")),
        timestamp: timestamp.into(),
        api_key: None,
        model: None,
        session_id: Some(session_id.into()),
    }
}

/// Half-scale square wave: RMS 0.5, well above the noise threshold.
fn loud_wav() -> String {
    let spec = hound::WavSpec {
        channels: 1,
        sample_rate: 16_000,
        bits_per_sample: 16,
        sample_format: hound::SampleFormat::Int,
    };
    let mut cursor = Cursor::new(Vec::new());
    {
        let mut writer = hound::WavWriter::new(&mut cursor, spec).unwrap();
        for i in 0..1600 {
            let sample: i16 = if i % 2 == 0 { 16_384 } else { -16_384 };
            writer.write_sample(sample).unwrap();
        }
        writer.finalize().unwrap();
    }
    STANDARD.encode(cursor.into_inner())
}

fn focused(reason: &str) -> Result<String, ClassifierError> {
    Ok(format!(
        "```json\n{{\"distracted\": false, \"confidence\": 85, \"reason\": \"{reason}\"}}\n```"
    ))
}

#[tokio::test]
async fn session_scores_two_focus_and_one_distraction_as_67() {
    let (_dir, service) = monitoring(vec![
        focused("typing"),
        Err(ClassifierError::Status {
            status: 429,
            message: "Resource has been exhausted".into(),
        }),
        focused("reading"),
    ]);

    let session = service.start_session("alice", "write the report").await.unwrap();

    let first = service.process_frame("alice", &frame(&session.id, "t1")).await;
    assert_eq!(first.verdict.confidence, 85);

    let limited = service.process_frame("alice", &frame(&session.id, "t2")).await;
    assert_eq!(limited.verdict.reason, "rate limited");
    assert_eq!(limited.verdict.confidence, 0);

    let second = service.process_frame("alice", &frame(&session.id, "t3")).await;
    assert_eq!(second.verdict.reason, "reading");

    let noise = service
        .process_audio(
            "alice",
            &AudioSubmission {
                audio: loud_wav(),
                timestamp: "t4".into(),
                session_id: Some(session.id.clone()),
            },
        )
        .await;
    assert!(noise.verdict.distracted);
    assert_eq!(noise.verdict.confidence, 100);
    assert_eq!(noise.verdict.reason, "high ambient noise over 100 ms");

    let live = service.session_stats("alice").await.unwrap();
    assert_eq!(live.current_focus_score, 67);
    assert_eq!(live.total_sessions, 0);
    assert_eq!(live.active_session.as_ref().map(|s| s.id.as_str()), Some(session.id.as_str()));

    let ended = service.end_session("alice", &session.id).await.unwrap();
    assert_eq!(ended.focus_score, Some(67));
    assert!(ended.ended_at.is_some());

    let detail = service.session("alice", &session.id).await.unwrap();
    let kinds: Vec<EventKind> = detail.events.iter().map(|e| e.kind).collect();
    assert_eq!(
        kinds,
        vec![EventKind::Focus, EventKind::Focus, EventKind::Distraction]
    );
    assert!(!detail.session.is_active());

    let stats = service.session_stats("alice").await.unwrap();
    assert_eq!(stats.total_sessions, 1);
    assert_eq!(stats.avg_focus_score, 67);
    assert!(stats.active_session.is_none());
    assert_eq!(stats.current_focus_score, 0);
    assert_eq!(stats.session_duration_seconds, 0);
}

#[tokio::test]
async fn ended_session_cannot_be_ended_again() {
    let (_dir, service) = monitoring(Vec::new());
    let session = service.start_session("alice", "plan").await.unwrap();

    let ended = service.end_session("alice", &session.id).await.unwrap();
    assert_eq!(ended.focus_score, Some(100));

    let err = service.end_session("alice", &session.id).await.unwrap_err();
    assert!(matches!(err, MonitorError::SessionAlreadyEnded(id) if id == session.id));
}

#[tokio::test]
async fn sessions_are_private_to_their_owner() {
    let (_dir, service) = monitoring(vec![focused("typing")]);
    let session = service.start_session("alice", "plan").await.unwrap();

    // Bob's verdict is returned to him but never lands in Alice's session.
    let result = service.process_frame("bob", &frame(&session.id, "t1")).await;
    assert_eq!(result.verdict.confidence, 85);

    assert!(service.end_session("bob", &session.id).await.unwrap_err().is_not_found());
    assert!(service.user_sessions("bob").await.unwrap().is_empty());

    let detail = service.session("alice", &session.id).await.unwrap();
    assert!(detail.events.is_empty());
}

#[tokio::test]
async fn history_lists_newest_first() {
    let (_dir, service) = monitoring(Vec::new());
    let first = service.start_session("alice", "first").await.unwrap();
    service.end_session("alice", &first.id).await.unwrap();
    let second = service.start_session("alice", "second").await.unwrap();

    let history = service.user_sessions("alice").await.unwrap();
    let ids: Vec<&str> = history.iter().map(|s| s.id.as_str()).collect();
    assert_eq!(ids, vec![second.id.as_str(), first.id.as_str()]);
    assert_eq!(history[1].focus_score, Some(100));
    assert_eq!(history[0].focus_score, None);
}
