//! Cassette record/replay tests: full sessions are recorded through the
//! server surface, then re-driven hermetically from the cassette alone.

use std::fs;
use std::path::PathBuf;
use std::sync::Arc;

use prompter_core::script::{
    AutoStep, JsonMap, JudgmentStep, ScriptRegistry, Step, StepInput, StepSequence,
};
use prompter_core::vcr::cassette::{Cassette, CassetteError, InitialState};
use prompter_core::vcr::{replay_cassette, VcrServer};
use prompter_core::{EngineError, ScriptLoader};

/// Touches a marker file, then asks for confirmation.
struct MarkerScript {
    state: u8,
}

impl StepSequence for MarkerScript {
    fn advance(&mut self, _input: Option<StepInput>) -> Option<Step> {
        self.state += 1;
        match self.state {
            1 => Some(Step::Auto(AutoStep::shell(
                "touch marker.txt",
                "Leave a marker file",
            ))),
            2 => Some(Step::judgment(JudgmentStep::new(
                "Confirm the marker file looks right.",
            ))),
            _ => None,
        }
    }
}

fn test_loader() -> Arc<dyn ScriptLoader> {
    let mut registry = ScriptRegistry::with_builtins();
    registry.register_compiled("t/marker", "# Marker", |_| Box::new(MarkerScript { state: 0 }));
    Arc::new(registry)
}

struct Session {
    _dir: tempfile::TempDir,
    cassette: PathBuf,
    work: PathBuf,
}

/// Record a full marker-script session and return its artifacts.
async fn record_marker_session() -> Session {
    let dir = tempfile::tempdir().unwrap();
    let cassette = dir.path().join("session.yaml");
    let work = dir.path().join("work");
    fs::create_dir(&work).unwrap();

    let server = VcrServer::record(
        Cassette::record(&cassette, InitialState::new(work.display().to_string())),
        test_loader(),
    )
    .unwrap();

    let response = server.start("t/marker", "", None).await.unwrap();
    assert!(response.contains("Judgment Step"));
    let response = server.continue_script(JsonMap::new()).await.unwrap();
    assert!(response.contains("All Steps Completed"));

    Session {
        _dir: dir,
        cassette,
        work,
    }
}

#[tokio::test]
async fn replay_is_hermetic_and_has_no_side_effects() {
    let session = record_marker_session().await;
    let marker = session.work.join("marker.txt");
    assert!(marker.exists(), "recording runs the real command");
    fs::remove_file(&marker).unwrap();

    replay_cassette(&session.cassette, test_loader())
        .await
        .unwrap();
    assert!(!marker.exists(), "replay must not touch the real system");
}

#[tokio::test]
async fn random_session_replays_deterministically() {
    let dir = tempfile::tempdir().unwrap();
    let cassette = dir.path().join("guess.yaml");
    let work = dir.path().to_path_buf();

    let server = VcrServer::record(
        Cassette::record(&cassette, InitialState::new(work.display().to_string())),
        test_loader(),
    )
    .unwrap();
    server.start("demo/guess", "", None).await.unwrap();
    let mut outputs = JsonMap::new();
    outputs.insert("guess".into(), serde_json::json!(50));
    server.continue_script(outputs).await.unwrap();
    server.continue_script(JsonMap::new()).await.unwrap();

    // The recorded random number is served verbatim every time.
    for _ in 0..3 {
        replay_cassette(&cassette, test_loader()).await.unwrap();
    }
}

#[tokio::test]
async fn status_calls_are_part_of_the_recording() {
    let dir = tempfile::tempdir().unwrap();
    let cassette = dir.path().join("status.yaml");
    let work = dir.path().to_path_buf();

    let server = VcrServer::record(
        Cassette::record(&cassette, InitialState::new(work.display().to_string())),
        test_loader(),
    )
    .unwrap();
    server.start("t/marker", "", None).await.unwrap();
    let status = server.status().await.unwrap();
    assert!(status.contains("t/marker"));
    server.continue_script(JsonMap::new()).await.unwrap();

    replay_cassette(&cassette, test_loader()).await.unwrap();
}

#[tokio::test]
async fn recording_requires_a_working_directory() {
    let dir = tempfile::tempdir().unwrap();
    let cassette = Cassette::record(dir.path().join("c.yaml"), InitialState::new(""));
    assert!(matches!(
        VcrServer::record(cassette, test_loader()),
        Err(CassetteError::MissingWorkingDir)
    ));
}

#[tokio::test]
async fn tampered_response_fails_replay_loudly() {
    let session = record_marker_session().await;
    let text = fs::read_to_string(&session.cassette).unwrap();
    fs::write(
        &session.cassette,
        text.replace("All Steps Completed", "All Steps Almost Completed"),
    )
    .unwrap();

    let err = replay_cassette(&session.cassette, test_loader())
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::ReplayMismatch(_)));
}

#[tokio::test]
async fn wrong_driver_call_fails_replay_loudly() {
    let session = record_marker_session().await;
    let server = VcrServer::replay(
        Cassette::replay(&session.cassette).unwrap(),
        test_loader(),
    )
    .unwrap();

    let err = server.start("demo/guess", "", None).await.unwrap_err();
    assert!(matches!(err, EngineError::ReplayMismatch(_)));
}

#[tokio::test]
async fn extra_call_after_exhaustion_is_an_error() {
    let session = record_marker_session().await;
    let server = VcrServer::replay(
        Cassette::replay(&session.cassette).unwrap(),
        test_loader(),
    )
    .unwrap();

    server.start("t/marker", "", None).await.unwrap();
    server.continue_script(JsonMap::new()).await.unwrap();

    let err = server.status().await.unwrap_err();
    assert!(matches!(
        err,
        EngineError::Cassette(CassetteError::Exhausted)
    ));
}
