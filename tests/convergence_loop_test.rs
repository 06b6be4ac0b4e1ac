//! End-to-end convergence loop test with the scripted collaborators and the
//! real filesystem recorder.

use std::sync::Arc;

use chartwright::infrastructure::{FsArtifactRecorder, ScriptedCritic, ScriptedGenerator};
use chartwright::services::config::IterationConfig;
use chartwright::{ConvergenceController, RunPhase, RunState, UserPriority};

fn controller(
    recorder: Arc<FsArtifactRecorder>,
) -> ConvergenceController<ScriptedGenerator, ScriptedCritic, FsArtifactRecorder> {
    ConvergenceController::new(
        Arc::new(ScriptedGenerator::new()),
        Arc::new(ScriptedCritic::new()),
        recorder,
        IterationConfig::default(),
    )
}

#[tokio::test]
async fn scripted_run_converges_and_persists() {
    let tmp = tempfile::tempdir().unwrap();
    let recorder = Arc::new(FsArtifactRecorder::new(tmp.path()));
    let controller = controller(Arc::clone(&recorder));
    let mut state = RunState::new("msft_demo", 250);

    // First iteration: the script rejects twice, then approves.
    let report = controller.run_iteration(&mut state).await.unwrap();
    assert!(report.accepted);
    assert_eq!(report.turns_used, 3);
    assert!(!report.turns[0].accepted);
    assert!(!report.turns[1].accepted);
    assert!(report.turns[2].approved);
    assert_eq!(state.phase, RunPhase::AwaitingUserFeedback);

    // The two rejections evolved both states and populated the window.
    assert_eq!(state.visual.version(), 3);
    assert_eq!(state.data.version(), 3);
    assert_eq!(state.window.len(), 2);
    // Script demanded moving averages, peak markers, and volume.
    let features = state.visual.active_features();
    assert!(features.contains_key("moving_avg"));
    assert!(features.contains_key("peaks"));
    assert!(features.contains_key("volume"));

    // User asks for more, run re-arms and converges again.
    let outcome = controller
        .apply_user_feedback(
            &mut state,
            "Show the correlation with the index",
            UserPriority::Critical,
            false,
        )
        .await
        .unwrap();
    assert_eq!(outcome.phase, RunPhase::Running);
    assert!(outcome.post_critic_feedback.is_some());
    assert!(state.data.active_features().contains_key("correlation"));

    let report = controller.run_iteration(&mut state).await.unwrap();
    assert!(report.accepted);
    assert_eq!(report.outer_iteration, 2);

    // Satisfied closes the run.
    let outcome = controller
        .apply_user_feedback(&mut state, "", UserPriority::NiceToHave, true)
        .await
        .unwrap();
    assert_eq!(outcome.phase, RunPhase::Done);

    // Ledger saw every scored text: 3 critic + 1 user + 1 post-user + 1 critic.
    assert_eq!(state.ledger.len(), 6);

    // Case directory exists with the versioned artifact files.
    let cases = recorder.list_cases().unwrap();
    assert_eq!(cases.len(), 1);
    assert_eq!(cases[0].case_name, "msft_demo");
    assert_eq!(cases[0].iterations, 6);

    let case_dir = tmp.path().join(&cases[0].directory);
    assert!(case_dir.join("feedback/v001_critic.txt").exists());
    assert!(case_dir.join("code/v003_critic.py").exists());
    assert!(case_dir.join("feedback/v004_user.txt").exists());
    assert!(case_dir.join("states/v005_critic_post_user.json").exists());
    assert!(case_dir.join("feedback/v006_critic.txt").exists());

    // User feedback files carry the priority tag.
    let user_doc =
        std::fs::read_to_string(case_dir.join("feedback/v004_user.txt")).unwrap();
    assert!(user_doc.contains("[Priority: Critical]"));

    // And the report renders.
    let report_path = recorder.write_evolution_report(&state).unwrap();
    let report = std::fs::read_to_string(report_path).unwrap();
    assert!(report.contains("# Evolution Report: msft_demo"));
    assert!(report.contains("v006_critic"));
}

#[tokio::test]
async fn ledger_trends_improve_over_a_scripted_run() {
    let tmp = tempfile::tempdir().unwrap();
    let recorder = Arc::new(FsArtifactRecorder::new(tmp.path()));
    let controller = controller(recorder);
    let mut state = RunState::new("trend_demo", 250);

    controller.run_iteration(&mut state).await.unwrap();

    // The script escalates from complaints to approval, so the window
    // trend must be improving.
    let trends = state.ledger.trends().unwrap();
    assert_eq!(trends.score_trend.as_str(), "improving");
    assert_eq!(trends.total_feedback, 3);
}
