use rewind_common::{
    types::{
        CapturedValue, CapturedVariable, CodeLocation, FrameDescriptor, MethodSignature,
        StopPolicy,
    },
    EngineConfig,
};
use rewind_engine::{
    session::{Phase, Session},
    source::{ScriptedPause, ScriptedSource},
    strategy::VariableOrigin,
};
use tracing::info;

/// A pause in `T.java` at `line` with `depth` frames and `i = line`.
fn pause(line: usize, depth: usize) -> ScriptedPause {
    let method = if depth > 1 { "inner" } else { "main" };
    let location = CodeLocation::new("T.java", line, MethodSignature::new("T", method, "()V"));
    let frames = (0..depth).map(|level| FrameDescriptor::new("T", method, line + level)).collect();
    ScriptedPause::new(location)
        .with_stack(frames)
        .with_variable(CapturedVariable::local("i", "int", CapturedValue::primitive(line)))
}

/// Records the whole program line by line and rewinds to the first snapshot.
fn replay_session(points: &[(usize, usize)]) -> Session<ScriptedSource> {
    let pauses = points.iter().map(|&(line, depth)| pause(line, depth)).collect();
    let mut session = Session::new(ScriptedSource::from_pauses(pauses), EngineConfig::default());

    assert_eq!(session.record_to_end().unwrap(), points.len());
    assert_eq!(session.phase(), Phase::Replaying);
    session.travel_to_snapshot(0).unwrap();
    session
}

fn flat(lines: &[usize]) -> Vec<(usize, usize)> {
    lines.iter().map(|&line| (line, 1)).collect()
}

#[test]
fn test_recording_switches_to_replay() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut session = replay_session(&flat(&[1, 2, 3]));

    assert!(!session.is_live());
    assert!(session.source().is_none());
    assert!(!session.timeline().is_recording());
    assert!(session.wait_for_pause().unwrap_err().is_invalid_state());
}

#[test]
fn test_continue_stops_at_first_breakpoint_after_cursor() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut session = replay_session(&flat(&[1, 10, 3, 4, 5, 6, 7, 10, 11, 10]));
    session.set_breakpoint("T.java", 10).unwrap();
    session.travel_to_snapshot(2).unwrap();

    let navigation = session.continue_run().unwrap();
    assert_eq!(navigation.snapshot_id, Some(7));
    assert_eq!(navigation.message, "Breakpoint hit at T.java:10");
    assert_eq!(session.timeline().current_index(), Some(7));

    assert_eq!(session.continue_run().unwrap().snapshot_id, Some(9));
    let navigation = session.continue_run().unwrap();
    assert_eq!(navigation.snapshot_id, Some(9));
    assert_eq!(navigation.message, "Reached end of execution");
}

#[test]
fn test_once_breakpoint_stops_a_single_time() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut session = replay_session(&flat(&[1, 10, 3, 10, 5]));
    session.set_breakpoint_with("T.java", 10, StopPolicy::Once).unwrap();

    assert_eq!(session.continue_run().unwrap().snapshot_id, Some(1));
    assert!(session.breakpoints().is_empty());
    assert_eq!(session.continue_run().unwrap().snapshot_id, Some(4));
}

#[test]
fn test_on_count_breakpoint_skips_early_hits() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut session = replay_session(&flat(&[1, 10, 3, 10, 5, 10]));
    session.set_breakpoint_with("T.java", 10, StopPolicy::OnCount(2)).unwrap();

    assert_eq!(session.continue_run().unwrap().snapshot_id, Some(3));
    assert_eq!(session.continue_run().unwrap().snapshot_id, Some(5));
    assert_eq!(session.breakpoints().get("T.java", 10).unwrap().hit_count(), 3);
}

#[test]
fn test_step_over_never_lands_deeper() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let points = [(1, 1), (20, 2), (21, 2), (2, 1), (22, 2), (30, 3), (3, 1), (23, 2)];
    let mut session = replay_session(&points);

    for start in 0..points.len() {
        session.travel_to_snapshot(start).unwrap();
        let depth = session.timeline().snapshots()[start].depth();

        match session.step_over() {
            Ok(navigation) => {
                let target = navigation.snapshot_id.unwrap();
                assert!(target > start);
                assert!(session.timeline().snapshots()[target].depth() <= depth);
                assert!(session.timeline().snapshots()[start + 1..target]
                    .iter()
                    .all(|s| s.depth() > depth));
            }
            Err(err) => {
                assert!(err.is_invalid_state());
                assert!(session.timeline().snapshots()[start + 1..]
                    .iter()
                    .all(|s| s.depth() > depth));
                assert_eq!(session.timeline().current_index(), Some(start));
            }
        }
    }
}

#[test]
fn test_step_and_step_back() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut session = replay_session(&flat(&[1, 2]));

    assert!(session.step_back().unwrap_err().is_invalid_state());
    assert_eq!(session.step().unwrap().snapshot_id, Some(1));
    assert!(session.step().unwrap_err().is_invalid_state());
    assert_eq!(session.step_back().unwrap().snapshot_id, Some(0));
    assert!(session.travel_to_snapshot(7).unwrap_err().is_not_found());
}

#[test]
fn test_method_breakpoint_in_replay() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut session = replay_session(&[(1, 1), (2, 1), (20, 2), (3, 1), (21, 2)]);
    session.break_before_method_call("inner").unwrap();

    assert_eq!(session.continue_run().unwrap().snapshot_id, Some(2));
    assert_eq!(session.continue_run().unwrap().snapshot_id, Some(4));
    assert!(session.break_before_method_call("missing").unwrap_err().is_not_found());
}

#[test]
fn test_print_variable_and_inspection() {
    rewind_common::logging::ensure_test_logging(None);
    info!("Running test");
    let mut session = replay_session(&flat(&[4, 5]));
    session.step().unwrap();

    let view = session.print_variable("i").unwrap();
    assert_eq!(view.origin, VariableOrigin::Snapshot);
    assert_eq!(view.value, CapturedValue::primitive(5));
    assert!(session.print_variable("j").unwrap_err().is_not_found());

    let inspector = session.inspect().unwrap();
    assert_eq!(inspector.method().to_string(), "T.main()V");
    assert_eq!(inspector.frame().unwrap().line, 5);
    assert!(inspector.receiver().unwrap_err().is_not_found());

    let followed = session.timeline().follow_variable("i").unwrap();
    assert_eq!(followed.history.len(), 2);
}
