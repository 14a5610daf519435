use crate::{ContextId, ContextStatus, LifecycleState, RtError};

#[test]
fn context_index_round_trips() {
    for id in ContextId::ALL {
        assert_eq!(ContextId::from_index(id.index()), Ok(id));
    }
    assert_eq!(ContextId::from_index(3), Err(RtError::ProgrammingError));
    assert!(!ContextId::Worker.has_ui());
}

#[test]
fn status_transition_only_from_expected_state() {
    let status = ContextStatus::new();
    assert_eq!(status.state(), LifecycleState::Unloaded);

    status.set_state(LifecycleState::Loaded);
    assert!(status.transition(LifecycleState::Loaded, LifecycleState::Runloop));
    assert!(!status.transition(LifecycleState::Loaded, LifecycleState::Runloop));
    assert_eq!(status.state(), LifecycleState::Runloop);
    assert!(status.state().has_task());
}

#[test]
fn bumped_generation_cancels_older_tasks() {
    let status = ContextStatus::new();
    let spawned_at = status.generation();

    assert!(!status.is_cancelled(spawned_at));
    let next = status.bump_generation();
    assert_eq!(next, spawned_at + 1);
    assert!(status.is_cancelled(spawned_at));
    assert!(!status.is_cancelled(next));
}
