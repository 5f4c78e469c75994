use super::*;

#[test]
fn assign_rejects_unknown_train() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let ghost = TrainId("train_ghost".to_string());
    assert_eq!(
        assign_now(&mut state, &content, &mut rng, &ghost, 1),
        Err(Rejection::UnknownTrain { train_id: ghost })
    );
}

#[test]
fn assign_rejects_train_that_is_not_requesting() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let approaching = insert_train(&mut state, "Night Owl");
    assert_eq!(
        assign_now(&mut state, &content, &mut rng, &approaching, 1),
        Err(Rejection::NotRequesting {
            train_id: approaching.clone(),
            status: TrainStatus::Approaching,
        })
    );

    tick(&mut state, &[], &content, &mut rng);
    assign_now(&mut state, &content, &mut rng, &approaching, 1).unwrap();
    let again = assign_now(&mut state, &content, &mut rng, &approaching, 2);
    assert!(matches!(
        again,
        Err(Rejection::NotRequesting {
            status: TrainStatus::Assigned,
            ..
        })
    ));
    assert!(!state.platforms.is_occupied(PlatformId(2)));
}

#[test]
fn assign_rejects_unknown_platform_without_side_effects() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let owl = requesting_train(&mut state, &content, &mut rng, "Night Owl");

    let result = assign_now(&mut state, &content, &mut rng, &owl, 9);

    assert_eq!(
        result,
        Err(Rejection::UnknownPlatform {
            platform: PlatformId(9)
        })
    );
    assert_eq!(state.train(&owl).unwrap().status, TrainStatus::Requesting);
    assert_eq!(state.countdown_seconds(), Some(8));
    assert!(!state.is_over());
}

#[test]
fn rejected_command_is_reported_as_an_event() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let cmd = command_now(
        &state,
        Command::Assign {
            train_id: TrainId("train_ghost".to_string()),
            platform: PlatformId(1),
        },
    );
    let cmd_id = cmd.id.clone();

    let events = tick(&mut state, &[cmd], &content, &mut rng);

    assert_eq!(events.len(), 1);
    match &events[0].event {
        Event::CommandRejected {
            command_id,
            rejection,
        } => {
            assert_eq!(*command_id, cmd_id);
            assert_eq!(rejection.code(), "unknown_train");
        }
        other => panic!("expected CommandRejected, got {other:?}"),
    }
}

#[test]
fn commands_for_a_later_tick_wait() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let owl = requesting_train(&mut state, &content, &mut rng, "Night Owl");
    let mut cmd = command_now(
        &state,
        Command::Assign {
            train_id: owl.clone(),
            platform: PlatformId(4),
        },
    );
    cmd.execute_at_tick = state.meta.tick + 3;
    let commands = vec![cmd];

    for _ in 0..3 {
        tick(&mut state, &commands, &content, &mut rng);
        assert_eq!(state.train(&owl).unwrap().status, TrainStatus::Requesting);
    }
    tick(&mut state, &commands, &content, &mut rng);
    assert_eq!(state.train(&owl).unwrap().assigned_platform, Some(PlatformId(4)));
}

#[test]
fn execute_routes_assign() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let owl = requesting_train(&mut state, &content, &mut rng, "Night Owl");
    let mut events = Vec::new();

    let outcome = execute(
        &mut state,
        &Command::Assign {
            train_id: owl,
            platform: PlatformId(2),
        },
        &content,
        &mut rng,
        &mut events,
    )
    .unwrap();

    assert!(matches!(
        outcome,
        CommandOutcome::Assign(AssignOutcome::Assigned { .. })
    ));
    assert_eq!(state.platforms.list_available(), vec![PlatformId(1), PlatformId(3), PlatformId(4)]);
}

#[test]
fn pause_freezes_clock_and_countdown() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let owl = requesting_train(&mut state, &content, &mut rng, "Night Owl");
    let mut events = Vec::new();
    assert_eq!(pause(&mut state, &mut events), Ok(CommandOutcome::Paused));
    let frozen_at = state.meta.now_ms;
    let tick_before = state.meta.tick;

    let quiet = run_ticks(&mut state, &content, &mut rng, 200);

    assert!(quiet.is_empty());
    assert_eq!(state.meta.now_ms, frozen_at);
    assert_eq!(state.meta.tick, tick_before + 200);
    assert_eq!(state.countdown_seconds(), Some(8));
    assert_eq!(
        assign_now(&mut state, &content, &mut rng, &owl, 1),
        Err(Rejection::Paused)
    );

    assert_eq!(resume(&mut state, &mut events), Ok(CommandOutcome::Resumed));
    run_ticks(&mut state, &content, &mut rng, 10);
    assert_eq!(state.countdown_seconds(), Some(7));
}

#[test]
fn pause_and_resume_are_idempotent() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut events = Vec::new();

    resume(&mut state, &mut events).unwrap();
    assert!(events.is_empty());
    pause(&mut state, &mut events).unwrap();
    pause(&mut state, &mut events).unwrap();
    let paused = events
        .iter()
        .filter(|e| matches!(e.event, Event::Paused))
        .count();
    assert_eq!(paused, 1);
    assert!(state.is_paused());
}

#[test]
fn pause_after_game_over_is_rejected() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    requesting_train(&mut state, &content, &mut rng, "Comet Mu");
    run_ticks(&mut state, &content, &mut rng, 80);
    let mut events = Vec::new();

    assert_eq!(pause(&mut state, &mut events), Err(Rejection::SessionOver));
    assert_eq!(resume(&mut state, &mut events), Err(Rejection::SessionOver));
}

#[test]
fn selection_follows_the_train() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut rng = make_rng();
    let kite = requesting_train(&mut state, &content, &mut rng, "Red Kite");
    let mut events = Vec::new();

    let outcome = select_train(&mut state, &kite, &mut events).unwrap();
    assert_eq!(outcome, CommandOutcome::Selected(kite.clone()));
    assert_eq!(state.selected_train.as_ref(), Some(&kite));

    let mut events = Vec::new();
    assign(&mut state, &kite, PlatformId(1), &content, &mut rng, &mut events).unwrap();
    assert!(state.selected_train.is_none());
    assert!(has_event(&events, |e| matches!(e, Event::TrainDeselected)));
}

#[test]
fn select_rejects_unknown_train_and_deselect_is_quiet_when_empty() {
    let content = base_content();
    let mut state = base_state(&content);
    let mut events = Vec::new();
    let ghost = TrainId("train_ghost".to_string());

    assert_eq!(
        select_train(&mut state, &ghost, &mut events),
        Err(Rejection::UnknownTrain { train_id: ghost })
    );
    assert_eq!(deselect_train(&mut state, &mut events), CommandOutcome::Deselected);
    assert!(events.is_empty());
}

#[test]
fn rejection_codes_are_stable() {
    let train_id = TrainId("train_x".to_string());
    assert_eq!(Rejection::SessionOver.code(), "session_over");
    assert_eq!(Rejection::Paused.code(), "paused");
    assert_eq!(
        Rejection::UnknownTrain {
            train_id: train_id.clone()
        }
        .code(),
        "unknown_train"
    );
    assert_eq!(
        Rejection::NotRequesting {
            train_id,
            status: TrainStatus::Approaching
        }
        .code(),
        "not_requesting"
    );
    assert_eq!(
        Rejection::UnknownPlatform {
            platform: PlatformId(7)
        }
        .code(),
        "unknown_platform"
    );
}
