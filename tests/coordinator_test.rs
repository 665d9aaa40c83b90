//! Tests for the multiplayer session coordinator.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

use strictly_bulls::{
    ClientEvent, ConnectionId, Coordinator, CoordinatorErrorKind, MemorySessionStore, Outbox,
    Role, ServerEvent, Session, SessionId, SessionStatus, SessionStore, StoreError,
};

/// Outbox that remembers every event it was asked to deliver.
#[derive(Default)]
struct RecordingOutbox {
    sent: Mutex<Vec<(ConnectionId, ServerEvent)>>,
}

impl RecordingOutbox {
    fn events_for(&self, who: &ConnectionId) -> Vec<ServerEvent> {
        self.sent
            .lock()
            .unwrap()
            .iter()
            .filter(|(to, _)| to == who)
            .map(|(_, e)| e.clone())
            .collect()
    }

    fn clear(&self) {
        self.sent.lock().unwrap().clear();
    }

    fn total(&self) -> usize {
        self.sent.lock().unwrap().len()
    }
}

impl Outbox for RecordingOutbox {
    fn send(&self, to: &ConnectionId, event: ServerEvent) {
        self.sent.lock().unwrap().push((to.clone(), event));
    }
}

/// Memory store whose updates can be made to fail.
#[derive(Default)]
struct FlakyStore {
    inner: MemorySessionStore,
    fail_updates: AtomicBool,
}

impl SessionStore for FlakyStore {
    fn get(&self, id: &SessionId) -> Result<Option<Session>, StoreError> {
        self.inner.get(id)
    }

    fn find_open_by_connection(
        &self,
        connection: &ConnectionId,
    ) -> Result<Option<Session>, StoreError> {
        self.inner.find_open_by_connection(connection)
    }

    fn insert(&self, session: &Session) -> Result<(), StoreError> {
        self.inner.insert(session)
    }

    fn update(&self, session: &Session) -> Result<(), StoreError> {
        if self.fail_updates.load(Ordering::SeqCst) {
            return Err(StoreError::new("disk full"));
        }
        self.inner.update(session)
    }
}

struct Harness {
    coordinator: Coordinator,
    outbox: Arc<RecordingOutbox>,
    store: Arc<FlakyStore>,
}

impl Harness {
    fn new() -> Self {
        let outbox = Arc::new(RecordingOutbox::default());
        let store = Arc::new(FlakyStore::default());
        let coordinator = Coordinator::new(store.clone(), outbox.clone());
        Self {
            coordinator,
            outbox,
            store,
        }
    }

    fn session(&self, id: &SessionId) -> Session {
        self.store.get(id).unwrap().expect("session should exist")
    }

    /// A creates with `a_secret`, B joins with `b_secret`.
    fn start_game(&self, a_secret: &str, b_secret: &str) -> (SessionId, ConnectionId, ConnectionId) {
        let a = ConnectionId::from("alice");
        let b = ConnectionId::from("bob");
        let id = self.coordinator.create_game(&a, a_secret).unwrap();
        self.coordinator.join_game(&b, id.as_str(), b_secret).unwrap();
        self.outbox.clear();
        (id, a, b)
    }
}

fn last_update(events: &[ServerEvent]) -> strictly_bulls::SessionView {
    events
        .iter()
        .rev()
        .find_map(|e| match e {
            ServerEvent::GameUpdate(view) => Some(view.clone()),
            _ => None,
        })
        .expect("expected a game_update")
}

fn error_messages(events: &[ServerEvent]) -> Vec<String> {
    events
        .iter()
        .filter_map(|e| match e {
            ServerEvent::GameError { message } => Some(message.clone()),
            _ => None,
        })
        .collect()
}

#[test]
fn test_create_then_join_starts_game() {
    let h = Harness::new();
    let a = ConnectionId::from("alice");
    let b = ConnectionId::from("bob");

    let id = h.coordinator.create_game(&a, "135").unwrap();
    assert_eq!(*h.session(&id).status(), SessionStatus::Waiting);
    assert_eq!(
        h.outbox.events_for(&a),
        vec![ServerEvent::GameCreated { game_id: id.clone() }]
    );
    assert!(h.outbox.events_for(&b).is_empty());

    h.coordinator.join_game(&b, id.as_str(), "246").unwrap();
    let session = h.session(&id);
    assert_eq!(*session.status(), SessionStatus::Active);
    assert_eq!(session.current_turn().as_ref(), Some(&a));

    let a_view = last_update(&h.outbox.events_for(&a));
    let b_view = last_update(&h.outbox.events_for(&b));
    assert_eq!(a_view.your_role, Some(Role::Player1));
    assert_eq!(b_view.your_role, Some(Role::Player2));
    assert_eq!(a_view.current_turn, Some(a.clone()));
    assert_eq!(b_view.current_turn, Some(a));
    assert!(a_view.opponent_secret.is_none());
    assert!(b_view.opponent_secret.is_none());
}

#[test]
fn test_guess_scores_against_opponent_secret() {
    let h = Harness::new();
    let (id, a, b) = h.start_game("246", "135");

    let result = h.coordinator.submit_guess(&a, "351").unwrap();
    assert_eq!((result.exact_matches, result.value_matches), (0, 3));

    let session = h.session(&id);
    assert_eq!(session.player1().guesses().len(), 1);
    assert_eq!(session.current_turn().as_ref(), Some(&b));

    // Both players see the guess in player1's log.
    for who in [&a, &b] {
        let view = last_update(&h.outbox.events_for(who));
        assert_eq!(view.guesses.player1.records()[0].result, result);
        assert!(view.guesses.player2.is_empty());
    }
}

#[test]
fn test_out_of_turn_guess_is_rejected_for_requester_only() {
    let h = Harness::new();
    let (id, a, b) = h.start_game("135", "246");
    let before = h.session(&id);

    h.coordinator.handle(
        &b,
        ClientEvent::MakeGuess {
            guess: "135".to_string(),
        },
    );

    assert_eq!(h.session(&id), before);
    assert!(h.outbox.events_for(&a).is_empty());
    assert_eq!(error_messages(&h.outbox.events_for(&b)), vec!["It is not your turn"]);
}

#[test]
fn test_disconnect_abandons_and_notifies_remaining_player_once() {
    let h = Harness::new();
    let (id, a, b) = h.start_game("135", "246");

    h.coordinator.disconnect(&a).unwrap();
    let session = h.session(&id);
    assert_eq!(*session.status(), SessionStatus::Abandoned);
    assert!(session.current_turn().is_none());

    assert!(h.outbox.events_for(&a).is_empty());
    let b_events = h.outbox.events_for(&b);
    let notices = b_events
        .iter()
        .filter(|e| matches!(e, ServerEvent::OpponentLeft { .. }))
        .count();
    assert_eq!(notices, 1);
    assert_eq!(last_update(&b_events).status, SessionStatus::Abandoned);

    let err = h.coordinator.submit_guess(&b, "135").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));

    // A second disconnect of either side changes nothing.
    h.outbox.clear();
    h.coordinator.disconnect(&a).unwrap();
    h.coordinator.disconnect(&b).unwrap();
    assert_eq!(h.outbox.total(), 0);
    assert_eq!(h.session(&id), session);
}

#[test]
fn test_creator_leaving_waiting_game_closes_it() {
    let h = Harness::new();
    let a = ConnectionId::from("alice");
    let id = h.coordinator.create_game(&a, "135").unwrap();
    h.outbox.clear();

    h.coordinator.disconnect(&a).unwrap();
    assert_eq!(*h.session(&id).status(), SessionStatus::Abandoned);
    assert_eq!(h.outbox.total(), 0);

    let err = h
        .coordinator
        .join_game(&"bob".into(), id.as_str(), "246")
        .unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));
}

#[test]
fn test_turns_alternate_until_win() {
    let h = Harness::new();
    let (id, a, b) = h.start_game("135", "246");

    let moves = [(&a, "789"), (&b, "789"), (&a, "780"), (&b, "780")];
    let mut expected_next = b.clone();
    for (who, guess) in moves {
        h.coordinator.submit_guess(who, guess).unwrap();
        let session = h.session(&id);
        assert_eq!(session.current_turn().as_ref(), Some(&expected_next));
        expected_next = if expected_next == a { b.clone() } else { a.clone() };
    }

    let result = h.coordinator.submit_guess(&a, "246").unwrap();
    assert!(result.is_win());

    let session = h.session(&id);
    assert_eq!(*session.status(), SessionStatus::Finished);
    assert_eq!(session.winner().as_ref(), Some(&a));
    assert!(session.current_turn().is_none());
    assert_eq!(session.player1().guesses().len(), 3);
    assert_eq!(session.player2().as_ref().unwrap().guesses().len(), 2);

    let err = h.coordinator.submit_guess(&b, "135").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));
    assert_eq!(session.player2().as_ref().unwrap().guesses().len(), 2);
}

#[test]
fn test_secrets_revealed_only_when_finished() {
    let h = Harness::new();
    let a = ConnectionId::from("alice");
    let b = ConnectionId::from("bob");
    let id = h.coordinator.create_game(&a, "135").unwrap();
    h.coordinator.join_game(&b, id.as_str(), "246").unwrap();
    h.coordinator.submit_guess(&a, "789").unwrap();
    h.coordinator.submit_guess(&b, "135").unwrap();

    for who in [&a, &b] {
        for event in h.outbox.events_for(who) {
            if let ServerEvent::GameUpdate(view) = event {
                if view.status == SessionStatus::Finished {
                    assert!(view.opponent_secret.is_some());
                } else {
                    assert!(view.opponent_secret.is_none(), "{view:?}");
                }
            }
        }
    }

    let a_final = last_update(&h.outbox.events_for(&a));
    let b_final = last_update(&h.outbox.events_for(&b));
    assert_eq!(a_final.opponent_secret.unwrap().to_string(), "246");
    assert_eq!(b_final.opponent_secret.unwrap().to_string(), "135");
    assert_eq!(a_final.winner, Some(b.clone()));
}

#[test]
fn test_validation_rejections() {
    let h = Harness::new();
    let a = ConnectionId::from("alice");

    for bad in ["12", "1234", "12a", "113", ""] {
        let err = h.coordinator.create_game(&a, bad).unwrap_err();
        assert!(
            matches!(err.kind, CoordinatorErrorKind::Validation(_)),
            "{bad:?} gave {err}"
        );
    }
    assert!(h.store.inner.is_empty());
    assert_eq!(h.outbox.total(), 0);
}

#[test]
fn test_join_rejections_leave_state_untouched() {
    let h = Harness::new();
    let a = ConnectionId::from("alice");
    let b = ConnectionId::from("bob");
    let c = ConnectionId::from("carol");

    let err = h.coordinator.join_game(&b, "NOSUCH", "246").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::NotFound(_)));

    let id = h.coordinator.create_game(&a, "135").unwrap();
    let waiting = h.session(&id);

    let err = h.coordinator.join_game(&a, id.as_str(), "246").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));
    let err = h.coordinator.join_game(&b, id.as_str(), "224").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::Validation(_)));
    assert_eq!(h.session(&id), waiting);

    h.coordinator.join_game(&b, id.as_str(), "246").unwrap();
    let active = h.session(&id);
    let err = h.coordinator.join_game(&c, id.as_str(), "789").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));
    assert_eq!(h.session(&id), active);
}

#[test]
fn test_player_cannot_open_second_game() {
    let h = Harness::new();
    let (_, a, b) = h.start_game("135", "246");

    let err = h.coordinator.create_game(&a, "789").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));

    let c = ConnectionId::from("carol");
    let other = h.coordinator.create_game(&c, "789").unwrap();
    let err = h.coordinator.join_game(&b, other.as_str(), "135").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));
}

#[test]
fn test_guess_without_game_is_rejected() {
    let h = Harness::new();
    let err = h.coordinator.submit_guess(&"nobody".into(), "123").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));

    let a = ConnectionId::from("alice");
    h.coordinator.create_game(&a, "135").unwrap();
    let err = h.coordinator.submit_guess(&a, "246").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::StateConflict(_)));
}

#[test]
fn test_failed_write_rolls_back_and_reports_generic_error() {
    let h = Harness::new();
    let (id, a, b) = h.start_game("135", "246");
    let before = h.session(&id);

    h.store.fail_updates.store(true, Ordering::SeqCst);
    let err = h.coordinator.submit_guess(&a, "789").unwrap_err();
    assert!(matches!(err.kind, CoordinatorErrorKind::Persistence(_)));
    assert_eq!(h.session(&id), before);

    h.coordinator.handle(
        &a,
        ClientEvent::MakeGuess {
            guess: "789".to_string(),
        },
    );
    let messages = error_messages(&h.outbox.events_for(&a));
    assert_eq!(messages.len(), 1);
    assert!(!messages[0].contains("disk full"));
    assert!(h.outbox.events_for(&b).is_empty());

    // Once the store recovers, the same player still holds the turn.
    h.store.fail_updates.store(false, Ordering::SeqCst);
    h.coordinator.submit_guess(&a, "789").unwrap();
    assert_eq!(h.session(&id).player1().guesses().len(), 1);
}

#[test]
fn test_join_accepts_lowercase_id() {
    let h = Harness::new();
    let a = ConnectionId::from("alice");
    let id = h.coordinator.create_game(&a, "135").unwrap();

    let typed = format!("  {} ", id.as_str().to_lowercase());
    h.coordinator.join_game(&"bob".into(), &typed, "246").unwrap();
    assert_eq!(*h.session(&id).status(), SessionStatus::Active);
}

#[test]
fn test_concurrent_joins_admit_one_player() {
    let h = Harness::new();
    let id = h.coordinator.create_game(&"alice".into(), "135").unwrap();

    let joiners: Vec<ConnectionId> = (0..16).map(|i| format!("joiner-{i}").into()).collect();
    let successes: usize = std::thread::scope(|scope| {
        let handles: Vec<_> = joiners
            .iter()
            .map(|joiner| {
                let coordinator = h.coordinator.clone();
                let id = id.clone();
                scope.spawn(move || coordinator.join_game(joiner, id.as_str(), "246").is_ok())
            })
            .collect();
        handles
            .into_iter()
            .map(|handle| usize::from(handle.join().unwrap()))
            .sum()
    });

    assert_eq!(successes, 1);
    let session = h.session(&id);
    assert_eq!(*session.status(), SessionStatus::Active);
    let winner = session.player2().as_ref().unwrap().connection().clone();
    assert!(joiners.contains(&winner));
}

#[test]
fn test_racing_guess_and_disconnect_stay_consistent() {
    for _ in 0..50 {
        let h = Harness::new();
        let (id, a, b) = h.start_game("135", "246");

        std::thread::scope(|scope| {
            let guesser = h.coordinator.clone();
            let leaver = h.coordinator.clone();
            let (a, b) = (a.clone(), b.clone());
            scope.spawn(move || {
                let _ = guesser.submit_guess(&a, "789");
            });
            scope.spawn(move || {
                leaver.disconnect(&b).unwrap();
            });
        });

        let session = h.session(&id);
        assert_eq!(*session.status(), SessionStatus::Abandoned);
        assert!(session.current_turn().is_none());
        // The guess either landed before the disconnect or not at all.
        assert!(session.player1().guesses().len() <= 1);
    }
}

#[test]
fn test_independent_sessions_run_in_parallel() {
    let h = Harness::new();

    std::thread::scope(|scope| {
        for game in 0..8 {
            let coordinator = h.coordinator.clone();
            scope.spawn(move || {
                let a = ConnectionId::from(format!("a{game}"));
                let b = ConnectionId::from(format!("b{game}"));
                let id = coordinator.create_game(&a, "135").unwrap();
                coordinator.join_game(&b, id.as_str(), "246").unwrap();
                coordinator.submit_guess(&a, "789").unwrap();
                coordinator.submit_guess(&b, "135").unwrap();
            });
        }
    });

    assert_eq!(h.store.inner.len(), 8);
    for game in 0..8 {
        let b = ConnectionId::from(format!("b{game}"));
        let events = h.outbox.events_for(&b);
        let view = last_update(&events);
        assert_eq!(view.status, SessionStatus::Finished);
        assert_eq!(view.winner, Some(b));
    }
}
