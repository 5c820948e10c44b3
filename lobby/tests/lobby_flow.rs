use std::collections::HashMap;
use std::sync::Arc;

use lobby::{
    Backend, ChallengeOutcome, Challenges, LobbyConfig, LobbyContext, LobbyError, ManualClock,
    MatchOutcome, MatchState, Matchmaker, MemoryBackend, Presence, PresenceStatus, Session,
    SessionEvent, SessionStatus, Table,
};
use proto::PlayerId;
use tokio::sync::Barrier;

fn lobby() -> LobbyContext<MemoryBackend> {
    LobbyContext::new(
        Arc::new(MemoryBackend::new()),
        Arc::new(ManualClock::new(5_000_000)),
        LobbyConfig::default(),
    )
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_join_race_has_one_winner() {
    let ctx = lobby();
    ctx.backend
        .sessions()
        .insert(Session::waiting("HOST1".into(), "host".into(), 1))
        .await
        .unwrap();

    let barrier = Arc::new(Barrier::new(2));
    let mut handles = Vec::new();
    for name in ["racer-a", "racer-b"] {
        let ctx = ctx.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let mut peer = Matchmaker::new(ctx, PlayerId::new(name));
            barrier.wait().await;
            let outcome = peer.find_match().await.unwrap();
            (outcome, peer.state())
        }));
    }

    let mut joined = 0;
    let mut created = 0;
    for handle in handles {
        match handle.await.unwrap() {
            (MatchOutcome::Joined(session), state) => {
                assert_eq!(session.id, "HOST1");
                assert_eq!(state, MatchState::Matched);
                joined += 1;
            }
            (MatchOutcome::Waiting(session), state) => {
                assert_ne!(session.id, "HOST1");
                assert_eq!(state, MatchState::Waiting);
                created += 1;
            }
        }
    }
    assert_eq!((joined, created), (1, 1), "Loser opens its own room");

    let host = ctx.backend.sessions().get("HOST1").await.unwrap().unwrap();
    assert_eq!(host.status, SessionStatus::Playing);
    assert_eq!(ctx.backend.sessions().list().await.unwrap().len(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_crowd_pairs_up_without_duplicates() {
    let ctx = lobby();
    let peers = 8;
    let barrier = Arc::new(Barrier::new(peers));
    let mut handles = Vec::new();
    for i in 0..peers {
        let ctx = ctx.clone();
        let barrier = barrier.clone();
        handles.push(tokio::spawn(async move {
            let mut peer = Matchmaker::new(ctx, PlayerId::new(format!("peer-{i}")));
            barrier.wait().await;
            peer.find_match().await.unwrap()
        }));
    }
    for handle in handles {
        handle.await.unwrap();
    }

    let sessions = ctx.backend.sessions().list().await.unwrap();
    let mut seats: HashMap<PlayerId, usize> = HashMap::new();
    for session in &sessions {
        match session.status {
            SessionStatus::Waiting => assert!(session.player2_id.is_none()),
            SessionStatus::Playing => assert!(session.player2_id.is_some()),
            SessionStatus::Finished => panic!("Nobody left"),
        }
        *seats.entry(session.player1_id.clone()).or_default() += 1;
        if let Some(p2) = &session.player2_id {
            *seats.entry(p2.clone()).or_default() += 1;
        }
    }
    assert_eq!(seats.len(), peers, "Every peer has a seat");
    assert!(seats.values().all(|&n| n == 1), "No peer sits twice: {seats:?}");
}

#[tokio::test]
async fn test_challenge_to_match_to_leave() {
    let ctx = lobby();
    let alice_presence = Presence::new(ctx.clone(), "alice".into(), "Alice");
    let bob_presence = Presence::new(ctx.clone(), "bob".into(), "Bob");
    alice_presence.go_online().await.unwrap();
    bob_presence.go_online().await.unwrap();

    let alice = Challenges::new(ctx.clone(), "alice".into());
    let bob = Challenges::new(ctx.clone(), "bob".into());
    let mut inbox = bob.subscribe_incoming();

    let sent = alice.send(&"bob".into()).await.unwrap();
    let mut watch = alice.watch(&sent);
    let received = bob.next_incoming(&mut inbox).await.unwrap();
    assert_eq!(received.challenger_nickname, "Alice");

    let room = bob.accept(&received.id).await.unwrap();
    let ChallengeOutcome::Accepted(seen) = alice.next_outcome(&sent, &mut watch).await.unwrap() else {
        panic!("Alice should learn her challenge was accepted");
    };
    assert_eq!(seen.id, room.id);

    let mut alice_match = Matchmaker::new(ctx.clone(), "alice".into());
    let mut bob_match = Matchmaker::new(ctx.clone(), "bob".into());
    alice_match.adopt(seen).await.unwrap();
    bob_match.adopt(room.clone()).await.unwrap();
    assert!(alice_match.state() == MatchState::Matched && bob_match.state() == MatchState::Matched);

    bob_match.leave().await.unwrap();
    let event = alice_match.next_event().await.unwrap();
    assert!(matches!(event, SessionEvent::OpponentLeft(_)));

    let bob_record = bob_presence.lookup(&"bob".into()).await.unwrap().unwrap();
    assert_eq!(bob_record.status, PresenceStatus::Online);
}

#[tokio::test]
async fn test_adopting_finished_room_reports_opponent_left() {
    let ctx = lobby();
    let mut room = Session::playing("DONE1".into(), "alice".into(), "bob".into(), 1);
    ctx.backend.sessions().insert(room.clone()).await.unwrap();
    ctx.backend
        .sessions()
        .update_if("DONE1", |_| true, |s| s.status = SessionStatus::Finished)
        .await
        .unwrap();
    room.status = SessionStatus::Playing;

    let mut alice = Matchmaker::new(ctx.clone(), "alice".into());
    alice.adopt(room).await.unwrap();
    assert!(matches!(alice.next_event().await.unwrap(), SessionEvent::OpponentLeft(_)));
}

#[tokio::test]
async fn test_session_status_never_goes_back() {
    let ctx = lobby();
    let sessions = ctx.backend.sessions();
    sessions
        .insert(Session::waiting("MONO1".into(), "alice".into(), 1))
        .await
        .unwrap();

    sessions
        .update_if("MONO1", |_| true, |s| {
            s.status = SessionStatus::Playing;
            s.player2_id = Some("bob".into());
        })
        .await
        .unwrap();
    sessions
        .update_if("MONO1", |_| true, |s| s.status = SessionStatus::Finished)
        .await
        .unwrap();

    let revived = sessions
        .update_if("MONO1", |_| true, |s| s.status = SessionStatus::Playing)
        .await;
    assert!(matches!(revived, Err(LobbyError::IllegalTransition { .. })));
    let stored = sessions.get("MONO1").await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Finished);
}

#[tokio::test]
async fn test_waiting_room_cannot_be_finished() {
    let ctx = lobby();
    let sessions = ctx.backend.sessions();
    sessions
        .insert(Session::waiting("LONE1".into(), "alice".into(), 1))
        .await
        .unwrap();

    let result = sessions
        .update_if("LONE1", |_| true, |s| s.status = SessionStatus::Finished)
        .await;

    assert!(matches!(result, Err(LobbyError::IllegalTransition { .. })));
    let stored = sessions.get("LONE1").await.unwrap().unwrap();
    assert_eq!(stored.status, SessionStatus::Waiting);
    assert!(stored.player2_id.is_none());
}

#[tokio::test]
async fn test_outsider_cannot_adopt_room() {
    let ctx = lobby();
    let room = Session::playing("PRIV1".into(), "alice".into(), "bob".into(), 1);
    let mut carol = Matchmaker::new(ctx, "carol".into());
    assert!(matches!(carol.adopt(room).await, Err(LobbyError::PlayerUnavailable(_))));
}
