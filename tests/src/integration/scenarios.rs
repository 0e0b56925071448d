//! # Classroom Scenarios
//!
//! End-to-end walkthroughs driven through the context bridge, the way a UI
//! would drive them.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cp_02_session_model::PollPhase;
    use cp_03_sync_engine::InMemorySharedStore;
    use shared_bus::{EventFilter, EventKind, SessionEvent};
    use shared_types::Command;

    use crate::integration::support::{admit, context, drain, poll, settle, vote};

    // =========================================================================
    // POLLS
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_everyone_answers_and_poll_auto_ends() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        admit(&presenter, "Alice").await;
        admit(&presenter, "Bob").await;
        let mut ended = presenter.subscribe(EventFilter::kinds(vec![EventKind::PollEnded]));

        presenter.submit(poll("Q1", &["X", "Y"], 30)).unwrap();
        presenter.submit(vote("Alice", "X")).unwrap();
        presenter.submit(vote("Bob", "X")).unwrap();
        presenter.flush().await.unwrap();

        let tally = presenter.tally();
        assert_eq!(tally.votes_for("X"), 2);
        assert_eq!(tally.votes_for("Y"), 0);
        assert_eq!(presenter.phase(), PollPhase::Active);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        presenter.flush().await.unwrap();

        assert_eq!(presenter.phase(), PollPhase::Ended);
        assert_eq!(drain(&mut ended).len(), 1);
        assert!(presenter.snapshot().results_visible());
        assert!(presenter.progress().is_complete);
    }

    #[tokio::test(start_paused = true)]
    async fn test_second_vote_from_same_student_ignored() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        admit(&presenter, "Alice").await;
        admit(&presenter, "Bob").await;

        presenter.submit(poll("Q1", &["X", "Y"], 30)).unwrap();
        presenter.submit(vote("Alice", "X")).unwrap();
        presenter.submit(vote("Alice", "Y")).unwrap();
        presenter.flush().await.unwrap();

        let tally = presenter.tally();
        assert_eq!(tally.votes_for("X"), 1);
        assert_eq!(tally.votes_for("Y"), 0);
        let snapshot = presenter.snapshot();
        let alice = snapshot.student("Alice").unwrap();
        assert!(alice.has_answered);
        assert_eq!(alice.selected_option.as_deref(), Some("X"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_runs_out() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        admit(&presenter, "Alice").await;
        let mut sub = presenter.subscribe(EventFilter::all());

        presenter.submit(poll("Q1", &["X", "Y"], 10)).unwrap();
        tokio::time::sleep(Duration::from_millis(4_500)).await;
        presenter.flush().await.unwrap();
        assert_eq!(presenter.snapshot().remaining_secs(), 6);

        tokio::time::sleep(Duration::from_secs(10)).await;
        presenter.flush().await.unwrap();

        let events = drain(&mut sub);
        let ended = events
            .iter()
            .filter(|e| matches!(e, SessionEvent::PollEnded { .. }))
            .count();
        assert_eq!(ended, 1);
        assert_eq!(presenter.phase(), PollPhase::Ended);
        assert_eq!(presenter.snapshot().remaining_secs(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_clear_poll_then_new_poll() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        admit(&presenter, "Alice").await;

        presenter.submit(poll("Q1", &["X", "Y"], 30)).unwrap();
        presenter.submit(vote("Alice", "X")).unwrap();
        presenter.submit(Command::ClearPoll {}).unwrap();
        presenter.flush().await.unwrap();
        assert_eq!(presenter.phase(), PollPhase::NoPoll);
        assert!(presenter.snapshot().student("Alice").unwrap().selected_option.is_none());

        presenter.submit(poll("Q2", &["A", "B", "C"], 30)).unwrap();
        presenter.submit(vote("Alice", "C")).unwrap();
        presenter.flush().await.unwrap();

        assert_eq!(presenter.tally().votes_for("C"), 1);
        assert_eq!(presenter.tally().total_votes, 1);
    }

    // =========================================================================
    // ADMISSION CONTROL
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_repeated_request_queues_once() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);

        presenter
            .submit(Command::RequestAdmission { name: "Sam".into() })
            .unwrap();
        presenter
            .submit(Command::RequestAdmission { name: "Sam".into() })
            .unwrap();
        presenter.flush().await.unwrap();

        let snapshot = presenter.snapshot();
        assert_eq!(snapshot.pending().len(), 1);
        assert!(snapshot.is_pending("Sam"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_rejected_name_refused_until_approved() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let mut sub = presenter.subscribe(EventFilter::all());

        presenter
            .submit(Command::RequestAdmission { name: "Sam".into() })
            .unwrap();
        presenter.submit(Command::Reject { name: "Sam".into() }).unwrap();
        presenter
            .submit(Command::RequestAdmission { name: "Sam".into() })
            .unwrap();
        presenter.flush().await.unwrap();

        assert!(!presenter.snapshot().is_pending("Sam"));
        assert!(presenter.snapshot().is_blacklisted("Sam"));

        presenter.submit(Command::Approve { name: "Sam".into() }).unwrap();
        presenter
            .submit(Command::RequestAdmission { name: "Sam".into() })
            .unwrap();
        presenter.flush().await.unwrap();

        assert!(presenter.snapshot().is_pending("Sam"));
        let kinds: Vec<EventKind> = drain(&mut sub).iter().map(SessionEvent::kind).collect();
        assert_eq!(
            kinds,
            vec![
                EventKind::AdmissionRequested,
                EventKind::StudentRejected,
                EventKind::StudentPardoned,
                EventKind::AdmissionRequested,
            ]
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_removed_student_cannot_return() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        admit(&presenter, "Alice").await;

        presenter
            .submit(Command::RemoveStudent { name: "Alice".into() })
            .unwrap();
        presenter
            .submit(Command::RequestAdmission { name: "Alice".into() })
            .unwrap();
        presenter.flush().await.unwrap();

        let snapshot = presenter.snapshot();
        assert!(snapshot.student("Alice").is_none());
        assert!(!snapshot.is_pending("Alice"));
        assert!(snapshot.is_blacklisted("Alice"));
    }

    // =========================================================================
    // TWO CONTEXTS
    // =========================================================================

    #[tokio::test(start_paused = true)]
    async fn test_cleared_poll_reaches_other_context_mid_countdown() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let student = context(&store.connect());
        admit(&presenter, "Alice").await;

        presenter.submit(poll("Q1", &["X", "Y"], 10)).unwrap();
        tokio::time::sleep(Duration::from_millis(5_500)).await;
        settle(&[&presenter, &student]).await;
        assert_eq!(presenter.snapshot().remaining_secs(), 5);
        assert_eq!(student.snapshot().remaining_secs(), 5);

        student.submit(Command::ClearPoll {}).unwrap();
        settle(&[&student, &presenter]).await;

        assert_eq!(presenter.phase(), PollPhase::NoPoll);
        assert_eq!(student.phase(), PollPhase::NoPoll);

        let mut sub = presenter.subscribe(EventFilter::all());
        tokio::time::sleep(Duration::from_secs(10)).await;
        settle(&[&presenter, &student]).await;

        assert!(drain(&mut sub).is_empty());
        assert_eq!(presenter.phase(), PollPhase::NoPoll);
        assert_eq!(student.phase(), PollPhase::NoPoll);
    }

    #[tokio::test(start_paused = true)]
    async fn test_reset_wipes_every_context() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let student = context(&store.connect());
        admit(&presenter, "Alice").await;
        presenter.submit(poll("Q1", &["X", "Y"], 30)).unwrap();
        presenter.flush().await.unwrap();
        student.flush().await.unwrap();
        student
            .submit(Command::SendMessage {
                author: "Alice".into(),
                text: "hello".into(),
                is_presenter: false,
            })
            .unwrap();
        settle(&[&student, &presenter]).await;
        assert_eq!(presenter.chat_messages().len(), 1);

        presenter.submit(Command::ResetSession {}).unwrap();
        settle(&[&presenter, &student]).await;

        for bridge in [&presenter, &student] {
            let snapshot = bridge.snapshot();
            assert!(snapshot.roster().is_empty());
            assert!(snapshot.chat().is_empty());
            assert_eq!(snapshot.phase(), PollPhase::NoPoll);
        }
    }
}
