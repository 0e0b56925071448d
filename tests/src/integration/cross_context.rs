//! # Cross-Context Synchronisation
//!
//! Several contexts on one shared store: a presenter and student windows.
//!
//! ## Flows Tested
//!
//! 1. **Student → Presenter**: ballots cast in a student context reach the
//!    presenter's tally and close the poll there
//! 2. **Late join**: a context started mid-poll rebuilds the poll and its
//!    ballots from storage alone
//! 3. **Exactly once**: a countdown observed by three contexts ends once
//! 4. **Listeners**: remote events reach local listeners once

#[cfg(test)]
mod tests {
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Arc;
    use std::time::Duration;

    use cp_02_session_model::PollPhase;
    use cp_03_sync_engine::InMemorySharedStore;
    use shared_bus::{EventFilter, EventKind, SessionEvent};
    use shared_types::Command;

    use crate::integration::support::{admit, context, drain, poll, settle, vote};

    #[tokio::test(start_paused = true)]
    async fn test_student_ballots_close_poll_on_presenter() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let alice = context(&store.connect());
        let bob = context(&store.connect());
        admit(&presenter, "Alice").await;
        admit(&presenter, "Bob").await;
        presenter.submit(poll("Q1", &["X", "Y"], 60)).unwrap();
        settle(&[&presenter, &alice, &bob]).await;
        assert_eq!(alice.phase(), PollPhase::Active);

        alice.submit(vote("Alice", "X")).unwrap();
        bob.submit(vote("Bob", "Y")).unwrap();
        settle(&[&alice, &bob, &presenter]).await;

        assert_eq!(presenter.tally().total_votes, 2);
        assert!(presenter.progress().is_complete);

        tokio::time::sleep(Duration::from_millis(1_500)).await;
        settle(&[&presenter, &alice, &bob]).await;

        for bridge in [&presenter, &alice, &bob] {
            assert_eq!(bridge.phase(), PollPhase::Ended);
            let tally = bridge.tally();
            assert_eq!(tally.votes_for("X"), 1);
            assert_eq!(tally.votes_for("Y"), 1);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_late_context_rebuilds_poll_from_storage() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        admit(&presenter, "Alice").await;
        admit(&presenter, "Bob").await;
        admit(&presenter, "Cara").await;
        presenter.submit(poll("Q1", &["X", "Y"], 60)).unwrap();
        presenter.submit(vote("Alice", "X")).unwrap();
        presenter.submit(vote("Bob", "X")).unwrap();
        presenter.flush().await.unwrap();

        let late = context(&store.connect());
        late.flush().await.unwrap();

        assert_eq!(late.phase(), PollPhase::Active);
        assert_eq!(late.tally().votes_for("X"), 2);
        assert_eq!(late.progress().voted, 2);
        assert_eq!(
            late.snapshot().student("Bob").unwrap().selected_option.as_deref(),
            Some("X")
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_countdown_ends_once_across_contexts() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let first = context(&store.connect());
        let second = context(&store.connect());
        admit(&presenter, "Alice").await;
        settle(&[&first, &second]).await;

        let mut subs: Vec<_> = [&presenter, &first, &second]
            .iter()
            .map(|b| b.subscribe(EventFilter::kinds(vec![EventKind::PollEnded])))
            .collect();

        presenter.submit(poll("Q1", &["X", "Y"], 10)).unwrap();
        for _ in 0..12 {
            tokio::time::sleep(Duration::from_secs(1)).await;
            settle(&[&presenter, &first, &second]).await;
        }

        for sub in &mut subs {
            assert_eq!(drain(sub).len(), 1);
        }
        for bridge in [&presenter, &first, &second] {
            assert_eq!(bridge.phase(), PollPhase::Ended);
            assert_eq!(bridge.snapshot().remaining_secs(), 0);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_readmitted_student_has_no_ballot_elsewhere() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let student = context(&store.connect());
        admit(&presenter, "Alice").await;
        admit(&presenter, "Bob").await;
        presenter.submit(poll("Q1", &["X", "Y"], 60)).unwrap();
        settle(&[&presenter, &student]).await;

        student.submit(vote("Alice", "X")).unwrap();
        settle(&[&student, &presenter]).await;
        assert_eq!(presenter.tally().votes_for("X"), 1);

        presenter
            .submit(Command::RemoveStudent { name: "Alice".into() })
            .unwrap();
        presenter.submit(Command::Approve { name: "Alice".into() }).unwrap();
        admit(&presenter, "Alice").await;
        settle(&[&presenter, &student]).await;
        tokio::time::sleep(Duration::from_secs(6)).await;
        settle(&[&presenter, &student]).await;

        for bridge in [&presenter, &student] {
            let snapshot = bridge.snapshot();
            assert_eq!(bridge.tally().votes_for("X"), 0);
            assert!(!snapshot.student("Alice").unwrap().has_answered);
            assert_eq!(snapshot.phase(), PollPhase::Active);
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_remote_event_reaches_listener_once() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let student = context(&store.connect());
        student.flush().await.unwrap();

        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let _guard = presenter.listen(EventKind::AdmissionRequested, move |event| {
            if let SessionEvent::AdmissionRequested { name, .. } = event {
                assert_eq!(name, "Sam");
                counter.fetch_add(1, Ordering::SeqCst);
            }
        });

        student
            .submit(Command::RequestAdmission { name: "Sam".into() })
            .unwrap();
        settle(&[&student, &presenter]).await;
        presenter.engine().resync().unwrap();
        settle(&[&presenter]).await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert!(presenter.snapshot().is_pending("Sam"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_chat_converges() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let student = context(&store.connect());
        settle(&[&presenter, &student]).await;

        presenter
            .submit(Command::SendMessage {
                author: "Teacher".into(),
                text: "Welcome".into(),
                is_presenter: true,
            })
            .unwrap();
        settle(&[&presenter, &student]).await;
        student
            .submit(Command::SendMessage {
                author: "Alice".into(),
                text: "Hi".into(),
                is_presenter: false,
            })
            .unwrap();
        settle(&[&student, &presenter]).await;

        let texts = |messages: Vec<shared_types::ChatMessage>| -> Vec<String> {
            messages.into_iter().map(|m| m.text).collect()
        };
        assert_eq!(texts(presenter.chat_messages()), vec!["Welcome", "Hi"]);
        assert_eq!(texts(student.chat_messages()), vec!["Welcome", "Hi"]);
    }
}
