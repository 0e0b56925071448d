//! # Storage Faults
//!
//! Contexts keep working when the shared store misbehaves, and converge
//! once it recovers.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use cp_02_session_model::PollPhase;
    use cp_03_sync_engine::{InMemorySharedStore, SharedStore};
    use shared_bus::EventFilter;
    use shared_types::Command;

    use crate::integration::support::{admit, context, drain, poll, settle, vote};

    #[tokio::test(start_paused = true)]
    async fn test_failed_writes_reach_others_after_recovery() {
        let store = InMemorySharedStore::new();
        let connection = store.connect();
        let presenter = context(&connection);
        let student = context(&store.connect());
        settle(&[&presenter, &student]).await;

        connection.fail_writes(true);
        presenter
            .submit(Command::RequestAdmission { name: "Sam".into() })
            .unwrap();
        settle(&[&presenter, &student]).await;
        assert!(presenter.snapshot().is_pending("Sam"));
        assert!(!student.snapshot().is_pending("Sam"));

        connection.fail_writes(false);
        presenter.engine().resync().unwrap();
        settle(&[&presenter, &student]).await;

        assert!(student.snapshot().is_pending("Sam"));
    }

    #[tokio::test(start_paused = true)]
    async fn test_failed_ballot_retried() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        let connection = store.connect();
        let student = context(&connection);
        admit(&presenter, "Alice").await;
        admit(&presenter, "Bob").await;
        presenter.submit(poll("Q1", &["X", "Y"], 60)).unwrap();
        settle(&[&presenter, &student]).await;

        connection.fail_writes(true);
        student.submit(vote("Alice", "Y")).unwrap();
        settle(&[&student, &presenter]).await;
        assert_eq!(student.tally().votes_for("Y"), 1);
        assert_eq!(presenter.tally().votes_for("Y"), 0);

        connection.fail_writes(false);
        student.engine().resync().unwrap();
        settle(&[&student, &presenter]).await;

        assert_eq!(presenter.tally().votes_for("Y"), 1);
        assert_eq!(student.tally().total_votes, 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_corrupt_value_ignored_until_repaired() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        admit(&presenter, "Alice").await;
        presenter.submit(poll("Q1", &["X", "Y"], 60)).unwrap();
        presenter.flush().await.unwrap();

        let vandal = store.connect();
        vandal
            .set("classpoll:current-poll", "{\"id\": 42".into())
            .unwrap();
        presenter.flush().await.unwrap();
        assert_eq!(presenter.phase(), PollPhase::Active);

        let student = context(&store.connect());
        student.flush().await.unwrap();
        assert_eq!(student.phase(), PollPhase::NoPoll);
        assert!(student.snapshot().student("Alice").is_some());

        presenter.submit(Command::EndPoll {}).unwrap();
        settle(&[&presenter, &student]).await;

        assert_eq!(student.phase(), PollPhase::Ended);
    }

    #[tokio::test(start_paused = true)]
    async fn test_unrelated_keys_ignored() {
        let store = InMemorySharedStore::new();
        let presenter = context(&store);
        presenter.flush().await.unwrap();
        let mut sub = presenter.subscribe(EventFilter::all());

        let other = store.connect();
        other.set("another-app:theme", "dark".into()).unwrap();
        other.set("classpoll:unknown-field", "[]".into()).unwrap();
        other.set("classpoll:event:fireworks", "{}".into()).unwrap();
        presenter.flush().await.unwrap();
        tokio::time::sleep(Duration::from_secs(6)).await;
        presenter.flush().await.unwrap();

        assert!(drain(&mut sub).is_empty());
        assert_eq!(presenter.snapshot().phase(), PollPhase::NoPoll);
    }
}
