//! # File-Backed Classroom
//!
//! Contexts that share nothing but a data directory, as separate processes
//! would. These run in real time against the file store watcher.

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use classroom_runtime::{run_console, ClassroomContext, RuntimeConfig};
    use cp_02_session_model::{PollPhase, Session};
    use cp_04_context_bridge::ContextBridge;
    use serde_json::Value;
    use tempfile::TempDir;

    use crate::integration::support::{poll, vote};

    fn start(dir: &TempDir, name: &str) -> ClassroomContext {
        let config = RuntimeConfig {
            context_name: name.to_string(),
            data_dir: dir.path().to_path_buf(),
            watch_interval: Duration::from_millis(20),
            ..RuntimeConfig::default()
        };
        ClassroomContext::start(&config).unwrap()
    }

    async fn wait_until(bridge: &ContextBridge, check: impl Fn(&Session) -> bool) {
        let mut watch = bridge.watch();
        tokio::time::timeout(Duration::from_secs(5), watch.wait_for(|s| check(s)))
            .await
            .expect("context did not converge")
            .unwrap();
    }

    #[tokio::test]
    async fn test_poll_round_trip_through_directory() {
        let dir = TempDir::new().unwrap();
        let presenter = start(&dir, "presenter");
        let student = start(&dir, "student");

        student
            .bridge()
            .submit_named("requestAdmission", serde_json::json!({ "name": "Alice" }));
        wait_until(presenter.bridge(), |s| s.is_pending("Alice")).await;

        presenter
            .bridge()
            .submit_named("approve", serde_json::json!({ "name": "Alice" }));
        presenter.bridge().submit(poll("Q1", &["X", "Y"], 60)).unwrap();
        wait_until(student.bridge(), |s| s.phase() == PollPhase::Active).await;

        student.bridge().submit(vote("Alice", "Y")).unwrap();
        wait_until(presenter.bridge(), |s| s.phase() == PollPhase::Ended).await;
        wait_until(student.bridge(), |s| s.phase() == PollPhase::Ended).await;

        assert_eq!(presenter.bridge().tally().votes_for("Y"), 1);
        assert_eq!(student.bridge().tally().votes_for("Y"), 1);

        presenter.shutdown().await;
        student.shutdown().await;
    }

    #[tokio::test]
    async fn test_restarted_context_resumes_classroom() {
        let dir = TempDir::new().unwrap();
        let first = start(&dir, "presenter");
        first
            .bridge()
            .submit_named("requestAdmission", serde_json::json!({ "name": "Sam" }));
        first.bridge().flush().await.unwrap();
        first.shutdown().await;

        let second = start(&dir, "presenter");
        second.bridge().flush().await.unwrap();
        assert!(second.bridge().snapshot().is_pending("Sam"));
        second.shutdown().await;
    }

    #[tokio::test]
    async fn test_console_drives_file_context() {
        let dir = TempDir::new().unwrap();
        let context = start(&dir, "console");
        let input = concat!(
            r#"{"command": "requestAdmission", "payload": {"name": "Ana"}}"#,
            "\n",
            r#"{"command": "approve", "payload": {"name": "Ana"}}"#,
            "\n",
        );

        let mut output = Vec::new();
        run_console(context.bridge(), input.as_bytes(), &mut output)
            .await
            .unwrap();

        let lines: Vec<Value> = String::from_utf8(output)
            .unwrap()
            .lines()
            .map(|l| serde_json::from_str(l).unwrap())
            .collect();
        assert_eq!(lines.len(), 2);
        assert_eq!(lines[1]["data"]["event"], "studentApproved");

        let stored = std::fs::read_dir(dir.path().join("store")).unwrap().count();
        assert!(stored > 0);
        context.shutdown().await;
    }
}
