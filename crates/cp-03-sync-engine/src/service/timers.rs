//! Poll timers.
//!
//! Timers run as their own tasks and talk to the engine only through its
//! mailbox. They hold a weak sender, so a timer never keeps an engine alive
//! and stops by itself once the engine is gone.

use std::time::Duration;

use shared_types::PollId;
use tokio::sync::mpsc::WeakUnboundedSender;
use tokio::task::JoinHandle;
use tokio::time::{interval_at, sleep, Instant, MissedTickBehavior};
use tracing::trace;

use super::engine::EngineMessage;

/// At most one running timer, tagged with the poll it belongs to.
pub(crate) struct TimerSlot {
    name: &'static str,
    current: Option<(PollId, JoinHandle<()>)>,
}

impl TimerSlot {
    pub(crate) fn new(name: &'static str) -> Self {
        Self {
            name,
            current: None,
        }
    }

    /// Poll the running timer belongs to.
    pub(crate) fn poll_id(&self) -> Option<PollId> {
        self.current
            .as_ref()
            .filter(|(_, handle)| !handle.is_finished())
            .map(|(id, _)| *id)
    }

    /// Install a new timer, aborting the previous one.
    pub(crate) fn replace(&mut self, poll_id: PollId, handle: JoinHandle<()>) {
        self.cancel();
        trace!(timer = self.name, %poll_id, "timer started");
        self.current = Some((poll_id, handle));
    }

    pub(crate) fn cancel(&mut self) {
        if let Some((poll_id, handle)) = self.current.take() {
            handle.abort();
            trace!(timer = self.name, %poll_id, "timer cancelled");
        }
    }
}

impl Drop for TimerSlot {
    fn drop(&mut self) {
        self.cancel();
    }
}

/// Send `CountdownTick` for `poll_id` every `period`, first after one period.
pub(crate) fn spawn_countdown(
    mailbox: WeakUnboundedSender<EngineMessage>,
    poll_id: PollId,
    period: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticks = interval_at(Instant::now() + period, period);
        ticks.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            ticks.tick().await;
            let Some(tx) = mailbox.upgrade() else {
                return;
            };
            if tx.send(EngineMessage::CountdownTick { poll_id }).is_err() {
                return;
            }
        }
    })
}

/// Send `AutoEnd` for `poll_id` once after `delay`.
pub(crate) fn spawn_auto_end(
    mailbox: WeakUnboundedSender<EngineMessage>,
    poll_id: PollId,
    delay: Duration,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        sleep(delay).await;
        if let Some(tx) = mailbox.upgrade() {
            let _ = tx.send(EngineMessage::AutoEnd { poll_id });
        }
    })
}
