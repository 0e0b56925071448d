//! # Sync Engine
//!
//! One engine per context. The engine task exclusively owns the context's
//! `Session`; everything else talks to it through the mailbox.
//!
//! ## Loop
//!
//! ```text
//!           ┌──────────── biased select ─────────────┐
//!  store ──→│ 1. change feed   (coalesced per batch) │──→ resync / replay
//!  handle ─→│ 2. mailbox       (commands, timers)    │──→ apply → commit
//!  clock ──→│ 3. periodic resync                     │──→ retry + resync
//!           └────────────────────────────────────────┘
//! ```
//!
//! ## Commit Order
//!
//! 1. Ballot records and touched snapshot fields are written.
//! 2. Event markers are written for other contexts.
//! 3. The snapshot watch channel is updated.
//! 4. Events go to registered listeners, then to bus subscribers.
//!
//! Countdown and auto-close timers belong to the context that started the
//! poll, so a poll is ended exactly once no matter how many contexts watch
//! it.
//!
//! ## Overdue Polls
//!
//! After every resync an active poll is closed when it is overdue: the
//! starting context closes it once the stored countdown reads zero, and any
//! context closes it once its wall-clock deadline has passed.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use cp_02_session_model::{touched_fields, ApplyContext, Rejection, Session, SnapshotKey};
use poll_telemetry::{
    metric_inc, time_histogram, ACTIVE_STUDENTS, COMMANDS_APPLIED, COMMANDS_REJECTED,
    COMMAND_DURATION, DUPLICATE_VOTES, EVENTS_REPLAYED, MARKERS_REFUSED, PENDING_ADMISSIONS,
    RESYNCS, STORAGE_FAILURES, VOTES_RECORDED,
};
use shared_bus::{
    EventKind, EventPublisher, InMemoryEventBus, ListenerRegistry, ReplayError, SessionEvent,
    TimeBoundedReplayGuard,
};
use shared_types::{Command, ContextId, PollId, Timestamp};
use tokio::sync::broadcast::error::{RecvError, TryRecvError};
use tokio::sync::{broadcast, mpsc, oneshot, watch};
use tokio::task::JoinHandle;
use tokio::time::{interval_at, Instant, Interval, MissedTickBehavior};
use tracing::{debug, info, trace, warn};

use super::handle::{EngineError, EngineHandle};
use super::timers::{spawn_auto_end, spawn_countdown, TimerSlot};
use crate::config::EngineConfig;
use crate::domain::{BallotGuard, BallotRecord, EventMarker, KeyKind, KeyLayout};
use crate::ports::{SharedStore, StorageChange, StoreError, SystemTimeSource, TimeSource};

/// Everything the engine task can be asked to do.
#[derive(Debug)]
pub(crate) enum EngineMessage {
    Submit(Command),
    CountdownTick { poll_id: PollId },
    AutoEnd { poll_id: PollId },
    Resync,
    Flush(oneshot::Sender<()>),
    Shutdown,
}

/// The per-context synchronization actor.
pub struct SyncEngine {
    store: Arc<dyn SharedStore>,
    origin: ContextId,
    keys: KeyLayout,
    config: EngineConfig,
    clock: Arc<dyn TimeSource>,

    session: Session,
    ballots: BallotGuard,
    replay: TimeBoundedReplayGuard,

    mailbox: mpsc::UnboundedReceiver<EngineMessage>,
    timer_tx: mpsc::WeakUnboundedSender<EngineMessage>,
    changes: broadcast::Receiver<StorageChange>,
    snapshot_tx: watch::Sender<Session>,
    bus: Arc<InMemoryEventBus>,
    listeners: Arc<ListenerRegistry>,

    countdown: TimerSlot,
    auto_end: TimerSlot,
    /// Last poll this context started.
    created_poll: Option<PollId>,

    /// Fields whose last write failed; kept local until rewritten.
    failed_fields: BTreeSet<SnapshotKey>,
    /// Ballot key -> record JSON, for ballots whose write failed.
    failed_ballots: BTreeMap<String, String>,
}

impl SyncEngine {
    /// Start an engine on the system clock.
    ///
    /// Must be called from within a Tokio runtime. The store connection
    /// must be this context's own, since changes carrying its origin are
    /// treated as local echoes.
    ///
    /// # Errors
    ///
    /// `EngineError::Config` if `config` does not validate.
    pub fn spawn(
        store: Arc<dyn SharedStore>,
        config: EngineConfig,
    ) -> Result<(EngineHandle, JoinHandle<()>), EngineError> {
        Self::spawn_with_clock(store, config, Arc::new(SystemTimeSource))
    }

    /// Start an engine with an explicit clock.
    ///
    /// # Errors
    ///
    /// `EngineError::Config` if `config` does not validate.
    pub fn spawn_with_clock(
        store: Arc<dyn SharedStore>,
        config: EngineConfig,
        clock: Arc<dyn TimeSource>,
    ) -> Result<(EngineHandle, JoinHandle<()>), EngineError> {
        config.validate()?;

        let (tx, rx) = mpsc::unbounded_channel();
        let (snapshot_tx, snapshot_rx) = watch::channel(Session::default());
        let bus = Arc::new(InMemoryEventBus::new());
        let listeners = Arc::new(ListenerRegistry::new());
        // Subscribe before the task starts so no change is missed.
        let changes = store.subscribe_changes();
        let origin = store.origin();

        let engine = Self {
            origin,
            keys: KeyLayout::new(config.key_prefix.clone()),
            replay: TimeBoundedReplayGuard::with_max_age(config.marker_max_age),
            config,
            store,
            clock,
            session: Session::default(),
            ballots: BallotGuard::new(),
            mailbox: rx,
            timer_tx: tx.downgrade(),
            changes,
            snapshot_tx,
            bus: bus.clone(),
            listeners: listeners.clone(),
            countdown: TimerSlot::new("countdown"),
            auto_end: TimerSlot::new("auto-end"),
            created_poll: None,
            failed_fields: BTreeSet::new(),
            failed_ballots: BTreeMap::new(),
        };

        let handle = EngineHandle::new(origin, tx, snapshot_rx, bus, listeners);
        let task = tokio::spawn(engine.run());
        Ok((handle, task))
    }

    async fn run(mut self) {
        info!("[cp-03] Sync engine started for context {}", self.origin);
        self.resync("startup").await;

        let mut periodic = self.config.resync_interval.map(|period| {
            let mut interval = interval_at(Instant::now() + period, period);
            interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
            interval
        });
        let mut feed_open = true;

        loop {
            tokio::select! {
                biased;

                change = self.changes.recv(), if feed_open => match change {
                    Ok(first) => self.on_changes(first).await,
                    Err(RecvError::Lagged(missed)) => {
                        warn!("[cp-03] Change feed lagged by {} entries", missed);
                        self.resync("lagged").await;
                    }
                    Err(RecvError::Closed) => {
                        warn!("[cp-03] Change feed closed; relying on periodic resync");
                        feed_open = false;
                    }
                },

                message = self.mailbox.recv() => match message {
                    Some(EngineMessage::Shutdown) | None => break,
                    Some(message) => self.handle(message).await,
                },

                () = next_tick(&mut periodic) => {
                    self.retry_failed_writes();
                    self.resync("periodic").await;
                }
            }
        }

        self.countdown.cancel();
        self.auto_end.cancel();
        info!("[cp-03] Sync engine stopped for context {}", self.origin);
    }

    async fn handle(&mut self, message: EngineMessage) {
        match message {
            EngineMessage::Submit(command) => self.execute(command).await,
            EngineMessage::CountdownTick { poll_id } => self.on_tick(poll_id).await,
            EngineMessage::AutoEnd { poll_id } => self.on_auto_end(poll_id).await,
            EngineMessage::Resync => {
                self.retry_failed_writes();
                self.resync("manual").await;
            }
            EngineMessage::Flush(done) => {
                let _ = done.send(());
            }
            EngineMessage::Shutdown => {}
        }
    }

    // =========================================================================
    // COMMANDS
    // =========================================================================

    async fn execute(&mut self, command: Command) {
        let _timer = time_histogram!(COMMAND_DURATION);

        if let Command::SubmitVote { student_name, .. } = &command {
            if let Some(poll_id) = self.session.active_poll_id() {
                if self.already_voted(poll_id, student_name) {
                    metric_inc!(DUPLICATE_VOTES);
                    debug!(student = %student_name, "Duplicate ballot ignored");
                    return;
                }
            }
        }

        let ctx = ApplyContext::new(self.clock.now(), &self.config.limits);
        match self.session.apply(&command, &ctx) {
            Ok(events) => {
                metric_inc!(COMMANDS_APPLIED, &[command.name()]);
                self.commit(events).await;
            }
            Err(rejection) => {
                if matches!(rejection, Rejection::AlreadyAnswered(_)) {
                    metric_inc!(DUPLICATE_VOTES);
                }
                metric_inc!(COMMANDS_REJECTED, &[rejection.reason()]);
                debug!(
                    command = command.name(),
                    reason = rejection.reason(),
                    "Command rejected: {}",
                    rejection
                );
            }
        }
    }

    /// Locally remembered, or already on file in the shared store.
    fn already_voted(&self, poll_id: PollId, student_name: &str) -> bool {
        if self.ballots.contains(poll_id, student_name) {
            return true;
        }
        match self.store.get(&self.keys.ballot(poll_id, student_name)) {
            Ok(found) => found.is_some(),
            Err(e) => {
                metric_inc!(STORAGE_FAILURES, &["get"]);
                warn!("[cp-03] Could not read ballot for {}: {}", student_name, e);
                false
            }
        }
    }

    async fn on_tick(&mut self, poll_id: PollId) {
        if self.countdown.poll_id() != Some(poll_id) {
            trace!(%poll_id, "Ignoring tick from a replaced countdown");
            return;
        }
        let ctx = ApplyContext::new(self.clock.now(), &self.config.limits);
        match self.session.countdown_tick(poll_id, &ctx) {
            Ok(events) => self.commit(events).await,
            Err(rejection) => {
                debug!(%poll_id, "Countdown stopped: {}", rejection);
                self.countdown.cancel();
            }
        }
    }

    async fn on_auto_end(&mut self, poll_id: PollId) {
        if self.session.active_poll_id() != Some(poll_id) || !self.session.all_answered() {
            return;
        }
        info!("[cp-03] Every student answered; closing poll {}", poll_id);
        self.execute(Command::EndPoll {}).await;
    }

    // =========================================================================
    // COMMIT
    // =========================================================================

    async fn commit(&mut self, events: Vec<SessionEvent>) {
        self.retry_failed_ballots();
        let now = self.clock.now();
        let mut fields = std::mem::take(&mut self.failed_fields);

        for event in &events {
            fields.extend(touched_fields(event).iter().copied());
            match event {
                SessionEvent::VoteRecorded {
                    poll_id,
                    student_name,
                    option,
                } => {
                    metric_inc!(VOTES_RECORDED);
                    self.ballots.record(*poll_id, student_name);
                    self.write_ballot(&BallotRecord {
                        poll_id: *poll_id,
                        student_name: student_name.clone(),
                        option: option.clone(),
                        cast_at: now,
                    });
                }
                SessionEvent::PollStarted { poll } => {
                    self.created_poll = Some(poll.id);
                    self.ballots.reset(Some(poll.id));
                    let timer = spawn_countdown(
                        self.timer_tx.clone(),
                        poll.id,
                        self.config.tick_interval,
                    );
                    self.countdown.replace(poll.id, timer);
                    self.auto_end.cancel();
                    self.prune_ballots(Some(poll.id));
                }
                SessionEvent::PollEnded { .. } => {
                    self.countdown.cancel();
                    self.auto_end.cancel();
                }
                SessionEvent::StudentRemoved { name } => self.forget_ballot(name),
                SessionEvent::PollCleared { .. } | SessionEvent::SessionReset => {
                    self.created_poll = None;
                    self.countdown.cancel();
                    self.auto_end.cancel();
                    self.ballots.reset(None);
                    self.prune_ballots(None);
                }
                _ => {}
            }
        }

        self.persist(fields);
        for event in &events {
            self.write_marker(event, now);
        }
        self.publish_snapshot();
        for event in events {
            self.deliver(event).await;
        }
        self.reconcile_timers();
    }

    fn persist(&mut self, fields: BTreeSet<SnapshotKey>) {
        for key in fields {
            let written = self
                .session
                .encode_field(key)
                .map_err(StoreError::from)
                .and_then(|raw| self.store.set(&self.keys.field(key), raw));
            if let Err(e) = written {
                metric_inc!(STORAGE_FAILURES, &["set"]);
                warn!(field = key.as_str(), "[cp-03] Field not persisted, will retry: {}", e);
                self.failed_fields.insert(key);
            }
        }
    }

    fn write_ballot(&mut self, record: &BallotRecord) {
        let key = self.keys.ballot(record.poll_id, &record.student_name);
        let raw = match serde_json::to_string(record) {
            Ok(raw) => raw,
            Err(e) => {
                warn!("[cp-03] Could not encode ballot: {}", e);
                return;
            }
        };
        if let Err(e) = self.store.set(&key, raw.clone()) {
            metric_inc!(STORAGE_FAILURES, &["set"]);
            warn!("[cp-03] Ballot not persisted, will retry: {}", e);
            self.failed_ballots.insert(key, raw);
        }
    }

    fn write_marker(&mut self, event: &SessionEvent, now: Timestamp) {
        let marker = EventMarker::new(self.origin, now, event.clone());
        self.replay.record(marker.id, now);
        let written = serde_json::to_string(&marker)
            .map_err(StoreError::from)
            .and_then(|raw| self.store.set(&self.keys.event(event.kind()), raw));
        if let Err(e) = written {
            metric_inc!(STORAGE_FAILURES, &["set"]);
            warn!(event = %event.kind(), "[cp-03] Event marker not written: {}", e);
        }
    }

    /// Drop a removed student's ballot for the current poll.
    ///
    /// The duplicate guard keeps its entry, so the name still cannot vote
    /// twice in this poll.
    fn forget_ballot(&mut self, name: &str) {
        let Some(poll_id) = self.session.current_poll().map(|p| p.id) else {
            return;
        };
        let key = self.keys.ballot(poll_id, name);
        self.failed_ballots.remove(&key);
        if let Err(e) = self.store.remove(&key) {
            metric_inc!(STORAGE_FAILURES, &["remove"]);
            warn!("[cp-03] Ballot of removed student {} not deleted: {}", name, e);
        }
    }

    /// Drop stored ballots of every poll except `keep`.
    fn prune_ballots(&mut self, keep: Option<PollId>) {
        self.failed_ballots
            .retain(|key, _| matches!(self.keys.parse(key), KeyKind::Ballot { poll_id } if Some(poll_id) == keep));

        let keys = match self.store.keys_with_prefix(&self.keys.all_ballots_prefix()) {
            Ok(keys) => keys,
            Err(e) => {
                metric_inc!(STORAGE_FAILURES, &["scan"]);
                warn!("[cp-03] Could not list ballots: {}", e);
                return;
            }
        };
        let stale = keys.into_iter().filter(|key| {
            !matches!(self.keys.parse(key), KeyKind::Ballot { poll_id } if Some(poll_id) == keep)
        });
        for key in stale {
            if let Err(e) = self.store.remove(&key) {
                metric_inc!(STORAGE_FAILURES, &["remove"]);
                debug!(%key, "Stale ballot not removed: {}", e);
            }
        }
    }

    fn retry_failed_writes(&mut self) {
        self.retry_failed_ballots();
        if !self.failed_fields.is_empty() {
            let fields = std::mem::take(&mut self.failed_fields);
            self.persist(fields);
            if self.failed_fields.is_empty() {
                info!("[cp-03] Shared store writes recovered");
            }
        }
    }

    fn retry_failed_ballots(&mut self) {
        let pending = std::mem::take(&mut self.failed_ballots);
        for (key, raw) in pending {
            if let Err(e) = self.store.set(&key, raw.clone()) {
                trace!(%key, "Ballot retry failed: {}", e);
                self.failed_ballots.insert(key, raw);
            }
        }
    }

    async fn deliver(&self, event: SessionEvent) {
        self.listeners.dispatch(&event);
        self.bus.publish(event).await;
    }

    fn publish_snapshot(&self) {
        ACTIVE_STUDENTS.set(self.session.roster().len() as f64);
        PENDING_ADMISSIONS.set(self.session.pending().len() as f64);

        let session = &self.session;
        self.snapshot_tx.send_if_modified(|current| {
            if current == session {
                return false;
            }
            *current = session.clone();
            true
        });
    }

    fn reconcile_timers(&mut self) {
        let active = self.session.active_poll_id();
        if self.countdown.poll_id().is_some() && self.countdown.poll_id() != active {
            self.countdown.cancel();
        }

        let owned = active.is_some() && self.countdown.poll_id() == active;
        match active {
            Some(poll_id) if owned && self.session.all_answered() => {
                if self.auto_end.poll_id() != Some(poll_id) {
                    let timer = spawn_auto_end(
                        self.timer_tx.clone(),
                        poll_id,
                        self.config.auto_end_debounce,
                    );
                    self.auto_end.replace(poll_id, timer);
                }
            }
            _ => self.auto_end.cancel(),
        }
    }

    // =========================================================================
    // SYNCHRONISATION
    // =========================================================================

    async fn on_changes(&mut self, first: StorageChange) {
        let mut batch = vec![first];
        let mut lagged = false;
        loop {
            match self.changes.try_recv() {
                Ok(change) => batch.push(change),
                Err(TryRecvError::Lagged(_)) => lagged = true,
                Err(_) => break,
            }
        }

        let mut stale = lagged;
        let mut markers = Vec::new();
        for change in batch {
            if change.origin == self.origin {
                continue;
            }
            match self.keys.parse(&change.key) {
                KeyKind::Field(_) | KeyKind::Ballot { .. } => stale = true,
                KeyKind::Event(kind) => {
                    if let Some(raw) = change.new_value {
                        markers.push((kind, raw));
                    }
                }
                KeyKind::Unknown => trace!(key = %change.key, "Ignoring unknown key"),
                KeyKind::Foreign => {}
            }
        }

        if stale {
            self.resync(if lagged { "lagged" } else { "remote" }).await;
        }
        for (kind, raw) in markers {
            self.replay_marker(kind, &raw).await;
        }
    }

    /// Rebuild the session from the shared store.
    ///
    /// Absent fields revert to defaults, malformed ones keep the local
    /// value, and fields with an unwritten local change are left alone.
    async fn resync(&mut self, trigger: &'static str) {
        metric_inc!(RESYNCS, &[trigger]);
        let mut next = self.session.clone();

        for key in SnapshotKey::ALL {
            if self.failed_fields.contains(&key) {
                continue;
            }
            match self.store.get(&self.keys.field(key)) {
                Ok(Some(raw)) => {
                    if let Err(e) = next.decode_field(key, &raw) {
                        warn!(field = key.as_str(), "[cp-03] Malformed field kept local: {}", e);
                    }
                }
                Ok(None) => next.clear_field(key),
                Err(e) => {
                    metric_inc!(STORAGE_FAILURES, &["get"]);
                    warn!(field = key.as_str(), "[cp-03] Field read failed: {}", e);
                }
            }
        }

        next.normalize();
        if let Some(poll_id) = next.current_poll().map(|p| p.id) {
            self.overlay_ballots(&mut next, poll_id);
        }
        next.reconcile_tally();

        if next != self.session {
            debug!(trigger, "Session changed by resync");
        }
        self.session = next;
        self.ballots.sync_from(&self.session);
        self.publish_snapshot();
        self.reconcile_timers();
        self.expire_overdue_poll().await;
    }

    /// End an active poll that should already be closed.
    ///
    /// Covers a stale write reopening a finished poll and a poll whose
    /// starting context went away before the countdown ran out.
    async fn expire_overdue_poll(&mut self) {
        let Some(poll_id) = self.session.active_poll_id() else {
            return;
        };
        let owner = self.created_poll == Some(poll_id);
        let counted_out = owner && self.session.remaining_secs() == 0;
        if !counted_out && !self.session.past_deadline(self.clock.now()) {
            return;
        }
        info!("[cp-03] Poll {} outlived its countdown; closing it", poll_id);
        self.execute(Command::EndPoll {}).await;
    }

    /// Fold every stored ballot of `poll_id` into `session`.
    fn overlay_ballots(&self, session: &mut Session, poll_id: PollId) {
        let keys = match self.store.keys_with_prefix(&self.keys.ballot_prefix(poll_id)) {
            Ok(keys) => keys,
            Err(e) => {
                metric_inc!(STORAGE_FAILURES, &["scan"]);
                warn!("[cp-03] Could not list ballots: {}", e);
                return;
            }
        };

        let stored = keys.iter().filter_map(|key| match self.store.get(key) {
            Ok(raw) => raw,
            Err(e) => {
                metric_inc!(STORAGE_FAILURES, &["get"]);
                debug!(%key, "Ballot read failed: {}", e);
                None
            }
        });
        let unwritten = self.failed_ballots.values().cloned();

        for raw in stored.chain(unwritten) {
            match serde_json::from_str::<BallotRecord>(&raw) {
                Ok(record) if record.poll_id == poll_id => {
                    session.absorb_ballot(poll_id, &record.ballot());
                }
                Ok(_) => {}
                Err(e) => warn!("[cp-03] Malformed ballot record skipped: {}", e),
            }
        }
    }

    async fn replay_marker(&mut self, kind: EventKind, raw: &str) {
        let marker: EventMarker = match serde_json::from_str(raw) {
            Ok(marker) => marker,
            Err(e) => {
                metric_inc!(MARKERS_REFUSED, &["malformed"]);
                warn!(event = %kind, "[cp-03] Malformed event marker: {}", e);
                return;
            }
        };
        if marker.origin == self.origin {
            return;
        }
        if marker.event.kind() != kind {
            metric_inc!(MARKERS_REFUSED, &["malformed"]);
            warn!(
                "[cp-03] Marker under {} carries a {} event",
                kind,
                marker.event.kind()
            );
            return;
        }

        match self
            .replay
            .check_and_record(marker.id, marker.timestamp, self.clock.now())
        {
            Ok(()) => {
                metric_inc!(EVENTS_REPLAYED, &[kind.as_str()]);
                trace!(event = %kind, origin = %marker.origin, "Replaying remote event");
                self.deliver(marker.event).await;
            }
            Err(refused) => {
                let cause = match refused {
                    ReplayError::Duplicate { .. } => "duplicate",
                    ReplayError::TooOld { .. } => "too_old",
                    ReplayError::FromFuture { .. } => "from_future",
                };
                metric_inc!(MARKERS_REFUSED, &[cause]);
                debug!(event = %kind, cause, "Marker refused: {}", refused);
            }
        }
    }
}

async fn next_tick(interval: &mut Option<Interval>) {
    match interval {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}
