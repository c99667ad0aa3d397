use crate::error::SchedulerError;
use crate::gh::{PrCreator, PrForm, PrRequest};
use crate::registry::PendingPr;
use crate::store::{self, History, State};
use crate::timer::TimerQueue;
use chrono::{DateTime, Utc};
use std::path::PathBuf;

/// Outcome of one fired schedule, surfaced to the user. The record is
/// gone from the registry either way; a failed creation must be
/// re-scheduled manually.
#[derive(Debug)]
pub struct FireReport {
    pub id: u64,
    pub title: String,
    pub outcome: Result<(), SchedulerError>,
}

impl FireReport {
    pub fn message(&self) -> String {
        match &self.outcome {
            Ok(()) => format!("PR #{} \"{}\" created successfully", self.id, self.title),
            Err(e) => format!("PR #{} \"{}\" failed: {e}", self.id, self.title),
        }
    }
}

/// Owns the pending-PR registry, the suggestion history, the timer
/// queue and the creator. Everything runs on the event-loop thread;
/// state is persisted wholesale after every mutation.
pub struct Scheduler<C: PrCreator> {
    state: State,
    timers: TimerQueue,
    creator: C,
    state_path: PathBuf,
    missed_on_load: Vec<u64>,
    persist_warning: Option<String>,
}

impl<C: PrCreator> Scheduler<C> {
    /// Re-arms a timer for every loaded record still in the future.
    /// Records whose time already passed are kept, unarmed, and
    /// reported as missed; the user reschedules or cancels them.
    pub fn new(mut state: State, state_path: PathBuf, creator: C, now: DateTime<Utc>) -> Self {
        let mut timers = TimerQueue::default();
        let mut missed_on_load = Vec::new();

        for record in state.registry.iter_mut() {
            if record.scheduled_at > now {
                record.timer = Some(timers.arm(record.id, record.scheduled_at));
            } else {
                missed_on_load.push(record.id);
            }
        }

        Self {
            state,
            timers,
            creator,
            state_path,
            missed_on_load,
            persist_warning: None,
        }
    }

    /// Validates the form and creates the PR immediately, blocking
    /// until `gh` returns. Never touches the registry.
    pub fn create_now(&mut self, form: &PrForm) -> Result<(), SchedulerError> {
        let request = form.validate()?;
        self.state.history.record(form);
        self.persist();
        self.creator.create(&request)
    }

    /// Schedules a PR for `when`, which must be strictly in the future.
    /// Returns the fresh id.
    pub fn schedule(
        &mut self,
        form: &PrForm,
        when: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, SchedulerError> {
        let request = form.validate()?;
        if when <= now {
            return Err(SchedulerError::TimeNotInFuture);
        }

        self.state.history.record(form);
        let id = self.arm_and_insert(request, when);
        self.persist();
        Ok(id)
    }

    /// Disarms and removes a scheduled PR. False if the id is unknown
    /// (including already fired or already cancelled).
    pub fn cancel(&mut self, id: u64) -> bool {
        let Some(record) = self.state.registry.remove(id) else {
            return false;
        };
        if let Some(handle) = record.timer {
            self.timers.disarm(handle);
        }
        self.persist();
        true
    }

    /// Moves a scheduled PR to a new time by cancelling the old entry
    /// and re-entering the scheduling path with its captured fields.
    /// The old id is retired; the new one is returned.
    pub fn reschedule(
        &mut self,
        id: u64,
        new_when: DateTime<Utc>,
        now: DateTime<Utc>,
    ) -> Result<u64, SchedulerError> {
        let request = self
            .state
            .registry
            .get(id)
            .map(PendingPr::request)
            .ok_or(SchedulerError::UnknownId(id))?;
        if new_when <= now {
            return Err(SchedulerError::TimeNotInFuture);
        }

        self.cancel(id);
        let new_id = self.arm_and_insert(request, new_when);
        self.persist();
        Ok(new_id)
    }

    /// Drains expired timers and fires each record: invoke the creator,
    /// remove the record regardless of outcome, report what happened.
    /// Called by the event loop every iteration.
    pub fn tick(&mut self, now: DateTime<Utc>) -> Vec<FireReport> {
        let due = self.timers.pop_due(now);
        let mut reports = Vec::new();

        for id in due {
            // Absent means cancelled in the same loop turn; nothing to do.
            let Some(record) = self.state.registry.remove(id) else {
                continue;
            };
            let outcome = self.creator.create(&record.request());
            reports.push(FireReport {
                id,
                title: record.title,
                outcome,
            });
        }

        if !reports.is_empty() {
            self.persist();
        }
        reports
    }

    pub fn pending(&self) -> impl Iterator<Item = &PendingPr> {
        self.state.registry.iter()
    }

    pub fn pending_count(&self) -> usize {
        self.state.registry.len()
    }

    pub fn is_empty(&self) -> bool {
        self.state.registry.is_empty()
    }

    pub fn history(&self) -> &History {
        &self.state.history
    }

    /// Ids loaded with an already-past schedule; still in the registry.
    pub fn missed_on_load(&self) -> &[u64] {
        &self.missed_on_load
    }

    pub fn next_deadline(&self) -> Option<DateTime<Utc>> {
        self.timers.next_deadline()
    }

    /// A failed state write does not fail the operation; the warning is
    /// held here until someone shows it.
    pub fn take_persist_warning(&mut self) -> Option<String> {
        self.persist_warning.take()
    }

    fn arm_and_insert(&mut self, request: PrRequest, when: DateTime<Utc>) -> u64 {
        let id = self.state.registry.next_id();
        let handle = self.timers.arm(id, when);
        self.state.registry.insert(PendingPr {
            id,
            repo: request.repo,
            head: request.head,
            base: request.base,
            title: request.title,
            body: request.body,
            local_path: request.local_path,
            scheduled_at: when,
            timer: Some(handle),
        });
        id
    }

    fn persist(&mut self) {
        if let Err(e) = store::save_state(&self.state_path, &self.state) {
            self.persist_warning = Some(format!("Failed to save state: {e}"));
        }
    }
}
