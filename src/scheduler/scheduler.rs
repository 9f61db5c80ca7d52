use super::availability::{Availability, AvailabilityStore};
use super::command::{install_spec, probe_spec, trace_spec, RunOptions, SourceScratch};
use super::delivery::{
    classify, indicates_missing_module, install_prompt_message, launch_failure_message,
    DeliveryKind, Notice, TraceDelivery,
};
use super::launcher::{Completion, LaunchTag, ProcessLauncher, ProcessOutcome};
use super::state::{Phase, RunState, TraceRun};
use super::{DocumentId, DocumentSnapshot, RunToken, Trigger};
use crate::error::{InstallError, LaunchError};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::time::Instant;
use tracing::{debug, info, warn};

/// What a request (or a fired timer) turned into.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RunDecision {
    Launched(RunToken),
    Debounced { due: Instant },
    /// Parked until the availability probe for the interpreter answers.
    AwaitingAvailability,
    NotRun(NotRunReason),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotRunReason {
    /// The tracer is not importable; an install prompt was raised instead.
    Unavailable,
    /// Spawning failed; an infrastructure delivery was queued.
    LaunchFailed,
    NoRequest,
}

#[derive(Debug, Default)]
struct DocumentSlot {
    /// Most recent request; what a timer, probe or install re-issues.
    request: Option<DocumentSnapshot>,
    due: Option<Instant>,
    /// Interpreter whose availability verdict this document is waiting on.
    gated_on: Option<PathBuf>,
    prompted: bool,
    latest: Option<RunToken>,
    active: Option<TraceRun>,
    /// The last run that stopped, and how.
    ended: Option<(RunToken, RunState)>,
    /// Holds the `{file}` copy; dropped (and deleted) with the slot.
    scratch: Option<SourceScratch>,
}

impl DocumentSlot {
    /// Kill whatever is running. Its completion can no longer match `latest`.
    fn supersede_active(&mut self, document: &DocumentId) {
        if let Some(mut run) = self.active.take() {
            debug!(document = %document, token = run.token.0, "superseding running trace");
            if let Err(e) = run.supersede() {
                warn!(document = %document, token = run.token.0, error = %e, "superseded tracer could not be killed");
            }
            self.ended = Some((run.token, run.state));
        }
        self.latest = None;
    }
}

/// Per-document debounce, single-flight and availability gating.
pub struct TraceScheduler<L> {
    launcher: L,
    availability: AvailabilityStore,
    options: RunOptions,
    documents: HashMap<DocumentId, DocumentSlot>,
    next_token: u64,
    notices: Vec<Notice>,
}

impl<L: ProcessLauncher> TraceScheduler<L> {
    pub fn new(launcher: L, availability: AvailabilityStore, options: RunOptions) -> Self {
        Self {
            launcher,
            availability,
            options,
            documents: HashMap::new(),
            next_token: 0,
            notices: Vec::new(),
        }
    }

    pub fn options(&self) -> &RunOptions {
        &self.options
    }

    pub fn availability(&self) -> &AvailabilityStore {
        &self.availability
    }

    pub fn launcher(&self) -> &L {
        &self.launcher
    }

    pub fn launcher_mut(&mut self) -> &mut L {
        &mut self.launcher
    }

    /// Drain everything the host has not seen yet, oldest first.
    pub fn take_notices(&mut self) -> Vec<Notice> {
        std::mem::take(&mut self.notices)
    }

    pub fn request_run(
        &mut self,
        snapshot: DocumentSnapshot,
        trigger: Trigger,
        now: Instant,
    ) -> RunDecision {
        let id = snapshot.id.clone();
        let debounce = self.options.debounce;
        let slot = self.documents.entry(id.clone()).or_default();
        slot.request = Some(snapshot);

        match trigger {
            Trigger::OnChangeDebounced => {
                let due = now + debounce;
                slot.due = Some(due);
                debug!(document = %id, "debounce timer reset");
                RunDecision::Debounced { due }
            }
            Trigger::OnSave | Trigger::Explicit => {
                slot.due = None;
                self.launch_latest(&id)
            }
        }
    }

    /// Re-issue the document's most recent request right away.
    pub fn reissue(&mut self, document: &DocumentId) -> RunDecision {
        if let Some(slot) = self.documents.get_mut(document) {
            slot.due = None;
        }
        self.launch_latest(document)
    }

    /// Earliest pending debounce deadline across all documents.
    pub fn next_deadline(&self) -> Option<Instant> {
        self.documents.values().filter_map(|s| s.due).min()
    }

    /// Launch every document whose debounce timer has expired.
    pub fn fire_due(&mut self, now: Instant) -> Vec<(DocumentId, RunDecision)> {
        let mut expired: Vec<DocumentId> = self
            .documents
            .iter()
            .filter(|(_, slot)| slot.due.map_or(false, |due| due <= now))
            .map(|(id, _)| id.clone())
            .collect();
        expired.sort();

        expired
            .into_iter()
            .map(|id| {
                if let Some(slot) = self.documents.get_mut(&id) {
                    slot.due = None;
                }
                let decision = self.launch_latest(&id);
                (id, decision)
            })
            .collect()
    }

    fn launch_latest(&mut self, id: &DocumentId) -> RunDecision {
        let interpreter = self.options.interpreter.clone();
        let snapshot = match self.documents.get_mut(id) {
            Some(slot) => {
                slot.supersede_active(id);
                match slot.request.clone() {
                    Some(snapshot) => snapshot,
                    None => return RunDecision::NotRun(NotRunReason::NoRequest),
                }
            }
            None => return RunDecision::NotRun(NotRunReason::NoRequest),
        };

        match self.availability.status(&interpreter) {
            Availability::Available => self.start_run(snapshot, interpreter),
            Availability::Unavailable => {
                self.gate(id, &interpreter);
                self.prompt(id, &interpreter);
                RunDecision::NotRun(NotRunReason::Unavailable)
            }
            Availability::Probing => {
                self.gate(id, &interpreter);
                RunDecision::AwaitingAvailability
            }
            Availability::Unknown => {
                self.gate(id, &interpreter);
                self.start_probe(&interpreter);
                match self.availability.status(&interpreter) {
                    Availability::Unavailable => RunDecision::NotRun(NotRunReason::Unavailable),
                    _ => RunDecision::AwaitingAvailability,
                }
            }
        }
    }

    fn gate(&mut self, id: &DocumentId, interpreter: &Path) {
        if let Some(slot) = self.documents.get_mut(id) {
            slot.gated_on = Some(interpreter.to_path_buf());
        }
    }

    fn prompt(&mut self, id: &DocumentId, interpreter: &Path) {
        let Some(slot) = self.documents.get_mut(id) else {
            return;
        };
        if slot.prompted {
            return;
        }
        slot.prompted = true;
        self.notices.push(Notice::InstallPrompt {
            document: id.clone(),
            interpreter: interpreter.to_path_buf(),
            message: install_prompt_message(&self.options.tracer_module, interpreter),
        });
    }

    fn start_probe(&mut self, interpreter: &Path) {
        if !self.availability.begin_probe(interpreter) {
            return;
        }
        let spec = probe_spec(&self.options);
        let tag = LaunchTag::Probe {
            interpreter: interpreter.to_path_buf(),
        };
        info!(interpreter = %interpreter.display(), "probing tracer availability");
        if let Err(e) = self.launcher.launch(spec, tag) {
            warn!(interpreter = %interpreter.display(), error = %e, "availability probe could not start");
            self.availability.finish_probe(interpreter, false);
            self.resolve_gated(interpreter);
        }
    }

    fn start_run(&mut self, snapshot: DocumentSnapshot, interpreter: PathBuf) -> RunDecision {
        self.next_token += 1;
        let token = RunToken(self.next_token);
        let id = snapshot.id.clone();

        let mut scratch = self.documents.get_mut(&id).and_then(|slot| slot.scratch.take());
        let spec = trace_spec(&self.options, &snapshot, &mut scratch);
        if let Some(slot) = self.documents.get_mut(&id) {
            slot.scratch = scratch;
        }

        let launched = spec.and_then(|spec| {
            self.launcher.launch(
                spec,
                LaunchTag::Trace {
                    document: id.clone(),
                    token,
                },
            )
        });

        match launched {
            Ok(process) => {
                let mut run = TraceRun::new(token, interpreter, snapshot.text);
                run.start(process);
                if let Some(slot) = self.documents.get_mut(&id) {
                    slot.gated_on = None;
                    slot.latest = Some(token);
                    slot.active = Some(run);
                }
                info!(document = %id, token = token.0, "trace run started");
                self.notices.push(Notice::RunStarted { document: id, token });
                RunDecision::Launched(token)
            }
            Err(e) => {
                self.fail_launch(id, token, interpreter, snapshot.text, e);
                RunDecision::NotRun(NotRunReason::LaunchFailed)
            }
        }
    }

    fn fail_launch(
        &mut self,
        id: DocumentId,
        token: RunToken,
        interpreter: PathBuf,
        source: String,
        err: LaunchError,
    ) {
        warn!(document = %id, error = %err, "tracer could not be started");
        if matches!(err, LaunchError::Spawn { .. }) {
            self.availability.invalidate(&interpreter);
        }
        if let Some(slot) = self.documents.get_mut(&id) {
            slot.gated_on = None;
        }
        self.notices.push(Notice::Delivered {
            document: id,
            token,
            delivery: TraceDelivery {
                kind: DeliveryKind::Infrastructure,
                text: launch_failure_message(&err),
                source,
                interpreter,
            },
        });
    }

    /// Feed a finished process back in. Stale trace results are dropped.
    pub fn on_completion(&mut self, completion: Completion) {
        match completion.tag {
            LaunchTag::Trace { document, token } => {
                self.finish_trace(document, token, completion.outcome)
            }
            LaunchTag::Probe { interpreter } => {
                let importable = completion.outcome.success();
                info!(interpreter = %interpreter.display(), importable, "availability probe finished");
                self.availability.finish_probe(&interpreter, importable);
                for slot in self.documents.values_mut() {
                    if slot.gated_on.as_deref() == Some(interpreter.as_path()) {
                        slot.prompted = false;
                    }
                }
                self.resolve_gated(&interpreter);
            }
            LaunchTag::Install {
                interpreter,
                document,
            } => self.finish_install(interpreter, document, completion.outcome),
        }
    }

    fn finish_trace(&mut self, document: DocumentId, token: RunToken, outcome: ProcessOutcome) {
        let Some(slot) = self.documents.get_mut(&document) else {
            debug!(document = %document, token = token.0, "result for closed document discarded");
            return;
        };
        if slot.latest != Some(token) {
            debug!(document = %document, token = token.0, "stale result discarded");
            return;
        }
        slot.latest = None;
        let Some(mut run) = slot.active.take() else {
            return;
        };
        run.finish(outcome.success());
        slot.ended = Some((run.token, run.state));

        let (kind, text) = classify(&outcome);
        if kind == DeliveryKind::UserError
            && indicates_missing_module(&text, &self.options.tracer_module)
        {
            self.availability.invalidate(&run.interpreter);
        }
        if kind == DeliveryKind::Infrastructure {
            warn!(document = %document, "{}", text);
        } else {
            info!(document = %document, token = token.0, ?kind, "trace run finished");
        }

        self.notices.push(Notice::Delivered {
            document,
            token,
            delivery: TraceDelivery {
                kind,
                text,
                source: run.source,
                interpreter: run.interpreter,
            },
        });
    }

    /// Re-evaluate every document parked on `interpreter`.
    fn resolve_gated(&mut self, interpreter: &Path) {
        let mut waiting: Vec<DocumentId> = self
            .documents
            .iter()
            .filter(|(_, slot)| slot.gated_on.as_deref() == Some(interpreter))
            .map(|(id, _)| id.clone())
            .collect();
        waiting.sort();

        match self.availability.status(interpreter) {
            Availability::Available => {
                for id in waiting {
                    self.launch_latest(&id);
                }
            }
            Availability::Unavailable => {
                for id in waiting {
                    self.prompt(&id, interpreter);
                }
            }
            Availability::Unknown | Availability::Probing => {}
        }
    }

    /// Install the tracer into the configured interpreter. Only one install
    /// per interpreter may run at a time.
    pub fn request_install(&mut self, document: &DocumentId) -> Result<(), InstallError> {
        let interpreter = self.options.interpreter.clone();
        if !self.availability.begin_install(&interpreter) {
            return Err(InstallError::AlreadyInProgress(interpreter));
        }
        if let Some(slot) = self.documents.get_mut(document) {
            if slot.request.is_some() {
                slot.gated_on = Some(interpreter.clone());
            }
        }

        let tag = LaunchTag::Install {
            interpreter: interpreter.clone(),
            document: document.clone(),
        };
        info!(interpreter = %interpreter.display(), "installing tracer");
        match self.launcher.launch(install_spec(&self.options), tag) {
            Ok(_process) => Ok(()),
            Err(e) => {
                self.availability.finish_install(&interpreter, false);
                Err(e.into())
            }
        }
    }

    fn finish_install(&mut self, interpreter: PathBuf, document: DocumentId, outcome: ProcessOutcome) {
        let success = outcome.success();
        self.availability.finish_install(&interpreter, success);
        if success {
            info!(interpreter = %interpreter.display(), "tracer installed");
        } else {
            warn!(interpreter = %interpreter.display(), "tracer installation failed");
        }
        self.notices.push(Notice::InstallFinished {
            document,
            interpreter: interpreter.clone(),
            success,
            output: outcome.combined_output(),
        });

        if success {
            for slot in self.documents.values_mut() {
                if slot.gated_on.as_deref() == Some(interpreter.as_path()) {
                    slot.prompted = false;
                }
            }
            self.resolve_gated(&interpreter);
        }
    }

    /// Forget the document: timers are dropped and a running tracer is killed.
    pub fn close(&mut self, document: &DocumentId) {
        if let Some(mut slot) = self.documents.remove(document) {
            slot.supersede_active(document);
            debug!(document = %document, "document closed");
        }
    }

    pub fn phase(&self, document: &DocumentId) -> Phase {
        let Some(slot) = self.documents.get(document) else {
            return Phase::Idle;
        };
        if let Some(run) = &slot.active {
            return Phase::Running { token: run.token };
        }
        if let Some(due) = slot.due {
            return Phase::PendingDebounce { due };
        }
        if slot.gated_on.is_some() {
            return Phase::AwaitingAvailability;
        }
        Phase::Idle
    }

    /// Lifecycle state of `token` if it is the document's running run or the
    /// last one to stop.
    pub fn run_state(&self, document: &DocumentId, token: RunToken) -> Option<RunState> {
        let slot = self.documents.get(document)?;
        match (&slot.active, slot.ended) {
            (Some(run), _) if run.token == token => Some(run.state),
            (_, Some((ended, state))) if ended == token => Some(state),
            _ => None,
        }
    }

    /// Most recent request for the document, if it is still open.
    pub fn latest_request(&self, document: &DocumentId) -> Option<&DocumentSnapshot> {
        self.documents.get(document).and_then(|s| s.request.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::scheduler::command::FILE_PLACEHOLDER;
    use crate::scheduler::launcher::{LaunchSpec, RunningProcess};
    use std::cell::RefCell;
    use std::io;
    use std::rc::Rc;
    use std::time::Duration;

    #[derive(Debug, Clone, PartialEq, Eq)]
    enum Event {
        Launch(usize),
        Kill(usize),
    }

    #[derive(Default)]
    struct Log {
        launches: Vec<(LaunchSpec, LaunchTag)>,
        events: Vec<Event>,
    }

    #[derive(Clone, Default)]
    struct FakeLauncher {
        log: Rc<RefCell<Log>>,
        fail_spawn: bool,
        fail_kill: bool,
    }

    struct FakeProcess {
        index: usize,
        log: Rc<RefCell<Log>>,
        fail_kill: bool,
    }

    impl RunningProcess for FakeProcess {
        fn kill(&mut self) -> io::Result<()> {
            self.log.borrow_mut().events.push(Event::Kill(self.index));
            if self.fail_kill {
                return Err(io::Error::new(io::ErrorKind::PermissionDenied, "not permitted"));
            }
            Ok(())
        }
    }

    impl ProcessLauncher for FakeLauncher {
        fn launch(
            &mut self,
            spec: LaunchSpec,
            tag: LaunchTag,
        ) -> Result<Box<dyn RunningProcess>, LaunchError> {
            if self.fail_spawn {
                return Err(LaunchError::Spawn {
                    program: spec.program.display().to_string(),
                    source: io::Error::new(io::ErrorKind::NotFound, "not found"),
                });
            }
            let mut log = self.log.borrow_mut();
            let index = log.launches.len();
            log.launches.push((spec, tag));
            log.events.push(Event::Launch(index));
            Ok(Box::new(FakeProcess {
                index,
                log: Rc::clone(&self.log),
                fail_kill: self.fail_kill,
            }))
        }
    }

    const PYTHON: &str = "/usr/bin/python3";

    fn options() -> RunOptions {
        RunOptions {
            interpreter: PathBuf::from(PYTHON),
            debounce: Duration::from_millis(300),
            tracer_args: vec!["-m".into(), "space_tracer".into(), "-".into()],
            ..RunOptions::default()
        }
    }

    fn scheduler(store: AvailabilityStore) -> (TraceScheduler<FakeLauncher>, Rc<RefCell<Log>>) {
        let launcher = FakeLauncher::default();
        let log = Rc::clone(&launcher.log);
        (TraceScheduler::new(launcher, store, options()), log)
    }

    fn ready() -> (TraceScheduler<FakeLauncher>, Rc<RefCell<Log>>) {
        scheduler(AvailabilityStore::with_verdict(PYTHON, true))
    }

    fn snap(text: &str) -> DocumentSnapshot {
        DocumentSnapshot::new("doc", text, Some(PathBuf::from("/proj/doc.py")))
    }

    fn exit(code: i32, stdout: &str) -> ProcessOutcome {
        ProcessOutcome::Exited {
            code: Some(code),
            stdout: stdout.to_string(),
            stderr: String::new(),
        }
    }

    fn trace_done(token: RunToken, outcome: ProcessOutcome) -> Completion {
        Completion {
            tag: LaunchTag::Trace {
                document: DocumentId::from("doc"),
                token,
            },
            outcome,
        }
    }

    fn delivered(notices: &[Notice]) -> Vec<&TraceDelivery> {
        notices
            .iter()
            .filter_map(|n| match n {
                Notice::Delivered { delivery, .. } => Some(delivery),
                _ => None,
            })
            .collect()
    }

    #[test]
    fn second_request_kills_first_before_launching() {
        let (mut sched, log) = ready();
        let now = Instant::now();

        let first = sched.request_run(snap("x = 1\n"), Trigger::Explicit, now);
        let second = sched.request_run(snap("x = 2\n"), Trigger::OnSave, now);

        assert_eq!(first, RunDecision::Launched(RunToken(1)));
        assert_eq!(second, RunDecision::Launched(RunToken(2)));
        assert_eq!(
            log.borrow().events,
            vec![Event::Launch(0), Event::Kill(0), Event::Launch(1)]
        );
        assert_eq!(
            sched.phase(&DocumentId::from("doc")),
            Phase::Running { token: RunToken(2) }
        );
        let doc = DocumentId::from("doc");
        assert_eq!(sched.run_state(&doc, RunToken(1)), Some(RunState::Superseded));
        assert_eq!(sched.run_state(&doc, RunToken(2)), Some(RunState::Running));

        sched.on_completion(trace_done(RunToken(2), exit(0, "2 |x = 2\n")));
        assert_eq!(sched.run_state(&doc, RunToken(2)), Some(RunState::Completed));
        assert_eq!(sched.run_state(&doc, RunToken(1)), None);
    }

    #[test]
    fn failed_kill_does_not_block_the_next_run() {
        let launcher = FakeLauncher {
            fail_kill: true,
            ..FakeLauncher::default()
        };
        let log = Rc::clone(&launcher.log);
        let mut sched = TraceScheduler::new(
            launcher,
            AvailabilityStore::with_verdict(PYTHON, true),
            options(),
        );
        let now = Instant::now();
        sched.request_run(snap("x = 1\n"), Trigger::Explicit, now);
        let second = sched.request_run(snap("x = 2\n"), Trigger::Explicit, now);

        assert_eq!(second, RunDecision::Launched(RunToken(2)));
        assert_eq!(
            log.borrow().events,
            vec![Event::Launch(0), Event::Kill(0), Event::Launch(1)]
        );
        let doc = DocumentId::from("doc");
        assert_eq!(sched.run_state(&doc, RunToken(1)), Some(RunState::Superseded));

        sched.on_completion(trace_done(RunToken(1), exit(0, "stale")));
        assert!(delivered(&sched.take_notices()).is_empty());
    }

    #[test]
    fn source_copy_lives_until_close() {
        let launcher = FakeLauncher::default();
        let log = Rc::clone(&launcher.log);
        let opts = RunOptions {
            tracer_args: vec!["-m".into(), "space_tracer".into(), FILE_PLACEHOLDER.into()],
            ..options()
        };
        let mut sched =
            TraceScheduler::new(launcher, AvailabilityStore::with_verdict(PYTHON, true), opts);
        sched.request_run(snap("x = 1\n"), Trigger::Explicit, Instant::now());

        let copy = log.borrow().launches[0]
            .0
            .args
            .last()
            .map(PathBuf::from)
            .expect("file argument");
        assert_eq!(copy.file_name().and_then(|n| n.to_str()), Some("doc.py"));
        assert_eq!(std::fs::read_to_string(&copy).ok().as_deref(), Some("x = 1\n"));

        sched.close(&DocumentId::from("doc"));
        assert!(!copy.exists());
    }

    #[test]
    fn only_latest_result_is_delivered() {
        let (mut sched, _log) = ready();
        let now = Instant::now();
        sched.request_run(snap("x = 1\n"), Trigger::Explicit, now);
        sched.request_run(snap("x = 2\n"), Trigger::Explicit, now);
        sched.take_notices();

        // the killed first run finishes after the second one
        sched.on_completion(trace_done(RunToken(2), exit(0, "2 |x = 2\n")));
        sched.on_completion(trace_done(RunToken(1), exit(0, "1 |x = 1\n")));

        let notices = sched.take_notices();
        let results = delivered(&notices);
        assert_eq!(results.len(), 1);
        assert_eq!(results[0].text, "2 |x = 2\n");
        assert_eq!(results[0].source, "x = 2\n");
        assert_eq!(sched.phase(&DocumentId::from("doc")), Phase::Idle);
    }

    #[test]
    fn debounced_edits_coalesce_into_one_run() {
        let (mut sched, log) = ready();
        let start = Instant::now();

        for (i, text) in ["x", "x =", "x = 3\n"].iter().enumerate() {
            let at = start + Duration::from_millis(100 * i as u64);
            let decision = sched.request_run(snap(text), Trigger::OnChangeDebounced, at);
            assert!(matches!(decision, RunDecision::Debounced { .. }));
        }

        assert!(sched.fire_due(start + Duration::from_millis(400)).is_empty());
        let deadline = sched.next_deadline().expect("pending timer");
        assert_eq!(deadline, start + Duration::from_millis(500));

        let fired = sched.fire_due(deadline);
        assert_eq!(fired.len(), 1);
        assert_eq!(log.borrow().launches.len(), 1);
        assert_eq!(log.borrow().launches[0].0.stdin.as_deref(), Some("x = 3\n"));
        assert_eq!(sched.next_deadline(), None);
    }

    #[test]
    fn save_cancels_pending_timer() {
        let (mut sched, log) = ready();
        let now = Instant::now();
        sched.request_run(snap("a"), Trigger::OnChangeDebounced, now);
        sched.request_run(snap("a = 1\n"), Trigger::OnSave, now);

        assert_eq!(sched.next_deadline(), None);
        assert!(sched.fire_due(now + Duration::from_secs(5)).is_empty());
        assert_eq!(log.borrow().launches.len(), 1);
    }

    #[test]
    fn empty_stdout_becomes_placeholder() {
        let (mut sched, _log) = ready();
        sched.request_run(snap("pass\n"), Trigger::Explicit, Instant::now());
        sched.on_completion(trace_done(RunToken(1), exit(0, "")));
        let notices = sched.take_notices();
        assert_eq!(delivered(&notices)[0].text, crate::scheduler::NO_OUTPUT);
    }

    #[test]
    fn user_error_goes_through_the_output_slot() {
        let (mut sched, _log) = ready();
        sched.request_run(snap("1/0\n"), Trigger::Explicit, Instant::now());
        sched.on_completion(trace_done(
            RunToken(1),
            ProcessOutcome::Exited {
                code: Some(1),
                stdout: "ZeroDivisionError |1/0\n".into(),
                stderr: "Traceback\n".into(),
            },
        ));
        let notices = sched.take_notices();
        let result = delivered(&notices)[0];
        assert_eq!(result.kind, DeliveryKind::UserError);
        assert!(result.text.ends_with("Traceback"));
    }

    #[test]
    fn unavailable_probe_then_install_reruns_latest_request() {
        let (mut sched, log) = scheduler(AvailabilityStore::new());
        let doc = DocumentId::from("doc");
        let now = Instant::now();

        let decision = sched.request_run(snap("x = 1\n"), Trigger::Explicit, now);
        assert_eq!(decision, RunDecision::AwaitingAvailability);
        assert!(matches!(
            log.borrow().launches[0].1,
            LaunchTag::Probe { .. }
        ));

        sched.request_run(snap("x = 2\n"), Trigger::Explicit, now);
        sched.on_completion(Completion {
            tag: LaunchTag::Probe {
                interpreter: PathBuf::from(PYTHON),
            },
            outcome: exit(1, ""),
        });

        assert_eq!(log.borrow().launches.len(), 1, "no run without the tracer");
        let notices = sched.take_notices();
        let prompts = notices
            .iter()
            .filter(|n| matches!(n, Notice::InstallPrompt { .. }))
            .count();
        assert_eq!(prompts, 1);
        assert_eq!(
            sched.availability().status(Path::new(PYTHON)),
            Availability::Unavailable
        );

        sched.request_install(&doc).expect("install starts");
        assert!(matches!(
            sched.request_install(&doc),
            Err(InstallError::AlreadyInProgress(_))
        ));

        sched.on_completion(Completion {
            tag: LaunchTag::Install {
                interpreter: PathBuf::from(PYTHON),
                document: doc.clone(),
            },
            outcome: exit(0, "Successfully installed space_tracer"),
        });

        let log = log.borrow();
        let (spec, tag) = log.launches.last().expect("re-run");
        assert!(matches!(tag, LaunchTag::Trace { .. }));
        assert_eq!(spec.stdin.as_deref(), Some("x = 2\n"));
        assert!(matches!(sched.phase(&doc), Phase::Running { .. }));
    }

    #[test]
    fn repeated_requests_while_unavailable_prompt_once() {
        let (mut sched, _log) = scheduler(AvailabilityStore::with_verdict(PYTHON, false));
        let now = Instant::now();
        for _ in 0..3 {
            assert_eq!(
                sched.request_run(snap("x\n"), Trigger::Explicit, now),
                RunDecision::NotRun(NotRunReason::Unavailable)
            );
        }
        let prompts = sched
            .take_notices()
            .into_iter()
            .filter(|n| matches!(n, Notice::InstallPrompt { .. }))
            .count();
        assert_eq!(prompts, 1);
    }

    #[test]
    fn spawn_failure_is_infrastructure_and_forces_recheck() {
        let launcher = FakeLauncher {
            fail_spawn: true,
            ..FakeLauncher::default()
        };
        let store = AvailabilityStore::with_verdict(PYTHON, true);
        let mut sched = TraceScheduler::new(launcher, store, options());

        let decision = sched.request_run(snap("x\n"), Trigger::Explicit, Instant::now());
        assert_eq!(decision, RunDecision::NotRun(NotRunReason::LaunchFailed));

        let notices = sched.take_notices();
        let result = delivered(&notices)[0];
        assert_eq!(result.kind, DeliveryKind::Infrastructure);
        assert!(result.text.starts_with("Failed to start tracer:"));
        assert_eq!(
            sched.availability().status(Path::new(PYTHON)),
            Availability::Unknown
        );
    }

    #[test]
    fn probe_spawn_failure_means_unavailable() {
        let launcher = FakeLauncher {
            fail_spawn: true,
            ..FakeLauncher::default()
        };
        let mut sched = TraceScheduler::new(launcher, AvailabilityStore::new(), options());
        let decision = sched.request_run(snap("x\n"), Trigger::Explicit, Instant::now());
        assert_eq!(decision, RunDecision::NotRun(NotRunReason::Unavailable));
        assert!(sched
            .take_notices()
            .iter()
            .any(|n| matches!(n, Notice::InstallPrompt { .. })));
    }

    #[test]
    fn close_clears_timer_and_kills_run() {
        let (mut sched, log) = ready();
        let doc = DocumentId::from("doc");
        let now = Instant::now();
        sched.request_run(snap("x\n"), Trigger::Explicit, now);
        sched.request_run(snap("x = 1\n"), Trigger::OnChangeDebounced, now);

        sched.close(&doc);
        assert_eq!(sched.next_deadline(), None);
        assert!(sched.fire_due(now + Duration::from_secs(1)).is_empty());
        assert_eq!(log.borrow().events.last(), Some(&Event::Kill(0)));

        sched.on_completion(trace_done(RunToken(1), exit(0, "late")));
        assert!(delivered(&sched.take_notices()).is_empty());
        assert_eq!(sched.phase(&doc), Phase::Idle);
    }

    #[test]
    fn documents_do_not_interfere() {
        let (mut sched, log) = ready();
        let now = Instant::now();
        sched.request_run(snap("x\n"), Trigger::Explicit, now);
        sched.request_run(
            DocumentSnapshot::new("other", "y\n", None),
            Trigger::Explicit,
            now,
        );
        assert!(log
            .borrow()
            .events
            .iter()
            .all(|e| matches!(e, Event::Launch(_))));
    }
}
