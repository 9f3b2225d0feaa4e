//! Run lifecycle controller.
//!
//! Owns the automation state machine, issues the validate/share requests,
//! ingests results, and emits events for presentation layers. Exactly one
//! controller exists per process; it is constructed explicitly and handed
//! to the UI layer.

use crate::backend::{BackendError, ShareBackend, ShareResponse};
use crate::model::{AttemptResult, Level, PanelEvent, RunRequest, RunState, RunSummary, Session};
use crate::stats::{RunStats, StatsAggregator};
use rand::RngCore;
use thiserror::Error;
use tokio::sync::mpsc::UnboundedSender;

/// Failures surfaced at the operation boundary. None of these are fatal;
/// the controller stays usable after every one of them.
#[derive(Debug, Error)]
pub enum ControllerError {
    #[error("malformed input: {reason}")]
    MalformedInput { reason: String },

    #[error("validation failed: {reason}")]
    Validation { reason: String },

    #[error("a batch run is already in progress")]
    AlreadyRunning,

    #[error("batch run failed: {reason}")]
    Run { reason: String },
}

/// Short identifier attached to each batch run's log lines.
fn gen_run_id() -> String {
    let mut b = [0u8; 4];
    rand::thread_rng().fill_bytes(&mut b);
    format!("{:08x}", u32::from_le_bytes(b))
}

pub struct RunController<B> {
    backend: B,
    events: UnboundedSender<PanelEvent>,
    state: RunState,
    running: bool,
    session: Option<Session>,
    stats: StatsAggregator,
}

impl<B: ShareBackend> RunController<B> {
    pub fn new(backend: B, events: UnboundedSender<PanelEvent>) -> Self {
        Self {
            backend,
            events,
            state: RunState::Idle,
            running: false,
            session: None,
            stats: StatsAggregator::default(),
        }
    }

    pub fn state(&self) -> RunState {
        self.state
    }

    pub fn is_running(&self) -> bool {
        self.running
    }

    pub fn session(&self) -> Option<&Session> {
        self.session.as_ref()
    }

    pub fn stats(&self) -> RunStats {
        self.stats.stats()
    }

    pub fn progress(&self) -> f64 {
        self.stats.progress()
    }

    fn set_state(&mut self, state: RunState) {
        self.state = state;
        let _ = self.events.send(PanelEvent::StateChanged { state });
    }

    fn log(&self, level: Level, message: impl Into<String>) {
        let _ = self.events.send(PanelEvent::Log {
            level,
            message: message.into(),
        });
    }

    fn notify(&self, level: Level, message: impl Into<String>) {
        let _ = self.events.send(PanelEvent::Notice {
            level,
            message: message.into(),
        });
    }

    /// Validate a raw credential blob against the backend.
    ///
    /// An empty blob produces a single notification and nothing else. A
    /// blob that is not valid JSON fails locally without contacting the
    /// backend. Every terminal outcome produces exactly one state
    /// transition, one log entry, and one notification.
    pub async fn validate(&mut self, raw: &str) -> Result<Session, ControllerError> {
        let raw = raw.trim();
        if raw.is_empty() {
            self.notify(Level::Error, "Enter the credential blob first");
            return Err(ControllerError::MalformedInput {
                reason: "credential blob is empty".into(),
            });
        }

        self.log(Level::Info, "Validating session…");
        self.set_state(RunState::Validating);

        let appstate: serde_json::Value = match serde_json::from_str(raw) {
            Ok(v) => v,
            Err(e) => {
                self.session = None;
                self.log(Level::Error, format!("Validation failed: {e}"));
                self.notify(Level::Error, "Session validation failed");
                self.set_state(RunState::Error);
                return Err(ControllerError::MalformedInput {
                    reason: e.to_string(),
                });
            }
        };

        match self.backend.validate(&appstate).await {
            Ok(resp) if resp.success => {
                let user = resp.user.unwrap_or_else(|| "unknown".into());
                let session = Session {
                    user: user.clone(),
                    appstate,
                };
                self.session = Some(session.clone());
                self.log(Level::Success, format!("Session validated - {user}"));
                self.notify(Level::Success, "Session validated successfully");
                self.set_state(RunState::Ready);
                let _ = self.events.send(PanelEvent::SessionValidated { user });
                Ok(session)
            }
            Ok(resp) => {
                let reason = resp.error.unwrap_or_else(|| "validation failed".into());
                Err(self.fail_validate(reason))
            }
            Err(e) => Err(self.fail_validate(e.to_string())),
        }
    }

    fn fail_validate(&mut self, reason: String) -> ControllerError {
        self.session = None;
        self.log(Level::Error, format!("Validation failed: {reason}"));
        self.notify(Level::Error, "Session validation failed");
        self.set_state(RunState::Error);
        ControllerError::Validation { reason }
    }

    /// Run one batch to completion: guard, issue the share call, ingest.
    ///
    /// The share response is awaited in full before ingestion begins, and
    /// the terminal step always returns the machine to Ready whatever the
    /// outcome.
    pub async fn start(&mut self, req: &RunRequest) -> Result<RunSummary, ControllerError> {
        self.begin_run(req)?;
        // Carry the outcome as a value so finish_run executes on every path.
        let outcome = self.backend.share(req).await;
        self.finish_run(outcome)
    }

    /// Guard and transition into Running. The single-concurrency check
    /// comes first: a reentrant start must not reset stats or reach the
    /// backend.
    pub(crate) fn begin_run(&mut self, req: &RunRequest) -> Result<(), ControllerError> {
        if self.running {
            self.notify(Level::Warning, "A batch run is already in progress");
            return Err(ControllerError::AlreadyRunning);
        }
        if req.appstate.is_null() {
            self.notify(Level::Error, "Enter the credential blob first");
            return Err(ControllerError::MalformedInput {
                reason: "credential blob is empty".into(),
            });
        }
        if req.message.trim().is_empty() {
            self.notify(Level::Error, "Enter a message first");
            return Err(ControllerError::MalformedInput {
                reason: "message is empty".into(),
            });
        }

        let run_id = gen_run_id();
        self.running = true;
        self.set_state(RunState::Running);
        self.stats.reset();
        let _ = self.events.send(PanelEvent::StatsReset);
        self.log(
            Level::Info,
            format!(
                "Starting batch run {run_id}: {}× every {}s",
                req.count, req.delay_secs
            ),
        );
        Ok(())
    }

    /// Terminal half of a run: ingest on success, report on failure, and
    /// unconditionally leave the machine Ready.
    pub(crate) fn finish_run(
        &mut self,
        outcome: Result<ShareResponse, BackendError>,
    ) -> Result<RunSummary, ControllerError> {
        let result = match outcome {
            Ok(resp) if resp.success => {
                let results = resp.results.unwrap_or_default();
                self.ingest(&results);
                let summary = resp.summary.unwrap_or_else(|| {
                    let s = self.stats.stats();
                    RunSummary {
                        total: s.shares,
                        successful: s.success,
                        failed: s.failed,
                    }
                });
                self.log(
                    Level::Success,
                    format!(
                        "Batch run completed: {}/{} successful",
                        summary.successful, summary.total
                    ),
                );
                self.notify(
                    Level::Success,
                    format!(
                        "Completed: {} successful, {} failed",
                        summary.successful, summary.failed
                    ),
                );
                let _ = self.events.send(PanelEvent::RunCompleted { summary });
                Ok(summary)
            }
            Ok(resp) => {
                let reason = resp.error.unwrap_or_else(|| "batch run failed".into());
                Err(self.fail_run(reason))
            }
            Err(e) => Err(self.fail_run(e.to_string())),
        };

        // Runs whatever happened above: never leave the machine Running.
        self.running = false;
        self.set_state(RunState::Ready);
        result
    }

    fn fail_run(&mut self, reason: String) -> ControllerError {
        self.log(Level::Error, format!("Batch run failed: {reason}"));
        self.notify(Level::Error, "Batch run failed");
        ControllerError::Run { reason }
    }

    /// Cancel intent. Effective only while Running; otherwise a strict
    /// no-op. The share call already in flight cannot be aborted; its
    /// atomic response is still handled on arrival.
    pub fn stop(&mut self) {
        if !self.running {
            return;
        }
        self.running = false;
        self.log(Level::Warning, "Batch run stopped by user");
        self.notify(Level::Warning, "Batch run stopped");
        self.set_state(RunState::Ready);
    }

    /// Fold the ordered result list into the stats, strictly in delivered
    /// order. Ordinals are trusted from the backend and not re-sorted.
    fn ingest(&mut self, results: &[AttemptResult]) {
        let total = results.len();
        for (index, result) in results.iter().enumerate() {
            let (stats, progress) = self.stats.record(result, index, total);
            if result.success {
                self.log(Level::Success, format!("Share {}: success", result.attempt));
            } else {
                let detail = result.error.as_deref().unwrap_or("unknown error");
                self.log(
                    Level::Error,
                    format!("Share {}: failed - {detail}", result.attempt),
                );
            }
            let _ = self.events.send(PanelEvent::Attempt {
                result: result.clone(),
                stats,
                progress,
            });
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::ValidateResponse;
    use assert_matches::assert_matches;
    use serde_json::json;
    use std::collections::VecDeque;
    use std::future::Future;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use tokio::sync::mpsc;

    /// Scripted backend: pops pre-seeded outcomes and counts calls.
    #[derive(Clone, Default)]
    struct FakeBackend {
        validate_script: Arc<Mutex<VecDeque<Result<ValidateResponse, BackendError>>>>,
        share_script: Arc<Mutex<VecDeque<Result<ShareResponse, BackendError>>>>,
        validate_calls: Arc<AtomicUsize>,
        share_calls: Arc<AtomicUsize>,
    }

    impl FakeBackend {
        fn on_validate(self, outcome: Result<ValidateResponse, BackendError>) -> Self {
            self.validate_script.lock().unwrap().push_back(outcome);
            self
        }

        fn on_share(self, outcome: Result<ShareResponse, BackendError>) -> Self {
            self.share_script.lock().unwrap().push_back(outcome);
            self
        }
    }

    impl ShareBackend for FakeBackend {
        fn validate(
            &self,
            _appstate: &serde_json::Value,
        ) -> impl Future<Output = Result<ValidateResponse, BackendError>> + Send {
            self.validate_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .validate_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Transport("unscripted".into())));
            async move { outcome }
        }

        fn share(
            &self,
            _req: &RunRequest,
        ) -> impl Future<Output = Result<ShareResponse, BackendError>> + Send {
            self.share_calls.fetch_add(1, Ordering::SeqCst);
            let outcome = self
                .share_script
                .lock()
                .unwrap()
                .pop_front()
                .unwrap_or_else(|| Err(BackendError::Transport("unscripted".into())));
            async move { outcome }
        }
    }

    fn controller(
        backend: FakeBackend,
    ) -> (
        RunController<FakeBackend>,
        mpsc::UnboundedReceiver<PanelEvent>,
    ) {
        let (tx, rx) = mpsc::unbounded_channel();
        (RunController::new(backend, tx), rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<PanelEvent>) -> Vec<PanelEvent> {
        let mut events = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            events.push(ev);
        }
        events
    }

    fn request() -> RunRequest {
        RunRequest {
            appstate: json!([{"key": "c_user", "value": "1"}]),
            message: "hello".into(),
            link: "http://example.com".into(),
            count: 2,
            delay_secs: 15,
        }
    }

    fn share_ok() -> ShareResponse {
        ShareResponse {
            success: true,
            results: Some(vec![
                AttemptResult {
                    attempt: 1,
                    success: true,
                    error: None,
                },
                AttemptResult {
                    attempt: 2,
                    success: false,
                    error: Some("x".into()),
                },
            ]),
            summary: Some(RunSummary {
                total: 2,
                successful: 1,
                failed: 1,
            }),
            error: None,
        }
    }

    #[tokio::test]
    async fn validate_success_stores_session_and_reaches_ready() {
        let backend = FakeBackend::default().on_validate(Ok(ValidateResponse {
            success: true,
            user: Some("alice".into()),
            error: None,
        }));
        let (mut ctrl, mut rx) = controller(backend);

        let session = ctrl.validate(r#"[{"key": "c_user"}]"#).await.unwrap();
        assert_eq!(session.user, "alice");
        assert_eq!(ctrl.state(), RunState::Ready);
        assert_eq!(ctrl.session().unwrap().user, "alice");

        let events = drain(&mut rx);
        let notices = events
            .iter()
            .filter(|e| matches!(e, PanelEvent::Notice { .. }))
            .count();
        assert_eq!(notices, 1);
    }

    #[tokio::test]
    async fn empty_credential_notifies_without_state_change() {
        let (mut ctrl, mut rx) = controller(FakeBackend::default());

        let err = ctrl.validate("   ").await.unwrap_err();
        assert_matches!(err, ControllerError::MalformedInput { .. });
        assert_eq!(ctrl.state(), RunState::Idle);

        let events = drain(&mut rx);
        assert_eq!(events.len(), 1);
        assert_matches!(events[0], PanelEvent::Notice { level: Level::Error, .. });
    }

    #[tokio::test]
    async fn malformed_credential_never_reaches_backend() {
        let backend = FakeBackend::default();
        let calls = backend.validate_calls.clone();
        let (mut ctrl, _rx) = controller(backend);

        let err = ctrl.validate("{not json").await.unwrap_err();
        assert_matches!(err, ControllerError::MalformedInput { .. });
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctrl.state(), RunState::Error);
    }

    #[tokio::test]
    async fn rejected_validation_clears_session_and_errors() {
        let backend = FakeBackend::default()
            .on_validate(Ok(ValidateResponse {
                success: true,
                user: Some("alice".into()),
                error: None,
            }))
            .on_validate(Ok(ValidateResponse {
                success: false,
                user: None,
                error: Some("bad token".into()),
            }));
        let (mut ctrl, mut rx) = controller(backend);

        ctrl.validate("{}").await.unwrap();
        let err = ctrl.validate("{}").await.unwrap_err();
        assert_matches!(err, ControllerError::Validation { ref reason } if reason == "bad token");
        assert_eq!(ctrl.state(), RunState::Error);
        assert!(ctrl.session().is_none());

        // Exactly one notification for the failed call.
        let events = drain(&mut rx);
        let failure_notices = events
            .iter()
            .filter(|e| matches!(e, PanelEvent::Notice { level: Level::Error, .. }))
            .count();
        assert_eq!(failure_notices, 1);
    }

    #[tokio::test]
    async fn unreachable_backend_fails_validation() {
        let backend =
            FakeBackend::default().on_validate(Err(BackendError::Transport("refused".into())));
        let (mut ctrl, _rx) = controller(backend);

        let err = ctrl.validate("{}").await.unwrap_err();
        assert_matches!(err, ControllerError::Validation { .. });
        assert_eq!(ctrl.state(), RunState::Error);
    }

    #[tokio::test]
    async fn start_ingests_results_and_returns_backend_summary() {
        let backend = FakeBackend::default().on_share(Ok(share_ok()));
        let (mut ctrl, mut rx) = controller(backend);

        let summary = ctrl.start(&request()).await.unwrap();
        assert_eq!(
            summary,
            RunSummary {
                total: 2,
                successful: 1,
                failed: 1
            }
        );

        let stats = ctrl.stats();
        assert_eq!(stats.shares, 2);
        assert_eq!(stats.success, 1);
        assert_eq!(stats.failed, 1);
        assert_eq!(stats.shares, stats.success + stats.failed);
        assert_eq!(ctrl.state(), RunState::Ready);
        assert_eq!(ctrl.progress(), 100.0);

        let events = drain(&mut rx);
        let attempts: Vec<_> = events
            .iter()
            .filter_map(|e| match e {
                PanelEvent::Attempt { result, .. } => Some(result.attempt),
                _ => None,
            })
            .collect();
        assert_eq!(attempts, vec![1, 2]);
    }

    #[tokio::test]
    async fn reentrant_start_fails_without_touching_anything() {
        let backend = FakeBackend::default();
        let share_calls = backend.share_calls.clone();
        let (mut ctrl, mut rx) = controller(backend);

        ctrl.begin_run(&request()).unwrap();
        assert_eq!(ctrl.state(), RunState::Running);
        let resets_before = drain(&mut rx)
            .iter()
            .filter(|e| matches!(e, PanelEvent::StatsReset))
            .count();
        assert_eq!(resets_before, 1);

        let err = ctrl.start(&request()).await.unwrap_err();
        assert_matches!(err, ControllerError::AlreadyRunning);
        assert_eq!(share_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctrl.state(), RunState::Running);

        // Only the warning notice; no second reset, no backend traffic.
        let events = drain(&mut rx);
        assert!(events
            .iter()
            .all(|e| !matches!(e, PanelEvent::StatsReset)));
        assert_matches!(
            events.as_slice(),
            [PanelEvent::Notice { level: Level::Warning, .. }]
        );
    }

    #[tokio::test]
    async fn rejected_run_still_restores_ready() {
        let backend = FakeBackend::default().on_share(Ok(ShareResponse {
            success: false,
            results: None,
            summary: None,
            error: Some("no session".into()),
        }));
        let (mut ctrl, _rx) = controller(backend);

        let err = ctrl.start(&request()).await.unwrap_err();
        assert_matches!(err, ControllerError::Run { ref reason } if reason == "no session");
        assert_eq!(ctrl.state(), RunState::Ready);
        assert!(!ctrl.is_running());
    }

    #[tokio::test]
    async fn transport_error_still_restores_ready() {
        let backend =
            FakeBackend::default().on_share(Err(BackendError::Transport("timed out".into())));
        let (mut ctrl, _rx) = controller(backend);

        let err = ctrl.start(&request()).await.unwrap_err();
        assert_matches!(err, ControllerError::Run { .. });
        assert_eq!(ctrl.state(), RunState::Ready);
    }

    #[tokio::test]
    async fn empty_message_fails_fast() {
        let backend = FakeBackend::default();
        let share_calls = backend.share_calls.clone();
        let (mut ctrl, _rx) = controller(backend);

        let mut req = request();
        req.message = "  ".into();
        let err = ctrl.start(&req).await.unwrap_err();
        assert_matches!(err, ControllerError::MalformedInput { .. });
        assert_eq!(share_calls.load(Ordering::SeqCst), 0);
        assert_eq!(ctrl.state(), RunState::Idle);
    }

    #[tokio::test]
    async fn empty_result_list_completes_with_zero_summary() {
        let backend = FakeBackend::default().on_share(Ok(ShareResponse {
            success: true,
            results: Some(Vec::new()),
            summary: None,
            error: None,
        }));
        let (mut ctrl, _rx) = controller(backend);

        let summary = ctrl.start(&request()).await.unwrap();
        assert_eq!(summary.total, 0);
        assert_eq!(ctrl.stats(), RunStats::default());
        assert_eq!(ctrl.state(), RunState::Ready);
    }

    #[tokio::test]
    async fn stop_when_not_running_is_a_strict_noop() {
        let (mut ctrl, mut rx) = controller(FakeBackend::default());

        ctrl.stop();
        assert_eq!(ctrl.state(), RunState::Idle);
        assert!(drain(&mut rx).is_empty());
    }

    #[tokio::test]
    async fn stop_while_running_warns_and_restores_ready() {
        let (mut ctrl, mut rx) = controller(FakeBackend::default());

        ctrl.begin_run(&request()).unwrap();
        drain(&mut rx);
        ctrl.stop();

        assert_eq!(ctrl.state(), RunState::Ready);
        assert!(!ctrl.is_running());
        let events = drain(&mut rx);
        let warning_logs = events
            .iter()
            .filter(|e| matches!(e, PanelEvent::Log { level: Level::Warning, .. }))
            .count();
        let warning_notices = events
            .iter()
            .filter(|e| matches!(e, PanelEvent::Notice { level: Level::Warning, .. }))
            .count();
        assert_eq!(warning_logs, 1);
        assert_eq!(warning_notices, 1);
    }

    #[tokio::test]
    async fn controller_stays_usable_after_failures() {
        let backend = FakeBackend::default()
            .on_share(Err(BackendError::Transport("refused".into())))
            .on_share(Ok(share_ok()));
        let (mut ctrl, _rx) = controller(backend);

        assert!(ctrl.start(&request()).await.is_err());
        let summary = ctrl.start(&request()).await.unwrap();
        assert_eq!(summary.successful, 1);
        assert_eq!(ctrl.state(), RunState::Ready);
    }
}
