//! Orchestrator driving one version through RAW → RUNNING → terminal.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{mpsc, watch, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::api::VersionsApi;
use crate::error::{PipelineError, StoreError};
use crate::method::MethodConfig;
use crate::model::{SubmitRequest, VersionId, VersionStatus};
use crate::store::VersionStore;

use super::context::SessionContext;

/// Status updates pushed by the poll loop to its single consumer.
#[derive(Debug, Clone, PartialEq)]
pub enum PollEvent {
    /// A tick observed a non-terminal status.
    Status {
        version_id: VersionId,
        status: VersionStatus,
    },
    /// A tick failed transiently; the loop continues at the next interval.
    Error {
        version_id: VersionId,
        message: String,
    },
    /// A tick observed PROCESSED or FAILED; the loop has stopped.
    Terminal {
        version_id: VersionId,
        status: VersionStatus,
    },
}

/// Handle to the currently running poll task.
struct ActivePoll {
    version_id: VersionId,
    cancel_tx: watch::Sender<bool>,
    handle: JoinHandle<()>,
}

/// Drives one version at a time through the pipeline.
///
/// `start` submits the transformation payload and begins polling the
/// version's status at a fixed interval; `stop` cancels the poll loop
/// deterministically. At most one poll target is active per instance:
/// starting a new target stops the previous one first.
pub struct PipelineOrchestrator {
    api: Arc<dyn VersionsApi>,
    store: Arc<VersionStore>,
    session: Option<SessionContext>,
    poll_interval: Duration,
    active: Mutex<Option<ActivePoll>>,
    events_tx: mpsc::UnboundedSender<PollEvent>,
}

impl PipelineOrchestrator {
    /// Default interval between poll ticks.
    pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_secs(5);

    /// Creates an orchestrator and the single-consumer receiver its poll
    /// loop pushes status updates into.
    pub fn new(
        api: Arc<dyn VersionsApi>,
        store: Arc<VersionStore>,
        session: Option<SessionContext>,
        poll_interval: Duration,
    ) -> (Self, mpsc::UnboundedReceiver<PollEvent>) {
        let (events_tx, events_rx) = mpsc::unbounded_channel();
        (
            Self {
                api,
                store,
                session,
                poll_interval,
                active: Mutex::new(None),
                events_tx,
            },
            events_rx,
        )
    }

    /// The version currently being polled, if any.
    pub async fn poll_target(&self) -> Option<VersionId> {
        self.active.lock().await.as_ref().map(|p| p.version_id)
    }

    /// Submits the transformation for a RAW version and begins polling.
    ///
    /// Checks run in order: the version must be present in the store
    /// snapshot, a valid session must be bound, the status must be RAW,
    /// and the payload must be generatable from the method configuration.
    /// A rejected submission leaves the version in RAW; only a 2xx
    /// response transitions it to RUNNING and spawns the poll loop,
    /// stopping any previous poll target first.
    pub async fn start(
        &self,
        version_id: VersionId,
        config: &dyn MethodConfig,
    ) -> Result<(), PipelineError> {
        let version = self
            .store
            .get(version_id)
            .await
            .ok_or(PipelineError::NotFound(version_id))?;

        let session = match &self.session {
            Some(session) if session.is_valid() => session,
            _ => return Err(PipelineError::Auth),
        };

        if version.status != VersionStatus::Raw {
            return Err(PipelineError::State {
                id: version_id,
                status: version.status,
            });
        }

        let invocation = config.generate_payload().ok_or_else(|| {
            PipelineError::Validation("method selection did not produce a payload".to_string())
        })?;
        let task_method_id = version.method_id.ok_or_else(|| {
            PipelineError::Validation("version has no transformation method".to_string())
        })?;

        let request = SubmitRequest {
            invocation,
            user_id: session.user_id,
            task_method_id,
        };

        // No optimistic transition: the version stays RAW unless the
        // processor accepted the submission.
        self.api
            .submit_method(&request)
            .await
            .map_err(PipelineError::Submission)?;

        self.store.set_status(version_id, VersionStatus::Running).await;
        info!(version_id, "Submission accepted, version running");

        self.spawn_poll(version_id).await;
        Ok(())
    }

    /// Cancels the active poll loop, if any. Idempotent; safe to call from
    /// any poll phase. The timer resource is released before returning.
    pub async fn stop(&self) {
        let mut active = self.active.lock().await;
        Self::halt(active.take()).await;
    }

    /// Replaces the active poll target with a new loop for `version_id`.
    /// The previous target is fully stopped before the new loop begins.
    async fn spawn_poll(&self, version_id: VersionId) {
        let mut active = self.active.lock().await;
        Self::halt(active.take()).await;

        let (cancel_tx, cancel_rx) = watch::channel(false);

        let api = Arc::clone(&self.api);
        let store = Arc::clone(&self.store);
        let events = self.events_tx.clone();
        let interval = self.poll_interval;

        let handle = tokio::spawn(async move {
            poll_loop(api, store, events, version_id, interval, cancel_rx).await;
        });

        *active = Some(ActivePoll {
            version_id,
            cancel_tx,
            handle,
        });
    }

    /// Cancels a poll task and waits for it to wind down.
    async fn halt(poll: Option<ActivePoll>) {
        if let Some(poll) = poll {
            let _ = poll.cancel_tx.send(true);
            if let Err(e) = poll.handle.await {
                warn!(version_id = poll.version_id, error = %e, "Poll task panicked");
            }
            debug!(version_id = poll.version_id, "Poll target released");
        }
    }
}

/// Timer-driven poll loop for one version.
///
/// Fetches the version once per interval; fetches never overlap because
/// each one is awaited inline. Transient fetch failures are surfaced as
/// advisory events and retried at the next tick. The loop exits on the
/// first terminal status or on cancellation.
async fn poll_loop(
    api: Arc<dyn VersionsApi>,
    store: Arc<VersionStore>,
    events: mpsc::UnboundedSender<PollEvent>,
    version_id: VersionId,
    interval: Duration,
    mut cancel_rx: watch::Receiver<bool>,
) {
    debug!(version_id, "Poll loop started");

    loop {
        tokio::select! {
            _ = cancel_rx.changed() => break,
            _ = tokio::time::sleep(interval) => {}
        }

        match api.get_version(version_id).await {
            Ok(version) => {
                let status = version.status;
                store.apply_polled(version).await;

                if status.is_terminal() {
                    info!(version_id, status = %status, "Observed terminal status");
                    let _ = events.send(PollEvent::Terminal { version_id, status });
                    break;
                }

                let _ = events.send(PollEvent::Status { version_id, status });
            }
            Err(e) => {
                let message = e.to_string();
                warn!(version_id, error = %message, "Poll fetch failed, retrying next tick");
                store.record_advisory(StoreError::Fetch(e)).await;
                let _ = events.send(PollEvent::Error {
                    version_id,
                    message,
                });
            }
        }

        // A stop() issued while the fetch was in flight takes effect here.
        if *cancel_rx.borrow() {
            break;
        }
    }

    debug!(version_id, "Poll loop stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::ApiError;
    use crate::method::ColumnSelection;
    use crate::model::{DataType, NewVersionRecord, TaskId, Version};
    use async_trait::async_trait;
    use chrono::Utc;
    use std::collections::{HashMap, VecDeque};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex as StdMutex;

    /// Backend with a scripted per-tick status sequence and call counters.
    struct SequencedApi {
        versions: StdMutex<Vec<Version>>,
        /// Status script for `get_version`; `None` entries simulate a
        /// transport failure. The last entry repeats once exhausted.
        script: StdMutex<VecDeque<Option<VersionStatus>>>,
        get_calls: AtomicUsize,
        submit_calls: AtomicUsize,
        submit_response: StdMutex<Result<(), u16>>,
        inflight: AtomicUsize,
        max_inflight: AtomicUsize,
    }

    impl SequencedApi {
        fn new(versions: Vec<Version>) -> Self {
            Self {
                versions: StdMutex::new(versions),
                script: StdMutex::new(VecDeque::new()),
                get_calls: AtomicUsize::new(0),
                submit_calls: AtomicUsize::new(0),
                submit_response: StdMutex::new(Ok(())),
                inflight: AtomicUsize::new(0),
                max_inflight: AtomicUsize::new(0),
            }
        }

        fn script_statuses(&self, statuses: &[Option<VersionStatus>]) {
            *self.script.lock().unwrap() = statuses.iter().cloned().collect();
        }

        fn reject_submissions(&self, code: u16) {
            *self.submit_response.lock().unwrap() = Err(code);
        }

        fn next_scripted(&self) -> Option<VersionStatus> {
            let mut script = self.script.lock().unwrap();
            if script.len() > 1 {
                script.pop_front().unwrap()
            } else {
                script.front().cloned().unwrap_or(Some(VersionStatus::Running))
            }
        }
    }

    #[async_trait]
    impl VersionsApi for SequencedApi {
        async fn list_versions(&self, task_id: TaskId) -> Result<Vec<Version>, ApiError> {
            Ok(self
                .versions
                .lock()
                .unwrap()
                .iter()
                .filter(|v| v.task_id == task_id)
                .cloned()
                .collect())
        }

        async fn get_version(&self, id: VersionId) -> Result<Version, ApiError> {
            self.get_calls.fetch_add(1, Ordering::SeqCst);
            let inflight = self.inflight.fetch_add(1, Ordering::SeqCst) + 1;
            self.max_inflight.fetch_max(inflight, Ordering::SeqCst);
            tokio::task::yield_now().await;
            self.inflight.fetch_sub(1, Ordering::SeqCst);

            let scripted = self.next_scripted();
            let mut version = self
                .versions
                .lock()
                .unwrap()
                .iter()
                .find(|v| v.id == id)
                .cloned()
                .expect("scripted backend always knows the polled version");

            match scripted {
                Some(status) => {
                    version.status = status;
                    Ok(version)
                }
                None => Err(ApiError::Transport("connection reset".to_string())),
            }
        }

        async fn create_version(&self, _record: &NewVersionRecord) -> Result<Version, ApiError> {
            unimplemented!("not exercised by orchestrator tests")
        }

        async fn submit_method(&self, _request: &SubmitRequest) -> Result<(), ApiError> {
            self.submit_calls.fetch_add(1, Ordering::SeqCst);
            match *self.submit_response.lock().unwrap() {
                Ok(()) => Ok(()),
                Err(code) => Err(ApiError::Status {
                    code,
                    message: "processor unavailable".to_string(),
                }),
            }
        }
    }

    fn raw_version(id: VersionId) -> Version {
        Version {
            id,
            task_id: 1,
            method_id: Some(5),
            name: format!("v{}", id),
            prev_version: Some(1),
            status: VersionStatus::Raw,
            config: serde_json::Value::Null,
            processed_file: None,
            data_types: Some(HashMap::from([(
                "age".to_string(),
                DataType::Quantitative,
            )])),
            created_at: Utc::now(),
        }
    }

    fn selection() -> ColumnSelection {
        ColumnSelection::new("imputation", "mean").with_columns(vec!["age".to_string()])
    }

    async fn setup(
        versions: Vec<Version>,
        session: Option<SessionContext>,
    ) -> (
        Arc<SequencedApi>,
        Arc<VersionStore>,
        PipelineOrchestrator,
        mpsc::UnboundedReceiver<PollEvent>,
    ) {
        let api = Arc::new(SequencedApi::new(versions));
        let store = Arc::new(VersionStore::new(
            Arc::clone(&api) as Arc<dyn VersionsApi>,
            1,
        ));
        store.list_versions().await.expect("seed snapshot");

        let (orchestrator, events) = PipelineOrchestrator::new(
            Arc::clone(&api) as Arc<dyn VersionsApi>,
            Arc::clone(&store),
            session,
            Duration::from_secs(5),
        );
        (api, store, orchestrator, events)
    }

    fn session() -> Option<SessionContext> {
        Some(SessionContext::new(42, "token"))
    }

    #[tokio::test]
    async fn test_start_unknown_version() {
        let (api, _, orchestrator, _events) = setup(vec![raw_version(10)], session()).await;

        let result = orchestrator.start(99, &selection()).await;
        assert!(matches!(result, Err(PipelineError::NotFound(99))));
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_without_session() {
        let (api, _, orchestrator, _events) = setup(vec![raw_version(10)], None).await;

        let result = orchestrator.start(10, &selection()).await;
        assert!(matches!(result, Err(PipelineError::Auth)));
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_with_blank_token() {
        let (_, _, orchestrator, _events) =
            setup(vec![raw_version(10)], Some(SessionContext::new(42, ""))).await;

        let result = orchestrator.start(10, &selection()).await;
        assert!(matches!(result, Err(PipelineError::Auth)));
    }

    #[tokio::test]
    async fn test_start_rejects_non_raw_version() {
        let mut version = raw_version(10);
        version.status = VersionStatus::Running;
        let (api, _, orchestrator, _events) = setup(vec![version], session()).await;

        let result = orchestrator.start(10, &selection()).await;
        assert!(matches!(
            result,
            Err(PipelineError::State {
                id: 10,
                status: VersionStatus::Running
            })
        ));

        // The idempotency guard performs no network call.
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
        assert_eq!(api.get_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_start_rejects_terminal_version() {
        let mut version = raw_version(10);
        version.status = VersionStatus::Processed;
        let (_, _, orchestrator, _events) = setup(vec![version], session()).await;

        let result = orchestrator.start(10, &selection()).await;
        assert!(matches!(result, Err(PipelineError::State { .. })));
    }

    #[tokio::test]
    async fn test_null_payload_never_reaches_processor() {
        let (api, _, orchestrator, _events) = setup(vec![raw_version(10)], session()).await;

        // Selection below the method's column minimum generates no payload.
        let empty = ColumnSelection::new("imputation", "mean");
        let result = orchestrator.start(10, &empty).await;

        assert!(matches!(result, Err(PipelineError::Validation(_))));
        assert_eq!(api.submit_calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_rejected_submission_leaves_version_raw() {
        let (api, store, orchestrator, _events) = setup(vec![raw_version(10)], session()).await;
        api.reject_submissions(500);

        let result = orchestrator.start(10, &selection()).await;
        assert!(matches!(result, Err(PipelineError::Submission(_))));

        // No optimistic transition, no poll loop.
        assert_eq!(
            store.get(10).await.map(|v| v.status),
            Some(VersionStatus::Raw)
        );
        assert_eq!(orchestrator.poll_target().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_poll_stops_on_terminal_status() {
        let (api, store, orchestrator, mut events) =
            setup(vec![raw_version(10)], session()).await;
        api.script_statuses(&[
            Some(VersionStatus::Running),
            Some(VersionStatus::Running),
            Some(VersionStatus::Processed),
        ]);

        orchestrator.start(10, &selection()).await.expect("start");
        assert_eq!(
            store.get(10).await.map(|v| v.status),
            Some(VersionStatus::Running)
        );

        // Two non-terminal ticks, then the terminal one.
        assert_eq!(
            events.recv().await,
            Some(PollEvent::Status {
                version_id: 10,
                status: VersionStatus::Running
            })
        );
        assert_eq!(
            events.recv().await,
            Some(PollEvent::Status {
                version_id: 10,
                status: VersionStatus::Running
            })
        );
        assert_eq!(
            events.recv().await,
            Some(PollEvent::Terminal {
                version_id: 10,
                status: VersionStatus::Processed
            })
        );

        assert_eq!(api.get_calls.load(Ordering::SeqCst), 3);
        assert_eq!(
            store.get(10).await.map(|v| v.status),
            Some(VersionStatus::Processed)
        );

        // The loop is gone: no fourth fetch however long we wait.
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.get_calls.load(Ordering::SeqCst), 3);
        assert_eq!(api.max_inflight.load(Ordering::SeqCst), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn test_transient_poll_failure_continues() {
        let (api, store, orchestrator, mut events) =
            setup(vec![raw_version(10)], session()).await;
        api.script_statuses(&[
            Some(VersionStatus::Running),
            None, // transport failure on the second tick
            Some(VersionStatus::Failed),
        ]);

        orchestrator.start(10, &selection()).await.expect("start");

        assert!(matches!(
            events.recv().await,
            Some(PollEvent::Status { .. })
        ));
        assert!(matches!(
            events.recv().await,
            Some(PollEvent::Error { version_id: 10, .. })
        ));
        assert_eq!(
            events.recv().await,
            Some(PollEvent::Terminal {
                version_id: 10,
                status: VersionStatus::Failed
            })
        );

        // The transient failure was recorded but never halted the loop.
        assert!(matches!(
            store.take_advisory().await,
            Some(StoreError::Fetch(_))
        ));
        assert_eq!(api.get_calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_is_idempotent() {
        let (api, _, orchestrator, mut events) = setup(vec![raw_version(10)], session()).await;
        api.script_statuses(&[Some(VersionStatus::Running)]);

        orchestrator.start(10, &selection()).await.expect("start");
        assert_eq!(orchestrator.poll_target().await, Some(10));

        // Let at least one tick through, then cancel twice.
        assert!(matches!(
            events.recv().await,
            Some(PollEvent::Status { .. })
        ));
        orchestrator.stop().await;
        orchestrator.stop().await;
        assert_eq!(orchestrator.poll_target().await, None);

        let fetches = api.get_calls.load(Ordering::SeqCst);
        tokio::time::sleep(Duration::from_secs(30)).await;
        assert_eq!(api.get_calls.load(Ordering::SeqCst), fetches);
    }

    #[tokio::test(start_paused = true)]
    async fn test_stop_without_start_is_a_no_op() {
        let (_, _, orchestrator, _events) = setup(vec![raw_version(10)], session()).await;
        orchestrator.stop().await;
        assert_eq!(orchestrator.poll_target().await, None);
    }

    #[tokio::test(start_paused = true)]
    async fn test_new_start_supersedes_previous_poll_target() {
        let (api, _, orchestrator, mut events) =
            setup(vec![raw_version(10), raw_version(11)], session()).await;
        api.script_statuses(&[Some(VersionStatus::Running)]);

        orchestrator.start(10, &selection()).await.expect("start");
        assert!(matches!(
            events.recv().await,
            Some(PollEvent::Status { version_id: 10, .. })
        ));

        orchestrator.start(11, &selection()).await.expect("restart");
        assert_eq!(orchestrator.poll_target().await, Some(11));

        // Only the new target is polled from here on.
        for _ in 0..10 {
            match events.recv().await {
                Some(PollEvent::Status { version_id, .. })
                | Some(PollEvent::Terminal { version_id, .. }) => {
                    if version_id == 10 {
                        // Allow ticks already in flight at supersede time.
                        continue;
                    }
                    assert_eq!(version_id, 11);
                    return;
                }
                other => panic!("unexpected event: {:?}", other),
            }
        }
        panic!("never observed a tick for the superseding target");
    }
}
