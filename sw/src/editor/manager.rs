//! WorkflowEditor - actor that owns the history store and revision state
//!
//! Commands are processed one at a time, so every edit, undo and revision
//! result runs to completion before the next. Revision calls run on their
//! own tasks and report back through the same command channel.

use std::sync::Arc;

use tokio::sync::{broadcast, mpsc, oneshot};
use tracing::{debug, info, warn};

use crate::config::Config;
use crate::domain::{Sequence, Step, StepId, StepPatch};
use crate::history::{CommitOutcome, SequenceHistoryStore, SessionToken};
use crate::revision::{IgnoreReason, Resolution, RevisionCoordinator, RevisionDecision, RevisionTicket};
use crate::service::{RevisionRequest, ServiceFailure, WorkflowService};

use super::events::EditorEvent;
use super::messages::{EditorCommand, EditorError, EditorResponse, LoadOutcome};

/// Settings for a new editor
#[derive(Debug, Clone)]
pub struct EditorSettings {
    pub history_limit: usize,
    pub low_confidence_threshold: f64,
    pub default_retry_prompt: String,
}

impl Default for EditorSettings {
    fn default() -> Self {
        Self::from_config(&Config::default())
    }
}

impl EditorSettings {
    pub fn from_config(config: &Config) -> Self {
        Self {
            history_limit: config.history.limit,
            low_confidence_threshold: config.revision.low_confidence_threshold,
            default_retry_prompt: config.revision.default_retry_prompt.clone(),
        }
    }
}

/// Point-in-time copy of the editor state
#[derive(Debug, Clone)]
pub struct Snapshot {
    pub steps: Sequence,
    pub history_len: usize,
    pub current_index: usize,
    pub can_undo: bool,
    pub can_redo: bool,
    pub session: SessionToken,
    pub revisions: RevisionCoordinator,
}

impl Snapshot {
    fn capture(store: &SequenceHistoryStore, coordinator: &RevisionCoordinator) -> Self {
        Self {
            steps: store.current().cloned().unwrap_or_default(),
            history_len: store.history_len(),
            current_index: store.current_index(),
            can_undo: store.can_undo(),
            can_redo: store.can_redo(),
            session: store.session(),
            revisions: coordinator.clone(),
        }
    }

    /// Retry affordance for a step
    pub fn can_retry(&self, step: &Step) -> bool {
        self.revisions.can_retry(step)
    }
}

/// Handle to send commands to the WorkflowEditor
#[derive(Clone)]
pub struct WorkflowEditor {
    tx: mpsc::Sender<EditorCommand>,
    event_tx: broadcast::Sender<EditorEvent>,
}

impl WorkflowEditor {
    /// Spawn a new WorkflowEditor actor
    pub fn spawn(service: Arc<dyn WorkflowService>, settings: EditorSettings) -> Self {
        debug!(?settings, "spawn: called");
        let (tx, rx) = mpsc::channel(256);
        let (event_tx, _) = broadcast::channel(64);

        let actor = EditorActor {
            store: SequenceHistoryStore::with_limit(settings.history_limit),
            coordinator: RevisionCoordinator::new(settings.low_confidence_threshold, settings.default_retry_prompt),
            service,
            self_tx: tx.downgrade(),
            event_tx: event_tx.clone(),
        };
        tokio::spawn(actor_loop(actor, rx));

        info!("WorkflowEditor spawned");
        Self { tx, event_tx }
    }

    /// Subscribe to editor events
    pub fn subscribe_events(&self) -> broadcast::Receiver<EditorEvent> {
        self.event_tx.subscribe()
    }

    async fn request<T>(&self, make: impl FnOnce(oneshot::Sender<T>) -> EditorCommand) -> EditorResponse<T> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| EditorError::ChannelClosed)?;
        reply_rx.await.map_err(|_| EditorError::ChannelClosed)
    }

    /// Load a generated sequence
    ///
    /// With `expected_session`, the load is refused if the editor was reset
    /// after that session began.
    pub async fn load(&self, sequence: Sequence, expected_session: Option<SessionToken>) -> EditorResponse<LoadOutcome> {
        debug!(step_count = sequence.len(), ?expected_session, "load: called");
        self.request(|reply| EditorCommand::Load {
            sequence,
            expected_session,
            reply,
        })
        .await
    }

    pub async fn reorder(&self, source: usize, destination: usize) -> EditorResponse<CommitOutcome> {
        debug!(source, destination, "reorder: called");
        self.request(|reply| EditorCommand::Reorder {
            source,
            destination,
            reply,
        })
        .await
    }

    pub async fn delete_step(&self, id: StepId) -> EditorResponse<CommitOutcome> {
        debug!(%id, "delete_step: called");
        self.request(|reply| EditorCommand::Delete { id, reply }).await
    }

    pub async fn update_step(&self, id: StepId, patch: StepPatch) -> EditorResponse<CommitOutcome> {
        debug!(%id, ?patch, "update_step: called");
        self.request(|reply| EditorCommand::Update { id, patch, reply }).await
    }

    pub async fn undo(&self) -> EditorResponse<bool> {
        debug!("undo: called");
        self.request(|reply| EditorCommand::Undo { reply }).await
    }

    pub async fn redo(&self) -> EditorResponse<bool> {
        debug!("redo: called");
        self.request(|reply| EditorCommand::Redo { reply }).await
    }

    /// Ask the service to revise one step
    ///
    /// Returns as soon as the request is started or ignored; the outcome
    /// arrives later as an [`EditorEvent`].
    pub async fn request_revision(&self, id: StepId, prompt: impl Into<String>) -> EditorResponse<RevisionDecision> {
        let prompt = prompt.into();
        debug!(%id, %prompt, "request_revision: called");
        self.request(|reply| EditorCommand::RequestRevision { id, prompt, reply })
            .await
    }

    /// Re-issue the last revision of a step
    pub async fn retry_revision(&self, id: StepId) -> EditorResponse<RevisionDecision> {
        debug!(%id, "retry_revision: called");
        self.request(|reply| EditorCommand::RetryRevision { id, reply }).await
    }

    pub async fn snapshot(&self) -> EditorResponse<Snapshot> {
        debug!("snapshot: called");
        self.request(|reply| EditorCommand::Snapshot { reply }).await
    }

    /// Clear everything and start a new session
    pub async fn reset(&self) -> EditorResponse<SessionToken> {
        debug!("reset: called");
        self.request(|reply| EditorCommand::Reset { reply }).await
    }

    /// Stop the actor
    pub async fn shutdown(&self) -> EditorResponse<()> {
        debug!("shutdown: called");
        self.tx
            .send(EditorCommand::Shutdown)
            .await
            .map_err(|_| EditorError::ChannelClosed)
    }
}

struct EditorActor {
    store: SequenceHistoryStore,
    coordinator: RevisionCoordinator,
    service: Arc<dyn WorkflowService>,
    /// Weak so the actor does not keep its own channel open
    self_tx: mpsc::WeakSender<EditorCommand>,
    event_tx: broadcast::Sender<EditorEvent>,
}

impl EditorActor {
    fn emit(&self, event: EditorEvent) {
        debug!(?event, "emit: called");
        // No subscribers is fine
        let _ = self.event_tx.send(event);
    }

    fn sequence_changed(&self) {
        self.emit(EditorEvent::SequenceChanged {
            history_len: self.store.history_len(),
            current_index: self.store.current_index(),
        });
    }

    fn after_commit(&self, outcome: CommitOutcome) -> CommitOutcome {
        if outcome.is_committed() {
            self.sequence_changed();
        }
        outcome
    }

    fn load(&mut self, sequence: Sequence, expected_session: Option<SessionToken>) -> LoadOutcome {
        if let Some(expected) = expected_session
            && expected != self.store.session()
        {
            warn!(%expected, current = %self.store.session(), "Discarding generated sequence from a previous session");
            return LoadOutcome::Stale;
        }
        let outcome = self.store.replace_all(sequence);
        LoadOutcome::Loaded(self.after_commit(outcome))
    }

    fn request_revision(&mut self, id: StepId, prompt: &str) -> RevisionDecision {
        if self.store.current().and_then(|seq| seq.find(&id)).is_none() {
            debug!(%id, "request_revision: unknown step");
            return RevisionDecision::Ignored(IgnoreReason::UnknownStep);
        }
        let decision = self.coordinator.begin(&id, prompt, self.store.session());
        self.dispatch_revision(&decision);
        decision
    }

    fn retry_revision(&mut self, id: StepId) -> RevisionDecision {
        let Some(step) = self.store.current().and_then(|seq| seq.find(&id)).cloned() else {
            debug!(%id, "retry_revision: unknown step");
            return RevisionDecision::Ignored(IgnoreReason::UnknownStep);
        };
        let decision = self.coordinator.retry(&step, self.store.session());
        self.dispatch_revision(&decision);
        decision
    }

    /// Run the service call for a started revision on its own task
    fn dispatch_revision(&self, decision: &RevisionDecision) {
        let RevisionDecision::Started(ticket) = decision else {
            return;
        };
        self.emit(EditorEvent::RevisionStarted {
            step_id: ticket.step_id.clone(),
        });

        let request = RevisionRequest {
            step_id: ticket.step_id.clone(),
            steps: self.store.current().cloned().unwrap_or_default(),
            revision_prompt: ticket.prompt.clone(),
        };
        let ticket = ticket.clone();
        let service = self.service.clone();
        let self_tx = self.self_tx.clone();

        tokio::spawn(async move {
            debug!(step_id = %ticket.step_id, "dispatch_revision: calling service");
            let result = service.request_revision(request).await;
            match self_tx.upgrade() {
                Some(tx) => {
                    if tx.send(EditorCommand::RevisionResolved { ticket, result }).await.is_err() {
                        debug!("dispatch_revision: editor stopped before result arrived");
                    }
                }
                None => debug!("dispatch_revision: editor gone, dropping result"),
            }
        });
    }

    fn revision_resolved(&mut self, ticket: RevisionTicket, result: Result<Step, ServiceFailure>) {
        let step_id = ticket.step_id.clone();
        match self.coordinator.resolve(&ticket, result, &mut self.store) {
            Resolution::Applied(outcome) if outcome.is_committed() => {
                self.after_commit(outcome);
                self.emit(EditorEvent::RevisionApplied { step_id });
            }
            Resolution::Applied(_) => {
                debug!(%step_id, "revision_resolved: result changed nothing");
                self.emit(EditorEvent::RevisionUnchanged { step_id });
            }
            Resolution::Failed(message) => self.emit(EditorEvent::RevisionFailed { step_id, message }),
            Resolution::Discarded => self.emit(EditorEvent::RevisionDiscarded { step_id }),
        }
    }

    fn reset(&mut self) -> SessionToken {
        self.store.reset();
        self.coordinator.clear();
        let session = self.store.session();
        self.emit(EditorEvent::SessionReset { session });
        session
    }
}

/// The actor loop - processes commands sequentially
async fn actor_loop(mut actor: EditorActor, mut rx: mpsc::Receiver<EditorCommand>) {
    debug!("WorkflowEditor actor started");

    while let Some(cmd) = rx.recv().await {
        match cmd {
            EditorCommand::Load {
                sequence,
                expected_session,
                reply,
            } => {
                debug!(step_count = sequence.len(), "actor_loop: Load command");
                let _ = reply.send(actor.load(sequence, expected_session));
            }

            EditorCommand::Reorder {
                source,
                destination,
                reply,
            } => {
                debug!(source, destination, "actor_loop: Reorder command");
                let outcome = actor.store.reorder(source, destination);
                let _ = reply.send(actor.after_commit(outcome));
            }

            EditorCommand::Delete { id, reply } => {
                debug!(%id, "actor_loop: Delete command");
                let outcome = actor.store.delete_step(&id);
                let _ = reply.send(actor.after_commit(outcome));
            }

            EditorCommand::Update { id, patch, reply } => {
                debug!(%id, "actor_loop: Update command");
                let outcome = actor.store.update_step(&id, &patch);
                let _ = reply.send(actor.after_commit(outcome));
            }

            EditorCommand::Undo { reply } => {
                debug!("actor_loop: Undo command");
                let moved = actor.store.undo();
                if moved {
                    actor.sequence_changed();
                }
                let _ = reply.send(moved);
            }

            EditorCommand::Redo { reply } => {
                debug!("actor_loop: Redo command");
                let moved = actor.store.redo();
                if moved {
                    actor.sequence_changed();
                }
                let _ = reply.send(moved);
            }

            EditorCommand::RequestRevision { id, prompt, reply } => {
                debug!(%id, "actor_loop: RequestRevision command");
                let _ = reply.send(actor.request_revision(id, &prompt));
            }

            EditorCommand::RetryRevision { id, reply } => {
                debug!(%id, "actor_loop: RetryRevision command");
                let _ = reply.send(actor.retry_revision(id));
            }

            EditorCommand::RevisionResolved { ticket, result } => {
                debug!(step_id = %ticket.step_id, ok = result.is_ok(), "actor_loop: RevisionResolved command");
                actor.revision_resolved(ticket, result);
            }

            EditorCommand::Snapshot { reply } => {
                let _ = reply.send(Snapshot::capture(&actor.store, &actor.coordinator));
            }

            EditorCommand::Reset { reply } => {
                debug!("actor_loop: Reset command");
                let _ = reply.send(actor.reset());
            }

            EditorCommand::Shutdown => {
                info!("WorkflowEditor shutting down");
                break;
            }
        }
    }

    debug!("WorkflowEditor actor stopped");
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::service::scripted::ScriptedService;
    use std::time::Duration;

    fn ab() -> Sequence {
        Sequence::new(vec![
            Step::new("a", "A").with_confidence(0.95),
            Step::new("b", "B").with_confidence(0.4),
        ])
    }

    fn revised(id: &str) -> Step {
        Step::new(id, "Revised step").with_confidence(0.95)
    }

    async fn wait_for(rx: &mut broadcast::Receiver<EditorEvent>, want: impl Fn(&EditorEvent) -> bool) -> EditorEvent {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                let event = rx.recv().await.unwrap();
                if want(&event) {
                    return event;
                }
            }
        })
        .await
        .expect("timed out waiting for editor event")
    }

    async fn wait_for_calls(service: &ScriptedService, calls: usize) {
        tokio::time::timeout(Duration::from_secs(5), async {
            while service.revision_calls() < calls {
                tokio::time::sleep(Duration::from_millis(5)).await;
            }
        })
        .await
        .expect("timed out waiting for service call");
    }

    fn spawn(service: &Arc<ScriptedService>) -> WorkflowEditor {
        WorkflowEditor::spawn(service.clone(), EditorSettings::default())
    }

    #[tokio::test]
    async fn test_edits_and_history_through_actor() {
        let service = Arc::new(ScriptedService::new());
        let editor = spawn(&service);

        assert_eq!(editor.load(ab(), None).await.unwrap(), LoadOutcome::Loaded(CommitOutcome::Committed));
        assert_eq!(editor.reorder(0, 1).await.unwrap(), CommitOutcome::Committed);
        assert!(editor.undo().await.unwrap());
        assert_eq!(editor.delete_step(StepId::from("a")).await.unwrap(), CommitOutcome::Committed);

        let snap = editor.snapshot().await.unwrap();
        assert_eq!(snap.history_len, 2);
        assert_eq!(snap.current_index, 1);
        assert!(!snap.can_redo);
        assert_eq!(snap.steps.ids(), vec![StepId::from("b")]);
    }

    #[tokio::test]
    async fn test_revision_success_commits_once() {
        let service = Arc::new(ScriptedService::new());
        service.push_revision(Ok(revised("b")));
        let editor = spawn(&service);
        let mut events = editor.subscribe_events();
        editor.load(ab(), None).await.unwrap();

        let decision = editor.request_revision(StepId::from("b"), "make it better").await.unwrap();
        assert!(matches!(decision, RevisionDecision::Started(_)));
        wait_for(&mut events, |e| matches!(e, EditorEvent::RevisionApplied { .. })).await;

        let snap = editor.snapshot().await.unwrap();
        assert_eq!(snap.history_len, 2);
        assert_eq!(snap.steps[1].title, "Revised step");
        assert!(!snap.revisions.is_in_flight(&StepId::from("b")));
    }

    #[tokio::test]
    async fn test_second_revision_while_in_flight_is_ignored() {
        let service = Arc::new(ScriptedService::gated());
        service.push_revision(Ok(revised("a")));
        let editor = spawn(&service);
        let mut events = editor.subscribe_events();
        editor.load(ab(), None).await.unwrap();

        let first = editor.request_revision(StepId::from("a"), "one").await.unwrap();
        assert!(matches!(first, RevisionDecision::Started(_)));
        wait_for_calls(&service, 1).await;

        let second = editor.request_revision(StepId::from("a"), "two").await.unwrap();
        assert_eq!(second, RevisionDecision::Ignored(IgnoreReason::InFlight));
        assert_eq!(editor.snapshot().await.unwrap().history_len, 1);

        service.release();
        wait_for(&mut events, |e| matches!(e, EditorEvent::RevisionApplied { .. })).await;
        assert_eq!(service.revision_calls(), 1);
        assert_eq!(editor.snapshot().await.unwrap().history_len, 2);
    }

    #[tokio::test]
    async fn test_failure_sets_error_without_history_change() {
        let service = Arc::new(ScriptedService::new());
        service.push_revision(Err(ServiceFailure::new("Failed to process revision request").with_code("REVISION_FAILED")));
        let editor = spawn(&service);
        let mut events = editor.subscribe_events();
        editor.load(ab(), None).await.unwrap();

        editor.request_revision(StepId::from("a"), "shorter").await.unwrap();
        let event = wait_for(&mut events, |e| matches!(e, EditorEvent::RevisionFailed { .. })).await;
        assert_eq!(
            event,
            EditorEvent::RevisionFailed {
                step_id: StepId::from("a"),
                message: "Failed to process revision request".to_string(),
            }
        );

        let snap = editor.snapshot().await.unwrap();
        assert_eq!(snap.history_len, 1);
        assert_eq!(
            snap.revisions.last_error(&StepId::from("a")),
            Some("Failed to process revision request")
        );
        assert!(snap.can_retry(&snap.steps[0]));
    }

    #[tokio::test]
    async fn test_result_after_reset_is_discarded() {
        let service = Arc::new(ScriptedService::gated());
        service.push_revision(Ok(revised("a")));
        let editor = spawn(&service);
        let mut events = editor.subscribe_events();
        editor.load(ab(), None).await.unwrap();

        editor.request_revision(StepId::from("a"), "x").await.unwrap();
        wait_for_calls(&service, 1).await;

        editor.reset().await.unwrap();
        editor
            .load(Sequence::new(vec![Step::new("a", "Fresh")]), None)
            .await
            .unwrap();

        service.release();
        wait_for(&mut events, |e| matches!(e, EditorEvent::RevisionDiscarded { .. })).await;

        let snap = editor.snapshot().await.unwrap();
        assert_eq!(snap.history_len, 1);
        assert_eq!(snap.steps[0].title, "Fresh");
    }

    #[tokio::test]
    async fn test_revision_of_deleted_step_reports_unchanged() {
        let service = Arc::new(ScriptedService::gated());
        service.push_revision(Ok(revised("b")));
        let editor = spawn(&service);
        let mut events = editor.subscribe_events();
        editor.load(ab(), None).await.unwrap();

        editor.request_revision(StepId::from("b"), "x").await.unwrap();
        wait_for_calls(&service, 1).await;
        assert_eq!(editor.delete_step(StepId::from("b")).await.unwrap(), CommitOutcome::Committed);

        service.release();
        let event = wait_for(&mut events, |e| {
            matches!(
                e,
                EditorEvent::RevisionApplied { .. } | EditorEvent::RevisionUnchanged { .. }
            )
        })
        .await;
        assert_eq!(event, EditorEvent::RevisionUnchanged { step_id: StepId::from("b") });

        let snap = editor.snapshot().await.unwrap();
        assert_eq!(snap.history_len, 2);
        assert_eq!(snap.steps.ids(), vec![StepId::from("a")]);
        assert!(!snap.revisions.is_in_flight(&StepId::from("b")));
    }

    #[tokio::test]
    async fn test_identical_revision_reports_unchanged() {
        let service = Arc::new(ScriptedService::new());
        service.push_revision(Ok(Step::new("a", "A").with_confidence(0.95)));
        let editor = spawn(&service);
        let mut events = editor.subscribe_events();
        editor.load(ab(), None).await.unwrap();

        editor.request_revision(StepId::from("a"), "same again").await.unwrap();
        let event = wait_for(&mut events, |e| {
            matches!(
                e,
                EditorEvent::RevisionApplied { .. } | EditorEvent::RevisionUnchanged { .. }
            )
        })
        .await;
        assert_eq!(event, EditorEvent::RevisionUnchanged { step_id: StepId::from("a") });
        assert_eq!(editor.snapshot().await.unwrap().history_len, 1);
    }

    #[tokio::test]
    async fn test_stale_load_refused() {
        let service = Arc::new(ScriptedService::new());
        let editor = spawn(&service);
        let session = editor.snapshot().await.unwrap().session;

        editor.reset().await.unwrap();
        let outcome = editor.load(ab(), Some(session)).await.unwrap();

        assert_eq!(outcome, LoadOutcome::Stale);
        assert_eq!(editor.snapshot().await.unwrap().history_len, 0);
    }

    #[tokio::test]
    async fn test_unknown_step_revision_ignored() {
        let service = Arc::new(ScriptedService::new());
        let editor = spawn(&service);
        editor.load(ab(), None).await.unwrap();

        let decision = editor.request_revision(StepId::from("zzz"), "x").await.unwrap();
        assert_eq!(decision, RevisionDecision::Ignored(IgnoreReason::UnknownStep));
        assert_eq!(service.revision_calls(), 0);
    }

    #[tokio::test]
    async fn test_retry_low_confidence_step() {
        let service = Arc::new(ScriptedService::new());
        service.push_revision(Ok(revised("b")));
        let editor = spawn(&service);
        let mut events = editor.subscribe_events();
        editor.load(ab(), None).await.unwrap();

        let high = editor.retry_revision(StepId::from("a")).await.unwrap();
        assert_eq!(high, RevisionDecision::Ignored(IgnoreReason::NotRetryable));

        let low = editor.retry_revision(StepId::from("b")).await.unwrap();
        assert!(matches!(low, RevisionDecision::Started(_)));
        wait_for(&mut events, |e| matches!(e, EditorEvent::RevisionApplied { .. })).await;
    }

    #[tokio::test]
    async fn test_shutdown_closes_channel() {
        let service = Arc::new(ScriptedService::new());
        let editor = spawn(&service);
        editor.shutdown().await.unwrap();
        tokio::time::sleep(Duration::from_millis(10)).await;
        assert!(matches!(editor.snapshot().await, Err(EditorError::ChannelClosed)));
    }
}
