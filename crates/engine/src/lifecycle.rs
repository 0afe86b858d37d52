// SPDX-License-Identifier: BUSL-1.1
// Copyright (c) 2026 Alfred Jean LLC

//! The subtask lifecycle: `restore`, `invoke`, `cancel`, failure handling,
//! and the checkpoint control surface a coordinator drives from other
//! threads.
//!
//! Operator business logic itself is out of scope here — [`Operator`] and
//! [`SubtaskCallbacks`] are the seams a host plugs real chain behavior into.
//! This module is only responsible for calling into those seams in the
//! right order and at the right lifecycle point, and for keeping the
//! replay log, timers, and mailbox consistent around them.

use crate::checkpoint::{CheckpointOutcome, SyncSavepointGate};
use crate::dp_log::DpLogManager;
use crate::data_log::DataLogManager;
use crate::error::{EngineError, EngineResult};
use crate::mailbox::TaskMailbox;
use crate::pause::PauseController;
use crate::processor::{DefaultAction, MailboxProcessor};
use crate::resolver::MailResolver;
use crate::timer_service::{RecurringTimerHandle, TimerService, TIMER_FIRED_MAIL};
use fluxtask_core::{
    first_or_suppressed, LifecyclePhase, LogRecord, Mail, MailArg, StepAllocator, StepNumber,
    SubtaskError, SubtaskFlags, TimerId,
};
use fluxtask_storage::{
    AsyncLogWriter, AsyncLogWriterConfig, LocalFileLogStorage, LogStorageBackend, MemoryLogStorage,
    RemoteFsLogStorage,
};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::oneshot;
use tracing::{debug, error, info, warn};

const CHECKPOINT_MAIL: &str = "checkpoint";
const CHECKPOINT_COMPLETE_MAIL: &str = "checkpoint_complete";
const CHECKPOINT_ABORT_MAIL: &str = "checkpoint_abort";
const OPERATOR_EVENT_MAIL: &str = "operator_event";
const CONTROL_MAIL: &str = "control";
const REQUEST_PARTITIONS_MAIL: &str = "request_partitions";
const ASYNC_EXCEPTION_MAIL: &str = "__async_exception";

/// One operator in the chain. Closed head-to-tail on a clean shutdown,
/// disposed tail-to-head after that — both only ever called from the task
/// thread, never concurrently with the subtask's own execution.
pub trait Operator: Send {
    fn restore(&mut self) -> EngineResult<()> {
        Ok(())
    }
    fn close(&mut self) -> EngineResult<()> {
        Ok(())
    }
    fn dispose(&mut self) -> EngineResult<()> {
        Ok(())
    }
}

/// Hooks for the mails this crate wraps but whose payload interpretation is
/// the host's business: operator events, arbitrary control messages, and
/// per-gate partition requests issued once recovery's gate-state wait is
/// done. All default to a no-op so a test subtask can omit whichever it
/// doesn't exercise.
pub trait SubtaskCallbacks: Send + Sync {
    fn on_operator_event(&self, _operator_id: u64, _event: &[u8]) -> EngineResult<()> {
        Ok(())
    }
    fn on_control_message(&self, _message: &[u8]) -> EngineResult<()> {
        Ok(())
    }
    fn on_request_partitions(&self, _gate_index: u64) -> EngineResult<()> {
        Ok(())
    }
    fn on_timer(&self, _timer_id: TimerId) -> EngineResult<()> {
        Ok(())
    }
}

/// A no-op callback set, useful for subtasks driven purely by mails the
/// crate itself resolves (checkpoints, cancellation).
#[derive(Default)]
pub struct NoopCallbacks;
impl SubtaskCallbacks for NoopCallbacks {}

/// The external checkpoint coordinator this crate delegates to: it snapshots
/// all operators asynchronously and reports success or failure back.
pub trait CheckpointCoordinator: Send + Sync {
    fn snapshot(&self, checkpoint_id: u64) -> EngineResult<()>;
}

/// Broadcasts markers on the subtask's outputs that don't carry any real
/// payload of their own — used when a checkpoint is triggered on a subtask
/// that isn't running, or to push the max watermark ahead of a synchronous
/// savepoint so downstream consumers see it before the subtask blocks.
pub trait OutputBroadcaster: Send + Sync {
    fn broadcast_cancel_checkpoint(&self, checkpoint_id: u64);

    /// Emit the max watermark on every output partition. Called just before
    /// a synchronous savepoint begins when the checkpoint requested
    /// `advance_to_end_of_time`; a broadcaster with no watermark concept can
    /// leave this as a no-op.
    fn broadcast_max_watermark(&self, _checkpoint_id: u64) {}
}

/// Runs once, synchronously, when a failure or an external cancellation
/// needs to interrupt whatever the operator chain is doing. Unlike
/// [`Operator`], this is called from whichever thread requests the
/// cancellation, so it must be safe to invoke without task-thread access.
pub trait CancelHook: Send + Sync {
    fn cancel_task(&self) -> EngineResult<()>;
}

/// A closeable registered for the lifetime of some in-flight async work.
/// `close()` is invoked from whichever thread calls `cancel()`.
pub trait Cancelable: Send {
    fn close(&mut self);
}

#[derive(Default)]
struct CancelableRegistry {
    items: Mutex<Vec<Box<dyn Cancelable>>>,
}

impl CancelableRegistry {
    fn register(&self, item: Box<dyn Cancelable>) {
        self.items.lock().push(item);
    }

    fn close_all(&self) {
        let mut items = self.items.lock();
        for item in items.iter_mut() {
            item.close();
        }
        items.clear();
    }
}

/// The thread-safe control surface a coordinator holds to drive a subtask
/// from other threads: pause/resume, checkpoint triggering, cancellation,
/// and operator/control dispatch. Cheap to clone; every clone shares the
/// same underlying mailbox, flags, and pending-checkpoint table as the
/// [`Subtask`] it was built from.
#[derive(Clone)]
pub struct SubtaskControl {
    mailbox: TaskMailbox,
    pause: PauseController,
    savepoint_gate: SyncSavepointGate,
    flags: Arc<Mutex<SubtaskFlags>>,
    phase: Arc<Mutex<LifecyclePhase>>,
    pending_checkpoints: Arc<Mutex<HashMap<u64, oneshot::Sender<bool>>>>,
    next_checkpoint_id: Arc<AtomicU64>,
    cancelables: Arc<CancelableRegistry>,
    cancel_hook: Option<Arc<dyn CancelHook>>,
    pending_async_exception: Arc<Mutex<Option<SubtaskError>>>,
    coordinator: Option<Arc<dyn CheckpointCoordinator>>,
    broadcaster: Option<Arc<dyn OutputBroadcaster>>,
    writer: Arc<AsyncLogWriter>,
    /// Checkpoint id the output cache's next emitted record belongs to, if
    /// any checkpoint is currently awaiting a complete/abort notification.
    active_checkpoint: Arc<Mutex<Option<u64>>>,
    /// The same step sequence the DP and data logs allocate from, so
    /// `CheckpointBoundary`/`Clear` records interleave with mail and output
    /// records without ever repeating a step number.
    checkpoint_log_steps: Arc<StepAllocator>,
}

impl SubtaskControl {
    pub fn phase(&self) -> LifecyclePhase {
        *self.phase.lock()
    }

    pub fn flags(&self) -> SubtaskFlags {
        *self.flags.lock()
    }

    pub fn register_cancelable(&self, item: Box<dyn Cancelable>) {
        self.cancelables.register(item);
    }

    /// `trigger-checkpoint-async`: enqueues a checkpoint mail and resolves
    /// once the task thread has decided whether the checkpoint proceeded.
    pub async fn trigger_checkpoint_async(
        &self,
        synchronous_savepoint: bool,
        advance_to_end_of_time: bool,
    ) -> EngineResult<bool> {
        let id = self.next_checkpoint_id.fetch_add(1, Ordering::SeqCst);
        let (tx, rx) = oneshot::channel();
        self.pending_checkpoints.lock().insert(id, tx);

        let args = vec![
            MailArg::U64(id),
            MailArg::Bool(synchronous_savepoint),
            MailArg::Bool(advance_to_end_of_time),
        ];
        if self.mailbox.enqueue(Mail::new(CHECKPOINT_MAIL, args)).is_err() {
            self.pending_checkpoints.lock().remove(&id);
            return Ok(false);
        }

        rx.await.map_err(|_| {
            EngineError::Subtask(SubtaskError::CheckpointFailed {
                checkpoint_id: id,
                reason: "subtask dropped before responding to the checkpoint request".into(),
            })
        })
    }

    pub fn notify_checkpoint_complete_async(&self, checkpoint_id: u64) -> EngineResult<()> {
        self.mailbox
            .enqueue(Mail::high_priority(CHECKPOINT_COMPLETE_MAIL, vec![MailArg::U64(checkpoint_id)]))?;
        Ok(())
    }

    pub fn notify_checkpoint_abort_async(&self, checkpoint_id: u64) -> EngineResult<()> {
        self.mailbox
            .enqueue(Mail::high_priority(CHECKPOINT_ABORT_MAIL, vec![MailArg::U64(checkpoint_id)]))?;
        Ok(())
    }

    pub fn dispatch_operator_event(&self, operator_id: u64, event: Vec<u8>) -> EngineResult<()> {
        self.mailbox
            .enqueue(Mail::new(OPERATOR_EVENT_MAIL, vec![MailArg::U64(operator_id), MailArg::Bytes(event)]))?;
        Ok(())
    }

    pub fn send_control(&self, message: Vec<u8>) -> EngineResult<()> {
        self.mailbox.enqueue(Mail::new(CONTROL_MAIL, vec![MailArg::Bytes(message)]))?;
        Ok(())
    }

    pub fn pause(&self) {
        self.pause.pause();
    }

    pub fn resume(&self) {
        self.pause.resume();
    }

    /// `cancel()`: sets `canceled`, invokes the cancel hook, marks the
    /// mailbox all-actions-completed, and closes every registered
    /// cancelable. Safe to call from any thread.
    pub fn cancel(&self) -> EngineResult<()> {
        self.flags.lock().mark_canceled();
        {
            let mut phase = self.phase.lock();
            if !phase.is_terminal() {
                *phase = LifecyclePhase::Canceling;
            }
        }
        let hook_result = self.cancel_hook.as_ref().map(|hook| hook.cancel_task());
        self.mailbox.close();
        self.cancelables.close_all();
        match hook_result {
            Some(Err(e)) => Err(e),
            _ => Ok(()),
        }
    }

    /// `handle-async-exception`: records the cause and wakes the task
    /// thread with a high-priority mail whose handler rethrows it, driving
    /// the subtask down the same failure path a synchronous throw would.
    pub fn handle_async_exception(&self, context: impl Into<String>, cause: SubtaskError) -> EngineResult<()> {
        let context = context.into();
        error!(%context, error = %cause, "async exception reported from an auxiliary thread");
        *self.pending_async_exception.lock() = Some(cause);
        self.mailbox.enqueue(Mail::high_priority(ASYNC_EXCEPTION_MAIL, vec![MailArg::Str(context)]))?;
        Ok(())
    }

    fn resolve_checkpoint(&self, checkpoint_id: u64, proceeded: bool) {
        if let Some(tx) = self.pending_checkpoints.lock().remove(&checkpoint_id) {
            let _ = tx.send(proceeded);
        }
    }
}

fn expect_u64(mail: &Mail, index: usize) -> EngineResult<u64> {
    match mail.args.get(index) {
        Some(MailArg::U64(v)) => Ok(*v),
        other => Err(malformed(mail, index, "u64", other)),
    }
}

fn expect_bool(mail: &Mail, index: usize) -> EngineResult<bool> {
    match mail.args.get(index) {
        Some(MailArg::Bool(v)) => Ok(*v),
        other => Err(malformed(mail, index, "bool", other)),
    }
}

fn expect_bytes(mail: &Mail, index: usize) -> EngineResult<Vec<u8>> {
    match mail.args.get(index) {
        Some(MailArg::Bytes(v)) => Ok(v.clone()),
        other => Err(malformed(mail, index, "bytes", other)),
    }
}

fn expect_str(mail: &Mail, index: usize) -> EngineResult<String> {
    match mail.args.get(index) {
        Some(MailArg::Str(v)) => Ok(v.clone()),
        other => Err(malformed(mail, index, "str", other)),
    }
}

fn malformed(mail: &Mail, index: usize, expected: &str, got: Option<&MailArg>) -> EngineError {
    EngineError::Subtask(SubtaskError::TaskFailed(format!(
        "mail {:?} arg {index}: expected {expected}, got {got:?}",
        mail.name
    )))
}

fn handle_checkpoint_mail(control: &SubtaskControl, mail: &Mail) -> EngineResult<()> {
    let id = expect_u64(mail, 0)?;
    let synchronous_savepoint = expect_bool(mail, 1)?;
    let advance_to_end_of_time = expect_bool(mail, 2)?;

    if !control.flags().running {
        debug!(checkpoint_id = id, "subtask not running, broadcasting CancelCheckpointMarker");
        if let Some(broadcaster) = &control.broadcaster {
            broadcaster.broadcast_cancel_checkpoint(id);
        }
        control.resolve_checkpoint(id, false);
        return Ok(());
    }

    if synchronous_savepoint && advance_to_end_of_time {
        debug!(checkpoint_id = id, "emitting max watermark ahead of synchronous savepoint");
        if let Some(broadcaster) = &control.broadcaster {
            broadcaster.broadcast_max_watermark(id);
        }
    }
    if synchronous_savepoint {
        control.savepoint_gate.begin(id);
    }
    *control.active_checkpoint.lock() = Some(id);
    let boundary_step = control.checkpoint_log_steps.allocate();
    control.writer.append(LogRecord::CheckpointBoundary { step: boundary_step, checkpoint_id: id })?;

    let outcome = match &control.coordinator {
        Some(coordinator) => coordinator.snapshot(id),
        None => Ok(()),
    };

    match outcome {
        Ok(()) => {
            control.resolve_checkpoint(id, true);
            Ok(())
        }
        Err(e) => {
            warn!(checkpoint_id = id, error = %e, "checkpoint snapshot failed");
            control.savepoint_gate.resolve(id);
            control.resolve_checkpoint(id, false);
            Err(e)
        }
    }
}

fn build_resolver(
    control: SubtaskControl,
    callbacks: Arc<dyn SubtaskCallbacks>,
    timers: Arc<TimerService>,
) -> MailResolver {
    let mut resolver = MailResolver::new();

    resolver.register(CHECKPOINT_MAIL, Box::new({
        let control = control.clone();
        move |mail| handle_checkpoint_mail(&control, mail)
    }));

    resolver.register(CHECKPOINT_COMPLETE_MAIL, Box::new({
        let control = control.clone();
        move |mail| {
            let id = expect_u64(mail, 0)?;
            control.savepoint_gate.resolve(id);
            let mut active = control.active_checkpoint.lock();
            if *active == Some(id) {
                control.writer.clear_cached_output(id);
                let step = control.checkpoint_log_steps.allocate();
                control.writer.append(LogRecord::Clear { step, checkpoint_id: Some(id) })?;
                *active = None;
            }
            debug!(checkpoint_id = id, outcome = ?CheckpointOutcome::Completed, "checkpoint resolved");
            Ok(())
        }
    }));

    resolver.register(CHECKPOINT_ABORT_MAIL, Box::new({
        let control = control.clone();
        move |mail| {
            let id = expect_u64(mail, 0)?;
            control.savepoint_gate.resolve(id);
            let mut active = control.active_checkpoint.lock();
            if *active == Some(id) {
                *active = None;
            }
            debug!(checkpoint_id = id, outcome = ?CheckpointOutcome::Aborted, "checkpoint resolved");
            Ok(())
        }
    }));

    resolver.register(OPERATOR_EVENT_MAIL, Box::new({
        let callbacks = callbacks.clone();
        move |mail| {
            let operator_id = expect_u64(mail, 0)?;
            let event = expect_bytes(mail, 1)?;
            callbacks.on_operator_event(operator_id, &event)
        }
    }));

    resolver.register(CONTROL_MAIL, Box::new({
        let callbacks = callbacks.clone();
        move |mail| {
            let message = expect_bytes(mail, 0)?;
            callbacks.on_control_message(&message)
        }
    }));

    resolver.register(REQUEST_PARTITIONS_MAIL, Box::new({
        let callbacks = callbacks.clone();
        move |mail| {
            let gate_index = expect_u64(mail, 0)?;
            callbacks.on_request_partitions(gate_index)
        }
    }));

    resolver.register(TIMER_FIRED_MAIL, Box::new({
        let callbacks = callbacks.clone();
        let timers = timers.clone();
        move |mail| {
            let raw = expect_u64(mail, 0)?;
            let timer_id = TimerId::from_raw(raw);
            if timers.key_for(timer_id).as_deref() == Some("control-delay") {
                return Ok(());
            }
            callbacks.on_timer(timer_id)
        }
    }));

    resolver.register(ASYNC_EXCEPTION_MAIL, Box::new({
        let control = control.clone();
        move |mail| {
            let context = expect_str(mail, 0)?;
            let cause = control
                .pending_async_exception
                .lock()
                .take()
                .unwrap_or_else(|| SubtaskError::TaskFailed(context.clone()));
            Err(EngineError::Subtask(cause))
        }
    }));

    resolver
}

fn engine_err_to_subtask(err: EngineError) -> SubtaskError {
    match err {
        EngineError::Subtask(e) => e,
        other => SubtaskError::TaskFailed(other.to_string()),
    }
}

/// Drives one operator chain on its dedicated task thread through the
/// lifecycle: `Created -> Restoring -> GatesRecovering -> Running ->
/// Closing -> Disposed`, with `Canceling`/`Failing` side paths.
pub struct Subtask<A: DefaultAction> {
    id: String,
    operators: Vec<Box<dyn Operator>>,
    processor: MailboxProcessor<A>,
    control: SubtaskControl,
    timers: Arc<TimerService>,
    control_delay: Option<RecurringTimerHandle>,
    dp_log: DpLogManager,
    data_log: DataLogManager,
    writer: Arc<AsyncLogWriter>,
    gate_count: usize,
    restored: bool,
}

impl<A: DefaultAction> Subtask<A> {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        id: impl Into<String>,
        default_action: A,
        operators: Vec<Box<dyn Operator>>,
        callbacks: Arc<dyn SubtaskCallbacks>,
        coordinator: Option<Arc<dyn CheckpointCoordinator>>,
        broadcaster: Option<Arc<dyn OutputBroadcaster>>,
        cancel_hook: Option<Arc<dyn CancelHook>>,
        writer: Arc<AsyncLogWriter>,
        gate_count: usize,
        recovery_target: Option<StepNumber>,
    ) -> Self {
        let id = id.into();
        let mailbox = TaskMailbox::new();
        let pause = PauseController::new();
        let savepoint_gate = SyncSavepointGate::new();
        let timers = Arc::new(TimerService::new(mailbox.clone()));
        // One step sequence shared by every writer into this subtask's
        // combined log — DP log, data log, and checkpoint boundaries alike —
        // so the persisted step numbers stay strictly increasing across
        // record kinds, not just within one manager's own sequence.
        let step_allocator = Arc::new(StepAllocator::new());

        let control = SubtaskControl {
            mailbox: mailbox.clone(),
            pause: pause.clone(),
            savepoint_gate: savepoint_gate.clone(),
            flags: Arc::new(Mutex::new(SubtaskFlags::new())),
            phase: Arc::new(Mutex::new(LifecyclePhase::Created)),
            pending_checkpoints: Arc::new(Mutex::new(HashMap::new())),
            next_checkpoint_id: Arc::new(AtomicU64::new(0)),
            cancelables: Arc::new(CancelableRegistry::default()),
            cancel_hook,
            pending_async_exception: Arc::new(Mutex::new(None)),
            coordinator,
            broadcaster,
            writer: writer.clone(),
            active_checkpoint: Arc::new(Mutex::new(None)),
            checkpoint_log_steps: step_allocator.clone(),
        };

        let resolver = build_resolver(control.clone(), callbacks, timers.clone());
        let processor = MailboxProcessor::new(mailbox, resolver, pause, savepoint_gate, default_action);

        let dp_log = match recovery_target {
            Some(target) => DpLogManager::for_recovery(writer.clone(), step_allocator.clone(), target),
            None => DpLogManager::fresh(writer.clone(), step_allocator.clone()),
        };
        let data_log = DataLogManager::live(writer.clone(), step_allocator);

        Self {
            id,
            operators,
            processor,
            control,
            timers,
            control_delay: None,
            dp_log,
            data_log,
            writer,
            gate_count,
            restored: false,
        }
    }

    pub fn control(&self) -> SubtaskControl {
        self.control.clone()
    }

    pub fn mailbox(&self) -> &TaskMailbox {
        self.processor.mailbox()
    }

    /// Replace the live data log manager with one that replays previously
    /// logged output instead of emitting it, and drive the DP log's mail
    /// replay into the mailbox. Both managers read the same combined log —
    /// mail and output records share one file and are told apart by their
    /// `LogRecord` tag. Must be called before `restore`/`invoke`.
    pub fn begin_recovery(&mut self, backend: &dyn LogStorageBackend, log_name: &str) -> EngineResult<()> {
        self.dp_log.replay(backend, log_name, self.processor.mailbox())?;
        self.data_log = DataLogManager::recovering(
            self.writer.clone(),
            self.control.checkpoint_log_steps.clone(),
            backend,
            log_name,
        )?;
        Ok(())
    }

    pub fn log_enqueue(&mut self, mail: &Mail) -> EngineResult<StepNumber> {
        self.dp_log.log_enqueue(mail)
    }

    pub fn emit(&self, partition: u16, payload: Vec<u8>) -> EngineResult<(StepNumber, Vec<u8>)> {
        let (step, out) = self.data_log.emit(partition, payload)?;
        if let Some(checkpoint_id) = *self.control.active_checkpoint.lock() {
            self.writer.record_output_for_cache(checkpoint_id, out.clone());
        }
        Ok((step, out))
    }

    /// Turn on output caching so in-flight checkpoints can be retried
    /// without re-running the operator chain. Off by default.
    pub fn enable_output_cache(&self) {
        self.writer.enable_output_cache();
    }

    /// Arrange for a no-op mail to be enqueued on `interval`, purely to give
    /// the mailbox processor a scheduling decision point if the default
    /// action never yields control on its own.
    pub fn start_control_delay(&mut self, interval: Duration) {
        self.control_delay = Some(self.timers.spawn_recurring("control-delay", interval));
    }

    /// Documented cancellation-check yield point: an explicit check rather
    /// than exception-as-control-flow, raised as a tagged
    /// [`SubtaskError::Canceled`] callers recognize instead of a generic
    /// failure.
    fn ensure_not_canceled(&self) -> EngineResult<()> {
        if self.control.flags.lock().canceled {
            return Err(EngineError::Subtask(SubtaskError::Canceled));
        }
        Ok(())
    }

    /// `restore()`: runs task-specific init, then the mailbox loop until
    /// every input gate reports its state consumed, then enqueues one
    /// "request partitions" mail per gate.
    pub async fn restore(&mut self, mut gates: Vec<oneshot::Receiver<()>>) -> EngineResult<()> {
        self.ensure_not_canceled()?;
        *self.control.phase.lock() = LifecyclePhase::Restoring;
        for operator in self.operators.iter_mut() {
            operator.restore()?;
        }

        *self.control.phase.lock() = LifecyclePhase::GatesRecovering;
        while !gates.is_empty() {
            gates.retain_mut(|gate| matches!(gate.try_recv(), Err(oneshot::error::TryRecvError::Empty)));
            if gates.is_empty() {
                break;
            }
            self.ensure_not_canceled()?;
            if !self.processor.run_step().await? {
                self.ensure_not_canceled()?;
                break;
            }
        }

        for gate_index in 0..self.gate_count as u64 {
            self.processor
                .mailbox()
                .enqueue(Mail::new(REQUEST_PARTITIONS_MAIL, vec![MailArg::U64(gate_index)]))?;
        }

        *self.control.phase.lock() = LifecyclePhase::Running;
        self.restored = true;
        info!(subtask = %self.id, "restore complete");
        Ok(())
    }

    /// `invoke()`: restores if needed, runs the mailbox loop until all
    /// actions are completed, then tears the subtask down. Consumes the
    /// subtask — once invoked, a `Subtask` is disposed and cannot run again.
    pub async fn invoke(mut self, gates: Vec<oneshot::Receiver<()>>) -> EngineResult<()> {
        let restore_result = if self.restored { Ok(()) } else { self.restore(gates).await };

        let run_result = match restore_result {
            Ok(()) => {
                self.control.flags.lock().running = true;
                info!(subtask = %self.id, "subtask running");
                let result = self.processor.run_loop().await;
                self.control.flags.lock().running = false;
                result
            }
            Err(e) => Err(e),
        };

        let primary = match run_result {
            Ok(()) => None,
            Err(err) => {
                let is_cancellation =
                    matches!(&err, EngineError::Subtask(e) if e.is_cancellation());
                if is_cancellation {
                    info!(subtask = %self.id, "subtask canceled");
                    self.control.flags.lock().mark_canceled();
                } else {
                    error!(subtask = %self.id, error = %err, "subtask body failed");
                    self.control.flags.lock().mark_failed();
                }
                if let Some(hook) = self.control.cancel_hook.clone() {
                    if let Err(cancel_err) = hook.cancel_task() {
                        warn!(
                            subtask = %self.id,
                            error = %cancel_err,
                            "cancel_task failed while unwinding an earlier failure, suppressing"
                        );
                    }
                }
                Some(engine_err_to_subtask(err))
            }
        };

        *self.control.phase.lock() = LifecyclePhase::Closing;
        let cleanup_result = self.clean_up_invoke().await;
        *self.control.phase.lock() = LifecyclePhase::Disposed;

        let Subtask { writer, dp_log, data_log, .. } = self;
        drop(dp_log);
        drop(data_log);
        let flush_result = shutdown_writer(writer);

        let teardown = first_or_suppressed(
            cleanup_result.err().map(engine_err_to_subtask),
            flush_result.err().map(engine_err_to_subtask),
        );
        match first_or_suppressed(primary, teardown) {
            Some(e) => Err(EngineError::Subtask(e)),
            None => Ok(()),
        }
    }

    /// Close operators head-to-tail, quiesce timers, prepare-close and
    /// drain the mailbox, then dispose operators tail-to-head.
    async fn clean_up_invoke(&mut self) -> EngineResult<()> {
        for operator in self.operators.iter_mut() {
            operator.close()?;
        }
        debug!(subtask = %self.id, "operators closed head-to-tail");

        self.control_delay = None; // dropping cancels the recurring timer

        self.processor.prepare_close();
        self.processor.close();
        let drained = self.processor.drain();
        if !drained.is_empty() {
            debug!(subtask = %self.id, count = drained.len(), "discarded mail still queued at shutdown");
        }

        for operator in self.operators.iter_mut().rev() {
            operator.dispose()?;
        }
        self.control.flags.lock().disposed_operators = true;
        info!(subtask = %self.id, "operators disposed tail-to-head");
        Ok(())
    }
}

/// Open the log storage backend named by a subtask's configuration. The
/// crate does not parse configuration, but it does own the mapping from the
/// already-parsed [`fluxtask_core::LogStorageKind`] to a concrete backend.
pub fn open_log_storage(kind: &fluxtask_core::LogStorageKind) -> Box<dyn LogStorageBackend> {
    use fluxtask_core::LogStorageKind;
    match kind {
        LogStorageKind::Memory => Box::new(MemoryLogStorage::new()),
        LogStorageKind::LocalFile { directory } => Box::new(LocalFileLogStorage::new(directory.clone())),
        LogStorageKind::RemoteFs { mount } => Box::new(RemoteFsLogStorage::new(mount.clone())),
    }
}

/// Open the writer a subtask's log records — both mail enqueues and
/// emitted output — flow through, sized per the subtask's configuration.
///
/// If `config.clear_old_log` is set, any existing log under this subtask's
/// id is deleted first rather than appended to or recovered from. If
/// `config.enable_logging` is `false`, this still opens a writer (mail
/// replay is wired at a higher level by whether recovery is requested at
/// all), but callers that honor the flag skip calling this in the first
/// place and run without persistence.
pub fn spawn_writer(
    backend: &dyn LogStorageBackend,
    config: &fluxtask_core::SubtaskConfig,
) -> EngineResult<Arc<AsyncLogWriter>> {
    if config.clear_old_log {
        backend.clear(&config.subtask_id)?;
    }
    let appender = backend.open_append_or_create(&config.subtask_id)?;
    let writer = AsyncLogWriter::spawn(
        appender,
        AsyncLogWriterConfig {
            batch_size: config.log_writer_batch_size,
            flush_interval: config.log_writer_flush_interval,
            print_level: config.print_level,
        },
    )?;
    Ok(Arc::new(writer))
}

fn shutdown_writer(writer: Arc<AsyncLogWriter>) -> EngineResult<()> {
    match Arc::try_unwrap(writer) {
        Ok(writer) => writer.shutdown().map_err(EngineError::from),
        Err(_) => {
            warn!("log writer still has other live handles at shutdown, skipping explicit flush");
            Ok(())
        }
    }
}

#[cfg(test)]
#[path = "lifecycle_tests.rs"]
mod tests;
