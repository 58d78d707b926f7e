// SPDX-License-Identifier: AGPL-3.0-only

//! Execution harness: runs cascades on a worker thread.
//!
//! The caller and the worker share nothing mutable but one `running` flag;
//! everything else crosses as messages on a channel pair:
//!
//! ```text
//! caller ── HarnessRequest ──▶ worker      Initialize | Run | Cancel | Shutdown
//! caller ◀── HarnessEvent ─── worker      Progress* then Complete | Failed
//! ```
//!
//! One run at a time: [`CascadeHarness::run`] fails synchronously with
//! [`CascadeError::AlreadyRunning`] while a run is active. The flag is
//! cleared before the terminal event is sent, so a caller that has received
//! `Complete` or `Failed` can always start the next run.
//!
//! `Cancel` travels on the request channel. The worker polls that channel
//! at generation boundaries, so cancellation never interrupts an in-flight
//! reaction query.

use crate::error::{CascadeError, ErrorKind};
use crate::params::CascadeParams;
use crate::progress::{CancelSignal, ProgressUpdate, RunContext};
use crate::simulator::{CascadeResult, CascadeSimulator};
use crate::source::ReactionSource;
use std::cell::{Cell, RefCell};
use std::collections::VecDeque;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{mpsc, Arc};
use std::thread::JoinHandle;
use std::time::Duration;

/// Requests accepted by the worker.
pub enum HarnessRequest {
    /// Attach (or replace) the reaction source.
    Initialize(Arc<dyn ReactionSource>),
    /// Start a run.
    Run(Box<CascadeParams>),
    /// Stop the active run at its next generation boundary.
    Cancel,
    /// Stop the worker (cancelling any active run first).
    Shutdown,
}

impl fmt::Debug for HarnessRequest {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Initialize(_) => write!(f, "Initialize(..)"),
            Self::Run(p) => f.debug_tuple("Run").field(p).finish(),
            Self::Cancel => write!(f, "Cancel"),
            Self::Shutdown => write!(f, "Shutdown"),
        }
    }
}

/// Terminal failure of a run, as delivered to the caller.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{message}")]
pub struct RunFailure {
    /// Failure mode.
    pub kind: ErrorKind,
    /// Rendered error.
    pub message: String,
}

impl From<CascadeError> for RunFailure {
    fn from(err: CascadeError) -> Self {
        Self {
            kind: err.kind(),
            message: err.to_string(),
        }
    }
}

/// Messages emitted by the worker. Per run: zero or more `Progress`, then
/// exactly one of `Complete` or `Failed`.
#[derive(Debug, Clone, PartialEq)]
pub enum HarnessEvent {
    /// Generation or finalization progress.
    Progress(ProgressUpdate),
    /// The run finished.
    Complete(Box<CascadeResult>),
    /// The run failed or was cancelled.
    Failed(RunFailure),
}

impl HarnessEvent {
    /// `Complete` or `Failed`.
    #[must_use]
    pub const fn is_terminal(&self) -> bool {
        !matches!(self, Self::Progress(_))
    }
}

/// Cancel signal backed by the worker's request channel.
///
/// Requests other than `Cancel` that arrive mid-run are kept, in order,
/// for the worker loop to handle once the run is over.
struct RequestPoller<'a> {
    requests: &'a mpsc::Receiver<HarnessRequest>,
    deferred: RefCell<VecDeque<HarnessRequest>>,
    cancelled: Cell<bool>,
}

impl<'a> RequestPoller<'a> {
    fn new(requests: &'a mpsc::Receiver<HarnessRequest>) -> Self {
        Self {
            requests,
            deferred: RefCell::new(VecDeque::new()),
            cancelled: Cell::new(false),
        }
    }

    fn into_deferred(self) -> VecDeque<HarnessRequest> {
        self.deferred.into_inner()
    }
}

impl CancelSignal for RequestPoller<'_> {
    fn is_cancelled(&self) -> bool {
        loop {
            match self.requests.try_recv() {
                Ok(HarnessRequest::Cancel) => self.cancelled.set(true),
                Ok(HarnessRequest::Shutdown) => {
                    self.cancelled.set(true);
                    self.deferred.borrow_mut().push_back(HarnessRequest::Shutdown);
                }
                Ok(other) => self.deferred.borrow_mut().push_back(other),
                Err(mpsc::TryRecvError::Empty) => break,
                Err(mpsc::TryRecvError::Disconnected) => {
                    self.cancelled.set(true);
                    break;
                }
            }
        }
        self.cancelled.get()
    }
}

fn execute(
    params: CascadeParams,
    source: &dyn ReactionSource,
    cancel: &dyn CancelSignal,
    events: &mpsc::Sender<HarnessEvent>,
) -> Result<CascadeResult, CascadeError> {
    let simulator = CascadeSimulator::new(params)?;
    let progress = events.clone();
    let mut ctx = RunContext::new(source, cancel).with_progress(move |update| {
        progress.send(HarnessEvent::Progress(update)).ok();
    });
    simulator.run(&mut ctx)
}

fn worker_loop(
    requests: &mpsc::Receiver<HarnessRequest>,
    events: &mpsc::Sender<HarnessEvent>,
    running: &AtomicBool,
) {
    let mut source: Option<Arc<dyn ReactionSource>> = None;
    let mut pending: VecDeque<HarnessRequest> = VecDeque::new();

    loop {
        let request = match pending.pop_front() {
            Some(r) => r,
            None => match requests.recv() {
                Ok(r) => r,
                Err(_) => break,
            },
        };
        match request {
            HarnessRequest::Initialize(s) => {
                log::debug!("harness: reaction source attached");
                source = Some(s);
            }
            HarnessRequest::Run(params) => {
                let poller = RequestPoller::new(requests);
                let outcome = match &source {
                    Some(s) => execute(*params, s.as_ref(), &poller, events),
                    None => Err(CascadeError::DatabaseNotInitialized),
                };
                pending.extend(poller.into_deferred());

                let event = match outcome {
                    Ok(result) => HarnessEvent::Complete(Box::new(result)),
                    Err(e) => {
                        log::warn!("harness: run failed: {e}");
                        HarnessEvent::Failed(e.into())
                    }
                };
                running.store(false, Ordering::SeqCst);
                if events.send(event).is_err() {
                    break;
                }
            }
            HarnessRequest::Cancel => log::debug!("harness: cancel with no active run ignored"),
            HarnessRequest::Shutdown => break,
        }
    }
    log::debug!("harness: worker stopped");
}

/// Handle to a cascade worker thread.
///
/// Dropping the handle shuts the worker down and joins it.
pub struct CascadeHarness {
    requests: mpsc::Sender<HarnessRequest>,
    events: mpsc::Receiver<HarnessEvent>,
    running: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl fmt::Debug for CascadeHarness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("CascadeHarness")
            .field("running", &self.is_running())
            .finish_non_exhaustive()
    }
}

impl CascadeHarness {
    /// Spawn a worker with no reaction source attached.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn spawn() -> std::io::Result<Self> {
        let (req_tx, req_rx) = mpsc::channel::<HarnessRequest>();
        let (event_tx, event_rx) = mpsc::channel::<HarnessEvent>();
        let running = Arc::new(AtomicBool::new(false));
        let worker_running = Arc::clone(&running);

        let worker = std::thread::Builder::new()
            .name("cascade-worker".into())
            .spawn(move || worker_loop(&req_rx, &event_tx, &worker_running))?;

        Ok(Self {
            requests: req_tx,
            events: event_rx,
            running,
            worker: Some(worker),
        })
    }

    /// Spawn a worker and attach `source`.
    ///
    /// # Errors
    ///
    /// Returns the OS error if the thread cannot be spawned.
    pub fn with_source(source: Arc<dyn ReactionSource>) -> std::io::Result<Self> {
        let harness = Self::spawn()?;
        harness.initialize(source);
        Ok(harness)
    }

    /// Attach or replace the reaction source. Applies to the next run.
    pub fn initialize(&self, source: Arc<dyn ReactionSource>) {
        self.requests.send(HarnessRequest::Initialize(source)).ok();
    }

    /// Start a run.
    ///
    /// # Errors
    ///
    /// - [`CascadeError::AlreadyRunning`] if a run is active
    /// - [`CascadeError::Collaborator`] if the worker has stopped
    ///
    /// Every other failure (fuel, parameters, missing source, queries,
    /// cancellation) arrives as a [`HarnessEvent::Failed`].
    pub fn run(&self, params: CascadeParams) -> Result<(), CascadeError> {
        if self
            .running
            .compare_exchange(false, true, Ordering::SeqCst, Ordering::SeqCst)
            .is_err()
        {
            return Err(CascadeError::AlreadyRunning);
        }
        if self.requests.send(HarnessRequest::Run(Box::new(params))).is_err() {
            self.running.store(false, Ordering::SeqCst);
            return Err(CascadeError::Collaborator(
                "cascade worker has stopped".into(),
            ));
        }
        Ok(())
    }

    /// Ask the active run to stop. Its effect is a later
    /// `Failed(Cancelled)`; with no active run this does nothing.
    pub fn cancel(&self) {
        self.requests.send(HarnessRequest::Cancel).ok();
    }

    /// Whether a run has been started and has not yet delivered its
    /// terminal event.
    #[must_use]
    pub fn is_running(&self) -> bool {
        self.running.load(Ordering::SeqCst)
    }

    /// Whether the worker thread is still running.
    #[must_use]
    pub fn is_worker_alive(&self) -> bool {
        self.worker.as_ref().is_some_and(|w| !w.is_finished())
    }

    /// Block for the next event. `None` once the worker has stopped.
    #[must_use]
    pub fn recv(&self) -> Option<HarnessEvent> {
        self.events.recv().ok()
    }

    /// Block up to `timeout` for the next event.
    #[must_use]
    pub fn recv_timeout(&self, timeout: Duration) -> Option<HarnessEvent> {
        self.events.recv_timeout(timeout).ok()
    }

    /// Next event if one is already queued.
    #[must_use]
    pub fn try_recv(&self) -> Option<HarnessEvent> {
        self.events.try_recv().ok()
    }

    /// Drain events until the current run's terminal event, passing each
    /// progress message to `on_progress`.
    ///
    /// # Errors
    ///
    /// The run's [`RunFailure`]; a worker that stops without a terminal
    /// event is reported as a collaborator failure.
    pub fn wait(
        &self,
        mut on_progress: impl FnMut(&ProgressUpdate),
    ) -> Result<CascadeResult, RunFailure> {
        while let Some(event) = self.recv() {
            match event {
                HarnessEvent::Progress(update) => on_progress(&update),
                HarnessEvent::Complete(result) => return Ok(*result),
                HarnessEvent::Failed(failure) => return Err(failure),
            }
        }
        Err(CascadeError::Collaborator("cascade worker has stopped".into()).into())
    }

    /// Stop the worker and wait for it. An active run is cancelled first
    /// and its `Failed(Cancelled)` event is discarded.
    pub fn shutdown(mut self) {
        self.stop();
    }

    fn stop(&mut self) {
        self.requests.send(HarnessRequest::Shutdown).ok();
        if let Some(worker) = self.worker.take() {
            if worker.join().is_err() {
                log::warn!("harness: worker thread panicked");
            }
        }
    }
}

impl Drop for CascadeHarness {
    fn drop(&mut self) {
        self.stop();
    }
}
