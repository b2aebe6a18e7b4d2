//! HostBridge: many async callers, one blocking host.
//!
//! The host is moved onto a dedicated worker thread that drains a single
//! unbounded FIFO channel. Callers enqueue a call and await a one-shot reply,
//! so waiting for the host never blocks the async scheduler. Calls run one at
//! a time in submission order; a call that raises is answered with its error
//! and the worker moves on to the next one.
//!
//! ```text
//! caller A --submit--\
//! caller B --submit----> [ FIFO ] --> worker thread --> Host::call
//! caller C --submit--/                     |
//!     ^----------------- oneshot reply ----/
//! ```
//!
//! Shutting the bridge down stops new submissions. Queued calls are either
//! executed ([`ShutdownMode::Drain`]) or answered with
//! [`HostFault::Abandoned`] ([`ShutdownMode::Abandon`]). The worker is never
//! joined; [`HostBridge::closed`] lets an owner wait for it when it wants to.

use std::future::Future;
use std::panic::{self, AssertUnwindSafe};
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};

use regmux_core::HostCallFailed;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{mpsc, oneshot, watch};

use crate::error::{ApiCallError, HostError, HostFault};
use crate::reply::{decode_reply, HostErrorTable, NoDomainErrors};
use crate::traits::Host;

/// Outcome of a single host call.
pub type Outcome = std::result::Result<Value, HostFault>;

/// What the worker sends back: the arguments return with a fault so a
/// failed call can be reported without copying them up front.
type Answer = std::result::Result<Value, (HostFault, Vec<Value>)>;

/// Configuration for the bridge worker.
#[derive(Debug, Clone)]
pub struct BridgeConfig {
    /// Name of the worker thread.
    pub thread_name: String,
}

impl Default for BridgeConfig {
    fn default() -> Self {
        Self {
            thread_name: "regmux-host".to_string(),
        }
    }
}

/// What happens to queued calls when the bridge shuts down.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShutdownMode {
    /// Execute every call queued before the shutdown.
    Drain,
    /// Answer queued calls with [`HostFault::Abandoned`] without running them.
    Abandon,
}

struct WorkItem {
    function: String,
    args: Vec<Value>,
    reply: oneshot::Sender<Answer>,
}

struct BridgeInner {
    sender: Mutex<Option<mpsc::UnboundedSender<WorkItem>>>,
    abandon: Arc<AtomicBool>,
    exited: watch::Receiver<bool>,
}

/// Handle to the bridge. Cheap to clone; all clones feed the same worker.
#[derive(Clone)]
pub struct HostBridge {
    inner: Arc<BridgeInner>,
}

impl HostBridge {
    /// Move `host` onto a new worker thread and start serving calls.
    pub fn start<H: Host>(host: H, config: BridgeConfig) -> std::io::Result<Self> {
        let (sender, receiver) = mpsc::unbounded_channel();
        let (exited_tx, exited_rx) = watch::channel(false);
        let abandon = Arc::new(AtomicBool::new(false));

        let worker_abandon = Arc::clone(&abandon);
        std::thread::Builder::new()
            .name(config.thread_name.clone())
            .spawn(move || run_worker(host, receiver, worker_abandon, exited_tx))?;

        tracing::debug!(thread = %config.thread_name, "host bridge started");

        Ok(Self {
            inner: Arc::new(BridgeInner {
                sender: Mutex::new(Some(sender)),
                abandon,
                exited: exited_rx,
            }),
        })
    }

    /// Enqueue a call; the returned handle resolves exactly once.
    pub fn submit(&self, function: impl Into<String>, args: Vec<Value>) -> PendingCall {
        let function = function.into();
        let (reply, receiver) = oneshot::channel();

        let sender = match self.inner.sender.lock() {
            Ok(guard) => guard.clone(),
            Err(poisoned) => poisoned.into_inner().clone(),
        };
        let Some(sender) = sender else {
            tracing::debug!(function = %function, "submit on closed host bridge");
            return PendingCall::rejected(args);
        };

        tracing::debug!(function = %function, args = ?args, "queuing host call");
        match sender.send(WorkItem {
            function,
            args,
            reply,
        }) {
            Ok(()) => PendingCall::waiting(receiver),
            Err(mpsc::error::SendError(item)) => PendingCall::rejected(item.args),
        }
    }

    /// Run `function` on the host, mapping any fault to [`HostError::CallFailed`].
    pub async fn exec(&self, function: &str, args: Vec<Value>) -> Result<Value, HostError> {
        match self.submit(function, args).answer().await {
            Ok(value) => {
                tracing::debug!(function, result = %value, "host call finished");
                Ok(value)
            }
            Err((fault, args)) => {
                tracing::debug!(function, fault = %fault, "host call failed");
                Err(HostError::CallFailed(HostCallFailed {
                    function: function.to_string(),
                    args,
                    error: fault.to_string(),
                }))
            }
        }
    }

    /// Call an internal API function and decode its reply.
    ///
    /// Domain errors are decoded through the table `E`.
    pub async fn call_api<T, E>(&self, api_func: &str, args: Vec<Value>) -> Result<T, ApiCallError<E>>
    where
        T: DeserializeOwned,
        E: HostErrorTable,
    {
        let reply = self.exec(api_func, args).await?;
        decode_reply(api_func, reply)
    }

    /// Call an internal API function whose domain errors the caller cannot act
    /// on; every error code becomes [`HostError::InvalidResponse`].
    pub async fn call_api_no_error<T>(&self, api_func: &str, args: Vec<Value>) -> Result<T, HostError>
    where
        T: DeserializeOwned,
    {
        self.call_api::<T, NoDomainErrors>(api_func, args)
            .await
            .map_err(|e| match e {
                ApiCallError::Host(e) => e,
                ApiCallError::Domain(never) => match never {},
            })
    }

    /// Stop accepting calls. Idempotent; later calls only tighten the mode
    /// from drain to abandon.
    pub fn shutdown(&self, mode: ShutdownMode) {
        if mode == ShutdownMode::Abandon {
            self.inner.abandon.store(true, Ordering::Release);
        }
        let previous = match self.inner.sender.lock() {
            Ok(mut guard) => guard.take(),
            Err(poisoned) => poisoned.into_inner().take(),
        };
        if previous.is_some() {
            tracing::debug!(mode = ?mode, "host bridge shutting down");
        }
    }

    /// Whether the bridge still accepts calls.
    pub fn is_open(&self) -> bool {
        match self.inner.sender.lock() {
            Ok(guard) => guard.is_some(),
            Err(poisoned) => poisoned.into_inner().is_some(),
        }
    }

    /// Wait until the worker has exited.
    ///
    /// Only returns after [`shutdown`](Self::shutdown) once every queued call
    /// has been answered. Callers wanting a bound should wrap this in a
    /// timeout.
    pub async fn closed(&self) {
        let mut exited = self.inner.exited.clone();
        // An error means the worker dropped its end, which also means it is gone.
        let _ = exited.wait_for(|done| *done).await;
    }
}

fn run_worker<H: Host>(
    mut host: H,
    mut receiver: mpsc::UnboundedReceiver<WorkItem>,
    abandon: Arc<AtomicBool>,
    exited: watch::Sender<bool>,
) {
    while let Some(item) = receiver.blocking_recv() {
        if abandon.load(Ordering::Acquire) {
            let _ = item.reply.send(Err((HostFault::Abandoned, item.args)));
            continue;
        }
        execute(&mut host, item);
    }

    tracing::debug!("host worker exiting");
    let _ = exited.send(true);
}

fn execute<H: Host>(host: &mut H, item: WorkItem) {
    tracing::trace!(function = %item.function, "executing host call");

    let result = panic::catch_unwind(AssertUnwindSafe(|| host.call(&item.function, &item.args)));
    let answer = match result {
        Ok(Ok(value)) => Ok(value),
        Ok(Err(raised)) => Err((HostFault::Raised(raised.to_string()), item.args)),
        Err(payload) => Err((HostFault::Raised(panic_message(payload.as_ref())), item.args)),
    };

    // The caller may have stopped waiting; that is not the worker's problem.
    let _ = item.reply.send(answer);
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(message) = payload.downcast_ref::<&str>() {
        format!("host panicked: {}", message)
    } else if let Some(message) = payload.downcast_ref::<String>() {
        format!("host panicked: {}", message)
    } else {
        "host panicked".to_string()
    }
}

enum PendingState {
    Waiting(oneshot::Receiver<Answer>),
    Rejected(Option<Vec<Value>>),
}

/// Handle to a submitted call.
pub struct PendingCall {
    state: PendingState,
}

impl PendingCall {
    fn waiting(receiver: oneshot::Receiver<Answer>) -> Self {
        Self {
            state: PendingState::Waiting(receiver),
        }
    }

    fn rejected(args: Vec<Value>) -> Self {
        Self {
            state: PendingState::Rejected(Some(args)),
        }
    }

    /// Resolve with the call's arguments attached to any fault.
    async fn answer(mut self) -> Answer {
        std::future::poll_fn(|cx| self.poll_answer(cx)).await
    }

    fn poll_answer(&mut self, cx: &mut Context<'_>) -> Poll<Answer> {
        match &mut self.state {
            // A dropped reply means the worker died with the arguments.
            PendingState::Waiting(receiver) => Pin::new(receiver)
                .poll(cx)
                .map(|reply| reply.unwrap_or_else(|_| Err((HostFault::WorkerGone, Vec::new())))),
            PendingState::Rejected(args) => {
                Poll::Ready(Err((HostFault::Closed, args.take().unwrap_or_default())))
            }
        }
    }
}

impl Future for PendingCall {
    type Output = Outcome;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        self.poll_answer(cx).map(|answer| answer.map_err(|(fault, _)| fault))
    }
}
