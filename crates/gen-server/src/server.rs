//! # Server process
//!
//! [`GenServer`] is the producer-facing reference to one server process:
//! cast, call and close. It is cheap to clone and safe to share between any
//! number of tasks.

use crate::call::CallHandle;
use crate::config::ServerConfig;
use crate::dispatch;
use crate::error::GenServerError;
use crate::handler::Handler;
use crate::lifecycle::{Lifecycle, ServerState};
use crate::mailbox::{self, Mailbox};
use crate::message::Request;
use crate::pending::{self, CallStats, PendingCallStore};
use crate::reply::ReplyTo;
use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, info_span, Instrument};

/// Reference to a running server process.
#[derive(Clone)]
pub struct GenServer {
    inner: Arc<ServerInner>,
}

struct ServerInner {
    name: Arc<str>,
    mailbox: Mailbox,
    pending: Arc<PendingCallStore>,
    lifecycle: Lifecycle,
    next_sequence: AtomicU64,
}

impl GenServer {
    /// Start a server process around `handler`.
    pub fn start<H: Handler>(config: ServerConfig, handler: H) -> Result<Self, GenServerError> {
        Self::listen(config, move |_| handler)
    }

    /// Start a server process whose handler is built by `factory`.
    ///
    /// The factory receives a reference to the process before its dispatch
    /// loop runs, so the handler can keep it (for example to cast to
    /// itself). A handler holding its own reference keeps the process alive
    /// until [`close`](Self::close) is called.
    ///
    /// Must be called from within a tokio runtime.
    pub fn listen<H, F>(config: ServerConfig, factory: F) -> Result<Self, GenServerError>
    where
        H: Handler,
        F: FnOnce(GenServer) -> H,
    {
        config.validate()?;
        let runtime = Handle::try_current().map_err(|_| GenServerError::NoRuntime)?;

        let name: Arc<str> = Arc::from(config.name.as_str());
        let lifecycle = Lifecycle::new();
        let (mailbox, inbox, responses) = mailbox::mailbox(
            config.request_capacity,
            config.response_capacity,
            lifecycle.subscribe(),
        );
        let pending = Arc::new(PendingCallStore::new());

        let server = Self {
            inner: Arc::new(ServerInner {
                name: name.clone(),
                mailbox,
                pending: pending.clone(),
                lifecycle: lifecycle.clone(),
                next_sequence: AtomicU64::new(0),
            }),
        };
        let handler = factory(server.clone());

        let span = info_span!("gen_server", server = %name);
        runtime.spawn(
            pending::route_responses(responses, pending, lifecycle.subscribe(), name.clone())
                .instrument(span.clone()),
        );
        runtime.spawn(dispatch::run(handler, inbox, lifecycle, name.clone()).instrument(span));

        info!(
            server = %name,
            request_capacity = config.request_capacity,
            response_capacity = config.response_capacity,
            "Server process started"
        );
        Ok(server)
    }

    /// Submit `operation` without waiting for it to complete.
    ///
    /// Suspends only while the mailbox is full. Never fails directly: every
    /// failure is recorded on the returned handle. When `done` is given, the
    /// handle is also sent there on completion; the channel needs a free
    /// slot at that moment or the notification is dropped.
    pub async fn cast<A>(
        &self,
        operation: impl Into<String>,
        args: A,
        reply: ReplyTo,
        done: Option<mpsc::Sender<CallHandle>>,
    ) -> CallHandle
    where
        A: Any + Send,
    {
        let operation = operation.into();
        let sequence = self.inner.next_sequence.fetch_add(1, Ordering::Relaxed);
        let handle = CallHandle::new(sequence, operation.clone(), reply, done);

        if !self.inner.lifecycle.is_running() {
            self.fail(&handle, GenServerError::Shutdown);
            return handle;
        }
        if let Err(err) = self.inner.pending.register(&handle) {
            self.fail(&handle, err);
            return handle;
        }

        let mut in_transit = InTransit {
            server: self,
            sequence,
            armed: true,
        };
        let request = Request {
            sequence,
            operation,
            payload: Box::new(args),
        };
        let submitted = match self.inner.mailbox.enqueue(request).await {
            Ok(()) => self.inner.pending.mark_enqueued(sequence),
            Err(err) => {
                self.inner.pending.abandon(sequence);
                Err(err)
            }
        };
        in_transit.armed = false;

        if let Err(err) = submitted {
            self.fail(&handle, err);
        }
        handle
    }

    /// Submit `operation` and wait for it to complete.
    pub async fn call<A>(
        &self,
        operation: impl Into<String>,
        args: A,
        reply: ReplyTo,
    ) -> Result<(), GenServerError>
    where
        A: Any + Send,
    {
        self.cast(operation, args, reply, None).await.wait().await
    }

    /// Close the mailbox.
    ///
    /// New calls fail with [`GenServerError::Shutdown`], calls blocked on a
    /// full mailbox fail with [`GenServerError::MailboxClosed`], and calls
    /// still waiting for a response are released with `Shutdown`. A handler
    /// invocation already running is not interrupted. Closing twice returns
    /// `Shutdown`.
    pub fn close(&self) -> Result<(), GenServerError> {
        if !self.inner.lifecycle.begin_close() {
            return Err(GenServerError::Shutdown);
        }
        info!(
            server = %self.inner.name,
            pending = self.inner.pending.pending_count(),
            "Closing server process"
        );
        Ok(())
    }

    /// Wait until the dispatch loop has exited.
    pub async fn closed(&self) {
        self.inner.lifecycle.closed().await;
    }

    pub fn state(&self) -> ServerState {
        self.inner.lifecycle.state()
    }

    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.is_running()
    }

    /// Watch lifecycle transitions.
    ///
    /// The receiver outlives the process: once every `GenServer` clone is
    /// dropped the dispatch loop exits and the last value seen is `Closed`.
    pub fn subscribe(&self) -> watch::Receiver<ServerState> {
        self.inner.lifecycle.subscribe()
    }

    pub fn name(&self) -> &str {
        &self.inner.name
    }

    pub fn stats(&self) -> CallStats {
        self.inner.pending.stats()
    }

    /// Free slots in the request mailbox.
    pub fn mailbox_available(&self) -> usize {
        self.inner.mailbox.available()
    }

    fn fail(&self, handle: &CallHandle, err: GenServerError) {
        debug!(
            server = %self.inner.name,
            sequence = handle.sequence(),
            operation = handle.operation(),
            error = %err,
            "Call failed before reaching the handler"
        );
        if handle.complete(Err(err)) {
            self.inner.pending.record_failure();
        }
    }
}

impl fmt::Debug for GenServer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("GenServer")
            .field("name", &self.inner.name)
            .field("state", &self.state())
            .finish()
    }
}

/// Cleans up a call whose cast future is dropped mid-enqueue.
struct InTransit<'a> {
    server: &'a GenServer,
    sequence: u64,
    armed: bool,
}

impl Drop for InTransit<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        if let Some(handle) = self.server.inner.pending.abandon(self.sequence) {
            self.server
                .fail(&handle, GenServerError::SubmissionDropped);
        }
    }
}
