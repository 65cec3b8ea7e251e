//! Pull-based replication from every known peer.

use crate::config::ReplicatorConfig;
use crate::error::{ReplicationError, ReplicationResult};
use crate::membership::MembershipHandler;
use crate::transport::{LocalLog, RecordStream, StreamDialer};
use parking_lot::Mutex;
use std::collections::HashMap;
use std::sync::Arc;
use tokio::runtime::Handle;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{Instrument, Span};

/// Copies every record from each joined peer into the local log.
///
/// One task per peer name dials the peer, asks for everything from offset
/// zero and appends each record it receives. Records reach the local log
/// at least once; a peer that is itself replicating from us will send our
/// own records back.
///
/// # Lifecycle
///
/// - `join` starts a task unless one is already running for the name
/// - `leave` cancels the task for the name
/// - `close` cancels every task; later joins fail with
///   [`ReplicationError::Closed`]
///
/// Tasks run on the tokio runtime that was current when the replicator
/// was created. A task that fails logs the error and ends without
/// affecting the others.
pub struct Replicator<L: LocalLog, D: StreamDialer> {
    config: ReplicatorConfig,
    log: Arc<L>,
    dialer: Arc<D>,
    runtime: Handle,
    span: Span,
    state: Mutex<ReplicatorState>,
}

#[derive(Default)]
struct ReplicatorState {
    peers: HashMap<String, PeerTask>,
    closed: bool,
}

struct PeerTask {
    addr: String,
    cancel: oneshot::Sender<()>,
    handle: JoinHandle<()>,
}

impl PeerTask {
    fn stop(self) {
        // The task may already be gone; a dropped receiver is fine.
        let _ = self.cancel.send(());
    }
}

impl<L: LocalLog, D: StreamDialer> Replicator<L, D> {
    /// Creates a replicator on the current tokio runtime.
    ///
    /// Every replication task is instrumented with a child of `span`.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::NoRuntime`] outside a tokio runtime.
    pub fn new(
        config: ReplicatorConfig,
        log: Arc<L>,
        dialer: Arc<D>,
        span: Span,
    ) -> ReplicationResult<Self> {
        let runtime =
            Handle::try_current().map_err(|e| ReplicationError::NoRuntime(e.to_string()))?;
        Ok(Self {
            config,
            log,
            dialer,
            runtime,
            span,
            state: Mutex::new(ReplicatorState::default()),
        })
    }

    /// Starts replicating from the peer `name` at `addr`.
    ///
    /// Joining the local node or a peer that is already being replicated
    /// does nothing. A peer whose previous task has ended is dialed again.
    ///
    /// # Errors
    ///
    /// Returns [`ReplicationError::Closed`] after [`Replicator::close`].
    pub fn join(&self, name: &str, addr: &str) -> ReplicationResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Err(ReplicationError::Closed);
        }
        if name == self.config.local_name {
            return Ok(());
        }
        if let Some(task) = state.peers.get(name) {
            if !task.handle.is_finished() {
                tracing::debug!(parent: &self.span, peer = name, "already replicating");
                return Ok(());
            }
        }

        let (cancel, cancelled) = oneshot::channel();
        let span = tracing::info_span!(parent: &self.span, "replicate", peer = name, addr);
        let handle = self.runtime.spawn(
            replicate(
                Arc::clone(&self.log),
                Arc::clone(&self.dialer),
                addr.to_owned(),
                cancelled,
            )
            .instrument(span),
        );

        let task = PeerTask {
            addr: addr.to_owned(),
            cancel,
            handle,
        };
        if let Some(previous) = state.peers.insert(name.to_owned(), task) {
            previous.stop();
        }
        tracing::info!(parent: &self.span, peer = name, addr, "peer joined");
        Ok(())
    }

    /// Stops replicating from `name`. Unknown names and calls after close
    /// are no-ops.
    ///
    /// # Errors
    ///
    /// Currently infallible; the result mirrors [`MembershipHandler`].
    pub fn leave(&self, name: &str) -> ReplicationResult<()> {
        let mut state = self.state.lock();
        if state.closed {
            return Ok(());
        }
        if let Some(task) = state.peers.remove(name) {
            tracing::info!(parent: &self.span, peer = name, addr = %task.addr, "peer left");
            task.stop();
        }
        Ok(())
    }

    /// Cancels every replication task. Closing twice is a no-op.
    pub fn close(&self) {
        let mut state = self.state.lock();
        if state.closed {
            return;
        }
        state.closed = true;
        let peers = state.peers.len();
        for (_, task) in state.peers.drain() {
            task.stop();
        }
        tracing::info!(parent: &self.span, peers, "replicator closed");
    }

    /// Returns true once [`Replicator::close`] has run.
    pub fn is_closed(&self) -> bool {
        self.state.lock().closed
    }

    /// Names of peers with a running replication task, sorted.
    pub fn active_peers(&self) -> Vec<String> {
        let state = self.state.lock();
        let mut names: Vec<String> = state
            .peers
            .iter()
            .filter(|(_, task)| !task.handle.is_finished())
            .map(|(name, _)| name.clone())
            .collect();
        names.sort();
        names
    }

    /// Returns the replicator configuration.
    pub fn config(&self) -> &ReplicatorConfig {
        &self.config
    }
}

impl<L: LocalLog, D: StreamDialer> MembershipHandler for Replicator<L, D> {
    fn join(&self, name: &str, addr: &str) -> ReplicationResult<()> {
        Replicator::join(self, name, addr)
    }

    fn leave(&self, name: &str) -> ReplicationResult<()> {
        Replicator::leave(self, name)
    }
}

impl<L: LocalLog, D: StreamDialer> Drop for Replicator<L, D> {
    fn drop(&mut self) {
        self.close();
    }
}

impl<L: LocalLog, D: StreamDialer> std::fmt::Debug for Replicator<L, D> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Replicator")
            .field("local_name", &self.config.local_name)
            .field("active_peers", &self.active_peers())
            .field("is_closed", &self.is_closed())
            .finish_non_exhaustive()
    }
}

async fn replicate<L: LocalLog, D: StreamDialer>(
    log: Arc<L>,
    dialer: Arc<D>,
    addr: String,
    mut cancelled: oneshot::Receiver<()>,
) {
    let mut stream = tokio::select! {
        _ = &mut cancelled => {
            tracing::debug!("cancelled before connecting");
            return;
        }
        dialed = dialer.dial(&addr, 0) => match dialed {
            Ok(stream) => stream,
            Err(e) => {
                tracing::error!(error = %e, "failed to dial peer");
                return;
            }
        },
    };
    tracing::debug!("replication stream open");

    let mut replicated = 0u64;
    loop {
        let next = tokio::select! {
            _ = &mut cancelled => {
                tracing::debug!(replicated, "replication stopped");
                return;
            }
            next = stream.next_record() => next,
        };

        match next {
            Ok(Some(record)) => {
                if let Err(e) = log.append(&record.value) {
                    tracing::error!(
                        error = %e,
                        peer_offset = record.offset,
                        "failed to append replicated record"
                    );
                    return;
                }
                replicated += 1;
            }
            Ok(None) => {
                tracing::info!(replicated, "peer ended replication stream");
                return;
            }
            Err(e) => {
                tracing::error!(error = %e, replicated, "replication stream failed");
                return;
            }
        }
    }
}
