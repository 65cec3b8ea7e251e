//! TCP server for the log service.

use crate::config::ServerConfig;
use crate::error::{ServerError, ServerResult};
use crate::handler::{LogService, Session};
use seglog_protocol::{read_frame, write_frame, Request, Response};
use std::net::SocketAddr;
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::{watch, Semaphore};
use tokio::task::{JoinHandle, JoinSet};
use tracing::Instrument;

/// A running log server.
///
/// Each connection is served by its own task. A connection answers one
/// response per request until it sends [`Request::ConsumeStream`], after
/// which it only carries records until either side goes away.
///
/// # Example
///
/// ```no_run
/// # async fn run() -> seglog_server::ServerResult<()> {
/// use seglog_core::{Config, Log};
/// use seglog_server::{AllowAll, LogServer, LogService, ServerConfig};
/// use std::sync::Arc;
///
/// let log = Arc::new(Log::open("/tmp/seglog", Config::default())?);
/// let service = Arc::new(LogService::new(log, Arc::new(AllowAll)));
/// let server = LogServer::bind(&ServerConfig::default(), service).await?;
///
/// // ...
/// server.shutdown().await?;
/// # Ok(())
/// # }
/// ```
#[derive(Debug)]
pub struct LogServer {
    local_addr: SocketAddr,
    shutdown: watch::Sender<bool>,
    task: JoinHandle<()>,
}

impl LogServer {
    /// Binds the listener and starts accepting connections.
    ///
    /// # Errors
    ///
    /// Returns an error if the address cannot be bound.
    pub async fn bind(config: &ServerConfig, service: Arc<LogService>) -> ServerResult<Self> {
        let listener = TcpListener::bind(config.bind_addr).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown, signal) = watch::channel(false);
        let limit = Arc::new(Semaphore::new(config.max_connections));

        let task = tokio::spawn(
            accept_loop(listener, service, limit, signal)
                .instrument(tracing::info_span!("log_server", %local_addr)),
        );

        tracing::info!(%local_addr, "log server listening");
        Ok(Self {
            local_addr,
            shutdown,
            task,
        })
    }

    /// Returns the bound address.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Stops accepting, ends every connection and waits for them.
    ///
    /// # Errors
    ///
    /// Returns an error if the server task panicked.
    pub async fn shutdown(self) -> ServerResult<()> {
        self.shutdown.send_replace(true);
        self.task
            .await
            .map_err(|e| ServerError::Internal(format!("server task failed: {e}")))?;
        tracing::info!(local_addr = %self.local_addr, "log server stopped");
        Ok(())
    }
}

async fn accept_loop(
    listener: TcpListener,
    service: Arc<LogService>,
    limit: Arc<Semaphore>,
    mut signal: watch::Receiver<bool>,
) {
    let connection_signal = signal.clone();
    let mut connections = JoinSet::new();

    loop {
        tokio::select! {
            _ = signal.wait_for(|stop| *stop) => break,
            accepted = listener.accept() => {
                let (stream, peer) = match accepted {
                    Ok(accepted) => accepted,
                    Err(e) => {
                        tracing::warn!(error = %e, "accept failed");
                        continue;
                    }
                };
                let Ok(permit) = Arc::clone(&limit).try_acquire_owned() else {
                    tracing::warn!(%peer, "connection limit reached, dropping connection");
                    continue;
                };

                let service = Arc::clone(&service);
                let signal = connection_signal.clone();
                connections.spawn(
                    async move {
                        tracing::debug!("connection opened");
                        if let Err(e) = serve_connection(stream, &service, signal).await {
                            tracing::debug!(error = %e, "connection ended with error");
                        }
                        drop(permit);
                    }
                    .instrument(tracing::debug_span!("connection", %peer)),
                );
            }
            Some(_) = connections.join_next(), if !connections.is_empty() => {}
        }
    }

    while connections.join_next().await.is_some() {}
}

async fn serve_connection(
    stream: TcpStream,
    service: &LogService,
    mut signal: watch::Receiver<bool>,
) -> ServerResult<()> {
    let (mut reader, mut writer) = stream.into_split();
    let mut session = Session::new();

    loop {
        let request = tokio::select! {
            _ = signal.wait_for(|stop| *stop) => return Ok(()),
            request = read_frame::<_, Request>(&mut reader) => request?,
        };
        let Some(request) = request else {
            return Ok(());
        };
        tracing::trace!(request = request.name(), "request received");

        match request {
            Request::ConsumeStream { offset } => {
                return stream_records(service, &session, offset, &mut reader, &mut writer, signal)
                    .await;
            }
            request => {
                let response = service.handle(&mut session, request);
                write_frame(&mut writer, &response).await?;
            }
        }
    }
}

async fn stream_records<R, W>(
    service: &LogService,
    session: &Session,
    offset: u64,
    reader: &mut R,
    writer: &mut W,
    mut signal: watch::Receiver<bool>,
) -> ServerResult<()>
where
    R: AsyncRead + Unpin,
    W: AsyncWrite + Unpin,
{
    let mut follower = match service.follow(session, offset) {
        Ok(follower) => follower,
        Err(e) => {
            write_frame(writer, &Response::error(e.status(), e.to_string())).await?;
            return Err(e);
        }
    };
    tracing::debug!(offset, "streaming records");

    loop {
        let record = tokio::select! {
            _ = signal.wait_for(|stop| *stop) => return Ok(()),
            incoming = read_frame::<_, Request>(reader) => {
                return match incoming? {
                    None => Ok(()),
                    Some(_) => Err(ServerError::InvalidRequest(
                        "requests are not accepted while streaming".into(),
                    )),
                };
            }
            record = follower.next_record() => record,
        };

        let record = match record {
            Ok(Some(record)) => record,
            Ok(None) => return Ok(()),
            Err(e) => {
                let e = ServerError::from(e);
                write_frame(writer, &Response::error(e.status(), e.to_string())).await?;
                return Err(e);
            }
        };
        write_frame(
            writer,
            &Response::Consume {
                record: record.into(),
            },
        )
        .await?;
    }
}
