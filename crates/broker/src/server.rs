use std::net::SocketAddr;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use relay_topics::TopicRegistry;
use tokio::net::TcpListener;
use tokio::sync::Semaphore;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tracing::{error, info, warn};

use crate::config::BrokerConfig;
use crate::connection::ConnectionHandler;
use crate::context::BrokerContext;
use crate::error::{Error, Result};

/// The broker: owns the shared context and the accept loop.
#[derive(Debug)]
pub struct BrokerServer {
    config: BrokerConfig,
    context: BrokerContext,
    local_addr: OnceLock<SocketAddr>,
    started: AtomicBool,
    shutdown_token: CancellationToken,
    task_tracker: TaskTracker,
}

impl BrokerServer {
    /// Creates a new instance of `BrokerServer` with an empty registry.
    #[must_use]
    pub fn new(config: BrokerConfig) -> Self {
        let context = BrokerContext::new(TopicRegistry::new(config.queue_capacity));

        Self {
            config,
            context,
            local_addr: OnceLock::new(),
            started: AtomicBool::new(false),
            shutdown_token: CancellationToken::new(),
            task_tracker: TaskTracker::new(),
        }
    }

    /// The shared broker state.
    #[must_use]
    pub const fn context(&self) -> &BrokerContext {
        &self.context
    }

    /// The address the listener is bound to, once started.
    #[must_use]
    pub fn local_addr(&self) -> Option<SocketAddr> {
        self.local_addr.get().copied()
    }

    /// Binds the listener and starts accepting connections.
    ///
    /// Returns the bound address, which differs from the configured one when
    /// port 0 was requested.
    ///
    /// # Errors
    ///
    /// Returns [`Error::AlreadyStarted`] on a second call, or
    /// [`Error::Bind`] if the address cannot be bound.
    pub async fn start(&self) -> Result<(SocketAddr, JoinHandle<()>)> {
        if self.task_tracker.is_closed()
            || self
                .started
                .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
                .is_err()
        {
            return Err(Error::AlreadyStarted);
        }

        let listener = match self.bind().await {
            Ok(listener) => listener,
            Err(e) => {
                self.started.store(false, Ordering::Release);
                return Err(e);
            }
        };
        let local_addr = listener.local_addr()?;
        let _ = self.local_addr.set(local_addr);

        info!("broker listening on {}", local_addr);

        let handle = self.task_tracker.spawn(Self::accept_loop(
            listener,
            self.context.clone(),
            self.config.clone(),
            self.shutdown_token.clone(),
            self.task_tracker.clone(),
        ));

        self.task_tracker.close();

        Ok((local_addr, handle))
    }

    async fn bind(&self) -> Result<TcpListener> {
        let listen_addr = self.config.listen_addr;
        TcpListener::bind(listen_addr)
            .await
            .map_err(|source| Error::Bind {
                addr: listen_addr,
                source,
            })
    }

    async fn accept_loop(
        listener: TcpListener,
        context: BrokerContext,
        config: BrokerConfig,
        shutdown_token: CancellationToken,
        task_tracker: TaskTracker,
    ) {
        let connection_permits = Arc::new(Semaphore::new(config.max_connections));

        loop {
            tokio::select! {
                () = shutdown_token.cancelled() => {
                    info!("listener closed");
                    break;
                }
                accept_result = listener.accept() => {
                    match accept_result {
                        Ok((stream, peer)) => {
                            let Ok(permit) = Arc::clone(&connection_permits).try_acquire_owned() else {
                                warn!("max connections reached, rejecting connection from {}", peer);
                                continue;
                            };

                            let handler = ConnectionHandler::new(
                                peer,
                                context.clone(),
                                config.clone(),
                                shutdown_token.clone(),
                            );

                            task_tracker.spawn(async move {
                                if let Err(e) = handler.run(stream).await {
                                    warn!("connection from {} ended with error: {}", peer, e);
                                }
                                drop(permit);
                            });
                        }
                        Err(e) => {
                            error!("failed to accept connection: {}", e);
                        }
                    }
                }
            }
        }
    }

    /// Stops accepting, drains connections and resets all state.
    ///
    /// Connections stop reading immediately; polls already waiting run out
    /// their timeout before this returns.
    pub async fn shutdown(&self) {
        info!("broker shutting down...");

        self.shutdown_token.cancel();
        self.task_tracker.close();
        self.task_tracker.wait().await;
        self.context.reset();

        info!("broker shutdown");
    }

    /// Waits until the broker has stopped.
    pub async fn wait(&self) {
        self.task_tracker.wait().await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn local_config() -> BrokerConfig {
        BrokerConfig {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 0)),
            ..BrokerConfig::default()
        }
    }

    #[tokio::test]
    async fn test_concurrent_start_only_one_wins() {
        let server = BrokerServer::new(local_config());

        let (first, second) = tokio::join!(server.start(), server.start());

        let started = [&first, &second].iter().filter(|r| r.is_ok()).count();
        assert_eq!(started, 1);
        assert!(
            [first, second]
                .into_iter()
                .any(|r| matches!(r, Err(Error::AlreadyStarted)))
        );

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_start_after_failed_bind_can_retry() {
        let taken = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let server = BrokerServer::new(BrokerConfig {
            listen_addr: taken.local_addr().unwrap(),
            ..BrokerConfig::default()
        });

        assert!(matches!(server.start().await, Err(Error::Bind { .. })));

        drop(taken);
        assert!(!matches!(server.start().await, Err(Error::AlreadyStarted)));

        server.shutdown().await;
    }

    #[tokio::test]
    async fn test_shutdown_before_start() {
        let server = BrokerServer::new(local_config());

        server.shutdown().await;

        assert!(matches!(server.start().await, Err(Error::AlreadyStarted)));
    }
}
