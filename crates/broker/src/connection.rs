//! Per-connection request loop.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use futures::{SinkExt, StreamExt};
use relay_topics::{PollOutcome, TopicRegistry};
use relay_wire::{Intent, Message, Response, ServerCodec};
use tokio::net::TcpStream;
use tokio::net::tcp::OwnedWriteHalf;
use tokio::sync::{Semaphore, mpsc};
use tokio_util::codec::{FramedRead, FramedWrite};
use tokio_util::sync::CancellationToken;
use tokio_util::task::TaskTracker;
use tokio::time::sleep;
use tracing::{Instrument, debug, info, instrument, warn};
use uuid::Uuid;

use crate::config::BrokerConfig;
use crate::context::BrokerContext;
use crate::error::Result;

/// How long a response write may stall once shutdown has begun before the
/// remaining responses are abandoned.
const SHUTDOWN_WRITE_GRACE: Duration = Duration::from_secs(1);

/// Owns one client connection from accept until close.
///
/// Reading never waits on a pending operation. Publishes go through a
/// per-connection lane so they reach their topics in the order they were
/// read; each poll runs as its own task. Every task spawned here is tracked
/// and drained before the connection is released. Any wait the reader makes
/// also watches for shutdown, so a peer that stops reading cannot hold the
/// broker open.
pub(crate) struct ConnectionHandler {
    id: Uuid,
    peer: SocketAddr,
    context: BrokerContext,
    config: BrokerConfig,
    shutdown_token: CancellationToken,
}

impl ConnectionHandler {
    pub(crate) fn new(
        peer: SocketAddr,
        context: BrokerContext,
        config: BrokerConfig,
        shutdown_token: CancellationToken,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            peer,
            context,
            config,
            shutdown_token,
        }
    }

    #[instrument(skip_all, fields(client = %self.id, peer = %self.peer))]
    pub(crate) async fn run(self, stream: TcpStream) -> Result<()> {
        let _client = self.context.register_client(self.id, self.peer);
        info!("client connected");

        if let Err(e) = stream.set_nodelay(true) {
            debug!("failed to set TCP_NODELAY: {}", e);
        }

        let (read_half, write_half) = stream.into_split();
        let mut requests = FramedRead::new(
            read_half,
            ServerCodec::with_max_line_length(self.config.max_line_length),
        );

        let in_flight = self.config.max_in_flight.max(1);
        let tasks = TaskTracker::new();

        let (response_tx, response_rx) = mpsc::channel::<Response>(in_flight);
        tasks.spawn(
            write_responses(
                FramedWrite::new(write_half, ServerCodec::new()),
                response_rx,
                self.shutdown_token.clone(),
            )
            .in_current_span(),
        );

        let (publish_tx, publish_rx) = mpsc::channel::<Message>(in_flight);
        tasks.spawn(
            publish_lane(
                self.context.registry().clone(),
                publish_rx,
                self.shutdown_token.clone(),
            )
            .in_current_span(),
        );

        let poll_permits = Arc::new(Semaphore::new(in_flight));

        let result = loop {
            let next = tokio::select! {
                () = self.shutdown_token.cancelled() => {
                    debug!("shutdown requested, no longer reading");
                    break Ok(());
                }
                next = requests.next() => next,
            };

            let message = match next {
                Some(Ok(Ok(message))) => message,
                Some(Ok(Err(parse_error))) => {
                    warn!("rejected request: {}", parse_error);
                    if !send_or_shutdown(&response_tx, parse_error.into(), &self.shutdown_token).await {
                        break Ok(());
                    }
                    continue;
                }
                Some(Err(e)) => break Err(e.into()),
                None => {
                    debug!("connection closed by client");
                    break Ok(());
                }
            };

            match message.intent() {
                Intent::Write => {
                    if !send_or_shutdown(&publish_tx, message, &self.shutdown_token).await {
                        break Ok(());
                    }
                }
                Intent::Poll => {
                    let permit = tokio::select! {
                        () = self.shutdown_token.cancelled() => break Ok(()),
                        permit = Arc::clone(&poll_permits).acquire_owned() => permit,
                    };
                    let Ok(permit) = permit else {
                        break Ok(());
                    };

                    let registry = self.context.registry().clone();
                    let response_tx = response_tx.clone();
                    let wait = self.config.poll_timeout;

                    tasks.spawn(
                        async move {
                            let response = poll(&registry, message.topic(), wait).await;
                            if response_tx.send(response).await.is_err() {
                                warn!(topic = message.topic(), "connection gone, poll response dropped");
                            }
                            drop(permit);
                        }
                        .in_current_span(),
                    );
                }
            }
        };

        // Closing the senders lets the lane and writer finish once the
        // remaining publishes and polls are done.
        drop(publish_tx);
        drop(response_tx);
        tasks.close();
        tasks.wait().await;

        info!("client disconnected");

        result
    }
}

/// Hands `value` to a connection task. Returns `false` if the task is gone
/// or shutdown began first.
async fn send_or_shutdown<T>(
    tx: &mpsc::Sender<T>,
    value: T,
    shutdown_token: &CancellationToken,
) -> bool {
    tokio::select! {
        () = shutdown_token.cancelled() => false,
        result = tx.send(value) => result.is_ok(),
    }
}

async fn poll(registry: &TopicRegistry, topic: &str, wait: Duration) -> Response {
    match registry.poll(topic, wait).await {
        PollOutcome::Delivered(message) => {
            debug!(topic, "delivered message");
            Response::Delivered(message.into_payload())
        }
        PollOutcome::TimedOut => Response::NoMessages,
        PollOutcome::TopicDoesNotExist => Response::TopicDoesNotExist,
    }
}

/// Enqueues publishes one at a time, preserving the order they were read.
async fn publish_lane(
    registry: TopicRegistry,
    mut messages: mpsc::Receiver<Message>,
    shutdown_token: CancellationToken,
) {
    while let Some(message) = messages.recv().await {
        let topic = message.topic().to_string();

        tokio::select! {
            biased;
            result = registry.publish(message) => {
                if let Err(e) = result {
                    warn!(%topic, "publish failed: {}", e);
                }
            }
            () = shutdown_token.cancelled() => {
                warn!(%topic, pending = messages.len() + 1, "shutdown while topic full, dropping publishes");
                break;
            }
        }
    }
}

/// Writes responses in order. After shutdown each write gets
/// [`SHUTDOWN_WRITE_GRACE`]; a peer that does not drain its socket in that
/// time loses the rest.
async fn write_responses(
    mut sink: FramedWrite<OwnedWriteHalf, ServerCodec>,
    mut responses: mpsc::Receiver<Response>,
    shutdown_token: CancellationToken,
) {
    while let Some(response) = responses.recv().await {
        tokio::select! {
            result = sink.send(response) => {
                if let Err(e) = result {
                    warn!("failed to write response: {}", e);
                    break;
                }
            }
            () = async {
                shutdown_token.cancelled().await;
                sleep(SHUTDOWN_WRITE_GRACE).await;
            } => {
                warn!(pending = responses.len(), "peer not reading during shutdown, dropping responses");
                break;
            }
        }
    }
}
