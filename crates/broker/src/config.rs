use std::net::{Ipv4Addr, SocketAddr};
use std::time::Duration;

use relay_topics::DEFAULT_QUEUE_CAPACITY;
use relay_wire::DEFAULT_MAX_LINE_LENGTH;

/// Port the broker listens on unless configured otherwise.
pub const DEFAULT_PORT: u16 = 9090;

/// How long a poll waits for a message before answering `NO_MESSAGES`.
pub const DEFAULT_POLL_TIMEOUT: Duration = Duration::from_millis(2000);

/// Configuration for the broker server.
#[derive(Clone, Debug)]
pub struct BrokerConfig {
    /// Address to listen on.
    pub listen_addr: SocketAddr,
    /// Long-poll wait per `POLL` request.
    pub poll_timeout: Duration,
    /// Messages held per topic before publishers wait.
    pub queue_capacity: usize,
    /// Maximum concurrent connections; extra connections are dropped.
    pub max_connections: usize,
    /// Maximum request line length in bytes.
    pub max_line_length: usize,
    /// Maximum operations in flight per connection before reads pause.
    pub max_in_flight: usize,
}

impl Default for BrokerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from((Ipv4Addr::UNSPECIFIED, DEFAULT_PORT)),
            poll_timeout: DEFAULT_POLL_TIMEOUT,
            queue_capacity: DEFAULT_QUEUE_CAPACITY,
            max_connections: 1024,
            max_line_length: DEFAULT_MAX_LINE_LENGTH,
            max_in_flight: 256,
        }
    }
}
