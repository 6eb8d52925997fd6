//! TCP line transport.
//!
//! Each node listens on one address and dials its two line neighbors:
//!
//! - One **writer task** per neighbor owns the outbound connection. Frames
//!   are queued on an unbounded channel and written in order; the task
//!   reconnects when the connection drops.
//! - An **accept loop** spawns one **reader task** per inbound connection.
//!   Readers decode frames and forward them to the runner as
//!   [`Event::PeerMessageReceived`].
//!
//! Neither kind of task touches node state. Delivery is best effort: a frame
//! that fails to write is dropped, never retried.

use super::codec::{decode_message, encode_message, CodecError};
use super::config::NetworkConfig;
use crate::metrics;
use snapline_core::Event;
use snapline_messages::PeerMessage;
use snapline_types::{Direction, LineTopology, NodeId};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::time::Duration;
use tokio::io::{AsyncBufReadExt, AsyncRead, AsyncReadExt, AsyncWriteExt, BufReader};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc;
use tokio::task::{JoinHandle, JoinSet};
use tracing::{debug, info, trace, warn};

/// Network errors.
#[derive(Debug, thiserror::Error)]
pub enum NetworkError {
    #[error("Failed to bind {addr}: {source}")]
    Bind {
        addr: SocketAddr,
        #[source]
        source: std::io::Error,
    },

    #[error("No address configured for {0} neighbor")]
    MissingNeighborAddress(Direction),

    #[error("No {0} link on this node")]
    NoLink(Direction),

    #[error("Network shutdown")]
    NetworkShutdown,

    #[error("Codec error: {0}")]
    CodecError(#[from] CodecError),
}

/// Outcome of reading one frame.
enum Frame {
    /// A complete line is in the buffer.
    Line,
    /// The line exceeded the limit and was discarded.
    Oversized(usize),
    /// The peer closed the connection.
    Eof,
}

/// Read one newline-terminated frame into `buf`, never buffering more than
/// `max_frame_size + 1` bytes of it.
async fn read_frame<R>(
    reader: &mut BufReader<R>,
    buf: &mut Vec<u8>,
    max_frame_size: usize,
) -> std::io::Result<Frame>
where
    R: AsyncRead + Unpin,
{
    buf.clear();
    let limit = max_frame_size as u64 + 1;
    let read = (&mut *reader).take(limit).read_until(b'\n', buf).await?;
    if read == 0 {
        return Ok(Frame::Eof);
    }
    if buf.last() == Some(&b'\n') {
        buf.pop();
        return Ok(Frame::Line);
    }
    if buf.len() <= max_frame_size {
        // Unterminated tail before EOF.
        return Ok(Frame::Line);
    }

    // Skip the rest of the oversized line.
    let mut skipped = buf.len();
    let mut discard = Vec::new();
    loop {
        discard.clear();
        let n = (&mut *reader)
            .take(limit)
            .read_until(b'\n', &mut discard)
            .await?;
        skipped += n;
        if n == 0 || discard.last() == Some(&b'\n') {
            return Ok(Frame::Oversized(skipped));
        }
    }
}

/// TCP transport between a node and its line neighbors.
pub struct LineAdapter {
    local: NodeId,
    local_addr: SocketAddr,
    links: HashMap<Direction, mpsc::UnboundedSender<Vec<u8>>>,
    tasks: Vec<JoinHandle<()>>,
}

impl LineAdapter {
    /// Bind the listener and start dialing the neighbors `topology` requires.
    ///
    /// Inbound messages are delivered on `event_tx`.
    pub async fn start(
        config: NetworkConfig,
        topology: LineTopology,
        event_tx: mpsc::Sender<Event>,
    ) -> Result<Self, NetworkError> {
        let local = topology.local();

        let mut links = HashMap::new();
        let mut targets = Vec::new();
        for direction in [Direction::Prev, Direction::Next] {
            if !topology.has_link(direction) {
                continue;
            }
            let addr = match direction {
                Direction::Prev => config.prev_addr.clone(),
                Direction::Next => config.next_addr.clone(),
            }
            .ok_or(NetworkError::MissingNeighborAddress(direction))?;
            targets.push((direction, addr));
        }

        let listener = TcpListener::bind(config.listen_addr)
            .await
            .map_err(|source| NetworkError::Bind {
                addr: config.listen_addr,
                source,
            })?;
        let local_addr = listener
            .local_addr()
            .map_err(|source| NetworkError::Bind {
                addr: config.listen_addr,
                source,
            })?;
        info!(node = %local, %local_addr, "Listening for neighbors");

        let mut tasks = Vec::new();
        tasks.push(tokio::spawn(accept_loop(
            listener,
            event_tx,
            config.max_frame_size,
        )));

        for (direction, addr) in targets {
            let (tx, rx) = mpsc::unbounded_channel();
            links.insert(direction, tx);
            tasks.push(tokio::spawn(link_writer(
                direction,
                addr,
                rx,
                config.reconnect_interval,
            )));
        }

        Ok(Self {
            local,
            local_addr,
            links,
            tasks,
        })
    }

    /// Address the listener is bound to.
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    pub fn local_node(&self) -> NodeId {
        self.local
    }

    /// Queue `message` on the link in `direction`.
    pub fn send(&self, direction: Direction, message: &PeerMessage) -> Result<(), NetworkError> {
        let link = self
            .links
            .get(&direction)
            .ok_or(NetworkError::NoLink(direction))?;
        let frame = encode_message(message)?;
        link.send(frame)
            .map_err(|_| NetworkError::NetworkShutdown)?;
        metrics::record_message_sent(message.type_name());
        Ok(())
    }

    /// Stop all network tasks.
    pub fn shutdown(&mut self) {
        self.links.clear();
        for task in self.tasks.drain(..) {
            task.abort();
        }
        debug!(node = %self.local, "Network adapter stopped");
    }
}

impl Drop for LineAdapter {
    fn drop(&mut self) {
        self.shutdown();
    }
}

/// Accept neighbor connections and read each on its own task.
///
/// Readers belong to this task's `JoinSet`, so aborting the accept loop
/// also stops every reader and closes its connection.
async fn accept_loop(listener: TcpListener, event_tx: mpsc::Sender<Event>, max_frame_size: usize) {
    let mut readers = JoinSet::new();
    loop {
        tokio::select! {
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    debug!(%peer, "Accepted neighbor connection");
                    readers.spawn(read_connection(
                        stream,
                        peer,
                        event_tx.clone(),
                        max_frame_size,
                    ));
                }
                Err(e) => {
                    warn!(error = %e, "Accept failed");
                    tokio::time::sleep(Duration::from_millis(100)).await;
                }
            },
            // Reap finished readers.
            Some(_) = readers.join_next() => {}
        }
    }
}

async fn read_connection(
    stream: TcpStream,
    peer: SocketAddr,
    event_tx: mpsc::Sender<Event>,
    max_frame_size: usize,
) {
    let mut reader = BufReader::new(stream);
    let mut buf = Vec::with_capacity(256);

    loop {
        let frame = match read_frame(&mut reader, &mut buf, max_frame_size).await {
            Ok(frame) => frame,
            Err(e) => {
                debug!(%peer, error = %e, "Neighbor connection failed");
                return;
            }
        };

        let result = match frame {
            Frame::Eof => {
                debug!(%peer, "Neighbor closed connection");
                return;
            }
            Frame::Oversized(size) => Err(CodecError::TooLarge {
                size,
                limit: max_frame_size,
            }),
            Frame::Line => decode_message(&buf, max_frame_size),
        };

        match result {
            Ok(message) => {
                trace!(%peer, msg_type = message.type_name(), "Received frame");
                metrics::record_message_received(message.type_name());
                if event_tx
                    .send(Event::PeerMessageReceived { message })
                    .await
                    .is_err()
                {
                    return;
                }
            }
            Err(CodecError::Empty) => {}
            Err(e) => {
                warn!(%peer, error = %e, "Dropping undecodable frame");
                metrics::record_invalid_message();
            }
        }
    }
}

async fn connect(direction: Direction, addr: &str, reconnect_interval: Duration) -> TcpStream {
    loop {
        match TcpStream::connect(addr).await {
            Ok(stream) => {
                if let Err(e) = stream.set_nodelay(true) {
                    debug!(error = %e, "Failed to set TCP_NODELAY");
                }
                info!(%direction, %addr, "Connected to neighbor");
                return stream;
            }
            Err(e) => {
                debug!(%direction, %addr, error = %e, "Neighbor not reachable, retrying");
                tokio::time::sleep(reconnect_interval).await;
            }
        }
    }
}

async fn link_writer(
    direction: Direction,
    addr: String,
    mut rx: mpsc::UnboundedReceiver<Vec<u8>>,
    reconnect_interval: Duration,
) {
    let mut stream: Option<TcpStream> = None;

    while let Some(frame) = rx.recv().await {
        if stream.is_none() {
            stream = Some(connect(direction, &addr, reconnect_interval).await);
        }
        let Some(conn) = stream.as_mut() else {
            continue;
        };

        if let Err(e) = conn.write_all(&frame).await {
            warn!(%direction, %addr, error = %e, "Write failed, dropping frame and reconnecting");
            stream = None;
        }
    }
    debug!(%direction, "Link writer stopped");
}
