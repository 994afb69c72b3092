//! Connection Handler
//!
//! Each client gets its own handler task that runs in a loop, reading
//! frames and sending replies.
//!
//! ## Connection Lifecycle
//!
//! ```text
//! 1. Client connects (TCP handshake)
//!        │
//!        ▼
//! 2. ConnectionHandler spawned
//!        │
//!        ▼
//! 3. ┌──────────────────────────────┐
//!    │      Main Loop               │
//!    │                              │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Parse buffered frames   │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Execute, send reply     │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │  ┌─────────────────────────┐ │
//!    │  │ Read bytes from socket  │ │
//!    │  └───────────┬─────────────┘ │
//!    │              ▼               │
//!    │         [Loop back]          │
//!    └──────────────────────────────┘
//!        │
//!        ▼
//! 4. EOF / protocol error / I/O error → handler task ends
//! ```
//!
//! ## Buffer Management
//!
//! TCP is a stream, so a read may hold part of a frame or several frames.
//! Bytes accumulate in a `BytesMut` until the parser can take a whole frame
//! off the front. Replies go out in request order, one flush per reply.

use crate::commands::CommandHandler;
use crate::protocol::{Frame, ProtocolError, RespParser, RespValue, MAX_BULK_SIZE};
use bytes::{Buf, BytesMut};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tokio::io::{AsyncRead, AsyncReadExt, AsyncWrite, AsyncWriteExt, BufWriter};
use tracing::{debug, info, trace, warn};

/// Most bytes we will buffer while waiting for one frame to complete.
const MAX_BUFFER_SIZE: usize = MAX_BULK_SIZE + 64 * 1024;

/// Initial buffer capacity
const INITIAL_BUFFER_SIZE: usize = 4096;

/// Statistics for connection handling
#[derive(Debug, Default)]
pub struct ConnectionStats {
    /// Total number of connections accepted
    pub connections_accepted: AtomicU64,
    /// Currently active connections
    pub active_connections: AtomicU64,
    /// Total commands that produced a reply
    pub commands_processed: AtomicU64,
    /// Total frames ignored (unknown command or too few arguments)
    pub commands_ignored: AtomicU64,
    /// Total bytes read
    pub bytes_read: AtomicU64,
    /// Total bytes written
    pub bytes_written: AtomicU64,
}

impl ConnectionStats {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn connection_opened(&self) {
        self.connections_accepted.fetch_add(1, Ordering::Relaxed);
        self.active_connections.fetch_add(1, Ordering::Relaxed);
    }

    pub fn connection_closed(&self) {
        self.active_connections.fetch_sub(1, Ordering::Relaxed);
    }

    pub fn command_processed(&self) {
        self.commands_processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn command_ignored(&self) {
        self.commands_ignored.fetch_add(1, Ordering::Relaxed);
    }

    pub fn bytes_read(&self, count: usize) {
        self.bytes_read.fetch_add(count as u64, Ordering::Relaxed);
    }

    pub fn bytes_written(&self, count: usize) {
        self.bytes_written.fetch_add(count as u64, Ordering::Relaxed);
    }
}

/// Errors that end a connection.
#[derive(Debug, thiserror::Error)]
pub enum ConnectionError {
    /// I/O error (network issue)
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// The request stream could not be decoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    /// A single frame outgrew the read buffer limit
    #[error("buffer size limit exceeded")]
    BufferFull,
}

/// Handles a single client connection.
///
/// Generic over the byte stream so the loop can run on a `TcpStream` or on
/// any other `AsyncRead + AsyncWrite` transport.
pub struct ConnectionHandler<S> {
    stream: BufWriter<S>,

    /// Client's address (for logging)
    addr: SocketAddr,

    buffer: BytesMut,

    command_handler: CommandHandler,

    parser: RespParser,

    /// Buffered bytes at which an unfinished frame is given up on
    max_buffer: usize,

    stats: Arc<ConnectionStats>,
}

impl<S> ConnectionHandler<S>
where
    S: AsyncRead + AsyncWrite + Unpin,
{
    pub fn new(
        stream: S,
        addr: SocketAddr,
        command_handler: CommandHandler,
        stats: Arc<ConnectionStats>,
    ) -> Self {
        stats.connection_opened();

        Self {
            stream: BufWriter::new(stream),
            addr,
            buffer: BytesMut::with_capacity(INITIAL_BUFFER_SIZE),
            command_handler,
            parser: RespParser::new(),
            max_buffer: MAX_BUFFER_SIZE,
            stats,
        }
    }

    #[cfg(test)]
    fn with_buffer_limit(mut self, max_buffer: usize) -> Self {
        self.max_buffer = max_buffer;
        self
    }

    /// Runs the connection until the client disconnects or an error occurs.
    ///
    /// A clean disconnect between frames returns `Ok(())`.
    pub async fn run(mut self) -> Result<(), ConnectionError> {
        info!(client = %self.addr, "Client connected");

        let result = self.main_loop().await;

        match &result {
            Ok(()) => info!(client = %self.addr, "Client disconnected"),
            Err(ConnectionError::Io(io_err))
                if io_err.kind() == std::io::ErrorKind::ConnectionReset =>
            {
                debug!(client = %self.addr, "Connection reset by client")
            }
            Err(e) => warn!(client = %self.addr, error = %e, "Closing connection"),
        }

        self.stats.connection_closed();
        result
    }

    /// The read-execute-respond loop.
    async fn main_loop(&mut self) -> Result<(), ConnectionError> {
        loop {
            while let Some(frame) = self.try_parse_frame()? {
                match self.command_handler.execute(frame) {
                    Some(response) => {
                        self.stats.command_processed();
                        self.send_response(&response).await?;
                    }
                    None => self.stats.command_ignored(),
                }
            }

            if !self.read_more_data().await? {
                return Ok(());
            }
        }
    }

    /// Takes one complete frame off the front of the buffer, if there is one.
    fn try_parse_frame(&mut self) -> Result<Option<Frame>, ConnectionError> {
        if self.buffer.is_empty() {
            return Ok(None);
        }

        match self.parser.parse(&self.buffer)? {
            Some((frame, consumed)) => {
                self.buffer.advance(consumed);
                trace!(
                    client = %self.addr,
                    consumed = consumed,
                    remaining = self.buffer.len(),
                    "Parsed frame"
                );
                Ok(Some(frame))
            }
            None => {
                trace!(
                    client = %self.addr,
                    buffered = self.buffer.len(),
                    "Incomplete frame, need more data"
                );
                Ok(None)
            }
        }
    }

    /// Reads more data from the socket into the buffer.
    ///
    /// Returns `false` on a clean end of stream.
    async fn read_more_data(&mut self) -> Result<bool, ConnectionError> {
        if self.buffer.len() >= self.max_buffer {
            return Err(ConnectionError::BufferFull);
        }

        if self.buffer.capacity() - self.buffer.len() < 1024 {
            self.buffer.reserve(INITIAL_BUFFER_SIZE);
        }

        let n = self.stream.get_mut().read_buf(&mut self.buffer).await?;

        if n == 0 {
            if self.buffer.is_empty() {
                return Ok(false);
            }
            return Err(ProtocolError::UnexpectedEof.into());
        }

        self.stats.bytes_read(n);
        trace!(client = %self.addr, bytes = n, "Read data");

        Ok(true)
    }

    async fn send_response(&mut self, response: &RespValue) -> Result<(), ConnectionError> {
        let bytes = response.serialize();
        self.stream.write_all(&bytes).await?;
        self.stream.flush().await?;
        self.stats.bytes_written(bytes.len());
        trace!(client = %self.addr, bytes = bytes.len(), "Sent response");
        Ok(())
    }
}

/// Runs a `ConnectionHandler` to completion.
///
/// This is the function spawned once per accepted socket. `run` has already
/// logged how the connection ended.
pub async fn handle_connection<S>(
    stream: S,
    addr: SocketAddr,
    command_handler: CommandHandler,
    stats: Arc<ConnectionStats>,
) where
    S: AsyncRead + AsyncWrite + Unpin,
{
    let handler = ConnectionHandler::new(stream, addr, command_handler, stats);
    let _ = handler.run().await;
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::protocol::encode_command;
    use crate::storage::StorageEngine;
    use bytes::Bytes;
    use std::time::Duration;
    use tokio::io::{AsyncReadExt, AsyncWriteExt};
    use tokio::net::{TcpListener, TcpStream};
    use tokio_test::io::Builder;

    fn peer() -> SocketAddr {
        "127.0.0.1:50000".parse().unwrap()
    }

    fn handler_for<S>(stream: S, storage: &Arc<StorageEngine>) -> ConnectionHandler<S>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        ConnectionHandler::new(
            stream,
            peer(),
            CommandHandler::new(Arc::clone(storage)),
            Arc::new(ConnectionStats::new()),
        )
    }

    async fn create_test_server() -> (SocketAddr, Arc<StorageEngine>, Arc<ConnectionStats>) {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        let storage = Arc::new(StorageEngine::new());
        let stats = Arc::new(ConnectionStats::new());

        let storage_clone = Arc::clone(&storage);
        let stats_clone = Arc::clone(&stats);

        tokio::spawn(async move {
            while let Ok((stream, client_addr)) = listener.accept().await {
                let handler = CommandHandler::new(Arc::clone(&storage_clone));
                let stats = Arc::clone(&stats_clone);
                tokio::spawn(handle_connection(stream, client_addr, handler, stats));
            }
        });

        (addr, storage, stats)
    }

    /// Sends one request and reads exactly `expected.len()` reply bytes.
    async fn round_trip(client: &mut TcpStream, request: &[u8], expected: &[u8]) {
        client.write_all(request).await.unwrap();
        let mut buf = vec![0u8; expected.len()];
        tokio::time::timeout(Duration::from_secs(2), client.read_exact(&mut buf))
            .await
            .expect("timed out waiting for reply")
            .unwrap();
        assert_eq!(buf, expected);
    }

    #[tokio::test]
    async fn test_mock_ping_then_clean_eof() {
        let storage = Arc::new(StorageEngine::new());
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .build();

        let result = handler_for(mock, &storage).run().await;
        assert!(result.is_ok());
    }

    #[tokio::test]
    async fn test_mock_frame_split_across_reads() {
        let storage = Arc::new(StorageEngine::new());
        let mock = Builder::new()
            .read(b"*2\r\n$4\r\nEC")
            .read(b"HO\r\n$3\r")
            .read(b"\nhey\r\n")
            .write(b"$3\r\nhey\r\n")
            .build();

        assert!(handler_for(mock, &storage).run().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_pipelined_replies_in_order() {
        let storage = Arc::new(StorageEngine::new());
        let mut request = encode_command(&["SET", "k1", "v1"]);
        request.extend_from_slice(&encode_command(&["GET", "k1"]));
        request.extend_from_slice(&encode_command(&["GET", "missing"]));
        request.extend_from_slice(&encode_command(&["PING"]));

        let mock = Builder::new()
            .read(&request)
            .write(b"+OK\r\n")
            .write(b"$2\r\nv1\r\n")
            .write(b"$-1\r\n")
            .write(b"+PONG\r\n")
            .build();

        assert!(handler_for(mock, &storage).run().await.is_ok());
    }

    #[tokio::test]
    async fn test_mock_unknown_command_gets_no_reply() {
        let storage = Arc::new(StorageEngine::new());
        let mut request = encode_command(&["FLUSHALL"]);
        request.extend_from_slice(&encode_command(&["GET"]));
        request.extend_from_slice(&encode_command(&["PING"]));

        // Only the PING is answered, and the connection stays open for it
        let mock = Builder::new().read(&request).write(b"+PONG\r\n").build();

        let stats = Arc::new(ConnectionStats::new());
        let handler = ConnectionHandler::new(
            mock,
            peer(),
            CommandHandler::new(Arc::clone(&storage)),
            Arc::clone(&stats),
        );
        assert!(handler.run().await.is_ok());
        assert_eq!(stats.commands_ignored.load(Ordering::Relaxed), 2);
        assert_eq!(stats.commands_processed.load(Ordering::Relaxed), 1);
    }

    #[tokio::test]
    async fn test_mock_protocol_error_closes_without_reply() {
        let storage = Arc::new(StorageEngine::new());
        let mock = Builder::new().read(b"GARBAGE\r\n").build();

        let result = handler_for(mock, &storage).run().await;
        assert!(matches!(
            result,
            Err(ConnectionError::Protocol(ProtocolError::UnexpectedPrefix { .. }))
        ));
    }

    #[tokio::test]
    async fn test_mock_length_mismatch_closes_connection() {
        let storage = Arc::new(StorageEngine::new());
        let mock = Builder::new().read(b"*1\r\n$3\r\nPING\r\n").build();

        let result = handler_for(mock, &storage).run().await;
        assert!(matches!(
            result,
            Err(ConnectionError::Protocol(ProtocolError::MissingCrlf))
        ));
    }

    #[tokio::test]
    async fn test_mock_eof_mid_frame() {
        let storage = Arc::new(StorageEngine::new());
        let mock = Builder::new()
            .read(b"*1\r\n$4\r\nPING\r\n")
            .write(b"+PONG\r\n")
            .read(b"*2\r\n$3\r\nGET")
            .build();

        let result = handler_for(mock, &storage).run().await;
        assert!(matches!(
            result,
            Err(ConnectionError::Protocol(ProtocolError::UnexpectedEof))
        ));
    }

    #[tokio::test]
    async fn test_mock_buffer_limit_closes_connection() {
        let storage = Arc::new(StorageEngine::new());
        let mut request = b"*2\r\n$3\r\nSET\r\n$100\r\n".to_vec();
        request.extend_from_slice(&[b'x'; 60]);

        let mock = Builder::new().read(&request).build();

        let result = handler_for(mock, &storage)
            .with_buffer_limit(64)
            .run()
            .await;
        assert!(matches!(result, Err(ConnectionError::BufferFull)));
    }

    #[tokio::test]
    async fn test_mock_frame_within_buffer_limit() {
        let storage = Arc::new(StorageEngine::new());
        let request = encode_command(&["ECHO", "hey"]);

        let mock = Builder::new()
            .read(&request[..10])
            .read(&request[10..])
            .write(b"$3\r\nhey\r\n")
            .build();

        let result = handler_for(mock, &storage)
            .with_buffer_limit(request.len())
            .run()
            .await;
        assert!(result.is_ok());
    }

    #[derive(Clone, Default)]
    struct LogCapture(Arc<std::sync::Mutex<Vec<u8>>>);

    impl std::io::Write for LogCapture {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_connection_error_logged_once() {
        let logs = LogCapture::default();
        let writer = logs.clone();
        let subscriber = tracing_subscriber::fmt()
            .with_max_level(tracing::Level::TRACE)
            .with_ansi(false)
            .with_writer(move || writer.clone())
            .finish();
        let _guard = tracing::subscriber::set_default(subscriber);

        let storage = Arc::new(StorageEngine::new());
        let mock = Builder::new().read(b"GARBAGE\r\n").build();
        handle_connection(
            mock,
            peer(),
            CommandHandler::new(storage),
            Arc::new(ConnectionStats::new()),
        )
        .await;

        let output = String::from_utf8(logs.0.lock().unwrap().clone()).unwrap();
        assert_eq!(output.matches("expected prefix").count(), 1);
    }

    #[tokio::test]
    async fn test_mock_read_error() {
        let storage = Arc::new(StorageEngine::new());
        let mock = Builder::new()
            .read_error(std::io::Error::new(
                std::io::ErrorKind::ConnectionReset,
                "reset",
            ))
            .build();

        let result = handler_for(mock, &storage).run().await;
        assert!(matches!(result, Err(ConnectionError::Io(_))));
    }

    #[tokio::test]
    async fn test_mock_binary_value_round_trip() {
        let storage = Arc::new(StorageEngine::new());
        let value = b"a\r\nb\nc\r\x00d";

        let mut request = encode_command(&[&b"SET"[..], &b"bin"[..], &value[..]]);
        request.extend_from_slice(&encode_command(&["GET", "bin"]));

        let mut expected = format!("${}\r\n", value.len()).into_bytes();
        expected.extend_from_slice(value);
        expected.extend_from_slice(b"\r\n");

        let mock = Builder::new()
            .read(&request)
            .write(b"+OK\r\n")
            .write(&expected)
            .build();

        assert!(handler_for(mock, &storage).run().await.is_ok());
        assert_eq!(
            storage.get(&Bytes::from("bin")),
            Some(Bytes::copy_from_slice(value))
        );
    }

    #[tokio::test]
    async fn test_ping_pong() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        round_trip(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_echo() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        round_trip(
            &mut client,
            b"*2\r\n$4\r\nECHO\r\n$3\r\nhey\r\n",
            b"$3\r\nhey\r\n",
        )
        .await;
    }

    #[tokio::test]
    async fn test_set_get() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        round_trip(
            &mut client,
            b"*3\r\n$3\r\nSET\r\n$3\r\nfoo\r\n$3\r\nbar\r\n",
            b"+OK\r\n",
        )
        .await;
        round_trip(
            &mut client,
            b"*2\r\n$3\r\nGET\r\n$3\r\nfoo\r\n",
            b"$3\r\nbar\r\n",
        )
        .await;
    }

    #[tokio::test]
    async fn test_set_px_then_expire() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        round_trip(
            &mut client,
            &encode_command(&["SET", "temp", "value", "PX", "50"]),
            b"+OK\r\n",
        )
        .await;
        round_trip(
            &mut client,
            &encode_command(&["GET", "temp"]),
            b"$5\r\nvalue\r\n",
        )
        .await;

        tokio::time::sleep(Duration::from_millis(100)).await;

        round_trip(&mut client, &encode_command(&["GET", "temp"]), b"$-1\r\n").await;
    }

    #[tokio::test]
    async fn test_get_unset_key() {
        let (addr, _, _) = create_test_server().await;
        let mut client = TcpStream::connect(addr).await.unwrap();

        round_trip(&mut client, &encode_command(&["GET", "nope"]), b"$-1\r\n").await;
    }

    #[tokio::test]
    async fn test_concurrent_clients_different_keys() {
        let (addr, storage, _) = create_test_server().await;

        let clients: Vec<_> = (0..2)
            .map(move |i| {
                tokio::spawn(async move {
                    let mut client = TcpStream::connect(addr).await.unwrap();
                    let key = format!("client-{}", i);
                    let value = format!("value-{}", i);

                    for _ in 0..50 {
                        round_trip(
                            &mut client,
                            &encode_command(&["SET", key.as_str(), value.as_str()]),
                            b"+OK\r\n",
                        )
                        .await;
                    }

                    let expected = format!("${}\r\n{}\r\n", value.len(), value);
                    round_trip(
                        &mut client,
                        &encode_command(&["GET", key.as_str()]),
                        expected.as_bytes(),
                    )
                    .await;
                })
            })
            .collect();

        for client in clients {
            client.await.unwrap();
        }

        assert_eq!(
            storage.get(&Bytes::from("client-0")),
            Some(Bytes::from("value-0"))
        );
        assert_eq!(
            storage.get(&Bytes::from("client-1")),
            Some(Bytes::from("value-1"))
        );
    }

    #[tokio::test]
    async fn test_protocol_error_does_not_affect_other_clients() {
        let (addr, _, _) = create_test_server().await;

        let mut good = TcpStream::connect(addr).await.unwrap();
        let mut bad = TcpStream::connect(addr).await.unwrap();

        bad.write_all(b"*x\r\n").await.unwrap();
        let mut buf = [0u8; 16];
        let n = tokio::time::timeout(Duration::from_secs(2), bad.read(&mut buf))
            .await
            .expect("server should close the connection")
            .unwrap_or(0);
        assert_eq!(n, 0);

        round_trip(&mut good, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;
    }

    #[tokio::test]
    async fn test_connection_stats() {
        let (addr, _, stats) = create_test_server().await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);

        let mut client = TcpStream::connect(addr).await.unwrap();
        round_trip(&mut client, b"*1\r\n$4\r\nPING\r\n", b"+PONG\r\n").await;

        assert_eq!(stats.connections_accepted.load(Ordering::Relaxed), 1);
        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 1);
        assert!(stats.commands_processed.load(Ordering::Relaxed) >= 1);
        assert!(stats.bytes_read.load(Ordering::Relaxed) > 0);
        assert!(stats.bytes_written.load(Ordering::Relaxed) > 0);

        drop(client);

        tokio::time::sleep(Duration::from_millis(50)).await;

        assert_eq!(stats.active_connections.load(Ordering::Relaxed), 0);
    }
}
