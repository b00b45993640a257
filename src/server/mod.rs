use std::collections::HashMap;
use std::fmt;
use std::io::{self, Read, Write};
use std::net::{Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};

use serde_json::json;

use crate::config;
use crate::gateway::{Gateway, GatewayError, SessionId};
use crate::lh::LibraryHandler;
use crate::logging::{LogLevel, Logger};
use crate::wire::codec::{self, CodecError, FRAME_HEADER_SIZE_BYTES};

pub const DEFAULT_HOST: &str = "0.0.0.0";
pub const DEFAULT_PORT: u16 = 50004;
pub const DEFAULT_MAX_FRAME_BYTES: usize = 65_536;

const READ_CHUNK_BYTES: usize = 4_096;

#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ServerConfig {
    pub host: String,
    pub port: u16,
    pub max_frame_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: DEFAULT_HOST.to_owned(),
            port: DEFAULT_PORT,
            max_frame_bytes: DEFAULT_MAX_FRAME_BYTES,
        }
    }
}

impl From<config::ServerConfig> for ServerConfig {
    fn from(value: config::ServerConfig) -> Self {
        Self {
            host: value.host,
            port: value.port,
            max_frame_bytes: value.max_frame_bytes,
        }
    }
}

#[derive(Debug)]
pub enum ServerError {
    Bind {
        address: String,
        source: io::Error,
    },
    SetNonBlocking {
        source: io::Error,
    },
    ConfigureAcceptedStream {
        source: io::Error,
    },
    StreamClone {
        source: io::Error,
    },
    Io {
        source: io::Error,
    },
    Frame(CodecError),
}

impl fmt::Display for ServerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bind { address, source } => {
                write!(f, "failed to bind TCP server on {address}: {source}")
            }
            Self::SetNonBlocking { source } => {
                write!(f, "failed to set TCP server to non-blocking mode: {source}")
            }
            Self::ConfigureAcceptedStream { source } => {
                write!(f, "failed to configure accepted TCP stream: {source}")
            }
            Self::StreamClone { source } => {
                write!(f, "failed to clone accepted TCP stream for full duplex IO: {source}")
            }
            Self::Io { source } => write!(f, "connection IO failed: {source}"),
            Self::Frame(source) => write!(f, "bad frame: {source}"),
        }
    }
}

impl std::error::Error for ServerError {}

impl From<CodecError> for ServerError {
    fn from(value: CodecError) -> Self {
        Self::Frame(value)
    }
}

/// Frames read from a connection in one pass.
#[derive(Debug, Default, PartialEq, Eq)]
pub struct Inbound {
    pub frames: Vec<Vec<u8>>,
    pub closed: bool,
}

/// One client connection bound to one gateway session.
pub struct PersistentConnection {
    id: u64,
    peer_addr: SocketAddr,
    session: SessionId,
    reader: Mutex<TcpStream>,
    writer: Mutex<TcpStream>,
    inbound: Mutex<Vec<u8>>,
    outbound: Mutex<Vec<u8>>,
}

impl PersistentConnection {
    fn new(
        id: u64,
        stream: TcpStream,
        peer_addr: SocketAddr,
        session: SessionId,
    ) -> Result<Self, ServerError> {
        stream
            .set_nodelay(true)
            .map_err(|source| ServerError::ConfigureAcceptedStream { source })?;
        stream
            .set_nonblocking(true)
            .map_err(|source| ServerError::ConfigureAcceptedStream { source })?;

        let writer = stream
            .try_clone()
            .map_err(|source| ServerError::StreamClone { source })?;

        Ok(Self {
            id,
            peer_addr,
            session,
            reader: Mutex::new(stream),
            writer: Mutex::new(writer),
            inbound: Mutex::new(Vec::new()),
            outbound: Mutex::new(Vec::new()),
        })
    }

    pub fn id(&self) -> u64 {
        self.id
    }

    pub fn peer_addr(&self) -> SocketAddr {
        self.peer_addr
    }

    pub fn session(&self) -> SessionId {
        self.session
    }

    /// Reads whatever the socket has and splits off complete frames.
    pub fn read_frames(&self, max_frame_bytes: usize) -> Result<Inbound, ServerError> {
        let mut result = Inbound::default();
        let mut inbound = self.inbound.lock().expect("connection inbound lock poisoned");
        {
            let mut reader = self.reader.lock().expect("connection reader lock poisoned");
            let mut chunk = [0_u8; READ_CHUNK_BYTES];
            loop {
                match reader.read(&mut chunk) {
                    Ok(0) => {
                        result.closed = true;
                        break;
                    }
                    Ok(count) => inbound.extend_from_slice(&chunk[..count]),
                    Err(source) if source.kind() == io::ErrorKind::WouldBlock => break,
                    Err(source) if source.kind() == io::ErrorKind::Interrupted => continue,
                    Err(source) => return Err(ServerError::Io { source }),
                }
            }
        }

        while inbound.len() >= FRAME_HEADER_SIZE_BYTES {
            let prefix = [inbound[0], inbound[1], inbound[2], inbound[3]];
            let payload_len = codec::frame_payload_len(prefix, max_frame_bytes)?;
            let frame_len = FRAME_HEADER_SIZE_BYTES + payload_len;
            if inbound.len() < frame_len {
                break;
            }
            let frame = inbound.drain(..frame_len).collect::<Vec<_>>();
            result
                .frames
                .push(codec::decode_frame(&frame, max_frame_bytes)?.to_vec());
        }
        Ok(result)
    }

    pub fn queue_frame(&self, payload: &[u8], max_frame_bytes: usize) -> Result<(), ServerError> {
        let frame = codec::encode_frame(payload, max_frame_bytes)?;
        self.outbound
            .lock()
            .expect("connection outbound lock poisoned")
            .extend_from_slice(&frame);
        Ok(())
    }

    /// Writes as much queued output as the socket takes. Returns the bytes
    /// still waiting.
    pub fn flush(&self) -> Result<usize, ServerError> {
        let mut outbound = self
            .outbound
            .lock()
            .expect("connection outbound lock poisoned");
        let mut writer = self.writer.lock().expect("connection writer lock poisoned");
        while !outbound.is_empty() {
            match writer.write(&outbound) {
                Ok(0) => break,
                Ok(count) => {
                    outbound.drain(..count);
                }
                Err(source) if source.kind() == io::ErrorKind::WouldBlock => break,
                Err(source) if source.kind() == io::ErrorKind::Interrupted => continue,
                Err(source) => return Err(ServerError::Io { source }),
            }
        }
        Ok(outbound.len())
    }

    pub fn shutdown(&self) -> io::Result<()> {
        let _ = self
            .reader
            .lock()
            .expect("connection reader lock poisoned")
            .shutdown(Shutdown::Both);
        self.writer
            .lock()
            .expect("connection writer lock poisoned")
            .shutdown(Shutdown::Both)
    }
}

/// Work done by one `poll` pass.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct PollStats {
    pub accepted: usize,
    pub frames_in: usize,
    pub frames_out: usize,
    pub closed: usize,
}

impl PollStats {
    pub fn is_idle(&self) -> bool {
        *self == Self::default()
    }
}

pub struct TcpServer {
    listener: TcpListener,
    max_frame_bytes: usize,
    logger: Arc<Logger>,
    next_connection_id: AtomicU64,
    active_connections: Mutex<HashMap<u64, Arc<PersistentConnection>>>,
}

impl TcpServer {
    pub fn bind(config: &ServerConfig, logger: Arc<Logger>) -> Result<Self, ServerError> {
        let address = format!("{}:{}", config.host, config.port);
        let listener = TcpListener::bind(&address).map_err(|source| ServerError::Bind {
            address,
            source,
        })?;
        listener
            .set_nonblocking(true)
            .map_err(|source| ServerError::SetNonBlocking { source })?;

        Ok(Self {
            listener,
            max_frame_bytes: config.max_frame_bytes,
            logger,
            next_connection_id: AtomicU64::new(1),
            active_connections: Mutex::new(HashMap::new()),
        })
    }

    pub fn from_app_config(
        app_config: &config::AppConfig,
        logger: Arc<Logger>,
    ) -> Result<Self, ServerError> {
        let cfg = ServerConfig::from(app_config.server.clone());
        Self::bind(&cfg, logger)
    }

    pub fn local_addr(&self) -> io::Result<SocketAddr> {
        self.listener.local_addr()
    }

    fn try_accept_persistent<L: LibraryHandler>(
        &self,
        gateway: &mut Gateway<L>,
    ) -> Result<Option<Arc<PersistentConnection>>, ServerError> {
        match self.listener.accept() {
            Ok((stream, peer_addr)) => {
                let id = self.next_connection_id.fetch_add(1, Ordering::Relaxed);
                let session = gateway.open_session(peer_addr.to_string());
                let connection = match PersistentConnection::new(id, stream, peer_addr, session) {
                    Ok(connection) => Arc::new(connection),
                    Err(err) => {
                        gateway.close_session(session);
                        return Err(err);
                    }
                };
                self.active_connections
                    .lock()
                    .expect("active connections lock poisoned")
                    .insert(id, Arc::clone(&connection));
                Ok(Some(connection))
            }
            Err(source) if source.kind() == io::ErrorKind::WouldBlock => Ok(None),
            Err(source) => Err(ServerError::ConfigureAcceptedStream { source }),
        }
    }

    pub fn connection_count(&self) -> usize {
        self.active_connections
            .lock()
            .expect("active connections lock poisoned")
            .len()
    }

    fn connections(&self) -> Vec<Arc<PersistentConnection>> {
        self.active_connections
            .lock()
            .expect("active connections lock poisoned")
            .values()
            .cloned()
            .collect()
    }

    fn drop_connection<L: LibraryHandler>(
        &self,
        connection: &PersistentConnection,
        gateway: &mut Gateway<L>,
    ) {
        let _ = connection.shutdown();
        self.active_connections
            .lock()
            .expect("active connections lock poisoned")
            .remove(&connection.id());
        gateway.close_session(connection.session());
    }

    /// One non-blocking pass: accept, read frames into the gateway, move
    /// gateway output onto the sockets.
    pub fn poll<L: LibraryHandler>(&self, gateway: &mut Gateway<L>) -> PollStats {
        let mut stats = PollStats::default();

        loop {
            match self.try_accept_persistent(gateway) {
                Ok(Some(connection)) => {
                    stats.accepted += 1;
                    self.logger.log(
                        LogLevel::Info,
                        Some("server::accept"),
                        "client connected",
                        Some(json!({
                            "connection_id": connection.id(),
                            "peer": connection.peer_addr().to_string(),
                            "session": connection.session().to_string(),
                        })),
                    );
                }
                Ok(None) => break,
                Err(err) => {
                    self.logger
                        .warn(Some("server::accept"), &format!("accept failed: {err}"));
                    break;
                }
            }
        }

        for connection in self.connections() {
            let mut close = false;
            match connection.read_frames(self.max_frame_bytes) {
                Ok(inbound) => {
                    for frame in &inbound.frames {
                        stats.frames_in += 1;
                        match gateway.handle_packet(connection.session(), frame) {
                            Ok(()) => {}
                            Err(GatewayError::Decode(err)) => {
                                self.logger.warn(
                                    Some("server::read"),
                                    &format!(
                                        "closing connection {}: {err}",
                                        connection.id()
                                    ),
                                );
                                close = true;
                                break;
                            }
                            Err(err) => {
                                self.logger.error(Some("server::read"), &err.to_string());
                                close = true;
                                break;
                            }
                        }
                    }
                    close |= inbound.closed;
                }
                Err(err) => {
                    self.logger.warn(
                        Some("server::read"),
                        &format!("closing connection {}: {err}", connection.id()),
                    );
                    close = true;
                }
            }

            for payload in gateway.take_outbound(connection.session()) {
                match connection.queue_frame(&payload, self.max_frame_bytes) {
                    Ok(()) => stats.frames_out += 1,
                    Err(err) => self.logger.error(
                        Some("server::write"),
                        &format!("response dropped on connection {}: {err}", connection.id()),
                    ),
                }
            }
            if let Err(err) = connection.flush() {
                self.logger.warn(
                    Some("server::write"),
                    &format!("closing connection {}: {err}", connection.id()),
                );
                close = true;
            }

            if close {
                stats.closed += 1;
                self.drop_connection(&connection, gateway);
            }
        }

        // Replies raised by the ticker between passes.
        if gateway.pump() > 0 {
            for connection in self.connections() {
                for payload in gateway.take_outbound(connection.session()) {
                    if connection.queue_frame(&payload, self.max_frame_bytes).is_ok() {
                        stats.frames_out += 1;
                    }
                }
                let _ = connection.flush();
            }
        }

        stats
    }

    pub fn shutdown_all_connections<L: LibraryHandler>(&self, gateway: &mut Gateway<L>) {
        for connection in self.connections() {
            let _ = connection.flush();
            self.drop_connection(&connection, gateway);
        }
    }
}

#[cfg(test)]
mod tests {
    use std::io::{ErrorKind, Read, Write};
    use std::net::TcpStream;
    use std::sync::{Arc, Mutex};
    use std::thread;
    use std::time::Duration;

    use chrono::Utc;

    use super::{ServerConfig, TcpServer, DEFAULT_HOST, DEFAULT_MAX_FRAME_BYTES, DEFAULT_PORT};
    use crate::config::AppConfig;
    use crate::gateway::Gateway;
    use crate::lh::OfflineLibraryHandler;
    use crate::logging::{LogLevel, Logger};
    use crate::task::tables::install;
    use crate::task::{ManualClock, Scheduler, TaskConfig};
    use crate::wire::codec::{decode_response, encode_frame, encode_request};
    use crate::wire::header::MessageHeader;
    use crate::wire::packet::Request;
    use crate::wire::request::RequestBody;
    use crate::wire::status::Status;
    use crate::wire::types::{Command, Version};

    fn logger() -> Arc<Logger> {
        Arc::new(Logger::in_memory(LogLevel::Error).0)
    }

    fn local() -> ServerConfig {
        ServerConfig {
            host: "127.0.0.1".to_owned(),
            port: 0,
            max_frame_bytes: 1_024,
        }
    }

    fn offline_gateway() -> Gateway<OfflineLibraryHandler> {
        let scheduler = Scheduler::isolated(
            TaskConfig::default(),
            install().expect("tables"),
            Box::new(ManualClock::new(Utc::now())),
            logger(),
        )
        .expect("scheduler");
        Gateway::new(
            Arc::new(Mutex::new(scheduler)),
            OfflineLibraryHandler::default(),
            logger(),
            Version::V0,
        )
    }

    fn read_frame(client: &mut TcpStream) -> Vec<u8> {
        let mut prefix = [0_u8; 4];
        client.read_exact(&mut prefix).expect("frame prefix");
        let mut payload = vec![0_u8; u32::from_be_bytes(prefix) as usize];
        client.read_exact(&mut payload).expect("frame payload");
        payload
    }

    fn poll_until(
        server: &TcpServer,
        gateway: &mut Gateway<OfflineLibraryHandler>,
        done: impl Fn(&TcpServer) -> bool,
    ) {
        for _ in 0..100 {
            server.poll(gateway);
            if done(server) {
                return;
            }
            thread::sleep(Duration::from_millis(10));
        }
    }

    #[test]
    fn default_config_matches_expected_host_and_port() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.host, DEFAULT_HOST);
        assert_eq!(cfg.port, DEFAULT_PORT);
        assert_eq!(cfg.max_frame_bytes, DEFAULT_MAX_FRAME_BYTES);
    }

    #[test]
    fn idle_poll_does_nothing() {
        let server = TcpServer::bind(&local(), logger()).expect("server should bind");
        let mut gateway = offline_gateway();
        assert!(server.poll(&mut gateway).is_idle());
    }

    #[test]
    fn answers_a_framed_request_with_ack_and_final() {
        let server = TcpServer::bind(&local(), logger()).expect("server should bind");
        let addr = server.local_addr().expect("local addr should exist");
        let mut gateway = offline_gateway();

        let mut client = TcpStream::connect(addr).expect("client should connect");
        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        poll_until(&server, &mut gateway, |server| server.connection_count() == 1);
        assert_eq!(gateway.session_count(), 1);

        let request = Request::new(MessageHeader::new(Command::Idle, Version::V1), RequestBody::Idle);
        let payload = encode_request(&request).expect("encode");
        client
            .write_all(&encode_frame(&payload, 1_024).expect("frame"))
            .expect("send");

        for _ in 0..50 {
            let stats = server.poll(&mut gateway);
            if stats.frames_out >= 2 {
                break;
            }
            thread::sleep(Duration::from_millis(10));
        }

        let ack = decode_response(&read_frame(&mut client)).expect("ack decodes");
        assert!(ack.header.is_acknowledge());
        assert_eq!(ack.header.version, Version::V1);
        let last = decode_response(&read_frame(&mut client)).expect("final decodes");
        assert!(last.header.is_final());
        assert_eq!(last.message_status.status, Status::LIBRARY_NOT_AVAILABLE);
    }

    #[test]
    fn oversized_frame_closes_the_connection() {
        let server = TcpServer::bind(&local(), logger()).expect("server should bind");
        let addr = server.local_addr().expect("local addr should exist");
        let mut gateway = offline_gateway();

        let mut client = TcpStream::connect(addr).expect("client should connect");
        poll_until(&server, &mut gateway, |server| server.connection_count() == 1);

        client
            .write_all(&(1_025_u32).to_be_bytes())
            .expect("send prefix");
        poll_until(&server, &mut gateway, |server| server.connection_count() == 0);
        assert_eq!(server.connection_count(), 0);
        assert_eq!(gateway.session_count(), 0);

        client
            .set_read_timeout(Some(Duration::from_secs(2)))
            .expect("read timeout");
        let mut buf = [0_u8; 8];
        match client.read(&mut buf) {
            Ok(count) => assert_eq!(count, 0),
            Err(err) => assert_ne!(err.kind(), ErrorKind::WouldBlock),
        }
    }

    #[test]
    fn builds_server_from_app_config() {
        let app_config = AppConfig::from_toml_str_with_args(
            "[server]\nhost = \"127.0.0.1\"\nport = 0\n",
            Vec::<String>::new(),
        )
        .expect("config parses");

        let server = TcpServer::from_app_config(&app_config, logger())
            .expect("server should build from app config");
        let bound = server.local_addr().expect("bound address should be present");
        assert_eq!(bound.ip().to_string(), "127.0.0.1");
    }
}
