//! Blocking WebSocket transport built on `tungstenite`.
//!
//! The TCP connect and opening handshake run on a short-lived thread per
//! attempt, so a slow or unresponsive endpoint never stalls the worker. The
//! finished socket is handed back through a shared slot before `on_open`
//! fires.

use std::{
    io,
    net::{SocketAddr, TcpStream, ToSocketAddrs},
    sync::Arc,
    thread,
    time::Duration,
};

use native_tls::TlsConnector;
use parking_lot::Mutex;
use tungstenite::{
    Connector, Message, WebSocket,
    client::IntoClientRequest,
    handshake::client::Request,
    http::{HeaderName, HeaderValue, header::SEC_WEBSOCKET_PROTOCOL},
    stream::MaybeTlsStream,
};

use super::{
    adapter::{ConnectError, SocketConnection, SocketConnector, SocketEvents},
    config::TransportConfig,
};

/// Read timeout used while polling an open socket for inbound frames.
const POLL_READ_TIMEOUT: Duration = Duration::from_millis(1);

/// TLS connection options for `wss://` endpoints.
#[derive(Clone, Debug, Default)]
pub struct TlsOptions {
    /// Skip certificate validation when true (intended for tests).
    pub insecure_skip_verify: bool,
}

impl TlsOptions {
    fn connector(&self) -> Result<TlsConnector, ConnectError> {
        let mut builder = TlsConnector::builder();
        if self.insecure_skip_verify {
            builder.danger_accept_invalid_certs(true);
            builder.danger_accept_invalid_hostnames(true);
        }
        builder
            .build()
            .map_err(|err| ConnectError::Unavailable(format!("tls provider: {err}")))
    }
}

/// Connector opening real WebSocket connections.
#[derive(Clone, Debug, Default)]
pub struct TungsteniteConnector {
    tls: TlsOptions,
}

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_tls(mut self, tls: TlsOptions) -> Self {
        self.tls = tls;
        self
    }
}

/// Target derived from the configuration before any network I/O.
struct Endpoint {
    request: Request,
    host: String,
    port: u16,
    secure: bool,
}

fn invalid_url(url: &str, reason: impl ToString) -> ConnectError {
    ConnectError::InvalidUrl {
        url: url.to_owned(),
        reason: reason.to_string(),
    }
}

fn resolve_endpoint(config: &TransportConfig) -> Result<Endpoint, ConnectError> {
    let mut request = config
        .url
        .as_str()
        .into_client_request()
        .map_err(|err| invalid_url(&config.url, err))?;
    let uri = request.uri();
    let secure = match uri.scheme_str() {
        Some("ws") => false,
        Some("wss") => true,
        Some(other) => return Err(ConnectError::UnsupportedScheme(other.to_owned())),
        None => return Err(invalid_url(&config.url, "missing scheme")),
    };
    let host = uri
        .host()
        .ok_or_else(|| invalid_url(&config.url, "missing host"))?
        .trim_start_matches('[')
        .trim_end_matches(']')
        .to_owned();
    let port = uri.port_u16().unwrap_or(if secure { 443 } else { 80 });

    let headers = request.headers_mut();
    for (name, value) in &config.headers {
        let header_name =
            HeaderName::from_bytes(name.as_bytes()).map_err(|err| ConnectError::InvalidHeader {
                name: name.clone(),
                reason: err.to_string(),
            })?;
        let header_value = HeaderValue::from_str(value).map_err(|err| ConnectError::InvalidHeader {
            name: name.clone(),
            reason: err.to_string(),
        })?;
        headers.insert(header_name, header_value);
    }
    if !config.protocols.is_empty() {
        let joined = config.protocols.join(", ");
        let value = HeaderValue::from_str(&joined).map_err(|err| ConnectError::InvalidHeader {
            name: "Sec-WebSocket-Protocol".into(),
            reason: err.to_string(),
        })?;
        headers.insert(SEC_WEBSOCKET_PROTOCOL, value);
    }

    Ok(Endpoint {
        request,
        host,
        port,
        secure,
    })
}

fn socket_addrs(host: &str, port: u16) -> io::Result<Vec<SocketAddr>> {
    (host, port).to_socket_addrs().map(|iter| iter.collect())
}

fn connect_tcp(host: &str, port: u16, timeout: Duration) -> io::Result<TcpStream> {
    let mut last_err = None;
    for addr in socket_addrs(host, port)? {
        match TcpStream::connect_timeout(&addr, timeout) {
            Ok(stream) => {
                stream.set_nodelay(true)?;
                return Ok(stream);
            }
            Err(err) => last_err = Some(err),
        }
    }
    Err(last_err.unwrap_or_else(|| {
        io::Error::new(
            io::ErrorKind::NotFound,
            format!("no addresses resolved for {host}:{port}"),
        )
    }))
}

fn tcp_ref(stream: &MaybeTlsStream<TcpStream>) -> Option<&TcpStream> {
    match stream {
        MaybeTlsStream::Plain(tcp) => Some(tcp),
        MaybeTlsStream::NativeTls(tls) => Some(tls.get_ref()),
        _ => None,
    }
}

type Socket = WebSocket<MaybeTlsStream<TcpStream>>;

/// Socket handed from the handshake thread to its connection.
#[derive(Default)]
struct Slot {
    socket: Option<Socket>,
    abandoned: bool,
}

type SharedSlot = Arc<Mutex<Slot>>;

/// Network half of a connection attempt, run off the worker thread.
struct Handshake {
    endpoint: Endpoint,
    connector: Connector,
    connect_timeout: Duration,
    write_timeout: Duration,
    slot: SharedSlot,
    events: SocketEvents,
}

impl Handshake {
    fn establish(
        endpoint: Endpoint,
        connector: Connector,
        connect_timeout: Duration,
    ) -> Result<Socket, (String, &'static str)> {
        let Endpoint {
            request,
            host,
            port,
            ..
        } = endpoint;
        let stream = connect_tcp(&host, port, connect_timeout)
            .and_then(|stream| {
                stream.set_read_timeout(Some(connect_timeout))?;
                stream.set_write_timeout(Some(connect_timeout))?;
                Ok(stream)
            })
            .map_err(|err| {
                (
                    format!("unable to connect to {host}:{port}: {err}"),
                    "connect failed",
                )
            })?;
        tungstenite::client_tls_with_config(request, stream, None, Some(connector))
            .map(|(socket, _response)| socket)
            .map_err(|err| (format!("websocket handshake failed: {err}"), "handshake failed"))
    }

    fn run(self) {
        let Self {
            endpoint,
            connector,
            connect_timeout,
            write_timeout,
            slot,
            events,
        } = self;
        let outcome = Self::establish(endpoint, connector, connect_timeout);
        let mut guard = slot.lock();
        if guard.abandoned {
            if let Ok(mut socket) = outcome {
                let _ = socket.close(None);
                let _ = socket.flush();
            }
            return;
        }
        match outcome {
            Ok(socket) => {
                if let Some(tcp) = tcp_ref(socket.get_ref()) {
                    let _ = tcp.set_read_timeout(Some(POLL_READ_TIMEOUT));
                    let _ = tcp.set_write_timeout(Some(write_timeout));
                }
                guard.socket = Some(socket);
                drop(guard);
                events.on_open();
            }
            Err((err, reason)) => {
                drop(guard);
                events.on_error(err);
                events.on_close(None, reason);
            }
        }
    }
}

impl SocketConnector for TungsteniteConnector {
    /// Validate the endpoint, then connect and handshake on a helper thread.
    ///
    /// Configuration problems are returned immediately; network outcomes
    /// arrive later as socket events.
    fn open(
        &mut self,
        config: &TransportConfig,
        events: SocketEvents,
    ) -> Result<Box<dyn SocketConnection>, ConnectError> {
        let endpoint = resolve_endpoint(config)?;
        let connector = if endpoint.secure {
            Connector::NativeTls(self.tls.connector()?)
        } else {
            Connector::Plain
        };

        let slot = SharedSlot::default();
        let handshake = Handshake {
            endpoint,
            connector,
            connect_timeout: config.connect_timeout,
            write_timeout: config.write_timeout,
            slot: Arc::clone(&slot),
            events: events.clone(),
        };
        let spawned = thread::Builder::new()
            .name(format!("femto-ws-connect-{}", events.generation()))
            .spawn(move || handshake.run());
        if let Err(err) = spawned {
            events.on_error(format!("unable to start connect thread: {err}"));
            events.on_close(None, "connect failed");
            return Ok(Box::new(WsConnection::failed()));
        }
        Ok(Box::new(WsConnection {
            slot,
            events: Some(events),
        }))
    }
}

/// How a peer-side close was observed while polling.
struct PeerClosed {
    code: Option<u16>,
    reason: String,
    error: Option<String>,
}

impl PeerClosed {
    fn new(code: Option<u16>, reason: impl Into<String>) -> Self {
        Self {
            code,
            reason: reason.into(),
            error: None,
        }
    }
}

/// Read whatever is pending. Returns how the peer closed, if it did.
fn drain_inbound(socket: &mut Socket) -> Option<PeerClosed> {
    loop {
        match socket.read() {
            Ok(Message::Close(frame)) => {
                return Some(match frame {
                    Some(f) => PeerClosed::new(Some(u16::from(f.code)), f.reason.to_string()),
                    None => PeerClosed::new(None, "closed by peer"),
                });
            }
            Ok(_) => continue,
            Err(tungstenite::Error::Io(err))
                if matches!(
                    err.kind(),
                    io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut
                ) =>
            {
                let _ = socket.flush();
                return None;
            }
            Err(tungstenite::Error::ConnectionClosed | tungstenite::Error::AlreadyClosed) => {
                return Some(PeerClosed::new(None, "connection closed"));
            }
            Err(err) => {
                return Some(PeerClosed {
                    error: Some(err.to_string()),
                    ..PeerClosed::new(None, "read failed")
                });
            }
        }
    }
}

/// WebSocket connection, possibly still completing its handshake.
struct WsConnection {
    slot: SharedSlot,
    events: Option<SocketEvents>,
}

impl WsConnection {
    fn failed() -> Self {
        Self {
            slot: SharedSlot::default(),
            events: None,
        }
    }

    fn report_closed(&mut self, closed: PeerClosed) {
        self.slot.lock().socket = None;
        if let Some(events) = self.events.take() {
            if let Some(err) = closed.error {
                events.on_error(err);
            }
            events.on_close(closed.code, closed.reason);
        }
    }
}

impl SocketConnection for WsConnection {
    fn send(&mut self, payload: &str) -> io::Result<()> {
        let mut slot = self.slot.lock();
        let Some(socket) = slot.socket.as_mut() else {
            return Err(io::Error::new(
                io::ErrorKind::NotConnected,
                "websocket is not open",
            ));
        };
        socket.send(Message::text(payload)).map_err(io::Error::other)
    }

    fn poll(&mut self) {
        let closed = {
            let mut slot = self.slot.lock();
            let Some(socket) = slot.socket.as_mut() else {
                return;
            };
            drain_inbound(socket)
        };
        if let Some(closed) = closed {
            self.report_closed(closed);
        }
    }

    fn close(&mut self) {
        self.events = None;
        let mut slot = self.slot.lock();
        slot.abandoned = true;
        if let Some(mut socket) = slot.socket.take() {
            let _ = socket.close(None);
            let _ = socket.flush();
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rstest::rstest;

    #[rstest]
    #[case("not a url")]
    #[case("ws://")]
    fn malformed_urls_are_fatal(#[case] url: &str) {
        let err = resolve_endpoint(&TransportConfig::new(url)).err().expect("must fail");
        assert!(matches!(err, ConnectError::InvalidUrl { .. }), "{err:?}");
    }

    #[rstest]
    fn non_websocket_scheme_is_fatal() {
        let err = resolve_endpoint(&TransportConfig::new("http://localhost:1/"))
            .err()
            .expect("must fail");
        assert_eq!(err, ConnectError::UnsupportedScheme("http".into()));
    }

    #[rstest]
    fn bad_header_is_fatal() {
        let config = TransportConfig::new("ws://localhost:1/").with_header("bad header", "x");
        let err = resolve_endpoint(&config).err().expect("must fail");
        assert!(matches!(err, ConnectError::InvalidHeader { name, .. } if name == "bad header"));
    }

    #[rstest]
    fn endpoint_carries_headers_and_protocols() {
        let config = TransportConfig::new("wss://logs.example.test/ingest")
            .with_header("x-api-key", "k")
            .with_protocols(["log.v1", "log.v2"]);
        let endpoint = resolve_endpoint(&config).expect("valid endpoint");
        assert!(endpoint.secure);
        assert_eq!(endpoint.port, 443);
        assert_eq!(endpoint.host, "logs.example.test");
        let headers = endpoint.request.headers();
        assert_eq!(headers["x-api-key"], "k");
        assert_eq!(headers["sec-websocket-protocol"], "log.v1, log.v2");
    }
}
