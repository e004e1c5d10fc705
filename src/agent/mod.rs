//! Agent facade and event loop.
//!
//! The [`Agent`] owns every live socket in the process: the control
//! listener, each controller connection, each client/accepted FIX socket,
//! and each server listener. It runs one state-owning loop; everything
//! else is a thin I/O task that forwards what it reads.
//!
//! ```text
//!                 +-----------------------------------------+
//!                 |               Agent loop                |
//!   control       |  registry - controls - pending connects |
//!   listener ---->|                                         |
//!                 +----^------------^--------------^--------+
//!                      |            |              |
//!                 (events, FIFO mpsc channel)      |
//!                      |            |              |
//!              control reader   socket reader   accept loop
//!              (per controller) (per FIX conn)  (per listen port)
//! ```
//!
//! ## Concurrency model
//!
//! All session and registry mutation happens inside the loop task, one
//! event at a time - no locks. The I/O tasks own only a read half or a
//! listener and never touch session state; they translate socket activity
//! into [`Event`]s on an unbounded FIFO channel, which preserves network
//! arrival order per socket and receive order for control requests. The
//! loop's event handlers are the single place a session's connectivity
//! flag flips, so a peer close becomes observable via `is_connected`
//! without any request having been issued on that session.
//!
//! ## Request/response correlation
//!
//! Responses carry no correlation id. Requests from one controller are
//! processed strictly in receive order and answered on the connection
//! they arrived on, which is unambiguous exactly when the controller
//! keeps one request in flight at a time -
//! [`Controller`](crate::control::Controller) enforces that shape. The
//! one request whose response straddles a later readiness event is
//! `client_connect`: the agent records which control connection awaits
//! which client's connect outcome and answers when the outcome event
//! arrives.

use std::collections::HashMap;
use std::net::SocketAddr;

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::tcp::{OwnedReadHalf, OwnedWriteHalf};
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::mpsc::{self, UnboundedReceiver, UnboundedSender};
use tokio::task::JoinHandle;

use crate::config::Config;
use crate::control::frame::{self, FrameDecoder};
use crate::control::{Request, Response};
use crate::error::{AgentError, Result};
use crate::session::{AcceptedSession, Registry};

/// Which session a socket event belongs to.
#[derive(Debug, Clone)]
enum SocketTarget {
    /// A client session's socket
    Client(String),
    /// An accepted session's socket
    Accepted(String),
}

/// Events delivered to the agent loop by its I/O tasks.
#[derive(Debug)]
enum Event {
    /// One complete control frame arrived on a controller connection
    ControlFrame { conn: u64, payload: Vec<u8> },
    /// A controller connection hit a fatal framing error
    ControlFailed { conn: u64, error: AgentError },
    /// A controller connection closed
    ControlClosed { conn: u64 },
    /// A client connect attempt completed
    ConnectOutcome {
        name: String,
        outcome: std::io::Result<TcpStream>,
    },
    /// A listening port accepted an inbound connection
    Inbound { server: String, stream: TcpStream },
    /// Bytes arrived on a FIX-bearing socket
    SocketData { target: SocketTarget, data: Vec<u8> },
    /// A FIX-bearing socket saw EOF or a transport error
    PeerClosed { target: SocketTarget },
}

/// The process-wide agent: registry, control listener, and event loop.
pub struct Agent {
    config: Config,
    listener: TcpListener,
    registry: Registry,
    /// Write halves of live controller connections, by connection id
    controls: HashMap<u64, OwnedWriteHalf>,
    next_conn_id: u64,
    /// Which control connection awaits which client's connect outcome
    pending_connects: HashMap<String, u64>,
    events_tx: UnboundedSender<Event>,
    events_rx: UnboundedReceiver<Event>,
    shutting_down: bool,
}

impl Agent {
    /// Bind the control listener and prepare the loop. Does not accept
    /// anything until [`run`](Agent::run).
    pub async fn bind(config: Config) -> Result<Self> {
        let listener = TcpListener::bind(config.control_addr()).await?;
        tracing::info!(addr = %listener.local_addr()?, "control listener bound");

        let (events_tx, events_rx) = mpsc::unbounded_channel();
        Ok(Self {
            config,
            listener,
            registry: Registry::new(),
            controls: HashMap::new(),
            next_conn_id: 0,
            pending_connects: HashMap::new(),
            events_tx,
            events_rx,
            shutting_down: false,
        })
    }

    /// Address the control listener is bound to (useful with port 0).
    pub fn local_addr(&self) -> Result<SocketAddr> {
        Ok(self.listener.local_addr()?)
    }

    /// Run the event loop until a `shutdown` request arrives.
    ///
    /// On exit every session socket, listener, and controller connection
    /// is released.
    pub async fn run(mut self) -> Result<()> {
        loop {
            tokio::select! {
                accepted = self.listener.accept() => match accepted {
                    Ok((stream, peer)) => self.accept_control(stream, peer),
                    Err(e) => tracing::warn!(error = %e, "control accept failed"),
                },
                event = self.events_rx.recv() => {
                    // The agent holds a sender, so recv cannot yield None.
                    if let Some(event) = event {
                        self.handle_event(event).await;
                    }
                }
            }
            if self.shutting_down {
                break;
            }
        }

        self.teardown_all();
        Ok(())
    }

    /// Register a new controller connection and start its reader.
    fn accept_control(&mut self, stream: TcpStream, peer: SocketAddr) {
        let conn = self.next_conn_id;
        self.next_conn_id += 1;

        let (read_half, write_half) = stream.into_split();
        self.controls.insert(conn, write_half);
        tokio::spawn(run_control_reader(
            read_half,
            conn,
            self.config.limits.max_frame_bytes,
            self.events_tx.clone(),
        ));
        tracing::info!(conn, %peer, "controller connected");
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::ControlFrame { conn, payload } => {
                self.handle_control_frame(conn, &payload).await;
            }
            Event::ControlFailed { conn, error } => {
                // Framing corruption is unrecoverable for this connection;
                // other controllers and all sessions are unaffected.
                tracing::warn!(conn, error = %error, "control connection failed");
                self.controls.remove(&conn);
            }
            Event::ControlClosed { conn } => {
                tracing::info!(conn, "controller disconnected");
                self.controls.remove(&conn);
            }
            Event::ConnectOutcome { name, outcome } => {
                self.handle_connect_outcome(name, outcome).await;
            }
            Event::Inbound { server, stream } => match self.registry.server_mut(&server) {
                Ok(session) => {
                    session.push_pending(stream);
                    tracing::debug!(
                        server = server.as_str(),
                        pending = session.pending_count(),
                        "connection queued"
                    );
                }
                // Server destroyed with the accept loop still draining.
                Err(_) => drop(stream),
            },
            Event::SocketData { target, data } => self.handle_socket_data(&target, &data),
            Event::PeerClosed { target } => self.handle_peer_closed(&target),
        }
    }

    /// Decode and dispatch one control frame, then answer it.
    async fn handle_control_frame(&mut self, conn: u64, payload: &[u8]) {
        // Malformed JSON is connection-fatal; an unknown or malformed
        // `type` is answered with a generic error frame and the
        // connection continues.
        let value: serde_json::Value = match serde_json::from_slice(payload) {
            Ok(value) => value,
            Err(e) => {
                let error = AgentError::Decode(e.to_string());
                tracing::warn!(conn, error = %error, "closing control connection");
                self.controls.remove(&conn);
                return;
            }
        };

        let request: Request = match serde_json::from_value(value.clone()) {
            Ok(request) => request,
            Err(e) => {
                let message = if e.to_string().starts_with("unknown variant") {
                    let type_name = value
                        .get("type")
                        .and_then(|t| t.as_str())
                        .unwrap_or("<missing>");
                    AgentError::UnknownMessageType(type_name.to_string()).to_string()
                } else {
                    format!("Malformed request: {e}")
                };
                tracing::debug!(conn, message = message.as_str(), "unhandled control payload");
                self.send_response(
                    conn,
                    &Response::Error {
                        result: false,
                        message,
                    },
                )
                .await;
                return;
            }
        };

        tracing::debug!(conn, request = ?request, "control request");
        if let Some(response) = self.dispatch(conn, request).await {
            self.send_response(conn, &response).await;
        }
    }

    /// Route a request to its handler. `None` means the response is
    /// deferred (connect) and will be sent from a later event.
    async fn dispatch(&mut self, conn: u64, request: Request) -> Option<Response> {
        let result: Result<Option<Response>> = match &request {
            Request::ClientCreate { name } => self.handle_client_create(name).map(Some),
            Request::ClientConnect { name, host, port } => self
                .handle_client_connect(conn, name, host, *port)
                .map(|()| None),
            Request::ClientIsConnectedRequest { name } => {
                self.handle_client_is_connected(name).map(Some)
            }
            Request::ClientSend { name, payload } => {
                self.handle_client_send(name, payload).await.map(Some)
            }
            Request::ClientReceiveCountRequest { name } => {
                self.handle_client_receive_count(name).map(Some)
            }
            Request::ClientReceive { name } => self.handle_client_receive(name).map(Some),
            Request::ClientDisconnect { name } => self.handle_client_disconnect(name).map(Some),
            Request::ClientDestroy { name } => self.handle_client_destroy(name).await.map(Some),
            Request::ServerCreate { name } => self.handle_server_create(name).map(Some),
            Request::ServerListen { name, port } => {
                self.handle_server_listen(name, *port).await.map(Some)
            }
            Request::ServerUnlisten { name, port } => {
                self.handle_server_unlisten(name, *port).map(Some)
            }
            Request::ServerPendingAcceptRequest { name } => {
                self.handle_server_pending_accept(name).map(Some)
            }
            Request::ServerAccept { name, session_name } => {
                self.handle_server_accept(name, session_name).map(Some)
            }
            Request::ServerIsConnectedRequest { session_name } => {
                self.handle_server_is_connected(session_name).map(Some)
            }
            Request::ServerSend {
                session_name,
                payload,
            } => self.handle_server_send(session_name, payload).await.map(Some),
            Request::ServerReceiveCountRequest { session_name } => {
                self.handle_server_receive_count(session_name).map(Some)
            }
            Request::ServerReceive { session_name } => {
                self.handle_server_receive(session_name).map(Some)
            }
            Request::ServerDisconnect { session_name } => {
                self.handle_server_disconnect(session_name).map(Some)
            }
            Request::ServerDestroy { name } => self.handle_server_destroy(name).map(Some),
            Request::Shutdown => self.handle_shutdown().map(Some),
        };

        match result {
            Ok(response) => response,
            Err(e) => {
                tracing::debug!(error = %e, "request failed");
                Some(Response::failure_for(&request, e.to_string()))
            }
        }
    }

    // ---- client handlers ------------------------------------------------

    fn handle_client_create(&mut self, name: &str) -> Result<Response> {
        self.registry.create_client(name)?;
        tracing::info!(name, "client session created");
        Ok(Response::ClientCreated {
            name: name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    /// Issue the connect and defer the response until the outcome event.
    fn handle_client_connect(&mut self, conn: u64, name: &str, host: &str, port: u16) -> Result<()> {
        let client = self.registry.client_mut(name)?;
        client.begin_connect()?;
        self.pending_connects.insert(name.to_string(), conn);

        let addr = format!("{host}:{port}");
        let tx = self.events_tx.clone();
        let name = name.to_string();
        tokio::spawn(async move {
            let outcome = TcpStream::connect(&addr).await;
            let _ = tx.send(Event::ConnectOutcome { name, outcome });
        });
        Ok(())
    }

    /// Finish a deferred connect: attach the socket (or record failure)
    /// and answer the controller that asked.
    async fn handle_connect_outcome(&mut self, name: String, outcome: std::io::Result<TcpStream>) {
        let conn = self.pending_connects.remove(&name);

        let response = match self.registry.client_mut(&name) {
            // Destroyed while the connect was in flight: the socket (if
            // any) is dropped here, closing it regardless of OS state.
            Err(_) => Response::ClientConnected {
                name: name.clone(),
                result: false,
                message: AgentError::AlreadyDestroyed(format!("client '{name}'")).to_string(),
            },
            Ok(client) => match outcome {
                Ok(stream) => {
                    let (read_half, write_half) = stream.into_split();
                    let reader = spawn_socket_reader(
                        read_half,
                        SocketTarget::Client(name.clone()),
                        self.events_tx.clone(),
                        self.config.limits.read_buffer_bytes,
                    );
                    client.attach(write_half, reader);
                    tracing::info!(name = name.as_str(), "client connected");
                    Response::ClientConnected {
                        name: name.clone(),
                        result: true,
                        message: String::new(),
                    }
                }
                Err(e) => {
                    client.connect_failed();
                    let error = AgentError::Connect(e.to_string());
                    tracing::info!(name = name.as_str(), error = %error, "client connect failed");
                    Response::ClientConnected {
                        name: name.clone(),
                        result: false,
                        message: error.to_string(),
                    }
                }
            },
        };

        match conn {
            Some(conn) => self.send_response(conn, &response).await,
            None => {
                tracing::debug!(name = name.as_str(), "connect outcome with no controller awaiting");
            }
        }
    }

    fn handle_client_is_connected(&mut self, name: &str) -> Result<Response> {
        let client = self.registry.client(name)?;
        Ok(Response::ClientIsConnectedResponse {
            name: name.to_string(),
            connected: client.is_connected(),
            result: true,
            message: String::new(),
        })
    }

    async fn handle_client_send(&mut self, name: &str, payload: &str) -> Result<Response> {
        let client = self.registry.client_mut(name)?;
        let writer = client
            .writer_mut()
            .ok_or_else(|| AgentError::Connect(format!("Client '{name}' is not connected")))?;

        if let Err(e) = writer.write_all(payload.as_bytes()).await {
            client.mark_disconnected();
            return Err(AgentError::Connect(format!(
                "Send on client '{name}' failed: {e}"
            )));
        }
        Ok(Response::ClientSent {
            name: name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    fn handle_client_receive_count(&mut self, name: &str) -> Result<Response> {
        let client = self.registry.client(name)?;
        Ok(Response::ClientReceiveCountResponse {
            name: name.to_string(),
            count: client.queue_len(),
            result: true,
            message: String::new(),
        })
    }

    fn handle_client_receive(&mut self, name: &str) -> Result<Response> {
        let message = self
            .registry
            .client_mut(name)?
            .pop_message()
            .ok_or_else(|| AgentError::NotFound(format!("no message queued on client '{name}'")))?;
        Ok(Response::ClientReceived {
            name: name.to_string(),
            payload: message.encode_string(),
            result: true,
            message: String::new(),
        })
    }

    fn handle_client_disconnect(&mut self, name: &str) -> Result<Response> {
        let client = self.registry.client_mut(name)?;
        if !client.is_connected() {
            return Err(AgentError::Connect(format!(
                "Client '{name}' is not connected"
            )));
        }
        client.mark_disconnected();
        tracing::info!(name, "client disconnected");
        Ok(Response::ClientDisconnected {
            name: name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    async fn handle_client_destroy(&mut self, name: &str) -> Result<Response> {
        let mut client = self
            .registry
            .remove_client(name)
            .map_err(|_| AgentError::AlreadyDestroyed(format!("client '{name}'")))?;
        client.teardown();

        // A connect may still be in flight; its awaiting controller gets a
        // failure now, and the socket is dropped when the outcome arrives.
        if let Some(conn) = self.pending_connects.remove(name) {
            let response = Response::ClientConnected {
                name: name.to_string(),
                result: false,
                message: format!("Connect abandoned: client '{name}' destroyed"),
            };
            self.send_response(conn, &response).await;
        }

        tracing::info!(name, "client session destroyed");
        Ok(Response::ClientDestroyed {
            name: name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    // ---- server handlers ------------------------------------------------

    fn handle_server_create(&mut self, name: &str) -> Result<Response> {
        self.registry.create_server(name)?;
        tracing::info!(name, "server session created");
        Ok(Response::ServerCreated {
            name: name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    /// Bind one more port for a server. Port 0 picks an ephemeral port;
    /// the response always carries the port actually bound.
    async fn handle_server_listen(&mut self, name: &str, port: u16) -> Result<Response> {
        self.registry.server(name)?;

        let listener = TcpListener::bind((self.config.control.host.as_str(), port))
            .await
            .map_err(|e| AgentError::Connect(format!("Listen failed on port {port}: {e}")))?;
        let bound_port = listener.local_addr()?.port();

        let handle = tokio::spawn(run_accept_loop(
            listener,
            name.to_string(),
            self.events_tx.clone(),
        ));
        self.registry
            .server_mut(name)?
            .add_listener(bound_port, handle)?;

        tracing::info!(name, port = bound_port, "server listening");
        Ok(Response::ServerListened {
            name: name.to_string(),
            port: bound_port,
            result: true,
            message: String::new(),
        })
    }

    fn handle_server_unlisten(&mut self, name: &str, port: u16) -> Result<Response> {
        self.registry.server_mut(name)?.remove_listener(port)?;
        tracing::info!(name, port, "server stopped listening");
        Ok(Response::ServerUnlistened {
            name: name.to_string(),
            port,
            result: true,
            message: String::new(),
        })
    }

    fn handle_server_pending_accept(&mut self, name: &str) -> Result<Response> {
        let server = self.registry.server(name)?;
        Ok(Response::ServerPendingAcceptResponse {
            name: name.to_string(),
            count: server.pending_count(),
            result: true,
            message: String::new(),
        })
    }

    /// Promote the oldest pending connection to an accepted session.
    fn handle_server_accept(&mut self, name: &str, session_name: &str) -> Result<Response> {
        if !self.registry.accepted_name_free(session_name) {
            return Err(AgentError::NameInUse(format!(
                "accepted session '{session_name}'"
            )));
        }

        let read_buffer = self.config.limits.read_buffer_bytes;
        let events_tx = self.events_tx.clone();
        let server = self.registry.server_mut(name)?;
        let stream = server.pop_pending()?;
        server.add_accepted(session_name);

        let (read_half, write_half) = stream.into_split();
        let reader = spawn_socket_reader(
            read_half,
            SocketTarget::Accepted(session_name.to_string()),
            events_tx,
            read_buffer,
        );
        let session = AcceptedSession::new(session_name, name, write_half, reader);
        self.registry.insert_accepted(session)?;

        tracing::info!(server = name, session = session_name, "connection accepted");
        Ok(Response::ServerAccepted {
            name: name.to_string(),
            session_name: session_name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    fn handle_server_is_connected(&mut self, session_name: &str) -> Result<Response> {
        let session = self.registry.accepted(session_name)?;
        Ok(Response::ServerIsConnectedResponse {
            session_name: session_name.to_string(),
            connected: session.is_connected(),
            result: true,
            message: String::new(),
        })
    }

    async fn handle_server_send(&mut self, session_name: &str, payload: &str) -> Result<Response> {
        let session = self.registry.accepted_mut(session_name)?;
        let writer = session.writer_mut().ok_or_else(|| {
            AgentError::Connect(format!("Accepted session '{session_name}' is not connected"))
        })?;

        if let Err(e) = writer.write_all(payload.as_bytes()).await {
            session.mark_disconnected();
            return Err(AgentError::Connect(format!(
                "Send on accepted session '{session_name}' failed: {e}"
            )));
        }
        Ok(Response::ServerSent {
            session_name: session_name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    fn handle_server_receive_count(&mut self, session_name: &str) -> Result<Response> {
        let session = self.registry.accepted(session_name)?;
        Ok(Response::ServerReceiveCountResponse {
            session_name: session_name.to_string(),
            count: session.queue_len(),
            result: true,
            message: String::new(),
        })
    }

    fn handle_server_receive(&mut self, session_name: &str) -> Result<Response> {
        let message = self
            .registry
            .accepted_mut(session_name)?
            .pop_message()
            .ok_or_else(|| {
                AgentError::NotFound(format!(
                    "no message queued on accepted session '{session_name}'"
                ))
            })?;
        Ok(Response::ServerReceived {
            session_name: session_name.to_string(),
            payload: message.encode_string(),
            result: true,
            message: String::new(),
        })
    }

    fn handle_server_disconnect(&mut self, session_name: &str) -> Result<Response> {
        let session = self.registry.accepted_mut(session_name)?;
        if !session.is_connected() {
            return Err(AgentError::Connect(format!(
                "Accepted session '{session_name}' is not connected"
            )));
        }
        session.mark_disconnected();
        tracing::info!(session = session_name, "accepted session disconnected");
        Ok(Response::ServerDisconnected {
            session_name: session_name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    /// Destroy a server: every accepted session is torn down and removed,
    /// every port unlistened, then the server itself unregistered.
    fn handle_server_destroy(&mut self, name: &str) -> Result<Response> {
        let accepted_names = self
            .registry
            .server(name)
            .map_err(|_| AgentError::AlreadyDestroyed(format!("server '{name}'")))?
            .accepted_names();

        for child in &accepted_names {
            let mut session = self.registry.remove_accepted(child)?;
            session.teardown();
            tracing::info!(server = name, session = child.as_str(), "accepted session destroyed");
        }

        let mut server = self.registry.remove_server(name)?;
        server.teardown();
        tracing::info!(name, "server session destroyed");
        Ok(Response::ServerDestroyed {
            name: name.to_string(),
            result: true,
            message: String::new(),
        })
    }

    // ---- lifecycle ------------------------------------------------------

    fn handle_shutdown(&mut self) -> Result<Response> {
        tracing::info!("shutdown requested");
        self.shutting_down = true;
        Ok(Response::ShutdownAck {
            result: true,
            message: String::new(),
        })
    }

    /// Apply inbound FIX bytes to the owning session's parser and queue.
    fn handle_socket_data(&mut self, target: &SocketTarget, data: &[u8]) {
        let drained = match target {
            SocketTarget::Client(name) => match self.registry.client_mut(name) {
                Ok(session) => session.push_bytes(data),
                Err(_) => return,
            },
            SocketTarget::Accepted(name) => match self.registry.accepted_mut(name) {
                Ok(session) => session.push_bytes(data),
                Err(_) => return,
            },
        };
        if drained > 0 {
            tracing::debug!(session = ?target, drained, "messages queued");
        }
    }

    /// The single place network-driven disconnects flip the flag.
    fn handle_peer_closed(&mut self, target: &SocketTarget) {
        match target {
            SocketTarget::Client(name) => {
                if let Ok(session) = self.registry.client_mut(name) {
                    session.mark_disconnected();
                    tracing::info!(name = name.as_str(), "client peer closed");
                }
            }
            SocketTarget::Accepted(name) => {
                if let Ok(session) = self.registry.accepted_mut(name) {
                    session.mark_disconnected();
                    tracing::info!(session = name.as_str(), "accepted session peer closed");
                }
            }
        }
    }

    /// Encode and write one response frame, best effort. A dead controller
    /// connection is dropped, never retried.
    async fn send_response(&mut self, conn: u64, response: &Response) {
        let Some(writer) = self.controls.get_mut(&conn) else {
            tracing::debug!(conn, "controller gone, response dropped");
            return;
        };
        let payload = match serde_json::to_vec(response) {
            Ok(payload) => payload,
            Err(e) => {
                tracing::error!(error = %e, "response encode failed");
                return;
            }
        };
        if let Err(e) = writer.write_all(&frame::encode(&payload)).await {
            tracing::warn!(conn, error = %e, "control write failed");
            self.controls.remove(&conn);
        }
    }

    /// Release every socket the agent owns.
    fn teardown_all(&mut self) {
        let (clients, servers, accepted) = self.registry.drain();
        for mut session in clients {
            session.teardown();
        }
        for mut session in servers {
            session.teardown();
        }
        for mut session in accepted {
            session.teardown();
        }
        self.controls.clear();
        tracing::info!("agent stopped");
    }
}

/// Read frames off one controller connection and forward them.
async fn run_control_reader(
    mut reader: OwnedReadHalf,
    conn: u64,
    max_frame_bytes: usize,
    tx: UnboundedSender<Event>,
) {
    let mut decoder = FrameDecoder::new(max_frame_bytes);
    let mut buf = vec![0u8; 8192];
    loop {
        match reader.read(&mut buf).await {
            Ok(0) | Err(_) => {
                let _ = tx.send(Event::ControlClosed { conn });
                return;
            }
            Ok(n) => {
                decoder.extend(&buf[..n]);
                loop {
                    match decoder.next_frame() {
                        Ok(Some(payload)) => {
                            if tx.send(Event::ControlFrame { conn, payload }).is_err() {
                                return;
                            }
                        }
                        Ok(None) => break,
                        Err(error) => {
                            let _ = tx.send(Event::ControlFailed { conn, error });
                            return;
                        }
                    }
                }
            }
        }
    }
}

/// Accept inbound connections on one listening port and forward them.
async fn run_accept_loop(listener: TcpListener, server: String, tx: UnboundedSender<Event>) {
    loop {
        match listener.accept().await {
            Ok((stream, peer)) => {
                tracing::debug!(server = server.as_str(), %peer, "inbound connection");
                if tx
                    .send(Event::Inbound {
                        server: server.clone(),
                        stream,
                    })
                    .is_err()
                {
                    return;
                }
            }
            Err(e) => {
                tracing::warn!(server = server.as_str(), error = %e, "accept failed");
                tokio::time::sleep(std::time::Duration::from_millis(100)).await;
            }
        }
    }
}

/// Read raw bytes off one FIX-bearing socket and forward them. EOF and
/// transport errors both surface as [`Event::PeerClosed`].
fn spawn_socket_reader(
    mut reader: OwnedReadHalf,
    target: SocketTarget,
    tx: UnboundedSender<Event>,
    buf_len: usize,
) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut buf = vec![0u8; buf_len];
        loop {
            match reader.read(&mut buf).await {
                Ok(0) | Err(_) => {
                    let _ = tx.send(Event::PeerClosed { target });
                    return;
                }
                Ok(n) => {
                    let event = Event::SocketData {
                        target: target.clone(),
                        data: buf[..n].to_vec(),
                    };
                    if tx.send(event).is_err() {
                        return;
                    }
                }
            }
        }
    })
}
