//! Controller-side client for the agent's control channel.

use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::{TcpStream, ToSocketAddrs};

use crate::error::{AgentError, Result};
use crate::fix::FixMessage;

use super::frame::{self, FrameDecoder};
use super::message::{Request, Response};

/// A controller's handle on one agent.
///
/// Wraps one control connection and exposes a typed method per control
/// operation. Each method writes exactly one request frame and blocks until
/// exactly one response frame arrives, so a `Controller` can never have two
/// requests in flight - the discipline the correlation-free protocol
/// depends on. A `result=false` response surfaces as
/// [`AgentError::Refused`].
pub struct Controller {
    stream: TcpStream,
    decoder: FrameDecoder,
    read_buf: Vec<u8>,
}

impl Controller {
    /// Connect to an agent's control listener.
    pub async fn connect(addr: impl ToSocketAddrs) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            decoder: FrameDecoder::default(),
            read_buf: vec![0u8; 8192],
        })
    }

    /// Send one request and wait for its response frame.
    pub async fn roundtrip(&mut self, request: &Request) -> Result<Response> {
        let payload = serde_json::to_vec(request)?;
        self.stream.write_all(&frame::encode(&payload)).await?;

        loop {
            if let Some(payload) = self.decoder.next_frame()? {
                return Ok(serde_json::from_slice(&payload)?);
            }
            let n = self.stream.read(&mut self.read_buf).await?;
            if n == 0 {
                return Err(AgentError::Protocol(
                    "Control connection closed while awaiting response".to_string(),
                ));
            }
            self.decoder.extend(&self.read_buf[..n]);
        }
    }

    /// Create a client session.
    pub async fn client_create(&mut self, name: &str) -> Result<()> {
        let response = self
            .roundtrip(&Request::ClientCreate {
                name: name.to_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Connect a client session to `host:port`. Returns once the agent has
    /// observed the connect outcome.
    pub async fn client_connect(&mut self, name: &str, host: &str, port: u16) -> Result<()> {
        let response = self
            .roundtrip(&Request::ClientConnect {
                name: name.to_string(),
                host: host.to_string(),
                port,
            })
            .await?;
        expect_ok(&response)
    }

    /// Query a client session's connectivity flag.
    pub async fn client_is_connected(&mut self, name: &str) -> Result<bool> {
        let response = self
            .roundtrip(&Request::ClientIsConnectedRequest {
                name: name.to_string(),
            })
            .await?;
        match response {
            Response::ClientIsConnectedResponse {
                connected,
                result: true,
                ..
            } => Ok(connected),
            other => Err(refusal(&other)),
        }
    }

    /// Send a FIX message from a client session.
    pub async fn client_send(&mut self, name: &str, message: &FixMessage) -> Result<()> {
        let response = self
            .roundtrip(&Request::ClientSend {
                name: name.to_string(),
                payload: message.encode_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Number of unread messages queued on a client session.
    pub async fn client_receive_count(&mut self, name: &str) -> Result<usize> {
        let response = self
            .roundtrip(&Request::ClientReceiveCountRequest {
                name: name.to_string(),
            })
            .await?;
        match response {
            Response::ClientReceiveCountResponse {
                count,
                result: true,
                ..
            } => Ok(count),
            other => Err(refusal(&other)),
        }
    }

    /// Pop the oldest queued message from a client session.
    pub async fn client_receive(&mut self, name: &str) -> Result<String> {
        let response = self
            .roundtrip(&Request::ClientReceive {
                name: name.to_string(),
            })
            .await?;
        match response {
            Response::ClientReceived {
                payload,
                result: true,
                ..
            } => Ok(payload),
            other => Err(refusal(&other)),
        }
    }

    /// Disconnect a client session from its peer.
    pub async fn client_disconnect(&mut self, name: &str) -> Result<()> {
        let response = self
            .roundtrip(&Request::ClientDisconnect {
                name: name.to_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Destroy a client session.
    pub async fn client_destroy(&mut self, name: &str) -> Result<()> {
        let response = self
            .roundtrip(&Request::ClientDestroy {
                name: name.to_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Create a server session.
    pub async fn server_create(&mut self, name: &str) -> Result<()> {
        let response = self
            .roundtrip(&Request::ServerCreate {
                name: name.to_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Listen on a port. Pass 0 for an ephemeral port; the port actually
    /// bound is returned either way.
    pub async fn server_listen(&mut self, name: &str, port: u16) -> Result<u16> {
        let response = self
            .roundtrip(&Request::ServerListen {
                name: name.to_string(),
                port,
            })
            .await?;
        match response {
            Response::ServerListened {
                port, result: true, ..
            } => Ok(port),
            other => Err(refusal(&other)),
        }
    }

    /// Release one of a server's bound ports.
    pub async fn server_unlisten(&mut self, name: &str, port: u16) -> Result<()> {
        let response = self
            .roundtrip(&Request::ServerUnlisten {
                name: name.to_string(),
                port,
            })
            .await?;
        expect_ok(&response)
    }

    /// Number of inbound connections awaiting accept on a server.
    pub async fn server_pending_accept_count(&mut self, name: &str) -> Result<usize> {
        let response = self
            .roundtrip(&Request::ServerPendingAcceptRequest {
                name: name.to_string(),
            })
            .await?;
        match response {
            Response::ServerPendingAcceptResponse {
                count,
                result: true,
                ..
            } => Ok(count),
            other => Err(refusal(&other)),
        }
    }

    /// Promote the oldest pending connection to an accepted session.
    pub async fn server_accept(&mut self, name: &str, session_name: &str) -> Result<()> {
        let response = self
            .roundtrip(&Request::ServerAccept {
                name: name.to_string(),
                session_name: session_name.to_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Query an accepted session's connectivity flag.
    pub async fn server_is_connected(&mut self, session_name: &str) -> Result<bool> {
        let response = self
            .roundtrip(&Request::ServerIsConnectedRequest {
                session_name: session_name.to_string(),
            })
            .await?;
        match response {
            Response::ServerIsConnectedResponse {
                connected,
                result: true,
                ..
            } => Ok(connected),
            other => Err(refusal(&other)),
        }
    }

    /// Send a FIX message from an accepted session.
    pub async fn server_send(&mut self, session_name: &str, message: &FixMessage) -> Result<()> {
        let response = self
            .roundtrip(&Request::ServerSend {
                session_name: session_name.to_string(),
                payload: message.encode_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Number of unread messages queued on an accepted session.
    pub async fn server_receive_count(&mut self, session_name: &str) -> Result<usize> {
        let response = self
            .roundtrip(&Request::ServerReceiveCountRequest {
                session_name: session_name.to_string(),
            })
            .await?;
        match response {
            Response::ServerReceiveCountResponse {
                count,
                result: true,
                ..
            } => Ok(count),
            other => Err(refusal(&other)),
        }
    }

    /// Pop the oldest queued message from an accepted session.
    pub async fn server_receive(&mut self, session_name: &str) -> Result<String> {
        let response = self
            .roundtrip(&Request::ServerReceive {
                session_name: session_name.to_string(),
            })
            .await?;
        match response {
            Response::ServerReceived {
                payload,
                result: true,
                ..
            } => Ok(payload),
            other => Err(refusal(&other)),
        }
    }

    /// Disconnect an accepted session from its peer.
    pub async fn server_disconnect(&mut self, session_name: &str) -> Result<()> {
        let response = self
            .roundtrip(&Request::ServerDisconnect {
                session_name: session_name.to_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Destroy a server session and everything it owns.
    pub async fn server_destroy(&mut self, name: &str) -> Result<()> {
        let response = self
            .roundtrip(&Request::ServerDestroy {
                name: name.to_string(),
            })
            .await?;
        expect_ok(&response)
    }

    /// Ask the agent to close every session and exit.
    pub async fn shutdown(&mut self) -> Result<()> {
        let response = self.roundtrip(&Request::Shutdown).await?;
        expect_ok(&response)
    }
}

fn expect_ok(response: &Response) -> Result<()> {
    let (result, message) = response.outcome();
    if result {
        Ok(())
    } else {
        Err(AgentError::Refused(message.to_string()))
    }
}

fn refusal(response: &Response) -> AgentError {
    let (result, message) = response.outcome();
    if result {
        AgentError::Protocol(format!("Unexpected response: {response:?}"))
    } else {
        AgentError::Refused(message.to_string())
    }
}
