//! Control message set.
//!
//! A closed, versionless set of flat JSON objects discriminated by a
//! `type` field. Every request has exactly one matching response; every
//! response carries a `result`/`message` outcome pair (`message` empty on
//! success) plus type-specific fields such as `count`, `connected`,
//! `session_name`, or `payload`.
//!
//! | Request                         | Response                          |
//! |---------------------------------|-----------------------------------|
//! | `client_create`                 | `client_created`                  |
//! | `client_connect`                | `client_connected` (deferred)     |
//! | `client_is_connected_request`   | `client_is_connected_response`    |
//! | `client_send`                   | `client_sent`                     |
//! | `client_receive_count_request`  | `client_receive_count_response`   |
//! | `client_receive`                | `client_received`                 |
//! | `client_disconnect`             | `client_disconnected`             |
//! | `client_destroy`                | `client_destroyed`                |
//! | `server_create`                 | `server_created`                  |
//! | `server_listen`                 | `server_listened`                 |
//! | `server_unlisten`               | `server_unlistened`               |
//! | `server_pending_accept_request` | `server_pending_accept_response`  |
//! | `server_accept`                 | `server_accepted`                 |
//! | `server_is_connected_request`   | `server_is_connected_response`    |
//! | `server_send`                   | `server_sent`                     |
//! | `server_receive_count_request`  | `server_receive_count_response`   |
//! | `server_receive`                | `server_received`                 |
//! | `server_disconnect`             | `server_disconnected`             |
//! | `server_destroy`                | `server_destroyed`                |
//! | `shutdown`                      | `shutdown_ack`                    |
//!
//! One response has no request: `error`, the generic frame sent when a
//! payload's `type` is unknown or its fields do not decode. There is no
//! correlation identifier, so controllers must keep a single request in
//! flight per connection.
//!
//! Server-side `send`/`receive`/`is_connected`/`disconnect` address an
//! accepted session by its globally unique `session_name`, not the owning
//! server - the only scheme that stays unambiguous with several accepted
//! connections per server.

use serde::{Deserialize, Serialize};

/// Control request, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Request {
    /// Register a new client session under `name`.
    ClientCreate {
        /// Session name, caller-assigned
        name: String,
    },
    /// Connect a client session to a peer. The response is deferred until
    /// the connect outcome is observed.
    ClientConnect {
        /// Client session name
        name: String,
        /// Peer host
        host: String,
        /// Peer TCP port
        port: u16,
    },
    /// Query a client session's connectivity flag.
    ClientIsConnectedRequest {
        /// Client session name
        name: String,
    },
    /// Write one encoded FIX message to a client session's socket.
    ClientSend {
        /// Client session name
        name: String,
        /// Encoded FIX message bytes as UTF-8 text
        payload: String,
    },
    /// Query the length of a client session's inbound queue.
    ClientReceiveCountRequest {
        /// Client session name
        name: String,
    },
    /// Pop the oldest message from a client session's inbound queue.
    ClientReceive {
        /// Client session name
        name: String,
    },
    /// Close a client session's socket.
    ClientDisconnect {
        /// Client session name
        name: String,
    },
    /// Disconnect (if needed) and unregister a client session.
    ClientDestroy {
        /// Client session name
        name: String,
    },

    /// Register a new server session under `name`.
    ServerCreate {
        /// Session name, caller-assigned
        name: String,
    },
    /// Bind an additional listening port on a server session. Port 0
    /// requests an ephemeral port; the response echoes the port bound.
    ServerListen {
        /// Server session name
        name: String,
        /// TCP port to bind, 0 for ephemeral
        port: u16,
    },
    /// Stop listening on one of a server session's bound ports.
    ServerUnlisten {
        /// Server session name
        name: String,
        /// Bound port to release
        port: u16,
    },
    /// Query how many inbound connections await accept on a server.
    ServerPendingAcceptRequest {
        /// Server session name
        name: String,
    },
    /// Promote the oldest pending connection to an accepted session named
    /// `session_name`.
    ServerAccept {
        /// Server session name
        name: String,
        /// Name for the accepted session, caller-assigned
        session_name: String,
    },
    /// Query an accepted session's connectivity flag.
    ServerIsConnectedRequest {
        /// Accepted session name
        session_name: String,
    },
    /// Write one encoded FIX message to an accepted session's socket.
    ServerSend {
        /// Accepted session name
        session_name: String,
        /// Encoded FIX message bytes as UTF-8 text
        payload: String,
    },
    /// Query the length of an accepted session's inbound queue.
    ServerReceiveCountRequest {
        /// Accepted session name
        session_name: String,
    },
    /// Pop the oldest message from an accepted session's inbound queue.
    ServerReceive {
        /// Accepted session name
        session_name: String,
    },
    /// Close an accepted session's socket.
    ServerDisconnect {
        /// Accepted session name
        session_name: String,
    },
    /// Tear down every accepted session and listen port, then unregister
    /// the server.
    ServerDestroy {
        /// Server session name
        name: String,
    },

    /// Close every session and stop the agent.
    Shutdown,
}

/// Control response, tagged by `type`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
#[allow(missing_docs)] // field meanings documented on the request variants
pub enum Response {
    ClientCreated {
        name: String,
        result: bool,
        message: String,
    },
    ClientConnected {
        name: String,
        result: bool,
        message: String,
    },
    ClientIsConnectedResponse {
        name: String,
        connected: bool,
        result: bool,
        message: String,
    },
    ClientSent {
        name: String,
        result: bool,
        message: String,
    },
    ClientReceiveCountResponse {
        name: String,
        count: usize,
        result: bool,
        message: String,
    },
    ClientReceived {
        name: String,
        payload: String,
        result: bool,
        message: String,
    },
    ClientDisconnected {
        name: String,
        result: bool,
        message: String,
    },
    ClientDestroyed {
        name: String,
        result: bool,
        message: String,
    },

    ServerCreated {
        name: String,
        result: bool,
        message: String,
    },
    ServerListened {
        name: String,
        port: u16,
        result: bool,
        message: String,
    },
    ServerUnlistened {
        name: String,
        port: u16,
        result: bool,
        message: String,
    },
    ServerPendingAcceptResponse {
        name: String,
        count: usize,
        result: bool,
        message: String,
    },
    ServerAccepted {
        name: String,
        session_name: String,
        result: bool,
        message: String,
    },
    ServerIsConnectedResponse {
        session_name: String,
        connected: bool,
        result: bool,
        message: String,
    },
    ServerSent {
        session_name: String,
        result: bool,
        message: String,
    },
    ServerReceiveCountResponse {
        session_name: String,
        count: usize,
        result: bool,
        message: String,
    },
    ServerReceived {
        session_name: String,
        payload: String,
        result: bool,
        message: String,
    },
    ServerDisconnected {
        session_name: String,
        result: bool,
        message: String,
    },
    ServerDestroyed {
        name: String,
        result: bool,
        message: String,
    },

    ShutdownAck {
        result: bool,
        message: String,
    },

    /// Generic error frame for payloads whose `type` is unknown or whose
    /// fields do not decode. `result` is always false.
    Error {
        result: bool,
        message: String,
    },
}

impl Response {
    /// The failure response correlated to `request`, carrying `message`.
    ///
    /// Keeps the request/response symmetry intact even on error paths: the
    /// controller always receives the response type it is waiting for.
    pub fn failure_for(request: &Request, message: String) -> Self {
        match request {
            Request::ClientCreate { name } => Response::ClientCreated {
                name: name.clone(),
                result: false,
                message,
            },
            Request::ClientConnect { name, .. } => Response::ClientConnected {
                name: name.clone(),
                result: false,
                message,
            },
            Request::ClientIsConnectedRequest { name } => Response::ClientIsConnectedResponse {
                name: name.clone(),
                connected: false,
                result: false,
                message,
            },
            Request::ClientSend { name, .. } => Response::ClientSent {
                name: name.clone(),
                result: false,
                message,
            },
            Request::ClientReceiveCountRequest { name } => Response::ClientReceiveCountResponse {
                name: name.clone(),
                count: 0,
                result: false,
                message,
            },
            Request::ClientReceive { name } => Response::ClientReceived {
                name: name.clone(),
                payload: String::new(),
                result: false,
                message,
            },
            Request::ClientDisconnect { name } => Response::ClientDisconnected {
                name: name.clone(),
                result: false,
                message,
            },
            Request::ClientDestroy { name } => Response::ClientDestroyed {
                name: name.clone(),
                result: false,
                message,
            },
            Request::ServerCreate { name } => Response::ServerCreated {
                name: name.clone(),
                result: false,
                message,
            },
            Request::ServerListen { name, port } => Response::ServerListened {
                name: name.clone(),
                port: *port,
                result: false,
                message,
            },
            Request::ServerUnlisten { name, port } => Response::ServerUnlistened {
                name: name.clone(),
                port: *port,
                result: false,
                message,
            },
            Request::ServerPendingAcceptRequest { name } => Response::ServerPendingAcceptResponse {
                name: name.clone(),
                count: 0,
                result: false,
                message,
            },
            Request::ServerAccept { name, session_name } => Response::ServerAccepted {
                name: name.clone(),
                session_name: session_name.clone(),
                result: false,
                message,
            },
            Request::ServerIsConnectedRequest { session_name } => {
                Response::ServerIsConnectedResponse {
                    session_name: session_name.clone(),
                    connected: false,
                    result: false,
                    message,
                }
            }
            Request::ServerSend { session_name, .. } => Response::ServerSent {
                session_name: session_name.clone(),
                result: false,
                message,
            },
            Request::ServerReceiveCountRequest { session_name } => {
                Response::ServerReceiveCountResponse {
                    session_name: session_name.clone(),
                    count: 0,
                    result: false,
                    message,
                }
            }
            Request::ServerReceive { session_name } => Response::ServerReceived {
                session_name: session_name.clone(),
                payload: String::new(),
                result: false,
                message,
            },
            Request::ServerDisconnect { session_name } => Response::ServerDisconnected {
                session_name: session_name.clone(),
                result: false,
                message,
            },
            Request::ServerDestroy { name } => Response::ServerDestroyed {
                name: name.clone(),
                result: false,
                message,
            },
            Request::Shutdown => Response::ShutdownAck {
                result: false,
                message,
            },
        }
    }

    /// The outcome pair carried by every response.
    pub fn outcome(&self) -> (bool, &str) {
        match self {
            Response::ClientCreated {
                result, message, ..
            }
            | Response::ClientConnected {
                result, message, ..
            }
            | Response::ClientIsConnectedResponse {
                result, message, ..
            }
            | Response::ClientSent {
                result, message, ..
            }
            | Response::ClientReceiveCountResponse {
                result, message, ..
            }
            | Response::ClientReceived {
                result, message, ..
            }
            | Response::ClientDisconnected {
                result, message, ..
            }
            | Response::ClientDestroyed {
                result, message, ..
            }
            | Response::ServerCreated {
                result, message, ..
            }
            | Response::ServerListened {
                result, message, ..
            }
            | Response::ServerUnlistened {
                result, message, ..
            }
            | Response::ServerPendingAcceptResponse {
                result, message, ..
            }
            | Response::ServerAccepted {
                result, message, ..
            }
            | Response::ServerIsConnectedResponse {
                result, message, ..
            }
            | Response::ServerSent {
                result, message, ..
            }
            | Response::ServerReceiveCountResponse {
                result, message, ..
            }
            | Response::ServerReceived {
                result, message, ..
            }
            | Response::ServerDisconnected {
                result, message, ..
            }
            | Response::ServerDestroyed {
                result, message, ..
            }
            | Response::ShutdownAck {
                result, message, ..
            }
            | Response::Error {
                result, message, ..
            } => (*result, message),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_tag_names() {
        let json = serde_json::to_value(Request::ClientCreate {
            name: "c1".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "client_create");
        assert_eq!(json["name"], "c1");

        let json = serde_json::to_value(Request::ServerPendingAcceptRequest {
            name: "s1".to_string(),
        })
        .unwrap();
        assert_eq!(json["type"], "server_pending_accept_request");

        let json = serde_json::to_value(Request::Shutdown).unwrap();
        assert_eq!(json["type"], "shutdown");
    }

    #[test]
    fn test_response_tag_names() {
        let json = serde_json::to_value(Response::ServerListened {
            name: "s1".to_string(),
            port: 23456,
            result: true,
            message: String::new(),
        })
        .unwrap();
        assert_eq!(json["type"], "server_listened");
        assert_eq!(json["port"], 23456);
        assert_eq!(json["result"], true);
        assert_eq!(json["message"], "");
    }

    #[test]
    fn test_request_roundtrip() {
        let request = Request::ClientConnect {
            name: "c1".to_string(),
            host: "localhost".to_string(),
            port: 23456,
        };
        let json = serde_json::to_string(&request).unwrap();
        let parsed: Request = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, request);
    }

    #[test]
    fn test_unknown_type_fails_decode() {
        let result = serde_json::from_str::<Request>(r#"{"type":"warp_core_eject"}"#);
        assert!(result.is_err());
    }

    #[test]
    fn test_failure_for_matches_request_type() {
        let request = Request::ServerAccept {
            name: "s1".to_string(),
            session_name: "cs1".to_string(),
        };
        let response = Response::failure_for(&request, "No pending connection: s1".to_string());

        match response {
            Response::ServerAccepted {
                name,
                session_name,
                result,
                message,
            } => {
                assert_eq!(name, "s1");
                assert_eq!(session_name, "cs1");
                assert!(!result);
                assert!(message.contains("No pending connection"));
            }
            other => panic!("unexpected response: {other:?}"),
        }
    }

    #[test]
    fn test_outcome_accessor() {
        let ok = Response::ShutdownAck {
            result: true,
            message: String::new(),
        };
        assert_eq!(ok.outcome(), (true, ""));

        let err = Response::Error {
            result: false,
            message: "Unknown message type: warp".to_string(),
        };
        let (result, message) = err.outcome();
        assert!(!result);
        assert!(message.contains("warp"));
    }
}
