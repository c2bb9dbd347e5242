//! UDP request/response endpoint in front of the engine

use crate::engine::Engine;
use crate::rpc::dispatch;
use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{Envelope, ErrorKind, Reply, Request, Response};
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::time::timeout;

/// Largest payload a single UDP datagram can carry
const MAX_DATAGRAM: usize = 65_507;

/// Serves one request per datagram, each in its own task.
pub struct Server {
    socket: Arc<UdpSocket>,
    engine: Arc<Engine>,
    default_deadline: Duration,
}

impl Server {
    /// `default_deadline` bounds requests whose envelope carries none.
    pub async fn bind(
        addr: &str,
        engine: Arc<Engine>,
        default_deadline: Duration,
    ) -> std::io::Result<Self> {
        let socket = Arc::new(UdpSocket::bind(addr).await?);
        info!("Server listening on {}", socket.local_addr()?);

        Ok(Server {
            socket,
            engine,
            default_deadline,
        })
    }

    pub fn local_addr(&self) -> std::io::Result<SocketAddr> {
        self.socket.local_addr()
    }

    /// Receives datagrams until the task is dropped.
    pub async fn run(&self) {
        let mut buffer = vec![0u8; MAX_DATAGRAM];

        loop {
            match self.socket.recv_from(&mut buffer).await {
                Ok((len, addr)) => match deserialize::<Envelope>(&buffer[..len]) {
                    Ok(envelope) => {
                        tokio::spawn(handle_envelope(
                            Arc::clone(&self.engine),
                            Arc::clone(&self.socket),
                            envelope,
                            addr,
                            self.default_deadline,
                        ));
                    }
                    Err(e) => warn!("Failed to deserialize request from {}: {}", addr, e),
                },
                Err(e) => {
                    error!("Error receiving packet: {}", e);
                    tokio::time::sleep(Duration::from_millis(10)).await;
                }
            }
        }
    }
}

async fn handle_envelope(
    engine: Arc<Engine>,
    socket: Arc<UdpSocket>,
    envelope: Envelope,
    addr: SocketAddr,
    default_deadline: Duration,
) {
    let deadline = match envelope.deadline_ms {
        0 => default_deadline,
        ms => Duration::from_millis(ms),
    };
    let response = answer(&engine, envelope.request, deadline).await;

    match encode_reply(envelope.request_id, response) {
        Ok(data) => {
            if let Err(e) = socket.send_to(&data, addr).await {
                error!("Failed to send reply to {}: {}", addr, e);
            }
        }
        Err(e) => error!("Failed to serialize reply for {}: {}", addr, e),
    }
}

/// Encodes a reply that fits in one datagram. A response too large to send
/// is replaced by an `InvalidInput` failure so the caller hears back.
fn encode_reply(request_id: u64, response: Response) -> Result<Vec<u8>, bincode::Error> {
    let data = serialize(&Reply {
        request_id,
        response,
    })?;
    if data.len() <= MAX_DATAGRAM {
        return Ok(data);
    }

    warn!(
        "Reply {} is {} bytes, over the {} byte datagram limit",
        request_id,
        data.len(),
        MAX_DATAGRAM
    );
    serialize(&Reply {
        request_id,
        response: Response::failed(
            ErrorKind::InvalidInput,
            "reply too large; use a smaller limit",
        ),
    })
}

/// Runs one request under `deadline`. An expired request is abandoned before
/// it commits anything.
async fn answer(engine: &Engine, request: Request, deadline: Duration) -> Response {
    let operation = request.name();
    debug!("Handling {} with deadline {:?}", operation, deadline);

    match timeout(deadline, dispatch(engine, request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!("{} exceeded its deadline of {:?}", operation, deadline);
            Response::failed(
                ErrorKind::Timeout,
                format!("{} exceeded deadline of {:?}", operation, deadline),
            )
        }
    }
}

#[derive(Debug, Error)]
pub enum RpcError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed message: {0}")]
    Codec(#[from] bincode::Error),
    #[error("no reply within {0:?}")]
    NoReply(Duration),
}

/// Minimal client for the UDP endpoint.
pub struct RpcClient {
    socket: UdpSocket,
    next_request_id: AtomicU64,
}

impl RpcClient {
    pub async fn connect(server: SocketAddr) -> Result<Self, RpcError> {
        let local = if server.is_ipv4() { "0.0.0.0:0" } else { "[::]:0" };
        let socket = UdpSocket::bind(local).await?;
        socket.connect(server).await?;

        Ok(RpcClient {
            socket,
            next_request_id: AtomicU64::new(1),
        })
    }

    /// Sends `request` and waits for its reply. The server enforces
    /// `deadline`; the client gives up shortly after it.
    pub async fn call(&self, request: Request, deadline: Duration) -> Result<Response, RpcError> {
        let request_id = self.next_request_id.fetch_add(1, Ordering::Relaxed);
        let envelope = Envelope {
            request_id,
            deadline_ms: deadline.as_millis().max(1) as u64,
            request,
        };
        self.socket.send(&serialize(&envelope)?).await?;

        let wait = deadline + Duration::from_millis(500);
        timeout(wait, self.receive(request_id))
            .await
            .map_err(|_| RpcError::NoReply(wait))?
    }

    async fn receive(&self, request_id: u64) -> Result<Response, RpcError> {
        let mut buffer = vec![0u8; MAX_DATAGRAM];
        loop {
            let len = self.socket.recv(&mut buffer).await?;
            let reply: Reply = deserialize(&buffer[..len])?;
            if reply.request_id == request_id {
                return Ok(reply.response);
            }
            debug!("Discarding stale reply {}", reply.request_id);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::scoring::LogRanking;
    use shared::{ChatMessage, MessageKind, ResponseBody};

    async fn start_server() -> (Arc<Engine>, SocketAddr) {
        let engine = Arc::new(Engine::new(EngineConfig::default(), Arc::new(LogRanking)));
        let server = Server::bind("127.0.0.1:0", Arc::clone(&engine), Duration::from_secs(1))
            .await
            .unwrap();
        let addr = server.local_addr().unwrap();
        tokio::spawn(async move { server.run().await });
        (engine, addr)
    }

    fn create_room(user_id: &str) -> Request {
        Request::CreateRoom {
            user_id: user_id.to_string(),
            room_name: "udp".to_string(),
            max_players: 2,
        }
    }

    #[tokio::test]
    async fn test_request_reply_over_udp() {
        let (engine, addr) = start_server().await;
        let client = RpcClient::connect(addr).await.unwrap();

        let response = client
            .call(create_room("alice"), Duration::from_secs(1))
            .await
            .unwrap();

        assert!(response.success);
        match response.body {
            ResponseBody::RoomCreated { room_id } => {
                assert!(engine.get_room(&room_id).await.is_ok());
            }
            other => panic!("Expected RoomCreated, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_garbage_is_ignored() {
        let (_engine, addr) = start_server().await;

        let raw = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        raw.send_to(&[0xff, 0x00, 0x13], addr).await.unwrap();

        let client = RpcClient::connect(addr).await.unwrap();
        let response = client
            .call(create_room("bob"), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(response.success);
    }

    #[tokio::test]
    async fn test_expired_deadline_commits_nothing() {
        let engine = Engine::new(EngineConfig::default(), Arc::new(LogRanking));
        let room_id = engine.create_room("alice", "r", 3).await.unwrap();

        let (slot, guard) = engine.store.lock_live(&room_id).await.unwrap();
        let response = answer(
            &engine,
            Request::JoinRoom {
                room_id: room_id.clone(),
                user_id: "bob".to_string(),
            },
            Duration::from_millis(20),
        )
        .await;
        drop(guard);
        drop(slot);

        assert!(!response.success);
        assert_eq!(response.kind, Some(ErrorKind::Timeout));
        let room = engine.get_room(&room_id).await.unwrap();
        assert_eq!(room.members, vec!["alice"]);
    }

    #[test]
    fn test_oversized_reply_becomes_failure() {
        let message = ChatMessage {
            id: "msg_1".to_string(),
            room_id: "room_1".to_string(),
            sender_id: "alice".to_string(),
            sender_name: "alice".to_string(),
            content: "x".repeat(200),
            kind: MessageKind::Text,
            created_at: 0,
        };
        let big = Response::ok("ok", ResponseBody::Messages(vec![message; 400]));

        let data = encode_reply(7, big).unwrap();
        assert!(data.len() <= MAX_DATAGRAM);
        let reply: Reply = deserialize(&data).unwrap();
        assert_eq!(reply.request_id, 7);
        assert!(!reply.response.success);
        assert_eq!(reply.response.kind, Some(ErrorKind::InvalidInput));

        let small = Response::ok("ok", ResponseBody::Empty);
        let reply: Reply = deserialize(&encode_reply(8, small.clone()).unwrap()).unwrap();
        assert_eq!(reply.response, small);
    }

    #[tokio::test]
    async fn test_large_history_over_udp() {
        let (engine, addr) = start_server().await;
        let room_id = engine.create_room("alice", "r", 2).await.unwrap();
        let content = "y".repeat(200);
        for _ in 0..400 {
            engine
                .send_message(&room_id, "alice", &content, MessageKind::Text)
                .await
                .unwrap();
        }

        let client = RpcClient::connect(addr).await.unwrap();
        let request = |limit| Request::GetRoomMessages {
            room_id: room_id.clone(),
            limit,
            since: 0,
        };

        let everything = client
            .call(request(0), Duration::from_secs(1))
            .await
            .unwrap();
        assert!(!everything.success);
        assert_eq!(everything.kind, Some(ErrorKind::InvalidInput));

        let recent = client
            .call(request(10), Duration::from_secs(1))
            .await
            .unwrap();
        match recent.body {
            ResponseBody::Messages(messages) => assert_eq!(messages.len(), 10),
            other => panic!("Expected Messages, got {:?}", other),
        }
    }

    #[tokio::test]
    async fn test_replies_match_requests() {
        let (_engine, addr) = start_server().await;
        let client = RpcClient::connect(addr).await.unwrap();

        for i in 0..5 {
            let response = client
                .call(
                    Request::GetRoom {
                        room_id: format!("room_{}", i),
                    },
                    Duration::from_secs(1),
                )
                .await
                .unwrap();
            assert!(!response.success);
            assert_eq!(response.kind, Some(ErrorKind::NotFound));
        }
    }
}
