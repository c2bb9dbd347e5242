//! Best-effort delivery of final scores to the external ranking service
//!
//! Reports are queued on a channel and drained by a detached task, which
//! gives every report its own task bounded by a fixed timeout. Nothing is
//! retried: a failed or slow report is logged and dropped, and the game
//! that produced it never waits on it.

use bincode::{deserialize, serialize};
use log::{debug, error, info, warn};
use shared::{UpdateScoreRequest, UpdateScoreResponse};
use std::future::Future;
use std::net::SocketAddr;
use std::pin::Pin;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;
use tokio::net::UdpSocket;
use tokio::sync::mpsc;
use tokio::time::timeout;

#[derive(Debug, Error)]
pub enum RankingError {
    #[error("network error: {0}")]
    Io(#[from] std::io::Error),
    #[error("malformed ranking message: {0}")]
    Codec(#[from] bincode::Error),
}

pub type RankingFuture<'a> =
    Pin<Box<dyn Future<Output = Result<UpdateScoreResponse, RankingError>> + Send + 'a>>;

/// Client side of the external ranking service.
pub trait RankingService: Send + Sync + 'static {
    fn update_score(&self, request: UpdateScoreRequest) -> RankingFuture<'_>;
}

/// Stand-in used when no ranking service is configured.
pub struct LogRanking;

impl RankingService for LogRanking {
    fn update_score(&self, request: UpdateScoreRequest) -> RankingFuture<'_> {
        Box::pin(async move {
            info!(
                "Final score for {}: {} (won: {})",
                request.user_id, request.score, request.game_won
            );
            Ok::<_, RankingError>(UpdateScoreResponse {
                success: true,
                message: "logged".to_string(),
                rank: None,
            })
        })
    }
}

/// Sends each report as one bincode datagram and waits for the reply.
pub struct UdpRanking {
    addr: SocketAddr,
}

impl UdpRanking {
    pub fn new(addr: SocketAddr) -> Self {
        Self { addr }
    }
}

impl RankingService for UdpRanking {
    fn update_score(&self, request: UpdateScoreRequest) -> RankingFuture<'_> {
        Box::pin(send_update(self.addr, request))
    }
}

async fn send_update(
    addr: SocketAddr,
    request: UpdateScoreRequest,
) -> Result<UpdateScoreResponse, RankingError> {
    // A socket per call keeps concurrent replies apart.
    let socket = UdpSocket::bind("0.0.0.0:0").await?;
    socket.connect(addr).await?;
    socket.send(&serialize(&request)?).await?;

    let mut buffer = [0u8; 1024];
    let len = socket.recv(&mut buffer).await?;
    Ok(deserialize(&buffer[..len])?)
}

/// Handle for queueing score reports. Cheap to clone.
#[derive(Clone)]
pub struct ScoreReporter {
    queue: mpsc::UnboundedSender<UpdateScoreRequest>,
}

impl ScoreReporter {
    /// Starts the drain task. Must be called inside a tokio runtime.
    pub fn spawn(service: Arc<dyn RankingService>, limit: Duration) -> Self {
        let (queue, mut pending) = mpsc::unbounded_channel::<UpdateScoreRequest>();

        tokio::spawn(async move {
            while let Some(request) = pending.recv().await {
                let service = Arc::clone(&service);
                tokio::spawn(deliver(service, request, limit));
            }
            debug!("Score reporter stopped");
        });

        Self { queue }
    }

    /// Queues a report and returns immediately.
    pub fn report(&self, request: UpdateScoreRequest) {
        let user_id = request.user_id.clone();
        if self.queue.send(request).is_err() {
            error!("Score reporter is gone, dropping score for {}", user_id);
        }
    }
}

async fn deliver(service: Arc<dyn RankingService>, request: UpdateScoreRequest, limit: Duration) {
    let user_id = request.user_id.clone();
    match timeout(limit, service.update_score(request)).await {
        Ok(Ok(response)) if response.success => {
            debug!("Score for {} recorded (rank {:?})", user_id, response.rank);
        }
        Ok(Ok(response)) => {
            warn!(
                "Ranking service rejected score for {}: {}",
                user_id, response.message
            );
        }
        Ok(Err(e)) => warn!("Failed to update score for player {}: {}", user_id, e),
        Err(_) => warn!(
            "Timed out updating score for player {} after {:?}",
            user_id, limit
        ),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct Recording {
        seen: Arc<Mutex<Vec<UpdateScoreRequest>>>,
    }

    impl RankingService for Recording {
        fn update_score(&self, request: UpdateScoreRequest) -> RankingFuture<'_> {
            Box::pin(async move {
                self.seen.lock().unwrap().push(request);
                Ok::<_, RankingError>(UpdateScoreResponse {
                    success: true,
                    message: String::new(),
                    rank: Some(1),
                })
            })
        }
    }

    struct Stalled;

    impl RankingService for Stalled {
        fn update_score(&self, _request: UpdateScoreRequest) -> RankingFuture<'_> {
            Box::pin(std::future::pending::<Result<UpdateScoreResponse, RankingError>>())
        }
    }

    fn request(user_id: &str) -> UpdateScoreRequest {
        UpdateScoreRequest {
            user_id: user_id.to_string(),
            score: 10,
            game_won: false,
        }
    }

    #[tokio::test]
    async fn test_reports_are_delivered() {
        let seen = Arc::new(Mutex::new(Vec::new()));
        let reporter = ScoreReporter::spawn(
            Arc::new(Recording {
                seen: Arc::clone(&seen),
            }),
            Duration::from_secs(1),
        );

        reporter.report(request("alice"));
        reporter.report(request("bob"));

        for _ in 0..100 {
            if seen.lock().unwrap().len() == 2 {
                break;
            }
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
        let mut users: Vec<String> = seen.lock().unwrap().iter().map(|r| r.user_id.clone()).collect();
        users.sort();
        assert_eq!(users, vec!["alice", "bob"]);
    }

    #[tokio::test]
    async fn test_report_does_not_block_on_stalled_service() {
        let reporter = ScoreReporter::spawn(Arc::new(Stalled), Duration::from_millis(20));

        let started = std::time::Instant::now();
        for i in 0..10 {
            reporter.report(request(&format!("p{}", i)));
        }
        assert!(started.elapsed() < Duration::from_millis(20));

        // Let the timeouts fire; nothing should panic.
        tokio::time::sleep(Duration::from_millis(50)).await;
    }

    #[tokio::test]
    async fn test_timeout_is_enforced() {
        let started = std::time::Instant::now();
        deliver(Arc::new(Stalled), request("alice"), Duration::from_millis(20)).await;
        assert!(started.elapsed() < Duration::from_secs(1));
    }

    #[tokio::test]
    async fn test_udp_ranking_roundtrip() {
        let ranking = UdpSocket::bind("127.0.0.1:0").await.unwrap();
        let addr = ranking.local_addr().unwrap();

        tokio::spawn(async move {
            let mut buffer = [0u8; 1024];
            let (len, from) = ranking.recv_from(&mut buffer).await.unwrap();
            let request: UpdateScoreRequest = deserialize(&buffer[..len]).unwrap();
            let response = UpdateScoreResponse {
                success: true,
                message: format!("stored {}", request.user_id),
                rank: Some(3),
            };
            ranking
                .send_to(&serialize(&response).unwrap(), from)
                .await
                .unwrap();
        });

        let response = UdpRanking::new(addr)
            .update_score(request("alice"))
            .await
            .unwrap();
        assert!(response.success);
        assert_eq!(response.rank, Some(3));
        assert_eq!(response.message, "stored alice");
    }
}
