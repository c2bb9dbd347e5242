use clap::Parser;
use log::{error, info};
use server::config::EngineConfig;
use server::engine::Engine;
use server::network::Server;
use server::scoring::{LogRanking, RankingService, UdpRanking};
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

#[derive(Parser, Debug)]
#[clap(author, version, about)]
struct Args {
    /// Server IP address to bind to
    #[clap(short = 'H', long, default_value = "127.0.0.1")]
    host: String,
    /// Server port to listen on
    #[clap(short, long, default_value = "8080")]
    port: u16,
    /// Ranking service address; scores are only logged when absent
    #[clap(long)]
    ranking_addr: Option<SocketAddr>,
    /// Deadline for requests that do not carry their own
    #[clap(long, default_value = "2000")]
    request_timeout_ms: u64,
    /// Kill snakes that run into a snake body
    #[clap(long)]
    collisions: bool,
    /// How long finished games stay observable
    #[clap(long, default_value = "300")]
    finished_ttl_secs: u64,
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let args = Args::parse();

    let config = EngineConfig {
        collisions: args.collisions,
        finished_session_ttl: Duration::from_secs(args.finished_ttl_secs),
        ..EngineConfig::default()
    };
    let ranking: Arc<dyn RankingService> = match args.ranking_addr {
        Some(addr) => {
            info!("Reporting scores to {}", addr);
            Arc::new(UdpRanking::new(addr))
        }
        None => Arc::new(LogRanking),
    };

    let engine = Arc::new(Engine::new(config, ranking));
    let reaper = engine.spawn_reaper();

    let address = format!("{}:{}", args.host, args.port);
    let server = Server::bind(
        &address,
        Arc::clone(&engine),
        Duration::from_millis(args.request_timeout_ms),
    )
    .await?;

    tokio::select! {
        _ = server.run() => {
            error!("Server loop stopped unexpectedly");
        }
        _ = tokio::signal::ctrl_c() => {
            info!("Received Ctrl+C, shutting down gracefully...");
        }
    }

    reaper.abort();
    info!("{} rooms active at shutdown", engine.room_count());
    Ok(())
}
