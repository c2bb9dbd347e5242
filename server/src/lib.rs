//! # Snake Room Server Library
//!
//! This library provides the authoritative, in-memory engine for short-lived
//! multiplayer snake matches. Players gather in a room, the room starts a
//! game, and each move command advances exactly one snake on a fixed grid.
//!
//! ## Core Responsibilities
//!
//! ### Session Storage
//! Every room and its game live in one record keyed by the room id. Each
//! record has its own lock, so operations on one room are linearizable while
//! unrelated rooms proceed in parallel.
//!
//! ### Room Lifecycle
//! Membership, host succession, the chat log and the transition into a
//! running game.
//!
//! ### Simulation
//! Per-move state transitions: movement, boundary death, optional snake
//! collisions, food and end-of-game detection. Finished games hand their
//! scores to an external ranking service without waiting on it.
//!
//! ## Module Organization
//!
//! - `store`: per-id locked session table
//! - `room`, `game`: the records and their rules
//! - `lobby`, `simulation`: engine operations over the store
//! - `scoring`: fire-and-forget score reports
//! - `updates`: push feed of game snapshots
//! - `rpc`, `network`: request dispatch and the UDP endpoint
//!
//! ## Usage Example
//!
//! ```rust,no_run
//! use server::config::EngineConfig;
//! use server::engine::Engine;
//! use server::network::Server;
//! use server::scoring::LogRanking;
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     let engine = Arc::new(Engine::new(EngineConfig::default(), Arc::new(LogRanking)));
//!     engine.spawn_reaper();
//!
//!     // Requests without their own deadline get two seconds
//!     let server = Server::bind("127.0.0.1:8080", engine, Duration::from_secs(2)).await?;
//!     server.run().await;
//!     Ok(())
//! }
//! ```

pub mod config;
pub mod engine;
pub mod error;
pub mod game;
pub mod lobby;
pub mod network;
pub mod room;
pub mod rpc;
pub mod scoring;
pub mod simulation;
pub mod store;
pub mod updates;
pub mod util;
