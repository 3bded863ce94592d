//! # Hexmind: multi-unit search pipeline coordination
//!
//! A coordination layer for a parallel game-tree search over a hexagonal
//! board: one search unit, one distributor unit, and N evaluator units, each
//! running as its own thread, talking over typed point-to-point channels.
//!
//! ## Architecture
//!
//! - **Topology**: the bootstrapper spawns the units, wires the full channel
//!   mesh (exactly `2N + 1` channels), distributes the shared memory buffer,
//!   and gates commands behind the readiness barrier
//! - **Unit shell**: a per-unit state machine that accepts port assignments
//!   and the memory handoff, then multiplexes envelopes through one select
//!   loop per unit
//! - **Protocol**: a closed [`protocol::Envelope`] enum; dispatch is an
//!   exhaustive match, unknown traffic is logged and dropped
//! - **Queues**: codec-bound inboxes fed by local producers and by channel
//!   injection, order-preserving across both paths
//! - **Communication**: crossbeam channels for thread-safe envelope transfer
//!
//! ## Example
//!
//! ```ignore
//! use hexmind::{config::TopologyConfig, topology::Topology, workers::mock::MockModuleFactory};
//! use std::time::Duration;
//!
//! fn main() -> anyhow::Result<()> {
//!     let mut topology = Topology::create(TopologyConfig::default(), &MockModuleFactory::default())?;
//!     topology.distribute_memory()?;
//!     topology.await_all_ready(Duration::from_secs(5))?;
//!
//!     let mv = topology.search(Duration::from_secs(5))?;
//!     println!("best move: {mv}");
//!
//!     topology.shutdown();
//!     Ok(())
//! }
//! ```

pub mod barrier;
pub mod board;
pub mod channel;
pub mod config;
pub mod error;
pub mod memory;
pub mod protocol;
pub mod queue;
pub mod topology;
pub mod unit;
pub mod workers;

pub use board::{Board, BoardConfig};
pub use config::TopologyConfig;
pub use error::{HexmindError, Result};
pub use protocol::{Envelope, Move, Peer, QueueName, Role};
pub use topology::{Topology, UnitModuleFactory};
pub use unit::{Activation, SearchDriver, UnitModule, WorkerLinks};
