//! Hexmind demo binary
//!
//! Boots the full topology with the mock role modules, runs one reset/search
//! cycle, and prints the resulting move. An optional argument names a TOML
//! configuration file.

use hexmind::{config::TopologyConfig, topology::Topology, workers::mock::MockModuleFactory};
use std::time::Duration;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

fn main() -> anyhow::Result<()> {
    // Initialize logging
    tracing_subscriber::registry()
        .with(
            EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| EnvFilter::new("info,hexmind=debug")),
        )
        .with(tracing_subscriber::fmt::layer())
        .init();

    let config = match std::env::args().nth(1) {
        Some(path) => {
            tracing::info!(%path, "loading configuration");
            TopologyConfig::load(path)?
        }
        None => TopologyConfig::default(),
    };

    tracing::info!(
        num_evaluators = config.num_evaluators,
        board_size = config.board.size,
        "starting hexmind"
    );

    let mut topology = Topology::create(config.clone(), &MockModuleFactory::default())?;
    topology.distribute_memory()?;
    topology.await_all_ready(Duration::from_secs(10))?;

    topology.reset(config.board.clone())?;
    // First search seeds the pipeline, second collects scored candidates.
    topology.search(Duration::from_secs(10))?;
    std::thread::sleep(Duration::from_millis(100));
    let mv = topology.search(Duration::from_secs(10))?;

    println!("best move: {mv}");

    topology.shutdown();
    Ok(())
}
