//! Common test utilities and helpers

#![allow(dead_code)] // Test utilities may not all be used in every test file

use hexmind::config::TopologyConfig;
use hexmind::topology::Topology;
use hexmind::workers::mock::MockModuleFactory;
use std::sync::Once;
use std::time::Duration;

/// Initialize tracing once per test binary, honoring `RUST_LOG`
pub fn init_tracing() {
    static INIT: Once = Once::new();
    INIT.call_once(|| {
        let _ = tracing_subscriber::fmt()
            .with_env_filter(
                tracing_subscriber::EnvFilter::try_from_default_env()
                    .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("warn")),
            )
            .with_test_writer()
            .try_init();
    });
}

/// Configuration sized for tests: few evaluators, small buffers
pub fn test_config(num_evaluators: u32) -> TopologyConfig {
    TopologyConfig {
        num_evaluators,
        channel_capacity: 32,
        memory_len: 64,
        ..TopologyConfig::default()
    }
}

/// A fully booted topology running the mock modules: memory distributed and
/// every evaluator ready
pub fn booted_topology(num_evaluators: u32) -> Topology {
    init_tracing();
    let mut topology = Topology::create(test_config(num_evaluators), &MockModuleFactory::default())
        .expect("topology creation failed");
    topology.distribute_memory().expect("memory handoff failed");
    topology
        .await_all_ready(Duration::from_secs(5))
        .expect("evaluators never became ready");
    topology
}
