//! Topology bootstrapper — spawns the units and wires the channel mesh
//!
//! The bootstrapper owns the fixed three-role topology: one search unit, one
//! distributor unit, and N evaluator units. For N evaluators it creates
//! exactly `2N + 1` channels:
//!
//! * search ↔ distributor (expansion requests and control)
//! * search ↔ evaluator_i (scored candidates flowing back), N channels
//! * distributor ↔ evaluator_i (fan-out of positions), N channels
//!
//! Bootstrap is strictly ordered per unit: every port assignment is sent
//! before the memory handoff, and commands are withheld until the readiness
//! barrier resolves. Units never discover each other; all wiring decisions
//! live here.

use crate::barrier::ReadyGate;
use crate::board::BoardConfig;
use crate::channel;
use crate::config::TopologyConfig;
use crate::error::{HexmindError, Result};
use crate::memory::SharedMemory;
use crate::protocol::{Envelope, Move, Peer, Role};
use crate::unit::{spawn_unit, UnitHandle, UnitModule};
use crossbeam_channel::Select;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Supplies the application module for each spawned unit
pub trait UnitModuleFactory {
    fn module(&self, role: Role, worker_num: Option<u32>) -> Box<dyn UnitModule>;
}

/// The running unit mesh and its lifecycle surface
pub struct Topology {
    config: TopologyConfig,
    search: UnitHandle,
    distributor: UnitHandle,
    evaluators: Vec<UnitHandle>,
    gate: Arc<ReadyGate>,
    memory: Option<SharedMemory>,
    channel_count: usize,
}

impl Topology {
    /// Spawn all units and wire the full channel mesh.
    ///
    /// After this returns every unit holds its ports, but no memory has been
    /// handed off and no unit is active yet.
    pub fn create(config: TopologyConfig, factory: &dyn UnitModuleFactory) -> Result<Self> {
        config.validate()?;
        let cap = config.channel_capacity;
        let n = config.num_evaluators;
        tracing::info!(num_evaluators = n, "creating topology");

        let search = spawn_unit(Role::Search, None, factory.module(Role::Search, None), cap)?;
        let distributor = spawn_unit(
            Role::Distributor,
            None,
            factory.module(Role::Distributor, None),
            cap,
        )?;
        let mut evaluators = Vec::with_capacity(n as usize);
        for i in 1..=n {
            evaluators.push(spawn_unit(
                Role::Evaluator,
                Some(i),
                factory.module(Role::Evaluator, Some(i)),
                cap,
            )?);
        }

        let mut channel_count = 0;

        let (s_end, d_end) = channel::pair(cap);
        search.send(Envelope::Port {
            peer: Peer::Distributor,
            endpoint: s_end,
        })?;
        distributor.send(Envelope::Port {
            peer: Peer::Search,
            endpoint: d_end,
        })?;
        channel_count += 1;

        for (idx, eval) in evaluators.iter().enumerate() {
            let num = idx as u32 + 1;

            let (s_end, e_end) = channel::pair(cap);
            search.send(Envelope::Port {
                peer: Peer::Evaluator(num),
                endpoint: s_end,
            })?;
            eval.send(Envelope::Port {
                peer: Peer::Search,
                endpoint: e_end,
            })?;
            channel_count += 1;

            let (d_end, e_end) = channel::pair(cap);
            distributor.send(Envelope::Port {
                peer: Peer::Evaluator(num),
                endpoint: d_end,
            })?;
            eval.send(Envelope::Port {
                peer: Peer::Distributor,
                endpoint: e_end,
            })?;
            channel_count += 1;
        }

        tracing::debug!(channel_count, "channel mesh wired");

        Ok(Self {
            gate: Arc::new(ReadyGate::new(n as usize)),
            config,
            search,
            distributor,
            evaluators,
            memory: None,
            channel_count,
        })
    }

    /// Allocate the shared memory buffer and hand it to every unit together
    /// with the board configuration. Evaluators additionally receive their
    /// worker number.
    pub fn distribute_memory(&mut self) -> Result<()> {
        if self.memory.is_some() {
            return Err(HexmindError::Protocol(
                "memory already distributed".into(),
            ));
        }
        let memory = SharedMemory::new(self.config.memory_len);
        let board = self.config.board.clone();

        self.search.send(Envelope::Memory {
            memory: memory.clone(),
            board: board.clone(),
            worker_num: None,
        })?;
        self.distributor.send(Envelope::Memory {
            memory: memory.clone(),
            board: board.clone(),
            worker_num: None,
        })?;
        for (idx, eval) in self.evaluators.iter().enumerate() {
            eval.send(Envelope::Memory {
                memory: memory.clone(),
                board: board.clone(),
                worker_num: Some(idx as u32 + 1),
            })?;
        }

        self.memory = Some(memory);
        tracing::info!(len = self.config.memory_len, "memory distributed");
        Ok(())
    }

    /// Block until every evaluator has reported ready, or fail on the first
    /// setup error, unit disconnection, or timeout.
    ///
    /// The barrier resolves when the ready signals arrive; there is no
    /// polling interval.
    pub fn await_all_ready(&self, timeout: Duration) -> Result<()> {
        let deadline = Instant::now() + timeout;
        while !self.gate.is_complete() {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or_else(|| {
                    HexmindError::Timeout(format!(
                        "{}/{} evaluators ready",
                        self.gate.ready_count(),
                        self.evaluators.len()
                    ))
                })?;
            let (unit, env) = self.recv_any(remaining)?;
            self.note_startup_envelope(unit, env)?;
        }
        tracing::info!(evaluators = self.evaluators.len(), "all evaluators ready");
        Ok(())
    }

    /// Re-initialize the session with a new board position
    pub fn reset(&mut self, board: BoardConfig) -> Result<()> {
        self.config.board = board.clone();
        self.search.send(Envelope::Reset { board })
    }

    /// Run one search and wait for the resulting move
    pub fn search(&self, timeout: Duration) -> Result<Move> {
        self.search.send(Envelope::Search)?;
        let deadline = Instant::now() + timeout;
        loop {
            let remaining = deadline
                .checked_duration_since(Instant::now())
                .ok_or_else(|| HexmindError::Timeout("no move from search unit".into()))?;
            match self.search.receiver().recv_timeout(remaining) {
                Ok(Envelope::Move { mv }) => {
                    tracing::info!(%mv, "search finished");
                    return Ok(mv);
                }
                Ok(Envelope::SetupFailed { role, reason }) => {
                    return Err(HexmindError::setup(role, reason))
                }
                Ok(other) => {
                    tracing::warn!(tag = other.tag(), "unexpected envelope while awaiting move");
                }
                Err(_) => {
                    return Err(HexmindError::Channel(
                        "search unit gone while awaiting move".into(),
                    ))
                }
            }
        }
    }

    /// Tear everything down and join the unit threads
    pub fn shutdown(mut self) {
        tracing::info!("shutting down topology");
        for unit in self.units() {
            if unit.send(Envelope::Shutdown).is_err() {
                tracing::debug!(role = %unit.role, "unit already gone at shutdown");
            }
        }
        self.search.join();
        self.distributor.join();
        for eval in &mut self.evaluators {
            eval.join();
        }
    }

    /// All units: search, distributor, then evaluators in worker order
    fn units(&self) -> impl Iterator<Item = &UnitHandle> {
        std::iter::once(&self.search)
            .chain(std::iter::once(&self.distributor))
            .chain(self.evaluators.iter())
    }

    /// Block for the next envelope from any unit
    fn recv_any(&self, timeout: Duration) -> Result<(&UnitHandle, Envelope)> {
        let handles: Vec<&UnitHandle> = self.units().collect();
        let mut sel = Select::new();
        for unit in &handles {
            sel.recv(unit.receiver());
        }
        let op = sel.select_timeout(timeout).map_err(|_| {
            HexmindError::Timeout(format!(
                "{}/{} evaluators ready",
                self.gate.ready_count(),
                self.evaluators.len()
            ))
        })?;
        let idx = op.index();
        let unit = handles[idx];
        match op.recv(unit.receiver()) {
            Ok(env) => Ok((unit, env)),
            Err(_) => Err(HexmindError::Channel(format!(
                "{} unit disconnected during startup",
                unit.role
            ))),
        }
    }

    fn note_startup_envelope(&self, unit: &UnitHandle, env: Envelope) -> Result<()> {
        match env {
            Envelope::Ready => match (unit.role, unit.worker_num) {
                (Role::Evaluator, Some(num)) => {
                    if self.gate.mark_ready(num) {
                        tracing::debug!(worker_num = num, "evaluator ready");
                    } else {
                        tracing::warn!(worker_num = num, "duplicate ready signal ignored");
                    }
                    Ok(())
                }
                _ => {
                    tracing::warn!(role = %unit.role, "ready from a non-evaluator unit ignored");
                    Ok(())
                }
            },
            Envelope::SetupFailed { role, reason } => Err(HexmindError::setup(role, reason)),
            other => {
                tracing::warn!(role = %unit.role, tag = other.tag(), "unexpected startup envelope");
                Ok(())
            }
        }
    }

    /// Number of distinct evaluators that have reported ready
    pub fn ready_count(&self) -> usize {
        self.gate.ready_count()
    }

    /// Units in the mesh, including search and distributor
    pub fn unit_count(&self) -> usize {
        self.evaluators.len() + 2
    }

    /// Channels created by the wiring pass
    pub fn channel_count(&self) -> usize {
        self.channel_count
    }

    /// The shared buffer, once distributed
    pub fn memory(&self) -> Option<&SharedMemory> {
        self.memory.as_ref()
    }

    pub fn config(&self) -> &TopologyConfig {
        &self.config
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::workers::mock::MockModuleFactory;

    fn config(n: u32) -> TopologyConfig {
        TopologyConfig {
            num_evaluators: n,
            ..TopologyConfig::default()
        }
    }

    #[test]
    fn test_mesh_has_2n_plus_1_channels() {
        for n in [0u32, 1, 2, 4] {
            let topo = Topology::create(config(n), &MockModuleFactory::default()).unwrap();
            assert_eq!(topo.channel_count(), 2 * n as usize + 1);
            assert_eq!(topo.unit_count(), n as usize + 2);
            topo.shutdown();
        }
    }

    #[test]
    fn test_memory_distributed_once() {
        let mut topo = Topology::create(config(1), &MockModuleFactory::default()).unwrap();
        topo.distribute_memory().unwrap();
        assert!(matches!(
            topo.distribute_memory().unwrap_err(),
            HexmindError::Protocol(_)
        ));
        topo.shutdown();
    }

    #[test]
    fn test_zero_evaluators_ready_immediately() {
        let mut topo = Topology::create(config(0), &MockModuleFactory::default()).unwrap();
        topo.distribute_memory().unwrap();
        topo.await_all_ready(Duration::from_secs(1)).unwrap();
        topo.shutdown();
    }

    #[test]
    fn test_await_without_memory_times_out() {
        let topo = Topology::create(config(2), &MockModuleFactory::default()).unwrap();
        // No memory handoff, so no evaluator can ever become ready.
        let err = topo.await_all_ready(Duration::from_millis(100)).unwrap_err();
        assert!(matches!(err, HexmindError::Timeout(_)));
        assert_eq!(topo.ready_count(), 0);
        topo.shutdown();
    }
}
