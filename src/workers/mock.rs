//! Mock role modules for tests and the demo binary
//!
//! The mocks exercise the real coordination machinery end to end — port
//! wiring, queue injection, shared memory, the readiness barrier — while
//! replacing the engine with trivial logic:
//!
//! * the search driver emits one expansion request per `search` command and
//!   picks the best already-scored candidate, falling back to the board
//!   center when none has arrived;
//! * the distributor fans expansion requests out to the evaluators
//!   round-robin;
//! * the evaluators score a position by its stone count and report it back
//!   to the search unit as a selector item.
//!
//! The detached consumer loops hold only queue consumers and peer outlets,
//! so they end when the owning shell exits and drops its queues.

use crate::board::Board;
use crate::channel::Outlet;
use crate::error::{HexmindError, Result};
use crate::protocol::{Envelope, Move, Peer, QueueName, Role};
use crate::queue::{
    Codec, DistributorCodec, DistributorItem, EvalCodec, EvalItem, QueueConsumer, SelectorCodec,
    SelectorItem,
};
use crate::unit::{Activation, SearchDriver, UnitModule, WorkerLinks};
use std::thread;
use std::time::Duration;

/// Builds a mock module per role, with optional fault injection
#[derive(Debug, Clone, Copy, Default)]
pub struct MockModuleFactory {
    /// Units of this role fail environment loading
    pub fail_role: Option<Role>,
    /// Units of this role stall in environment loading and never bootstrap
    pub stall_role: Option<Role>,
}

impl MockModuleFactory {
    fn behavior(&self, role: Role) -> MockBehavior {
        MockBehavior {
            fail_load: self.fail_role == Some(role),
            stall_load: self.stall_role == Some(role),
        }
    }
}

impl crate::topology::UnitModuleFactory for MockModuleFactory {
    fn module(&self, role: Role, _worker_num: Option<u32>) -> Box<dyn UnitModule> {
        let behavior = self.behavior(role);
        match role {
            Role::Search => Box::new(MockSearchModule { behavior }),
            Role::Distributor => Box::new(MockDistributorModule { behavior }),
            Role::Evaluator => Box::new(MockEvalModule { behavior }),
        }
    }
}

#[derive(Debug, Clone, Copy)]
struct MockBehavior {
    fail_load: bool,
    stall_load: bool,
}

impl MockBehavior {
    fn load(&self, role: Role) -> Result<()> {
        if self.fail_load {
            return Err(HexmindError::Worker(format!(
                "mock {role} environment refused to load"
            )));
        }
        if self.stall_load {
            // Long enough that short barrier timeouts fire first, short
            // enough that shutdown still joins the thread promptly.
            thread::sleep(Duration::from_secs(2));
        }
        Ok(())
    }
}

/// Deterministic mock score: stone density of the position
fn score_board(board: &[u8]) -> f64 {
    let stones: u32 = board.iter().map(|b| b.count_ones()).sum();
    f64::from(stones) / (board.len().max(1) * 8) as f64
}

// ── Search ──

struct MockSearchModule {
    behavior: MockBehavior,
}

impl UnitModule for MockSearchModule {
    fn load(&mut self) -> Result<()> {
        self.behavior.load(Role::Search)
    }

    fn activate(&mut self, links: WorkerLinks) -> Result<Activation> {
        let selector = links
            .queues
            .selector
            .as_ref()
            .ok_or(HexmindError::QueueNotReady(QueueName::Selector))?
            .consumer();
        Ok(Activation::Driver(Box::new(MockSearchDriver {
            board: links.board,
            run_id: 0,
            selector,
            distributor: links.peers.get(&Peer::Distributor).cloned(),
        })))
    }
}

struct MockSearchDriver {
    board: Board,
    run_id: u32,
    selector: QueueConsumer<SelectorItem>,
    distributor: Option<Outlet>,
}

impl SearchDriver for MockSearchDriver {
    fn reset(&mut self, board: Board) -> Result<()> {
        self.board = board;
        self.run_id += 1;
        Ok(())
    }

    fn search(&mut self) -> Result<Move> {
        self.run_id += 1;
        let codec = DistributorCodec {
            board_len: self.board.byte_length(),
        };

        // Kick off one expansion; its results feed a later search command.
        if let Some(out) = &self.distributor {
            let request = DistributorItem {
                run_id: self.run_id,
                node_name: self.board.center_notation(),
                forcing_level: -1,
                board: self.board.as_bytes().to_vec(),
            };
            out.send(Envelope::Item {
                queue: QueueName::Distributor,
                item: codec.encode(&request),
            })?;
        }

        // Pick the best candidate delivered so far. The driver never blocks
        // on its peers; the shell must stay responsive.
        let mut best: Option<SelectorItem> = None;
        while let Some(item) = self.selector.try_recv() {
            if best.as_ref().map_or(true, |b| item.score > b.score) {
                best = Some(item);
            }
        }
        Ok(match best {
            Some(item) => Move::new(leaf_cell(&item.node_name), item.score),
            None => Move::new(self.board.center_notation(), 0.0),
        })
    }
}

/// Last segment of a dotted tree path, e.g. `"g7.h8"` → `"h8"`
fn leaf_cell(node_name: &str) -> &str {
    node_name.rsplit('.').next().unwrap_or(node_name)
}

// ── Distributor ──

struct MockDistributorModule {
    behavior: MockBehavior,
}

impl UnitModule for MockDistributorModule {
    fn load(&mut self) -> Result<()> {
        self.behavior.load(Role::Distributor)
    }

    fn activate(&mut self, links: WorkerLinks) -> Result<Activation> {
        let consumer = links
            .queues
            .distributor
            .as_ref()
            .ok_or(HexmindError::QueueNotReady(QueueName::Distributor))?
            .consumer();
        let codec = EvalCodec {
            board_len: links.board.byte_length(),
        };

        let mut outlets: Vec<(u32, Outlet)> = links
            .peers
            .iter()
            .filter_map(|(peer, out)| match peer {
                Peer::Evaluator(n) => Some((*n, out.clone())),
                _ => None,
            })
            .collect();
        outlets.sort_by_key(|(n, _)| *n);

        thread::spawn(move || {
            let mut next = 0usize;
            while let Ok(item) = consumer.recv() {
                let Some((num, out)) = outlets.get(next % outlets.len().max(1)) else {
                    tracing::warn!("expansion request with no evaluators wired, dropped");
                    continue;
                };
                next += 1;
                let forward = EvalItem {
                    run_id: item.run_id,
                    node_name: item.node_name,
                    board: item.board,
                };
                tracing::debug!(worker_num = num, node = %forward.node_name, "fanning out");
                if out
                    .send(Envelope::Item {
                        queue: QueueName::Eval,
                        item: codec.encode(&forward),
                    })
                    .is_err()
                {
                    break;
                }
            }
            tracing::debug!("distributor fan-out loop ended");
        });
        Ok(Activation::Detached)
    }
}

// ── Evaluator ──

struct MockEvalModule {
    behavior: MockBehavior,
}

impl UnitModule for MockEvalModule {
    fn load(&mut self) -> Result<()> {
        self.behavior.load(Role::Evaluator)
    }

    fn activate(&mut self, links: WorkerLinks) -> Result<Activation> {
        let worker_num = links.worker_num.unwrap_or(0);
        let consumer = links
            .queues
            .eval
            .as_ref()
            .ok_or(HexmindError::QueueNotReady(QueueName::Eval))?
            .consumer();
        let search = links.peers.get(&Peer::Search).cloned();
        let codec = SelectorCodec {
            board_len: links.board.byte_length(),
        };

        // Leave a bootstrap marker so tests can see the handoff landed.
        if (worker_num as usize) < links.memory.len() {
            links.memory.write(worker_num as usize, 1)?;
        }

        thread::spawn(move || {
            while let Ok(item) = consumer.recv() {
                let Some(out) = &search else {
                    tracing::warn!(worker_num, "eval item with no search peer wired, dropped");
                    continue;
                };
                let reply = SelectorItem {
                    run_id: item.run_id,
                    worker_num,
                    node_name: item.node_name,
                    score: score_board(&item.board),
                    board: item.board,
                };
                if out
                    .send(Envelope::Item {
                        queue: QueueName::Selector,
                        item: codec.encode(&reply),
                    })
                    .is_err()
                {
                    break;
                }
            }
            tracing::debug!(worker_num, "evaluator scoring loop ended");
        });
        Ok(Activation::Detached)
    }
}
