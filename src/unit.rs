//! Unit runtime shell — the bootstrap state machine every unit runs
//!
//! A unit is one OS thread owned by the topology bootstrapper. Its shell
//! walks a fixed sequence:
//!
//! 1. **EnvironmentLoading** — run [`UnitModule::load`]. Envelopes arriving
//!    meanwhile sit in the parent channel's buffer; nothing is dropped.
//! 2. **AwaitingWiring** — accept `Port` assignments, storing each endpoint
//!    keyed by peer role and feeding its receiver into the shell's select
//!    loop so injected items route through the same dispatcher.
//! 3. **AwaitingMemory** — ports and injections are still accepted; item
//!    injection before the handoff is rejected deterministically because no
//!    codec is bound yet.
//! 4. **Active** — on the `memory` handoff the shell builds the role's
//!    queues from the board configuration, activates the module with an
//!    explicit [`WorkerLinks`] context (never ambient globals), and — for
//!    evaluator units — reports `Ready` to the parent. The shell then keeps
//!    multiplexing envelopes until `Shutdown`.
//!
//! One select loop per unit multiplexes the parent endpoint and every wired
//! endpoint; handlers run to completion one envelope at a time, so two
//! messages for the same unit are never processed concurrently.

use crate::board::{Board, BoardConfig};
use crate::channel::{Endpoint, Outlet};
use crate::error::Result;
use crate::memory::SharedMemory;
use crate::protocol::{Envelope, Move, Peer, QueueName, Role};
use crate::queue::QueueSet;
use crossbeam_channel::{Receiver, Select};
use std::collections::HashMap;
use std::thread::JoinHandle;

/// Bootstrap progress of one unit
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ShellState {
    EnvironmentLoading,
    AwaitingWiring,
    AwaitingMemory,
    Active,
}

/// Everything a role module receives at activation.
///
/// Queues and peer outlets are handles; the module may clone what it needs
/// into a detached consumer loop and drop the rest.
pub struct WorkerLinks {
    pub role: Role,
    /// 1-based evaluator number; `None` for search and distributor
    pub worker_num: Option<u32>,
    pub board: Board,
    pub memory: SharedMemory,
    pub queues: QueueSet,
    /// Send-only handles onto every wired endpoint, keyed by peer role
    pub peers: HashMap<Peer, Outlet>,
}

/// What a module hands back from activation
pub enum Activation {
    /// The shell keeps driving `reset`/`search` commands through this driver
    /// (search role).
    Driver(Box<dyn SearchDriver>),
    /// The module runs its own consumer loop (distributor and evaluator
    /// roles); the shell only keeps pumping injections into the queues.
    Detached,
}

/// Command surface of the search role
pub trait SearchDriver: Send {
    fn reset(&mut self, board: Board) -> Result<()>;
    fn search(&mut self) -> Result<Move>;
}

/// A role's application module, loaded and activated by the shell
pub trait UnitModule: Send + 'static {
    /// Environment loading: bring up whatever the role needs before wiring
    /// completes. Failure is unit-fatal.
    fn load(&mut self) -> Result<()>;

    /// Board-dependent setup, called exactly once on memory handoff
    fn activate(&mut self, links: WorkerLinks) -> Result<Activation>;
}

enum Flow {
    Continue,
    Exit,
}

enum Pump {
    /// Envelope from source `idx` (0 = parent, else wired endpoint idx-1)
    Deliver(usize, Envelope),
    Closed(usize),
}

/// The per-unit bootstrap state machine and message loop
pub struct UnitShell {
    role: Role,
    worker_num: Option<u32>,
    state: ShellState,
    parent_tx: Outlet,
    parent_rx: Receiver<Envelope>,
    /// Receiving halves of wired endpoints, in wiring order
    wired: Vec<(Peer, Receiver<Envelope>)>,
    /// Sending halves, keyed by peer, handed to the module at activation
    peers: HashMap<Peer, Outlet>,
    queues: QueueSet,
    driver: Option<Box<dyn SearchDriver>>,
    module: Box<dyn UnitModule>,
}

impl UnitShell {
    pub fn new(
        role: Role,
        worker_num: Option<u32>,
        parent: Endpoint,
        module: Box<dyn UnitModule>,
    ) -> Self {
        let (parent_tx, parent_rx) = parent.split();
        Self {
            role,
            worker_num,
            state: ShellState::EnvironmentLoading,
            parent_tx,
            parent_rx,
            wired: Vec::new(),
            peers: HashMap::new(),
            queues: QueueSet::default(),
            driver: None,
            module,
        }
    }

    /// Run until shutdown or parent disconnection. Consumes the shell.
    pub fn run(mut self) {
        tracing::info!(role = %self.role, worker_num = ?self.worker_num, "unit starting");

        if let Err(e) = self.module.load() {
            tracing::error!(role = %self.role, error = %e, "environment loading failed");
            let _ = self.parent_tx.send(Envelope::SetupFailed {
                role: self.role,
                reason: e.to_string(),
            });
            return;
        }
        self.state = ShellState::AwaitingWiring;

        loop {
            match self.pump() {
                Pump::Deliver(_, env) => {
                    if let Flow::Exit = self.dispatch(env) {
                        break;
                    }
                }
                Pump::Closed(0) => {
                    tracing::info!(role = %self.role, "parent endpoint closed, exiting");
                    break;
                }
                Pump::Closed(idx) => {
                    let (peer, _) = self.wired.remove(idx - 1);
                    tracing::debug!(role = %self.role, %peer, "peer endpoint closed");
                }
            }
        }

        tracing::info!(role = %self.role, worker_num = ?self.worker_num, "unit stopped");
    }

    /// Block for the next envelope from any owned endpoint
    fn pump(&self) -> Pump {
        let mut sel = Select::new();
        sel.recv(&self.parent_rx);
        for (_, rx) in &self.wired {
            sel.recv(rx);
        }
        let op = sel.select();
        let idx = op.index();
        let result = if idx == 0 {
            op.recv(&self.parent_rx)
        } else {
            op.recv(&self.wired[idx - 1].1)
        };
        match result {
            Ok(env) => Pump::Deliver(idx, env),
            Err(_) => Pump::Closed(idx),
        }
    }

    fn dispatch(&mut self, env: Envelope) -> Flow {
        match env {
            Envelope::Port { peer, endpoint } => {
                self.wire_port(peer, endpoint);
                Flow::Continue
            }
            Envelope::Memory {
                memory,
                board,
                worker_num,
            } => self.handle_memory(memory, board, worker_num),
            Envelope::Item { queue, item } => {
                self.handle_item(queue, |queues| queues.inject(queue, &item));
                Flow::Continue
            }
            Envelope::ItemBulk { queue, items } => {
                self.handle_item(queue, |queues| queues.inject_bulk(queue, &items));
                Flow::Continue
            }
            Envelope::Reset { board } => {
                self.handle_reset(board);
                Flow::Continue
            }
            Envelope::Search => {
                self.handle_search();
                Flow::Continue
            }
            Envelope::Shutdown => Flow::Exit,
            Envelope::Unsupported { tag } => {
                tracing::warn!(role = %self.role, %tag, "unrecognized message dropped");
                Flow::Continue
            }
            // Upstream-only envelopes that have no business arriving here
            other @ (Envelope::Move { .. } | Envelope::Ready | Envelope::SetupFailed { .. }) => {
                tracing::warn!(role = %self.role, tag = other.tag(), "misdirected message dropped");
                Flow::Continue
            }
        }
    }

    fn wire_port(&mut self, peer: Peer, endpoint: Endpoint) {
        if self.peers.contains_key(&peer) {
            // Double assignment is a bootstrapper bug; there is no recovery
            // protocol, only the log trail.
            tracing::warn!(role = %self.role, %peer, "duplicate port assignment dropped");
            return;
        }
        let (outlet, rx) = endpoint.split();
        self.peers.insert(peer, outlet);
        self.wired.push((peer, rx));
        if self.state == ShellState::AwaitingWiring {
            self.state = ShellState::AwaitingMemory;
        }
        tracing::debug!(role = %self.role, %peer, "port wired");
    }

    fn handle_memory(
        &mut self,
        memory: SharedMemory,
        board_config: BoardConfig,
        worker_num: Option<u32>,
    ) -> Flow {
        if self.state == ShellState::Active {
            tracing::warn!(role = %self.role, "duplicate memory handoff dropped");
            return Flow::Continue;
        }
        if worker_num.is_some() {
            self.worker_num = worker_num;
        }

        let board = match Board::construct(&board_config) {
            Ok(board) => board,
            Err(e) => return self.fail_setup(format!("board construction failed: {e}")),
        };

        self.queues = QueueSet::for_role(self.role, &board);
        let links = WorkerLinks {
            role: self.role,
            worker_num: self.worker_num,
            board,
            memory,
            queues: self.queues.clone(),
            peers: self.peers.clone(),
        };

        match self.module.activate(links) {
            Ok(Activation::Driver(driver)) => self.driver = Some(driver),
            Ok(Activation::Detached) => {}
            Err(e) => return self.fail_setup(format!("module activation failed: {e}")),
        }

        self.state = ShellState::Active;
        tracing::info!(role = %self.role, worker_num = ?self.worker_num, "unit active");

        // Only evaluators are counted by the readiness barrier; search and
        // distributor stay silent.
        if self.role == Role::Evaluator {
            if let Err(e) = self.parent_tx.send(Envelope::Ready) {
                tracing::error!(role = %self.role, error = %e, "failed to report ready");
            }
        }
        Flow::Continue
    }

    fn handle_item(&mut self, queue: QueueName, inject: impl FnOnce(&QueueSet) -> Result<()>) {
        if self.state != ShellState::Active {
            // Deterministic rejection: codec parameters are not bound until
            // the memory handoff, so decoding now could only corrupt.
            tracing::warn!(
                role = %self.role,
                %queue,
                state = ?self.state,
                "item injection before memory handoff rejected"
            );
            return;
        }
        if let Err(e) = inject(&self.queues) {
            tracing::warn!(role = %self.role, %queue, error = %e, "item injection failed");
        }
    }

    fn handle_reset(&mut self, board_config: BoardConfig) {
        let Some(driver) = self.driver.as_mut() else {
            tracing::warn!(role = %self.role, "reset sent to a unit without a search driver");
            return;
        };
        match Board::construct(&board_config) {
            Ok(board) => {
                if let Err(e) = driver.reset(board) {
                    tracing::error!(role = %self.role, error = %e, "reset failed");
                }
            }
            Err(e) => tracing::error!(role = %self.role, error = %e, "reset carried a bad board"),
        }
    }

    fn handle_search(&mut self) {
        let Some(driver) = self.driver.as_mut() else {
            tracing::warn!(role = %self.role, "search sent to a unit without a search driver");
            return;
        };
        match driver.search() {
            Ok(mv) => {
                if let Err(e) = self.parent_tx.send(Envelope::Move { mv }) {
                    tracing::error!(role = %self.role, error = %e, "failed to report move");
                }
            }
            Err(e) => tracing::error!(role = %self.role, error = %e, "search failed"),
        }
    }

    fn fail_setup(&mut self, reason: String) -> Flow {
        tracing::error!(role = %self.role, %reason, "unit setup failed");
        let _ = self.parent_tx.send(Envelope::SetupFailed {
            role: self.role,
            reason,
        });
        Flow::Exit
    }
}

/// Host-side handle to one spawned unit
pub struct UnitHandle {
    pub role: Role,
    pub worker_num: Option<u32>,
    tx: Outlet,
    rx: Receiver<Envelope>,
    join: Option<JoinHandle<()>>,
}

impl UnitHandle {
    /// Send an envelope to the unit
    pub fn send(&self, env: Envelope) -> Result<()> {
        self.tx.send(env)
    }

    /// Receiver carrying envelopes the unit posts back to the host
    pub fn receiver(&self) -> &Receiver<Envelope> {
        &self.rx
    }

    /// Wait for the unit thread to finish
    pub fn join(&mut self) {
        if let Some(handle) = self.join.take() {
            if handle.join().is_err() {
                tracing::error!(role = %self.role, "unit thread panicked");
            }
        }
    }
}

impl Drop for UnitHandle {
    fn drop(&mut self) {
        // Best effort: wake the unit so it can observe the closed parent.
        let _ = self.tx.send(Envelope::Shutdown);
        self.join();
    }
}

/// Spawn one unit thread running the shell
pub fn spawn_unit(
    role: Role,
    worker_num: Option<u32>,
    module: Box<dyn UnitModule>,
    channel_capacity: usize,
) -> Result<UnitHandle> {
    let (host_end, unit_end) = crate::channel::pair(channel_capacity);
    let (tx, rx) = host_end.split();

    let thread_name = match worker_num {
        Some(n) => format!("{role}-unit-{n}"),
        None => format!("{role}-unit"),
    };
    let join = std::thread::Builder::new()
        .name(thread_name)
        .spawn(move || UnitShell::new(role, worker_num, unit_end, module).run())?;

    Ok(UnitHandle {
        role,
        worker_num,
        tx,
        rx,
        join: Some(join),
    })
}
