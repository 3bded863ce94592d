//! Queue injection protocol tests against live units
//!
//! These tests wire single units by hand — the test plays the part of the
//! bootstrapper and the peer units — so the observable ordering and
//! rejection behavior of the injection protocol can be checked
//! deterministically on real shells.

mod common;

use common::init_tracing;
use hexmind::board::{Board, BoardConfig};
use hexmind::channel::{self, Endpoint};
use hexmind::memory::SharedMemory;
use hexmind::protocol::{Envelope, Peer, QueueName, Role};
use hexmind::queue::{
    Codec, DistributorCodec, DistributorItem, EvalCodec, EvalItem, SelectorCodec, SelectorItem,
};
use hexmind::topology::UnitModuleFactory;
use hexmind::unit::{spawn_unit, UnitHandle};
use hexmind::workers::mock::MockModuleFactory;
use proptest::prelude::*;
use std::time::Duration;

fn test_board() -> Board {
    Board::construct(&BoardConfig::default()).unwrap()
}

fn memory_envelope(worker_num: Option<u32>) -> Envelope {
    Envelope::Memory {
        memory: SharedMemory::new(64),
        board: BoardConfig::default(),
        worker_num,
    }
}

/// Spawn a mock evaluator unit with the test holding the search-side
/// endpoint, booted through ready
fn booted_evaluator() -> (UnitHandle, Endpoint) {
    init_tracing();
    let module = MockModuleFactory::default().module(Role::Evaluator, Some(1));
    let unit = spawn_unit(Role::Evaluator, Some(1), module, 32).unwrap();

    let (search_side, unit_side) = channel::pair(32);
    unit.send(Envelope::Port {
        peer: Peer::Search,
        endpoint: unit_side,
    })
    .unwrap();
    unit.send(memory_envelope(Some(1))).unwrap();

    match unit.receiver().recv_timeout(Duration::from_secs(5)) {
        Ok(Envelope::Ready) => {}
        other => panic!("evaluator never became ready: {other:?}"),
    }
    (unit, search_side)
}

fn eval_item_bytes(board: &Board, node: &str) -> Vec<u8> {
    let codec = EvalCodec {
        board_len: board.byte_length(),
    };
    codec.encode(&EvalItem {
        run_id: 1,
        node_name: node.into(),
        board: board.as_bytes().to_vec(),
    })
}

fn recv_selector(endpoint: &Endpoint, board: &Board) -> SelectorItem {
    let codec = SelectorCodec {
        board_len: board.byte_length(),
    };
    match endpoint.recv_timeout(Duration::from_secs(5)).unwrap() {
        Envelope::Item {
            queue: QueueName::Selector,
            item,
        } => codec.decode(&item).unwrap(),
        other => panic!("expected selector item, got {}", other.tag()),
    }
}

#[test]
fn test_bulk_injection_preserves_order() {
    let board = test_board();
    let (unit, search_side) = booted_evaluator();

    let items: Vec<Vec<u8>> = ["a", "b", "c"]
        .iter()
        .map(|n| eval_item_bytes(&board, n))
        .collect();
    unit.send(Envelope::ItemBulk {
        queue: QueueName::Eval,
        items,
    })
    .unwrap();

    for expected in ["a", "b", "c"] {
        let reply = recv_selector(&search_side, &board);
        assert_eq!(reply.node_name, expected);
        assert_eq!(reply.worker_num, 1);
    }
}

#[test]
fn test_bulk_and_single_injection_interleave_in_arrival_order() {
    let board = test_board();
    let (unit, search_side) = booted_evaluator();

    unit.send(Envelope::Item {
        queue: QueueName::Eval,
        item: eval_item_bytes(&board, "a"),
    })
    .unwrap();
    unit.send(Envelope::ItemBulk {
        queue: QueueName::Eval,
        items: vec![eval_item_bytes(&board, "b"), eval_item_bytes(&board, "c")],
    })
    .unwrap();
    unit.send(Envelope::Item {
        queue: QueueName::Eval,
        item: eval_item_bytes(&board, "d"),
    })
    .unwrap();

    for expected in ["a", "b", "c", "d"] {
        assert_eq!(recv_selector(&search_side, &board).node_name, expected);
    }
}

#[test]
fn test_injection_before_memory_is_rejected() {
    init_tracing();
    let board = test_board();
    let module = MockModuleFactory::default().module(Role::Evaluator, Some(1));
    let unit = spawn_unit(Role::Evaluator, Some(1), module, 32).unwrap();

    let (search_side, unit_side) = channel::pair(32);
    unit.send(Envelope::Port {
        peer: Peer::Search,
        endpoint: unit_side,
    })
    .unwrap();

    // No codec is bound yet; this item must be dropped, not buffered.
    unit.send(Envelope::Item {
        queue: QueueName::Eval,
        item: eval_item_bytes(&board, "early"),
    })
    .unwrap();
    unit.send(memory_envelope(Some(1))).unwrap();
    assert!(matches!(
        unit.receiver().recv_timeout(Duration::from_secs(5)),
        Ok(Envelope::Ready)
    ));

    unit.send(Envelope::Item {
        queue: QueueName::Eval,
        item: eval_item_bytes(&board, "late"),
    })
    .unwrap();

    // Only the post-handoff item is scored.
    assert_eq!(recv_selector(&search_side, &board).node_name, "late");
    assert!(search_side.recv_timeout(Duration::from_millis(200)).is_err());
}

#[test]
fn test_undecodable_item_is_isolated() {
    let board = test_board();
    let (unit, search_side) = booted_evaluator();

    unit.send(Envelope::Item {
        queue: QueueName::Eval,
        item: vec![0xFF, 0x01],
    })
    .unwrap();
    unit.send(Envelope::Item {
        queue: QueueName::Eval,
        item: eval_item_bytes(&board, "good"),
    })
    .unwrap();

    // The garbage item is logged and dropped; the unit keeps working.
    assert_eq!(recv_selector(&search_side, &board).node_name, "good");
}

#[test]
fn test_distributor_fans_out_round_robin() {
    init_tracing();
    let board = test_board();
    let module = MockModuleFactory::default().module(Role::Distributor, None);
    let unit = spawn_unit(Role::Distributor, None, module, 32).unwrap();

    let (search_side, unit_side) = channel::pair(32);
    unit.send(Envelope::Port {
        peer: Peer::Search,
        endpoint: unit_side,
    })
    .unwrap();
    let mut eval_sides = Vec::new();
    for num in 1..=2u32 {
        let (eval_side, unit_side) = channel::pair(32);
        unit.send(Envelope::Port {
            peer: Peer::Evaluator(num),
            endpoint: unit_side,
        })
        .unwrap();
        eval_sides.push(eval_side);
    }
    unit.send(memory_envelope(None)).unwrap();
    drop(search_side);

    let codec = DistributorCodec {
        board_len: board.byte_length(),
    };
    for node in ["n1", "n2", "n3", "n4"] {
        unit.send(Envelope::Item {
            queue: QueueName::Distributor,
            item: codec.encode(&DistributorItem {
                run_id: 1,
                node_name: node.into(),
                forcing_level: -1,
                board: board.as_bytes().to_vec(),
            }),
        })
        .unwrap();
    }

    let eval_codec = EvalCodec {
        board_len: board.byte_length(),
    };
    let recv_eval = |idx: usize| -> String {
        match eval_sides[idx].recv_timeout(Duration::from_secs(5)).unwrap() {
            Envelope::Item {
                queue: QueueName::Eval,
                item,
            } => eval_codec.decode(&item).unwrap().node_name,
            other => panic!("expected eval item, got {}", other.tag()),
        }
    };
    assert_eq!(recv_eval(0), "n1");
    assert_eq!(recv_eval(1), "n2");
    assert_eq!(recv_eval(0), "n3");
    assert_eq!(recv_eval(1), "n4");
}

proptest! {
    /// Any mix of local puts and channel injections drains in arrival order
    #[test]
    fn prop_mixed_producer_paths_preserve_order(
        ops in prop::collection::vec(("[a-m]{1,8}", any::<bool>()), 1..32)
    ) {
        let board_len = 8usize;
        let queue = hexmind::queue::Queue::new(EvalCodec { board_len });

        for (i, (name, injected)) in ops.iter().enumerate() {
            let item = EvalItem {
                run_id: i as u32,
                node_name: name.clone(),
                board: vec![0; board_len],
            };
            if *injected {
                queue.inject(&queue.encode(&item)).unwrap();
            } else {
                queue.put(item).unwrap();
            }
        }

        let consumer = queue.consumer();
        for (i, (name, _)) in ops.iter().enumerate() {
            let item = consumer.try_recv().expect("queue drained early");
            prop_assert_eq!(item.run_id, i as u32);
            prop_assert_eq!(&item.node_name, name);
        }
        prop_assert!(consumer.try_recv().is_none());
    }
}
