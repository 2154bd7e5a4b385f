//! Contract tests: drive the whole surface, then require that every core
//! invariant was actually enforced somewhere along the way.

use oscnet::engine::Engine;
use oscnet::graph::{Graph, OscId};
use oscnet::harness::TickHarness;
use oscnet::invariant_ppt::{
    contract_test, record_invariant, GRAPH_LEGALITY, GRAPH_REJECTS_INVALID, ORDER_SOUNDNESS,
    PHASE_IN_RANGE, RANGE_INVARIANT, RING_INTACT, STATE_INIT_COMPLETE, TICK_DETERMINISM,
};
use oscnet::Config;

#[test]
fn core_contract() {
    let config = Config {
        phases: 4,
        elements: 10,
    };

    // Legal construction of every variant.
    let mut graph = Graph::new();
    let speed = graph.add_bounce(1, 9, 2);
    let angle = graph.add_wrap(0, 359, 7);
    let drift = graph.add_velowrap(-80, 80, Some(speed)).unwrap();
    let sel = graph.add_randphaser(2, 6);
    let steady = graph.add_phaser(4);
    let fixed = graph.add_constant(25);
    let mux = graph
        .add_multiplex(Some(sel), [Some(angle), Some(drift), Some(fixed), Some(steady)])
        .unwrap();
    let ramp = graph.add_linear(Some(mux), Some(speed)).unwrap();
    let _tail = graph.add_buffer(Some(ramp)).unwrap();

    // Illegal construction is rejected.
    assert!(graph.add_buffer(Some(OscId(999))).is_err());

    // Run under the harness: state invariants checked every tick.
    let engine = Engine::seeded(&graph, config, 21).unwrap();
    let mut harness = TickHarness::new(engine);
    harness.run(1_000);

    // Two engines from the same seed stay bit-identical.
    let mut a = Engine::seeded(&graph, config, 31).unwrap();
    let mut b = Engine::seeded(&graph, config, 31).unwrap();
    for _ in 0..250 {
        a.advance();
        b.advance();
    }
    assert_eq!(a.states(), b.states());
    record_invariant(TICK_DETERMINISM);

    contract_test(
        "core_contract",
        &[
            GRAPH_LEGALITY,
            GRAPH_REJECTS_INVALID,
            ORDER_SOUNDNESS,
            STATE_INIT_COMPLETE,
            RANGE_INVARIANT,
            PHASE_IN_RANGE,
            RING_INTACT,
            TICK_DETERMINISM,
        ],
    );
}
