//! Tick proof harness: empirical checks of the engine's state invariants.
//!
//! The engine's tick paths never log invariants (no locks, no allocs), so
//! the harness re-derives the checkable properties from outside, between
//! ticks, exactly where the motion layer would read values.

use crate::engine::{Engine, OscState};
use crate::graph::OscKind;
use crate::invariant_ppt::{
    assert_invariant, ORDER_SOUNDNESS, PHASE_IN_RANGE, RANGE_INVARIANT, RING_INTACT,
    STATE_INIT_COMPLETE,
};

/// Allocation counter backing the no-alloc tick proofs; bumped by the
/// crate's test allocator.
#[cfg(test)]
pub static mut ALLOC_COUNT: usize = 0;

/// Check every externally visible state invariant of a quiescent engine.
///
/// Panics (through `assert_invariant`) on violation.
pub fn check_engine(engine: &Engine) {
    let kinds = engine.kinds();
    let states = engine.states();
    let phases = engine.config().phases as i32;
    let elements = engine.config().elements;

    assert_invariant(
        STATE_INIT_COMPLETE,
        kinds.len() == states.len(),
        "every registered oscillator carries state",
        Some("check_engine"),
    );

    for (ix, (kind, state)) in kinds.iter().zip(states).enumerate() {
        for upstream in kind.upstream().into_iter().flatten() {
            assert_invariant(
                ORDER_SOUNDNESS,
                upstream.0 < ix,
                "references point strictly backwards",
                Some("check_engine"),
            );
        }
        match (*kind, state) {
            (OscKind::Bounce { min, max, .. }, &OscState::Bounce { val, .. })
            | (OscKind::Wrap { min, max, .. }, &OscState::Value { val })
            | (OscKind::VeloWrap { min, max, .. }, &OscState::Value { val }) => {
                assert_invariant(
                    RANGE_INVARIANT,
                    min <= val && val <= max,
                    "bounded oscillator value stays within [min, max]",
                    Some("check_engine"),
                );
            }
            (OscKind::Phaser { .. }, &OscState::Phaser { curphase, .. })
            | (OscKind::RandPhaser { .. }, &OscState::RandPhaser { curphase, .. }) => {
                assert_invariant(
                    PHASE_IN_RANGE,
                    (0..phases).contains(&curphase),
                    "phase stays within [0, P)",
                    Some("check_engine"),
                );
            }
            (OscKind::Buffer { .. }, OscState::Buffer { ring, firstel }) => {
                assert_invariant(
                    RING_INTACT,
                    ring.len() == elements && *firstel < elements,
                    "ring holds exactly N slots with a valid head",
                    Some("check_engine"),
                );
            }
            _ => {}
        }
    }
}

/// Harness that advances an engine while checking invariants each tick.
pub struct TickHarness {
    engine: Engine,
}

impl TickHarness {
    /// Wrap an engine, checking its freshly built state immediately.
    pub fn new(engine: Engine) -> Self {
        check_engine(&engine);
        Self { engine }
    }

    /// Advance `ticks` times, checking invariants after every tick.
    pub fn run(&mut self, ticks: usize) {
        for _ in 0..ticks {
            self.engine.advance();
            check_engine(&self.engine);
        }
    }

    /// Read access to the engine between runs.
    pub fn engine(&self) -> &Engine {
        &self.engine
    }

    /// Hand the engine back.
    pub fn into_inner(self) -> Engine {
        self.engine
    }
}
