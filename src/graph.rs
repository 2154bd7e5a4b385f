//! Graph module for Oscnet: the append-only oscillator registry.
//!
//! Oscillators are registered once, in construction order, and referenced by
//! stable handles. An oscillator may only reference oscillators registered
//! before it; that ordering is what makes the one-tick delay semantics of
//! [`OscKind::Buffer`] and [`OscKind::VeloWrap`] well defined.

#![forbid(unsafe_code)]
#![warn(missing_docs)]

use crate::invariant_ppt::{assert_invariant, GRAPH_LEGALITY, GRAPH_REJECTS_INVALID};

/// Unique identifier for an oscillator: its position in the registry.
///
/// Handles are never reused or invalidated while the registry is alive.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct OscId(pub usize);

/// An oscillator definition.
///
/// Definitions are immutable; all mutable state (current value, phase
/// counter, ring contents) lives in the engine. Reference fields are
/// `Option<OscId>` — an absent reference samples as 0 and steps as a no-op.
#[non_exhaustive]
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OscKind {
    /// Fixed value, ignores the element index.
    Constant {
        /// The value returned by every sample.
        val: i32,
    },
    /// Ping-pong between `min` and `max`, reflecting at each boundary.
    Bounce {
        /// Lower bound (inclusive).
        min: i32,
        /// Upper bound (inclusive).
        max: i32,
        /// Signed per-tick increment; its sign flips on reflection.
        step: i32,
        /// Explicit initial value; `None` draws `min + |step| * k` at
        /// engine construction.
        init: Option<i32>,
    },
    /// Sawtooth between `min` and `max`, wrapping at each boundary.
    Wrap {
        /// Lower bound (inclusive).
        min: i32,
        /// Upper bound (inclusive).
        max: i32,
        /// Signed per-tick increment.
        step: i32,
        /// Explicit initial value; `None` draws `min + |step| * k` at
        /// engine construction.
        init: Option<i32>,
    },
    /// Wrapping accumulator whose per-tick increment is sampled from
    /// another oscillator (at element index 0).
    VeloWrap {
        /// Lower bound (inclusive).
        min: i32,
        /// Upper bound (inclusive).
        max: i32,
        /// Velocity source; must be registered before this oscillator.
        velocity: Option<OscId>,
        /// Explicit initial value; `None` draws uniformly from
        /// `[min, max]` at engine construction.
        init: Option<i32>,
    },
    /// Data-dependent routing: samples `selector`, reduces it mod `P`, and
    /// forwards to the option in that slot.
    Multiplex {
        /// Selector source.
        selector: Option<OscId>,
        /// Routed sub-graphs; a selected absent slot samples as 0.
        options: [Option<OscId>; 4],
    },
    /// Cyclic phase counter in `[0, P)` advancing every `phaselen` ticks.
    Phaser {
        /// Ticks per phase; must be positive (caller responsibility).
        phaselen: i32,
    },
    /// Like [`OscKind::Phaser`], but redraws the phase length uniformly
    /// from `[minlen, maxlen]` at every phase advance.
    RandPhaser {
        /// Shortest phase length (inclusive).
        minlen: i32,
        /// Longest phase length (inclusive).
        maxlen: i32,
    },
    /// Element-index ramp: `sample(base, el) + el * sample(diff, el)`.
    Linear {
        /// Ramp offset source.
        base: Option<OscId>,
        /// Per-element slope source.
        diff: Option<OscId>,
    },
    /// Delay line: a ring of the source's last `N` values, one tick apart,
    /// indexed by element.
    Buffer {
        /// History source; must be registered before this oscillator so it
        /// has already advanced when the ring samples it each tick.
        source: Option<OscId>,
    },
}

impl OscKind {
    /// Upstream references recorded in this definition, absent slots
    /// included, in a fixed order.
    pub fn upstream(&self) -> [Option<OscId>; 5] {
        match *self {
            OscKind::VeloWrap { velocity, .. } => [velocity, None, None, None, None],
            OscKind::Multiplex { selector, options } => {
                [selector, options[0], options[1], options[2], options[3]]
            }
            OscKind::Linear { base, diff } => [base, diff, None, None, None],
            OscKind::Buffer { source } => [source, None, None, None, None],
            _ => [None; 5],
        }
    }
}

/// Errors that can occur when building or checking the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum GraphError {
    /// A supplied upstream handle does not name a registered oscillator.
    UnknownOsc(OscId),
    /// A definition references an oscillator at or after its own position,
    /// so the referenced oscillator would not have advanced yet when read
    /// during a tick.
    ForwardReference {
        /// The referencing oscillator.
        osc: OscId,
        /// The out-of-order reference it holds.
        upstream: OscId,
    },
}

/// The oscillator registry: append-only, never reordered or compacted.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Graph {
    /// All definitions, in construction order.
    pub kinds: Vec<OscKind>,
}

impl Graph {
    /// Create a new empty registry.
    pub fn new() -> Self {
        Self { kinds: Vec::new() }
    }

    /// Number of registered oscillators.
    pub fn len(&self) -> usize {
        self.kinds.len()
    }

    /// True if nothing has been registered.
    pub fn is_empty(&self) -> bool {
        self.kinds.is_empty()
    }

    /// Look up a definition by handle.
    pub fn kind(&self, id: OscId) -> Option<&OscKind> {
        self.kinds.get(id.0)
    }

    fn push(&mut self, kind: OscKind) -> OscId {
        let id = OscId(self.kinds.len());
        self.kinds.push(kind);
        assert_invariant(
            GRAPH_LEGALITY,
            true,
            "oscillator registered at the registry tail",
            Some("push"),
        );
        id
    }

    /// Reject upstream handles that are not already registered. Handles can
    /// only come from earlier `add_*` calls, so this also rules out forward
    /// references and cycles.
    fn check_upstream(&self, upstream: Option<OscId>) -> Result<(), GraphError> {
        if let Some(id) = upstream {
            if id.0 >= self.kinds.len() {
                assert_invariant(
                    GRAPH_REJECTS_INVALID,
                    id.0 >= self.kinds.len(),
                    "unregistered upstream handle, rejecting",
                    Some("check_upstream"),
                );
                return Err(GraphError::UnknownOsc(id));
            }
        }
        Ok(())
    }

    /// Register a constant.
    pub fn add_constant(&mut self, val: i32) -> OscId {
        self.push(OscKind::Constant { val })
    }

    /// Register a ping-pong oscillator with a random initial value.
    pub fn add_bounce(&mut self, min: i32, max: i32, step: i32) -> OscId {
        self.push(OscKind::Bounce {
            min,
            max,
            step,
            init: None,
        })
    }

    /// Register a ping-pong oscillator starting exactly at `val`.
    ///
    /// Skips the construction-time random draw, so seeding a value shifts
    /// the draw sequence of every later oscillator by one.
    pub fn add_bounce_at(&mut self, min: i32, max: i32, step: i32, val: i32) -> OscId {
        self.push(OscKind::Bounce {
            min,
            max,
            step,
            init: Some(val),
        })
    }

    /// Register a sawtooth oscillator with a random initial value.
    pub fn add_wrap(&mut self, min: i32, max: i32, step: i32) -> OscId {
        self.push(OscKind::Wrap {
            min,
            max,
            step,
            init: None,
        })
    }

    /// Register a sawtooth oscillator starting exactly at `val`.
    ///
    /// Skips the construction-time random draw, like [`Graph::add_bounce_at`].
    pub fn add_wrap_at(&mut self, min: i32, max: i32, step: i32, val: i32) -> OscId {
        self.push(OscKind::Wrap {
            min,
            max,
            step,
            init: Some(val),
        })
    }

    /// Register a velocity-driven wrapping accumulator.
    pub fn add_velowrap(
        &mut self,
        min: i32,
        max: i32,
        velocity: Option<OscId>,
    ) -> Result<OscId, GraphError> {
        self.check_upstream(velocity)?;
        Ok(self.push(OscKind::VeloWrap {
            min,
            max,
            velocity,
            init: None,
        }))
    }

    /// Register a velocity-driven wrapping accumulator starting exactly at
    /// `val`.
    pub fn add_velowrap_at(
        &mut self,
        min: i32,
        max: i32,
        velocity: Option<OscId>,
        val: i32,
    ) -> Result<OscId, GraphError> {
        self.check_upstream(velocity)?;
        Ok(self.push(OscKind::VeloWrap {
            min,
            max,
            velocity,
            init: Some(val),
        }))
    }

    /// Register a multiplexer routing between four options.
    pub fn add_multiplex(
        &mut self,
        selector: Option<OscId>,
        options: [Option<OscId>; 4],
    ) -> Result<OscId, GraphError> {
        self.check_upstream(selector)?;
        for option in options {
            self.check_upstream(option)?;
        }
        Ok(self.push(OscKind::Multiplex { selector, options }))
    }

    /// Register a phase counter advancing every `phaselen` ticks.
    pub fn add_phaser(&mut self, phaselen: i32) -> OscId {
        self.push(OscKind::Phaser { phaselen })
    }

    /// Register a phase counter with a random per-cycle phase length in
    /// `[minlen, maxlen]`.
    pub fn add_randphaser(&mut self, minlen: i32, maxlen: i32) -> OscId {
        self.push(OscKind::RandPhaser { minlen, maxlen })
    }

    /// Register an element-index ramp over two scalar sources.
    pub fn add_linear(
        &mut self,
        base: Option<OscId>,
        diff: Option<OscId>,
    ) -> Result<OscId, GraphError> {
        self.check_upstream(base)?;
        self.check_upstream(diff)?;
        Ok(self.push(OscKind::Linear { base, diff }))
    }

    /// Register a delay line over `source`.
    pub fn add_buffer(&mut self, source: Option<OscId>) -> Result<OscId, GraphError> {
        self.check_upstream(source)?;
        Ok(self.push(OscKind::Buffer { source }))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use proptest::prelude::*;

    #[test]
    fn handles_are_registry_positions() {
        let mut graph = Graph::new();
        let a = graph.add_constant(3);
        let b = graph.add_wrap(0, 10, 1);
        let c = graph.add_phaser(5);
        assert_eq!((a, b, c), (OscId(0), OscId(1), OscId(2)));
        assert_eq!(graph.len(), 3);
    }

    #[test]
    fn rejects_unregistered_upstream() {
        let mut graph = Graph::new();
        let _ = graph.add_constant(1);
        let err = graph.add_buffer(Some(OscId(7))).unwrap_err();
        assert_eq!(err, GraphError::UnknownOsc(OscId(7)));
        // The failed add must not consume a registry slot.
        assert_eq!(graph.len(), 1);
    }

    #[test]
    fn absent_upstream_is_legal() {
        let mut graph = Graph::new();
        let mux = graph.add_multiplex(None, [None; 4]).unwrap();
        let lin = graph.add_linear(None, None).unwrap();
        let buf = graph.add_buffer(None).unwrap();
        assert_eq!((mux, lin, buf), (OscId(0), OscId(1), OscId(2)));
    }

    #[test]
    fn upstream_listing_matches_definition() {
        let mut graph = Graph::new();
        let sel = graph.add_phaser(2);
        let opt = graph.add_constant(9);
        let mux = graph
            .add_multiplex(Some(sel), [Some(opt), None, Some(opt), None])
            .unwrap();
        let kind = graph.kind(mux).unwrap();
        assert_eq!(
            kind.upstream(),
            [Some(sel), Some(opt), None, Some(opt), None]
        );
    }

    proptest! {
        #[test]
        fn references_to_earlier_handles_always_register(picks in prop::collection::vec(0usize..8, 1..20)) {
            let mut graph = Graph::new();
            let first = graph.add_constant(0);
            let mut ids = vec![first];
            for pick in picks {
                let upstream = ids[pick % ids.len()];
                let id = graph.add_buffer(Some(upstream)).unwrap();
                prop_assert!(upstream < id);
                ids.push(id);
            }
            prop_assert_eq!(graph.len(), ids.len());
        }
    }
}
