//! Engine module: per-tick execution over the oscillator registry.

// IMPORTANT: Do not call assert_invariant or any PPT logging in tick paths
// (advance/sample) to avoid locks/allocs. State checks live in the harness.

use crate::graph::{Graph, GraphError, OscId, OscKind};
use crate::Config;
use rand::{Rng, RngCore, SeedableRng};
use rand_chacha::ChaCha8Rng;
use std::fmt;

/// Mutable per-oscillator state, parallel to the registry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OscState {
    /// Constant, Multiplex, and Linear carry no state.
    Stateless,
    /// Bounce carries its value and its current step, whose sign flips on
    /// reflection.
    Bounce {
        /// Current value.
        val: i32,
        /// Current signed increment.
        step: i32,
    },
    /// Wrap and VeloWrap carry a bare value.
    Value {
        /// Current value.
        val: i32,
    },
    /// Phaser state.
    Phaser {
        /// Ticks since the last phase advance.
        count: i32,
        /// Current phase in `[0, P)`.
        curphase: i32,
    },
    /// RandPhaser state.
    RandPhaser {
        /// Ticks since the last phase advance.
        count: i32,
        /// Length of the current phase, redrawn on every advance.
        curphaselen: i32,
        /// Current phase in `[0, P)`.
        curphase: i32,
    },
    /// Buffer state: ring of the source's last `N` values.
    Buffer {
        /// History slots, most recent at `firstel`.
        ring: Vec<i32>,
        /// Index of the most recent sample.
        firstel: usize,
    },
}

/// The tick engine: owns all mutable state and the random source.
///
/// Built from a [`Graph`] whose cross-references must all point strictly
/// backwards; the stepper relies on that so any oscillator read during a
/// tick has already advanced in the same tick.
pub struct Engine {
    config: Config,
    kinds: Vec<OscKind>,
    states: Vec<OscState>,
    rng: Box<dyn RngCore>,
}

impl fmt::Debug for Engine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Engine")
            .field("config", &self.config)
            .field("kinds", &self.kinds)
            .field("states", &self.states)
            .finish_non_exhaustive()
    }
}

impl Engine {
    /// Create an engine from a registry and an injected random source.
    ///
    /// Verifies the backward-reference precondition and then draws every
    /// oscillator's initial state in registry order, so a given source
    /// reproduces the whole network exactly.
    pub fn new(
        graph: &Graph,
        config: Config,
        mut rng: Box<dyn RngCore>,
    ) -> Result<Self, GraphError> {
        verify_order(&graph.kinds)?;
        let kinds = graph.kinds.clone();
        let states = build_states(&kinds, config, rng.as_mut());
        Ok(Self {
            config,
            kinds,
            states,
            rng,
        })
    }

    /// Create an engine seeded with a ChaCha8 stream.
    pub fn seeded(graph: &Graph, config: Config, seed: u64) -> Result<Self, GraphError> {
        Self::new(graph, config, Box::new(ChaCha8Rng::seed_from_u64(seed)))
    }

    /// The cardinalities this engine was built with.
    pub fn config(&self) -> Config {
        self.config
    }

    /// The registered definitions, in construction order.
    pub fn kinds(&self) -> &[OscKind] {
        &self.kinds
    }

    /// Current state of every oscillator, in construction order.
    pub fn states(&self) -> &[OscState] {
        &self.states
    }

    /// Re-roll all state from the definitions using a fresh random source.
    pub fn reset(&mut self, mut rng: Box<dyn RngCore>) {
        self.states = build_states(&self.kinds, self.config, rng.as_mut());
        self.rng = rng;
    }

    /// Evaluate one oscillator for one element index. Total: an unknown
    /// handle yields 0.
    pub fn sample(&self, osc: OscId, el: usize) -> i32 {
        sample_in(&self.kinds, &self.states, self.config, Some(osc), el)
    }

    /// Evaluate an optional reference; `None` yields 0.
    pub fn sample_opt(&self, osc: Option<OscId>, el: usize) -> i32 {
        sample_in(&self.kinds, &self.states, self.config, osc, el)
    }

    /// Evaluate one oscillator for element indices `0..out.len()` without
    /// allocating.
    pub fn sample_into(&self, osc: OscId, out: &mut [i32]) {
        for (el, slot) in out.iter_mut().enumerate() {
            *slot = self.sample(osc, el);
        }
    }

    /// Advance every oscillator by exactly one tick, in registry order.
    pub fn advance(&mut self) {
        let phases = self.config.phases as i32;
        for ix in 0..self.kinds.len() {
            let kind = self.kinds[ix];
            match kind {
                OscKind::Constant { .. } | OscKind::Multiplex { .. } | OscKind::Linear { .. } => {}
                OscKind::Bounce { min, max, .. } => {
                    if let OscState::Bounce { val, step } = &mut self.states[ix] {
                        *val += *step;
                        if *val < min && *step < 0 {
                            *step = -*step;
                            *val = min + (min - *val);
                        }
                        if *val > max && *step > 0 {
                            *step = -*step;
                            *val = max + (max - *val);
                        }
                    }
                }
                OscKind::Wrap { min, max, step, .. } => {
                    if let OscState::Value { val } = &mut self.states[ix] {
                        *val += step;
                        if *val < min && step < 0 {
                            *val += max - min;
                        }
                        if *val > max && step > 0 {
                            *val -= max - min;
                        }
                    }
                }
                OscKind::VeloWrap {
                    min, max, velocity, ..
                } => {
                    // Velocity is read after its own update this tick; the
                    // backward-reference precondition guarantees that.
                    let delta = sample_in(&self.kinds, &self.states, self.config, velocity, 0);
                    if let OscState::Value { val } = &mut self.states[ix] {
                        let span = max - min;
                        *val += delta;
                        while *val < min {
                            *val += span;
                        }
                        while *val > max {
                            *val -= span;
                        }
                    }
                }
                OscKind::Phaser { phaselen } => {
                    if let OscState::Phaser { count, curphase } = &mut self.states[ix] {
                        *count += 1;
                        if *count >= phaselen {
                            *count = 0;
                            *curphase += 1;
                            if *curphase >= phases {
                                *curphase = 0;
                            }
                        }
                    }
                }
                OscKind::RandPhaser { minlen, maxlen } => {
                    if let OscState::RandPhaser {
                        count,
                        curphaselen,
                        curphase,
                    } = &mut self.states[ix]
                    {
                        *count += 1;
                        if *count >= *curphaselen {
                            *count = 0;
                            *curphaselen = rand_range(self.rng.as_mut(), minlen, maxlen);
                            *curphase += 1;
                            if *curphase >= phases {
                                *curphase = 0;
                            }
                        }
                    }
                }
                OscKind::Buffer { source } => {
                    let fresh = sample_in(&self.kinds, &self.states, self.config, source, 0);
                    if let OscState::Buffer { ring, firstel } = &mut self.states[ix] {
                        *firstel = (*firstel + ring.len() - 1) % ring.len();
                        ring[*firstel] = fresh;
                    }
                }
            }
        }
    }
}

/// Advance `ticks` times, sampling `osc` at element 0 after each tick.
pub fn trace(engine: &mut Engine, osc: OscId, ticks: usize) -> Vec<i32> {
    let mut out = Vec::with_capacity(ticks);
    for _ in 0..ticks {
        engine.advance();
        out.push(engine.sample(osc, 0));
    }
    out
}

/// Every reference must point strictly backwards in the registry.
fn verify_order(kinds: &[OscKind]) -> Result<(), GraphError> {
    for (ix, kind) in kinds.iter().enumerate() {
        for upstream in kind.upstream().into_iter().flatten() {
            if upstream.0 >= ix {
                return Err(GraphError::ForwardReference {
                    osc: OscId(ix),
                    upstream,
                });
            }
        }
    }
    Ok(())
}

/// Draw initial states in registry order. Each stateful definition without
/// an explicit initial value consumes draws in a fixed order, so the same
/// source yields the same network.
fn build_states(kinds: &[OscKind], config: Config, rng: &mut dyn RngCore) -> Vec<OscState> {
    let mut states: Vec<OscState> = Vec::with_capacity(kinds.len());
    for kind in kinds {
        let state = match *kind {
            OscKind::Constant { .. } | OscKind::Multiplex { .. } | OscKind::Linear { .. } => {
                OscState::Stateless
            }
            OscKind::Bounce {
                min,
                max,
                step,
                init,
            } => OscState::Bounce {
                val: init.unwrap_or_else(|| draw_on_grid(rng, min, max, step)),
                step,
            },
            OscKind::Wrap {
                min,
                max,
                step,
                init,
            } => OscState::Value {
                val: init.unwrap_or_else(|| draw_on_grid(rng, min, max, step)),
            },
            OscKind::VeloWrap { min, max, init, .. } => OscState::Value {
                val: init.unwrap_or_else(|| rand_range(rng, min, max)),
            },
            OscKind::Phaser { .. } => OscState::Phaser {
                count: 0,
                curphase: rand_range(rng, 0, config.phases as i32 - 1),
            },
            OscKind::RandPhaser { minlen, maxlen } => {
                // Length first, then phase: two draws per oscillator.
                let curphaselen = rand_range(rng, minlen, maxlen);
                let curphase = rand_range(rng, 0, config.phases as i32 - 1);
                OscState::RandPhaser {
                    count: 0,
                    curphaselen,
                    curphase,
                }
            }
            OscKind::Buffer { source } => {
                // Prefill with the source's value as of now, so the delay
                // line starts flat. The source state already exists because
                // it was registered first.
                let fill = sample_in(kinds, &states, config, source, 0);
                OscState::Buffer {
                    ring: vec![fill; config.elements],
                    firstel: config.elements - 1,
                }
            }
        };
        states.push(state);
    }
    states
}

/// A value in `[min, max]` at a multiple of `|step|` above `min`.
fn draw_on_grid(rng: &mut dyn RngCore, min: i32, max: i32, step: i32) -> i32 {
    let step = step.abs();
    let diff = (max - min) / step;
    min + step * rand_range(rng, 0, diff - 1)
}

/// Uniform inclusive draw; degenerate ranges yield `min` without consuming
/// a draw.
fn rand_range(rng: &mut dyn RngCore, min: i32, max: i32) -> i32 {
    if max <= min {
        return min;
    }
    rng.gen_range(min..=max)
}

/// Recursive evaluator shared by `Engine::sample` and state construction.
/// Total over absent and unknown references, which yield 0.
fn sample_in(
    kinds: &[OscKind],
    states: &[OscState],
    config: Config,
    osc: Option<OscId>,
    el: usize,
) -> i32 {
    let ix = match osc {
        Some(OscId(ix)) => ix,
        None => return 0,
    };
    let (kind, state) = match (kinds.get(ix), states.get(ix)) {
        (Some(kind), Some(state)) => (kind, state),
        _ => return 0,
    };
    match (*kind, state) {
        (OscKind::Constant { val }, _) => val,
        (OscKind::Bounce { .. }, &OscState::Bounce { val, .. }) => val,
        (OscKind::Wrap { .. }, &OscState::Value { val }) => val,
        (OscKind::VeloWrap { .. }, &OscState::Value { val }) => val,
        (OscKind::Phaser { .. }, &OscState::Phaser { curphase, .. }) => curphase,
        (OscKind::RandPhaser { .. }, &OscState::RandPhaser { curphase, .. }) => curphase,
        (OscKind::Linear { base, diff }, _) => {
            sample_in(kinds, states, config, base, el)
                + el as i32 * sample_in(kinds, states, config, diff, el)
        }
        (OscKind::Multiplex { selector, options }, _) => {
            let sel = sample_in(kinds, states, config, selector, el);
            let slot = sel.rem_euclid(config.phases as i32) as usize;
            let routed = options.get(slot).copied().flatten();
            sample_in(kinds, states, config, routed, el)
        }
        (OscKind::Buffer { .. }, OscState::Buffer { ring, firstel }) => {
            ring[(*firstel + el) % ring.len()]
        }
        // Kind/state disagreement cannot happen for engine-built states.
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Graph;

    fn config() -> Config {
        Config {
            phases: 4,
            elements: 8,
        }
    }

    #[test]
    fn constant_ignores_element_index() {
        let mut graph = Graph::new();
        let c = graph.add_constant(17);
        let engine = Engine::seeded(&graph, config(), 1).unwrap();
        assert_eq!(engine.sample(c, 0), 17);
        assert_eq!(engine.sample(c, 7), 17);
    }

    #[test]
    fn unknown_handle_samples_zero() {
        let graph = Graph::new();
        let engine = Engine::seeded(&graph, config(), 1).unwrap();
        assert_eq!(engine.sample(OscId(3), 0), 0);
        assert_eq!(engine.sample_opt(None, 0), 0);
    }

    #[test]
    fn advance_on_empty_registry_is_a_no_op() {
        let graph = Graph::new();
        let mut engine = Engine::seeded(&graph, config(), 1).unwrap();
        engine.advance();
        assert!(engine.states().is_empty());
    }

    #[test]
    fn wrap_concrete_scenario() {
        // Wrap(0, 10, 3) seeded at 1: after 4 ticks, (1 + 3*4) mod 10 = 3.
        let mut graph = Graph::new();
        let w = graph.add_wrap_at(0, 10, 3, 1);
        let mut engine = Engine::seeded(&graph, config(), 1).unwrap();
        for _ in 0..4 {
            engine.advance();
        }
        assert_eq!(engine.sample(w, 0), 3);
    }

    #[test]
    fn same_seed_reproduces_the_network() {
        let mut graph = Graph::new();
        let _ = graph.add_bounce(0, 100, 7);
        let rp = graph.add_randphaser(2, 9);
        let _ = graph.add_buffer(Some(rp)).unwrap();
        let a = Engine::seeded(&graph, config(), 42).unwrap();
        let b = Engine::seeded(&graph, config(), 42).unwrap();
        assert_eq!(a.states(), b.states());
    }

    #[test]
    fn reset_rerolls_from_definitions() {
        let mut graph = Graph::new();
        let w = graph.add_wrap(0, 96, 3);
        let mut engine = Engine::seeded(&graph, config(), 9).unwrap();
        let initial = engine.sample(w, 0);
        engine.advance();
        engine.reset(Box::new(ChaCha8Rng::seed_from_u64(9)));
        assert_eq!(engine.sample(w, 0), initial);
    }

    #[test]
    fn forward_reference_is_rejected() {
        let mut graph = Graph::new();
        let c = graph.add_constant(1);
        let _ = graph.add_buffer(Some(c)).unwrap();
        // Mangle the registry directly to point a reference forwards.
        graph.kinds[1] = OscKind::Buffer {
            source: Some(OscId(1)),
        };
        let err = Engine::seeded(&graph, config(), 1).unwrap_err();
        assert_eq!(
            err,
            GraphError::ForwardReference {
                osc: OscId(1),
                upstream: OscId(1),
            }
        );
    }
}
