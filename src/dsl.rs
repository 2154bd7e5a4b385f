//! DSL module: builder API for oscillator networks.
//!
//! A thin layer over [`Graph`] for motion layers that wire dozens of
//! oscillators: the same construction functions, plus optional string names
//! so attribute wiring can refer back to shared sub-graphs.

use crate::graph::{Graph, GraphError, OscId};
use std::collections::HashMap;

/// The network builder.
#[derive(Debug, Default)]
pub struct NetworkBuilder {
    graph: Graph,
    names: HashMap<String, OscId>,
}

/// DSL-specific errors.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DslError {
    /// The underlying registry rejected the construction.
    Graph(GraphError),
    /// A name was looked up before being bound.
    MissingName(String),
}

impl From<GraphError> for DslError {
    fn from(err: GraphError) -> Self {
        DslError::Graph(err)
    }
}

impl NetworkBuilder {
    /// Create a new builder over an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Bind a name to an already-registered handle.
    pub fn name(&mut self, name: &str, osc: OscId) -> OscId {
        self.names.insert(name.to_string(), osc);
        osc
    }

    /// Look up a previously bound name.
    pub fn named(&self, name: &str) -> Result<OscId, DslError> {
        self.names
            .get(name)
            .copied()
            .ok_or_else(|| DslError::MissingName(name.to_string()))
    }

    /// Register a constant.
    pub fn constant(&mut self, val: i32) -> OscId {
        self.graph.add_constant(val)
    }

    /// Register a ping-pong oscillator.
    pub fn bounce(&mut self, min: i32, max: i32, step: i32) -> OscId {
        self.graph.add_bounce(min, max, step)
    }

    /// Register a sawtooth oscillator.
    pub fn wrap(&mut self, min: i32, max: i32, step: i32) -> OscId {
        self.graph.add_wrap(min, max, step)
    }

    /// Register a velocity-driven wrapping accumulator.
    pub fn velowrap(
        &mut self,
        min: i32,
        max: i32,
        velocity: OscId,
    ) -> Result<OscId, DslError> {
        Ok(self.graph.add_velowrap(min, max, Some(velocity))?)
    }

    /// Register a multiplexer over four options.
    pub fn multiplex(
        &mut self,
        selector: OscId,
        options: [OscId; 4],
    ) -> Result<OscId, DslError> {
        Ok(self
            .graph
            .add_multiplex(Some(selector), options.map(Some))?)
    }

    /// Register a phase counter.
    pub fn phaser(&mut self, phaselen: i32) -> OscId {
        self.graph.add_phaser(phaselen)
    }

    /// Register a phase counter with random per-cycle lengths.
    pub fn randphaser(&mut self, minlen: i32, maxlen: i32) -> OscId {
        self.graph.add_randphaser(minlen, maxlen)
    }

    /// Register an element-index ramp.
    pub fn linear(&mut self, base: OscId, diff: OscId) -> Result<OscId, DslError> {
        Ok(self.graph.add_linear(Some(base), Some(diff))?)
    }

    /// Register a delay line.
    pub fn buffer(&mut self, source: OscId) -> Result<OscId, DslError> {
        Ok(self.graph.add_buffer(Some(source))?)
    }

    /// Finish building and hand back the registry.
    pub fn build(self) -> Graph {
        self.graph
    }
}
