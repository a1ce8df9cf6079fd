/*
 * Copyright 2020 Nikhil Marathe <nsm.nikhil@gmail.com>
 *
 * Licensed under the Apache License, Version 2.0 (the "License");
 * you may not use this file except in compliance with the License.
 * You may obtain a copy of the License at
 *
 *     http://www.apache.org/licenses/LICENSE-2.0
 *
 * Unless required by applicable law or agreed to in writing, software
 * distributed under the License is distributed on an "AS IS" BASIS,
 * WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
 * See the License for the specific language governing permissions and
 * limitations under the License.
 */

//! The build graph: nodes, edges, rules and pools, plus the validated operations that build it.
//!
//! A front end declares rules and pools, then edges that reference them by name. Every declaration
//! is checked before anything is stored, so a failed call leaves the graph as it was. Once built,
//! the graph is read-only apart from pool counters.

use std::fmt;

use ninja_eval::{Env, Scope, ScopeRef};
use ninja_paths::{canonicalize_path, PathCache};

mod builder;
mod edge;
mod error;
mod node;
mod pool;
mod rule;

pub use builder::{InputSpec, OutputSpec};
pub use edge::{Edge, EdgeEnv, Escape};
pub use error::GraphError;
pub use node::Node;
pub use pool::{Pool, CONSOLE};
pub use rule::{is_reserved_binding, Rule, PHONY, RESERVED_BINDINGS};

macro_rules! id_type {
    ($name:ident) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
        pub struct $name(usize);

        impl $name {
            pub fn index(self) -> usize {
                self.0
            }
        }
    };
}

id_type!(NodeId);
id_type!(EdgeId);
id_type!(RuleId);
id_type!(PoolId);

#[derive(Debug)]
pub struct Graph {
    // Node ids and path refs are the same numbers.
    paths: PathCache,
    nodes: Vec<Node>,
    edges: Vec<Edge>,
    rules: Vec<Rule>,
    pools: Vec<Pool>,
    defaults: Vec<NodeId>,
    bindings: ScopeRef,
}

impl Default for Graph {
    fn default() -> Self {
        Graph::new()
    }
}

impl Graph {
    /// An empty graph with the `phony` rule, the `console` pool and `builddir` already defined.
    pub fn new() -> Graph {
        let bindings = Scope::new_ref();
        bindings
            .borrow_mut()
            .define_expression("builddir", ninja_eval::Expression::literal("build"));
        let phony = Rule::new(PHONY.to_owned(), Scope::with_parent(bindings.clone()));
        Graph {
            paths: PathCache::new(),
            nodes: Vec::new(),
            edges: Vec::new(),
            rules: vec![phony],
            pools: vec![Pool::new(CONSOLE, 1)],
            defaults: Vec::new(),
            bindings,
        }
    }

    pub fn node(&self, id: NodeId) -> &Node {
        &self.nodes[id.0]
    }

    pub fn edge(&self, id: EdgeId) -> &Edge {
        &self.edges[id.0]
    }

    pub fn rule(&self, id: RuleId) -> &Rule {
        &self.rules[id.0]
    }

    pub fn pool(&self, id: PoolId) -> &Pool {
        &self.pools[id.0]
    }

    pub fn pool_mut(&mut self, id: PoolId) -> &mut Pool {
        &mut self.pools[id.0]
    }

    pub fn node_ids(&self) -> impl Iterator<Item = NodeId> {
        (0..self.nodes.len()).map(NodeId)
    }

    pub fn edge_ids(&self) -> impl Iterator<Item = EdgeId> {
        (0..self.edges.len()).map(EdgeId)
    }

    pub fn pool_ids(&self) -> impl Iterator<Item = PoolId> {
        (0..self.pools.len()).map(PoolId)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn edge_count(&self) -> usize {
        self.edges.len()
    }

    pub fn rule_by_name(&self, name: &str) -> Option<RuleId> {
        self.rules.iter().position(|r| r.name() == name).map(RuleId)
    }

    pub fn pool_by_name(&self, name: &str) -> Option<PoolId> {
        self.pools.iter().position(|p| p.name() == name).map(PoolId)
    }

    /// Finds a node by any spelling of its path.
    pub fn lookup_node(&self, path: &str) -> Option<NodeId> {
        let canonical = canonicalize_path(path).ok()?;
        self.paths.lookup(&canonical.path).map(NodeId)
    }

    /// Like [`Graph::lookup_node`], for paths that must name a known node.
    pub fn target(&self, path: &str) -> Result<NodeId, GraphError> {
        self.lookup_node(path)
            .ok_or_else(|| GraphError::UnknownTarget(path.to_owned()))
    }

    /// Targets to build when none are named: the declared defaults, else every root.
    pub fn default_targets(&self) -> Vec<NodeId> {
        if !self.defaults.is_empty() {
            return self.defaults.clone();
        }
        self.root_nodes()
    }

    /// Outputs nothing else consumes.
    pub fn root_nodes(&self) -> Vec<NodeId> {
        let mut roots = Vec::new();
        for edge in &self.edges {
            for &out in edge.outputs() {
                if self.node(out).is_root() {
                    roots.push(out);
                }
            }
        }
        roots
    }

    /// Forgets per-build state so the graph can drive another build. Nodes, edges, rules, pools
    /// and variables are kept.
    pub fn reset(&mut self) {
        for pool in &mut self.pools {
            pool.reset();
        }
    }

    pub fn bindings(&self) -> &ScopeRef {
        &self.bindings
    }

    /// Binds a global variable to a literal value.
    pub fn set_variable(&mut self, name: &str, value: &str) {
        self.bindings
            .borrow_mut()
            .define_expression(name, ninja_eval::Expression::literal(value));
    }

    pub fn variable(&self, name: &str) -> Option<String> {
        self.bindings.borrow().lookup_variable(name)
    }

    fn get_node(&mut self, path: String, slash_bits: u64) -> NodeId {
        match self.paths.insert(path.clone()) {
            ninja_paths::InsertResult::AlreadyExists(rf) => NodeId(rf),
            ninja_paths::InsertResult::Inserted(rf) => {
                debug_assert_eq!(rf, self.nodes.len());
                self.nodes.push(Node::new(path, slash_bits));
                NodeId(rf)
            }
        }
    }

    fn write_paths(&self, f: &mut fmt::Formatter<'_>, ids: &[NodeId]) -> fmt::Result {
        for id in ids {
            write!(f, " {}", self.node(*id).path_decanonicalized())?;
        }
        Ok(())
    }
}

/// Dumps the graph in manifest syntax. Bindings are shown unevaluated.
impl fmt::Display for Graph {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for pool in &self.pools {
            writeln!(f, "pool {}", pool.name())?;
            writeln!(f, "  depth = {}", pool.depth())?;
        }
        for rule in self.rules.iter().filter(|r| !r.is_phony()) {
            writeln!(f, "rule {}", rule.name())?;
            let scope = rule.scope().borrow();
            for name in scope.names() {
                if let Some(expr) = scope.binding(name) {
                    writeln!(f, "  {} = {}", name, expr)?;
                }
            }
        }
        for edge in &self.edges {
            write!(f, "build")?;
            self.write_paths(f, edge.explicit_outputs())?;
            if !edge.implicit_outputs().is_empty() {
                write!(f, " |")?;
                self.write_paths(f, edge.implicit_outputs())?;
            }
            write!(f, ": {}", self.rule(edge.rule()).name())?;
            self.write_paths(f, edge.explicit_inputs())?;
            if !edge.implicit_inputs().is_empty() {
                write!(f, " |")?;
                self.write_paths(f, edge.implicit_inputs())?;
            }
            if !edge.order_only_inputs().is_empty() {
                write!(f, " ||")?;
                self.write_paths(f, edge.order_only_inputs())?;
            }
            if !edge.validation_inputs().is_empty() {
                write!(f, " |@")?;
                self.write_paths(f, edge.validation_inputs())?;
            }
            writeln!(f)?;
            if !std::rc::Rc::ptr_eq(edge.scope(), self.rule(edge.rule()).scope()) {
                let scope = edge.scope().borrow();
                for name in scope.names() {
                    if let Some(expr) = scope.binding(name) {
                        writeln!(f, "  {} = {}", name, expr)?;
                    }
                }
            }
        }
        if !self.defaults.is_empty() {
            write!(f, "default")?;
            self.write_paths(f, &self.defaults)?;
            writeln!(f)?;
        }
        Ok(())
    }
}
