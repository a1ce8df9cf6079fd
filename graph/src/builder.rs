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

use std::collections::HashSet;

use ninja_eval::{Expression, Scope, ScopeRef};
use ninja_metrics::scoped_metric;
use ninja_paths::{canonicalize_path, Canonical};
use tracing::{debug, trace};

use crate::{
    rule::{is_reserved_binding, Rule},
    Edge, EdgeEnv, EdgeId, Escape, Graph, GraphError, NodeId, Pool, PoolId, RuleId,
};

/// Paths an edge produces. Each string is a path expression evaluated in the edge's scope.
#[derive(Debug, Default, Clone)]
pub struct OutputSpec {
    pub explicit: Vec<String>,
    pub implicit: Vec<String>,
}

impl OutputSpec {
    pub fn new<I, S>(explicit: I) -> OutputSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        OutputSpec {
            explicit: explicit.into_iter().map(Into::into).collect(),
            implicit: Vec::new(),
        }
    }

    pub fn implicit<I, S>(mut self, paths: I) -> OutputSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implicit.extend(paths.into_iter().map(Into::into));
        self
    }
}

/// Paths an edge consumes, by dependency class.
#[derive(Debug, Default, Clone)]
pub struct InputSpec {
    pub explicit: Vec<String>,
    pub implicit: Vec<String>,
    pub order_only: Vec<String>,
    pub validations: Vec<String>,
}

impl InputSpec {
    pub fn new<I, S>(explicit: I) -> InputSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        InputSpec {
            explicit: explicit.into_iter().map(Into::into).collect(),
            ..InputSpec::default()
        }
    }

    pub fn implicit<I, S>(mut self, paths: I) -> InputSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.implicit.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn order_only<I, S>(mut self, paths: I) -> InputSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.order_only.extend(paths.into_iter().map(Into::into));
        self
    }

    pub fn validations<I, S>(mut self, paths: I) -> InputSpec
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.validations.extend(paths.into_iter().map(Into::into));
        self
    }
}

fn read_path(scope: &ScopeRef, raw: &str) -> Result<Canonical, GraphError> {
    let expr = Expression::compile_path(raw).map_err(|source| GraphError::Expression {
        text: raw.to_owned(),
        source,
    })?;
    let value = scope.borrow().evaluate(&expr);
    canonicalize_path(&value).map_err(|source| GraphError::Path {
        text: raw.to_owned(),
        source,
    })
}

fn read_paths<'a, I>(scope: &ScopeRef, raw: I) -> Result<Vec<Canonical>, GraphError>
where
    I: IntoIterator<Item = &'a String>,
{
    raw.into_iter().map(|r| read_path(scope, r)).collect()
}

fn decanonicalized(paths: &[Canonical]) -> Vec<String> {
    paths
        .iter()
        .map(|c| ninja_paths::decanonicalize(&c.path, c.slash_bits))
        .collect()
}

impl Graph {
    pub fn add_rule(&mut self, name: &str, bindings: &[(&str, &str)]) -> Result<RuleId, GraphError> {
        if self.rule_by_name(name).is_some() {
            return Err(GraphError::DuplicateRule(name.to_owned()));
        }
        let scope = Scope::with_parent(self.bindings.clone());
        for (key, value) in bindings {
            if !is_reserved_binding(key) {
                return Err(GraphError::UnexpectedVariable {
                    rule: name.to_owned(),
                    variable: (*key).to_owned(),
                });
            }
            scope
                .borrow_mut()
                .define(key, value)
                .map_err(|source| GraphError::Expression {
                    text: (*value).to_owned(),
                    source,
                })?;
        }
        {
            let s = scope.borrow();
            if !s.has_binding("command") {
                return Err(GraphError::MissingCommand(name.to_owned()));
            }
            if s.has_binding("rspfile") != s.has_binding("rspfile_content") {
                return Err(GraphError::RspfilePair(name.to_owned()));
            }
        }
        debug!(rule = name, "added rule");
        self.rules.push(Rule::new(name.to_owned(), scope));
        Ok(RuleId(self.rules.len() - 1))
    }

    pub fn add_pool(&mut self, name: &str, depth: i64) -> Result<PoolId, GraphError> {
        if self.pool_by_name(name).is_some() {
            return Err(GraphError::DuplicatePool(name.to_owned()));
        }
        let depth = usize::try_from(depth).map_err(|_| GraphError::InvalidPoolDepth {
            name: name.to_owned(),
            depth,
        })?;
        debug!(pool = name, depth, "added pool");
        self.pools.push(Pool::new(name, depth));
        Ok(PoolId(self.pools.len() - 1))
    }

    /// Declares a build edge.
    ///
    /// Everything is resolved and checked first; nodes are created and wired only once the edge is
    /// known to be valid.
    pub fn add_edge(
        &mut self,
        outputs: &OutputSpec,
        rule_name: &str,
        inputs: &InputSpec,
        overrides: &[(&str, &str)],
    ) -> Result<EdgeId, GraphError> {
        scoped_metric!("add edge");
        let rule_id = self
            .rule_by_name(rule_name)
            .ok_or_else(|| GraphError::UnknownRule(rule_name.to_owned()))?;
        let rule = self.rule(rule_id);

        let scope = if overrides.is_empty() {
            rule.scope().clone()
        } else {
            let scope = Scope::with_parent(rule.scope().clone());
            for (key, value) in overrides {
                scope
                    .borrow_mut()
                    .define(key, value)
                    .map_err(|source| GraphError::Expression {
                        text: (*value).to_owned(),
                        source,
                    })?;
            }
            scope
        };

        let pool_name = EdgeEnv::new(rule, &scope, Vec::new(), Vec::new(), Escape::None).binding("pool");
        let pool = if pool_name.is_empty() {
            None
        } else {
            Some(
                self.pool_by_name(&pool_name)
                    .ok_or(GraphError::UnknownPool(pool_name))?,
            )
        };

        let mut outs = read_paths(&scope, &outputs.explicit)?;
        let explicit_outs = outs.len();
        outs.extend(read_paths(&scope, &outputs.implicit)?);
        if outs.is_empty() {
            return Err(GraphError::NoOutputs);
        }
        let mut seen = HashSet::new();
        for out in &outs {
            if !seen.insert(out.path.as_str()) {
                return Err(GraphError::DuplicateOutput(out.path.clone()));
            }
            if let Some(existing) = self.paths.lookup(&out.path) {
                let node = &self.nodes[existing];
                if node.in_edge().is_some() {
                    return Err(GraphError::DuplicateOutput(out.path.clone()));
                }
                if node.dyndep_pending() {
                    return Err(GraphError::DyndepIsOutput(out.path.clone()));
                }
            }
        }

        let mut ins = read_paths(&scope, &inputs.explicit)?;
        let explicit_ins = ins.len();
        ins.extend(read_paths(&scope, &inputs.implicit)?);
        if ins.is_empty() {
            return Err(GraphError::NoInputs);
        }
        ins.extend(read_paths(&scope, &inputs.order_only)?);
        ins.extend(read_paths(&scope, &inputs.validations)?);

        if ins.iter().any(|i| i.path == outs[0].path) {
            return Err(GraphError::PhonyCycle(outs[0].path.clone()));
        }

        let dyndep = EdgeEnv::new(
            rule,
            &scope,
            decanonicalized(&ins[..explicit_ins]),
            decanonicalized(&outs[..explicit_outs]),
            Escape::None,
        )
        .binding("dyndep");
        let dyndep = if dyndep.is_empty() {
            None
        } else {
            let canonical = canonicalize_path(&dyndep).map_err(|source| GraphError::Path {
                text: dyndep.clone(),
                source,
            })?;
            if !ins.iter().any(|i| i.path == canonical.path) {
                return Err(GraphError::DyndepNotInput(canonical.path));
            }
            let produced_elsewhere = self
                .paths
                .lookup(&canonical.path)
                .map(|n| self.nodes[n].in_edge().is_some())
                .unwrap_or(false);
            if produced_elsewhere || outs.iter().any(|o| o.path == canonical.path) {
                return Err(GraphError::DyndepIsOutput(canonical.path));
            }
            Some(canonical.path)
        };

        let id = EdgeId(self.edges.len());
        let implicit_outs = outs.len() - explicit_outs;
        let output_ids: Vec<NodeId> = outs
            .into_iter()
            .map(|c| self.get_node(c.path, c.slash_bits))
            .collect();
        let input_ids: Vec<NodeId> = ins
            .into_iter()
            .map(|c| self.get_node(c.path, c.slash_bits))
            .collect();
        for &out in &output_ids {
            self.nodes[out.0].set_in_edge(id);
        }
        let validation_start = input_ids.len() - inputs.validations.len();
        for (i, &input) in input_ids.iter().enumerate() {
            if i < validation_start {
                self.nodes[input.0].add_out_edge(id);
            } else {
                self.nodes[input.0].add_validation_out_edge(id);
            }
        }
        let dyndep = dyndep.and_then(|path| self.paths.lookup(&path)).map(NodeId);
        if let Some(node) = dyndep {
            self.nodes[node.0].set_dyndep_pending(true);
        }

        trace!(edge = id.0, rule = rule_name, "added edge");
        self.edges.push(Edge {
            rule: rule_id,
            pool,
            scope,
            outputs: output_ids,
            implicit_outs,
            implicit_deps: inputs.implicit.len(),
            order_only_deps: inputs.order_only.len(),
            validation_deps: inputs.validations.len(),
            inputs: input_ids,
            dyndep,
        });
        Ok(id)
    }

    /// Adds a target to the default set. Repeats are kept.
    pub fn add_default(&mut self, target: &str) -> Result<(), GraphError> {
        let node = self.target(target)?;
        self.defaults.push(node);
        Ok(())
    }

    pub fn add_defaults<I, S>(&mut self, targets: I) -> Result<(), GraphError>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        // Resolve all of them before recording any.
        let nodes = targets
            .into_iter()
            .map(|t| self.target(t.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.defaults.extend(nodes);
        Ok(())
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn graph_with_cc() -> Graph {
        let mut graph = Graph::new();
        graph
            .add_rule("cc", &[("command", "cc $cflags -c $in -o $out")])
            .unwrap();
        graph
    }

    #[test]
    fn phony_self_input() {
        let mut graph = Graph::new();
        let err = graph
            .add_edge(&OutputSpec::new(["a"]), "phony", &InputSpec::new(["a"]), &[])
            .unwrap_err();
        assert!(matches!(err, GraphError::PhonyCycle(ref p) if p == "a"));
        assert_eq!(graph.edge_count(), 0);
        assert_eq!(graph.node_count(), 0);

        graph
            .add_edge(&OutputSpec::new(["a"]), "phony", &InputSpec::new(["b"]), &[])
            .unwrap();
        assert!(graph.edge_is_phony(EdgeId(0)));
    }

    #[test]
    fn self_input_through_other_spelling() {
        let mut graph = graph_with_cc();
        let err = graph
            .add_edge(
                &OutputSpec::new(["out/a.o"]),
                "cc",
                &InputSpec::new(["a.c"]).order_only(["out/./a.o"]),
                &[],
            )
            .unwrap_err();
        assert!(matches!(err, GraphError::PhonyCycle(_)));
    }

    #[test]
    fn unknown_rule_binding() {
        let mut graph = Graph::new();
        let err = graph.add_rule("r", &[("unknown_key", "x")]).unwrap_err();
        assert!(matches!(
            err,
            GraphError::UnexpectedVariable { ref variable, .. } if variable == "unknown_key"
        ));
        graph.add_rule("r", &[("command", "echo hi")]).unwrap();
    }

    #[test]
    fn rule_errors() {
        let mut graph = graph_with_cc();
        assert!(matches!(
            graph.add_rule("cc", &[("command", "x")]),
            Err(GraphError::DuplicateRule(_))
        ));
        assert!(matches!(
            graph.add_rule("phony", &[("command", "x")]),
            Err(GraphError::DuplicateRule(_))
        ));
        assert!(matches!(
            graph.add_rule("nocmd", &[("description", "x")]),
            Err(GraphError::MissingCommand(_))
        ));
        assert!(matches!(
            graph.add_rule("rsp", &[("command", "x"), ("rspfile", "$out.rsp")]),
            Err(GraphError::RspfilePair(_))
        ));
        assert!(matches!(
            graph.add_rule("bad", &[("command", "x $")]),
            Err(GraphError::Expression { .. })
        ));
    }

    #[test]
    fn pool_errors() {
        let mut graph = Graph::new();
        assert!(matches!(
            graph.add_pool("console", 1),
            Err(GraphError::DuplicatePool(_))
        ));
        assert!(matches!(
            graph.add_pool("neg", -1),
            Err(GraphError::InvalidPoolDepth { depth: -1, .. })
        ));
        let link = graph.add_pool("link", 2).unwrap();
        assert_eq!(graph.pool(link).depth(), 2);
    }

    #[test]
    fn empty_lists() {
        let mut graph = graph_with_cc();
        assert!(matches!(
            graph.add_edge(&OutputSpec::default(), "cc", &InputSpec::new(["a"]), &[]),
            Err(GraphError::NoOutputs)
        ));
        let only_order = InputSpec::default().order_only(["gen"]).validations(["check"]);
        assert!(matches!(
            graph.add_edge(&OutputSpec::new(["o"]), "cc", &only_order, &[]),
            Err(GraphError::NoInputs)
        ));
        let implicit_only = InputSpec::default().implicit(["dep"]);
        graph
            .add_edge(&OutputSpec::new(["o"]), "cc", &implicit_only, &[])
            .unwrap();
    }

    #[test]
    fn duplicate_outputs() {
        let mut graph = graph_with_cc();
        graph
            .add_edge(&OutputSpec::new(["a.o"]), "cc", &InputSpec::new(["a.c"]), &[])
            .unwrap();
        assert!(matches!(
            graph.add_edge(&OutputSpec::new(["./a.o"]), "cc", &InputSpec::new(["b.c"]), &[]),
            Err(GraphError::DuplicateOutput(ref p)) if p == "a.o"
        ));
        assert!(matches!(
            graph.add_edge(
                &OutputSpec::new(["x.o"]).implicit(["x.o"]),
                "cc",
                &InputSpec::new(["x.c"]),
                &[]
            ),
            Err(GraphError::DuplicateOutput(_))
        ));
    }

    #[test]
    fn failed_edge_leaves_graph_untouched() {
        let mut graph = graph_with_cc();
        let err = graph.add_edge(
            &OutputSpec::new(["a.o"]),
            "cc",
            &InputSpec::new(["a.c"]),
            &[("pool", "nope")],
        );
        assert!(matches!(err, Err(GraphError::UnknownPool(ref p)) if p == "nope"));
        assert_eq!(graph.node_count(), 0);
        assert!(graph.lookup_node("a.o").is_none());
    }

    #[test]
    fn counts_and_classes() {
        let mut graph = graph_with_cc();
        let id = graph
            .add_edge(
                &OutputSpec::new(["a.o"]).implicit(["a.d"]),
                "cc",
                &InputSpec::new(["a.c", "b.c"])
                    .implicit(["a.h"])
                    .order_only(["gen"])
                    .validations(["lint"]),
                &[],
            )
            .unwrap();
        let edge = graph.edge(id);
        let names = |ids: &[NodeId]| {
            ids.iter()
                .map(|n| graph.node(*n).path().to_owned())
                .collect::<Vec<_>>()
        };
        assert_eq!(names(edge.explicit_outputs()), ["a.o"]);
        assert_eq!(names(edge.implicit_outputs()), ["a.d"]);
        assert_eq!(names(edge.explicit_inputs()), ["a.c", "b.c"]);
        assert_eq!(names(edge.implicit_inputs()), ["a.h"]);
        assert_eq!(names(edge.order_only_inputs()), ["gen"]);
        assert_eq!(names(edge.validation_inputs()), ["lint"]);
        assert_eq!(names(edge.dependencies()), ["a.c", "b.c", "a.h", "gen"]);
        assert_eq!(names(edge.dirtying_inputs()), ["a.c", "b.c", "a.h"]);
        assert!(edge.is_implicit(2));
        assert!(edge.is_order_only(3));
        assert!(!edge.is_order_only(4));

        let lint = graph.lookup_node("lint").unwrap();
        assert!(graph.node(lint).out_edges().is_empty());
        assert_eq!(graph.node(lint).validation_out_edges(), [id]);
        let gen = graph.lookup_node("gen").unwrap();
        assert_eq!(graph.node(gen).out_edges(), [id]);
        assert_eq!(graph.node(graph.lookup_node("a.d").unwrap()).in_edge(), Some(id));
    }

    #[test]
    fn paths_are_evaluated_in_edge_scope() {
        let mut graph = graph_with_cc();
        graph.set_variable("builddir", "out");
        let id = graph
            .add_edge(
                &OutputSpec::new(["$builddir/$name.o"]),
                "cc",
                &InputSpec::new(["src/../$name.c"]),
                &[("name", "foo")],
            )
            .unwrap();
        let edge = graph.edge(id);
        assert_eq!(graph.node(edge.outputs()[0]).path(), "out/foo.o");
        assert_eq!(graph.node(edge.inputs()[0]).path(), "foo.c");
    }

    #[test]
    fn bad_paths() {
        let mut graph = graph_with_cc();
        assert!(matches!(
            graph.add_edge(&OutputSpec::new(["$empty"]), "cc", &InputSpec::new(["a"]), &[]),
            Err(GraphError::Path { .. })
        ));
        assert!(matches!(
            graph.add_edge(&OutputSpec::new(["a b"]), "cc", &InputSpec::new(["a"]), &[]),
            Err(GraphError::Expression { .. })
        ));
        graph
            .add_edge(&OutputSpec::new(["a$ b"]), "cc", &InputSpec::new(["a"]), &[])
            .unwrap();
        assert!(graph.lookup_node("a b").is_some());
    }

    #[test]
    fn pools_resolve_through_bindings() {
        let mut graph = Graph::new();
        graph.add_pool("link", 2).unwrap();
        graph.set_variable("linkpool", "link");
        graph
            .add_rule("ld", &[("command", "ld -o $out $in"), ("pool", "$linkpool")])
            .unwrap();
        graph
            .add_rule("run", &[("command", "./$in"), ("pool", "console")])
            .unwrap();
        let a = graph
            .add_edge(&OutputSpec::new(["app"]), "ld", &InputSpec::new(["a.o"]), &[])
            .unwrap();
        let t = graph
            .add_edge(&OutputSpec::new(["test"]), "run", &InputSpec::new(["app"]), &[])
            .unwrap();
        let free = graph
            .add_edge(
                &OutputSpec::new(["app2"]),
                "ld",
                &InputSpec::new(["b.o"]),
                &[("pool", "")],
            )
            .unwrap();
        assert_eq!(graph.edge(a).pool(), graph.pool_by_name("link"));
        assert!(graph.edge_uses_console(t));
        assert!(!graph.edge_uses_console(a));
        assert_eq!(graph.edge(free).pool(), None);
    }

    #[test]
    fn dyndep_must_be_input() {
        let mut graph = Graph::new();
        graph
            .add_rule("dd", &[("command", "touch $out"), ("dyndep", "$dd")])
            .unwrap();
        assert!(matches!(
            graph.add_edge(
                &OutputSpec::new(["out"]),
                "dd",
                &InputSpec::new(["in"]),
                &[("dd", "dd.json")]
            ),
            Err(GraphError::DyndepNotInput(ref p)) if p == "dd.json"
        ));

        let id = graph
            .add_edge(
                &OutputSpec::new(["out"]),
                "dd",
                &InputSpec::new(["in"]).order_only(["./dd.json"]),
                &[("dd", "dd.json")],
            )
            .unwrap();
        let node = graph.edge(id).dyndep().unwrap();
        assert_eq!(graph.node(node).path(), "dd.json");
        assert!(graph.node(node).dyndep_pending());

        // A pending dyndep file cannot then be claimed as someone's output.
        assert!(matches!(
            graph.add_edge(&OutputSpec::new(["dd.json"]), "phony", &InputSpec::new(["x"]), &[]),
            Err(GraphError::DyndepIsOutput(_))
        ));
    }

    #[test]
    fn dyndep_produced_elsewhere() {
        let mut graph = Graph::new();
        graph
            .add_rule("dd", &[("command", "touch $out"), ("dyndep", "$in")])
            .unwrap();
        graph
            .add_edge(&OutputSpec::new(["gen.dd"]), "phony", &InputSpec::new(["src"]), &[])
            .unwrap();
        assert!(matches!(
            graph.add_edge(&OutputSpec::new(["out"]), "dd", &InputSpec::new(["gen.dd"]), &[]),
            Err(GraphError::DyndepIsOutput(_))
        ));
    }

    #[test]
    fn defaults() {
        let mut graph = graph_with_cc();
        graph
            .add_edge(&OutputSpec::new(["a.o"]), "cc", &InputSpec::new(["a.c"]), &[])
            .unwrap();
        graph
            .add_edge(&OutputSpec::new(["b.o"]), "cc", &InputSpec::new(["b.c"]), &[])
            .unwrap();
        graph
            .add_edge(&OutputSpec::new(["app"]), "phony", &InputSpec::new(["a.o"]), &[])
            .unwrap();
        let app = graph.lookup_node("app").unwrap();
        let b = graph.lookup_node("b.o").unwrap();
        assert_eq!(graph.default_targets(), [b, app]);

        assert!(matches!(
            graph.add_default("missing"),
            Err(GraphError::UnknownTarget(_))
        ));
        assert!(graph.add_defaults(["app", "nope"]).is_err());
        graph.add_defaults(["./app", "b.o", "app"]).unwrap();
        assert_eq!(graph.default_targets(), [app, b, app]);
    }

    #[test]
    fn reset_frees_pools_and_keeps_edges() {
        let mut graph = Graph::new();
        let link = graph.add_pool("link", 1).unwrap();
        graph
            .add_rule("ld", &[("command", "ld -o $out $in"), ("pool", "link")])
            .unwrap();
        graph
            .add_edge(&OutputSpec::new(["app"]), "ld", &InputSpec::new(["a.o"]), &[])
            .unwrap();
        graph.add_default("app").unwrap();
        assert!(graph.pool_mut(link).acquire());
        assert!(!graph.pool(link).can_admit());

        graph.reset();
        assert_eq!(graph.pool(link).in_flight(), 0);
        assert!(graph.pool(link).can_admit());
        assert_eq!(graph.edge_count(), 1);
        assert_eq!(graph.default_targets(), [graph.target("app").unwrap()]);
    }
}
