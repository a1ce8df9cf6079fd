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

use std::{cell::RefCell, rc::Rc};

use ninja_eval::{shell_escape, Env, Expression, ScopeRef};

use crate::{Graph, NodeId, PoolId, Rule, RuleId};

/// One invocation of a rule.
///
/// Inputs live in a single list laid out as explicit, implicit, order-only, validation. Outputs
/// are explicit followed by implicit. The counts recover the boundaries.
#[derive(Debug, Clone)]
pub struct Edge {
    pub(crate) rule: RuleId,
    pub(crate) pool: Option<PoolId>,
    pub(crate) scope: ScopeRef,
    pub(crate) outputs: Vec<NodeId>,
    pub(crate) implicit_outs: usize,
    pub(crate) inputs: Vec<NodeId>,
    pub(crate) implicit_deps: usize,
    pub(crate) order_only_deps: usize,
    pub(crate) validation_deps: usize,
    pub(crate) dyndep: Option<NodeId>,
}

impl Edge {
    pub fn rule(&self) -> RuleId {
        self.rule
    }

    pub fn pool(&self) -> Option<PoolId> {
        self.pool
    }

    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }

    pub fn dyndep(&self) -> Option<NodeId> {
        self.dyndep
    }

    pub fn outputs(&self) -> &[NodeId] {
        &self.outputs
    }

    pub fn explicit_outputs(&self) -> &[NodeId] {
        &self.outputs[..self.outputs.len() - self.implicit_outs]
    }

    pub fn implicit_outputs(&self) -> &[NodeId] {
        &self.outputs[self.outputs.len() - self.implicit_outs..]
    }

    /// Every input, validations included.
    pub fn inputs(&self) -> &[NodeId] {
        &self.inputs
    }

    fn explicit_count(&self) -> usize {
        self.inputs.len() - self.implicit_deps - self.order_only_deps - self.validation_deps
    }

    pub fn explicit_inputs(&self) -> &[NodeId] {
        &self.inputs[..self.explicit_count()]
    }

    pub fn implicit_inputs(&self) -> &[NodeId] {
        let start = self.explicit_count();
        &self.inputs[start..start + self.implicit_deps]
    }

    pub fn order_only_inputs(&self) -> &[NodeId] {
        let start = self.explicit_count() + self.implicit_deps;
        &self.inputs[start..start + self.order_only_deps]
    }

    pub fn validation_inputs(&self) -> &[NodeId] {
        &self.inputs[self.inputs.len() - self.validation_deps..]
    }

    /// Inputs that must be ready before this edge may run: explicit, implicit and order-only.
    pub fn dependencies(&self) -> &[NodeId] {
        &self.inputs[..self.inputs.len() - self.validation_deps]
    }

    /// Inputs whose modification makes the outputs stale.
    pub fn dirtying_inputs(&self) -> &[NodeId] {
        &self.inputs[..self.explicit_count() + self.implicit_deps]
    }

    /// `inputs[index]` is order-only.
    pub fn is_order_only(&self, index: usize) -> bool {
        let start = self.explicit_count() + self.implicit_deps;
        index >= start && index < start + self.order_only_deps
    }

    /// `inputs[index]` is implicit.
    pub fn is_implicit(&self, index: usize) -> bool {
        let start = self.explicit_count();
        index >= start && index < start + self.implicit_deps
    }
}

/// How `$in` and `$out` are spelled when substituted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Escape {
    Shell,
    None,
}

/// Variable lookup for a single edge.
///
/// Resolution order: `in`, `in_newline` and `out`; then the edge's own overrides; then the rule's
/// bindings, evaluated against this environment so they can see the first two; then the global
/// scope.
pub struct EdgeEnv<'a> {
    rule: &'a Rule,
    scope: &'a ScopeRef,
    inputs: Vec<String>,
    outputs: Vec<String>,
    escape: Escape,
    // Names being expanded at each layer; a name that refers to itself resolves one layer out.
    overriding: RefCell<Vec<String>>,
    evaluating: RefCell<Vec<String>>,
}

impl<'a> EdgeEnv<'a> {
    /// `inputs` and `outputs` are the explicit paths, already decanonicalized.
    pub fn new(
        rule: &'a Rule,
        scope: &'a ScopeRef,
        inputs: Vec<String>,
        outputs: Vec<String>,
        escape: Escape,
    ) -> EdgeEnv<'a> {
        EdgeEnv {
            rule,
            scope,
            inputs,
            outputs,
            escape,
            overriding: RefCell::new(Vec::new()),
            evaluating: RefCell::new(Vec::new()),
        }
    }

    fn join(&self, paths: &[String], sep: char) -> String {
        let mut joined = String::new();
        for (i, path) in paths.iter().enumerate() {
            if i > 0 {
                joined.push(sep);
            }
            match self.escape {
                Escape::Shell => joined.push_str(&shell_escape(path)),
                Escape::None => joined.push_str(path),
            }
        }
        joined
    }

    fn expand(
        &self,
        guard: &RefCell<Vec<String>>,
        name: &str,
        expr: &Expression,
    ) -> Option<String> {
        if guard.borrow().iter().any(|n| n == name) {
            return None;
        }
        guard.borrow_mut().push(name.to_owned());
        let value = expr.evaluate(self);
        guard.borrow_mut().pop();
        Some(value)
    }

    fn override_binding(&self, name: &str) -> Option<String> {
        if Rc::ptr_eq(self.scope, self.rule.scope()) {
            return None;
        }
        let expr = self.scope.borrow().binding(name).cloned()?;
        self.expand(&self.overriding, name, &expr)
    }

    fn rule_binding(&self, name: &str) -> Option<String> {
        let expr = self.rule.binding(name)?;
        self.expand(&self.evaluating, name, &expr)
    }

    /// The binding's value, or the empty string when nothing binds it.
    pub fn binding(&self, name: &str) -> String {
        self.lookup_variable(name).unwrap_or_default()
    }

    pub fn binding_bool(&self, name: &str) -> bool {
        !self.binding(name).is_empty()
    }
}

impl<'a> Env for EdgeEnv<'a> {
    fn lookup_variable(&self, name: &str) -> Option<String> {
        match name {
            "in" => return Some(self.join(&self.inputs, ' ')),
            "in_newline" => return Some(self.join(&self.inputs, '\n')),
            "out" => return Some(self.join(&self.outputs, ' ')),
            _ => {}
        }
        if let Some(value) = self.override_binding(name) {
            return Some(value);
        }
        if let Some(value) = self.rule_binding(name) {
            return Some(value);
        }
        self.rule.scope().borrow().lookup_in_parent(name)
    }
}

impl Graph {
    pub fn edge_env(&self, id: crate::EdgeId, escape: Escape) -> EdgeEnv<'_> {
        let edge = self.edge(id);
        let paths = |ids: &[NodeId]| {
            ids.iter()
                .map(|n| self.node(*n).path_decanonicalized())
                .collect::<Vec<_>>()
        };
        EdgeEnv::new(
            self.rule(edge.rule),
            &edge.scope,
            paths(edge.explicit_inputs()),
            paths(edge.explicit_outputs()),
            escape,
        )
    }

    /// The fully expanded command line, with paths quoted for the shell.
    pub fn evaluate_command(&self, id: crate::EdgeId) -> String {
        self.edge_env(id, Escape::Shell).binding("command")
    }

    /// Any edge binding, evaluated the way commands are.
    pub fn edge_binding(&self, id: crate::EdgeId, name: &str) -> String {
        self.edge_env(id, Escape::Shell).binding(name)
    }

    /// Bindings that name files (`depfile`, `dyndep`, `rspfile`) want the raw paths.
    pub fn edge_path_binding(&self, id: crate::EdgeId, name: &str) -> String {
        self.edge_env(id, Escape::None).binding(name)
    }

    pub fn edge_is_phony(&self, id: crate::EdgeId) -> bool {
        self.rule(self.edge(id).rule).is_phony()
    }

    pub fn edge_is_generator(&self, id: crate::EdgeId) -> bool {
        self.edge_env(id, Escape::None).binding_bool("generator")
    }

    pub fn edge_uses_console(&self, id: crate::EdgeId) -> bool {
        self.edge(id)
            .pool
            .map(|p| self.pool(p).is_console())
            .unwrap_or(false)
    }
}
