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

use std::{cell::RefCell, collections::HashMap, fmt, rc::Rc};

use super::{Env, ExprError, Expression};

pub type ScopeRef = Rc<RefCell<Scope>>;

/// A set of bindings with an optional parent to fall back to.
///
/// A binding is always evaluated in the scope that defines it, never in the scope that asked for
/// it. While a binding is being evaluated, a reference to its own name skips it and resolves in
/// the parent chain, so `cflags = $cflags -O2` extends an outer `cflags` and no chain of
/// references can loop.
#[derive(Default)]
pub struct Scope {
    bindings: HashMap<String, Rc<Expression>>,
    parent: Option<ScopeRef>,
    evaluating: RefCell<Vec<String>>,
}

impl Scope {
    pub fn new() -> Scope {
        Scope::default()
    }

    pub fn new_ref() -> ScopeRef {
        Rc::new(RefCell::new(Scope::new()))
    }

    pub fn with_parent(parent: ScopeRef) -> ScopeRef {
        Rc::new(RefCell::new(Scope {
            parent: Some(parent),
            ..Default::default()
        }))
    }

    pub fn parent(&self) -> Option<&ScopeRef> {
        self.parent.as_ref()
    }

    /// Compiles `raw` and binds it here, replacing any binding of `name` in this scope only.
    pub fn define(&mut self, name: &str, raw: &str) -> Result<(), ExprError> {
        let expr = Expression::compile_text(raw)?;
        self.define_expression(name, expr);
        Ok(())
    }

    pub fn define_expression(&mut self, name: &str, expr: Expression) {
        self.bindings.insert(name.to_owned(), Rc::new(expr));
    }

    /// The nearest definition of `name`, searching parents.
    pub fn lookup(&self, name: &str) -> Option<Rc<Expression>> {
        match self.bindings.get(name) {
            Some(expr) => Some(expr.clone()),
            None => self
                .parent
                .as_ref()
                .and_then(|p| p.borrow().lookup(name)),
        }
    }

    /// The definition of `name` in this scope, ignoring parents.
    pub fn binding(&self, name: &str) -> Option<&Rc<Expression>> {
        self.bindings.get(name)
    }

    pub fn has_binding(&self, name: &str) -> bool {
        self.bindings.contains_key(name)
    }

    pub fn is_empty(&self) -> bool {
        self.bindings.is_empty()
    }

    pub fn evaluate(&self, expr: &Expression) -> String {
        expr.evaluate(self)
    }

    /// Evaluates this scope's own binding of `name`, if it has one that is not already being
    /// evaluated.
    pub fn evaluate_local(&self, name: &str) -> Option<String> {
        let expr = self.bindings.get(name)?;
        if self.evaluating.borrow().iter().any(|n| n == name) {
            return None;
        }
        self.evaluating.borrow_mut().push(name.to_owned());
        let value = expr.evaluate(self);
        self.evaluating.borrow_mut().pop();
        Some(value)
    }

    pub fn lookup_in_parent(&self, name: &str) -> Option<String> {
        self.parent
            .as_ref()
            .and_then(|p| p.borrow().lookup_variable(name))
    }

    /// Binding names in this scope, sorted.
    pub fn names(&self) -> Vec<&str> {
        let mut names: Vec<&str> = self.bindings.keys().map(String::as_str).collect();
        names.sort_unstable();
        names
    }
}

impl Env for Scope {
    fn lookup_variable(&self, name: &str) -> Option<String> {
        self.evaluate_local(name)
            .or_else(|| self.lookup_in_parent(name))
    }
}

impl fmt::Debug for Scope {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut map = f.debug_map();
        for name in self.names() {
            map.entry(&name, &self.bindings[name].to_string());
        }
        map.finish()
    }
}
