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

use std::rc::Rc;

use ninja_eval::{Expression, ScopeRef};

/// Names a rule may bind. Anything else is almost certainly a typo.
pub const RESERVED_BINDINGS: &[&str] = &[
    "command",
    "depfile",
    "dyndep",
    "description",
    "deps",
    "generator",
    "pool",
    "restat",
    "rspfile",
    "rspfile_content",
    "msvc_deps_prefix",
];

pub const PHONY: &str = "phony";

pub fn is_reserved_binding(name: &str) -> bool {
    RESERVED_BINDINGS.contains(&name)
}

#[derive(Debug, Clone)]
pub struct Rule {
    name: String,
    scope: ScopeRef,
}

impl Rule {
    pub(crate) fn new(name: String, scope: ScopeRef) -> Rule {
        Rule { name, scope }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn scope(&self) -> &ScopeRef {
        &self.scope
    }

    /// The unevaluated binding, if the rule itself defines `name`.
    pub fn binding(&self, name: &str) -> Option<Rc<Expression>> {
        self.scope.borrow().binding(name).cloned()
    }

    pub fn is_phony(&self) -> bool {
        self.name == PHONY
    }
}
