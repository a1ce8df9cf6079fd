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

//! The `$`-escape text expansion language.
//!
//! Every command and path string in a build graph is compiled once into an [`Expression`] and
//! evaluated later against something implementing [`Env`], usually a [`Scope`]. The language is
//! flat substitution: literals and variable references, nothing else.

use thiserror::Error;

mod escape;
mod expr;
mod scope;

pub use escape::shell_escape;
pub use expr::{Expression, Mode, Segment};
pub use scope::{Scope, ScopeRef};

/// Resolves variable names during evaluation.
pub trait Env {
    /// The evaluated value of `name`, or `None` when nothing visible binds it.
    fn lookup_variable(&self, name: &str) -> Option<String>;
}

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ExprError {
    #[error("bad $-escape (literal $ must be written as $$) at byte {0}")]
    BadEscape(usize),
    #[error("expected '}}' to close variable reference starting at byte {0}")]
    MissingBrace(usize),
    #[error("carriage return not followed by a newline at byte {0}")]
    BareCarriageReturn(usize),
    #[error("unexpected text after the end of the string at byte {0}")]
    TrailingText(usize),
}
