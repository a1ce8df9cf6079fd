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

use ninja_eval::ExprError;
use ninja_paths::PathError;
use thiserror::Error;

/// Defects in the declared graph. All of them abort construction.
#[derive(Error, Debug)]
pub enum GraphError {
    #[error("duplicate rule '{0}'")]
    DuplicateRule(String),
    #[error("duplicate pool '{0}'")]
    DuplicatePool(String),
    #[error("invalid pool depth {depth} for pool '{name}'")]
    InvalidPoolDepth { name: String, depth: i64 },
    #[error("unknown rule '{0}'")]
    UnknownRule(String),
    #[error("unknown pool name '{0}'")]
    UnknownPool(String),
    #[error("unexpected variable '{variable}' in rule '{rule}'")]
    UnexpectedVariable { rule: String, variable: String },
    #[error("expected 'command =' line in rule '{0}'")]
    MissingCommand(String),
    #[error("rspfile and rspfile_content need to be both specified in rule '{0}'")]
    RspfilePair(String),
    #[error("{source} in '{text}'")]
    Expression { text: String, source: ExprError },
    #[error("{source}: '{text}'")]
    Path { text: String, source: PathError },
    #[error("build does not have any outputs")]
    NoOutputs,
    #[error("build does not have any inputs")]
    NoInputs,
    #[error("'{0}' names itself as an input")]
    PhonyCycle(String),
    #[error("multiple rules generate {0}")]
    DuplicateOutput(String),
    #[error("dyndep '{0}' is not an input")]
    DyndepNotInput(String),
    #[error("dyndep '{0}' is already an output")]
    DyndepIsOutput(String),
    #[error("unknown target '{0}'")]
    UnknownTarget(String),
}
