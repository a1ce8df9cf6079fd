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

use std::io;

use ninja_exec::ExecError;
use ninja_graph::GraphError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum BuildError {
    #[error("dependency cycle involving '{0}'")]
    Cycle(String),
    #[error("'{path}', needed by '{needed_by}', missing and no known rule to make it")]
    MissingInput { path: String, needed_by: String },
    #[error("'{0}' missing and no known rule to make it")]
    MissingTarget(String),
    #[error("{0} subcommand(s) failed")]
    Failed(usize),
    #[error("interrupted by user")]
    Interrupted,
    #[error("{path}: {source}")]
    Io { path: String, source: io::Error },
    #[error("invalid value for {name}: '{value}'")]
    InvalidEnv { name: &'static str, value: String },
    #[error(transparent)]
    Exec(#[from] ExecError),
    #[error(transparent)]
    Graph(#[from] GraphError),
}
