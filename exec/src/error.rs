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

use thiserror::Error;

#[derive(Error, Debug)]
pub enum ExecError {
    /// The OS refused to start the child. Never retried.
    #[error("failed to spawn '{command}': {source}")]
    Spawn { command: String, source: io::Error },
    #[error("failed to create output pipe: {0}")]
    Pipe(#[source] io::Error),
    #[error("poll failed: {0}")]
    Poll(#[source] io::Error),
    #[error("signal setup failed: {0}")]
    Signals(#[source] io::Error),
    #[error("failed to wait for process {pid}: {source}")]
    Wait { pid: u32, source: io::Error },
    #[error("no subprocess with handle {0}")]
    UnknownHandle(usize),
}
