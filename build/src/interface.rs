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

//! Seams between the driver and the outside world.

use std::{
    io,
    time::{Duration, SystemTime},
};

use ninja_exec::ExitStatus;
use ninja_graph::{EdgeId, Graph};

/// What the driver remembers about a finished command.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildRecord {
    pub command: String,
    pub status: ExitStatus,
    pub duration: Duration,
}

/// Incremental state carried between builds.
pub trait BuildLog {
    /// Whether `edge` last ran successfully with exactly `command`.
    fn was_up_to_date(&self, graph: &Graph, edge: EdgeId, command: &str) -> bool;
    fn record_completion(&mut self, graph: &Graph, edge: EdgeId, record: BuildRecord);
}

/// Filesystem access, so the driver can be tested without touching the disk.
pub trait DiskInterface {
    /// `Ok(None)` when the file does not exist.
    fn mtime(&self, path: &str) -> io::Result<Option<SystemTime>>;
    fn make_dirs(&self, path: &str) -> io::Result<()>;
    /// `Ok(false)` when there was nothing to remove.
    fn remove_file(&self, path: &str) -> io::Result<bool>;

    fn exists(&self, path: &str) -> io::Result<bool> {
        Ok(self.mtime(path)?.is_some())
    }
}
