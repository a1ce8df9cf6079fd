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

use std::{
    collections::{hash_map::DefaultHasher, HashMap},
    hash::{Hash, Hasher},
};

use ninja_graph::{EdgeId, Graph};

use crate::interface::{BuildLog, BuildRecord};

fn hash_command(command: &str) -> u64 {
    let mut hasher = DefaultHasher::new();
    command.hash(&mut hasher);
    hasher.finish()
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LogEntry {
    pub command_hash: u64,
    pub record: BuildRecord,
}

/// Keeps successful runs in memory, keyed by the edge's first output.
#[derive(Debug, Default)]
pub struct MemoryBuildLog {
    entries: HashMap<String, LogEntry>,
}

impl MemoryBuildLog {
    pub fn new() -> MemoryBuildLog {
        MemoryBuildLog::default()
    }

    pub fn lookup(&self, output: &str) -> Option<&LogEntry> {
        self.entries.get(output)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    fn key(graph: &Graph, edge: EdgeId) -> Option<&str> {
        graph
            .edge(edge)
            .outputs()
            .first()
            .map(|n| graph.node(*n).path())
    }
}

impl BuildLog for MemoryBuildLog {
    fn was_up_to_date(&self, graph: &Graph, edge: EdgeId, command: &str) -> bool {
        Self::key(graph, edge)
            .and_then(|k| self.entries.get(k))
            .map(|e| e.command_hash == hash_command(command))
            .unwrap_or(false)
    }

    fn record_completion(&mut self, graph: &Graph, edge: EdgeId, record: BuildRecord) {
        if !record.status.is_success() {
            return;
        }
        if let Some(key) = Self::key(graph, edge) {
            self.entries.insert(
                key.to_owned(),
                LogEntry {
                    command_hash: hash_command(&record.command),
                    record,
                },
            );
        }
    }
}

#[cfg(test)]
mod test {
    use std::time::Duration;

    use ninja_exec::ExitStatus;
    use ninja_graph::{InputSpec, OutputSpec};

    use super::*;

    fn record(command: &str, status: ExitStatus) -> BuildRecord {
        BuildRecord {
            command: command.to_owned(),
            status,
            duration: Duration::from_millis(5),
        }
    }

    #[test]
    fn keyed_by_first_output_and_command() {
        let mut graph = Graph::new();
        graph.add_rule("cc", &[("command", "cc $in")]).unwrap();
        let e = graph
            .add_edge(
                &OutputSpec::new(["a.o", "a.lst"]),
                "cc",
                &InputSpec::new(["a.c"]),
                &[],
            )
            .unwrap();

        let mut log = MemoryBuildLog::new();
        assert!(!log.was_up_to_date(&graph, e, "cc a.c"));

        log.record_completion(&graph, e, record("cc a.c", ExitStatus::Failure));
        assert!(log.is_empty());

        log.record_completion(&graph, e, record("cc a.c", ExitStatus::Success));
        assert!(log.was_up_to_date(&graph, e, "cc a.c"));
        assert!(!log.was_up_to_date(&graph, e, "cc -O2 a.c"));
        assert!(log.lookup("a.o").is_some());
        assert!(log.lookup("a.lst").is_none());
    }
}
