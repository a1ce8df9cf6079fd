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

//! The reference driver.
//!
//! Planning walks back from the requested targets, collects every edge they need and orders them
//! with petgraph so cycles surface before anything runs. Execution is a single loop: start what is
//! ready and admitted, wait on the process set, retire what finished, repeat.
//!
//! Dirtiness is decided when an edge becomes ready rather than up front, so mtimes reflect
//! whatever its dependencies just wrote.

use std::{
    collections::{HashMap, HashSet, VecDeque},
    path::Path,
    time::{Instant, SystemTime},
};

use ninja_exec::{Completion, ExitStatus, ProcessSet, SubprocessHandle};
use ninja_graph::{EdgeId, Graph, NodeId};
use ninja_metrics::scoped_metric;
use petgraph::{
    algo::toposort,
    graph::{DiGraph, NodeIndex},
};
use tracing::{debug, info, warn};

use crate::{
    interface::{BuildLog, BuildRecord, DiskInterface},
    status::StatusPrinter,
    BuildConfig, BuildError,
};

#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct BuildSummary {
    /// Commands that ran (or would have, in a dry run) and succeeded.
    pub ran: usize,
    /// Edges whose outputs were already current.
    pub up_to_date: usize,
}

struct Plan {
    order: Vec<EdgeId>,
    // Unfinished producer edges of each edge's explicit, implicit and order-only inputs.
    pending: HashMap<EdgeId, usize>,
}

struct Running {
    edge: EdgeId,
    command: String,
    started: Instant,
}

struct RunState {
    ready: VecDeque<EdgeId>,
    delayed: VecDeque<EdgeId>,
    pending: HashMap<EdgeId, usize>,
    ran: HashSet<EdgeId>,
    // Effective mtimes of phony outputs that do not exist on disk.
    phony_mtimes: HashMap<NodeId, Option<SystemTime>>,
    running: HashMap<SubprocessHandle, Running>,
    failures: usize,
    summary: BuildSummary,
    status: StatusPrinter,
}

pub struct Builder<'a> {
    graph: &'a mut Graph,
    log: &'a mut dyn BuildLog,
    disk: &'a dyn DiskInterface,
    config: BuildConfig,
}

impl<'a> Builder<'a> {
    pub fn new(
        graph: &'a mut Graph,
        log: &'a mut dyn BuildLog,
        disk: &'a dyn DiskInterface,
        config: BuildConfig,
    ) -> Builder<'a> {
        Builder {
            graph,
            log,
            disk,
            config,
        }
    }

    /// Builds whatever [`Graph::default_targets`] selects.
    pub fn build_defaults(&mut self) -> Result<BuildSummary, BuildError> {
        let targets = self.graph.default_targets();
        self.build(&targets)
    }

    pub fn build_paths<S: AsRef<str>>(&mut self, paths: &[S]) -> Result<BuildSummary, BuildError> {
        let targets = paths
            .iter()
            .map(|p| self.graph.target(p.as_ref()))
            .collect::<Result<Vec<_>, _>>()?;
        self.build(&targets)
    }

    pub fn build(&mut self, targets: &[NodeId]) -> Result<BuildSummary, BuildError> {
        scoped_metric!("build");
        self.graph.reset();
        let plan = self.plan(targets)?;
        let total = plan
            .order
            .iter()
            .filter(|e| !self.graph.edge_is_phony(**e))
            .count();
        let mut status = StatusPrinter::new(self.config.verbose);
        status.plan(total);
        let mut st = RunState {
            ready: plan
                .order
                .iter()
                .copied()
                .filter(|e| plan.pending[e] == 0)
                .collect(),
            delayed: VecDeque::new(),
            pending: plan.pending,
            ran: HashSet::new(),
            phony_mtimes: HashMap::new(),
            running: HashMap::new(),
            failures: 0,
            summary: BuildSummary::default(),
            status,
        };

        let mut processes = if self.config.dry_run || total == 0 {
            None
        } else {
            Some(ProcessSet::new(self.config.process.clone())?)
        };

        loop {
            if let Err(e) = self.start_edges(&mut st, &mut processes) {
                if let Some(ps) = processes.as_mut() {
                    self.abort(&mut st, ps);
                }
                return Err(e);
            }
            let ps = match processes.as_mut() {
                Some(ps) if !st.running.is_empty() => ps,
                _ => break,
            };
            if let Err(e) = self.wait_and_retire(&mut st, ps) {
                self.abort(&mut st, ps);
                return Err(e);
            }
        }
        st.status.build_finished();

        if st.failures > 0 {
            info!("build stopped: {} failure(s)", st.failures);
            return Err(BuildError::Failed(st.failures));
        }
        info!(ran = st.summary.ran, up_to_date = st.summary.up_to_date, "build finished");
        Ok(st.summary)
    }

    fn wait_and_retire(&mut self, st: &mut RunState, ps: &mut ProcessSet) -> Result<(), BuildError> {
        if ps.wait_for_readiness()? {
            warn!("interrupted, stopping {} running command(s)", st.running.len());
            return Err(BuildError::Interrupted);
        }
        while let Some(handle) = ps.next_finished() {
            let completion = ps.finish(handle)?;
            if let Some(running) = st.running.remove(&handle) {
                self.edge_completed(st, running, completion)?;
            }
        }
        Ok(())
    }

    fn plan(&self, targets: &[NodeId]) -> Result<Plan, BuildError> {
        let graph = &*self.graph;
        let mut needed = Vec::new();
        let mut seen_edges = HashSet::new();
        let mut seen_nodes = HashSet::new();
        let mut stack: Vec<(NodeId, Option<EdgeId>)> = targets.iter().rev().map(|t| (*t, None)).collect();
        while let Some((node, needed_by)) = stack.pop() {
            if !seen_nodes.insert(node) {
                continue;
            }
            match graph.node(node).in_edge() {
                Some(edge) => {
                    if seen_edges.insert(edge) {
                        needed.push(edge);
                        for input in graph.edge(edge).inputs().iter().rev() {
                            stack.push((*input, Some(edge)));
                        }
                    }
                }
                None => {
                    let path = graph.node(node).path_decanonicalized();
                    if !self.disk.exists(&path).map_err(|source| BuildError::Io {
                        path: path.clone(),
                        source,
                    })? {
                        return Err(match needed_by {
                            Some(edge) => BuildError::MissingInput {
                                path,
                                needed_by: first_output(graph, edge),
                            },
                            None => BuildError::MissingTarget(path),
                        });
                    }
                }
            }
        }

        let mut dag: DiGraph<EdgeId, ()> = DiGraph::new();
        let index: HashMap<EdgeId, NodeIndex> = needed.iter().map(|&e| (e, dag.add_node(e))).collect();
        let mut pending = HashMap::new();
        for &edge in &needed {
            let mut producers: Vec<EdgeId> = graph
                .edge(edge)
                .dependencies()
                .iter()
                .filter_map(|n| graph.node(*n).in_edge())
                .collect();
            producers.sort();
            producers.dedup();
            pending.insert(edge, producers.len());
            for producer in producers {
                dag.add_edge(index[&producer], index[&edge], ());
            }
        }
        let order = toposort(&dag, None)
            .map_err(|cycle| BuildError::Cycle(first_output(graph, dag[cycle.node_id()])))?
            .into_iter()
            .map(|i| dag[i])
            .collect();
        Ok(Plan { order, pending })
    }

    fn failures_exhausted(&self, st: &RunState) -> bool {
        self.config.failures_allowed != 0 && st.failures >= self.config.failures_allowed
    }

    fn start_edges(
        &mut self,
        st: &mut RunState,
        processes: &mut Option<ProcessSet>,
    ) -> Result<(), BuildError> {
        while st.running.len() < self.config.parallelism.max(1) && !self.failures_exhausted(st) {
            let edge = match st.ready.pop_front() {
                Some(e) => e,
                None => break,
            };
            if self.graph.edge_is_phony(edge) {
                self.complete_phony(st, edge)?;
                continue;
            }
            if !self.is_dirty(st, edge)? {
                debug!(edge = edge.index(), "up to date");
                st.summary.up_to_date += 1;
                st.status.edge_skipped();
                self.edge_done(st, edge, false);
                continue;
            }
            let pool = self.graph.edge(edge).pool();
            if let Some(pool) = pool {
                if !self.graph.pool_mut(pool).acquire() {
                    debug!(edge = edge.index(), pool = self.graph.pool(pool).name(), "delayed");
                    st.delayed.push_back(edge);
                    continue;
                }
            }

            let command = self.graph.evaluate_command(edge);
            let description = self.graph.edge_binding(edge, "description");
            st.status.edge_started(&description, &command);
            match processes {
                Some(ps) => {
                    let started = self
                        .make_output_dirs(edge)
                        .and_then(|()| Ok(ps.run(&command, self.graph.edge_uses_console(edge))?));
                    let handle = match started {
                        Ok(handle) => handle,
                        Err(e) => {
                            self.release_pool(st, edge);
                            return Err(e);
                        }
                    };
                    st.running.insert(
                        handle,
                        Running {
                            edge,
                            command,
                            started: Instant::now(),
                        },
                    );
                }
                None => {
                    self.release_pool(st, edge);
                    st.summary.ran += 1;
                    st.status.edge_skipped();
                    self.edge_done(st, edge, true);
                }
            }
        }
        Ok(())
    }

    fn mtime_of(&self, st: &RunState, node: NodeId) -> Result<Option<SystemTime>, BuildError> {
        if let Some(mtime) = st.phony_mtimes.get(&node) {
            return Ok(*mtime);
        }
        let path = self.graph.node(node).path_decanonicalized();
        self.disk
            .mtime(&path)
            .map_err(|source| BuildError::Io { path, source })
    }

    fn producer_ran(&self, st: &RunState, node: NodeId) -> bool {
        self.graph
            .node(node)
            .in_edge()
            .map_or(false, |p| st.ran.contains(&p))
    }

    fn is_dirty(&self, st: &RunState, edge: EdgeId) -> Result<bool, BuildError> {
        scoped_metric!("dirty check");
        let e = self.graph.edge(edge);
        if e.dirtying_inputs().iter().any(|n| self.producer_ran(st, *n)) {
            return Ok(true);
        }
        let mut oldest: Option<SystemTime> = None;
        for out in e.outputs() {
            match self.mtime_of(st, *out)? {
                None => return Ok(true),
                Some(t) => oldest = Some(oldest.map_or(t, |o| o.min(t))),
            }
        }
        let oldest = match oldest {
            Some(t) => t,
            None => return Ok(true),
        };
        for input in e.dirtying_inputs() {
            match self.mtime_of(st, *input)? {
                Some(t) if t <= oldest => {}
                _ => return Ok(true),
            }
        }
        if self.graph.edge_is_generator(edge) {
            return Ok(false);
        }
        let command = self.graph.evaluate_command(edge);
        Ok(!self.log.was_up_to_date(&*self.graph, edge, &command))
    }

    fn complete_phony(&mut self, st: &mut RunState, edge: EdgeId) -> Result<(), BuildError> {
        let e = self.graph.edge(edge);
        let ran = e.dirtying_inputs().iter().any(|n| self.producer_ran(st, *n));
        let mut newest: Option<SystemTime> = None;
        for input in e.dirtying_inputs() {
            if let Some(t) = self.mtime_of(st, *input)? {
                newest = Some(newest.map_or(t, |n| n.max(t)));
            }
        }
        for out in e.outputs() {
            let path = self.graph.node(*out).path_decanonicalized();
            let on_disk = self
                .disk
                .exists(&path)
                .map_err(|source| BuildError::Io { path, source })?;
            if !on_disk {
                st.phony_mtimes.insert(*out, newest);
            }
        }
        self.edge_done(st, edge, ran);
        Ok(())
    }

    /// Marks `edge` finished and readies consumers that were only waiting on it.
    fn edge_done(&self, st: &mut RunState, edge: EdgeId, ran: bool) {
        if ran {
            st.ran.insert(edge);
        }
        let mut consumers: Vec<EdgeId> = self
            .graph
            .edge(edge)
            .outputs()
            .iter()
            .flat_map(|n| self.graph.node(*n).out_edges().iter().copied())
            .collect();
        consumers.sort();
        consumers.dedup();
        for consumer in consumers {
            if let Some(count) = st.pending.get_mut(&consumer) {
                *count -= 1;
                if *count == 0 {
                    st.ready.push_back(consumer);
                }
            }
        }
    }

    fn release_pool(&mut self, st: &mut RunState, edge: EdgeId) {
        if let Some(pool) = self.graph.edge(edge).pool() {
            self.graph.pool_mut(pool).release();
            // Retry everything that was refused; still-full pools will refuse again.
            while let Some(e) = st.delayed.pop_back() {
                st.ready.push_front(e);
            }
        }
    }

    fn make_output_dirs(&self, edge: EdgeId) -> Result<(), BuildError> {
        for out in self.graph.edge(edge).outputs() {
            let path = self.graph.node(*out).path_decanonicalized();
            if let Some(parent) = Path::new(&path).parent() {
                let parent = parent.to_string_lossy();
                if !parent.is_empty() {
                    self.disk
                        .make_dirs(&parent)
                        .map_err(|source| BuildError::Io {
                            path: parent.to_string(),
                            source,
                        })?;
                }
            }
        }
        Ok(())
    }

    fn edge_completed(
        &mut self,
        st: &mut RunState,
        running: Running,
        completion: Completion,
    ) -> Result<(), BuildError> {
        let edge = running.edge;
        self.release_pool(st, edge);
        let outputs = self
            .graph
            .edge(edge)
            .explicit_outputs()
            .iter()
            .map(|n| self.graph.node(*n).path_decanonicalized())
            .collect::<Vec<_>>()
            .join(" ");
        st.status
            .edge_finished(&outputs, &running.command, &completion);
        match completion.status {
            ExitStatus::Success => {
                let record = BuildRecord {
                    command: running.command,
                    status: completion.status,
                    duration: running.started.elapsed(),
                };
                self.log.record_completion(&*self.graph, edge, record);
                st.summary.ran += 1;
                self.edge_done(st, edge, true);
                Ok(())
            }
            ExitStatus::Failure => {
                warn!(edge = edge.index(), outputs = %outputs, "command failed");
                st.failures += 1;
                Ok(())
            }
            ExitStatus::Interrupted => Err(BuildError::Interrupted),
        }
    }

    fn abort(&mut self, st: &mut RunState, processes: &mut ProcessSet) {
        processes.clear();
        let running: Vec<EdgeId> = st.running.drain().map(|(_, r)| r.edge).collect();
        for edge in running {
            self.release_pool(st, edge);
        }
        st.status.build_finished();
    }
}

fn first_output(graph: &Graph, edge: EdgeId) -> String {
    graph
        .edge(edge)
        .outputs()
        .first()
        .map(|n| graph.node(*n).path_decanonicalized())
        .unwrap_or_default()
}
