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

use ninja_paths::decanonicalize;

use crate::EdgeId;

/// A file in the build graph, keyed by its canonical path.
#[derive(Debug, Clone)]
pub struct Node {
    path: String,
    slash_bits: u64,
    in_edge: Option<EdgeId>,
    out_edges: Vec<EdgeId>,
    validation_out_edges: Vec<EdgeId>,
    dyndep_pending: bool,
}

impl Node {
    pub(crate) fn new(path: String, slash_bits: u64) -> Node {
        Node {
            path,
            slash_bits,
            in_edge: None,
            out_edges: Vec::new(),
            validation_out_edges: Vec::new(),
            dyndep_pending: false,
        }
    }

    pub fn path(&self) -> &str {
        &self.path
    }

    pub fn slash_bits(&self) -> u64 {
        self.slash_bits
    }

    /// The path as first declared, with backslashes restored where the declaration had them.
    pub fn path_decanonicalized(&self) -> String {
        decanonicalize(&self.path, self.slash_bits)
    }

    /// The edge producing this node. Source files have none.
    pub fn in_edge(&self) -> Option<EdgeId> {
        self.in_edge
    }

    pub fn out_edges(&self) -> &[EdgeId] {
        &self.out_edges
    }

    pub fn validation_out_edges(&self) -> &[EdgeId] {
        &self.validation_out_edges
    }

    pub fn dyndep_pending(&self) -> bool {
        self.dyndep_pending
    }

    pub fn is_root(&self) -> bool {
        self.out_edges.is_empty()
    }

    pub(crate) fn set_in_edge(&mut self, edge: EdgeId) {
        debug_assert!(self.in_edge.is_none(), "{} already has a producer", self.path);
        self.in_edge = Some(edge);
    }

    pub(crate) fn add_out_edge(&mut self, edge: EdgeId) {
        self.out_edges.push(edge);
    }

    pub(crate) fn add_validation_out_edge(&mut self, edge: EdgeId) {
        self.validation_out_edges.push(edge);
    }

    pub(crate) fn set_dyndep_pending(&mut self, pending: bool) {
        self.dyndep_pending = pending;
    }
}
