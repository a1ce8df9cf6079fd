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

use ninja_graph::Graph;
use tracing::debug;

use crate::{interface::DiskInterface, BuildError};

/// Removes the outputs of every edge that runs a command, along with their depfiles and
/// response files. Generator outputs are kept. Returns how many files were removed.
pub fn clean(graph: &Graph, disk: &dyn DiskInterface) -> Result<usize, BuildError> {
    let mut removed = 0;
    for edge in graph.edge_ids() {
        if graph.edge_is_phony(edge) || graph.edge_is_generator(edge) {
            continue;
        }
        let mut paths: Vec<String> = graph
            .edge(edge)
            .outputs()
            .iter()
            .map(|n| graph.node(*n).path_decanonicalized())
            .collect();
        for binding in ["depfile", "rspfile"] {
            let path = graph.edge_path_binding(edge, binding);
            if !path.is_empty() {
                paths.push(path);
            }
        }
        for path in paths {
            let gone = disk
                .remove_file(&path)
                .map_err(|source| BuildError::Io {
                    path: path.clone(),
                    source,
                })?;
            if gone {
                debug!(path = %path, "removed");
                removed += 1;
            }
        }
    }
    Ok(removed)
}
