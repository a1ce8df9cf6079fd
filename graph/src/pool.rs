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

//! Admission control for edges sharing a limited resource.
//!
//! A pool is a plain counter. It knows nothing about processes; the driver asks it before starting
//! an edge and tells it when the edge is done, whatever the outcome.

pub const CONSOLE: &str = "console";

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Pool {
    name: String,
    depth: usize,
    in_flight: usize,
}

impl Pool {
    /// A depth of 0 admits everything.
    pub fn new<S: Into<String>>(name: S, depth: usize) -> Pool {
        Pool {
            name: name.into(),
            depth,
            in_flight: 0,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn depth(&self) -> usize {
        self.depth
    }

    pub fn in_flight(&self) -> usize {
        self.in_flight
    }

    pub fn is_unlimited(&self) -> bool {
        self.depth == 0
    }

    /// Edges in the console pool get the terminal.
    pub fn is_console(&self) -> bool {
        self.name == CONSOLE
    }

    pub fn can_admit(&self) -> bool {
        self.is_unlimited() || self.in_flight < self.depth
    }

    /// Takes a slot. Returns false, and changes nothing, when the pool is full.
    #[must_use]
    pub fn acquire(&mut self) -> bool {
        if !self.can_admit() {
            return false;
        }
        self.in_flight += 1;
        true
    }

    pub fn release(&mut self) {
        debug_assert!(self.in_flight > 0, "release without acquire on pool {}", self.name);
        self.in_flight = self.in_flight.saturating_sub(1);
    }

    pub(crate) fn reset(&mut self) {
        self.in_flight = 0;
    }
}
