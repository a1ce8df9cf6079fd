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

use std::collections::{hash_map::Entry, HashMap};

use thiserror::Error;

mod canon;
pub use canon::{canonicalize_path, canonicalize_path_with, decanonicalize, Canonical};

#[derive(Error, Debug, PartialEq, Eq)]
pub enum PathError {
    #[error("empty path")]
    Empty,
    #[error("path has too many components: {0}")]
    TooManyComponents(String),
}

pub type PathRef = usize;

// Every path handed to the cache is expected to be canonical already. Two spellings of the same
// file only collapse to one entry if the caller ran them through canonicalize_path first.
#[derive(Debug, Default)]
pub struct PathCache {
    paths: Vec<String>,
    map: HashMap<String, PathRef>,
}

// Rough translation of HashMap entry API to be more ergonomic.
#[derive(Debug, PartialEq, Eq)]
pub enum InsertResult {
    AlreadyExists(PathRef),
    Inserted(PathRef),
}

impl InsertResult {
    pub fn path_ref(&self) -> PathRef {
        match *self {
            InsertResult::AlreadyExists(r) | InsertResult::Inserted(r) => r,
        }
    }
}

impl PathCache {
    pub fn new() -> PathCache {
        PathCache::default()
    }

    pub fn insert<P: Into<String>>(&mut self, path: P) -> InsertResult {
        match self.map.entry(path.into()) {
            Entry::Occupied(e) => InsertResult::AlreadyExists(*e.get()),
            Entry::Vacant(e) => {
                self.paths.push(e.key().clone());
                let idx = self.paths.len() - 1;
                e.insert(idx);
                InsertResult::Inserted(idx)
            }
        }
    }

    pub fn insert_and_get<P: Into<String>>(&mut self, path: P) -> PathRef {
        self.insert(path).path_ref()
    }

    pub fn lookup(&self, path: &str) -> Option<PathRef> {
        self.map.get(path).copied()
    }

    pub fn get(&self, rf: PathRef) -> &str {
        &self.paths[rf]
    }

    pub fn len(&self) -> usize {
        self.paths.len()
    }

    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn same_path_same_ref() {
        let mut cache = PathCache::new();
        let a = cache.insert("out/a.o");
        assert_eq!(a, InsertResult::Inserted(0));
        let b = cache.insert("out/b.o");
        assert_eq!(b, InsertResult::Inserted(1));
        assert_eq!(cache.insert("out/a.o"), InsertResult::AlreadyExists(0));
        assert_eq!(cache.get(1), "out/b.o");
        assert_eq!(cache.lookup("out/b.o"), Some(1));
        assert_eq!(cache.lookup("out/c.o"), None);
        assert_eq!(cache.len(), 2);
    }
}
