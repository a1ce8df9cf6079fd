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

//! A slot arena handing out small integer keys.
//!
//! Vacant slots form a free list kept in ascending order, so the lowest free key is always reused
//! first and keys stay dense.

use std::mem;

#[derive(Debug)]
enum Slot<T> {
    Occupied(T),
    Vacant { next: Option<usize> },
}

#[derive(Debug)]
pub struct RefTable<T> {
    slots: Vec<Slot<T>>,
    free: Option<usize>,
    len: usize,
}

impl<T> Default for RefTable<T> {
    fn default() -> Self {
        RefTable {
            slots: Vec::new(),
            free: None,
            len: 0,
        }
    }
}

impl<T> RefTable<T> {
    pub fn new() -> RefTable<T> {
        RefTable::default()
    }

    pub fn insert(&mut self, value: T) -> usize {
        self.len += 1;
        match self.free {
            Some(key) => {
                let old = mem::replace(&mut self.slots[key], Slot::Occupied(value));
                match old {
                    Slot::Vacant { next } => self.free = next,
                    Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
                }
                key
            }
            None => {
                self.slots.push(Slot::Occupied(value));
                self.slots.len() - 1
            }
        }
    }

    pub fn remove(&mut self, key: usize) -> Option<T> {
        if !matches!(self.slots.get(key), Some(Slot::Occupied(_))) {
            return None;
        }
        // Find the vacant slot this one goes after.
        let mut prev = None;
        let mut cursor = self.free;
        while let Some(k) = cursor {
            if k > key {
                break;
            }
            prev = Some(k);
            cursor = match self.slots[k] {
                Slot::Vacant { next } => next,
                Slot::Occupied(_) => unreachable!("free list points at an occupied slot"),
            };
        }
        let old = mem::replace(&mut self.slots[key], Slot::Vacant { next: cursor });
        match prev {
            Some(p) => self.slots[p] = Slot::Vacant { next: Some(key) },
            None => self.free = Some(key),
        }
        self.len -= 1;
        match old {
            Slot::Occupied(value) => Some(value),
            Slot::Vacant { .. } => None,
        }
    }

    pub fn get(&self, key: usize) -> Option<&T> {
        match self.slots.get(key) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub fn get_mut(&mut self, key: usize) -> Option<&mut T> {
        match self.slots.get_mut(key) {
            Some(Slot::Occupied(value)) => Some(value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.len
    }

    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    pub fn iter(&self) -> impl Iterator<Item = (usize, &T)> {
        self.slots.iter().enumerate().filter_map(|(k, slot)| match slot {
            Slot::Occupied(value) => Some((k, value)),
            Slot::Vacant { .. } => None,
        })
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn lowest_vacant_first() {
        let mut table = RefTable::new();
        let keys: Vec<usize> = (0..5).map(|i| table.insert(i * 10)).collect();
        assert_eq!(keys, [0, 1, 2, 3, 4]);

        assert_eq!(table.remove(3), Some(30));
        assert_eq!(table.remove(1), Some(10));
        assert_eq!(table.remove(4), Some(40));
        assert_eq!(table.len(), 2);

        assert_eq!(table.insert(100), 1);
        assert_eq!(table.insert(101), 3);
        assert_eq!(table.insert(102), 4);
        assert_eq!(table.insert(103), 5);
        assert_eq!(table.get(3), Some(&101));
    }

    #[test]
    fn double_remove() {
        let mut table = RefTable::new();
        let k = table.insert("a");
        assert_eq!(table.remove(k), Some("a"));
        assert_eq!(table.remove(k), None);
        assert_eq!(table.remove(99), None);
        assert!(table.is_empty());
        assert_eq!(table.insert("b"), k);
    }

    #[test]
    fn iter_skips_vacant() {
        let mut table = RefTable::new();
        for c in ['a', 'b', 'c'] {
            table.insert(c);
        }
        table.remove(1);
        *table.get_mut(2).unwrap() = 'z';
        assert_eq!(table.iter().collect::<Vec<_>>(), [(0, &'a'), (2, &'z')]);
    }
}
