// Licensed to the Apache Software Foundation (ASF) under one
// or more contributor license agreements.  See the NOTICE file
// distributed with this work for additional information
// regarding copyright ownership.  The ASF licenses this file
// to you under the Apache License, Version 2.0 (the
// "License"); you may not use this file except in compliance
// with the License.  You may obtain a copy of the License at
//
//   http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing,
// software distributed under the License is distributed on an
// "AS IS" BASIS, WITHOUT WARRANTIES OR CONDITIONS OF ANY
// KIND, either express or implied.  See the License for the
// specific language governing permissions and limitations
// under the License.

//! The monitored set: a bounded min-heap of entries plus a key to position index.

use std::collections::HashMap;
use std::collections::hash_map::Entry as MapEntry;

use crate::error::Error;
use crate::topk::Entry;

/// At most `capacity` entries kept as a binary min-heap ordered by
/// `(count ascending, error descending)`.
///
/// `index[key] == i` iff `heap[i].key == key`. Every move of an entry inside
/// `heap` goes through [`MonitoredSet::swap`], which rewrites both positions in
/// `index` together with the array.
#[derive(Debug, Clone)]
pub(super) struct MonitoredSet {
    capacity: usize,
    heap: Vec<Entry>,
    index: HashMap<String, usize>,
}

impl MonitoredSet {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            heap: Vec::with_capacity(capacity),
            index: HashMap::with_capacity(capacity),
        }
    }

    /// Rebuilds a set from a decoded heap array and its decoded index.
    ///
    /// Heap order is taken as given; the index must name every entry exactly
    /// once at its array position.
    pub fn from_parts(
        capacity: usize,
        heap: Vec<Entry>,
        index: Vec<(String, u32)>,
    ) -> Result<Self, Error> {
        if heap.len() > capacity {
            return Err(Error::deserial(format!(
                "{} entries exceed capacity {capacity}",
                heap.len()
            )));
        }
        if index.len() != heap.len() {
            return Err(Error::deserial(format!(
                "index has {} keys but there are {} entries",
                index.len(),
                heap.len()
            )));
        }
        for entry in &heap {
            if entry.count < entry.error {
                return Err(Error::deserial("entry count is below its error")
                    .with_context("key", &entry.key)
                    .with_context("count", entry.count)
                    .with_context("error", entry.error));
            }
        }

        let mut map = HashMap::with_capacity(capacity);
        for (key, position) in index {
            let position = position as usize;
            match heap.get(position) {
                Some(entry) if entry.key == key => {}
                _ => {
                    return Err(Error::deserial("index does not match entry positions")
                        .with_context("key", key)
                        .with_context("position", position));
                }
            }
            match map.entry(key) {
                MapEntry::Occupied(slot) => {
                    return Err(Error::deserial("duplicate key in index")
                        .with_context("key", slot.key()));
                }
                MapEntry::Vacant(slot) => {
                    slot.insert(position);
                }
            }
        }
        // Distinct index keys at matching slots now cover every entry exactly once.

        Ok(Self {
            capacity,
            heap,
            index: map,
        })
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    pub fn len(&self) -> usize {
        self.heap.len()
    }

    pub fn is_empty(&self) -> bool {
        self.heap.is_empty()
    }

    pub fn is_full(&self) -> bool {
        self.heap.len() >= self.capacity
    }

    /// Entries in heap array order.
    pub fn entries(&self) -> &[Entry] {
        &self.heap
    }

    pub fn index(&self) -> &HashMap<String, usize> {
        &self.index
    }

    pub fn find(&self, key: &str) -> Option<usize> {
        self.index.get(key).copied()
    }

    /// The current eviction candidate.
    pub fn peek_min(&self) -> Option<&Entry> {
        self.heap.first()
    }

    /// Adds `delta` to the count at `position`, sets its error and restores
    /// heap order. Returns the updated entry.
    pub fn update(&mut self, position: usize, delta: u64, error: u64) -> Entry {
        let entry = &mut self.heap[position];
        entry.count = entry.count.saturating_add(delta);
        entry.error = error;
        let position = self.fix(position);
        self.heap[position].clone()
    }

    /// Appends a new entry while there is free capacity.
    pub fn insert_new(&mut self, entry: Entry) -> usize {
        debug_assert!(!self.is_full(), "monitored set is full");
        debug_assert!(!self.index.contains_key(&entry.key), "key is already monitored");
        let position = self.heap.len();
        self.index.insert(entry.key.clone(), position);
        self.heap.push(entry);
        self.sift_up(position)
    }

    /// Overwrites the minimum with `entry` and returns the evicted entry.
    pub fn replace_min(&mut self, entry: Entry) -> Entry {
        debug_assert!(!self.heap.is_empty(), "no minimum to replace");
        debug_assert!(!self.index.contains_key(&entry.key), "key is already monitored");
        let key = entry.key.clone();
        let evicted = std::mem::replace(&mut self.heap[0], entry);
        self.index.remove(&evicted.key);
        self.index.insert(key, 0);
        self.sift_down(0);
        evicted
    }

    /// Strict heap order: `a` is evicted before `b`.
    fn less(a: &Entry, b: &Entry) -> bool {
        a.count < b.count || (a.count == b.count && a.error > b.error)
    }

    fn swap(&mut self, i: usize, j: usize) {
        self.heap.swap(i, j);
        if let Some(slot) = self.index.get_mut(&self.heap[i].key) {
            *slot = i;
        }
        if let Some(slot) = self.index.get_mut(&self.heap[j].key) {
            *slot = j;
        }
    }

    fn fix(&mut self, position: usize) -> usize {
        let moved = self.sift_up(position);
        if moved != position {
            return moved;
        }
        self.sift_down(position)
    }

    fn sift_up(&mut self, mut position: usize) -> usize {
        while position > 0 {
            let parent = (position - 1) / 2;
            if !Self::less(&self.heap[position], &self.heap[parent]) {
                break;
            }
            self.swap(position, parent);
            position = parent;
        }
        position
    }

    fn sift_down(&mut self, mut position: usize) -> usize {
        let len = self.heap.len();
        loop {
            let left = 2 * position + 1;
            if left >= len {
                break;
            }
            let right = left + 1;
            let mut smallest = left;
            if right < len && Self::less(&self.heap[right], &self.heap[left]) {
                smallest = right;
            }
            if !Self::less(&self.heap[smallest], &self.heap[position]) {
                break;
            }
            self.swap(position, smallest);
            position = smallest;
        }
        position
    }
}
