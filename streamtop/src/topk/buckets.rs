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

//! Hashed error counters for keys that are not monitored.

use crate::hash::hash_key;
use crate::hash::reduce;

/// Number of error buckets allocated per monitored slot.
pub(super) const BUCKETS_PER_SLOT: usize = 6;

/// A fixed array of counters addressed by the hash of a key.
///
/// Collisions only ever inflate a key's bucket, so a bucket is an upper bound
/// on what its keys accumulated while unmonitored. Counters never decrease.
#[derive(Debug, Clone)]
pub(super) struct ErrorBuckets {
    seed: u32,
    counters: Vec<u64>,
}

impl ErrorBuckets {
    pub fn new(num_buckets: usize, seed: u32) -> Self {
        Self {
            seed,
            counters: vec![0; num_buckets],
        }
    }

    pub fn from_counters(counters: Vec<u64>, seed: u32) -> Self {
        Self { seed, counters }
    }

    pub fn len(&self) -> usize {
        self.counters.len()
    }

    pub fn counters(&self) -> &[u64] {
        &self.counters
    }

    pub fn hash_index(&self, key: &str) -> usize {
        reduce(hash_key(key, self.seed), self.counters.len())
    }

    pub fn get(&self, key: &str) -> u64 {
        self.get_at(self.hash_index(key))
    }

    pub fn get_at(&self, bucket: usize) -> u64 {
        self.counters[bucket]
    }

    pub fn add_at(&mut self, bucket: usize, amount: u64) {
        let counter = &mut self.counters[bucket];
        *counter = counter.saturating_add(amount);
    }

    /// Raises the bucket to at least `value`.
    pub fn raise_at(&mut self, bucket: usize, value: u64) {
        let counter = &mut self.counters[bucket];
        *counter = (*counter).max(value);
    }
}
