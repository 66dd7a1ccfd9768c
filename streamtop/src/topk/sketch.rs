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

//! Filtered Space-Saving top-k estimator.

use parking_lot::RwLock;
use tracing::debug;
use tracing::trace;

use crate::codec::SketchBytes;
use crate::codec::SketchSlice;
use crate::error::Error;
use crate::hash::DEFAULT_UPDATE_SEED;
use crate::topk::buckets::BUCKETS_PER_SLOT;
use crate::topk::buckets::ErrorBuckets;
use crate::topk::monitored::MonitoredSet;
use crate::topk::serialization::*;

/// Largest supported number of monitored keys.
///
/// Bounds the error-bucket allocation, including for decoded snapshots.
pub const MAX_CAPACITY: usize = 1 << 24;

/// A frequency estimate for one key.
///
/// `count` is an upper bound on the key's true frequency and `count - error`
/// a lower bound.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Entry {
    pub(super) key: String,
    pub(super) count: u64,
    pub(super) error: u64,
}

impl Entry {
    pub(super) fn new(key: &str, count: u64, error: u64) -> Self {
        Self {
            key: key.to_string(),
            count,
            error,
        }
    }

    /// Returns the key.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Returns the estimated count, an upper bound on the true frequency.
    pub fn count(&self) -> u64 {
        self.count
    }

    /// Returns the maximum overestimation included in `count`.
    pub fn error(&self) -> u64 {
        self.error
    }

    /// Returns the guaranteed lower bound on the true frequency.
    pub fn lower_bound(&self) -> u64 {
        self.count.saturating_sub(self.error)
    }

    /// Returns the guaranteed upper bound on the true frequency.
    pub fn upper_bound(&self) -> u64 {
        self.count
    }
}

/// Builder for [`TopK`].
///
/// # Examples
///
/// ```
/// # use streamtop::topk::TopKBuilder;
/// let topk = TopKBuilder::new(10).seed(42).build().unwrap();
/// assert_eq!(topk.capacity(), 10);
/// assert_eq!(topk.seed(), 42);
/// assert_eq!(topk.num_buckets(), 60);
/// ```
#[derive(Debug, Clone)]
pub struct TopKBuilder {
    capacity: usize,
    seed: u32,
}

impl TopKBuilder {
    /// Creates a builder for an estimator monitoring at most `capacity` keys.
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity,
            seed: DEFAULT_UPDATE_SEED,
        }
    }

    /// Sets the seed of the hash addressing the error buckets.
    pub fn seed(mut self, seed: u32) -> Self {
        self.seed = seed;
        self
    }

    /// Builds the estimator.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if the capacity is zero or exceeds [`MAX_CAPACITY`].
    pub fn build(self) -> Result<TopK, Error> {
        let capacity = checked_capacity(self.capacity as u64)?;
        debug!(capacity, seed = self.seed, "building top-k estimator");
        Ok(TopK {
            state: RwLock::new(State::new(capacity, self.seed)),
        })
    }
}

/// Estimates the most frequent keys of a stream in memory bounded by its capacity.
///
/// Up to `capacity` keys are counted exactly once monitored. Every other
/// observation is absorbed into `6 * capacity` hashed error buckets, and a key
/// is promoted into the monitored set only once its bucket plus the incoming
/// amount reaches the smallest monitored count.
///
/// All methods take `&self`. Each `insert` runs as one critical section under an
/// exclusive lock, so the estimator can be shared across threads; queries take a
/// shared lock and never observe a half-applied eviction.
#[derive(Debug)]
pub struct TopK {
    state: RwLock<State>,
}

impl TopK {
    /// Creates an estimator monitoring at most `capacity` keys with the default seed.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::ConfigInvalid`](crate::error::ErrorKind::ConfigInvalid)
    /// if the capacity is zero or exceeds [`MAX_CAPACITY`].
    pub fn new(capacity: usize) -> Result<Self, Error> {
        TopKBuilder::new(capacity).build()
    }

    /// Returns a builder for an estimator monitoring at most `capacity` keys.
    pub fn builder(capacity: usize) -> TopKBuilder {
        TopKBuilder::new(capacity)
    }

    /// Records `amount` occurrences of `key` and returns its resulting estimate.
    ///
    /// The returned entry is the live monitored entry when the key is (or
    /// becomes) monitored. Otherwise it is `{count: bucket + amount, error: bucket}`
    /// computed from the key's error bucket before the amount was added.
    ///
    /// # Examples
    ///
    /// ```
    /// # use streamtop::topk::TopK;
    /// let topk = TopK::new(2).unwrap();
    /// topk.insert("a", 2);
    /// let entry = topk.insert("a", 3);
    /// assert_eq!(entry.count(), 5);
    /// assert_eq!(entry.error(), 0);
    /// ```
    pub fn insert(&self, key: &str, amount: u64) -> Entry {
        self.state.write().insert(key, amount)
    }

    /// Records a single occurrence of `key`.
    pub fn update(&self, key: &str) -> Entry {
        self.insert(key, 1)
    }

    /// Returns the current estimate for `key` without modifying the estimator.
    ///
    /// Unmonitored keys report their error bucket as both count and error, so
    /// their lower bound is zero.
    pub fn estimate(&self, key: &str) -> Entry {
        self.state.read().estimate(key)
    }

    /// Returns a copy of the monitored entries sorted by count descending, then
    /// key ascending.
    ///
    /// # Examples
    ///
    /// ```
    /// # use streamtop::topk::TopK;
    /// let topk = TopK::new(4).unwrap();
    /// for key in ["b", "a", "c", "a", "b", "c", "c"] {
    ///     topk.update(key);
    /// }
    /// let keys: Vec<_> = topk.keys().iter().map(|e| e.key().to_string()).collect();
    /// assert_eq!(keys, ["c", "a", "b"]);
    /// ```
    pub fn keys(&self) -> Vec<Entry> {
        self.state.read().keys()
    }

    /// Returns at most `k` entries in [`TopK::keys`] order.
    pub fn top(&self, k: usize) -> Vec<Entry> {
        let mut keys = self.keys();
        keys.truncate(k);
        keys
    }

    /// Returns the maximum number of monitored keys.
    pub fn capacity(&self) -> usize {
        self.state.read().monitored.capacity()
    }

    /// Returns the number of monitored keys.
    pub fn len(&self) -> usize {
        self.state.read().monitored.len()
    }

    /// Returns true if no key has been inserted.
    pub fn is_empty(&self) -> bool {
        self.state.read().monitored.is_empty()
    }

    /// Returns the number of error buckets.
    pub fn num_buckets(&self) -> usize {
        self.state.read().buckets.len()
    }

    /// Returns the seed of the bucket hash.
    pub fn seed(&self) -> u32 {
        self.state.read().seed
    }

    /// Returns the sum of all inserted amounts, saturating at `u64::MAX`.
    pub fn total_weight(&self) -> u64 {
        self.state.read().total_weight
    }

    /// Serializes the full estimator state into a byte vector.
    ///
    /// # Examples
    ///
    /// ```
    /// # use streamtop::topk::TopK;
    /// let topk = TopK::new(8).unwrap();
    /// topk.insert("word", 3);
    ///
    /// let bytes = topk.serialize();
    /// let restored = TopK::deserialize(&bytes).unwrap();
    /// assert_eq!(restored.keys(), topk.keys());
    /// ```
    pub fn serialize(&self) -> Vec<u8> {
        self.state.read().serialize()
    }

    /// Deserializes an estimator from bytes produced by [`TopK::serialize`].
    ///
    /// Heap order is trusted as encoded; the key index is checked against the
    /// entry positions. Every length in the body is checked against the remaining
    /// input before it is allocated. An empty snapshot has no body, so decoding one
    /// allocates `6 * capacity` zeroed buckets, as [`TopK::new`] would.
    ///
    /// # Errors
    ///
    /// Returns [`ErrorKind::MalformedDeserializeData`](crate::error::ErrorKind::MalformedDeserializeData)
    /// if the data is truncated or inconsistent.
    pub fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let state = State::deserialize(bytes)?;
        Ok(Self {
            state: RwLock::new(state),
        })
    }

    /// Replaces this estimator's state with a decoded snapshot.
    ///
    /// The snapshot is fully decoded before the swap; on error the current state
    /// is left untouched.
    pub fn restore(&self, bytes: &[u8]) -> Result<(), Error> {
        match State::deserialize(bytes) {
            Ok(state) => {
                debug!(
                    capacity = state.monitored.capacity(),
                    monitored = state.monitored.len(),
                    "restored top-k snapshot"
                );
                *self.state.write() = state;
                Ok(())
            }
            Err(err) => {
                debug!(error = %err, "rejected top-k snapshot");
                Err(err)
            }
        }
    }
}

impl Clone for TopK {
    fn clone(&self) -> Self {
        Self {
            state: RwLock::new(self.state.read().clone()),
        }
    }
}

#[derive(Debug, Clone)]
struct State {
    seed: u32,
    total_weight: u64,
    monitored: MonitoredSet,
    buckets: ErrorBuckets,
}

impl State {
    fn new(capacity: usize, seed: u32) -> Self {
        Self {
            seed,
            total_weight: 0,
            monitored: MonitoredSet::new(capacity),
            buckets: ErrorBuckets::new(capacity * BUCKETS_PER_SLOT, seed),
        }
    }

    fn insert(&mut self, key: &str, amount: u64) -> Entry {
        self.total_weight = self.total_weight.saturating_add(amount);

        if let Some(position) = self.monitored.find(key) {
            let error = self.monitored.entries()[position].error;
            return self.monitored.update(position, amount, error);
        }

        if !self.monitored.is_full() {
            let entry = Entry::new(key, amount, 0);
            self.monitored.insert_new(entry.clone());
            return entry;
        }

        let bucket = self.buckets.hash_index(key);
        let error = self.buckets.get_at(bucket);
        let count = error.saturating_add(amount);
        let promote = matches!(self.monitored.peek_min(), Some(min) if count >= min.count);
        if !promote {
            self.buckets.add_at(bucket, amount);
            return Entry::new(key, count, error);
        }

        let entry = Entry::new(key, count, error);
        let evicted = self.monitored.replace_min(entry.clone());
        let evicted_bucket = self.buckets.hash_index(&evicted.key);
        self.buckets.raise_at(evicted_bucket, evicted.count);
        trace!(
            evicted = %evicted.key,
            evicted_count = evicted.count,
            promoted = %key,
            count,
            error,
            "evicted minimum entry"
        );
        entry
    }

    fn estimate(&self, key: &str) -> Entry {
        match self.monitored.find(key) {
            Some(position) => self.monitored.entries()[position].clone(),
            None => {
                let value = self.buckets.get(key);
                Entry::new(key, value, value)
            }
        }
    }

    fn keys(&self) -> Vec<Entry> {
        let mut entries = self.monitored.entries().to_vec();
        entries.sort_by(|a, b| b.count.cmp(&a.count).then_with(|| a.key.cmp(&b.key)));
        entries
    }

    fn serialize(&self) -> Vec<u8> {
        let is_empty = self.monitored.is_empty();
        let entries = self.monitored.entries();

        if is_empty {
            let mut bytes = SketchBytes::with_capacity(PREAMBLE_LONGS_EMPTY as usize * 8);
            self.write_preamble(&mut bytes, PREAMBLE_LONGS_EMPTY, EMPTY_FLAG_MASK);
            return bytes.into_bytes();
        }

        let key_bytes: usize = entries.iter().map(|e| e.key.len()).sum();
        let capacity = PREAMBLE_LONGS_NONEMPTY as usize * 8
            + 4
            + entries.len() * (INDEX_FIXED_BYTES + ENTRY_FIXED_BYTES)
            + 2 * key_bytes
            + 8
            + self.buckets.len() * 8;
        let mut bytes = SketchBytes::with_capacity(capacity);
        self.write_preamble(&mut bytes, PREAMBLE_LONGS_NONEMPTY, 0);
        bytes.write_u64_le(self.total_weight);

        // Index, in position order so equal states encode to equal bytes.
        let mut index: Vec<(&String, usize)> = self
            .monitored
            .index()
            .iter()
            .map(|(key, &position)| (key, position))
            .collect();
        index.sort_unstable_by_key(|&(_, position)| position);
        bytes.write_u32_le(index.len() as u32);
        for (key, position) in index {
            bytes.write_str(key);
            bytes.write_u32_le(position as u32);
        }

        for entry in entries {
            bytes.write_str(&entry.key);
            bytes.write_u64_le(entry.count);
            bytes.write_u64_le(entry.error);
        }

        bytes.write_u64_le(self.buckets.len() as u64);
        for &counter in self.buckets.counters() {
            bytes.write_u64_le(counter);
        }

        bytes.into_bytes()
    }

    fn write_preamble(&self, bytes: &mut SketchBytes, preamble_longs: u8, flags: u8) {
        bytes.write_u8(preamble_longs);
        bytes.write_u8(SERIAL_VERSION);
        bytes.write_u8(FAMILY_ID);
        bytes.write_u8(flags);
        bytes.write_u32_le(self.monitored.len() as u32);
        bytes.write_u64_le(self.monitored.capacity() as u64);
        bytes.write_u32_le(self.seed);
        bytes.write_u32_le(0); // reserved
    }

    fn deserialize(bytes: &[u8]) -> Result<Self, Error> {
        let mut cursor = SketchSlice::new(bytes);

        let preamble_longs = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("preamble_longs"))?;
        let serial_version = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("serial_version"))?;
        let family_id = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("family_id"))?;
        let flags = cursor
            .read_u8()
            .map_err(|_| Error::insufficient_data("flags"))?;
        let num_entries = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("num_entries"))? as usize;

        if family_id != FAMILY_ID {
            return Err(Error::invalid_family(FAMILY_ID, family_id, FAMILY_NAME));
        }
        if serial_version != SERIAL_VERSION {
            return Err(Error::unsupported_serial_version(
                SERIAL_VERSION,
                serial_version,
            ));
        }
        let is_empty = (flags & EMPTY_FLAG_MASK) != 0;
        let expected_longs = if is_empty {
            PREAMBLE_LONGS_EMPTY
        } else {
            PREAMBLE_LONGS_NONEMPTY
        };
        if preamble_longs != expected_longs {
            return Err(Error::invalid_preamble_longs(expected_longs, preamble_longs));
        }

        let capacity = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("capacity"))?;
        let capacity = checked_capacity(capacity)
            .map_err(|err| Error::deserial(err.message().to_string()))?;
        let seed = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("seed"))?;
        cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("reserved"))?;

        if num_entries > capacity {
            return Err(Error::deserial("number of entries exceeds capacity")
                .with_context("num_entries", num_entries)
                .with_context("capacity", capacity));
        }

        if is_empty {
            if num_entries != 0 {
                return Err(Error::deserial("empty snapshot with entries")
                    .with_context("num_entries", num_entries));
            }
            ensure_consumed(&cursor)?;
            return Ok(Self::new(capacity, seed));
        }
        if num_entries == 0 {
            return Err(Error::deserial("non-empty snapshot without entries"));
        }

        let total_weight = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("total_weight"))?;

        let index_len = cursor
            .read_u32_le()
            .map_err(|_| Error::insufficient_data("index_len"))? as usize;
        if index_len != num_entries {
            return Err(Error::deserial("index size does not match number of entries")
                .with_context("index_len", index_len)
                .with_context("num_entries", num_entries));
        }
        if cursor.remaining() / INDEX_FIXED_BYTES < index_len {
            return Err(Error::insufficient_data("index"));
        }
        let mut index = Vec::with_capacity(index_len);
        for _ in 0..index_len {
            let key = read_key(&mut cursor, "index_key")?;
            let position = cursor
                .read_u32_le()
                .map_err(|_| Error::insufficient_data("index_position"))?;
            index.push((key, position));
        }

        if cursor.remaining() / ENTRY_FIXED_BYTES < num_entries {
            return Err(Error::insufficient_data("entries"));
        }
        let mut heap = Vec::with_capacity(num_entries);
        for _ in 0..num_entries {
            let key = read_key(&mut cursor, "entry_key")?;
            let count = cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("entry_count"))?;
            let error = cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("entry_error"))?;
            heap.push(Entry { key, count, error });
        }

        let num_buckets = cursor
            .read_u64_le()
            .map_err(|_| Error::insufficient_data("num_buckets"))?;
        let expected_buckets = capacity * BUCKETS_PER_SLOT;
        if num_buckets != expected_buckets as u64 {
            return Err(Error::deserial("bucket array length does not match capacity")
                .with_context("num_buckets", num_buckets)
                .with_context("expected", expected_buckets));
        }
        if cursor.remaining() / 8 < expected_buckets {
            return Err(Error::insufficient_data("buckets"));
        }
        let mut counters = Vec::with_capacity(expected_buckets);
        for _ in 0..expected_buckets {
            let counter = cursor
                .read_u64_le()
                .map_err(|_| Error::insufficient_data("buckets"))?;
            counters.push(counter);
        }
        ensure_consumed(&cursor)?;

        let monitored = MonitoredSet::from_parts(capacity, heap, index)?;
        Ok(Self {
            seed,
            total_weight,
            monitored,
            buckets: ErrorBuckets::from_counters(counters, seed),
        })
    }
}

fn checked_capacity(capacity: u64) -> Result<usize, Error> {
    match usize::try_from(capacity) {
        Ok(capacity) if (1..=MAX_CAPACITY).contains(&capacity) => Ok(capacity),
        _ => Err(Error::invalid_capacity(capacity, MAX_CAPACITY)),
    }
}

fn read_key(cursor: &mut SketchSlice<'_>, tag: &'static str) -> Result<String, Error> {
    let len = cursor
        .read_u32_le()
        .map_err(|_| Error::insufficient_data(tag))? as usize;
    let buf = cursor
        .read_bytes(len)
        .map_err(|_| Error::insufficient_data(tag))?;
    String::from_utf8(buf).map_err(|err| Error::deserial("invalid utf-8 key").set_source(err))
}

fn ensure_consumed(cursor: &SketchSlice<'_>) -> Result<(), Error> {
    match cursor.remaining() {
        0 => Ok(()),
        trailing => {
            Err(Error::deserial("trailing bytes after snapshot").with_context("trailing", trailing))
        }
    }
}
