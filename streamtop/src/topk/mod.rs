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

//! Top-k estimation for high-volume streams of string keys.
//!
//! This module implements the Filtered Space-Saving algorithm. An exact counter is
//! kept for up to `capacity` monitored keys, held in a min-heap so the smallest
//! count is always the eviction candidate. All other observations land in an array
//! of `6 * capacity` hashed error buckets. A key is promoted into the monitored set
//! only when its bucket plus the incoming amount reaches the monitored minimum, and
//! then carries its bucket value as the error bound of its count.
//!
//! For every key, `count - error <= true frequency <= count`. While no more than
//! `capacity` distinct keys have been seen, every count is exact.
//!
//! For background, see Homem and Carvalho, "Finding top-k elements in data streams"
//! (Information Sciences, 2010).
//!
//! # Usage
//!
//! ```rust
//! # use streamtop::topk::TopK;
//! let topk = TopK::new(2).unwrap();
//! for key in ["a", "b", "a", "c", "c", "c"] {
//!     topk.update(key);
//! }
//! let top = topk.keys();
//! assert_eq!(top[0].key(), "c");
//! assert!(top[0].lower_bound() <= 3 && 3 <= top[0].upper_bound());
//! ```
//!
//! # Serialization
//!
//! ```rust
//! # use streamtop::topk::TopK;
//! let topk = TopK::new(16).unwrap();
//! topk.insert("alpha", 7);
//!
//! let bytes = topk.serialize();
//! let decoded = TopK::deserialize(&bytes).unwrap();
//! assert_eq!(decoded.estimate("alpha").count(), 7);
//! ```

mod buckets;
mod monitored;
mod serialization;
mod sketch;

pub use self::sketch::Entry;
pub use self::sketch::MAX_CAPACITY;
pub use self::sketch::TopK;
pub use self::sketch::TopKBuilder;
