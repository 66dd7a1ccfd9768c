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

//! Key hashing for error-bucket addressing.

/// The seed used when none is configured.
pub const DEFAULT_UPDATE_SEED: u32 = 9001;

/// Hashes a key with MurmurHash3 (x64, 128-bit) and keeps the low half.
pub(crate) fn hash_key(key: &str, seed: u32) -> u64 {
    let (h1, _) = mur3::murmurhash3_x64_128(key.as_bytes(), seed);
    h1
}

/// Maps a 64-bit hash uniformly onto `[0, len)` with a multiply-shift.
///
/// Avoids the bias and the division of `hash % len`.
pub(crate) fn reduce(hash: u64, len: usize) -> usize {
    ((hash as u128 * len as u128) >> 64) as usize
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_hash_is_stable_for_seed() {
        assert_eq!(hash_key("apple", DEFAULT_UPDATE_SEED), hash_key("apple", DEFAULT_UPDATE_SEED));
        assert_ne!(hash_key("apple", DEFAULT_UPDATE_SEED), hash_key("apples", DEFAULT_UPDATE_SEED));
    }

    #[test]
    fn test_reduce_stays_in_range() {
        for len in [1usize, 6, 60, 6_000] {
            for hash in [0u64, 1, u64::MAX / 3, u64::MAX - 1, u64::MAX] {
                assert!(reduce(hash, len) < len);
            }
        }
        assert_eq!(reduce(u64::MAX, 6), 5);
        assert_eq!(reduce(0, 6), 0);
    }

    #[test]
    fn test_reduce_spreads_keys() {
        let len = 60;
        let mut hits = vec![0usize; len];
        for i in 0..6_000 {
            hits[reduce(hash_key(&format!("key-{i}"), DEFAULT_UPDATE_SEED), len)] += 1;
        }
        // 100 expected per bucket
        assert!(hits.iter().all(|&h| h > 40 && h < 200), "{hits:?}");
    }
}
