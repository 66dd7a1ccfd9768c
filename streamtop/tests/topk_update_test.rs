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

use std::collections::HashMap;

use googletest::assert_that;
use googletest::prelude::contains_substring;
use googletest::prelude::ge;
use googletest::prelude::le;
use streamtop::error::ErrorKind;
use streamtop::topk::MAX_CAPACITY;
use streamtop::topk::TopK;

fn assert_bounds(topk: &TopK, truth: &HashMap<String, u64>) {
    for (key, &count) in truth {
        let entry = topk.estimate(key);
        assert_that!(entry.lower_bound(), le(count));
        assert_that!(entry.upper_bound(), ge(count));
    }
}

#[test]
fn test_zero_capacity_is_rejected() {
    let err = TopK::new(0).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert_that!(err.message(), contains_substring("capacity must be in"));
}

#[test]
fn test_capacity_above_maximum_is_rejected() {
    let err = TopK::new(MAX_CAPACITY + 1).unwrap_err();
    assert_eq!(err.kind(), ErrorKind::ConfigInvalid);
    assert!(TopK::new(1).is_ok());
}

#[test]
fn test_empty_estimator() {
    let topk = TopK::new(3).unwrap();
    assert!(topk.is_empty());
    assert_eq!(topk.len(), 0);
    assert_eq!(topk.capacity(), 3);
    assert_eq!(topk.num_buckets(), 18);
    assert_eq!(topk.total_weight(), 0);
    assert!(topk.keys().is_empty());

    let entry = topk.estimate("missing");
    assert_eq!(entry.key(), "missing");
    assert_eq!(entry.count(), 0);
    assert_eq!(entry.error(), 0);
    assert!(topk.is_empty());
}

#[test]
fn test_exact_while_under_capacity() {
    let topk = TopK::new(5).unwrap();
    let stream = [("x", 3), ("y", 1), ("x", 4), ("z", 2), ("w", 9), ("y", 1)];
    for (key, amount) in stream {
        topk.insert(key, amount);
    }

    let keys = topk.keys();
    let summary: Vec<_> = keys
        .iter()
        .map(|e| (e.key().to_string(), e.count(), e.error()))
        .collect();
    assert_eq!(
        summary,
        [
            ("w".to_string(), 9, 0),
            ("x".to_string(), 7, 0),
            ("y".to_string(), 2, 0),
            ("z".to_string(), 2, 0),
        ]
    );
    assert_eq!(topk.total_weight(), 20);
    assert_eq!(topk.len(), 4);
}

#[test]
fn test_two_slot_scenario() {
    let topk = TopK::new(2).unwrap();
    for key in ["a", "b", "a", "c", "c", "c"] {
        topk.update(key);
    }

    let keys = topk.keys();
    assert_eq!(keys.len(), 2);
    assert_eq!(keys[0].key(), "c");
    assert_eq!(keys[0].count(), 3);
    assert_eq!(keys[1].key(), "a");
    assert_eq!(keys[1].count(), 2);

    let truth: HashMap<String, u64> = [("a", 2), ("b", 1), ("c", 3)]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
    assert_bounds(&topk, &truth);
}

#[test]
fn test_keys_break_count_ties_by_key() {
    let topk = TopK::new(4).unwrap();
    for _ in 0..3 {
        topk.update("pear");
        topk.update("apple");
    }
    topk.update("fig");

    let keys: Vec<_> = topk.keys().iter().map(|e| e.key().to_string()).collect();
    assert_eq!(keys, ["apple", "pear", "fig"]);
    assert_eq!(topk.top(2).len(), 2);
    assert_eq!(topk.top(2)[0].key(), "apple");
    assert_eq!(topk.top(10).len(), 3);
}

#[test]
fn test_below_threshold_keys_are_tracked_in_buckets() {
    let topk = TopK::new(1).unwrap();
    topk.insert("a", 5);

    let entry = topk.insert("b", 1);
    assert_eq!(entry.key(), "b");
    assert_eq!(entry.count(), 1);
    assert_eq!(entry.error(), 0);
    assert_eq!(topk.len(), 1);
    assert_eq!(topk.keys()[0].key(), "a");

    let estimate = topk.estimate("b");
    assert_eq!(estimate.count(), 1);
    assert_eq!(estimate.error(), 1);

    let entry = topk.insert("b", 3);
    assert_eq!(entry.count(), 4);
    assert_eq!(entry.error(), 1);
    assert_eq!(topk.keys()[0].key(), "a");

    // 4 + 1 reaches the monitored minimum of 5.
    let entry = topk.insert("b", 1);
    assert_eq!(entry.count(), 5);
    assert_eq!(entry.error(), 4);
    let keys = topk.keys();
    assert_eq!(keys.len(), 1);
    assert_eq!(keys[0].key(), "b");

    let evicted = topk.estimate("a");
    assert_eq!(evicted.count(), 5);
    assert_eq!(evicted.error(), 5);
}

#[test]
fn test_monitored_update_keeps_error() {
    let topk = TopK::new(1).unwrap();
    topk.insert("a", 2);
    topk.insert("b", 2);
    let promoted = topk.estimate("b");
    assert_eq!(promoted.count(), 2);
    assert_eq!(promoted.error(), 0);

    let entry = topk.insert("b", 10);
    assert_eq!(entry.count(), 12);
    assert_eq!(entry.error(), 0);
}

#[test]
fn test_zero_amounts_and_empty_keys() {
    let topk = TopK::new(2).unwrap();
    let entry = topk.insert("", 0);
    assert_eq!(entry.key(), "");
    assert_eq!(entry.count(), 0);

    topk.insert("", 2);
    topk.insert("b", 4);
    assert_eq!(topk.estimate("").count(), 2);

    // Full set, minimum count 2: a zero amount for an unseen key is not promoted.
    let entry = topk.insert("c", 0);
    assert_eq!(entry.count(), topk.estimate("c").count());
    assert_eq!(topk.len(), 2);
    assert!(topk.keys().iter().all(|e| e.key() != "c"));
    assert_eq!(topk.total_weight(), 6);
}

#[test]
fn test_counts_saturate() {
    let topk = TopK::new(1).unwrap();
    topk.insert("a", u64::MAX);
    let entry = topk.insert("a", 1);
    assert_eq!(entry.count(), u64::MAX);
    assert_eq!(topk.total_weight(), u64::MAX);

    let entry = topk.insert("b", u64::MAX);
    assert!(entry.count() >= entry.error());
}

#[test]
fn test_heavy_hitter_survives_noise() {
    let topk = TopK::new(10).unwrap();
    let mut truth: HashMap<String, u64> = HashMap::new();
    for i in 0..5_000u64 {
        let noise = format!("noise-{i}");
        topk.update(&noise);
        *truth.entry(noise).or_default() += 1;
        if i % 5 == 0 {
            topk.update("heavy");
            *truth.entry("heavy".to_string()).or_default() += 1;
        }
    }

    let top = topk.top(1);
    assert_eq!(top[0].key(), "heavy");
    assert_that!(top[0].lower_bound(), le(1_000));
    assert_that!(top[0].upper_bound(), ge(1_000));
    assert_bounds(&topk, &truth);

    for entry in topk.keys() {
        assert!(entry.count() >= entry.error());
    }
    assert_eq!(topk.len(), 10);
}

#[test]
fn test_single_slot_under_many_distinct_keys() {
    let topk = TopK::new(1).unwrap();
    let mut truth: HashMap<String, u64> = HashMap::new();
    for i in 0..2_000u64 {
        let key = format!("k{}", i % 97);
        topk.insert(&key, i % 4);
        *truth.entry(key).or_default() += i % 4;
    }
    assert_eq!(topk.len(), 1);
    let entry = &topk.keys()[0];
    assert!(entry.count() >= entry.error());
    assert_bounds(&topk, &truth);
}

#[test]
fn test_builder_seed_changes_nothing_under_capacity() {
    let a = TopK::builder(8).seed(1).build().unwrap();
    let b = TopK::builder(8).seed(2).build().unwrap();
    for key in ["one", "two", "two", "three", "three", "three"] {
        a.update(key);
        b.update(key);
    }
    assert_eq!(a.keys(), b.keys());
    assert_eq!(a.seed(), 1);
    assert_eq!(b.seed(), 2);
}

#[test]
fn test_clone_is_independent() {
    let topk = TopK::new(4).unwrap();
    topk.insert("a", 3);
    let copy = topk.clone();
    topk.insert("a", 3);
    assert_eq!(copy.estimate("a").count(), 3);
    assert_eq!(topk.estimate("a").count(), 6);
}
