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

//! Serialization constants for top-k snapshots.

/// Family ID for top-k snapshots.
pub(super) const FAMILY_ID: u8 = 25;
/// Family name reported in errors.
pub(super) const FAMILY_NAME: &str = "TopK";
/// Serialization version.
pub(super) const SERIAL_VERSION: u8 = 1;

/// Preamble longs for an empty snapshot: header, capacity, seed.
pub(super) const PREAMBLE_LONGS_EMPTY: u8 = 3;
/// Preamble longs for a non-empty snapshot: adds the total weight.
pub(super) const PREAMBLE_LONGS_NONEMPTY: u8 = 4;

/// Empty flag mask.
pub(super) const EMPTY_FLAG_MASK: u8 = 1 << 2;

/// Bytes in one encoded entry excluding the key: count and error.
pub(super) const ENTRY_FIXED_BYTES: usize = 4 + 8 + 8;
/// Bytes in one encoded index pair excluding the key: key length and position.
pub(super) const INDEX_FIXED_BYTES: usize = 4 + 4;
