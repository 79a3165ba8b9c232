// Copyright (c) Facebook, Inc. and its affiliates.
//
// Licensed under the Apache License, Version 2.0 (the "License");
// you may not use this file except in compliance with the License.
// You may obtain a copy of the License at
//
//     http://www.apache.org/licenses/LICENSE-2.0
//
// Unless required by applicable law or agreed to in writing, software
// distributed under the License is distributed on an "AS IS" BASIS,
// WITHOUT WARRANTIES OR CONDITIONS OF ANY KIND, either express or implied.
// See the License for the specific language governing permissions and
// limitations under the License.
use std::path::PathBuf;

use serde::Deserialize;
use serde::Serialize;

/// Where resctrl is mounted and how. Discovered once from mountinfo.
#[derive(Default, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MountState {
    pub root: PathBuf,
    /// The filesystem was mounted with `-o mba_MBps` (MBA software controller).
    pub mba_sc: bool,
}

/// Monitoring counters advertised in `info/L3_MON/mon_features`.
#[derive(Default, Clone, Copy, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MonFeatures {
    pub mbm_total_bytes: bool,
    pub mbm_local_bytes: bool,
    pub llc_occupancy: bool,
}

/// Capabilities of the running kernel. Absence of a feature is never an
/// error, only a false flag.
#[derive(Default, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct FeatureSet {
    /// L3 Cache Allocation Technology (`info/L3`)
    pub cat: bool,
    /// Memory Bandwidth Allocation (`info/MB`)
    pub mba: bool,
    /// MBA software controller (`mba_MBps` mount option)
    pub mba_sc: bool,
    /// `None` when `info/L3_MON` does not exist at all.
    pub mon: Option<MonFeatures>,
}

impl FeatureSet {
    pub fn mbm_enabled(&self) -> bool {
        self.mon.is_some()
    }
}

/// Per workload allocation request. An empty schema leaves that resource
/// untouched.
#[derive(Default, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
#[serde(default)]
pub struct GroupConfig {
    /// e.g. "L3:0=f0;1=f"
    pub l3_cache_schema: String,
    /// e.g. "MB:0=70;1=20"
    pub mem_bw_schema: String,
}

impl GroupConfig {
    pub fn is_empty(&self) -> bool {
        self.l3_cache_schema.is_empty() && self.mem_bw_schema.is_empty()
    }
}

/// Read-only L3 limits from `info/L3`.
#[derive(Default, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct L3CacheInfo {
    pub cbm_mask: String,
    pub min_cbm_bits: u64,
    pub num_closids: u64,
}

/// Read-only memory bandwidth limits from `info/MB`.
#[derive(Default, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MemBwInfo {
    pub bandwidth_gran: u64,
    pub delay_linear: u64,
    pub min_bandwidth: u64,
    pub num_closids: u64,
}

/// Counters of one `mon_data/<node>` directory. Each field is only read
/// when the matching monitoring feature is enabled.
#[derive(Default, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct MbmNumaNodeStats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbm_total_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbm_local_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub llc_occupancy: Option<u64>,
}

/// Snapshot of a group and of the root limits it is allocated from.
#[derive(Default, Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct Stats {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3_cache_info: Option<L3CacheInfo>,
    /// L3 line of the root group's schemata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3_cache_schema_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub l3_cache_schema: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_bw_info: Option<MemBwInfo>,
    /// MB line of the root group's schemata
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_bw_schema_root: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mem_bw_schema: Option<String>,
    /// One entry per `mon_data` node, in directory name order.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub mbm_stats: Option<Vec<MbmNumaNodeStats>>,
}
