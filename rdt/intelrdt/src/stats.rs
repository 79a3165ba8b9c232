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

use std::path::Path;

use crate::Error;
use crate::FeatureSet;
use crate::FsProvider;
use crate::L3CacheInfo;
use crate::MbmNumaNodeStats;
use crate::MemBwInfo;
use crate::MonFeatures;
use crate::Resource;
use crate::Result;
use crate::Stats;
use crate::features::INFO_L3;
use crate::features::INFO_MB;
use crate::read_singleline_file;
use crate::schemata::find_schema;
use crate::schemata::read_schemata;
use crate::wrap;

const MON_DATA: &str = "mon_data";

fn read_l3_cache_info<P: FsProvider + ?Sized>(fs: &P, root: &Path) -> Result<L3CacheInfo> {
    let dir = root.join(INFO_L3);
    Ok(L3CacheInfo {
        cbm_mask: read_singleline_file(fs, &dir, "cbm_mask")?,
        min_cbm_bits: read_singleline_file(fs, &dir, "min_cbm_bits")?,
        num_closids: read_singleline_file(fs, &dir, "num_closids")?,
    })
}

fn read_mem_bw_info<P: FsProvider + ?Sized>(fs: &P, root: &Path) -> Result<MemBwInfo> {
    let dir = root.join(INFO_MB);
    Ok(MemBwInfo {
        bandwidth_gran: read_singleline_file(fs, &dir, "bandwidth_gran")?,
        delay_linear: read_singleline_file(fs, &dir, "delay_linear")?,
        min_bandwidth: read_singleline_file(fs, &dir, "min_bandwidth")?,
        num_closids: read_singleline_file(fs, &dir, "num_closids")?,
    })
}

/// Read the hardware limits under `<root>/info`. Resources whose feature is
/// disabled are not read at all and come back as `None`.
pub fn collect_root_info<P: FsProvider + ?Sized>(
    fs: &P,
    root: &Path,
    features: &FeatureSet,
) -> Result<(Option<L3CacheInfo>, Option<MemBwInfo>)> {
    let l3 = match features.cat {
        true => Some(read_l3_cache_info(fs, root)?),
        false => None,
    };
    let mb = match features.mba {
        true => Some(read_mem_bw_info(fs, root)?),
        false => None,
    };
    Ok((l3, mb))
}

/// Read the enabled counters of a single `mon_data/<node>` directory. An
/// enabled counter that is missing is an error.
fn read_numa_node_stats<P: FsProvider + ?Sized>(
    fs: &P,
    node: &Path,
    mon: MonFeatures,
) -> Result<MbmNumaNodeStats> {
    let read = |enabled: bool, name: &str| -> Result<Option<u64>> {
        if !enabled {
            return Ok(None);
        }
        read_singleline_file(fs, node, name).map(Some)
    };
    Ok(MbmNumaNodeStats {
        mbm_total_bytes: read(mon.mbm_total_bytes, "mbm_total_bytes")?,
        mbm_local_bytes: read(mon.mbm_local_bytes, "mbm_local_bytes")?,
        llc_occupancy: read(mon.llc_occupancy, "llc_occupancy")?,
    })
}

/// Read the monitoring counters of every node under `<group>/mon_data`, in
/// directory name order. A group without `mon_data` has no nodes. The first
/// failing node fails the whole collection.
pub fn collect_mbm_stats<P: FsProvider + ?Sized>(
    fs: &P,
    group: &Path,
    mon: MonFeatures,
) -> Result<Vec<MbmNumaNodeStats>> {
    let mon_data = group.join(MON_DATA);
    let nodes = fs
        .list_dirs(&mon_data)
        .map_err(|e| Error::IoError(mon_data.clone(), e));
    wrap(nodes)?
        .unwrap_or_default()
        .iter()
        .map(|node| read_numa_node_stats(fs, node, mon))
        .collect()
}

/// Assemble a `Stats` snapshot of `group`, which lives under `root`.
pub fn collect_stats<P: FsProvider + ?Sized>(
    fs: &P,
    root: &Path,
    group: &Path,
    features: &FeatureSet,
) -> Result<Stats> {
    let root_schemata = read_schemata(fs, root)?;
    let group_schemata = read_schemata(fs, group)?;
    let (l3_cache_info, mem_bw_info) = collect_root_info(fs, root, features)?;

    let mut stats = Stats {
        l3_cache_info,
        mem_bw_info,
        ..Default::default()
    };
    if features.cat {
        stats.l3_cache_schema_root = find_schema(&root_schemata, Resource::L3);
        stats.l3_cache_schema = find_schema(&group_schemata, Resource::L3);
    }
    if features.mba {
        stats.mem_bw_schema_root = find_schema(&root_schemata, Resource::Mb);
        stats.mem_bw_schema = find_schema(&group_schemata, Resource::Mb);
    }
    if let Some(mon) = features.mon {
        stats.mbm_stats = Some(collect_mbm_stats(fs, group, mon)?);
    }
    Ok(stats)
}
