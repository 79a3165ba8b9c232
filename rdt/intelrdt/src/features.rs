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

use std::io::BufRead;
use std::path::Path;

use slog::info;
use slog::warn;

use crate::Error;
use crate::FeatureSet;
use crate::FsProvider;
use crate::MonFeatures;
use crate::MountState;
use crate::Result;
use crate::read_lines;
use crate::wrap;

pub(crate) const INFO_L3: &str = "info/L3";
pub(crate) const INFO_MB: &str = "info/MB";
const INFO_L3_MON: &str = "info/L3_MON";

/// Parse the content of `info/L3_MON/mon_features`. Counters this crate does
/// not know about are logged and skipped.
pub fn parse_mon_features<R: BufRead>(reader: R, logger: &slog::Logger) -> Result<MonFeatures> {
    let lines = reader
        .lines()
        .collect::<std::io::Result<Vec<_>>>()
        .map_err(|e| Error::IoError("mon_features".into(), e))?;
    Ok(mon_features_from_lines(&lines, logger))
}

fn mon_features_from_lines<S: AsRef<str>>(lines: &[S], logger: &slog::Logger) -> MonFeatures {
    let mut features = MonFeatures::default();
    for line in lines {
        match line.as_ref() {
            "mbm_total_bytes" => features.mbm_total_bytes = true,
            "mbm_local_bytes" => features.mbm_local_bytes = true,
            "llc_occupancy" => features.llc_occupancy = true,
            other => warn!(
                logger,
                "Unsupported RDT Memory Bandwidth Monitoring (MBM) feature: {}", other
            ),
        }
    }
    features
}

/// Probe the kernel's `info` directory under the mount root. Every probe is
/// independent; a missing file only clears the matching flag.
pub fn probe_features<P: FsProvider + ?Sized>(
    fs: &P,
    mount: &MountState,
    logger: &slog::Logger,
) -> Result<FeatureSet> {
    let root: &Path = &mount.root;
    let mon = wrap(read_lines(fs, &root.join(INFO_L3_MON), "mon_features"))?
        .map(|lines| mon_features_from_lines(&lines, logger));
    let features = FeatureSet {
        cat: fs.exists(&root.join(INFO_L3)),
        mba: fs.exists(&root.join(INFO_MB)),
        mba_sc: mount.mba_sc,
        mon,
    };
    info!(
        logger,
        "Intel RDT features under {}: cat={} mba={} mba_sc={} mbm={}",
        root.display(),
        features.cat,
        features.mba,
        features.mba_sc,
        features.mbm_enabled()
    );
    Ok(features)
}
