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

#![deny(clippy::all)]

use std::fs;
use std::path::Path;
use std::path::PathBuf;

use anyhow::Context;
use anyhow::Result;
use anyhow::bail;
use intelrdt::GroupConfig;
use intelrdt::RdtContext;
use intelrdt::RealFs;
use serde::Deserialize;
use serde::Serialize;


pub const RDT_DEFAULT_CONF: &str = "/etc/intelrdt/intelrdt.conf";

#[derive(Serialize, Deserialize, Debug)]
// If value is missing during deserialization, use the Default::default()
#[serde(default)]
pub struct RdtConfig {
    pub mountinfo_path: PathBuf,
    /// Check that the discovered mount really is a resctrl filesystem.
    pub validate_mount: bool,
    pub intel_rdt: GroupConfig,
}

impl Default for RdtConfig {
    fn default() -> Self {
        RdtConfig {
            mountinfo_path: intelrdt::PROC_SELF_MOUNTINFO.into(),
            validate_mount: true,
            intel_rdt: GroupConfig::default(),
        }
    }
}

impl RdtConfig {
    pub fn load(path: &Path) -> Result<Self> {
        match path.exists() {
            true if !path.is_file() => bail!("{} exists and is not a file", path.to_string_lossy()),
            true => RdtConfig::load_exists(path),
            false if path.to_string_lossy() == RDT_DEFAULT_CONF => Ok(Default::default()),
            false => bail!("No such file or directory: {}", path.to_string_lossy()),
        }
    }

    fn load_exists(path: &Path) -> Result<Self> {
        let string_config = match fs::read_to_string(path) {
            Ok(sc) => sc,
            Err(e) => {
                bail!(
                    "Failed to read from config file {}: {}",
                    path.to_string_lossy(),
                    e
                );
            }
        };

        match toml::from_str(string_config.as_str()) {
            Ok(rc) => Ok(rc),
            Err(e) => {
                bail!(
                    "Failed to parse config file {}: {}\n{}",
                    path.to_string_lossy(),
                    e,
                    string_config
                );
            }
        }
    }

    pub fn group_config(&self) -> &GroupConfig {
        &self.intel_rdt
    }

    /// Discover the resctrl mount and its features as configured.
    pub fn discover(&self, logger: &slog::Logger) -> Result<RdtContext> {
        RdtContext::discover_from_path(
            &RealFs::new(self.validate_mount),
            &self.mountinfo_path,
            logger,
        )
        .with_context(|| {
            format!(
                "Failed to discover Intel RDT from {}",
                self.mountinfo_path.to_string_lossy()
            )
        })
    }
}
