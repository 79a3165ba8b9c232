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

use std::fs::File;
use std::io::BufRead;
use std::io::BufReader;
use std::io::ErrorKind;
use std::path::Path;
use std::path::PathBuf;

use once_cell::sync::OnceCell;
use serde::Deserialize;
use serde::Serialize;
use slog::debug;
use slog::info;

use crate::Error;
use crate::FeatureSet;
use crate::FsProvider;
use crate::GroupConfig;
use crate::MountState;
use crate::PROC_SELF_MOUNTINFO;
use crate::RealFs;
use crate::Result;
use crate::Stats;
use crate::find_resctrl_mount;
use crate::probe_features;
use crate::read_lines;
use crate::schemata::write_schemata;
use crate::stats::collect_stats;

const TASKS: &str = "tasks";

/// Discovered once for the whole process by `RdtContext::global`.
static RDT_CONTEXT: OnceCell<RdtContext> = OnceCell::new();

/// Where resctrl lives and what the kernel supports. Immutable once
/// discovered; every group operation reads it.
#[derive(Clone, PartialEq, Eq, Debug, Serialize, Deserialize)]
pub struct RdtContext {
    mount: MountState,
    features: FeatureSet,
}

impl RdtContext {
    pub fn new(mount: MountState, features: FeatureSet) -> Self {
        Self { mount, features }
    }

    /// Find the resctrl mount in `mountinfo` and probe its features.
    /// `source` names the mountinfo table in errors.
    pub fn discover<P: FsProvider + ?Sized, R: BufRead>(
        fs: &P,
        source: &Path,
        mountinfo: R,
        logger: &slog::Logger,
    ) -> Result<Self> {
        let mount = find_resctrl_mount(source, mountinfo)?;
        fs.check_resctrl(&mount.root)?;
        let features = probe_features(fs, &mount, logger)?;
        info!(
            logger,
            "Found Intel RDT mounted at {} (mba_MBps: {})",
            mount.root.display(),
            mount.mba_sc
        );
        Ok(Self { mount, features })
    }

    /// Same as `discover`, reading the mountinfo table at `path`.
    pub fn discover_from_path<P: FsProvider + ?Sized>(
        fs: &P,
        path: &Path,
        logger: &slog::Logger,
    ) -> Result<Self> {
        let file = File::open(path).map_err(|e| Error::IoError(path.to_path_buf(), e))?;
        Self::discover(fs, path, BufReader::new(file), logger)
    }

    /// The process wide context, discovered from `/proc/self/mountinfo` on
    /// first use. Concurrent first callers wait for a single discovery; a
    /// failed discovery is not cached.
    pub fn global(logger: &slog::Logger) -> Result<&'static RdtContext> {
        RDT_CONTEXT.get_or_try_init(|| {
            Self::discover_from_path(&RealFs::default(), Path::new(PROC_SELF_MOUNTINFO), logger)
        })
    }

    pub fn mount(&self) -> &MountState {
        &self.mount
    }

    pub fn root(&self) -> &Path {
        &self.mount.root
    }

    pub fn features(&self) -> &FeatureSet {
        &self.features
    }

    pub fn is_cat_enabled(&self) -> bool {
        self.features.cat
    }

    pub fn is_mba_enabled(&self) -> bool {
        self.features.mba
    }

    pub fn is_mba_sc_enabled(&self) -> bool {
        self.features.mba_sc
    }

    pub fn is_mbm_enabled(&self) -> bool {
        self.features.mbm_enabled()
    }
}

/// Manages resctrl groups below the mount root of an `RdtContext`. Groups
/// are addressed by path and go through
/// created (`apply`) -> configured (`set`) -> destroyed (`destroy`).
/// The manager keeps no per group state, so the same group may be driven
/// from several managers; writes to one group are not serialized here.
pub struct Manager<P: FsProvider = RealFs> {
    ctx: RdtContext,
    fs: P,
    logger: slog::Logger,
}

impl Manager<RealFs> {
    /// Manager over the host's resctrl mount.
    pub fn new(logger: slog::Logger) -> Result<Self> {
        let ctx = RdtContext::global(&logger)?.clone();
        Ok(Self::with_provider(RealFs::default(), ctx, logger))
    }
}

impl<P: FsProvider> Manager<P> {
    pub fn with_provider(fs: P, ctx: RdtContext, logger: slog::Logger) -> Self {
        Self { ctx, fs, logger }
    }

    pub fn context(&self) -> &RdtContext {
        &self.ctx
    }

    pub fn fs_provider(&self) -> &P {
        &self.fs
    }

    /// Path of the group named `id`.
    pub fn group_path(&self, id: &str) -> PathBuf {
        self.ctx.root().join(id)
    }

    /// Create the group directory. Succeeds if it already exists.
    pub fn apply(&self, group: &Path) -> Result<()> {
        self.fs
            .create_dir(group)
            .map_err(|e| Error::IoError(group.to_path_buf(), e))?;
        debug!(self.logger, "Created resctrl group {}", group.display());
        Ok(())
    }

    /// Write the resources named in `cfg` to the group's schemata. A config
    /// without resources does nothing.
    pub fn set(&self, group: &Path, cfg: &GroupConfig) -> Result<()> {
        if cfg.is_empty() {
            return Ok(());
        }
        write_schemata(&self.fs, group, cfg, &self.logger)
    }

    pub fn get_stats(&self, group: &Path) -> Result<Stats> {
        collect_stats(&self.fs, self.ctx.root(), group, &self.ctx.features)
    }

    /// Remove the group. Succeeds if it is already gone.
    pub fn destroy(&self, group: &Path) -> Result<()> {
        match self.fs.remove_dir(group) {
            Ok(()) => {
                debug!(self.logger, "Removed resctrl group {}", group.display());
                Ok(())
            }
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(Error::IoError(group.to_path_buf(), e)),
        }
    }

    /// Move `pid` into the group.
    pub fn add_task(&self, group: &Path, pid: u32) -> Result<()> {
        let path = group.join(TASKS);
        self.fs
            .write_line(&path, &pid.to_string())
            .map_err(|e| Error::IoError(path, e))?;
        debug!(self.logger, "Added task {} to {}", pid, group.display());
        Ok(())
    }

    /// Pids currently assigned to the group.
    pub fn tasks(&self, group: &Path) -> Result<Vec<u32>> {
        read_lines(&self.fs, group, TASKS)?
            .into_iter()
            .filter(|l| !l.trim().is_empty())
            .map(|l| {
                l.trim()
                    .parse::<u32>()
                    .map_err(|_| Error::UnexpectedLine(group.join(TASKS), l))
            })
            .collect()
    }
}
