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

use slog::debug;

use crate::Error;
use crate::FsProvider;
use crate::GroupConfig;
use crate::Result;
use crate::read_lines;

pub(crate) const SCHEMATA: &str = "schemata";

/// A resource that has a line in `schemata`.
#[derive(Clone, Copy, PartialEq, Eq, Debug)]
pub enum Resource {
    /// L3 cache allocation, tag `L3`
    L3,
    /// Memory bandwidth allocation, tag `MB`
    Mb,
}

impl Resource {
    pub fn tag(&self) -> &'static str {
        match self {
            Resource::L3 => "L3",
            Resource::Mb => "MB",
        }
    }

    /// Build the full `schemata` line for `value`. Values already carrying
    /// this resource's tag are used as is.
    pub fn line(&self, value: &str) -> String {
        match value.strip_prefix(self.tag()) {
            Some(rest) if rest.starts_with(':') => value.to_owned(),
            _ => format!("{}:{}", self.tag(), value),
        }
    }

    fn matches(&self, line: &str) -> bool {
        line.split_once(':')
            .is_some_and(|(tag, _)| tag.trim() == self.tag())
    }
}

impl std::fmt::Display for Resource {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.tag())
    }
}

/// Return the lines of `<group>/schemata` in file order, unmodified.
pub fn read_schemata<P: FsProvider + ?Sized>(fs: &P, group: &Path) -> Result<Vec<String>> {
    read_lines(fs, group, SCHEMATA)
}

/// First line for `resource`, with surrounding whitespace removed.
pub(crate) fn find_schema(lines: &[String], resource: Resource) -> Option<String> {
    lines
        .iter()
        .find(|l| resource.matches(l))
        .map(|l| l.trim().to_owned())
}

/// Write the resources set in `cfg` to `<group>/schemata`, one write per
/// resource. The kernel applies each write on its own and keeps the lines
/// of resources not written, so lines not named in `cfg` stay as they are.
/// Rejections by the kernel come back as the write's I/O error.
pub fn write_schemata<P: FsProvider + ?Sized>(
    fs: &P,
    group: &Path,
    cfg: &GroupConfig,
    logger: &slog::Logger,
) -> Result<()> {
    let path = group.join(SCHEMATA);
    for (resource, value) in [
        (Resource::L3, &cfg.l3_cache_schema),
        (Resource::Mb, &cfg.mem_bw_schema),
    ] {
        if value.is_empty() {
            continue;
        }
        let line = resource.line(value);
        fs.write_line(&path, &line)
            .map_err(|e| Error::IoError(path.clone(), e))?;
        debug!(logger, "Wrote {} to {}", line, path.display());
    }
    Ok(())
}
