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
use std::fs::OpenOptions;
use std::io;
use std::io::BufRead;
use std::io::BufReader;
use std::io::ErrorKind;
use std::io::Write;
use std::path::Path;
use std::path::PathBuf;

use nix::sys::statfs::RDTGROUP_SUPER_MAGIC;
use nix::sys::statfs::statfs;
use openat::Dir;
use openat::SimpleType;

use crate::Error;
use crate::Result;

/// The narrow set of filesystem operations resctrl management needs. Kernel
/// files have no compile time interface, so everything goes through here and
/// tests can swap in a fake kernel.
pub trait FsProvider {
    /// Read a file and return its lines in order, without line terminators.
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>>;

    /// Write `line` to an existing file with a single write call.
    fn write_line(&self, path: &Path, line: &str) -> io::Result<()>;

    /// Return the sub directories of `path` sorted by name, like a glob of
    /// `path/*` would.
    fn list_dirs(&self, path: &Path) -> io::Result<Vec<PathBuf>>;

    fn exists(&self, path: &Path) -> bool;

    /// Create a directory. Succeeds if it already exists.
    fn create_dir(&self, path: &Path) -> io::Result<()>;

    /// Remove a directory without touching its contents.
    fn remove_dir(&self, path: &Path) -> io::Result<()>;

    /// Fail with `Error::NotResctrl` if `path` is not the root of a resctrl
    /// filesystem.
    fn check_resctrl(&self, path: &Path) -> Result<()>;
}

/// Provider backed by the host filesystem.
#[derive(Clone, Debug)]
pub struct RealFs {
    validate: bool,
}

impl Default for RealFs {
    fn default() -> Self {
        Self::new(true)
    }
}

impl RealFs {
    /// With `validate` unset, `check_resctrl` accepts any directory. Used to
    /// run against plain directories that mimic the resctrl layout.
    pub fn new(validate: bool) -> Self {
        Self { validate }
    }
}

impl FsProvider for RealFs {
    fn read_lines(&self, path: &Path) -> io::Result<Vec<String>> {
        let file = File::open(path)?;
        BufReader::new(file).lines().collect()
    }

    fn write_line(&self, path: &Path, line: &str) -> io::Result<()> {
        let mut file = OpenOptions::new().write(true).truncate(true).open(path)?;
        let buf = format!("{}\n", line);
        let written = file.write(buf.as_bytes())?;
        if written != buf.len() {
            return Err(io::Error::new(
                ErrorKind::WriteZero,
                format!("short write: {} of {} bytes", written, buf.len()),
            ));
        }
        Ok(())
    }

    fn list_dirs(&self, path: &Path) -> io::Result<Vec<PathBuf>> {
        let dir = Dir::open(path)?;
        let mut dirs = Vec::new();
        for entry in dir.list_dir(".")? {
            let entry = entry?;
            if entry.simple_type() == Some(SimpleType::Dir) {
                dirs.push(path.join(entry.file_name()));
            }
        }
        dirs.sort();
        Ok(dirs)
    }

    fn exists(&self, path: &Path) -> bool {
        path.exists()
    }

    fn create_dir(&self, path: &Path) -> io::Result<()> {
        std::fs::create_dir_all(path)
    }

    fn remove_dir(&self, path: &Path) -> io::Result<()> {
        // resctrl groups go away with a plain rmdir even though they list
        // files. Anything else that is not empty is refused.
        std::fs::remove_dir(path)
    }

    fn check_resctrl(&self, path: &Path) -> Result<()> {
        if !self.validate {
            return Ok(());
        }
        let stat = statfs(path).map_err(|e| {
            Error::IoError(
                path.to_path_buf(),
                io::Error::other(format!("Failed to statfs: {}", e)),
            )
        })?;
        if stat.filesystem_type() != RDTGROUP_SUPER_MAGIC {
            return Err(Error::NotResctrl(path.to_path_buf()));
        }
        Ok(())
    }
}
