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

use std::path::Path;
use std::path::PathBuf;
use std::str::FromStr;

use thiserror::Error;

mod features;
mod manager;
mod mountinfo;
mod provider;
mod schemata;
mod stats;
mod types;

pub use features::parse_mon_features;
pub use features::probe_features;
pub use manager::Manager;
pub use manager::RdtContext;
pub use mountinfo::PROC_SELF_MOUNTINFO;
pub use mountinfo::find_resctrl_mount;
pub use provider::FsProvider;
pub use provider::RealFs;
pub use schemata::Resource;
pub use schemata::read_schemata;
pub use schemata::write_schemata;
pub use stats::collect_mbm_stats;
pub use stats::collect_root_info;
pub use stats::collect_stats;
pub use types::*;


pub const DEFAULT_RESCTRL_ROOT: &str = "/sys/fs/resctrl";

/// Why a mountinfo line could not be parsed.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MountInfoError {
    #[error("Parsing '{0}' failed: not enough fields ({1})")]
    NotEnoughFields(String, usize),
    #[error("Parsing '{0}' failed: missing separator ('-')")]
    MissingSeparator(String),
    #[error("Parsing '{0}' failed: not enough fields after a separator ({1})")]
    NotEnoughFieldsAfterSeparator(String, usize),
}

fn not_found_detail(e: &Option<MountInfoError>) -> String {
    match e {
        Some(e) => format!(" : {}", e),
        None => String::new(),
    }
}

#[derive(Error, Debug)]
pub enum Error {
    #[error("mountpoint for Intel RDT not found{}", not_found_detail(.0))]
    NotFound(Option<MountInfoError>),
    #[error("Invalid file format: {0:?}")]
    InvalidFileFormat(PathBuf),
    #[error("{1:?}: {0:?}")]
    IoError(PathBuf, #[source] std::io::Error),
    #[error("Unexpected line ({1}) in file: {0:?}")]
    UnexpectedLine(PathBuf, String),
    #[error("Not resctrl filesystem: {0:?}")]
    NotResctrl(PathBuf),
}

impl Error {
    /// True when Intel RDT is not available at all, which callers usually
    /// treat as a disabled feature rather than a failure.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Error::NotFound(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;

/// resctrlfs can give us a NotFound for various files and directories. In a lot of cases, these
/// are expected (e.g. when a feature is not supported by the kernel). Thus we translate these
/// errors to `None`. Only use this where absence really means "unsupported".
fn wrap<S: Sized>(v: std::result::Result<S, Error>) -> std::result::Result<Option<S>, Error> {
    if let Err(Error::IoError(_, ref e)) = v {
        if e.kind() == std::io::ErrorKind::NotFound {
            return Ok(None);
        }
        if let Some(errno) = e.raw_os_error() {
            if errno == nix::errno::Errno::ENODEV as i32 {
                // The group was removed after we started reading it.
                return Ok(None);
            }
        }
    }
    v.map(Some)
}

/// Read the lines of `dir/file_name`.
fn read_lines<P: FsProvider + ?Sized>(fs: &P, dir: &Path, file_name: &str) -> Result<Vec<String>> {
    let path = dir.join(file_name);
    fs.read_lines(&path).map_err(|e| Error::IoError(path, e))
}

/// Read a value from a file that has a single line. If the file is empty,
/// InvalidFileFormat is returned.
fn read_singleline_file<T: FromStr, P: FsProvider + ?Sized>(
    fs: &P,
    dir: &Path,
    file_name: &str,
) -> Result<T> {
    let mut lines = read_lines(fs, dir, file_name)?.into_iter();
    match lines.next() {
        Some(line) => line
            .trim()
            .parse::<T>()
            .map_err(|_| Error::UnexpectedLine(dir.join(file_name), line)),
        None => Err(Error::InvalidFileFormat(dir.join(file_name))),
    }
}
