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

//! Locating the resctrl mount in a `/proc/<pid>/mountinfo` table.
//!
//! Each line looks like
//! `36 35 0:31 / /sys/fs/resctrl rw,relatime shared:19 - resctrl resctrl rw,mba_MBps`
//! i.e. six fixed fields, any number of optional fields, a lone `-`, then
//! filesystem type, mount source and super block options.

use std::ffi::OsString;
use std::io::BufRead;
use std::os::unix::ffi::OsStringExt;
use std::path::Path;
use std::path::PathBuf;

use crate::Error;
use crate::MountInfoError;
use crate::MountState;
use crate::Result;

pub const PROC_SELF_MOUNTINFO: &str = "/proc/self/mountinfo";

const RESCTRL_FS_TYPE: &str = "resctrl";
const MBA_SC_OPTION: &str = "mba_MBps";
const MIN_FIELDS: usize = 10;
const FIXED_FIELDS: usize = 6;
const MOUNT_POINT_FIELD: usize = 4;

#[derive(Debug, PartialEq, Eq)]
struct MountInfoLine<'a> {
    mount_point: &'a str,
    fs_type: &'a str,
    super_options: &'a str,
}

fn parse_line(line: &str) -> std::result::Result<MountInfoLine<'_>, MountInfoError> {
    let fields: Vec<&str> = line.split_whitespace().collect();
    if fields.len() < MIN_FIELDS {
        return Err(MountInfoError::NotEnoughFields(
            line.to_owned(),
            fields.len(),
        ));
    }
    let sep = fields
        .iter()
        .skip(FIXED_FIELDS)
        .position(|f| *f == "-")
        .map(|i| i + FIXED_FIELDS)
        .ok_or_else(|| MountInfoError::MissingSeparator(line.to_owned()))?;
    let post = &fields[sep + 1..];
    if post.len() < 3 {
        return Err(MountInfoError::NotEnoughFieldsAfterSeparator(
            line.to_owned(),
            post.len(),
        ));
    }
    Ok(MountInfoLine {
        mount_point: fields[MOUNT_POINT_FIELD],
        fs_type: post[0],
        super_options: post[2],
    })
}

/// The kernel escapes space, tab, newline and backslash in paths as `\ooo`.
fn unescape(s: &str) -> PathBuf {
    let bytes = s.as_bytes();
    let mut out = Vec::with_capacity(bytes.len());
    let mut i = 0;
    while i < bytes.len() {
        if bytes[i] == b'\\' && i + 4 <= bytes.len() {
            let digits = &bytes[i + 1..i + 4];
            if digits.iter().all(|d| (b'0'..=b'7').contains(d)) {
                let v = digits
                    .iter()
                    .fold(0u32, |acc, d| acc * 8 + u32::from(d - b'0'));
                if let Ok(b) = u8::try_from(v) {
                    out.push(b);
                    i += 4;
                    continue;
                }
            }
        }
        out.push(bytes[i]);
        i += 1;
    }
    PathBuf::from(OsString::from_vec(out))
}

/// Scan a mountinfo table and return the first resctrl mount. Any parse
/// failure is reported as `Error::NotFound` carrying the parse error, so
/// callers see a broken table the same way as a missing mount. `source` is
/// only used to label read errors.
pub fn find_resctrl_mount<R: BufRead>(source: &Path, reader: R) -> Result<MountState> {
    for line in reader.lines() {
        let line = line.map_err(|e| Error::IoError(source.to_path_buf(), e))?;
        let info = parse_line(&line).map_err(|e| Error::NotFound(Some(e)))?;
        if info.fs_type == RESCTRL_FS_TYPE {
            return Ok(MountState {
                root: unescape(info.mount_point),
                mba_sc: info
                    .super_options
                    .split(',')
                    .any(|opt| opt == MBA_SC_OPTION),
            });
        }
    }
    Err(Error::NotFound(None))
}
