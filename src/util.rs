// Copyright 2022 F4PGA Authors
// Licensed under the Apache License, Version 2.0.

//! Filesystem and string helpers shared by benchmark runners.

use std::ffi::OsStr;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use serde::Serialize;

/// Locate `program` on the `PATH` of the current process.
///
/// A program given with a directory component is returned as is when it is executable.
pub fn which(program: impl AsRef<OsStr>) -> Option<PathBuf> {
    ::which::which(program).ok()
}

/// Locate `program` in an explicit search path, resolving relative names against `cwd`.
pub fn which_in(
    program: impl AsRef<OsStr>,
    search_path: Option<impl AsRef<OsStr>>,
    cwd: impl AsRef<Path>,
) -> Option<PathBuf> {
    ::which::which_in(program, search_path, cwd).ok()
}

/// Whether `program` can be found on the `PATH`.
pub fn have_exec(program: impl AsRef<OsStr>) -> bool {
    which(program).is_some()
}

/// Whether `path` is a regular file that may be executed.
pub fn is_executable(path: &Path) -> bool {
    let metadata = match std::fs::metadata(path) {
        Ok(metadata) => metadata,
        Err(_) => return false,
    };
    metadata.is_file() && has_exec_bit(&metadata)
}

#[cfg(unix)]
fn has_exec_bit(metadata: &std::fs::Metadata) -> bool {
    use std::os::unix::fs::PermissionsExt;
    metadata.permissions().mode() & 0o111 != 0
}

#[cfg(not(unix))]
fn has_exec_bit(_: &std::fs::Metadata) -> bool {
    true
}

/// A source or constraint file handed to a toolchain, with its absolute path.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct FileDescriptor {
    pub name: PathBuf,
    pub file_type: String,
}

/// Describe `file_name`, resolved against `base` when relative.
///
/// The path is canonicalized when the file exists.
pub fn file_descriptor(
    base: &Path,
    file_name: impl AsRef<Path>,
    file_type: impl Into<String>,
) -> FileDescriptor {
    let path = base.join(file_name);
    let name = std::fs::canonicalize(&path).unwrap_or(path);
    FileDescriptor { name, file_type: file_type.into() }
}

/// `string` without `prefix`, or `string` itself when it does not start with `prefix`.
pub fn remove_prefix<'a>(string: &'a str, prefix: &str) -> &'a str {
    string.strip_prefix(prefix).unwrap_or(string)
}

/// `string` without `suffix`, or `string` itself when it does not end with `suffix`.
pub fn remove_suffix<'a>(string: &'a str, suffix: &str) -> &'a str {
    string.strip_suffix(suffix).unwrap_or(string)
}

/// Receives the runtime of named steps.
pub trait RuntimeRecorder {
    /// `unprinted` marks runtimes that are recorded but left out of summaries.
    fn add_runtime(&mut self, name: &str, elapsed: Duration, unprinted: bool);
}

/// Measures a step from creation until drop, then reports it to the recorder.
pub struct Timed<'a, R: RuntimeRecorder + ?Sized> {
    recorder: &'a mut R,
    name: String,
    start: Instant,
    unprinted: bool,
}

impl<'a, R: RuntimeRecorder + ?Sized> Timed<'a, R> {
    pub fn new(recorder: &'a mut R, name: impl Into<String>) -> Self {
        Timed { recorder, name: name.into(), start: Instant::now(), unprinted: false }
    }

    /// Like [`Timed::new`], for runtimes left out of summaries.
    pub fn unprinted(recorder: &'a mut R, name: impl Into<String>) -> Self {
        Timed { recorder, name: name.into(), start: Instant::now(), unprinted: true }
    }
}

impl<'a, R: RuntimeRecorder + ?Sized> Drop for Timed<'a, R> {
    fn drop(&mut self) {
        let elapsed = self.start.elapsed();
        log::debug!("{} took {:?}", self.name, elapsed);
        self.recorder.add_runtime(&self.name, elapsed, self.unprinted);
    }
}
