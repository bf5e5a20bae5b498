//! Utility functions.

use std::ffi::OsStr;
use std::path::PathBuf;

/// Returns a path for a given file, searching through `PATH` to find it.
pub fn get_from_path(exe_name: &str) -> Option<PathBuf> {
    std::env::var_os("PATH").and_then(|paths| {
        std::env::split_paths(&paths).find_map(|dir| {
            let exe_path = dir.join(exe_name);
            if exe_path.is_file() {
                Some(exe_path)
            } else {
                None
            }
        })
    })
}

/// Returns the default byte budget for the arguments of a single subprocess
/// invocation on this platform.
pub fn default_max_arg_length() -> usize {
    if cfg!(target_os = "macos") {
        262144
    } else if cfg!(windows) {
        8191
    } else {
        131072
    }
}

/// Split `files` into ordered chunks such that the summed byte lengths of
/// each chunk's arguments (one separator byte per argument included) stay
/// within `max_arg_length`.
///
/// Chunk order preserves input order. Empty input produces no chunks. A
/// single file longer than the whole budget is emitted as its own chunk
/// unchanged; the operating system is left to reject it if it must.
pub fn chunk_by_arg_length<S: AsRef<OsStr>>(files: &[S], max_arg_length: usize) -> Vec<&[S]> {
    let mut chunks = Vec::new();
    let mut start = 0;
    let mut length = 0;
    for (index, file) in files.iter().enumerate() {
        let arg_length = file.as_ref().len() + 1;
        if length + arg_length > max_arg_length && index > start {
            chunks.push(&files[start..index]);
            start = index;
            length = 0;
        }
        length += arg_length;
    }
    if start < files.len() {
        chunks.push(&files[start..]);
    }
    chunks
}
