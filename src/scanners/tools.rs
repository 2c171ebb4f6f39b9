// Copyright (c) 2026 Bountyy Oy. All rights reserved.
// This software is proprietary and confidential.

//! External tool discovery. Binaries are looked up in the directory named by
//! `HARRIER_TOOLS_DIR`, then in `tools/<os>/` next to the executable, then in
//! PATH. A missing binary only disables the module that wraps it.

use std::path::{Path, PathBuf};
use tracing::debug;

fn os_dir() -> &'static str {
    match std::env::consts::OS {
        "macos" => "darwin",
        "windows" => "win",
        _ => "linux",
    }
}

fn candidate_exists(path: &Path) -> Option<PathBuf> {
    if path.is_file() {
        return Some(path.to_path_buf());
    }
    if cfg!(windows) {
        let with_ext = path.with_extension("exe");
        if with_ext.is_file() {
            return Some(with_ext);
        }
    }
    None
}

/// Locate an external tool binary, or None when it is absent
pub fn find_tool(name: &str) -> Option<PathBuf> {
    if let Ok(dir) = std::env::var("HARRIER_TOOLS_DIR") {
        if let Some(path) = candidate_exists(&Path::new(&dir).join(name)) {
            debug!("Found {} at {}", name, path.display());
            return Some(path);
        }
    }

    if let Ok(exe) = std::env::current_exe() {
        if let Some(exe_dir) = exe.parent() {
            let candidates = [
                exe_dir.join("tools").join(os_dir()).join(name),
                exe_dir.join("tools").join(name),
            ];
            for candidate in &candidates {
                if let Some(path) = candidate_exists(candidate) {
                    debug!("Found {} at {}", name, path.display());
                    return Some(path);
                }
            }
        }
    }

    // PATH lookup
    if let Some(paths) = std::env::var_os("PATH") {
        for dir in std::env::split_paths(&paths) {
            if let Some(path) = candidate_exists(&dir.join(name)) {
                debug!("Found {} in PATH: {}", name, path.display());
                return Some(path);
            }
        }
    }

    debug!("Tool {} not found", name);
    None
}
