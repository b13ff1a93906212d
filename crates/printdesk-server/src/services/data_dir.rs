// SPDX-License-Identifier: PMPL-1.0-or-later
// Copyright (c) 2026 Jonathan D.A. Jewell (hyperpolymath) <jonathan.jewell@open.ac.uk>
//
// Data directory resolution.

use std::ffi::OsString;
use std::path::{Path, PathBuf};

use printdesk_core::error::Result;

const APP_DIR: &str = "printdesk";

/// Return the data directory chosen by the environment, creating it if needed.
pub fn data_dir() -> Result<PathBuf> {
    let dir = resolve(
        std::env::var_os("PRINTDESK_DATA_DIR"),
        std::env::var_os("XDG_DATA_HOME"),
        std::env::var_os("HOME"),
    );
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// Return a subdirectory inside `base` (e.g. "documents"), creating it if needed.
pub fn data_subdir(base: &Path, name: &str) -> Result<PathBuf> {
    let dir = base.join(name);
    std::fs::create_dir_all(&dir)?;
    Ok(dir)
}

/// `$PRINTDESK_DATA_DIR`, else `$XDG_DATA_HOME/printdesk`, else
/// `$HOME/.local/share/printdesk`. Empty variables count as unset.
pub fn resolve(
    explicit: Option<OsString>,
    xdg_data_home: Option<OsString>,
    home: Option<OsString>,
) -> PathBuf {
    let set = |v: Option<OsString>| v.filter(|s| !s.is_empty()).map(PathBuf::from);

    if let Some(dir) = set(explicit) {
        return dir;
    }
    if let Some(xdg) = set(xdg_data_home) {
        return xdg.join(APP_DIR);
    }
    if let Some(home) = set(home) {
        return home.join(".local").join("share").join(APP_DIR);
    }
    // Last resort
    std::env::temp_dir().join(APP_DIR)
}
