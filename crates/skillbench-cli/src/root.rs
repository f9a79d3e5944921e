use skillbench_core::paths;
use std::path::{Path, PathBuf};

/// Resolve the bench root directory.
///
/// Priority:
/// 1. `--root` flag / `SKILLBENCH_ROOT` env var (passed in as `explicit`)
/// 2. Walk upward from `cwd` looking for `evals/`
/// 3. Walk upward from `cwd` looking for `.git/`
/// 4. Fall back to `cwd`
pub fn resolve_root(explicit: Option<&Path>) -> PathBuf {
    let cwd = std::env::current_dir().unwrap_or_else(|_| PathBuf::from("."));
    resolve_from(explicit, &cwd)
}

fn resolve_from(explicit: Option<&Path>, cwd: &Path) -> PathBuf {
    if let Some(p) = explicit {
        return p.to_path_buf();
    }

    for marker in [paths::EVALS_DIR, ".git"] {
        let mut dir = cwd;
        loop {
            if dir.join(marker).is_dir() {
                return dir.to_path_buf();
            }
            match dir.parent() {
                Some(parent) => dir = parent,
                None => break,
            }
        }
    }

    cwd.to_path_buf()
}
