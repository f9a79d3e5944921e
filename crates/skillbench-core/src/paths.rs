use crate::error::{Result, SkillbenchError};
use regex::Regex;
use std::path::{Path, PathBuf};
use std::sync::OnceLock;

// ---------------------------------------------------------------------------
// Directory constants
// ---------------------------------------------------------------------------

pub const EVALS_DIR: &str = "evals";
pub const EXPERIMENTS_DIR: &str = "experiments";

pub const PROMPT_FILE: &str = "prompt.md";
pub const CHECKS_FILE: &str = "checks.sh";
pub const SRC_DIR: &str = "src";

pub const EXPERIMENT_EXT: &str = "yaml";

// ---------------------------------------------------------------------------
// Path helpers
// ---------------------------------------------------------------------------

pub fn evals_root(root: &Path) -> PathBuf {
    root.join(EVALS_DIR)
}

pub fn experiments_dir(root: &Path) -> PathBuf {
    root.join(EXPERIMENTS_DIR)
}

pub fn experiment_path(root: &Path, name: &str) -> PathBuf {
    experiments_dir(root).join(format!("{name}.{EXPERIMENT_EXT}"))
}

/// Fixture names use `/` separators regardless of platform.
pub fn fixture_dir(root: &Path, name: &str) -> PathBuf {
    let mut dir = evals_root(root);
    for segment in name.split('/') {
        dir.push(segment);
    }
    dir
}

pub fn prompt_path(fixture_dir: &Path) -> PathBuf {
    fixture_dir.join(PROMPT_FILE)
}

pub fn checks_path(fixture_dir: &Path) -> PathBuf {
    fixture_dir.join(CHECKS_FILE)
}

pub fn seed_src_dir(fixture_dir: &Path) -> PathBuf {
    fixture_dir.join(SRC_DIR)
}

// ---------------------------------------------------------------------------
// Experiment name validation
// ---------------------------------------------------------------------------

static NAME_RE: OnceLock<Regex> = OnceLock::new();

fn name_re() -> &'static Regex {
    NAME_RE.get_or_init(|| Regex::new(r"^[a-z0-9][a-z0-9\-]*[a-z0-9]$|^[a-z0-9]$").unwrap())
}

pub fn validate_experiment_name(name: &str) -> Result<()> {
    if name.is_empty() || name.len() > 64 || !name_re().is_match(name) {
        return Err(SkillbenchError::InvalidExperimentName(name.to_string()));
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
