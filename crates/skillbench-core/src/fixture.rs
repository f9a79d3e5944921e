//! Eval fixture discovery.
//!
//! A fixture is any directory under the evals root that directly contains
//! both a prompt artifact (`prompt.md`) and an assertion suite (`checks.sh`).
//! Fixture directories are leaves: the walk never descends beneath one, so a
//! fixture may carry arbitrary helper files (including nested directories)
//! without them being discovered as fixtures of their own.

use crate::error::{Result, SkillbenchError};
use crate::paths;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Directories never descended into during the walk.
const SKIP_DIRS: &[&str] = &["node_modules", "vendor", "shared", "testdata"];

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Fixture {
    /// `/`-joined path segments relative to the evals root. Unique across a
    /// discovered set by construction.
    pub name: String,
    pub dir: PathBuf,
    pub prompt_path: PathBuf,
    pub checks_path: PathBuf,
    /// Present only when the fixture ships starter files.
    pub seed_src: Option<PathBuf>,
}

impl Fixture {
    pub fn prompt(&self) -> Result<String> {
        Ok(fs::read_to_string(&self.prompt_path)?)
    }
}

/// Outcome of probing one directory.
#[derive(Debug)]
pub enum Probe {
    Fixture(Box<Fixture>),
    NotFixture,
}

/// Detection policy, separated from the walk so each can be tested alone.
pub fn probe(dir: &Path, name: &str) -> Probe {
    let prompt_path = paths::prompt_path(dir);
    let checks_path = paths::checks_path(dir);
    if !prompt_path.is_file() || !checks_path.is_file() {
        return Probe::NotFixture;
    }
    let seed = paths::seed_src_dir(dir);
    Probe::Fixture(Box::new(Fixture {
        name: name.to_string(),
        dir: dir.to_path_buf(),
        prompt_path,
        checks_path,
        seed_src: seed.is_dir().then_some(seed),
    }))
}

/// Walk `evals_root` and return every fixture whose name satisfies `filter`,
/// sorted lexicographically by name.
pub fn discover<F>(evals_root: &Path, filter: F) -> Result<Vec<Fixture>>
where
    F: Fn(&str) -> bool,
{
    if !evals_root.is_dir() {
        return Err(SkillbenchError::EvalsRootNotFound(evals_root.to_path_buf()));
    }
    let mut fixtures = Vec::new();
    walk(evals_root, "", &filter, &mut fixtures)?;
    fixtures.sort_by(|a, b| a.name.cmp(&b.name));
    Ok(fixtures)
}

fn walk<F>(dir: &Path, prefix: &str, filter: &F, out: &mut Vec<Fixture>) -> Result<()>
where
    F: Fn(&str) -> bool,
{
    for entry in fs::read_dir(dir)? {
        let entry = entry?;
        let path = entry.path();
        if !path.is_dir() {
            continue;
        }
        let dir_name = entry.file_name().to_string_lossy().to_string();
        if dir_name.starts_with('.') || SKIP_DIRS.contains(&dir_name.as_str()) {
            continue;
        }
        let name = if prefix.is_empty() {
            dir_name
        } else {
            format!("{prefix}/{dir_name}")
        };
        match probe(&path, &name) {
            Probe::Fixture(fixture) => {
                // Leaf: never descend beneath a fixture, even a filtered-out one.
                if filter(&fixture.name) {
                    debug!(fixture = %fixture.name, "discovered");
                    out.push(*fixture);
                }
            }
            Probe::NotFixture => walk(&path, &name, filter, out)?,
        }
    }
    Ok(())
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
