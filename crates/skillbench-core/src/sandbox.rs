//! Ephemeral per-run working directories.
//!
//! Every (fixture, run) pair gets its own sandbox: a unique temporary
//! directory with a `src/` copy of the fixture's starter files. The agent and
//! the scoring layers only ever touch the sandbox, so nothing can mutate the
//! fixture's on-disk originals and nothing leaks between runs. Removal rides
//! on [`tempfile::TempDir`]'s drop, which covers every exit path including
//! panics; `close` exists so the runner can surface removal errors.

use crate::error::Result;
use crate::fixture::Fixture;
use crate::{io, paths};
use std::path::{Path, PathBuf};
use tempfile::TempDir;
use tracing::debug;

pub struct Sandbox {
    dir: TempDir,
    src: PathBuf,
}

impl Sandbox {
    /// Create a fresh sandbox, seeding `src/` from `seed` when given.
    pub fn create(seed: Option<&Path>) -> Result<Self> {
        let dir = tempfile::Builder::new().prefix("skillbench-").tempdir()?;
        let src = dir.path().join(paths::SRC_DIR);
        match seed {
            Some(seed) => io::copy_dir_all(seed, &src)?,
            None => io::ensure_dir(&src)?,
        }
        debug!(path = %dir.path().display(), "sandbox created");
        Ok(Self { dir, src })
    }

    pub fn for_fixture(fixture: &Fixture) -> Result<Self> {
        Self::create(fixture.seed_src.as_deref())
    }

    pub fn root(&self) -> &Path {
        self.dir.path()
    }

    /// Where starter files land and the agent works.
    pub fn src_dir(&self) -> &Path {
        &self.src
    }

    /// Remove the sandbox now, surfacing IO errors instead of swallowing them.
    pub fn close(self) -> Result<()> {
        debug!(path = %self.dir.path().display(), "sandbox removed");
        self.dir.close()?;
        Ok(())
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;

    fn seed_dir() -> (TempDir, PathBuf) {
        let dir = TempDir::new().unwrap();
        let seed = dir.path().join("src");
        fs::create_dir_all(&seed).unwrap();
        fs::write(seed.join("main.go"), "package main\n").unwrap();
        (dir, seed)
    }

    #[test]
    fn seeds_src_from_starter_files() {
        let (_keep, seed) = seed_dir();
        let sandbox = Sandbox::create(Some(&seed)).unwrap();
        assert_eq!(
            fs::read_to_string(sandbox.src_dir().join("main.go")).unwrap(),
            "package main\n"
        );
    }

    #[test]
    fn creates_empty_src_without_seed() {
        let sandbox = Sandbox::create(None).unwrap();
        assert!(sandbox.src_dir().is_dir());
        assert_eq!(fs::read_dir(sandbox.src_dir()).unwrap().count(), 0);
    }

    #[test]
    fn mutations_never_reach_the_seed() {
        let (_keep, seed) = seed_dir();
        let sandbox = Sandbox::create(Some(&seed)).unwrap();
        fs::write(sandbox.src_dir().join("main.go"), "package mutated\n").unwrap();
        fs::write(sandbox.src_dir().join("extra.go"), "package main\n").unwrap();

        assert_eq!(
            fs::read_to_string(seed.join("main.go")).unwrap(),
            "package main\n"
        );
        assert!(!seed.join("extra.go").exists());
    }

    #[test]
    fn sandboxes_from_the_same_seed_are_isolated() {
        let (_keep, seed) = seed_dir();
        let a = Sandbox::create(Some(&seed)).unwrap();
        let b = Sandbox::create(Some(&seed)).unwrap();
        assert_ne!(a.root(), b.root());

        fs::write(a.src_dir().join("marker-a"), "a").unwrap();
        fs::write(b.src_dir().join("marker-b"), "b").unwrap();

        assert!(!a.src_dir().join("marker-b").exists());
        assert!(!b.src_dir().join("marker-a").exists());
    }

    #[test]
    fn close_removes_the_directory() {
        let sandbox = Sandbox::create(None).unwrap();
        let path = sandbox.root().to_path_buf();
        sandbox.close().unwrap();
        assert!(!path.exists());
    }

    #[test]
    fn drop_removes_the_directory() {
        let path;
        {
            let sandbox = Sandbox::create(None).unwrap();
            path = sandbox.root().to_path_buf();
        }
        assert!(!path.exists());
    }
}
