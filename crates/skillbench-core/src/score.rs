//! Two-layer scoring of a generated artifact.
//!
//! Layer 1 is deterministic: the toolchain's build step, then its static
//! analysis. Layer 2 is the fixture's own assertion suite. Layers run in
//! that order and short-circuit on the first failure, so an artifact that
//! does not compile never reaches the suite. Pass requires every layer to
//! succeed; there is no partial credit.

use crate::result::{first_line, FailureKind};
use crate::toolchain::Toolchain;
use std::path::Path;
use tracing::debug;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Verdict {
    Pass,
    Fail { kind: FailureKind, detail: String },
}

impl Verdict {
    pub fn passed(&self) -> bool {
        matches!(self, Verdict::Pass)
    }
}

pub fn score(toolchain: &dyn Toolchain, artifact_dir: &Path, suite: &Path) -> Verdict {
    let build = toolchain.build(artifact_dir);
    if !build.success {
        return fail(FailureKind::Build, &build.output);
    }
    let vet = toolchain.vet(artifact_dir);
    if !vet.success {
        return fail(FailureKind::Vet, &vet.output);
    }
    let checks = toolchain.checks(suite, artifact_dir);
    if !checks.success {
        return fail(FailureKind::Checks, &checks.output);
    }
    Verdict::Pass
}

fn fail(kind: FailureKind, output: &str) -> Verdict {
    debug!(stage = %kind, "scoring failed:\n{output}");
    let detail = first_line(output).unwrap_or_else(|| format!("{kind} step failed"));
    Verdict::Fail { kind, detail }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;
    use crate::toolchain::CommandOutcome;
    use std::path::PathBuf;
    use std::sync::Mutex;

    struct ScriptedToolchain {
        build: CommandOutcome,
        vet: CommandOutcome,
        checks: CommandOutcome,
        calls: Mutex<Vec<&'static str>>,
    }

    impl ScriptedToolchain {
        fn new(build: (bool, &str), vet: (bool, &str), checks: (bool, &str)) -> Self {
            let outcome = |(success, output): (bool, &str)| CommandOutcome {
                success,
                output: output.to_string(),
            };
            Self {
                build: outcome(build),
                vet: outcome(vet),
                checks: outcome(checks),
                calls: Mutex::new(Vec::new()),
            }
        }

        fn calls(&self) -> Vec<&'static str> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl Toolchain for ScriptedToolchain {
        fn build(&self, _dir: &Path) -> CommandOutcome {
            self.calls.lock().unwrap().push("build");
            self.build.clone()
        }
        fn vet(&self, _dir: &Path) -> CommandOutcome {
            self.calls.lock().unwrap().push("vet");
            self.vet.clone()
        }
        fn checks(&self, _suite: &Path, _dir: &Path) -> CommandOutcome {
            self.calls.lock().unwrap().push("checks");
            self.checks.clone()
        }
    }

    fn dirs() -> (PathBuf, PathBuf) {
        (PathBuf::from("/sandbox/src"), PathBuf::from("/evals/x/checks.sh"))
    }

    #[test]
    fn all_layers_pass_in_order() {
        let tc = ScriptedToolchain::new((true, ""), (true, ""), (true, ""));
        let (dir, suite) = dirs();
        assert_eq!(score(&tc, &dir, &suite), Verdict::Pass);
        assert_eq!(tc.calls(), ["build", "vet", "checks"]);
    }

    #[test]
    fn build_failure_short_circuits_everything() {
        let tc = ScriptedToolchain::new(
            (false, "main.go:3:1: syntax error\n"),
            (true, ""),
            (true, ""),
        );
        let (dir, suite) = dirs();
        let verdict = score(&tc, &dir, &suite);
        assert_eq!(
            verdict,
            Verdict::Fail {
                kind: FailureKind::Build,
                detail: "main.go:3:1: syntax error".to_string(),
            }
        );
        // The assertion suite must never run for a non-compiling artifact.
        assert_eq!(tc.calls(), ["build"]);
    }

    #[test]
    fn vet_failure_skips_the_suite() {
        let tc = ScriptedToolchain::new((true, ""), (false, "unreachable code"), (true, ""));
        let (dir, suite) = dirs();
        let verdict = score(&tc, &dir, &suite);
        assert!(matches!(
            verdict,
            Verdict::Fail {
                kind: FailureKind::Vet,
                ..
            }
        ));
        assert_eq!(tc.calls(), ["build", "vet"]);
    }

    #[test]
    fn suite_failure_keeps_its_first_message_line() {
        let tc = ScriptedToolchain::new(
            (true, ""),
            (true, ""),
            (false, "expected at least 2 sentinel errors, got 1\nFAIL\n"),
        );
        let (dir, suite) = dirs();
        let verdict = score(&tc, &dir, &suite);
        assert_eq!(
            verdict,
            Verdict::Fail {
                kind: FailureKind::Checks,
                detail: "expected at least 2 sentinel errors, got 1".to_string(),
            }
        );
    }

    #[test]
    fn silent_failure_gets_a_stage_label() {
        let tc = ScriptedToolchain::new((false, ""), (true, ""), (true, ""));
        let (dir, suite) = dirs();
        let verdict = score(&tc, &dir, &suite);
        assert_eq!(
            verdict,
            Verdict::Fail {
                kind: FailureKind::Build,
                detail: "build step failed".to_string(),
            }
        );
    }
}
