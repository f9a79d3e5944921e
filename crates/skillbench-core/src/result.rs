//! Per-run outcome records.

use serde::{Deserialize, Serialize};

/// Which stage failed. Timeout is deliberately distinct from a generic
/// backend error so aggregate reports can separate "agent too slow" from
/// "agent produced wrong code".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    Setup,
    Timeout,
    Backend,
    Build,
    Vet,
    Checks,
}

impl FailureKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            FailureKind::Setup => "setup",
            FailureKind::Timeout => "timeout",
            FailureKind::Backend => "backend",
            FailureKind::Build => "build",
            FailureKind::Vet => "vet",
            FailureKind::Checks => "checks",
        }
    }
}

impl std::fmt::Display for FailureKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum RunStatus {
    Passed,
    Failed { kind: FailureKind },
}

/// Outcome of one (fixture, run) pair. Immutable once produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunRecord {
    pub fixture: String,
    /// 1-based run index, matching execution order.
    pub run: u32,
    #[serde(flatten)]
    pub status: RunStatus,
    pub duration_ms: u64,
    /// First line of the failing stage's output.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub detail: Option<String>,
    /// Backend-reported cost; informational only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub cost_usd: Option<f64>,
}

impl RunRecord {
    pub fn pass(fixture: &str, run: u32, duration_ms: u64) -> Self {
        Self {
            fixture: fixture.to_string(),
            run,
            status: RunStatus::Passed,
            duration_ms,
            detail: None,
            cost_usd: None,
        }
    }

    pub fn fail(
        fixture: &str,
        run: u32,
        kind: FailureKind,
        detail: impl Into<String>,
        duration_ms: u64,
    ) -> Self {
        Self {
            fixture: fixture.to_string(),
            run,
            status: RunStatus::Failed { kind },
            duration_ms,
            detail: Some(detail.into()),
            cost_usd: None,
        }
    }

    pub fn passed(&self) -> bool {
        matches!(self.status, RunStatus::Passed)
    }

    pub fn failure_kind(&self) -> Option<FailureKind> {
        match self.status {
            RunStatus::Passed => None,
            RunStatus::Failed { kind } => Some(kind),
        }
    }
}

/// First non-empty line of a command's output, for summary display.
pub fn first_line(output: &str) -> Option<String> {
    output
        .lines()
        .map(str::trim)
        .find(|l| !l.is_empty())
        .map(str::to_string)
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn record_json_shape() {
        let record = RunRecord::fail(
            "errors/sentinel-errors",
            2,
            FailureKind::Timeout,
            "agent timed out after 600s",
            600_123,
        );
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["status"], "failed");
        assert_eq!(json["kind"], "timeout");
        assert_eq!(json["run"], 2);
        assert_eq!(json["detail"], "agent timed out after 600s");

        let back: RunRecord = serde_json::from_value(json).unwrap();
        assert_eq!(back, record);
    }

    #[test]
    fn passing_record_has_no_kind_or_detail() {
        let record = RunRecord::pass("mid", 1, 42);
        assert!(record.passed());
        assert_eq!(record.failure_kind(), None);
        let json = serde_json::to_string(&record).unwrap();
        assert!(json.contains("\"status\":\"passed\""));
        assert!(!json.contains("kind"));
        assert!(!json.contains("detail"));
    }

    #[test]
    fn first_line_skips_blanks() {
        assert_eq!(
            first_line("\n\n  expected at least 2, got 1\nmore\n"),
            Some("expected at least 2, got 1".to_string())
        );
        assert_eq!(first_line("   \n\t\n"), None);
        assert_eq!(first_line(""), None);
    }
}
