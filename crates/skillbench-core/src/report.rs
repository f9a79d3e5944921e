//! Aggregate reporting over run records.
//!
//! Aggregation is a pure function of the record collection: identical input
//! always produces an identical report. The overall rate is computed from
//! totals, not from an average of per-fixture rates, which matters whenever
//! run counts differ between fixtures.

use crate::result::RunRecord;
use serde::Serialize;
use std::collections::BTreeMap;
use std::io::Write;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FixtureStats {
    pub fixture: String,
    pub passed: u32,
    pub total: u32,
}

impl FixtureStats {
    pub fn pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.passed) / f64::from(self.total)
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Report {
    /// Per-fixture tallies, lexicographic by fixture name. Every fixture
    /// that produced records appears here, including 0/N ones.
    pub fixtures: Vec<FixtureStats>,
    pub passed: u32,
    pub total: u32,
    pub total_duration_ms: u64,
    pub total_cost_usd: f64,
    pub records: Vec<RunRecord>,
}

impl Report {
    pub fn from_records(records: Vec<RunRecord>) -> Self {
        let mut by_fixture: BTreeMap<&str, (u32, u32)> = BTreeMap::new();
        let mut passed = 0;
        let mut total_duration_ms = 0;
        let mut total_cost_usd = 0.0;
        for record in &records {
            let entry = by_fixture.entry(record.fixture.as_str()).or_insert((0, 0));
            entry.1 += 1;
            if record.passed() {
                entry.0 += 1;
                passed += 1;
            }
            total_duration_ms += record.duration_ms;
            total_cost_usd += record.cost_usd.unwrap_or(0.0);
        }
        let fixtures = by_fixture
            .into_iter()
            .map(|(fixture, (passed, total))| FixtureStats {
                fixture: fixture.to_string(),
                passed,
                total,
            })
            .collect();
        Self {
            fixtures,
            passed,
            total: records.len() as u32,
            total_duration_ms,
            total_cost_usd,
            records,
        }
    }

    pub fn overall_pass_rate(&self) -> f64 {
        if self.total == 0 {
            0.0
        } else {
            f64::from(self.passed) / f64::from(self.total)
        }
    }

    /// The CI gate: true iff every run passed.
    pub fn all_passed(&self) -> bool {
        self.passed == self.total
    }

    /// Render the human-readable aggregate table plus a failure digest.
    pub fn render<W: Write>(&self, w: &mut W) -> std::io::Result<()> {
        let width = self
            .fixtures
            .iter()
            .map(|f| f.fixture.len())
            .max()
            .unwrap_or(0)
            .max("FIXTURE".len());

        writeln!(w)?;
        writeln!(w, "{:<width$}  {:>7}  {:>5}", "FIXTURE", "PASSED", "RATE")?;
        for stats in &self.fixtures {
            writeln!(
                w,
                "{:<width$}  {:>7}  {:>4.0}%",
                stats.fixture,
                format!("{}/{}", stats.passed, stats.total),
                stats.pass_rate() * 100.0
            )?;
        }

        let failures: Vec<&RunRecord> = self.records.iter().filter(|r| !r.passed()).collect();
        if !failures.is_empty() {
            writeln!(w)?;
            writeln!(w, "Failures:")?;
            for record in failures {
                let kind = record
                    .failure_kind()
                    .map(|k| k.as_str())
                    .unwrap_or("unknown");
                let detail = record.detail.as_deref().unwrap_or("");
                writeln!(
                    w,
                    "  {} run {} [{kind}] {detail}",
                    record.fixture, record.run
                )?;
            }
        }

        writeln!(w)?;
        writeln!(
            w,
            "Overall: {}/{} passed ({:.1}%)",
            self.passed,
            self.total,
            self.overall_pass_rate() * 100.0
        )?;
        writeln!(
            w,
            "Duration: {:.1}s   Cost: ${:.4}",
            self.total_duration_ms as f64 / 1000.0,
            self.total_cost_usd
        )?;
        Ok(())
    }

    /// JSON form for CI artifacts.
    pub fn to_json(&self) -> serde_json::Value {
        serde_json::json!({
            "total": self.total,
            "passed": self.passed,
            "pass_rate": self.overall_pass_rate(),
            "duration_ms": self.total_duration_ms,
            "cost_usd": self.total_cost_usd,
            "fixtures": self.fixtures.iter().map(|f| {
                serde_json::json!({
                    "fixture": f.fixture,
                    "passed": f.passed,
                    "total": f.total,
                    "pass_rate": f.pass_rate(),
                })
            }).collect::<Vec<_>>(),
            "runs": self.records,
        })
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
