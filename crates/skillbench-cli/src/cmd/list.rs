use crate::output::{print_json, print_table};
use anyhow::Context;
use skillbench_core::{experiment, fixture, paths};
use std::path::Path;

pub fn run(root: &Path, json: bool) -> anyhow::Result<()> {
    let evals = paths::evals_root(root);
    let fixtures = fixture::discover(&evals, |_| true).context("fixture discovery failed")?;
    let experiments = experiment::list(root)?;

    if json {
        let value = serde_json::json!({
            "fixtures": fixtures
                .iter()
                .map(|f| serde_json::json!({
                    "name": f.name,
                    "seeded": f.seed_src.is_some(),
                }))
                .collect::<Vec<_>>(),
            "experiments": experiments,
        });
        return print_json(&value);
    }

    if fixtures.is_empty() {
        println!("No fixtures under {}", evals.display());
    } else {
        let rows: Vec<Vec<String>> = fixtures
            .iter()
            .map(|f| {
                let seeded = if f.seed_src.is_some() { "yes" } else { "-" };
                vec![f.name.clone(), seeded.to_string()]
            })
            .collect();
        print_table(&["FIXTURE", "SEED"], &rows);
    }

    if experiments.is_empty() {
        println!("\nExperiments: (none)");
    } else {
        println!("\nExperiments: {}", experiments.join(", "));
    }
    Ok(())
}
