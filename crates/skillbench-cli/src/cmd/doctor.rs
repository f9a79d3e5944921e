use crate::output::print_json;
use serde::Serialize;

/// Tools probed on `PATH`. Optional ones are only needed when a fixture's
/// assertion suite calls them.
const TOOLS: &[(&str, bool)] = &[
    ("claude", true),
    ("go", true),
    ("sh", true),
    ("ast-grep", false),
];

#[derive(Serialize)]
struct ToolStatus {
    name: &'static str,
    required: bool,
    path: Option<String>,
}

pub fn run(json: bool) -> anyhow::Result<()> {
    let statuses: Vec<ToolStatus> = TOOLS
        .iter()
        .map(|&(name, required)| ToolStatus {
            name,
            required,
            path: which::which(name).ok().map(|p| p.display().to_string()),
        })
        .collect();

    let missing: Vec<&str> = statuses
        .iter()
        .filter(|s| s.required && s.path.is_none())
        .map(|s| s.name)
        .collect();

    if json {
        print_json(&statuses)?;
    } else {
        for status in &statuses {
            match &status.path {
                Some(path) => println!("  \u{2713} {:<10} {path}", status.name),
                None if status.required => println!("  \u{2717} {:<10} not found", status.name),
                None => println!("  - {:<10} not found (optional)", status.name),
            }
        }
        if missing.is_empty() {
            println!("\nAll required tools are available.");
        }
    }

    if !missing.is_empty() {
        anyhow::bail!("missing required tools: {}", missing.join(", "));
    }
    Ok(())
}
