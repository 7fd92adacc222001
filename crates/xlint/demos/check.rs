//! Check CSS and HTML files against compatibility data
//!
//! Usage: cargo run --example check -- <data-dir> <file>...
//!
//! Reads `.xlintrc` from the working directory when present.
//! Set `RUST_LOG=debug` to see data loading.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context};
use tracing_subscriber::EnvFilter;
use xlint::{Config, Linter};

fn main() -> anyhow::Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let mut args = std::env::args().skip(1);
    let Some(data_root) = args.next() else {
        bail!("usage: check <data-dir> <file>...");
    };
    let files: Vec<PathBuf> = args.map(PathBuf::from).collect();

    let rc = Path::new(".xlintrc");
    let config = if rc.exists() {
        Config::from_path(rc)?
    } else {
        Config::default()
    };

    let mut linter = Linter::new(data_root);
    linter.init_blocking(config).context("loading compatibility data")?;

    let mut total = 0;
    for path in &files {
        let text = std::fs::read_to_string(path).with_context(|| format!("reading {}", path.display()))?;
        let result = match path.extension().and_then(|e| e.to_str()) {
            Some("css") => linter.check_css(&text)?,
            Some("html" | "htm") => linter.check_html(&text)?,
            _ => {
                eprintln!("skipping {}", path.display());
                continue;
            }
        };

        for problem in &result.problems {
            println!(
                "{}:{}:{}: {} [{}]",
                path.display(),
                problem.line,
                problem.column,
                problem.reason,
                serde_json::to_string(&problem.influenced_platforms)?
            );
        }
        total += result.problems.len();
    }

    println!("{total} problem(s) in {} file(s)", files.len());
    Ok(())
}
