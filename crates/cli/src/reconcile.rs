//! The one command: read inputs, run the engine, write the artifacts.

use std::path::{Path, PathBuf};

use shelfmatch_recon::model::{ReconResult, TierReport};
use shelfmatch_recon::{
    annotated_catalog, load_ledger, parse_catalog, run, to_canonical_json, MatchConfig,
    Normalizer, ReconInput,
};
use tracing::info;

use crate::{Cli, CliError};

pub fn cmd_reconcile(cli: &Cli) -> Result<(), CliError> {
    refuse_clobber(cli)?;

    let config = load_config(cli)?;

    let ledger_csv = read_input(&cli.ledger, "ledger")?;
    let catalog_json = read_input(&cli.catalog, "catalog")?;

    let mut normalizer = Normalizer::new();
    let ledger = load_ledger(&ledger_csv, &config.ledger, &mut normalizer)?;
    let catalog = parse_catalog(&catalog_json)?;
    info!(
        ledger_rows = ledger.ledger.len(),
        catalog_entries = catalog.len(),
        "inputs loaded"
    );

    let result = run(&config, ReconInput { catalog, ledger }, normalizer)?;

    let artifact = to_canonical_json(&annotated_catalog(&result))?;
    write_output(&cli.output, &artifact)?;

    if let Some(ref path) = cli.report {
        let report = to_canonical_json(&result)?;
        write_output(path, &report)?;
    }

    print_summary(&result);
    if let Some(ref tiers) = result.tier_report {
        print_tiers(tiers);
    }
    eprintln!("wrote {}", cli.output.display());
    if let Some(ref path) = cli.report {
        eprintln!("wrote {}", path.display());
    }
    Ok(())
}

fn refuse_clobber(cli: &Cli) -> Result<(), CliError> {
    let outputs = std::iter::once(&cli.output).chain(cli.report.as_ref());
    for out in outputs {
        if same_file(out, &cli.ledger) || same_file(out, &cli.catalog) {
            return Err(CliError::args(format!(
                "output {} would overwrite an input file",
                out.display()
            ))
            .with_hint("pass a different --output/--report path"));
        }
    }
    if let Some(ref report) = cli.report {
        if same_file(report, &cli.output) {
            return Err(CliError::args("--output and --report name the same file"));
        }
    }
    Ok(())
}

/// Whether two paths name the same file, after resolving `.`/`..` and
/// symlinks. A path that does not exist yet resolves through its directory.
fn same_file(a: &Path, b: &Path) -> bool {
    if a == b {
        return true;
    }
    match (resolve(a), resolve(b)) {
        (Some(a), Some(b)) => a == b,
        _ => false,
    }
}

fn resolve(path: &Path) -> Option<PathBuf> {
    if let Ok(full) = std::fs::canonicalize(path) {
        return Some(full);
    }
    let name = path.file_name()?;
    let dir = match path.parent() {
        Some(dir) if !dir.as_os_str().is_empty() => dir,
        _ => Path::new("."),
    };
    std::fs::canonicalize(dir).ok().map(|dir| dir.join(name))
}

fn load_config(cli: &Cli) -> Result<MatchConfig, CliError> {
    let mut config = match cli.config {
        Some(ref path) => {
            let text = read_input(path, "config")?;
            MatchConfig::from_toml(&text)?
        }
        None => MatchConfig::default(),
    };

    if let Some(policy) = cli.acceptable_policy {
        config.passes.acceptable_policy = policy.into();
    }
    if cli.tiers {
        config.diagnostics.tier_report = true;
    }
    config.validate()?;
    Ok(config)
}

fn read_input(path: &Path, what: &str) -> Result<String, CliError> {
    std::fs::read_to_string(path)
        .map_err(|e| CliError::io(format!("cannot read {what} {}: {e}", path.display())))
}

fn write_output(path: &Path, contents: &str) -> Result<(), CliError> {
    std::fs::write(path, contents)
        .map_err(|e| CliError::io(format!("cannot write {}: {e}", path.display())))
}

fn print_summary(result: &ReconResult) {
    let s = &result.summary;
    eprintln!(
        "catalog: {} entries ({} single-copy, {} multi-copy); ledger: {} rows ({} orphan(s), {} duplicate(s))",
        s.catalog_entries, s.single_copy, s.multi_copy, s.ledger_entries, s.orphans, s.duplicates,
    );
    let by_tier = s
        .matched_by_tier
        .iter()
        .map(|(tier, n)| format!("{tier} {n}"))
        .collect::<Vec<_>>()
        .join(", ");
    eprintln!(
        "matched {} of {} single-copy entries ({:.2} %){}",
        s.matched,
        s.single_copy,
        s.match_rate.value(),
        if by_tier.is_empty() { String::new() } else { format!(": {by_tier}") },
    );
    eprintln!(
        "unmatched: {} catalog, {} ledger; {} candidate(s) for review, {} tie(s) deferred, {} title correction(s)",
        s.unmatched_catalog, s.unmatched_ledger, s.surfaced_candidates, s.ties, s.corrections,
    );
}

fn print_tiers(t: &TierReport) {
    eprintln!(
        "tiers: exact {}, top {}, good {}, acceptable {}, ambiguous {}, none {} (top rate {:.2} %)",
        t.exact,
        t.top,
        t.good,
        t.acceptable,
        t.ambiguous,
        t.unmatched,
        t.top_rate.value(),
    );
}
