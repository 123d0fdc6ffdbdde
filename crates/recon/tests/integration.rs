use std::collections::BTreeSet;
use std::path::PathBuf;

use shelfmatch_recon::config::MatchConfig;
use shelfmatch_recon::engine::{run, ReconInput};
use shelfmatch_recon::model::{CatalogEntry, PassTier, ReconResult, TieKind};
use shelfmatch_recon::{annotated_catalog, load_ledger, parse_catalog, to_canonical_json, Normalizer};

fn fixtures_dir() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures")
}

fn read_fixture(name: &str) -> String {
    let path = fixtures_dir().join(name);
    std::fs::read_to_string(&path).unwrap_or_else(|e| panic!("cannot read {}: {e}", path.display()))
}

fn run_inline(config: &MatchConfig, ledger_csv: &str, catalog_json: &str) -> ReconResult {
    let mut normalizer = Normalizer::new();
    let ledger = load_ledger(ledger_csv, &config.ledger, &mut normalizer).unwrap();
    let catalog = parse_catalog(catalog_json).unwrap();
    run(config, ReconInput { catalog, ledger }, normalizer).unwrap()
}

fn load_and_run(config_toml: &str) -> ReconResult {
    let config = MatchConfig::from_toml(config_toml).unwrap();
    run_inline(&config, &read_fixture("ledger.csv"), &read_fixture("catalog.json"))
}

fn accessions(result: &ReconResult) -> Vec<(usize, &str)> {
    let mut out: Vec<_> = result
        .matches
        .iter()
        .map(|m| (m.catalog_index, m.accession_number.as_str()))
        .collect();
    out.sort();
    out
}

const HEADER: &str = "Sign,atur,Buchtitel,Verfasser,Zugang,,,Thema\n";

// -------------------------------------------------------------------------
// Fixture run
// -------------------------------------------------------------------------

#[test]
fn fixture_default_policy() {
    let result = load_and_run("");

    assert_eq!(
        accessions(&result),
        vec![(0, "001"), (2, "042"), (3, "107"), (5, "150")]
    );

    let s = &result.summary;
    assert_eq!(s.catalog_entries, 8);
    assert_eq!(s.single_copy, 7);
    assert_eq!(s.multi_copy, 1);
    assert_eq!(s.ledger_entries, 8);
    assert_eq!(s.orphans, 2);
    assert_eq!(s.duplicates, 1);
    assert_eq!(s.matched, 4);
    assert_eq!(s.matched_by_tier["exact"], 3);
    assert_eq!(s.matched_by_tier["high_confidence"], 1);
    assert_eq!(s.unmatched_catalog, 3);
    assert_eq!(s.unmatched_ledger, 4);
    assert_eq!(s.surfaced_candidates, 1);
    assert_eq!(s.corrections, 2);

    let hexe = result.matches.iter().find(|m| m.accession_number == "150").unwrap();
    assert_eq!(hexe.tier, PassTier::HighConfidence);
    assert_eq!(hexe.round, Some(1));
    assert_eq!(hexe.entry.title, "Die kleine Hexe");

    let candidate = &result.candidates[0];
    assert_eq!(candidate.catalog_title, "Jim Knopf");
    assert_eq!(candidate.accession_number, "400");
    assert!(!candidate.committed);
    assert!(result.unmatched_ledger.iter().any(|e| e.accession_number == "400"));

    let unmatched: Vec<_> = result.unmatched_ledger.iter().map(|e| e.accession_number.as_str()).collect();
    assert_eq!(unmatched, vec!["201", "202", "300", "400"]);

    assert_eq!(result.multi_copy[0].entry.title, "Momo");
    assert!(result.multi_copy[0].entry.accession_numbers.is_empty());
}

#[test]
fn fixture_accept_policy_commits_candidate() {
    let result = load_and_run("[passes]\nacceptable_policy = \"accept\"\n");
    let jim = result.matches.iter().find(|m| m.accession_number == "400").unwrap();
    assert_eq!(jim.tier, PassTier::Acceptable);
    assert_eq!(jim.catalog_index, 6);
    assert!(result.candidates[0].committed);
    assert_eq!(result.summary.matched, 5);
    assert_eq!(result.summary.unmatched_ledger, 3);
}

#[test]
fn fixture_ties_are_deferred_in_every_pass() {
    let result = load_and_run("");
    assert!(!result.ties.is_empty());
    assert!(result.ties.iter().all(|t| t.catalog_title == "Der Regenbogen"));
    assert!(result.ties.iter().all(|t| t.kind == TieKind::AmbiguousCandidates));
    let passes: BTreeSet<_> = result.ties.iter().map(|t| t.pass).collect();
    assert_eq!(
        passes,
        BTreeSet::from([PassTier::Exact, PassTier::HighConfidence, PassTier::Acceptable])
    );
    for tie in &result.ties {
        let accs: Vec<_> = tie.candidates.iter().map(|c| c.accession_number.as_str()).collect();
        assert_eq!(accs, vec!["201", "202"]);
    }
}

#[test]
fn fixture_pass_stats_are_monotone() {
    let result = load_and_run("");
    let passes = &result.passes;
    assert_eq!(passes.first().unwrap().pass, PassTier::Exact);
    assert_eq!(passes.last().unwrap().pass, PassTier::Acceptable);
    for w in passes.windows(2) {
        assert!(w[1].unmatched_ledger <= w[0].unmatched_ledger);
        assert!(w[1].claimed >= w[0].claimed);
    }
    for p in passes {
        assert_eq!(p.matched + p.unmatched_catalog, result.summary.single_copy);
        assert_eq!(p.claimed, p.matched);
    }
}

#[test]
fn fixture_tier_report() {
    let result = load_and_run("[diagnostics]\ntier_report = true\n");
    let report = result.tier_report.unwrap();
    assert_eq!(report.evaluated, 7);
    assert_eq!(report.ambiguous, 1);
    assert_eq!(report.unmatched, 1);
    assert_eq!(report.exact, 5);
}

#[test]
fn fixture_artifact_keeps_input_order_and_extra_fields() {
    let result = load_and_run("");
    let annotated = annotated_catalog(&result);
    assert_eq!(annotated.len(), 8);
    let titles: Vec<_> = annotated.iter().map(|e| e.title.as_str()).collect();
    assert_eq!(
        titles,
        vec![
            "Die Biene Maja",
            "Momo",
            "Das Sams",
            "Die Sonne",
            "Der Regenbogen",
            "Die kleine Hexe",
            "Jim Knopf",
            "Pippi Langstrumpf",
        ]
    );
    assert_eq!(annotated[0].accession_numbers, vec!["001".to_string()]);
    assert!(annotated[4].accession_numbers.is_empty());

    let json = to_canonical_json(&annotated).unwrap();
    let back: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back[0]["isbn"], "978-3-522-18343-0");
    assert_eq!(back[0]["accession_numbers"][0], "001");
    assert_eq!(back[5]["copies"][0]["shelf"], "P 12");
    assert!(back[1].get("accession_numbers").is_none());
    assert!(json.contains("verfügbar"));
}

#[test]
fn fixture_report_serializes() {
    let result = load_and_run("[diagnostics]\ntier_report = true\n");
    let json = to_canonical_json(&result).unwrap();
    let back: serde_json::Value = serde_json::from_str(&json).unwrap();
    assert_eq!(back["summary"]["matched"], 4);
    assert_eq!(back["meta"]["acceptable_policy"], "surface");
    assert_eq!(back["meta"]["thresholds"]["high_confidence"], 95.0);
    assert!(back["tier_report"].is_object());
}

// -------------------------------------------------------------------------
// Scenarios
// -------------------------------------------------------------------------

#[test]
fn scenario_single_exact_match() {
    let csv = format!("{HEADER}K,Bon,Die Biene Maja,Waldemar Bonsels,001,,,\n");
    let result = run_inline(
        &MatchConfig::default(),
        &csv,
        r#"[{"title":"Die Biene Maja","copies":[{}]}]"#,
    );
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].tier, PassTier::Exact);
    assert_eq!(result.matches[0].entry.accession_numbers, vec!["001".to_string()]);
    assert!(result.unmatched_catalog.is_empty());
    assert!(result.unmatched_ledger.is_empty());
}

#[test]
fn scenario_duplicate_accession_keeps_first_row() {
    let csv = format!("{HEADER}K,1,Das Sams,Paul Maar,042,,,\nK,2,Momo,Michael Ende,042,,,\n");
    let result = run_inline(
        &MatchConfig::default(),
        &csv,
        r#"[{"title":"Das Sams","copies":[{}]},{"title":"Momo","copies":[{}]}]"#,
    );
    assert_eq!(result.duplicates.len(), 1);
    assert_eq!(result.duplicates[0].title, "Momo");
    assert_eq!(accessions(&result), vec![(0, "042")]);
}

#[test]
fn scenario_series_suffix_enables_exact_match() {
    let csv = format!("{HEADER}S,1,Die Sonne,,107,,,\n");
    let catalog = r#"[{"title":"Die Sonne (Sehen, Staunen, Wissen)","copies":[{}]}]"#;
    let result = run_inline(&MatchConfig::default(), &csv, catalog);
    assert_eq!(result.matches.len(), 1);
    assert_eq!(result.matches[0].tier, PassTier::Exact);
    assert_eq!(result.matches[0].entry.title, "Die Sonne");
    assert_eq!(result.summary.corrections, 1);
}

#[test]
fn scenario_near_identical_rows_defer() {
    let csv = format!("{HEADER}K,1,Der Regenbogen,,201,,,\nK,2,Der Regenbogen!,,202,,,\n");
    let result = run_inline(
        &MatchConfig::default(),
        &csv,
        r#"[{"title":"Der Regenbogen","copies":[{}]}]"#,
    );
    assert!(result.matches.is_empty());
    assert!(result
        .ties
        .iter()
        .any(|t| t.pass == PassTier::HighConfidence && t.candidates.len() == 2));
    assert_eq!(result.unmatched_ledger.len(), 2);
}

#[test]
fn scenario_placeholder_accession_is_orphan() {
    let csv = format!("{HEADER}K,1,Momo,Michael Ende,?,,,\nK,2,Das Sams,Paul Maar,042,,,\n");
    let result = run_inline(
        &MatchConfig::default(),
        &csv,
        r#"[{"title":"Momo","copies":[{}]}]"#,
    );
    assert_eq!(result.orphans.len(), 1);
    assert_eq!(result.orphans[0].accession_number, "?");
    assert!(result.matches.is_empty());
    assert!(result.unmatched_ledger.iter().all(|e| e.accession_number != "?"));
}

// -------------------------------------------------------------------------
// Boundaries
// -------------------------------------------------------------------------

#[test]
fn ledger_of_orphans_is_rejected() {
    let config = MatchConfig::default();
    let mut normalizer = Normalizer::new();
    let csv = format!("{HEADER}K,1,Momo,Michael Ende,?,,,\n");
    let ledger = load_ledger(&csv, &config.ledger, &mut normalizer).unwrap();
    let catalog = vec![CatalogEntry::new("Momo", 1)];
    let err = run(&config, ReconInput { catalog, ledger }, normalizer).unwrap_err();
    assert!(err.to_string().contains("no rows with a usable accession number"));
}

/// Every accession number appears on at most one entry of the artifact.
fn assert_unique_stamps(result: &ReconResult) {
    let artifact = annotated_catalog(result);
    let mut seen = BTreeSet::new();
    for entry in &artifact {
        assert!(entry.accession_numbers.len() <= 1, "{} carries {:?}", entry.title, entry.accession_numbers);
        for acc in &entry.accession_numbers {
            assert!(seen.insert(acc.clone()), "accession {acc} attached twice");
        }
    }
}

#[test]
fn stamped_catalog_is_assigned_from_scratch() {
    let csv = format!("{HEADER}K,1,Momo,Michael Ende,001,,,\n");
    let catalog = r#"[{"title":"Das Sams","copies":[{}],"accession_numbers":["001"]},
                      {"title":"Momo","copies":[{}]},
                      {"title":"Jim Knopf","copies":[{},{}],"accession_numbers":["001","002"]}]"#;
    let result = run_inline(&MatchConfig::default(), &csv, catalog);

    assert_eq!(accessions(&result), vec![(1, "001")]);
    let artifact = annotated_catalog(&result);
    assert!(artifact[0].accession_numbers.is_empty());
    assert_eq!(artifact[1].accession_numbers, vec!["001".to_string()]);
    assert!(artifact[2].accession_numbers.is_empty());
    assert_unique_stamps(&result);
}

#[test]
fn stamped_entries_handed_to_run_are_cleared() {
    let config = MatchConfig::default();
    let mut normalizer = Normalizer::new();
    let csv = format!("{HEADER}K,1,Momo,Michael Ende,001,,,\n");
    let ledger = load_ledger(&csv, &config.ledger, &mut normalizer).unwrap();
    let mut catalog = vec![CatalogEntry::new("Das Sams", 1), CatalogEntry::new("Momo", 1)];
    catalog[0].accession_numbers = vec!["001".into()];

    let result = run(&config, ReconInput { catalog, ledger }, normalizer).unwrap();
    assert_eq!(accessions(&result), vec![(1, "001")]);
    assert!(result.unmatched_catalog[0].entry.accession_numbers.is_empty());
    assert_unique_stamps(&result);
}

#[test]
fn rerun_on_own_artifact_gives_same_assignment() {
    let first = load_and_run("");
    let artifact = to_canonical_json(&annotated_catalog(&first)).unwrap();
    let second = run_inline(&MatchConfig::default(), &read_fixture("ledger.csv"), &artifact);
    assert_eq!(accessions(&first), accessions(&second));
    assert_unique_stamps(&second);
}

/// Deterministic pseudo-random titles of one to seven words.
fn generated_titles(count: usize, seed: u64) -> Vec<String> {
    const WORDS: &[&str] = &[
        "der", "die", "das", "kleine", "große", "hexe", "drache", "wald", "sonne", "mond",
        "reise", "zum", "geheimnis", "insel", "abenteuer", "tiger", "bär", "schule",
        "nacht", "sterne", "piraten", "ritter", "burg", "fluss", "winter", "sommer",
    ];
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };
    (0..count)
        .map(|_| {
            let words = 1 + next() % 7;
            (0..words).map(|_| WORDS[next() % WORDS.len()]).collect::<Vec<_>>().join(" ")
        })
        .collect()
}

#[test]
fn generated_collection_keeps_pools_consistent() {
    let titles = generated_titles(400, 7);
    let ledger_titles = generated_titles(400, 11);

    let mut csv = String::from(HEADER);
    // Every third catalog title is also in the ledger verbatim.
    for (i, title) in ledger_titles.iter().enumerate() {
        let title = if i % 3 == 0 { &titles[i] } else { title };
        csv.push_str(&format!("K,{i},{title},,{i:04},,,\n"));
    }
    let catalog: Vec<serde_json::Value> = titles
        .iter()
        .map(|t| serde_json::json!({ "title": t, "copies": [{}] }))
        .collect();
    let catalog = serde_json::to_string(&catalog).unwrap();

    let config = MatchConfig::from_toml("[passes]\nacceptable_policy = \"accept\"\n").unwrap();
    let result = run_inline(&config, &csv, &catalog);

    let s = &result.summary;
    assert_eq!(s.matched + s.unmatched_catalog, s.single_copy);
    assert_eq!(s.matched + s.unmatched_ledger, s.ledger_entries);
    assert!(s.matched > 0);
    assert_unique_stamps(&result);
}

#[test]
fn custom_ledger_layout_from_config() {
    let config = MatchConfig::from_toml(
        r#"
[ledger]
has_header = false
delimiter = ";"
[ledger.columns]
title = 1
author = 2
accession_number = 0
"#,
    )
    .unwrap();
    let result = run_inline(
        &config,
        "17;Momo;Michael Ende\n",
        r#"[{"title":"Momo","copies":[{}]}]"#,
    );
    assert_eq!(accessions(&result), vec![(0, "17")]);
}
