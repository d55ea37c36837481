use gwasqc::dependency::DependencyTracker;
use gwasqc::meta::{ColumnMeta, ColumnSet, MetaInfo, MetaNumeric, MetaUniqueness};
use gwasqc::types::{DEPENDENCY_PAIRS, EFFECT, MARKER, PVALUE, STDERR};

fn numeric(name: &str) -> Option<ColumnMeta> {
    let meta = MetaNumeric::new(MetaInfo::new(name, name), 8).expect("numeric meta");
    Some(ColumnMeta::Numeric(meta))
}

#[test]
fn counts_rows_with_value_but_missing_partner() {
    let mut columns = ColumnSet::new();
    columns.push(numeric(EFFECT));
    columns.push(numeric(STDERR));
    let mut tracker = DependencyTracker::from_pairs(&[(EFFECT, STDERR)], &columns);
    assert_eq!(tracker.len(), 1);

    let rows = [
        ["0.1", "NA"],
        ["0.2", "NA"],
        ["0.3", "NA"],
        ["0.4", "NA"],
        ["0.5", "NA"],
        ["0.1", "0.01"],
        ["0.2", "0.02"],
        ["0.3", "0.03"],
        ["NA", "0.04"],
    ];
    for row in rows {
        columns.put_row(row).expect("row");
        tracker.observe(&columns);
    }
    columns.finalize();
    let results = tracker.results(&columns);
    assert_eq!(results.len(), 1);
    assert_eq!(results[0].present, EFFECT);
    assert_eq!(results[0].missing, STDERR);
    assert_eq!(results[0].count, Some(5));
}

#[test]
fn pairs_need_both_columns() {
    let mut columns = ColumnSet::new();
    columns.push(numeric(EFFECT));
    columns.push(None);
    columns.push(numeric(PVALUE));
    let tracker = DependencyTracker::from_pairs(&DEPENDENCY_PAIRS, &columns);
    // EFFECT/PVALUE and PVALUE/EFFECT only.
    assert_eq!(tracker.len(), 2);
}

#[test]
fn non_numeric_column_makes_count_unavailable() {
    let mut columns = ColumnSet::new();
    let marker = MetaUniqueness::new(MetaInfo::new(MARKER, "SNP"), 4).expect("marker meta");
    columns.push(Some(ColumnMeta::Uniqueness(marker)));
    columns.push(numeric(EFFECT));
    columns.push(numeric(PVALUE));
    let mut tracker = DependencyTracker::from_pairs(&DEPENDENCY_PAIRS, &columns);

    for row in [["NA", "0.1", "x"], ["rs1", "0.2", "0.5"]] {
        columns.put_row(row).expect("row");
        tracker.observe(&columns);
    }
    columns.finalize();
    let results = tracker.results(&columns);

    let find = |present: &str, missing: &str| {
        results
            .iter()
            .find(|r| r.present == present && r.missing == missing)
            .expect("tracked pair")
            .count
    };
    assert_eq!(find(EFFECT, MARKER), Some(1));
    assert_eq!(find(EFFECT, PVALUE), None);
    assert_eq!(find(PVALUE, MARKER), None);
}
