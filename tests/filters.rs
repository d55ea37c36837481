use gwasqc::expression::Expression;
use gwasqc::meta::{ColumnMeta, ColumnSet, MetaFiltered, MetaId, MetaInfo, MetaNumeric};

#[test]
fn comparisons_use_tolerance() {
    assert!(Expression::Gt(0.05).evaluate(0.06));
    assert!(!Expression::Gt(0.05).evaluate(0.05));
    assert!(!Expression::Gt(0.05).evaluate(0.05 + 1e-12));
    assert!(Expression::Lt(1.0).evaluate(0.5));
    assert!(Expression::Let(1.0).evaluate(1.0));
    assert!(Expression::Let(1.0).evaluate(1.0 + 1e-12));
    assert!(!Expression::Let(1.0).evaluate(1.1));
}

#[test]
fn nan_never_passes_a_comparison() {
    for expression in [
        Expression::Gt(0.0),
        Expression::Lt(0.0),
        Expression::Let(0.0),
        Expression::Get,
    ] {
        assert!(!expression.evaluate(f64::NAN), "{expression}");
    }
}

#[test]
fn open_closed_range() {
    let range = Expression::open_closed(0.0, 1.0);
    assert!(!range.evaluate(0.0));
    assert!(range.evaluate(1e-300));
    assert!(range.evaluate(0.5));
    assert!(range.evaluate(1.0));
    assert!(!range.evaluate(1.5));
    assert_eq!(range.to_string(), "(> 0 and <= 1)");
}

#[test]
fn disjunction() {
    let outside = Expression::Lt(0.1).or(Expression::Gt(0.9));
    assert!(outside.evaluate(0.05));
    assert!(outside.evaluate(0.95));
    assert!(!outside.evaluate(0.5));
}

/// PVALUE, FREQLABEL, IMP_QUALITY, STDERR, EFFECT.
fn columns() -> (ColumnSet, [MetaId; 5]) {
    let mut set = ColumnSet::new();
    let ids = ["PVALUE", "FREQLABEL", "IMP_QUALITY", "STDERR", "EFFECT"].map(|name| {
        let meta = MetaNumeric::new(MetaInfo::new(name, name), 8).expect("numeric meta");
        set.push(Some(ColumnMeta::Numeric(meta)))
    });
    (set, ids)
}

fn high_quality_p(ids: [MetaId; 5]) -> MetaFiltered {
    let [p, maf, imp, se, _] = ids;
    let mut filtered =
        MetaFiltered::new(MetaInfo::new("PVALUE_HQ_1", "PVALUE_HQ_1"), p, 8).expect("filtered");
    filtered.add_dependency(maf, Expression::Gt(0.05));
    filtered.add_dependency(imp, Expression::Gt(0.6));
    filtered.add_dependency(se, Expression::Gt(0.0));
    filtered
}

#[test]
fn missing_dependency_value_never_reuses_previous_row() {
    let (mut columns, ids) = columns();
    let mut filtered = high_quality_p(ids);

    let rows = [
        ["0.01", "0.2", "0.9", "0.1", "1"],
        ["0.02", "NA", "0.9", "0.1", "1"],
        ["0.03", "0.01", "0.9", "0.1", "1"],
        ["0.04", "0.2", "0.5", "0.1", "1"],
        ["0.05", "0.2", "0.9", "0", "1"],
        ["NA", "0.2", "0.9", "0.1", "1"],
        ["0.06", "0.3", "0.7", "0.2", "1"],
    ];
    let mut passed = Vec::new();
    for row in rows {
        columns.put_row(row).expect("row");
        filtered.put_row(&columns).expect("filtered row");
        if !filtered.is_na() {
            passed.push(filtered.value());
        }
    }
    assert_eq!(passed, vec![0.01, 0.06]);

    columns.finalize();
    filtered.finalize(&columns);
    let meta = filtered.numeric();
    let summary = meta.summary().expect("summary");
    assert_eq!(summary.n, 2);
    assert!((summary.mean - 0.035).abs() < 1e-12);
    assert_eq!(meta.na_count(), 1);
}

#[test]
fn presence_requires_a_value_only() {
    let (mut columns, ids) = columns();
    let [p, _, _, _, effect] = ids;
    let mut filtered =
        MetaFiltered::new(MetaInfo::new("PVALUE_MAF_1", "PVALUE_MAF_1"), p, 8).expect("filtered");
    filtered.add_presence(effect);

    for row in [
        ["0.1", "0", "0", "0", "-3"],
        ["0.2", "0", "0", "0", "NA"],
        ["0.3", "0", "0", "0", "0"],
    ] {
        columns.put_row(row).expect("row");
        filtered.put_row(&columns).expect("filtered row");
    }
    columns.finalize();
    filtered.finalize(&columns);
    assert_eq!(filtered.numeric().summary().expect("summary").n, 2);
}

#[test]
fn non_numeric_source_makes_filtered_non_numeric() {
    let (mut columns, ids) = columns();
    let mut filtered = high_quality_p(ids);
    for row in [
        ["0.01", "0.2", "0.9", "0.1", "1"],
        ["p<1e-8", "0.2", "0.9", "0.1", "1"],
    ] {
        columns.put_row(row).expect("row");
        filtered.put_row(&columns).expect("filtered row");
    }
    columns.finalize();
    filtered.finalize(&columns);
    assert!(!filtered.is_numeric());
    assert!(filtered.numeric().summary().is_none());
}

#[test]
fn non_numeric_dependency_makes_filtered_non_numeric() {
    let (mut columns, ids) = columns();
    let mut filtered = high_quality_p(ids);
    columns
        .put_row(["0.01", "low", "0.9", "0.1", "1"])
        .expect("row");
    filtered.put_row(&columns).expect("filtered row");
    assert!(!filtered.is_numeric());
}
