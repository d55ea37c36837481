use gwasqc::error::QcError;
use gwasqc::meta::numeric::{ParsedToken, parse_token};
use gwasqc::meta::{
    Accumulate, ColumnMeta, ColumnSet, HEAP_INCREMENT, MetaCrossTable, MetaFormat, MetaGroup,
    MetaInfo, MetaNumeric, MetaRatio, MetaRef, MetaUniqueness, RowView,
};
use gwasqc::plots::PlotFlags;
use gwasqc::types::CasePolicy;

fn numeric(name: &str) -> MetaNumeric {
    MetaNumeric::new(MetaInfo::new(name, name), 16).expect("numeric meta")
}

fn feed<M: Accumulate>(meta: &mut M, tokens: &[&str]) {
    for token in tokens {
        meta.put(token).expect("put token");
    }
}

/// Type-7 quantile computed directly from the definition.
fn reference_quantile(sorted: &[f64], p: f64) -> f64 {
    let h = (sorted.len() - 1) as f64 * p;
    let lo = h.floor() as usize;
    let hi = h.ceil() as usize;
    sorted[lo] + (h - lo as f64) * (sorted[hi] - sorted[lo])
}

fn check_against_reference(values: &[f64]) {
    let mut meta = numeric("EFFECT");
    for v in values {
        meta.put_value(*v).expect("put value");
    }
    meta.finalize();
    let summary = meta.summary().expect("summary");

    let mut sorted = values.to_vec();
    sorted.sort_by(|a, b| a.partial_cmp(b).expect("finite"));
    let mean = values.iter().sum::<f64>() / values.len() as f64;
    assert!((summary.mean - mean).abs() < 1e-12);
    assert!((summary.median - reference_quantile(&sorted, 0.5)).abs() < 1e-12);
    for (level, value) in summary.quantiles {
        assert!(
            (value - reference_quantile(&sorted, level)).abs() < 1e-12,
            "quantile {level}"
        );
    }
    assert_eq!(summary.n, values.len());
    assert!((summary.min - sorted[0]).abs() < 1e-12);
    assert!((summary.max - sorted[sorted.len() - 1]).abs() < 1e-12);
}

#[test]
fn quantiles_match_reference_for_odd_count() {
    check_against_reference(&[5.0, 1.0, 4.0, 2.0, 3.0, 9.5, -2.0]);
}

#[test]
fn quantiles_match_reference_for_even_count() {
    check_against_reference(&[0.3, 0.1, 0.8, 0.4, 0.2, 0.9]);
}

#[test]
fn quantiles_match_reference_for_single_value() {
    check_against_reference(&[42.0]);
    let mut meta = numeric("EFFECT");
    meta.put_value(42.0).expect("put value");
    meta.finalize();
    let summary = meta.summary().expect("summary");
    assert!(summary.sd.is_nan());
    assert!(summary.skewness.is_nan());
}

#[test]
fn sd_uses_sample_denominator() {
    let mut meta = numeric("EFFECT");
    feed(&mut meta, &["2", "4", "4", "4", "5", "5", "7", "9"]);
    meta.finalize();
    let summary = meta.summary().expect("summary");
    assert!((summary.mean - 5.0).abs() < 1e-12);
    assert!((summary.sd - (32.0f64 / 7.0).sqrt()).abs() < 1e-12);
}

#[test]
fn sample_buffer_grows_past_initial_capacity() {
    let mut meta = MetaNumeric::new(MetaInfo::new("EFFECT", "BETA"), 1).expect("numeric meta");
    assert_eq!(meta.memory_usage(), size_of::<f64>());
    for v in [1.0, 2.0, 3.0] {
        meta.put_value(v).expect("put value");
    }
    assert_eq!(meta.memory_usage(), (1 + HEAP_INCREMENT) * size_of::<f64>());

    meta.finalize();
    let summary = meta.summary().expect("summary");
    assert_eq!(summary.n, 3);
    assert!((summary.mean - 2.0).abs() < 1e-12);
    assert!((summary.sd - 1.0).abs() < 1e-12);
    assert!((summary.median - 2.0).abs() < 1e-12);
}

#[test]
fn oversized_sample_buffer_is_an_allocation_error() {
    let err = MetaNumeric::new(MetaInfo::new("EFFECT", "BETA"), usize::MAX).expect_err("allocation");
    match err {
        QcError::Allocation { what, bytes } => {
            assert_eq!(what, "BETA");
            assert_eq!(bytes, usize::MAX);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn parse_token_is_strict() {
    assert_eq!(parse_token("  1.5"), ParsedToken::Value(1.5));
    assert_eq!(parse_token("1e-3"), ParsedToken::Value(1e-3));
    assert_eq!(parse_token("NA"), ParsedToken::Missing);
    assert_eq!(parse_token("nan"), ParsedToken::Missing);
    assert_eq!(parse_token(""), ParsedToken::Invalid);
    assert_eq!(parse_token("1.5 "), ParsedToken::Invalid);
    assert_eq!(parse_token("abc"), ParsedToken::Invalid);
}

#[test]
fn strict_adjusted_folds_before_range_check() {
    let info = MetaInfo::new("FREQLABEL", "FREQ");
    let mut meta =
        MetaNumeric::implausible_strict_adjusted(info, 0.0, 1.0, 0.5, 16).expect("meta");
    meta.put("0.6").expect("put");
    assert!((meta.value() - 0.4).abs() < 1e-12);
    meta.put("0.3").expect("put");
    assert_eq!(meta.n_greater(), 0);
    assert_eq!(meta.n_less(), 0);
    meta.finalize();
    let summary = meta.summary().expect("summary");
    assert_eq!(summary.n, 2);
    assert!((summary.max - 0.4).abs() < 1e-12);
    assert!((summary.min - 0.3).abs() < 1e-12);
}

#[test]
fn implausible_values_are_counted_and_excluded() {
    let info = MetaInfo::new("STDERR", "SE");
    let mut meta = MetaNumeric::implausible(info, 0.0, 10.0, 16).expect("meta");
    feed(&mut meta, &["-1", "0.5", "11", "12", "NA", "2"]);
    assert_eq!(meta.n_less(), 1);
    assert_eq!(meta.n_greater(), 2);
    assert_eq!(meta.na_count(), 1);
    meta.finalize();
    let summary = meta.summary().expect("summary");
    assert_eq!(summary.n, 2);
    assert!((summary.mean - 1.25).abs() < 1e-12);
    // Non-strict metas still plot the rejected values.
    let histogram = meta.histogram().expect("histogram");
    assert_eq!(histogram.total, 5);
}

#[test]
fn strict_metas_drop_rejected_values_from_plots() {
    let info = MetaInfo::new("PVALUE", "P");
    let mut meta = MetaNumeric::implausible_strict(info, 0.0, 1.0, 16).expect("meta");
    feed(&mut meta, &["0.5", "1.5", "0.25"]);
    meta.finalize();
    assert_eq!(meta.n_greater(), 1);
    assert_eq!(meta.histogram().expect("histogram").total, 2);
}

#[test]
fn invalid_token_degrades_permanently() {
    let mut meta = numeric("EFFECT");
    feed(&mut meta, &["0.1", "0.2", "abc", "0.3"]);
    assert!(!meta.is_numeric());
    assert!(meta.is_na());
    meta.finalize();
    assert!(!meta.is_numeric());
    assert!(meta.summary().is_none());
    assert_eq!(meta.memory_usage(), 0);
}

#[test]
fn all_missing_column_is_not_numeric() {
    let mut meta = numeric("EFFECT");
    feed(&mut meta, &["NA", "NA"]);
    meta.finalize();
    assert!(!meta.is_numeric());
    assert_eq!(meta.na_count(), 2);
}

#[test]
fn custom_missing_marker() {
    let info = MetaInfo::new("EFFECT", "BETA").with_na_marker(".");
    let mut meta = MetaNumeric::new(info, 4).expect("meta");
    feed(&mut meta, &[".", "1", "NA"]);
    assert_eq!(meta.na_count(), 2);
    assert_eq!(meta.n(), 1);
}

#[test]
fn qq_summary_reports_lambda() {
    let mut meta = numeric("PVALUE");
    meta.set_plots(PlotFlags {
        histogram: false,
        boxplot: false,
        qqplot: true,
    });
    for i in 1..=99 {
        meta.put_value(i as f64 / 100.0).expect("put value");
    }
    meta.finalize();
    let lambda = meta.lambda().expect("lambda");
    assert!((lambda - 1.0).abs() < 1e-6);
    let qq = meta.qqplot().expect("qq plot");
    assert_eq!(qq.points, 99);
    assert!(!qq.expected.is_empty());
    assert!(meta.histogram().is_none());
}

#[test]
fn uniqueness_reports_each_duplicate_once() {
    let mut meta = MetaUniqueness::new(MetaInfo::new("MARKER", "SNP"), 4).expect("meta");
    feed(&mut meta, &["rs1", "rs2", "rs1", "rs3", "rs2", "rs2"]);
    meta.finalize();
    assert_eq!(meta.duplicates(), ["rs1".to_string(), "rs2".to_string()]);
    assert_eq!(meta.n(), 6);
}

#[test]
fn uniqueness_ignores_case() {
    let mut meta = MetaUniqueness::new(MetaInfo::new("MARKER", "SNP"), 1).expect("meta");
    feed(&mut meta, &["RS7", "rs7", "NA", "rs8"]);
    meta.finalize();
    assert_eq!(meta.duplicates().len(), 1);
    assert_eq!(meta.na_count(), 1);
}

#[test]
fn groups_follow_case_policy() {
    let mut insensitive = MetaGroup::new(MetaInfo::new("ALLELE1", "A1"), CasePolicy::Insensitive);
    feed(&mut insensitive, &["a", "A", "c", "NA", "G"]);
    insensitive.finalize();
    assert_eq!(insensitive.count("A"), Some(2));
    assert_eq!(insensitive.n(), 4);
    assert_eq!(insensitive.na_count(), 1);

    let mut sensitive = MetaGroup::new(MetaInfo::new("STRAND", "STRAND"), CasePolicy::Sensitive);
    feed(&mut sensitive, &["a", "A"]);
    sensitive.finalize();
    assert_eq!(sensitive.count("a"), Some(1));
    assert_eq!(sensitive.count("A"), Some(1));
}

#[test]
fn chromosome_groups_sort_numerically_first() {
    let mut meta = MetaGroup::new(MetaInfo::new("CHR", "CHR"), CasePolicy::Insensitive);
    feed(&mut meta, &["10", "X", "2", "1", "2"]);
    meta.finalize();
    let keys: Vec<&str> = meta.groups().iter().map(|(k, _)| k.as_str()).collect();
    assert_eq!(keys.len(), 4);
    assert_eq!(&keys[..3], ["1", "2", "10"]);
}

#[test]
fn format_meta_checks_numbers_only() {
    let mut meta = MetaFormat::new(MetaInfo::new("POSITION", "POS"));
    feed(&mut meta, &["100", "NA", "200"]);
    meta.finalize();
    assert!(meta.is_numeric());
    assert_eq!(meta.n(), 2);

    let mut empty = MetaFormat::new(MetaInfo::new("POSITION", "POS"));
    feed(&mut empty, &["NA"]);
    empty.finalize();
    assert!(!empty.is_numeric());

    let mut broken = MetaFormat::new(MetaInfo::new("POSITION", "POS"));
    feed(&mut broken, &["100", "1e"]);
    broken.finalize();
    assert!(!broken.is_numeric());
}

fn two_numeric_columns(a: &str, b: &str) -> ColumnSet {
    let mut columns = ColumnSet::new();
    columns.push(Some(ColumnMeta::Numeric(numeric(a))));
    columns.push(Some(ColumnMeta::Numeric(numeric(b))));
    columns
}

#[test]
fn ratio_slices_follow_decreasing_p() {
    let mut columns = two_numeric_columns("EFFECT", "STDERR");
    let effect = columns.id_of("EFFECT").expect("effect");
    let se = columns.id_of("STDERR").expect("se");
    let info = MetaInfo::new("EFFECT_SE_RATIO", "EFFECT_SE_RATIO");
    let mut ratio =
        MetaRatio::new(info, MetaRef::Column(effect), MetaRef::Column(se), 2).expect("ratio");

    for row in [["1", "1"], ["2", "1"], ["-1", "1"], ["0.5", "1"], ["3", "NA"]] {
        columns.put_row(row).expect("row");
        let view = RowView {
            columns: &columns,
            filtered: &[],
        };
        ratio.put_row(&view).expect("ratio row");
    }
    columns.finalize();
    let view = RowView {
        columns: &columns,
        filtered: &[],
    };
    ratio.finalize(&view);

    assert!(ratio.is_numeric());
    assert_eq!(ratio.n(), 4);
    let slices = ratio.slices();
    assert_eq!(slices.len(), 5);
    // Top half by p holds the two smallest |effect| values: 0.5 and 1.
    assert_eq!(slices[0].n, 2);
    assert!(slices[0].skewness.abs() < 1e-12);
    assert!((slices[0].kurtosis + 2.75).abs() < 1e-12);
    assert_eq!(slices[4].n, 4);
}

#[test]
fn ratio_over_non_numeric_source_is_not_numeric() {
    let mut columns = two_numeric_columns("EFFECT", "STDERR");
    let effect = columns.id_of("EFFECT").expect("effect");
    let se = columns.id_of("STDERR").expect("se");
    let info = MetaInfo::new("EFFECT_SE_RATIO", "EFFECT_SE_RATIO");
    let mut ratio =
        MetaRatio::new(info, MetaRef::Column(effect), MetaRef::Column(se), 2).expect("ratio");
    for row in [["1", "0.5"], ["2", "oops"]] {
        columns.put_row(row).expect("row");
        ratio
            .put_row(&RowView {
                columns: &columns,
                filtered: &[],
            })
            .expect("ratio row");
    }
    columns.finalize();
    ratio.finalize(&RowView {
        columns: &columns,
        filtered: &[],
    });
    assert!(!ratio.is_numeric());
    assert!(ratio.slices().is_empty());
}

#[test]
fn cross_table_counts_cells_and_missing_values() {
    let mut columns = two_numeric_columns("IMPUTED", "USED_FOR_IMP");
    let x = columns.id_of("IMPUTED").expect("imputed");
    let y = columns.id_of("USED_FOR_IMP").expect("used");
    let info = MetaInfo::new("IMPUTED_USED_FOR_IMP", "IMPUTED_USED_FOR_IMP");
    let mut table = MetaCrossTable::new(info, "table", MetaRef::Column(x), MetaRef::Column(y));

    let rows = [
        ["1", "0"],
        ["0", "1"],
        ["1", "0"],
        ["NA", "1"],
        ["1", "NA"],
        ["NA", "NA"],
    ];
    for row in rows {
        columns.put_row(row).expect("row");
        table.put_row(&RowView {
            columns: &columns,
            filtered: &[],
        });
    }
    columns.finalize();
    table.finalize(&RowView {
        columns: &columns,
        filtered: &[],
    });

    assert!(table.is_numeric());
    assert_eq!(table.count(1.0, 0.0), 2);
    assert_eq!(table.count(0.0, 1.0), 1);
    assert_eq!(table.count(0.0, 0.0), 0);
    assert_eq!(table.x_total(1.0), 2);
    assert_eq!(table.y_total(1.0), 1);
    assert_eq!(table.total(), 3);
    assert_eq!(table.x_na_by_y().collect::<Vec<_>>(), vec![(1.0, 1)]);
    assert_eq!(table.y_na_by_x().collect::<Vec<_>>(), vec![(1.0, 1)]);
    assert_eq!(table.both_na(), 1);
}
