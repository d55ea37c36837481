use std::fs;
use std::io::Cursor;

use gwasqc::error::QcError;
use gwasqc::formatter::{
    FormatOptions, FormatterConfig, adjust_pvalue, adjust_stderr, format_file, format_stream,
};
use gwasqc::stats::chi_square_upper_quantile;
use gwasqc::types::Separator;
use tempfile::TempDir;

const INPUT: &str = "SNP\tPVALUE\tSTDERR\tN\tIMP_QUALITY\n\
rs1\t0.05\t0.1\t1000\t0.9\n\
rs2\tNA\t0.2\t500\tNA\n";

fn format(input: &str, lambda: f64) -> Result<(Vec<Vec<String>>, usize), QcError> {
    let options = FormatOptions {
        lambda,
        ..FormatOptions::default()
    };
    let mut out = Vec::new();
    let rows = format_stream(Cursor::new(input), &mut out, "input.txt", Separator::Tab, &options)?;
    let text = String::from_utf8(out).expect("utf8");
    let lines = text
        .lines()
        .map(|line| line.split('\t').map(str::to_string).collect())
        .collect();
    Ok((lines, rows))
}

fn number(token: &str) -> f64 {
    token.parse().expect("number")
}

#[test]
fn adjustment_inverts_inflation() {
    let lambda = 1.5;
    let adjusted = adjust_pvalue(0.05, lambda);
    assert!((adjusted - 0.1097).abs() < 1e-3, "{adjusted}");
    let ratio = chi_square_upper_quantile(0.05) / chi_square_upper_quantile(adjusted);
    assert!((ratio - lambda).abs() < 1e-4, "{ratio}");
    assert!((adjust_stderr(0.1, 4.0) - 0.2).abs() < 1e-12);
}

#[test]
fn lambda_at_most_one_leaves_values() {
    assert_eq!(adjust_pvalue(0.05, 1.0), 0.05);
    assert_eq!(adjust_pvalue(0.05, 0.9), 0.05);
    assert_eq!(adjust_stderr(0.1, 0.5), 0.1);
}

#[test]
fn appends_adjusted_columns() {
    let (lines, rows) = format(INPUT, 1.5).expect("format");
    assert_eq!(rows, 2);
    assert_eq!(lines[0].len(), 8);
    assert_eq!(
        lines[0],
        ["SNP", "PVALUE", "STDERR", "N", "IMP_QUALITY", "PVALUE_GC", "STDERR_GC", "N_EFF"]
    );

    let first = &lines[1];
    assert_eq!(first[..5], ["rs1", "0.05", "0.1", "1000", "0.9"]);
    assert!((number(&first[5]) - adjust_pvalue(0.05, 1.5)).abs() < 1e-12);
    assert!((number(&first[6]) - 0.1 * 1.5f64.sqrt()).abs() < 1e-12);
    assert!((number(&first[7]) - 900.0).abs() < 1e-9);

    let second = &lines[2];
    assert_eq!(second[5], "NA");
    assert!((number(&second[6]) - 0.2 * 1.5f64.sqrt()).abs() < 1e-12);
    assert_eq!(second[7], "NA");
}

#[test]
fn unit_lambda_copies_values() {
    let (lines, _) = format(INPUT, 1.0).expect("format");
    assert_eq!(lines[1][5], "0.05");
    assert_eq!(lines[1][6], "0.1");
}

#[test]
fn only_present_columns_are_added() {
    let (lines, _) = format("SNP\tPVALUE\nrs1\t0.5\n", 1.2).expect("format");
    assert_eq!(lines[0], ["SNP", "PVALUE", "PVALUE_GC"]);
    assert_eq!(lines[1].len(), 3);
}

#[test]
fn invalid_lambda_is_rejected() {
    for lambda in [0.0, -1.0, f64::NAN] {
        let err = format(INPUT, lambda).expect_err("invalid lambda");
        assert!(matches!(err, QcError::InvalidArgument(_)), "{err}");
    }
}

#[test]
fn malformed_row_is_reported() {
    let err = format("SNP\tPVALUE\nrs1\n", 1.0).expect_err("malformed");
    assert!(matches!(err, QcError::MalformedRow { line: 2, .. }));
}

#[test]
fn format_file_writes_gzip() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("input.txt");
    let output = dir.path().join("formatted.txt.gz");
    fs::write(&input, INPUT).expect("write input");

    let config = FormatterConfig {
        input,
        output: output.clone(),
        separator: Some(Separator::Tab),
        options: FormatOptions {
            lambda: 1.1,
            ..FormatOptions::default()
        },
    };
    assert_eq!(format_file(&config).expect("format file"), 2);

    let reader = gwasqc::io::open_reader(&output).expect("open output");
    let lines: Vec<String> = std::io::BufRead::lines(reader)
        .collect::<Result<_, _>>()
        .expect("read output");
    assert_eq!(lines.len(), 3);
    assert!(lines[0].ends_with("PVALUE_GC\tSTDERR_GC\tN_EFF"));
    let n_eff = lines[1].rsplit('\t').next().expect("n_eff");
    assert!((number(n_eff) - 900.0).abs() < 1e-9);
}

#[test]
fn renamed_sample_size_column_gets_n_eff() {
    let options = FormatOptions {
        n_total: "N_TOTAL".to_string(),
        lambda: 1.0,
        ..FormatOptions::default()
    };
    let input = INPUT.replacen("\tN\t", "\tn_total\t", 1);
    let mut out = Vec::new();
    format_stream(Cursor::new(input), &mut out, "input.txt", Separator::Tab, &options)
        .expect("format");
    let text = String::from_utf8(out).expect("utf8");
    let first: Vec<&str> = text.lines().nth(1).expect("row").split('\t').collect();
    assert_eq!(first.len(), 8);
    assert!((number(first[7]) - 900.0).abs() < 1e-9);
}

#[test]
fn empty_data_line_is_fatal() {
    let err = format("SNP\tPVALUE\nrs1\t0.5\n\nrs2\t0.1\n", 1.0).expect_err("empty line");
    match err {
        QcError::EmptyLine { file, line } => {
            assert_eq!(file, "input.txt");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}
