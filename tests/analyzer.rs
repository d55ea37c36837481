use std::fs;
use std::io::Cursor;

use gwasqc::analyzer::{RunOptions, analyze_reader, log_path, process_descriptors, process_script};
use gwasqc::error::QcError;
use gwasqc::qc::validate_descriptor;
use gwasqc::report::write_report;
use gwasqc::schema::Descriptor;
use gwasqc::types::{
    CHR, EFFECT, EFFECT_HQ, FREQLABEL, MARKER, PVALUE, PVALUE_FROM0TO1, PVALUE_HQ_1, PVALUE_HQ_2,
    PVALUE_IMP_1, PVALUE_IMP_2, PVALUE_MAF_1, PVALUE_MAF_2, STDERR, STRAND, Separator,
};
use tempfile::TempDir;

const HEADER: &str = "MARKER\tALLELE1\tALLELE2\tCHR\tPOSITION\tSTRAND\tPVALUE\tEFFECT\tSTDERR\tFREQLABEL\tIMP_QUALITY\tN\tIMPUTED\tUSED_FOR_IMP";

const ROWS: [&str; 5] = [
    "rs1\tA\tG\t1\t100\t+\t0.01\t0.5\t0.1\t0.2\t0.9\t1000\t1\t0",
    "rs2\ta\tg\t1\t200\t+\t0.5\t-0.2\t0.1\t0.4\t0.95\t1000\t0\t1",
    "rs3\tC\tT\t2\t300\t-\t0.9\t0.1\tNA\t0.3\t0.8\t900\t1\t0",
    "rs4\tG\tA\tX\t400\t+\tNA\t0.3\t0.2\t0.1\t0.7\t800\t0\t1",
    "rs2\tA\tG\t1\t250\t+\t0.2\t0.05\t0.15\t0.45\t0.85\t1000\t0\t1",
];

fn data() -> String {
    let mut text = format!("{HEADER}\n");
    for row in ROWS {
        text.push_str(row);
        text.push('\n');
    }
    text
}

fn descriptor() -> Descriptor {
    let mut descriptor = Descriptor::for_path("study.txt");
    descriptor.header_separator = Some(Separator::Tab);
    descriptor.data_separator = Some(Separator::Tab);
    validate_descriptor(&mut descriptor).expect("valid descriptor");
    descriptor.estimated_rows = Some(16);
    descriptor
}

#[test]
fn analyzes_every_column_and_filter() {
    let report = analyze_reader(Cursor::new(data()), descriptor()).expect("analysis");
    assert_eq!(report.rows, 5);
    assert!(report.column_map.missing.is_empty());
    assert!(report.memory_usage > 0);

    let marker = report
        .column(MARKER)
        .and_then(|m| m.as_uniqueness())
        .expect("marker meta");
    assert_eq!(marker.duplicates(), ["rs2"]);

    let chr = report.column(CHR).and_then(|m| m.as_group()).expect("chr meta");
    assert_eq!(chr.n(), 5);

    for name in [
        PVALUE_FROM0TO1,
        PVALUE_HQ_1,
        PVALUE_HQ_2,
        PVALUE_MAF_1,
        PVALUE_MAF_2,
        PVALUE_IMP_1,
        PVALUE_IMP_2,
        EFFECT_HQ,
    ] {
        assert!(report.filtered(name).is_some(), "{name}");
    }

    let unfiltered = report.filtered(PVALUE_FROM0TO1).expect("unfiltered");
    assert_eq!(unfiltered.numeric().summary().expect("summary").n, 4);
    // rs3 has no standard error.
    let hq = report.filtered(PVALUE_HQ_1).expect("hq");
    assert_eq!(hq.numeric().summary().expect("summary").n, 3);

    let freq = report.high_quality(FREQLABEL).expect("hq freq");
    assert_eq!(freq.info().actual_name, "MAF");
    assert_eq!(freq.numeric().summary().expect("summary").n, 4);

    assert_eq!(report.dependency(EFFECT, STDERR).and_then(|d| d.count), Some(1));
    assert_eq!(report.dependency(PVALUE, EFFECT).and_then(|d| d.count), Some(0));

    let lambda = report.lambda().expect("lambda");
    assert!(lambda.is_finite() && lambda > 0.0, "{lambda}");
    assert!(report.ratio.as_ref().is_some_and(|r| r.info().common_name == "EFFECT_SE_RATIO"));
    assert!(report.cross_table.is_some());

    let mut text = Vec::new();
    write_report(&mut text, &report).expect("report");
    let text = String::from_utf8(text).expect("utf8");
    assert!(text.contains("Rows: 5"));
    assert!(text.contains("[PVALUE_MAF_1] source: PVALUE"));
}

#[test]
fn missing_columns_are_listed() {
    let header = HEADER.replace("\tSTRAND", "");
    let row = ROWS[0].replace("\t+", "");
    let report =
        analyze_reader(Cursor::new(format!("{header}\n{row}\n")), descriptor()).expect("analysis");
    assert_eq!(report.column_map.missing, [STRAND]);
    assert!(report.column(STRAND).is_none());
    assert_eq!(report.rows, 1);
}

#[test]
fn renamed_column_is_found_case_insensitively() {
    let mut descriptor = descriptor();
    descriptor.set_column(PVALUE, "P_VAL");
    let header = HEADER.replace("PVALUE", "p_val");
    let report = analyze_reader(Cursor::new(format!("{header}\n{}\n", ROWS[0])), descriptor)
        .expect("analysis");
    assert!(report.column(PVALUE).is_some());
    assert!(!report.column_map.info.is_empty());
}

#[test]
fn short_row_is_malformed() {
    let text = format!("{HEADER}\n{}\nrs9\tA\n", ROWS[0]);
    let err = analyze_reader(Cursor::new(text), descriptor()).expect_err("malformed");
    assert!(matches!(
        err,
        QcError::MalformedRow {
            line: 3,
            expected: 14,
            actual: 2,
            ..
        }
    ));
}

#[test]
fn empty_data_line_is_fatal() {
    let text = format!("{HEADER}\n{}\n\n{}\n", ROWS[0], ROWS[1]);
    let err = analyze_reader(Cursor::new(text), descriptor()).expect_err("empty line");
    match err {
        QcError::EmptyLine { file, line } => {
            assert_eq!(file, "study.txt");
            assert_eq!(line, 3);
        }
        other => panic!("unexpected error: {other}"),
    }
}

#[test]
fn empty_input_has_no_header() {
    let err = analyze_reader(Cursor::new(""), descriptor()).expect_err("empty");
    assert!(matches!(err, QcError::EmptyHeader { .. }));
}

#[test]
fn unresolved_separators_are_rejected() {
    let descriptor = Descriptor::for_path("study.txt");
    let err = analyze_reader(Cursor::new(data()), descriptor).expect_err("separators");
    assert!(matches!(err, QcError::InvalidArgument(_)));
}

#[test]
fn run_writes_report_and_log() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("study.txt");
    fs::write(&input, data()).expect("write input");
    let output_dir = dir.path().join("out");

    let options = RunOptions {
        output_dir: output_dir.clone(),
        threads: Some(2),
        plots: false,
    };
    let descriptors = vec![Descriptor::for_path(&input)];
    let log = log_path(&output_dir, &descriptors);
    let outcomes = process_descriptors(descriptors, &options).expect("run");
    assert_eq!(outcomes.len(), 1);

    let outcome = &outcomes[0];
    assert_eq!(outcome.rows, 5);
    assert!(outcome.lambda.is_some());
    assert_eq!(outcome.report, output_dir.join("gwasqc_study.txt"));
    let report = fs::read_to_string(&outcome.report).expect("read report");
    assert!(report.contains("Rows: 5"));

    assert_eq!(log, output_dir.join("gwasqc_qc.log"));
    let log = fs::read_to_string(&log).expect("read log");
    assert!(log.starts_with("INFO  Processing 1 file(s)\n"));
    assert!(log.contains(&format!("INFO  {}: lambda ", input.display())));
    assert!(log.ends_with("INFO  Finished: 1 file(s), 0 warning(s)\n"));
}

#[test]
fn run_writes_plots() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("study.txt");
    fs::write(&input, data()).expect("write input");
    let options = RunOptions {
        output_dir: dir.path().join("out"),
        threads: None,
        plots: true,
    };
    let outcomes =
        process_descriptors(vec![Descriptor::for_path(&input)], &options).expect("run");
    let plots = &outcomes[0].plots;
    assert!(!plots.is_empty());
    assert!(plots.iter().all(|p| p.exists()), "{plots:?}");
    let qq = options.output_dir.join("gwasqc_study_QQ_qqplot_MAF.html");
    assert!(plots.contains(&qq));
    let unique: std::collections::HashSet<_> = plots.iter().collect();
    assert_eq!(unique.len(), plots.len());
}

#[test]
fn run_reports_missing_input() {
    let dir = TempDir::new().expect("tempdir");
    let options = RunOptions {
        output_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let absent = dir.path().join("absent.txt");
    let descriptors = vec![Descriptor::for_path(&absent)];
    assert!(process_descriptors(descriptors, &options).is_err());
    let log = fs::read_to_string(dir.path().join("gwasqc_qc.log")).expect("read log");
    assert!(log.contains(&format!("WARN  [{}] ", absent.display())), "{log}");
    assert!(log.ends_with("INFO  Finished: 1 file(s), 1 warning(s)\n"));
}

#[test]
fn script_with_regions_file_annotates_input() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("study.txt");
    fs::write(&input, data()).expect("write input");
    let regions = dir.path().join("genes.txt");
    fs::write(&regions, "GENE\tCHROM\tFROM\tTO\nG1\t1\t150\t220\nG2\t2\t1000\t2000\n")
        .expect("write regions");
    let script = dir.path().join("qc.script");
    fs::write(
        &script,
        format!(
            "SEPARATOR TAB\n\
             REGIONS_FILE {}\n\
             REGIONS_FILE_SEPARATOR TAB\n\
             REGION_NAME GENE\n\
             REGION_CHR CHROM\n\
             REGION_START FROM\n\
             REGION_END TO\n\
             REGIONS_DEVIATION 0 100\n\
             PROCESS {}\n",
            regions.display(),
            input.display()
        ),
    )
    .expect("write script");

    let options = RunOptions {
        output_dir: dir.path().join("out"),
        ..RunOptions::default()
    };
    let outcomes = process_script(&script, &options).expect("run");
    let annotated = outcomes[0].annotated.clone().expect("annotated output");
    assert_eq!(annotated, options.output_dir.join("gwasqc_study_annotated.txt"));

    let text = fs::read_to_string(&annotated).expect("read annotation");
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(
        lines,
        [
            "MARKER\tCHR\tPOSITION\tIN\t+/-100",
            "rs1\t1\t100\tNA\tG1",
            "rs2\t1\t200\tG1\tNA",
            "rs3\t2\t300\tNA\tNA",
            "rs4\tX\t400\tNA\tNA",
            "rs2\t1\t250\tNA\tG1",
        ]
    );

    let log = fs::read_to_string(options.output_dir.join("gwasqc_qc.log")).expect("read log");
    assert!(log.contains("Annotation written to"));
}

#[test]
fn run_without_regions_file_skips_annotation() {
    let dir = TempDir::new().expect("tempdir");
    let input = dir.path().join("study.txt");
    fs::write(&input, data()).expect("write input");
    let options = RunOptions {
        output_dir: dir.path().to_path_buf(),
        ..RunOptions::default()
    };
    let outcomes =
        process_descriptors(vec![Descriptor::for_path(&input)], &options).expect("run");
    assert!(outcomes[0].annotated.is_none());
}

#[test]
fn script_without_process_fails() {
    let dir = TempDir::new().expect("tempdir");
    let script = dir.path().join("qc.script");
    fs::write(&script, "MARKER SNP\n").expect("write script");
    assert!(process_script(&script, &RunOptions::default()).is_err());
}
