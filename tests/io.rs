use std::fs::{self, File};
use std::io::{BufRead, Cursor, Write};

use bzip2::Compression as BzCompression;
use bzip2::write::BzEncoder;
use gwasqc::io::{
    AtomicOutput, Codec, LineReader, codec_of, detect_separators, detect_separators_in,
    estimate_row_count, open_reader, read_header,
};
use gwasqc::meta::HEAP_SIZE;
use gwasqc::types::Separator;
use tempfile::TempDir;

fn rows(lines: &[&str]) -> Vec<String> {
    lines.iter().map(|s| s.to_string()).collect()
}

#[test]
fn detects_tab_and_comma() {
    let tab = detect_separators_in("A\tB\tC", &rows(&["1\t2\t3", "4\t5\t6"])).expect("tab");
    assert_eq!(tab, (Separator::Tab, Separator::Tab));
    let comma = detect_separators_in("A,B", &rows(&["1,2"])).expect("comma");
    assert_eq!(comma, (Separator::Comma, Separator::Comma));
}

#[test]
fn header_and_data_may_differ() {
    let pair = detect_separators_in("A B C", &rows(&["1\t2\t3"])).expect("mixed");
    assert_eq!(pair, (Separator::Whitespace, Separator::Tab));
}

#[test]
fn inconsistent_or_ambiguous_separators_fail() {
    assert!(detect_separators_in("A\tB", &rows(&["1\t2", "1\t2\t3"])).is_err());
    assert!(detect_separators_in("A,B;C", &rows(&["1,2;3"])).is_err());
    assert!(detect_separators_in("AB", &rows(&["1"])).is_err());
}

#[test]
fn header_only_uses_header_separator() {
    let pair = detect_separators_in("A;B", &[]).expect("header only");
    assert_eq!(pair, (Separator::Semicolon, Separator::Semicolon));
}

#[test]
fn line_reader_strips_terminators() {
    let mut reader = LineReader::new(Cursor::new("a\r\nb\n\nc"));
    let mut line = String::new();
    let mut seen = Vec::new();
    while reader.next_line(&mut line).expect("read") {
        seen.push(line.clone());
    }
    assert_eq!(seen, ["a", "b", "", "c"]);
    assert_eq!(reader.line_number(), 4);
}

#[test]
fn codec_follows_extension() {
    assert_eq!(codec_of("a.txt".as_ref()), Codec::Plain);
    assert_eq!(codec_of("a.txt.GZ".as_ref()), Codec::Gzip);
    assert_eq!(codec_of("a.bz2".as_ref()), Codec::Bzip2);
}

#[test]
fn small_files_are_counted_exactly() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("data.txt");
    fs::write(&path, "A\tB\n1\t2\n3\t4\r\n\n5\t6\n").expect("write");
    assert_eq!(estimate_row_count(&path).expect("estimate"), 3);

    let header_only = dir.path().join("header.txt");
    fs::write(&header_only, "A\tB\n").expect("write");
    assert_eq!(estimate_row_count(&header_only).expect("estimate"), 0);
}

#[test]
fn large_files_are_estimated() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("large.txt");
    let mut file = File::create(&path).expect("create");
    writeln!(file, "MARKER\tPVALUE").expect("header");
    let n = 120_000;
    for i in 0..n {
        writeln!(file, "rs{:07}\t0.500000", i).expect("row");
    }
    drop(file);
    let estimate = estimate_row_count(&path).expect("estimate");
    let error = (estimate as f64 - n as f64).abs() / n as f64;
    assert!(error < 0.01, "estimate {estimate}");
}

#[test]
fn compressed_round_trip() {
    let dir = TempDir::new().expect("tempdir");
    let gz = dir.path().join("data.txt.gz");
    let mut out = AtomicOutput::create(&gz).expect("create");
    writeln!(out, "A,B").expect("write");
    writeln!(out, "1,2").expect("write");
    assert!(!gz.exists());
    out.commit().expect("commit");

    let lines: Vec<String> = open_reader(&gz)
        .expect("open")
        .lines()
        .collect::<Result<_, _>>()
        .expect("read");
    assert_eq!(lines, ["A,B", "1,2"]);
    assert_eq!(
        detect_separators(&gz).expect("detect"),
        (Separator::Comma, Separator::Comma)
    );
    assert_eq!(estimate_row_count(&gz).expect("estimate"), HEAP_SIZE);

    let bz = dir.path().join("data.txt.bz2");
    let mut encoder = BzEncoder::new(File::create(&bz).expect("create"), BzCompression::default());
    encoder.write_all(b"X;Y\n1;2\n").expect("write");
    encoder.finish().expect("finish");
    assert_eq!(read_header(&bz, Separator::Semicolon).expect("header"), ["X", "Y"]);
}

#[test]
fn uncommitted_output_leaves_nothing() {
    let dir = TempDir::new().expect("tempdir");
    let path = dir.path().join("report.txt");
    {
        let mut out = AtomicOutput::create(&path).expect("create");
        writeln!(out, "partial").expect("write");
    }
    assert!(!path.exists());
    assert_eq!(fs::read_dir(dir.path()).expect("list").count(), 0);
}
