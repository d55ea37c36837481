use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Read, Seek, SeekFrom, Write};
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use bzip2::read::BzDecoder;
use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use rand::Rng;
use tempfile::NamedTempFile;

use crate::error::QcError;
use crate::meta::HEAP_SIZE;
use crate::stats;
use crate::types::Separator;

const DETECTION_ROWS: usize = 11;
const ESTIMATE_SAMPLES: usize = 30;
const ESTIMATE_OFFSETS: usize = 15;
/// Data regions up to this size are counted exactly.
const EXACT_COUNT_LIMIT: u64 = 1 << 20;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Codec {
    Plain,
    Gzip,
    Bzip2,
}

pub fn codec_of(path: &Path) -> Codec {
    let ext = path
        .extension()
        .and_then(|s| s.to_str())
        .unwrap_or("")
        .to_ascii_lowercase();
    match ext.as_str() {
        "gz" => Codec::Gzip,
        "bz2" => Codec::Bzip2,
        _ => Codec::Plain,
    }
}

pub fn open_reader(path: &Path) -> Result<Box<dyn BufRead + Send>> {
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let reader: Box<dyn Read + Send> = match codec_of(path) {
        Codec::Gzip => Box::new(MultiGzDecoder::new(file)),
        Codec::Bzip2 => Box::new(BzDecoder::new(file)),
        Codec::Plain => Box::new(file),
    };
    Ok(Box::new(BufReader::new(reader)))
}

/// Line reader that strips line terminators and counts lines.
pub struct LineReader<R> {
    inner: R,
    line: usize,
}

impl<R: BufRead> LineReader<R> {
    pub fn new(inner: R) -> Self {
        Self { inner, line: 0 }
    }

    /// Read the next line into `buf`, without `\n`/`\r\n`. Returns `false` at
    /// end of input.
    pub fn next_line(&mut self, buf: &mut String) -> io::Result<bool> {
        buf.clear();
        if self.inner.read_line(buf)? == 0 {
            return Ok(false);
        }
        self.line += 1;
        if buf.ends_with('\n') {
            buf.pop();
            if buf.ends_with('\r') {
                buf.pop();
            }
        }
        Ok(true)
    }

    /// 1-based number of the line last read.
    pub fn line_number(&self) -> usize {
        self.line
    }
}

/// Split a row on a single character, keeping empty fields.
pub fn split_row(line: &str, separator: Separator) -> std::str::Split<'_, char> {
    line.split(separator.as_char())
}

pub fn read_header(path: &Path, separator: Separator) -> Result<Vec<String>> {
    let mut reader = LineReader::new(open_reader(path)?);
    let mut line = String::new();
    if !reader.next_line(&mut line)? || line.trim().is_empty() {
        return Err(QcError::EmptyHeader {
            file: path.display().to_string(),
        }
        .into());
    }
    Ok(split_row(&line, separator).map(str::to_string).collect())
}

/// Detect `(header, data)` separators from the first lines of a file.
pub fn detect_separators(path: &Path) -> Result<(Separator, Separator)> {
    let mut reader = LineReader::new(open_reader(path)?);
    let mut header = String::new();
    if !reader.next_line(&mut header)? || header.is_empty() {
        return Err(QcError::EmptyHeader {
            file: path.display().to_string(),
        }
        .into());
    }
    let mut rows = Vec::with_capacity(DETECTION_ROWS);
    let mut line = String::new();
    while rows.len() < DETECTION_ROWS && reader.next_line(&mut line)? {
        if !line.is_empty() {
            rows.push(line.clone());
        }
    }
    detect_separators_in(&header, &rows)
        .with_context(|| format!("detect field separators of {}", path.display()))
}

/// A candidate pair matches when the header count of one separator equals
/// the (consistent) row count of another and is positive. Exactly one match
/// is accepted.
pub fn detect_separators_in(
    header: &str,
    rows: &[String],
) -> crate::error::Result<(Separator, Separator)> {
    let count = |line: &str, sep: Separator| line.matches(sep.as_char()).count();
    let header_counts = Separator::ALL.map(|sep| count(header, sep));

    let Some((first, rest)) = rows.split_first() else {
        return Separator::ALL
            .into_iter()
            .zip(header_counts)
            .find(|(_, n)| *n > 0)
            .map(|(sep, _)| (sep, sep))
            .ok_or_else(|| QcError::Parse("no field separator found in the header".to_string()));
    };

    let row_counts = Separator::ALL.map(|sep| {
        let n = count(first, sep);
        rest.iter().all(|row| count(row, sep) == n).then_some(n)
    });

    let mut matches = Vec::new();
    for (h, header_sep) in Separator::ALL.into_iter().enumerate() {
        for (d, data_sep) in Separator::ALL.into_iter().enumerate() {
            if header_counts[h] > 0 && row_counts[d] == Some(header_counts[h]) {
                matches.push((header_sep, data_sep));
            }
        }
    }
    match matches.as_slice() {
        [single] => Ok(*single),
        [] => Err(QcError::Parse(
            "no separator gives the same column count in the header and the rows".to_string(),
        )),
        _ => Err(QcError::Parse(format!(
            "ambiguous field separators: {}",
            matches
                .iter()
                .map(|(h, d)| format!("{h}/{d}"))
                .collect::<Vec<_>>()
                .join(", ")
        ))),
    }
}

pub fn estimate_row_count(path: &Path) -> Result<usize> {
    estimate_row_count_with(path, &mut rand::rng())
}

/// Estimate the number of data rows from the median length of randomly
/// sampled lines. Compressed files cannot be sampled and get [`HEAP_SIZE`].
pub fn estimate_row_count_with<R: Rng + ?Sized>(path: &Path, rng: &mut R) -> Result<usize> {
    if codec_of(path) != Codec::Plain {
        return Ok(HEAP_SIZE);
    }
    let file = File::open(path).with_context(|| format!("open {}", path.display()))?;
    let size = file.metadata()?.len();
    let mut reader = BufReader::new(file);
    let mut line = Vec::new();
    let header_bytes = reader.read_until(b'\n', &mut line)? as u64;
    let data_bytes = size.saturating_sub(header_bytes);
    if data_bytes == 0 {
        return Ok(0);
    }
    if data_bytes <= EXACT_COUNT_LIMIT {
        return count_rows(reader);
    }

    let mut medians = Vec::with_capacity(ESTIMATE_SAMPLES);
    let mut lengths = Vec::with_capacity(ESTIMATE_OFFSETS);
    for _ in 0..ESTIMATE_SAMPLES {
        lengths.clear();
        for _ in 0..ESTIMATE_OFFSETS {
            let offset = rng.random_range(header_bytes..size);
            reader.seek(SeekFrom::Start(offset))?;
            line.clear();
            reader.read_until(b'\n', &mut line)?;
            line.clear();
            let n = reader.read_until(b'\n', &mut line)?;
            if n > 0 {
                lengths.push(n as f64);
            }
        }
        if !lengths.is_empty() {
            stats::sort_samples(&mut lengths);
            medians.push(stats::median_sorted(&lengths));
        }
    }

    if medians.is_empty() {
        reader.seek(SeekFrom::Start(header_bytes))?;
        return count_rows(reader);
    }
    let mean_length = stats::mean(&medians);
    Ok((data_bytes as f64 / mean_length).ceil() as usize)
}

fn count_rows<R: BufRead>(reader: R) -> Result<usize> {
    let mut n = 0;
    for line in reader.split(b'\n') {
        let line = line?;
        if !matches!(line.as_slice(), [] | [b'\r']) {
            n += 1;
        }
    }
    Ok(n)
}

enum Sink {
    Plain(BufWriter<NamedTempFile>),
    Gzip(BufWriter<GzEncoder<NamedTempFile>>),
}

/// Output file written to a temporary file next to its destination and moved
/// into place by [`commit`](AtomicOutput::commit). Dropping it without
/// committing removes the temporary file. Names ending in `.gz` are
/// gzip-compressed.
pub struct AtomicOutput {
    sink: Sink,
    target: PathBuf,
}

impl AtomicOutput {
    pub fn create(path: &Path) -> Result<Self> {
        let dir = match path.parent() {
            Some(parent) if !parent.as_os_str().is_empty() => parent,
            _ => Path::new("."),
        };
        let tmp = NamedTempFile::new_in(dir)
            .with_context(|| format!("create temporary file in {}", dir.display()))?;
        let gzip = path
            .file_name()
            .and_then(|s| s.to_str())
            .is_some_and(|name| name.ends_with(".gz"));
        let sink = if gzip {
            Sink::Gzip(BufWriter::new(GzEncoder::new(tmp, Compression::default())))
        } else {
            Sink::Plain(BufWriter::new(tmp))
        };
        Ok(Self {
            sink,
            target: path.to_path_buf(),
        })
    }

    pub fn path(&self) -> &Path {
        &self.target
    }

    pub fn commit(self) -> Result<()> {
        let tmp = match self.sink {
            Sink::Plain(writer) => writer.into_inner().map_err(|e| e.into_error())?,
            Sink::Gzip(writer) => writer.into_inner().map_err(|e| e.into_error())?.finish()?,
        };
        tmp.persist(&self.target)
            .with_context(|| format!("write {}", self.target.display()))?;
        Ok(())
    }
}

impl Write for AtomicOutput {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match &mut self.sink {
            Sink::Plain(w) => w.write(buf),
            Sink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match &mut self.sink {
            Sink::Plain(w) => w.flush(),
            Sink::Gzip(w) => w.flush(),
        }
    }
}
