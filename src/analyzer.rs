//! Per-file QC session: builds the metas from the header, streams the rows
//! through them and finalizes everything in dependency order.

use std::fs::{self, File};
use std::io::{BufRead, BufWriter};
use std::path::{Path, PathBuf};

use anyhow::Context;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::annotator::{self, AnnotatorConfig};
use crate::dependency::{DependencyResult, DependencyTracker};
use crate::error::{QcError, Result};
use crate::expression::Expression;
use crate::io::{self, AtomicOutput, LineReader};
use crate::logging::QcLog;
use crate::meta::numeric::ReportFlags;
use crate::meta::{
    ColumnMeta, ColumnSet, HEAP_SIZE, MetaCrossTable, MetaFiltered, MetaFormat, MetaGroup, MetaId,
    MetaInfo, MetaNumeric, MetaRatio, MetaRef, MetaUniqueness, RowView,
};
use crate::parallel::{collect_results, resolve_threads, run_in_pool};
use crate::plots::PlotFlags;
use crate::qc::{check_file_exists, validate_descriptor};
use crate::schema::{ColumnMap, Descriptor, REGIONS_FILE, resolve_columns};
use crate::types::{
    ALLELE1, ALLELE2, CALLRATE, CHR, CasePolicy, DEFAULT_PREFIX, DEPENDENCY_PAIRS, EFFECT,
    EFFECT_HQ, EFFECT_SE_RATIO, FREQ_FOLD_THRESHOLD, FREQLABEL, HQ_SNP, HWE_PVAL, IMP,
    IMP_QUALITY, IMPUTATION_CROSS_TABLE, IMPUTED, MAF, MARKER, N_TOTAL, POSITION, PVALUE,
    PVALUE_FROM0TO1, PVALUE_HQ_1, PVALUE_HQ_2, PVALUE_IMP_1, PVALUE_IMP_2, PVALUE_MAF_1,
    PVALUE_MAF_2, STDERR, STRAND, USED_FOR_IMP, full_name,
};
use crate::{plot_utils, report};

const ALL_DATA: &str = "All data";
const UNFILTERED: &str = "Unfiltered";
const CROSS_TABLE_TITLE: &str = "SNPs used for imputation vs. imputed SNPs";

/// Statistics printed for the distribution columns.
const SHAPE_OUTPUT: ReportFlags = ReportFlags {
    min: false,
    max: false,
    median: false,
    skewness: true,
    kurtosis: true,
    quantiles: true,
};

/// Statistics printed for the sample size column.
const RANGE_OUTPUT: ReportFlags = ReportFlags {
    min: true,
    max: true,
    median: true,
    skewness: false,
    kurtosis: false,
    quantiles: false,
};

const HISTOGRAM_ONLY: PlotFlags = PlotFlags {
    histogram: true,
    boxplot: false,
    qqplot: false,
};

/// Finalized results of one input file.
#[derive(Debug)]
pub struct FileReport {
    pub descriptor: Descriptor,
    pub column_map: ColumnMap,
    pub columns: ColumnSet,
    /// Every filtered meta, high-quality column variants first.
    pub filtered: Vec<MetaFiltered>,
    /// `(common name, index into filtered)` of the high-quality variants.
    pub high_quality: Vec<(String, usize)>,
    pub ratio: Option<MetaRatio>,
    pub cross_table: Option<MetaCrossTable>,
    pub dependencies: Vec<DependencyResult>,
    pub rows: usize,
    /// Bytes held by sample buffers after the last row.
    pub memory_usage: usize,
}

impl FileReport {
    pub fn column(&self, common_name: &str) -> Option<&ColumnMeta> {
        self.columns.by_name(common_name)
    }

    pub fn filtered(&self, name: &str) -> Option<&MetaFiltered> {
        self.filtered.iter().find(|f| f.info().common_name == name)
    }

    /// High-quality variant of a numeric column.
    pub fn high_quality(&self, common_name: &str) -> Option<&MetaFiltered> {
        self.high_quality
            .iter()
            .find(|(name, _)| name == common_name)
            .and_then(|&(_, idx)| self.filtered.get(idx))
    }

    /// Inflation factor of the unfiltered p-values, when available.
    pub fn lambda(&self) -> Option<f64> {
        self.filtered(PVALUE_FROM0TO1)
            .filter(|f| f.is_numeric())
            .and_then(|f| f.numeric().lambda())
    }

    pub fn dependency(&self, present: &str, missing: &str) -> Option<&DependencyResult> {
        self.dependencies
            .iter()
            .find(|d| d.present == present && d.missing == missing)
    }
}

fn capacity_of(descriptor: &Descriptor) -> usize {
    match descriptor.estimated_rows {
        Some(n) if n > 0 => n,
        _ => HEAP_SIZE,
    }
}

fn column_meta(
    common: &str,
    actual: &str,
    descriptor: &Descriptor,
    capacity: usize,
) -> Result<ColumnMeta> {
    let na = descriptor.na_marker();
    let mut info = MetaInfo::new(common, actual).with_na_marker(na);
    if let Some(name) = full_name(common) {
        info = info.with_full_name(name);
    }
    let bounds = || descriptor.threshold_pair(common).unwrap_or((f64::MIN, f64::MAX));
    let detailed = descriptor.verbosity >= 2;

    let meta = match common {
        MARKER => ColumnMeta::Uniqueness(MetaUniqueness::new(info, capacity)?),
        ALLELE1 | ALLELE2 => ColumnMeta::Group(MetaGroup::new(info, CasePolicy::Insensitive)),
        CHR | STRAND => ColumnMeta::Group(MetaGroup::new(info, descriptor.case)),
        POSITION => ColumnMeta::Format(MetaFormat::new(info)),
        PVALUE => {
            let (lo, hi) = bounds();
            let mut meta =
                MetaNumeric::implausible_strict(info.with_description(ALL_DATA), lo, hi, capacity)?;
            meta.set_plots(HISTOGRAM_ONLY);
            meta.set_output(SHAPE_OUTPUT);
            ColumnMeta::Numeric(meta)
        }
        EFFECT => {
            let mut meta = MetaNumeric::new(info.with_description(ALL_DATA), capacity)?;
            meta.set_output(SHAPE_OUTPUT);
            ColumnMeta::Numeric(meta)
        }
        STDERR => {
            let (lo, hi) = bounds();
            let mut meta = MetaNumeric::implausible(info, lo, hi, capacity)?;
            meta.set_output(SHAPE_OUTPUT);
            ColumnMeta::Numeric(meta)
        }
        FREQLABEL => {
            let (lo, hi) = bounds();
            let info = info.with_description(actual);
            let mut meta = MetaNumeric::implausible_strict_adjusted(
                info,
                lo,
                hi,
                FREQ_FOLD_THRESHOLD,
                capacity,
            )?;
            meta.set_output(SHAPE_OUTPUT);
            ColumnMeta::Numeric(meta)
        }
        HWE_PVAL | CALLRATE | IMP_QUALITY => {
            let (lo, hi) = bounds();
            let mut meta = MetaNumeric::implausible_strict(info, lo, hi, capacity)?;
            if common != IMP_QUALITY && !detailed {
                meta.set_plots(PlotFlags::NONE);
            }
            meta.set_output(SHAPE_OUTPUT);
            ColumnMeta::Numeric(meta)
        }
        N_TOTAL => {
            let mut meta = MetaNumeric::new(info, capacity)?;
            if !detailed {
                meta.set_plots(HISTOGRAM_ONLY);
            }
            meta.set_output(RANGE_OUTPUT);
            ColumnMeta::Numeric(meta)
        }
        IMPUTED | USED_FOR_IMP => {
            let mut meta = MetaNumeric::new(info, capacity)?;
            if !detailed {
                meta.set_plots(PlotFlags::NONE);
            }
            ColumnMeta::Numeric(meta)
        }
        other => {
            return Err(QcError::InvalidArgument(format!(
                "no accumulator is defined for column {other}"
            )));
        }
    };
    Ok(meta)
}

/// One slot per header column; unrecognised columns get an empty slot.
pub fn build_columns(
    column_map: &ColumnMap,
    descriptor: &Descriptor,
    capacity: usize,
) -> Result<ColumnSet> {
    let mut columns = ColumnSet::new();
    for (header, common) in column_map.headers.iter().zip(&column_map.common) {
        let meta = match common {
            Some(common) => Some(column_meta(common, header.trim(), descriptor, capacity)?),
            None => None,
        };
        columns.push(meta);
    }
    Ok(columns)
}

fn numeric_id(columns: &ColumnSet, common_name: &str) -> Option<MetaId> {
    let id = columns.id_of(common_name)?;
    columns.get(id)?.as_numeric().map(|_| id)
}

fn level(descriptor: &Descriptor, name: &str, index: usize) -> f64 {
    descriptor.thresholds(name).get(index).copied().unwrap_or(0.0)
}

/// Filtered metas and the positions of the high-quality variants.
pub struct FilterSet {
    pub filtered: Vec<MetaFiltered>,
    pub high_quality: Vec<(String, usize)>,
}

pub fn build_filters(
    columns: &ColumnSet,
    descriptor: &Descriptor,
    capacity: usize,
) -> Result<FilterSet> {
    let na = descriptor.na_marker();
    let pvalue = numeric_id(columns, PVALUE);
    let effect = numeric_id(columns, EFFECT);
    let stderr = numeric_id(columns, STDERR);
    let freq = numeric_id(columns, FREQLABEL);
    let imp = numeric_id(columns, IMP_QUALITY);

    let mut filtered = Vec::new();
    let mut high_quality = Vec::new();

    if let (Some(freq), Some(imp), Some(se)) = (freq, imp, stderr) {
        let maf = level(descriptor, HQ_SNP, 0);
        let quality = level(descriptor, HQ_SNP, 1);
        for (id, meta) in columns.iter() {
            if meta.as_numeric().is_none() {
                continue;
            }
            let common = meta.common_name();
            let actual = if common == FREQLABEL { MAF } else { common };
            let mut hq =
                MetaFiltered::new(MetaInfo::new(common, actual).with_na_marker(na), id, capacity)?;
            hq.add_dependency(freq, Expression::Gt(maf));
            hq.add_dependency(imp, Expression::Gt(quality));
            hq.add_dependency(se, Expression::Gt(0.0));
            high_quality.push((common.to_string(), filtered.len()));
            filtered.push(hq);
        }
    }

    let named = |name: &str, source: MetaId| {
        MetaFiltered::new(MetaInfo::new(name, name).with_na_marker(na), source, capacity)
    };

    if let (Some(effect), Some(freq), Some(imp), Some(se)) = (effect, freq, imp, stderr) {
        let (maf, quality) = (level(descriptor, MAF, 0), level(descriptor, IMP, 0));
        let mut meta = named(EFFECT_HQ, effect)?;
        meta.set_plots(PlotFlags {
            histogram: false,
            boxplot: true,
            qqplot: false,
        });
        meta.set_description(format!("MAF > {maf} and IMP > {quality}"));
        meta.add_dependency(freq, Expression::Gt(maf));
        meta.add_dependency(imp, Expression::Gt(quality));
        meta.add_dependency(se, Expression::Gt(0.0));
        filtered.push(meta);
    }

    let qq = PlotFlags {
        histogram: false,
        boxplot: false,
        qqplot: true,
    };

    if let Some(p) = pvalue {
        let mut meta = named(PVALUE_FROM0TO1, p)?;
        meta.set_plots(qq);
        meta.set_description(UNFILTERED);
        meta.set_color("black");
        meta.add_dependency(p, Expression::open_closed(0.0, 1.0));
        filtered.push(meta);
    }

    if let (Some(p), Some(freq), Some(imp), Some(se)) = (pvalue, freq, imp, stderr) {
        for (i, (name, color)) in [(PVALUE_HQ_1, "red"), (PVALUE_HQ_2, "blue")].into_iter().enumerate()
        {
            let (maf, quality) = (level(descriptor, MAF, i), level(descriptor, IMP, i));
            let mut meta = named(name, p)?;
            meta.set_plots(PlotFlags {
                histogram: i == 0,
                boxplot: false,
                qqplot: true,
            });
            meta.set_description(format!("MAF > {maf} and IMP > {quality}"));
            meta.set_color(color);
            meta.add_dependency(freq, Expression::Gt(maf));
            meta.add_dependency(imp, Expression::Gt(quality));
            meta.add_dependency(se, Expression::Gt(0.0));
            filtered.push(meta);
        }
    }

    let single_filters = [
        (freq, MAF, [PVALUE_MAF_1, PVALUE_MAF_2]),
        (imp, IMP, [PVALUE_IMP_1, PVALUE_IMP_2]),
    ];
    for (column, label, names) in single_filters {
        let (Some(p), Some(column), Some(se), Some(effect)) = (pvalue, column, stderr, effect) else {
            continue;
        };
        for (i, (name, color)) in names.into_iter().zip(["red", "blue"]).enumerate() {
            let threshold = level(descriptor, label, i);
            let mut meta = named(name, p)?;
            meta.set_plots(qq);
            meta.set_description(format!("{label} > {threshold}"));
            meta.set_color(color);
            meta.add_dependency(p, Expression::open_closed(0.0, 1.0));
            meta.add_dependency(column, Expression::Gt(threshold));
            meta.add_dependency(se, Expression::Gt(0.0));
            meta.add_presence(effect);
            filtered.push(meta);
        }
    }

    Ok(FilterSet {
        filtered,
        high_quality,
    })
}

fn build_ratio(
    high_quality: &[(String, usize)],
    descriptor: &Descriptor,
    capacity: usize,
) -> Result<Option<MetaRatio>> {
    let find = |name: &str| {
        high_quality
            .iter()
            .find(|(n, _)| n == name)
            .map(|&(_, idx)| MetaRef::Filtered(idx))
    };
    let (Some(effect), Some(se)) = (find(EFFECT), find(STDERR)) else {
        return Ok(None);
    };
    let info =
        MetaInfo::new(EFFECT_SE_RATIO, EFFECT_SE_RATIO).with_na_marker(descriptor.na_marker());
    MetaRatio::new(info, effect, se, capacity).map(Some)
}

fn build_cross_table(columns: &ColumnSet, descriptor: &Descriptor) -> Option<MetaCrossTable> {
    let x = numeric_id(columns, IMPUTED)?;
    let y = numeric_id(columns, USED_FOR_IMP)?;
    let info = MetaInfo::new(IMPUTATION_CROSS_TABLE, IMPUTATION_CROSS_TABLE)
        .with_na_marker(descriptor.na_marker());
    Some(MetaCrossTable::new(
        info,
        CROSS_TABLE_TITLE,
        MetaRef::Column(x),
        MetaRef::Column(y),
    ))
}

/// Run a full QC pass over `reader`. The descriptor must be validated.
pub fn analyze_reader<R: BufRead>(reader: R, descriptor: Descriptor) -> Result<FileReport> {
    let file = descriptor.file_name();
    let (Some(header_sep), Some(data_sep)) = (descriptor.header_separator, descriptor.data_separator)
    else {
        return Err(QcError::InvalidArgument(format!(
            "Field separators of {file} are not resolved"
        )));
    };
    let capacity = capacity_of(&descriptor);

    let mut reader = LineReader::new(reader);
    let mut line = String::new();
    if !reader.next_line(&mut line)? || line.trim().is_empty() {
        return Err(QcError::EmptyHeader { file });
    }
    let headers: Vec<String> = io::split_row(&line, header_sep).map(str::to_string).collect();
    let column_map = resolve_columns(&headers, &descriptor);

    let mut columns = build_columns(&column_map, &descriptor, capacity)?;
    let FilterSet {
        mut filtered,
        high_quality,
    } = build_filters(&columns, &descriptor, capacity)?;
    let mut ratio = build_ratio(&high_quality, &descriptor, capacity)?;
    let mut cross_table = build_cross_table(&columns, &descriptor);
    let mut dependencies = DependencyTracker::from_pairs(&DEPENDENCY_PAIRS, &columns);
    debug!(
        file = %file,
        columns = columns.width(),
        filtered = filtered.len(),
        dependencies = dependencies.len(),
        capacity,
        "metas created"
    );

    let width = columns.width();
    let mut rows = 0;
    while reader.next_line(&mut line)? {
        if line.is_empty() {
            return Err(QcError::EmptyLine {
                file,
                line: reader.line_number(),
            });
        }
        let actual = io::split_row(&line, data_sep).count();
        if actual != width {
            return Err(QcError::MalformedRow {
                file,
                line: reader.line_number(),
                expected: width,
                actual,
            });
        }
        columns.put_row(io::split_row(&line, data_sep))?;
        for meta in filtered.iter_mut() {
            meta.put_row(&columns)?;
        }
        let view = RowView {
            columns: &columns,
            filtered: &filtered,
        };
        if let Some(ratio) = ratio.as_mut() {
            ratio.put_row(&view)?;
        }
        if let Some(table) = cross_table.as_mut() {
            table.put_row(&view);
        }
        dependencies.observe(&columns);
        rows += 1;
    }

    let memory_usage = columns.memory_usage()
        + filtered.iter().map(MetaFiltered::memory_usage).sum::<usize>()
        + ratio.as_ref().map_or(0, MetaRatio::memory_usage);

    columns.finalize();
    for meta in filtered.iter_mut() {
        meta.finalize(&columns);
    }
    let view = RowView {
        columns: &columns,
        filtered: &filtered,
    };
    if let Some(ratio) = ratio.as_mut() {
        ratio.finalize(&view);
    }
    if let Some(table) = cross_table.as_mut() {
        table.finalize(&view);
    }
    let dependencies = dependencies.results(&columns);
    info!(file = %file, rows, memory_usage, "analysis finished");

    Ok(FileReport {
        descriptor,
        column_map,
        columns,
        filtered,
        high_quality,
        ratio,
        cross_table,
        dependencies,
        rows,
        memory_usage,
    })
}

/// Resolve separators and the row estimate, then validate.
pub fn prepare_descriptor(descriptor: &mut Descriptor) -> anyhow::Result<()> {
    check_file_exists(&descriptor.path, "PROCESS")?;
    if descriptor.header_separator.is_none() || descriptor.data_separator.is_none() {
        let (header, data) = io::detect_separators(&descriptor.path)?;
        descriptor.header_separator.get_or_insert(header);
        descriptor.data_separator.get_or_insert(data);
    }
    validate_descriptor(descriptor)
        .with_context(|| format!("validate descriptor of {}", descriptor.path.display()))?;
    if descriptor.estimated_rows.is_none() {
        descriptor.estimated_rows = Some(io::estimate_row_count(&descriptor.path)?);
    }
    Ok(())
}

pub fn analyze_file(mut descriptor: Descriptor) -> anyhow::Result<FileReport> {
    prepare_descriptor(&mut descriptor)?;
    let path = descriptor.path.clone();
    let reader = io::open_reader(&path)?;
    analyze_reader(reader, descriptor).with_context(|| format!("analyze {}", path.display()))
}

#[derive(Debug, Clone)]
pub struct RunOptions {
    pub output_dir: PathBuf,
    pub threads: Option<usize>,
    pub plots: bool,
}

impl Default for RunOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from("."),
            threads: None,
            plots: false,
        }
    }
}

/// What a run wrote for one input file.
#[derive(Debug, Clone)]
pub struct FileOutcome {
    pub input: PathBuf,
    pub report: PathBuf,
    pub plots: Vec<PathBuf>,
    /// Annotated copy of the input, when the script names a regions file.
    pub annotated: Option<PathBuf>,
    pub rows: usize,
    pub lambda: Option<f64>,
    pub messages: Vec<String>,
    pub warnings: Vec<String>,
}

fn process_descriptor(descriptor: Descriptor, options: &RunOptions) -> anyhow::Result<FileOutcome> {
    let report = analyze_file(descriptor)?;
    let name = report.descriptor.output_name();
    let report_path = options.output_dir.join(format!("{name}.txt"));
    let mut out = AtomicOutput::create(&report_path)?;
    report::write_report(&mut out, &report)
        .with_context(|| format!("write {}", report_path.display()))?;
    out.commit()?;

    let plots = if options.plots {
        plot_utils::write_plots(&report, &options.output_dir, &name)?
    } else {
        Vec::new()
    };

    let file = report.descriptor.file_name();
    let mut messages = report.column_map.info.clone();
    messages.push(format!(
        "{file}: {} rows processed, {} bytes of sample memory",
        report.rows, report.memory_usage
    ));

    let annotated = if report.descriptor.property(REGIONS_FILE).is_some() {
        let path = options.output_dir.join(format!("{name}_annotated.txt"));
        let config = AnnotatorConfig::from_descriptor(&report.descriptor, path.clone())?;
        let summary = annotator::annotate(&config)?;
        messages.push(format!(
            "{file}: {} rows annotated, {} markers missing from the map",
            summary.rows_written, summary.unmapped
        ));
        Some(path)
    } else {
        None
    };

    Ok(FileOutcome {
        input: report.descriptor.path.clone(),
        report: report_path,
        plots,
        annotated,
        rows: report.rows,
        lambda: report.lambda(),
        messages,
        warnings: report.column_map.warnings.clone(),
    })
}

pub fn log_path(output_dir: &Path, descriptors: &[Descriptor]) -> PathBuf {
    let prefix = descriptors.first().map_or(DEFAULT_PREFIX, Descriptor::prefix);
    output_dir.join(format!("{prefix}qc.log"))
}

/// Analyse every file of a script, one file per worker.
pub fn process_descriptors(
    descriptors: Vec<Descriptor>,
    options: &RunOptions,
) -> anyhow::Result<Vec<FileOutcome>> {
    fs::create_dir_all(&options.output_dir)
        .with_context(|| format!("create {}", options.output_dir.display()))?;
    let log_file = log_path(&options.output_dir, &descriptors);
    let mut log = QcLog::new(
        BufWriter::new(
            File::create(&log_file).with_context(|| format!("create {}", log_file.display()))?,
        ),
        descriptors.len(),
    )?;
    let files: Vec<String> = descriptors.iter().map(Descriptor::file_name).collect();

    let threads = resolve_threads(options.threads, descriptors.len());
    let results = run_in_pool(threads, || {
        descriptors
            .into_par_iter()
            .map(|descriptor| process_descriptor(descriptor, options))
            .collect::<Vec<_>>()
    })?;

    for (file, result) in files.iter().zip(&results) {
        match result {
            Ok(outcome) => {
                for message in &outcome.messages {
                    log.info(message, true)?;
                }
                for warning in &outcome.warnings {
                    log.warn(file, warning)?;
                }
                if let Some(lambda) = outcome.lambda {
                    log.info(&format!("{file}: lambda {lambda:.4}"), true)?;
                }
                log.info(
                    &format!("Report written to {}", outcome.report.display()),
                    false,
                )?;
                if let Some(annotated) = &outcome.annotated {
                    log.info(
                        &format!("Annotation written to {}", annotated.display()),
                        false,
                    )?;
                }
            }
            Err(err) => log.warn(file, &format!("{err:#}"))?,
        }
    }
    log.finish()?;
    collect_results(results)
}

pub fn process_script(script: &Path, options: &RunOptions) -> anyhow::Result<Vec<FileOutcome>> {
    let descriptors = crate::script::read_script(script)?;
    if descriptors.is_empty() {
        anyhow::bail!("no PROCESS command found in {}", script.display());
    }
    process_descriptors(descriptors, options)
}
