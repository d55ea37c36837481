use std::path::PathBuf;

use clap::{Parser, Subcommand};

use gwasqc::analyzer::{RunOptions, process_script};
use gwasqc::annotator::{AnnotateOptions, AnnotatorConfig, MapColumns, RegionColumns, annotate};
use gwasqc::formatter::{FormatOptions, FormatterConfig, format_file};
use gwasqc::logging::init_tracing;
use gwasqc::nearest::{
    NearestConfig, NearestOptions, RegionMarkersConfig, RegionMarkersOptions, nearest_regions,
    region_markers,
};
use gwasqc::types::{
    CHR, CasePolicy, DEFAULT_MISSING, IMP_QUALITY, MAP_CHR, MAP_MARKER, MAP_POSITION, MARKER,
    N_TOTAL, POSITION, PVALUE, REGION_CHR, REGION_END, REGION_NAME, REGION_START, STDERR,
    Separator,
};

#[derive(Parser)]
#[command(name = "gwasqc")]
#[command(
    about = "Quality control, formatting and region annotation of GWAS summary statistics",
    long_about = None
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Run QC on every file listed in a descriptor script.
    Qc {
        #[arg(long, required = true)]
        script: PathBuf,
        #[arg(long, default_value = ".")]
        output_dir: PathBuf,
        #[arg(long)]
        threads: Option<usize>,
        #[arg(long)]
        plots: bool,
    },
    /// Add region columns, one per deviation tier.
    Annotate {
        #[arg(long, required = true)]
        input: PathBuf,
        #[arg(long, required = true)]
        output: PathBuf,
        #[arg(long, required = true)]
        regions: PathBuf,
        #[arg(long)]
        map: Option<PathBuf>,
        #[arg(long = "deviation", num_args = 1.., default_values_t = [0u64])]
        deviations: Vec<u64>,
        #[arg(long, default_value = MARKER)]
        marker: String,
        #[arg(long, default_value = CHR)]
        chr: String,
        #[arg(long, default_value = POSITION)]
        position: String,
        #[arg(long, default_value = REGION_NAME)]
        region_name: String,
        #[arg(long, default_value = REGION_CHR)]
        region_chr: String,
        #[arg(long, default_value = REGION_START)]
        region_start: String,
        #[arg(long, default_value = REGION_END)]
        region_end: String,
        #[arg(long, default_value = MAP_MARKER)]
        map_marker: String,
        #[arg(long, default_value = MAP_CHR)]
        map_chr: String,
        #[arg(long, default_value = MAP_POSITION)]
        map_position: String,
        /// Field separator of the input: COMMA, TAB, WHITESPACE or SEMICOLON.
        #[arg(long)]
        separator: Option<String>,
        #[arg(long, default_value = DEFAULT_MISSING)]
        missing: String,
        #[arg(long)]
        case_sensitive: bool,
        /// Keep every input column.
        #[arg(long)]
        append: bool,
    },
    /// List the k nearest regions of every marker.
    Nearest {
        #[arg(long, required = true)]
        input: PathBuf,
        #[arg(long, required = true)]
        output: PathBuf,
        #[arg(long, required = true)]
        regions: PathBuf,
        #[arg(short, long, default_value_t = 1)]
        k: usize,
        #[arg(long, default_value = MARKER)]
        marker: String,
        #[arg(long, default_value = CHR)]
        chr: String,
        #[arg(long, default_value = POSITION)]
        position: String,
        #[arg(long, default_value = REGION_NAME)]
        region_name: String,
        #[arg(long, default_value = REGION_CHR)]
        region_chr: String,
        #[arg(long, default_value = REGION_START)]
        region_start: String,
        #[arg(long, default_value = REGION_END)]
        region_end: String,
        #[arg(long)]
        separator: Option<String>,
        #[arg(long, default_value = DEFAULT_MISSING)]
        missing: String,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(long)]
        append: bool,
    },
    /// List the markers inside every region.
    RegionMarkers {
        #[arg(long, required = true)]
        regions: PathBuf,
        /// Marker file with marker, chromosome and position columns.
        #[arg(long, required = true)]
        markers: PathBuf,
        #[arg(long, required = true)]
        output: PathBuf,
        #[arg(long, default_value = REGION_NAME)]
        region_name: String,
        #[arg(long, default_value = REGION_CHR)]
        region_chr: String,
        #[arg(long, default_value = REGION_START)]
        region_start: String,
        #[arg(long, default_value = REGION_END)]
        region_end: String,
        #[arg(long, default_value = MAP_MARKER)]
        marker: String,
        #[arg(long, default_value = MAP_CHR)]
        chr: String,
        #[arg(long, default_value = MAP_POSITION)]
        position: String,
        #[arg(long)]
        case_sensitive: bool,
        #[arg(long)]
        append: bool,
    },
    /// Append genomic-control adjusted columns.
    Format {
        #[arg(long, required = true)]
        input: PathBuf,
        #[arg(long, required = true)]
        output: PathBuf,
        #[arg(long, required = true)]
        lambda: f64,
        #[arg(long, default_value = PVALUE)]
        pvalue: String,
        #[arg(long, default_value = STDERR)]
        stderr: String,
        #[arg(long, default_value = N_TOTAL)]
        n_total: String,
        #[arg(long, default_value = IMP_QUALITY)]
        imp_quality: String,
        #[arg(long)]
        separator: Option<String>,
        #[arg(long, default_value = DEFAULT_MISSING)]
        missing: String,
        #[arg(long)]
        case_sensitive: bool,
    },
}

fn parse_separator(name: Option<String>) -> anyhow::Result<Option<Separator>> {
    name.map(|name| {
        Separator::from_name(&name).ok_or_else(|| anyhow::anyhow!("unknown separator '{name}'"))
    })
    .transpose()
}

fn main() -> anyhow::Result<()> {
    init_tracing();
    let cli = Cli::parse();

    match cli.command {
        Command::Qc {
            script,
            output_dir,
            threads,
            plots,
        } => {
            let options = RunOptions {
                output_dir,
                threads,
                plots,
            };
            let outcomes = process_script(&script, &options)?;
            for outcome in outcomes {
                println!("{}", outcome.report.display());
            }
        }
        Command::Annotate {
            input,
            output,
            regions,
            map,
            deviations,
            marker,
            chr,
            position,
            region_name,
            region_chr,
            region_start,
            region_end,
            map_marker,
            map_chr,
            map_position,
            separator,
            missing,
            case_sensitive,
            append,
        } => {
            let config = AnnotatorConfig {
                input,
                output,
                regions,
                map,
                separator: parse_separator(separator)?,
                regions_separator: None,
                map_separator: None,
                region_columns: RegionColumns {
                    name: region_name,
                    chr: region_chr,
                    start: region_start,
                    end: region_end,
                },
                options: AnnotateOptions {
                    marker,
                    chr,
                    position,
                    deviations,
                    na_marker: missing,
                    case: CasePolicy::from_flag(case_sensitive),
                    append,
                    map_columns: MapColumns {
                        marker: map_marker,
                        chr: map_chr,
                        position: map_position,
                    },
                },
            };
            let summary = annotate(&config)?;
            println!(
                "{} rows read, {} rows written, {} unmapped",
                summary.rows_read, summary.rows_written, summary.unmapped
            );
        }
        Command::Nearest {
            input,
            output,
            regions,
            k,
            marker,
            chr,
            position,
            region_name,
            region_chr,
            region_start,
            region_end,
            separator,
            missing,
            case_sensitive,
            append,
        } => {
            let config = NearestConfig {
                input,
                output,
                regions,
                separator: parse_separator(separator)?,
                regions_separator: None,
                region_columns: RegionColumns {
                    name: region_name,
                    chr: region_chr,
                    start: region_start,
                    end: region_end,
                },
                options: NearestOptions {
                    marker,
                    chr,
                    position,
                    k,
                    na_marker: missing,
                    case: CasePolicy::from_flag(case_sensitive),
                    append,
                },
            };
            let summary = nearest_regions(&config)?;
            println!(
                "{} rows read, {} rows written, {} without regions",
                summary.rows_read, summary.rows_written, summary.unmatched
            );
        }
        Command::RegionMarkers {
            regions,
            markers,
            output,
            region_name,
            region_chr,
            region_start,
            region_end,
            marker,
            chr,
            position,
            case_sensitive,
            append,
        } => {
            let config = RegionMarkersConfig {
                regions,
                markers,
                output,
                regions_separator: None,
                markers_separator: None,
                marker_columns: MapColumns {
                    marker,
                    chr,
                    position,
                },
                options: RegionMarkersOptions {
                    columns: RegionColumns {
                        name: region_name,
                        chr: region_chr,
                        start: region_start,
                        end: region_end,
                    },
                    case: CasePolicy::from_flag(case_sensitive),
                    append,
                },
            };
            let summary = region_markers(&config)?;
            println!(
                "{} regions read, {} rows written, {} without markers",
                summary.rows_read, summary.rows_written, summary.unmatched
            );
        }
        Command::Format {
            input,
            output,
            lambda,
            pvalue,
            stderr,
            n_total,
            imp_quality,
            separator,
            missing,
            case_sensitive,
        } => {
            let config = FormatterConfig {
                input,
                output,
                separator: parse_separator(separator)?,
                options: FormatOptions {
                    pvalue,
                    stderr,
                    n_total,
                    imp_quality,
                    lambda,
                    na_marker: missing,
                    case: CasePolicy::from_flag(case_sensitive),
                },
            };
            let rows = format_file(&config)?;
            println!("{rows} rows written to {}", config.output.display());
        }
    }

    Ok(())
}
