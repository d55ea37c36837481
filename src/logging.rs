use std::io::Write;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

pub fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("gwasqc=info"));
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(std::io::stderr)
        .try_init();
}

/// Per-run QC log, mirrored to tracing. Lines read `INFO  <message>` or
/// `WARN  [<file>] <message>`.
pub struct QcLog<W: Write> {
    out: W,
    files: usize,
    warnings: usize,
}

impl<W: Write> QcLog<W> {
    pub fn new(out: W, files: usize) -> Result<Self> {
        let mut log = Self {
            out,
            files,
            warnings: 0,
        };
        log.info(&format!("Processing {files} file(s)"), true)?;
        Ok(log)
    }

    pub fn info(&mut self, message: &str, print: bool) -> Result<()> {
        if print {
            info!("{message}");
        }
        writeln!(self.out, "INFO  {message}")?;
        Ok(())
    }

    pub fn warn(&mut self, file: &str, message: &str) -> Result<()> {
        warn!(file, "{message}");
        writeln!(self.out, "WARN  [{file}] {message}")?;
        self.warnings += 1;
        Ok(())
    }

    pub fn warnings(&self) -> usize {
        self.warnings
    }

    pub fn finish(mut self) -> Result<W> {
        let summary = format!(
            "Finished: {} file(s), {} warning(s)",
            self.files, self.warnings
        );
        self.info(&summary, true)?;
        self.out.flush()?;
        Ok(self.out)
    }
}
