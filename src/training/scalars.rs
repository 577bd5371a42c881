//! Scalar time-series log
//!
//! Appends `tag\tstep\tvalue` rows to a per-run TSV file so training and
//! validation curves can be plotted after the fact.

use std::fs::{self, File};
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use crate::Result;

pub struct ScalarLog {
    writer: BufWriter<File>,
    path: PathBuf,
}

impl ScalarLog {
    /// Create `<dir>/<run_id>.tsv`, creating the directory if needed
    pub fn create(dir: &str, run_id: &str) -> Result<Self> {
        fs::create_dir_all(dir)?;
        let path = Path::new(dir).join(format!("{}.tsv", run_id));
        let file = File::create(&path)?;
        let mut writer = BufWriter::new(file);
        writeln!(writer, "tag\tstep\tvalue")?;
        Ok(ScalarLog { writer, path })
    }

    pub fn write(&mut self, tag: &str, step: usize, value: f64) -> Result<()> {
        writeln!(self.writer, "{}\t{}\t{}", tag, step, value)?;
        Ok(())
    }

    pub fn flush(&mut self) -> Result<()> {
        self.writer.flush()?;
        Ok(())
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}
