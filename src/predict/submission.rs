//! Submission file generation
//!
//! Joins predicted labels with the unlabeled test file by row order and
//! writes the tab-separated submission format.

use std::fs::{self, File};
use std::io::{BufRead, BufReader, BufWriter, Write};
use std::path::Path;

use crate::{EmoError, Result};

const HEADER: &str = "id\tturn1\tturn2\tturn3\tlabel";

/// Write a submission by joining `labels` with the test file rows in order.
///
/// The input header and blank lines are skipped; every remaining row gets
/// exactly one label. A count mismatch aborts without writing anything.
pub fn write_submission<R: BufRead, W: Write>(
    input: R,
    labels: &[String],
    output: &mut W,
) -> Result<()> {
    let mut rows: Vec<String> = Vec::new();
    for (line_num, line) in input.lines().enumerate() {
        let line = line?;
        if line_num == 0 || line.trim().is_empty() {
            continue;
        }
        rows.push(line);
    }

    if rows.len() != labels.len() {
        return Err(EmoError::SubmissionMismatch {
            predictions: labels.len(),
            rows: rows.len(),
        });
    }

    writeln!(output, "{}", HEADER)?;
    for (row, label) in rows.iter().zip(labels.iter()) {
        let fields: Vec<&str> = row.split('\t').collect();
        if fields.len() < 4 {
            return Err(EmoError::Parse(format!(
                "test row has {} tab-separated fields, expected at least 4",
                fields.len()
            )));
        }
        writeln!(
            output,
            "{}\t{}\t{}\t{}\t{}",
            fields[0], fields[1], fields[2], fields[3], label
        )?;
    }

    Ok(())
}

/// Join labels with the test file at `test_path` and write the submission
/// to `out_path`, creating parent directories as needed.
pub fn write_submission_file(test_path: &str, labels: &[String], out_path: &str) -> Result<()> {
    let input = File::open(test_path)
        .map_err(|e| EmoError::Parse(format!("Failed to open {}: {}", test_path, e)))?;

    if let Some(parent) = Path::new(out_path).parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }

    let mut output = BufWriter::new(File::create(out_path)?);
    write_submission(BufReader::new(input), labels, &mut output)?;
    output.flush()?;
    Ok(())
}
