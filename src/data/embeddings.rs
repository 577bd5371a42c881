//! Pretrained embedding alignment
//!
//! One-shot offline transforms that map pretrained word vectors into the
//! run's vocabulary index space. Row i of the output matrix corresponds to
//! vocabulary token i; tokens missing from the source fall back to the
//! out-of-vocabulary vector at index 0.

use std::fs::File;
use std::io::{BufRead, BufReader, BufWriter, Write};

use crate::data::vocab::{Vocab, UNK_IDX};
use crate::{EmoError, Result};

/// Align a source matrix indexed by its own vocabulary file.
///
/// Tokens missing from the source vocabulary take the source vector at
/// index 0.
pub fn align_indexed(vocab: &Vocab, source_vocab: &Vocab, source: &[Vec<f32>]) -> Vec<Vec<f32>> {
    let dim = source.first().map(|v| v.len()).unwrap_or(0);
    let fallback = source.first().cloned().unwrap_or_else(|| vec![0.0; dim]);

    vocab
        .entries()
        .iter()
        .map(|token| {
            source_vocab
                .lookup(token)
                .and_then(|idx| source.get(idx))
                .cloned()
                .unwrap_or_else(|| fallback.clone())
        })
        .collect()
}

/// Align a raw text embedding file (`word v1 v2 ...` per line).
///
/// Malformed lines are skipped; tokens absent from the file take the vector
/// assigned to index 0 (the `<unk>` row), which defaults to zeros.
pub fn align_text<R: BufRead>(vocab: &Vocab, reader: R) -> Result<Vec<Vec<f32>>> {
    let mut found: std::collections::HashMap<String, Vec<f32>> = std::collections::HashMap::new();
    // Fixed by the first accepted vector; rows of any other width are skipped
    let mut dim: Option<usize> = None;

    for line in reader.lines() {
        let line = line?;
        let mut parts = line.split_whitespace();
        let word = match parts.next() {
            Some(w) => w,
            None => continue,
        };
        if !vocab.contains(word) {
            continue;
        }
        let values: std::result::Result<Vec<f32>, _> = parts.map(|v| v.parse::<f32>()).collect();
        match values {
            Ok(values) if !values.is_empty() => {
                match dim {
                    None => dim = Some(values.len()),
                    Some(d) if values.len() != d => continue,
                    Some(_) => {}
                }
                found.insert(word.to_string(), values);
            }
            _ => continue,
        }
    }

    log::info!("Found {} pretrained word vectors", found.len());

    let fallback = found
        .get(vocab.token(UNK_IDX).unwrap_or("<unk>"))
        .cloned()
        .unwrap_or_else(|| vec![0.0; dim.unwrap_or(0)]);

    Ok(vocab
        .entries()
        .iter()
        .map(|token| found.get(token).cloned().unwrap_or_else(|| fallback.clone()))
        .collect())
}

/// Check that a loaded matrix matches the expected vocabulary size and
/// embedding dimension before it reaches a tensor reshape.
pub fn check_shape(matrix: &[Vec<f32>], rows: usize, dim: usize) -> Result<()> {
    if matrix.len() != rows {
        return Err(EmoError::Config(format!(
            "Pretrained matrix has {} rows but the vocabulary has {}. \
             Re-run 'emo embed' against the current training data.",
            matrix.len(),
            rows
        )));
    }
    let width = matrix.first().map(|r| r.len()).unwrap_or(0);
    if width != dim || matrix.iter().any(|r| r.len() != width) {
        return Err(EmoError::Config(format!(
            "Pretrained matrix has {}-dimensional rows but embed_dim is {}.",
            width, dim
        )));
    }
    Ok(())
}

/// Read a whitespace-separated float matrix, one row per line
pub fn load_matrix(path: &str) -> Result<Vec<Vec<f32>>> {
    let file = File::open(path)
        .map_err(|e| EmoError::Parse(format!("Failed to open embedding file {}: {}", path, e)))?;
    let mut matrix = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line?;
        if line.trim().is_empty() {
            continue;
        }
        let row: std::result::Result<Vec<f32>, _> =
            line.split_whitespace().map(|v| v.parse::<f32>()).collect();
        match row {
            Ok(row) => matrix.push(row),
            Err(e) => {
                return Err(EmoError::Parse(format!(
                    "Malformed embedding row in {}: {}",
                    path, e
                )))
            }
        }
    }
    Ok(matrix)
}

/// Write a matrix as whitespace-separated floats, one row per line
pub fn save_matrix(path: &str, matrix: &[Vec<f32>]) -> Result<()> {
    let file = File::create(path)?;
    let mut writer = BufWriter::new(file);
    for row in matrix {
        let line: Vec<String> = row.iter().map(|v| v.to_string()).collect();
        writeln!(writer, "{}", line.join(" "))?;
    }
    Ok(())
}

/// Read an external vocabulary file, one token per line
pub fn load_vocab_file(path: &str) -> Result<Vocab> {
    let content = std::fs::read_to_string(path)
        .map_err(|e| EmoError::Parse(format!("Failed to open vocab file {}: {}", path, e)))?;
    Ok(Vocab::from_lines(content.lines()))
}
