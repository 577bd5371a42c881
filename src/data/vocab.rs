//! Token, label, and character vocabularies

use std::collections::HashMap;

/// Index of the out-of-vocabulary token in vocabularies with specials
pub const UNK_IDX: usize = 0;
/// Index of the padding token in vocabularies with specials
pub const PAD_IDX: usize = 1;

/// Lowercase whitespace tokenizer
pub fn tokenize(text: &str) -> Vec<String> {
    text.split_whitespace()
        .map(|t| t.to_lowercase())
        .collect()
}

/// Bidirectional string ↔ index mapping
#[derive(Debug, Clone)]
pub struct Vocab {
    itos: Vec<String>,
    stoi: HashMap<String, usize>,
    has_specials: bool,
}

impl Vocab {
    /// Build a vocabulary from a token stream with `<unk>`/`<pad>` specials.
    ///
    /// Tokens are ordered by descending frequency (ties broken
    /// alphabetically) and filtered by `min_freq`.
    pub fn build<'a, I: IntoIterator<Item = &'a str>>(tokens: I, min_freq: usize) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for token in tokens {
            *counts.entry(token.to_string()).or_insert(0) += 1;
        }

        let mut ordered: Vec<(String, usize)> = counts
            .into_iter()
            .filter(|(_, count)| *count >= min_freq)
            .collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        let mut itos = vec!["<unk>".to_string(), "<pad>".to_string()];
        itos.extend(ordered.into_iter().map(|(token, _)| token));

        Self::from_itos(itos, true)
    }

    /// Build a label vocabulary (no specials) from a label stream,
    /// ordered by descending frequency.
    pub fn of_labels<'a, I: IntoIterator<Item = &'a str>>(labels: I) -> Self {
        let mut counts: HashMap<String, usize> = HashMap::new();
        for label in labels {
            *counts.entry(label.to_string()).or_insert(0) += 1;
        }

        let mut ordered: Vec<(String, usize)> = counts.into_iter().collect();
        ordered.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));

        Self::from_itos(ordered.into_iter().map(|(l, _)| l).collect(), false)
    }

    /// Build from a fixed list of entries in index order (e.g. an external
    /// vocabulary file, one token per line).
    pub fn from_lines<'a, I: IntoIterator<Item = &'a str>>(lines: I) -> Self {
        let itos: Vec<String> = lines
            .into_iter()
            .map(|l| l.trim().to_string())
            .filter(|l| !l.is_empty())
            .collect();
        Self::from_itos(itos, false)
    }

    fn from_itos(itos: Vec<String>, has_specials: bool) -> Self {
        let stoi = itos
            .iter()
            .enumerate()
            .map(|(idx, token)| (token.clone(), idx))
            .collect();
        Vocab {
            itos,
            stoi,
            has_specials,
        }
    }

    /// Look up a token index, falling back to `<unk>` for unknown tokens.
    /// Vocabularies without specials return None for unknown entries.
    pub fn lookup(&self, token: &str) -> Option<usize> {
        match self.stoi.get(token) {
            Some(idx) => Some(*idx),
            None if self.has_specials => Some(UNK_IDX),
            None => None,
        }
    }

    /// Whether the exact token is present (no `<unk>` fallback)
    pub fn contains(&self, token: &str) -> bool {
        self.stoi.contains_key(token)
    }

    /// Token string at an index
    pub fn token(&self, idx: usize) -> Option<&str> {
        self.itos.get(idx).map(|s| s.as_str())
    }

    pub fn len(&self) -> usize {
        self.itos.len()
    }

    pub fn is_empty(&self) -> bool {
        self.itos.is_empty()
    }

    /// All entries in index order
    pub fn entries(&self) -> &[String] {
        &self.itos
    }
}

/// Character vocabulary plus the longest token length seen in training,
/// used to size character index rows.
#[derive(Debug, Clone)]
pub struct CharVocab {
    vocab: Vocab,
    pub max_word_len: usize,
}

impl CharVocab {
    /// Build from a token stream; every character of every token is indexed.
    pub fn build<'a, I: IntoIterator<Item = &'a str>>(tokens: I) -> Self {
        let mut chars: Vec<String> = Vec::new();
        let mut max_word_len = 1;
        for token in tokens {
            max_word_len = max_word_len.max(token.chars().count());
            for c in token.chars() {
                chars.push(c.to_string());
            }
        }
        let vocab = Vocab::build(chars.iter().map(|c| c.as_str()), 1);
        CharVocab {
            vocab,
            max_word_len,
        }
    }

    /// Map a token to a fixed-width row of character indices, padded with
    /// `<pad>` and truncated to `max_word_len`.
    pub fn characterize(&self, token: &str) -> Vec<usize> {
        let mut row: Vec<usize> = token
            .chars()
            .take(self.max_word_len)
            .map(|c| self.vocab.lookup(&c.to_string()).unwrap_or(UNK_IDX))
            .collect();
        row.resize(self.max_word_len, PAD_IDX);
        row
    }

    pub fn len(&self) -> usize {
        self.vocab.len()
    }

    pub fn is_empty(&self) -> bool {
        self.vocab.is_empty()
    }
}
