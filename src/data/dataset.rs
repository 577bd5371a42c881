//! EmoContext dataset and batching
//!
//! Parses the tab-separated conversation files, numericalizes them against
//! the vocabularies, and packs them into tensors for the model variants.

use std::fs::File;
use std::io::{BufRead, BufReader};

use burn::data::dataset::Dataset;
use burn::tensor::backend::Backend;
use burn::tensor::{Bool, Int, Tensor, TensorData};

use crate::data::vocab::{tokenize, CharVocab, Vocab, PAD_IDX};
use crate::{ArchKind, Config, EmoError, Result};

/// One row of an EmoContext file
#[derive(Debug, Clone)]
pub struct ConversationRecord {
    pub id: String,
    pub turns: [String; 3],
    pub label: Option<String>,
}

impl ConversationRecord {
    /// Parse a tab-separated line: `id\tturn1\tturn2\tturn3[\tlabel]`
    pub fn parse_line(line: &str, labeled: bool, line_num: usize) -> Result<Self> {
        let fields: Vec<&str> = line.split('\t').collect();
        let required = if labeled { 5 } else { 4 };
        if fields.len() < required {
            return Err(EmoError::Parse(format!(
                "line {}: expected {} tab-separated fields, got {}",
                line_num,
                required,
                fields.len()
            )));
        }

        Ok(ConversationRecord {
            id: fields[0].to_string(),
            turns: [
                fields[1].to_string(),
                fields[2].to_string(),
                fields[3].to_string(),
            ],
            label: if labeled {
                Some(fields[4].trim().to_string())
            } else {
                None
            },
        })
    }
}

/// Read all records from a reader, skipping the header line
pub fn read_records<R: BufRead>(reader: R, labeled: bool) -> Result<Vec<ConversationRecord>> {
    let mut records = Vec::new();
    for (line_num, line) in reader.lines().enumerate() {
        let line = line?;
        if line_num == 0 || line.trim().is_empty() {
            continue;
        }
        records.push(ConversationRecord::parse_line(&line, labeled, line_num)?);
    }
    Ok(records)
}

fn read_records_from_path(path: &str, labeled: bool) -> Result<Vec<ConversationRecord>> {
    let file = File::open(path)
        .map_err(|e| EmoError::Parse(format!("Failed to open {}: {}", path, e)))?;
    read_records(BufReader::new(file), labeled)
}

/// A numericalized conversation
#[derive(Debug, Clone)]
pub struct ConversationSample {
    /// Token indices per turn (never empty; empty turns hold one pad index)
    pub turn_ids: [Vec<usize>; 3],
    /// Character index rows per token, aligned with `turn_ids`
    pub turn_chars: [Vec<Vec<usize>>; 3],
    /// Label index; absent for the unlabeled test split
    pub label: Option<usize>,
}

/// In-memory dataset of numericalized conversations
#[derive(Debug, Clone, Default)]
pub struct EmoDataset {
    samples: Vec<ConversationSample>,
}

impl EmoDataset {
    pub fn new(samples: Vec<ConversationSample>) -> Self {
        EmoDataset { samples }
    }

    pub fn samples(&self) -> &[ConversationSample] {
        &self.samples
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl Dataset<ConversationSample> for EmoDataset {
    fn get(&self, index: usize) -> Option<ConversationSample> {
        self.samples.get(index).cloned()
    }

    fn len(&self) -> usize {
        self.samples.len()
    }
}

/// Vocabularies plus the train/validation datasets, built once per run
#[derive(Debug, Clone)]
pub struct EmoData {
    pub text_vocab: Vocab,
    pub label_vocab: Vocab,
    pub char_vocab: CharVocab,
    pub train: EmoDataset,
    pub val: EmoDataset,
}

impl EmoData {
    /// Load training and validation files and build all vocabularies
    /// from the training split.
    pub fn load(config: &Config) -> Result<Self> {
        let train_records = read_records_from_path(&config.data.train_path, true)?;
        let val_records = read_records_from_path(&config.data.val_path, true)?;
        Self::from_records(train_records, val_records, config.data.min_freq)
    }

    /// Build from pre-parsed records (vocabularies from the training split)
    pub fn from_records(
        train_records: Vec<ConversationRecord>,
        val_records: Vec<ConversationRecord>,
        min_freq: usize,
    ) -> Result<Self> {
        let mut tokens: Vec<String> = Vec::new();
        let mut labels: Vec<String> = Vec::new();
        for record in &train_records {
            for turn in &record.turns {
                tokens.extend(tokenize(turn));
            }
            if let Some(label) = &record.label {
                labels.push(label.clone());
            }
        }

        let text_vocab = Vocab::build(tokens.iter().map(|t| t.as_str()), min_freq);
        let label_vocab = Vocab::of_labels(labels.iter().map(|l| l.as_str()));
        let char_vocab = CharVocab::build(tokens.iter().map(|t| t.as_str()));

        let data = EmoData {
            text_vocab,
            label_vocab,
            char_vocab,
            train: EmoDataset::default(),
            val: EmoDataset::default(),
        };

        let train = data.numericalize_all(&train_records)?;
        let val = data.numericalize_all(&val_records)?;

        Ok(EmoData {
            train: EmoDataset::new(train),
            val: EmoDataset::new(val),
            ..data
        })
    }

    /// Load the unlabeled test file, keeping the raw records for the
    /// submission join.
    pub fn load_test(&self, path: &str) -> Result<(Vec<ConversationRecord>, EmoDataset)> {
        let records = read_records_from_path(path, false)?;
        let samples = self.numericalize_all(&records)?;
        Ok((records, EmoDataset::new(samples)))
    }

    /// Numericalize one record against the run vocabularies
    pub fn numericalize(&self, record: &ConversationRecord) -> Result<ConversationSample> {
        let mut turn_ids: [Vec<usize>; 3] = Default::default();
        let mut turn_chars: [Vec<Vec<usize>>; 3] = Default::default();

        for (i, turn) in record.turns.iter().enumerate() {
            let tokens = tokenize(turn);
            let mut ids: Vec<usize> = tokens
                .iter()
                .map(|t| self.text_vocab.lookup(t).unwrap_or(PAD_IDX))
                .collect();
            let mut chars: Vec<Vec<usize>> = tokens
                .iter()
                .map(|t| self.char_vocab.characterize(t))
                .collect();

            // Empty turns still need one position so sequence tensors are
            // never zero-width.
            if ids.is_empty() {
                ids.push(PAD_IDX);
                chars.push(vec![PAD_IDX; self.char_vocab.max_word_len]);
            }

            turn_ids[i] = ids;
            turn_chars[i] = chars;
        }

        let label = match &record.label {
            Some(label) => Some(
                self.label_vocab
                    .lookup(label)
                    .ok_or_else(|| EmoError::UnknownLabel(label.clone()))?,
            ),
            None => None,
        };

        Ok(ConversationSample {
            turn_ids,
            turn_chars,
            label,
        })
    }

    fn numericalize_all(&self, records: &[ConversationRecord]) -> Result<Vec<ConversationSample>> {
        records.iter().map(|r| self.numericalize(r)).collect()
    }

    /// Index of the majority class in the label vocabulary, if present
    pub fn others_idx(&self, others_label: &str) -> Option<usize> {
        self.label_vocab.lookup(others_label)
    }

    pub fn class_count(&self) -> usize {
        self.label_vocab.len()
    }

    pub fn vocab_size(&self) -> usize {
        self.text_vocab.len()
    }
}

/// Padded token/mask tensors for one token sequence per batch row
#[derive(Debug, Clone)]
pub struct SeqTensors<B: Backend> {
    /// Token indices: [batch, seq_len]
    pub tokens: Tensor<B, 2, Int>,
    /// Padding mask (true = padding): [batch, seq_len]
    pub pad_mask: Tensor<B, 2, Bool>,
    /// Character indices: [batch, seq_len, max_word_len]
    pub chars: Option<Tensor<B, 3, Int>>,
}

/// Strongly-typed batch record; optional fields are populated according
/// to the architecture variant the batcher was configured for.
#[derive(Debug, Clone)]
pub struct ConversationBatch<B: Backend> {
    /// Full conversation (turns 1-3 concatenated)
    pub text: Option<SeqTensors<B>>,
    /// Conversation context (turns 1-2 concatenated)
    pub context: Option<SeqTensors<B>>,
    /// Final turn
    pub sent: Option<SeqTensors<B>>,
    /// Each turn individually
    pub turns: Option<Box<[SeqTensors<B>; 3]>>,
    /// Label indices: [batch]; absent for the unlabeled test split
    pub labels: Option<Tensor<B, 1, Int>>,
    pub size: usize,
}

/// Batcher producing `ConversationBatch`es for a fixed architecture variant
#[derive(Clone)]
pub struct ConversationBatcher<B: Backend> {
    device: B::Device,
    arch: ArchKind,
    char_emb: bool,
    max_word_len: usize,
}

impl<B: Backend> ConversationBatcher<B> {
    pub fn new(device: B::Device, arch: ArchKind, char_emb: bool, max_word_len: usize) -> Self {
        ConversationBatcher {
            device,
            arch,
            char_emb,
            max_word_len,
        }
    }

    /// Pack one sequence per sample into padded tensors
    fn seq_tensors(&self, seqs: Vec<(Vec<usize>, Vec<Vec<usize>>)>) -> SeqTensors<B> {
        let batch_size = seqs.len();
        let max_len = seqs.iter().map(|(ids, _)| ids.len()).max().unwrap_or(1);

        let mut token_data = Vec::with_capacity(batch_size * max_len);
        let mut mask_data = Vec::with_capacity(batch_size * max_len);
        let mut char_data = if self.char_emb {
            Vec::with_capacity(batch_size * max_len * self.max_word_len)
        } else {
            Vec::new()
        };

        for (ids, chars) in &seqs {
            for pos in 0..max_len {
                if pos < ids.len() {
                    token_data.push(ids[pos] as i32);
                    mask_data.push(false);
                    if self.char_emb {
                        char_data.extend(chars[pos].iter().map(|c| *c as i32));
                    }
                } else {
                    token_data.push(PAD_IDX as i32);
                    mask_data.push(true);
                    if self.char_emb {
                        char_data.extend(std::iter::repeat(PAD_IDX as i32).take(self.max_word_len));
                    }
                }
            }
        }

        let tokens = Tensor::<B, 1, Int>::from_ints(token_data.as_slice(), &self.device)
            .reshape([batch_size, max_len]);

        let pad_mask = Tensor::<B, 1, Bool>::from_bool(
            TensorData::from(mask_data.as_slice()),
            &self.device,
        )
        .reshape([batch_size, max_len]);

        let chars = if self.char_emb {
            Some(
                Tensor::<B, 1, Int>::from_ints(char_data.as_slice(), &self.device).reshape([
                    batch_size,
                    max_len,
                    self.max_word_len,
                ]),
            )
        } else {
            None
        };

        SeqTensors {
            tokens,
            pad_mask,
            chars,
        }
    }

    /// Concatenate the given turns of each sample into one sequence
    fn gather_turns(
        items: &[ConversationSample],
        turn_range: std::ops::Range<usize>,
    ) -> Vec<(Vec<usize>, Vec<Vec<usize>>)> {
        items
            .iter()
            .map(|sample| {
                let mut ids = Vec::new();
                let mut chars = Vec::new();
                for t in turn_range.clone() {
                    ids.extend(sample.turn_ids[t].iter().copied());
                    chars.extend(sample.turn_chars[t].iter().cloned());
                }
                (ids, chars)
            })
            .collect()
    }
}

impl<B: Backend> burn::data::dataloader::batcher::Batcher<B, ConversationSample, ConversationBatch<B>>
    for ConversationBatcher<B>
{
    fn batch(&self, items: Vec<ConversationSample>, _device: &B::Device) -> ConversationBatch<B> {
        let size = items.len();

        let (text, context, sent, turns) = match self.arch {
            ArchKind::Single | ArchKind::Ensemble => {
                let text = self.seq_tensors(Self::gather_turns(&items, 0..3));
                (Some(text), None, None, None)
            }
            ArchKind::Fusion => {
                let context = self.seq_tensors(Self::gather_turns(&items, 0..2));
                let sent = self.seq_tensors(Self::gather_turns(&items, 2..3));
                (None, Some(context), Some(sent), None)
            }
            ArchKind::Separate => {
                let turns = Box::new([
                    self.seq_tensors(Self::gather_turns(&items, 0..1)),
                    self.seq_tensors(Self::gather_turns(&items, 1..2)),
                    self.seq_tensors(Self::gather_turns(&items, 2..3)),
                ]);
                (None, None, None, Some(turns))
            }
        };

        let labels = if items.iter().all(|s| s.label.is_some()) && !items.is_empty() {
            let label_data: Vec<i32> = items
                .iter()
                .map(|s| s.label.expect("checked above") as i32)
                .collect();
            Some(Tensor::<B, 1, Int>::from_ints(
                label_data.as_slice(),
                &self.device,
            ))
        } else {
            None
        };

        ConversationBatch {
            text,
            context,
            sent,
            turns,
            labels,
            size,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::backend::NdArray;
    use burn::data::dataloader::batcher::Batcher;
    use std::io::Cursor;

    type TestBackend = NdArray<f32>;

    const TRAIN_TSV: &str = "id\tturn1\tturn2\tturn3\tlabel\n\
        0\tdon't worry\ti am fine\tgreat to hear\thappy\n\
        1\twhy\tbecause\tleave me alone\tangry\n\
        2\thello\thi there\thow are you\tothers\n\
        3\tok\tfine\twhatever\tothers\n";

    const TEST_TSV: &str = "id\tturn1\tturn2\tturn3\n\
        10\thello\thi\thow are you\n\
        11\tbye\tsee you\tlater\n";

    fn sample_data() -> EmoData {
        let train = read_records(Cursor::new(TRAIN_TSV), true).unwrap();
        let val = read_records(Cursor::new(TRAIN_TSV), true).unwrap();
        EmoData::from_records(train, val, 1).unwrap()
    }

    #[test]
    fn test_read_records_skips_header() {
        let records = read_records(Cursor::new(TRAIN_TSV), true).unwrap();
        assert_eq!(records.len(), 4);
        assert_eq!(records[0].id, "0");
        assert_eq!(records[0].label.as_deref(), Some("happy"));
        assert_eq!(records[1].turns[2], "leave me alone");
    }

    #[test]
    fn test_read_unlabeled_records() {
        let records = read_records(Cursor::new(TEST_TSV), false).unwrap();
        assert_eq!(records.len(), 2);
        assert!(records[0].label.is_none());
    }

    #[test]
    fn test_parse_line_rejects_short_rows() {
        let result = ConversationRecord::parse_line("0\tonly\ttwo", true, 3);
        assert!(result.is_err());
    }

    #[test]
    fn test_label_vocab_majority_first() {
        let data = sample_data();
        // "others" appears twice, the rest once each
        assert_eq!(data.others_idx("others"), Some(0));
        assert_eq!(data.class_count(), 3);
    }

    #[test]
    fn test_empty_turn_gets_pad_token() {
        let data = sample_data();
        let record = ConversationRecord::parse_line("9\t\thi\tthere\tothers", true, 1).unwrap();
        let sample = data.numericalize(&record).unwrap();
        assert_eq!(sample.turn_ids[0], vec![PAD_IDX]);
        assert_eq!(sample.turn_chars[0].len(), 1);
    }

    #[test]
    fn test_single_batch_shapes() {
        let data = sample_data();
        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Single,
            true,
            data.char_vocab.max_word_len,
        );
        let items = data.train.samples().to_vec();
        let batch = batcher.batch(items, &Default::default());

        let text = batch.text.as_ref().unwrap();
        let [b, s] = text.tokens.dims();
        assert_eq!(b, 4);
        assert_eq!(text.pad_mask.dims(), [b, s]);
        assert_eq!(
            text.chars.as_ref().unwrap().dims(),
            [b, s, data.char_vocab.max_word_len]
        );
        assert!(batch.context.is_none());
        assert_eq!(batch.labels.as_ref().unwrap().dims(), [4]);
    }

    #[test]
    fn test_fusion_batch_splits_context_and_sent() {
        let data = sample_data();
        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Fusion,
            false,
            data.char_vocab.max_word_len,
        );
        let batch = batcher.batch(data.train.samples().to_vec(), &Default::default());

        assert!(batch.text.is_none());
        assert!(batch.context.is_some());
        assert!(batch.sent.is_some());
        assert!(batch.context.as_ref().unwrap().chars.is_none());
    }

    #[test]
    fn test_separate_batch_has_three_turns() {
        let data = sample_data();
        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Separate,
            false,
            data.char_vocab.max_word_len,
        );
        let batch = batcher.batch(data.train.samples().to_vec(), &Default::default());

        let turns = batch.turns.as_ref().unwrap();
        for turn in turns.iter() {
            assert_eq!(turn.tokens.dims()[0], 4);
        }
    }

    #[test]
    fn test_unlabeled_batch_has_no_labels() {
        let data = sample_data();
        let (_, test_set) = {
            let records = read_records(Cursor::new(TEST_TSV), false).unwrap();
            let samples: Vec<_> = records
                .iter()
                .map(|r| data.numericalize(r).unwrap())
                .collect();
            (records, EmoDataset::new(samples))
        };

        let batcher = ConversationBatcher::<TestBackend>::new(
            Default::default(),
            ArchKind::Single,
            false,
            data.char_vocab.max_word_len,
        );
        let batch = batcher.batch(test_set.samples().to_vec(), &Default::default());
        assert!(batch.labels.is_none());
        assert_eq!(batch.size, 2);
    }
}
