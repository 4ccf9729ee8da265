use std::collections::{BTreeMap, HashMap};

use serde::Deserialize;
use tokenizers::normalizers::{StripAccents, NFKD};
use tokenizers::{NormalizedString, Normalizer};

use crate::classifier::ClassifierError;

/// How n-grams are cut out of the preprocessed text.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Analyzer {
    /// N-grams over the whole text, spaces included
    Char,
    /// N-grams inside word boundaries, each word padded with one space per side
    CharWb,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StripAccentsMode {
    Unicode,
    Ascii,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Norm {
    L1,
    L2,
}

fn default_true() -> bool {
    true
}

fn default_norm() -> Option<Norm> {
    Some(Norm::L2)
}

/// Serialized form of a fitted TF-IDF vectorizer.
#[derive(Debug, Deserialize)]
pub(crate) struct VectorizerArtifact {
    analyzer: Analyzer,
    ngram_range: (usize, usize),
    #[serde(default = "default_true")]
    lowercase: bool,
    #[serde(default)]
    strip_accents: Option<StripAccentsMode>,
    vocabulary: HashMap<String, usize>,
    #[serde(default)]
    idf: Option<Vec<f32>>,
    #[serde(default)]
    sublinear_tf: bool,
    #[serde(default = "default_norm")]
    norm: Option<Norm>,
}

/// A sparse feature vector, entries sorted by feature index.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseVector {
    dim: usize,
    entries: Vec<(usize, f32)>,
}

impl SparseVector {
    #[cfg(test)]
    pub(crate) fn from_entries(dim: usize, mut entries: Vec<(usize, f32)>) -> Self {
        entries.sort_by_key(|&(index, _)| index);
        Self { dim, entries }
    }

    pub fn dim(&self) -> usize {
        self.dim
    }

    pub fn entries(&self) -> &[(usize, f32)] {
        &self.entries
    }

    pub fn is_zero(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Executes a fitted character n-gram TF-IDF vectorizer.
#[derive(Debug)]
pub struct TfidfVectorizer {
    analyzer: Analyzer,
    min_n: usize,
    max_n: usize,
    lowercase: bool,
    strip_accents: Option<StripAccentsMode>,
    vocabulary: HashMap<String, usize>,
    idf: Option<Vec<f32>>,
    sublinear_tf: bool,
    norm: Option<Norm>,
}

impl TfidfVectorizer {
    pub(crate) fn from_artifact(artifact: VectorizerArtifact) -> Result<Self, ClassifierError> {
        let (min_n, max_n) = artifact.ngram_range;
        if min_n == 0 || min_n > max_n {
            return Err(ClassifierError::artifact(
                "pipeline",
                format!("invalid ngram_range ({}, {})", min_n, max_n),
            ));
        }

        let n_features = artifact.vocabulary.len();
        if n_features == 0 {
            return Err(ClassifierError::artifact("pipeline", "vectorizer vocabulary is empty"));
        }
        let mut seen = vec![false; n_features];
        for (ngram, &index) in &artifact.vocabulary {
            match seen.get_mut(index) {
                Some(slot) if !*slot => *slot = true,
                _ => {
                    return Err(ClassifierError::artifact(
                        "pipeline",
                        format!(
                            "vocabulary entry '{}' has index {} which is duplicated \
                             or outside 0..{}",
                            ngram, index, n_features
                        ),
                    ))
                }
            }
        }

        if let Some(idf) = &artifact.idf {
            if idf.len() != n_features {
                return Err(ClassifierError::artifact(
                    "pipeline",
                    format!("idf has {} entries, vocabulary has {}", idf.len(), n_features),
                ));
            }
        }

        Ok(Self {
            analyzer: artifact.analyzer,
            min_n,
            max_n,
            lowercase: artifact.lowercase,
            strip_accents: artifact.strip_accents,
            vocabulary: artifact.vocabulary,
            idf: artifact.idf,
            sublinear_tf: artifact.sublinear_tf,
            norm: artifact.norm,
        })
    }

    pub fn n_features(&self) -> usize {
        self.vocabulary.len()
    }

    /// Turns raw text into its TF-IDF feature vector.
    pub fn transform(&self, text: &str) -> Result<SparseVector, ClassifierError> {
        let doc = collapse_whitespace(&self.preprocess(text)?);

        let mut counts: BTreeMap<usize, f32> = BTreeMap::new();
        self.for_each_ngram(&doc, |ngram| {
            if let Some(&index) = self.vocabulary.get(ngram) {
                *counts.entry(index).or_insert(0.0) += 1.0;
            }
        });

        let mut entries: Vec<(usize, f32)> = counts
            .into_iter()
            .map(|(index, tf)| {
                let tf = if self.sublinear_tf { 1.0 + tf.ln() } else { tf };
                let weight = self.idf.as_ref().map_or(1.0, |idf| idf[index]);
                (index, tf * weight)
            })
            .collect();

        let norm = match self.norm {
            Some(Norm::L2) => entries.iter().map(|(_, v)| v * v).sum::<f32>().sqrt(),
            Some(Norm::L1) => entries.iter().map(|(_, v)| v.abs()).sum::<f32>(),
            None => 1.0,
        };
        if norm > 0.0 && norm != 1.0 {
            for (_, v) in entries.iter_mut() {
                *v /= norm;
            }
        }

        Ok(SparseVector {
            dim: self.n_features(),
            entries,
        })
    }

    /// Lowercases, then strips accents.
    ///
    /// Lowercasing works on the whole string so context-dependent mappings such as the
    /// Greek final sigma apply.
    fn preprocess(&self, text: &str) -> Result<String, ClassifierError> {
        let text = if self.lowercase { text.to_lowercase() } else { text.to_string() };
        let Some(mode) = self.strip_accents else {
            return Ok(text);
        };

        let mut normalized = NormalizedString::from(text);
        let run = |result: tokenizers::Result<()>| {
            result.map_err(|e| {
                ClassifierError::PredictionError(format!("Failed to normalize text: {}", e))
            })
        };

        run(NFKD.normalize(&mut normalized))?;
        match mode {
            StripAccentsMode::Unicode => run(StripAccents.normalize(&mut normalized))?,
            StripAccentsMode::Ascii => {
                normalized.filter(|c| c.is_ascii());
            }
        }

        Ok(normalized.get().to_string())
    }

    fn for_each_ngram<F: FnMut(&str)>(&self, doc: &str, mut visit: F) {
        match self.analyzer {
            Analyzer::Char => {
                let bounds = char_boundaries(doc);
                let len = bounds.len() - 1;
                for n in self.min_n..=self.max_n.min(len) {
                    for i in 0..=(len - n) {
                        visit(&doc[bounds[i]..bounds[i + n]]);
                    }
                }
            }
            Analyzer::CharWb => {
                for word in doc.split_whitespace() {
                    let padded = format!(" {} ", word);
                    let bounds = char_boundaries(&padded);
                    let len = bounds.len() - 1;
                    for n in self.min_n..=self.max_n {
                        if len <= n {
                            // A word no longer than n yields itself once.
                            visit(&padded);
                            break;
                        }
                        for i in 0..=(len - n) {
                            visit(&padded[bounds[i]..bounds[i + n]]);
                        }
                    }
                }
            }
        }
    }
}

/// Byte offsets of every char start plus the end of the string.
fn char_boundaries(s: &str) -> Vec<usize> {
    s.char_indices().map(|(i, _)| i).chain(std::iter::once(s.len())).collect()
}

/// Replaces every run of two or more whitespace chars with a single space.
fn collapse_whitespace(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    let mut chars = text.chars().peekable();
    while let Some(c) = chars.next() {
        if c.is_whitespace() && chars.peek().map_or(false, |next| next.is_whitespace()) {
            while chars.peek().map_or(false, |next| next.is_whitespace()) {
                chars.next();
            }
            out.push(' ');
        } else {
            out.push(c);
        }
    }
    out
}
