//! TF-IDF document retrieval.
//!
//! Documents are tokenised into lower-cased runs of two or more word
//! characters, weighted by raw term frequency times a smoothed inverse
//! document frequency, and L2-normalised. A query is scored against every
//! document by cosine similarity.

use crate::types::Document;
use regex::Regex;
use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::sync::LazyLock;
use tracing::debug;

static TOKEN_PATTERN: LazyLock<Regex> = LazyLock::new(|| Regex::new(r"\b\w\w+\b").unwrap());

/// Split `text` into lower-cased tokens of at least two word characters.
pub fn tokenize(text: &str) -> Vec<String> {
    let lowered = text.to_lowercase();
    TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str().to_string())
        .collect()
}

/// A document with its similarity to a query.
#[derive(Debug, Clone, PartialEq)]
pub struct ScoredDocument {
    /// Zero-based position in the corpus.
    pub index: usize,
    pub title: String,
    pub content: String,
    pub score: f64,
}

impl ScoredDocument {
    /// Citation tag, one-based: `[doc1]`, `[doc2]`, ...
    pub fn citation(&self) -> String {
        format!("[doc{}]", self.index + 1)
    }
}

/// A fixed corpus with precomputed TF-IDF vectors.
#[derive(Debug, Clone)]
pub struct Corpus {
    documents: Vec<Document>,
    vocabulary: BTreeMap<String, usize>,
    idf: Vec<f64>,
    vectors: Vec<Vec<f64>>,
}

impl Corpus {
    pub fn new(documents: Vec<Document>) -> Self {
        let tokenized: Vec<Vec<String>> = documents.iter().map(|d| tokenize(&d.content)).collect();

        let mut vocabulary = BTreeMap::new();
        for tokens in &tokenized {
            for token in tokens {
                vocabulary.entry(token.clone()).or_insert(0);
            }
        }
        for (position, index) in vocabulary.values_mut().enumerate() {
            *index = position;
        }

        let mut document_frequency = vec![0usize; vocabulary.len()];
        for tokens in &tokenized {
            let mut seen = vec![false; vocabulary.len()];
            for token in tokens {
                if let Some(&i) = vocabulary.get(token) {
                    if !seen[i] {
                        seen[i] = true;
                        document_frequency[i] += 1;
                    }
                }
            }
        }

        let n = documents.len() as f64;
        let idf: Vec<f64> = document_frequency
            .iter()
            .map(|&df| ((1.0 + n) / (1.0 + df as f64)).ln() + 1.0)
            .collect();

        let mut corpus = Self {
            documents,
            vocabulary,
            idf,
            vectors: Vec::new(),
        };
        corpus.vectors = tokenized.iter().map(|t| corpus.vectorize(t)).collect();
        corpus
    }

    /// The three-document corpus served by the retrieval capability.
    pub fn default_corpus() -> Self {
        Self::new(vec![
            Document::new(
                "LangGraph Overview",
                "LangGraph is a framework that lets developers orchestrate large language models \
                 using a graph abstraction. It supports multi-agent coordination, conditional \
                 routing and streaming outputs to build complex applications.",
            ),
            Document::new(
                "Meeting Management Tips",
                "Organising a productive meeting requires preparing an agenda, inviting the right \
                 stakeholders, and capturing notes and actions. Following a clear structure keeps \
                 participants engaged and ensures the meeting stays on track.",
            ),
            Document::new(
                "Web Searching Basics",
                "Web search engines crawl and index billions of pages. When you perform a search, \
                 they return the most relevant documents using ranking algorithms. Choosing the \
                 right keywords helps to narrow results to the information you need.",
            ),
        ])
    }

    pub fn len(&self) -> usize {
        self.documents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.documents.is_empty()
    }

    pub fn documents(&self) -> &[Document] {
        &self.documents
    }

    /// Every document scored against `query`, best first. Equal scores keep
    /// corpus order.
    pub fn rank(&self, query: &str) -> Vec<ScoredDocument> {
        let query_vector = self.vectorize(&tokenize(query));
        let mut scored: Vec<ScoredDocument> = self
            .documents
            .iter()
            .zip(&self.vectors)
            .enumerate()
            .map(|(index, (doc, vector))| ScoredDocument {
                index,
                title: doc.title.clone(),
                content: doc.content.clone(),
                score: dot(&query_vector, vector),
            })
            .collect();

        scored.sort_by(|a, b| {
            b.score
                .partial_cmp(&a.score)
                .unwrap_or(Ordering::Equal)
                .then(a.index.cmp(&b.index))
        });
        debug!(
            query_len = query.len(),
            top_score = scored.first().map(|d| d.score).unwrap_or_default(),
            "Ranked corpus"
        );
        scored
    }

    /// The best document for `query`, or `None` when nothing overlaps.
    pub fn best(&self, query: &str) -> Option<ScoredDocument> {
        self.rank(query).into_iter().next().filter(|d| d.score > 0.0)
    }

    fn vectorize(&self, tokens: &[String]) -> Vec<f64> {
        let mut vector = vec![0.0; self.vocabulary.len()];
        for token in tokens {
            if let Some(&i) = self.vocabulary.get(token) {
                vector[i] += 1.0;
            }
        }
        for (weight, idf) in vector.iter_mut().zip(&self.idf) {
            *weight *= idf;
        }
        let norm = vector.iter().map(|w| w * w).sum::<f64>().sqrt();
        if norm > 0.0 {
            for weight in &mut vector {
                *weight /= norm;
            }
        }
        vector
    }
}

impl Default for Corpus {
    fn default() -> Self {
        Self::default_corpus()
    }
}

fn dot(a: &[f64], b: &[f64]) -> f64 {
    a.iter().zip(b).map(|(x, y)| x * y).sum()
}
