// src/clustering/embedding.rs

use anyhow::{bail, Result};
use log::debug;
use ndarray::Array2;
use once_cell::sync::Lazy;
use regex::Regex;
use std::collections::{BTreeMap, HashMap, HashSet};

/// Tokens are runs of at least two word characters.
static TOKEN_PATTERN: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"\b\w\w+\b").expect("token pattern is a valid regex"));

static STOP_WORD_SET: Lazy<HashSet<&'static str>> =
    Lazy::new(|| ENGLISH_STOP_WORDS.iter().copied().collect());

/// Common English words dropped before n-grams are formed.
pub const ENGLISH_STOP_WORDS: &[&str] = &[
    "a", "about", "above", "across", "after", "afterwards", "again", "against", "all", "almost",
    "alone", "along", "already", "also", "although", "always", "am", "among", "amongst",
    "amoungst", "amount", "an", "and", "another", "any", "anyhow", "anyone", "anything", "anyway",
    "anywhere", "are", "around", "as", "at", "back", "be", "became", "because", "become",
    "becomes", "becoming", "been", "before", "beforehand", "behind", "being", "below", "beside",
    "besides", "between", "beyond", "bill", "both", "bottom", "but", "by", "call", "can",
    "cannot", "cant", "co", "con", "could", "couldnt", "cry", "de", "describe", "detail", "do",
    "done", "down", "due", "during", "each", "eg", "eight", "either", "eleven", "else",
    "elsewhere", "empty", "enough", "etc", "even", "ever", "every", "everyone", "everything",
    "everywhere", "except", "few", "fifteen", "fifty", "fill", "find", "fire", "first", "five",
    "for", "former", "formerly", "forty", "found", "four", "from", "front", "full", "further",
    "get", "give", "go", "had", "has", "hasnt", "have", "he", "hence", "her", "here",
    "hereafter", "hereby", "herein", "hereupon", "hers", "herself", "him", "himself", "his",
    "how", "however", "hundred", "i", "ie", "if", "in", "inc", "indeed", "interest", "into",
    "is", "it", "its", "itself", "keep", "last", "latter", "latterly", "least", "less", "ltd",
    "made", "many", "may", "me", "meanwhile", "might", "mill", "mine", "more", "moreover",
    "most", "mostly", "move", "much", "must", "my", "myself", "name", "namely", "neither",
    "never", "nevertheless", "next", "nine", "no", "nobody", "none", "noone", "nor", "not",
    "nothing", "now", "nowhere", "of", "off", "often", "on", "once", "one", "only", "onto",
    "or", "other", "others", "otherwise", "our", "ours", "ourselves", "out", "over", "own",
    "part", "per", "perhaps", "please", "put", "rather", "re", "same", "see", "seem", "seemed",
    "seeming", "seems", "serious", "several", "she", "should", "show", "side", "since",
    "sincere", "six", "sixty", "so", "some", "somehow", "someone", "something", "sometime",
    "sometimes", "somewhere", "still", "such", "system", "take", "ten", "than", "that", "the",
    "their", "them", "themselves", "then", "thence", "there", "thereafter", "thereby",
    "therefore", "therein", "thereupon", "these", "they", "thick", "thin", "third", "this",
    "those", "though", "three", "through", "throughout", "thru", "thus", "to", "together",
    "too", "top", "toward", "towards", "twelve", "twenty", "two", "un", "under", "until", "up",
    "upon", "us", "very", "via", "was", "we", "well", "were", "what", "whatever", "when",
    "whence", "whenever", "where", "whereafter", "whereas", "whereby", "wherein", "whereupon",
    "wherever", "whether", "which", "while", "whither", "who", "whoever", "whole", "whom",
    "whose", "why", "will", "with", "within", "without", "would", "yet", "you", "your", "yours",
    "yourself", "yourselves",
];

/// Dense TF-IDF matrix (one row per keyword) plus the feature names of its columns.
#[derive(Debug, Clone)]
pub struct TfidfEmbedding {
    pub matrix: Array2<f64>,
    pub vocabulary: Vec<String>,
}

impl TfidfEmbedding {
    pub fn dimension(&self) -> usize {
        self.vocabulary.len()
    }
}

/// Lowercases, tokenizes, drops stop words and emits unigrams followed by bigrams.
pub fn analyze(term: &str) -> Vec<String> {
    let lowered = term.to_lowercase();
    let tokens: Vec<&str> = TOKEN_PATTERN
        .find_iter(&lowered)
        .map(|m| m.as_str())
        .filter(|t| !STOP_WORD_SET.contains(t))
        .collect();

    let mut ngrams: Vec<String> = tokens.iter().map(|t| t.to_string()).collect();
    for pair in tokens.windows(2) {
        ngrams.push(format!("{} {}", pair[0], pair[1]));
    }
    ngrams
}

/// Builds TF-IDF embeddings over unigrams and bigrams.
///
/// Features are ordered alphabetically; when the vocabulary exceeds
/// `max_features`, the terms with the highest corpus frequency are kept.
/// Idf is smoothed (`ln((1 + n) / (1 + df)) + 1`) and rows are L2-normalised.
pub fn create_embeddings<S: AsRef<str>>(terms: &[S], max_features: usize) -> Result<TfidfEmbedding> {
    let n_docs = terms.len();
    let doc_counts: Vec<HashMap<String, usize>> = terms
        .iter()
        .map(|t| {
            let mut counts = HashMap::new();
            for ngram in analyze(t.as_ref()) {
                *counts.entry(ngram).or_insert(0) += 1;
            }
            counts
        })
        .collect();

    // term -> (corpus frequency, document frequency)
    let mut stats: BTreeMap<&str, (usize, usize)> = BTreeMap::new();
    for counts in &doc_counts {
        for (ngram, &count) in counts {
            let entry = stats.entry(ngram.as_str()).or_insert((0, 0));
            entry.0 += count;
            entry.1 += 1;
        }
    }

    if stats.is_empty() {
        bail!(
            "Empty vocabulary after stop-word filtering; the {} keywords carry no usable tokens",
            n_docs
        );
    }

    let mut vocabulary: Vec<&str> = stats.keys().copied().collect();
    if vocabulary.len() > max_features {
        vocabulary.sort_by(|a, b| stats[b].0.cmp(&stats[a].0).then_with(|| a.cmp(b)));
        vocabulary.truncate(max_features);
        vocabulary.sort_unstable();
    }

    let column_of: HashMap<&str, usize> = vocabulary
        .iter()
        .enumerate()
        .map(|(j, term)| (*term, j))
        .collect();
    let idf: Vec<f64> = vocabulary
        .iter()
        .map(|term| {
            let df = stats[term].1 as f64;
            ((1.0 + n_docs as f64) / (1.0 + df)).ln() + 1.0
        })
        .collect();

    let mut matrix = Array2::<f64>::zeros((n_docs, vocabulary.len()));
    for (i, counts) in doc_counts.iter().enumerate() {
        for (ngram, &count) in counts {
            if let Some(&j) = column_of.get(ngram.as_str()) {
                matrix[[i, j]] = count as f64 * idf[j];
            }
        }
        let mut row = matrix.row_mut(i);
        let norm = row.iter().map(|v| v * v).sum::<f64>().sqrt();
        if norm > 0.0 {
            row.mapv_inplace(|v| v / norm);
        }
    }

    debug!(
        "Built TF-IDF matrix: {} keywords x {} features",
        n_docs,
        vocabulary.len()
    );

    Ok(TfidfEmbedding {
        matrix,
        vocabulary: vocabulary.into_iter().map(String::from).collect(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_analyze_drops_stop_words_and_builds_bigrams() {
        assert_eq!(
            analyze("Top Hiking Boots"),
            vec!["hiking", "boots", "hiking boots"]
        );
        assert_eq!(analyze("a b of the"), Vec::<String>::new());
    }

    #[test]
    fn test_vocabulary_is_alphabetical_and_rows_normalised() {
        let emb = create_embeddings(&["best running shoes", "top hiking boots"], 1000).unwrap();
        assert_eq!(
            emb.vocabulary,
            vec![
                "best", "best running", "boots", "hiking", "hiking boots", "running",
                "running shoes", "shoes"
            ]
        );
        assert_eq!(emb.matrix.dim(), (2, 8));
        for row in emb.matrix.rows() {
            let norm: f64 = row.iter().map(|v| v * v).sum::<f64>().sqrt();
            assert!((norm - 1.0).abs() < 1e-9);
        }
        // no shared vocabulary -> orthogonal rows
        let dot: f64 = emb.matrix.row(0).dot(&emb.matrix.row(1));
        assert_eq!(dot, 0.0);
    }

    #[test]
    fn test_max_features_keeps_most_frequent_terms() {
        let emb = create_embeddings(&["seo seo tools", "seo audit"], 1).unwrap();
        assert_eq!(emb.vocabulary, vec!["seo"]);
        assert!((emb.matrix[[0, 0]] - 1.0).abs() < 1e-9);
        assert!((emb.matrix[[1, 0]] - 1.0).abs() < 1e-9);
    }

    #[test]
    fn test_rarer_terms_weigh_more() {
        let emb = create_embeddings(&["seo tools", "seo audit", "seo guide"], 1000).unwrap();
        let seo = emb.vocabulary.iter().position(|t| t == "seo").unwrap();
        let tools = emb.vocabulary.iter().position(|t| t == "tools").unwrap();
        assert!(emb.matrix[[0, tools]] > emb.matrix[[0, seo]]);
    }

    #[test]
    fn test_empty_vocabulary_is_an_error() {
        assert!(create_embeddings(&["the", "a of", "x"], 1000).is_err());
    }

    #[test]
    fn test_embeddings_are_reproducible() {
        let terms = ["keyword research", "keyword tools", "content audit"];
        let a = create_embeddings(&terms, 1000).unwrap();
        let b = create_embeddings(&terms, 1000).unwrap();
        assert_eq!(a.vocabulary, b.vocabulary);
        assert_eq!(a.matrix, b.matrix);
    }
}
