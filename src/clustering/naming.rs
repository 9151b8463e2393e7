// src/clustering/naming.rs

use std::collections::HashMap;

const NAME_TOKEN_COUNT: usize = 3;
const MIN_NAME_TOKEN_CHARS: usize = 3;
const DESCRIPTION_PREVIEW_TERMS: usize = 3;

/// Names a cluster after its most frequent member tokens.
///
/// Terms are split on whitespace and lowercased; tokens shorter than three
/// characters are ignored. Ties keep first-seen order. Falls back to the
/// first member term when no token survives.
pub fn generate_cluster_name<S: AsRef<str>>(terms: &[S]) -> String {
    let mut counts: HashMap<String, usize> = HashMap::new();
    let mut first_seen: Vec<String> = Vec::new();

    for term in terms {
        for word in term.as_ref().split_whitespace() {
            let token = word.to_lowercase();
            if token.chars().count() < MIN_NAME_TOKEN_CHARS {
                continue;
            }
            let count = counts.entry(token.clone()).or_insert(0);
            if *count == 0 {
                first_seen.push(token);
            }
            *count += 1;
        }
    }

    if first_seen.is_empty() {
        let fallback = terms.first().map(|t| t.as_ref()).unwrap_or_default();
        return format!("Cluster: {}", fallback);
    }

    // stable sort keeps first-seen order among equal counts
    first_seen.sort_by(|a, b| counts[b].cmp(&counts[a]));
    first_seen.truncate(NAME_TOKEN_COUNT);
    format!("Cluster: {}", first_seen.join(" "))
}

pub fn generate_cluster_description<S: AsRef<str>>(terms: &[S]) -> String {
    if terms.len() <= DESCRIPTION_PREVIEW_TERMS {
        let all: Vec<&str> = terms.iter().map(|t| t.as_ref()).collect();
        format!("Keywords related to: {}", all.join(", "))
    } else {
        let preview: Vec<&str> = terms
            .iter()
            .take(DESCRIPTION_PREVIEW_TERMS)
            .map(|t| t.as_ref())
            .collect();
        format!(
            "Cluster of {} related keywords including: {}...",
            terms.len(),
            preview.join(", ")
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_name_uses_most_frequent_tokens() {
        let name = generate_cluster_name(&["best running shoes", "running shoes for men"]);
        assert_eq!(name, "Cluster: running shoes best");
    }

    #[test]
    fn test_name_is_case_insensitive() {
        let name = generate_cluster_name(&["Hiking Boots", "hiking boots review", "HIKING gear"]);
        assert_eq!(name, "Cluster: hiking boots review");
    }

    #[test]
    fn test_name_falls_back_to_first_term() {
        assert_eq!(generate_cluster_name(&["ab cd", "x y"]), "Cluster: ab cd");
    }

    #[test]
    fn test_short_description_lists_all_terms() {
        assert_eq!(
            generate_cluster_description(&["seo audit", "seo tools"]),
            "Keywords related to: seo audit, seo tools"
        );
    }

    #[test]
    fn test_long_description_previews_three_terms() {
        assert_eq!(
            generate_cluster_description(&["a1", "b2", "c3", "d4", "e5"]),
            "Cluster of 5 related keywords including: a1, b2, c3..."
        );
    }
}
