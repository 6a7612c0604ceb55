//! Small text helpers shared by the classifiers and the similarity index.

/// Splits on anything that is not a word character and drops one-character
/// fragments. Hangul syllables count as word characters.
pub fn simple_tokenize(text: &str) -> Vec<String> {
    text.split(|c: char| !(c.is_alphanumeric() || c == '_'))
        .map(str::trim)
        .filter(|t| t.chars().count() > 1)
        .map(str::to_lowercase)
        .collect()
}

/// Number of distinct keywords found in `text`.
///
/// Occurrences are claimed left to right, longest first; an occurrence that
/// overlaps an already claimed span does not count, so "실망했다" is one hit
/// for `["실망", "망했다"]`, not two.
pub fn count_matches<S: AsRef<str>>(text: &str, keywords: &[S]) -> usize {
    let mut hits: Vec<(usize, usize, usize)> = keywords
        .iter()
        .enumerate()
        .filter(|(_, k)| !k.as_ref().is_empty())
        .flat_map(|(idx, k)| {
            text.match_indices(k.as_ref())
                .map(move |(start, m)| (start, start + m.len(), idx))
        })
        .collect();
    hits.sort_by(|a, b| a.0.cmp(&b.0).then(b.1.cmp(&a.1)));

    let mut found = vec![false; keywords.len()];
    let mut claimed_to = 0;
    for (start, end, idx) in hits {
        if start >= claimed_to {
            found[idx] = true;
            claimed_to = end;
        }
    }
    found.into_iter().filter(|f| *f).count()
}

pub fn contains_any<S: AsRef<str>>(text: &str, keywords: &[S]) -> bool {
    count_matches(text, keywords) > 0
}

pub fn split_sentences(text: &str) -> Vec<&str> {
    text.split(|c: char| matches!(c, '.' | '!' | '?' | '\n' | '。' | '…'))
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .collect()
}

pub fn words(list: &[&str]) -> Vec<String> {
    list.iter().map(|w| w.to_string()).collect()
}

/// First `max_chars` characters, with an ellipsis when truncated.
pub fn preview(text: &str, max_chars: usize) -> String {
    if text.chars().count() > max_chars {
        let cut: String = text.chars().take(max_chars).collect();
        format!("{}...", cut)
    } else {
        text.to_string()
    }
}
