use std::collections::HashSet;

/// Canonical form used for every comparison: lowercase, anything that is not
/// alphanumeric becomes a space, whitespace runs collapse, ends trimmed.
pub fn normalize(text: &str) -> String {
    let lowered: String = text
        .to_lowercase()
        .chars()
        .map(|c| if c.is_alphanumeric() { c } else { ' ' })
        .collect();

    lowered.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Unique tokens of a record's text.
pub fn tokenize_text(text: &str) -> HashSet<String> {
    normalize(text)
        .split(' ')
        .filter(|word| !word.is_empty())
        .map(str::to_string)
        .collect()
}

/// Query tokens in order, duplicates dropped.
pub fn tokenize_query(query: &str) -> Vec<String> {
    let mut seen = HashSet::new();
    normalize(query)
        .split(' ')
        .filter(|word| !word.is_empty())
        .filter(|word| seen.insert(word.to_string()))
        .map(str::to_string)
        .collect()
}

/// Every leading prefix of `token`, shortest first ("forward" tokenization).
pub fn forward_prefixes(token: &str) -> impl Iterator<Item = &str> {
    token
        .char_indices()
        .skip(1)
        .map(|(idx, _)| idx)
        .chain(std::iter::once(token.len()))
        .map(move |end| &token[..end])
}
