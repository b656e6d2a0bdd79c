/// The lookup term for a classifier label: the first synonym, trimmed.
///
/// `"tabby, tabby cat"` becomes `"tabby"`.
pub fn enrichment_term(label: &str) -> &str {
    label
        .split_once(',')
        .map_or(label, |(first, _)| first)
        .trim()
}
