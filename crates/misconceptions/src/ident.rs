/// Content-derived record identifier.
///
/// The id is a normalized prefix joined to a checksum: the text is
/// lowercased, stripped to `[a-z0-9]` and truncated to 30 characters,
/// then suffixed with the sum of the original text's char codes in
/// hex. Two records with the same id are treated as the same entry.
pub fn record_id(text: &str) -> String {
    let prefix: String = text
        .to_lowercase()
        .chars()
        .filter(char::is_ascii_alphanumeric)
        .take(30)
        .collect();
    let checksum: u64 = text.chars().map(|c| c as u64).sum();
    format!("{prefix}-{checksum:x}")
}
