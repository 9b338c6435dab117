/// Maps a logical filename to the object key stored in the bucket.
///
/// The prefix is prepended verbatim. Filenames are not normalized, escaped or
/// validated; an empty filename resolves to the prefix itself.
pub fn resolve_key(prefix: &str, filename: &str) -> String {
    if prefix.is_empty() {
        filename.to_string()
    } else {
        format!("{}{}", prefix, filename)
    }
}
