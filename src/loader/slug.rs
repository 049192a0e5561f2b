use unicode_normalization::UnicodeNormalization;

const MAX_SLUG_LEN: usize = 100;

/// Filesystem-safe file stem for a grouping key.
///
/// Matches the preprocessor that writes the theme files: NFKD, ASCII only,
/// lowercase, runs of non-word characters become one `-`, at most 100
/// characters, `id` when nothing is left.
pub fn slug(text: &str) -> String {
    let ascii: String = text.nfkd().filter(char::is_ascii).collect();
    let lowered = ascii.to_lowercase();

    let mut out = String::with_capacity(lowered.len());
    for ch in lowered.trim().chars() {
        let word = ch.is_ascii_alphanumeric() || ch == '_';
        if word {
            out.push(ch);
        } else if !out.ends_with('-') {
            out.push('-');
        }
    }
    out.truncate(MAX_SLUG_LEN);
    if out.is_empty() {
        "id".to_string()
    } else {
        out
    }
}
