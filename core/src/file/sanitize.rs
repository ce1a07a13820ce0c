//! File name sanitizing for storage keys and downloads.

pub const MAX_FILE_NAME_LEN: usize = 255;

pub fn sanitize_file_name(name: &str) -> String {
    sanitize_file_name_with_limit(name, MAX_FILE_NAME_LEN)
}

/// Strip path tricks and unusual characters from a client-supplied file name.
///
/// The extension (from the last dot, when that dot is neither first nor last)
/// is kept as sent; the rest is reduced to `[A-Za-z0-9._-]` and cut so the
/// whole name fits in `max_len` characters.
pub fn sanitize_file_name_with_limit(name: &str, max_len: usize) -> String {
    if name.is_empty() {
        return "unnamed_file".to_string();
    }

    let cleaned: String = name
        .replace("..", "")
        .chars()
        .map(|ch| if ch == '/' || ch == '\\' { '_' } else { ch })
        .filter(|ch| *ch != '\0')
        .collect();
    let cleaned = cleaned.trim();

    let (base, extension) = match cleaned.rfind('.') {
        Some(dot) if dot > 0 && dot + 1 < cleaned.len() => cleaned.split_at(dot),
        _ => (cleaned, ""),
    };

    let mut stem = String::with_capacity(base.len());
    for ch in base.chars() {
        let ch = if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
            ch
        } else {
            '_'
        };
        if ch == '_' && stem.ends_with('_') {
            continue;
        }
        stem.push(ch);
    }
    let stem = stem.trim_matches(|ch| ch == '.' || ch == '_');

    if stem.is_empty() {
        return format!("sanitized_file{}", extension);
    }

    let room = max_len.saturating_sub(extension.chars().count());
    let stem: String = stem.chars().take(room).collect();
    format!("{}{}", stem, extension)
}
