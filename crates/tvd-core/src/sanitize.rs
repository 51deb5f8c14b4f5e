//! File name checks for staging files and user-supplied output prefixes.

/// Linux NAME_MAX.
const NAME_MAX: usize = 255;

/// Staging file name for job `index`: `{index:06}_{sanitized name}`.
///
/// The index prefix keeps names unique within one run even when segment
/// names repeat or sanitize to the same string.
///
/// Segment names come from the source and may carry directories
/// (`chunked/17.ts`) or query strings. Separators, `|` (the ffmpeg `concat:`
/// delimiter), NUL and control characters become `_`. Leading dots are
/// stripped so the result can never be `..`, and the result is capped at
/// NAME_MAX bytes. Never returns an empty string.
pub fn indexed_staging_name(index: usize, name: &str) -> String {
    let prefix = format!("{index:06}_");
    let rest = sanitize_component(name, NAME_MAX.saturating_sub(prefix.len()));
    prefix + &rest
}

fn sanitize_component(name: &str, max_len: usize) -> String {
    let replaced: String = name
        .chars()
        .map(|c| {
            if c == '/' || c == '\\' || c == '|' || c == '\0' || c.is_control() {
                '_'
            } else {
                c
            }
        })
        .collect();
    let trimmed = replaced.trim_start_matches('.').trim();
    if trimmed.is_empty() {
        return "segment".to_string();
    }
    let mut take = trimmed.len().min(max_len);
    while !trimmed.is_char_boundary(take) {
        take -= 1;
    }
    trimmed[..take].to_string()
}

/// True if `prefix` can be glued onto a file name without changing directory
/// or smuggling in control characters.
pub fn is_valid_file_prefix(prefix: &str) -> bool {
    !prefix.is_empty()
        && prefix.len() <= NAME_MAX
        && prefix != "."
        && prefix != ".."
        && !prefix
            .chars()
            .any(|c| c == '/' || c == '\\' || c == '\0' || c.is_control())
}
