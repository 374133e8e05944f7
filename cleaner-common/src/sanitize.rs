//! Normalization of free-form text accepted from callers.
//!
//! Nothing in here makes text safe to splice into SQL. Values are always bound as parameters;
//! these helpers only bound their length and strip characters that have no place in a hook name
//! or an audit entry.
use crate::error::CleanerError;

/// Width of the scheduler's `hook` column.
pub const MAX_HOOK_LENGTH: usize = 191;
/// Longest audit details kept, in characters.
pub const MAX_DETAILS_LENGTH: usize = 4000;
/// Most hooks accepted in a single selective clean.
pub const MAX_SELECTED_HOOKS: usize = 1000;

/// Collapse a single line of text: control characters and runs of whitespace become one space,
/// leading and trailing whitespace is removed.
pub fn sanitize_line(input: &str) -> String {
    input
        .split(|c: char| c.is_whitespace() || c.is_control())
        .filter(|part| !part.is_empty())
        .collect::<Vec<&str>>()
        .join(" ")
}

/// Like [`sanitize_line`] applied to every line, keeping the line breaks. The result is cut to
/// [`MAX_DETAILS_LENGTH`] characters.
pub fn sanitize_details(input: &str) -> String {
    let cleaned = input
        .lines()
        .map(sanitize_line)
        .collect::<Vec<String>>()
        .join("\n");

    match cleaned.char_indices().nth(MAX_DETAILS_LENGTH) {
        Some((cut, _)) => cleaned[..cut].to_owned(),
        None => cleaned,
    }
}

/// Normalize a list of hook names for an exact-match filter.
///
/// Blank entries are dropped and duplicates removed, keeping first-seen order. An entry longer
/// than [`MAX_HOOK_LENGTH`], or more than [`MAX_SELECTED_HOOKS`] entries, is an error rather than
/// being truncated: a truncated name could match a different hook.
pub fn sanitize_hooks<I, S>(hooks: I) -> Result<Vec<String>, CleanerError>
where
    I: IntoIterator<Item = S>,
    S: AsRef<str>,
{
    let mut sanitized: Vec<String> = Vec::new();

    for hook in hooks {
        let hook = sanitize_line(hook.as_ref());
        if hook.is_empty() || sanitized.contains(&hook) {
            continue;
        }

        let length = hook.chars().count();
        if length > MAX_HOOK_LENGTH {
            return Err(CleanerError::InvalidInput(format!(
                "hook name is {} characters long, the limit is {}",
                length, MAX_HOOK_LENGTH
            )));
        }

        sanitized.push(hook);
        if sanitized.len() > MAX_SELECTED_HOOKS {
            return Err(CleanerError::InvalidInput(format!(
                "at most {} hooks can be cleaned at once",
                MAX_SELECTED_HOOKS
            )));
        }
    }

    Ok(sanitized)
}
