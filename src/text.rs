//! Text cleanup applied to element text before it is handed to the language model.

/// Drop blank lines and collapse every whitespace run into a single space.
///
/// Total and idempotent; whitespace-only input gives an empty string.
pub fn normalize(text: &str) -> String {
    let joined = text
        .lines()
        .filter(|line| !line.trim().is_empty())
        .collect::<Vec<_>>()
        .join("\n");

    joined.split_whitespace().collect::<Vec<_>>().join(" ")
}
