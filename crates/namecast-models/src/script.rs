//! Spoken line template for the personalized voice track.

/// Used in place of the name when it is effectively empty.
pub const FALLBACK_ADDRESSEE: &str = "Você";

/// Build the line the voice provider speaks for `name`.
///
/// Deterministic: the same name always yields the same text.
pub fn spoken_line(name: &str) -> String {
    let name = name.trim();
    let addressee = if name.chars().any(char::is_alphanumeric) {
        name
    } else {
        FALLBACK_ADDRESSEE
    };
    format!("{addressee}, você é alguém muito especial... mais do que imagina.")
}
