use rand::{Rng, distr::Alphanumeric};

/// Builds a human-readable reference such as `TOPUP-7QK2M9XA`.
pub fn generate_reference(prefix: &str) -> String {
    let suffix: String = rand::rng()
        .sample_iter(Alphanumeric)
        .take(8)
        .map(|c| char::from(c).to_ascii_uppercase())
        .collect();
    format!("{}-{}", prefix, suffix)
}

/// Trims optional free-text input, treating blank strings as absent.
pub fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
