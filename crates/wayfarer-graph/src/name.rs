//! Unique-name generation for renamed transitions and decisions.

/// Find a name not currently taken, starting from `base`.
///
/// If `base` is free it is returned as-is. Otherwise a `.N` suffix is
/// appended (or, if the base already ends in a numeric suffix, that
/// suffix is replaced) and the lowest free number is used.
pub fn unique_name(base: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(base) {
        return base.to_string();
    }

    // Ensure a digit suffix to count up from
    let (stem, mut suffix) = match base.rsplit_once('.') {
        Some((stem, digits)) if !digits.is_empty() && digits.chars().all(|c| c.is_ascii_digit()) => {
            (stem.to_string(), digits.parse::<u64>().unwrap_or(0))
        }
        _ => (base.to_string(), 1),
    };

    let mut candidate = format!("{stem}.{suffix}");
    while taken(&candidate) {
        suffix += 1;
        candidate = format!("{stem}.{suffix}");
    }
    candidate
}
