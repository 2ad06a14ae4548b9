use rand::Rng;

const SLUG_CHARSET: &[u8] = b"abcdefghijklmnopqrstuvwxyz0123456789";
pub const GENERATED_SLUG_LEN: usize = 6;
pub const MAX_SLUG_LEN: usize = 64;

/// Random lowercase alphanumeric slug of [`GENERATED_SLUG_LEN`] characters.
pub fn generate() -> String {
    let mut rng = rand::rng();
    (0..GENERATED_SLUG_LEN)
        .map(|_| SLUG_CHARSET[rng.random_range(0..SLUG_CHARSET.len())] as char)
        .collect()
}

pub fn validate(slug: &str) -> Result<(), String> {
    if slug.is_empty() {
        return Err("slug cannot be empty".to_string());
    }
    if slug.len() > MAX_SLUG_LEN {
        return Err(format!("slug cannot be longer than {} characters", MAX_SLUG_LEN));
    }
    if !slug
        .bytes()
        .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit() || byte == b'-')
    {
        return Err(format!(
            "slug may only contain lowercase letters, digits and '-': {}",
            slug
        ));
    }
    if slug.starts_with('-') || slug.ends_with('-') {
        return Err(format!("slug cannot start or end with '-': {}", slug));
    }
    Ok(())
}

/// Derives a slug from a list title: runs of anything but `[a-z0-9]` collapse
/// into a single `-`.
pub fn from_title(title: &str) -> String {
    let mut slug = String::with_capacity(title.len());
    let mut pending_dash = false;
    for ch in title.chars().flat_map(char::to_lowercase) {
        if ch.is_ascii_lowercase() || ch.is_ascii_digit() {
            if pending_dash && !slug.is_empty() {
                slug.push('-');
            }
            pending_dash = false;
            slug.push(ch);
        } else {
            pending_dash = true;
        }
    }
    slug.truncate(MAX_SLUG_LEN);
    slug.trim_end_matches('-').to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn generated_slugs_are_short_lowercase_alphanumeric() {
        for _ in 0..64 {
            let slug = generate();
            assert_eq!(slug.len(), GENERATED_SLUG_LEN);
            assert!(slug
                .bytes()
                .all(|byte| byte.is_ascii_lowercase() || byte.is_ascii_digit()));
            assert!(validate(&slug).is_ok());
        }
    }

    #[test]
    fn generated_slugs_differ() {
        assert_ne!(generate(), generate());
    }

    #[test]
    fn validation_rules() {
        assert!(validate("reading-list-2024").is_ok());
        assert!(validate("").is_err());
        assert!(validate("Upper").is_err());
        assert!(validate("has space").is_err());
        assert!(validate("-leading").is_err());
        assert!(validate("trailing-").is_err());
        assert!(validate(&"a".repeat(MAX_SLUG_LEN + 1)).is_err());
    }

    #[test]
    fn title_derivation() {
        assert_eq!(from_title("My Rust Links!"), "my-rust-links");
        assert_eq!(from_title("  --Hello,   World--  "), "hello-world");
        assert_eq!(from_title("Café 2024"), "caf-2024");
        assert_eq!(from_title("!!!"), "");
    }
}
