//! Slug, SKU and subdomain normalization.

/// Lowercase, map anything outside `[a-z0-9-]` to `-`, collapse repeats, trim edges.
pub fn slugify(input: &str) -> String {
    let mapped: String = input
        .trim()
        .to_lowercase()
        .chars()
        .map(|c| if c.is_ascii_lowercase() || c.is_ascii_digit() { c } else { '-' })
        .collect();
    collapse_dashes(&mapped)
}

fn collapse_dashes(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    for c in input.chars() {
        if c == '-' && out.ends_with('-') {
            continue;
        }
        out.push(c);
    }
    out.trim_matches('-').to_string()
}

/// Base SKU derived from a product name: uppercase with whitespace runs replaced by `-`.
pub fn sku_from_name(name: &str) -> String {
    name.split_whitespace()
        .map(|part| part.to_uppercase())
        .collect::<Vec<_>>()
        .join("-")
}

/// `base`, then `base-1`, `base-2`, ... for the given attempt number.
pub fn with_suffix(base: &str, attempt: u32) -> String {
    if attempt == 0 {
        base.to_string()
    } else {
        format!("{base}-{attempt}")
    }
}

pub const MAX_SUBDOMAIN_LEN: usize = 63;

/// Normalize user input into a DNS label under `root_domain`.
/// Returns `None` when nothing usable remains.
pub fn normalize_subdomain(input: &str, root_domain: &str) -> Option<String> {
    let lowered = input.trim().to_lowercase();
    let suffix = format!(".{}", root_domain.to_lowercase());
    let label = lowered.strip_suffix(&suffix).unwrap_or(&lowered);

    let slug = slugify(label);
    if slug.is_empty() {
        return None;
    }

    let truncated: String = slug.chars().take(MAX_SUBDOMAIN_LEN).collect();
    let trimmed = truncated.trim_end_matches('-').to_string();
    if trimmed.is_empty() { None } else { Some(trimmed) }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slugify_basic() {
        assert_eq!(slugify("My Great Store"), "my-great-store");
        assert_eq!(slugify("  Café & Co!  "), "caf-co");
        assert_eq!(slugify("a---b"), "a-b");
        assert_eq!(slugify("--x--"), "x");
        assert_eq!(slugify("!!!"), "");
    }

    #[test]
    fn sku_from_name_uppercases() {
        assert_eq!(sku_from_name("blue  cotton shirt"), "BLUE-COTTON-SHIRT");
        assert_eq!(sku_from_name("Mug"), "MUG");
    }

    #[test]
    fn suffixes() {
        assert_eq!(with_suffix("shop", 0), "shop");
        assert_eq!(with_suffix("shop", 2), "shop-2");
    }

    #[test]
    fn subdomain_strips_root_and_invalid_chars() {
        assert_eq!(
            normalize_subdomain("My_Shop.shopx.store", "shopx.store").as_deref(),
            Some("my-shop")
        );
        assert_eq!(normalize_subdomain("shop!!", "shopx.store").as_deref(), Some("shop"));
        assert_eq!(normalize_subdomain("***", "shopx.store"), None);
    }

    #[test]
    fn subdomain_truncates_to_label_length() {
        let long = "a".repeat(80);
        let normalized = normalize_subdomain(&long, "shopx.store").unwrap();
        assert_eq!(normalized.len(), MAX_SUBDOMAIN_LEN);
    }
}
