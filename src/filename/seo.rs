use unicode_normalization::{UnicodeNormalization, char::is_combining_mark};

/// Lowercase ASCII slug: diacritics dropped, every other run of
/// non-alphanumerics collapsed into one hyphen.
pub fn slugify(input: &str) -> String {
    let mut out = String::with_capacity(input.len());
    let mut last_dash = false;
    for ch in input.nfd().filter(|c| !is_combining_mark(*c)) {
        for lower in ch.to_lowercase() {
            if lower.is_ascii_alphanumeric() {
                out.push(lower);
                last_dash = false;
            } else if !last_dash {
                out.push('-');
                last_dash = true;
            }
        }
    }
    out.trim_matches('-').to_string()
}

/// `<product-slug>-<sku>[-vue-<n>].<ext>`
pub fn seo_file_name(
    product_name: &str,
    sku: &str,
    extension: &str,
    view: Option<usize>,
) -> String {
    let mut parts: Vec<String> = [slugify(product_name), slugify(sku)]
        .into_iter()
        .filter(|part| !part.is_empty())
        .collect();
    if parts.is_empty() {
        parts.push("image".to_string());
    }
    if let Some(index) = view {
        parts.push(format!("vue-{index}"));
    }
    format!("{}.{}", parts.join("-"), extension.to_ascii_lowercase())
}
