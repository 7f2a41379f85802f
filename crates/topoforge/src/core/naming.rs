//! Name handling shared by the store and the exporters
//!
//! Resource names, network names and Terraform identifiers all have narrower
//! alphabets than device names. These helpers map between them.

/// Lowercase slug of a display name: ASCII alphanumerics kept, every other
/// run of characters collapsed into a single `-`.
pub fn slug(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    let mut pending_dash = false;

    for ch in name.chars() {
        if ch.is_ascii_alphanumeric() {
            if pending_dash && !out.is_empty() {
                out.push('-');
            }
            pending_dash = false;
            out.push(ch.to_ascii_lowercase());
        } else {
            pending_dash = true;
        }
    }

    out
}

/// Returns true if `name` matches `[A-Za-z0-9][A-Za-z0-9_.-]*`
pub fn is_valid_network_name(name: &str) -> bool {
    let mut chars = name.chars();
    match chars.next() {
        Some(first) if first.is_ascii_alphanumeric() => {}
        _ => return false,
    }
    chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
}

/// Network name used when a connection is created without one.
///
/// Built from the slugs of both device names in lexicographic order, so the
/// result does not depend on which device was clicked first.
pub fn default_network_name(first: &str, second: &str) -> String {
    let mut slugs = [slug_or(first, "device"), slug_or(second, "device")];
    slugs.sort();
    format!("net-{}-{}", slugs[0], slugs[1])
}

/// Slug of `name`, or `fallback` when nothing survives slugging
pub fn slug_or(name: &str, fallback: &str) -> String {
    let slug = slug(name);
    if slug.is_empty() {
        fallback.to_string()
    } else {
        slug
    }
}

/// Terraform identifier for an already-slugged name.
///
/// Identifiers may contain letters, digits, `_` and `-` but must start with a
/// letter or underscore. Dashes and dots are folded into `_` to keep
/// references readable.
pub fn terraform_ident(name: &str, prefix: &str) -> String {
    let mut ident: String = name
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() { c } else { '_' })
        .collect();

    let starts_ok = ident
        .chars()
        .next()
        .map(|c| c.is_ascii_alphabetic() || c == '_')
        .unwrap_or(false);
    if !starts_ok {
        ident.insert_str(0, prefix);
    }
    ident
}
