use lazy_static::lazy_static;
use regex::Regex;

lazy_static! {
    static ref NON_WORD: Regex = Regex::new(r"\W").unwrap();
}

/// The one normalization rule for every table and column name in the
/// system: replace non-word characters and a leading digit with `_`, then
/// uppercase. Applied at creation time and on every later reference, so a
/// caller-supplied name always resolves to the same identifier.
pub fn sanitize_identifier(raw: &str) -> String {
    let mut ident = NON_WORD.replace_all(raw, "_").to_uppercase();
    match ident.chars().next() {
        None => ident.push('_'),
        Some(first) if first.is_ascii_digit() => ident.replace_range(0..1, "_"),
        Some(_) => {}
    }
    ident
}

/// Quotes a sanitized identifier for splicing into SQL text. This is the
/// only path by which an identifier reaches an executable statement.
pub fn quote_identifier(sanitized: &str) -> String {
    format!("\"{}\"", sanitized)
}
