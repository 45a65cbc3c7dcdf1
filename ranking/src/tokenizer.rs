use lazy_static::lazy_static;
use regex::Regex;

use crate::index::Term;

lazy_static! {
    // Underscore is a word character for `\W`, so it is listed explicitly.
    static ref SEPARATORS: Regex = Regex::new(r"[\W_]+").expect("valid regex");
}

/// Replace every run of non-alphanumeric characters with a space, lowercase,
/// and split on whitespace. No stemming or stopword removal is applied.
pub fn normalize(text: &str) -> Vec<Term> {
    let replaced = SEPARATORS.replace_all(text, " ").to_lowercase();
    replaced.split_whitespace().map(str::to_string).collect()
}
