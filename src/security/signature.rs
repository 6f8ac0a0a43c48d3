//! Named regular-expression signatures shared by the text classifiers.

use regex::Regex;

/// One entry in a signature battery.
#[derive(Debug)]
pub struct Signature {
    pub name: &'static str,
    pub regex: Regex,
}

impl Signature {
    pub fn is_match(&self, input: &str) -> bool {
        self.regex.is_match(input)
    }
}

/// Compile an ordered `(name, pattern)` table.
///
/// Tables are compile-time constants covered by unit tests, so a bad pattern
/// is a programming error.
pub fn compile(table: &[(&'static str, &str)]) -> Vec<Signature> {
    table
        .iter()
        .map(|&(name, pattern)| Signature {
            name,
            regex: Regex::new(pattern)
                .unwrap_or_else(|e| panic!("invalid signature `{name}`: {e}")),
        })
        .collect()
}

/// Name of the first signature in `battery` that matches `input`.
pub fn first_match<'a>(battery: &'a [Signature], input: &str) -> Option<&'a str> {
    battery.iter().find(|s| s.is_match(input)).map(|s| s.name)
}
