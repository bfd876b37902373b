//! Locale independent natural ordering of names.
//!
//! Names are split into alternating runs of ASCII digits and non-digits. Digit
//! runs compare by numeric value (of any length), other runs compare
//! case-insensitively. `2-work` therefore sorts before `10-extra`.

use std::cmp::Ordering;

#[derive(Debug, PartialEq, Eq)]
enum Chunk<'a> {
    Digits(&'a str),
    Text(&'a str),
}

struct Chunks<'a> {
    rest: &'a str,
}

impl<'a> Iterator for Chunks<'a> {
    type Item = Chunk<'a>;

    fn next(&mut self) -> Option<Chunk<'a>> {
        let first = self.rest.chars().next()?;
        let digits = first.is_ascii_digit();
        let end = self
            .rest
            .find(|c: char| c.is_ascii_digit() != digits)
            .unwrap_or(self.rest.len());
        let (chunk, rest) = self.rest.split_at(end);
        self.rest = rest;
        Some(if digits {
            Chunk::Digits(chunk)
        } else {
            Chunk::Text(chunk)
        })
    }
}

fn chunks(name: &str) -> Chunks<'_> {
    Chunks { rest: name }
}

/// Compares two digit runs by value without parsing, so arbitrarily long runs
/// never overflow.
fn compare_digits(a: &str, b: &str) -> Ordering {
    let a = a.trim_start_matches('0');
    let b = b.trim_start_matches('0');
    a.len().cmp(&b.len()).then_with(|| a.cmp(b))
}

fn compare_text(a: &str, b: &str) -> Ordering {
    a.chars()
        .flat_map(char::to_lowercase)
        .cmp(b.chars().flat_map(char::to_lowercase))
}

/// Natural order of two names, ignoring case and zero padding.
///
/// This alone is not a total order (`"a"` and `"A"` compare equal); use
/// [`compare`] for sorting.
pub fn compare_natural(a: &str, b: &str) -> Ordering {
    let mut left = chunks(a);
    let mut right = chunks(b);
    loop {
        let ordering = match (left.next(), right.next()) {
            (None, None) => return Ordering::Equal,
            (None, Some(_)) => return Ordering::Less,
            (Some(_), None) => return Ordering::Greater,
            (Some(Chunk::Digits(x)), Some(Chunk::Digits(y))) => compare_digits(x, y),
            (Some(Chunk::Text(x)), Some(Chunk::Text(y))) => compare_text(x, y),
            // Digits sort before text at the same position.
            (Some(Chunk::Digits(_)), Some(Chunk::Text(_))) => Ordering::Less,
            (Some(Chunk::Text(_)), Some(Chunk::Digits(_))) => Ordering::Greater,
        };
        if ordering != Ordering::Equal {
            return ordering;
        }
    }
}

/// Total order: natural order first, raw byte order as the tie-break.
pub fn compare(a: &str, b: &str) -> Ordering {
    compare_natural(a, b).then_with(|| a.cmp(b))
}
