//! Fuzzy comparison of free-text answers.
//!
//! Answers are normalized (whitespace, accents, case, punctuation, quote and
//! dash variants) and then compared with a Levenshtein distance budget of 10%
//! of the longer string, at least 1. Strings shorter than 3 characters must
//! match exactly.

use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Punctuation removed before comparison
const STRIPPED_PUNCTUATION: &[char] = &[
    '!', '?', '.', ',', ';', ':', '(', ')', '[', ']', '{', '}', '"',
];

/// Below this length (in chars) only an exact match is accepted
const MIN_FUZZY_LEN: usize = 3;

fn canonical_char(c: char) -> char {
    match c {
        '\u{2018}' | '\u{2019}' | '\u{201A}' | '\u{201B}' | '\u{2032}' | '`' | '\u{00B4}' => '\'',
        '\u{201C}' | '\u{201D}' | '\u{201E}' | '\u{201F}' | '\u{00AB}' | '\u{00BB}' => '"',
        '\u{2010}' | '\u{2011}' | '\u{2012}' | '\u{2013}' | '\u{2014}' | '\u{2015}'
        | '\u{2212}' => '-',
        other => other,
    }
}

fn collapse_whitespace(s: &str) -> String {
    s.split_whitespace().collect::<Vec<_>>().join(" ")
}

/// Normalize an answer for comparison
pub fn normalize(s: &str) -> String {
    let collapsed = collapse_whitespace(s);

    let normalized: String = collapsed
        .nfd()
        .filter(|c| !is_combining_mark(*c))
        .collect::<String>()
        .to_lowercase()
        .chars()
        .filter(|c| !STRIPPED_PUNCTUATION.contains(c))
        .map(canonical_char)
        .collect();

    normalized.trim().to_string()
}

/// Edit distance over chars (not bytes)
pub fn levenshtein(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();

    if a.is_empty() {
        return b.len();
    }
    if b.is_empty() {
        return a.len();
    }

    let mut prev: Vec<usize> = (0..=b.len()).collect();
    let mut curr = vec![0; b.len() + 1];

    for (i, ca) in a.iter().enumerate() {
        curr[0] = i + 1;
        for (j, cb) in b.iter().enumerate() {
            let cost = usize::from(ca != cb);
            curr[j + 1] = (prev[j + 1] + 1).min(curr[j] + 1).min(prev[j] + cost);
        }
        std::mem::swap(&mut prev, &mut curr);
    }

    prev[b.len()]
}

/// Whether a submitted answer should be accepted against the expected one
pub fn compare(a: &str, b: &str) -> bool {
    let na = normalize(a);
    let nb = normalize(b);

    if na == nb {
        return true;
    }

    let max_len = na.chars().count().max(nb.chars().count());
    if max_len < MIN_FUZZY_LEN {
        return false;
    }

    let allowed = (max_len / 10).max(1);
    levenshtein(&na, &nb) <= allowed
}
