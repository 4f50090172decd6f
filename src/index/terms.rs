//! Pure, deterministic path-string tokenizer (§4.7). Does not depend on
//! tantivy: this is a plain function so it can be proptested in isolation
//! and so the same rules apply whether a term ends up in `basename_terms`,
//! `dirname_terms`, or `content`.

use std::collections::HashSet;

/// Punctuation replaced unconditionally with a space. Notably excludes `.`
/// and `,`, which are only split points when adjacent to a non-digit
/// (handled in `split_fragments`), so that version strings like `3.0` stay
/// joined.
const PUNCT_CLASS: &str = "!\"#$%&'()*+-/:;<=>?@[\\]^_`{|}~";

/// Extract the set of search terms from a path component (a basename,
/// dirname segment, or piece of extracted content).
#[must_use]
pub fn terms(input: &str) -> HashSet<String> {
    let step1 = replace_punctuation(input);
    let step2 = insert_digit_letter_boundaries(&step1);
    let fragments = split_fragments(&step2);

    let mut out = HashSet::new();
    for fragment in fragments {
        collect_accepted(&fragment, &mut out);
    }
    out
}

fn collect_accepted(fragment: &str, out: &mut HashSet<String>) {
    if fragment.is_empty() {
        return;
    }
    if accept_length(fragment) {
        out.insert(fragment.to_lowercase());
    }

    let translit = transliterate(fragment);
    if translit != fragment && accept_length(&translit) {
        out.insert(translit.to_lowercase());
    }

    for sub in camel_case_split(&translit) {
        if accept_length(&sub) {
            out.insert(sub.to_lowercase());
        }
    }
}

/// `len(f) >= 3`, or `f` is a single character in the whitelist `{0-9, c, C}`.
fn accept_length(fragment: &str) -> bool {
    let char_count = fragment.chars().count();
    if char_count >= 3 {
        return true;
    }
    if char_count == 1 {
        let c = fragment.chars().next().expect("char_count == 1");
        return c.is_ascii_digit() || c == 'c' || c == 'C';
    }
    false
}

fn replace_punctuation(input: &str) -> String {
    input
        .chars()
        .map(|c| if PUNCT_CLASS.contains(c) { ' ' } else { c })
        .collect()
}

/// Insert a space at every transition between a letter and a digit, in
/// either direction.
fn insert_digit_letter_boundaries(input: &str) -> String {
    let chars: Vec<char> = input.chars().collect();
    let mut out = String::with_capacity(input.len() + 8);
    for (i, &c) in chars.iter().enumerate() {
        if i > 0 {
            let prev = chars[i - 1];
            let boundary = (prev.is_alphabetic() && c.is_ascii_digit())
                || (prev.is_ascii_digit() && c.is_alphabetic());
            if boundary {
                out.push(' ');
            }
        }
        out.push(c);
    }
    out
}

/// Split on whitespace, then split each whitespace-delimited token on `.`
/// or `,` unless both neighboring characters are digits.
fn split_fragments(input: &str) -> Vec<String> {
    input
        .split_whitespace()
        .flat_map(split_dot_comma)
        .collect()
}

fn split_dot_comma(token: &str) -> Vec<String> {
    let chars: Vec<char> = token.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    for (i, &c) in chars.iter().enumerate() {
        if c == '.' || c == ',' {
            let left_digit = i > 0 && chars[i - 1].is_ascii_digit();
            let right_digit = i + 1 < chars.len() && chars[i + 1].is_ascii_digit();
            if left_digit && right_digit {
                current.push(c);
            } else {
                if !current.is_empty() {
                    parts.push(std::mem::take(&mut current));
                }
            }
            continue;
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}

/// `{a,e,i,o,u,u,n}`-accented Spanish vowels/ñ transliterated to their plain
/// Latin equivalent, case preserved, so CamelCase splitting still works on
/// the result.
fn transliterate(input: &str) -> String {
    input
        .chars()
        .map(|c| match c {
            'á' => 'a',
            'é' => 'e',
            'í' => 'i',
            'ó' => 'o',
            'ú' => 'u',
            'ü' => 'u',
            'ñ' => 'n',
            'Á' => 'A',
            'É' => 'E',
            'Í' => 'I',
            'Ó' => 'O',
            'Ú' => 'U',
            'Ü' => 'U',
            'Ñ' => 'N',
            other => other,
        })
        .collect()
}

/// Split at boundaries between `[a-zA-Z]` and `[A-Z][a-z]`.
fn camel_case_split(input: &str) -> Vec<String> {
    let chars: Vec<char> = input.chars().collect();
    let mut parts = Vec::new();
    let mut current = String::new();
    for i in 0..chars.len() {
        let c = chars[i];
        if i > 0
            && c.is_uppercase()
            && chars[i - 1].is_alphabetic()
            && chars.get(i + 1).is_some_and(|n| n.is_lowercase())
            && !current.is_empty()
        {
            parts.push(std::mem::take(&mut current));
        }
        current.push(c);
    }
    if !current.is_empty() {
        parts.push(current);
    }
    parts
}
