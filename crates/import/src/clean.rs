use regex::Regex;
use std::sync::OnceLock;

/// Cleaned names never exceed this many characters.
pub const NAME_MAX_LEN: usize = 50;

/// Payment-processor and bank tokens that trail merchant names in UPI narrations.
pub const PROCESSOR_SUFFIXES: &[&str] = &[
    "payu", "paytm", "razorpay", "phonepe", "gpay", "bhim", "yesbank", "hdfcbank", "icici", "sbi",
    "axis",
];

macro_rules! re {
    ($name:ident, $pat:expr) => {
        fn $name() -> &'static Regex {
            static R: OnceLock<Regex> = OnceLock::new();
            R.get_or_init(|| Regex::new($pat).expect("invalid regex"))
        }
    };
}

re!(rail_prefix, r"(?i)^UPI[-/]");
re!(separators, r"[-_./\s]+");

/// Turn a raw bank narration into a short, title-cased merchant name.
///
/// `UPI-DOMINOS-DOMINOS.PAYU@OKICICI12345` becomes `Dominos`. When nothing
/// survives cleaning, the trimmed input is returned cut to the length limit.
/// Cleaning an already-cleaned name returns it unchanged.
pub fn clean_transaction_name(raw: &str) -> String {
    let trimmed = raw.trim();
    let without_prefix = rail_prefix().replace(trimmed, "");
    let before_handle = without_prefix
        .split_once('@')
        .map_or(&*without_prefix, |(head, _)| head);

    let mut tokens: Vec<&str> = separators()
        .split(before_handle)
        .filter(|t| !t.is_empty() && !t.chars().all(|c| c.is_ascii_digit()))
        .collect();
    tokens.dedup_by(|a, b| a.to_lowercase() == b.to_lowercase());

    // Widths are measured on the title-cased tokens.
    let titled: Vec<String> = tokens.iter().map(|t| title_case(t)).collect();
    let mut kept = fit_to_width(&titled, NAME_MAX_LEN);
    while kept.last().is_some_and(|t| is_processor_suffix(t)) {
        kept.pop();
    }

    if kept.is_empty() {
        return truncate_at_word(trimmed, NAME_MAX_LEN).to_string();
    }
    kept.join(" ")
}

fn is_processor_suffix(token: &str) -> bool {
    let lower = token.to_lowercase();
    PROCESSOR_SUFFIXES.contains(&lower.as_str())
}

/// Keep leading whole tokens while the space-joined width fits. A single
/// oversized first token is hard-cut.
fn fit_to_width(tokens: &[String], max_len: usize) -> Vec<&str> {
    let mut width = 0;
    let mut kept = Vec::new();
    for token in tokens {
        let extra = token.chars().count() + usize::from(!kept.is_empty());
        if width + extra > max_len {
            break;
        }
        width += extra;
        kept.push(token.as_str());
    }
    if kept.is_empty() {
        if let Some(first) = tokens.first() {
            kept.push(cut_chars(first, max_len));
        }
    }
    kept
}

fn cut_chars(s: &str, n: usize) -> &str {
    match s.char_indices().nth(n) {
        Some((idx, _)) => &s[..idx],
        None => s,
    }
}

fn truncate_at_word(s: &str, max_len: usize) -> &str {
    if s.chars().count() <= max_len {
        return s;
    }
    let head = cut_chars(s, max_len);
    let next_is_break = s[head.len()..].starts_with(char::is_whitespace);
    if next_is_break {
        return head.trim_end();
    }
    match head.rfind(char::is_whitespace) {
        Some(idx) if idx > 0 => head[..idx].trim_end(),
        _ => head,
    }
}

/// Upper-case a letter that follows a non-letter, lower-case the rest.
///
/// Only the first char of a multi-char upper-case mapping stays upper
/// (`ß` gives `Ss`), so applying this twice changes nothing.
fn title_case(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    let mut prev_is_letter = false;
    for c in s.chars() {
        if prev_is_letter {
            out.extend(c.to_lowercase());
        } else {
            let mut upper = c.to_uppercase();
            out.extend(upper.next());
            out.extend(upper.flat_map(char::to_lowercase));
        }
        prev_is_letter = c.is_alphabetic() || (prev_is_letter && is_combining_mark(c));
    }
    out
}

/// Combining diacritics attach to the previous letter and do not start a word.
fn is_combining_mark(c: char) -> bool {
    matches!(c, '\u{0300}'..='\u{036F}')
}
