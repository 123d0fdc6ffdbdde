//! Title normalization.
//!
//! Two independent stages:
//!
//! * [`Normalizer::normalize`] canonicalizes a title or author before it is
//!   stored. Four steps, in a fixed order; homoglyphs go first because the
//!   later patterns match literal ASCII punctuation.
//! * [`Normalizer::fold`] produces the transient comparison form used by the
//!   scorers. Results are memoized per distinct input for the lifetime of the
//!   normalizer, which is one run.

use std::collections::HashMap;
use std::rc::Rc;

use regex::Regex;
use tracing::info;
use unicode_normalization::char::is_combining_mark;
use unicode_normalization::UnicodeNormalization;

/// Result of [`Normalizer::normalize`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Normalized {
    pub text: String,
    pub corrected: bool,
}

pub struct Normalizer {
    series_suffix: Regex,
    shelf_mark: Regex,
    terminal_punct: Regex,
    corrections: usize,
    fold_cache: HashMap<String, Rc<str>>,
}

impl Default for Normalizer {
    fn default() -> Self {
        Self::new()
    }
}

impl Normalizer {
    pub fn new() -> Self {
        Self {
            series_suffix: Regex::new(r"(?i)\s+\(?sehen,\s*staunen,\s*wissen\)?$")
                .expect("series suffix pattern"),
            shelf_mark: Regex::new(r"(?:\s*\([\w(]+?\))+$").expect("shelf mark pattern"),
            terminal_punct: Regex::new(r"\s+([!?])$").expect("terminal punctuation pattern"),
            corrections: 0,
            fold_cache: HashMap::new(),
        }
    }

    /// Number of individual corrections applied so far.
    pub fn corrections(&self) -> usize {
        self.corrections
    }

    /// Apply all four canonicalization steps.
    pub fn normalize(&mut self, raw: &str) -> Normalized {
        let mut text = raw.to_string();
        let mut corrected = false;

        let steps: [(&str, fn(&Self, &str) -> String); 4] = [
            ("homoglyph", |_, s| replace_homoglyphs(s)),
            ("series_suffix", Self::strip_series_suffix),
            ("shelf_mark", Self::strip_shelf_mark),
            ("terminal_punctuation", Self::tighten_terminal_punctuation),
        ];

        for (step, apply) in steps {
            let next = apply(self, &text);
            if next != text {
                info!(step, before = %text, after = %next, "title corrected");
                self.corrections += 1;
                corrected = true;
                text = next;
            }
        }

        Normalized { text, corrected }
    }

    /// Step 2: drop a trailing "Sehen, Staunen, Wissen" series name.
    pub fn strip_series_suffix(&self, s: &str) -> String {
        self.series_suffix.replace(s, "").into_owned()
    }

    /// Step 3: drop trailing parenthesized shelf-mark annotations.
    pub fn strip_shelf_mark(&self, s: &str) -> String {
        self.shelf_mark.replace(s, "").into_owned()
    }

    /// Step 4: "Hallo Welt !" -> "Hallo Welt!".
    pub fn tighten_terminal_punctuation(&self, s: &str) -> String {
        self.terminal_punct.replace(s, "$1").into_owned()
    }

    /// Comparison form: case, diacritics and punctuation folded away.
    pub fn fold(&mut self, raw: &str) -> Rc<str> {
        if let Some(hit) = self.fold_cache.get(raw) {
            return Rc::clone(hit);
        }
        let folded: Rc<str> = Rc::from(fold_text(raw));
        self.fold_cache.insert(raw.to_string(), Rc::clone(&folded));
        folded
    }

    pub fn cache_len(&self) -> usize {
        self.fold_cache.len()
    }

    pub fn clear_cache(&mut self) {
        self.fold_cache.clear();
    }
}

/// Step 1: en dash, em dash and Unicode hyphen become ASCII hyphen-minus.
pub fn replace_homoglyphs(s: &str) -> String {
    s.replace(['\u{2013}', '\u{2014}', '\u{2010}'], "-")
}

fn fold_text(raw: &str) -> String {
    let mut out = String::with_capacity(raw.len());
    let mut space_pending = false;

    for ch in raw.nfkd().filter(|c| !is_combining_mark(*c)) {
        if ch.is_alphanumeric() {
            if space_pending && !out.is_empty() {
                out.push(' ');
            }
            space_pending = false;
            for lower in ch.to_lowercase() {
                if lower == 'ß' {
                    out.push_str("ss");
                } else {
                    out.push(lower);
                }
            }
        } else {
            space_pending = true;
        }
    }

    out
}
