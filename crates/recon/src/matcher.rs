//! Similarity scorers over fold-normalized titles.
//!
//! All scores are in `[0, 100]`. Empty operands never match anything.

/// A comparison function over two fold-normalized strings.
pub trait Scorer {
    fn name(&self) -> &'static str;

    fn score(&self, a: &str, b: &str) -> f64;

    /// Score two titles whose token data was computed up front. Bulk
    /// callers prepare each title once and compare it against many.
    fn score_prepared(&self, a: &Prepared<'_>, b: &Prepared<'_>) -> f64 {
        self.score(a.text(), b.text())
    }
}

/// 100 on equality, 0 otherwise.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExactScorer;

impl Scorer for ExactScorer {
    fn name(&self) -> &'static str {
        "exact"
    }

    fn score(&self, a: &str, b: &str) -> f64 {
        if !a.is_empty() && a == b {
            100.0
        } else {
            0.0
        }
    }
}

/// Token-set overlap. A title whose tokens are a subset of the other's scores
/// 100, which makes this useful for tiering but too lenient to accept on.
#[derive(Debug, Clone, Copy, Default)]
pub struct SetOverlapScorer;

impl Scorer for SetOverlapScorer {
    fn name(&self) -> &'static str {
        "set_overlap"
    }

    fn score(&self, a: &str, b: &str) -> f64 {
        token_set_ratio(a, b)
    }

    fn score_prepared(&self, a: &Prepared<'_>, b: &Prepared<'_>) -> f64 {
        prepared_token_set(a, b)
    }
}

/// Weighted blend of edit, token and partial similarity.
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedScorer;

impl Scorer for WeightedScorer {
    fn name(&self) -> &'static str {
        "weighted"
    }

    fn score(&self, a: &str, b: &str) -> f64 {
        weighted_ratio(a, b)
    }

    fn score_prepared(&self, a: &Prepared<'_>, b: &Prepared<'_>) -> f64 {
        prepared_weighted(a, b)
    }
}

// ---------------------------------------------------------------------------
// Prepared titles
// ---------------------------------------------------------------------------

/// A folded title split once into the forms the token scorers compare.
#[derive(Debug, Clone)]
pub struct Prepared<'a> {
    text: &'a str,
    chars: Vec<char>,
    /// Sorted, duplicates kept.
    sorted: String,
    /// Sorted and deduplicated.
    unique: Vec<&'a str>,
    unique_chars: Vec<char>,
}

impl<'a> Prepared<'a> {
    pub fn new(text: &'a str) -> Self {
        let mut tokens: Vec<&str> = text.split_whitespace().collect();
        tokens.sort_unstable();
        let sorted = tokens.join(" ");
        tokens.dedup();
        let unique_chars = tokens.join(" ").chars().collect();
        Self {
            text,
            chars: text.chars().collect(),
            sorted,
            unique: tokens,
            unique_chars,
        }
    }

    pub fn text(&self) -> &'a str {
        self.text
    }

    fn len(&self) -> usize {
        self.chars.len()
    }
}

/// Shared tokens plus the tokens only `a` and only `b` have, all sorted.
fn split_tokens<'a>(a: &[&'a str], b: &[&'a str]) -> (Vec<&'a str>, Vec<&'a str>, Vec<&'a str>) {
    let (mut common, mut only_a, mut only_b) = (Vec::new(), Vec::new(), Vec::new());
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(b[j]) {
            std::cmp::Ordering::Equal => {
                common.push(a[i]);
                i += 1;
                j += 1;
            }
            std::cmp::Ordering::Less => {
                only_a.push(a[i]);
                i += 1;
            }
            std::cmp::Ordering::Greater => {
                only_b.push(b[j]);
                j += 1;
            }
        }
    }
    only_a.extend_from_slice(&a[i..]);
    only_b.extend_from_slice(&b[j..]);
    (common, only_a, only_b)
}

fn shares_token(a: &[&str], b: &[&str]) -> bool {
    let (mut i, mut j) = (0, 0);
    while i < a.len() && j < b.len() {
        match a[i].cmp(b[j]) {
            std::cmp::Ordering::Equal => return true,
            std::cmp::Ordering::Less => i += 1,
            std::cmp::Ordering::Greater => j += 1,
        }
    }
    false
}

// ---------------------------------------------------------------------------
// Ratios
// ---------------------------------------------------------------------------

const UNBASE_SCALE: f64 = 0.95;

/// Normalized Indel similarity, scaled to 100.
pub fn ratio(a: &str, b: &str) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    rapidfuzz::fuzz::ratio(a.chars(), b.chars()) * 100.0
}

fn char_ratio(a: &[char], b: &[char]) -> f64 {
    if a.is_empty() || b.is_empty() {
        return 0.0;
    }
    rapidfuzz::fuzz::ratio(a.iter().copied(), b.iter().copied()) * 100.0
}

/// Ratio of the alphabetically sorted token sequences.
pub fn token_sort_ratio(a: &str, b: &str) -> f64 {
    ratio(&Prepared::new(a).sorted, &Prepared::new(b).sorted)
}

/// Compare the shared tokens against each side's shared-plus-remaining tokens.
pub fn token_set_ratio(a: &str, b: &str) -> f64 {
    prepared_token_set(&Prepared::new(a), &Prepared::new(b))
}

fn prepared_token_set(a: &Prepared<'_>, b: &Prepared<'_>) -> f64 {
    if a.unique.is_empty() || b.unique.is_empty() {
        return 0.0;
    }

    let (common, only_a, only_b) = split_tokens(&a.unique, &b.unique);
    if common.is_empty() {
        return char_ratio(&a.unique_chars, &b.unique_chars);
    }
    if only_a.is_empty() || only_b.is_empty() {
        return 100.0;
    }

    let sect = common.join(" ");
    let with_a = format!("{sect} {}", only_a.join(" "));
    let with_b = format!("{sect} {}", only_b.join(" "));

    ratio(&with_a, &with_b)
        .max(ratio(&sect, &with_a))
        .max(ratio(&sect, &with_b))
}

/// Best ratio of the shorter string against any equally long window of the
/// longer one.
pub fn partial_ratio(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    char_partial_ratio(&a, &b)
}

fn char_partial_ratio(a: &[char], b: &[char]) -> f64 {
    let (short, long) = if a.len() <= b.len() { (a, b) } else { (b, a) };
    if short.is_empty() {
        return 0.0;
    }
    if short.len() == long.len() {
        return char_ratio(short, long);
    }

    let mut best: f64 = 0.0;
    for window in long.windows(short.len()) {
        best = best.max(char_ratio(short, window));
        if best >= 100.0 {
            break;
        }
    }
    best
}

fn partial_token_ratio(a: &Prepared<'_>, b: &Prepared<'_>) -> f64 {
    if a.unique.is_empty() || b.unique.is_empty() {
        return 0.0;
    }
    if shares_token(&a.unique, &b.unique) {
        return 100.0;
    }
    char_partial_ratio(&a.unique_chars, &b.unique_chars)
}

/// Length-aware blend: whole-string and token comparisons for titles of
/// similar length, partial comparisons once one is much longer.
pub fn weighted_ratio(a: &str, b: &str) -> f64 {
    prepared_weighted(&Prepared::new(a), &Prepared::new(b))
}

fn prepared_weighted(a: &Prepared<'_>, b: &Prepared<'_>) -> f64 {
    if a.chars.is_empty() || b.chars.is_empty() {
        return 0.0;
    }

    let len_a = a.len() as f64;
    let len_b = b.len() as f64;
    let len_ratio = len_a.max(len_b) / len_a.min(len_b);

    let mut best = char_ratio(&a.chars, &b.chars);

    if len_ratio < 1.5 {
        let token = ratio(&a.sorted, &b.sorted).max(prepared_token_set(a, b));
        return best.max(token * UNBASE_SCALE);
    }

    let partial_scale = if len_ratio < 8.0 { 0.9 } else { 0.6 };
    best = best.max(char_partial_ratio(&a.chars, &b.chars) * partial_scale);
    best.max(partial_token_ratio(a, b) * UNBASE_SCALE * partial_scale)
}
