use regex::Regex;
use std::sync::LazyLock;

/// Runs of digits, letters, whitespace, or any single other character.
static TOKEN_RUNS: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?is)\d+|[a-z]+|\s+|.").unwrap());

fn run_cost(run: &str) -> usize {
    let mut chars = run.chars();
    let Some(first) = chars.next() else {
        return 0;
    };
    if first.is_whitespace() {
        return 0;
    }
    if first.is_numeric() || first.is_alphabetic() {
        return run.chars().count().div_ceil(4);
    }
    1
}

/// Estimate what `text` costs against the summarizer's input budget.
///
/// Whitespace is free, digit and letter runs cost one unit per started group
/// of four characters, and every other character costs one. This is a stable
/// upper-ish bound for batching, not the model's real tokenizer.
pub fn estimate(text: &str) -> usize {
    TOKEN_RUNS
        .find_iter(text)
        .map(|m| run_cost(m.as_str()))
        .sum()
}

/// Partition `fragments` greedily, in order, into batches whose summed
/// estimate stays within `budget`.
///
/// A fragment that alone exceeds the budget becomes its own batch. No batch is
/// ever empty, so an empty input yields no batches.
pub fn split<T: AsRef<str>>(fragments: Vec<T>, budget: usize) -> Vec<Vec<T>> {
    let mut batches = Vec::new();
    let mut current = Vec::new();
    let mut current_cost = 0usize;

    for fragment in fragments {
        let cost = estimate(fragment.as_ref());
        if !current.is_empty() && current_cost.saturating_add(cost) > budget {
            batches.push(std::mem::take(&mut current));
            current_cost = 0;
        }
        current_cost = current_cost.saturating_add(cost);
        current.push(fragment);
    }

    if !current.is_empty() {
        batches.push(current);
    }
    batches
}
