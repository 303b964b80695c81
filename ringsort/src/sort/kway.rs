/// Merge already sorted runs into one sorted run.
///
/// Runs are merged pairwise by recursive halving, so every element is moved
/// `O(log k)` times for `k` runs. Each run is consumed as soon as it has been
/// merged. Ties keep run order: an element of an earlier run comes first.
pub fn merge_all<T: Ord>(mut runs: Vec<Vec<T>>) -> Vec<T> {
    match runs.len() {
        0 => Vec::new(),
        1 => runs.pop().unwrap_or_default(),
        n => {
            let right = runs.split_off(n / 2);
            merge_pair(merge_all(runs), merge_all(right))
        }
    }
}

fn merge_pair<T: Ord>(left: Vec<T>, right: Vec<T>) -> Vec<T> {
    let mut merged = Vec::with_capacity(left.len() + right.len());
    let mut left = left.into_iter().peekable();
    let mut right = right.into_iter().peekable();

    while let (Some(l), Some(r)) = (left.peek(), right.peek()) {
        let next = if l <= r { left.next() } else { right.next() };
        merged.extend(next);
    }

    merged.extend(left);
    merged.extend(right);
    merged
}
