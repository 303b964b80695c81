use crate::future::yield_now;

/// Top-down merge sort that gives up its turn after every step: each descent,
/// each element placed by the merge, and each allocation and release of the
/// merge buffer. Sorting a large run therefore never holds the rotation for
/// longer than one step.
///
/// The sort is stable: on equal keys the element of the left run goes first.
pub async fn merge_sort<T: Ord + Clone>(v: &mut [T]) {
    if v.len() <= 1 {
        return;
    }

    let mid = v.len() / 2;
    yield_now().await;

    {
        let (left, right) = v.split_at_mut(mid);
        Box::pin(merge_sort(left)).await;
        yield_now().await;

        Box::pin(merge_sort(right)).await;
        yield_now().await;
    }

    merge(v, mid).await;
}

/// Merge the sorted runs `v[..mid]` and `v[mid..]` back into `v`.
async fn merge<T: Ord + Clone>(v: &mut [T], mid: usize) {
    let mut merged = Vec::with_capacity(v.len());
    yield_now().await;

    let (left, right) = v.split_at(mid);
    let (mut i, mut j) = (0, 0);

    while i < left.len() && j < right.len() {
        if left[i] <= right[j] {
            merged.push(left[i].clone());
            i += 1;
        } else {
            merged.push(right[j].clone());
            j += 1;
        }
        yield_now().await;
    }

    // At most one of the two runs has anything left.
    for item in left[i..].iter().chain(&right[j..]) {
        merged.push(item.clone());
        yield_now().await;
    }

    v.clone_from_slice(&merged);
    yield_now().await;

    drop(merged);
    yield_now().await;
}
