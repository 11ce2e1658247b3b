//! Longest increasing subsequence.
//!
//! Patience sorting: `tails[k]` holds the index of the smallest value that
//! ends an increasing run of length `k + 1`. Each value either extends the
//! longest run or replaces the first tail that is not smaller than it
//! (found by binary search), and remembers the tail it extended so the run
//! can be rebuilt backwards. O(n log n).

/// Indices of a longest strictly increasing subsequence of `values`,
/// in ascending order.
///
/// Zeros mean "no old node" in the keyed diff and are skipped: they never
/// take part in a subsequence.
pub fn longest_increasing_subsequence(values: &[usize]) -> Vec<usize> {
    let mut predecessor = vec![usize::MAX; values.len()];
    let mut tails: Vec<usize> = Vec::new();

    for (index, &value) in values.iter().enumerate() {
        if value == 0 {
            continue;
        }

        let slot = tails.partition_point(|&tail| values[tail] < value);
        if slot > 0 {
            predecessor[index] = tails[slot - 1];
        }
        if slot == tails.len() {
            tails.push(index);
        } else {
            tails[slot] = index;
        }
    }

    let mut result = vec![0; tails.len()];
    let mut cursor = tails.last().copied();
    for entry in result.iter_mut().rev() {
        let Some(index) = cursor else {
            break;
        };
        *entry = index;
        cursor = match predecessor[index] {
            usize::MAX => None,
            prev => Some(prev),
        };
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;

    fn picked(values: &[usize]) -> Vec<usize> {
        longest_increasing_subsequence(values)
            .into_iter()
            .map(|i| values[i])
            .collect()
    }

    #[test]
    fn finds_the_longest_run() {
        assert_eq!(longest_increasing_subsequence(&[3, 4, 2]), vec![0, 1]);
        assert_eq!(picked(&[2, 1, 5, 3, 6, 4, 8, 9, 7]), vec![1, 3, 4, 8, 9]);
    }

    #[test]
    fn zeros_are_skipped() {
        assert_eq!(longest_increasing_subsequence(&[0, 2, 3, 0]), vec![1, 2]);
        assert!(longest_increasing_subsequence(&[0, 0]).is_empty());
    }

    #[test]
    fn strictly_increasing_only() {
        assert_eq!(longest_increasing_subsequence(&[2, 2, 2]).len(), 1);
        assert_eq!(longest_increasing_subsequence(&[5, 4, 3, 2, 1]).len(), 1);
        assert!(longest_increasing_subsequence(&[]).is_empty());
    }

    #[test]
    fn already_sorted_input_is_kept_whole() {
        assert_eq!(longest_increasing_subsequence(&[1, 2, 3, 4]), vec![0, 1, 2, 3]);
    }
}
