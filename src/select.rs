//! Order-statistic selection.
//!
//! Quickselect with a Hoare-style partition: the leftmost element of the current
//! range is the pivot, and only the side containing the target rank is revisited.
//! Expected linear time; the input is reordered in place.

/// Partition `values[left..right]` around `values[left]`.
///
/// Returns the pivot's final index `p`: everything in `left..p` is `< pivot` and
/// everything in `p + 1..right` is not.
fn partition<T: PartialOrd + Copy>(values: &mut [T], left: usize, right: usize) -> usize {
    let pivot = values[left];
    values.swap(left, right - 1);

    let mut store = left;
    for i in left..right - 1 {
        if values[i] < pivot {
            values.swap(store, i);
            store += 1;
        }
    }
    values.swap(right - 1, store);
    store
}

/// Value that would sit at index `k` if `values` were sorted ascending.
///
/// Reorders `values`. Panics if `k >= values.len()`.
pub fn select_nth_in_place<T: PartialOrd + Copy>(values: &mut [T], k: usize) -> T {
    assert!(
        k < values.len(),
        "rank {k} out of range for {} values",
        values.len()
    );

    let (mut left, mut right) = (0, values.len());
    while left != right {
        let p = partition(values, left, right);
        if p > k {
            right = p;
        } else if p < k {
            left = p + 1;
        } else {
            break;
        }
    }
    values[k]
}

/// Like [`select_nth_in_place`], but works on a copy and leaves `values` untouched.
pub fn kth_smallest<T: PartialOrd + Copy>(values: &[T], k: usize) -> T {
    let mut scratch = values.to_vec();
    select_nth_in_place(&mut scratch, k)
}

#[cfg(test)]
mod tests {
    use super::*;

    use rand::rngs::StdRng;
    use rand::{Rng, SeedableRng};

    #[test]
    fn lower_median_of_small_row() {
        let row = [5.0_f32, 1.0, 3.0, 2.0, 4.0];
        assert_eq!(kth_smallest(&row, row.len() / 2), 3.0);
        assert_eq!(row, [5.0, 1.0, 3.0, 2.0, 4.0]);
    }

    #[test]
    fn every_rank_of_a_permutation() {
        let values = [9, 3, 7, 1, 8, 2, 6, 0, 5, 4];
        for k in 0..values.len() {
            assert_eq!(kth_smallest(&values, k), k as i32);
        }
    }

    #[test]
    fn single_element_and_sorted_inputs() {
        assert_eq!(kth_smallest(&[42.0_f32], 0), 42.0);

        let ascending: Vec<i32> = (0..32).collect();
        let descending: Vec<i32> = (0..32).rev().collect();
        for k in [0, 1, 15, 16, 31] {
            assert_eq!(kth_smallest(&ascending, k), k as i32);
            assert_eq!(kth_smallest(&descending, k), k as i32);
        }
    }

    #[test]
    fn matches_full_sort_on_random_inputs_with_duplicates() {
        let mut rng = StdRng::seed_from_u64(0);
        for len in 1..64 {
            for _ in 0..8 {
                // Narrow value range forces plenty of duplicates.
                let values: Vec<i32> = (0..len).map(|_| rng.random_range(-5..5)).collect();
                let mut sorted = values.clone();
                sorted.sort_unstable();

                for k in 0..values.len() {
                    assert_eq!(kth_smallest(&values, k), sorted[k], "values={values:?} k={k}");
                }
            }
        }
    }

    #[test]
    fn matches_full_sort_on_random_floats() {
        let mut rng = StdRng::seed_from_u64(1);
        for len in [2, 3, 7, 100, 257] {
            let values: Vec<f32> = (0..len).map(|_| rng.random_range(-1.0..1.0)).collect();
            let mut sorted = values.clone();
            sorted.sort_by(|a, b| a.total_cmp(b));

            let k = rng.random_range(0..len);
            assert_eq!(kth_smallest(&values, k), sorted[k]);
        }
    }

    #[test]
    #[should_panic(expected = "out of range")]
    fn rank_past_end_panics() {
        kth_smallest(&[1, 2, 3], 3);
    }
}
