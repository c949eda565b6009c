// Column assignment: one delivery column per note, no column shared.
//
// Minimum-remaining-values greedy. Repeatedly pick the unassigned note with
// the fewest remaining candidate columns (ties go to the earlier note), give
// it its first remaining candidate, and strike that column from every other
// note's list. A note whose list is empty fails; the others carry on. The
// search is greedy, not exhaustive: it can fail a note a perfect matching
// would have placed.

/// Assign one column per candidate list. `None` marks a note whose list was
/// emptied by earlier assignments (or was empty to begin with).
pub fn assign_columns<T: Copy + PartialEq>(lists: &[Vec<T>]) -> Vec<Option<T>> {
    let mut remaining: Vec<Vec<T>> = lists.to_vec();
    let mut assigned: Vec<Option<T>> = vec![None; lists.len()];
    let mut open: Vec<bool> = vec![true; lists.len()];

    loop {
        let pick = (0..remaining.len())
            .filter(|&i| open[i] && !remaining[i].is_empty())
            .min_by_key(|&i| (remaining[i].len(), i));
        let Some(i) = pick else {
            break;
        };
        let column = remaining[i][0];
        assigned[i] = Some(column);
        open[i] = false;
        for (j, list) in remaining.iter_mut().enumerate() {
            if open[j] {
                list.retain(|c| *c != column);
            }
        }
    }

    assigned
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn fewest_candidates_go_first() {
        // Note 1 has only column 6; note 0 must yield it.
        let lists = vec![vec![6, 14], vec![6]];
        assert_eq!(assign_columns(&lists), vec![Some(14), Some(6)]);
    }

    #[test]
    fn ties_break_by_input_order() {
        let lists = vec![vec![6], vec![6]];
        assert_eq!(assign_columns(&lists), vec![Some(6), None]);
    }

    #[test]
    fn disjoint_lists_take_first_candidates() {
        let lists = vec![vec![6, 14], vec![10, 18], vec![14, 22], vec![29, 34]];
        assert_eq!(
            assign_columns(&lists),
            vec![Some(6), Some(10), Some(14), Some(29)]
        );
    }

    #[test]
    fn empty_list_fails_only_that_note() {
        let lists: Vec<Vec<i32>> = vec![vec![], vec![3]];
        assert_eq!(assign_columns(&lists), vec![None, Some(3)]);
    }
}
