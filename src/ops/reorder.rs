use std::collections::{HashMap, HashSet};

/// Position-preserving partial reorder.
///
/// `new_order` names a subset of `items` in their desired relative order.
/// Those items are written back into the same absolute slots the subset
/// occupied before, so everything outside the subset keeps its index.
///
/// Returns `false` and leaves `items` untouched if any id is unknown or
/// repeated.
pub fn reorder_subset<T, F>(items: &mut Vec<T>, new_order: &[String], id_of: F) -> bool
where
    T: Clone,
    F: Fn(&T) -> &str,
{
    let Some(sources) = source_indices(items, new_order, &id_of) else {
        return false;
    };

    let mut slots = sources.clone();
    slots.sort_unstable();
    if slots == sources {
        // already in the requested order
        return true;
    }

    let mut reordered = items.clone();
    for (slot, source) in slots.iter().zip(&sources) {
        reordered[*slot] = items[*source].clone();
    }
    *items = reordered;
    true
}

/// Current index of each requested id, in request order.
fn source_indices<T, F>(items: &[T], new_order: &[String], id_of: &F) -> Option<Vec<usize>>
where
    F: Fn(&T) -> &str,
{
    let mut positions: HashMap<&str, usize> = HashMap::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        positions.entry(id_of(item)).or_insert(i);
    }

    let mut seen = HashSet::with_capacity(new_order.len());
    let mut sources = Vec::with_capacity(new_order.len());
    for id in new_order {
        if !seen.insert(id.as_str()) {
            tracing::debug!(id = %id, "reorder rejected: duplicate id");
            return None;
        }
        match positions.get(id.as_str()) {
            Some(&i) => sources.push(i),
            None => {
                tracing::debug!(id = %id, "reorder rejected: unknown id");
                return None;
            }
        }
    }
    Some(sources)
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn ids(s: &[&str]) -> Vec<String> {
        s.iter().map(|x| x.to_string()).collect()
    }

    fn run(items: &[&str], order: &[&str]) -> (bool, Vec<String>) {
        let mut v = ids(items);
        let ok = reorder_subset(&mut v, &ids(order), |s| s.as_str());
        (ok, v)
    }

    #[test]
    fn full_permutation() {
        let (ok, v) = run(&["a", "b", "c"], &["c", "a", "b"]);
        assert!(ok);
        assert_eq!(v, ids(&["c", "a", "b"]));
    }

    #[test]
    fn subset_stays_in_its_slots() {
        // subset {b, d, e} occupies slots 1, 3, 4
        let (ok, v) = run(&["a", "b", "c", "d", "e", "f"], &["e", "b", "d"]);
        assert!(ok);
        assert_eq!(v, ids(&["a", "e", "c", "b", "d", "f"]));
    }

    #[test]
    fn current_order_is_idempotent() {
        let items = ["a", "b", "c", "d"];
        let (ok, v) = run(&items, &["b", "d"]);
        assert!(ok);
        assert_eq!(v, ids(&items));
        let (ok, v) = run(&items, &items);
        assert!(ok);
        assert_eq!(v, ids(&items));
    }

    #[test]
    fn unknown_id_fails_closed() {
        let (ok, v) = run(&["a", "b", "c"], &["c", "zzz", "a"]);
        assert!(!ok);
        assert_eq!(v, ids(&["a", "b", "c"]));
    }

    #[test]
    fn duplicate_id_fails_closed() {
        let (ok, v) = run(&["a", "b", "c"], &["c", "c"]);
        assert!(!ok);
        assert_eq!(v, ids(&["a", "b", "c"]));
    }

    #[test]
    fn empty_request_changes_nothing() {
        let (ok, v) = run(&["a", "b"], &[]);
        assert!(ok);
        assert_eq!(v, ids(&["a", "b"]));
    }

    #[test]
    fn outsiders_keep_absolute_positions_for_every_rotation() {
        let items = ["t0", "t1", "t2", "t3", "t4", "t5", "t6", "t7"];
        let subset = ["t1", "t4", "t6", "t7"];
        for shift in 0..subset.len() {
            let mut order: Vec<&str> = subset.to_vec();
            order.rotate_left(shift);
            let (ok, v) = run(&items, &order);
            assert!(ok);
            for (i, original) in items.iter().enumerate() {
                if !subset.contains(original) {
                    assert_eq!(v[i], *original, "outsider moved (shift {})", shift);
                }
            }
            let subset_view: Vec<&str> = v
                .iter()
                .map(|s| s.as_str())
                .filter(|s| subset.contains(s))
                .collect();
            assert_eq!(subset_view, order);
        }
    }
}
