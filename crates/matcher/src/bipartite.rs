//! Maximum bipartite matching (Kuhn's augmenting paths)
//!
//! Used for multiset comparison: left vertices are expected elements, right
//! vertices actual elements, and an edge means the pair matches under the
//! comparison rules.

/// Match left to right vertices; returns the partner of each left vertex
pub(crate) fn maximum_matching(adjacency: &[Vec<usize>], right_len: usize) -> Vec<Option<usize>> {
    let mut right_partner: Vec<Option<usize>> = vec![None; right_len];
    let mut seen = vec![false; right_len];

    for left in 0..adjacency.len() {
        seen.iter_mut().for_each(|s| *s = false);
        augment(left, adjacency, &mut seen, &mut right_partner);
    }

    let mut left_partner = vec![None; adjacency.len()];
    for (right, left) in right_partner.iter().enumerate() {
        if let Some(left) = left {
            left_partner[*left] = Some(right);
        }
    }
    left_partner
}

fn augment(
    left: usize,
    adjacency: &[Vec<usize>],
    seen: &mut [bool],
    right_partner: &mut [Option<usize>],
) -> bool {
    for &right in &adjacency[left] {
        if seen[right] {
            continue;
        }
        seen[right] = true;
        let free = match right_partner[right] {
            None => true,
            Some(other) => augment(other, adjacency, seen, right_partner),
        };
        if free {
            right_partner[right] = Some(left);
            return true;
        }
    }
    false
}
