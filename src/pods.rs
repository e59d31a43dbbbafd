/// Derives the pod sizes for a round from the active player count.
///
/// The canonical pod holds 8 players. The remainder against a multiple of 8 is
/// redistributed to the first one or two pods via a fixed lookup table, so pod
/// sizes stay within 8 +/- 2 while the 8-player pod remains the common case.
/// Pod 1 is the lowest-standing pod and absorbs the first delta.
pub fn calculate_pod_sizes(player_count: usize) -> Vec<usize> {
    let num_pods = ((player_count as f64) / 8.0).round() as usize;
    if num_pods == 0 {
        return vec![player_count];
    }

    let mut sizes = vec![8i32; num_pods];
    let remainder = player_count % 8;

    let (delta1, delta2): (i32, i32) = match remainder {
        0 => (0, 0),
        1 => (1, 0),
        2 => (2, 0),
        3 => (1, 2),
        4 => (-2, -2),
        5 => (-1, -2),
        6 => (-2, 0),
        7 => (-1, 0),
        _ => unreachable!(),
    };

    sizes[0] += delta1;
    if num_pods > 1 {
        sizes[1] += delta2;
    } else {
        // With a single pod the second delta has nowhere to go; folding it
        // into pod 1 keeps the sizes summing to the player count.
        sizes[0] += delta2;
    }

    sizes.into_iter().map(|s| s as usize).collect()
}
