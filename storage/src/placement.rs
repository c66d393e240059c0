//! Proportional split of one object's bytes across the node pool.
//!
//! Every node gets a share proportional to its free-space ratio relative to
//! the pool mean. Rounding leftovers go to the node with the most free space;
//! overshoot is taken back from the node with the least.

const RATIO_EPSILON: f64 = 1e-9;

/// Split `total_size` bytes into one chunk size per entry of `ratios`.
///
/// The result has the same length as `ratios` and sums to `total_size`,
/// except when the mean ratio is zero, in which case every entry is zero.
/// A zero entry means the node receives nothing.
pub fn split(total_size: u64, ratios: &[f64]) -> Vec<u64> {
    let n = ratios.len();
    if n == 0 {
        return Vec::new();
    }

    let mean_ratio = ratios.iter().sum::<f64>() / n as f64;
    if mean_ratio.abs() <= RATIO_EPSILON {
        tracing::warn!("Mean free space ratio is zero, cannot split {} bytes", total_size);
        return vec![0; n];
    }

    let mean_size = total_size as f64 / n as f64;

    let mut sizes: Vec<u64> = ratios
        .iter()
        .map(|ratio| (mean_size * ratio / mean_ratio).round().max(0.0) as u64)
        .collect();

    // rounded shares of a size near u64::MAX can add up past it
    let assigned: u128 = sizes.iter().map(|&size| u128::from(size)).sum();
    let total = u128::from(total_size);
    if assigned <= total {
        sizes[most_free(ratios)] += (total - assigned) as u64;
    } else {
        take_back(&mut sizes, ratios, assigned - total);
    }

    tracing::debug!("Split {} bytes over {} nodes: {:?}", total_size, n, sizes);

    sizes
}

fn most_free(ratios: &[f64]) -> usize {
    let mut best = 0;
    for (i, ratio) in ratios.iter().enumerate() {
        if *ratio > ratios[best] {
            best = i;
        }
    }
    best
}

/// Remove `excess` bytes, starting with the least free node.
///
/// The least free node normally absorbs all of it. When its share is too
/// small, it is drained and the rest comes from the next least free nodes.
fn take_back(sizes: &mut [u64], ratios: &[f64], mut excess: u128) {
    let mut order: Vec<usize> = (0..ratios.len()).collect();
    // stable sort keeps first occurrence first among equal ratios
    order.sort_by(|a, b| ratios[*a].total_cmp(&ratios[*b]));

    for i in order {
        if excess == 0 {
            break;
        }
        let taken = excess.min(u128::from(sizes[i]));
        sizes[i] -= taken as u64;
        excess -= taken;
    }
}
