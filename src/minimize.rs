// Integer minimization used by the shrinker's block pass.

/// Find a small `v <= start` for which `criterion(v)` holds, assuming
/// `criterion(start)` holds. Only a local minimum is guaranteed.
///
/// Tries the canonical small values first, then halving, then clearing
/// individual high bits, and finally a binary search between the largest
/// known-failing value and the current best.
pub fn minimize_integer<F>(start: u64, mut criterion: F) -> u64
where
    F: FnMut(u64) -> bool,
{
    if start == 0 || criterion(0) {
        return 0;
    }
    if start == 1 || criterion(1) {
        return 1;
    }

    let mut current = start;

    loop {
        let halved = current >> 1;
        if halved > 1 && criterion(halved) {
            current = halved;
        } else {
            break;
        }
    }

    for bit in (0..64).rev() {
        let mask = 1u64 << bit;
        if current & mask == 0 {
            continue;
        }
        let cleared = current & !mask;
        if cleared > 1 && criterion(cleared) {
            current = cleared;
        }
    }

    // `lo` always fails, `hi` always passes.
    let mut lo = 1;
    let mut hi = current;
    while lo + 1 < hi {
        let mid = lo + (hi - lo) / 2;
        if criterion(mid) {
            hi = mid;
        } else {
            lo = mid;
        }
    }
    hi
}
