/*!
power-of-two helpers.
*/

pub fn is_power_of_two(n: usize) -> bool {
    n != 0 && (n & (n - 1)) == 0
}

/// Smallest power of two that is `>= n`.  Zero rounds to one.
pub fn next_power_of_two(n: usize) -> usize {
    n.max(1).next_power_of_two()
}

/// Rounds to the nearest power of two in log space, `2^round(log2(n))`.
pub fn nearest_power_of_two(n: usize) -> usize {
    if n <= 1 {
        return 1;
    }
    let upper = next_power_of_two(n);
    let lower = upper >> 1;
    if lower == 0 {
        return upper;
    }
    //compare in log space: n >= sqrt(lower*upper) rounds up
    //sqrt(lower*upper) == lower * sqrt(2)
    if (n as f64) >= (lower as f64) * std::f64::consts::SQRT_2 {
        upper
    } else {
        lower
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn powers() {
        assert!(is_power_of_two(1));
        assert!(is_power_of_two(64));
        assert!(!is_power_of_two(0));
        assert!(!is_power_of_two(100));
        assert_eq!(next_power_of_two(0), 1);
        assert_eq!(next_power_of_two(100), 128);
        assert_eq!(next_power_of_two(128), 128);
    }

    #[test]
    fn nearest() {
        assert_eq!(nearest_power_of_two(100), 128);
        assert_eq!(nearest_power_of_two(1024), 1024);
        assert_eq!(nearest_power_of_two(90), 64);
        assert_eq!(nearest_power_of_two(1), 1);
    }
}
