//! Best rational approximation

/// Closest fraction `n / d` to `numerator / denominator` with
/// `n <= max_num` and `d <= max_den`.
///
/// Walks the continued fraction convergents until the next one breaks a
/// bound, then checks whether the largest admissible semiconvergent is
/// closer than the last convergent. On an exact tie the convergent, which
/// has the smaller denominator, is kept.
///
/// Ratios above `max_num` saturate to `(max_num, 1)`, and so does a zero
/// `denominator`.
pub fn approximate(
    numerator: u64,
    denominator: u64,
    max_num: u32,
    max_den: u32,
) -> (u32, u32) {
    if denominator == 0 {
        return (max_num, 1);
    }

    let (max_n, max_d) = (max_num as u64, max_den as u64);

    let (mut n, mut d) = (numerator, denominator);
    // previous (n0 / d0) and current (n1 / d1) convergents
    let (mut n0, mut d0) = (0u64, 1u64);
    let (mut n1, mut d1) = (1u64, 0u64);

    while d != 0 {
        let a = n / d;
        let dp = d;
        d = n % d;
        n = dp;

        let n2 = n0 + a * n1;
        let d2 = d0 + a * d1;

        if n2 > max_n || d2 > max_d {
            let mut t = u64::MAX;
            if d1 != 0 {
                t = (max_d - d0) / d1;
            }
            if n1 != 0 {
                t = t.min((max_n - n0) / n1);
            }

            // semiconvergent (n0 + t * n1) / (d0 + t * d1) is closer than
            // n1 / d1 when t > a / 2, or at t == a / 2 by the remainder test
            if d1 == 0 || 2 * t > a || (2 * t == a && d0 * dp > d1 * d) {
                n1 = n0 + t * n1;
                d1 = d0 + t * d1;
            }
            break;
        }

        n0 = n1;
        d0 = d1;
        n1 = n2;
        d1 = d2;
    }

    (n1 as u32, d1 as u32)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn exact_ratios() {
        assert_eq!(approximate(2_949_120, 122_880, 255, 31), (24, 1));
        assert_eq!(approximate(3, 1, 255, 31), (3, 1));
        assert_eq!(approximate(6, 4, 255, 31), (3, 2));
    }

    #[test]
    fn bounded_denominator() {
        // pi: 333/106 breaks the denominator bound, 22/7 stays
        assert_eq!(approximate(3_141_592, 1_000_000, 255, 31), (22, 7));
    }

    #[test]
    fn semiconvergent_tie_keeps_convergent() {
        // 147.456, next convergent 295/2 is too large, the semiconvergent
        // 148/1 ties 147/1 on the coefficient and loses on the remainder
        assert_eq!(approximate(2_949_120, 20_000, 255, 31), (147, 1));
    }

    #[test]
    fn saturates_large_ratio() {
        assert_eq!(approximate(2_949_120, 10_000, 255, 31), (255, 1));
        assert_eq!(approximate(1000, 1, 255, 31), (255, 1));
    }

    #[test]
    fn small_ratio_rounds_to_zero() {
        assert_eq!(approximate(1, 1000, 255, 31), (0, 1));
        assert_eq!(approximate(0, 7, 255, 31), (0, 1));
    }

    #[test]
    fn zero_denominator() {
        assert_eq!(approximate(5, 0, 255, 31), (255, 1));
    }
}
