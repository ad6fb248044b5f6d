/// Squared Euclidean distance. Ranking by it is identical to ranking by L2.
pub fn euclidean_distance_squared(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());

    let mut sum = 0.0;
    let n = a.len().min(b.len());
    let mut i = 0;

    // Unrolling 4
    while i + 3 < n {
        let d0 = a[i] - b[i];
        let d1 = a[i + 1] - b[i + 1];
        let d2 = a[i + 2] - b[i + 2];
        let d3 = a[i + 3] - b[i + 3];
        sum += d0 * d0 + d1 * d1 + d2 * d2 + d3 * d3;
        i += 4;
    }

    while i < n {
        let d = a[i] - b[i];
        sum += d * d;
        i += 1;
    }

    sum
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_distance_zero_for_identical() {
        let v = [0.5, -1.0, 2.0, 3.0, 4.0];
        assert_eq!(euclidean_distance_squared(&v, &v), 0.0);
    }

    #[test]
    fn test_distance_covers_remainder() {
        // 5 dims exercises both the unrolled body and the tail loop
        let a = [0.0, 0.0, 0.0, 0.0, 0.0];
        let b = [1.0, 1.0, 1.0, 1.0, 2.0];
        assert_eq!(euclidean_distance_squared(&a, &b), 8.0);
    }
}
