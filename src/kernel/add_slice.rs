use crate::num::{Float, Zero};

/// Broadcast add of a slice along one axis. The destination is viewed as an
/// `(m, k, n)` box with the first axis fastest and the source as its `(m, n)`
/// slice: `dst[i + m*(j + k*l)] = beta * dst + alpha * src[i + m*l]`.
pub fn cpu<T: Float>(m: usize, n: usize, k: usize, alpha: T, src: &[T], beta: T, dst: &mut [T]) {
    for l in 0..n {
        for j in 0..k {
            for i in 0..m {
                let d = i + m * (j + k * l);
                let s = i + m * l;
                dst[d] = match beta == T::zero() {
                    true => alpha * src[s],
                    false => alpha * src[s] + beta * dst[d],
                };
            }
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_add_slice() {
        // dst is a (2, 3, 4) box, src its (2, 4) slice
        let (m, k, n) = (2, 3, 4);
        let src: Vec<f64> = (0..m * n).map(|x| x as f64).collect();
        let mut dst = vec![1.0_f64; m * k * n];
        super::cpu(m, n, k, 1.0, &src, 1.0, &mut dst);
        for l in 0..n {
            for j in 0..k {
                for i in 0..m {
                    assert_eq!(dst[i + m * (j + k * l)], 1.0 + src[i + m * l]);
                }
            }
        }
    }
}
