use crate::num::{Float, Zero};

/// Reduction of one axis into a slice. The source is viewed as an `(m, k, n)`
/// box with the first axis fastest and the destination as its `(m, n)` slice:
/// `dst[i + m*l] = beta * dst + alpha * sum_j src[i + m*(j + k*l)]`.
pub fn cpu<T: Float>(m: usize, n: usize, k: usize, alpha: T, src: &[T], beta: T, dst: &mut [T]) {
    for l in 0..n {
        for i in 0..m {
            let mut sum = T::zero();
            for j in 0..k {
                sum = sum + src[i + m * (j + k * l)];
            }
            let d = i + m * l;
            dst[d] = match beta == T::zero() {
                true => alpha * sum,
                false => alpha * sum + beta * dst[d],
            };
        }
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_sum_slice() {
        let (m, k, n) = (3, 4, 2);
        let src: Vec<f64> = (0..m * k * n).map(|x| x as f64).collect();
        let mut dst = vec![0.0_f64; m * n];
        super::cpu(m, n, k, 1.0, &src, 0.0, &mut dst);
        for l in 0..n {
            for i in 0..m {
                let sum: f64 = (0..k).map(|j| src[i + m * (j + k * l)]).sum();
                assert_eq!(dst[i + m * l], sum);
            }
        }
    }
}
