use crate::num::{Float, Zero};

/// `dst = alpha * src + beta * dst`. A zero `beta` skips reading `dst`, so
/// the kernel is safe against write-only destinations.
pub fn cpu<T: Float>(alpha: T, src: &[T], beta: T, dst: &mut [T]) {
    if beta == T::zero() {
        for (y, x) in dst.iter_mut().zip(src) {
            *y = alpha * *x;
        }
        return;
    }
    for (y, x) in dst.iter_mut().zip(src) {
        *y = alpha * *x + beta * *y;
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_add() {
        let src: Vec<f64> = (0..16).map(|x| x as f64).collect();
        let mut dst = vec![1.0_f64; 16];
        super::cpu(2.0, &src, 0.5, &mut dst);
        for (i, &y) in dst.iter().enumerate() {
            assert_eq!(y, 2.0 * i as f64 + 0.5);
        }
    }

    #[test]
    fn test_add_zero_beta() {
        let src = vec![3.0_f32; 8];
        let mut dst = vec![f32::NAN; 8];
        super::cpu(1.0, &src, 0.0, &mut dst);
        assert!(dst.iter().all(|&y| y == 3.0));
    }
}
