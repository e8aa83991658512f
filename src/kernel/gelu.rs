use crate::num::Float;

/// Approximate GeLU based on the tanh formula,
/// `gelu(z) ~ 0.5 z (1 + tanh(sqrt(2/pi) (z + 0.044715 z^3)))`,
/// computed as `z / (1 + exp(-2 sqrt(2/pi) z (1 + 0.044715 z^2)))`.
pub fn cpu<T: Float>(data: &mut [T]) {
    let f2 = (2.0_f64 / std::f64::consts::PI).sqrt();
    let f3 = -2.0 * f2;
    let f4 = f3 * 0.044715;
    for x in data.iter_mut() {
        let z = x.to_f64();
        let y = z * (f3 + f4 * z * z);
        *x = T::from_f64(z / (1.0 + y.exp()));
    }
}

#[cfg(test)]
mod tests {
    #[test]
    fn test_gelu() {
        let mut data = vec![-2.0_f64, -1.0, 0.0, 1.0, 2.0];
        super::cpu(&mut data);
        // gelu(0) == 0, gelu is close to identity for large positive inputs
        assert_eq!(data[2], 0.0);
        assert!((data[4] - 2.0).abs() < 0.05);
        // the tanh form matches the direct formula
        let z = 1.0_f64;
        let direct = 0.5 * z * (1.0 + ((2.0 / std::f64::consts::PI).sqrt() * (z + 0.044715 * z * z * z)).tanh());
        assert!((data[3] - direct).abs() < 1e-12);
    }
}
