use crate::num::{Float, Zero};

/// `dst = alpha * dst`, with `alpha == 0` reducing to a plain fill so that
/// uninitialized destinations never poison the result.
pub fn cpu<T: Float>(alpha: T, dst: &mut [T]) {
    if alpha == T::zero() {
        dst.fill(T::zero());
        return;
    }
    for x in dst.iter_mut() {
        *x = alpha * *x;
    }
}
