/// Zeroes a buffer, element type notwithstanding.
pub fn cpu(dst: &mut [u8]) {
    dst.fill(0);
}
