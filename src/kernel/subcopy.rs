use crate::num::Scalar;

/// Copies a hyper-rectangle between two strided arrays using an odometer
/// traversal: one flat counter plus per-axis position counters seeded at the
/// region start. Whenever an axis counter reaches its bound it resets and
/// carries into the next axis, adjusting the flat offset by
/// `stride[j] - shape[j-1] * stride[j-1]` instead of recomputing a full
/// multi-index conversion per element.
///
/// Strides follow the tile convention of a unit innermost axis
/// (`stride[0] == 1`) and `copy_shape` never exceeds either array's shape.
/// `tmp_index` provides `2 * ndim` scratch counters. Not meant to be fast;
/// its purpose is data redistribution between differently tiled layouts.
pub fn cpu<T: Scalar>(
    ndim: usize,
    src_start: &[usize],
    src_stride: &[usize],
    copy_shape: &[usize],
    src: &[T],
    dst_start: &[usize],
    dst_stride: &[usize],
    dst: &mut [T],
    tmp_index: &mut [usize],
) {
    debug_assert!(ndim > 0, "zero-dimensional copies bypass the odometer");
    let (src_index, dst_index) = tmp_index.split_at_mut(ndim);
    let mut nelems = 1;
    for i in 0..ndim {
        nelems *= copy_shape[i];
        src_index[i] = src_start[i];
        dst_index[i] = dst_start[i];
    }
    let mut src_offset = src_start[0];
    let mut dst_offset = dst_start[0];
    for i in 1..ndim {
        src_offset += src_start[i] * src_stride[i];
        dst_offset += dst_start[i] * dst_stride[i];
    }
    dst[dst_offset] = src[src_offset];
    src_offset += 1;
    dst_offset += 1;
    for _ in 1..nelems {
        src_index[0] += 1;
        dst_index[0] += 1;
        let mut j = 0;
        while src_index[j] == src_start[j] + copy_shape[j] {
            src_index[j] = src_start[j];
            j += 1;
            src_index[j] += 1;
            src_offset += src_stride[j] - copy_shape[j - 1] * src_stride[j - 1];
        }
        let mut j = 0;
        while dst_index[j] == dst_start[j] + copy_shape[j] {
            dst_index[j] = dst_start[j];
            j += 1;
            dst_index[j] += 1;
            dst_offset += dst_stride[j] - copy_shape[j - 1] * dst_stride[j - 1];
        }
        dst[dst_offset] = src[src_offset];
        src_offset += 1;
        dst_offset += 1;
    }
}

#[cfg(test)]
mod tests {
    fn strides(shape: &[usize]) -> Vec<usize> {
        let mut stride = vec![1; shape.len()];
        for i in 1..shape.len() {
            stride[i] = stride[i - 1] * shape[i - 1];
        }
        stride
    }

    fn offset(index: &[usize], stride: &[usize]) -> usize {
        index.iter().zip(stride).map(|(i, s)| i * s).sum()
    }

    #[test]
    fn test_subcopy_matches_reference() {
        let src_shape = [4, 5, 3];
        let dst_shape = [3, 4, 6];
        let src_start = [1, 2, 0];
        let dst_start = [0, 1, 2];
        let copy_shape = [2, 3, 3];
        let src_stride = strides(&src_shape);
        let dst_stride = strides(&dst_shape);

        let src: Vec<f64> = (0..src_shape.iter().product::<usize>())
            .map(|_| fastrand::f64())
            .collect();
        let mut dst = vec![0.0_f64; dst_shape.iter().product()];
        let mut tmp = vec![0_usize; 6];
        super::cpu(
            3,
            &src_start,
            &src_stride,
            &copy_shape,
            &src,
            &dst_start,
            &dst_stride,
            &mut dst,
            &mut tmp,
        );

        let mut expect = vec![0.0_f64; dst.len()];
        for c in 0..copy_shape[2] {
            for b in 0..copy_shape[1] {
                for a in 0..copy_shape[0] {
                    let s = offset(
                        &[src_start[0] + a, src_start[1] + b, src_start[2] + c],
                        &src_stride,
                    );
                    let d = offset(
                        &[dst_start[0] + a, dst_start[1] + b, dst_start[2] + c],
                        &dst_stride,
                    );
                    expect[d] = src[s];
                }
            }
        }
        assert_eq!(dst, expect);
    }

    #[test]
    fn test_subcopy_one_dim() {
        let src: Vec<i64> = (0..10).collect();
        let mut dst = vec![0_i64; 6];
        let mut tmp = vec![0_usize; 2];
        super::cpu(1, &[3], &[1], &[4], &src, &[1], &[1], &mut dst, &mut tmp);
        assert_eq!(dst, [0, 3, 4, 5, 6, 0]);
    }
}
