use crate::error::{Result, StoreError};

/// Squared Euclidean distance. Four independent accumulators let the
/// compiler vectorise the loop without target-specific intrinsics.
#[inline]
pub fn squared_l2(a: &[f32], b: &[f32]) -> f32 {
    debug_assert_eq!(a.len(), b.len());
    let mut i = 0usize;
    let mut acc0 = 0.0f32;
    let mut acc1 = 0.0f32;
    let mut acc2 = 0.0f32;
    let mut acc3 = 0.0f32;
    while i + 4 <= a.len() {
        let d0 = a[i] - b[i];
        let d1 = a[i + 1] - b[i + 1];
        let d2 = a[i + 2] - b[i + 2];
        let d3 = a[i + 3] - b[i + 3];
        acc0 += d0 * d0;
        acc1 += d1 * d1;
        acc2 += d2 * d2;
        acc3 += d3 * d3;
        i += 4;
    }
    let mut out = (acc0 + acc1) + (acc2 + acc3);
    while i < a.len() {
        let d = a[i] - b[i];
        out += d * d;
        i += 1;
    }
    out
}

#[inline]
pub fn validate_dim(expected: usize, vector: &[f32]) -> Result<()> {
    if vector.len() != expected {
        return Err(StoreError::DimensionMismatch {
            expected,
            got: vector.len(),
        });
    }
    Ok(())
}

/// Dimension check plus a finiteness check on every component. NaN and
/// infinite components would make distances unordered.
#[inline]
pub fn validate_vector(expected: usize, vector: &[f32]) -> Result<()> {
    validate_dim(expected, vector)?;
    match vector.iter().position(|v| !v.is_finite()) {
        Some(component) => Err(StoreError::NonFinite { component }),
        None => Ok(()),
    }
}

#[cfg(test)]
mod tests {
    use super::{squared_l2, validate_dim, validate_vector};
    use crate::error::StoreError;

    #[test]
    fn squared_l2_covers_unrolled_and_tail_lanes() {
        let a = [1.0, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [0.0, 0.0, 0.0, 0.0, 0.0, 0.0];
        assert!((squared_l2(&a, &b) - 91.0).abs() < 1e-5);
        assert_eq!(squared_l2(&a, &a), 0.0);
    }

    #[test]
    fn validate_dim_reports_both_sides() {
        assert!(validate_dim(3, &[0.0; 3]).is_ok());
        match validate_dim(3, &[0.0; 2]) {
            Err(StoreError::DimensionMismatch { expected, got }) => {
                assert_eq!((expected, got), (3, 2));
            }
            other => panic!("unexpected result: {other:?}"),
        }
    }

    #[test]
    fn validate_vector_rejects_non_finite_components() {
        assert!(validate_vector(2, &[1.0, -0.5]).is_ok());
        assert!(matches!(
            validate_vector(2, &[0.0, f32::NAN]),
            Err(StoreError::NonFinite { component: 1 })
        ));
        assert!(matches!(
            validate_vector(2, &[-f32::NAN, 0.0]),
            Err(StoreError::NonFinite { component: 0 })
        ));
        assert!(matches!(
            validate_vector(2, &[f32::NEG_INFINITY, 0.0]),
            Err(StoreError::NonFinite { component: 0 })
        ));
        assert!(matches!(
            validate_vector(3, &[f32::NAN]),
            Err(StoreError::DimensionMismatch { expected: 3, got: 1 })
        ));
    }
}
