//! Matrix multiplication shape rules.

use crate::error::{CoreError, Result};
use crate::types::Shape;

/// Output shape of `op(A) x op(B)` where `op` optionally swaps the trailing
/// two dimensions.
///
/// Both operands need rank >= 2. Leading dimensions broadcast right to left:
/// they must be equal or one of them must be 1.
pub fn matmul_shape(a: &[usize], b: &[usize], trans_a: bool, trans_b: bool) -> Result<Shape> {
    for operand in [a, b] {
        if operand.len() < 2 {
            return Err(CoreError::RankMismatch {
                expected: ">= 2".to_string(),
                actual: operand.len(),
            });
        }
    }

    let mut a = a.to_vec();
    let mut b = b.to_vec();
    let (ra, rb) = (a.len(), b.len());
    if trans_a {
        a.swap(ra - 1, ra - 2);
    }
    if trans_b {
        b.swap(rb - 1, rb - 2);
    }

    if a[ra - 1] != b[rb - 2] {
        return Err(CoreError::shape(format!(
            "matmul inner dimensions differ: {:?} x {:?}",
            a, b
        )));
    }

    let rank = ra.max(rb);
    let mut out = vec![0; rank];
    out[rank - 1] = b[rb - 1];
    out[rank - 2] = a[ra - 2];

    for i in 2..rank {
        let da = if i < ra { a[ra - 1 - i] } else { 1 };
        let db = if i < rb { b[rb - 1 - i] } else { 1 };
        if da != db && da != 1 && db != 1 {
            return Err(CoreError::shape(format!(
                "cannot broadcast batch dimension {da} against {db}"
            )));
        }
        out[rank - 1 - i] = if da != 1 { da } else { db };
    }

    Ok(out)
}
