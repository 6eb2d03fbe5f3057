//! Layout operators: transpose and concat.

use crate::error::{CoreError, Result};
use crate::types::Shape;

/// Map a possibly negative axis into `0..rank`.
pub fn normalize_axis(axis: i64, rank: usize) -> Result<usize> {
    let signed_rank = rank as i64;
    if rank == 0 || axis < -signed_rank || axis >= signed_rank {
        return Err(CoreError::AxisOutOfRange { axis, rank });
    }
    Ok(if axis < 0 {
        (axis + signed_rank) as usize
    } else {
        axis as usize
    })
}

/// Validate a transpose permutation against the input rank.
///
/// An empty permutation stands for the identity.
pub fn normalize_permutation(permutation: Vec<usize>, rank: usize) -> Result<Vec<usize>> {
    if permutation.is_empty() {
        return Ok((0..rank).collect());
    }
    if permutation.len() != rank {
        return Err(CoreError::RankMismatch {
            expected: permutation.len().to_string(),
            actual: rank,
        });
    }
    let mut seen = vec![false; rank];
    for &axis in &permutation {
        if axis >= rank {
            return Err(CoreError::AxisOutOfRange {
                axis: axis as i64,
                rank,
            });
        }
        if std::mem::replace(&mut seen[axis], true) {
            return Err(CoreError::shape(format!(
                "axis {axis} repeated in permutation {permutation:?}"
            )));
        }
    }
    Ok(permutation)
}

/// Output dimension `i` is input dimension `permutation[i]`.
pub fn transpose_shape(input: &[usize], permutation: &[usize]) -> Result<Shape> {
    if permutation.len() != input.len() {
        return Err(CoreError::RankMismatch {
            expected: permutation.len().to_string(),
            actual: input.len(),
        });
    }
    permutation
        .iter()
        .map(|&p| {
            input.get(p).copied().ok_or(CoreError::AxisOutOfRange {
                axis: p as i64,
                rank: input.len(),
            })
        })
        .collect()
}

/// Concatenate along `axis`: that dimension is summed, every other one must match.
pub fn concat_shape(inputs: &[&[usize]], axis: usize) -> Result<Shape> {
    let first = inputs.first().ok_or(CoreError::ArityMismatch {
        op: "Concat",
        expected: ">= 1".to_string(),
        actual: 0,
    })?;
    let rank = first.len();
    if axis >= rank {
        return Err(CoreError::AxisOutOfRange {
            axis: axis as i64,
            rank,
        });
    }

    let mut dims = first.to_vec();
    for input in &inputs[1..] {
        if input.len() != rank {
            return Err(CoreError::RankMismatch {
                expected: rank.to_string(),
                actual: input.len(),
            });
        }
        for (j, &d) in input.iter().enumerate() {
            if j == axis {
                dims[j] += d;
            } else if dims[j] != d {
                return Err(CoreError::shape(format!(
                    "concat inputs differ on axis {j}: {} vs {d}",
                    dims[j]
                )));
            }
        }
    }
    Ok(dims)
}
