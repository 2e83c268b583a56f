//! Host contraction: transpose-transpose-GEMM-transpose
//!
//! Every distinct mode is classified by the operands it appears on:
//!
//! | operands           | role                                   |
//! |--------------------|----------------------------------------|
//! | lhs, rhs1, rhs2    | batch: one GEMM per index              |
//! | lhs, rhs1          | row of the GEMM                        |
//! | lhs, rhs2          | column of the GEMM                     |
//! | rhs1, rhs2         | contracted: inner GEMM dimension       |
//! | rhs1 only          | summed while packing rhs1              |
//! | rhs2 only          | summed while packing rhs2              |
//! | lhs only           | broadcast when scattering the result   |
//!
//! The inputs are packed into column-major panels, multiplied by the
//! dense-algebra library and the product is added into the output. A mode
//! repeated within one operand addresses its diagonal.

use faer::mat::{MatMut, MatRef};
use faer::Par;

use super::ContractBody;
use crate::types::{TensorMut, TensorRef};

const LHS: u8 = 0b001;
const RHS1: u8 = 0b010;
const RHS2: u8 = 0b100;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
struct Axis {
    mode: i32,
    extent: usize,
}

/// Mode classification for one contraction
#[derive(Debug, Default, PartialEq, Eq)]
struct ModePlan {
    batch: Vec<Axis>,
    rows: Vec<Axis>,
    cols: Vec<Axis>,
    contracted: Vec<Axis>,
    rhs1_only: Vec<Axis>,
    rhs2_only: Vec<Axis>,
    lhs_only: Vec<Axis>,
}

impl ModePlan {
    fn new(operands: [(&[i32], &[i64]); 3]) -> Self {
        let mut axes: Vec<(Axis, u8)> = Vec::new();
        for (bit, (modes, shape)) in [LHS, RHS1, RHS2].into_iter().zip(operands) {
            for (&mode, &extent) in modes.iter().zip(shape) {
                match axes.iter_mut().find(|(axis, _)| axis.mode == mode) {
                    Some((_, seen)) => *seen |= bit,
                    None => axes.push((
                        Axis {
                            mode,
                            extent: extent.max(0) as usize,
                        },
                        bit,
                    )),
                }
            }
        }

        let mut plan = ModePlan::default();
        for (axis, seen) in axes {
            let group = match seen {
                s if s == LHS | RHS1 | RHS2 => &mut plan.batch,
                s if s == LHS | RHS1 => &mut plan.rows,
                s if s == LHS | RHS2 => &mut plan.cols,
                s if s == RHS1 | RHS2 => &mut plan.contracted,
                RHS1 => &mut plan.rhs1_only,
                RHS2 => &mut plan.rhs2_only,
                _ => &mut plan.lhs_only,
            };
            group.push(axis);
        }
        plan
    }
}

fn volume(axes: &[Axis]) -> usize {
    axes.iter().map(|a| a.extent).product()
}

/// Element stride of `mode` in an operand; repeated labels add up
fn mode_stride(modes: &[i32], strides: &[i64], mode: i32) -> i64 {
    modes
        .iter()
        .zip(strides)
        .filter(|(&m, _)| m == mode)
        .map(|(_, &s)| s)
        .sum()
}

/// Offsets of every index of `axes` in one operand, first axis fastest
fn group_offsets(axes: &[Axis], modes: &[i32], strides: &[i64]) -> Vec<i64> {
    let axis_strides: Vec<i64> = axes.iter().map(|a| mode_stride(modes, strides, a.mode)).collect();
    let total = volume(axes);
    let mut offsets = Vec::with_capacity(total);
    let mut index = vec![0usize; axes.len()];
    let mut offset = 0i64;
    for _ in 0..total {
        offsets.push(offset);
        for (d, axis) in axes.iter().enumerate() {
            index[d] += 1;
            offset += axis_strides[d];
            if index[d] < axis.extent {
                break;
            }
            offset -= axis_strides[d] * axis.extent as i64;
            index[d] = 0;
        }
    }
    offsets
}

/// Offsets of the three operands over one group of axes
struct GroupOffsets {
    lhs: Vec<i64>,
    rhs1: Vec<i64>,
    rhs2: Vec<i64>,
}

impl GroupOffsets {
    fn new<T>(axes: &[Axis], lhs: &TensorMut<'_, T>, rhs1: &TensorRef<'_, T>, rhs2: &TensorRef<'_, T>) -> Self {
        Self {
            lhs: group_offsets(axes, lhs.modes(), lhs.strides()),
            rhs1: group_offsets(axes, rhs1.modes(), rhs1.strides()),
            rhs2: group_offsets(axes, rhs2.modes(), rhs2.strides()),
        }
    }
}

/// Gather `Σ_extra src[base + a[i] + b[j] + extra]` into a column-major
/// `a.len() x b.len()` panel
///
/// # Safety
///
/// Every offset combination must address an element of `src`.
unsafe fn pack<T: ContractBody>(panel: &mut [T], src: *const T, base: i64, a: &[i64], b: &[i64], extra: &[i64]) {
    let rows = a.len();
    for (j, &ob) in b.iter().enumerate() {
        for (i, &oa) in a.iter().enumerate() {
            let mut acc = T::default();
            for &oe in extra {
                acc = acc + src.offset((base + oa + ob + oe) as isize).read();
            }
            panel[i + j * rows] = acc;
        }
    }
}

/// `lhs += rhs1 · rhs2` on host memory
pub fn contract_host<T: ContractBody>(
    lhs: &mut TensorMut<'_, T>,
    rhs1: &TensorRef<'_, T>,
    rhs2: &TensorRef<'_, T>,
    par: Par,
) {
    let plan = ModePlan::new([
        (lhs.modes(), lhs.shape()),
        (rhs1.modes(), rhs1.shape()),
        (rhs2.modes(), rhs2.shape()),
    ]);
    let (m, n, k) = (volume(&plan.rows), volume(&plan.cols), volume(&plan.contracted));
    tracing::trace!(
        dtype = %T::TYPE,
        batch = volume(&plan.batch),
        m,
        n,
        k,
        "host contraction"
    );

    let batch = GroupOffsets::new(&plan.batch, lhs, rhs1, rhs2);
    let rows = GroupOffsets::new(&plan.rows, lhs, rhs1, rhs2);
    let cols = GroupOffsets::new(&plan.cols, lhs, rhs1, rhs2);
    let contracted = GroupOffsets::new(&plan.contracted, lhs, rhs1, rhs2);
    let rhs1_only = group_offsets(&plan.rhs1_only, rhs1.modes(), rhs1.strides());
    let rhs2_only = group_offsets(&plan.rhs2_only, rhs2.modes(), rhs2.strides());
    let lhs_only = group_offsets(&plan.lhs_only, lhs.modes(), lhs.strides());

    let mut a_panel = vec![T::default(); m * k];
    let mut b_panel = vec![T::default(); k * n];
    let mut product = vec![T::default(); m * n];
    let out = lhs.as_mut_ptr();

    for b in 0..batch.lhs.len() {
        if k > 0 {
            // SAFETY: offsets are built from the descriptors' own shapes and strides
            unsafe {
                pack(&mut a_panel, rhs1.as_ptr(), batch.rhs1[b], &rows.rhs1, &contracted.rhs1, &rhs1_only);
                pack(&mut b_panel, rhs2.as_ptr(), batch.rhs2[b], &contracted.rhs2, &cols.rhs2, &rhs2_only);
            }
            T::gemm(
                MatMut::from_column_major_slice_mut(&mut product, m, n),
                MatRef::from_column_major_slice(&a_panel, m, k),
                MatRef::from_column_major_slice(&b_panel, k, n),
                par,
            );
        } else {
            product.fill(T::default());
        }

        for (j, &oc) in cols.lhs.iter().enumerate() {
            for (i, &or) in rows.lhs.iter().enumerate() {
                let value = product[i + j * m];
                for &ol in &lhs_only {
                    // SAFETY: as above; the caller owns `lhs` exclusively
                    unsafe {
                        let slot = out.offset((batch.lhs[b] + or + oc + ol) as isize);
                        slot.write(slot.read() + value);
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{column_major_strides, row_major_strides, Complex64};

    #[test]
    fn test_mode_plan_classifies_every_role() {
        // lhs[b,i,j,x] = rhs1[b,i,k,p] * rhs2[b,k,j,q]
        let plan = ModePlan::new([
            (&[0, 1, 2, 9], &[2, 3, 4, 5]),
            (&[0, 1, 7, 8], &[2, 3, 6, 7]),
            (&[0, 7, 2, 3], &[2, 6, 4, 8]),
        ]);
        fn modes(axes: &[Axis]) -> Vec<i32> {
            axes.iter().map(|a| a.mode).collect()
        }
        assert_eq!(modes(&plan.batch), vec![0]);
        assert_eq!(modes(&plan.rows), vec![1]);
        assert_eq!(modes(&plan.cols), vec![2]);
        assert_eq!(modes(&plan.contracted), vec![7]);
        assert_eq!(modes(&plan.rhs1_only), vec![8]);
        assert_eq!(modes(&plan.rhs2_only), vec![3]);
        assert_eq!(modes(&plan.lhs_only), vec![9]);
        assert_eq!(plan.contracted[0].extent, 6);
    }

    #[test]
    fn test_group_offsets_first_axis_fastest() {
        let axes = [Axis { mode: 1, extent: 2 }, Axis { mode: 2, extent: 3 }];
        let offsets = group_offsets(&axes, &[1, 2], &[10, 100]);
        assert_eq!(offsets, vec![0, 10, 100, 110, 200, 210]);
        assert_eq!(group_offsets(&[], &[], &[]), vec![0]);
    }

    #[test]
    fn test_matrix_product_row_major_inputs() {
        // (2x3) * (3x2), inputs row-major, output column-major
        let a = [1.0f64, 2.0, 3.0, 4.0, 5.0, 6.0];
        let b = [7.0f64, 8.0, 9.0, 10.0, 11.0, 12.0];
        let mut c = [0.0f64; 4];
        {
            let rhs1 = TensorRef::from_slice(&a, vec![2, 3], row_major_strides(&[2, 3])).with_modes(vec![0, 2]);
            let rhs2 = TensorRef::from_slice(&b, vec![3, 2], row_major_strides(&[3, 2])).with_modes(vec![2, 1]);
            let mut lhs = TensorMut::from_slice_mut(&mut c, vec![2, 2], column_major_strides(&[2, 2])).with_modes(vec![0, 1]);
            contract_host(&mut lhs, &rhs1, &rhs2, Par::Seq);
        }
        // [[58, 64], [139, 154]] stored column-major
        assert_eq!(c, [58.0, 139.0, 64.0, 154.0]);
    }

    #[test]
    fn test_accumulates_into_output() {
        let a = [1.0f32, 2.0];
        let b = [3.0f32, 4.0];
        let mut c = [100.0f32];
        {
            let rhs1 = TensorRef::from_slice(&a, vec![2], vec![1]).with_modes(vec![5]);
            let rhs2 = TensorRef::from_slice(&b, vec![2], vec![1]).with_modes(vec![5]);
            let mut lhs = TensorMut::from_slice_mut(&mut c, Vec::<i64>::new(), Vec::<i64>::new());
            contract_host(&mut lhs, &rhs1, &rhs2, Par::Seq);
        }
        assert_eq!(c, [111.0]);
    }

    #[test]
    fn test_outer_product_and_broadcast() {
        let a = [Complex64::new(1.0, 1.0), Complex64::new(2.0, 0.0)];
        let b = [Complex64::new(0.0, 1.0)];
        let mut c = [Complex64::new(0.0, 0.0); 4];
        {
            let rhs1 = TensorRef::from_slice(&a, vec![2], vec![1]).with_modes(vec![0]);
            let rhs2 = TensorRef::from_slice(&b, vec![1], vec![1]).with_modes(vec![1]);
            // lhs[i, j, x]: x only on the output
            let mut lhs = TensorMut::from_slice_mut(&mut c, vec![2, 1, 2], vec![1, 2, 2]).with_modes(vec![0, 1, 3]);
            contract_host(&mut lhs, &rhs1, &rhs2, Par::Seq);
        }
        let expect = [Complex64::new(-1.0, 1.0), Complex64::new(0.0, 2.0)];
        assert_eq!(c, [expect[0], expect[1], expect[0], expect[1]]);
    }

    #[test]
    fn test_single_operand_modes_are_summed() {
        // lhs[i] = (Σ_p rhs1[i, p]) * rhs2[]
        let a = [1.0f64, 2.0, 3.0, 4.0];
        let b = [10.0f64];
        let mut c = [0.0f64; 2];
        {
            let rhs1 = TensorRef::from_slice(&a, vec![2, 2], vec![1, 2]).with_modes(vec![0, 4]);
            let rhs2 = TensorRef::from_slice(&b, Vec::<i64>::new(), Vec::<i64>::new());
            let mut lhs = TensorMut::from_slice_mut(&mut c, vec![2], vec![1]).with_modes(vec![0]);
            contract_host(&mut lhs, &rhs1, &rhs2, Par::Seq);
        }
        assert_eq!(c, [40.0, 60.0]);
    }

    #[test]
    fn test_zero_extent_contracted_mode_leaves_output() {
        let a: [f64; 0] = [];
        let mut c = [5.0f64; 2];
        {
            let rhs1 = TensorRef::from_slice(&a, vec![2, 0], vec![1, 2]).with_modes(vec![0, 1]);
            let rhs2 = TensorRef::from_slice(&a, vec![0], vec![1]).with_modes(vec![1]);
            let mut lhs = TensorMut::from_slice_mut(&mut c, vec![2], vec![1]).with_modes(vec![0]);
            contract_host(&mut lhs, &rhs1, &rhs2, Par::Seq);
        }
        assert_eq!(c, [5.0, 5.0]);
    }
}
