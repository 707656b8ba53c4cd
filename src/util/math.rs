//! Small numeric helpers for the homography solver.

/// Solves the dense linear system `a * x = b` in place via Gaussian
/// elimination with partial pivoting.
///
/// `a` is a row-major `n x n` matrix and `b` has length `n`. Returns the
/// solution vector, or `None` if the system is singular (pivot below `eps`).
pub(crate) fn solve_linear(a: &mut [f64], b: &mut [f64], n: usize, eps: f64) -> Option<Vec<f64>> {
    debug_assert_eq!(a.len(), n * n);
    debug_assert_eq!(b.len(), n);

    for col in 0..n {
        let mut pivot = col;
        let mut pivot_abs = a[col * n + col].abs();
        for row in (col + 1)..n {
            let value = a[row * n + col].abs();
            if value > pivot_abs {
                pivot = row;
                pivot_abs = value;
            }
        }
        if pivot_abs < eps {
            return None;
        }
        if pivot != col {
            for k in col..n {
                a.swap(col * n + k, pivot * n + k);
            }
            b.swap(col, pivot);
        }

        let diag = a[col * n + col];
        for row in (col + 1)..n {
            let factor = a[row * n + col] / diag;
            if factor == 0.0 {
                continue;
            }
            for k in col..n {
                a[row * n + k] -= factor * a[col * n + k];
            }
            b[row] -= factor * b[col];
        }
    }

    let mut x = vec![0.0f64; n];
    for col in (0..n).rev() {
        let mut acc = b[col];
        for k in (col + 1)..n {
            acc -= a[col * n + k] * x[k];
        }
        x[col] = acc / a[col * n + col];
    }
    Some(x)
}

#[cfg(test)]
mod tests {
    use super::solve_linear;

    #[test]
    fn solves_identity_system() {
        let mut a = vec![1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0];
        let mut b = vec![3.0, -2.0, 0.5];
        let x = solve_linear(&mut a, &mut b, 3, 1e-12).unwrap();
        assert!((x[0] - 3.0).abs() < 1e-12);
        assert!((x[1] + 2.0).abs() < 1e-12);
        assert!((x[2] - 0.5).abs() < 1e-12);
    }

    #[test]
    fn solves_system_requiring_pivoting() {
        // First pivot is zero, so partial pivoting must swap rows.
        let mut a = vec![0.0, 2.0, 1.0, 3.0, 0.0, 1.0, 1.0, 1.0, 1.0];
        let mut b = vec![5.0, 7.0, 4.0];
        let x = solve_linear(&mut a, &mut b, 3, 1e-12).unwrap();
        // Verify by substitution.
        assert!((2.0 * x[1] + x[2] - 5.0).abs() < 1e-9);
        assert!((3.0 * x[0] + x[2] - 7.0).abs() < 1e-9);
        assert!((x[0] + x[1] + x[2] - 4.0).abs() < 1e-9);
    }

    #[test]
    fn rejects_singular_system() {
        let mut a = vec![1.0, 2.0, 2.0, 4.0];
        let mut b = vec![1.0, 2.0];
        assert!(solve_linear(&mut a, &mut b, 2, 1e-12).is_none());
    }
}
