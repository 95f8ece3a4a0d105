//! Extended linear system solved by a supernode.
//!
//! Rows `0..N` are member nodes (charge balance), rows `N..N+M` are ideal
//! links (voltage constraints). The unknowns are the node voltage
//! derivatives followed by the ideal-link currents:
//!
//! ```text
//! | C   B | | dv/dt |   | current_in       |
//! | B'  0 | | i     | = | -d(sn_voltage)/dt |
//! ```
//!
//! The matrix is built once per run and inverted once.

use nalgebra::{DMatrix, DVector};

/// Matrix row of a member node; `None` for ground ends, which never couple.
pub type Row = Option<usize>;

/// Builder and inverse of the extended supernode system.
#[derive(Debug, Clone)]
pub struct ExtendedSystem {
    /// Number of member nodes (N)
    nodes: usize,
    /// Number of ideal links (M)
    ideal: usize,
    /// (N+M)² coefficient matrix
    coefficients: DMatrix<f64>,
}

impl ExtendedSystem {
    /// Create an empty system for `nodes` members and `ideal` ideal links.
    pub fn new(nodes: usize, ideal: usize) -> Self {
        let size = nodes + ideal;
        Self {
            nodes,
            ideal,
            coefficients: DMatrix::zeros(size, size),
        }
    }

    pub fn size(&self) -> usize {
        self.nodes + self.ideal
    }

    pub fn node_count(&self) -> usize {
        self.nodes
    }

    pub fn ideal_count(&self) -> usize {
        self.ideal
    }

    /// Row of ideal link `k`.
    pub fn ideal_row(&self, k: usize) -> usize {
        self.nodes + k
    }

    pub fn coefficients(&self) -> &DMatrix<f64> {
        &self.coefficients
    }

    /// Put a node's own capacitance on the diagonal.
    pub fn stamp_node(&mut self, row: usize, capacitance: f64) {
        self.coefficients[(row, row)] += capacitance;
    }

    /// Decouple a ground row: identity, so its solution equals its input (kept at 0).
    pub fn stamp_ground(&mut self, row: usize) {
        self.coefficients[(row, row)] = 1.0;
    }

    /// Stamp a finite coupling capacitance between two rows.
    ///   A[p,p] += C
    ///   A[n,n] += C
    ///   A[p,n] -= C
    ///   A[n,p] -= C
    pub fn stamp_capacitance(&mut self, pos: Row, neg: Row, capacitance: f64) {
        match (pos, neg) {
            (Some(p), Some(n)) => {
                self.coefficients[(p, p)] += capacitance;
                self.coefficients[(n, n)] += capacitance;
                self.coefficients[(p, n)] -= capacitance;
                self.coefficients[(n, p)] -= capacitance;
            }
            (Some(p), None) => {
                self.coefficients[(p, p)] += capacitance;
            }
            (None, Some(n)) => {
                self.coefficients[(n, n)] += capacitance;
            }
            (None, None) => {}
        }
    }

    /// Stamp ideal link `k` imposing `d(v_pos - v_neg)/dt`.
    ///
    /// The link current enters the positive row with a `-1` and the
    /// negative row with a `+1`; the constraint row is the transpose.
    pub fn stamp_ideal_link(&mut self, pos: Row, neg: Row, k: usize) {
        let br = self.ideal_row(k);
        if let Some(p) = pos {
            self.coefficients[(p, br)] -= 1.0;
            self.coefficients[(br, p)] -= 1.0;
        }
        if let Some(n) = neg {
            self.coefficients[(n, br)] += 1.0;
            self.coefficients[(br, n)] += 1.0;
        }
    }

    /// Invert the system through an LU factorisation.
    ///
    /// Returns `None` when the matrix is singular or the inverse is not finite.
    pub fn invert(&self) -> Option<DMatrix<f64>> {
        let inverse = self.coefficients.clone().lu().try_inverse()?;
        if inverse.iter().all(|v| v.is_finite()) {
            Some(inverse)
        } else {
            None
        }
    }

    /// Unit input vector selecting ideal link `k`.
    pub fn ideal_unit(&self, k: usize) -> DVector<f64> {
        let mut e = DVector::zeros(self.size());
        e[self.ideal_row(k)] = 1.0;
        e
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_capacitance_stencil() {
        let mut sys = ExtendedSystem::new(2, 0);
        sys.stamp_node(0, 1.0);
        sys.stamp_node(1, 2.0);
        sys.stamp_capacitance(Some(0), Some(1), 0.5);

        let a = sys.coefficients();
        assert_eq!(a[(0, 0)], 1.5);
        assert_eq!(a[(1, 1)], 2.5);
        assert_eq!(a[(0, 1)], -0.5);
        assert_eq!(a[(1, 0)], -0.5);
    }

    #[test]
    fn test_ideal_link_stamp_is_symmetric() {
        let mut sys = ExtendedSystem::new(2, 1);
        sys.stamp_ideal_link(Some(0), Some(1), 0);

        let a = sys.coefficients();
        assert_eq!(a[(0, 2)], -1.0);
        assert_eq!(a[(2, 0)], -1.0);
        assert_eq!(a[(1, 2)], 1.0);
        assert_eq!(a[(2, 1)], 1.0);
    }

    #[test]
    fn test_ground_end_is_skipped() {
        let mut sys = ExtendedSystem::new(2, 1);
        sys.stamp_ground(1);
        sys.stamp_ideal_link(Some(0), None, 0);
        sys.stamp_capacitance(None, Some(0), 3.0);

        let a = sys.coefficients();
        assert_eq!(a[(1, 1)], 1.0);
        assert_eq!(a[(1, 2)], 0.0);
        assert_eq!(a[(0, 0)], 3.0);
    }

    #[test]
    fn test_invert_wire_to_ground() {
        // node a (1 F) tied to ground through an ideal link
        let mut sys = ExtendedSystem::new(2, 1);
        sys.stamp_node(0, 1.0);
        sys.stamp_ground(1);
        sys.stamp_ideal_link(Some(0), None, 0);

        let inv = sys.invert().expect("invertible");
        let mut input = DVector::zeros(3);
        input[0] = 2.0;
        let out = &inv * &input;

        // the link holds the node still and sinks the injected current
        assert_relative_eq!(out[0], 0.0);
        assert_relative_eq!(out[2], -2.0);
    }

    #[test]
    fn test_invert_singular() {
        let mut sys = ExtendedSystem::new(1, 1);
        sys.stamp_node(0, 1.0);
        // an ideal link with both ends on ground leaves a zero row
        sys.stamp_ideal_link(None, None, 0);
        assert!(sys.invert().is_none());
    }
}
