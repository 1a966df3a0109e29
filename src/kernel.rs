//! Smoothing kernels for SPH field estimation.
//!
//! All three kernels are members of the B-spline (Schoenberg) family: M4 (cubic),
//! M5 (quartic), and M6 (quintic). Each is radially symmetric and compactly
//! supported; the support ends where the normalized distance `q = r / h` reaches
//! the family's divisor (2, 2.5 or 3). Compact support is what makes spatial
//! pruning by the neighbor search valid: contributions beyond the support radius
//! are exactly zero.
//!
//! `h` is derived from the caller-facing support radius by that same divisor, so
//! a single "kernel radius" can be shared verbatim with the neighbor search.

use std::{f64::consts::PI, str::FromStr};

use bincode::{Decode, Encode};
use lin_alg::f64::Vec3;

use crate::error::{Result, SphError};

/// Step used by the finite-difference gradient check.
#[allow(unused)]
const FD_EPS: f64 = 1e-6;

/// Steps per axis for the quadrature in `integrate`. Coarse; the integral is
/// only used as a normalization sanity check.
#[allow(unused)]
const QUAD_STEPS: usize = 100;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Encode, Decode)]
pub enum KernelKind {
    /// Cubic B-spline. Support: q < 2.
    M4,
    /// Quartic B-spline. Support: q < 2.5.
    M5,
    /// Quintic B-spline. Support: q < 3.
    M6,
}

impl KernelKind {
    /// Divisor mapping the shared support radius to the smoothing length `h`;
    /// also the value of `q` at which the kernel reaches zero.
    pub fn radius_divisor(self) -> f64 {
        match self {
            Self::M4 => 2.0,
            Self::M5 => 2.5,
            Self::M6 => 3.0,
        }
    }

    pub fn to_str(self) -> &'static str {
        match self {
            Self::M4 => "m4",
            Self::M5 => "m5",
            Self::M6 => "m6",
        }
    }
}

impl FromStr for KernelKind {
    type Err = SphError;

    fn from_str(s: &str) -> Result<Self> {
        match s.to_lowercase().as_str() {
            "m4" | "cubic" => Ok(Self::M4),
            "m5" | "quartic" => Ok(Self::M5),
            "m6" | "quintic" => Ok(Self::M6),
            _ => Err(SphError::InvalidKernelType(s.to_owned())),
        }
    }
}

/// A kernel bound to a spatial dimension. The dimension selects the
/// normalization constant; positions are always passed as `Vec3`, with unused
/// components left at zero for 1D/2D.
#[derive(Clone, Copy, Debug)]
pub struct SmoothingKernel {
    pub kind: KernelKind,
    dim: usize,
}

impl SmoothingKernel {
    pub fn new(kind: KernelKind, dim: usize) -> Result<Self> {
        if !(1..=3).contains(&dim) {
            return Err(SphError::UnsupportedDimension(dim));
        }
        Ok(Self { kind, dim })
    }

    #[allow(unused)]
    pub fn dim(&self) -> usize {
        self.dim
    }

    /// Normalization constant σ for this kind and dimension, such that the
    /// kernel integrates to 1 over its support.
    fn sigma(&self, h: f64) -> f64 {
        match (self.kind, self.dim) {
            (KernelKind::M4, 1) => 2. / (3. * h),
            (KernelKind::M4, 2) => 10. / (7. * PI * h.powi(2)),
            (KernelKind::M4, 3) => 1. / (PI * h.powi(3)),
            (KernelKind::M5, 1) => 1. / (24. * h),
            (KernelKind::M5, 2) => 96. / (1_199. * PI * h.powi(2)),
            (KernelKind::M5, 3) => 1. / (20. * PI * h.powi(3)),
            (KernelKind::M6, 1) => 1. / (120. * h),
            (KernelKind::M6, 2) => 7. / (478. * PI * h.powi(2)),
            (KernelKind::M6, 3) => 1. / (120. * PI * h.powi(3)),
            // `new` validates the dimension.
            _ => unreachable!(),
        }
    }

    /// Kernel value W(|source - dest|, h), where h = support_radius / divisor.
    pub fn value(&self, source: Vec3, dest: Vec3, support_radius: f64) -> f64 {
        let h = support_radius / self.kind.radius_divisor();
        let q = (source - dest).magnitude() / h;

        self.sigma(h) * shape(self.kind, q)
    }

    /// Analytical gradient, taken with respect to `source`:
    /// ∇W = (dW/dq) · (source - dest) / (r·h).
    ///
    /// Antisymmetric under swapping the two positions, which the pressure force
    /// relies on for momentum conservation.
    pub fn gradient(&self, source: Vec3, dest: Vec3, support_radius: f64) -> Vec3 {
        let h = support_radius / self.kind.radius_divisor();
        let diff = source - dest;
        let r = diff.magnitude();

        if r < 1e-12 {
            // dW/dq vanishes at q = 0 for all three kernels; avoid the 0/0 in
            // the direction vector.
            return Vec3::new_zero();
        }

        let q = r / h;
        let dw_dq = self.sigma(h) * shape_deriv(self.kind, q);

        diff * (dw_dq / (r * h))
    }

    /// Symmetric central-difference gradient. Verification tool only; the
    /// simulation always uses the closed form.
    #[allow(unused)]
    pub fn gradient_numerical(&self, source: Vec3, dest: Vec3, support_radius: f64) -> Vec3 {
        let diff_along = |step: Vec3| {
            let plus = self.value(source + step, dest, support_radius);
            let minus = self.value(source - step, dest, support_radius);
            (plus - minus) / (2. * FD_EPS)
        };

        Vec3::new(
            diff_along(Vec3::new(FD_EPS, 0., 0.)),
            diff_along(Vec3::new(0., FD_EPS, 0.)),
            diff_along(Vec3::new(0., 0., FD_EPS)),
        )
    }

    /// Integrate the kernel over its support with a midpoint Riemann sum.
    /// Approaches 1.0 for every kind and dimension; used as a sanity check on
    /// the normalization constants.
    #[allow(unused)]
    pub fn integrate(&self, support_radius: f64) -> f64 {
        let r = support_radius;
        let n = QUAD_STEPS;
        let dx = 2. * r / n as f64;
        let origin = Vec3::new_zero();

        let axis = |i: usize| -r + (i as f64 + 0.5) * dx;

        let mut total = 0.;
        match self.dim {
            1 => {
                for i in 0..n {
                    total += self.value(Vec3::new(axis(i), 0., 0.), origin, r) * dx;
                }
            }
            2 => {
                for i in 0..n {
                    for j in 0..n {
                        total +=
                            self.value(Vec3::new(axis(i), axis(j), 0.), origin, r) * dx * dx;
                    }
                }
            }
            3 => {
                for i in 0..n {
                    for j in 0..n {
                        for k in 0..n {
                            total += self
                                .value(Vec3::new(axis(i), axis(j), axis(k)), origin, r)
                                * dx
                                * dx
                                * dx;
                        }
                    }
                }
            }
            _ => unreachable!(),
        }

        total
    }
}

/// Unnormalized piecewise polynomial for each family, as a function of q.
fn shape(kind: KernelKind, q: f64) -> f64 {
    match kind {
        KernelKind::M4 => {
            if q < 1. {
                1. - 1.5 * q.powi(2) + 0.75 * q.powi(3)
            } else if q < 2. {
                0.25 * (2. - q).powi(3)
            } else {
                0.
            }
        }
        KernelKind::M5 => {
            if q < 0.5 {
                (2.5 - q).powi(4) - 5. * (1.5 - q).powi(4) + 10. * (0.5 - q).powi(4)
            } else if q < 1.5 {
                (2.5 - q).powi(4) - 5. * (1.5 - q).powi(4)
            } else if q < 2.5 {
                (2.5 - q).powi(4)
            } else {
                0.
            }
        }
        KernelKind::M6 => {
            if q < 1. {
                (3. - q).powi(5) - 6. * (2. - q).powi(5) + 15. * (1. - q).powi(5)
            } else if q < 2. {
                (3. - q).powi(5) - 6. * (2. - q).powi(5)
            } else if q < 3. {
                (3. - q).powi(5)
            } else {
                0.
            }
        }
    }
}

/// d(shape)/dq for each family. Zero at q = 0 for all three, so the gradient
/// is continuous through the origin.
fn shape_deriv(kind: KernelKind, q: f64) -> f64 {
    match kind {
        KernelKind::M4 => {
            if q < 1. {
                -3. * q + 2.25 * q.powi(2)
            } else if q < 2. {
                -0.75 * (2. - q).powi(2)
            } else {
                0.
            }
        }
        KernelKind::M5 => {
            if q < 0.5 {
                -4. * (2.5 - q).powi(3) + 20. * (1.5 - q).powi(3) - 40. * (0.5 - q).powi(3)
            } else if q < 1.5 {
                -4. * (2.5 - q).powi(3) + 20. * (1.5 - q).powi(3)
            } else if q < 2.5 {
                -4. * (2.5 - q).powi(3)
            } else {
                0.
            }
        }
        KernelKind::M6 => {
            if q < 1. {
                -5. * (3. - q).powi(4) + 30. * (2. - q).powi(4) - 75. * (1. - q).powi(4)
            } else if q < 2. {
                -5. * (3. - q).powi(4) + 30. * (2. - q).powi(4)
            } else if q < 3. {
                -5. * (3. - q).powi(4)
            } else {
                0.
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const ALL_KINDS: [KernelKind; 3] = [KernelKind::M4, KernelKind::M5, KernelKind::M6];

    fn assert_close(a: f64, b: f64, tol: f64, msg: &str) {
        assert!((a - b).abs() < tol, "{msg}: {a} vs {b}");
    }

    #[test]
    fn m4_reference_values() {
        // radius = 2 => h = 1.
        let kernel = SmoothingKernel::new(KernelKind::M4, 3).unwrap();
        let origin = Vec3::new_zero();

        assert_close(
            kernel.value(origin, origin, 2.0),
            1. / PI,
            1e-12,
            "M4 at q=0",
        );
        assert_close(
            kernel.value(Vec3::new(1., 0., 0.), origin, 2.0),
            1. / (4. * PI),
            1e-12,
            "M4 at q=1",
        );
        assert_eq!(kernel.value(Vec3::new(2., 0., 0.), origin, 2.0), 0.);
        assert_eq!(kernel.value(Vec3::new(0., -5., 0.), origin, 2.0), 0.);
    }

    #[test]
    fn m5_reference_values() {
        // radius = 2.5 => h = 1.
        let kernel = SmoothingKernel::new(KernelKind::M5, 3).unwrap();
        let origin = Vec3::new_zero();

        assert_close(
            kernel.value(origin, origin, 2.5),
            230. / (320. * PI),
            1e-12,
            "M5 at q=0",
        );
        assert_eq!(kernel.value(Vec3::new(2.5, 0., 0.), origin, 2.5), 0.);
    }

    #[test]
    fn m6_reference_values() {
        // radius = 3 => h = 1.
        let kernel = SmoothingKernel::new(KernelKind::M6, 3).unwrap();
        let origin = Vec3::new_zero();

        assert_close(
            kernel.value(origin, origin, 3.0),
            66. / (120. * PI),
            1e-12,
            "M6 at q=0",
        );
        assert_eq!(kernel.value(Vec3::new(3., 0., 0.), origin, 3.0), 0.);
    }

    #[test]
    fn radial_symmetry() {
        let a = Vec3::new(0.3, -0.2, 0.9);
        let b = Vec3::new(-0.4, 0.55, 0.1);

        for kind in ALL_KINDS {
            let kernel = SmoothingKernel::new(kind, 3).unwrap();
            let w_ab = kernel.value(a, b, 2.0);
            let w_ba = kernel.value(b, a, 2.0);
            assert!(w_ab > 0., "test points should lie inside the support");
            assert_close(w_ab, w_ba, 1e-14, "W(a,b) != W(b,a)");
        }
    }

    #[test]
    fn gradient_antisymmetry() {
        let a = Vec3::new(0.1, 0.7, -0.3);
        let b = Vec3::new(0.9, -0.1, 0.2);

        for kind in ALL_KINDS {
            let kernel = SmoothingKernel::new(kind, 3).unwrap();
            let g_ab = kernel.gradient(a, b, 2.0);
            let g_ba = kernel.gradient(b, a, 2.0);

            assert_close(g_ab.x, -g_ba.x, 1e-14, "grad x");
            assert_close(g_ab.y, -g_ba.y, 1e-14, "grad y");
            assert_close(g_ab.z, -g_ba.z, 1e-14, "grad z");
        }
    }

    #[test]
    fn gradient_matches_finite_difference() {
        let dest = Vec3::new(0.05, -0.1, 0.02);
        // Sample points spread across all pieces of each kernel.
        let sources = [
            Vec3::new(0.3, 0.1, 0.),
            Vec3::new(0.8, -0.4, 0.3),
            Vec3::new(1.2, 0.5, -0.6),
            Vec3::new(-0.2, 1.4, 0.9),
        ];

        for kind in ALL_KINDS {
            let kernel = SmoothingKernel::new(kind, 3).unwrap();
            for &source in &sources {
                let analytic = kernel.gradient(source, dest, 2.5);
                let numeric = kernel.gradient_numerical(source, dest, 2.5);

                let scale = analytic.magnitude().max(1e-8);
                assert!(
                    (analytic - numeric).magnitude() / scale < 1e-4,
                    "{kind:?}: analytic {analytic:?} vs numeric {numeric:?}"
                );
            }
        }
    }

    #[test]
    fn gradient_zero_at_origin_and_outside_support() {
        for kind in ALL_KINDS {
            let kernel = SmoothingKernel::new(kind, 3).unwrap();
            let g0 = kernel.gradient(Vec3::new_zero(), Vec3::new_zero(), 2.0);
            assert_eq!(g0.magnitude(), 0.);

            let far = kernel.gradient(Vec3::new(5., 0., 0.), Vec3::new_zero(), 2.0);
            assert_eq!(far.magnitude(), 0.);
        }
    }

    #[test]
    fn integrates_to_unity() {
        for kind in ALL_KINDS {
            for dim in 1..=3 {
                let kernel = SmoothingKernel::new(kind, dim).unwrap();
                let integral = kernel.integrate(kind.radius_divisor());
                assert_close(
                    integral,
                    1.0,
                    1e-3,
                    &format!("{kind:?} dim {dim} integral"),
                );
            }
        }
    }

    #[test]
    fn rejects_bad_dimension() {
        assert_eq!(
            SmoothingKernel::new(KernelKind::M4, 0).unwrap_err(),
            SphError::UnsupportedDimension(0)
        );
        assert_eq!(
            SmoothingKernel::new(KernelKind::M6, 4).unwrap_err(),
            SphError::UnsupportedDimension(4)
        );
    }

    #[test]
    fn parses_kernel_tags() {
        assert_eq!("m4".parse::<KernelKind>().unwrap(), KernelKind::M4);
        assert_eq!("quintic".parse::<KernelKind>().unwrap(), KernelKind::M6);
        assert!(matches!(
            "m7".parse::<KernelKind>(),
            Err(SphError::InvalidKernelType(_))
        ));
    }
}
