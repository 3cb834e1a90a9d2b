/// Floating point type used for every stored parameter.
pub type Real = f64;

/// One tolerance for everything
#[derive(Clone, Copy, Debug)]
pub struct Tolerances {
    pub abs: Real,
    pub rel: Real,
}

impl Default for Tolerances {
    fn default() -> Self {
        Self {
            abs: 1e-9,
            rel: 1e-9,
        }
    }
}

pub fn nearly_equal(a: Real, b: Real, tol: Tolerances) -> bool {
    let diff = (a - b).abs();
    if diff <= tol.abs {
        return true;
    }
    diff <= tol.rel * a.abs().max(b.abs())
}

/// True if every value is finite (no NaN or infinity).
pub fn all_finite(values: &[Real]) -> bool {
    values.iter().all(|v| v.is_finite())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn nearly_equal_basic() {
        let tol = Tolerances {
            abs: 1e-12,
            rel: 1e-9,
        };
        assert!(nearly_equal(1.0, 1.0 + 1e-12, tol));
        assert!(nearly_equal(0.0, 1e-13, tol));
        assert!(!nearly_equal(1.0, 1.0 + 1e-6, tol));
    }

    #[test]
    fn fraction_sums_within_default_tolerance() {
        let sum: Real = [0.1, 0.2, 0.7].iter().sum();
        assert!(nearly_equal(sum, 1.0, Tolerances::default()));
    }

    #[test]
    fn all_finite_detects_nan() {
        assert!(all_finite(&[0.0, 1.5]));
        assert!(!all_finite(&[0.0, Real::NAN]));
        assert!(!all_finite(&[Real::INFINITY]));
    }
}
