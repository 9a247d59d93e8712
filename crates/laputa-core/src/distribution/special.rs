//! Special functions for the normal and beta families.

use std::f64::consts::PI;

use statrs::function::beta::beta_reg;
use statrs::function::erf::erfc;
use statrs::function::gamma::ln_gamma;

/// Lower tail of a zero-mean gaussian with standard deviation `sigma`.
pub fn gaussian_cdf(x: f64, sigma: f64) -> f64 {
    0.5 * erfc(-x / (sigma * std::f64::consts::SQRT_2))
}

/// Density of a zero-mean gaussian.
pub fn gaussian_pdf(x: f64, sigma: f64) -> f64 {
    let u = x / sigma;
    (-0.5 * u * u).exp() / (sigma * (2.0 * PI).sqrt())
}

/// Beta density. Zero outside [0, 1].
pub fn beta_pdf(x: f64, a: f64, b: f64) -> f64 {
    if !(0.0..=1.0).contains(&x) || a <= 0.0 || b <= 0.0 {
        return 0.0;
    }
    if x == 0.0 || x == 1.0 {
        // boundary: finite only for exponents >= 1
        let edge = if x == 0.0 { a } else { b };
        if edge < 1.0 {
            return f64::INFINITY;
        }
        if edge > 1.0 {
            return 0.0;
        }
    }
    let ln_beta = ln_gamma(a) + ln_gamma(b) - ln_gamma(a + b);
    let mut ln = -ln_beta;
    if x > 0.0 {
        ln += (a - 1.0) * x.ln();
    }
    if x < 1.0 {
        ln += (b - 1.0) * (1.0 - x).ln();
    }
    ln.exp()
}

/// Regularized incomplete beta function I_x(a, b). Zero for non-positive
/// shape parameters.
pub fn beta_cdf(x: f64, a: f64, b: f64) -> f64 {
    if x <= 0.0 || a <= 0.0 || b <= 0.0 {
        return 0.0;
    }
    if x >= 1.0 {
        return 1.0;
    }
    beta_reg(a, b, x)
}

/// Unnormalised beta kernel x^(a-1) (1-x)^(b-1), used for trust functions.
pub fn abnormal_beta(x: f64, a: f64, b: f64) -> f64 {
    x.powf(a - 1.0) * (1.0 - x).powf(b - 1.0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gaussian_cdf() {
        assert!((gaussian_cdf(0.0, 1.0) - 0.5).abs() < 1e-15);
        assert!((gaussian_cdf(1.0, 1.0) - 0.841_344_746_068_543).abs() < 1e-12);
        assert!((gaussian_cdf(-0.2, 0.1) - 0.022_750_131_948_179).abs() < 1e-12);
    }

    #[test]
    fn test_gaussian_cdf_is_symmetric() {
        for x in [0.1, 0.5, 1.3, 2.7] {
            let sum = gaussian_cdf(x, 0.4) + gaussian_cdf(-x, 0.4);
            assert!((sum - 1.0).abs() < 1e-14);
        }
    }

    #[test]
    fn test_beta_cdf_symmetric() {
        assert!((beta_cdf(0.5, 2.0, 2.0) - 0.5).abs() < 1e-10);
        // I_x(2,2) = 3x^2 - 2x^3
        let x: f64 = 0.3;
        assert!((beta_cdf(x, 2.0, 2.0) - (3.0 * x * x - 2.0 * x.powi(3))).abs() < 1e-10);
    }

    #[test]
    fn test_beta_pdf() {
        // Beta(2,2) density is 6x(1-x)
        assert!((beta_pdf(0.25, 2.0, 2.0) - 6.0 * 0.25 * 0.75).abs() < 1e-9);
        assert_eq!(beta_pdf(0.0, 2.0, 2.0), 0.0);
        assert!((beta_pdf(0.0, 1.0, 1.0) - 1.0).abs() < 1e-9);
        assert_eq!(beta_pdf(0.5, 0.0, 2.0), 0.0);
    }

    #[test]
    fn test_beta_cdf_rejects_bad_shapes() {
        assert_eq!(beta_cdf(0.5, 0.0, 2.0), 0.0);
        assert_eq!(beta_cdf(1.5, 2.0, 2.0), 1.0);
    }
}
