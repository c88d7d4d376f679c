// SPDX-License-Identifier: MIT

//! Closed-form waveform kernels, evaluated per sample offset.
//!
//! Each kernel is the unscaled, unshifted analytic amplitude at sample
//! offset `x` from the pulse center. Values outside a pulse's declared
//! bounds are suppressed by the bounds themselves, not clipped here.

/// Flat top of amplitude 1 inside the plateau, Gaussian roll-off beyond.
///
/// `width` is the FWHM of the roll-off; `sigma = width / (2 sqrt(2 ln 2))`.
pub fn gauss(x: f64, width: f64, plateau: f64) -> f64 {
    let sigma = width / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
    let t = x.abs() - plateau / 2.0;
    if t <= 0.0 {
        1.0
    } else {
        (-t * t / (2.0 * sigma * sigma)).exp()
    }
}

/// Derivative-of-Gaussian shape, normalized to peak amplitude 1 at `x = ±sigma`.
pub fn drag(x: f64, width: f64) -> f64 {
    let sigma = width / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
    -std::f64::consts::E.sqrt() * x * (-x * x / (2.0 * sigma * sigma)).exp() / sigma
}

/// 1 inside `|x| <= width / 2`, 0 outside.
pub fn rectangle(x: f64, width: f64) -> f64 {
    if x.abs() <= width / 2.0 { 1.0 } else { 0.0 }
}

/// Flat top inside the plateau with a raised-cosine taper of length `width`
/// on either side.
pub fn raised_cosine(x: f64, width: f64, plateau: f64) -> f64 {
    let t = x.abs() - plateau / 2.0;
    if t <= 0.0 {
        1.0
    } else if t <= width {
        ((t * std::f64::consts::PI / width).cos() + 1.0) / 2.0
    } else {
        0.0
    }
}

/// Linear ramp from `amplitude_start` to `amplitude_end` across the width.
pub fn ramp(x: f64, width: f64, amplitude_start: f64, amplitude_end: f64) -> f64 {
    if x.abs() < width / 2.0 {
        let avg = (amplitude_end + amplitude_start) / 2.0;
        let slope = (amplitude_end - amplitude_start) / width;
        x * slope + avg
    } else {
        0.0
    }
}

/// Product of cosine tones: `cos(2 pi f x / sample_rate + phase)` over all
/// `(frequency_hz, phase_deg)` pairs.
pub fn carrier(x: f64, sample_rate: f64, tones: &[(f64, f64)]) -> f64 {
    let t = x / sample_rate;
    tones.iter().fold(1.0, |acc, (frequency, phase)| {
        let phase_in_rad = phase * std::f64::consts::PI / 180.0;
        acc * (2.0 * std::f64::consts::PI * frequency * t + phase_in_rad).cos()
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    const EPS: f64 = 1e-12;

    #[test]
    fn test_gauss_center_and_fwhm() {
        assert_eq!(gauss(0.0, 10.0, 0.0), 1.0);
        // Half maximum at half the FWHM from the center.
        assert!((gauss(5.0, 10.0, 0.0) - 0.5).abs() < EPS);
        // Plateau holds the peak value.
        assert_eq!(gauss(3.0, 10.0, 8.0), 1.0);
        assert!((gauss(9.0, 10.0, 8.0) - 0.5).abs() < EPS);
    }

    #[test]
    fn test_drag_center_and_peak() {
        assert_eq!(drag(0.0, 10.0), 0.0);
        let sigma = 10.0 / (2.0 * (2.0 * std::f64::consts::LN_2).sqrt());
        // Extrema of -sqrt(e) x exp(-x^2/2s^2)/s sit at x = -/+ sigma with |value| 1.
        assert!((drag(-sigma, 10.0) - 1.0).abs() < EPS);
        assert!((drag(sigma, 10.0) + 1.0).abs() < EPS);
    }

    #[test]
    fn test_rectangle_edges() {
        assert_eq!(rectangle(0.0, 10.0), 1.0);
        assert_eq!(rectangle(5.0, 10.0), 1.0);
        assert_eq!(rectangle(5.1, 10.0), 0.0);
    }

    #[test]
    fn test_raised_cosine_taper() {
        assert_eq!(raised_cosine(0.0, 10.0, 4.0), 1.0);
        assert_eq!(raised_cosine(2.0, 10.0, 4.0), 1.0);
        // Halfway through the taper the amplitude is 1/2.
        assert!((raised_cosine(7.0, 10.0, 4.0) - 0.5).abs() < EPS);
        assert_eq!(raised_cosine(12.1, 10.0, 4.0), 0.0);
    }

    #[test]
    fn test_ramp_center_value() {
        assert!((ramp(0.0, 10.0, -1.0, 1.0)).abs() < EPS);
        assert!((ramp(2.5, 10.0, -1.0, 1.0) - 0.5).abs() < EPS);
        assert_eq!(ramp(5.0, 10.0, -1.0, 1.0), 0.0);
    }

    #[test]
    fn test_carrier_tones() {
        // Zero frequency, zero phase: constant 1.
        assert_eq!(carrier(123.0, 2.4e9, &[(0.0, 0.0)]), 1.0);
        // 90 degree phase: cos(pi/2) = 0 at x = 0.
        assert!(carrier(0.0, 2.4e9, &[(1e6, 90.0)]).abs() < EPS);
        // Product of two tones.
        let v = carrier(10.0, 2.4e9, &[(1e6, 0.0), (2e6, 0.0)]);
        let t = 10.0 / 2.4e9;
        let expected = (2.0 * std::f64::consts::PI * 1e6 * t).cos()
            * (2.0 * std::f64::consts::PI * 2e6 * t).cos();
        assert!((v - expected).abs() < EPS);
    }
}
