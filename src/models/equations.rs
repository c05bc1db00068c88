//! Physics equations (SI units throughout).
//!
//! Pure and stateless. Functions that can hit a zero denominator return a
//! `DrudeError` instead of an infinity.

use std::f64::consts::PI;

use crate::error::DrudeError;

/// `c / x`: wavelength (m) to frequency (Hz), or frequency to wavelength.
pub fn wavelength_or_frequency(speed_of_light: f64, x: f64) -> Result<f64, DrudeError> {
    if x == 0.0 {
        return Err(DrudeError::DivisionByZero("wavelength/frequency conversion".to_string()));
    }
    Ok(speed_of_light / x)
}

/// `2πf`
pub fn angular_frequency(frequency: f64) -> f64 {
    2.0 * PI * frequency
}

/// Bulk conductivity (S/m) from sheet resistance (Ω/sq) and film thickness (m).
pub fn sheet_resistance_to_conductivity(
    sheet_resistance: f64,
    thickness: f64,
) -> Result<f64, DrudeError> {
    let resistivity = sheet_resistance * thickness;
    if resistivity == 0.0 {
        return Err(DrudeError::DivisionByZero(
            "conductivity (sheet resistance × thickness is zero)".to_string(),
        ));
    }
    Ok(1.0 / resistivity)
}

/// Carrier density (m⁻³) from conductivity (S/m) and mobility (m²/Vs).
pub fn conductivity_to_carrier_density(
    conductivity: f64,
    mobility: f64,
    electron_charge: f64,
) -> Result<f64, DrudeError> {
    let denom = mobility * electron_charge;
    if denom == 0.0 {
        return Err(DrudeError::DivisionByZero(
            "carrier density (mobility × charge is zero)".to_string(),
        ));
    }
    Ok(conductivity / denom)
}

/// `ωp = sqrt(N e² / (ε0 m*))`, with `effective_mass` in kg.
pub fn plasma_frequency(
    carrier_density: f64,
    electron_charge: f64,
    epsilon_naught: f64,
    effective_mass: f64,
) -> Result<f64, DrudeError> {
    if carrier_density < 0.0 {
        return Err(DrudeError::NegativeCarrierDensity(carrier_density));
    }
    let denom = epsilon_naught * effective_mass;
    if denom == 0.0 {
        return Err(DrudeError::DivisionByZero(
            "plasma frequency (ε0 × m* is zero)".to_string(),
        ));
    }
    Ok((carrier_density * electron_charge * electron_charge / denom).sqrt())
}

/// Real permittivity of an undamped Drude metal: `ε∞ − ωp²/ω²`.
pub fn drude_real(epsilon_infinity: f64, plasma_frequency: f64, omega: f64) -> f64 {
    epsilon_infinity - (plasma_frequency * plasma_frequency) / (omega * omega)
}

/// Imaginary permittivity in the high-frequency limit `ωτ ≫ 1`:
/// `ε∞ ωp² / (ω³ τ)`.
pub fn drude_imag(
    epsilon_infinity: f64,
    plasma_frequency: f64,
    omega: f64,
    relaxation_time: f64,
) -> f64 {
    epsilon_infinity * plasma_frequency * plasma_frequency / (omega.powi(3) * relaxation_time)
}

/// `(ε_real, ε_imag) = (n² − k², 2nk)`
pub fn permittivity_from_nk(n: f64, k: f64) -> (f64, f64) {
    (n * n - k * k, 2.0 * n * k)
}
