//! Level conversions shared by the stages.

/// Convert decibels to linear gain.
///
/// ```rust
/// use cadence_stages::db_to_linear;
///
/// assert!((db_to_linear(0.0) - 1.0).abs() < 0.001);
/// assert!((db_to_linear(-6.02) - 0.5).abs() < 0.01);
/// ```
#[inline]
pub fn db_to_linear(db: f32) -> f32 {
    // 10^(dB/20) = e^(dB * ln(10)/20)
    const FACTOR: f32 = core::f32::consts::LN_10 / 20.0;
    (db * FACTOR).exp()
}

/// Convert linear gain to decibels, floored at -200 dB.
#[inline]
pub fn linear_to_db(linear: f32) -> f32 {
    const FACTOR: f32 = 20.0 / core::f32::consts::LN_10;
    linear.max(1e-10).ln() * FACTOR
}

/// Flush values too small to matter to zero, keeping feedback paths out of
/// the subnormal range.
#[inline]
pub fn flush_denormal(x: f32) -> f32 {
    if x.abs() < 1e-20 { 0.0 } else { x }
}
