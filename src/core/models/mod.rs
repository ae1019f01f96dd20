pub mod sample;
pub mod snapshot;
pub mod state;

/// Round a monetary figure to whole cents. Values too large to scale are
/// already coarser than a cent and come back unchanged.
pub fn round_cents(value: f64) -> f64 {
    let scaled = value * 100.0;
    if !scaled.is_finite() {
        return value;
    }
    scaled.round() / 100.0
}
