/// Clamps `value` to `[min; max]`. NaN maps to `min`.
pub fn clamp_f64(value: f64, min: f64, max: f64) -> f64 {
    if value.is_nan() || value < min {
        min
    } else if value > max {
        max
    } else {
        value
    }
}
