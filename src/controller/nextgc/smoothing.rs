//! Smoothing strategies for controller components.

use std::fmt::Debug;

/// Turns a stream of raw samples into the value a component reports.
pub trait Smoothing: Send + Debug {
    /// Feeds `sample` and returns the smoothed value.
    fn update(&mut self, sample: f64) -> f64;
}

/// Reports every sample unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct Passthrough;

impl Smoothing for Passthrough {
    fn update(&mut self, sample: f64) -> f64 {
        sample
    }
}

/// Exponential moving average.
///
/// The smaller `alpha` is, the more weight history carries.
#[derive(Debug, Clone)]
pub struct Ema {
    alpha: f64,
    value: Option<f64>,
}

impl Ema {
    /// # Panics
    /// Panics if `alpha` is outside `(0; 1]`.
    pub fn new(alpha: f64) -> Self {
        assert!(alpha > 0.0 && alpha <= 1.0, "EMA alpha must belong to (0; 1]");
        Self { alpha, value: None }
    }

    /// EMA with the same center of mass as a simple moving average over
    /// `window` samples: `alpha = 2 / (window + 1)`.
    pub fn with_window(window: u32) -> Self {
        Self::new(2.0 / (f64::from(window) + 1.0))
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }
}

impl Smoothing for Ema {
    fn update(&mut self, sample: f64) -> f64 {
        let next = match self.value {
            None => sample,
            Some(prev) => prev + self.alpha * (sample - prev),
        };
        self.value = Some(next);
        next
    }
}

/// Picks the strategy for an averaging window. Zero disables smoothing.
pub fn from_window(window: u32) -> Box<dyn Smoothing> {
    if window == 0 {
        Box::new(Passthrough)
    } else {
        Box::new(Ema::with_window(window))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_passthrough() {
        let mut s = Passthrough;
        assert_eq!(s.update(3.5), 3.5);
        assert_eq!(s.update(-1.0), -1.0);
    }

    #[test]
    fn test_ema_alpha_from_window() {
        assert_eq!(Ema::with_window(1).alpha(), 1.0);
        assert!((Ema::with_window(19).alpha() - 0.1).abs() < 1e-12);
    }

    #[test]
    fn test_ema_converges() {
        let mut ema = Ema::with_window(3);
        assert_eq!(ema.update(10.0), 10.0);
        assert_eq!(ema.update(20.0), 15.0);
        assert_eq!(ema.update(20.0), 17.5);

        let mut last = 0.0;
        for _ in 0..100 {
            last = ema.update(20.0);
        }
        assert!((last - 20.0).abs() < 1e-9);
    }

    #[test]
    fn test_window_one_tracks_samples() {
        let mut s = from_window(1);
        s.update(5.0);
        assert_eq!(s.update(42.0), 42.0);
    }

    #[test]
    fn test_zero_window_disables_smoothing() {
        let mut s = from_window(0);
        s.update(5.0);
        assert_eq!(s.update(42.0), 42.0);
    }
}
