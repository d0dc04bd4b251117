pub trait Lerp {
    type Output;
    fn lerp(&self, next: &Self, t: f64) -> Self::Output;
}

impl Lerp for f64 {
    type Output = Self;

    fn lerp(&self, next: &Self, t: f64) -> Self::Output {
        self + (next - self) * t
    }
}

impl Lerp for f32 {
    type Output = Self;

    fn lerp(&self, next: &Self, t: f64) -> Self::Output {
        self + (next - self) * t as f32
    }
}

pub trait CompletionRatio {
    /// Unclamped position of `self` inside `start..end`.
    fn completion_ratio(self, start: Self, end: Self) -> Self;
}

impl CompletionRatio for f64 {
    fn completion_ratio(self, start: Self, end: Self) -> Self {
        (self - start) / (end - start)
    }
}

/// Linear re-mapping of `value` from one range onto another, no clamping.
pub fn map_range(value: f64, from: (f64, f64), to: (f64, f64)) -> f64 {
    to.0.lerp(&to.1, value.completion_ratio(from.0, from.1))
}
