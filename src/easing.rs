/// Clamps `x` into `[0, 1]`.
pub fn clip(x: f64) -> f64 {
    x.clamp(0., 1.)
}

pub fn ease_in_quint(t: f64) -> f64 {
    t.powi(5)
}

pub fn ease_out_quint(t: f64) -> f64 {
    1. - (1. - t).powi(5)
}

/// Named curves over the unit interval. Every variant maps 0 to 0 and 1 to 1
/// and never decreases in between.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub enum Easing {
    #[default]
    Linear,
    InQuint,
    OutQuint,
}

impl Easing {
    pub fn eval(&self, t: f64) -> f64 {
        match self {
            Easing::Linear => t,
            Easing::InQuint => ease_in_quint(t),
            Easing::OutQuint => ease_out_quint(t),
        }
    }

    /// Same as [`Easing::eval`] but with the input clipped first.
    pub fn eval_clipped(&self, t: f64) -> f64 {
        self.eval(clip(t))
    }
}
