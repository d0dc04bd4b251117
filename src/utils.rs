pub mod math;

pub use math::{map_range, CompletionRatio, Lerp};
