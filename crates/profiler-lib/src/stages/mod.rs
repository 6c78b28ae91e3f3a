//! Pipeline stages
//!
//! Each stage consumes the previous stage's artifact and produces the next:
//! Loader -> Preprocessor -> Trainer -> Predictor.

mod loader;
mod predictor;
mod preprocess;
mod trainer;

pub use loader::{read_table, Loader};
pub use predictor::{PredictionReport, Predictor};
pub use preprocess::{Preprocessor, MIN_ROWS};
pub use trainer::{TrainOutcome, Trainer, MONOTONICITY_TOLERANCE};

use std::fmt;

/// Stage identifiers, in execution order
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Load,
    Preprocess,
    Train,
    Predict,
}

impl Stage {
    pub const ALL: [Stage; 4] = [Stage::Load, Stage::Preprocess, Stage::Train, Stage::Predict];

    pub fn as_str(&self) -> &'static str {
        match self {
            Stage::Load => "load",
            Stage::Preprocess => "preprocess",
            Stage::Train => "train",
            Stage::Predict => "predict",
        }
    }
}

impl fmt::Display for Stage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
