pub mod selector;
pub mod threshold;

pub use selector::AnomalySelector;
pub use threshold::ThresholdEvaluator;
