//! Rule-based adapters for the adaptive task loop

mod evaluator;
mod suggester;

pub use evaluator::RuleBasedEvaluator;
pub use suggester::CandidateSuggester;
