/// Alert rule definitions and the per-event evaluator
pub mod rule;
pub mod evaluator;

pub use evaluator::RuleEvaluator;
pub use rule::{AlertRule, RuleName, RuleSpec};
