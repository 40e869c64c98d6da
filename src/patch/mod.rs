pub mod errors;
pub mod patcher;
pub mod rule;

pub use errors::PatchError;
pub use patcher::{
    apply_rule, find_key_lines, parse_env_value, patch_text, plan_rule, KeyLine, PatchOutcome,
    PatchPlan,
};
pub use rule::{Anchor, Condition, Marker, PatchRule, Transform};
