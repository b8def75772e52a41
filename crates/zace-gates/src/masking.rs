//! Masked-gate detection: commands engineered to force a zero exit status
//! (§4.5).

use zace_core::types::CompletionPlan;

const MASKING_PATTERNS: &[&str] = &["|| true", "; true", "|| :", "|| exit 0"];

/// Return the first masked gate's `(label, reason)`, scanning in order.
pub fn detect_masking(plan: &CompletionPlan) -> Option<(String, String)> {
    plan.gates.iter().find_map(|gate| {
        MASKING_PATTERNS
            .iter()
            .find(|pattern| gate.command.contains(*pattern))
            .map(|pattern| (gate.label.clone(), format!("command forces a zero exit via `{pattern}`")))
    })
}
