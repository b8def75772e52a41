//! Destructive-command approval: classifier, rule store, pending-action
//! ledger, and reply-intent classification (§4.3).

mod destructive;
mod ledger;
mod reply;
mod rules;

pub use destructive::{
    extract_overwrite_targets, get_destructive_command_reason, ApprovalConfig, Exists, OverwriteTarget,
    SafetyClassification, SafetyClassifier, SafetyContext,
};
pub use ledger::ApprovalLedger;
pub use reply::{apply_reply_decision, classify_reply, ReplyClassifier, ReplyIntent};
pub use rules::{find_approval_rule_decision, load_approval_rules, save_approval_rules};
