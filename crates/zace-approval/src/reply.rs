//! Reply-intent classification for pending approval prompts (§4.3).

use async_trait::async_trait;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use zace_core::types::{ApprovalDecision, ApprovalRule, ApprovalScope, PendingApprovalAction};
use zace_core::RunError;

use crate::ledger::ApprovalLedger;
use crate::rules::{load_approval_rules, save_approval_rules};
use std::path::Path;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReplyIntent {
    AllowOnce,
    AllowAlwaysSession,
    AllowAlwaysWorkspace,
    Deny,
    Unclear,
}

/// LLM-backed approval-intent classifier. Returning `Err` models
/// unparseable output, which maps to [`ReplyIntent::Unclear`].
#[async_trait]
pub trait ReplyClassifier: Send + Sync {
    async fn classify(&self, reply_text: &str) -> Result<ReplyIntent, String>;
}

/// If `reply_text` contains the legacy risky token, short-circuit to
/// `allow_once`; otherwise defer to the LLM classifier.
pub async fn classify_reply(reply_text: &str, risky_confirmation_token: &str, classifier: &dyn ReplyClassifier) -> ReplyIntent {
    if !risky_confirmation_token.is_empty() && reply_text.contains(risky_confirmation_token) {
        return ReplyIntent::AllowOnce;
    }
    classifier.classify(reply_text).await.unwrap_or(ReplyIntent::Unclear)
}

/// Apply a classified reply to an open pending action: for `allow_always_*`
/// intents, persist a new approval rule; in all resolving cases, mark the
/// pending action resolved in the ledger.
pub fn apply_reply_decision(
    ledger: &ApprovalLedger,
    rules_path: &Path,
    open: &PendingApprovalAction,
    intent: ReplyIntent,
    workspace_root: &str,
) -> Result<Option<ApprovalDecision>, RunError> {
    let decision = match intent {
        ReplyIntent::AllowOnce => Some(ApprovalDecision::Allow),
        ReplyIntent::Deny => Some(ApprovalDecision::Deny),
        ReplyIntent::AllowAlwaysSession => {
            persist_rule(rules_path, open, ApprovalScope::Session, workspace_root)?;
            Some(ApprovalDecision::Allow)
        }
        ReplyIntent::AllowAlwaysWorkspace => {
            persist_rule(rules_path, open, ApprovalScope::Workspace, workspace_root)?;
            Some(ApprovalDecision::Allow)
        }
        ReplyIntent::Unclear => None,
    };

    if decision.is_some() {
        ledger.resolve_pending_approval_action(open, open.context.clone())?;
    }

    Ok(decision)
}

fn persist_rule(rules_path: &Path, open: &PendingApprovalAction, scope: ApprovalScope, workspace_root: &str) -> Result<(), RunError> {
    let mut rules = load_approval_rules(rules_path)?;
    rules.push(ApprovalRule {
        pattern: open.context.command_signature.clone(),
        decision: ApprovalDecision::Allow,
        scope,
        session_id: if scope == ApprovalScope::Session {
            Some(open.session_id.clone())
        } else {
            None
        },
        workspace_root: workspace_root.to_string(),
        created_at: Utc::now(),
    });
    save_approval_rules(rules_path, &rules)
}
