//! Append-only pending-approval ledger (§4.3).

use std::fs::{self, OpenOptions};
use std::io::Write;
use std::path::{Path, PathBuf};

use chrono::{Duration, Utc};
use ulid::Ulid;
use zace_core::types::{ApprovalStatus, PendingApprovalAction, PendingApprovalContext};
use zace_core::RunError;

/// Append-only log of [`PendingApprovalAction`] entries for one run.
pub struct ApprovalLedger {
    session_id: String,
    path: PathBuf,
}

impl ApprovalLedger {
    pub fn new(project_root: &Path, session_id: impl Into<String>) -> Self {
        let session_id = session_id.into();
        let path = project_root
            .join(".zace")
            .join("approvals")
            .join(format!("{session_id}.jsonl"));
        Self { session_id, path }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn append(&self, action: &PendingApprovalAction) -> Result<(), RunError> {
        if let Some(parent) = self.path.parent() {
            fs::create_dir_all(parent).map_err(|source| RunError::JournalIo {
                session_id: self.session_id.clone(),
                source,
            })?;
        }
        let mut file = OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|source| RunError::JournalIo {
                session_id: self.session_id.clone(),
                source,
            })?;
        let line = serde_json::to_string(action).map_err(|e| RunError::JournalIo {
            session_id: self.session_id.clone(),
            source: std::io::Error::other(e),
        })?;
        writeln!(file, "{line}").map_err(|source| RunError::JournalIo {
            session_id: self.session_id.clone(),
            source,
        })?;
        file.flush().map_err(|source| RunError::JournalIo {
            session_id: self.session_id.clone(),
            source,
        })
    }

    pub fn read_all(&self) -> Result<Vec<PendingApprovalAction>, RunError> {
        if !self.path.exists() {
            return Ok(Vec::new());
        }
        let content = fs::read_to_string(&self.path).map_err(|source| RunError::JournalIo {
            session_id: self.session_id.clone(),
            source,
        })?;
        Ok(content
            .lines()
            .filter(|l| !l.trim().is_empty())
            .filter_map(|l| serde_json::from_str(l).ok())
            .collect())
    }

    /// Append a new open entry with a fresh `pendingId`, returning it.
    pub fn create_pending_approval_action(
        &self,
        run_id: impl Into<String>,
        kind: impl Into<String>,
        prompt: impl Into<String>,
        command: impl Into<String>,
        command_signature: impl Into<String>,
        reason: impl Into<String>,
        working_directory: Option<String>,
    ) -> Result<PendingApprovalAction, RunError> {
        let pending_id = Ulid::new().to_string();
        let action = PendingApprovalAction {
            session_id: self.session_id.clone(),
            run_id: run_id.into(),
            kind: kind.into(),
            status: ApprovalStatus::Open,
            prompt: prompt.into(),
            context: PendingApprovalContext {
                command: command.into(),
                command_signature: command_signature.into(),
                reason: reason.into(),
                working_directory,
                pending_id,
            },
            timestamp: Utc::now(),
        };
        self.append(&action)?;
        Ok(action)
    }

    /// Append a resolved entry matching `pending_id`, closing it.
    pub fn resolve_pending_approval_action(
        &self,
        open: &PendingApprovalAction,
        updated_context: PendingApprovalContext,
    ) -> Result<PendingApprovalAction, RunError> {
        let resolved = PendingApprovalAction {
            status: ApprovalStatus::Resolved,
            context: updated_context,
            timestamp: Utc::now(),
            ..open.clone()
        };
        self.append(&resolved)?;
        Ok(resolved)
    }

    /// Scan entries newest-first, ignoring entries older than `max_age`.
    /// An action is open iff no later resolved entry with the same
    /// `pendingId` exists.
    pub fn find_latest_open_pending_action(&self, max_age: Duration) -> Result<Option<PendingApprovalAction>, RunError> {
        let entries = self.read_all()?;
        let now = Utc::now();
        for (i, entry) in entries.iter().enumerate().rev() {
            if entry.status != ApprovalStatus::Open {
                continue;
            }
            if now - entry.timestamp > max_age {
                continue;
            }
            let resolved_later = entries[i + 1..]
                .iter()
                .any(|later| later.status == ApprovalStatus::Resolved && later.context.pending_id == entry.context.pending_id);
            if !resolved_later {
                return Ok(Some(entry.clone()));
            }
        }
        Ok(None)
    }
}
