use std::collections::HashMap;

use crate::domain::entities::{UserId, UserStatus, Workspace};

/// Members of `team` eligible for automatic assignment: available and still in the workspace.
pub fn available_candidates(workspace: &Workspace, team: &str) -> Vec<UserId> {
    workspace
        .team_members(team)
        .iter()
        .filter(|m| m.status == UserStatus::Available && workspace.is_member(&m.user_id))
        .map(|m| m.user_id.clone())
        .collect()
}

/// Picks the least-loaded candidate. Equal loads fall back to the lowest user id so the choice
/// is deterministic.
pub fn pick_least_loaded(candidates: &[UserId], loads: &HashMap<UserId, i64>) -> Option<UserId> {
    candidates
        .iter()
        .min_by(|a, b| {
            let load_a = loads.get(*a).copied().unwrap_or(0);
            let load_b = loads.get(*b).copied().unwrap_or(0);
            load_a.cmp(&load_b).then_with(|| a.cmp(b))
        })
        .cloned()
}
