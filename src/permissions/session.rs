//! In-memory per-session grants created by "remember for session" choices.

use std::collections::HashMap;

use chrono::{DateTime, Utc};

use super::policy::ToolScope;

/// A single session grant.
#[derive(Debug, Clone)]
pub struct Grant {
    pub tool: String,
    pub scope: ToolScope,
    pub granted_at: DateTime<Utc>,
}

/// Grants live only as long as the session; nothing is persisted.
#[derive(Debug, Default)]
pub struct SessionGrants {
    grants: HashMap<(String, ToolScope), Grant>,
}

impl SessionGrants {
    pub fn has_grant(&self, tool: &str, scope: ToolScope) -> bool {
        self.grants.contains_key(&(tool.to_string(), scope))
    }

    pub fn add_grant(&mut self, grant: Grant) {
        self.grants
            .insert((grant.tool.clone(), grant.scope), grant);
    }

    pub fn len(&self) -> usize {
        self.grants.len()
    }
}
