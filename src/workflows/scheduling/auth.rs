use std::collections::HashMap;

use super::domain::{ActorContext, Role, WorkflowAction};

/// Identity/role failures raised before any workflow side effect.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum AuthError {
    #[error("no authenticated actor in the request context")]
    Unauthenticated,
    #[error("actor '{0}' has no assigned role")]
    RoleNotFound(String),
    #[error("role '{role}' may not {action}")]
    Forbidden {
        role: &'static str,
        action: &'static str,
    },
}

/// Role lookup collaborator; backed by the identity provider in production
/// and by fixed maps in tests.
pub trait IdentityDirectory: Send + Sync {
    fn role_of(&self, actor_id: &str) -> Option<Role>;
}

/// Pure lookup-and-check gate in front of every mutating entry point.
pub struct AuthorizationGate {
    directory: std::sync::Arc<dyn IdentityDirectory>,
}

impl AuthorizationGate {
    pub fn new(directory: std::sync::Arc<dyn IdentityDirectory>) -> Self {
        Self { directory }
    }

    pub fn authorize(
        &self,
        actor: &ActorContext,
        action: WorkflowAction,
    ) -> Result<Role, AuthError> {
        let actor_id = actor.actor_id.as_deref().ok_or(AuthError::Unauthenticated)?;
        let role = self
            .directory
            .role_of(actor_id)
            .ok_or_else(|| AuthError::RoleNotFound(actor_id.to_string()))?;

        if !action.allows(role) {
            return Err(AuthError::Forbidden {
                role: role.label(),
                action: action.label(),
            });
        }

        Ok(role)
    }
}

/// Directory backed by a fixed actor-to-role map, loadable from a
/// `name:role,name:role` spec string.
#[derive(Debug, Clone, Default)]
pub struct StaticDirectory {
    roles: HashMap<String, Role>,
}

impl StaticDirectory {
    pub fn new() -> Self {
        Self::default()
    }

    /// Parse e.g. `ana:reviewer,agency-014:agency`; malformed entries are
    /// skipped rather than failing startup.
    pub fn from_spec(spec: &str) -> Self {
        let mut roles = HashMap::new();
        for entry in spec.split(',') {
            let entry = entry.trim();
            if entry.is_empty() {
                continue;
            }
            let Some((actor, role)) = entry.split_once(':') else {
                continue;
            };
            if let Some(role) = Role::parse(role) {
                roles.insert(actor.trim().to_string(), role);
            }
        }
        Self { roles }
    }

    pub fn assign(&mut self, actor_id: impl Into<String>, role: Role) {
        self.roles.insert(actor_id.into(), role);
    }
}

impl IdentityDirectory for StaticDirectory {
    fn role_of(&self, actor_id: &str) -> Option<Role> {
        self.roles.get(actor_id).copied()
    }
}
