//! Identity lookup trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::{BusinessId, UserId};
use serde::{Deserialize, Serialize};

use crate::error::ReconcileError;

/// What an acting user is allowed to do within their business.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    Owner,
    Admin,
    Staff,
}

impl Role {
    /// Returns true if this role may perform mutating order operations.
    pub fn can_mutate_orders(&self) -> bool {
        matches!(self, Role::Owner | Role::Admin)
    }
}

impl std::fmt::Display for Role {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Role::Owner => "owner",
            Role::Admin => "admin",
            Role::Staff => "staff",
        };
        write!(f, "{s}")
    }
}

/// The resolved identity of an acting user.
#[derive(Debug, Clone, Copy)]
pub struct Actor {
    pub business_id: BusinessId,
    pub role: Role,
}

/// Trait for resolving user identities to their business scope.
#[async_trait]
pub trait IdentityLookup: Send + Sync {
    /// Resolves a user ID to the business it belongs to and its role.
    ///
    /// An unknown user is `Forbidden`: nothing can be scoped to it.
    async fn get_actor(&self, user_id: UserId) -> Result<Actor, ReconcileError>;
}

/// In-memory identity directory for tests and the default binary.
#[derive(Debug, Clone, Default)]
pub struct InMemoryIdentity {
    actors: Arc<RwLock<HashMap<UserId, Actor>>>,
}

impl InMemoryIdentity {
    /// Creates a new empty directory.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers a user and returns its generated ID.
    pub fn add_user(&self, business_id: BusinessId, role: Role) -> UserId {
        let user_id = UserId::new();
        self.actors
            .write()
            .unwrap()
            .insert(user_id, Actor { business_id, role });
        user_id
    }

    /// Registers a user under a caller-chosen ID.
    pub fn register(&self, user_id: UserId, actor: Actor) {
        self.actors.write().unwrap().insert(user_id, actor);
    }
}

#[async_trait]
impl IdentityLookup for InMemoryIdentity {
    async fn get_actor(&self, user_id: UserId) -> Result<Actor, ReconcileError> {
        self.actors
            .read()
            .unwrap()
            .get(&user_id)
            .copied()
            .ok_or_else(|| ReconcileError::Forbidden {
                reason: format!("unknown user {user_id}"),
            })
    }
}
