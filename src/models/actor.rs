use crate::errors::AppError;

use super::user::{Role, User};

/// The caller of a scheduling operation, resolved once at request entry.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Actor {
    Customer(String),
    Provider(String),
}

impl Actor {
    pub fn id(&self) -> &str {
        match self {
            Actor::Customer(id) | Actor::Provider(id) => id,
        }
    }

    pub fn is_provider(&self) -> bool {
        matches!(self, Actor::Provider(_))
    }

    pub fn is_customer(&self) -> bool {
        matches!(self, Actor::Customer(_))
    }

    /// The provider id, or `Permission` for customers.
    pub fn provider_id(&self) -> Result<&str, AppError> {
        match self {
            Actor::Provider(id) => Ok(id),
            Actor::Customer(_) => Err(AppError::Permission("only providers may do this".into())),
        }
    }

    /// The customer id, or `Permission` for providers.
    pub fn customer_id(&self) -> Result<&str, AppError> {
        match self {
            Actor::Customer(id) => Ok(id),
            Actor::Provider(_) => Err(AppError::Permission("only customers may do this".into())),
        }
    }
}

impl From<&User> for Actor {
    fn from(user: &User) -> Self {
        match user.role {
            Role::Customer => Actor::Customer(user.id.clone()),
            Role::Provider => Actor::Provider(user.id.clone()),
        }
    }
}
