//! Actor model and the ownership predicates consumed by every catalog write.

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::error::ErrorKind;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    Guest,
    Customer,
    Seller,
    Admin,
}

impl std::str::FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "guest" => Ok(Role::Guest),
            "customer" => Ok(Role::Customer),
            "seller" => Ok(Role::Seller),
            "admin" => Ok(Role::Admin),
            other => Err(format!("unknown role '{other}'")),
        }
    }
}

/// The caller as seen by the catalog core.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Actor {
    pub role: Role,
    /// Seller identity carried by an authenticated seller credential.
    pub seller_id: Option<i64>,
    /// Out-of-band seller hint supplied by unauthenticated storefront reads.
    pub seller_hint: Option<i64>,
}

impl Actor {
    #[must_use]
    pub fn guest(seller_hint: Option<i64>) -> Self {
        Self {
            role: Role::Guest,
            seller_id: None,
            seller_hint,
        }
    }

    #[must_use]
    pub fn customer() -> Self {
        Self {
            role: Role::Customer,
            seller_id: None,
            seller_hint: None,
        }
    }

    #[must_use]
    pub fn seller(seller_id: i64) -> Self {
        Self {
            role: Role::Seller,
            seller_id: Some(seller_id),
            seller_hint: None,
        }
    }

    #[must_use]
    pub fn admin() -> Self {
        Self {
            role: Role::Admin,
            seller_id: None,
            seller_hint: None,
        }
    }

    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.role != Role::Guest
    }

    #[must_use]
    pub fn is_admin(&self) -> bool {
        self.role == Role::Admin
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum AccessDenied {
    #[error("authentication required")]
    Unauthorized,
    #[error("not permitted to access this product")]
    Forbidden,
}

impl AccessDenied {
    #[must_use]
    pub fn kind(self) -> ErrorKind {
        match self {
            AccessDenied::Unauthorized => ErrorKind::Unauthorized,
            AccessDenied::Forbidden => ErrorKind::Forbidden,
        }
    }
}

/// Whether `actor` may read a product owned by `owner_seller_id`.
#[must_use]
pub fn can_read(actor: &Actor, owner_seller_id: i64) -> bool {
    match actor.role {
        Role::Admin | Role::Customer | Role::Seller => true,
        Role::Guest => actor.seller_hint == Some(owner_seller_id),
    }
}

/// Whether `actor` may change a product owned by `owner_seller_id`.
#[must_use]
pub fn can_mutate(actor: &Actor, owner_seller_id: i64) -> bool {
    match actor.role {
        Role::Admin => true,
        Role::Seller => actor.seller_id == Some(owner_seller_id),
        Role::Customer | Role::Guest => false,
    }
}

/// [`can_read`] with the denial classified.
///
/// A guest without a seller hint has presented nothing and gets
/// `Unauthorized`; a guest whose hint names another seller gets `Forbidden`.
///
/// # Errors
///
/// Returns [`AccessDenied`] when the read is not permitted.
pub fn authorize_read(actor: &Actor, owner_seller_id: i64) -> Result<(), AccessDenied> {
    if can_read(actor, owner_seller_id) {
        return Ok(());
    }
    if actor.role == Role::Guest && actor.seller_hint.is_none() {
        return Err(AccessDenied::Unauthorized);
    }
    Err(AccessDenied::Forbidden)
}

/// [`can_mutate`] with the denial classified.
///
/// # Errors
///
/// Returns [`AccessDenied::Unauthorized`] for guests and
/// [`AccessDenied::Forbidden`] for any other non-owner.
pub fn authorize_mutate(actor: &Actor, owner_seller_id: i64) -> Result<(), AccessDenied> {
    if can_mutate(actor, owner_seller_id) {
        return Ok(());
    }
    if actor.is_authenticated() {
        Err(AccessDenied::Forbidden)
    } else {
        Err(AccessDenied::Unauthorized)
    }
}

/// Gate for catalog-wide administration (categories, attribute definitions).
///
/// # Errors
///
/// Returns [`AccessDenied`] unless `actor` is an admin.
pub fn authorize_admin(actor: &Actor) -> Result<(), AccessDenied> {
    match actor.role {
        Role::Admin => Ok(()),
        Role::Guest => Err(AccessDenied::Unauthorized),
        Role::Customer | Role::Seller => Err(AccessDenied::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const OWNER: i64 = 7;

    #[test]
    fn admin_reads_and_mutates_everything() {
        let admin = Actor::admin();
        assert!(can_read(&admin, OWNER));
        assert!(can_mutate(&admin, OWNER));
        assert_eq!(authorize_admin(&admin), Ok(()));
    }

    #[test]
    fn seller_mutates_only_own_products() {
        assert!(can_mutate(&Actor::seller(OWNER), OWNER));
        assert!(!can_mutate(&Actor::seller(OWNER + 1), OWNER));
        assert_eq!(
            authorize_mutate(&Actor::seller(OWNER + 1), OWNER),
            Err(AccessDenied::Forbidden)
        );
        assert!(can_read(&Actor::seller(OWNER + 1), OWNER));
    }

    #[test]
    fn customer_reads_but_never_mutates() {
        let customer = Actor::customer();
        assert!(can_read(&customer, OWNER));
        assert_eq!(
            authorize_mutate(&customer, OWNER),
            Err(AccessDenied::Forbidden)
        );
    }

    #[test]
    fn guest_read_requires_matching_hint() {
        assert_eq!(
            authorize_read(&Actor::guest(None), OWNER),
            Err(AccessDenied::Unauthorized)
        );
        assert_eq!(
            authorize_read(&Actor::guest(Some(OWNER + 1)), OWNER),
            Err(AccessDenied::Forbidden)
        );
        assert_eq!(authorize_read(&Actor::guest(Some(OWNER)), OWNER), Ok(()));
    }

    #[test]
    fn guest_mutation_is_unauthorized_even_with_hint() {
        assert_eq!(
            authorize_mutate(&Actor::guest(Some(OWNER)), OWNER),
            Err(AccessDenied::Unauthorized)
        );
    }

    #[test]
    fn role_parses_from_claim_text() {
        assert_eq!("seller".parse::<Role>(), Ok(Role::Seller));
        assert!("root".parse::<Role>().is_err());
    }
}
