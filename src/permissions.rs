//! Who may do what with each resource.
//!
//! Every endpoint names its resource and [`Action`]; the resource's table maps
//! the action onto a [`Policy`]. `has_permission` runs before the target
//! record is loaded, `has_object_permission` once it is known.

use model::entities::user;
use uuid::Uuid;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Action {
    List,
    Retrieve,
    Create,
    Update,
    PartialUpdate,
    Destroy,
    Me,
}

impl Action {
    /// Actions that never mutate anything.
    pub fn is_safe(self) -> bool {
        matches!(self, Action::List | Action::Retrieve | Action::Me)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Resource {
    User,
    Kitten,
    Breed,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Policy {
    AllowAny,
    Authenticated,
    /// Reads are open; writes need the owner or an admin.
    OwnerOrAdmin,
    AdminOnly,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Identity {
    Anonymous,
    Authenticated { user_id: Uuid, is_staff: bool },
}

impl Identity {
    pub fn of(user: Option<&user::Model>) -> Self {
        match user {
            Some(user) => Identity::Authenticated {
                user_id: user.id,
                is_staff: user.is_staff,
            },
            None => Identity::Anonymous,
        }
    }

    fn is_authenticated(&self) -> bool {
        matches!(self, Identity::Authenticated { .. })
    }

    fn is_staff(&self) -> bool {
        matches!(self, Identity::Authenticated { is_staff: true, .. })
    }

    fn is(&self, owner_id: Uuid) -> bool {
        matches!(self, Identity::Authenticated { user_id, .. } if *user_id == owner_id)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Denied {
    /// No usable credentials; answered with 401.
    Unauthenticated,
    /// Valid credentials without the right; answered with 403.
    Forbidden,
}

fn user_policy(action: Action) -> Policy {
    match action {
        Action::List | Action::Retrieve | Action::Create => Policy::AllowAny,
        Action::Update | Action::PartialUpdate | Action::Destroy => Policy::OwnerOrAdmin,
        Action::Me => Policy::Authenticated,
    }
}

fn kitten_policy(action: Action) -> Policy {
    match action {
        Action::List | Action::Retrieve => Policy::AllowAny,
        Action::Create | Action::Me => Policy::Authenticated,
        Action::Update | Action::PartialUpdate | Action::Destroy => Policy::OwnerOrAdmin,
    }
}

fn breed_policy(action: Action) -> Policy {
    match action {
        Action::List | Action::Retrieve => Policy::AllowAny,
        Action::Create | Action::Update | Action::PartialUpdate | Action::Destroy | Action::Me => {
            Policy::AdminOnly
        }
    }
}

pub fn policy_for(resource: Resource, action: Action) -> Policy {
    match resource {
        Resource::User => user_policy(action),
        Resource::Kitten => kitten_policy(action),
        Resource::Breed => breed_policy(action),
    }
}

/// Request-level check, before any record is looked up.
pub fn has_permission(resource: Resource, action: Action, identity: &Identity) -> Result<(), Denied> {
    match policy_for(resource, action) {
        Policy::AllowAny => Ok(()),
        Policy::OwnerOrAdmin if action.is_safe() => Ok(()),
        Policy::Authenticated | Policy::OwnerOrAdmin if !identity.is_authenticated() => {
            Err(Denied::Unauthenticated)
        }
        Policy::Authenticated | Policy::OwnerOrAdmin => Ok(()),
        Policy::AdminOnly if !identity.is_authenticated() => Err(Denied::Unauthenticated),
        Policy::AdminOnly if identity.is_staff() => Ok(()),
        Policy::AdminOnly => Err(Denied::Forbidden),
    }
}

/// Record-level check against the record's owner. For users the owner is the
/// user record itself.
pub fn has_object_permission(
    resource: Resource,
    action: Action,
    identity: &Identity,
    owner_id: Uuid,
) -> Result<(), Denied> {
    match policy_for(resource, action) {
        Policy::AllowAny | Policy::Authenticated => Ok(()),
        Policy::OwnerOrAdmin if action.is_safe() => Ok(()),
        Policy::OwnerOrAdmin | Policy::AdminOnly if !identity.is_authenticated() => {
            Err(Denied::Unauthenticated)
        }
        Policy::OwnerOrAdmin if identity.is(owner_id) || identity.is_staff() => Ok(()),
        Policy::AdminOnly if identity.is_staff() => Ok(()),
        Policy::OwnerOrAdmin | Policy::AdminOnly => Err(Denied::Forbidden),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const WRITES: [Action; 3] = [Action::Update, Action::PartialUpdate, Action::Destroy];

    fn member(user_id: Uuid) -> Identity {
        Identity::Authenticated {
            user_id,
            is_staff: false,
        }
    }

    fn admin() -> Identity {
        Identity::Authenticated {
            user_id: Uuid::new_v4(),
            is_staff: true,
        }
    }

    #[test]
    fn test_reads_are_open_to_anyone() {
        for resource in [Resource::User, Resource::Kitten, Resource::Breed] {
            for action in [Action::List, Action::Retrieve] {
                assert_eq!(has_permission(resource, action, &Identity::Anonymous), Ok(()));
                assert_eq!(
                    has_object_permission(resource, action, &Identity::Anonymous, Uuid::new_v4()),
                    Ok(())
                );
            }
        }
    }

    #[test]
    fn test_anonymous_writes_are_unauthenticated() {
        for action in WRITES {
            assert_eq!(
                has_permission(Resource::Kitten, action, &Identity::Anonymous),
                Err(Denied::Unauthenticated)
            );
            assert_eq!(
                has_permission(Resource::User, action, &Identity::Anonymous),
                Err(Denied::Unauthenticated)
            );
        }
        assert_eq!(
            has_permission(Resource::Kitten, Action::Create, &Identity::Anonymous),
            Err(Denied::Unauthenticated)
        );
    }

    #[test]
    fn test_registration_is_open() {
        assert_eq!(has_permission(Resource::User, Action::Create, &Identity::Anonymous), Ok(()));
    }

    #[test]
    fn test_owner_may_write_stranger_may_not() {
        let owner_id = Uuid::new_v4();
        let owner = member(owner_id);
        let stranger = member(Uuid::new_v4());

        for action in WRITES {
            assert_eq!(has_permission(Resource::Kitten, action, &stranger), Ok(()));
            assert_eq!(
                has_object_permission(Resource::Kitten, action, &owner, owner_id),
                Ok(())
            );
            assert_eq!(
                has_object_permission(Resource::Kitten, action, &stranger, owner_id),
                Err(Denied::Forbidden)
            );
        }
    }

    #[test]
    fn test_admin_may_write_anything() {
        for action in WRITES {
            for resource in [Resource::User, Resource::Kitten] {
                assert_eq!(
                    has_object_permission(resource, action, &admin(), Uuid::new_v4()),
                    Ok(())
                );
            }
        }
    }

    #[test]
    fn test_breed_creation_is_admin_only() {
        assert_eq!(
            has_permission(Resource::Breed, Action::Create, &Identity::Anonymous),
            Err(Denied::Unauthenticated)
        );
        assert_eq!(
            has_permission(Resource::Breed, Action::Create, &member(Uuid::new_v4())),
            Err(Denied::Forbidden)
        );
        assert_eq!(has_permission(Resource::Breed, Action::Create, &admin()), Ok(()));
    }

    #[test]
    fn test_me_requires_authentication() {
        for resource in [Resource::User, Resource::Kitten] {
            assert_eq!(
                has_permission(resource, Action::Me, &Identity::Anonymous),
                Err(Denied::Unauthenticated)
            );
            assert_eq!(has_permission(resource, Action::Me, &member(Uuid::new_v4())), Ok(()));
        }
    }
}
