use super::ApiError;
use super::shapes::UserAction;
use crate::db::User;

/// Model-level permissions on the user resource.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Permission {
    View,
    Add,
    Change,
    Delete,
}

impl Permission {
    /// Operation → required permission table.
    #[must_use]
    pub const fn required_for(action: UserAction) -> Self {
        match action {
            UserAction::List | UserAction::Retrieve => Self::View,
            UserAction::Create => Self::Add,
            UserAction::Update | UserAction::PartialUpdate => Self::Change,
            UserAction::Destroy => Self::Delete,
        }
    }

    #[must_use]
    pub const fn codename(self) -> &'static str {
        match self {
            Self::View => "view_user",
            Self::Add => "add_user",
            Self::Change => "change_user",
            Self::Delete => "delete_user",
        }
    }
}

/// Superusers hold every model permission; other accounts hold none until
/// granted out of band.
#[must_use]
pub fn has_permission(user: &User, _permission: Permission) -> bool {
    user.is_superuser
}

/// Check the acting user against the permission the operation requires.
pub fn check(user: &User, action: UserAction) -> Result<(), ApiError> {
    let required = Permission::required_for(action);
    if has_permission(user, required) {
        return Ok(());
    }

    Err(ApiError::Forbidden(format!(
        "You do not have permission to perform this action ({}).",
        required.codename()
    )))
}
