use serde::Serialize;

use crate::db::User;

/// Operations exposed by the user resource controller.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    List,
    Create,
    Retrieve,
    Update,
    PartialUpdate,
    Destroy,
}

/// Field-visibility projections of the user resource.
///
/// The shape, not the operation, determines field visibility: write
/// operations never echo a password field and read operations never
/// require one.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserShape {
    /// Carries the identifier; never the password.
    Read,
    /// Echoes the writable fields; never the password.
    Write,
}

impl UserShape {
    /// Shape applied to any operation without an explicit entry in the
    /// table below.
    pub const DEFAULT: Self = Self::Read;

    /// Operation → shape table.
    #[must_use]
    pub const fn for_action(action: UserAction) -> Self {
        match action {
            UserAction::Create
            | UserAction::Update
            | UserAction::PartialUpdate
            | UserAction::Destroy => Self::Write,
            _ => Self::DEFAULT,
        }
    }

    #[must_use]
    pub fn project(self, user: &User) -> UserDto {
        match self {
            Self::Read => UserDto::Read(ReadUser {
                id: user.id,
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                is_active: user.is_active,
            }),
            Self::Write => UserDto::Write(WriteUser {
                username: user.username.clone(),
                first_name: user.first_name.clone(),
                last_name: user.last_name.clone(),
                is_active: user.is_active,
            }),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum UserDto {
    Read(ReadUser),
    Write(WriteUser),
}

#[derive(Debug, Serialize)]
pub struct ReadUser {
    pub id: i32,
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}

#[derive(Debug, Serialize)]
pub struct WriteUser {
    pub username: String,
    pub first_name: String,
    pub last_name: String,
    pub is_active: bool,
}
