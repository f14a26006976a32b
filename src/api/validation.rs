use super::ApiError;

pub fn validate_user_id(id: i32) -> Result<i32, ApiError> {
    if id <= 0 {
        return Err(ApiError::validation(format!(
            "Invalid user ID: {}. ID must be a positive integer",
            id
        )));
    }
    Ok(id)
}

pub fn validate_username(username: &str) -> Result<&str, ApiError> {
    if username.is_empty() {
        return Err(ApiError::field("username", "This field may not be blank."));
    }

    if username.len() > 150 {
        return Err(ApiError::field(
            "username",
            "Ensure this field has no more than 150 characters.",
        ));
    }

    if !username
        .chars()
        .all(|c| c.is_alphanumeric() || matches!(c, '@' | '.' | '+' | '-' | '_'))
    {
        return Err(ApiError::field(
            "username",
            "Username may contain only letters, numbers, and @/./+/-/_ characters.",
        ));
    }

    Ok(username)
}

pub fn validate_password(password: &str) -> Result<&str, ApiError> {
    if password.is_empty() {
        return Err(ApiError::field("password", "This field may not be blank."));
    }
    Ok(password)
}
