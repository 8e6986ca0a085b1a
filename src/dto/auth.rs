use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

use crate::models::{StaffProfile, User};

#[derive(Deserialize, Debug, ToSchema)]
pub struct RegisterRequest {
    pub email: String,
    pub password: String,
    pub full_name: String,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct LoginRequest {
    pub email: String,
    pub password: String,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    pub token: String,
    /// Set when the session was opened with a temporary password.
    pub must_change_password: bool,
}

#[derive(Debug, Serialize, ToSchema)]
pub struct MeResponse {
    pub user: User,
    pub profile: StaffProfile,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct TempPasswordRequest {
    pub email: String,
}

/// The cleartext is returned exactly once, at issue time.
#[derive(Debug, Serialize, ToSchema)]
pub struct TempPasswordIssued {
    pub temp_password: String,
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize, Debug, ToSchema)]
pub struct ChangePasswordRequest {
    pub new_password: String,
}

#[derive(Debug, Deserialize, Serialize, ToSchema)]
pub struct Claims {
    pub sub: String,
    pub role: String,
    pub exp: usize,
}
