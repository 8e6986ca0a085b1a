use argon2::{
    Argon2, PasswordHasher,
    password_hash::{PasswordHash, PasswordVerifier, SaltString},
};
use chrono::{Duration, Utc};
use jsonwebtoken::{EncodingKey, Header, encode};
use password_hash::rand_core::{OsRng, RngCore};
use sea_orm::ActiveValue::NotSet;
use sea_orm::{ActiveModelTrait, ColumnTrait, EntityTrait, QueryFilter, Set, TransactionTrait};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::auth::{
        ChangePasswordRequest, Claims, LoginRequest, LoginResponse, MeResponse, RegisterRequest,
        TempPasswordIssued, TempPasswordRequest,
    },
    entity::{
        staff_profiles::{
            ActiveModel as ProfileActive, Entity as StaffProfiles, Model as ProfileModel,
        },
        users::{ActiveModel as UserActive, Column as UserCol, Entity as Users, Model as UserModel},
    },
    error::{AppError, AppResult},
    middleware::auth::AuthUser,
    models::{StaffProfile, User},
    response::{ApiResponse, Meta},
    state::AppState,
};

const MIN_PASSWORD_LEN: usize = 6;
const TEMP_PASSWORD_TTL_HOURS: i64 = 24;

// Word lists for memorable temporary passwords, house specials included.
const ADJECTIVES: [&str; 5] = ["Mie", "Gaok", "Enak", "Pedas", "Gurih"];
const NOUNS: [&str; 5] = ["Ayam", "Bakso", "Sosis", "Special", "Spesial"];

fn hash_password(password: &str) -> AppResult<String> {
    let salt = SaltString::generate(&mut OsRng);
    let hash = Argon2::default()
        .hash_password(password.as_bytes(), &salt)
        .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?
        .to_string();
    Ok(hash)
}

fn verify_hash(password: &str, hash: &str) -> bool {
    let Ok(parsed) = PasswordHash::new(hash) else {
        return false;
    };
    Argon2::default()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok()
}

fn issue_token(user_id: Uuid, role: &str) -> AppResult<String> {
    let secret = std::env::var("JWT_SECRET")
        .map_err(|_| AppError::Internal(anyhow::anyhow!("JWT_SECRET is not set")))?;

    let expiration = Utc::now()
        .checked_add_signed(Duration::hours(24))
        .ok_or_else(|| AppError::Internal(anyhow::anyhow!("Failed to set expiration")))?;

    let claims = Claims {
        sub: user_id.to_string(),
        role: role.to_string(),
        exp: expiration.timestamp() as usize,
    };

    let token = encode(
        &Header::default(),
        &claims,
        &EncodingKey::from_secret(secret.as_bytes()),
    )
    .map_err(|e| AppError::Internal(anyhow::anyhow!(e.to_string())))?;

    Ok(format!("Bearer {}", token))
}

fn normalize_email(email: &str) -> Result<String, AppError> {
    let email = email.trim().to_lowercase();
    if email.is_empty() || !email.contains('@') {
        return Err(AppError::Validation("invalid email address".into()));
    }
    Ok(email)
}

fn validate_password(password: &str) -> Result<(), AppError> {
    if password.chars().count() < MIN_PASSWORD_LEN {
        return Err(AppError::Validation(format!(
            "password must be at least {MIN_PASSWORD_LEN} characters"
        )));
    }
    Ok(())
}

/// Adjective + noun + a number in 100..=999, easy to read out over the
/// counter.
fn generate_easy_password(rng: &mut impl RngCore) -> String {
    let adjective = ADJECTIVES[(rng.next_u32() as usize) % ADJECTIVES.len()];
    let noun = NOUNS[(rng.next_u32() as usize) % NOUNS.len()];
    let number = 100 + rng.next_u32() % 900;
    format!("{adjective}{noun}{number}")
}

/// Create the user row and its staff profile together; either both land or
/// neither does.
pub async fn register_staff(
    state: &AppState,
    payload: RegisterRequest,
) -> AppResult<ApiResponse<MeResponse>> {
    let email = normalize_email(&payload.email)?;
    validate_password(&payload.password)?;
    let full_name = payload.full_name.trim().to_string();
    if full_name.is_empty() {
        return Err(AppError::Validation("full name must not be empty".into()));
    }

    let exists = Users::find()
        .filter(UserCol::Email.eq(email.clone()))
        .one(&state.orm)
        .await?;
    if exists.is_some() {
        return Err(AppError::BadRequest("Email is already taken".into()));
    }

    let password_hash = hash_password(&payload.password)?;
    let user_id = Uuid::new_v4();

    let txn = state.orm.begin().await?;
    let user = UserActive {
        id: Set(user_id),
        email: Set(email),
        password_hash: Set(password_hash),
        role: Set("staff".into()),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;

    let profile = ProfileActive {
        id: Set(user_id),
        full_name: Set(full_name),
        temp_password_hash: Set(None),
        temp_password_expires: Set(None),
        created_at: NotSet,
    }
    .insert(&txn)
    .await?;
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "staff_register",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Account created",
        MeResponse {
            user: user_from_entity(user),
            profile: profile_from_entity(profile),
        },
        None,
    ))
}

pub async fn login(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = normalize_email(&payload.email)?;
    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    if !verify_hash(&payload.password, &user.password_hash) {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(user.id, &user.role)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "user_login",
        Some("users"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Logged in",
        LoginResponse {
            token,
            must_change_password: false,
        },
        Some(Meta::empty()),
    ))
}

pub async fn me(state: &AppState, auth: &AuthUser) -> AppResult<ApiResponse<MeResponse>> {
    let user = Users::find_by_id(auth.user_id).one(&state.orm).await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };
    let profile = StaffProfiles::find_by_id(auth.user_id)
        .one(&state.orm)
        .await?;
    let profile = match profile {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    Ok(ApiResponse::success(
        "OK",
        MeResponse {
            user: user_from_entity(user),
            profile: profile_from_entity(profile),
        },
        None,
    ))
}

/// Store a hashed temporary password on the staff profile with a 24-hour
/// expiry and hand the cleartext back exactly once.
pub async fn issue_temp_password(
    state: &AppState,
    payload: TempPasswordRequest,
) -> AppResult<ApiResponse<TempPasswordIssued>> {
    let email = normalize_email(&payload.email)?;
    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let profile = StaffProfiles::find_by_id(user.id).one(&state.orm).await?;
    let profile = match profile {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let temp_password = generate_easy_password(&mut OsRng);
    let expires_at = Utc::now() + Duration::hours(TEMP_PASSWORD_TTL_HOURS);

    let mut active: ProfileActive = profile.into();
    active.temp_password_hash = Set(Some(hash_password(&temp_password)?));
    active.temp_password_expires = Set(Some(expires_at.into()));
    active.update(&state.orm).await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "temp_password_issued",
        Some("staff_profiles"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Temporary password issued",
        TempPasswordIssued {
            temp_password,
            expires_at,
        },
        None,
    ))
}

/// Accepts the real password or an unexpired temporary one; a temp-password
/// session is flagged so the client can force a password change.
pub async fn verify_temp_password(
    state: &AppState,
    payload: LoginRequest,
) -> AppResult<ApiResponse<LoginResponse>> {
    let email = normalize_email(&payload.email)?;
    let user = Users::find()
        .filter(UserCol::Email.eq(email))
        .one(&state.orm)
        .await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::BadRequest("Invalid email or password".into())),
    };

    if verify_hash(&payload.password, &user.password_hash) {
        let token = issue_token(user.id, &user.role)?;
        return Ok(ApiResponse::success(
            "Logged in",
            LoginResponse {
                token,
                must_change_password: false,
            },
            Some(Meta::empty()),
        ));
    }

    let profile = StaffProfiles::find_by_id(user.id).one(&state.orm).await?;
    let Some(profile) = profile else {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    };

    let valid = matches_temp_password(&profile, &payload.password, Utc::now());
    if !valid {
        return Err(AppError::BadRequest("Invalid email or password".into()));
    }

    let token = issue_token(user.id, &user.role)?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.id),
        "temp_password_login",
        Some("staff_profiles"),
        Some(serde_json::json!({ "user_id": user.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Logged in with temporary password",
        LoginResponse {
            token,
            must_change_password: true,
        },
        Some(Meta::empty()),
    ))
}

fn matches_temp_password(
    profile: &ProfileModel,
    password: &str,
    now: chrono::DateTime<Utc>,
) -> bool {
    let Some(hash) = profile.temp_password_hash.as_deref() else {
        return false;
    };
    let unexpired = profile
        .temp_password_expires
        .map(|expires| expires.with_timezone(&Utc) > now)
        .unwrap_or(false);
    unexpired && verify_hash(password, hash)
}

/// Set the real password and retire any outstanding temporary one.
pub async fn change_password(
    state: &AppState,
    auth: &AuthUser,
    payload: ChangePasswordRequest,
) -> AppResult<ApiResponse<serde_json::Value>> {
    validate_password(&payload.new_password)?;

    let user = Users::find_by_id(auth.user_id).one(&state.orm).await?;
    let user = match user {
        Some(u) => u,
        None => return Err(AppError::NotFound),
    };

    let password_hash = hash_password(&payload.new_password)?;

    let txn = state.orm.begin().await?;
    let mut user_active: UserActive = user.into();
    user_active.password_hash = Set(password_hash);
    user_active.update(&txn).await?;

    if let Some(profile) = StaffProfiles::find_by_id(auth.user_id).one(&txn).await? {
        let mut profile_active: ProfileActive = profile.into();
        profile_active.temp_password_hash = Set(None);
        profile_active.temp_password_expires = Set(None);
        profile_active.update(&txn).await?;
    }
    txn.commit().await?;

    if let Err(err) = log_audit(
        &state.pool,
        Some(auth.user_id),
        "password_changed",
        Some("users"),
        None,
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Password updated",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn user_from_entity(model: UserModel) -> User {
    User {
        id: model.id,
        email: model.email,
        role: model.role,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

pub fn profile_from_entity(model: ProfileModel) -> StaffProfile {
    StaffProfile {
        id: model.id,
        full_name: model.full_name,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn easy_password_is_adjective_noun_and_three_digits() {
        let mut rng = OsRng;
        for _ in 0..20 {
            let password = generate_easy_password(&mut rng);
            let adjective = ADJECTIVES
                .iter()
                .find(|a| password.starts_with(**a))
                .expect("known adjective prefix");
            let rest = &password[adjective.len()..];
            let noun = NOUNS
                .iter()
                .filter(|n| rest.starts_with(**n))
                .max_by_key(|n| n.len())
                .expect("known noun");
            let digits = &rest[noun.len()..];
            assert_eq!(digits.len(), 3, "password: {password}");
            let number: u32 = digits.parse().expect("numeric suffix");
            assert!((100..=999).contains(&number));
        }
    }

    #[test]
    fn email_is_trimmed_and_lowercased() {
        assert_eq!(
            normalize_email("  Kasir@MieGaok.id ").unwrap(),
            "kasir@miegaok.id"
        );
        assert!(normalize_email("not-an-email").is_err());
        assert!(normalize_email("   ").is_err());
    }

    #[test]
    fn short_passwords_are_rejected() {
        assert!(validate_password("12345").is_err());
        assert!(validate_password("123456").is_ok());
    }

    #[test]
    fn hash_and_verify_round_trip() {
        let hash = hash_password("GaokAyam123").unwrap();
        assert!(verify_hash("GaokAyam123", &hash));
        assert!(!verify_hash("GaokAyam124", &hash));
    }
}
