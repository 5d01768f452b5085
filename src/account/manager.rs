/// Account lifecycle management
///
/// Owns registration, channel verification, sign-in, password reset, and
/// role administration. All credential and OTP state stays inside this
/// module; callers only ever see `Account` records and issued codes to
/// dispatch out-of-band.
use super::{Channel, IssuedOtps, Role, SignUpRequest, UpdateAccountRequest, VerifyOutcome};
use crate::auth;
use crate::config::ServerConfig;
use crate::credential::{hash_password, validate_password_policy, verify_password};
use crate::db::models::Account;
use crate::error::{ApiError, ApiResult};
use crate::otp::{generate_numeric_otp, otp_expiry, otp_matches, OtpCheck};
use chrono::{Duration, Utc};
use rand::RngCore;
use sha2::{Digest, Sha256};
use sqlx::SqlitePool;
use std::sync::Arc;
use uuid::Uuid;

/// Validity horizon for password reset tokens
const RESET_TOKEN_TTL_HOURS: i64 = 1;

pub struct AccountManager {
    db: SqlitePool,
    config: Arc<ServerConfig>,
}

impl AccountManager {
    pub fn new(db: SqlitePool, config: Arc<ServerConfig>) -> Self {
        Self { db, config }
    }

    /// Register a new account
    ///
    /// The account starts unverified and inactive. OTPs for each required
    /// channel are generated here and returned to the caller for dispatch;
    /// they are never exposed over the API.
    pub async fn register(&self, request: SignUpRequest) -> ApiResult<(Account, IssuedOtps)> {
        let email = request.email.trim().to_lowercase();

        validate_sign_up_fields(&request, &email)?;
        validate_password_policy(&request.password)?;

        if self.get_account_by_email(&email).await?.is_some() {
            return Err(ApiError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let phone_required = self.config.phone_verification_required(&request.mobile);

        let email_otp = generate_numeric_otp();
        let phone_otp = phone_required.then(generate_numeric_otp);
        let expires_at = otp_expiry();

        let password_hash = hash_password(&request.password)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO accounts (id, first_name, last_name, email, mobile, password_hash, \
             role, email_otp, email_otp_expires_at, email_verified, phone_otp, \
             phone_otp_expires_at, phone_verified, phone_required, verified, active, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, 0, ?, ?, 0, ?, 0, 0, ?, ?)",
        )
        .bind(&id)
        .bind(request.first_name.trim())
        .bind(request.last_name.trim())
        .bind(&email)
        .bind(request.mobile.trim())
        .bind(&password_hash)
        .bind(Role::User.as_str())
        .bind(&email_otp)
        .bind(expires_at)
        .bind(&phone_otp)
        .bind(phone_otp.as_ref().map(|_| expires_at))
        .bind(phone_required)
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!(account = %id, phone_required, "account registered");

        let account = self.get_account(&id).await?;
        Ok((
            account,
            IssuedOtps {
                email_otp: Some(email_otp),
                phone_otp,
            },
        ))
    }

    /// Verify one channel with a supplied code
    ///
    /// Re-verifying an already-verified channel is an idempotent no-op.
    /// Once every required channel is verified the account as a whole flips
    /// to verified and active.
    pub async fn verify_channel(
        &self,
        email: &str,
        code: &str,
        channel: Channel,
    ) -> ApiResult<VerifyOutcome> {
        let account = self
            .get_account_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

        let (already_verified, stored, expires_at) = match channel {
            Channel::Email => (
                account.email_verified,
                account.email_otp.as_deref(),
                account.email_otp_expires_at,
            ),
            Channel::Phone => (
                account.phone_verified,
                account.phone_otp.as_deref(),
                account.phone_otp_expires_at,
            ),
        };

        if already_verified {
            return Ok(VerifyOutcome::AlreadyVerified);
        }

        match otp_matches(stored, expires_at, code, Utc::now()) {
            OtpCheck::Valid => {}
            OtpCheck::Expired => {
                return Err(ApiError::Validation(
                    "Verification code has expired".to_string(),
                ));
            }
            OtpCheck::Mismatch | OtpCheck::Missing => {
                return Err(ApiError::Validation(
                    "Invalid verification code".to_string(),
                ));
            }
        }

        let email_verified = account.email_verified || channel == Channel::Email;
        let phone_verified = account.phone_verified || channel == Channel::Phone;
        let account_verified = email_verified && (phone_verified || !account.phone_required);

        let column_prefix = channel.as_str();
        sqlx::query(&format!(
            "UPDATE accounts SET {0}_otp = NULL, {0}_otp_expires_at = NULL, \
             {0}_verified = 1, verified = ?, active = ?, updated_at = ? WHERE id = ?",
            column_prefix
        ))
        .bind(account_verified)
        .bind(account_verified)
        .bind(Utc::now())
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        tracing::info!(
            account = %account.id,
            channel = channel.as_str(),
            account_verified,
            "channel verified"
        );

        Ok(VerifyOutcome::ChannelVerified { account_verified })
    }

    /// Regenerate OTPs for every still-unverified channel
    ///
    /// Returns `None` when the account is already fully verified.
    pub async fn resend_otp(&self, email: &str) -> ApiResult<Option<(Account, IssuedOtps)>> {
        let account = self
            .get_account_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

        if account.verified {
            return Ok(None);
        }

        let expires_at = otp_expiry();
        let email_otp = (!account.email_verified).then(generate_numeric_otp);
        let phone_otp = (account.phone_required && !account.phone_verified)
            .then(generate_numeric_otp);

        if let Some(otp) = &email_otp {
            sqlx::query(
                "UPDATE accounts SET email_otp = ?, email_otp_expires_at = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(otp)
            .bind(expires_at)
            .bind(Utc::now())
            .bind(&account.id)
            .execute(&self.db)
            .await?;
        }

        if let Some(otp) = &phone_otp {
            sqlx::query(
                "UPDATE accounts SET phone_otp = ?, phone_otp_expires_at = ?, updated_at = ? \
                 WHERE id = ?",
            )
            .bind(otp)
            .bind(expires_at)
            .bind(Utc::now())
            .bind(&account.id)
            .execute(&self.db)
            .await?;
        }

        let account = self.get_account(&account.id).await?;
        Ok(Some((
            account,
            IssuedOtps {
                email_otp,
                phone_otp,
            },
        )))
    }

    /// Authenticate and issue a bearer token
    ///
    /// Verification is checked before the password so an unverified account
    /// gets a consistent signal regardless of credential correctness.
    pub async fn sign_in(&self, email: &str, password: &str) -> ApiResult<(Account, String)> {
        let account = self
            .get_account_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

        if !account.verified {
            return Err(ApiError::Authentication(
                "Account is not verified".to_string(),
            ));
        }

        if !account.active {
            return Err(ApiError::Authentication(
                "Account is deactivated".to_string(),
            ));
        }

        if !verify_password(password, &account.password_hash)? {
            return Err(ApiError::Authentication(
                "Incorrect email or password".to_string(),
            ));
        }

        sqlx::query("UPDATE accounts SET last_login_at = ?, updated_at = ? WHERE id = ?")
            .bind(Utc::now())
            .bind(Utc::now())
            .bind(&account.id)
            .execute(&self.db)
            .await?;

        let role = Role::from_str(&account.role)?;
        let token = auth::issue_token(
            &account.id,
            &account.email,
            role,
            &self.config.authentication.jwt_secret,
        )?;

        tracing::info!(account = %account.id, "sign in");

        let account = self.get_account(&account.id).await?;
        Ok((account, token))
    }

    /// Begin a password reset
    ///
    /// Returns the raw token for the reset link; only its SHA-256 digest is
    /// persisted, so a database read never yields a usable token.
    pub async fn forgot_password(&self, email: &str) -> ApiResult<(Account, String)> {
        let account = self
            .get_account_by_email(email)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))?;

        let mut bytes = [0u8; 32];
        rand::thread_rng().fill_bytes(&mut bytes);
        let raw_token = hex::encode(bytes);
        let stored_token = sha256_hex(&raw_token);
        let expires_at = Utc::now() + Duration::hours(RESET_TOKEN_TTL_HOURS);

        sqlx::query(
            "UPDATE accounts SET password_reset_token = ?, password_reset_expires_at = ?, \
             updated_at = ? WHERE id = ?",
        )
        .bind(&stored_token)
        .bind(expires_at)
        .bind(Utc::now())
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        tracing::info!(account = %account.id, "password reset requested");

        Ok((account, raw_token))
    }

    /// Complete a password reset with the raw token from the reset link
    ///
    /// The token is single-use: it is cleared whether or not anything else
    /// about the account changes afterwards.
    pub async fn reset_password(&self, raw_token: &str, new_password: &str) -> ApiResult<Account> {
        validate_password_policy(new_password)?;

        let stored_token = sha256_hex(raw_token.trim());
        let account = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE password_reset_token = ? \
             AND password_reset_expires_at > ?",
        )
        .bind(&stored_token)
        .bind(Utc::now())
        .fetch_optional(&self.db)
        .await?
        .ok_or_else(|| {
            ApiError::Validation("Reset token is invalid or has expired".to_string())
        })?;

        let password_hash = hash_password(new_password)?;
        sqlx::query(
            "UPDATE accounts SET password_hash = ?, password_reset_token = NULL, \
             password_reset_expires_at = NULL, updated_at = ? WHERE id = ?",
        )
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        tracing::info!(account = %account.id, "password reset completed");

        self.get_account(&account.id).await
    }

    /// Provision a directorate account
    ///
    /// Directors are created by administrators and skip channel
    /// verification entirely.
    pub async fn create_director(&self, request: SignUpRequest) -> ApiResult<Account> {
        let email = request.email.trim().to_lowercase();

        validate_sign_up_fields(&request, &email)?;
        validate_password_policy(&request.password)?;

        if self.get_account_by_email(&email).await?.is_some() {
            return Err(ApiError::Conflict(
                "An account with this email already exists".to_string(),
            ));
        }

        let password_hash = hash_password(&request.password)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO accounts (id, first_name, last_name, email, mobile, password_hash, \
             role, email_verified, phone_verified, phone_required, verified, active, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, ?, ?, ?, 1, 1, 0, 1, 1, ?, ?)",
        )
        .bind(&id)
        .bind(request.first_name.trim())
        .bind(request.last_name.trim())
        .bind(&email)
        .bind(request.mobile.trim())
        .bind(&password_hash)
        .bind(Role::Director.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!(account = %id, "director account created");

        self.get_account(&id).await
    }

    /// All directorate accounts, newest first
    pub async fn list_directors(&self) -> ApiResult<Vec<Account>> {
        let directors = sqlx::query_as::<_, Account>(
            "SELECT * FROM accounts WHERE role = ? ORDER BY created_at DESC",
        )
        .bind(Role::Director.as_str())
        .fetch_all(&self.db)
        .await?;

        Ok(directors)
    }

    /// Apply a partial profile update
    pub async fn update_account(
        &self,
        id: &str,
        update: UpdateAccountRequest,
    ) -> ApiResult<Account> {
        let account = self.get_account(id).await?;

        let email = match update.email {
            Some(email) => {
                let email = email.trim().to_lowercase();
                if email != account.email && self.get_account_by_email(&email).await?.is_some() {
                    return Err(ApiError::Conflict(
                        "An account with this email already exists".to_string(),
                    ));
                }
                email
            }
            None => account.email.clone(),
        };

        let password_hash = match update.password {
            Some(password) => {
                validate_password_policy(&password)?;
                hash_password(&password)?
            }
            None => account.password_hash.clone(),
        };

        sqlx::query(
            "UPDATE accounts SET first_name = ?, last_name = ?, email = ?, mobile = ?, \
             password_hash = ?, updated_at = ? WHERE id = ?",
        )
        .bind(update.first_name.as_deref().unwrap_or(&account.first_name))
        .bind(update.last_name.as_deref().unwrap_or(&account.last_name))
        .bind(&email)
        .bind(update.mobile.as_deref().unwrap_or(&account.mobile))
        .bind(&password_hash)
        .bind(Utc::now())
        .bind(id)
        .execute(&self.db)
        .await?;

        self.get_account(id).await
    }

    /// Change an account's role
    pub async fn update_role(&self, id: &str, role: Role) -> ApiResult<Account> {
        let account = self.get_account(id).await?;

        sqlx::query("UPDATE accounts SET role = ?, updated_at = ? WHERE id = ?")
            .bind(role.as_str())
            .bind(Utc::now())
            .bind(&account.id)
            .execute(&self.db)
            .await?;

        tracing::info!(account = %account.id, role = role.as_str(), "role updated");

        self.get_account(id).await
    }

    /// Deactivate an account
    ///
    /// The record is kept but every verification flag is cleared, so the
    /// account can neither sign in nor pass a later verification shortcut.
    pub async fn soft_delete(&self, id: &str) -> ApiResult<()> {
        let account = self.get_account(id).await?;

        sqlx::query(
            "UPDATE accounts SET active = 0, verified = 0, email_verified = 0, \
             phone_verified = 0, updated_at = ? WHERE id = ?",
        )
        .bind(Utc::now())
        .bind(&account.id)
        .execute(&self.db)
        .await?;

        tracing::info!(account = %account.id, "account deactivated");

        Ok(())
    }

    pub async fn get_account(&self, id: &str) -> ApiResult<Account> {
        sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE id = ?")
            .bind(id)
            .fetch_optional(&self.db)
            .await?
            .ok_or_else(|| ApiError::NotFound("Account not found".to_string()))
    }

    pub async fn get_account_by_email(&self, email: &str) -> ApiResult<Option<Account>> {
        let account = sqlx::query_as::<_, Account>("SELECT * FROM accounts WHERE email = ?")
            .bind(email.trim().to_lowercase())
            .fetch_optional(&self.db)
            .await?;

        Ok(account)
    }

    /// Ensure the configured super-administrator exists
    ///
    /// Runs at startup and is idempotent; an existing account with the
    /// configured email is left untouched.
    pub async fn seed_super_admin(&self) -> ApiResult<()> {
        let email = self.config.authentication.admin_email.trim().to_lowercase();

        if self.get_account_by_email(&email).await?.is_some() {
            return Ok(());
        }

        let password_hash = hash_password(&self.config.authentication.admin_password)?;
        let id = Uuid::new_v4().to_string();
        let now = Utc::now();

        sqlx::query(
            "INSERT INTO accounts (id, first_name, last_name, email, mobile, password_hash, \
             role, email_verified, phone_verified, phone_required, verified, active, \
             created_at, updated_at) \
             VALUES (?, ?, ?, ?, '', ?, ?, 1, 1, 0, 1, 1, ?, ?)",
        )
        .bind(&id)
        .bind("Super")
        .bind("Admin")
        .bind(&email)
        .bind(&password_hash)
        .bind(Role::SuperAdmin.as_str())
        .bind(now)
        .bind(now)
        .execute(&self.db)
        .await?;

        tracing::info!(account = %id, "super admin seeded");

        Ok(())
    }
}

fn validate_sign_up_fields(request: &SignUpRequest, email: &str) -> ApiResult<()> {
    if request.first_name.trim().is_empty() || request.last_name.trim().is_empty() {
        return Err(ApiError::Validation("Name fields are required".to_string()));
    }

    if !email.contains('@') || email.len() < 3 {
        return Err(ApiError::Validation("A valid email is required".to_string()));
    }

    let mobile = request.mobile.trim();
    let digits = mobile.strip_prefix('+').unwrap_or(mobile);
    if digits.len() < 7 || digits.len() > 15 || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ApiError::Validation(
            "A valid mobile number is required".to_string(),
        ));
    }

    if request.password != request.confirm_password {
        return Err(ApiError::Validation("Passwords do not match".to_string()));
    }

    Ok(())
}

fn sha256_hex(input: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(input.as_bytes());
    hex::encode(hasher.finalize())
}
