/// Account routes: registration, verification, sessions, password reset,
/// and role administration
use super::ApiResponse;
use crate::account::{
    AccountProfile, Channel, IssuedOtps, Role, SignUpRequest, UpdateAccountRequest, VerifyOutcome,
};
use crate::auth::AuthAccount;
use crate::context::AppContext;
use crate::db::models::Account;
use crate::error::{ApiError, ApiResult};
use crate::rate_limit::client_ip;
use crate::require_role;
use axum::{
    extract::{ConnectInfo, Path, State},
    http::{header, HeaderMap, StatusCode},
    response::IntoResponse,
    routing::{get, patch, post},
    Json, Router,
};
use serde::Deserialize;
use std::net::SocketAddr;

pub fn routes() -> Router<AppContext> {
    Router::new()
        .route("/sign-up", post(sign_up))
        .route("/verify", post(verify))
        .route("/resend-otp", post(resend_otp))
        .route("/sign-in", post(sign_in))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password/:token", post(reset_password))
        .route("/me", get(me))
        .route("/directors", post(create_director).get(list_directors))
        .route("/:id", patch(update_account).delete(delete_account))
        .route("/:id/role", patch(update_role))
}

#[derive(Debug, Deserialize)]
struct VerifyRequest {
    email: String,
    otp: String,
    channel: Channel,
}

#[derive(Debug, Deserialize)]
struct EmailRequest {
    email: String,
}

#[derive(Debug, Deserialize)]
struct SignInRequest {
    email: String,
    password: String,
}

#[derive(Debug, Deserialize)]
struct ResetPasswordRequest {
    password: String,
}

#[derive(Debug, Deserialize)]
struct UpdateRoleRequest {
    role: String,
}

async fn sign_up(
    State(ctx): State<AppContext>,
    Json(request): Json<SignUpRequest>,
) -> ApiResult<impl IntoResponse> {
    let (account, otps) = ctx.accounts.register(request).await?;
    dispatch_otps(&ctx, &account, &otps).await;

    let message = if account.phone_required {
        "Account created, verification codes sent to your email and phone"
    } else {
        "Account created, verification code sent to your email"
    };

    Ok((
        StatusCode::CREATED,
        ApiResponse::ok(message, AccountProfile::from(account)),
    ))
}

async fn verify(
    State(ctx): State<AppContext>,
    Json(request): Json<VerifyRequest>,
) -> ApiResult<ApiResponse<()>> {
    let outcome = ctx
        .accounts
        .verify_channel(&request.email, &request.otp, request.channel)
        .await?;

    let message = match outcome {
        VerifyOutcome::AlreadyVerified => "Already verified",
        VerifyOutcome::ChannelVerified {
            account_verified: true,
        } => "Account verified, you can now sign in",
        VerifyOutcome::ChannelVerified {
            account_verified: false,
        } => "Verified, one more channel to go",
    };

    Ok(ApiResponse::message(message))
}

async fn resend_otp(
    State(ctx): State<AppContext>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<ApiResponse<()>> {
    match ctx.accounts.resend_otp(&request.email).await? {
        Some((account, otps)) => {
            dispatch_otps(&ctx, &account, &otps).await;
            Ok(ApiResponse::message("New verification codes sent"))
        }
        None => Ok(ApiResponse::message("Account is already verified")),
    }
}

async fn sign_in(
    State(ctx): State<AppContext>,
    ConnectInfo(addr): ConnectInfo<SocketAddr>,
    headers: HeaderMap,
    Json(request): Json<SignInRequest>,
) -> ApiResult<impl IntoResponse> {
    ctx.rate_limiters.check_sign_in(client_ip(&headers, addr))?;

    let (account, token) = ctx.accounts.sign_in(&request.email, &request.password).await?;

    let bearer = format!("Bearer {}", token);
    let body = ApiResponse::ok(
        "Signed in",
        serde_json::json!({
            "token": token,
            "account": AccountProfile::from(account),
        }),
    );

    Ok(([(header::AUTHORIZATION, bearer)], body))
}

async fn forgot_password(
    State(ctx): State<AppContext>,
    Json(request): Json<EmailRequest>,
) -> ApiResult<ApiResponse<()>> {
    let (account, raw_token) = ctx.accounts.forgot_password(&request.email).await?;

    ctx.mailer
        .send_password_reset(&account.email, &account.full_name(), &raw_token)
        .await?;

    Ok(ApiResponse::message("Password reset link sent to your email"))
}

async fn reset_password(
    State(ctx): State<AppContext>,
    Path(token): Path<String>,
    Json(request): Json<ResetPasswordRequest>,
) -> ApiResult<ApiResponse<()>> {
    let account = ctx.accounts.reset_password(&token, &request.password).await?;

    if let Err(e) = ctx
        .mailer
        .send_password_reset_confirmation(&account.email, &account.full_name())
        .await
    {
        tracing::warn!(account = %account.id, "reset confirmation email failed: {}", e);
    }

    Ok(ApiResponse::message("Password updated, you can now sign in"))
}

async fn me(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
) -> ApiResult<ApiResponse<AccountProfile>> {
    let account = ctx.accounts.get_account(&auth.id).await?;
    Ok(ApiResponse::ok("Profile", AccountProfile::from(account)))
}

async fn create_director(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Json(request): Json<SignUpRequest>,
) -> ApiResult<impl IntoResponse> {
    require_role!(auth, Role::Admin);

    let director = ctx.accounts.create_director(request).await?;
    Ok((
        StatusCode::CREATED,
        ApiResponse::ok("Director account created", AccountProfile::from(director)),
    ))
}

async fn list_directors(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
) -> ApiResult<ApiResponse<Vec<AccountProfile>>> {
    require_role!(auth, Role::Admin);

    let directors = ctx
        .accounts
        .list_directors()
        .await?
        .into_iter()
        .map(AccountProfile::from)
        .collect();
    Ok(ApiResponse::ok("Directors", directors))
}

async fn update_account(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
    Json(request): Json<UpdateAccountRequest>,
) -> ApiResult<ApiResponse<AccountProfile>> {
    require_self_or_admin(&auth, &id)?;

    let account = ctx.accounts.update_account(&id, request).await?;
    Ok(ApiResponse::ok("Account updated", AccountProfile::from(account)))
}

async fn update_role(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
    Json(request): Json<UpdateRoleRequest>,
) -> ApiResult<ApiResponse<AccountProfile>> {
    require_role!(auth, Role::SuperAdmin);

    let role = Role::from_str(&request.role)?;
    let account = ctx.accounts.update_role(&id, role).await?;
    Ok(ApiResponse::ok("Role updated", AccountProfile::from(account)))
}

async fn delete_account(
    State(ctx): State<AppContext>,
    auth: AuthAccount,
    Path(id): Path<String>,
) -> ApiResult<ApiResponse<()>> {
    require_self_or_admin(&auth, &id)?;

    ctx.accounts.soft_delete(&id).await?;
    Ok(ApiResponse::message("Account deactivated"))
}

/// Owners can manage their own account; admins can manage anyone's
fn require_self_or_admin(auth: &AuthAccount, id: &str) -> ApiResult<()> {
    if auth.id == id || auth.is_admin() {
        Ok(())
    } else {
        Err(ApiError::Authorization(
            "You can only manage your own account".to_string(),
        ))
    }
}

/// Send issued codes out-of-band; delivery failure never rolls back the
/// account, it is logged and the client can use resend
async fn dispatch_otps(ctx: &AppContext, account: &Account, otps: &IssuedOtps) {
    if let Some(otp) = &otps.email_otp {
        if let Err(e) = ctx
            .mailer
            .send_verification_otp(&account.email, &account.full_name(), otp)
            .await
        {
            tracing::error!(account = %account.id, "verification email failed: {}", e);
        }
    }

    if let Some(otp) = &otps.phone_otp {
        if let Err(e) = ctx.sms.send_verification_otp(&account.mobile, otp).await {
            tracing::error!(account = %account.id, "verification SMS failed: {}", e);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_self_or_admin_rule() {
        let owner = AuthAccount {
            id: "acc-1".to_string(),
            email: "a@x.com".to_string(),
            role: Role::User,
        };
        assert!(require_self_or_admin(&owner, "acc-1").is_ok());
        assert!(require_self_or_admin(&owner, "acc-2").is_err());

        let admin = AuthAccount {
            id: "acc-9".to_string(),
            email: "admin@x.com".to_string(),
            role: Role::Admin,
        };
        assert!(require_self_or_admin(&admin, "acc-2").is_ok());
    }

    #[test]
    fn test_verify_request_accepts_channel_names() {
        let parsed: VerifyRequest = serde_json::from_str(
            r#"{"email":"a@x.com","otp":"123456","channel":"email"}"#,
        )
        .unwrap();
        assert_eq!(parsed.channel, Channel::Email);

        let parsed: VerifyRequest = serde_json::from_str(
            r#"{"email":"a@x.com","otp":"123456","channel":"phone"}"#,
        )
        .unwrap();
        assert_eq!(parsed.channel, Channel::Phone);
    }
}
