/// Configuration management for the intake server
use crate::error::{ApiError, ApiResult};
use serde::{Deserialize, Serialize};
use std::env;
use std::path::PathBuf;

/// Main server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServerConfig {
    pub service: ServiceConfig,
    pub storage: StorageConfig,
    pub authentication: AuthConfig,
    pub email: Option<EmailConfig>,
    pub sms: Option<SmsConfig>,
    pub rate_limit: RateLimitConfig,
    pub verification: VerificationConfig,
}

/// Service-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub hostname: String,
    pub port: u16,
    pub application_name: String,
    /// Public frontend base URL, used to build verification/reset links
    pub frontend_url: String,
}

/// Storage configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StorageConfig {
    pub data_directory: PathBuf,
    pub database: PathBuf,
    pub upload_directory: PathBuf,
}

/// Authentication configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    pub jwt_secret: String,
    /// Seed super-administrator credentials, provisioned at startup
    pub admin_email: String,
    pub admin_password: String,
}

/// Email (SMTP) configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EmailConfig {
    pub smtp_url: String,
    pub from_address: String,
}

/// SMS gateway configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SmsConfig {
    pub gateway_url: String,
    pub username: String,
    pub password: String,
    pub sender_alias: String,
}

/// Rate limiting configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    pub enabled: bool,
    /// Global per-IP budget over the rolling window
    pub global_requests: u32,
    pub global_window_secs: u64,
    /// Stricter per-IP budget on the sign-in route
    pub sign_in_requests: u32,
    pub sign_in_window_secs: u64,
}

/// Verification policy configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct VerificationConfig {
    /// Mobile numbers starting with this prefix require phone verification
    /// in addition to email (e.g. a local country-code prefix like "07").
    pub phone_otp_prefix: Option<String>,
}

impl ServerConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> ApiResult<Self> {
        dotenv::dotenv().ok();

        let hostname = env::var("INTAKE_HOSTNAME").unwrap_or_else(|_| "0.0.0.0".to_string());
        let port = env::var("INTAKE_PORT")
            .unwrap_or_else(|_| "3000".to_string())
            .parse()
            .map_err(|_| ApiError::Validation("Invalid port number".to_string()))?;
        let application_name =
            env::var("APPLICATION_NAME").unwrap_or_else(|_| "Proposal Intake".to_string());
        let frontend_url = env::var("FRONTEND_URL")
            .unwrap_or_else(|_| format!("http://{}:{}", hostname, port));

        let data_directory: PathBuf = env::var("INTAKE_DATA_DIRECTORY")
            .unwrap_or_else(|_| "./data".to_string())
            .into();
        let database = env::var("INTAKE_DB_LOCATION")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("intake.sqlite"));
        let upload_directory = env::var("INTAKE_UPLOAD_DIRECTORY")
            .map(PathBuf::from)
            .unwrap_or_else(|_| data_directory.join("uploads"));

        let jwt_secret = env::var("SECRET_KEY")
            .map_err(|_| ApiError::Validation("Signing secret required".to_string()))?;
        let admin_email =
            env::var("ADMIN_EMAIL").unwrap_or_else(|_| "admin@example.com".to_string());
        let admin_password =
            env::var("ADMIN_PASSWORD").unwrap_or_else(|_| "Admin#1234".to_string());

        let email = if let Ok(smtp_url) = env::var("SMTP_URL") {
            Some(EmailConfig {
                smtp_url,
                from_address: env::var("SMTP_FROM_ADDRESS")
                    .unwrap_or_else(|_| format!("noreply@{}", hostname)),
            })
        } else {
            None
        };

        let sms = if let Ok(gateway_url) = env::var("SMS_GATEWAY_URL") {
            Some(SmsConfig {
                gateway_url,
                username: env::var("SMS_USERNAME").unwrap_or_default(),
                password: env::var("SMS_PASSWORD").unwrap_or_default(),
                sender_alias: env::var("SMS_SENDER_ALIAS").unwrap_or_default(),
            })
        } else {
            None
        };

        let rate_limit_enabled = env::var("RATE_LIMITS_ENABLED")
            .unwrap_or_else(|_| "true".to_string())
            .parse()
            .unwrap_or(true);
        let global_requests = env::var("RATE_LIMIT_GLOBAL_REQUESTS")
            .unwrap_or_else(|_| "100".to_string())
            .parse()
            .unwrap_or(100);
        let global_window_secs = env::var("RATE_LIMIT_GLOBAL_WINDOW_SECS")
            .unwrap_or_else(|_| "900".to_string())
            .parse()
            .unwrap_or(900);
        let sign_in_requests = env::var("RATE_LIMIT_SIGN_IN_REQUESTS")
            .unwrap_or_else(|_| "5".to_string())
            .parse()
            .unwrap_or(5);
        let sign_in_window_secs = env::var("RATE_LIMIT_SIGN_IN_WINDOW_SECS")
            .unwrap_or_else(|_| "3600".to_string())
            .parse()
            .unwrap_or(3600);

        let phone_otp_prefix = env::var("PHONE_OTP_PREFIX").ok().filter(|s| !s.is_empty());

        Ok(ServerConfig {
            service: ServiceConfig {
                hostname,
                port,
                application_name,
                frontend_url,
            },
            storage: StorageConfig {
                data_directory,
                database,
                upload_directory,
            },
            authentication: AuthConfig {
                jwt_secret,
                admin_email,
                admin_password,
            },
            email,
            sms,
            rate_limit: RateLimitConfig {
                enabled: rate_limit_enabled,
                global_requests,
                global_window_secs,
                sign_in_requests,
                sign_in_window_secs,
            },
            verification: VerificationConfig { phone_otp_prefix },
        })
    }

    /// Validate configuration
    pub fn validate(&self) -> ApiResult<()> {
        if self.service.hostname.is_empty() {
            return Err(ApiError::Validation("Hostname cannot be empty".to_string()));
        }

        if self.authentication.jwt_secret.len() < 32 {
            return Err(ApiError::Validation(
                "Signing secret must be at least 32 characters".to_string(),
            ));
        }

        Ok(())
    }

    /// True when the given mobile number requires phone verification
    pub fn phone_verification_required(&self, mobile: &str) -> bool {
        match &self.verification.phone_otp_prefix {
            Some(prefix) => mobile.starts_with(prefix.as_str()),
            None => false,
        }
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn test_config() -> ServerConfig {
        ServerConfig {
            service: ServiceConfig {
                hostname: "localhost".to_string(),
                port: 3000,
                application_name: "Proposal Intake".to_string(),
                frontend_url: "http://localhost:3000".to_string(),
            },
            storage: StorageConfig {
                data_directory: PathBuf::from("./data"),
                database: PathBuf::from(":memory:"),
                upload_directory: PathBuf::from("./data/uploads"),
            },
            authentication: AuthConfig {
                jwt_secret: "test-secret-key-for-testing-only-0123456789".to_string(),
                admin_email: "admin@example.com".to_string(),
                admin_password: "Admin#1234".to_string(),
            },
            email: None,
            sms: None,
            rate_limit: RateLimitConfig {
                enabled: true,
                global_requests: 100,
                global_window_secs: 900,
                sign_in_requests: 5,
                sign_in_window_secs: 3600,
            },
            verification: VerificationConfig {
                phone_otp_prefix: Some("07".to_string()),
            },
        }
    }

    #[test]
    fn test_validate_rejects_short_secret() {
        let mut config = test_config();
        config.authentication.jwt_secret = "short".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_phone_verification_required() {
        let config = test_config();
        assert!(config.phone_verification_required("0766308272"));
        assert!(!config.phone_verification_required("+4915112345678"));

        let mut no_prefix = test_config();
        no_prefix.verification.phone_otp_prefix = None;
        assert!(!no_prefix.phone_verification_required("0766308272"));
    }
}
