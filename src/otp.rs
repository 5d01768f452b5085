/// One-time code generation
///
/// OTPs are issued per verification channel with a bounded validity window.
use chrono::{DateTime, Duration, Utc};
use rand::Rng;

/// Validity horizon for channel OTPs
pub const OTP_TTL_MINUTES: i64 = 10;

/// Generate a 6-digit numeric OTP
pub fn generate_numeric_otp() -> String {
    let mut rng = rand::thread_rng();
    format!("{:06}", rng.gen_range(100_000..1_000_000))
}

/// Generate a 6-character alphanumeric OTP (uppercase letters and digits)
pub fn generate_alphanumeric_otp() -> String {
    const CHARSET: &[u8] = b"ABCDEFGHIJKLMNOPQRSTUVWXYZ0123456789";
    let mut rng = rand::thread_rng();
    (0..6)
        .map(|_| {
            let idx = rng.gen_range(0..CHARSET.len());
            CHARSET[idx] as char
        })
        .collect()
}

/// Expiry timestamp for an OTP issued now
pub fn otp_expiry() -> DateTime<Utc> {
    Utc::now() + Duration::minutes(OTP_TTL_MINUTES)
}

/// Whether a stored OTP matches the supplied code and is still valid.
/// Codes are compared byte-for-byte after trimming surrounding whitespace.
pub fn otp_matches(
    stored: Option<&str>,
    expires_at: Option<DateTime<Utc>>,
    supplied: &str,
    now: DateTime<Utc>,
) -> OtpCheck {
    let (Some(stored), Some(expires_at)) = (stored, expires_at) else {
        return OtpCheck::Missing;
    };

    if now > expires_at {
        return OtpCheck::Expired;
    }

    if stored == supplied.trim() {
        OtpCheck::Valid
    } else {
        OtpCheck::Mismatch
    }
}

/// Outcome of checking a supplied code against stored OTP state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OtpCheck {
    Valid,
    Mismatch,
    Expired,
    Missing,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_numeric_otp_format() {
        for _ in 0..100 {
            let otp = generate_numeric_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp.chars().all(|c| c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_alphanumeric_otp_format() {
        for _ in 0..100 {
            let otp = generate_alphanumeric_otp();
            assert_eq!(otp.len(), 6);
            assert!(otp
                .chars()
                .all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()));
        }
    }

    #[test]
    fn test_otp_matches_trims_whitespace() {
        let expires = Some(Utc::now() + Duration::minutes(5));
        assert_eq!(
            otp_matches(Some("123456"), expires, "  123456 \n", Utc::now()),
            OtpCheck::Valid
        );
    }

    #[test]
    fn test_otp_expired_regardless_of_correctness() {
        let expires = Some(Utc::now() - Duration::seconds(1));
        assert_eq!(
            otp_matches(Some("123456"), expires, "123456", Utc::now()),
            OtpCheck::Expired
        );
    }

    #[test]
    fn test_otp_mismatch_and_missing() {
        let expires = Some(Utc::now() + Duration::minutes(5));
        assert_eq!(
            otp_matches(Some("123456"), expires, "654321", Utc::now()),
            OtpCheck::Mismatch
        );
        assert_eq!(
            otp_matches(None, None, "123456", Utc::now()),
            OtpCheck::Missing
        );
    }
}
