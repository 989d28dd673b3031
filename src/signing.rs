use std::fmt;

use chrono::{DateTime, SecondsFormat, Utc};
use hmac::{Hmac, Mac};
use sha2::Sha256;
use uuid::Uuid;

type HmacSha256 = Hmac<Sha256>;

const SCHEME: &str = "HMAC-SHA256";

/// Signed `Authorization` header for one gateway request.
///
/// Proves possession of the API secret without sending it: the signature
/// is `hex(HMAC-SHA256(secret, date ‖ salt))`. Every request must be signed
/// with a fresh `date`/`salt` pair; never cache or reuse one.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthHeader {
    pub api_key: String,
    pub date: String,
    pub salt: String,
    pub signature: String,
}

impl AuthHeader {
    /// Sign with the current time and a new random salt.
    pub fn sign(api_key: &str, api_secret: &str) -> Self {
        Self::sign_with(api_key, api_secret, Utc::now(), Uuid::new_v4())
    }

    /// Sign with an explicit date and salt.
    pub fn sign_with(api_key: &str, api_secret: &str, date: DateTime<Utc>, salt: Uuid) -> Self {
        let date = date.to_rfc3339_opts(SecondsFormat::Millis, true);
        let salt = salt.to_string();
        let signature = compute_signature(api_secret.as_bytes(), &date, &salt);

        Self {
            api_key: api_key.to_string(),
            date,
            salt,
            signature,
        }
    }

    /// `(name, value)` pair ready to attach to a request.
    pub fn header(&self) -> (&'static str, String) {
        ("Authorization", self.to_string())
    }
}

impl fmt::Display for AuthHeader {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{SCHEME} apiKey={}, date={}, salt={}, signature={}",
            self.api_key, self.date, self.salt, self.signature
        )
    }
}

fn mac_for(secret: &[u8]) -> HmacSha256 {
    // HMAC accepts keys of any length.
    HmacSha256::new_from_slice(secret).expect("hmac key")
}

/// Hex-encoded HMAC-SHA256 over `date ‖ salt`.
pub fn compute_signature(secret: &[u8], date: &str, salt: &str) -> String {
    let mut mac = mac_for(secret);
    mac.update(date.as_bytes());
    mac.update(salt.as_bytes());
    hex::encode(mac.finalize().into_bytes())
}

/// Constant-time check of a hex signature.
pub fn verify_signature(secret: &[u8], date: &str, salt: &str, signature_hex: &str) -> bool {
    let Ok(signature) = hex::decode(signature_hex) else {
        return false;
    };

    let mut mac = mac_for(secret);
    mac.update(date.as_bytes());
    mac.update(salt.as_bytes());
    mac.verify_slice(&signature).is_ok()
}

/// Whether `date` lies within `max_age_secs` of `now`, in either direction.
pub fn is_date_fresh(date: DateTime<Utc>, now: DateTime<Utc>, max_age_secs: u64) -> bool {
    let drift = (now - date).num_seconds().unsigned_abs();
    drift <= max_age_secs
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    MissingScheme,
    MissingField(&'static str),
    InvalidDate,
    StaleDate,
    InvalidSignature,
}

/// Parse an `HMAC-SHA256 apiKey=…, date=…, salt=…, signature=…` value.
pub fn parse_auth_header(value: &str) -> Result<AuthHeader, VerificationError> {
    let params = value
        .trim()
        .strip_prefix(SCHEME)
        .ok_or(VerificationError::MissingScheme)?;

    let mut api_key = None;
    let mut date = None;
    let mut salt = None;
    let mut signature = None;

    for part in params.split(',') {
        let Some((key, val)) = part.trim().split_once('=') else {
            continue;
        };
        let val = Some(val.trim().to_string());
        match key.trim() {
            "apiKey" => api_key = val,
            "date" => date = val,
            "salt" => salt = val,
            "signature" => signature = val,
            _ => {}
        }
    }

    Ok(AuthHeader {
        api_key: api_key.ok_or(VerificationError::MissingField("apiKey"))?,
        date: date.ok_or(VerificationError::MissingField("date"))?,
        salt: salt.ok_or(VerificationError::MissingField("salt"))?,
        signature: signature.ok_or(VerificationError::MissingField("signature"))?,
    })
}

/// Verify a received `Authorization` value in one call.
pub fn verify_auth_header(
    value: &str,
    api_secret: &[u8],
    max_age_secs: u64,
    now: DateTime<Utc>,
) -> Result<AuthHeader, VerificationError> {
    let parsed = parse_auth_header(value)?;
    let date = DateTime::parse_from_rfc3339(&parsed.date)
        .map_err(|_| VerificationError::InvalidDate)?
        .with_timezone(&Utc);

    if !is_date_fresh(date, now, max_age_secs) {
        return Err(VerificationError::StaleDate);
    }

    if verify_signature(api_secret, &parsed.date, &parsed.salt, &parsed.signature) {
        Ok(parsed)
    } else {
        Err(VerificationError::InvalidSignature)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    #[test]
    fn consecutive_signatures_never_repeat() {
        let first = AuthHeader::sign("key", "secret");
        std::thread::sleep(std::time::Duration::from_millis(1));
        let second = AuthHeader::sign("key", "secret");

        assert_ne!(first.salt, second.salt);
        assert_ne!(first.signature, second.signature);
    }

    #[test]
    fn same_second_different_salt_differs() {
        let date = Utc.with_ymd_and_hms(2025, 1, 1, 9, 0, 0).unwrap();
        let a = AuthHeader::sign_with("key", "secret", date, Uuid::new_v4());
        let b = AuthHeader::sign_with("key", "secret", date, Uuid::new_v4());

        assert_eq!(a.date, b.date);
        assert_ne!(a.signature, b.signature);
    }

    #[test]
    fn header_format() {
        let date = Utc.with_ymd_and_hms(2025, 3, 1, 12, 30, 0).unwrap();
        let salt = Uuid::nil();
        let header = AuthHeader::sign_with("KEY123", "secret", date, salt);

        let expected_sig = compute_signature(
            b"secret",
            "2025-03-01T12:30:00.000Z",
            "00000000-0000-0000-0000-000000000000",
        );
        assert_eq!(
            header.to_string(),
            format!(
                "HMAC-SHA256 apiKey=KEY123, date=2025-03-01T12:30:00.000Z, \
                 salt=00000000-0000-0000-0000-000000000000, signature={expected_sig}"
            )
        );
        assert_eq!(header.signature.len(), 64);
    }

    #[test]
    fn round_trip_verification() {
        let now = Utc::now();
        let header = AuthHeader::sign_with("key", "secret", now, Uuid::new_v4());

        let parsed = verify_auth_header(&header.to_string(), b"secret", 300, now).unwrap();
        assert_eq!(parsed, header);

        assert_eq!(
            verify_auth_header(&header.to_string(), b"other", 300, now),
            Err(VerificationError::InvalidSignature)
        );
        assert_eq!(
            verify_auth_header(
                &header.to_string(),
                b"secret",
                300,
                now + chrono::Duration::minutes(10)
            ),
            Err(VerificationError::StaleDate)
        );
    }

    #[test]
    fn parse_rejects_incomplete_headers() {
        assert_eq!(parse_auth_header("Bearer abc"), Err(VerificationError::MissingScheme));
        assert_eq!(
            parse_auth_header("HMAC-SHA256 apiKey=k, date=d, salt=s"),
            Err(VerificationError::MissingField("signature"))
        );
    }
}
