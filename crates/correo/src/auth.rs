//! Correo Argentino authentication.
//!
//! The `MiCorreo` API exchanges HTTP Basic credentials for a bearer token
//! with a fixed lifetime. The expiry comes back as a local Argentina
//! timestamp without an offset.

use chrono::{DateTime, Duration, FixedOffset, NaiveDateTime, Utc};
use secrecy::{ExposeSecret, SecretString};
use serde::Deserialize;
use tracing::{instrument, warn};
use url::Url;

use super::CorreoError;

/// Seconds before the stated expiry at which a token stops being used.
pub const EXPIRY_BUFFER_SECS: i64 = 60;

/// Lifetime assumed when the carrier's expiry cannot be parsed.
const FALLBACK_LIFETIME_SECS: i64 = 3600;

/// Argentina does not observe DST; local time is always UTC-3.
const ARGENTINA_OFFSET_SECS: i32 = -3 * 3600;

const EXPIRE_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

/// Bearer token obtained from `POST /token`.
#[derive(Debug, Clone)]
pub struct CorreoToken {
    /// Bearer token for API requests.
    pub token: SecretString,
    /// When the carrier stops accepting the token.
    pub expires_at: DateTime<Utc>,
}

#[derive(Deserialize)]
struct TokenResponse {
    token: String,
    #[serde(default)]
    expire: Option<String>,
}

#[derive(Deserialize)]
struct AuthErrorResponse {
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    error: Option<String>,
}

/// Authenticate with the carrier using the account's API credentials.
///
/// # Errors
///
/// Returns `CorreoError::AuthenticationFailed` if the credentials are
/// rejected, `CorreoError::Http` on network failures.
#[instrument(skip(client, password), fields(user = %user))]
pub async fn authenticate(
    client: &reqwest::Client,
    base_url: &Url,
    user: &str,
    password: &SecretString,
) -> Result<CorreoToken, CorreoError> {
    let response = client
        .post(base_url.join("token")?)
        .basic_auth(user, Some(password.expose_secret()))
        .send()
        .await?;

    let status = response.status();

    if status.is_success() {
        let body: TokenResponse = response.json().await?;
        let now = Utc::now();
        let expires_at = body
            .expire
            .as_deref()
            .and_then(parse_expiry)
            .unwrap_or_else(|| {
                warn!(
                    expire = ?body.expire,
                    "Unparseable token expiry, assuming one hour"
                );
                now + Duration::seconds(FALLBACK_LIFETIME_SECS)
            });

        Ok(CorreoToken {
            token: SecretString::from(body.token),
            expires_at,
        })
    } else if status == reqwest::StatusCode::UNAUTHORIZED
        || status == reqwest::StatusCode::FORBIDDEN
    {
        let error_response: AuthErrorResponse =
            response.json().await.unwrap_or(AuthErrorResponse {
                message: None,
                error: None,
            });

        let message = error_response
            .message
            .or(error_response.error)
            .unwrap_or_else(|| "Invalid credentials".to_string());

        Err(CorreoError::AuthenticationFailed(message))
    } else {
        let error_text = response
            .text()
            .await
            .unwrap_or_else(|_| "Unknown error".to_string());

        Err(CorreoError::AuthenticationFailed(format!(
            "HTTP {status}: {error_text}"
        )))
    }
}

/// Parse the carrier's `expire` field (`2024-05-01 18:30:00`, Argentina time).
#[must_use]
pub fn parse_expiry(value: &str) -> Option<DateTime<Utc>> {
    let naive = NaiveDateTime::parse_from_str(value.trim(), EXPIRE_FORMAT).ok()?;
    let offset = FixedOffset::east_opt(ARGENTINA_OFFSET_SECS)?;
    naive
        .and_local_timezone(offset)
        .single()
        .map(|dt| dt.with_timezone(&Utc))
}

impl CorreoToken {
    /// Check if the token has expired, with a 60 second buffer.
    #[must_use]
    pub fn is_expired(&self) -> bool {
        self.is_expired_at(Utc::now())
    }

    /// Same as [`Self::is_expired`] with an explicit clock.
    #[must_use]
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at - Duration::seconds(EXPIRY_BUFFER_SECS)
    }

    /// Check if the token will expire within the given number of seconds.
    #[must_use]
    pub fn expires_within(&self, seconds: i64) -> bool {
        Utc::now() >= self.expires_at - Duration::seconds(seconds)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn token_expiring_at(expires_at: DateTime<Utc>) -> CorreoToken {
        CorreoToken {
            token: SecretString::from("test"),
            expires_at,
        }
    }

    #[test]
    fn test_parse_expiry_is_argentina_time() {
        let parsed = parse_expiry("2024-05-01 18:30:00").unwrap();
        assert_eq!(parsed, Utc.with_ymd_and_hms(2024, 5, 1, 21, 30, 0).unwrap());
    }

    #[test]
    fn test_parse_expiry_rejects_other_formats() {
        assert!(parse_expiry("").is_none());
        assert!(parse_expiry("2024-05-01T18:30:00Z").is_none());
        assert!(parse_expiry("mañana").is_none());
    }

    #[test]
    fn test_token_is_expired() {
        let now = Utc::now();

        // Token that expired an hour ago
        assert!(token_expiring_at(now - Duration::hours(1)).is_expired());

        // Token that expires in an hour
        assert!(!token_expiring_at(now + Duration::hours(1)).is_expired());

        // Expires in 30 seconds, inside the buffer
        assert!(token_expiring_at(now + Duration::seconds(30)).is_expired());
    }

    #[test]
    fn test_is_expired_at_buffer_edge() {
        let expires_at = Utc.with_ymd_and_hms(2024, 5, 1, 12, 0, 0).unwrap();
        let token = token_expiring_at(expires_at);

        assert!(!token.is_expired_at(expires_at - Duration::seconds(61)));
        assert!(token.is_expired_at(expires_at - Duration::seconds(60)));
    }

    #[test]
    fn test_expires_within() {
        let token = token_expiring_at(Utc::now() + Duration::minutes(4));
        assert!(token.expires_within(300));
        assert!(!token.expires_within(60));
    }
}
