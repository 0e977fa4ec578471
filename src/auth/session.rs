use serde::{Deserialize, Serialize};

use super::claims::Principal;
use super::token::{TokenCodec, TokenError};

/// Body returned by login and refresh.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TokenPair {
    pub access_token: String,
    pub refresh_token: String,
}

#[derive(Debug, thiserror::Error)]
pub enum SessionError {
    /// The refresh token was expired, forged, garbled or an access token.
    /// The caller has to log in again.
    #[error("refresh token rejected: {0}")]
    Rejected(TokenError),

    #[error(transparent)]
    Signing(TokenError),
}

/// Mint a fresh access/refresh pair for a principal the user backend
/// has just authenticated.
pub fn issue_session(codec: &TokenCodec, principal: &Principal) -> Result<TokenPair, SessionError> {
    let access_token = codec
        .issue_access_token(&principal.subject_id, &principal.role)
        .map_err(SessionError::Signing)?;
    let refresh_token = codec
        .issue_refresh_token(&principal.subject_id, &principal.role)
        .map_err(SessionError::Signing)?;

    Ok(TokenPair {
        access_token,
        refresh_token,
    })
}

/// Exchange a refresh token for a new access token.
///
/// Stateless: nothing is recorded, and the refresh token is handed back
/// unchanged, so the same refresh token keeps working until it expires.
pub fn refresh_session(codec: &TokenCodec, refresh_token: &str) -> Result<TokenPair, SessionError> {
    let principal = codec
        .validate_refresh_token(refresh_token)
        .map_err(SessionError::Rejected)?;

    let access_token = codec
        .issue_access_token(&principal.subject_id, &principal.role)
        .map_err(SessionError::Signing)?;

    tracing::debug!(subject = %principal.subject_id, role = %principal.role, "access token refreshed");

    Ok(TokenPair {
        access_token,
        refresh_token: refresh_token.to_string(),
    })
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use super::*;
    use crate::auth::{ManualClock, Role, TokenSettings};

    const T0: i64 = 1_700_000_000;

    fn codec(clock: Arc<ManualClock>) -> TokenCodec {
        TokenCodec::new(TokenSettings {
            access_secret: "access-secret".into(),
            refresh_secret: "refresh-secret".into(),
            access_ttl_secs: 1800,
            refresh_ttl_secs: 3 * 86400,
        })
        .with_clock(clock)
    }

    #[test]
    fn refresh_yields_access_token_for_same_principal() {
        let clock = Arc::new(ManualClock::new(T0));
        let codec = codec(clock.clone());
        let refresh = codec.issue_refresh_token("u1", &Role::Teacher).unwrap();

        clock.advance(2 * 3600);
        let pair = refresh_session(&codec, &refresh).unwrap();

        assert_eq!(pair.refresh_token, refresh);
        let principal = codec.validate_access_token(&pair.access_token).unwrap();
        assert_eq!(principal, Principal::new("u1", Role::Teacher));
    }

    #[test]
    fn refresh_is_repeatable_until_expiry() {
        let clock = Arc::new(ManualClock::new(T0));
        let codec = codec(clock.clone());
        let refresh = codec.issue_refresh_token("u1", &Role::Student).unwrap();

        assert!(refresh_session(&codec, &refresh).is_ok());
        assert!(refresh_session(&codec, &refresh).is_ok());

        clock.advance(3 * 86400);
        assert!(matches!(
            refresh_session(&codec, &refresh),
            Err(SessionError::Rejected(TokenError::Expired))
        ));
    }

    #[test]
    fn access_token_cannot_be_used_to_refresh() {
        let codec = codec(Arc::new(ManualClock::new(T0)));
        let access = codec.issue_access_token("u1", &Role::Admin).unwrap();
        assert!(matches!(
            refresh_session(&codec, &access),
            Err(SessionError::Rejected(TokenError::Invalid(_)))
        ));
    }

    #[test]
    fn login_pair_validates_under_matching_keys() {
        let codec = codec(Arc::new(ManualClock::new(T0)));
        let principal = Principal::new("u9", Role::Support);
        let pair = issue_session(&codec, &principal).unwrap();

        assert_eq!(codec.validate_access_token(&pair.access_token).unwrap(), principal);
        assert_eq!(codec.validate_refresh_token(&pair.refresh_token).unwrap(), principal);
    }

    #[test]
    fn pair_serializes_with_camel_case_keys() {
        let pair = TokenPair {
            access_token: "a".into(),
            refresh_token: "r".into(),
        };
        let json = serde_json::to_value(&pair).unwrap();
        assert_eq!(json["accessToken"], "a");
        assert_eq!(json["refreshToken"], "r");
    }
}
