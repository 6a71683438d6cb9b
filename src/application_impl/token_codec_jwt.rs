use crate::application_impl::TokenConfig;
use crate::application_port::*;
use crate::domain_model::*;
use chrono::{DateTime, Duration, Utc};
use jsonwebtoken::errors::ErrorKind;
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation, decode, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, Serialize, Deserialize)]
struct AccessJwtClaims {
    sub: String, // user id as decimal string
    role: Role,
    iat: i64,
    exp: i64,
    jti: String,
}

#[derive(Debug, Serialize, Deserialize)]
struct RefreshJwtClaims {
    sub: String,
    iat: i64,
    exp: i64,
    jti: String,
}

struct KeyPair {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl KeyPair {
    fn from_secret(secret: &[u8]) -> Self {
        KeyPair {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }
}

/// HS256-only codec. Expiry is checked against the caller's `now`, never the
/// wall clock, so jsonwebtoken's own `exp` validation is switched off.
pub struct JwtHs256Codec {
    access_ttl: Duration,
    refresh_ttl: Duration,
    access_keys: KeyPair,
    refresh_keys: KeyPair,
    validation: Validation,
}

impl JwtHs256Codec {
    pub fn new(cfg: &TokenConfig) -> Result<Self, CodecError> {
        let access_ttl =
            Duration::from_std(cfg.access_ttl).map_err(|e| CodecError::Signing(e.to_string()))?;
        let refresh_ttl =
            Duration::from_std(cfg.refresh_ttl).map_err(|e| CodecError::Signing(e.to_string()))?;

        let mut validation = Validation::new(Algorithm::HS256);
        validation.validate_exp = false;
        validation.validate_aud = false;
        validation.leeway = 0;
        validation.required_spec_claims = ["exp", "iat", "sub"]
            .into_iter()
            .map(String::from)
            .collect();

        Ok(JwtHs256Codec {
            access_ttl,
            refresh_ttl,
            access_keys: KeyPair::from_secret(&cfg.access_secret),
            refresh_keys: KeyPair::from_secret(&cfg.refresh_secret),
            validation,
        })
    }

    #[inline]
    fn gen_jti() -> String {
        uuid::Uuid::new_v4().to_string()
    }

    #[inline]
    fn parse_user_id(sub: &str) -> Result<UserId, CodecError> {
        sub.parse::<UserId>().map_err(|_| CodecError::Malformed)
    }

    #[inline]
    fn timestamp(secs: i64) -> Result<DateTime<Utc>, CodecError> {
        DateTime::from_timestamp(secs, 0).ok_or(CodecError::Malformed)
    }

    fn sign<T: Serialize>(claims: &T, key: &EncodingKey) -> Result<String, CodecError> {
        encode(&Header::new(Algorithm::HS256), claims, key)
            .map_err(|e| CodecError::Signing(e.to_string()))
    }

    fn map_decode_error(err: jsonwebtoken::errors::Error) -> CodecError {
        match err.kind() {
            // a foreign `alg` in the header is a forgery attempt, not a parse problem
            ErrorKind::InvalidSignature | ErrorKind::InvalidAlgorithm => {
                CodecError::InvalidSignature
            }
            ErrorKind::ExpiredSignature => CodecError::Expired,
            _ => CodecError::Malformed,
        }
    }
}

impl TokenCodec for JwtHs256Codec {
    fn issue_access(
        &self,
        subject: UserId,
        role: Role,
        now: DateTime<Utc>,
    ) -> Result<(AccessToken, AccessClaims), CodecError> {
        let iat = now.timestamp();
        let exp = (now + self.access_ttl).timestamp();
        let claims = AccessJwtClaims {
            sub: subject.to_string(),
            role,
            iat,
            exp,
            jti: Self::gen_jti(),
        };
        let token = Self::sign(&claims, &self.access_keys.encoding)?;
        Ok((
            AccessToken(token),
            AccessClaims {
                subject,
                role,
                issued_at: Self::timestamp(iat)?,
                expires_at: Self::timestamp(exp)?,
                jti: claims.jti,
            },
        ))
    }

    fn issue_refresh(
        &self,
        subject: UserId,
        now: DateTime<Utc>,
    ) -> Result<(RefreshToken, RefreshClaims), CodecError> {
        let iat = now.timestamp();
        let exp = (now + self.refresh_ttl).timestamp();
        let claims = RefreshJwtClaims {
            sub: subject.to_string(),
            iat,
            exp,
            jti: Self::gen_jti(),
        };
        let token = Self::sign(&claims, &self.refresh_keys.encoding)?;
        Ok((
            RefreshToken(token),
            RefreshClaims {
                subject,
                issued_at: Self::timestamp(iat)?,
                expires_at: Self::timestamp(exp)?,
                jti: claims.jti,
            },
        ))
    }

    fn inspect_access(&self, token: &str) -> Result<AccessClaims, CodecError> {
        let data = decode::<AccessJwtClaims>(token, &self.access_keys.decoding, &self.validation)
            .map_err(Self::map_decode_error)?;
        let claims = data.claims;
        Ok(AccessClaims {
            subject: Self::parse_user_id(&claims.sub)?,
            role: claims.role,
            issued_at: Self::timestamp(claims.iat)?,
            expires_at: Self::timestamp(claims.exp)?,
            jti: claims.jti,
        })
    }

    fn inspect_refresh(&self, token: &str) -> Result<RefreshClaims, CodecError> {
        let data =
            decode::<RefreshJwtClaims>(token, &self.refresh_keys.decoding, &self.validation)
                .map_err(Self::map_decode_error)?;
        let claims = data.claims;
        Ok(RefreshClaims {
            subject: Self::parse_user_id(&claims.sub)?,
            issued_at: Self::timestamp(claims.iat)?,
            expires_at: Self::timestamp(claims.exp)?,
            jti: claims.jti,
        })
    }
}
