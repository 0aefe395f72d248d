mod registry;

use axum::http::{header::AUTHORIZATION, HeaderMap};
use jsonwebtoken::{decode, DecodingKey, Validation};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::sync::Arc;
use thiserror::Error;

use crate::config::SecurityConfig;

pub use registry::{AuthRegistry, Authorization};

/// Claims carried by an API bearer token. `id` names the caller and must be
/// present; registered time claims are checked by the decoder when present.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exp: Option<u64>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub iat: Option<u64>,
}

/// Identity admitted by the gate, attached to the request extensions.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuthUser {
    pub id: String,
    pub roles: BTreeSet<String>,
}

#[derive(Debug, Error)]
pub enum AuthError {
    #[error("no Authorization header")]
    Unauthenticated,

    #[error("Authorization header is not a bearer credential")]
    MalformedCredential,

    #[error("invalid token: {0}")]
    InvalidToken(#[from] jsonwebtoken::errors::Error),

    #[error("id {0} is not authorized")]
    Forbidden(String),
}

impl AuthError {
    /// Stable name for logs; never sent to the client.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::Unauthenticated => "unauthenticated",
            AuthError::MalformedCredential => "malformed_credential",
            AuthError::InvalidToken(_) => "invalid_token",
            AuthError::Forbidden(_) => "forbidden",
        }
    }
}

/// Verifies bearer tokens and checks the claimed identity against the registry.
#[derive(Clone)]
pub struct Authorizer {
    key: DecodingKey,
    validation: Validation,
    registry: Arc<AuthRegistry>,
}

impl Authorizer {
    pub fn new(security: &SecurityConfig) -> Self {
        // Validation::new pins the accepted algorithm list to exactly this one,
        // so the token header's own `alg` is never trusted.
        let mut validation = Validation::new(security.algorithm);
        validation.required_spec_claims.clear();
        if security.require_expiry {
            validation.required_spec_claims.insert("exp".to_string());
        }
        validation.validate_nbf = true;

        Self {
            key: DecodingKey::from_secret(security.secret.as_bytes()),
            validation,
            registry: Arc::new(AuthRegistry::new(security.auths.iter().cloned())),
        }
    }

    pub fn registry(&self) -> &AuthRegistry {
        &self.registry
    }

    /// Run the full gate over a request's headers.
    pub fn authorize(&self, headers: &HeaderMap) -> Result<AuthUser, AuthError> {
        let header = match headers.get(AUTHORIZATION) {
            Some(value) => value.to_str().map_err(|_| AuthError::MalformedCredential)?,
            None => return Err(AuthError::Unauthenticated),
        };
        let token = bearer_token(header)?;
        let claims = self.verify(token)?;

        let auth = self
            .registry
            .get(&claims.id)
            .ok_or_else(|| AuthError::Forbidden(claims.id.clone()))?;

        Ok(AuthUser {
            id: auth.id.clone(),
            roles: auth.roles.clone(),
        })
    }

    /// Check the signature and time claims and decode the typed claims.
    pub fn verify(&self, token: &str) -> Result<Claims, AuthError> {
        let data = decode::<Claims>(token, &self.key, &self.validation)?;
        Ok(data.claims)
    }
}

/// Split `Bearer <token>`: exactly two whitespace separated fields with a
/// case-insensitive scheme. An empty value counts as no credential; any other
/// value, blank ones included, must parse.
fn bearer_token(header: &str) -> Result<&str, AuthError> {
    if header.is_empty() {
        return Err(AuthError::Unauthenticated);
    }
    let mut parts = header.split_whitespace();
    match (parts.next(), parts.next(), parts.next()) {
        (Some(scheme), Some(token), None) if scheme.eq_ignore_ascii_case("bearer") => Ok(token),
        _ => Err(AuthError::MalformedCredential),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::http::HeaderValue;
    use jsonwebtoken::{encode, errors::ErrorKind, Algorithm, EncodingKey, Header};
    use serde_json::json;

    const SECRET: &str = "test-secret";
    const USER: &str = "user@example.com";

    fn security() -> SecurityConfig {
        SecurityConfig {
            secret: SECRET.to_string(),
            algorithm: Algorithm::HS256,
            require_expiry: false,
            auths: vec![Authorization {
                id: USER.to_string(),
                key_digest: "digest".to_string(),
                roles: BTreeSet::from(["editor".to_string()]),
            }],
        }
    }

    fn now() -> u64 {
        chrono::Utc::now().timestamp() as u64
    }

    fn sign(alg: Algorithm, secret: &str, claims: serde_json::Value) -> String {
        encode(&Header::new(alg), &claims, &EncodingKey::from_secret(secret.as_bytes())).unwrap()
    }

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, HeaderValue::from_str(value).unwrap());
        headers
    }

    #[test]
    fn parses_bearer_header() {
        assert_eq!(bearer_token("Bearer abc").unwrap(), "abc");
        assert_eq!(bearer_token("bearer   abc ").unwrap(), "abc");
        assert_eq!(bearer_token("BEARER abc").unwrap(), "abc");
        assert!(matches!(bearer_token(""), Err(AuthError::Unauthenticated)));
        assert!(matches!(bearer_token("   "), Err(AuthError::MalformedCredential)));
        assert!(matches!(bearer_token("\t"), Err(AuthError::MalformedCredential)));
        assert!(matches!(bearer_token("Bearer"), Err(AuthError::MalformedCredential)));
        assert!(matches!(bearer_token("Basic abc"), Err(AuthError::MalformedCredential)));
        assert!(matches!(bearer_token("Bearer a b"), Err(AuthError::MalformedCredential)));
    }

    #[test]
    fn admits_registered_identity() {
        let gate = Authorizer::new(&security());
        let token = sign(Algorithm::HS256, SECRET, json!({ "id": USER, "exp": now() + 600 }));

        let user = gate.authorize(&headers(&format!("Bearer {}", token))).unwrap();
        assert_eq!(user.id, USER);
        assert!(user.roles.contains("editor"));
    }

    #[test]
    fn missing_header_is_unauthenticated() {
        let gate = Authorizer::new(&security());
        let err = gate.authorize(&HeaderMap::new()).unwrap_err();
        assert_eq!(err.kind(), "unauthenticated");
    }

    #[test]
    fn blank_header_is_malformed() {
        let gate = Authorizer::new(&security());

        let err = gate.authorize(&headers("")).unwrap_err();
        assert_eq!(err.kind(), "unauthenticated");

        let err = gate.authorize(&headers("   ")).unwrap_err();
        assert_eq!(err.kind(), "malformed_credential");
    }

    #[test]
    fn wrong_secret_is_invalid_token() {
        let gate = Authorizer::new(&security());
        let token = sign(Algorithm::HS256, "other-secret", json!({ "id": USER }));

        let err = gate.authorize(&headers(&format!("Bearer {}", token))).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn unpinned_algorithm_is_invalid_token() {
        let gate = Authorizer::new(&security());
        let token = sign(Algorithm::HS512, SECRET, json!({ "id": USER }));

        match gate.verify(&token) {
            Err(AuthError::InvalidToken(e)) => {
                assert!(matches!(e.kind(), ErrorKind::InvalidAlgorithm))
            }
            other => panic!("expected InvalidToken, got {:?}", other),
        }
    }

    #[test]
    fn unsigned_token_is_invalid_token() {
        let gate = Authorizer::new(&security());
        // {"alg":"none","typ":"JWT"} . {"id":"user@example.com"} . <empty>
        let token = "eyJhbGciOiJub25lIiwidHlwIjoiSldUIn0.eyJpZCI6InVzZXJAZXhhbXBsZS5jb20ifQ.";

        let err = gate.authorize(&headers(&format!("Bearer {}", token))).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn garbage_token_is_invalid_token() {
        let gate = Authorizer::new(&security());
        let err = gate.authorize(&headers("Bearer not.a.jwt")).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn expired_token_is_invalid_token() {
        let gate = Authorizer::new(&security());
        let token = sign(Algorithm::HS256, SECRET, json!({ "id": USER, "exp": now() - 3600 }));

        let err = gate.verify(&token).unwrap_err();
        assert!(matches!(err, AuthError::InvalidToken(_)));
    }

    #[test]
    fn expiry_is_required_when_configured() {
        let mut config = security();
        config.require_expiry = true;
        let gate = Authorizer::new(&config);

        let without = sign(Algorithm::HS256, SECRET, json!({ "id": USER }));
        assert!(matches!(gate.verify(&without), Err(AuthError::InvalidToken(_))));

        let with = sign(Algorithm::HS256, SECRET, json!({ "id": USER, "exp": now() + 600 }));
        assert_eq!(gate.verify(&with).unwrap().id, USER);
    }

    #[test]
    fn identity_claim_must_be_a_string() {
        let gate = Authorizer::new(&security());

        let missing = sign(Algorithm::HS256, SECRET, json!({ "user_id": USER }));
        assert!(matches!(gate.verify(&missing), Err(AuthError::InvalidToken(_))));

        let numeric = sign(Algorithm::HS256, SECRET, json!({ "id": 42 }));
        assert!(matches!(gate.verify(&numeric), Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn unknown_identity_is_forbidden() {
        let gate = Authorizer::new(&security());
        let token = sign(Algorithm::HS256, SECRET, json!({ "id": "stranger@example.com" }));

        match gate.authorize(&headers(&format!("Bearer {}", token))) {
            Err(AuthError::Forbidden(id)) => assert_eq!(id, "stranger@example.com"),
            other => panic!("expected Forbidden, got {:?}", other),
        }
    }
}
