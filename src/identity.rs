//! Identity/JWT verification is an external collaborator (§1): this crate
//! only defines the interface the connection gateway calls against.

use async_trait::async_trait;

use crate::protocol::UserId;

#[derive(Debug, Clone)]
pub struct VerifiedIdentity {
    pub user_id: UserId,
    pub display_name: String,
    pub avatar_seed: String,
}

#[derive(Debug, thiserror::Error)]
pub enum IdentityError {
    #[error("missing token")]
    MissingToken,
    #[error("invalid or expired token")]
    InvalidToken,
}

/// JWKS-backed JWT verification lives outside this crate; callers provide an
/// implementation of this trait (a process-lifetime cache behind the
/// interface, per §9's "global mutable caches" note, not actor-instance
/// state).
#[async_trait]
pub trait IdentityVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError>;
}

/// Accepts any non-empty token and derives identity from it. Exists for
/// tests and local development where no real identity provider is wired up.
pub struct AcceptAllVerifier;

#[async_trait]
impl IdentityVerifier for AcceptAllVerifier {
    async fn verify(&self, token: &str) -> Result<VerifiedIdentity, IdentityError> {
        if token.is_empty() {
            return Err(IdentityError::MissingToken);
        }
        Ok(VerifiedIdentity {
            user_id: UserId::new_v4(),
            display_name: format!("Player-{}", &token[..token.len().min(6)]),
            avatar_seed: token.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn empty_token_is_rejected() {
        let verifier = AcceptAllVerifier;
        assert!(matches!(
            verifier.verify("").await,
            Err(IdentityError::MissingToken)
        ));
    }
}
