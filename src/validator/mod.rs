use crate::types;

pub type SharedValidator = std::sync::Arc<dyn Validator>;

/// Drives a challenge from `processing` to a verdict. Implementations probe
/// the identifier over the network (HTTP-01 file fetch, TLS-ALPN-01
/// handshake); they must always resolve to a verdict so a challenge is never
/// stranded in `processing`.
#[rocket::async_trait]
pub trait Validator: Send + Sync {
    async fn validate(
        &self, challenge: &crate::acme::models::Challenge,
        identifier: &types::identifier::Identifier,
        key_authorization: &str,
    ) -> Result<(), types::error::Error>;
}

/// Accepts every challenge immediately. Stands in for a real prober in tests
/// and closed environments where proof of control is established out of band.
pub struct StaticValidator;

#[rocket::async_trait]
impl Validator for StaticValidator {
    async fn validate(
        &self, challenge: &crate::acme::models::Challenge,
        identifier: &types::identifier::Identifier,
        _key_authorization: &str,
    ) -> Result<(), types::error::Error> {
        info!(
            "Accepting {:?} challenge {} for {} without probing",
            challenge.type_, challenge.id, identifier.value
        );
        Ok(())
    }
}

/// The key authorization a client must present: the challenge token joined
/// with the account key's RFC 7638 thumbprint.
pub fn key_authorization(token: &str, account_thumbprint: &str) -> String {
    format!("{}.{}", token, account_thumbprint)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn key_authorization_joins_token_and_thumbprint() {
        assert_eq!(
            key_authorization("tok", "print"),
            "tok.print"
        );
    }
}
