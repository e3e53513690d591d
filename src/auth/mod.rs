//! Gateway authorization with RS256 JWTs
//!
//! [`AuthClient`] verifies bearer tokens against keys supplied by a
//! [`KeyEngine`] and yields the caller's [`Principal`]. The HTTP layer uses
//! it as middleware; [`policy_document`] renders the allow-policy expected by
//! an API gateway authorizer.

pub mod client;
pub mod keys;

pub use client::AuthClient;
pub use keys::{JwksKeyEngine, KeyEngine, StaticKeyEngine};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Authorization failures
#[derive(Error, Debug)]
pub enum AuthError {
    #[error("the token was not encoded with an expected algorithm")]
    IncorrectAlgorithm,

    #[error("the token was invalid")]
    InvalidToken,

    #[error("the token could not be verified")]
    VerificationFailed,

    #[error("no signing key with id '{0}'")]
    KeyNotFound(String),

    #[error("failed to fetch signing keys: {0}")]
    KeyFetch(String),
}

/// Result type for authorization
pub type Result<T> = std::result::Result<T, AuthError>;

/// The verified caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Principal {
    pub scope: String,
    pub user_id: String,
}

/// Allow-policy for `resource`, keyed to the principal's user id
pub fn policy_document(principal: &Principal, resource: &str) -> serde_json::Value {
    serde_json::json!({
        "context": { "scope": principal.scope },
        "policyDocument": {
            "Statement": [
                {
                    "Action": "execute-api:Invoke",
                    "Effect": "Allow",
                    "Resource": resource,
                }
            ],
            "Version": "2012-10-17",
        },
        "principalId": principal.user_id,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_policy_document_allows_resource() {
        let principal = Principal {
            scope: "entries:write".to_string(),
            user_id: "u1".to_string(),
        };
        let policy = policy_document(&principal, "arn:aws:execute-api:us-east-2:1:api/*");

        assert_eq!(policy["principalId"], "u1");
        assert_eq!(policy["context"]["scope"], "entries:write");
        assert_eq!(policy["policyDocument"]["Version"], "2012-10-17");
        let statement = &policy["policyDocument"]["Statement"][0];
        assert_eq!(statement["Effect"], "Allow");
        assert_eq!(statement["Action"], "execute-api:Invoke");
        assert_eq!(statement["Resource"], "arn:aws:execute-api:us-east-2:1:api/*");
    }
}
