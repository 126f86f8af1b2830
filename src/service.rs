//! Account-assignment service types
//!
//! The cloud side hands out service accounts over an HTTPS JSON endpoint.
//! This core never talks to it directly; it only understands the reply
//! shape and persists whatever credential it is given.

use serde::Deserialize;

use crate::error::Error;

/// An account to persist into Cursor's auth stores. Supplied externally,
/// never generated locally.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AccountCredential {
    pub email: String,
    pub token: String,
}

/// Reply shape of the assignment endpoint:
/// `{"serviceAccount": {"email": ..., "token": ... | null}}`
#[derive(Debug, Deserialize)]
struct AssignmentResponse {
    #[serde(rename = "serviceAccount")]
    service_account: ServiceAccount,
}

#[derive(Debug, Deserialize)]
struct ServiceAccount {
    email: String,
    token: Option<String>,
}

impl AccountCredential {
    /// Parse an assignment reply document. A missing or null token is a
    /// hard failure; an account without a token cannot be switched to.
    pub fn from_assignment_response(body: &str) -> anyhow::Result<Self> {
        let response: AssignmentResponse =
            serde_json::from_str(body).map_err(anyhow::Error::from)?;
        let token = response
            .service_account
            .token
            .filter(|t| !t.is_empty())
            .ok_or(Error::NoTokenAvailable)?;
        Ok(Self {
            email: response.service_account.email,
            token,
        })
    }
}
