//! Login, registration and the current user.

use credentials::{CredentialProvider, SecretString};
use log::*;
use serde::Serialize;

use crate::client::ApiClient;
use crate::error::Error;
use crate::models::{AuthSession, User};

#[derive(Serialize)]
struct LoginRequest<'a> {
    email: &'a str,
    password: &'a str,
}

#[derive(Serialize)]
struct RegisterRequest<'a> {
    name: &'a str,
    email: &'a str,
    password: &'a str,
}

impl ApiClient {
    /// Authenticate and persist the returned token and user record.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession, Error> {
        let session: AuthSession = self
            .post("/auth/login", &LoginRequest { email, password })
            .await?;
        self.store_session(&session)?;
        info!("Logged in as {}", session.user.name);
        Ok(session)
    }

    /// Create an account, then persist its token and user record like a login.
    pub async fn register(
        &self,
        name: &str,
        email: &str,
        password: &str,
    ) -> Result<AuthSession, Error> {
        let session: AuthSession = self
            .post(
                "/auth/register",
                &RegisterRequest {
                    name,
                    email,
                    password,
                },
            )
            .await?;
        self.store_session(&session)?;
        info!("Registered and logged in as {}", session.user.name);
        Ok(session)
    }

    pub async fn current_user(&self) -> Result<User, Error> {
        self.get("/auth/me").await
    }

    /// Forget the stored token and user.
    pub fn logout(&self) -> Result<(), Error> {
        self.credentials().clear()?;
        Ok(())
    }

    fn store_session(&self, session: &AuthSession) -> Result<(), Error> {
        let credentials = self.credentials();
        credentials.set_token(SecretString::new(session.token.clone()))?;
        credentials.set_user(serde_json::to_value(&session.user)?)?;
        Ok(())
    }
}
