use std::{
    sync::Arc,
    time::{SystemTime, UNIX_EPOCH},
};

use async_trait::async_trait;
use aws_sdk_cognitoidentityprovider::{
    config::Region,
    error::DisplayErrorContext,
    types::{AttributeType, AuthFlowType},
    Client,
};
use axum::http::StatusCode;
use base64::{engine::general_purpose, Engine};
use jsonwebtoken::{Algorithm, DecodingKey, EncodingKey, Header, Validation};
use jsonwebtokens_cognito::KeySet;
use ring::hmac;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::{
    config::AuthConfig,
    model::{CurrentUser, UserId},
};

#[derive(Debug, thiserror::Error)]
pub enum AuthError {
    #[error("missing or malformed authorization header")]
    MissingCredentials,

    #[error("invalid token: {0}")]
    InvalidToken(String),

    #[error("token carries no {0} claim")]
    MissingClaim(&'static str),

    #[error("credential login is not available in this deployment")]
    NotConfigured,

    #[error("identity provider rejected the request: {0}")]
    Provider(String),
}

impl AuthError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::MissingCredentials | Self::InvalidToken(_) | Self::MissingClaim(_) => {
                StatusCode::UNAUTHORIZED
            }
            Self::NotConfigured => StatusCode::NOT_IMPLEMENTED,
            Self::Provider(_) => StatusCode::BAD_REQUEST,
        }
    }
}

/// Turns a bearer token into the identity of the caller.
#[async_trait]
pub trait TokenVerifier: Send + Sync {
    async fn verify(&self, token: &str) -> Result<CurrentUser, AuthError>;
}

/// Verifies Cognito access tokens against the user pool's published keys.
pub struct CognitoVerifier {
    keyset: KeySet,
    client_id: String,
}

impl CognitoVerifier {
    pub fn new(region: &str, user_pool_id: &str, client_id: &str) -> Result<Self, AuthError> {
        let keyset = KeySet::new(region.to_owned(), user_pool_id.to_owned())
            .map_err(|e| AuthError::Provider(format!("{e:?}")))?;
        Ok(Self {
            keyset,
            client_id: client_id.to_owned(),
        })
    }
}

#[async_trait]
impl TokenVerifier for CognitoVerifier {
    async fn verify(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let verifier = self
            .keyset
            .new_access_token_verifier(&[self.client_id.as_str()])
            .build()
            .map_err(|e| AuthError::InvalidToken(format!("{e:?}")))?;

        let claims = self
            .keyset
            .verify(token, &verifier)
            .await
            .map_err(|e| AuthError::InvalidToken(format!("{e:?}")))?;

        let Value::Object(claims) = claims else {
            return Err(AuthError::InvalidToken("claims are not an object".into()));
        };
        let username = claims
            .get("username")
            .and_then(Value::as_str)
            .ok_or(AuthError::MissingClaim("username"))?;
        let display_name = claims
            .get("name")
            .and_then(Value::as_str)
            .map(str::to_owned);

        Ok(CurrentUser {
            user_id: UserId::new(username),
            display_name,
        })
    }
}

#[derive(Debug, Serialize, Deserialize)]
pub struct SessionClaims {
    pub sub: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    pub exp: u64,
}

/// HS256 session tokens signed with a shared secret, for running without a
/// Cognito user pool.
pub struct SharedSecretVerifier {
    encoding: EncodingKey,
    decoding: DecodingKey,
}

impl SharedSecretVerifier {
    pub fn new(secret: &[u8]) -> Self {
        Self {
            encoding: EncodingKey::from_secret(secret),
            decoding: DecodingKey::from_secret(secret),
        }
    }

    /// Signs a token for `user` that expires `ttl_secs` from now.
    pub fn issue(
        &self,
        user: &UserId,
        display_name: Option<&str>,
        ttl_secs: u64,
    ) -> Result<String, AuthError> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|elapsed| elapsed.as_secs())
            .unwrap_or_default();
        let claims = SessionClaims {
            sub: user.as_str().to_owned(),
            name: display_name.map(str::to_owned),
            exp: now + ttl_secs,
        };
        jsonwebtoken::encode(&Header::new(Algorithm::HS256), &claims, &self.encoding)
            .map_err(|e| AuthError::InvalidToken(e.to_string()))
    }
}

#[async_trait]
impl TokenVerifier for SharedSecretVerifier {
    async fn verify(&self, token: &str) -> Result<CurrentUser, AuthError> {
        let data = jsonwebtoken::decode::<SessionClaims>(
            token,
            &self.decoding,
            &Validation::new(Algorithm::HS256),
        )
        .map_err(|e| AuthError::InvalidToken(e.to_string()))?;

        if data.claims.sub.is_empty() {
            return Err(AuthError::MissingClaim("sub"));
        }
        Ok(CurrentUser {
            user_id: UserId::new(data.claims.sub),
            display_name: data.claims.name,
        })
    }
}

/// Tokens handed back by a successful credential login.
#[derive(Debug, Serialize)]
pub struct LoginTokens {
    pub access_token: String,
    pub id_token: String,
    pub refresh_token: String,
}

const NAME_ATTRIBUTE: &str = "name";

fn attribute_value<'a>(attributes: &'a [AttributeType], name: &str) -> Option<&'a str> {
    attributes
        .iter()
        .find(|attribute| attribute.name() == name)
        .and_then(AttributeType::value)
        .filter(|value| !value.is_empty())
}

/// Credential flows (sign-up, confirmation, login, sign-out) against a Cognito
/// app client that has a client secret.
pub struct CognitoClient {
    client: Client,
    client_id: String,
    client_secret: String,
}

impl CognitoClient {
    pub async fn connect(region: &str, client_id: &str, client_secret: &str) -> Self {
        let sdk_config = aws_config::defaults(aws_config::BehaviorVersion::latest())
            .region(Region::new(region.to_owned()))
            .load()
            .await;
        Self {
            client: Client::new(&sdk_config),
            client_id: client_id.to_owned(),
            client_secret: client_secret.to_owned(),
        }
    }

    fn secret_hash(&self, username: &str) -> String {
        generate_secret_hash(&self.client_secret, username, &self.client_id)
    }

    /// Returns whether the account is already confirmed.
    pub async fn sign_up(
        &self,
        username: &str,
        email: &str,
        password: &str,
        real_name: &str,
    ) -> Result<bool, AuthError> {
        let attribute = |name: &str, value: &str| {
            AttributeType::builder()
                .name(name)
                .value(value)
                .build()
                .map_err(|e| AuthError::Provider(e.to_string()))
        };

        let response = self
            .client
            .sign_up()
            .client_id(&self.client_id)
            .secret_hash(self.secret_hash(username))
            .username(username)
            .password(password)
            .user_attributes(attribute("email", email)?)
            .user_attributes(attribute(NAME_ATTRIBUTE, real_name)?)
            .send()
            .await
            .map_err(|e| AuthError::Provider(DisplayErrorContext(&e).to_string()))?;

        Ok(response.user_confirmed())
    }

    pub async fn confirm_sign_up(&self, username: &str, code: &str) -> Result<(), AuthError> {
        self.client
            .confirm_sign_up()
            .client_id(&self.client_id)
            .secret_hash(self.secret_hash(username))
            .username(username)
            .confirmation_code(code)
            .send()
            .await
            .map_err(|e| AuthError::Provider(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }

    pub async fn login(&self, username: &str, password: &str) -> Result<LoginTokens, AuthError> {
        let response = self
            .client
            .initiate_auth()
            .client_id(&self.client_id)
            .auth_flow(AuthFlowType::UserPasswordAuth)
            .auth_parameters("USERNAME", username)
            .auth_parameters("PASSWORD", password)
            .auth_parameters("SECRET_HASH", self.secret_hash(username))
            .send()
            .await
            .map_err(|e| AuthError::Provider(DisplayErrorContext(&e).to_string()))?;

        // A challenge (e.g. NEW_PASSWORD_REQUIRED) comes back without tokens.
        let result = response
            .authentication_result()
            .ok_or_else(|| AuthError::Provider("authentication challenge required".into()))?;
        let token = |value: Option<&str>, claim: &'static str| {
            value.map(str::to_owned).ok_or(AuthError::MissingClaim(claim))
        };

        Ok(LoginTokens {
            access_token: token(result.access_token(), "access_token")?,
            id_token: token(result.id_token(), "id_token")?,
            refresh_token: token(result.refresh_token(), "refresh_token")?,
        })
    }

    /// Looks up the `name` attribute of the account owning `access_token`.
    /// Access tokens never carry it as a claim.
    pub async fn display_name(&self, access_token: &str) -> Result<Option<String>, AuthError> {
        let response = self
            .client
            .get_user()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(DisplayErrorContext(&e).to_string()))?;

        Ok(attribute_value(response.user_attributes(), NAME_ATTRIBUTE).map(str::to_owned))
    }

    pub async fn sign_out(&self, access_token: &str) -> Result<(), AuthError> {
        self.client
            .global_sign_out()
            .access_token(access_token)
            .send()
            .await
            .map_err(|e| AuthError::Provider(DisplayErrorContext(&e).to_string()))?;
        Ok(())
    }
}

/// Builds the token verifier, plus the credential client when Cognito is
/// configured.
pub async fn build_identity(
    auth: &AuthConfig,
) -> Result<(Arc<dyn TokenVerifier>, Option<CognitoClient>), AuthError> {
    match auth {
        AuthConfig::Cognito {
            region,
            user_pool_id,
            client_id,
            client_secret,
        } => {
            let verifier = CognitoVerifier::new(region, user_pool_id, client_id)?;
            let client = CognitoClient::connect(region, client_id, client_secret).await;
            tracing::info!(region, user_pool_id, "using Cognito user pool");
            Ok((Arc::new(verifier), Some(client)))
        }
        AuthConfig::SharedSecret { secret } => {
            tracing::warn!("using shared-secret session tokens; credential login is disabled");
            Ok((Arc::new(SharedSecretVerifier::new(secret.as_bytes())), None))
        }
    }
}

fn generate_secret_hash(client_secret: &str, user_name: &str, client_id: &str) -> String {
    let key = hmac::Key::new(hmac::HMAC_SHA256, client_secret.as_bytes());
    let msg = [user_name.as_bytes(), client_id.as_bytes()].concat();

    let signature = hmac::sign(&key, &msg);

    general_purpose::STANDARD.encode(signature.as_ref())
}
