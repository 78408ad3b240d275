use std::sync::Arc;

use axum::{
    extract::State,
    http::{self, HeaderMap, Request},
    middleware::Next,
    response::Response,
};

use crate::{auth::AuthError, error::AppError, model::AccessToken, AppState};

/// Rejects the request unless it carries a valid bearer token, and otherwise
/// hands the caller's identity to the handler as a `CurrentUser` extension.
pub async fn mw_require_auth<B>(
    State(data): State<Arc<AppState>>,
    mut request: Request<B>,
    next: Next<B>,
) -> Result<Response, AppError> {
    let token = bearer_token(request.headers())
        .ok_or(AuthError::MissingCredentials)?
        .to_owned();

    let current_user = match data.verifier.verify(&token).await {
        Ok(current_user) => current_user,
        Err(err) => {
            tracing::warn!(error = %err, "rejected request token");
            return Err(err.into());
        }
    };

    request.extensions_mut().insert(current_user);
    request.extensions_mut().insert(AccessToken(token));

    Ok(next.run(request).await)
}

fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    let header = headers
        .get(http::header::AUTHORIZATION)
        .and_then(|header| header.to_str().ok())?
        .trim();
    // Either "<scheme> <token>" with the bearer scheme, or a bare token.
    let token = match header.split_once(char::is_whitespace) {
        Some((scheme, rest)) if scheme.eq_ignore_ascii_case("bearer") => rest.trim_start(),
        Some(_) => return None,
        None if header.eq_ignore_ascii_case("bearer") => return None,
        None => header,
    };
    (!token.is_empty()).then_some(token)
}

#[cfg(test)]
mod tests {
    use axum::http::HeaderValue;

    use super::*;

    fn headers(value: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            http::header::AUTHORIZATION,
            HeaderValue::from_str(value).unwrap(),
        );
        headers
    }

    #[test]
    fn accepts_bearer_and_bare_tokens() {
        assert_eq!(bearer_token(&headers("Bearer abc.def")), Some("abc.def"));
        assert_eq!(bearer_token(&headers("abc.def")), Some("abc.def"));
    }

    #[test]
    fn missing_or_empty_is_none() {
        assert_eq!(bearer_token(&HeaderMap::new()), None);
        assert_eq!(bearer_token(&headers("Bearer ")), None);
        assert_eq!(bearer_token(&headers("   ")), None);
    }

    #[test]
    fn scheme_must_be_followed_by_whitespace() {
        assert_eq!(bearer_token(&headers("Bearerxyz")), Some("Bearerxyz"));
        assert_eq!(bearer_token(&headers("bearer\txyz")), Some("xyz"));
        assert_eq!(bearer_token(&headers("Basic dXNlcjpwdw==")), None);
    }
}
