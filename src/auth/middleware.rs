// SPDX-License-Identifier: AGPL-3.0-or-later
//
// Copyright (C) 2026 Relational Network

//! Authentication middleware for Axum.
//!
//! Layered over the protected router subtree. Runs the authentication
//! decision exactly once per request and stashes the resulting
//! [`CurrentUser`](super::authenticator::CurrentUser) in request
//! extensions, where the extractors in `extractor.rs` pick it up.
//!
//! Anonymous requests (no token, or a forgiven cookie failure) pass
//! through without a user; endpoints decide for themselves whether they
//! require one. Authentication failures short-circuit into an error
//! response before any handler runs.

use axum::{
    extract::{Request, State},
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::state::AppState;

/// Authenticate the request and attach the user to its extensions.
pub async fn authenticate_request(
    State(state): State<AppState>,
    mut request: Request,
    next: Next,
) -> Response {
    match state
        .authenticator
        .authenticate(request.method(), request.headers())
        .await
    {
        Ok(Some(user)) => {
            request.extensions_mut().insert(user);
            next.run(request).await
        }
        Ok(None) => next.run(request).await,
        Err(e) => e.into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::authenticator::CurrentUser;
    use crate::auth::claims::Claims;
    use crate::auth::decoder::{DecodeError, DecodeFuture, TokenDecoder};
    use crate::config::AuthSettings;
    use crate::storage::AuthDatabase;
    use axum::body::Body;
    use axum::http::{Request as HttpRequest, StatusCode};
    use axum::routing::get;
    use axum::{Extension, Router};
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tempfile::TempDir;
    use tower::ServiceExt;

    struct StaticDecoder {
        claims: Option<Value>,
    }

    impl TokenDecoder for StaticDecoder {
        fn decode<'a>(&'a self, _raw: &'a str) -> DecodeFuture<'a> {
            let result = match &self.claims {
                Some(value) => Ok(Claims::try_from(value.clone()).unwrap()),
                None => Err(DecodeError::Keys("verification failed".to_string())),
            };
            Box::pin(async move { result })
        }
    }

    async fn whoami(user: Option<Extension<CurrentUser>>) -> String {
        match user {
            Some(Extension(user)) => user.username().to_string(),
            None => "anonymous".to_string(),
        }
    }

    fn test_app(claims: Option<Value>, forgive: bool) -> (Router, TempDir) {
        let temp_dir = TempDir::new().unwrap();
        let db = Arc::new(AuthDatabase::open(&temp_dir.path().join("test.redb")).unwrap());
        let settings = AuthSettings {
            forgive_cookie_failures: forgive,
            ..AuthSettings::default()
        };
        let state = AppState::new(
            settings,
            Arc::new(StaticDecoder { claims }),
            db.clone(),
            db,
            None,
        );
        let app = Router::new()
            .route("/whoami", get(whoami))
            .layer(axum::middleware::from_fn_with_state(
                state.clone(),
                authenticate_request,
            ))
            .with_state(state);
        (app, temp_dir)
    }

    async fn body_string(response: axum::response::Response) -> String {
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
            .await
            .unwrap();
        String::from_utf8(bytes.to_vec()).unwrap()
    }

    #[tokio::test]
    async fn anonymous_request_passes_through() {
        let (app, _dir) = test_app(Some(json!({"preferred_username": "jdoe"})), false);

        let response = app
            .oneshot(HttpRequest::get("/whoami").body(Body::empty()).unwrap())
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }

    #[tokio::test]
    async fn valid_token_reaches_handler_with_user() {
        let (app, _dir) = test_app(Some(json!({"preferred_username": "jdoe"})), false);

        let response = app
            .oneshot(
                HttpRequest::get("/whoami")
                    .header("Authorization", "Bearer tok")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "jdoe");
    }

    #[tokio::test]
    async fn invalid_token_short_circuits_with_401() {
        let (app, _dir) = test_app(None, false);

        let response = app
            .oneshot(
                HttpRequest::get("/whoami")
                    .header("Authorization", "Bearer bad")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        let body = body_string(response).await;
        assert!(body.contains("invalid_token"));
        assert!(
            !body.contains("verification failed"),
            "Decode detail must not leak into the response"
        );
    }

    #[tokio::test]
    async fn forgiven_cookie_failure_passes_as_anonymous() {
        let (app, _dir) = test_app(None, true);

        let response = app
            .oneshot(
                HttpRequest::get("/whoami")
                    .header("Cookie", "auth_token=bad")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(body_string(response).await, "anonymous");
    }
}
