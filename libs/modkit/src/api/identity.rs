//! Caller identity and the row constraints that scope every queryset.
//!
//! Tokens are resolved once per request by [`token_auth`] and stored in the
//! request extensions; handlers read them back through the [`Identity`]
//! extractor. Requests without a token are anonymous and unrestricted.

use std::collections::{BTreeMap, HashMap};
use std::convert::Infallible;
use std::sync::Arc;

use axum::{
    extract::{FromRequestParts, Request, State},
    http::request::Parts,
    middleware::Next,
    response::{IntoResponse, Response},
};

use crate::api::problem::forbidden;
use crate::viewset::ContentType;

/// Attribute -> allowed values. A row conforms when every attribute holds
/// one of its listed values.
pub type ObjectConstraint = BTreeMap<String, Vec<serde_json::Value>>;

#[derive(Debug, Clone, Default)]
pub struct Identity {
    user: Option<String>,
    /// Object type label ("tenancy.tenant") -> constraint.
    constraints: BTreeMap<String, ObjectConstraint>,
}

impl Identity {
    pub fn anonymous() -> Self {
        Self::default()
    }

    pub fn user(name: impl Into<String>) -> Self {
        Self {
            user: Some(name.into()),
            constraints: BTreeMap::new(),
        }
    }

    pub fn with_constraint(mut self, object_type: &str, constraint: ObjectConstraint) -> Self {
        self.constraints.insert(object_type.to_string(), constraint);
        self
    }

    /// Name recorded in the change log; empty for anonymous callers.
    pub fn username(&self) -> &str {
        self.user.as_deref().unwrap_or("")
    }

    pub fn constraint_for(&self, content_type: &ContentType) -> Option<&ObjectConstraint> {
        self.constraints.get(&content_type.label())
    }
}

impl<S: Send + Sync> FromRequestParts<S> for Identity {
    type Rejection = Infallible;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        Ok(parts
            .extensions
            .get::<Identity>()
            .cloned()
            .unwrap_or_default())
    }
}

/// Static token table built from configuration.
#[derive(Debug, Default)]
pub struct TokenRegistry {
    tokens: HashMap<String, Identity>,
}

impl TokenRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: impl Into<String>, identity: Identity) {
        self.tokens.insert(key.into(), identity);
    }

    pub fn resolve(&self, key: &str) -> Option<&Identity> {
        self.tokens.get(key)
    }

    pub fn len(&self) -> usize {
        self.tokens.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tokens.is_empty()
    }
}

fn token_from_header(value: &str) -> Option<&str> {
    let (scheme, key) = value.trim().split_once(' ')?;
    scheme
        .eq_ignore_ascii_case("token")
        .then_some(key.trim())
        .filter(|k| !k.is_empty())
}

/// Middleware: `Authorization: Token <key>` -> [`Identity`] in extensions.
pub async fn token_auth(
    State(registry): State<Arc<TokenRegistry>>,
    mut req: Request,
    next: Next,
) -> Response {
    let header = req
        .headers()
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .map(str::to_owned);

    let identity = match header {
        None => Identity::anonymous(),
        Some(raw) => match token_from_header(&raw).and_then(|k| registry.resolve(k)) {
            Some(identity) => identity.clone(),
            None => {
                tracing::debug!("rejecting request with an invalid token");
                let mut problem = forbidden("Invalid token");
                problem.0.instance = req.uri().path().to_string();
                return problem.into_response();
            }
        },
    };

    req.extensions_mut().insert(identity);
    next.run(req).await
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::{body::Body, http::StatusCode, middleware, routing::get, Router};
    use tower::ServiceExt;

    async fn whoami(identity: Identity) -> String {
        identity.username().to_string()
    }

    fn app() -> Router {
        let mut registry = TokenRegistry::new();
        registry.insert("s3cret", Identity::user("alice"));
        Router::new()
            .route("/whoami", get(whoami))
            .layer(middleware::from_fn_with_state(Arc::new(registry), token_auth))
    }

    async fn call(auth: Option<&str>) -> (StatusCode, String) {
        let mut req = axum::http::Request::builder().uri("/whoami");
        if let Some(a) = auth {
            req = req.header("authorization", a);
        }
        let resp = app()
            .oneshot(req.body(Body::empty()).unwrap())
            .await
            .unwrap();
        let status = resp.status();
        let body = axum::body::to_bytes(resp.into_body(), usize::MAX)
            .await
            .unwrap();
        (status, String::from_utf8(body.to_vec()).unwrap())
    }

    #[tokio::test]
    async fn anonymous_without_header() {
        assert_eq!(call(None).await, (StatusCode::OK, String::new()));
    }

    #[tokio::test]
    async fn known_token_resolves_user() {
        assert_eq!(
            call(Some("Token s3cret")).await,
            (StatusCode::OK, "alice".to_string())
        );
    }

    #[tokio::test]
    async fn unknown_token_is_forbidden() {
        let (status, body) = call(Some("Token nope")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
        assert!(body.contains("Invalid token"));
        let (status, _) = call(Some("Bearer s3cret")).await;
        assert_eq!(status, StatusCode::FORBIDDEN);
    }

    #[test]
    fn constraint_lookup_by_label() {
        let ct = ContentType::new("tenancy", "tenant");
        let id = Identity::user("bob").with_constraint(
            "tenancy.tenant",
            BTreeMap::from([("group_id".to_string(), vec![serde_json::json!(7)])]),
        );
        assert!(id.constraint_for(&ct).is_some());
        assert!(id
            .constraint_for(&ContentType::new("tenancy", "tenantgroup"))
            .is_none());
    }
}
