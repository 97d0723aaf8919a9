//! Axum extractor for the acting user.

use axum::{
    extract::FromRequestParts,
    http::{request::Parts, HeaderMap, StatusCode},
    response::{IntoResponse, Response},
};

use propdesk_core::entities::{normalize_email, ActorContext, Role};

pub const ACTOR_EMAIL: &str = "x-actor-email";
pub const ACTOR_NAME: &str = "x-actor-name";
pub const ACTOR_ROLE: &str = "x-actor-role";
pub const ACTOR_ORGANIZATION: &str = "x-actor-organization";

/// The caller of this request, as identified by the fronting gateway.
#[derive(Debug, Clone)]
pub struct Actor(pub ActorContext);

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ActorRejection(String);

impl IntoResponse for ActorRejection {
    fn into_response(self) -> Response {
        tracing::warn!(reason = %self.0, "Rejected request without a valid actor");
        (StatusCode::UNAUTHORIZED, self.0).into_response()
    }
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn extract_actor(headers: &HeaderMap) -> Result<ActorContext, ActorRejection> {
    let email = header(headers, ACTOR_EMAIL)
        .ok_or_else(|| ActorRejection(format!("missing {ACTOR_EMAIL} header")))?;
    let email = normalize_email(email).map_err(|e| ActorRejection(e.to_string()))?;

    let role = header(headers, ACTOR_ROLE)
        .ok_or_else(|| ActorRejection(format!("missing {ACTOR_ROLE} header")))?
        .parse::<Role>()
        .map_err(|e| ActorRejection(e.to_string()))?;

    // The acting name defaults to the email when the caller has none set.
    let name = header(headers, ACTOR_NAME).unwrap_or(&email).to_string();

    let mut actor = ActorContext::new(email, name, role);
    if let Some(organization) = header(headers, ACTOR_ORGANIZATION) {
        actor = actor.with_organization(organization);
    }
    Ok(actor)
}

impl<S> FromRequestParts<S> for Actor
where
    S: Send + Sync,
{
    type Rejection = ActorRejection;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        extract_actor(&parts.headers).map(Actor)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut headers = HeaderMap::new();
        for (name, value) in pairs {
            headers.insert(*name, value.parse().unwrap());
        }
        headers
    }

    #[test]
    fn test_extract_actor_from_headers() {
        let actor = extract_actor(&headers(&[
            (ACTOR_EMAIL, " PM@Example.com "),
            (ACTOR_NAME, "Pat"),
            (ACTOR_ROLE, "property_manager"),
            (ACTOR_ORGANIZATION, "org-1"),
        ]))
        .unwrap();

        assert_eq!(actor.email, "pm@example.com");
        assert_eq!(actor.name, "Pat");
        assert_eq!(actor.role, Role::PropertyManager);
        assert_eq!(actor.organization.as_deref(), Some("org-1"));
    }

    #[test]
    fn test_name_defaults_to_email() {
        let actor = extract_actor(&headers(&[
            (ACTOR_EMAIL, "t@example.com"),
            (ACTOR_ROLE, "TENANT"),
        ]))
        .unwrap();

        assert_eq!(actor.name, "t@example.com");
        assert!(actor.organization.is_none());
    }

    #[test]
    fn test_missing_or_unknown_role_is_rejected() {
        assert!(extract_actor(&headers(&[(ACTOR_EMAIL, "t@example.com")])).is_err());
        assert!(extract_actor(&headers(&[
            (ACTOR_EMAIL, "t@example.com"),
            (ACTOR_ROLE, "landlord"),
        ]))
        .is_err());
    }
}
