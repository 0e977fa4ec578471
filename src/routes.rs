use std::collections::BTreeMap;
use std::time::Duration;

use axum::{
    http::{header, HeaderValue, Method},
    routing::{get, post, MethodFilter, MethodRouter},
    Router,
};
use tower_http::{
    cors::{AllowOrigin, CorsLayer},
    trace::TraceLayer,
};

use crate::config::{AppConfig, Environment};
use crate::handlers::{
    self,
    protected::forward,
    public::{auth, notifications},
};
use crate::middleware::protect;
use crate::policy::{unreachable_routes, PolicyRule};
use crate::state::AppState;

/// Every route behind the gates, as `(verb, template)`. Each template has
/// to appear verbatim as a policy resource for some role or the route is
/// unreachable.
pub const PROTECTED_ROUTES: &[(&str, &str)] = &[
    // user
    ("POST", "/api/user/register"),
    ("GET", "/api/user/getprofile"),
    ("GET", "/api/user/all"),
    ("PUT", "/api/user/updateprofile"),
    ("PUT", "/api/user/update"),
    ("DELETE", "/api/user/delete/:id"),
    ("POST", "/api/user/photo"),
    ("DELETE", "/api/user/photo"),
    // groups
    ("POST", "/api/groups/create"),
    ("PUT", "/api/groups/update"),
    ("DELETE", "/api/groups/delete"),
    ("GET", "/api/groups/getById/:group_id"),
    ("GET", "/api/groups/getAll"),
    ("POST", "/api/groups/add-student"),
    ("DELETE", "/api/groups/delete-student"),
    ("POST", "/api/groups/add-teacher"),
    ("DELETE", "/api/groups/delete-teacher"),
    ("GET", "/api/groups/student-groups/:hh_id"),
    ("GET", "/api/groups/teacher-groups/:id"),
    ("GET", "/api/groups/students/:group_id"),
    // topics
    ("POST", "/api/topics/create"),
    ("PUT", "/api/topics/update"),
    ("DELETE", "/api/topics/delete/:topic_id"),
    ("GET", "/api/topics/getAll"),
    // subjects
    ("POST", "/api/subjects/create"),
    ("GET", "/api/subjects/get/:id"),
    ("GET", "/api/subjects/getall"),
    ("PUT", "/api/subjects/update/:id"),
    ("DELETE", "/api/subjects/delete/:id"),
    // questions
    ("POST", "/api/questions/create"),
    ("GET", "/api/questions/:id"),
    ("PUT", "/api/questions/update/:id"),
    ("DELETE", "/api/questions/delete/:id"),
    ("GET", "/api/questions/getAll"),
    ("POST", "/api/questions/upload-image/:id"),
    ("DELETE", "/api/questions/delete-image/:id"),
    // question outputs
    ("POST", "/api/question-outputs/create"),
    ("GET", "/api/question-outputs/:id"),
    ("GET", "/api/question-outputs/question/:question_id"),
    ("DELETE", "/api/question-outputs/delete/:id"),
    // question inputs
    ("POST", "/api/question-inputs/create"),
    ("GET", "/api/question-inputs/:id"),
    ("GET", "/api/question-inputs/question/:question_id"),
    ("DELETE", "/api/question-inputs/delete/:id"),
    // test cases
    ("POST", "/api/test-cases/create"),
    ("GET", "/api/test-cases/:id"),
    ("GET", "/api/test-cases/question/:question_id"),
    ("DELETE", "/api/test-cases/delete/:id"),
    // tasks
    ("POST", "/api/task/create"),
    ("DELETE", "/api/task/delete"),
    ("GET", "/api/task/get"),
];

/// Routes and gates only. Used directly by tests.
pub fn router(state: AppState) -> Router {
    let protected = protect(protected_routes(), state.codec.clone(), state.policies.clone());

    Router::new()
        .merge(public_routes())
        .merge(protected)
        .with_state(state)
}

/// The full server: [`router`] plus CORS and request tracing.
pub fn app(state: AppState, config: &AppConfig) -> Router {
    let mut app = router(state);
    if config.security.enable_cors {
        match cors_layer(config) {
            Some(cors) => app = app.layer(cors),
            None => tracing::warn!(
                "CORS is enabled but SECURITY_CORS_ORIGINS is empty; no cross-origin requests will be allowed"
            ),
        }
    }
    app.layer(TraceLayer::new_for_http())
}

fn public_routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(handlers::health))
        .route("/all/user/login", post(auth::login_post))
        .route("/all/user/refresh", post(auth::refresh_post))
        .route("/ws", get(notifications::notifications_ws))
}

fn protected_routes() -> Router<AppState> {
    let mut by_path: BTreeMap<&str, MethodRouter<AppState>> = BTreeMap::new();

    for &(verb, path) in PROTECTED_ROUTES {
        let Some(filter) = method_filter(verb) else {
            tracing::error!("Skipping {} {}: unsupported verb", verb, path);
            continue;
        };
        let methods = by_path.remove(path).unwrap_or_else(MethodRouter::new);
        by_path.insert(path, methods.on(filter, forward));
    }

    by_path
        .into_iter()
        .fold(Router::new(), |router, (path, methods)| router.route(path, methods))
}

fn method_filter(verb: &str) -> Option<MethodFilter> {
    match verb {
        "GET" => Some(MethodFilter::GET),
        "POST" => Some(MethodFilter::POST),
        "PUT" => Some(MethodFilter::PUT),
        "PATCH" => Some(MethodFilter::PATCH),
        "DELETE" => Some(MethodFilter::DELETE),
        _ => None,
    }
}

/// Permissive in development. Elsewhere only the listed origins are
/// allowed, and an empty list yields no layer at all.
fn cors_layer(config: &AppConfig) -> Option<CorsLayer> {
    if config.environment == Environment::Development {
        return Some(CorsLayer::permissive());
    }
    if config.security.cors_origins.is_empty() {
        return None;
    }

    let origins: Vec<HeaderValue> = config
        .security
        .cors_origins
        .iter()
        .filter_map(|origin| match origin.parse() {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!("Ignoring invalid CORS origin '{}'", origin);
                None
            }
        })
        .collect();

    Some(
        CorsLayer::new()
            .allow_origin(AllowOrigin::list(origins))
            .allow_methods([Method::GET, Method::POST, Method::PUT, Method::DELETE, Method::OPTIONS])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE, header::ACCEPT])
            .max_age(Duration::from_secs(24 * 60 * 60)),
    )
}

/// Log every protected route that no loaded rule grants. Returns how many
/// there were.
pub fn audit_policy(rules: &[PolicyRule]) -> usize {
    let missing = unreachable_routes(PROTECTED_ROUTES.iter().copied(), rules);
    for (verb, path) in &missing {
        tracing::warn!("{} {} is routed but no policy rule grants it to any role", verb, path);
    }
    missing.len()
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;
    use crate::policy::default_policies;

    #[test]
    fn every_route_verb_is_supported_and_unique() {
        let mut seen = HashSet::new();
        for (verb, path) in PROTECTED_ROUTES {
            assert!(method_filter(verb).is_some(), "{verb} {path}");
            assert!(seen.insert((verb, path)), "duplicate route {verb} {path}");
        }
    }

    #[test]
    fn every_default_rule_names_a_registered_route() {
        for rule in default_policies() {
            assert!(
                PROTECTED_ROUTES
                    .iter()
                    .any(|&(verb, path)| verb == rule.verb && path == rule.resource),
                "rule {rule} has no route"
            );
        }
    }

    #[test]
    fn cors_fails_closed_outside_development() {
        assert!(cors_layer(&AppConfig::development()).is_some());

        let mut production = AppConfig::production();
        assert!(cors_layer(&production).is_some());

        production.security.cors_origins.clear();
        assert!(cors_layer(&production).is_none());
    }

    #[test]
    fn only_user_delete_is_unreachable_by_default() {
        let missing = unreachable_routes(PROTECTED_ROUTES.iter().copied(), &default_policies());
        assert_eq!(missing, vec![("DELETE", "/api/user/delete/:id")]);
        assert_eq!(audit_policy(&default_policies()), 1);
    }
}
