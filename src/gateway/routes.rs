// Linkauth — HTTP routes
//
//   /                POST    add user               (system caller)
//   /                GET     list users             (system caller)
//   /{user}          GET     get user
//   /{user}          POST    authenticate user      (system caller)
//   /{user}          DELETE  remove user            (system caller)
//   /{user}/{field}  GET     get field (never the password)
//   /{user}/{field}  PUT     modify fields          (system caller)
//
// Every request must be application/json. Unknown paths and methods are
// plain bad requests.

use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{Path, Request, State},
    http::header,
    middleware::{self, Next},
    response::Response,
    routing::get,
    Json, Router,
};
use serde_json::{Map, Value};
use zeroize::Zeroizing;

use super::auth::SystemCaller;
use super::error::ApiError;
use crate::store::{CredentialManager, CredentialView, NewUser, UserChanges, USERNAME_FIELD};

/// Shared state handed to every handler.
#[derive(Clone)]
pub struct GatewayState {
    pub manager: Arc<CredentialManager>,
    /// Realm advertised in Basic-Auth challenges.
    pub realm: Arc<str>,
}

impl GatewayState {
    pub fn new(manager: Arc<CredentialManager>, realm: &str) -> Self {
        Self {
            manager,
            realm: Arc::from(realm),
        }
    }
}

pub fn router(state: GatewayState) -> Router {
    Router::new()
        .route("/", get(list_users).post(add_user).fallback(unknown_route))
        .route(
            "/:user",
            get(get_user)
                .post(authenticate_user)
                .delete(remove_user)
                .fallback(unknown_route),
        )
        .route(
            "/:user/:field",
            get(get_user_field).put(modify_user_field).fallback(unknown_route),
        )
        .fallback(unknown_route)
        .layer(middleware::from_fn(require_json))
        .with_state(state)
}

/// Reject anything that is not `application/json` (parameters allowed).
async fn require_json(req: Request, next: Next) -> Result<Response, ApiError> {
    let is_json = req
        .headers()
        .get(header::CONTENT_TYPE)
        .and_then(|v| v.to_str().ok())
        .map(|v| {
            v.split(';')
                .next()
                .unwrap_or_default()
                .trim()
                .eq_ignore_ascii_case("application/json")
        })
        .unwrap_or(false);

    if !is_json {
        return Err(ApiError::UnsupportedMediaType);
    }
    Ok(next.run(req).await)
}

async fn unknown_route() -> ApiError {
    ApiError::BadRequest("Bad Request".to_string())
}

fn parse_body(body: &Bytes) -> Result<Value, ApiError> {
    serde_json::from_slice(body).map_err(|e| ApiError::BadRequest(format!("Invalid JSON body: {}", e)))
}

// ─── Handlers ────────────────────────────────────────────────────────────────

async fn add_user(
    _caller: SystemCaller,
    State(state): State<GatewayState>,
    body: Bytes,
) -> Result<Json<String>, ApiError> {
    let user = NewUser::from_json(parse_body(&body)?)?;
    Ok(Json(state.manager.add(user).await?))
}

async fn list_users(
    _caller: SystemCaller,
    State(state): State<GatewayState>,
) -> Result<Json<Vec<CredentialView>>, ApiError> {
    Ok(Json(state.manager.list_users().await?))
}

async fn get_user(
    State(state): State<GatewayState>,
    Path(user): Path<String>,
) -> Result<Json<CredentialView>, ApiError> {
    state.manager.ensure_exists(&user).await?;
    let view = state
        .manager
        .get(&user)
        .await?
        .ok_or_else(|| ApiError::NotFound("User does not exist".to_string()))?;
    Ok(Json(view))
}

async fn authenticate_user(
    _caller: SystemCaller,
    State(state): State<GatewayState>,
    Path(user): Path<String>,
    body: Bytes,
) -> Result<Json<bool>, ApiError> {
    let password = match parse_body(&body)? {
        Value::String(password) => Zeroizing::new(password),
        _ => return Err(ApiError::BadRequest("Password must be a JSON string".to_string())),
    };
    Ok(Json(state.manager.authenticate(&user, &password, false).await?))
}

async fn remove_user(
    _caller: SystemCaller,
    State(state): State<GatewayState>,
    Path(user): Path<String>,
) -> Result<Json<u64>, ApiError> {
    state.manager.ensure_exists(&user).await?;
    Ok(Json(state.manager.delete(&user).await?))
}

async fn get_user_field(
    State(state): State<GatewayState>,
    Path((user, field)): Path<(String, String)>,
) -> Result<Json<String>, ApiError> {
    state.manager.ensure_exists(&user).await?;
    let value = state
        .manager
        .get_one_field(&user, &field)
        .await?
        .ok_or_else(|| ApiError::NotFound("Field does not exist".to_string()))?;
    Ok(Json(value))
}

/// The body is either an object of fields to change, or a bare JSON value
/// for `{field}` alone. The username itself can never change.
async fn modify_user_field(
    caller: SystemCaller,
    State(state): State<GatewayState>,
    Path((user, field)): Path<(String, String)>,
    body: Bytes,
) -> Result<Json<bool>, ApiError> {
    state.manager.ensure_exists(&user).await?;

    let mut fields = match parse_body(&body)? {
        Value::Object(fields) => fields,
        value => {
            let mut fields = Map::new();
            fields.insert(field, value);
            fields
        }
    };
    if fields.contains_key(USERNAME_FIELD) {
        return Err(ApiError::BadRequest("Cannot change username".to_string()));
    }
    fields.insert(USERNAME_FIELD.to_string(), Value::String(user));

    let changes = UserChanges::from_json(Value::Object(fields))?;
    tracing::debug!(caller = %caller.username, user = %changes.username, "Modifying user");
    Ok(Json(state.manager.modify(changes).await?))
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Method, Request as HttpRequest, StatusCode};
    use base64::{engine::general_purpose::STANDARD, Engine as _};
    use http_body_util::BodyExt;
    use serde_json::json;
    use tower::ServiceExt;

    use crate::messenger::mock::MockConnector;
    use crate::messenger::{Messenger, RetryPolicy, Topology};
    use crate::store::backend::memory::MemoryStore;
    use crate::store::cheap_hash;

    const REALM: &str = "Linkapp Microservices";

    struct TestApp {
        state: GatewayState,
        broker: MockConnector,
    }

    /// A gateway over an in-memory store seeded with system account
    /// `svc1:p@ss` and regular account `alice:pw`.
    async fn test_app() -> TestApp {
        let broker = MockConnector::new();
        let messenger = Messenger::open(
            Box::new(broker.clone()),
            Topology::default(),
            RetryPolicy::default(),
        )
        .await
        .unwrap();
        let manager = Arc::new(CredentialManager::new(Arc::new(MemoryStore::new()), messenger));

        manager
            .add(NewUser::new("svc1", cheap_hash("p@ss")).encrypted(true).system(true))
            .await
            .unwrap();
        manager
            .add(
                NewUser::new("alice", cheap_hash("pw"))
                    .encrypted(true)
                    .field("email", json!("alice@example.com")),
            )
            .await
            .unwrap();

        TestApp {
            state: GatewayState::new(manager, REALM),
            broker,
        }
    }

    fn basic(user: &str, password: &str) -> String {
        format!("Basic {}", STANDARD.encode(format!("{}:{}", user, password)))
    }

    fn request(method: Method, uri: &str, body: Option<Value>, auth: Option<&str>) -> Request {
        let mut builder = HttpRequest::builder()
            .method(method)
            .uri(uri)
            .header(header::CONTENT_TYPE, "application/json");
        if let Some(auth) = auth {
            builder = builder.header(header::AUTHORIZATION, auth);
        }
        let body = match body {
            Some(value) => Body::from(value.to_string()),
            None => Body::empty(),
        };
        builder.body(body).unwrap()
    }

    async fn send(app: &TestApp, req: Request) -> (StatusCode, Value) {
        let response = router(app.state.clone()).oneshot(req).await.unwrap();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        let body = if bytes.is_empty() {
            Value::Null
        } else {
            serde_json::from_slice(&bytes).unwrap()
        };
        (status, body)
    }

    #[tokio::test]
    async fn test_requires_json_content_type() {
        let app = test_app().await;
        let req = HttpRequest::builder()
            .method(Method::GET)
            .uri("/alice")
            .body(Body::empty())
            .unwrap();
        let (status, body) = send(&app, req).await;
        assert_eq!(status, StatusCode::UNSUPPORTED_MEDIA_TYPE);
        assert_eq!(body["error"]["code"], "UNSUPPORTED_MEDIA_TYPE");

        let req = HttpRequest::builder()
            .method(Method::GET)
            .uri("/alice")
            .header(header::CONTENT_TYPE, "text/plain")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::UNSUPPORTED_MEDIA_TYPE);
    }

    #[tokio::test]
    async fn test_content_type_parameters_are_allowed() {
        let app = test_app().await;
        let req = HttpRequest::builder()
            .method(Method::GET)
            .uri("/alice")
            .header(header::CONTENT_TYPE, "application/json; charset=utf-8")
            .body(Body::empty())
            .unwrap();
        assert_eq!(send(&app, req).await.0, StatusCode::OK);
    }

    #[tokio::test]
    async fn test_privileged_route_without_credentials_is_challenged() {
        let app = test_app().await;
        let response = router(app.state.clone())
            .oneshot(request(Method::GET, "/", None, None))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        assert_eq!(
            response.headers()[header::WWW_AUTHENTICATE],
            "Basic realm=\"Linkapp Microservices\""
        );
    }

    #[tokio::test]
    async fn test_non_system_account_is_unauthorized() {
        let app = test_app().await;
        let auth = basic("alice", "pw");
        let (status, _) = send(&app, request(Method::GET, "/", None, Some(&auth))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);

        let auth = basic("svc1", "wrong");
        let (status, _) = send(&app, request(Method::GET, "/", None, Some(&auth))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
    }

    #[tokio::test]
    async fn test_unknown_route_and_method_are_bad_requests() {
        let app = test_app().await;
        let auth = basic("svc1", "p@ss");

        let (status, _) = send(&app, request(Method::GET, "/a/b/c", None, None)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, request(Method::PATCH, "/alice", None, Some(&auth))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, _) = send(&app, request(Method::DELETE, "/", None, Some(&auth))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_get_user_redacts_password() {
        let app = test_app().await;
        let (status, body) = send(&app, request(Method::GET, "/alice", None, None)).await;

        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["username"], "alice");
        assert_eq!(body["email"], "alice@example.com");
        assert_eq!(body["password"], Value::Null);
        assert!(!body.to_string().contains("argon2"));
    }

    #[tokio::test]
    async fn test_missing_user_is_not_found() {
        let app = test_app().await;
        let (status, body) = send(&app, request(Method::GET, "/ghost", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "User does not exist");

        let (status, _) = send(&app, request(Method::GET, "/ghost/email", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_field_reads() {
        let app = test_app().await;

        let (status, body) = send(&app, request(Method::GET, "/alice/email", None, None)).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("alice@example.com"));

        let (status, body) = send(&app, request(Method::GET, "/alice/password", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["error"]["message"], "Field does not exist");

        let (status, _) = send(&app, request(Method::GET, "/alice/phone", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_add_user() {
        let app = test_app().await;
        let auth = basic("svc1", "p@ss");

        let new_user = json!({"username": "bob", "password": cheap_hash("pw"), "encrypted": true});
        let (status, body) = send(&app, request(Method::POST, "/", Some(new_user.clone()), Some(&auth))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!("bob"));
        assert!(app.broker.actions().contains(&"user:added".to_string()));

        let (status, body) = send(&app, request(Method::POST, "/", Some(new_user), Some(&auth))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "User already exists");
    }

    #[tokio::test]
    async fn test_add_user_validation() {
        let app = test_app().await;
        let auth = basic("svc1", "p@ss");

        let (status, body) = send(
            &app,
            request(Method::POST, "/", Some(json!({"username": "bad user", "password": "x"})), Some(&auth)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Username is invalid");

        let (status, body) = send(&app, request(Method::POST, "/", Some(json!({"username": "carol"})), Some(&auth))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert!(body["error"]["message"].as_str().unwrap().contains("password"));
    }

    #[tokio::test]
    async fn test_list_users() {
        let app = test_app().await;
        let auth = basic("svc1", "p@ss");

        let (status, body) = send(&app, request(Method::GET, "/", None, Some(&auth))).await;
        assert_eq!(status, StatusCode::OK);

        let users = body.as_array().unwrap();
        assert_eq!(users.len(), 2);
        for user in users {
            assert_eq!(user["password"], Value::Null);
        }
    }

    #[tokio::test]
    async fn test_authenticate_user() {
        let app = test_app().await;
        let auth = basic("svc1", "p@ss");

        let (status, body) = send(&app, request(Method::POST, "/alice", Some(json!("pw")), Some(&auth))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(true));

        let (_, body) = send(&app, request(Method::POST, "/alice", Some(json!("nope")), Some(&auth))).await;
        assert_eq!(body, json!(false));

        let (status, _) = send(&app, request(Method::POST, "/alice", Some(json!({"pw": 1})), Some(&auth))).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }

    #[tokio::test]
    async fn test_modify_user_field() {
        let app = test_app().await;
        let auth = basic("svc1", "p@ss");

        let (status, body) = send(
            &app,
            request(Method::PUT, "/alice/email", Some(json!("new@example.com")), Some(&auth)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(true));

        let (_, body) = send(&app, request(Method::GET, "/alice/email", None, None)).await;
        assert_eq!(body, json!("new@example.com"));

        let (status, _) = send(
            &app,
            request(Method::PUT, "/alice/team", Some(json!({"team": "ops", "floor": 3})), Some(&auth)),
        )
        .await;
        assert_eq!(status, StatusCode::OK);
        let (_, body) = send(&app, request(Method::GET, "/alice/floor", None, None)).await;
        assert_eq!(body, json!("3"));
    }

    #[tokio::test]
    async fn test_username_cannot_change() {
        let app = test_app().await;
        let auth = basic("svc1", "p@ss");

        let (status, body) = send(
            &app,
            request(Method::PUT, "/alice/username", Some(json!("mallory")), Some(&auth)),
        )
        .await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"]["message"], "Cannot change username");

        let (status, _) = send(&app, request(Method::PUT, "/ghost/email", Some(json!("x")), Some(&auth))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test]
    async fn test_remove_user() {
        let app = test_app().await;
        let auth = basic("svc1", "p@ss");

        let (status, body) = send(&app, request(Method::DELETE, "/alice", None, Some(&auth))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body, json!(1));
        assert!(app.broker.actions().contains(&"user:removed".to_string()));

        let (status, _) = send(&app, request(Method::DELETE, "/alice", None, Some(&auth))).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        let (status, _) = send(&app, request(Method::GET, "/alice", None, None)).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
    }

    #[tokio::test(start_paused = true)]
    async fn test_exhausted_broker_is_service_unavailable() {
        let app = test_app().await;
        {
            let broker = app.broker.broker();
            let mut broker = broker.lock().unwrap();
            broker.publish_failures = 1;
            broker.connect_failures = u32::MAX;
        }

        let (status, body) = send(&app, request(Method::GET, "/alice", None, None)).await;
        assert_eq!(status, StatusCode::SERVICE_UNAVAILABLE);
        assert_eq!(body["error"]["code"], "UNAVAILABLE");
    }
}
