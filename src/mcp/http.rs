use crate::config::HttpServerConfig;
use crate::error::{KinshipError, Result};
use crate::mcp::server::McpServer;
use crate::mcp::types::*;
use crate::service::KinshipService;
use axum::{
    extract::State,
    http::{HeaderMap, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::cors::{AllowOrigin, Any, CorsLayer};
use tower_http::trace::TraceLayer;

/// HTTP transport for the MCP server: JSON-RPC over `POST /mcp`.
pub struct HttpMcpServer {
    server: Arc<McpServer>,
    api_key: String,
    allowed_origins: Vec<String>,
    authless: bool,
}

impl HttpMcpServer {
    /// The API key is read from the environment variable named in the
    /// config unless the server runs authless.
    pub fn new(service: KinshipService, config: &HttpServerConfig) -> Result<Self> {
        let api_key = if config.authless {
            String::new()
        } else {
            std::env::var(&config.api_key_env).map_err(|_| {
                KinshipError::Config(format!(
                    "Environment variable {} not set. Set it in your .env file or enable authless mode.",
                    config.api_key_env
                ))
            })?
        };

        Ok(Self {
            server: Arc::new(McpServer::new(service)),
            api_key,
            allowed_origins: config.allowed_origins.clone(),
            authless: config.authless,
        })
    }

    pub async fn run(&self, port: u16) -> Result<()> {
        let addr = format!("127.0.0.1:{}", port);
        let listener = tokio::net::TcpListener::bind(&addr).await.map_err(|e| {
            KinshipError::Io(std::io::Error::new(
                e.kind(),
                format!("Failed to bind to {}: {}. Set http_server.port in config.toml to use another port.", addr, e),
            ))
        })?;

        log::info!("Starting HTTP MCP server on http://{}", addr);
        log::info!("MCP endpoint: http://{}/mcp", addr);
        if self.authless {
            log::warn!("Authless mode: requests are not authenticated");
        }

        axum::serve(listener, self.router()).await?;
        Ok(())
    }

    fn router(&self) -> Router {
        let cors = if self.allowed_origins.is_empty() {
            CorsLayer::new().allow_origin(Any).allow_methods(Any).allow_headers(Any)
        } else {
            let origins: Vec<HeaderValue> =
                self.allowed_origins.iter().filter_map(|o| o.parse().ok()).collect();
            CorsLayer::new()
                .allow_origin(AllowOrigin::list(origins))
                .allow_methods(Any)
                .allow_headers(Any)
        };

        Router::new()
            .route("/mcp", post(handle_post))
            .route("/health", get(handle_health))
            .layer(ServiceBuilder::new().layer(TraceLayer::new_for_http()).layer(cors))
            .with_state(AppState {
                server: Arc::clone(&self.server),
                api_key: self.api_key.clone(),
                allowed_origins: self.allowed_origins.clone(),
                authless: self.authless,
            })
    }
}

#[derive(Clone)]
struct AppState {
    server: Arc<McpServer>,
    api_key: String,
    allowed_origins: Vec<String>,
    authless: bool,
}

/// Each POST is independent; there is no per-connection session.
async fn handle_post(State(state): State<AppState>, headers: HeaderMap, body: axum::body::Bytes) -> Response {
    if !state.authless {
        if let Err(response) = validate_auth(&headers, &state.api_key) {
            return response;
        }
        if let Err(response) = validate_origin(&headers, &state.allowed_origins) {
            return response;
        }
    }

    let request: JsonRpcRequest = match serde_json::from_slice(&body) {
        Ok(r) => r,
        Err(e) => {
            let response = JsonRpcResponse::error(
                serde_json::Value::Null,
                error_codes::PARSE_ERROR,
                format!("Parse error: {}", e),
                None,
            );
            return (StatusCode::BAD_REQUEST, Json(response)).into_response();
        }
    };

    let mut initialized = false;
    match state.server.process_mcp_request(request, &mut initialized).await {
        Ok(Some(response)) => (StatusCode::OK, Json(response)).into_response(),
        Ok(None) => StatusCode::ACCEPTED.into_response(),
        Err(e) => {
            log::error!("Error processing MCP request: {}", e);
            (
                StatusCode::INTERNAL_SERVER_ERROR,
                Json(serde_json::json!({
                    "error": "Internal server error",
                    "details": e.to_string()
                })),
            )
                .into_response()
        }
    }
}

async fn handle_health() -> Response {
    (
        StatusCode::OK,
        Json(serde_json::json!({
            "status": "ok",
            "service": "kinship",
            "version": env!("CARGO_PKG_VERSION")
        })),
    )
        .into_response()
}

fn unauthorized(error: &str) -> Response {
    (
        StatusCode::UNAUTHORIZED,
        Json(serde_json::json!({
            "error": error,
            "message": "Use 'Authorization: Bearer <api-key>' header"
        })),
    )
        .into_response()
}

/// Require `Authorization: Bearer <key>` matching the configured key.
fn validate_auth(headers: &HeaderMap, expected_key: &str) -> std::result::Result<(), Response> {
    let auth_header = headers
        .get("authorization")
        .and_then(|h| h.to_str().ok())
        .ok_or_else(|| unauthorized("Missing Authorization header"))?;

    let provided_key = auth_header
        .strip_prefix("Bearer ")
        .ok_or_else(|| unauthorized("Invalid Authorization header format"))?;

    if expected_key.is_empty() || provided_key != expected_key {
        return Err(unauthorized("Invalid API key"));
    }
    Ok(())
}

/// Reject browser requests from origins outside the allow list. Requests
/// without an Origin header, and every request when the list is empty, pass.
fn validate_origin(headers: &HeaderMap, allowed_origins: &[String]) -> std::result::Result<(), Response> {
    if allowed_origins.is_empty() {
        return Ok(());
    }
    let Some(origin) = headers.get("origin").and_then(|h| h.to_str().ok()) else {
        return Ok(());
    };

    if allowed_origins.iter().any(|allowed| origin == allowed) {
        Ok(())
    } else {
        Err((
            StatusCode::FORBIDDEN,
            Json(serde_json::json!({
                "error": "Origin not allowed",
                "message": format!("Origin '{}' is not in the allowed origins list", origin)
            })),
        )
            .into_response())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn headers(pairs: &[(&'static str, &str)]) -> HeaderMap {
        let mut map = HeaderMap::new();
        for (name, value) in pairs {
            map.insert(*name, HeaderValue::from_str(value).unwrap());
        }
        map
    }

    #[test]
    fn test_validate_auth() {
        assert!(validate_auth(&headers(&[("authorization", "Bearer s3cret")]), "s3cret").is_ok());

        let missing = validate_auth(&HeaderMap::new(), "s3cret").unwrap_err();
        assert_eq!(missing.status(), StatusCode::UNAUTHORIZED);

        let basic = validate_auth(&headers(&[("authorization", "Basic s3cret")]), "s3cret").unwrap_err();
        assert_eq!(basic.status(), StatusCode::UNAUTHORIZED);

        let wrong = validate_auth(&headers(&[("authorization", "Bearer nope")]), "s3cret").unwrap_err();
        assert_eq!(wrong.status(), StatusCode::UNAUTHORIZED);
    }

    #[test]
    fn test_validate_origin() {
        let allowed = vec!["https://family.example".to_string()];

        assert!(validate_origin(&headers(&[("origin", "https://evil.example")]), &[]).is_ok());
        assert!(validate_origin(&HeaderMap::new(), &allowed).is_ok());
        assert!(validate_origin(&headers(&[("origin", "https://family.example")]), &allowed).is_ok());

        let rejected = validate_origin(&headers(&[("origin", "https://evil.example")]), &allowed).unwrap_err();
        assert_eq!(rejected.status(), StatusCode::FORBIDDEN);
    }

    #[tokio::test]
    async fn test_new_requires_api_key_unless_authless() {
        let (db, _dir) = crate::db::test_support::migrated_db().await;
        let service = KinshipService::new(db, crate::config::TraversalConfig::default());

        let config = HttpServerConfig {
            api_key_env: "KINSHIP_TEST_KEY_THAT_IS_NEVER_SET".to_string(),
            ..HttpServerConfig::default()
        };
        assert!(matches!(HttpMcpServer::new(service.clone(), &config), Err(KinshipError::Config(_))));

        let authless = HttpServerConfig { authless: true, ..config };
        let server = HttpMcpServer::new(service, &authless).unwrap();
        assert!(server.api_key.is_empty());
    }
}
