use crate::error::{KinshipError, Result};
use crate::mcp::tools;
use crate::mcp::types::*;
use crate::service::KinshipService;
use serde_json::Value;
use tokio::io::{AsyncBufReadExt, AsyncWriteExt, BufReader as AsyncBufReader};

const PROTOCOL_VERSION: &str = "2024-11-05";

/// MCP Server implementation
pub struct McpServer {
    service: KinshipService,
}

impl McpServer {
    pub fn new(service: KinshipService) -> Self {
        Self { service }
    }

    /// Process one JSON-RPC request from either transport.
    ///
    /// Returns `Ok(None)` for notifications. Handler failures are turned into
    /// JSON-RPC error responses here, so callers only see transport errors.
    pub async fn process_mcp_request(
        &self,
        request: JsonRpcRequest,
        initialized: &mut bool,
    ) -> Result<Option<JsonRpcResponse>> {
        let id = match &request.id {
            Some(id) => id.clone(),
            None => {
                if request.method == "notifications/initialized" {
                    *initialized = true;
                }
                return Ok(None);
            }
        };

        let response = match request.method.as_str() {
            "initialize" => self.handle_initialize(&id, &request.params),
            "tools/list" => self.handle_tools_list(&id),
            "tools/call" => self.handle_tools_call(&id, &request.params).await,
            "ping" | "shutdown" => Ok(JsonRpcResponse::success(id.clone(), Value::Null)),
            _ => Ok(JsonRpcResponse::error(
                id.clone(),
                error_codes::METHOD_NOT_FOUND,
                format!("Unknown method: {}", request.method),
                None,
            )),
        };

        Ok(Some(response.unwrap_or_else(|e| error_response(id, e))))
    }

    /// Run the MCP server (reads from stdin, writes to stdout)
    pub async fn run(&mut self) -> Result<()> {
        let stdin = tokio::io::stdin();
        let mut stdin_reader = AsyncBufReader::new(stdin);
        let mut stdout = tokio::io::stdout();

        let mut line = String::new();
        let mut initialized = false;

        // stdout carries protocol messages only; logs go to stderr.
        log::info!("Kinship MCP server v{} starting", env!("CARGO_PKG_VERSION"));

        loop {
            line.clear();
            let bytes_read = stdin_reader.read_line(&mut line).await?;

            // EOF - client disconnected
            if bytes_read == 0 {
                break;
            }

            let trimmed = line.trim();
            if trimmed.is_empty() {
                continue;
            }

            let request: JsonRpcRequest = match serde_json::from_str(trimmed) {
                Ok(req) => req,
                Err(e) => {
                    if let Some(id) = extract_id_from_line(trimmed) {
                        let error_response = JsonRpcResponse::error(
                            id,
                            error_codes::PARSE_ERROR,
                            format!("Parse error: {}", e),
                            None,
                        );
                        send_response(&mut stdout, &error_response).await?;
                    } else {
                        log::warn!("Dropping unparseable message: {}", e);
                    }
                    continue;
                }
            };

            let was_initialized = initialized;
            match self.process_mcp_request(request, &mut initialized).await {
                Ok(Some(response)) => send_response(&mut stdout, &response).await?,
                Ok(None) => {
                    if initialized && !was_initialized {
                        log::info!("Client initialized");
                    }
                }
                Err(e) => log::error!("Unexpected error in process_mcp_request: {}", e),
            }
        }

        log::info!("MCP server shutting down");
        Ok(())
    }

    fn handle_initialize(&self, id: &JsonRpcId, params: &Option<Value>) -> Result<JsonRpcResponse> {
        let params: InitializeParams =
            serde_json::from_value(params.clone().unwrap_or(serde_json::json!({})))
                .map_err(|e| KinshipError::McpProtocol(format!("Invalid initialize params: {}", e)))?;

        if let Some(client) = &params.client_info {
            log::info!("Initialize from {} (protocol {})", client, params.protocol_version);
        }

        // Dated 2024/2025 revisions all negotiate down to the stable one.
        let protocol_version = if params.protocol_version.starts_with("2024")
            || params.protocol_version.starts_with("2025")
        {
            PROTOCOL_VERSION.to_string()
        } else {
            params.protocol_version.clone()
        };

        let result = InitializeResult {
            protocol_version,
            capabilities: serde_json::json!({ "tools": {} }),
            server_info: ServerInfo {
                name: "kinship".to_string(),
                version: env!("CARGO_PKG_VERSION").to_string(),
            },
        };

        Ok(JsonRpcResponse::success(id.clone(), serde_json::to_value(&result)?))
    }

    fn handle_tools_list(&self, id: &JsonRpcId) -> Result<JsonRpcResponse> {
        let result = ToolsListResult { tools: tools::get_tool_definitions() };
        Ok(JsonRpcResponse::success(id.clone(), serde_json::to_value(&result)?))
    }

    async fn handle_tools_call(&self, id: &JsonRpcId, params: &Option<Value>) -> Result<JsonRpcResponse> {
        let params: ToolsCallParams = serde_json::from_value(
            params
                .clone()
                .ok_or_else(|| KinshipError::InvalidInput("Missing params for tools/call".to_string()))?,
        )
        .map_err(|e| KinshipError::InvalidInput(format!("Invalid tools/call params: {}", e)))?;

        log::debug!("tools/call {}", params.name);

        let result = match params.name.as_str() {
            "kinship_find_path" => tools::handle_find_path(&self.service, &params.arguments).await?,
            "kinship_relatives" => tools::handle_relatives(&self.service, &params.arguments).await?,
            "kinship_matches" => tools::handle_matches(&self.service, &params.arguments).await?,
            "kinship_suggestions" => tools::handle_suggestions(&self.service, &params.arguments).await?,
            _ => {
                return Ok(JsonRpcResponse::error(
                    id.clone(),
                    error_codes::INVALID_PARAMS,
                    format!("Unknown tool: {}", params.name),
                    None,
                ));
            }
        };

        Ok(JsonRpcResponse::success(id.clone(), serde_json::to_value(&result)?))
    }
}

/// Map a handler error to a JSON-RPC error response.
fn error_response(id: JsonRpcId, e: KinshipError) -> JsonRpcResponse {
    match e {
        KinshipError::InvalidInput(msg) | KinshipError::McpProtocol(msg) => {
            JsonRpcResponse::error(id, error_codes::INVALID_PARAMS, msg, None)
        }
        other => {
            log::error!("Request failed: {}", other);
            JsonRpcResponse::error(
                id,
                error_codes::INTERNAL_ERROR,
                format!("Internal error: {}", other),
                Some(serde_json::json!({ "details": other.to_string() })),
            )
        }
    }
}

/// Send JSON-RPC response to stdout (newline-delimited)
async fn send_response(stdout: &mut tokio::io::Stdout, response: &JsonRpcResponse) -> Result<()> {
    let json = serde_json::to_string(response)?;
    stdout.write_all(json.as_bytes()).await?;
    stdout.write_all(b"\n").await?;
    stdout.flush().await?;
    Ok(())
}

/// Best-effort id recovery from a line that failed to parse.
fn extract_id_from_line(line: &str) -> Option<Value> {
    let id_start = line.find(r#""id":"#)?;
    let rest = &line[id_start + 5..];
    let id_end = rest.find(|c: char| c == ',' || c == '}')?;
    let id_val = rest[..id_end].trim();
    if id_val.len() >= 2 && id_val.starts_with('"') && id_val.ends_with('"') {
        Some(Value::String(id_val[1..id_val.len() - 1].to_string()))
    } else {
        id_val.parse::<i64>().ok().map(|n| Value::Number(n.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::TraversalConfig;
    use crate::db::test_support::migrated_db;
    use serde_json::json;

    async fn server() -> (McpServer, tempfile::TempDir) {
        let (db, dir) = migrated_db().await;
        db.with_connection(|conn| {
            conn.execute_batch(
                "INSERT INTO persons (id, first_name, last_name, gender_id, date_of_birth) VALUES
                     (1, 'Tara', 'Sen', 2, '1970-01-01'),
                     (2, 'Dilip', 'Sen', 1, '1968-01-01');
                 INSERT INTO relationships (person_id, related_person_id, relationship_type) VALUES
                     (1, 2, 'HUSBAND'), (2, 1, 'WIFE');",
            )?;
            Ok(())
        })
        .await
        .unwrap();
        (McpServer::new(KinshipService::new(db, TraversalConfig::default())), dir)
    }

    async fn call(server: &McpServer, raw: Value) -> Value {
        let request: JsonRpcRequest = serde_json::from_value(raw).unwrap();
        let mut initialized = false;
        let response = server.process_mcp_request(request, &mut initialized).await.unwrap().unwrap();
        serde_json::to_value(&response).unwrap()
    }

    #[test]
    fn test_extract_id_from_line() {
        let line = r#"{"jsonrpc":"2.0","id":"test-123","method":"test"#;
        assert_eq!(extract_id_from_line(line), Some(Value::String("test-123".to_string())));

        let line = r#"{"jsonrpc":"2.0","id":42,"method":"test"#;
        assert_eq!(extract_id_from_line(line), Some(json!(42)));

        let line = r#"{"method":"x","id":7}"#;
        assert_eq!(extract_id_from_line(line), Some(json!(7)));

        assert_eq!(extract_id_from_line(r#"{"method":"x"}"#), None);
    }

    #[tokio::test]
    async fn test_initialize_negotiates_version() {
        let (server, _dir) = server().await;
        let value = call(&server, json!({
            "jsonrpc": "2.0", "id": 1, "method": "initialize",
            "params": {"protocolVersion": "2025-06-18", "capabilities": {}}
        }))
        .await;
        assert_eq!(value["result"]["protocolVersion"], PROTOCOL_VERSION);
        assert_eq!(value["result"]["serverInfo"]["name"], "kinship");
    }

    #[tokio::test]
    async fn test_notification_marks_initialized() {
        let (server, _dir) = server().await;
        let request: JsonRpcRequest =
            serde_json::from_value(json!({"jsonrpc": "2.0", "method": "notifications/initialized"})).unwrap();
        let mut initialized = false;
        let response = server.process_mcp_request(request, &mut initialized).await.unwrap();
        assert!(response.is_none());
        assert!(initialized);
    }

    #[tokio::test]
    async fn test_tools_list_and_call() {
        let (server, _dir) = server().await;
        let list = call(&server, json!({"jsonrpc": "2.0", "id": 2, "method": "tools/list"})).await;
        assert_eq!(list["result"]["tools"].as_array().unwrap().len(), 4);

        let called = call(&server, json!({
            "jsonrpc": "2.0", "id": 3, "method": "tools/call",
            "params": {"name": "kinship_find_path", "arguments": {"person_a": 1, "person_b": 2}}
        }))
        .await;
        let text = called["result"]["content"][0]["text"].as_str().unwrap();
        let body: Value = serde_json::from_str(text).unwrap();
        assert_eq!(body["degree"], 1);
        assert_eq!(body["graph"]["1"]["to"]["label"], "Husband");
    }

    #[tokio::test]
    async fn test_error_mapping() {
        let (server, _dir) = server().await;

        let unknown = call(&server, json!({"jsonrpc": "2.0", "id": 4, "method": "resources/list"})).await;
        assert_eq!(unknown["error"]["code"], error_codes::METHOD_NOT_FOUND);

        let bad_tool = call(&server, json!({
            "jsonrpc": "2.0", "id": 5, "method": "tools/call",
            "params": {"name": "kinship_teleport", "arguments": {}}
        }))
        .await;
        assert_eq!(bad_tool["error"]["code"], error_codes::INVALID_PARAMS);

        let bad_args = call(&server, json!({
            "jsonrpc": "2.0", "id": 6, "method": "tools/call",
            "params": {"name": "kinship_relatives", "arguments": {"person_id": "one"}}
        }))
        .await;
        assert_eq!(bad_args["error"]["code"], error_codes::INVALID_PARAMS);

        let missing = call(&server, json!({
            "jsonrpc": "2.0", "id": 7, "method": "tools/call",
            "params": {"name": "kinship_matches", "arguments": {"person_id": 404, "target_gender": "MALE", "depth": 2}}
        }))
        .await;
        assert_eq!(missing["result"]["isError"], true);
    }
}
