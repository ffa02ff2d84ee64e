use crate::error::{KinshipError, Result};
use crate::graph::{MatchQuery, PersonId, RelativesQuery, MAX_RELATIVES, MAX_SUGGESTIONS};
use crate::mcp::types::{Tool, ToolsCallResult};
use crate::service::KinshipService;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::{json, Value};

/// Get all tool definitions for tools/list
pub fn get_tool_definitions() -> Vec<Tool> {
    vec![
        Tool {
            name: "kinship_find_path".to_string(),
            description: "Find how two persons are related: a chain of relationships connecting them, with labels in both directions".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "person_a": {"type": "integer", "description": "Id of the first person"},
                    "person_b": {"type": "integer", "description": "Id of the second person"}
                },
                "required": ["person_a", "person_b"]
            }),
        },
        Tool {
            name: "kinship_relatives".to_string(),
            description: format!(
                "List relatives within N relationship hops of a person, optionally filtered. At most {} relatives are returned.",
                MAX_RELATIVES
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "person_id": {"type": "integer"},
                    "depth": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Number of hops. Values above the server ceiling are clamped."
                    },
                    "depth_mode": {
                        "type": "string",
                        "enum": ["up_to", "only_at"],
                        "default": "up_to",
                        "description": "up_to: every hop count from 1 to depth; only_at: exactly depth hops"
                    },
                    "living_only": {"type": "boolean", "default": false},
                    "gender_id": {"type": "integer"},
                    "country_id": {"type": "integer"},
                    "state_id": {"type": "integer"},
                    "district_id": {"type": "integer"},
                    "city_id": {"type": "integer"}
                },
                "required": ["person_id", "depth"]
            }),
        },
        Tool {
            name: "kinship_matches".to_string(),
            description: "Find living, unmarried, childless persons of the target gender in a person's extended family network, with the exploration tree that reached them".to_string(),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "person_id": {"type": "integer", "description": "Id of the seeker"},
                    "target_gender": {"type": "string", "enum": ["MALE", "FEMALE", "UNKNOWN"]},
                    "depth": {
                        "type": "integer",
                        "minimum": 0,
                        "description": "Number of hops to explore. Values above the server ceiling are clamped."
                    },
                    "birth_year_min": {"type": "integer"},
                    "birth_year_max": {"type": "integer"},
                    "religion_id": {"type": "integer"},
                    "religion_category_id": {"type": "integer"},
                    "religion_sub_category_id": {"type": "integer"},
                    "exclude_sub_category_ids": {"type": "array", "items": {"type": "integer"}}
                },
                "required": ["person_id", "target_gender", "depth"]
            }),
        },
        Tool {
            name: "kinship_suggestions".to_string(),
            description: format!(
                "Suggest up to {} probable relatives not yet linked to a person: spouse's children, parent's spouses and child's other parents",
                MAX_SUGGESTIONS
            ),
            input_schema: json!({
                "type": "object",
                "properties": {
                    "person_id": {"type": "integer"}
                },
                "required": ["person_id"]
            }),
        },
    ]
}

#[derive(Debug, Deserialize)]
struct PathParams {
    person_a: PersonId,
    person_b: PersonId,
}

#[derive(Debug, Deserialize)]
struct RelativesParams {
    person_id: PersonId,
    #[serde(flatten)]
    query: RelativesQuery,
}

#[derive(Debug, Deserialize)]
struct MatchParams {
    person_id: PersonId,
    #[serde(flatten)]
    query: MatchQuery,
}

#[derive(Debug, Deserialize)]
struct SuggestionParams {
    person_id: PersonId,
}

fn parse_params<T: DeserializeOwned>(tool: &str, arguments: &Value) -> Result<T> {
    serde_json::from_value(arguments.clone())
        .map_err(|e| KinshipError::InvalidInput(format!("Invalid {} params: {}", tool, e)))
}

/// Pretty JSON text result, or a tool error when a person id did not resolve.
fn into_result<T: Serialize>(outcome: Result<T>) -> Result<ToolsCallResult> {
    match outcome {
        Ok(value) => Ok(ToolsCallResult::text(serde_json::to_string_pretty(&value)?)),
        Err(e) if e.is_not_found() => Ok(ToolsCallResult::error(format!("Error: {}", e))),
        Err(e) => Err(e),
    }
}

/// Handle kinship_find_path tool
pub async fn handle_find_path(service: &KinshipService, arguments: &Value) -> Result<ToolsCallResult> {
    let params: PathParams = parse_params("kinship_find_path", arguments)?;
    into_result(service.find_path(params.person_a, params.person_b).await)
}

/// Handle kinship_relatives tool
pub async fn handle_relatives(service: &KinshipService, arguments: &Value) -> Result<ToolsCallResult> {
    let params: RelativesParams = parse_params("kinship_relatives", arguments)?;
    into_result(service.relatives(params.person_id, params.query).await)
}

/// Handle kinship_matches tool
pub async fn handle_matches(service: &KinshipService, arguments: &Value) -> Result<ToolsCallResult> {
    let params: MatchParams = parse_params("kinship_matches", arguments)?;
    into_result(service.matches(params.person_id, params.query).await)
}

/// Handle kinship_suggestions tool
pub async fn handle_suggestions(service: &KinshipService, arguments: &Value) -> Result<ToolsCallResult> {
    let params: SuggestionParams = parse_params("kinship_suggestions", arguments)?;
    let outcome = service.suggestions(params.person_id).await.map(|suggestions| {
        json!({
            "person_id": params.person_id,
            "total_count": suggestions.len(),
            "suggestions": suggestions,
        })
    });
    into_result(outcome)
}
