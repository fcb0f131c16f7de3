pub mod market;
pub mod traits;
pub mod validate;

pub use traits::{FnTool, ParamType, Tool, ToolSchema, ToolSchemaBuilder};
pub use validate::{validate_arguments, ArgValue, ToolArgs};

use crate::error::{SchemaError, ToolError};
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::collections::HashMap;
use std::sync::Arc;

// ---------------------------------------------------------------------------
// Registry
// ---------------------------------------------------------------------------

/// Name → tool mapping, built once and read-only afterwards.
pub struct ToolRegistry {
    tools: Vec<Arc<dyn Tool>>,
    index: HashMap<String, usize>,
}

impl std::fmt::Debug for ToolRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ToolRegistry")
            .field("tools", &self.names())
            .finish()
    }
}

impl ToolRegistry {
    /// Build the registry from a fixed tool list. Names must be unique.
    pub fn new(tools: Vec<Arc<dyn Tool>>) -> Result<Self, SchemaError> {
        let mut index = HashMap::with_capacity(tools.len());
        for (i, tool) in tools.iter().enumerate() {
            let name = tool.name().to_string();
            if index.insert(name.clone(), i).is_some() {
                return Err(SchemaError::DuplicateTool(name));
            }
        }
        Ok(Self { tools, index })
    }

    pub fn lookup(&self, name: &str) -> Result<&Arc<dyn Tool>, ToolError> {
        self.index
            .get(name)
            .map(|&i| &self.tools[i])
            .ok_or_else(|| ToolError::UnknownTool(name.to_string()))
    }

    /// Schemas in registration order.
    pub fn describe_all(&self) -> Vec<&ToolSchema> {
        self.tools.iter().map(|t| t.schema()).collect()
    }

    pub fn names(&self) -> Vec<&str> {
        self.tools.iter().map(|t| t.name()).collect()
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// The tool catalogue as embedded in the system prompt: one JSON schema
    /// per line, comma separated.
    pub fn catalogue_json(&self) -> String {
        self.describe_all()
            .iter()
            .map(|schema| serde_json::to_string(schema).unwrap_or_default())
            .collect::<Vec<_>>()
            .join(",\n")
    }
}

// ---------------------------------------------------------------------------
// Tool call requests
// ---------------------------------------------------------------------------

/// A call the model asked for inside a `<tool_call>` tag.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallRequest {
    pub name: String,
    /// Raw values as decoded from the model's JSON, not yet validated.
    pub arguments: Map<String, Value>,
    /// Correlates the call with its entry in the next observation.
    pub id: u64,
}

impl ToolCallRequest {
    /// Parse a `<tool_call>` body. Requires a JSON object with a non-empty
    /// string `name`, an object `arguments` and a non-negative integer `id`.
    pub fn parse(body: &str) -> Result<Self, ToolError> {
        let value: Value = serde_json::from_str(body)
            .map_err(|e| ToolError::MalformedToolCall(format!("invalid JSON: {e}")))?;
        let Value::Object(mut obj) = value else {
            return Err(ToolError::MalformedToolCall(
                "expected a JSON object".to_string(),
            ));
        };

        let name = match obj.remove("name") {
            Some(Value::String(name)) if !name.trim().is_empty() => name.trim().to_string(),
            Some(_) => return Err(malformed("'name' must be a non-empty string")),
            None => return Err(malformed("missing 'name'")),
        };
        let arguments = match obj.remove("arguments") {
            Some(Value::Object(arguments)) => arguments,
            Some(_) => return Err(malformed("'arguments' must be an object")),
            None => return Err(malformed("missing 'arguments'")),
        };
        let id = match obj.remove("id") {
            Some(id) => id
                .as_u64()
                .ok_or_else(|| malformed("'id' must be a non-negative integer"))?,
            None => return Err(malformed("missing 'id'")),
        };

        Ok(Self {
            name,
            arguments,
            id,
        })
    }

    /// Best-effort id of a body that failed [`parse`](Self::parse), so its
    /// error can still be keyed by the id the model chose.
    pub fn peek_id(body: &str) -> Option<u64> {
        serde_json::from_str::<Value>(body)
            .ok()?
            .get("id")?
            .as_u64()
    }
}

fn malformed(reason: &str) -> ToolError {
    ToolError::MalformedToolCall(reason.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn tool(name: &str, params: &[(&str, ParamType)]) -> Arc<dyn Tool> {
        let mut builder = ToolSchema::builder(name);
        for (p, t) in params {
            builder = builder.param(*p, *t);
        }
        Arc::new(FnTool::new(builder.build().unwrap(), |_args: &ToolArgs| {
            Ok(json!(null))
        }))
    }

    #[test]
    fn describe_all_preserves_order_and_types() {
        let registry = ToolRegistry::new(vec![tool(
            "f",
            &[("a", ParamType::String), ("b", ParamType::Integer)],
        )])
        .unwrap();

        let schemas = registry.describe_all();
        assert_eq!(schemas.len(), 1);
        let params: Vec<(String, String)> = schemas[0]
            .parameters()
            .iter()
            .map(|(n, t)| (n.clone(), t.to_string()))
            .collect();
        assert_eq!(
            params,
            vec![
                ("a".to_string(), "string".to_string()),
                ("b".to_string(), "integer".to_string())
            ]
        );
    }

    #[test]
    fn lookup_unknown_tool() {
        let registry = ToolRegistry::new(vec![tool("known", &[])]).unwrap();
        assert!(registry.lookup("known").is_ok());
        assert_eq!(
            registry.lookup("missing").err(),
            Some(ToolError::UnknownTool("missing".into()))
        );
    }

    #[test]
    fn duplicate_tool_names_are_rejected() {
        let err = ToolRegistry::new(vec![tool("f", &[]), tool("f", &[])]).unwrap_err();
        assert_eq!(err, SchemaError::DuplicateTool("f".into()));
    }

    #[test]
    fn catalogue_lists_every_schema() {
        let registry = ToolRegistry::new(vec![
            tool("first", &[("coin", ParamType::String)]),
            tool("second", &[]),
        ])
        .unwrap();
        assert_eq!(
            registry.catalogue_json(),
            "{\"name\":\"first\",\"description\":null,\"parameters\":{\"properties\":{\"coin\":{\"type\":\"string\"}}}},\n\
             {\"name\":\"second\",\"description\":null,\"parameters\":{\"properties\":{}}}"
        );
    }

    #[test]
    fn parse_well_formed_call() {
        let call = ToolCallRequest::parse(
            r#"{"name": "get_current_price", "arguments": {"coin": "solana"}, "id": 0}"#,
        )
        .unwrap();
        assert_eq!(call.name, "get_current_price");
        assert_eq!(call.arguments.get("coin"), Some(&json!("solana")));
        assert_eq!(call.id, 0);
    }

    #[test]
    fn parse_rejects_malformed_calls() {
        let cases = [
            "not json",
            "[1, 2]",
            r#"{"arguments": {}, "id": 1}"#,
            r#"{"name": "", "arguments": {}, "id": 1}"#,
            r#"{"name": "f", "id": 1}"#,
            r#"{"name": "f", "arguments": [], "id": 1}"#,
            r#"{"name": "f", "arguments": {}}"#,
            r#"{"name": "f", "arguments": {}, "id": -1}"#,
            r#"{"name": "f", "arguments": {}, "id": "one"}"#,
        ];
        for body in cases {
            assert!(
                matches!(
                    ToolCallRequest::parse(body),
                    Err(ToolError::MalformedToolCall(_))
                ),
                "{body}"
            );
        }
    }

    #[test]
    fn peek_id_salvages_ids() {
        assert_eq!(ToolCallRequest::peek_id(r#"{"name": 5, "id": 3}"#), Some(3));
        assert_eq!(ToolCallRequest::peek_id("{oops"), None);
    }
}
