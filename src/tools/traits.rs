//! Tool trait and the statically declared schema each tool carries.
//!
//! Schemas are built once, at registration, with [`ToolSchemaBuilder`]:
//!
//! ```
//! use tagloop::tools::{ParamType, ToolSchema};
//!
//! let schema = ToolSchema::builder("get_historical_data")
//!     .description("Daily price, market cap and volume of a coin.")
//!     .param("coin", ParamType::String)
//!     .param("date", ParamType::String)
//!     .build()
//!     .unwrap();
//! assert_eq!(schema.parameters().len(), 2);
//! ```

use crate::error::SchemaError;
use crate::tools::ToolArgs;
use anyhow::Result;
use async_trait::async_trait;
use serde::ser::{SerializeMap, SerializeStruct};
use serde::{Deserialize, Serialize, Serializer};
use std::fmt;
use std::str::FromStr;

// ---------------------------------------------------------------------------
// Parameter types
// ---------------------------------------------------------------------------

/// The primitive types a tool parameter can declare.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ParamType {
    Integer,
    String,
    Boolean,
    Float,
}

impl fmt::Display for ParamType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer => write!(f, "integer"),
            Self::String => write!(f, "string"),
            Self::Boolean => write!(f, "boolean"),
            Self::Float => write!(f, "float"),
        }
    }
}

impl FromStr for ParamType {
    type Err = String;

    /// Accepts the canonical names plus the short forms tool authors tend to write.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "integer" | "int" | "i64" => Ok(Self::Integer),
            "string" | "str" => Ok(Self::String),
            "boolean" | "bool" => Ok(Self::Boolean),
            "float" | "number" | "f64" => Ok(Self::Float),
            _ => Err(s.to_string()),
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Name, description and ordered parameter types of one tool.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ToolSchema {
    name: String,
    description: Option<String>,
    parameters: Vec<(String, ParamType)>,
}

impl ToolSchema {
    pub fn builder(name: impl Into<String>) -> ToolSchemaBuilder {
        ToolSchemaBuilder {
            name: name.into(),
            description: None,
            params: Vec::new(),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn description(&self) -> Option<&str> {
        self.description.as_deref()
    }

    /// Parameters in declaration order.
    pub fn parameters(&self) -> &[(String, ParamType)] {
        &self.parameters
    }

    pub fn param_type(&self, name: &str) -> Option<ParamType> {
        self.parameters
            .iter()
            .find(|(n, _)| n == name)
            .map(|(_, t)| *t)
    }
}

/// Renders the catalogue form:
/// `{"name", "description", "parameters": {"properties": {p: {"type": t}}}}`.
impl Serialize for ToolSchema {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut s = serializer.serialize_struct("ToolSchema", 3)?;
        s.serialize_field("name", &self.name)?;
        s.serialize_field("description", &self.description)?;
        s.serialize_field(
            "parameters",
            &ParametersPayload {
                properties: Properties(&self.parameters),
            },
        )?;
        s.end()
    }
}

#[derive(Serialize)]
struct ParametersPayload<'a> {
    properties: Properties<'a>,
}

/// Serialized as a map so declaration order survives (serde_json maps sort keys).
struct Properties<'a>(&'a [(String, ParamType)]);

#[derive(Serialize)]
struct PropertyPayload {
    r#type: ParamType,
}

impl Serialize for Properties<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, ty) in self.0 {
            map.serialize_entry(name, &PropertyPayload { r#type: *ty })?;
        }
        map.end()
    }
}

/// Builder for [`ToolSchema`]. Declaration errors are collected and reported
/// by [`build`](Self::build).
#[derive(Debug, Clone)]
pub struct ToolSchemaBuilder {
    name: String,
    description: Option<String>,
    params: Vec<(String, Result<ParamType, String>)>,
}

impl ToolSchemaBuilder {
    /// Tool documentation shown to the model. Surrounding whitespace is
    /// stripped; a blank description counts as none.
    pub fn description(mut self, description: impl Into<String>) -> Self {
        let description = description.into();
        let trimmed = description.trim();
        self.description = (!trimmed.is_empty()).then(|| trimmed.to_string());
        self
    }

    pub fn param(mut self, name: impl Into<String>, ty: ParamType) -> Self {
        self.params.push((name.into(), Ok(ty)));
        self
    }

    /// Declare a parameter by type name (`"int"`, `"string"`, ...). An empty
    /// or unknown name fails at [`build`](Self::build).
    pub fn param_decl(mut self, name: impl Into<String>, declared: &str) -> Self {
        self.params.push((name.into(), declared.parse()));
        self
    }

    pub fn build(self) -> Result<ToolSchema, SchemaError> {
        let tool = self.name.trim().to_string();
        if tool.is_empty() {
            return Err(SchemaError::EmptyToolName);
        }

        let mut parameters: Vec<(String, ParamType)> = Vec::with_capacity(self.params.len());
        for (param, ty) in self.params {
            if param.trim().is_empty() {
                return Err(SchemaError::EmptyParamName { tool });
            }
            if parameters.iter().any(|(p, _)| *p == param) {
                return Err(SchemaError::DuplicateParam { tool, param });
            }
            let ty = ty.map_err(|declared| SchemaError::UntypedParam {
                tool: tool.clone(),
                param: param.clone(),
                declared,
            })?;
            parameters.push((param, ty));
        }

        Ok(ToolSchema {
            name: tool,
            description: self.description,
            parameters,
        })
    }
}

// ---------------------------------------------------------------------------
// Tool trait
// ---------------------------------------------------------------------------

/// A callable exposed to the model.
///
/// `invoke` receives arguments already validated against [`Tool::schema`].
/// Errors are caught by the loop and reported to the model; they never
/// abort a run.
#[async_trait]
pub trait Tool: Send + Sync {
    fn schema(&self) -> &ToolSchema;

    fn name(&self) -> &str {
        self.schema().name()
    }

    async fn invoke(&self, args: ToolArgs) -> Result<serde_json::Value>;
}

/// A tool backed by a plain synchronous closure.
pub struct FnTool<F> {
    schema: ToolSchema,
    func: F,
}

impl<F> FnTool<F>
where
    F: Fn(&ToolArgs) -> Result<serde_json::Value> + Send + Sync,
{
    pub fn new(schema: ToolSchema, func: F) -> Self {
        Self { schema, func }
    }
}

#[async_trait]
impl<F> Tool for FnTool<F>
where
    F: Fn(&ToolArgs) -> Result<serde_json::Value> + Send + Sync,
{
    fn schema(&self) -> &ToolSchema {
        &self.schema
    }

    async fn invoke(&self, args: ToolArgs) -> Result<serde_json::Value> {
        (self.func)(&args)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn schema_keeps_declaration_order() {
        let schema = ToolSchema::builder("f")
            .param("b", ParamType::String)
            .param("a", ParamType::Integer)
            .build()
            .unwrap();

        let rendered = serde_json::to_string(&schema).unwrap();
        assert_eq!(
            rendered,
            r#"{"name":"f","description":null,"parameters":{"properties":{"b":{"type":"string"},"a":{"type":"integer"}}}}"#
        );
    }

    #[test]
    fn description_is_trimmed() {
        let schema = ToolSchema::builder("f")
            .description("\n    Gets the price.\n  ")
            .build()
            .unwrap();
        assert_eq!(schema.description(), Some("Gets the price."));

        let blank = ToolSchema::builder("f").description("   ").build().unwrap();
        assert_eq!(blank.description(), None);
    }

    #[test]
    fn param_decl_accepts_short_names() {
        let schema = ToolSchema::builder("f")
            .param_decl("n", "int")
            .param_decl("s", "str")
            .param_decl("ok", "bool")
            .param_decl("x", "float")
            .build()
            .unwrap();
        let types: Vec<ParamType> = schema.parameters().iter().map(|(_, t)| *t).collect();
        assert_eq!(
            types,
            vec![
                ParamType::Integer,
                ParamType::String,
                ParamType::Boolean,
                ParamType::Float
            ]
        );
    }

    #[test]
    fn untyped_param_is_schema_error() {
        let err = ToolSchema::builder("f")
            .param_decl("moneda", "")
            .build()
            .unwrap_err();
        assert_eq!(
            err,
            SchemaError::UntypedParam {
                tool: "f".into(),
                param: "moneda".into(),
                declared: String::new(),
            }
        );

        let err = ToolSchema::builder("f")
            .param_decl("when", "datetime")
            .build()
            .unwrap_err();
        assert!(matches!(err, SchemaError::UntypedParam { .. }));
    }

    #[test]
    fn malformed_declarations_are_rejected() {
        assert_eq!(
            ToolSchema::builder("  ").build().unwrap_err(),
            SchemaError::EmptyToolName
        );
        assert!(matches!(
            ToolSchema::builder("f").param("", ParamType::String).build(),
            Err(SchemaError::EmptyParamName { .. })
        ));
        assert!(matches!(
            ToolSchema::builder("f")
                .param("a", ParamType::String)
                .param("a", ParamType::Integer)
                .build(),
            Err(SchemaError::DuplicateParam { .. })
        ));
    }

    #[tokio::test]
    async fn fn_tool_invokes_closure() {
        let schema = ToolSchema::builder("echo")
            .param("text", ParamType::String)
            .build()
            .unwrap();
        let tool = FnTool::new(schema, |args: &ToolArgs| {
            Ok(json!({ "echo": args.str("text")? }))
        });

        let args = ToolArgs::from_pairs(vec![("text".into(), "hi".into())]);
        assert_eq!(tool.name(), "echo");
        assert_eq!(tool.invoke(args).await.unwrap(), json!({"echo": "hi"}));
    }
}
