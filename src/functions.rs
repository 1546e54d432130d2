use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::ser::SerializeStruct;
use serde::{Deserialize, Serialize, Serializer};
use serde_json::Value;

use crate::LLMError;

pub mod github;
pub mod website;

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionDefinition {
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub parameters: FunctionParameters,
}

impl FunctionDefinition {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            description: None,
            parameters: FunctionParameters::new(),
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn with_parameter(mut self, parameter: FunctionParameter) -> Self {
        self.add_parameter(parameter);
        self
    }

    pub fn add_parameter(&mut self, parameter: FunctionParameter) {
        let FunctionParameter {
            name,
            mut schema,
            description,
            required,
        } = parameter;

        if let (Some(description), Some(object)) = (description, schema.as_object_mut()) {
            object.insert("description".to_string(), Value::String(description));
        }

        if required {
            self.parameters.required.push(name.clone());
        }

        self.parameters.properties.insert(name, schema);
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FunctionParameters {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub properties: BTreeMap<String, Value>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub required: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub additional_properties: Option<bool>,
}

impl FunctionParameters {
    pub fn new() -> Self {
        Self {
            kind: "object".to_string(),
            properties: BTreeMap::new(),
            required: Vec::new(),
            additional_properties: Some(false),
        }
    }
}

impl Default for FunctionParameters {
    fn default() -> Self {
        Self::new()
    }
}

#[derive(Debug, Clone)]
pub struct FunctionParameter {
    pub name: String,
    pub schema: Value,
    pub description: Option<String>,
    pub required: bool,
}

impl FunctionParameter {
    pub fn new(name: impl Into<String>, schema: Value) -> Self {
        Self {
            name: name.into(),
            schema,
            description: None,
            required: true,
        }
    }

    pub fn with_description(mut self, description: impl Into<String>) -> Self {
        self.description = Some(description.into());
        self
    }

    pub fn optional(mut self) -> Self {
        self.required = false;
        self
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Tool {
    #[serde(rename = "type")]
    pub kind: ToolType,
    pub function: FunctionDefinition,
}

impl From<FunctionDefinition> for Tool {
    fn from(function: FunctionDefinition) -> Self {
        Self {
            kind: ToolType::Function,
            function,
        }
    }
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ToolType {
    Function,
}

#[derive(Debug, Clone)]
pub struct FunctionCall {
    pub name: String,
    pub arguments: Value,
    pub raw_arguments: Option<String>,
}

impl FunctionCall {
    pub fn new(name: impl Into<String>, arguments: Value) -> Self {
        Self {
            name: name.into(),
            arguments,
            raw_arguments: None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct ToolCall {
    pub id: Option<String>,
    pub function: FunctionCall,
}

impl ToolCall {
    pub fn new(function: FunctionCall) -> Self {
        Self { id: None, function }
    }

    pub fn with_id(mut self, id: impl Into<String>) -> Self {
        self.id = Some(id.into());
        self
    }
}

impl Serialize for ToolCall {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("ToolCall", 3)?;
        if let Some(id) = &self.id {
            state.serialize_field("id", id)?;
        }
        state.serialize_field("type", "function")?;
        state.serialize_field("function", &SerializableFunctionCall(&self.function))?;
        state.end()
    }
}

impl<'de> Deserialize<'de> for ToolCall {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        #[derive(Deserialize)]
        struct RawFunctionCall {
            name: String,
            #[serde(default)]
            arguments: String,
        }

        #[derive(Deserialize)]
        struct RawToolCall {
            id: Option<String>,
            #[serde(rename = "type", default)]
            kind: Option<String>,
            function: RawFunctionCall,
        }

        let raw = RawToolCall::deserialize(deserializer)?;
        if let Some(kind) = raw.kind.as_deref().filter(|kind| *kind != "function") {
            return Err(serde::de::Error::custom(format!(
                "unsupported tool call type '{kind}'"
            )));
        }

        // Models routinely send "" for argument-less calls.
        let arguments = if raw.function.arguments.trim().is_empty() {
            Value::Object(Default::default())
        } else {
            serde_json::from_str(&raw.function.arguments).map_err(|error| {
                serde::de::Error::custom(format!("failed to parse function arguments: {error}"))
            })?
        };

        Ok(Self {
            id: raw.id,
            function: FunctionCall {
                name: raw.function.name,
                arguments,
                raw_arguments: Some(raw.function.arguments),
            },
        })
    }
}

struct SerializableFunctionCall<'a>(&'a FunctionCall);

impl<'a> Serialize for SerializableFunctionCall<'a> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
    {
        let mut state = serializer.serialize_struct("function", 2)?;
        state.serialize_field("name", &self.0.name)?;
        let raw = match &self.0.raw_arguments {
            Some(raw) => raw.clone(),
            None => serde_json::to_string(&self.0.arguments)
                .map_err(|error| serde::ser::Error::custom(error.to_string()))?,
        };
        state.serialize_field("arguments", &raw)?;
        state.end()
    }
}

#[async_trait]
pub trait KernelFunction: Send + Sync {
    fn definition(&self) -> FunctionDefinition;

    async fn invoke(&self, arguments: &Value) -> Result<Value, LLMError>;
}

pub type DynKernelFunction = Arc<dyn KernelFunction>;

#[derive(Default, Clone)]
pub struct FunctionRegistry {
    functions: BTreeMap<String, DynKernelFunction>,
}

impl FunctionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, function: DynKernelFunction) {
        let name = function.definition().name;
        self.functions.insert(name, function);
    }

    pub fn register_all<I>(&mut self, functions: I)
    where
        I: IntoIterator<Item = DynKernelFunction>,
    {
        for function in functions {
            self.register(function);
        }
    }

    pub fn get(&self, name: &str) -> Option<&DynKernelFunction> {
        self.functions.get(name)
    }

    pub fn is_empty(&self) -> bool {
        self.functions.is_empty()
    }

    pub fn names(&self) -> impl Iterator<Item = &str> {
        self.functions.keys().map(String::as_str)
    }

    pub fn definitions(&self) -> Vec<FunctionDefinition> {
        self.functions
            .values()
            .map(|function| function.definition())
            .collect()
    }

    pub fn tools(&self) -> Vec<Tool> {
        self.definitions().into_iter().map(Tool::from).collect()
    }

    pub async fn invoke(&self, call: &FunctionCall) -> Result<Value, LLMError> {
        let function = self
            .get(&call.name)
            .ok_or_else(|| LLMError::UnknownFunction(call.name.clone()))?;
        function.invoke(&call.arguments).await
    }
}

pub fn json_schema_for<T: JsonSchema>() -> Value {
    let schema = schemars::schema_for!(T);
    serde_json::to_value(schema.schema).expect("schema serialization should not fail")
}

/// Deserialize tool arguments, mapping failures to [`LLMError::InvalidFunctionArguments`].
pub fn parse_arguments<T: serde::de::DeserializeOwned>(arguments: &Value) -> Result<T, LLMError> {
    serde_json::from_value(arguments.clone())
        .map_err(|error| LLMError::InvalidFunctionArguments(error.to_string()))
}

/// How the model may use the offered tools.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolChoice {
    None,
    Auto,
    Required,
}

impl ToolChoice {
    pub fn auto() -> Self {
        Self::Auto
    }
}
