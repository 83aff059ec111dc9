//! MCP tool registry and the Purelymail tool definitions

use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};

use super::protocol::ToolDefinition;
use crate::error::{GatewayError, Result};
use crate::integrations::PurelymailClient;

/// Executes a tool with already validated arguments
#[async_trait]
pub trait ToolExecutor: Send + Sync {
    async fn execute(&self, arguments: Value) -> Result<Value>;
}

/// A named, independently invokable tool
pub struct Operation {
    name: String,
    description: String,
    input_schema: Value,
    executor: Arc<dyn ToolExecutor>,
}

impl Operation {
    pub fn new(
        name: impl Into<String>,
        description: impl Into<String>,
        input_schema: Value,
        executor: Arc<dyn ToolExecutor>,
    ) -> Self {
        Self {
            name: name.into(),
            description: description.into(),
            input_schema,
            executor,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Public listing entry; never exposes the executor
    pub fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: self.name.clone(),
            description: self.description.clone(),
            input_schema: self.input_schema.clone(),
        }
    }

    /// Validate arguments against the input schema, then run the executor
    pub async fn execute(&self, arguments: Value) -> Result<Value> {
        let arguments = validate_arguments(&self.input_schema, arguments)?;
        self.executor.execute(arguments).await
    }
}

impl std::fmt::Debug for Operation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Operation")
            .field("name", &self.name)
            .field("description", &self.description)
            .finish_non_exhaustive()
    }
}

/// Read-only collection of operations, built once at startup
#[derive(Debug, Default)]
pub struct ToolRegistry {
    operations: Vec<Operation>,
}

impl ToolRegistry {
    /// Build a registry. Operation names must be unique.
    pub fn from_operations(operations: Vec<Operation>) -> Result<Self> {
        let mut seen = HashSet::new();
        for op in &operations {
            if !seen.insert(op.name.as_str()) {
                return Err(GatewayError::Config(format!(
                    "duplicate tool name: {}",
                    op.name
                )));
            }
        }
        Ok(Self { operations })
    }

    pub fn get(&self, name: &str) -> Option<&Operation> {
        self.operations.iter().find(|op| op.name == name)
    }

    pub fn names(&self) -> Vec<String> {
        self.operations.iter().map(|op| op.name.clone()).collect()
    }

    pub fn definitions(&self) -> Vec<ToolDefinition> {
        self.operations.iter().map(Operation::definition).collect()
    }

    pub fn len(&self) -> usize {
        self.operations.len()
    }

    pub fn is_empty(&self) -> bool {
        self.operations.is_empty()
    }
}

/// Check `required` fields and primitive `type`s of top-level properties.
///
/// Absent or null arguments are treated as an empty object.
pub fn validate_arguments(schema: &Value, arguments: Value) -> Result<Value> {
    let args = match arguments {
        Value::Null => Map::new(),
        Value::Object(map) => map,
        other => {
            return Err(GatewayError::InvalidParams(format!(
                "arguments must be an object, got {}",
                type_name(&other)
            )))
        }
    };

    if let Some(required) = schema.get("required").and_then(Value::as_array) {
        let missing: Vec<&str> = required
            .iter()
            .filter_map(Value::as_str)
            .filter(|field| args.get(*field).map_or(true, Value::is_null))
            .collect();
        if !missing.is_empty() {
            return Err(GatewayError::InvalidParams(format!(
                "missing required argument(s): {}",
                missing.join(", ")
            )));
        }
    }

    if let Some(properties) = schema.get("properties").and_then(Value::as_object) {
        for (field, value) in &args {
            if value.is_null() {
                continue;
            }
            let Some(expected) = properties
                .get(field)
                .and_then(|p| p.get("type"))
                .and_then(Value::as_str)
            else {
                continue;
            };
            if !matches_type(expected, value) {
                return Err(GatewayError::InvalidParams(format!(
                    "argument '{}' must be of type {}, got {}",
                    field,
                    expected,
                    type_name(value)
                )));
            }
        }
    }

    Ok(Value::Object(args))
}

fn matches_type(expected: &str, value: &Value) -> bool {
    match expected {
        "string" => value.is_string(),
        "integer" => value.is_i64() || value.is_u64(),
        "number" => value.is_number(),
        "boolean" => value.is_boolean(),
        "object" => value.is_object(),
        "array" => value.is_array(),
        _ => true,
    }
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "boolean",
        Value::Number(_) => "number",
        Value::String(_) => "string",
        Value::Array(_) => "array",
        Value::Object(_) => "object",
    }
}

/// Executor backed by one Purelymail API operation.
///
/// Arguments are sent as the request body with null fields dropped.
pub struct ApiExecutor {
    client: Arc<PurelymailClient>,
    operation: &'static str,
}

impl ApiExecutor {
    pub fn new(client: Arc<PurelymailClient>, operation: &'static str) -> Self {
        Self { client, operation }
    }
}

#[async_trait]
impl ToolExecutor for ApiExecutor {
    async fn execute(&self, arguments: Value) -> Result<Value> {
        let mut body = match arguments {
            Value::Object(map) => map,
            _ => Map::new(),
        };
        body.retain(|_, v| !v.is_null());
        self.client.call(self.operation, &Value::Object(body)).await
    }
}

/// All Purelymail tool definitions: (operation, description, schema).
///
/// The operation name doubles as the tool name.
pub const TOOL_DEFINITIONS: &[(&str, &str, &str)] = &[
    // Users
    (
        "createUser",
        "Create a new mailbox user on one of the account's domains",
        r#"{
            "type": "object",
            "properties": {
                "userName": {"type": "string", "description": "Local part of the address, e.g. 'alice'"},
                "domainName": {"type": "string", "description": "Domain the user belongs to"},
                "password": {"type": "string", "description": "Initial password"},
                "enablePasswordReset": {"type": "boolean"},
                "recoveryEmail": {"type": "string"},
                "recoveryEmailDescription": {"type": "string"},
                "recoveryPhone": {"type": "string"},
                "recoveryPhoneDescription": {"type": "string"},
                "enableSearchIndexing": {"type": "boolean"},
                "sendWelcomeEmail": {"type": "boolean"}
            },
            "required": ["userName", "domainName", "password"]
        }"#,
    ),
    (
        "deleteUser",
        "Delete a user and its mailbox",
        r#"{
            "type": "object",
            "properties": {
                "userName": {"type": "string", "description": "Full address, e.g. alice@example.com"}
            },
            "required": ["userName"]
        }"#,
    ),
    (
        "listUser",
        "List every user on the account",
        r#"{
            "type": "object",
            "properties": {}
        }"#,
    ),
    (
        "getUser",
        "Get a user's settings and password reset methods",
        r#"{
            "type": "object",
            "properties": {
                "userName": {"type": "string", "description": "Full address"}
            },
            "required": ["userName"]
        }"#,
    ),
    (
        "modifyUser",
        "Rename a user, change its password, or update its settings",
        r#"{
            "type": "object",
            "properties": {
                "userName": {"type": "string", "description": "Current full address"},
                "newUserName": {"type": "string", "description": "New full address"},
                "newPassword": {"type": "string"},
                "enableSearchIndexing": {"type": "boolean"},
                "enablePasswordReset": {"type": "boolean"},
                "requireTwoFactorAuthentication": {"type": "boolean"}
            },
            "required": ["userName"]
        }"#,
    ),
    (
        "createAppPassword",
        "Create an app password for a user; the password is only returned once",
        r#"{
            "type": "object",
            "properties": {
                "userHandle": {"type": "string", "description": "Full address"},
                "name": {"type": "string", "description": "Label for the app password"}
            },
            "required": ["userHandle"]
        }"#,
    ),
    (
        "deleteAppPassword",
        "Revoke an app password",
        r#"{
            "type": "object",
            "properties": {
                "userHandle": {"type": "string", "description": "Full address"},
                "appPassword": {"type": "string"}
            },
            "required": ["userHandle", "appPassword"]
        }"#,
    ),
    // Password reset
    (
        "upsertPasswordReset",
        "Add or update a password reset method (email or phone) for a user",
        r#"{
            "type": "object",
            "properties": {
                "userName": {"type": "string", "description": "Full address"},
                "type": {"type": "string", "enum": ["email", "phone"]},
                "target": {"type": "string", "description": "Recovery email address or phone number"},
                "description": {"type": "string"},
                "allowMfaReset": {"type": "boolean"},
                "existingTarget": {"type": "string", "description": "Target of the method being replaced"}
            },
            "required": ["userName", "type", "target"]
        }"#,
    ),
    (
        "deletePasswordReset",
        "Remove a password reset method from a user",
        r#"{
            "type": "object",
            "properties": {
                "userName": {"type": "string", "description": "Full address"},
                "target": {"type": "string"}
            },
            "required": ["userName", "target"]
        }"#,
    ),
    (
        "listPasswordResetMethods",
        "List a user's password reset methods",
        r#"{
            "type": "object",
            "properties": {
                "userName": {"type": "string", "description": "Full address"}
            },
            "required": ["userName"]
        }"#,
    ),
    // Domains
    (
        "addDomain",
        "Add a domain to the account. DNS ownership must already be set up",
        r#"{
            "type": "object",
            "properties": {
                "domainName": {"type": "string", "description": "e.g. example.com"}
            },
            "required": ["domainName"]
        }"#,
    ),
    (
        "listDomains",
        "List domains on the account with their DNS status",
        r#"{
            "type": "object",
            "properties": {
                "includeShared": {"type": "boolean", "description": "Include shared Purelymail domains"}
            }
        }"#,
    ),
    (
        "updateDomainSettings",
        "Change a domain's settings or trigger a DNS recheck",
        r#"{
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Domain name"},
                "allowAccountReset": {"type": "boolean"},
                "symbolicSubaddressing": {"type": "boolean"},
                "recheckDns": {"type": "boolean"}
            },
            "required": ["name"]
        }"#,
    ),
    (
        "deleteDomain",
        "Remove a domain and every user on it",
        r#"{
            "type": "object",
            "properties": {
                "name": {"type": "string", "description": "Domain name"}
            },
            "required": ["name"]
        }"#,
    ),
    (
        "getOwnershipCode",
        "Get the TXT record value that proves domain ownership",
        r#"{
            "type": "object",
            "properties": {}
        }"#,
    ),
    // Routing
    (
        "createRoutingRule",
        "Create a routing rule forwarding matching addresses to target addresses",
        r#"{
            "type": "object",
            "properties": {
                "domainName": {"type": "string"},
                "prefix": {"type": "boolean", "description": "Match addresses starting with matchUser"},
                "matchUser": {"type": "string", "description": "Local part to match"},
                "targetAddresses": {"type": "array", "items": {"type": "string"}},
                "catchall": {"type": "boolean", "description": "Only match addresses with no user"}
            },
            "required": ["domainName", "matchUser", "targetAddresses"]
        }"#,
    ),
    (
        "deleteRoutingRule",
        "Delete a routing rule by id",
        r#"{
            "type": "object",
            "properties": {
                "routingRuleId": {"type": "integer"}
            },
            "required": ["routingRuleId"]
        }"#,
    ),
    (
        "listRoutingRules",
        "List every routing rule on the account",
        r#"{
            "type": "object",
            "properties": {}
        }"#,
    ),
    // Billing
    (
        "checkAccountCredit",
        "Get the account's remaining credit",
        r#"{
            "type": "object",
            "properties": {}
        }"#,
    ),
];

/// Build the Purelymail tool registry on top of a shared client
pub fn purelymail_registry(client: Arc<PurelymailClient>) -> Result<ToolRegistry> {
    let operations = TOOL_DEFINITIONS
        .iter()
        .map(|(name, description, schema)| -> Result<Operation> {
            let input_schema = serde_json::from_str(schema)?;
            let executor = ApiExecutor::new(client.clone(), *name);
            Ok(Operation::new(
                *name,
                *description,
                input_schema,
                Arc::new(executor),
            ))
        })
        .collect::<Result<Vec<_>>>()?;

    ToolRegistry::from_operations(operations)
}
