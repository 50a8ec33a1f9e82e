//! Tool façade.
//!
//! The registry contract shared by every tool: a declarative parameter
//! schema plus a stateless `execute(params) -> result | error` operation,
//! dispatched by name, with a shared process-wide key/value cache handle
//! passed along. The memory tool is the only tool in this crate; it parses
//! the nine knowledge-graph operations and delegates to [`GraphManager`].

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::MemoryConfig;
use crate::graph::GraphManager;
use crate::models::{
    Entity, KnowledgeGraph, Namespace, ObservationDeletion, ObservationInput, ObservationResult,
    Relation, SearchMatch,
};
use crate::{Error, Result};

/// The nine memory operations, in dispatch order.
pub const MEMORY_OPERATIONS: [&str; 9] = [
    "create_entities",
    "create_relations",
    "add_observations",
    "delete_entities",
    "delete_observations",
    "delete_relations",
    "read_graph",
    "search_nodes",
    "open_nodes",
];

/// Process-wide key/value cache shared across tools.
///
/// The memory subsystem owns durable state of its own and never touches
/// this; it exists so every tool sees the same registry contract.
pub type ToolCache = Arc<Mutex<HashMap<String, Value>>>;

/// Shared handles the registry passes to every tool execution.
#[derive(Debug, Clone, Default)]
pub struct ToolContext {
    /// The process-wide response cache.
    pub cache: ToolCache,
}

impl ToolContext {
    /// Creates a context with an empty cache.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

/// Definition of a registered tool.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ToolDefinition {
    /// Tool name.
    pub name: String,
    /// Tool description.
    pub description: String,
    /// JSON Schema for input validation.
    pub input_schema: Value,
}

/// A dispatchable tool: a declarative schema plus a stateless execute.
pub trait Tool {
    /// Returns the tool's definition for registration.
    fn definition(&self) -> ToolDefinition;

    /// Executes the tool against a parameter object.
    ///
    /// # Errors
    ///
    /// Returns an error when the parameters are invalid or the operation
    /// fails; implementations must not keep state across calls.
    fn execute(&self, ctx: &ToolContext, params: Value) -> Result<Value>;
}

/// Registry of tools, dispatching executions by name.
pub struct ToolRegistry {
    tools: HashMap<String, Box<dyn Tool + Send + Sync>>,
    context: ToolContext,
}

impl ToolRegistry {
    /// Creates an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self {
            tools: HashMap::new(),
            context: ToolContext::new(),
        }
    }

    /// Creates a registry with the memory tool registered.
    #[must_use]
    pub fn with_memory_tool(config: MemoryConfig) -> Self {
        let mut registry = Self::new();
        registry.register(Box::new(MemoryTool::new(config)));
        registry
    }

    /// Registers a tool under the name in its definition.
    pub fn register(&mut self, tool: Box<dyn Tool + Send + Sync>) {
        self.tools.insert(tool.definition().name, tool);
    }

    /// Returns all tool definitions.
    #[must_use]
    pub fn list_tools(&self) -> Vec<ToolDefinition> {
        self.tools.values().map(|t| t.definition()).collect()
    }

    /// Gets a tool definition by name.
    #[must_use]
    pub fn get_tool(&self, name: &str) -> Option<ToolDefinition> {
        self.tools.get(name).map(|t| t.definition())
    }

    /// Executes a tool with the given parameters.
    ///
    /// # Errors
    ///
    /// Returns [`Error::InvalidInput`] for an unknown tool, or the tool's
    /// own error.
    pub fn execute(&self, name: &str, params: Value) -> Result<Value> {
        let tool = self
            .tools
            .get(name)
            .ok_or_else(|| Error::InvalidInput(format!("unknown tool: {name}")))?;
        tool.execute(&self.context, params)
    }
}

impl Default for ToolRegistry {
    fn default() -> Self {
        Self::new()
    }
}

/// The persistent knowledge-graph memory tool.
pub struct MemoryTool {
    manager: GraphManager,
}

impl MemoryTool {
    /// Creates the tool over filesystem-backed storage.
    #[must_use]
    pub fn new(config: MemoryConfig) -> Self {
        Self {
            manager: GraphManager::new(config),
        }
    }

    fn handle_create_entities(&self, namespace: &Namespace, data: Option<&Value>) -> Result<Value> {
        let entities: Vec<Entity> = parse_field(data, "create_entities", "entities")?;
        let created = self.manager.create_entities(namespace, entities)?;
        to_json(&CreateEntitiesResponse {
            created_entities: created,
            timestamp: Utc::now(),
        })
    }

    fn handle_create_relations(
        &self,
        namespace: &Namespace,
        data: Option<&Value>,
    ) -> Result<Value> {
        let relations: Vec<Relation> = parse_field(data, "create_relations", "relations")?;
        let created = self.manager.create_relations(namespace, relations)?;
        to_json(&CreateRelationsResponse {
            created_relations: created,
            timestamp: Utc::now(),
        })
    }

    fn handle_add_observations(
        &self,
        namespace: &Namespace,
        data: Option<&Value>,
    ) -> Result<Value> {
        let inputs: Vec<ObservationInput> = parse_field(data, "add_observations", "observations")?;
        let results = self.manager.add_observations(namespace, inputs)?;
        to_json(&AddObservationsResponse {
            results,
            timestamp: Utc::now(),
        })
    }

    fn handle_delete_entities(&self, namespace: &Namespace, data: Option<&Value>) -> Result<Value> {
        let names: Vec<String> = parse_field(data, "delete_entities", "entityNames")?;
        let (entities, relations) = self.manager.delete_entities(namespace, &names)?;
        to_json(&OperationResponse {
            message: format!(
                "Successfully deleted {entities} entities and {relations} cascaded relations"
            ),
            timestamp: Utc::now(),
        })
    }

    fn handle_delete_observations(
        &self,
        namespace: &Namespace,
        data: Option<&Value>,
    ) -> Result<Value> {
        let deletions: Vec<ObservationDeletion> =
            parse_field(data, "delete_observations", "deletions")?;
        let removed = self.manager.delete_observations(namespace, deletions)?;
        to_json(&OperationResponse {
            message: format!("Successfully deleted {removed} observations from entities"),
            timestamp: Utc::now(),
        })
    }

    fn handle_delete_relations(
        &self,
        namespace: &Namespace,
        data: Option<&Value>,
    ) -> Result<Value> {
        let relations: Vec<Relation> = parse_field(data, "delete_relations", "relations")?;
        let removed = self.manager.delete_relations(namespace, &relations)?;
        to_json(&OperationResponse {
            message: format!("Successfully deleted {removed} relations"),
            timestamp: Utc::now(),
        })
    }

    fn handle_read_graph(&self, namespace: &Namespace) -> Result<Value> {
        let graph = self.manager.read_graph(namespace)?;
        to_json(&graph)
    }

    fn handle_search_nodes(&self, namespace: &Namespace, data: Option<&Value>) -> Result<Value> {
        let data = require_data(data, "search_nodes")?;
        let query = data
            .get("query")
            .ok_or_else(|| Error::InvalidInput("query parameter is required".to_string()))?
            .as_str()
            .ok_or_else(|| Error::InvalidInput("query parameter must be a string".to_string()))?;

        let (graph, results) = self.manager.search_nodes(namespace, query)?;
        to_json(&SearchNodesResponse {
            graph,
            results,
            query: query.to_string(),
            timestamp: Utc::now(),
        })
    }

    fn handle_open_nodes(&self, namespace: &Namespace, data: Option<&Value>) -> Result<Value> {
        let names: Vec<String> = parse_field(data, "open_nodes", "names")?;
        let graph = self.manager.open_nodes(namespace, &names)?;
        to_json(&graph)
    }
}

impl Tool for MemoryTool {
    fn definition(&self) -> ToolDefinition {
        ToolDefinition {
            name: "memory".to_string(),
            description: "Persistent knowledge graph memory system. Stores entities, \
                          relations, and observations across sessions, partitioned into \
                          namespaces. Entities must be created before relations can \
                          reference them; delete operations permanently remove data."
                .to_string(),
            input_schema: serde_json::json!({
                "type": "object",
                "properties": {
                    "operation": {
                        "type": "string",
                        "description": "Operation to perform",
                        "enum": MEMORY_OPERATIONS,
                    },
                    "namespace": {
                        "type": "string",
                        "description": "Memory namespace for organising memories into separate projects/contexts (default: 'default')",
                        "default": Namespace::DEFAULT,
                    },
                    "data": {
                        "type": "object",
                        "description": "Operation-specific data (structure varies by operation)",
                    },
                },
                "required": ["operation"],
            }),
        }
    }

    fn execute(&self, _ctx: &ToolContext, params: Value) -> Result<Value> {
        let operation = params
            .get("operation")
            .and_then(Value::as_str)
            .ok_or_else(|| {
                Error::InvalidInput("missing or invalid required parameter: operation".to_string())
            })?;

        let namespace = match params.get("namespace").and_then(Value::as_str) {
            Some(s) if !s.is_empty() => Namespace::new(s)?,
            _ => Namespace::default(),
        };

        let data = match params.get("data") {
            None | Some(Value::Null) => None,
            Some(value) if value.is_object() => Some(value),
            Some(_) => {
                return Err(Error::InvalidInput(
                    "data parameter must be an object".to_string(),
                ));
            }
        };

        match operation {
            "create_entities" => self.handle_create_entities(&namespace, data),
            "create_relations" => self.handle_create_relations(&namespace, data),
            "add_observations" => self.handle_add_observations(&namespace, data),
            "delete_entities" => self.handle_delete_entities(&namespace, data),
            "delete_observations" => self.handle_delete_observations(&namespace, data),
            "delete_relations" => self.handle_delete_relations(&namespace, data),
            "read_graph" => self.handle_read_graph(&namespace),
            "search_nodes" => self.handle_search_nodes(&namespace, data),
            "open_nodes" => self.handle_open_nodes(&namespace, data),
            other => Err(Error::InvalidInput(format!("unknown operation: {other}"))),
        }
    }
}

/// Response for `create_entities`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateEntitiesResponse {
    created_entities: Vec<Entity>,
    timestamp: DateTime<Utc>,
}

/// Response for `create_relations`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct CreateRelationsResponse {
    created_relations: Vec<Relation>,
    timestamp: DateTime<Utc>,
}

/// Response for `add_observations`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct AddObservationsResponse {
    results: Vec<ObservationResult>,
    timestamp: DateTime<Utc>,
}

/// Response for operations that only report a count message.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct OperationResponse {
    message: String,
    timestamp: DateTime<Utc>,
}

/// Response for `search_nodes`.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SearchNodesResponse {
    graph: KnowledgeGraph,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    results: Vec<SearchMatch>,
    query: String,
    timestamp: DateTime<Utc>,
}

/// Requires a non-null `data` object for an operation.
fn require_data<'a>(data: Option<&'a Value>, operation: &str) -> Result<&'a Value> {
    data.ok_or_else(|| {
        Error::InvalidInput(format!("data parameter is required for {operation} operation"))
    })
}

/// Extracts and deserializes a required field of the `data` object.
fn parse_field<'a, T: Deserialize<'a>>(
    data: Option<&'a Value>,
    operation: &str,
    field: &str,
) -> Result<T> {
    let data = require_data(data, operation)?;
    let value = data
        .get(field)
        .ok_or_else(|| Error::InvalidInput(format!("{field} parameter is required")))?;
    T::deserialize(value)
        .map_err(|e| Error::InvalidInput(format!("failed to parse {field}: {e}")))
}

/// Serializes a response, mapping failure into the error taxonomy.
fn to_json<T: Serialize>(response: &T) -> Result<Value> {
    serde_json::to_value(response).map_err(|e| Error::OperationFailed {
        operation: "serialize_response".to_string(),
        cause: e.to_string(),
    })
}
