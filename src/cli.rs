//! CLI command implementations.
//!
//! Three commands over the tool façade:
//!
//! | Command | Description |
//! |---------|-------------|
//! | `call` | Run one memory operation and print the JSON result |
//! | `tools` | Print the registered tool definitions |
//! | `status` | Print backing-file information for a namespace |

// CLI output goes to stdout by design.
#![allow(clippy::print_stdout)]

use serde_json::Value;

use crate::config::MemoryConfig;
use crate::storage::GraphStore;
use crate::tools::ToolRegistry;
use crate::{Error, Namespace, Result};

/// Runs one façade operation and prints the JSON result.
///
/// `data` is the operation payload as a JSON string; `-` reads it from
/// stdin.
pub fn run_call(
    registry: &ToolRegistry,
    operation: &str,
    namespace: &str,
    data: Option<&str>,
) -> Result<()> {
    let payload = match data {
        Some("-") => Some(read_stdin()?),
        Some(raw) => Some(raw.to_string()),
        None => None,
    };

    let data_value: Value = match payload {
        Some(raw) => serde_json::from_str(&raw)
            .map_err(|e| Error::InvalidInput(format!("data is not valid JSON: {e}")))?,
        None => Value::Null,
    };

    let params = serde_json::json!({
        "operation": operation,
        "namespace": namespace,
        "data": data_value,
    });

    let result = registry.execute("memory", params)?;
    println!("{}", pretty(&result)?);
    Ok(())
}

/// Prints the registered tool definitions as JSON.
pub fn run_tools(registry: &ToolRegistry) -> Result<()> {
    let mut definitions = registry.list_tools();
    definitions.sort_by(|a, b| a.name.cmp(&b.name));
    println!("{}", pretty(&definitions)?);
    Ok(())
}

/// Prints backing-file information for a namespace.
pub fn run_status(config: MemoryConfig, namespace: &str) -> Result<()> {
    let namespace = Namespace::new(namespace)?;
    let store = GraphStore::new(config);
    let info = store.storage_info(&namespace)?;
    println!("{}", pretty(&info)?);
    Ok(())
}

/// Renders an error as the structured JSON the façade contract promises.
#[must_use]
pub fn render_error(error: &Error) -> String {
    serde_json::json!({
        "error": error.to_string(),
        "retryable": error.is_retryable(),
    })
    .to_string()
}

fn read_stdin() -> Result<String> {
    std::io::read_to_string(std::io::stdin()).map_err(|e| Error::OperationFailed {
        operation: "read_stdin".to_string(),
        cause: e.to_string(),
    })
}

fn pretty<T: serde::Serialize>(value: &T) -> Result<String> {
    serde_json::to_string_pretty(value).map_err(|e| Error::OperationFailed {
        operation: "serialize_output".to_string(),
        cause: e.to_string(),
    })
}
