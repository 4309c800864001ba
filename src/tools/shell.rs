use std::time::Duration;

use serde_json::{json, Value};
use tokio::process::Command;
use tokio::time::timeout;

use crate::registry::Tool;
use crate::schema::{FieldType, Schema};

/// A tool that runs a shell command on the host.
pub fn run_shell_tool() -> Tool {
    let schema = Schema::new()
        .field("command", FieldType::string(), "The shell command to run")
        .optional(
            "cwd",
            FieldType::string(),
            "Working directory in which to run the command",
        )
        .optional_with_default(
            "timeout",
            FieldType::integer_in(1, 600),
            "Maximum seconds to allow the command to run",
            json!(30),
        );
    Tool::new(
        "run_shell",
        "Runs a shell command on the host and returns its output. \
         Useful for file operations, system queries, or invoking other CLI tools.",
        schema,
        |arguments: Value| async move { Ok(run(&arguments).await) },
    )
}

async fn run(arguments: &Value) -> Value {
    let command = arguments["command"].as_str().unwrap_or_default();
    if command.trim().is_empty() {
        return json!({ "error": "command must not be empty" });
    }

    let mut child = Command::new("sh");
    child.arg("-c").arg(command);
    if let Some(cwd) = arguments.get("cwd").and_then(|c| c.as_str()) {
        child.current_dir(cwd);
    }

    let seconds = arguments["timeout"].as_i64().unwrap_or(30).max(1) as u64;
    match timeout(Duration::from_secs(seconds), child.output()).await {
        Err(_) => json!({ "error": format!("command timed out after {seconds}s") }),
        Ok(Err(error)) => json!({ "error": error.to_string() }),
        Ok(Ok(output)) => json!({
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
            "returncode": output.status.code(),
        }),
    }
}
