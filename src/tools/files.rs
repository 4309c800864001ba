use serde_json::{json, Value};
use tokio::fs;

use crate::registry::Tool;
use crate::schema::{FieldType, Schema};

/// All file-system tools, ready to register.
pub fn file_tools() -> Vec<Tool> {
    vec![
        create_file_tool(),
        read_file_tool(),
        delete_file_tool(),
        move_path_tool(),
        find_files_tool(),
    ]
}

pub fn create_file_tool() -> Tool {
    let schema = Schema::new()
        .field("path", FieldType::string(), "Path of the file to create")
        .field("content", FieldType::string(), "Content to write into the file");
    Tool::new(
        "create_file",
        "Creates a new file with the given content",
        schema,
        |arguments: Value| async move {
            let path = argument_str(&arguments, "path");
            Ok(
                match fs::write(&path, argument_str(&arguments, "content")).await {
                    Ok(()) => json!({ "status": "success", "message": format!("Created {path}") }),
                    Err(error) => json!({ "error": error.to_string() }),
                },
            )
        },
    )
}

pub fn read_file_tool() -> Tool {
    let schema = Schema::new().field("path", FieldType::string(), "Path of the file to read");
    Tool::new(
        "read_file",
        "Reads the content of a file",
        schema,
        |arguments: Value| async move {
            let path = argument_str(&arguments, "path");
            Ok(match fs::read_to_string(&path).await {
                Ok(content) => json!({ "path": path, "content": content }),
                Err(error) => json!({ "error": error.to_string() }),
            })
        },
    )
}

pub fn delete_file_tool() -> Tool {
    let schema = Schema::new().field("path", FieldType::string(), "Path of the file to delete");
    Tool::new(
        "delete_file",
        "Deletes the given file",
        schema,
        |arguments: Value| async move {
            let path = argument_str(&arguments, "path");
            Ok(match fs::remove_file(&path).await {
                Ok(()) => json!({ "status": "success", "message": format!("Deleted {path}") }),
                Err(error) => json!({ "error": error.to_string() }),
            })
        },
    )
}

pub fn move_path_tool() -> Tool {
    let schema = Schema::new()
        .field("src", FieldType::string(), "Source path")
        .field("dest", FieldType::string(), "Destination path");
    Tool::new(
        "move_path",
        "Moves a file or directory to another path",
        schema,
        |arguments: Value| async move {
            let src = argument_str(&arguments, "src");
            let dest = argument_str(&arguments, "dest");
            Ok(match fs::rename(&src, &dest).await {
                Ok(()) => {
                    json!({ "status": "success", "message": format!("Moved {src} to {dest}") })
                }
                Err(error) => json!({ "error": error.to_string() }),
            })
        },
    )
}

pub fn find_files_tool() -> Tool {
    let schema = Schema::new()
        .field(
            "substring",
            FieldType::string(),
            "Substring to search for in file names",
        )
        .optional_with_default(
            "dir",
            FieldType::string(),
            "Directory to search in",
            json!("."),
        );
    Tool::new(
        "find_files",
        "Finds files in a directory whose names contain a substring",
        schema,
        |arguments: Value| async move {
            let substring = argument_str(&arguments, "substring");
            let dir = argument_str(&arguments, "dir");
            Ok(match list_matching(&dir, &substring).await {
                Ok(files) => json!({ "files": files }),
                Err(error) => json!({ "error": error.to_string() }),
            })
        },
    )
}

async fn list_matching(dir: &str, substring: &str) -> std::io::Result<Vec<String>> {
    let mut entries = fs::read_dir(dir).await?;
    let mut files = Vec::new();
    while let Some(entry) = entries.next_entry().await? {
        let name = entry.file_name().to_string_lossy().into_owned();
        if name.contains(substring) {
            files.push(name);
        }
    }
    files.sort();
    Ok(files)
}

fn argument_str(arguments: &Value, name: &str) -> String {
    arguments[name].as_str().unwrap_or_default().to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::registry::ToolRegistry;

    fn registry() -> ToolRegistry {
        let mut registry = ToolRegistry::new();
        for tool in file_tools() {
            registry.register(tool).unwrap();
        }
        registry
    }

    #[tokio::test]
    async fn test_create_read_delete_round_trip() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("note.txt").to_string_lossy().into_owned();
        let registry = registry();

        let created = registry
            .dispatch("create_file", json!({"path": &path, "content": "hello"}))
            .await
            .unwrap();
        assert_eq!(created["status"], "success");

        let read = registry
            .dispatch("read_file", json!({"path": &path}))
            .await
            .unwrap();
        assert_eq!(read["content"], "hello");

        let deleted = registry
            .dispatch("delete_file", json!({"path": &path}))
            .await
            .unwrap();
        assert_eq!(deleted["status"], "success");

        let missing = registry
            .dispatch("read_file", json!({"path": &path}))
            .await
            .unwrap();
        assert!(missing["error"].is_string());
    }

    #[tokio::test]
    async fn test_move_path() {
        let dir = tempfile::tempdir().unwrap();
        let src = dir.path().join("a.txt").to_string_lossy().into_owned();
        let dest = dir.path().join("b.txt").to_string_lossy().into_owned();
        std::fs::write(&src, "x").unwrap();

        let moved = registry()
            .dispatch("move_path", json!({"src": &src, "dest": &dest}))
            .await
            .unwrap();
        assert_eq!(moved["status"], "success");
        assert!(std::path::Path::new(&dest).exists());
    }

    #[tokio::test]
    async fn test_find_files_filters_by_substring() {
        let dir = tempfile::tempdir().unwrap();
        for name in ["report_a.csv", "report_b.csv", "notes.md"] {
            std::fs::write(dir.path().join(name), "").unwrap();
        }

        let found = registry()
            .dispatch(
                "find_files",
                json!({"substring": "report", "dir": dir.path().to_string_lossy()}),
            )
            .await
            .unwrap();
        assert_eq!(found["files"], json!(["report_a.csv", "report_b.csv"]));
    }
}
