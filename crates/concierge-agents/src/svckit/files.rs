//! File Search Tools
//!
//! Both tools are confined to one root directory: folders are only searched
//! below it and files outside it are never read.

use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use agent_core::{
    Result as CoreResult, Tool, ToolCall, ToolContext, ToolResult,
    tool::{ParameterSchema, ToolSchema},
};
use async_trait::async_trait;

use crate::error::{Result, ToolError};

/// How deep below the root a project folder may sit
const SEARCH_DEPTH: usize = 4;
/// How deep the returned tree goes
const TREE_DEPTH: usize = 6;
const MAX_TREE_ENTRIES: usize = 400;
const MAX_FILE_BYTES: u64 = 512 * 1024;

const SKIPPED_DIRS: &[&str] = &[
    ".git",
    "target",
    "node_modules",
    "__pycache__",
    ".venv",
    "venv",
    "dist",
    "build",
];

fn skipped(name: &str) -> bool {
    name.starts_with('.') || SKIPPED_DIRS.contains(&name)
}

/// Folder names compare case-insensitively, ignoring `-`, `_` and spaces
fn folder_key(name: &str) -> String {
    name.chars()
        .filter(|c| !matches!(c, '-' | '_' | ' '))
        .flat_map(char::to_lowercase)
        .collect()
}

async fn canonical_root(root: &Path) -> Result<PathBuf> {
    tokio::fs::canonicalize(root)
        .await
        .map_err(|e| ToolError::storage(root, format!("search root is not accessible: {e}")))
}

/// `find_folder_from_name`
pub struct FindFolderTool {
    root: PathBuf,
}

impl FindFolderTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

/// Breadth-first search for the shallowest directory named like `wanted`
fn find_folder(root: &Path, wanted: &str) -> Option<PathBuf> {
    let wanted = folder_key(wanted);
    let mut level = vec![root.to_path_buf()];
    for _ in 0..SEARCH_DEPTH {
        let mut next = Vec::new();
        for dir in level {
            let Ok(entries) = std::fs::read_dir(&dir) else {
                continue;
            };
            let mut children: Vec<PathBuf> = entries
                .filter_map(std::result::Result::ok)
                .filter(|e| e.file_type().is_ok_and(|t| t.is_dir()))
                .filter(|e| !skipped(&e.file_name().to_string_lossy()))
                .map(|e| e.path())
                .collect();
            children.sort();
            if let Some(hit) = children
                .iter()
                .find(|p| p.file_name().is_some_and(|n| folder_key(&n.to_string_lossy()) == wanted))
            {
                return Some(hit.clone());
            }
            next.extend(children);
        }
        level = next;
    }
    None
}

/// Indented tree of `dir` plus the paths of the files in it
fn render_tree(dir: &Path) -> (String, Vec<PathBuf>) {
    fn walk(dir: &Path, depth: usize, tree: &mut String, files: &mut Vec<PathBuf>, budget: &mut usize) {
        let Ok(entries) = std::fs::read_dir(dir) else {
            return;
        };
        let mut entries: Vec<_> = entries.filter_map(std::result::Result::ok).collect();
        entries.sort_by_key(std::fs::DirEntry::file_name);

        for entry in entries {
            if *budget == 0 {
                return;
            }
            let name = entry.file_name().to_string_lossy().into_owned();
            let is_dir = entry.file_type().is_ok_and(|t| t.is_dir());
            if is_dir && skipped(&name) {
                continue;
            }
            *budget -= 1;
            let indent = "  ".repeat(depth);
            if is_dir {
                let _ = writeln!(tree, "{indent}{name}/");
                if depth + 1 < TREE_DEPTH {
                    walk(&entry.path(), depth + 1, tree, files, budget);
                }
            } else {
                let _ = writeln!(tree, "{indent}{name}");
                files.push(entry.path());
            }
        }
    }

    let mut tree = String::new();
    let mut files = Vec::new();
    let mut budget = MAX_TREE_ENTRIES;
    walk(dir, 0, &mut tree, &mut files, &mut budget);
    if budget == 0 {
        tree.push_str("... (truncated)\n");
    }
    (tree, files)
}

#[async_trait]
impl Tool for FindFolderTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "find_folder_from_name".into(),
            description: "Locate a project folder by name under the configured root directory and return its tree \
                          structure with every file path. Use the returned paths with file_read."
                .into(),
            parameters: vec![ParameterSchema::required(
                "folder_name",
                "string",
                "Project or folder name, e.g. \"project-charon\"",
            )],
            input_schema: None,
            category: Some("files".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let wanted = call.required_str("folder_name")?.trim().to_owned();
        if wanted.is_empty() {
            return Err(ToolError::InvalidInput("folder_name must not be empty".into()).into());
        }
        let root = canonical_root(&self.root).await?;

        let search_root = root.clone();
        let needle = wanted.clone();
        let found = tokio::task::spawn_blocking(move || {
            find_folder(&search_root, &needle).map(|dir| {
                let (tree, files) = render_tree(&dir);
                (dir, tree, files)
            })
        })
        .await
        .map_err(|e| ToolError::storage(&root, e))?;

        let Some((dir, tree, files)) = found else {
            return Ok(ToolResult::failure(
                &call.name,
                format!("No folder named '{wanted}' under {}", root.display()),
            ));
        };
        tracing::debug!(folder = %dir.display(), files = files.len(), "folder located");

        let mut output = format!("Folder: {}\n\n{tree}\nFiles ({}):\n", dir.display(), files.len());
        for file in &files {
            let _ = writeln!(output, "{}", file.display());
        }
        Ok(ToolResult::success(&call.name, output))
    }
}

/// `file_read`
pub struct FileReadTool {
    root: PathBuf,
}

impl FileReadTool {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }

    /// Canonical path of `requested`, which must stay inside the root
    async fn resolve(&self, requested: &str) -> Result<PathBuf> {
        let root = canonical_root(&self.root).await?;
        let requested = Path::new(requested);
        let candidate = if requested.is_absolute() {
            requested.to_path_buf()
        } else {
            root.join(requested)
        };
        let resolved = tokio::fs::canonicalize(&candidate)
            .await
            .map_err(|_| ToolError::InvalidInput(format!("File not found: {}", candidate.display())))?;
        if resolved.starts_with(&root) {
            Ok(resolved)
        } else {
            Err(ToolError::OutsideRoot(resolved))
        }
    }
}

fn line_arg(call: &ToolCall, key: &str) -> Option<usize> {
    call.int_arg(key).and_then(|n| usize::try_from(n).ok()).filter(|n| *n > 0)
}

#[async_trait]
impl Tool for FileReadTool {
    fn schema(&self) -> ToolSchema {
        ToolSchema {
            name: "file_read".into(),
            description: "Read a text file inside the project root, with line numbers. Optionally restrict the \
                          output to a range of lines."
                .into(),
            parameters: vec![
                ParameterSchema::required("path", "string", "File path, absolute or relative to the root"),
                ParameterSchema::optional("start_line", "integer", "First line to return (1-based)"),
                ParameterSchema::optional("end_line", "integer", "Last line to return (inclusive)"),
            ],
            input_schema: None,
            category: Some("files".into()),
            has_side_effects: false,
        }
    }

    async fn execute(&self, call: &ToolCall, _ctx: &ToolContext) -> CoreResult<ToolResult> {
        let path = self.resolve(call.required_str("path")?.trim()).await?;

        let meta = tokio::fs::metadata(&path).await.map_err(|e| ToolError::storage(&path, e))?;
        if !meta.is_file() {
            return Err(ToolError::InvalidInput(format!("{} is not a file", path.display())).into());
        }
        if meta.len() > MAX_FILE_BYTES {
            return Ok(ToolResult::failure(
                &call.name,
                format!("{} is too large to read ({} bytes)", path.display(), meta.len()),
            ));
        }

        let bytes = tokio::fs::read(&path).await.map_err(|e| ToolError::storage(&path, e))?;
        let Ok(content) = String::from_utf8(bytes) else {
            return Ok(ToolResult::failure(
                &call.name,
                format!("{} is not a text file", path.display()),
            ));
        };

        let total = content.lines().count();
        let first = line_arg(call, "start_line").unwrap_or(1);
        let last = line_arg(call, "end_line").unwrap_or(total).min(total);

        let mut output = format!("{} (lines {first}-{last} of {total})\n", path.display());
        for (n, line) in content.lines().enumerate().skip(first - 1).take(last.saturating_sub(first - 1)) {
            let _ = writeln!(output, "{:>5} | {line}", n + 1);
        }
        Ok(ToolResult::success(&call.name, output))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::svckit::test_support::{ctx, invoke};

    fn project() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        let base = dir.path().join("work/Project-Charon");
        std::fs::create_dir_all(base.join("src/agents")).unwrap();
        std::fs::create_dir_all(base.join(".git")).unwrap();
        std::fs::create_dir_all(base.join("node_modules/left-pad")).unwrap();
        std::fs::write(base.join("README.md"), "# Charon\n").unwrap();
        std::fs::write(base.join("src/main.rs"), "fn main() {\n    run();\n}\n").unwrap();
        std::fs::write(base.join("src/agents/books.rs"), "// books\n").unwrap();
        std::fs::write(base.join(".git/HEAD"), "ref: refs/heads/main\n").unwrap();
        dir
    }

    #[tokio::test]
    async fn finds_folders_by_loose_name() {
        let dir = project();
        let result = invoke(&FindFolderTool::new(dir.path()), r#"{"folder_name": "project_charon"}"#).await;
        assert!(result.success, "{}", result.output);
        assert!(result.output.contains("src/\n"));
        assert!(result.output.contains("    books.rs"));
        assert!(result.output.contains("Files (3):"));
        assert!(!result.output.contains("HEAD"));
        assert!(!result.output.contains("left-pad"));

        let missing = invoke(&FindFolderTool::new(dir.path()), r#"{"folder_name": "CleanEnergy"}"#).await;
        assert!(!missing.success);
    }

    #[tokio::test]
    async fn reads_line_ranges() {
        let dir = project();
        let tool = FileReadTool::new(dir.path());
        let result = invoke(&tool, r#"{"path": "work/Project-Charon/src/main.rs", "start_line": 2, "end_line": 2}"#).await;
        assert!(result.success);
        assert!(result.output.contains("(lines 2-2 of 3)"));
        assert!(result.output.contains("    2 |     run();"));
        assert!(!result.output.contains("fn main"));
    }

    #[tokio::test]
    async fn refuses_paths_outside_the_root() {
        let dir = project();
        let outside = tempfile::NamedTempFile::new().unwrap();
        let tool = FileReadTool::new(dir.path().join("work"));

        for path in [outside.path().display().to_string(), "../work/../../etc/passwd".into()] {
            let call = ToolCall::parse("c", "file_read", &serde_json::json!({ "path": &path }).to_string()).unwrap();
            assert!(tool.execute(&call, &ctx()).await.is_err(), "{path}");
        }
    }
}
