//! Tool discovery subprocess
//!
//! Runs a host-configured command that prints a JSON array of function
//! declarations on stdout.

use std::process::Stdio;

use serde_json::{json, Value};
use tokio::io::{AsyncRead, AsyncReadExt};
use tokio::process::Command;
use tracing::{debug, info, warn};

use super::sanitize::sanitize_parameters;
use crate::ai::types::ToolDeclaration;
use crate::constants;
use crate::error::{AdapterError, Result};

/// Run `command` and return the declarations it prints
///
/// Stdout and stderr are each capped at 10 MiB; going over either cap kills
/// the process.
pub async fn discover_tools(command: &str) -> Result<Vec<ToolDeclaration>> {
    run_discovery(
        command,
        constants::discovery::MAX_STDOUT_BYTES,
        constants::discovery::MAX_STDERR_BYTES,
    )
    .await
}

pub(crate) async fn run_discovery(
    command: &str,
    stdout_limit: usize,
    stderr_limit: usize,
) -> Result<Vec<ToolDeclaration>> {
    let argv = shell_words::split(command)
        .map_err(|e| AdapterError::Discovery(format!("invalid discovery command: {}", e)))?;
    let (program, args) = argv
        .split_first()
        .ok_or_else(|| AdapterError::Discovery("discovery command is empty".to_string()))?;

    let mut cmd = Command::new(program);
    cmd.args(args)
        .kill_on_drop(true)
        .stdin(Stdio::null())
        .stdout(Stdio::piped())
        .stderr(Stdio::piped());

    info!(command = %command, "Running tool discovery");
    let mut child = cmd
        .spawn()
        .map_err(|e| AdapterError::Discovery(format!("failed to spawn `{}`: {}", program, e)))?;

    let (Some(stdout), Some(stderr)) = (child.stdout.take(), child.stderr.take()) else {
        return Err(AdapterError::Discovery("discovery pipes unavailable".to_string()));
    };

    let output = tokio::try_join!(
        read_capped(stdout, stdout_limit, "stdout"),
        read_capped(stderr, stderr_limit, "stderr"),
    );
    let (stdout, stderr) = match output {
        Ok(output) => output,
        Err(e) => {
            warn!(command = %command, error = %e, "Killing tool discovery process");
            let _ = child.kill().await;
            return Err(e);
        }
    };

    let status = child
        .wait()
        .await
        .map_err(|e| AdapterError::Discovery(format!("failed to wait for `{}`: {}", program, e)))?;
    if !status.success() {
        let code = status
            .code()
            .map(|c| c.to_string())
            .unwrap_or_else(|| "signal".to_string());
        let stderr = String::from_utf8_lossy(&stderr);
        warn!(command = %command, code = %code, "Tool discovery exited with failure");
        return Err(AdapterError::Discovery(format!(
            "`{}` exited with code {}: {}",
            command,
            code,
            stderr.trim()
        )));
    }

    let declarations = parse_declarations(&stdout)?;
    info!(count = declarations.len(), "Tool discovery complete");
    Ok(declarations)
}

async fn read_capped<R: AsyncRead + Unpin>(
    mut reader: R,
    limit: usize,
    label: &'static str,
) -> Result<Vec<u8>> {
    let mut collected = Vec::new();
    let mut chunk = [0u8; 8192];
    loop {
        let read = reader
            .read(&mut chunk)
            .await
            .map_err(|e| AdapterError::Discovery(format!("failed to read {}: {}", label, e)))?;
        if read == 0 {
            return Ok(collected);
        }
        if collected.len() + read > limit {
            return Err(AdapterError::Discovery(format!(
                "{} exceeded {} bytes",
                label, limit
            )));
        }
        collected.extend_from_slice(&chunk[..read]);
    }
}

/// Parse discovery output into sanitized declarations
pub fn parse_declarations(stdout: &[u8]) -> Result<Vec<ToolDeclaration>> {
    let items: Vec<Value> = serde_json::from_slice(stdout).map_err(|e| {
        AdapterError::Discovery(format!("discovery output is not a JSON array: {}", e))
    })?;

    let mut declarations = Vec::new();
    for item in &items {
        let wrapped = item
            .get("function_declarations")
            .or_else(|| item.get("functionDeclarations"));
        match wrapped {
            Some(Value::Array(entries)) => {
                for entry in entries {
                    push_declaration(entry, &mut declarations);
                }
            }
            Some(other) => {
                warn!(value = %other, "Ignoring non-array function declarations");
            }
            None => push_declaration(item, &mut declarations),
        }
    }
    Ok(declarations)
}

fn push_declaration(value: &Value, out: &mut Vec<ToolDeclaration>) {
    let Some(name) = value
        .get("name")
        .and_then(Value::as_str)
        .filter(|n| !n.is_empty())
    else {
        warn!("Skipping discovered tool without a name");
        return;
    };

    let description = value
        .get("description")
        .and_then(Value::as_str)
        .unwrap_or_default();
    let mut parameters = match value.get("parameters") {
        Some(params @ Value::Object(_)) => params.clone(),
        _ => json!({}),
    };
    sanitize_parameters(&mut parameters);

    debug!(name, "Discovered tool");
    out.push(ToolDeclaration::new(name, description, parameters));
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn json_file(contents: &str) -> tempfile::NamedTempFile {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        file
    }

    fn script(body: &str) -> (tempfile::TempDir, String) {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("discover.sh");
        std::fs::write(&path, body).unwrap();
        let command = format!("sh {}", shell_words::quote(&path.to_string_lossy()));
        (dir, command)
    }

    #[test]
    fn test_parse_raw_and_wrapped_items() {
        let output = r#"[
            {"name": "raw_tool", "description": "Raw", "parameters": {"type": "object"}},
            {"function_declarations": [{"name": "a"}, {"name": "b", "parameters": "bogus"}]},
            {"functionDeclarations": [{"name": "c"}]}
        ]"#;
        let declarations = parse_declarations(output.as_bytes()).unwrap();
        let names: Vec<&str> = declarations.iter().map(|d| d.name.as_str()).collect();
        assert_eq!(names, vec!["raw_tool", "a", "b", "c"]);
        assert_eq!(declarations[0].description, "Raw");
        assert_eq!(declarations[2].parameters_or_empty(), json!({}));
    }

    #[test]
    fn test_parse_skips_nameless_items() {
        let declarations =
            parse_declarations(br#"[{"description": "no name"}, {"name": ""}, {"name": "ok"}]"#).unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].name, "ok");
    }

    #[test]
    fn test_parse_sanitizes_parameters() {
        let output = r#"[{"name": "t", "parameters": {
            "type": "object",
            "properties": {
                "when": {"type": "string", "format": "date-time"},
                "site": {"type": "STRING", "format": "uri"},
                "mode": {"anyOf": [{"type": "string"}], "default": "fast"}
            }
        }}]"#;
        let declarations = parse_declarations(output.as_bytes()).unwrap();
        let params = declarations[0].parameters_or_empty();
        assert_eq!(params["properties"]["when"]["format"], "date-time");
        assert!(params["properties"]["site"].get("format").is_none());
        assert!(params["properties"]["mode"].get("default").is_none());
    }

    #[test]
    fn test_parse_rejects_non_array() {
        let err = parse_declarations(br#"{"name": "t"}"#).unwrap_err();
        assert_eq!(err.code(), "DiscoveryError");
        assert!(parse_declarations(b"not json").is_err());
    }

    #[tokio::test]
    async fn test_discover_from_command_output() {
        let file = json_file(r#"[{"name": "list_files", "description": "List files"}]"#);
        let command = format!("cat {}", shell_words::quote(&file.path().to_string_lossy()));
        let declarations = discover_tools(&command).await.unwrap();
        assert_eq!(declarations.len(), 1);
        assert_eq!(declarations[0].name, "list_files");
    }

    #[tokio::test]
    async fn test_non_zero_exit_reports_code_and_stderr() {
        let (_dir, command) = script("echo 'registry offline' >&2\nexit 3\n");
        let err = discover_tools(&command).await.unwrap_err();
        let message = err.to_string();
        assert!(message.contains("code 3"));
        assert!(message.contains("registry offline"));
    }

    #[tokio::test]
    async fn test_output_over_cap_fails() {
        let (_dir, command) = script("i=0\nwhile [ $i -lt 200 ]; do echo '[\"xxxxxxxxxxxxxxxxxxxxxxxx\"]'; i=$((i+1)); done\n");
        let err = run_discovery(&command, 1024, 1024).await.unwrap_err();
        assert!(matches!(err, AdapterError::Discovery(ref m) if m.contains("stdout exceeded")));
    }

    #[tokio::test]
    async fn test_spawn_failures() {
        assert!(discover_tools("").await.is_err());
        assert!(discover_tools("'unterminated").await.is_err());
        let err = discover_tools("/definitely/not/a/discovery/binary").await.unwrap_err();
        assert!(err.to_string().contains("failed to spawn"));
    }
}
