//! Built-in executor implementations.

use std::collections::HashMap;
use std::path::{Component, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use sha2::{Digest, Sha256};
use tokio::process::Command;
use tokio::time::timeout;

use podium_config::ExecutorSpec;
use podium_core::{ExecContext, ExecFailure, ExecOutcome, Executor};
use podium_gates::{ApprovalQueue, GatedAction};

fn config_string(config: &Value, key: &str) -> Option<String> {
    config
        .get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn config_bool(config: &Value, key: &str) -> Option<bool> {
    config.get(key).and_then(|v| v.as_bool())
}

fn config_u64(config: &Value, key: &str) -> Option<u64> {
    config.get(key).and_then(|v| v.as_u64())
}

fn config_string_array(config: &Value, key: &str) -> Option<Vec<String>> {
    config.get(key).and_then(|v| {
        v.as_array().map(|arr| {
            arr.iter()
                .filter_map(|v| v.as_str().map(|s| s.to_string()))
                .collect::<Vec<_>>()
        })
    })
}

fn args_get_string(args: &Value, key: &str) -> Option<String> {
    args.get(key)
        .and_then(|v| v.as_str())
        .map(|s| s.to_string())
}

fn has_parent_dir(path: &str) -> bool {
    PathBuf::from(path)
        .components()
        .any(|c| matches!(c, Component::ParentDir))
}

fn sha256_hex(data: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hex::encode(hasher.finalize())
}

/// Echo executor
pub struct EchoExecutor {
    name: String,
    description: String,
    prefix: String,
}

impl EchoExecutor {
    pub fn from_spec(spec: &ExecutorSpec) -> Self {
        let prefix = config_string(&spec.config, "prefix").unwrap_or_default();
        Self {
            name: spec.name.clone(),
            description: spec.description_or("Echoes the input back as output"),
            prefix,
        }
    }
}

#[async_trait]
impl Executor for EchoExecutor {
    fn id(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, args: &Value, _ctx: &ExecContext) -> ExecOutcome {
        let text = args_get_string(args, "text")
            .or_else(|| args_get_string(args, "prompt"))
            .unwrap_or_default();
        ExecOutcome::success(json!({"echo": format!("{}{}", self.prefix, text)}))
    }
}

/// Application launcher with an allowlist policy.
///
/// The actual launch is delegated to a configurable launcher command; with
/// none configured the executor only reports the resolved launch.
pub struct AppLaunchExecutor {
    name: String,
    description: String,
    allowlist: Vec<String>,
    launcher: Option<String>,
    timeout_secs: u64,
}

impl AppLaunchExecutor {
    pub fn from_spec(spec: &ExecutorSpec) -> Self {
        Self {
            name: spec.name.clone(),
            description: spec.description_or("Launches or focuses an allowed application"),
            allowlist: config_string_array(&spec.config, "allowlist").unwrap_or_default(),
            launcher: config_string(&spec.config, "launcher"),
            timeout_secs: config_u64(&spec.config, "timeout_secs").unwrap_or(10),
        }
    }

    fn is_allowed(&self, app: &str) -> bool {
        self.allowlist
            .iter()
            .any(|allowed| allowed.eq_ignore_ascii_case(app))
    }
}

#[async_trait]
impl Executor for AppLaunchExecutor {
    fn id(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, args: &Value, _ctx: &ExecContext) -> ExecOutcome {
        let Some(app) = args_get_string(args, "app") else {
            return ExecOutcome::failed(ExecFailure::InvalidCommand, "missing 'app' argument");
        };
        if !self.is_allowed(&app) {
            return ExecOutcome::failed(
                ExecFailure::AppNotAllowed,
                format!("application '{}' is not on the allowlist", app),
            );
        }

        if let Some(launcher) = &self.launcher {
            let command = format!("{} {}", launcher, app);
            match run_shell(&command, self.timeout_secs).await {
                Ok(output) if output.success => {}
                Ok(output) => {
                    return ExecOutcome::failed(
                        ExecFailure::ExecutionFailed,
                        format!("launcher exited with {}: {}", output.exit_code, output.stderr),
                    );
                }
                Err(message) => {
                    return ExecOutcome::failed(ExecFailure::ExecutionFailed, message)
                }
            }
        }

        ExecOutcome::success(json!({"launched": app}))
    }
}

/// Shell command executor behind the asynchronous approval gate.
///
/// Commands matching one of the read-only prefixes run directly; everything
/// else enqueues an approval item and parks the calling task until a human
/// resolves it. Re-invocation after approval sets `gate_bypass`.
pub struct ShellExecutor {
    name: String,
    description: String,
    approvals: Arc<ApprovalQueue>,
    approval_ttl: chrono::Duration,
    readonly_prefixes: Vec<String>,
    timeout_secs: u64,
    enabled: bool,
}

impl ShellExecutor {
    pub fn from_spec(
        spec: &ExecutorSpec,
        approvals: Arc<ApprovalQueue>,
        approval_ttl: chrono::Duration,
    ) -> Self {
        let readonly_prefixes = config_string_array(&spec.config, "readonly_prefixes")
            .unwrap_or_else(|| {
                ["ls", "cat", "pwd", "git status", "git log", "git diff"]
                    .iter()
                    .map(|s| s.to_string())
                    .collect()
            });
        Self {
            name: spec.name.clone(),
            description: spec.description_or("Runs shell commands, gated by human approval"),
            approvals,
            approval_ttl,
            readonly_prefixes,
            timeout_secs: config_u64(&spec.config, "timeout_secs").unwrap_or(30),
            enabled: config_bool(&spec.config, "enabled").unwrap_or(true),
        }
    }

    fn is_readonly(&self, command: &str) -> bool {
        let trimmed = command.trim();
        self.readonly_prefixes
            .iter()
            .any(|prefix| trimmed.starts_with(prefix.as_str()))
    }
}

#[async_trait]
impl Executor for ShellExecutor {
    fn id(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, args: &Value, ctx: &ExecContext) -> ExecOutcome {
        if !self.enabled {
            return ExecOutcome::failed(
                ExecFailure::ExtensionDisabled,
                "shell executor is disabled",
            );
        }
        let Some(command) = args_get_string(args, "command") else {
            return ExecOutcome::failed(ExecFailure::InvalidCommand, "missing 'command' argument");
        };

        if !ctx.gate_bypass && !self.is_readonly(&command) {
            tracing::debug!(executor_id = %self.name, command = %command, "gating mutating command");
            let item = self
                .approvals
                .enqueue(
                    "shell",
                    GatedAction {
                        executor_id: self.name.clone(),
                        args: args.clone(),
                    },
                    format!("mutating shell command: {}", command),
                    self.approval_ttl,
                    ctx.task_id.clone(),
                )
                .await;
            return ExecOutcome::ApprovalRequired {
                approval_id: item.id,
                message: "command requires manual approval".to_string(),
            };
        }

        match run_shell(&command, self.timeout_secs).await {
            Ok(output) if output.success => ExecOutcome::success(json!({
                "stdout": output.stdout,
                "stderr": output.stderr,
                "exitCode": output.exit_code,
            })),
            Ok(output) => ExecOutcome::failed(
                ExecFailure::ExecutionFailed,
                format!("command exited with {}: {}", output.exit_code, output.stderr),
            ),
            Err(message) => ExecOutcome::failed(ExecFailure::ExecutionFailed, message),
        }
    }
}

/// Outbound HTTP integration executor
pub struct HttpRequestExecutor {
    name: String,
    description: String,
    client: reqwest::Client,
    default_headers: HashMap<String, String>,
}

impl HttpRequestExecutor {
    pub fn from_spec(spec: &ExecutorSpec) -> Self {
        let timeout_secs = config_u64(&spec.config, "timeout_secs").unwrap_or(30);
        let default_headers = spec
            .config
            .get("headers")
            .and_then(|v| v.as_object())
            .map(|obj| {
                obj.iter()
                    .filter_map(|(k, v)| v.as_str().map(|s| (k.clone(), s.to_string())))
                    .collect()
            })
            .unwrap_or_default();
        Self {
            name: spec.name.clone(),
            description: spec.description_or("Performs outbound HTTP integration calls"),
            client: reqwest::Client::builder()
                .timeout(Duration::from_secs(timeout_secs))
                .build()
                .unwrap_or_default(),
            default_headers,
        }
    }
}

#[async_trait]
impl Executor for HttpRequestExecutor {
    fn id(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, args: &Value, _ctx: &ExecContext) -> ExecOutcome {
        let Some(url) = args_get_string(args, "url") else {
            return ExecOutcome::failed(ExecFailure::InvalidCommand, "missing 'url' argument");
        };
        let method = args_get_string(args, "method").unwrap_or_else(|| "GET".to_string());
        let mut request = match method.to_ascii_uppercase().as_str() {
            "GET" => self.client.get(&url),
            "POST" => self.client.post(&url),
            "PUT" => self.client.put(&url),
            "DELETE" => self.client.delete(&url),
            other => {
                return ExecOutcome::failed(
                    ExecFailure::InvalidCommand,
                    format!("unsupported method '{}'", other),
                );
            }
        };
        for (key, value) in &self.default_headers {
            request = request.header(key, value);
        }
        if let Some(body) = args.get("body") {
            request = request.json(body);
        }

        match request.send().await {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                ExecOutcome::success(json!({"status": status, "body": body}))
            }
            Err(err) => ExecOutcome::failed(ExecFailure::ExecutionFailed, err.to_string()),
        }
    }
}

/// Workspace-rooted file writer.
///
/// Reports the previous and resulting content hashes so confirm-token
/// surfaces can bind a plan to a specific file state; a stale `baseSha256`
/// fails the write before anything is touched.
pub struct FileWriteExecutor {
    name: String,
    description: String,
    root: PathBuf,
}

impl FileWriteExecutor {
    pub fn from_spec(spec: &ExecutorSpec, workspace_root: PathBuf) -> Self {
        let root = config_string(&spec.config, "root")
            .map(PathBuf::from)
            .unwrap_or(workspace_root);
        Self {
            name: spec.name.clone(),
            description: spec.description_or("Writes files under the workspace root"),
            root,
        }
    }
}

#[async_trait]
impl Executor for FileWriteExecutor {
    fn id(&self) -> &str {
        &self.name
    }

    fn description(&self) -> &str {
        &self.description
    }

    async fn execute(&self, args: &Value, _ctx: &ExecContext) -> ExecOutcome {
        let Some(path) = args_get_string(args, "path") else {
            return ExecOutcome::failed(ExecFailure::InvalidCommand, "missing 'path' argument");
        };
        let Some(content) = args_get_string(args, "content") else {
            return ExecOutcome::failed(ExecFailure::InvalidCommand, "missing 'content' argument");
        };
        if has_parent_dir(&path) || PathBuf::from(&path).is_absolute() {
            return ExecOutcome::failed(
                ExecFailure::InvalidCommand,
                "path must be relative to the workspace root",
            );
        }

        let target = self.root.join(&path);
        let previous = match tokio::fs::read(&target).await {
            Ok(bytes) => Some(sha256_hex(&bytes)),
            Err(err) if err.kind() == std::io::ErrorKind::NotFound => None,
            Err(err) => {
                return ExecOutcome::failed(
                    ExecFailure::ExecutionFailed,
                    format!("read '{}' failed: {}", path, err),
                );
            }
        };

        if let Some(base) = args_get_string(args, "baseSha256") {
            if previous.as_deref() != Some(base.as_str()) {
                return ExecOutcome::failed(
                    ExecFailure::ExecutionFailed,
                    format!("base content hash mismatch for '{}'; re-plan against the current file", path),
                );
            }
        }

        if let Some(parent) = target.parent() {
            if let Err(err) = tokio::fs::create_dir_all(parent).await {
                return ExecOutcome::failed(
                    ExecFailure::ExecutionFailed,
                    format!("create parent dirs for '{}' failed: {}", path, err),
                );
            }
        }
        if let Err(err) = tokio::fs::write(&target, content.as_bytes()).await {
            return ExecOutcome::failed(
                ExecFailure::ExecutionFailed,
                format!("write '{}' failed: {}", path, err),
            );
        }

        let mut payload = json!({
            "path": path,
            "bytesWritten": content.len(),
            "sha256": sha256_hex(content.as_bytes()),
        });
        if let Some(previous) = previous {
            payload["previousSha256"] = json!(previous);
        }
        ExecOutcome::success(payload)
    }
}

struct ShellOutput {
    success: bool,
    exit_code: i32,
    stdout: String,
    stderr: String,
}

async fn run_shell(command: &str, timeout_secs: u64) -> Result<ShellOutput, String> {
    let future = Command::new("sh").arg("-c").arg(command).output();
    let output = match timeout(Duration::from_secs(timeout_secs), future).await {
        Ok(Ok(output)) => output,
        Ok(Err(err)) => return Err(format!("spawn failed: {}", err)),
        Err(_) => return Err(format!("command timed out after {}s", timeout_secs)),
    };
    Ok(ShellOutput {
        success: output.status.success(),
        exit_code: output.status.code().unwrap_or(-1),
        stdout: String::from_utf8_lossy(&output.stdout).to_string(),
        stderr: String::from_utf8_lossy(&output.stderr).to_string(),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use podium_bus::EventHub;
    use serde_json::json;

    fn spec(name: &str, kind: &str, config: Value) -> ExecutorSpec {
        ExecutorSpec {
            name: name.to_string(),
            kind: kind.to_string(),
            description: None,
            config,
        }
    }

    #[test]
    fn test_echo_applies_prefix() {
        tokio_test::block_on(async {
            let executor = EchoExecutor::from_spec(&spec("echo", "echo", json!({"prefix": "> "})));
            let outcome = executor
                .execute(&json!({"text": "hi"}), &ExecContext::default())
                .await;
            match outcome {
                ExecOutcome::Success { payload } => assert_eq!(payload["echo"], "> hi"),
                other => panic!("unexpected outcome: {:?}", other),
            }
        });
    }

    #[test]
    fn test_app_launch_refuses_unlisted_app() {
        tokio_test::block_on(async {
            let executor = AppLaunchExecutor::from_spec(&spec(
                "app_launch",
                "app_launch",
                json!({"allowlist": ["Notes"]}),
            ));
            let outcome = executor
                .execute(&json!({"app": "Terminal"}), &ExecContext::default())
                .await;
            match outcome {
                ExecOutcome::Failed { code, message } => {
                    assert_eq!(code, ExecFailure::AppNotAllowed);
                    assert!(message.contains("Terminal"));
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        });
    }

    #[test]
    fn test_app_launch_allowlist_is_case_insensitive() {
        tokio_test::block_on(async {
            let executor = AppLaunchExecutor::from_spec(&spec(
                "app_launch",
                "app_launch",
                json!({"allowlist": ["Notes"]}),
            ));
            let outcome = executor
                .execute(&json!({"app": "notes"}), &ExecContext::default())
                .await;
            match outcome {
                ExecOutcome::Success { payload } => assert_eq!(payload["launched"], "notes"),
                other => panic!("unexpected outcome: {:?}", other),
            }
        });
    }

    #[test]
    fn test_shell_gates_mutating_commands() {
        tokio_test::block_on(async {
            let approvals = Arc::new(ApprovalQueue::new(Arc::new(EventHub::new())));
            let executor = ShellExecutor::from_spec(
                &spec("shell", "shell", json!({})),
                approvals.clone(),
                chrono::Duration::minutes(5),
            );
            let outcome = executor
                .execute(
                    &json!({"command": "rm -rf build"}),
                    &ExecContext::for_task("t1"),
                )
                .await;
            match outcome {
                ExecOutcome::ApprovalRequired { approval_id, .. } => {
                    let item = approvals.get(&approval_id).await.expect("item");
                    assert_eq!(item.task_id.as_deref(), Some("t1"));
                    assert_eq!(item.action.executor_id, "shell");
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        });
    }

    #[test]
    fn test_shell_runs_readonly_commands_directly() {
        tokio_test::block_on(async {
            let approvals = Arc::new(ApprovalQueue::new(Arc::new(EventHub::new())));
            let executor = ShellExecutor::from_spec(
                &spec("shell", "shell", json!({"readonly_prefixes": ["echo"]})),
                approvals,
                chrono::Duration::minutes(5),
            );
            let outcome = executor
                .execute(&json!({"command": "echo ok"}), &ExecContext::default())
                .await;
            match outcome {
                ExecOutcome::Success { payload } => {
                    assert_eq!(payload["exitCode"], 0);
                    assert!(payload["stdout"].as_str().unwrap().contains("ok"));
                }
                other => panic!("unexpected outcome: {:?}", other),
            }
        });
    }

    #[test]
    fn test_shell_bypass_skips_the_gate() {
        tokio_test::block_on(async {
            let approvals = Arc::new(ApprovalQueue::new(Arc::new(EventHub::new())));
            let executor = ShellExecutor::from_spec(
                &spec("shell", "shell", json!({})),
                approvals.clone(),
                chrono::Duration::minutes(5),
            );
            let ctx = ExecContext::for_task("t1").bypassing_gates();
            let outcome = executor.execute(&json!({"command": "true"}), &ctx).await;
            assert!(matches!(outcome, ExecOutcome::Success { .. }));
            assert!(approvals.pending(None).await.is_empty());
        });
    }

    #[test]
    fn test_disabled_shell_reports_extension_disabled() {
        tokio_test::block_on(async {
            let approvals = Arc::new(ApprovalQueue::new(Arc::new(EventHub::new())));
            let executor = ShellExecutor::from_spec(
                &spec("shell", "shell", json!({"enabled": false})),
                approvals,
                chrono::Duration::minutes(5),
            );
            let outcome = executor
                .execute(&json!({"command": "ls"}), &ExecContext::default())
                .await;
            assert!(matches!(
                outcome,
                ExecOutcome::Failed {
                    code: ExecFailure::ExtensionDisabled,
                    ..
                }
            ));
        });
    }

    #[test]
    fn test_file_write_rejects_path_traversal() {
        tokio_test::block_on(async {
            let executor = FileWriteExecutor::from_spec(
                &spec("file_write", "file_write", json!({})),
                std::env::temp_dir(),
            );
            let outcome = executor
                .execute(
                    &json!({"path": "../escape.txt", "content": "x"}),
                    &ExecContext::default(),
                )
                .await;
            assert!(matches!(
                outcome,
                ExecOutcome::Failed {
                    code: ExecFailure::InvalidCommand,
                    ..
                }
            ));
        });
    }

    #[test]
    fn test_file_write_reports_hashes_and_checks_base() {
        tokio_test::block_on(async {
            let root = std::env::temp_dir().join(format!("podium-test-{}", std::process::id()));
            tokio::fs::create_dir_all(&root).await.unwrap();
            let executor =
                FileWriteExecutor::from_spec(&spec("file_write", "file_write", json!({})), root.clone());

            let first = executor
                .execute(
                    &json!({"path": "note.txt", "content": "v1"}),
                    &ExecContext::default(),
                )
                .await;
            let sha_v1 = match first {
                ExecOutcome::Success { payload } => {
                    assert_eq!(payload["bytesWritten"], 2);
                    payload["sha256"].as_str().unwrap().to_string()
                }
                other => panic!("unexpected outcome: {:?}", other),
            };

            // A stale base hash refuses the write before touching the file.
            let stale = executor
                .execute(
                    &json!({"path": "note.txt", "content": "v2", "baseSha256": "deadbeef"}),
                    &ExecContext::default(),
                )
                .await;
            assert!(matches!(
                stale,
                ExecOutcome::Failed {
                    code: ExecFailure::ExecutionFailed,
                    ..
                }
            ));

            let second = executor
                .execute(
                    &json!({"path": "note.txt", "content": "v2", "baseSha256": sha_v1}),
                    &ExecContext::default(),
                )
                .await;
            match second {
                ExecOutcome::Success { payload } => {
                    assert_eq!(payload["previousSha256"], sha_v1.as_str());
                    assert_ne!(payload["sha256"], sha_v1.as_str());
                }
                other => panic!("unexpected outcome: {:?}", other),
            }

            let _ = tokio::fs::remove_dir_all(&root).await;
        });
    }

    #[test]
    fn test_http_request_rejects_unknown_method() {
        tokio_test::block_on(async {
            let executor =
                HttpRequestExecutor::from_spec(&spec("http_request", "http_request", json!({})));
            let outcome = executor
                .execute(
                    &json!({"url": "http://localhost:1", "method": "PATCHY"}),
                    &ExecContext::default(),
                )
                .await;
            assert!(matches!(
                outcome,
                ExecOutcome::Failed {
                    code: ExecFailure::InvalidCommand,
                    ..
                }
            ));
        });
    }
}
