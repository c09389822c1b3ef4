//! Two-phase confirm-gated action surface.
//!
//! Every destructive surface (file writes, repository commands, integration
//! calls) shares this pattern: a dry run builds a human-readable trace,
//! binds a confirm token to the canonical hash of the planned call, and
//! performs no side effect; the execute call recomputes the hash, consumes
//! the token, and only then runs the real executor. A stale, tampered, or
//! replayed token is rejected before anything happens.

use std::sync::Arc;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;

use podium_bus::EventHub;
use podium_core::{ExecContext, ExecOutcome, ExecutorRegistry};
use podium_gates::{canonical_hash, ConfirmRejection, ConfirmTokenStore, GateError};

use crate::error::RuntimeError;

/// Result of a dry run: the token to present at execute time plus the trace
/// for caller review
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ActionPlan {
    pub confirm_token: String,
    pub trace: String,
    pub expires_at: DateTime<Utc>,
}

/// Confirm-gated executor invocation service
pub struct ActionService {
    confirm: Arc<ConfirmTokenStore>,
    executors: Arc<ExecutorRegistry>,
    hub: Arc<EventHub>,
}

impl ActionService {
    pub fn new(
        confirm: Arc<ConfirmTokenStore>,
        executors: Arc<ExecutorRegistry>,
        hub: Arc<EventHub>,
    ) -> Self {
        Self {
            confirm,
            executors,
            hub,
        }
    }

    /// Dry run: describe what would happen and mint a token bound to
    /// exactly this call. No side effect occurs.
    pub async fn plan(&self, executor_id: &str, params: &Value) -> Result<ActionPlan, RuntimeError> {
        if self.executors.get(executor_id).is_none() {
            return Err(RuntimeError::UnknownExecutor(executor_id.to_string()));
        }
        let trace = build_trace(executor_id, params);
        let hash = canonical_hash(executor_id, params, Some(&trace));
        let token = self.confirm.mint(hash).await;
        self.hub
            .emit(
                "action_planned",
                serde_json::json!({"executorId": executor_id, "trace": trace}),
            )
            .await;
        Ok(ActionPlan {
            confirm_token: token.token,
            trace,
            expires_at: token.expires_at,
        })
    }

    /// Execute a previously planned call. The token must exist, be
    /// unexpired and unconsumed, and be bound to the hash recomputed from
    /// the presented description and params.
    pub async fn execute(
        &self,
        executor_id: &str,
        params: &Value,
        confirm_token: Option<&str>,
    ) -> Result<Value, RuntimeError> {
        let executor = self
            .executors
            .get(executor_id)
            .ok_or_else(|| RuntimeError::UnknownExecutor(executor_id.to_string()))?;

        let token = confirm_token.ok_or(GateError::ConfirmRequired {
            reason: ConfirmRejection::Missing,
        })?;
        let trace = build_trace(executor_id, params);
        let hash = canonical_hash(executor_id, params, Some(&trace));
        self.confirm.consume(token, &hash).await?;

        // The consumed token is the gate for this surface.
        let ctx = ExecContext::default().bypassing_gates();
        match executor.execute(params, &ctx).await {
            ExecOutcome::Success { payload } => {
                self.hub
                    .emit(
                        "action_executed",
                        serde_json::json!({"executorId": executor_id, "trace": trace}),
                    )
                    .await;
                Ok(payload)
            }
            ExecOutcome::ApprovalRequired { message, .. } => Err(RuntimeError::Execution {
                code: podium_core::ExecFailure::ExecutionFailed,
                message,
            }),
            ExecOutcome::Failed { code, message } => {
                Err(RuntimeError::Execution { code, message })
            }
        }
    }
}

/// Human-readable single-line description of a planned call.
///
/// The trace participates in the canonical hash, so the execute call must
/// describe the identical action to pass.
fn build_trace(executor_id: &str, params: &Value) -> String {
    let detail = match params {
        Value::Object(map) => {
            let mut keys: Vec<&String> = map.keys().collect();
            keys.sort();
            keys.iter()
                .map(|key| {
                    let value = &map[*key];
                    let rendered = match value {
                        Value::String(s) if s.len() > 64 => format!("<{} bytes>", s.len()),
                        other => other.to_string(),
                    };
                    format!("{}={}", key, rendered)
                })
                .collect::<Vec<_>>()
                .join(" ")
        }
        other => other.to_string(),
    };
    format!("{} {}", executor_id, detail)
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use serde_json::json;

    use podium_core::{ExecFailure, Executor};

    struct CountingExecutor {
        calls: std::sync::atomic::AtomicUsize,
    }

    #[async_trait]
    impl Executor for CountingExecutor {
        fn id(&self) -> &str {
            "file_write"
        }

        fn description(&self) -> &str {
            "counting test executor"
        }

        async fn execute(&self, _args: &Value, ctx: &ExecContext) -> ExecOutcome {
            assert!(ctx.gate_bypass);
            self.calls
                .fetch_add(1, std::sync::atomic::Ordering::SeqCst);
            ExecOutcome::success(json!({"written": true}))
        }
    }

    fn service() -> (ActionService, Arc<CountingExecutor>) {
        let executor = Arc::new(CountingExecutor {
            calls: std::sync::atomic::AtomicUsize::new(0),
        });
        let mut registry = ExecutorRegistry::new();
        registry.register(executor.clone());
        let service = ActionService::new(
            Arc::new(ConfirmTokenStore::new()),
            Arc::new(registry),
            Arc::new(EventHub::new()),
        );
        (service, executor)
    }

    #[tokio::test]
    async fn test_plan_then_execute_roundtrip() {
        let (service, executor) = service();
        let params = json!({"path": "a.md", "content": "hello"});

        let plan = service.plan("file_write", &params).await.expect("plan");
        assert!(plan.trace.contains("file_write"));
        // Planning performed no side effect.
        assert_eq!(executor.calls.load(std::sync::atomic::Ordering::SeqCst), 0);

        let payload = service
            .execute("file_write", &params, Some(&plan.confirm_token))
            .await
            .expect("execute");
        assert_eq!(payload["written"], true);
        assert_eq!(executor.calls.load(std::sync::atomic::Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_execute_without_token_is_confirm_required() {
        let (service, executor) = service();
        let err = service
            .execute("file_write", &json!({"path": "a.md"}), None)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Gate(GateError::ConfirmRequired { .. })
        ));
        assert_eq!(executor.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_token_is_rejected_on_second_execute() {
        let (service, _) = service();
        let params = json!({"path": "a.md", "content": "hello"});
        let plan = service.plan("file_write", &params).await.unwrap();

        service
            .execute("file_write", &params, Some(&plan.confirm_token))
            .await
            .expect("first execute");
        let err = service
            .execute("file_write", &params, Some(&plan.confirm_token))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Gate(GateError::ConfirmRequired {
                reason: ConfirmRejection::Consumed
            })
        ));
    }

    #[tokio::test]
    async fn test_token_is_rejected_for_different_payload() {
        let (service, executor) = service();
        let planned = json!({"path": "a.md", "content": "hello"});
        let tampered = json!({"path": "b.md", "content": "hello"});
        let plan = service.plan("file_write", &planned).await.unwrap();

        let err = service
            .execute("file_write", &tampered, Some(&plan.confirm_token))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            RuntimeError::Gate(GateError::ConfirmRequired {
                reason: ConfirmRejection::HashMismatch
            })
        ));
        assert_eq!(executor.calls.load(std::sync::atomic::Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_unknown_executor_is_rejected_at_plan_time() {
        let (service, _) = service();
        assert!(matches!(
            service.plan("teleport", &json!({})).await,
            Err(RuntimeError::UnknownExecutor(_))
        ));
    }

    #[tokio::test]
    async fn test_file_write_two_phase_scenario() {
        use podium_config::ExecutorSpec;
        use podium_executors::FileWriteExecutor;

        let root = std::env::temp_dir().join(format!("podium-actions-{}", std::process::id()));
        tokio::fs::create_dir_all(&root).await.unwrap();
        let spec = ExecutorSpec {
            name: "file_write".to_string(),
            kind: "file_write".to_string(),
            description: None,
            config: json!({}),
        };
        let mut registry = ExecutorRegistry::new();
        registry.register(Arc::new(FileWriteExecutor::from_spec(&spec, root.clone())));
        let service = ActionService::new(
            Arc::new(ConfirmTokenStore::new()),
            Arc::new(registry),
            Arc::new(EventHub::new()),
        );

        let params = json!({"path": "draft.md", "content": "first version"});
        let plan = service.plan("file_write", &params).await.expect("plan");
        let result = service
            .execute("file_write", &params, Some(&plan.confirm_token))
            .await
            .expect("execute");
        let sha = result["sha256"].as_str().expect("hash").to_string();
        assert!(!sha.is_empty());

        // Replaying the consumed token is rejected with no side effect.
        assert!(matches!(
            service
                .execute("file_write", &params, Some(&plan.confirm_token))
                .await,
            Err(RuntimeError::Gate(GateError::ConfirmRequired { .. }))
        ));

        // A second round binds the plan to the current file state and
        // returns a new hash.
        let params = json!({"path": "draft.md", "content": "second version", "baseSha256": sha});
        let plan = service.plan("file_write", &params).await.expect("plan");
        let result = service
            .execute("file_write", &params, Some(&plan.confirm_token))
            .await
            .expect("second execute");
        assert_ne!(result["sha256"].as_str(), result["previousSha256"].as_str());

        let _ = tokio::fs::remove_dir_all(&root).await;
    }

    #[test]
    fn test_trace_truncates_long_values() {
        let params = json!({"content": "x".repeat(500), "path": "a.md"});
        let trace = build_trace("file_write", &params);
        assert!(trace.contains("<500 bytes>"));
        assert!(trace.contains("path=\"a.md\""));
    }
}
