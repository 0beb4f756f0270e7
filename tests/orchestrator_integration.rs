//! End-to-end turns through the orchestrator with scripted collaborators

use async_trait::async_trait;
use opsmate::command::{Orchestrator, ResolveMode, TurnState};
use opsmate::core::config::{LlmConfig, MemoryConfig, RemoteConfig};
use opsmate::core::error::{OpsError, Result};
use opsmate::core::types::HostId;
use opsmate::llm::{ChatBackend, ChatRequest, ProviderRegistry, Role};
use opsmate::memory::SessionMemory;
use opsmate::remote::{ExecOutcome, RemoteShell};
use opsmate::rules::RuleResolver;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tempfile::TempDir;

/// Shell that answers from a fixed table and remembers what it ran
#[derive(Default)]
struct ScriptedShell {
    ran: Arc<Mutex<Vec<String>>>,
}

#[async_trait]
impl RemoteShell for ScriptedShell {
    async fn execute(&self, command: &str, _timeout: Duration) -> ExecOutcome {
        self.ran.lock().unwrap().push(command.to_string());
        match command {
            "uname -sr" => ExecOutcome::success("Linux 6.1.0-18-amd64"),
            c if c.contains("os-release") => ExecOutcome::success("PRETTY_NAME=\"Debian GNU/Linux 12 (bookworm)\""),
            "df -h" => ExecOutcome::success("Filesystem Size Used Avail Use% Mounted on\n/dev/sda1 40G 12G 28G 30% /"),
            c if c.starts_with("systemctl restart") => ExecOutcome::failure("Failed to restart nginx.service: Unit not found."),
            _ => ExecOutcome::success("ok"),
        }
    }

    fn describe(&self) -> String {
        "ops@10.0.0.5:22".into()
    }
}

/// Backend returning canned text and counting calls
struct CannedBackend {
    reply: String,
    calls: Arc<AtomicUsize>,
    last_request: Mutex<Option<ChatRequest>>,
}

impl CannedBackend {
    fn new(reply: &str) -> Arc<Self> {
        Arc::new(Self {
            reply: reply.to_string(),
            calls: Arc::new(AtomicUsize::new(0)),
            last_request: Mutex::new(None),
        })
    }
}

#[async_trait]
impl ChatBackend for CannedBackend {
    async fn complete(&self, request: &ChatRequest) -> Result<String> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        *self.last_request.lock().unwrap() = Some(request.clone());
        Ok(self.reply.clone())
    }
}

struct FailingBackend;

#[async_trait]
impl ChatBackend for FailingBackend {
    async fn complete(&self, _request: &ChatRequest) -> Result<String> {
        Err(OpsError::Llm("connection refused".into()))
    }
}

fn orchestrator(dir: &TempDir, providers: ProviderRegistry) -> Orchestrator {
    let memory = SessionMemory::with_json_files(MemoryConfig {
        dir: dir.path().to_path_buf(),
        ..MemoryConfig::default()
    });
    Orchestrator::new(RuleResolver::new(), providers, memory, RemoteConfig::default())
}

async fn connected(dir: &TempDir, providers: ProviderRegistry) -> (Orchestrator, Arc<Mutex<Vec<String>>>) {
    let mut orch = orchestrator(dir, providers);
    let shell = ScriptedShell::default();
    let ran = shell.ran.clone();
    orch.connect_host(Box::new(shell), HostId::new("10.0.0.5")).await;
    ran.lock().unwrap().clear();
    (orch, ran)
}

#[tokio::test]
async fn disk_query_runs_without_confirmation() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orch, ran) = connected(&dir, ProviderRegistry::default()).await;

    let mut turn = orch.begin_turn("查看磁盘空间").await;
    assert_eq!(turn.resolution().command, "df -h");
    assert!(!turn.resolution().dangerous);
    assert_eq!(turn.state(), TurnState::Ready);

    let outcome = orch.execute(&mut turn).await.unwrap();
    assert!(outcome.success);
    assert_eq!(*ran.lock().unwrap(), vec!["df -h".to_string()]);

    let history = &orch.memory().host_memory().unwrap().history;
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].user_input, "查看磁盘空间");
    assert!(history[0].output.contains("/dev/sda1"));
}

#[tokio::test]
async fn declined_reboot_leaves_memory_untouched() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orch, ran) = connected(&dir, ProviderRegistry::default()).await;

    let mut turn = orch.begin_turn("重启服务器").await;
    assert!(turn.resolution().command.contains("reboot"));
    assert!(turn.resolution().dangerous);
    assert!(turn.needs_confirmation());

    turn.decline().unwrap();
    assert!(turn.is_finished());
    assert!(matches!(orch.execute(&mut turn).await, Err(OpsError::InvalidTransition(_))));

    assert!(ran.lock().unwrap().is_empty());
    assert!(orch.memory().host_memory().unwrap().is_empty());
    assert!(orch.memory().conversation_turns().is_empty());
    assert!(!dir.path().join("10_0_0_5.json").exists());
}

#[tokio::test]
async fn confirmed_reboot_is_executed_and_recorded() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orch, ran) = connected(&dir, ProviderRegistry::default()).await;

    let mut turn = orch.begin_turn("重启服务器").await;
    turn.confirm().unwrap();
    orch.execute(&mut turn).await.unwrap();

    assert_eq!(*ran.lock().unwrap(), vec!["sudo reboot".to_string()]);
    assert_eq!(orch.memory().host_memory().unwrap().len(), 1);
}

#[tokio::test]
async fn clarification_turn_does_not_execute() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orch, ran) = connected(&dir, ProviderRegistry::default()).await;

    let mut turn = orch.begin_turn("帮我杀进程").await;
    assert_eq!(turn.state(), TurnState::NeedsClarification);
    assert!(!turn.resolution().explanation.is_empty());
    assert!(orch.execute(&mut turn).await.is_err());
    assert!(ran.lock().unwrap().is_empty());
}

#[tokio::test]
async fn ai_mode_without_backend_makes_no_call() {
    let dir = tempfile::tempdir().unwrap();
    let backend = CannedBackend::new(r#"{"command": "df -h"}"#);
    let mut providers = ProviderRegistry::default();
    // attached but never selected
    providers.attach_backend("deepseek", backend.clone());

    let (orch, _) = connected(&dir, providers).await;
    let result = orch.resolve("how full is the disk", ResolveMode::AiBacked).await;

    assert!(result.command.is_empty());
    assert!(result.explanation.contains("No AI backend is selected"));
    assert_eq!(backend.calls.load(Ordering::SeqCst), 0);
}

#[tokio::test]
async fn ai_mode_does_not_fall_back_to_rules() {
    let dir = tempfile::tempdir().unwrap();
    let (mut orch, _) = connected(&dir, ProviderRegistry::default()).await;
    orch.set_mode(ResolveMode::AiBacked);

    let turn = orch.begin_turn("查看磁盘空间").await;
    assert!(turn.resolution().command.is_empty());
    assert_eq!(turn.state(), TurnState::NeedsClarification);
}

#[tokio::test]
async fn fenced_ai_response_is_parsed() {
    let dir = tempfile::tempdir().unwrap();
    let backend = CannedBackend::new(
        "```json\n{\"command\": \"df -h /var\", \"description\": \"Disk usage of /var\", \"dangerous\": false, \"explanation\": \"Shows free space\"}\n```",
    );
    let mut providers = ProviderRegistry::new(LlmConfig::default());
    providers.attach_backend("qwen", backend.clone());
    assert!(providers.select("qwen"));

    let (mut orch, _) = connected(&dir, providers).await;
    orch.set_mode(ResolveMode::AiBacked);
    let turn = orch.begin_turn("is /var filling up?").await;

    assert_eq!(turn.resolution().command, "df -h /var");
    assert_eq!(turn.resolution().description, "Disk usage of /var");
    assert_eq!(turn.state(), TurnState::Ready);
    assert_eq!(backend.calls.load(Ordering::SeqCst), 1);

    let request = backend.last_request.lock().unwrap().clone().unwrap();
    assert_eq!(request.messages[0].role, Role::System);
    assert!(request.messages[0].content.contains("Debian GNU/Linux 12 (bookworm)"));
    assert!(request.messages[0].content.contains("ops@10.0.0.5:22"));
}

#[tokio::test]
async fn backend_cannot_talk_past_the_danger_gate() {
    let dir = tempfile::tempdir().unwrap();
    let backend = CannedBackend::new(r#"{"command": "rm -rf /tmp/build", "dangerous": false}"#);
    let mut providers = ProviderRegistry::default();
    providers.attach_backend("openai", backend);
    providers.select("openai");

    let (orch, _) = connected(&dir, providers).await;
    let result = orch.resolve("clean the build dir", ResolveMode::AiBacked).await;
    assert!(result.dangerous);
}

#[tokio::test]
async fn backend_failure_is_a_clarification() {
    let dir = tempfile::tempdir().unwrap();
    let mut providers = ProviderRegistry::default();
    providers.attach_backend("ollama", Arc::new(FailingBackend));
    providers.select("ollama");

    let (mut orch, _) = connected(&dir, providers).await;
    orch.set_mode(ResolveMode::AiBacked);
    let turn = orch.begin_turn("restart nginx").await;

    assert_eq!(turn.state(), TurnState::NeedsClarification);
    assert_eq!(turn.resolution().description, "AI backend call failed");
}

#[tokio::test]
async fn failed_execution_is_recorded_and_feeds_the_next_prompt() {
    let dir = tempfile::tempdir().unwrap();
    let backend = CannedBackend::new(r#"{"command": "systemctl restart nginx"}"#);
    let mut providers = ProviderRegistry::default();
    providers.attach_backend("deepseek", backend.clone());
    providers.select("deepseek");

    let (mut orch, _) = connected(&dir, providers).await;
    orch.set_mode(ResolveMode::AiBacked);

    let mut turn = orch.begin_turn("restart nginx").await;
    let outcome = orch.execute(&mut turn).await.unwrap();
    assert!(!outcome.success);

    let record = orch.memory().host_memory().unwrap().last().unwrap().clone();
    assert!(!record.success);
    assert_eq!(record.output, outcome.output);

    orch.begin_turn("do that again").await;
    let request = backend.last_request.lock().unwrap().clone().unwrap();
    assert!(request.messages[0].content.contains("[failed]"));
    assert!(request.messages[0].content.contains("systemctl restart nginx"));

    let replayed: Vec<_> = request.messages[1..].iter().map(|m| m.role).collect();
    assert_eq!(replayed, vec![Role::User, Role::Assistant, Role::User]);
    assert_eq!(request.messages.last().unwrap().content, "do that again");
}
