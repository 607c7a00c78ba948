//! Scripted port implementations shared by the use-case tests.

use crate::ports::file_store::FileStore;
use crate::ports::model_gateway::{CompletionOptions, GatewayError, ModelCompletion, ModelGateway};
use crate::ports::process_runner::{ProcessError, ProcessOutput, ProcessRequest, ProcessRunner};
use async_trait::async_trait;
use cohort_domain::{Message, Model, RolePromptTemplate, SubagentRole};
use std::collections::{BTreeMap, HashMap, HashSet, VecDeque};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Process runner that succeeds unless told otherwise.
#[derive(Default)]
pub struct ScriptedRunner {
    missing: HashSet<String>,
    timeouts: HashSet<String>,
    failures: Mutex<HashMap<String, usize>>,
    calls: Mutex<Vec<String>>,
}

impl ScriptedRunner {
    pub fn passing() -> Self {
        Self::default()
    }

    pub fn without_program(mut self, program: &str) -> Self {
        self.missing.insert(program.to_string());
        self
    }

    pub fn timing_out(mut self, command: &str) -> Self {
        self.timeouts.insert(command.to_string());
        self
    }

    /// Exit non-zero for the first `times` runs of `command`.
    pub fn failing(self, command: &str, times: usize) -> Self {
        self.failures
            .lock()
            .unwrap()
            .insert(command.to_string(), times);
        self
    }

    pub fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }
}

#[async_trait]
impl ProcessRunner for ScriptedRunner {
    async fn run(&self, request: &ProcessRequest) -> Result<ProcessOutput, ProcessError> {
        let command = std::iter::once(request.program.as_str())
            .chain(request.args.iter().map(String::as_str))
            .collect::<Vec<_>>()
            .join(" ");
        self.calls.lock().unwrap().push(command.clone());

        if self.timeouts.contains(&command) {
            return Ok(ProcessOutput {
                timed_out: true,
                ..Default::default()
            });
        }

        let mut failures = self.failures.lock().unwrap();
        if let Some(remaining) = failures.get_mut(&command)
            && *remaining > 0
        {
            *remaining -= 1;
            return Ok(ProcessOutput {
                exit_code: Some(1),
                stderr: format!("{} failed", command),
                ..Default::default()
            });
        }

        Ok(ProcessOutput {
            exit_code: Some(0),
            stdout: "ok".to_string(),
            ..Default::default()
        })
    }

    fn is_available(&self, program: &str) -> bool {
        !self.missing.contains(program)
    }
}

/// In-memory workspace rooted at `/work`.
pub struct MemoryFileStore {
    root: PathBuf,
    files: Mutex<BTreeMap<String, String>>,
    read_only: Mutex<HashSet<String>>,
}

impl Default for MemoryFileStore {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/work"),
            files: Mutex::new(BTreeMap::new()),
            read_only: Mutex::new(HashSet::new()),
        }
    }
}

impl MemoryFileStore {
    pub fn with_files(files: &[(&str, &str)]) -> Self {
        let store = Self::default();
        {
            let mut map = store.files.lock().unwrap();
            for (path, content) in files {
                map.insert(path.to_string(), content.to_string());
            }
        }
        store
    }

    pub fn content(&self, path: &str) -> Option<String> {
        self.files.lock().unwrap().get(path).cloned()
    }

    pub fn paths(&self) -> Vec<String> {
        self.files.lock().unwrap().keys().cloned().collect()
    }

    /// Make every later write to `path` fail.
    pub fn fail_writes_to(&self, path: &str) {
        self.read_only.lock().unwrap().insert(path.to_string());
    }

    fn check_writable(&self, path: &str) -> io::Result<()> {
        if self.read_only.lock().unwrap().contains(path) {
            return Err(io::Error::new(io::ErrorKind::PermissionDenied, "read-only"));
        }
        Ok(())
    }
}

impl FileStore for MemoryFileStore {
    fn root(&self) -> &Path {
        &self.root
    }

    fn read(&self, relative: &str) -> io::Result<Option<String>> {
        Ok(self.content(relative))
    }

    fn write(&self, relative: &str, content: &str) -> io::Result<()> {
        self.check_writable(relative)?;
        self.files
            .lock()
            .unwrap()
            .insert(relative.to_string(), content.to_string());
        Ok(())
    }

    fn append(&self, relative: &str, content: &str) -> io::Result<()> {
        self.check_writable(relative)?;
        self.files
            .lock()
            .unwrap()
            .entry(relative.to_string())
            .or_default()
            .push_str(content);
        Ok(())
    }

    fn delete(&self, relative: &str) -> io::Result<bool> {
        self.check_writable(relative)?;
        Ok(self.files.lock().unwrap().remove(relative).is_some())
    }

    fn exists(&self, relative: &str) -> bool {
        self.files.lock().unwrap().contains_key(relative)
    }

    fn file_size(&self, relative: &str) -> io::Result<Option<u64>> {
        Ok(self.content(relative).map(|c| c.len() as u64))
    }

    fn tree_preview(&self, max_entries: usize) -> String {
        self.paths()
            .into_iter()
            .take(max_entries)
            .collect::<Vec<_>>()
            .join("\n")
    }
}

#[derive(Debug, Clone)]
struct RecordedCall {
    role: SubagentRole,
    prompt: String,
    model: Model,
}

/// Model gateway answering from a per-role script.
///
/// The role is recognised from the system message, which is either the
/// role's real system prompt or its bare name. Each queued response is used
/// once, except the last, which repeats.
pub struct ScriptedGateway {
    system_prompts: Vec<(String, SubagentRole)>,
    scripts: Mutex<HashMap<SubagentRole, VecDeque<Result<String, GatewayError>>>>,
    calls: Mutex<Vec<RecordedCall>>,
}

impl Default for ScriptedGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl ScriptedGateway {
    pub fn new() -> Self {
        let system_prompts = SubagentRole::ALL
            .iter()
            .flat_map(|role| {
                [
                    (RolePromptTemplate::system(*role), *role),
                    (role.as_str().to_string(), *role),
                ]
            })
            .collect();
        Self {
            system_prompts,
            scripts: Mutex::new(HashMap::new()),
            calls: Mutex::new(Vec::new()),
        }
    }

    pub fn respond(&self, role: SubagentRole, content: impl Into<String>) {
        self.push(role, Ok(content.into()));
    }

    pub fn respond_json(&self, role: SubagentRole, value: serde_json::Value) {
        self.respond(role, value.to_string());
    }

    pub fn fail(&self, role: SubagentRole, error: GatewayError) {
        self.push(role, Err(error));
    }

    fn push(&self, role: SubagentRole, entry: Result<String, GatewayError>) {
        self.scripts
            .lock()
            .unwrap()
            .entry(role)
            .or_default()
            .push_back(entry);
    }

    /// User prompts sent for `role`, in call order.
    pub fn prompts(&self, role: SubagentRole) -> Vec<String> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.prompt.clone())
            .collect()
    }

    pub fn models(&self, role: SubagentRole) -> Vec<Model> {
        self.calls
            .lock()
            .unwrap()
            .iter()
            .filter(|c| c.role == role)
            .map(|c| c.model.clone())
            .collect()
    }

    pub fn call_count(&self, role: SubagentRole) -> usize {
        self.prompts(role).len()
    }
}

#[async_trait]
impl ModelGateway for ScriptedGateway {
    async fn complete(
        &self,
        messages: &[Message],
        options: &CompletionOptions,
    ) -> Result<ModelCompletion, GatewayError> {
        let system = messages.first().map(|m| m.content.as_str()).unwrap_or("");
        let role = self
            .system_prompts
            .iter()
            .find(|(prompt, _)| prompt == system)
            .map(|(_, role)| *role)
            .ok_or_else(|| GatewayError::Other(format!("unrecognised system prompt: {system}")))?;

        self.calls.lock().unwrap().push(RecordedCall {
            role,
            prompt: messages.last().map(|m| m.content.clone()).unwrap_or_default(),
            model: options.model.clone(),
        });

        let mut scripts = self.scripts.lock().unwrap();
        let queue = scripts.entry(role).or_default();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            queue.front().cloned()
        };
        match next {
            Some(entry) => entry.map(|content| ModelCompletion { content }),
            None => Err(GatewayError::Other(format!("no scripted response for {role}"))),
        }
    }
}
