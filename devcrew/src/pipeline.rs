//! Sequential pipeline: architect → developer → (QA) → writer.
//!
//! Each stage blocks on the previous one. The architect's reply is handed
//! to the developer byte for byte; nothing loops back.

use std::fmt;
use std::path::PathBuf;

use crate::artifact::{Artifact, extract_code};
use crate::error::{PipelineError, Result};
use crate::llm::{self, ChatModel};
use crate::output::{CREW, Console};
use crate::qa::{self, AppServer, QaReport};
use crate::roles;
use crate::settings::{Crew, QaSettings, ResolvedConfig, Role, Variant};
use crate::syntax::{CommandChecker, NoCheck, SyntaxChecker, Verdict};
use crate::workspace::{ProjectOutput, Workspace};

/// Lines of generated code echoed to the console.
const CODE_PREVIEW_LINES: usize = 40;

/// Pipeline state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Idle,
    Planning,
    Coding,
    Validating,
    Testing,
    Writing,
    Complete,
    Failed,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Idle => write!(f, "idle"),
            Phase::Planning => write!(f, "planning"),
            Phase::Coding => write!(f, "coding"),
            Phase::Validating => write!(f, "validating"),
            Phase::Testing => write!(f, "testing"),
            Phase::Writing => write!(f, "writing"),
            Phase::Complete => write!(f, "complete"),
            Phase::Failed => write!(f, "failed"),
        }
    }
}

/// One chat model per role.
pub struct Models {
    pub architect: Box<dyn ChatModel>,
    pub developer: Box<dyn ChatModel>,
    pub tester: Box<dyn ChatModel>,
}

impl Models {
    /// Build the HTTP client for every role.
    pub fn from_crew(crew: &Crew) -> anyhow::Result<Self> {
        Ok(Self {
            architect: llm::client_for(&crew.architect)?,
            developer: llm::client_for(&crew.developer)?,
            tester: llm::client_for(&crew.tester)?,
        })
    }

    pub fn get(&self, role: Role) -> &dyn ChatModel {
        match role {
            Role::Architect => self.architect.as_ref(),
            Role::Developer => self.developer.as_ref(),
            Role::Tester => self.tester.as_ref(),
        }
    }
}

/// Everything one run produced.
#[derive(Debug)]
pub struct RunOutcome {
    pub output: ProjectOutput,
    pub plan: Artifact,
    pub code: Artifact,
    /// Present for the advanced variant.
    pub qa: Option<QaReport>,
}

/// The crew for one run.
pub struct Pipeline {
    models: Models,
    checker: Box<dyn SyntaxChecker>,
    project_dir: PathBuf,
    file_name: String,
    variant: Variant,
    qa: QaSettings,
    http: reqwest::Client,
    console: Console,
    phase: Phase,
}

impl Pipeline {
    pub fn new(
        config: &ResolvedConfig,
        models: Models,
        checker: Box<dyn SyntaxChecker>,
        console: Console,
    ) -> Self {
        Self {
            models,
            checker,
            project_dir: config.project_dir.clone(),
            file_name: config.file_name.clone(),
            variant: config.variant,
            qa: config.qa.clone(),
            http: reqwest::Client::new(),
            console,
            phase: Phase::Idle,
        }
    }

    /// Pipeline with real provider clients and the configured checker.
    pub fn from_config(config: &ResolvedConfig, console: Console) -> Result<Self> {
        let models = Models::from_crew(&config.crew)
            .map_err(|e| PipelineError::config(format!("cannot build model clients: {e:#}")))?;
        Ok(Self::new(config, models, checker_for(config), console))
    }

    pub fn phase(&self) -> Phase {
        self.phase
    }

    fn set_phase(&mut self, phase: Phase) {
        tracing::info!(from = %self.phase, to = %phase, "Phase change");
        self.phase = phase;
    }

    /// Run the whole pipeline once for `goal`.
    pub async fn run(&mut self, goal: &str) -> Result<RunOutcome> {
        let result = self.run_stages(goal).await;
        match &result {
            Ok(_) => self.set_phase(Phase::Complete),
            Err(e) => {
                tracing::error!(phase = %self.phase, error = %e, "Pipeline failed");
                self.set_phase(Phase::Failed);
            }
        }
        result
    }

    async fn run_stages(&mut self, goal: &str) -> Result<RunOutcome> {
        // Architect: goal -> plan + test list.
        self.set_phase(Phase::Planning);
        self.console
            .status(Role::Architect.as_str(), "🏗️", "Planning the application...")?;
        let plan = self
            .call(Role::Architect, &roles::architect_system(), goal)
            .await?;
        self.console.say(Role::Architect.as_str(), plan.as_str())?;

        // Developer: the plan, untouched, -> source.
        self.set_phase(Phase::Coding);
        self.console
            .status(Role::Developer.as_str(), "✏️", "Writing the code...")?;
        let reply = self
            .call(
                Role::Developer,
                &roles::developer_system(&self.file_name),
                plan.as_str(),
            )
            .await?;
        let code = Artifact::new(Role::Developer, extract_code(reply.as_str()));
        self.console.code(
            Role::Developer.as_str(),
            &self.file_name,
            code.as_str(),
            CODE_PREVIEW_LINES,
        )?;

        self.set_phase(Phase::Validating);
        self.validate(&code).await?;

        let workspace = Workspace::create(&self.project_dir)
            .await
            .map_err(PipelineError::Io)?;

        let qa = match self.variant {
            Variant::Basic => None,
            Variant::Advanced => {
                self.set_phase(Phase::Testing);
                Some(self.functional_qa(&workspace, &plan, &code).await?)
            }
        };

        self.set_phase(Phase::Writing);
        let output = workspace
            .write_file(&self.file_name, code.as_str())
            .await
            .map_err(PipelineError::Io)?;
        tracing::info!(path = %output.path.display(), bytes = output.bytes, "Wrote project output");
        self.console.status(
            CREW,
            "💾",
            &format!("Wrote {} ({} bytes)", output.path.display(), output.bytes),
        )?;

        Ok(RunOutcome {
            output,
            plan,
            code,
            qa,
        })
    }

    /// One model call. An empty reply counts as a failed call.
    async fn call(&self, role: Role, system: &str, prompt: &str) -> Result<Artifact> {
        let model = self.models.get(role);
        tracing::info!(
            %role,
            provider = %model.provider(),
            model = model.model(),
            prompt_bytes = prompt.len(),
            "Calling model"
        );

        let text = model
            .complete(system, prompt)
            .await
            .map_err(|source| PipelineError::ModelCall {
                role,
                provider: model.provider(),
                source,
            })?;

        if text.trim().is_empty() {
            return Err(PipelineError::ModelCall {
                role,
                provider: model.provider(),
                source: anyhow::anyhow!("empty response"),
            });
        }
        tracing::info!(%role, response_bytes = text.len(), "Model responded");
        Ok(Artifact::new(role, text))
    }

    /// Compile-check the code. Invalid code never reaches the project dir.
    async fn validate(&mut self, code: &Artifact) -> Result<()> {
        let verdict = self
            .checker
            .check(code.as_str(), &self.file_name)
            .await
            .map_err(|e| PipelineError::SyntaxValidation {
                output: format!("syntax checker could not run: {e:#}"),
            })?;

        match verdict {
            Verdict::Valid => {
                self.console
                    .status(Role::Developer.as_str(), "✅", "Syntax check passed")?;
                Ok(())
            }
            Verdict::Invalid(output) => {
                self.console
                    .error(Role::Developer.as_str(), "Syntax check failed")?;
                self.console.say(Role::Developer.as_str(), &output)?;
                Err(PipelineError::SyntaxValidation { output })
            }
        }
    }

    /// Serve the code, wait for it, let QA design cases, run them.
    /// The server is always shut down before returning.
    async fn functional_qa(
        &mut self,
        workspace: &Workspace,
        plan: &Artifact,
        code: &Artifact,
    ) -> Result<QaReport> {
        workspace
            .write_file(&self.file_name, code.as_str())
            .await
            .map_err(PipelineError::Io)?;

        self.console
            .status(Role::Tester.as_str(), "🚀", "Starting the app server...")?;
        let argv = qa::server_argv(&self.qa.server_command, &self.file_name);
        let mut server = match AppServer::spawn(&argv, &workspace.root, &self.qa.base_url) {
            Ok(s) => s,
            Err(e) => return self.report_qa(QaReport::aborted(format!("{e:#}"))),
        };

        let result = self.qa_against(&mut server, plan, code).await;
        server.shutdown().await;
        self.console
            .status(Role::Tester.as_str(), "🛑", "App server stopped")?;
        let report = result?;
        self.report_qa(report)
    }

    async fn qa_against(
        &mut self,
        server: &mut AppServer,
        plan: &Artifact,
        code: &Artifact,
    ) -> Result<QaReport> {
        let ready = match server
            .wait_ready(&self.http, self.qa.startup_grace(), self.qa.ready_timeout())
            .await
        {
            Ok(ep) => ep,
            Err(e) => return Ok(QaReport::aborted(format!("{e:#}"))),
        };

        self.console
            .status(Role::Tester.as_str(), "🧪", "Designing test cases...")?;
        let prompt = roles::tester_prompt(plan.as_str(), code.as_str(), &self.file_name);
        let reply = self
            .call(Role::Tester, &roles::tester_system(), &prompt)
            .await?;

        let cases = match qa::parse_test_cases(reply.as_str()) {
            Ok(c) => c,
            Err(e) => return Ok(QaReport::aborted(format!("{e:#}"))),
        };
        self.console.status(
            Role::Tester.as_str(),
            "🧪",
            &format!("Running {} test cases against {}", cases.len(), ready.base_url()),
        )?;
        Ok(qa::run_cases(&self.http, &ready, &cases, self.qa.request_timeout()).await)
    }

    fn report_qa(&mut self, report: QaReport) -> Result<QaReport> {
        let (emoji, headline) = if report.all_passed() {
            ("✅", "All functional tests passed")
        } else {
            ("⚠️", "Functional QA reported problems")
        };
        self.console.status(Role::Tester.as_str(), emoji, headline)?;
        self.console.say(Role::Tester.as_str(), &report.to_string())?;
        Ok(report)
    }
}

/// The syntax checker the settings ask for.
pub fn checker_for(config: &ResolvedConfig) -> Box<dyn SyntaxChecker> {
    if config.syntax_check.enabled {
        Box::new(CommandChecker::new(config.syntax_check.command.clone()))
    } else {
        Box::new(NoCheck)
    }
}
