//! devcrew: a three-role LLM crew that builds a small web app.
//!
//! - Architect: turns a goal into a plan and a functional test list
//! - Developer: turns the plan into a single source file
//! - QA Engineer: exercises the running app with real HTTP requests
//!
//! Each role is bound to a hosted provider at startup (settings file,
//! overridable per environment variable) and the roles run strictly one
//! after another.

pub mod artifact;
pub mod error;
pub mod llm;
pub mod output;
pub mod pipeline;
pub mod qa;
pub mod roles;
pub mod settings;
pub mod syntax;
pub mod workspace;

pub use error::{PipelineError, Result};
pub use pipeline::{Models, Phase, Pipeline, RunOutcome};
pub use settings::{ResolvedConfig, Settings};

use output::{CREW, Console};

/// Goal used when none is supplied.
pub const DEFAULT_GOAL: &str = r#"Create a complete FastAPI application that functions as an in-memory To-Do list manager.
The application should store the to-do items in a simple list in memory. Each to-do item should be a dictionary with an 'id' and a 'task' description.

It must have the following three endpoints:
1.  `GET /todos`: Returns a JSON list of all current to-do items. For example: `[{"id": 1, "task": "Learn FastAPI"}]`. If there are no tasks, it should return an empty list `[]`.
2.  `POST /todos`: Accepts a JSON body with a 'task' description. For example: `{"task": "Build an amazing app"}`. It should add this new task to the in-memory list with a unique ID and return the newly created to-do item. For example: `{"id": 2, "task": "Build an amazing app"}`. Use a Pydantic model for the request body.
3.  `DELETE /todos/{item_id}`: Accepts an integer `item_id` from the URL path. It should find and remove the corresponding to-do item from the list. It should return a success message, for example: `{"status": "success", "message": "To-Do item with id 2 deleted"}`.
"#;

/// Resolve configuration from `settings` and `env`, then run the pipeline
/// once with real provider clients.
///
/// Configuration problems are reported before any client is built, so a
/// missing key never costs a network round trip.
pub async fn run<F>(
    settings: &Settings,
    env: F,
    goal: &str,
    console: Console,
) -> Result<RunOutcome>
where
    F: Fn(&str) -> Option<String>,
{
    let config = settings.resolve(env)?;
    run_resolved(&config, goal, console).await
}

/// Run the pipeline once for an already resolved configuration.
pub async fn run_resolved(
    config: &ResolvedConfig,
    goal: &str,
    mut console: Console,
) -> Result<RunOutcome> {
    announce(&mut console, config, goal)?;
    let mut pipeline = Pipeline::from_config(config, console)?;
    pipeline.run(goal).await
}

/// Print the role roster, goal and output location.
pub fn announce(console: &mut Console, config: &ResolvedConfig, goal: &str) -> Result<()> {
    console.status(CREW, "✅", "LLM provider roles configured:")?;
    for a in config.crew.iter() {
        console.say(
            CREW,
            &format!(
                "  - {:<10} {} (model: {}) as {}",
                a.role,
                a.provider,
                a.model,
                roles::persona(a.role).title
            ),
        )?;
        tracing::info!(role = %a.role, provider = %a.provider, model = %a.model, "Role assignment");
    }
    console.say(CREW, &format!("Variant: {}", config.variant))?;
    console.say(CREW, &format!("Project path: {}", config.project_dir.display()))?;
    console.say(CREW, &format!("Goal: {}", goal.trim()))?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;
    use std::sync::{Arc, Mutex};

    #[derive(Clone, Default)]
    struct SharedBuf(Arc<Mutex<Vec<u8>>>);

    impl Write for SharedBuf {
        fn write(&mut self, buf: &[u8]) -> std::io::Result<usize> {
            self.0.lock().unwrap().extend_from_slice(buf);
            Ok(buf.len())
        }

        fn flush(&mut self) -> std::io::Result<()> {
            Ok(())
        }
    }

    #[test]
    fn announce_lists_every_role_with_its_persona() {
        let config = Settings::default()
            .resolve(|name| name.ends_with("_API_KEY").then(|| "k".to_string()))
            .unwrap();
        let buf = SharedBuf::default();
        let mut console = Console::new(Box::new(buf.clone()));

        announce(&mut console, &config, DEFAULT_GOAL).unwrap();

        let text = String::from_utf8(buf.0.lock().unwrap().clone()).unwrap();
        assert!(
            text.contains(
                "architect  anthropic (model: claude-3-7-sonnet-20250219) as Senior Software Architect"
            ),
            "{text}"
        );
        assert!(text.contains("as Senior Python Developer"), "{text}");
        assert!(
            text.contains("tester     openai (model: gpt-4o) as Software Quality Assurance Engineer"),
            "{text}"
        );
    }
}
