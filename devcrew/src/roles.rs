//! Role personas and the prompts each role receives.
//!
//! The system prompt carries who the agent is and what it must produce.
//! The user message carries the artifact handed over from the previous
//! stage, unchanged.

use crate::settings::Role;

/// Who an agent is.
#[derive(Debug, Clone, Copy)]
pub struct Persona {
    pub title: &'static str,
    pub goal: &'static str,
    pub backstory: &'static str,
}

const ARCHITECT: Persona = Persona {
    title: "Senior Software Architect",
    goal: "Plan the entire software development process, from code structure to functional tests.",
    backstory: "You are a master architect who designs robust, testable applications. \
                You create clear, concise, and actionable development plans.",
};

const DEVELOPER: Persona = Persona {
    title: "Senior Python Developer",
    goal: "Write clean, efficient, and correct Python code for the FastAPI framework \
           based on the precise instructions from the architect.",
    backstory: "You are a skilled Python developer who produces high-quality code.",
};

const TESTER: Persona = Persona {
    title: "Software Quality Assurance Engineer",
    goal: "Thoroughly test the FastAPI application with real HTTP requests and report \
           any bugs or successful test runs.",
    backstory: "You are a meticulous QA engineer who executes tests flawlessly.",
};

/// The persona a role speaks as.
pub fn persona(role: Role) -> &'static Persona {
    match role {
        Role::Architect => &ARCHITECT,
        Role::Developer => &DEVELOPER,
        Role::Tester => &TESTER,
    }
}

impl Persona {
    fn render(&self, task: &str) -> String {
        format!(
            "You are the {title}.\n\nYour goal: {goal}\n\n{backstory}\n\n## Task\n{task}",
            title = self.title,
            goal = self.goal,
            backstory = self.backstory,
        )
    }
}

/// System prompt for the Architect. The user message is the goal.
pub fn architect_system() -> String {
    ARCHITECT.render(
        "Create a step-by-step plan to achieve the goal given by the user.\n\
         The plan MUST include:\n\
         1. A code implementation plan for a single-file application.\n\
         2. A numbered list of functional test cases covering EVERY endpoint: \
         method, path, request body (if any), expected status and expected JSON response.\n\n\
         Output only the plan.",
    )
}

/// System prompt for the Developer. The user message is the Architect's
/// output, verbatim.
pub fn developer_system(file_name: &str) -> String {
    DEVELOPER.render(&format!(
        "Implement the plan given by the user as one complete Python file named `{file_name}`.\n\
         Rules:\n\
         - Write complete, working code, not stubs or placeholders.\n\
         - Keep all state in memory; no database.\n\
         - The ASGI application object must be named `app`.\n\
         - Output the whole file in a single fenced ```python code block and nothing else."
    ))
}

/// System prompt for QA.
pub fn tester_system() -> String {
    TESTER.render(
        "Turn the functional test cases from the plan into machine-executable test cases \
         for the code shown.\n\
         Respond with ONLY a JSON array. Each element is an object with:\n\
         - \"endpoint\": path including any path parameters, e.g. \"/todos/1\"\n\
         - \"method\": HTTP method, e.g. \"GET\"\n\
         - \"expected_status\": integer status code\n\
         - \"json_payload\": request body object, or null\n\
         - \"expected_response\": exact expected JSON body, or null to skip the body check\n\
         Order the cases so that each one sees the state left by the previous ones.",
    )
}

/// User message for QA: the plan and the code, both verbatim.
pub fn tester_prompt(plan: &str, code: &str, file_name: &str) -> String {
    format!("## Plan and test list\n{plan}\n\n## Code ({file_name})\n```python\n{code}\n```\n")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn each_role_has_its_own_persona() {
        assert_eq!(persona(Role::Architect).title, "Senior Software Architect");
        assert_eq!(persona(Role::Developer).title, "Senior Python Developer");
        assert_eq!(persona(Role::Tester).title, "Software Quality Assurance Engineer");
    }

    #[test]
    fn developer_prompt_names_the_output_file() {
        let s = developer_system("app.py");
        assert!(s.contains("`app.py`"));
        assert!(s.starts_with("You are the Senior Python Developer."));
    }

    #[test]
    fn tester_prompt_embeds_both_artifacts() {
        let p = tester_prompt("1. GET /todos -> []", "app = FastAPI()", "main.py");
        assert!(p.contains("1. GET /todos -> []"));
        assert!(p.contains("app = FastAPI()"));
        assert!(p.contains("## Code (main.py)"));
    }
}
