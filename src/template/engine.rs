//! Prompt rendering engine

use super::errors::TemplateError;
use super::prompts::{
    self, AnalyzeDiffPrompt, CreatePrompt, FilterContextPrompt, PatchPrompt, RegeneratePrompt,
    SelectContextPrompt,
};
use minijinja::{Environment, ErrorKind, UndefinedBehavior};
use serde::Serialize;

/// Renders the built-in prompts
///
/// Wraps minijinja with strict undefined handling, so a prompt that
/// references a missing field fails instead of sending a hole to the model.
#[derive(Debug, Clone)]
pub struct PromptEngine {
    env: Environment<'static>,
}

impl PromptEngine {
    pub fn new() -> Result<Self, TemplateError> {
        let mut env = Environment::new();
        env.set_undefined_behavior(UndefinedBehavior::Strict);
        env.set_keep_trailing_newline(true);

        for &(name, source) in prompts::SOURCES {
            env.add_template(name, source)
                .map_err(|e| syntax_error(name, &e))?;
        }

        Ok(Self { env })
    }

    /// Render a named prompt with any serializable context
    pub fn render<S: Serialize>(&self, name: &str, ctx: &S) -> Result<String, TemplateError> {
        let tmpl = self
            .env
            .get_template(name)
            .map_err(|_| TemplateError::UnknownTemplate(name.to_string()))?;

        tmpl.render(ctx)
            .map_err(|e| convert_minijinja_error(name, e, known_variables(ctx)))
    }

    pub fn system_prompt(&self) -> Result<String, TemplateError> {
        self.render(prompts::SYSTEM, &minijinja::context! {})
    }

    pub fn patch_prompt(&self, ctx: &PatchPrompt<'_>) -> Result<String, TemplateError> {
        self.render(prompts::PATCH, ctx)
    }

    pub fn regenerate_prompt(&self, ctx: &RegeneratePrompt<'_>) -> Result<String, TemplateError> {
        self.render(prompts::REGENERATE, ctx)
    }

    pub fn create_prompt(&self, ctx: &CreatePrompt<'_>) -> Result<String, TemplateError> {
        self.render(prompts::CREATE, ctx)
    }

    /// Stage one of context selection: candidates from the tree listings
    pub fn select_context_prompt(
        &self,
        ctx: &SelectContextPrompt<'_>,
    ) -> Result<(String, String), TemplateError> {
        Ok((
            self.render(prompts::SELECT_CONTEXT_SYSTEM, &minijinja::context! {})?,
            self.render(prompts::SELECT_CONTEXT, ctx)?,
        ))
    }

    /// Stage two: the include/exclude verdict for one candidate
    pub fn filter_context_prompt(
        &self,
        ctx: &FilterContextPrompt<'_>,
    ) -> Result<(String, String), TemplateError> {
        Ok((
            self.render(prompts::FILTER_CONTEXT_SYSTEM, &minijinja::context! {})?,
            self.render(prompts::FILTER_CONTEXT, ctx)?,
        ))
    }

    pub fn analyze_diff_prompt(
        &self,
        ctx: &AnalyzeDiffPrompt<'_>,
    ) -> Result<(String, String), TemplateError> {
        Ok((
            self.render(prompts::ANALYZE_DIFF_SYSTEM, &minijinja::context! {})?,
            self.render(prompts::ANALYZE_DIFF, ctx)?,
        ))
    }
}

fn syntax_error(name: &str, err: &minijinja::Error) -> TemplateError {
    TemplateError::SyntaxError {
        template: name.to_string(),
        line: err.line().unwrap_or(0),
        message: err.to_string(),
    }
}

/// Top-level field names of a context, for typo suggestions
fn known_variables<S: Serialize>(ctx: &S) -> Vec<String> {
    match serde_json::to_value(ctx) {
        Ok(serde_json::Value::Object(map)) => map.keys().cloned().collect(),
        _ => Vec::new(),
    }
}

fn convert_minijinja_error(
    name: &str,
    err: minijinja::Error,
    known: Vec<String>,
) -> TemplateError {
    match err.kind() {
        ErrorKind::UndefinedError => {
            let var_name = extract_var_from_error(&err.to_string());
            TemplateError::undefined_variable(var_name, name, &known)
        }
        ErrorKind::SyntaxError => syntax_error(name, &err),
        _ => TemplateError::Internal(err),
    }
}

/// Pull a variable name out of a minijinja message or its detail
fn extract_var_from_error(msg: &str) -> String {
    // Messages look like: "undefined value (in patch:3): variable is `file_pth`"
    if let Some(start) = msg.find('`') {
        if let Some(end) = msg[start + 1..].find('`') {
            return msg[start + 1..start + 1 + end].to_string();
        }
    }
    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::template::{AttemptFeedback, ContextFile, TreeListing};

    fn engine() -> PromptEngine {
        PromptEngine::new().unwrap()
    }

    #[test]
    fn test_all_prompts_compile() {
        let engine = engine();
        for (name, _) in prompts::SOURCES {
            assert!(engine.env.get_template(name).is_ok(), "{name}");
        }
    }

    #[test]
    fn test_system_prompt_mentions_json_shape() {
        let system = engine().system_prompt().unwrap();
        assert!(system.contains("search_text"));
        assert!(system.contains("replacement_text"));
    }

    #[test]
    fn test_patch_prompt_first_attempt() {
        let prompt = engine()
            .patch_prompt(&PatchPrompt {
                file_path: "src/viam/client.py",
                implementation_detail: "Add a timeout parameter",
                existing_file_content: "def connect():\n    pass\n",
                max_attempts: 10,
                history: &[],
            })
            .unwrap();

        assert!(prompt.contains("=== src/viam/client.py ===\ndef connect():"));
        assert!(prompt.contains("Add a timeout parameter"));
        assert!(prompt.contains("10 attempts"));
        assert!(!prompt.contains("--- Attempt"));
    }

    #[test]
    fn test_patch_prompt_includes_history() {
        let history = vec![
            AttemptFeedback {
                attempt: 1,
                request: r#"{"search_text": ["x"], "replacement_text": []}"#.into(),
                result: r#"{"success":false,"error":"ERROR: Mismatched list lengths"}"#.into(),
            },
            AttemptFeedback {
                attempt: 2,
                request: r#"{"search_text": ["x"], "replacement_text": ["y"]}"#.into(),
                result: r#"{"success":false,"error":"ERROR: Patch 1 (index 0): not unique"}"#.into(),
            },
        ];

        let prompt = engine()
            .patch_prompt(&PatchPrompt {
                file_path: "a.py",
                implementation_detail: "rename",
                existing_file_content: "x x",
                max_attempts: 10,
                history: &history,
            })
            .unwrap();

        assert!(prompt.contains("--- Attempt 1 ---"));
        assert!(prompt.contains("--- Attempt 2 ---"));
        assert!(prompt.contains("Mismatched list lengths"));
        assert!(prompt.find("Attempt 1").unwrap() < prompt.find("Attempt 2").unwrap());
    }

    #[test]
    fn test_regenerate_and_create_prompts() {
        let engine = engine();
        let regen = engine
            .regenerate_prompt(&RegeneratePrompt {
                file_path: "a.py",
                implementation_detail: "add field",
                existing_file_content: "class A: pass\n",
                reason: "maximum attempts exceeded",
            })
            .unwrap();
        assert!(regen.contains("maximum attempts exceeded"));
        assert!(regen.contains("=== a.py ===\nclass A: pass"));

        let create = engine
            .create_prompt(&CreatePrompt {
                file_path: "src/new_service.py",
                implementation_detail: "new service client",
            })
            .unwrap();
        assert!(create.contains("src/new_service.py"));
    }

    #[test]
    fn test_select_context_lists_every_tree() {
        let trees = vec![
            TreeListing {
                root: "src/viam".into(),
                listing: "src/viam/components/arm/client.py".into(),
            },
            TreeListing {
                root: "tests".into(),
                listing: "tests/test_arm.py".into(),
            },
        ];
        let (system, prompt) = engine()
            .select_context_prompt(&SelectContextPrompt {
                git_diff: "+    rpc GetKinematics",
                trees: &trees,
            })
            .unwrap();

        assert!(system.contains("context"));
        assert!(prompt.contains("Tree of src/viam:\nsrc/viam/components/arm/client.py"));
        assert!(prompt.contains("Tree of tests:\ntests/test_arm.py"));
        assert!(prompt.contains("+    rpc GetKinematics"));
        assert!(prompt.contains("file_paths"));
    }

    #[test]
    fn test_filter_context_names_the_file() {
        let (_, prompt) = engine()
            .filter_context_prompt(&FilterContextPrompt {
                git_diff: "+ field",
                file_path: "src/viam/arm.py",
                file_content: "class Arm: ...",
            })
            .unwrap();
        assert!(prompt.contains("File path: src/viam/arm.py\nclass Arm: ..."));
        assert!(prompt.contains(r#""filename": "src/viam/arm.py""#));
    }

    #[test]
    fn test_analyze_diff_separates_context_files() {
        let files = vec![
            ContextFile {
                path: "a.py".into(),
                content: "A = 1".into(),
            },
            ContextFile {
                path: "b.py".into(),
                content: "B = 2".into(),
            },
        ];
        let (system, prompt) = engine()
            .analyze_diff_prompt(&AnalyzeDiffPrompt {
                git_diff: "+ rpc Stop",
                context_files: &files,
            })
            .unwrap();

        assert!(system.contains("JSON"));
        assert!(prompt.contains("File: a.py\nContent:\nA = 1\n----"));
        assert!(prompt.contains("File: b.py\nContent:\nB = 2\n----"));
        assert!(prompt.contains("create_new_files"));
    }

    #[test]
    fn test_missing_field_is_undefined_error() {
        let ctx = serde_json::json!({ "file_pth": "a.py" });
        let result = engine().render(prompts::CREATE, &ctx);
        assert!(matches!(result, Err(TemplateError::UndefinedVariable { .. })));
    }

    #[test]
    fn test_unknown_template() {
        let result = engine().render("nope", &());
        assert!(matches!(result, Err(TemplateError::UnknownTemplate(_))));
    }

    #[test]
    fn test_extract_var_from_error() {
        assert_eq!(
            extract_var_from_error("undefined value: variable is `file_pth`"),
            "file_pth"
        );
        assert_eq!(extract_var_from_error("something else"), "unknown");
    }
}
