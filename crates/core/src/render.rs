use tera::{Context, Tera};
use thiserror::Error;

/// Markdown shape of one canvas entry. The literal spacing around the
/// newlines is part of the canvas layout and must not be reflowed.
pub const CANVAS_SECTION_TEMPLATE: &str =
    "## Link: [{{ url }}]({{ url }}) \n**Shared by** <@{{ user_id }}> \n\n {{ summary }}";

const CANVAS_SECTION: &str = "canvas_section";
const USER_PROMPT: &str = "user_prompt";

#[derive(Debug, Error)]
pub enum TemplateError {
    #[error("template `{name}` failed to parse: {source}")]
    Parse { name: &'static str, source: tera::Error },
    #[error("template `{name}` failed to render: {source}")]
    Render { name: &'static str, source: tera::Error },
}

/// Named-field renderer for the canvas entry and the summarization user
/// prompt. Field substitution goes through Tera so a malformed template is a
/// startup error, not a silent placeholder collision at runtime.
#[derive(Clone, Debug)]
pub struct TemplateEngine {
    tera: Tera,
}

impl TemplateEngine {
    /// `user_prompt_template` names `{{ url }}` as its single substitution
    /// point.
    pub fn new(user_prompt_template: &str) -> Result<Self, TemplateError> {
        let mut tera = Tera::default();
        tera.add_raw_template(CANVAS_SECTION, CANVAS_SECTION_TEMPLATE)
            .map_err(|source| TemplateError::Parse { name: CANVAS_SECTION, source })?;
        tera.add_raw_template(USER_PROMPT, user_prompt_template)
            .map_err(|source| TemplateError::Parse { name: USER_PROMPT, source })?;
        Ok(Self { tera })
    }

    pub fn render_canvas_section(
        &self,
        url: &str,
        user_id: &str,
        summary: &str,
    ) -> Result<String, TemplateError> {
        let mut context = Context::new();
        context.insert("url", url);
        context.insert("user_id", user_id);
        context.insert("summary", summary);
        self.tera
            .render(CANVAS_SECTION, &context)
            .map_err(|source| TemplateError::Render { name: CANVAS_SECTION, source })
    }

    pub fn render_user_prompt(&self, url: &str) -> Result<String, TemplateError> {
        let mut context = Context::new();
        context.insert("url", url);
        self.tera
            .render(USER_PROMPT, &context)
            .map_err(|source| TemplateError::Render { name: USER_PROMPT, source })
    }
}
