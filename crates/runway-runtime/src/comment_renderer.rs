//! Markdown comment rendering for finished commands.

use anyhow::{Context, Result};
use minijinja::Environment;
use runway_core::{CommandResponse, CommentRenderer, ProjectResult};
use serde::Serialize;

const ERROR_TEMPLATE: &str = "error.md";
const FAILURE_TEMPLATE: &str = "failure.md";
const PROJECTS_TEMPLATE: &str = "projects.md";
const LOG_TEMPLATE: &str = "log.md";

const ERROR_SOURCE: &str = "**{{ command }} Error**
```
{{ error }}
```
";

const FAILURE_SOURCE: &str = "**{{ command }} Failed**: {{ failure }}
";

const PROJECTS_SOURCE: &str = "{% if projects | length > 1 %}
Ran {{ command }} in {{ projects | length }} directories:
{% for project in projects %}
 * `{{ project.path }}`
{% endfor %}

{% endif %}
{% for project in projects %}
{% if projects | length > 1 %}
# `{{ project.path }}`
{% endif %}
{% if project.error %}
**{{ command }} Error**
```
{{ project.error }}
```
{% elif project.failure %}
**{{ command }} Failed**: {{ project.failure }}
{% elif project.plan_output is not none %}
```diff
{{ project.plan_output }}
```

* To **discard** this plan click [here]({{ project.lock_url }}).
{% elif project.apply_output is not none %}
```diff
{{ project.apply_output }}
```
{% else %}
{{ command }} completed with no output.
{% endif %}
{% if not loop.last %}

---
{% endif %}
{% endfor %}";

const LOG_SOURCE: &str = "
<details><summary>Log</summary>
  <p>

```
{{ log }}```
</p></details>
";

#[derive(Debug, Serialize)]
struct ProjectView<'a> {
    path: &'a str,
    error: Option<&'a str>,
    failure: Option<&'a str>,
    plan_output: Option<&'a str>,
    lock_url: Option<&'a str>,
    apply_output: Option<&'a str>,
}

impl<'a> ProjectView<'a> {
    fn from_result(result: &'a ProjectResult) -> Self {
        let path = if result.path.trim().is_empty() {
            "."
        } else {
            result.path.as_str()
        };
        Self {
            path,
            error: result.error.as_deref(),
            failure: result.failure.as_deref(),
            plan_output: result
                .plan_success
                .as_ref()
                .map(|plan| plan.output.trim_end()),
            lock_url: result
                .plan_success
                .as_ref()
                .map(|plan| plan.lock_url.as_str()),
            apply_output: result.apply_success.as_deref().map(str::trim_end),
        }
    }
}

/// Renders comments from built-in minijinja templates.
pub struct TemplateCommentRenderer {
    env: Environment<'static>,
}

impl TemplateCommentRenderer {
    pub fn new() -> Result<Self> {
        let mut env = Environment::new();
        env.set_trim_blocks(true);
        env.set_lstrip_blocks(true);
        for (name, source) in [
            (ERROR_TEMPLATE, ERROR_SOURCE),
            (FAILURE_TEMPLATE, FAILURE_SOURCE),
            (PROJECTS_TEMPLATE, PROJECTS_SOURCE),
            (LOG_TEMPLATE, LOG_SOURCE),
        ] {
            env.add_template(name, source)
                .with_context(|| format!("failed to compile comment template {name}"))?;
        }
        Ok(Self { env })
    }

    fn try_render(
        &self,
        response: &CommandResponse,
        log_history: &str,
        verbose: bool,
    ) -> Result<String> {
        let command = response
            .command
            .map(|command| command.title())
            .unwrap_or("Command");
        let mut body = if let Some(error) = response.error.as_deref() {
            self.env
                .get_template(ERROR_TEMPLATE)?
                .render(minijinja::context! { command, error })?
        } else if let Some(failure) = response.failure.as_deref() {
            self.env
                .get_template(FAILURE_TEMPLATE)?
                .render(minijinja::context! { command, failure })?
        } else {
            let projects = response
                .project_results
                .iter()
                .map(ProjectView::from_result)
                .collect::<Vec<_>>();
            self.env
                .get_template(PROJECTS_TEMPLATE)?
                .render(minijinja::context! { command, projects })?
        };

        if verbose {
            body.push_str(
                &self
                    .env
                    .get_template(LOG_TEMPLATE)?
                    .render(minijinja::context! { log => log_history })?,
            );
        }
        Ok(body)
    }
}

impl CommentRenderer for TemplateCommentRenderer {
    fn render(&self, response: &CommandResponse, log_history: &str, verbose: bool) -> String {
        match self.try_render(response, log_history, verbose) {
            Ok(body) => body,
            Err(error) => {
                tracing::error!(error = %format!("{error:#}"), "failed to render comment template");
                format!("**Error: failed to render comment.**\n```\n{error:#}\n```")
            }
        }
    }
}
