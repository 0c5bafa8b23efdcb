//! Template rendering module
//!
//! Wraps a minijinja environment. Templates load lazily from the configured
//! directory, so a missing file shows up as a render error on the request that needs it.

use minijinja::{context, Environment};
use std::path::Path;

use crate::logger;

/// Template the stable service renders for `GET /submit`
pub const FORM_TEMPLATE: &str = "form.html";

pub struct TemplateStore {
    env: Environment<'static>,
}

impl TemplateStore {
    /// Load templates on demand from `dir`
    pub fn from_dir(dir: &str) -> Self {
        if !Path::new(dir).is_dir() {
            logger::log_warning(&format!(
                "Template directory '{dir}' not found, template routes will answer 500"
            ));
        }

        let mut env = Environment::new();
        env.set_loader(minijinja::path_loader(dir.to_string()));
        Self { env }
    }

    /// Build a store from in-memory `(name, source)` pairs
    #[cfg(test)]
    pub fn from_sources<I>(sources: I) -> Result<Self, minijinja::Error>
    where
        I: IntoIterator<Item = (String, String)>,
    {
        let mut env = Environment::new();
        for (name, source) in sources {
            env.add_template_owned(name, source)?;
        }
        Ok(Self { env })
    }

    /// Render a template without context variables
    pub fn render(&self, name: &str) -> Result<String, minijinja::Error> {
        self.env.get_template(name)?.render(context! {})
    }
}
