use std::{path::Path, sync::Arc};

use anyhow::Context;
use mailer_templates_contracts::{TemplateContext, TemplateService};
use mailer_utils::trace_instrument;
use tera::Tera;
use tracing::debug;

#[derive(Debug, Clone)]
pub struct TemplateServiceImpl {
    tera: Arc<Tera>,
}

impl TemplateServiceImpl {
    /// Loads every file below `dir`. Templates are named by their path
    /// relative to `dir`, e.g. `welcome/text.txt`.
    pub fn from_dir(dir: &Path) -> anyhow::Result<Self> {
        let glob = dir.join("**").join("*");
        let glob = glob
            .to_str()
            .with_context(|| format!("Template path {} is not valid UTF-8", dir.display()))?;
        let tera = Tera::new(glob)
            .with_context(|| format!("Failed to load templates from {}", dir.display()))?;

        debug!(count = tera.get_template_names().count(), dir = %dir.display(), "loaded templates");

        Ok(Self { tera: tera.into() })
    }

    /// Registers the given `(name, source)` pairs.
    pub fn from_raw<'a>(
        templates: impl IntoIterator<Item = (&'a str, &'a str)>,
    ) -> anyhow::Result<Self> {
        let mut tera = Tera::default();
        tera.add_raw_templates(templates)
            .context("Failed to parse templates")?;
        Ok(Self { tera: tera.into() })
    }

    pub fn template_names(&self) -> impl Iterator<Item = &str> {
        self.tera.get_template_names()
    }
}

impl TemplateService for TemplateServiceImpl {
    #[trace_instrument(skip(self, context))]
    fn render(&self, name: &str, context: &TemplateContext) -> anyhow::Result<String> {
        let context = tera::Context::from_serialize(context)?;
        self.tera
            .render(name, &context)
            .with_context(|| format!("Failed to render template {name}"))
    }

    #[trace_instrument(skip(self, context))]
    fn render_str(&self, source: &str, context: &TemplateContext) -> anyhow::Result<String> {
        let context = tera::Context::from_serialize(context)?;
        Tera::one_off(source, &context, false)
            .with_context(|| format!("Failed to render template {source:?}"))
    }
}
