use anyhow::anyhow;
use serde::Serialize;
use serde_json::{Map, Value};

#[cfg_attr(feature = "mock", mockall::automock)]
pub trait TemplateService: Send + Sync + 'static {
    /// Render the template registered under the given name.
    fn render(&self, name: &str, context: &TemplateContext) -> anyhow::Result<String>;

    /// Render a template given as source code, e.g. a subject line from the
    /// configuration.
    fn render_str(&self, source: &str, context: &TemplateContext) -> anyhow::Result<String>;
}

#[cfg(feature = "mock")]
impl MockTemplateService {
    pub fn with_render(
        mut self,
        name: impl Into<String>,
        context: TemplateContext,
        result: anyhow::Result<String>,
    ) -> Self {
        self.expect_render()
            .once()
            .with(
                mockall::predicate::eq(name.into()),
                mockall::predicate::eq(context),
            )
            .return_once(|_, _| result);
        self
    }

    pub fn with_render_str(
        mut self,
        source: impl Into<String>,
        context: TemplateContext,
        result: anyhow::Result<String>,
    ) -> Self {
        self.expect_render_str()
            .once()
            .with(
                mockall::predicate::eq(source.into()),
                mockall::predicate::eq(context),
            )
            .return_once(|_, _| result);
        self
    }
}

/// Variables passed to a template.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(transparent)]
pub struct TemplateContext(Map<String, Value>);

impl TemplateContext {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a context from any value that serializes to a map.
    pub fn from_serialize(value: &impl Serialize) -> anyhow::Result<Self> {
        match serde_json::to_value(value)? {
            Value::Object(map) => Ok(Self(map)),
            other => Err(anyhow!("Template context must be a map, got {other}")),
        }
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn with(mut self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn get(&self, key: &str) -> Option<&Value> {
        self.0.get(key)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}
