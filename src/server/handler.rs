use std::fmt;

use prometheus::{Encoder, Registry, TextEncoder};

use crate::error::Result;

/// Rendered exposition body with its content type
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Exposition {
    pub content_type: String,
    pub body: Vec<u8>,
}

/// Renders the registry of a meter.
///
/// Cheap to clone; clones share the registry.
#[derive(Clone)]
pub struct ExpositionHandler {
    registry: Registry,
}

impl ExpositionHandler {
    pub fn new(registry: Registry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &Registry {
        &self.registry
    }

    /// Encode every gathered family in the Prometheus text format.
    pub fn render(&self) -> Result<Exposition> {
        let encoder = TextEncoder::new();
        let families = self.registry.gather();

        let mut body = Vec::new();
        encoder.encode(&families, &mut body)?;

        Ok(Exposition {
            content_type: encoder.format_type().to_string(),
            body,
        })
    }
}

impl fmt::Debug for ExpositionHandler {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExpositionHandler").finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use prometheus::{IntCounter, Opts};

    #[test]
    fn test_render_text_format() {
        let registry = Registry::new();
        let counter = IntCounter::with_opts(Opts::new("hits_total", "hits")).unwrap();
        registry.register(Box::new(counter.clone())).unwrap();
        counter.inc_by(3);

        let exposition = ExpositionHandler::new(registry).render().unwrap();
        let body = String::from_utf8(exposition.body).unwrap();

        assert!(exposition.content_type.starts_with("text/plain"));
        assert!(body.contains("# TYPE hits_total counter"));
        assert!(body.contains("hits_total 3"));
    }

    #[test]
    fn test_render_empty_registry() {
        let exposition = ExpositionHandler::new(Registry::new()).render().unwrap();
        assert!(exposition.body.is_empty());
    }
}
