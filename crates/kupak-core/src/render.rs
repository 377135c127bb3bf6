use crate::loader::Pak;
use crate::CoreError;
use kupak_schema::{prepare_values, ValueMap};
use tracing::debug;

/// Output of one resource template.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderedManifest {
    /// Resolved address of the template this came from.
    pub resource: String,
    pub bytes: Vec<u8>,
}

impl RenderedManifest {
    /// Nothing but whitespace, comments and document markers, as produced by a
    /// resource wrapped in a conditional that evaluated to false.
    pub fn is_blank(&self) -> bool {
        String::from_utf8_lossy(&self.bytes).lines().all(|line| {
            let line = line.trim();
            line.is_empty() || line.starts_with('#') || line == "---" || line == "..."
        })
    }
}

/// Prepared values and the manifests rendered from them.
#[derive(Debug, Clone)]
pub struct Rendered {
    /// Supplied values after defaults and normalization.
    pub values: ValueMap,
    /// One entry per resource that produced content, in resource order.
    pub manifests: Vec<RenderedManifest>,
}

/// Reconcile `supplied` with the pak's property schema, then execute every
/// template in resource order. Nothing is returned unless all of them succeed.
/// Resources that render blank are dropped.
pub fn render(pak: &Pak, supplied: &ValueMap) -> Result<Rendered, CoreError> {
    let values = prepare_values(&pak.descriptor.properties, supplied)?;
    let manifests = execute(pak, &values)?
        .into_iter()
        .filter(|m| {
            let blank = m.is_blank();
            if blank {
                debug!("{} rendered empty, skipped", m.resource);
            }
            !blank
        })
        .collect();
    Ok(Rendered { values, manifests })
}

fn execute(pak: &Pak, values: &ValueMap) -> Result<Vec<RenderedManifest>, CoreError> {
    let mut out = Vec::with_capacity(pak.resources().len());
    for resource in pak.resources() {
        let text = resource
            .template
            .render(values)
            .map_err(|source| CoreError::Render {
                resource: resource.address.clone(),
                source,
            })?;
        debug!("rendered {} ({} bytes)", resource.address, text.len());
        out.push(RenderedManifest {
            resource: resource.address.clone(),
            bytes: text.into_bytes(),
        });
    }
    Ok(out)
}
