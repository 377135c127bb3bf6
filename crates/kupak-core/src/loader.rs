use crate::template::Template;
use crate::CoreError;
use kupak_remote::{resolve, Fetcher};
use kupak_schema::{compute_pak_id, parse_descriptor, DescriptorError, PakDescriptor, PakIdentity};
use tracing::{debug, info};

/// One resource of a pak: where its template came from and the compiled form.
#[derive(Debug, Clone)]
pub struct CompiledResource {
    pub address: String,
    pub template: Template,
}

/// A fetched pak whose schema is valid and whose templates all compiled.
#[derive(Debug, Clone)]
pub struct Pak {
    pub descriptor: PakDescriptor,
    /// The address the pak was loaded from; relative resources resolve
    /// against it and installed objects point back to it.
    pub source_url: String,
    resources: Vec<CompiledResource>,
}

impl Pak {
    pub(crate) fn new(
        descriptor: PakDescriptor,
        source_url: String,
        resources: Vec<CompiledResource>,
    ) -> Self {
        Self {
            descriptor,
            source_url,
            resources,
        }
    }

    pub fn name(&self) -> &str {
        &self.descriptor.name
    }

    pub fn version(&self) -> &str {
        &self.descriptor.version
    }

    pub fn resources(&self) -> &[CompiledResource] {
        &self.resources
    }

    pub fn identity(&self) -> PakIdentity {
        compute_pak_id(&self.source_url)
    }
}

/// Fetch and validate the descriptor at `address`, then fetch and compile each
/// of its resource templates. The schema is checked before any template is
/// requested; any failure aborts the whole load.
pub fn load_pak(fetcher: &dyn Fetcher, address: &str) -> Result<Pak, CoreError> {
    let data = fetcher.fetch(address)?;
    let descriptor = parse_descriptor(&data).map_err(|e| match e {
        DescriptorError::Parse(source) => CoreError::Parse {
            address: address.to_owned(),
            source,
        },
        DescriptorError::Schema(source) => CoreError::Schema {
            address: address.to_owned(),
            source,
        },
    })?;
    debug!(
        "{address}: {} properties, {} resources",
        descriptor.properties.len(),
        descriptor.resources.len()
    );

    let mut resources = Vec::with_capacity(descriptor.resources.len());
    for reference in &descriptor.resources {
        let resolved = resolve(address, reference)?;
        let body = fetcher.fetch(&resolved)?;
        let text = String::from_utf8_lossy(&body);
        let template =
            Template::compile(&text).map_err(|source| CoreError::TemplateCompile {
                resource: resolved.clone(),
                source,
            })?;
        resources.push(CompiledResource {
            address: resolved,
            template,
        });
    }

    info!(
        "loaded pak {} {} from {address}",
        descriptor.name, descriptor.version
    );
    Ok(Pak::new(descriptor, address.to_owned(), resources))
}
