//! Dataset export: resolve, flatten, project, and optionally package.

use std::str::FromStr;

use cwr_crate::{derive_remote_urls, project, ProjectOptions, RoCrate};
use cwr_jsonld::{Flattener, RO_CRATE_CONTEXT, WORKFLOW_RUN_CONTEXT};
use cwr_pack::{ArchiveStream, CrateStreamer};
use cwr_resolver::{ResolveOptions, Resolver};
use cwr_types::ObjectId;
use tracing::info;

use crate::error::{ServerError, ServerResult};
use crate::scheme::StoreUrlScheme;

/// Representation requested for a dataset.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum ExportFormat {
    /// The stored object as is.
    Json,
    /// The full nested dataset as an RO-Crate.
    RoCrate,
    /// Only the dataset's workflow, as a Workflow RO-Crate.
    WorkflowRoCrate,
}

impl ExportFormat {
    pub fn workflow_only(&self) -> bool {
        matches!(self, Self::WorkflowRoCrate)
    }
}

impl FromStr for ExportFormat {
    type Err = ServerError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.to_ascii_lowercase().as_str() {
            "json" => Ok(Self::Json),
            "rocrate" => Ok(Self::RoCrate),
            "workflowrocrate" => Ok(Self::WorkflowRoCrate),
            other => Err(ServerError::BadRequest(format!("unknown format {other:?}"))),
        }
    }
}

/// Turns stored datasets into crates.
pub struct DatasetExporter {
    resolver: Resolver,
    flattener: Flattener,
    scheme: StoreUrlScheme,
    streamer: CrateStreamer,
    resolve_options: ResolveOptions,
}

impl std::fmt::Debug for DatasetExporter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DatasetExporter")
            .field("resolver", &self.resolver)
            .field("resolve_options", &self.resolve_options)
            .finish_non_exhaustive()
    }
}

impl DatasetExporter {
    pub fn new(
        resolver: Resolver,
        flattener: Flattener,
        scheme: StoreUrlScheme,
        streamer: CrateStreamer,
    ) -> Self {
        Self {
            resolver,
            flattener,
            scheme,
            streamer,
            resolve_options: ResolveOptions::default(),
        }
    }

    pub fn with_resolve_options(mut self, options: ResolveOptions) -> Self {
        self.resolve_options = options;
        self
    }

    pub fn resolver(&self) -> &Resolver {
        &self.resolver
    }

    /// Build the crate of a dataset, nested datasets included.
    ///
    /// A download crate is attached, carries a preview and packages its
    /// files. Otherwise the crate is detached and addresses everything by
    /// remote URL.
    pub async fn build_crate(
        &self,
        id: &ObjectId,
        workflow_only: bool,
        download: bool,
    ) -> ServerResult<RoCrate> {
        let options = self.resolve_options.nested(true).workflow_only(workflow_only);
        let graph = self.resolver.resolve(id, options).await?;
        let nodes = graph.nodes();
        let remote_urls = derive_remote_urls(&nodes, &self.scheme);
        let flattened = self
            .flattener
            .flatten(&nodes, &[RO_CRATE_CONTEXT, WORKFLOW_RUN_CONTEXT])
            .await?;

        let mut project_options = if download {
            ProjectOptions::attached().with_preview()
        } else {
            ProjectOptions::detached()
        };
        if workflow_only {
            project_options = project_options.workflow_only();
        }
        let krate = project(id, &flattened, &remote_urls, project_options)?;
        info!(
            dataset = %id,
            objects = nodes.len(),
            remote_urls = remote_urls.len(),
            download,
            "built dataset crate"
        );
        Ok(krate)
    }

    /// Zip stream of an attached crate.
    pub fn stream(&self, krate: &RoCrate) -> ServerResult<ArchiveStream> {
        Ok(self.streamer.stream(krate)?)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn formats_parse_case_insensitively() {
        assert_eq!("ROCrate".parse::<ExportFormat>().unwrap(), ExportFormat::RoCrate);
        assert_eq!("json".parse::<ExportFormat>().unwrap(), ExportFormat::Json);
        let wf: ExportFormat = "WorkflowROCrate".parse().unwrap();
        assert!(wf.workflow_only());
        assert!(matches!(
            "html".parse::<ExportFormat>(),
            Err(ServerError::BadRequest(_))
        ));
    }
}
