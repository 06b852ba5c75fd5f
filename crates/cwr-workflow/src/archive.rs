//! Reading workflows out of uploaded RO-Crate archives.

use std::io::{Cursor, Read};

use cwr_types::{as_list, reference_id, string_or_reference};
use serde_json::{Map, Value};
use tracing::debug;
use zip::ZipArchive;

use crate::error::{WorkflowError, WorkflowResult};

/// Content types an upload may declare.
pub const ZIP_CONTENT_TYPES: [&str; 2] = ["application/zip", "application/octet-stream"];

const METADATA_FILE: &str = "ro-crate-metadata.json";

/// An uploaded archive that is structurally a zip.
pub struct CrateArchive {
    zip: ZipArchive<Cursor<Vec<u8>>>,
}

impl std::fmt::Debug for CrateArchive {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CrateArchive")
            .field("entries", &self.zip.len())
            .finish()
    }
}

impl CrateArchive {
    /// Check the declared content type and open the bytes as a zip.
    pub fn open(content_type: &str, bytes: Vec<u8>) -> WorkflowResult<Self> {
        // "application/zip; charset=binary" and friends
        let essence = content_type
            .split(';')
            .next()
            .unwrap_or_default()
            .trim()
            .to_ascii_lowercase();
        if !ZIP_CONTENT_TYPES.contains(&essence.as_str()) {
            return Err(WorkflowError::InvalidCrate(format!(
                "file is not a zip file (content type {content_type})"
            )));
        }
        let zip = ZipArchive::new(Cursor::new(bytes))
            .map_err(|e| WorkflowError::InvalidCrate(format!("file is not a zip file: {e}")))?;
        debug!(entries = zip.len(), "opened uploaded archive");
        Ok(Self { zip })
    }

    /// Directory holding the metadata file: the archive root, or a single
    /// top-level folder.
    fn crate_dir(&self) -> WorkflowResult<String> {
        self.zip
            .file_names()
            .filter_map(|name| name.strip_suffix(METADATA_FILE))
            .filter(|dir| dir.is_empty() || dir.ends_with('/'))
            .min_by_key(|dir| dir.len())
            .map(str::to_string)
            .ok_or_else(|| WorkflowError::InvalidCrate(format!("{METADATA_FILE} not found")))
    }

    fn read(&mut self, name: &str) -> WorkflowResult<Vec<u8>> {
        let mut entry = self
            .zip
            .by_name(name)
            .map_err(|_| WorkflowError::InvalidCrate(format!("{name} not found in RO-Crate")))?;
        let mut bytes = Vec::new();
        entry
            .read_to_end(&mut bytes)
            .map_err(|e| WorkflowError::InvalidCrate(format!("reading {name} failed: {e}")))?;
        Ok(bytes)
    }

    /// Parse the crate metadata and load its main workflow.
    pub fn extract(mut self) -> WorkflowResult<UploadedWorkflow> {
        let dir = self.crate_dir()?;
        let metadata: Value = serde_json::from_slice(&self.read(&format!("{dir}{METADATA_FILE}"))?)
            .map_err(|e| WorkflowError::InvalidCrate(format!("{METADATA_FILE} is not JSON: {e}")))?;
        let root = root_dataset(&metadata)?;

        let main_entity = root
            .get("mainEntity")
            .and_then(string_or_reference)
            .ok_or_else(|| WorkflowError::InvalidCrate("no mainEntity on the root dataset".into()))?
            .to_string();
        let license = root
            .get("license")
            .and_then(license_string)
            .ok_or_else(|| WorkflowError::InvalidCrate("License not defined in RO-Crate".into()))?;

        let path = format!("{dir}{}", main_entity.trim_start_matches("./"));
        let yaml = String::from_utf8(self.read(&path).map_err(|_| {
            WorkflowError::InvalidCrate("Workflow file not found in RO-Crate".into())
        })?)
        .map_err(|_| WorkflowError::InvalidCrate(format!("{main_entity} is not UTF-8")))?;
        let definition: serde_yaml::Value = serde_yaml::from_str(&yaml)
            .map_err(|e| WorkflowError::InvalidCrate(format!("{main_entity} is not YAML: {e}")))?;

        let summary = CrateSummary {
            title: root.get("name").and_then(Value::as_str).map(str::to_string),
            description: root
                .get("description")
                .and_then(Value::as_str)
                .map(str::to_string),
            keywords: root.get("keywords").map(keywords).unwrap_or_default(),
            license,
        };
        debug!(main_entity = %main_entity, license = %summary.license, "extracted workflow from crate");
        Ok(UploadedWorkflow {
            main_entity,
            yaml,
            definition,
            summary,
            metadata,
        })
    }
}

/// Root dataset fields used as submission defaults.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct CrateSummary {
    pub title: Option<String>,
    pub description: Option<String>,
    pub keywords: Vec<String>,
    pub license: String,
}

/// A workflow definition taken from an uploaded crate.
#[derive(Clone, Debug)]
pub struct UploadedWorkflow {
    /// Path of the workflow file inside the crate.
    pub main_entity: String,
    /// The definition as uploaded.
    pub yaml: String,
    pub definition: serde_yaml::Value,
    pub summary: CrateSummary,
    pub metadata: Value,
}

/// The root data entity: whatever the metadata descriptor is `about`.
fn root_dataset(metadata: &Value) -> WorkflowResult<&Map<String, Value>> {
    let graph = metadata
        .get("@graph")
        .and_then(Value::as_array)
        .ok_or_else(|| WorkflowError::InvalidCrate("metadata has no @graph".into()))?;
    let node = |id: &str| {
        graph
            .iter()
            .filter_map(Value::as_object)
            .find(|n| n.get("@id").and_then(Value::as_str) == Some(id))
    };
    let root_id = node(METADATA_FILE)
        .and_then(|descriptor| descriptor.get("about"))
        .and_then(reference_id)
        .unwrap_or("./");
    node(root_id)
        .ok_or_else(|| WorkflowError::InvalidCrate(format!("root dataset {root_id} not found")))
}

/// The license as a string, unwrapping a reference object.
fn license_string(value: &Value) -> Option<String> {
    as_list(value)
        .into_iter()
        .find_map(string_or_reference)
        .map(str::to_string)
}

/// Keywords given as a list or as one comma separated string.
fn keywords(value: &Value) -> Vec<String> {
    as_list(value)
        .into_iter()
        .filter_map(Value::as_str)
        .flat_map(|k| k.split(','))
        .map(str::trim)
        .filter(|k| !k.is_empty())
        .map(str::to_string)
        .collect()
}
