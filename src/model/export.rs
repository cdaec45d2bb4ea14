// Export bundle - serialized model plus the binaries it depends on

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

use super::Model;

/// A tools artifact the target must fetch from the source controller.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SerializedModelTools {
    pub version: String,
    /// Storage-relative path on the source controller.
    pub uri: String,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExportBundle {
    pub bytes: Vec<u8>,
    pub charms: Vec<String>,
    pub tools: Vec<SerializedModelTools>,
}

impl ExportBundle {
    pub fn from_model(model: &Model) -> Result<Self, serde_json::Error> {
        let bytes = serde_json::to_vec(model)?;
        Ok(Self {
            bytes,
            charms: used_charms(model),
            tools: used_tools(model),
        })
    }
}

fn used_charms(model: &Model) -> Vec<String> {
    model
        .applications
        .iter()
        .map(|app| app.charm_url.clone())
        .collect::<BTreeSet<_>>()
        .into_iter()
        .collect()
}

fn used_tools(model: &Model) -> Vec<SerializedModelTools> {
    let machine_tools = model.all_machines().into_iter().filter_map(|m| m.tools.as_ref());
    let unit_tools = model
        .applications
        .iter()
        .flat_map(|app| app.units.iter())
        .filter_map(|unit| unit.tools.as_ref());

    let versions: BTreeSet<String> = machine_tools
        .chain(unit_tools)
        .map(|tools| tools.version.to_string())
        .collect();

    versions
        .into_iter()
        .map(|version| SerializedModelTools {
            uri: tools_uri(&version),
            version,
        })
        .collect()
}

fn tools_uri(version: &str) -> String {
    format!("/tools/{version}")
}
