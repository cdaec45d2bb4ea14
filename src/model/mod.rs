// Model description - the exportable snapshot of a model's topology
//
// The exact serialized layout belongs to the model description format; the
// migration master only needs to walk it to find the charms and agent tools
// the target controller must have before import.

pub mod export;
pub mod version;

pub use export::{ExportBundle, SerializedModelTools};
pub use version::{BinaryVersion, ParseVersionError};

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Model {
    pub uuid: String,
    pub name: String,
    pub owner: String,
    #[serde(default)]
    pub config: BTreeMap<String, serde_json::Value>,
    pub latest_tools_version: Option<String>,
    #[serde(default)]
    pub applications: Vec<Application>,
    #[serde(default)]
    pub machines: Vec<Machine>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Application {
    pub name: String,
    pub charm_url: String,
    #[serde(default)]
    pub units: Vec<Unit>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Unit {
    pub name: String,
    pub tools: Option<AgentTools>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Machine {
    pub id: String,
    pub tools: Option<AgentTools>,
    #[serde(default)]
    pub containers: Vec<Machine>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentTools {
    pub version: BinaryVersion,
    #[serde(default)]
    pub sha256: String,
    #[serde(default)]
    pub size: u64,
}

impl Model {
    pub fn new(uuid: &str, name: &str, owner: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            name: name.to_string(),
            owner: owner.to_string(),
            config: BTreeMap::new(),
            latest_tools_version: None,
            applications: Vec::new(),
            machines: Vec::new(),
        }
    }

    pub fn add_application(&mut self, name: &str, charm_url: &str) -> &mut Application {
        self.applications.push(Application {
            name: name.to_string(),
            charm_url: charm_url.to_string(),
            units: Vec::new(),
        });
        let last = self.applications.len() - 1;
        &mut self.applications[last]
    }

    pub fn add_machine(&mut self, id: &str) -> &mut Machine {
        self.machines.push(Machine::new(id));
        let last = self.machines.len() - 1;
        &mut self.machines[last]
    }

    /// Every machine in the model, containers included, depth first.
    pub fn all_machines(&self) -> Vec<&Machine> {
        let mut out = Vec::new();
        let mut stack: Vec<&Machine> = self.machines.iter().rev().collect();
        while let Some(machine) = stack.pop() {
            out.push(machine);
            stack.extend(machine.containers.iter().rev());
        }
        out
    }
}

impl Application {
    pub fn add_unit(&mut self, name: &str, tools: Option<AgentTools>) {
        self.units.push(Unit {
            name: name.to_string(),
            tools,
        });
    }
}

impl Machine {
    pub fn new(id: &str) -> Self {
        Self {
            id: id.to_string(),
            tools: None,
            containers: Vec::new(),
        }
    }

    pub fn set_tools(&mut self, version: BinaryVersion) {
        self.tools = Some(AgentTools::new(version));
    }

    pub fn add_container(&mut self, id: &str) -> &mut Machine {
        self.containers.push(Machine::new(id));
        let last = self.containers.len() - 1;
        &mut self.containers[last]
    }
}

impl AgentTools {
    pub fn new(version: BinaryVersion) -> Self {
        Self {
            version,
            sha256: String::new(),
            size: 0,
        }
    }
}
