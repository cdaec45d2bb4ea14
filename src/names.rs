// Entity identifiers - canonical tag strings for agents, models and users
//
// Minion reports and target descriptors refer to entities by tag. A tag
// renders as `<kind>-<id>` where any `/` in the id becomes `-`, so machine
// `50/lxd/0` is `machine-50-lxd-0` and unit `foo/1` is `unit-foo-1`.

use regex::Regex;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use std::sync::LazyLock;
use thiserror::Error;

static MACHINE_ID: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^(0|[1-9][0-9]*)(/[a-z]+/(0|[1-9][0-9]*))*$").expect("machine id pattern"));

static UNIT_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^([a-z][a-z0-9]*(-[a-z0-9]*[a-z][a-z0-9]*)*)/(0|[1-9][0-9]*)$").expect("unit name pattern"));

static APPLICATION_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-z][a-z0-9]*(-[a-z0-9]*[a-z][a-z0-9]*)*$").expect("application name pattern"));

static USER_NAME: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^[a-zA-Z0-9][a-zA-Z0-9.+-]*[a-zA-Z0-9]$|^[a-zA-Z0-9]$").expect("user name pattern"));

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TagError {
    #[error("{value:?} is not a valid {kind} id")]
    InvalidId { kind: &'static str, value: String },
    #[error("{0:?} is not a valid tag")]
    InvalidTag(String),
}

/// A typed reference to an entity, ordered and compared by kind then id.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub enum Tag {
    Machine(String),
    Unit(String),
    Application(String),
    Model(String),
    Controller(String),
    User(String),
}

impl Tag {
    pub fn machine(id: &str) -> Result<Self, TagError> {
        validate("machine", id, &MACHINE_ID)?;
        Ok(Tag::Machine(id.to_string()))
    }

    pub fn unit(name: &str) -> Result<Self, TagError> {
        validate("unit", name, &UNIT_NAME)?;
        Ok(Tag::Unit(name.to_string()))
    }

    pub fn application(name: &str) -> Result<Self, TagError> {
        validate("application", name, &APPLICATION_NAME)?;
        Ok(Tag::Application(name.to_string()))
    }

    pub fn model(uuid: &str) -> Result<Self, TagError> {
        validate_uuid("model", uuid)?;
        Ok(Tag::Model(uuid.to_string()))
    }

    pub fn controller(uuid: &str) -> Result<Self, TagError> {
        validate_uuid("controller", uuid)?;
        Ok(Tag::Controller(uuid.to_string()))
    }

    pub fn user(name: &str) -> Result<Self, TagError> {
        validate("user", name, &USER_NAME)?;
        Ok(Tag::User(name.to_string()))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            Tag::Machine(_) => "machine",
            Tag::Unit(_) => "unit",
            Tag::Application(_) => "application",
            Tag::Model(_) => "model",
            Tag::Controller(_) => "controller",
            Tag::User(_) => "user",
        }
    }

    /// The untransformed id, e.g. `50/lxd/0` for a container.
    pub fn id(&self) -> &str {
        match self {
            Tag::Machine(id)
            | Tag::Unit(id)
            | Tag::Application(id)
            | Tag::Model(id)
            | Tag::Controller(id)
            | Tag::User(id) => id,
        }
    }
}

fn validate(kind: &'static str, value: &str, pattern: &Regex) -> Result<(), TagError> {
    if pattern.is_match(value) {
        Ok(())
    } else {
        Err(TagError::InvalidId {
            kind,
            value: value.to_string(),
        })
    }
}

fn validate_uuid(kind: &'static str, value: &str) -> Result<(), TagError> {
    uuid::Uuid::parse_str(value)
        .map(|_| ())
        .map_err(|_| TagError::InvalidId {
            kind,
            value: value.to_string(),
        })
}

impl fmt::Display for Tag {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}-{}", self.kind(), self.id().replace('/', "-"))
    }
}

impl FromStr for Tag {
    type Err = TagError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let (kind, rest) = s
            .split_once('-')
            .ok_or_else(|| TagError::InvalidTag(s.to_string()))?;
        let parsed = match kind {
            "machine" => Tag::machine(&rest.replace('-', "/")),
            "unit" => {
                // The unit number follows the last dash; application names may contain dashes.
                let (app, number) = rest
                    .rsplit_once('-')
                    .ok_or_else(|| TagError::InvalidTag(s.to_string()))?;
                Tag::unit(&format!("{app}/{number}"))
            }
            "application" => Tag::application(rest),
            "model" => Tag::model(rest),
            "controller" => Tag::controller(rest),
            "user" => Tag::user(rest),
            _ => return Err(TagError::InvalidTag(s.to_string())),
        };
        parsed.map_err(|_| TagError::InvalidTag(s.to_string()))
    }
}

impl TryFrom<String> for Tag {
    type Error = TagError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        value.parse()
    }
}

impl From<Tag> for String {
    fn from(tag: Tag) -> Self {
        tag.to_string()
    }
}
