use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::error::{ConsoleError, Result};

/// GitHub account that owns an installation or repository
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub id: u64,
    pub login: String,
}

/// GitHub App installation visible to the signed-in user
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Installation {
    pub id: u64,
    pub account: Account,
    #[serde(default)]
    pub app_id: Option<u64>,
}

/// Repository reachable through an installation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Repository {
    pub id: u64,
    pub name: String,
    pub full_name: String,
    pub owner: Account,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageVisibility {
    #[default]
    Public,
    Private,
    Hidden,
}

impl Project {
    /// One-line description of the connection: source, plan and last change
    pub fn connection_summary(&self) -> String {
        let mut summary = format!("{} {} ({})", self.vcs_type, self.vcs_data, self.plan_path);
        if let Some(id) = self.vcs_installation_id {
            summary.push_str(&format!(", installation {}", id));
        }
        if let Some(at) = self.updated_at.or(self.created_at) {
            summary.push_str(&format!(", updated {}", at.format("%Y-%m-%d")));
        }
        summary
    }
}

impl PackageVisibility {
    pub fn as_api_str(&self) -> &'static str {
        match self {
            PackageVisibility::Public => "public",
            PackageVisibility::Private => "private",
            PackageVisibility::Hidden => "hidden",
        }
    }
}

impl fmt::Display for PackageVisibility {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PackageVisibility::Public => write!(f, "Public"),
            PackageVisibility::Private => write!(f, "Private"),
            PackageVisibility::Hidden => write!(f, "Hidden"),
        }
    }
}

/// Builder ids travel as strings on the wire but may arrive as numbers.
mod db_id {
    use serde::{Deserialize, Deserializer, Serializer};

    #[derive(Deserialize)]
    #[serde(untagged)]
    enum Id {
        Text(String),
        Number(u64),
    }

    pub fn serialize<S: Serializer>(id: &u64, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_str(&id.to_string())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<u64, D::Error> {
        match Id::deserialize(d)? {
            Id::Number(n) => Ok(n),
            Id::Text(s) => s.parse().map_err(serde::de::Error::custom),
        }
    }
}

/// A project connects a package in an origin to a plan file in a repository
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Project {
    pub origin: String,
    pub package_name: String,
    pub name: String,
    pub plan_path: String,
    pub target: String,
    #[serde(default)]
    pub vcs_type: String,
    pub vcs_data: String,
    #[serde(default)]
    pub vcs_installation_id: Option<u64>,
    #[serde(default)]
    pub auto_build: bool,
    #[serde(default)]
    pub visibility: Option<PackageVisibility>,
    #[serde(default)]
    pub created_at: Option<DateTime<Utc>>,
    #[serde(default)]
    pub updated_at: Option<DateTime<Utc>>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Origin {
    pub name: String,
    #[serde(with = "db_id")]
    pub owner_id: u64,
    #[serde(default)]
    pub default_package_visibility: Option<PackageVisibility>,
    #[serde(default)]
    pub private_key_name: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Profile {
    #[serde(with = "db_id")]
    pub id: u64,
    pub name: String,
}

/// Package placeholder created before any plan is connected
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EmptyPackage {
    pub origin: String,
    pub name: String,
}

/// Build target known to Builder
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Target {
    pub id: &'static str,
    pub name: &'static str,
    pub param: &'static str,
}

pub const TARGETS: &[Target] = &[
    Target {
        id: "x86_64-linux",
        name: "Linux",
        param: "linux",
    },
    Target {
        id: "x86_64-linux-kernel2",
        name: "Linux (Kernel Version 2)",
        param: "linux-kernel2",
    },
    Target {
        id: "x86_64-windows",
        name: "Windows",
        param: "windows",
    },
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TargetField {
    Id,
    Param,
}

/// Look up a target by id or by its URL param
pub fn target_from(field: TargetField, value: &str) -> Option<&'static Target> {
    TARGETS.iter().find(|t| match field {
        TargetField::Id => t.id == value,
        TargetField::Param => t.param == value,
    })
}

/// Repository chosen for a connection, resolved against its installation
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SelectedInstallation {
    repo_id: u64,
    app_id: String,
    installation_id: u64,
    full_name: String,
    org: String,
    name: String,
}

impl SelectedInstallation {
    pub fn new(repo: &Repository, installation: &Installation, app_id: &str) -> Result<Self> {
        if app_id.is_empty() {
            return Err(ConsoleError::Validation("GitHub app id is not configured".into()));
        }
        if repo.name.is_empty() || repo.full_name.is_empty() {
            return Err(ConsoleError::Validation(format!(
                "repository {} has no name",
                repo.id
            )));
        }
        if repo.owner.login.is_empty() {
            return Err(ConsoleError::Validation(format!(
                "repository {} has no owner",
                repo.full_name
            )));
        }

        Ok(Self {
            repo_id: repo.id,
            app_id: app_id.to_string(),
            installation_id: installation.id,
            full_name: repo.full_name.clone(),
            org: repo.owner.login.clone(),
            name: repo.name.clone(),
        })
    }

    pub fn repo_id(&self) -> u64 {
        self.repo_id
    }

    pub fn app_id(&self) -> &str {
        &self.app_id
    }

    pub fn installation_id(&self) -> u64 {
        self.installation_id
    }

    pub fn full_name(&self) -> &str {
        &self.full_name
    }

    pub fn org(&self) -> &str {
        &self.org
    }

    pub fn name(&self) -> &str {
        &self.name
    }
}

/// Body sent when creating or updating a project
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct PlanTemplate {
    pub origin: String,
    pub plan_path: String,
    pub installation_id: u64,
    pub repo_id: u64,
    pub auto_build: bool,
    pub target: Option<String>,
}

/// Docker export integration as edited in the settings form
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct DockerSettings {
    pub enabled: bool,
    pub name: String,
    pub settings: BTreeMap<String, String>,
    pub valid: bool,
}

/// Result threaded back from a project add/update
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SaveOutcome {
    pub success: bool,
    pub origin: String,
    /// Empty when a create failed before Builder named the package
    pub package_name: String,
    pub error: Option<String>,
}

impl SaveOutcome {
    pub fn failure_message(&self) -> Option<String> {
        if self.success {
            return None;
        }
        let subject = if self.package_name.is_empty() {
            self.origin.clone()
        } else {
            format!("{}/{}", self.origin, self.package_name)
        };
        Some(format!(
            "Failed to save {}: {}",
            subject,
            self.error.as_deref().unwrap_or("unknown error")
        ))
    }
}
