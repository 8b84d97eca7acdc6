use std::collections::BTreeMap;

use crate::error::ConsoleError;
use crate::types::{
    Installation, Origin, PackageVisibility, PlanTemplate, Profile, Project, Repository,
    SaveOutcome,
};

/// Where the console is pointed
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Route {
    PackageSettings {
        origin: String,
        name: String,
        target: Option<String>,
    },
    OriginMembers {
        origin: String,
    },
}

/// Focusable pane on the settings screen
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SettingsPane {
    #[default]
    Installations,
    Repositories,
    PlanPath,
}

#[derive(Debug, Clone)]
#[allow(clippy::enum_variant_names)]
pub enum Action {
    Quit,
    Back,
    ScrollUp,
    ScrollDown,
    Select,
    NextPane,
    Input(char),
    Backspace,

    // Settings screen
    SaveConnection,
    ShowDisconnect,
    ToggleAutoBuild,
    CycleVisibility,
    OpenGitHubApp,
    CheckPlanFile,

    // Popups
    ShowCreatePackage,
    ConfirmYes,
    ConfirmNo,

    // Component outputs
    Navigate(Route),
    ConnectionToggled(bool),
    ProjectConnected { origin: String, name: String },
    DialogClosed { created: bool },

    // Session
    SessionStarted { token: String },
    FetchProfile,
    ProfileLoaded(Profile),
    FetchOrigin(String),
    OriginLoaded(Origin),

    // GitHub
    FetchGitHubInstallations { username: String },
    GitHubInstallationsLoaded(Vec<Installation>),
    FetchGitHubRepositories(u64),
    GitHubRepositoriesLoaded(Vec<Repository>),
    FindFileInRepo {
        installation_id: u64,
        repo_id: u64,
        path: String,
    },
    FileLookedUp { path: String, exists: bool },

    // Projects
    FetchProjects { origin: String, name: String },
    ProjectsLoaded(Vec<Project>),
    FetchProject {
        origin: String,
        name: String,
        target: String,
    },
    ProjectLoaded(Box<Project>),
    AddProject(PlanTemplate),
    UpdateProject {
        origin: String,
        name: String,
        template: PlanTemplate,
    },
    ProjectSaved(SaveOutcome),
    DeleteProject {
        origin: String,
        name: String,
        target: String,
    },
    ProjectDeleted { target: String },
    FetchProjectIntegration {
        origin: String,
        name: String,
        integration: String,
    },
    SetProjectIntegrationSettings {
        origin: String,
        name: String,
        integration: String,
        settings: BTreeMap<String, String>,
    },
    ProjectIntegrationLoaded {
        integration: String,
        settings: BTreeMap<String, String>,
    },
    DeleteProjectIntegration {
        origin: String,
        name: String,
        integration: String,
    },
    ProjectIntegrationDeleted { integration: String },
    SetProjectVisibility {
        origin: String,
        name: String,
        visibility: PackageVisibility,
    },
    ProjectVisibilitySet(PackageVisibility),

    // Packages
    CreateEmptyPackage { origin: String, name: String },

    // Origin members
    FetchOriginMembers(String),
    OriginMembersLoaded(Vec<String>),
    DeleteOriginMember { origin: String, member: String },
    OriginMemberDeleted(String),
    InviteOriginMember { origin: String, account: String },
    OriginMemberInvited(String),

    Error(String),
    None,
}

impl From<ConsoleError> for Action {
    fn from(err: ConsoleError) -> Self {
        Action::Error(err.to_string())
    }
}
