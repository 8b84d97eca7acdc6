//! Project settings form: connects a package to a plan file in a GitHub
//! repository, per build target.

use std::cell::{Cell, RefCell};
use std::rc::{Rc, Weak};

use ratatui::widgets::ListState;
use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::{Action, Route};
use crate::config::Config;
use crate::deferred::DeferredQueue;
use crate::reconcile::{reconcile, ConnectionSink, ListKind, Reconciliation, ScanPolicy, TargetKey};
use crate::store::{Store, Subscribable};
use crate::types::{
    target_from, DockerSettings, Installation, PackageVisibility, PlanTemplate, Project,
    Repository, SaveOutcome, SelectedInstallation, TargetField,
};

const WINDOWS_TARGET: &str = "x86_64-windows";

/// Plan path input
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PlanField {
    pub value: String,
    pub dirty: bool,
}

/// Inputs that changed since the last update
#[derive(Debug, Clone, Default)]
pub struct Changes {
    pub project: Option<Project>,
    pub target: Option<String>,
}

/// Scroll state of the two pick lists. Deferred effects act on this after
/// a render.
#[derive(Debug, Clone, Default)]
pub struct ListView {
    pub installations: ListState,
    pub repositories: ListState,
    active_installation: Option<usize>,
    active_repository: Option<usize>,
}

impl ListView {
    fn reveal(&mut self, list: ListKind) {
        match list {
            ListKind::Installations => {
                if let Some(index) = self.active_installation {
                    self.installations.select(Some(index));
                }
            }
            ListKind::Repositories => {
                if let Some(index) = self.active_repository {
                    self.repositories.select(Some(index));
                }
            }
        }
    }
}

/// Selection state shared with store listeners during reconciliation.
struct Connection {
    store: Weak<Store>,
    tx: mpsc::UnboundedSender<Action>,
    app_id: String,
    active_installation: RefCell<Option<Installation>>,
    active_repo: RefCell<Option<Repository>>,
    selected_installation: RefCell<Option<SelectedInstallation>>,
    plan_field: RefCell<Option<PlanField>>,
    selected_path: RefCell<String>,
    deferred: DeferredQueue<ListView>,
}

impl Connection {
    fn select_repository(&self, repo: &Repository) {
        let Some(install) = self.active_installation.borrow().clone() else {
            warn!(repo = %repo.full_name, "repository picked without an installation");
            return;
        };

        match SelectedInstallation::new(repo, &install, &self.app_id) {
            Ok(selected) => *self.selected_installation.borrow_mut() = Some(selected),
            Err(e) => {
                self.tx.send(Action::from(e)).ok();
                return;
            }
        }

        let mut field = self.plan_field.borrow_mut();
        match field.as_mut() {
            Some(field) => field.dirty = true,
            None => {
                *field = Some(PlanField {
                    value: self.selected_path.borrow().clone(),
                    dirty: false,
                })
            }
        }
    }

    fn clear(&self, default_path: String) {
        *self.active_installation.borrow_mut() = None;
        *self.active_repo.borrow_mut() = None;
        *self.selected_installation.borrow_mut() = None;
        *self.plan_field.borrow_mut() = None;
        *self.selected_path.borrow_mut() = default_path;
    }
}

impl ConnectionSink for Connection {
    fn pick_installation(&self, installation: &Installation) {
        debug!(installation = installation.id, login = %installation.account.login, "installation picked");
        *self.active_installation.borrow_mut() = Some(installation.clone());
        *self.active_repo.borrow_mut() = None;
        if let Some(store) = self.store.upgrade() {
            store.dispatch(Action::FetchGitHubRepositories(installation.id));
        }
    }

    fn pick_repository(&self, repository: &Repository) {
        debug!(repo = %repository.full_name, "repository picked");
        *self.active_repo.borrow_mut() = Some(repository.clone());
        self.select_repository(repository);
    }

    fn scroll_into_view(&self, list: ListKind) {
        self.deferred.defer(move |view: &mut ListView| view.reveal(list));
    }
}

pub struct ProjectSettings {
    store: Rc<Store>,
    config: Rc<Config>,
    tx: mpsc::UnboundedSender<Action>,
    pub origin: String,
    pub name: String,
    pub docker: DockerSettings,
    project: Option<Project>,
    projects: Vec<Project>,
    target: Option<String>,
    connecting: bool,
    selected_repo: Option<String>,
    visibility: Option<PackageVisibility>,
    auto_build: Cell<Option<bool>>,
    connection: Rc<Connection>,
    view: ListView,
    reconciliation: Option<Reconciliation>,
}

impl ProjectSettings {
    pub fn new(
        store: Rc<Store>,
        config: Rc<Config>,
        tx: mpsc::UnboundedSender<Action>,
        origin: String,
        name: String,
    ) -> Self {
        let connection = Rc::new(Connection {
            store: Rc::downgrade(&store),
            tx: tx.clone(),
            app_id: config.github.app_id.clone(),
            active_installation: RefCell::new(None),
            active_repo: RefCell::new(None),
            selected_installation: RefCell::new(None),
            plan_field: RefCell::new(None),
            selected_path: RefCell::new(String::new()),
            deferred: DeferredQueue::new(),
        });

        let settings = Self {
            store,
            config,
            tx,
            origin,
            name,
            docker: DockerSettings::default(),
            project: None,
            projects: Vec::new(),
            target: None,
            connecting: false,
            selected_repo: None,
            visibility: None,
            auto_build: Cell::new(None),
            connection,
            view: ListView::default(),
            reconciliation: None,
        };
        *settings.connection.selected_path.borrow_mut() = settings.default_path();
        settings
    }

    // Inputs

    pub fn set_projects(&mut self, projects: Vec<Project>) {
        self.projects = projects;
    }

    pub fn on_changes(&mut self, changes: Changes) {
        if let Some(project) = changes.project {
            self.selected_repo = Some(project.vcs_data.clone());
            *self.connection.selected_path.borrow_mut() = project.plan_path.clone();
            if project.visibility.is_some() {
                self.visibility = project.visibility;
            }
            self.project = Some(project);
        }

        if let Some(target) = changes.target {
            self.target = Some(target.clone());
            if self.projects.iter().any(|p| p.target == target) {
                self.edit_connection(&target);
            } else {
                self.connect();
            }
        }
    }

    // Computed state

    pub fn auto_build(&self) -> bool {
        if let Some(v) = self.auto_build.get() {
            return v;
        }
        let v = self
            .store
            .snapshot()
            .projects
            .current
            .project
            .as_ref()
            .is_some_and(|p| p.auto_build);
        self.auto_build.set(Some(v));
        v
    }

    pub fn set_auto_build(&self, v: bool) {
        self.auto_build.set(Some(v));
    }

    pub fn is_updating(&self) -> bool {
        self.target
            .as_ref()
            .is_some_and(|target| self.projects.iter().any(|p| &p.target == target))
    }

    pub fn connect_button_label(&self) -> &'static str {
        if self.is_updating() {
            "Update"
        } else {
            "Save"
        }
    }

    pub fn docker_enabled(&self) -> bool {
        !self.store.snapshot().projects.current.settings.is_empty()
    }

    pub fn is_windows_target(&self) -> bool {
        self.target.as_deref() == Some(WINDOWS_TARGET)
    }

    fn plan_extension(&self) -> &'static str {
        if self.is_windows_target() {
            "ps1"
        } else {
            "sh"
        }
    }

    pub fn default_path(&self) -> String {
        format!("habitat/plan.{}", self.plan_extension())
    }

    pub fn plan_target_name(&self) -> Option<&'static str> {
        let target = self.target.as_deref()?;
        target_from(TargetField::Id, target).map(|t| t.name)
    }

    pub fn invalid_filename_message(&self) -> String {
        format!(
            "A {} plan file name must end with .{}",
            self.plan_target_name().unwrap_or_default(),
            self.plan_extension()
        )
    }

    pub fn filename_is_valid(&self, value: &str) -> bool {
        value.ends_with(&format!(".{}", self.plan_extension()))
    }

    pub fn git_hub_app_installed(&self) -> bool {
        let state = self.store.snapshot();
        !state.github.ui.installations.loading && !state.github.installations.is_empty()
    }

    pub fn git_hub_app_note(&self) -> &'static str {
        if self.git_hub_app_installed() {
            "If you don't see one or more of your organizations or repositories listed below, \
             you may need to adjust the settings of the Builder GitHub app."
        } else {
            "In order to connect a plan file in your repo, you must first install the Builder \
             GitHub app and allow access to that repository."
        }
    }

    pub fn git_hub_app_label(&self) -> &'static str {
        if self.git_hub_app_installed() {
            "Open"
        } else {
            "Install"
        }
    }

    pub fn git_hub_app_url(&self) -> &str {
        &self.config.github.app_url
    }

    pub fn has_private_key(&self) -> bool {
        let state = self.store.snapshot();
        let origin = &state.origins.current;
        origin.name == self.origin && origin.private_key_name.is_some()
    }

    pub fn loading_installations(&self) -> bool {
        self.store.snapshot().github.ui.installations.loading
    }

    pub fn loading_repositories(&self) -> bool {
        self.store.snapshot().github.ui.repositories.loading
    }

    pub fn installations(&self) -> Vec<Installation> {
        self.store.snapshot().github.installations.clone()
    }

    pub fn repositories(&self) -> Vec<Repository> {
        self.store.snapshot().github.repositories.clone()
    }

    pub fn plan_template(&self) -> Option<PlanTemplate> {
        let selected = self.connection.selected_installation.borrow().clone()?;
        let repo_id = self.connection.active_repo.borrow().as_ref()?.id;
        let plan_path = self.connection.plan_field.borrow().as_ref()?.value.clone();

        Some(PlanTemplate {
            origin: self.origin.clone(),
            plan_path,
            installation_id: selected.installation_id(),
            repo_id,
            auto_build: self.auto_build(),
            target: self.target.clone(),
        })
    }

    pub fn repo_url(&self) -> Option<String> {
        self.connection
            .selected_installation
            .borrow()
            .as_ref()
            .map(|s| format!("https://github.com/{}", s.full_name()))
    }

    pub fn repo_selected(&self) -> bool {
        self.connection.active_installation.borrow().is_some()
            && self.connection.active_repo.borrow().is_some()
    }

    pub fn valid_project(&self) -> bool {
        let plan_valid = self
            .connection
            .plan_field
            .borrow()
            .as_ref()
            .is_some_and(|f| self.filename_is_valid(&f.value));
        let docker_valid = !self.docker.enabled || self.docker.valid;
        self.connection.selected_installation.borrow().is_some() && docker_valid && plan_valid
    }

    pub fn visibility(&self) -> PackageVisibility {
        self.visibility
            .or(self.store.snapshot().origins.current.default_package_visibility)
            .unwrap_or_default()
    }

    /// A stored connection is still waiting on one of its lists
    pub fn reconciling(&self) -> bool {
        self.reconciliation
            .as_ref()
            .is_some_and(|r| !r.is_settled())
    }

    pub fn connecting(&self) -> bool {
        self.connecting
    }

    pub fn target(&self) -> Option<&str> {
        self.target.as_deref()
    }

    pub fn projects(&self) -> &[Project] {
        &self.projects
    }

    pub fn selected_repo(&self) -> Option<&str> {
        self.selected_repo.as_deref()
    }

    pub fn active_installation(&self) -> Option<Installation> {
        self.connection.active_installation.borrow().clone()
    }

    pub fn active_repo(&self) -> Option<Repository> {
        self.connection.active_repo.borrow().clone()
    }

    pub fn selected_installation(&self) -> Option<SelectedInstallation> {
        self.connection.selected_installation.borrow().clone()
    }

    pub fn plan_field(&self) -> Option<PlanField> {
        self.connection.plan_field.borrow().clone()
    }

    /// Result of the last plan file lookup for the current plan path
    pub fn plan_file_found(&self) -> Option<bool> {
        let path = self.connection.plan_field.borrow().as_ref()?.value.clone();
        self.store.snapshot().github.files.get(&path).copied()
    }

    pub fn view(&self) -> &ListView {
        &self.view
    }

    pub fn view_mut(&mut self) -> &mut ListView {
        &mut self.view
    }

    // Operations

    pub fn open_connect(&self, target_param: &str) {
        self.tx
            .send(Action::Navigate(Route::PackageSettings {
                origin: self.origin.clone(),
                name: self.name.clone(),
                target: Some(target_param.to_string()),
            }))
            .ok();
    }

    pub fn open_connect_edit(&self, project: &Project) {
        if let Some(target) = target_from(TargetField::Id, &project.target) {
            self.open_connect(target.param);
        }
    }

    pub fn connect(&mut self) {
        self.cancel_reconciliation();
        self.deselect();
        let username = self.store.snapshot().users.current.profile.name.clone();
        self.store
            .dispatch(Action::FetchGitHubInstallations { username });
        self.connecting = true;
        self.tx.send(Action::ConnectionToggled(self.connecting)).ok();
    }

    /// Called once the user confirmed the disconnect dialog.
    pub fn disconnect(&self, project: &Project) {
        self.store.dispatch(Action::DeleteProject {
            origin: project.origin.clone(),
            name: project.package_name.clone(),
            target: project.target.clone(),
        });
    }

    pub fn clear_connection(&mut self) {
        self.clear_selection();
        self.tx
            .send(Action::Navigate(Route::PackageSettings {
                origin: self.origin.clone(),
                name: self.name.clone(),
                target: None,
            }))
            .ok();
    }

    pub fn clear_selection(&mut self) {
        self.cancel_reconciliation();
        self.connecting = false;
        self.deselect();
        self.tx.send(Action::ConnectionToggled(self.connecting)).ok();
        self.connection.deferred.clear();
        self.view = ListView::default();
    }

    fn cancel_reconciliation(&mut self) {
        if let Some(reconciliation) = self.reconciliation.take() {
            reconciliation.cancel();
        }
    }

    pub fn deselect(&mut self) {
        self.selected_repo = None;
        self.connection.clear(self.default_path());
    }

    /// Reopen the connection for `target` and select its stored
    /// installation and repository once the lists load.
    pub fn edit_connection(&mut self, target: &str) {
        let Some(project) = self.projects.iter().find(|p| p.target == target).cloned() else {
            warn!(target, "no project to edit for target");
            return;
        };
        self.connect();

        *self.connection.selected_path.borrow_mut() = project.plan_path.clone();
        let full_name = parse_github_url(&project.vcs_data);
        let key = TargetKey::parse(&full_name);
        self.selected_repo = Some(full_name);

        let policy = ScanPolicy::from_flag(self.config.reconcile.until_matched);
        self.reconciliation = Some(reconcile(
            &*self.store,
            &key,
            policy,
            Rc::clone(&self.connection),
        ));
    }

    pub fn next(&self) {
        if let Some(repo) = self.active_repo() {
            self.connection.select_repository(&repo);
        }
    }

    pub fn pick_installation(&self, installation: &Installation) {
        self.connection.pick_installation(installation);
    }

    pub fn pick_repo(&self, repo: &Repository) {
        self.connection.pick_repository(repo);
    }

    pub fn edit_plan_path(&self, edit: impl FnOnce(&mut String)) {
        if let Some(field) = self.connection.plan_field.borrow_mut().as_mut() {
            edit(&mut field.value);
            field.dirty = true;
        }
    }

    pub fn save_connection(&self) {
        let Some(template) = self.plan_template() else {
            self.tx
                .send(Action::Error("Pick a repository and plan file first".into()))
                .ok();
            return;
        };

        if self.is_updating() {
            let (origin, name) = match &self.project {
                Some(p) => (p.origin.clone(), p.package_name.clone()),
                None => (self.origin.clone(), self.name.clone()),
            };
            self.store.dispatch(Action::UpdateProject {
                origin,
                name,
                template,
            });
        } else {
            self.store.dispatch(Action::AddProject(template));
        }
    }

    /// Completion of `save_connection`.
    pub fn handle_saved(&mut self, outcome: &SaveOutcome) {
        if !outcome.success {
            return;
        }
        self.save_integration(&outcome.origin, &outcome.package_name);
        let origin = outcome.origin.clone();
        let name = outcome.package_name.clone();
        match self.target.clone() {
            Some(target) => self.store.dispatch(Action::FetchProject {
                origin,
                name,
                target,
            }),
            None => self.store.dispatch(Action::FetchProjects { origin, name }),
        }
        self.tx
            .send(Action::ProjectConnected {
                origin: outcome.origin.clone(),
                name: outcome.package_name.clone(),
            })
            .ok();
        self.clear_connection();
    }

    pub fn setting_changed(&mut self, visibility: PackageVisibility) {
        self.visibility = Some(visibility);
        self.store.dispatch(Action::SetProjectVisibility {
            origin: self.origin.clone(),
            name: self.name.clone(),
            visibility,
        });
    }

    /// Ask Builder whether the plan file exists in the selected repository.
    /// Returns false when there is nothing to look up yet.
    pub fn does_file_exist(&self) -> bool {
        let Some(selected) = self.selected_installation() else {
            return false;
        };
        let Some(path) = self.plan_field().map(|f| f.value) else {
            return false;
        };
        self.store.dispatch(Action::FindFileInRepo {
            installation_id: selected.installation_id(),
            repo_id: selected.repo_id(),
            path,
        });
        true
    }

    /// Post-render hook: run one deferred effect against the list view.
    pub fn after_render(&mut self) -> bool {
        self.view.active_installation = self.active_installation().and_then(|active| {
            self.store
                .snapshot()
                .installations()
                .iter()
                .position(|i| i.id == active.id)
        });
        self.view.active_repository = self.active_repo().and_then(|active| {
            self.store
                .snapshot()
                .repositories()
                .iter()
                .position(|r| r.id == active.id)
        });
        self.connection.deferred.run_next(&mut self.view)
    }

    fn save_integration(&self, origin: &str, name: &str) {
        if self.docker.enabled {
            self.store.dispatch(Action::SetProjectIntegrationSettings {
                origin: origin.to_string(),
                name: name.to_string(),
                integration: self.docker.name.clone(),
                settings: self.docker.settings.clone(),
            });
        } else {
            let state = self.store.snapshot();
            for integration in state.projects.current.settings.keys() {
                self.store.dispatch(Action::DeleteProjectIntegration {
                    origin: self.origin.clone(),
                    name: self.name.clone(),
                    integration: integration.clone(),
                });
            }
        }
    }
}

impl Drop for ProjectSettings {
    fn drop(&mut self) {
        self.cancel_reconciliation();
    }
}

/// `https://github.com/org/repo.git` -> `org/repo`; anything else -> ""
pub fn parse_github_url(url: &str) -> String {
    url.split_once("github.com/")
        .and_then(|(_, rest)| rest.strip_suffix(".git"))
        .filter(|full_name| !full_name.is_empty())
        .unwrap_or_default()
        .to_string()
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;

    use super::*;
    use crate::store::{AppState, Effects, NoEffects};
    use crate::types::{Account, Origin};

    struct Recorder(Rc<RefCell<Vec<Action>>>);

    impl Effects for Recorder {
        fn handle(&self, action: &Action) {
            self.0.borrow_mut().push(action.clone());
        }
    }

    fn install(id: u64, login: &str) -> Installation {
        Installation {
            id,
            account: Account {
                id: id + 100,
                login: login.into(),
            },
            app_id: None,
        }
    }

    fn repo(id: u64, name: &str) -> Repository {
        Repository {
            id,
            name: name.into(),
            full_name: format!("acme/{}", name),
            owner: Account {
                id: 7,
                login: "acme".into(),
            },
        }
    }

    fn project(target: &str) -> Project {
        Project {
            origin: "core".into(),
            package_name: "widgets".into(),
            name: "core/widgets".into(),
            plan_path: "plans/widgets/plan.sh".into(),
            target: target.into(),
            vcs_type: "git".into(),
            vcs_data: "https://github.com/acme/widgets.git".into(),
            vcs_installation_id: Some(2),
            auto_build: true,
            visibility: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn settings_with(
        store: &Rc<Store>,
    ) -> (ProjectSettings, mpsc::UnboundedReceiver<Action>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let settings = ProjectSettings::new(
            Rc::clone(store),
            Rc::new(Config::default()),
            tx,
            "core".into(),
            "widgets".into(),
        );
        (settings, rx)
    }

    fn drain(rx: &mut mpsc::UnboundedReceiver<Action>) -> Vec<Action> {
        let mut out = Vec::new();
        while let Ok(action) = rx.try_recv() {
            out.push(action);
        }
        out
    }

    #[test]
    fn plan_path_follows_target() {
        let store = Store::new(NoEffects);
        let (mut settings, _rx) = settings_with(&store);
        assert_eq!(settings.default_path(), "habitat/plan.sh");

        settings.on_changes(Changes {
            project: None,
            target: Some("x86_64-windows".into()),
        });
        assert_eq!(settings.default_path(), "habitat/plan.ps1");
        assert!(settings.filename_is_valid("habitat/plan.ps1"));
        assert!(!settings.filename_is_valid("habitat/plan.sh"));
        assert_eq!(
            settings.invalid_filename_message(),
            "A Windows plan file name must end with .ps1"
        );
    }

    #[test]
    fn connect_fetches_installations_and_toggles() {
        let store = Store::new(NoEffects);
        let (mut settings, mut rx) = settings_with(&store);
        settings.on_changes(Changes {
            project: None,
            target: Some("x86_64-linux".into()),
        });

        assert!(settings.connecting());
        assert!(!settings.is_updating());
        assert_eq!(settings.connect_button_label(), "Save");
        assert!(store.snapshot().github.ui.installations.loading);
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Action::ConnectionToggled(true)]
        ));
    }

    #[test]
    fn edit_connection_selects_stored_repository() {
        let store = Store::new(NoEffects);
        let (mut settings, _rx) = settings_with(&store);
        settings.set_projects(vec![project("x86_64-linux")]);
        settings.on_changes(Changes {
            project: Some(project("x86_64-linux")),
            target: Some("x86_64-linux".into()),
        });
        assert!(settings.is_updating());
        assert!(settings.reconciling());
        assert_eq!(settings.selected_repo(), Some("acme/widgets"));

        store.dispatch(Action::GitHubInstallationsLoaded(vec![
            install(1, "other"),
            install(2, "acme"),
        ]));
        assert_eq!(settings.active_installation().map(|i| i.id), Some(2));
        assert!(store.snapshot().github.ui.repositories.loading);

        store.dispatch(Action::GitHubRepositoriesLoaded(vec![
            repo(10, "gadgets"),
            repo(11, "widgets"),
        ]));
        assert!(settings.repo_selected());
        assert!(!settings.reconciling());
        let selected = settings.selected_installation().unwrap();
        assert_eq!(selected.installation_id(), 2);
        assert_eq!(selected.repo_id(), 11);
        assert_eq!(
            settings.plan_field().map(|f| f.value),
            Some("plans/widgets/plan.sh".to_string())
        );
        assert!(settings.valid_project());
        assert_eq!(
            settings.repo_url().as_deref(),
            Some("https://github.com/acme/widgets")
        );

        assert_eq!(settings.view().installations.selected(), None);
        assert!(settings.after_render());
        assert_eq!(settings.view().installations.selected(), Some(1));
        assert_eq!(settings.view().repositories.selected(), None);
        assert!(settings.after_render());
        assert_eq!(settings.view().repositories.selected(), Some(1));
        assert!(!settings.after_render());
    }

    #[test]
    fn save_connection_updates_existing_project() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let store = Store::new(Recorder(Rc::clone(&log)));
        let (mut settings, _rx) = settings_with(&store);
        settings.set_projects(vec![project("x86_64-linux")]);
        settings.on_changes(Changes {
            project: Some(project("x86_64-linux")),
            target: Some("x86_64-linux".into()),
        });
        store.dispatch(Action::GitHubInstallationsLoaded(vec![install(2, "acme")]));
        store.dispatch(Action::GitHubRepositoriesLoaded(vec![repo(11, "widgets")]));
        log.borrow_mut().clear();

        settings.save_connection();
        match log.borrow().as_slice() {
            [Action::UpdateProject {
                origin,
                name,
                template,
            }] => {
                assert_eq!(origin, "core");
                assert_eq!(name, "widgets");
                assert_eq!(template.installation_id, 2);
                assert_eq!(template.repo_id, 11);
                assert_eq!(template.target.as_deref(), Some("x86_64-linux"));
            }
            other => panic!("unexpected {:?}", other),
        };
    }

    #[test]
    fn leaving_an_edit_stops_its_matching() {
        let store = Store::new(NoEffects);
        let (mut settings, _rx) = settings_with(&store);
        settings.set_projects(vec![project("x86_64-linux")]);
        settings.on_changes(Changes {
            project: None,
            target: Some("x86_64-linux".into()),
        });
        assert!(settings.reconciling());

        settings.clear_connection();
        assert!(!settings.reconciling());
        assert_eq!(store.listener_count(), 0);

        settings.on_changes(Changes {
            project: None,
            target: Some("x86_64-windows".into()),
        });
        store.dispatch(Action::GitHubInstallationsLoaded(vec![install(2, "acme")]));
        store.dispatch(Action::GitHubRepositoriesLoaded(vec![repo(11, "widgets")]));

        assert!(settings.connecting());
        assert_eq!(settings.active_installation(), None);
        assert_eq!(settings.active_repo(), None);
        assert!(settings.plan_field().is_none());
        assert!(!settings.after_render());
    }

    #[test]
    fn new_connect_replaces_pending_edit() {
        let store = Store::new(NoEffects);
        let (mut settings, _rx) = settings_with(&store);
        settings.set_projects(vec![project("x86_64-linux")]);
        settings.edit_connection("x86_64-linux");
        assert_eq!(store.listener_count(), 2);

        settings.connect();
        assert_eq!(store.listener_count(), 0);
        store.dispatch(Action::GitHubInstallationsLoaded(vec![install(2, "acme")]));
        assert_eq!(settings.active_installation(), None);
    }

    #[test]
    fn save_without_selection_reports_error() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let store = Store::new(Recorder(Rc::clone(&log)));
        let (settings, mut rx) = settings_with(&store);

        settings.save_connection();
        assert!(log.borrow().is_empty());
        assert!(matches!(drain(&mut rx).as_slice(), [Action::Error(_)]));
    }

    #[test]
    fn handle_saved_removes_stale_integrations() {
        let log = Rc::new(RefCell::new(Vec::new()));
        let mut state = AppState::default();
        state
            .projects
            .current
            .settings
            .insert("docker".into(), BTreeMap::new());
        let store = Store::with_state(state, Recorder(Rc::clone(&log)));
        let (mut settings, mut rx) = settings_with(&store);
        assert!(settings.docker_enabled());

        settings.handle_saved(&SaveOutcome {
            success: true,
            origin: "core".into(),
            package_name: "widgets".into(),
            error: None,
        });

        let dispatched = log.borrow();
        assert!(matches!(
            dispatched.as_slice(),
            [
                Action::DeleteProjectIntegration { integration, .. },
                Action::FetchProjects { .. }
            ] if integration == "docker"
        ));
        let outputs = drain(&mut rx);
        assert!(matches!(
            outputs.as_slice(),
            [
                Action::ProjectConnected { .. },
                Action::ConnectionToggled(false),
                Action::Navigate(Route::PackageSettings { target: None, .. })
            ]
        ));
    }

    #[test]
    fn failed_save_keeps_form() {
        let store = Store::new(NoEffects);
        let (mut settings, mut rx) = settings_with(&store);
        settings.on_changes(Changes {
            project: None,
            target: Some("x86_64-linux".into()),
        });
        drain(&mut rx);

        settings.handle_saved(&SaveOutcome {
            success: false,
            origin: "core".into(),
            package_name: "widgets".into(),
            error: None,
        });
        assert!(settings.connecting());
        assert!(drain(&mut rx).is_empty());
    }

    #[test]
    fn visibility_falls_back_to_origin_default() {
        let mut state = AppState::default();
        state.origins.current = Origin {
            name: "core".into(),
            owner_id: 1,
            default_package_visibility: Some(PackageVisibility::Private),
            private_key_name: Some("core-20240101".into()),
        };
        let store = Store::with_state(state, NoEffects);
        let (mut settings, _rx) = settings_with(&store);
        assert_eq!(settings.visibility(), PackageVisibility::Private);
        assert!(settings.has_private_key());

        settings.setting_changed(PackageVisibility::Hidden);
        assert_eq!(settings.visibility(), PackageVisibility::Hidden);
    }

    #[test]
    fn github_app_label_tracks_installations() {
        let store = Store::new(NoEffects);
        let (settings, _rx) = settings_with(&store);
        assert_eq!(settings.git_hub_app_label(), "Install");

        store.dispatch(Action::GitHubInstallationsLoaded(vec![install(2, "acme")]));
        assert_eq!(settings.git_hub_app_label(), "Open");
        assert!(settings.git_hub_app_note().starts_with("If you don't see"));
    }

    #[test]
    fn auto_build_is_read_once() {
        let mut state = AppState::default();
        state.projects.current.project = Some(project("x86_64-linux"));
        let store = Store::with_state(state, NoEffects);
        let (settings, _rx) = settings_with(&store);
        assert!(settings.auto_build());

        store.dispatch(Action::ProjectDeleted {
            target: "x86_64-linux".into(),
        });
        assert!(settings.auto_build());
        settings.set_auto_build(false);
        assert!(!settings.auto_build());
    }

    #[test]
    fn dropping_settings_cancels_watches() {
        let store = Store::new(NoEffects);
        {
            let (mut settings, _rx) = settings_with(&store);
            settings.set_projects(vec![project("x86_64-linux")]);
            settings.edit_connection("x86_64-linux");
            assert_eq!(store.listener_count(), 2);
        }
        assert_eq!(store.listener_count(), 0);
    }

    #[test]
    fn open_connect_edit_uses_target_param() {
        let store = Store::new(NoEffects);
        let (settings, mut rx) = settings_with(&store);
        settings.open_connect_edit(&project("x86_64-linux-kernel2"));
        assert!(matches!(
            drain(&mut rx).as_slice(),
            [Action::Navigate(Route::PackageSettings { target: Some(t), .. })] if t == "linux-kernel2"
        ));
    }

    #[test]
    fn github_url_parsing() {
        assert_eq!(
            parse_github_url("https://github.com/acme/widgets.git"),
            "acme/widgets"
        );
        assert_eq!(parse_github_url("https://github.com/acme/widgets"), "");
        assert_eq!(parse_github_url("https://gitlab.com/acme/widgets.git"), "");
    }
}
