use std::future::Future;
use std::sync::Arc;

use tokio::sync::mpsc;
use tracing::{debug, warn};

use crate::action::Action;
use crate::api::BuilderApi;
use crate::error::Result;
use crate::store::Effects;
use crate::types::SaveOutcome;

/// Turns request actions into REST calls on tokio tasks. Results come back
/// as actions on `tx`; nothing is awaited on the UI task.
pub struct ApiEffects {
    api: Arc<dyn BuilderApi>,
    tx: mpsc::UnboundedSender<Action>,
}

impl ApiEffects {
    pub fn new(api: Arc<dyn BuilderApi>, tx: mpsc::UnboundedSender<Action>) -> Self {
        Self { api, tx }
    }

    /// Run `call` and send the action it resolves to, or `Action::Error`.
    fn spawn<Fut>(&self, call: impl FnOnce(Arc<dyn BuilderApi>) -> Fut)
    where
        Fut: Future<Output = Result<Action>> + Send + 'static,
    {
        let tx = self.tx.clone();
        let fut = call(Arc::clone(&self.api));
        tokio::spawn(async move {
            let action = match fut.await {
                Ok(action) => action,
                Err(e) => {
                    warn!(error = %e, "request failed");
                    Action::from(e)
                }
            };
            tx.send(action).ok();
        });
    }
}

impl Effects for ApiEffects {
    fn handle(&self, action: &Action) {
        match action.clone() {
            Action::FetchProfile => {
                self.spawn(|api| async move { api.current_profile().await.map(Action::ProfileLoaded) });
            }
            Action::FetchOrigin(origin) => {
                self.spawn(|api| async move { api.get_origin(&origin).await.map(Action::OriginLoaded) });
            }
            Action::FetchGitHubInstallations { username } => {
                debug!(%username, "fetching GitHub installations");
                self.spawn(|api| async move {
                    api.list_installations()
                        .await
                        .map(Action::GitHubInstallationsLoaded)
                });
            }
            Action::FetchGitHubRepositories(installation_id) => {
                self.spawn(move |api| async move {
                    api.list_installation_repositories(installation_id)
                        .await
                        .map(Action::GitHubRepositoriesLoaded)
                });
            }
            Action::FindFileInRepo {
                installation_id,
                repo_id,
                path,
            } => {
                self.spawn(move |api| async move {
                    api.find_file_in_repo(installation_id, repo_id, &path)
                        .await
                        .map(|exists| Action::FileLookedUp { path, exists })
                });
            }
            Action::FetchProjects { origin, name } => {
                self.spawn(|api| async move {
                    api.list_projects(&origin, &name)
                        .await
                        .map(Action::ProjectsLoaded)
                });
            }
            Action::FetchProject {
                origin,
                name,
                target,
            } => {
                self.spawn(|api| async move {
                    api.get_project(&origin, &name, &target)
                        .await
                        .map(|project| match project {
                            Some(project) => Action::ProjectLoaded(Box::new(project)),
                            None => Action::ProjectDeleted { target },
                        })
                });
            }
            Action::AddProject(template) => {
                self.spawn(|api| async move {
                    let outcome = match api.create_project(&template).await {
                        Ok(project) => SaveOutcome {
                            success: true,
                            origin: project.origin,
                            package_name: project.package_name,
                            error: None,
                        },
                        Err(e) => {
                            warn!(error = %e, "could not create project");
                            SaveOutcome {
                                success: false,
                                origin: template.origin,
                                package_name: String::new(),
                                error: Some(e.to_string()),
                            }
                        }
                    };
                    Ok(Action::ProjectSaved(outcome))
                });
            }
            Action::UpdateProject {
                origin,
                name,
                template,
            } => {
                self.spawn(|api| async move {
                    let error = match api.update_project(&origin, &name, &template).await {
                        Ok(()) => None,
                        Err(e) => {
                            warn!(error = %e, "could not update project");
                            Some(e.to_string())
                        }
                    };
                    Ok(Action::ProjectSaved(SaveOutcome {
                        success: error.is_none(),
                        origin,
                        package_name: name,
                        error,
                    }))
                });
            }
            Action::DeleteProject {
                origin,
                name,
                target,
            } => {
                self.spawn(|api| async move {
                    api.delete_project(&origin, &name, &target)
                        .await
                        .map(|()| Action::ProjectDeleted { target })
                });
            }
            Action::FetchProjectIntegration {
                origin,
                name,
                integration,
            } => {
                self.spawn(|api| async move {
                    api.get_project_integration(&origin, &name, &integration)
                        .await
                        .map(|settings| match settings {
                            Some(settings) => Action::ProjectIntegrationLoaded {
                                integration,
                                settings,
                            },
                            None => Action::ProjectIntegrationDeleted { integration },
                        })
                });
            }
            Action::SetProjectIntegrationSettings {
                origin,
                name,
                integration,
                settings,
            } => {
                self.spawn(|api| async move {
                    api.set_project_integration(&origin, &name, &integration, &settings)
                        .await
                        .map(|()| Action::ProjectIntegrationLoaded {
                            integration,
                            settings,
                        })
                });
            }
            Action::DeleteProjectIntegration {
                origin,
                name,
                integration,
            } => {
                self.spawn(|api| async move {
                    api.delete_project_integration(&origin, &name, &integration)
                        .await
                        .map(|()| Action::ProjectIntegrationDeleted { integration })
                });
            }
            Action::SetProjectVisibility {
                origin,
                name,
                visibility,
            } => {
                self.spawn(move |api| async move {
                    api.set_project_visibility(&origin, &name, visibility)
                        .await
                        .map(|()| Action::ProjectVisibilitySet(visibility))
                });
            }
            Action::FetchOriginMembers(origin) => {
                self.spawn(|api| async move {
                    api.list_origin_members(&origin)
                        .await
                        .map(Action::OriginMembersLoaded)
                });
            }
            Action::DeleteOriginMember { origin, member } => {
                self.spawn(|api| async move {
                    api.delete_origin_member(&origin, &member)
                        .await
                        .map(|()| Action::OriginMemberDeleted(member))
                });
            }
            Action::InviteOriginMember { origin, account } => {
                self.spawn(|api| async move {
                    api.invite_origin_member(&origin, &account)
                        .await
                        .map(|()| Action::OriginMemberInvited(account))
                });
            }
            _ => {}
        }
    }
}

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::Mutex;

    use async_trait::async_trait;

    use super::*;
    use crate::error::ConsoleError;
    use crate::types::{
        Account, Installation, Origin, PackageVisibility, PlanTemplate, Profile, Project,
        Repository,
    };

    #[derive(Debug, Default)]
    struct FakeBuilder {
        calls: Mutex<Vec<String>>,
        fail_updates: bool,
        fail_creates: bool,
    }

    impl FakeBuilder {
        fn record(&self, call: impl Into<String>) {
            self.calls.lock().unwrap().push(call.into());
        }
    }

    fn project(origin: &str, name: &str, target: &str) -> Project {
        Project {
            origin: origin.into(),
            package_name: name.into(),
            name: format!("{}/{}", origin, name),
            plan_path: "habitat/plan.sh".into(),
            target: target.into(),
            vcs_type: "git".into(),
            vcs_data: "https://github.com/acme/widgets.git".into(),
            vcs_installation_id: Some(1),
            auto_build: false,
            visibility: None,
            created_at: None,
            updated_at: None,
        }
    }

    #[async_trait]
    impl BuilderApi for FakeBuilder {
        async fn current_profile(&self) -> Result<Profile> {
            Ok(Profile {
                id: 123456,
                name: "bob".into(),
            })
        }
        async fn get_origin(&self, origin: &str) -> Result<Origin> {
            Ok(Origin {
                name: origin.into(),
                owner_id: 111111,
                ..Origin::default()
            })
        }
        async fn list_installations(&self) -> Result<Vec<Installation>> {
            Ok(vec![Installation {
                id: 1,
                account: Account {
                    id: 2,
                    login: "acme".into(),
                },
                app_id: None,
            }])
        }
        async fn list_installation_repositories(&self, installation_id: u64) -> Result<Vec<Repository>> {
            self.record(format!("repos:{}", installation_id));
            Ok(Vec::new())
        }
        async fn find_file_in_repo(&self, _installation_id: u64, _repo_id: u64, path: &str) -> Result<bool> {
            Ok(path.ends_with(".sh"))
        }
        async fn get_project(&self, origin: &str, name: &str, target: &str) -> Result<Option<Project>> {
            if target == "x86_64-windows" {
                return Ok(None);
            }
            Ok(Some(project(origin, name, target)))
        }
        async fn create_project(&self, template: &PlanTemplate) -> Result<Project> {
            if self.fail_creates {
                return Err(ConsoleError::Api("422 Unprocessable Entity".into()));
            }
            Ok(project(&template.origin, "widgets", "x86_64-linux"))
        }
        async fn update_project(&self, origin: &str, name: &str, _template: &PlanTemplate) -> Result<()> {
            self.record(format!("update:{}/{}", origin, name));
            if self.fail_updates {
                return Err(ConsoleError::Api("500 Internal Server Error".into()));
            }
            Ok(())
        }
        async fn delete_project(&self, _origin: &str, _name: &str, _target: &str) -> Result<()> {
            Err(ConsoleError::Api("403 Forbidden".into()))
        }
        async fn get_project_integration(
            &self,
            _origin: &str,
            _name: &str,
            _integration: &str,
        ) -> Result<Option<BTreeMap<String, String>>> {
            Ok(None)
        }
        async fn set_project_integration(
            &self,
            _origin: &str,
            _name: &str,
            _integration: &str,
            _settings: &BTreeMap<String, String>,
        ) -> Result<()> {
            Ok(())
        }
        async fn delete_project_integration(&self, _origin: &str, _name: &str, _integration: &str) -> Result<()> {
            Ok(())
        }
        async fn set_project_visibility(
            &self,
            _origin: &str,
            _name: &str,
            _visibility: PackageVisibility,
        ) -> Result<()> {
            Ok(())
        }
        async fn list_origin_members(&self, _origin: &str) -> Result<Vec<String>> {
            Ok(vec!["alice".into(), "bob".into()])
        }
        async fn delete_origin_member(&self, _origin: &str, _member: &str) -> Result<()> {
            Ok(())
        }
        async fn invite_origin_member(&self, _origin: &str, _account: &str) -> Result<()> {
            Ok(())
        }
    }

    fn effects(fake: FakeBuilder) -> (ApiEffects, mpsc::UnboundedReceiver<Action>, Arc<FakeBuilder>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let fake = Arc::new(fake);
        let api: Arc<dyn BuilderApi> = fake.clone();
        (ApiEffects::new(api, tx), rx, fake)
    }

    fn template() -> PlanTemplate {
        PlanTemplate {
            origin: "core".into(),
            plan_path: "habitat/plan.sh".into(),
            installation_id: 1,
            repo_id: 2,
            auto_build: true,
            target: Some("x86_64-linux".into()),
        }
    }

    #[tokio::test]
    async fn installations_fetch_reports_loaded() {
        let (effects, mut rx, _) = effects(FakeBuilder::default());
        effects.handle(&Action::FetchGitHubInstallations {
            username: "bob".into(),
        });

        match rx.recv().await {
            Some(Action::GitHubInstallationsLoaded(installs)) => {
                assert_eq!(installs[0].account.login, "acme");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn repositories_fetch_uses_installation_id() {
        let (effects, mut rx, fake) = effects(FakeBuilder::default());
        effects.handle(&Action::FetchGitHubRepositories(42));

        assert!(matches!(
            rx.recv().await,
            Some(Action::GitHubRepositoriesLoaded(_))
        ));
        assert_eq!(*fake.calls.lock().unwrap(), vec!["repos:42".to_string()]);
    }

    #[tokio::test]
    async fn list_projects_skips_missing_targets() {
        let (effects, mut rx, _) = effects(FakeBuilder::default());
        effects.handle(&Action::FetchProjects {
            origin: "core".into(),
            name: "widgets".into(),
        });

        match rx.recv().await {
            Some(Action::ProjectsLoaded(projects)) => {
                let targets: Vec<_> = projects.iter().map(|p| p.target.as_str()).collect();
                assert_eq!(targets, vec!["x86_64-linux", "x86_64-linux-kernel2"]);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn add_project_reports_created_package() {
        let (effects, mut rx, _) = effects(FakeBuilder::default());
        effects.handle(&Action::AddProject(template()));

        match rx.recv().await {
            Some(Action::ProjectSaved(outcome)) => {
                assert!(outcome.success);
                assert_eq!(outcome.origin, "core");
                assert_eq!(outcome.package_name, "widgets");
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_update_reports_unsuccessful_save() {
        let (effects, mut rx, _) = effects(FakeBuilder {
            fail_updates: true,
            ..FakeBuilder::default()
        });
        effects.handle(&Action::UpdateProject {
            origin: "core".into(),
            name: "widgets".into(),
            template: template(),
        });

        match rx.recv().await {
            Some(Action::ProjectSaved(outcome)) => {
                assert!(!outcome.success);
                assert_eq!(
                    outcome.failure_message().as_deref(),
                    Some("Failed to save core/widgets: API error: 500 Internal Server Error")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn failed_create_carries_the_api_error() {
        let (effects, mut rx, _) = effects(FakeBuilder {
            fail_creates: true,
            ..FakeBuilder::default()
        });
        effects.handle(&Action::AddProject(template()));

        match rx.recv().await {
            Some(Action::ProjectSaved(outcome)) => {
                assert!(!outcome.success);
                assert_eq!(
                    outcome.failure_message().as_deref(),
                    Some("Failed to save core: API error: 422 Unprocessable Entity")
                );
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn api_errors_become_error_actions() {
        let (effects, mut rx, _) = effects(FakeBuilder::default());
        effects.handle(&Action::DeleteProject {
            origin: "core".into(),
            name: "widgets".into(),
            target: "x86_64-linux".into(),
        });

        match rx.recv().await {
            Some(Action::Error(msg)) => assert!(msg.contains("403")),
            other => panic!("unexpected {:?}", other),
        }
    }

    #[tokio::test]
    async fn plan_file_lookup_reports_path() {
        let (effects, mut rx, _) = effects(FakeBuilder::default());
        effects.handle(&Action::FindFileInRepo {
            installation_id: 1,
            repo_id: 2,
            path: "habitat/plan.sh".into(),
        });

        match rx.recv().await {
            Some(Action::FileLookedUp { path, exists }) => {
                assert_eq!(path, "habitat/plan.sh");
                assert!(exists);
            }
            other => panic!("unexpected {:?}", other),
        }
    }
}
