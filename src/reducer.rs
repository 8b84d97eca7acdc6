use crate::action::Action;
use crate::store::AppState;
use crate::types::EmptyPackage;

/// Root reducer: takes the previous state by value and returns the next one.
/// Actions that only matter to the UI or the effects layer pass through.
pub fn reduce(mut state: AppState, action: &Action) -> AppState {
    match action {
        // Session
        Action::SessionStarted { token } => {
            state.session.token = Some(token.clone());
        }
        Action::ProfileLoaded(profile) => {
            state.users.current.profile = profile.clone();
        }
        Action::OriginLoaded(origin) => {
            state.origins.current = origin.clone();
        }

        // GitHub
        Action::FetchGitHubInstallations { .. } => {
            state.github.installations.clear();
            state.github.repositories.clear();
            state.github.ui.installations.loading = true;
        }
        Action::GitHubInstallationsLoaded(installations) => {
            state.github.installations = installations.clone();
            state.github.ui.installations.loading = false;
        }
        Action::FetchGitHubRepositories(_) => {
            state.github.repositories.clear();
            state.github.files.clear();
            state.github.ui.repositories.loading = true;
        }
        Action::GitHubRepositoriesLoaded(repositories) => {
            state.github.repositories = repositories.clone();
            state.github.ui.repositories.loading = false;
        }
        Action::FileLookedUp { path, exists } => {
            state.github.files.insert(path.clone(), *exists);
        }

        // Projects
        Action::ProjectsLoaded(projects) => {
            state.projects.list = projects.clone();
        }
        Action::ProjectLoaded(project) => {
            let project = (**project).clone();
            match state
                .projects
                .list
                .iter_mut()
                .find(|p| p.target == project.target)
            {
                Some(existing) => *existing = project.clone(),
                None => state.projects.list.push(project.clone()),
            }
            state.projects.current.visibility = project.visibility;
            state.projects.current.project = Some(project);
        }
        Action::ProjectDeleted { target } => {
            state.projects.list.retain(|p| &p.target != target);
            if state
                .projects
                .current
                .project
                .as_ref()
                .is_some_and(|p| &p.target == target)
            {
                state.projects.current.project = None;
            }
        }
        Action::ProjectIntegrationLoaded {
            integration,
            settings,
        } => {
            state
                .projects
                .current
                .settings
                .insert(integration.clone(), settings.clone());
        }
        Action::ProjectIntegrationDeleted { integration } => {
            state.projects.current.settings.remove(integration);
        }
        Action::ProjectVisibilitySet(visibility) => {
            state.projects.current.visibility = Some(*visibility);
            if let Some(project) = state.projects.current.project.as_mut() {
                project.visibility = Some(*visibility);
            }
        }

        // Packages
        Action::CreateEmptyPackage { origin, name } => {
            state.packages.current = Some(EmptyPackage {
                origin: origin.clone(),
                name: name.clone(),
            });
        }

        // Origin members
        Action::OriginMembersLoaded(members) => {
            state.origins.current_members = members.clone();
        }
        Action::OriginMemberDeleted(member) => {
            state.origins.current_members.retain(|m| m != member);
        }
        Action::OriginMemberInvited(account) => {
            if !state.origins.current_invitations.contains(account) {
                state.origins.current_invitations.push(account.clone());
            }
        }

        _ => {}
    }

    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{Account, Installation, PackageVisibility, Project, Repository};

    fn project(target: &str) -> Project {
        Project {
            origin: "core".into(),
            package_name: "nginx".into(),
            name: "core/nginx".into(),
            plan_path: "habitat/plan.sh".into(),
            target: target.into(),
            vcs_type: "git".into(),
            vcs_data: "https://github.com/acme/nginx.git".into(),
            vcs_installation_id: Some(9),
            auto_build: true,
            visibility: None,
            created_at: None,
            updated_at: None,
        }
    }

    fn repo(name: &str) -> Repository {
        Repository {
            id: 1,
            name: name.into(),
            full_name: format!("acme/{}", name),
            owner: Account {
                id: 2,
                login: "acme".into(),
            },
        }
    }

    #[test]
    fn fetching_repositories_clears_the_previous_list() {
        let state = reduce(
            AppState::default(),
            &Action::GitHubRepositoriesLoaded(vec![repo("widgets")]),
        );
        assert_eq!(state.github.repositories.len(), 1);

        let state = reduce(state, &Action::FetchGitHubRepositories(4));
        assert!(state.github.repositories.is_empty());
        assert!(state.github.ui.repositories.loading);
    }

    #[test]
    fn installations_loaded_stops_loading() {
        let state = reduce(
            AppState::default(),
            &Action::FetchGitHubInstallations {
                username: "bob".into(),
            },
        );
        assert!(state.github.ui.installations.loading);

        let install = Installation {
            id: 1,
            account: Account {
                id: 2,
                login: "acme".into(),
            },
            app_id: None,
        };
        let state = reduce(state, &Action::GitHubInstallationsLoaded(vec![install]));
        assert!(!state.github.ui.installations.loading);
        assert_eq!(state.installations().len(), 1);
    }

    #[test]
    fn project_loaded_replaces_same_target() {
        let state = reduce(
            AppState::default(),
            &Action::ProjectsLoaded(vec![project("x86_64-linux"), project("x86_64-windows")]),
        );
        let mut updated = project("x86_64-linux");
        updated.plan_path = "plans/plan.sh".into();
        updated.visibility = Some(PackageVisibility::Private);

        let state = reduce(state, &Action::ProjectLoaded(Box::new(updated)));
        assert_eq!(state.projects.list.len(), 2);
        assert_eq!(state.projects.list[0].plan_path, "plans/plan.sh");
        assert_eq!(
            state.projects.current.visibility,
            Some(PackageVisibility::Private)
        );
    }

    #[test]
    fn project_deleted_clears_current() {
        let state = reduce(
            AppState::default(),
            &Action::ProjectLoaded(Box::new(project("x86_64-linux"))),
        );
        let state = reduce(
            state,
            &Action::ProjectDeleted {
                target: "x86_64-linux".into(),
            },
        );
        assert!(state.projects.list.is_empty());
        assert!(state.projects.current.project.is_none());
    }

    #[test]
    fn member_invites_are_not_duplicated() {
        let state = reduce(
            AppState::default(),
            &Action::OriginMemberInvited("alice".into()),
        );
        let state = reduce(state, &Action::OriginMemberInvited("alice".into()));
        assert_eq!(state.origins.current_invitations, vec!["alice".to_string()]);
    }
}
