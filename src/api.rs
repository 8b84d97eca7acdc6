use std::collections::BTreeMap;

use async_trait::async_trait;
use reqwest::{Client, RequestBuilder, Response, StatusCode};
use serde::Deserialize;
use tracing::debug;

use crate::error::{ConsoleError, Result};
use crate::types::{
    Installation, Origin, PackageVisibility, PlanTemplate, Profile, Project, Repository, TARGETS,
};

/// REST surface the console needs from Builder (and GitHub, for the app
/// installations list).
#[async_trait]
pub trait BuilderApi: Send + Sync + std::fmt::Debug {
    async fn current_profile(&self) -> Result<Profile>;
    async fn get_origin(&self, origin: &str) -> Result<Origin>;

    async fn list_installations(&self) -> Result<Vec<Installation>>;
    async fn list_installation_repositories(&self, installation_id: u64) -> Result<Vec<Repository>>;
    async fn find_file_in_repo(&self, installation_id: u64, repo_id: u64, path: &str) -> Result<bool>;

    async fn get_project(&self, origin: &str, name: &str, target: &str) -> Result<Option<Project>>;
    async fn create_project(&self, template: &PlanTemplate) -> Result<Project>;
    async fn update_project(&self, origin: &str, name: &str, template: &PlanTemplate) -> Result<()>;
    async fn delete_project(&self, origin: &str, name: &str, target: &str) -> Result<()>;
    async fn get_project_integration(
        &self,
        origin: &str,
        name: &str,
        integration: &str,
    ) -> Result<Option<BTreeMap<String, String>>>;
    async fn set_project_integration(
        &self,
        origin: &str,
        name: &str,
        integration: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<()>;
    async fn delete_project_integration(&self, origin: &str, name: &str, integration: &str) -> Result<()>;
    async fn set_project_visibility(
        &self,
        origin: &str,
        name: &str,
        visibility: PackageVisibility,
    ) -> Result<()>;

    async fn list_origin_members(&self, origin: &str) -> Result<Vec<String>>;
    async fn delete_origin_member(&self, origin: &str, member: &str) -> Result<()>;
    async fn invite_origin_member(&self, origin: &str, account: &str) -> Result<()>;

    /// Every known target that has a project for `origin/name`
    async fn list_projects(&self, origin: &str, name: &str) -> Result<Vec<Project>> {
        let mut projects = Vec::new();
        for target in TARGETS {
            if let Some(project) = self.get_project(origin, name, target.id).await? {
                projects.push(project);
            }
        }
        Ok(projects)
    }
}

pub struct BuilderClient {
    http: Client,
    base_url: String,
    token: String,
    github_url: String,
    github_token: Option<String>,
}

impl std::fmt::Debug for BuilderClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BuilderClient")
            .field("base_url", &self.base_url)
            .finish_non_exhaustive()
    }
}

#[derive(Deserialize)]
struct InstallationsPage {
    installations: Vec<Installation>,
}

#[derive(Deserialize)]
struct RepositoriesPage {
    repositories: Vec<Repository>,
}

#[derive(Deserialize)]
struct MembersPage {
    members: Vec<String>,
}

fn seg(s: &str) -> String {
    urlencoding::encode(s).into_owned()
}

impl BuilderClient {
    pub fn new(base_url: String, token: String, github_url: String, github_token: Option<String>) -> Result<Self> {
        let http = Client::builder()
            .user_agent(concat!("bldr-console/", env!("CARGO_PKG_VERSION")))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.trim_end_matches('/').to_string(),
            token,
            github_url: github_url.trim_end_matches('/').to_string(),
            github_token,
        })
    }

    fn builder(&self, method: reqwest::Method, path: &str) -> RequestBuilder {
        let url = format!("{}{}", self.base_url, path);
        debug!(%method, %url, "builder request");
        self.http.request(method, url).bearer_auth(&self.token)
    }

    fn github(&self, path: &str) -> Result<RequestBuilder> {
        let token = self
            .github_token
            .as_deref()
            .ok_or_else(|| ConsoleError::Auth("no GitHub token configured".into()))?;
        let url = format!("{}{}", self.github_url, path);
        debug!(%url, "github request");
        Ok(self
            .http
            .get(url)
            .bearer_auth(token)
            .header("Accept", "application/vnd.github.machine-man-preview+json"))
    }

    /// Send and turn non-success statuses into `ConsoleError::Api`.
    async fn send(req: RequestBuilder) -> Result<Response> {
        let resp = req.send().await?;
        let status = resp.status();
        if status.is_success() {
            return Ok(resp);
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ConsoleError::Api(format!("{}: {}", status, body.trim())))
    }

    /// Like `send`, but a 404 is `None`.
    async fn send_optional(req: RequestBuilder) -> Result<Option<Response>> {
        let resp = req.send().await?;
        if resp.status() == StatusCode::NOT_FOUND {
            return Ok(None);
        }
        let status = resp.status();
        if status.is_success() {
            return Ok(Some(resp));
        }
        let body = resp.text().await.unwrap_or_default();
        Err(ConsoleError::Api(format!("{}: {}", status, body.trim())))
    }

    fn project_path(origin: &str, name: &str) -> String {
        format!("/projects/{}/{}", seg(origin), seg(name))
    }

    fn integration_path(origin: &str, name: &str, integration: &str) -> String {
        format!(
            "{}/integrations/{}/default",
            Self::project_path(origin, name),
            seg(integration)
        )
    }
}

#[async_trait]
impl BuilderApi for BuilderClient {
    async fn current_profile(&self) -> Result<Profile> {
        let resp = Self::send(self.builder(reqwest::Method::GET, "/profile")).await?;
        Ok(resp.json().await?)
    }

    async fn get_origin(&self, origin: &str) -> Result<Origin> {
        let path = format!("/depot/origins/{}", seg(origin));
        let resp = Self::send(self.builder(reqwest::Method::GET, &path)).await?;
        Ok(resp.json().await?)
    }

    async fn list_installations(&self) -> Result<Vec<Installation>> {
        let resp = Self::send(self.github("/user/installations")?).await?;
        let page: InstallationsPage = resp.json().await?;
        Ok(page.installations)
    }

    async fn list_installation_repositories(&self, installation_id: u64) -> Result<Vec<Repository>> {
        let path = format!("/user/installations/{}/repositories?per_page=100", installation_id);
        let resp = Self::send(self.github(&path)?).await?;
        let page: RepositoriesPage = resp.json().await?;
        Ok(page.repositories)
    }

    async fn find_file_in_repo(&self, installation_id: u64, repo_id: u64, path: &str) -> Result<bool> {
        let url = format!(
            "/ext/installations/{}/repos/{}/contents/{}",
            installation_id,
            repo_id,
            seg(path)
        );
        let resp = Self::send_optional(self.builder(reqwest::Method::GET, &url)).await?;
        Ok(resp.is_some())
    }

    async fn get_project(&self, origin: &str, name: &str, target: &str) -> Result<Option<Project>> {
        let req = self
            .builder(reqwest::Method::GET, &Self::project_path(origin, name))
            .query(&[("target", target)]);
        match Self::send_optional(req).await? {
            Some(resp) => Ok(Some(resp.json().await?)),
            None => Ok(None),
        }
    }

    async fn create_project(&self, template: &PlanTemplate) -> Result<Project> {
        let req = self.builder(reqwest::Method::POST, "/projects").json(template);
        let resp = Self::send(req).await?;
        Ok(resp.json().await?)
    }

    async fn update_project(&self, origin: &str, name: &str, template: &PlanTemplate) -> Result<()> {
        let req = self
            .builder(reqwest::Method::PUT, &Self::project_path(origin, name))
            .json(template);
        Self::send(req).await?;
        Ok(())
    }

    async fn delete_project(&self, origin: &str, name: &str, target: &str) -> Result<()> {
        let req = self
            .builder(reqwest::Method::DELETE, &Self::project_path(origin, name))
            .query(&[("target", target)]);
        Self::send(req).await?;
        Ok(())
    }

    async fn get_project_integration(
        &self,
        origin: &str,
        name: &str,
        integration: &str,
    ) -> Result<Option<BTreeMap<String, String>>> {
        let path = Self::integration_path(origin, name, integration);
        match Self::send_optional(self.builder(reqwest::Method::GET, &path)).await? {
            Some(resp) => Ok(Some(resp.json().await?)),
            None => Ok(None),
        }
    }

    async fn set_project_integration(
        &self,
        origin: &str,
        name: &str,
        integration: &str,
        settings: &BTreeMap<String, String>,
    ) -> Result<()> {
        let path = Self::integration_path(origin, name, integration);
        Self::send(self.builder(reqwest::Method::PUT, &path).json(settings)).await?;
        Ok(())
    }

    async fn delete_project_integration(&self, origin: &str, name: &str, integration: &str) -> Result<()> {
        let path = Self::integration_path(origin, name, integration);
        Self::send(self.builder(reqwest::Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn set_project_visibility(
        &self,
        origin: &str,
        name: &str,
        visibility: PackageVisibility,
    ) -> Result<()> {
        let path = format!(
            "{}/{}",
            Self::project_path(origin, name),
            visibility.as_api_str()
        );
        Self::send(self.builder(reqwest::Method::PATCH, &path)).await?;
        Ok(())
    }

    async fn list_origin_members(&self, origin: &str) -> Result<Vec<String>> {
        let path = format!("/depot/origins/{}/users", seg(origin));
        let resp = Self::send(self.builder(reqwest::Method::GET, &path)).await?;
        let page: MembersPage = resp.json().await?;
        Ok(page.members)
    }

    async fn delete_origin_member(&self, origin: &str, member: &str) -> Result<()> {
        let path = format!("/depot/origins/{}/users/{}", seg(origin), seg(member));
        Self::send(self.builder(reqwest::Method::DELETE, &path)).await?;
        Ok(())
    }

    async fn invite_origin_member(&self, origin: &str, account: &str) -> Result<()> {
        let path = format!(
            "/depot/origins/{}/users/{}/invitations",
            seg(origin),
            seg(account)
        );
        Self::send(self.builder(reqwest::Method::POST, &path)).await?;
        Ok(())
    }
}
