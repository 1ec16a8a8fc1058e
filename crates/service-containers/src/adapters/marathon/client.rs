//! Marathon REST client.

use super::model::{App, AppResponse, AppsResponse, ScaleRequest};
use crate::{Credentials, Error, MarathonSettings, Result};
use async_trait::async_trait;
use futures::lock::Mutex;
use reqwest::header::AUTHORIZATION;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use std::future::Future;
use tracing::{debug, info};

/// The subset of the Marathon v2 API the adapter needs
#[async_trait]
pub trait MarathonApi: Send + Sync + 'static {
    /// `GET /v2/apps?label=<selector>` with tasks embedded
    async fn list_apps(&self, label_selector: &str) -> Result<Vec<App>>;

    /// `POST /v2/apps`
    async fn create_app(&self, app: &App) -> Result<App>;

    /// `GET /v2/apps/<id>` with tasks embedded
    async fn get_app(&self, app_id: &str) -> Result<App>;

    /// `PUT /v2/apps/<id>?force=true` with `{"instances": n}`
    async fn scale_app(&self, app_id: &str, instances: u32) -> Result<()>;

    /// `DELETE /v2/apps/<id>`
    async fn delete_app(&self, app_id: &str) -> Result<()>;

    /// `DELETE /v2/apps/<id>/tasks/<task>`, optionally lowering the
    /// desired instance count by one
    async fn delete_task(&self, app_id: &str, task_id: &str, scale: bool) -> Result<()>;
}

/// [`MarathonApi`] over HTTP.
///
/// reqwest is built on hyper and only runs inside a Tokio runtime. When the
/// caller is not on one, requests are driven by a small background runtime
/// owned by the client, so the adapter works under any executor.
pub struct HttpMarathonClient {
    base_url: String,
    http: reqwest::Client,
    credentials: Option<Credentials>,
    token: Mutex<Option<String>>,
    runtime: BackgroundRuntime,
}

/// Tokio runtime that is shut down without blocking when dropped
struct BackgroundRuntime(Option<tokio::runtime::Runtime>);

impl BackgroundRuntime {
    fn new() -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_multi_thread()
            .worker_threads(1)
            .thread_name("marathon-http")
            .enable_all()
            .build()?;
        Ok(Self(Some(runtime)))
    }

    /// Run `future` on Tokio: in place when already on a Tokio runtime,
    /// otherwise on the background runtime
    async fn run<T, F>(&self, future: F) -> Result<T>
    where
        F: Future<Output = Result<T>> + Send + 'static,
        T: Send + 'static,
    {
        match &self.0 {
            Some(runtime) if tokio::runtime::Handle::try_current().is_err() => runtime
                .spawn(future)
                .await
                .map_err(std::io::Error::from)?,
            _ => future.await,
        }
    }
}

impl Drop for BackgroundRuntime {
    fn drop(&mut self) {
        if let Some(runtime) = self.0.take() {
            runtime.shutdown_background();
        }
    }
}

#[derive(Serialize)]
struct LoginRequest<'a> {
    uid: &'a str,
    #[serde(skip_serializing_if = "Option::is_none")]
    password: Option<&'a str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    token: Option<&'a str>,
}

#[derive(Deserialize)]
struct LoginResponse {
    token: String,
}

impl HttpMarathonClient {
    /// Create a client from settings
    pub fn new(settings: &MarathonSettings) -> Result<Self> {
        let http = reqwest::Client::builder()
            .timeout(settings.request_timeout())
            .build()?;

        Ok(Self {
            base_url: settings.url.trim_end_matches('/').to_string(),
            http,
            credentials: settings.credentials.clone(),
            token: Mutex::new(None),
            runtime: BackgroundRuntime::new()?,
        })
    }

    /// Base URL requests are sent to
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn apps_url(&self) -> String {
        format!("{}/v2/apps", self.base_url)
    }

    fn app_url(&self, app_id: &str) -> String {
        format!("{}/v2/apps/{}", self.base_url, app_id.trim_start_matches('/'))
    }

    /// DC/OS token, logging in on first use
    async fn auth_token(&self) -> Result<Option<String>> {
        let Some(credentials) = &self.credentials else {
            return Ok(None);
        };

        let mut token = self.token.lock().await;
        if let Some(token) = token.as_ref() {
            return Ok(Some(token.clone()));
        }

        let body = if credentials.service_account {
            LoginRequest {
                uid: &credentials.uid,
                password: None,
                token: Some(&credentials.secret),
            }
        } else {
            LoginRequest {
                uid: &credentials.uid,
                password: Some(&credentials.secret),
                token: None,
            }
        };

        let url = format!("{}/acs/api/v1/auth/login", self.base_url);
        let login: LoginResponse = self
            .runtime
            .run(fetch_json(self.http.post(&url).json(&body)))
            .await?;
        info!("Logged in to DC/OS as '{}'", credentials.uid);

        *token = Some(login.token.clone());
        Ok(Some(login.token))
    }

    async fn authorize(&self, request: RequestBuilder) -> Result<RequestBuilder> {
        Ok(match self.auth_token().await? {
            Some(token) => request.header(AUTHORIZATION, format!("token={token}")),
            None => request,
        })
    }

    /// Send `request` and decode the JSON body
    async fn send_json<T>(&self, request: RequestBuilder) -> Result<T>
    where
        T: DeserializeOwned + Send + 'static,
    {
        let request = self.authorize(request).await?;
        self.runtime.run(fetch_json(request)).await
    }

    /// Send `request`, ignoring the body of a successful response
    async fn send(&self, request: RequestBuilder) -> Result<()> {
        let request = self.authorize(request).await?;
        self.runtime
            .run(async move {
                check(request.send().await?).await?;
                Ok(())
            })
            .await
    }
}

async fn fetch_json<T: DeserializeOwned>(request: RequestBuilder) -> Result<T> {
    Ok(check(request.send().await?).await?.json().await?)
}

/// Turn a non-success status into [`Error::Scheduler`]
async fn check(response: Response) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    let body = response.text().await.unwrap_or_default();
    Err(Error::Scheduler {
        status: status.as_u16(),
        body,
    })
}

#[async_trait]
impl MarathonApi for HttpMarathonClient {
    async fn list_apps(&self, label_selector: &str) -> Result<Vec<App>> {
        debug!("Listing apps with label {}", label_selector);
        let request = self
            .http
            .get(self.apps_url())
            .query(&[("label", label_selector), ("embed", "apps.tasks")]);

        let response: AppsResponse = self.send_json(request).await?;
        Ok(response.apps)
    }

    async fn create_app(&self, app: &App) -> Result<App> {
        debug!("Creating app {}", app.id);
        let request = self.http.post(self.apps_url()).json(app);
        self.send_json(request).await
    }

    async fn get_app(&self, app_id: &str) -> Result<App> {
        let request = self
            .http
            .get(self.app_url(app_id))
            .query(&[("embed", "app.tasks")]);

        let response: AppResponse = self.send_json(request).await?;
        Ok(response.app)
    }

    async fn scale_app(&self, app_id: &str, instances: u32) -> Result<()> {
        debug!("Scaling app {} to {}", app_id, instances);
        let request = self
            .http
            .put(self.app_url(app_id))
            .query(&[("force", "true")])
            .json(&ScaleRequest { instances });

        self.send(request).await
    }

    async fn delete_app(&self, app_id: &str) -> Result<()> {
        debug!("Deleting app {}", app_id);
        self.send(self.http.delete(self.app_url(app_id))).await
    }

    async fn delete_task(&self, app_id: &str, task_id: &str, scale: bool) -> Result<()> {
        debug!("Deleting task {} of app {} (scale={})", task_id, app_id, scale);
        let url = format!("{}/tasks/{}", self.app_url(app_id), task_id);
        let request = self
            .http
            .delete(url)
            .query(&[("scale", if scale { "true" } else { "false" })]);

        self.send(request).await
    }
}
