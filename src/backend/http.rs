//! REST client for the Tapestry server.

use reqwest::{Client, Method, RequestBuilder, Response, StatusCode};
use serde::de::DeserializeOwned;

use super::{ProjectBackend, ProjectRecord, SavePayload, WeaveRequest, WeaveResponse};
use crate::error::{Result, TapestryError};
use crate::model::{Project, ProjectSummary};

/// Talks to `/projects` and `/weave` under a base URL.
#[derive(Clone, Debug)]
pub struct HttpBackend {
	client: Client,
	base_url: String,
	bearer_token: Option<String>,
}

impl HttpBackend {
	/// Client for `base_url`; a trailing slash is ignored.
	pub fn new(base_url: impl Into<String>) -> Self {
		Self {
			client: Client::new(),
			base_url: base_url.into().trim_end_matches('/').to_string(),
			bearer_token: None,
		}
	}

	/// Attach a bearer token; empty tokens are ignored.
	pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
		self.bearer_token = token.filter(|t| !t.is_empty());
		self
	}

	/// Absolute URL of an API path.
	pub fn url(&self, path: &str) -> String {
		format!("{}/{}", self.base_url, path.trim_start_matches('/'))
	}

	fn request(&self, method: Method, path: &str) -> RequestBuilder {
		let builder = self.client.request(method, self.url(path));
		match &self.bearer_token {
			Some(token) => builder.bearer_auth(token),
			None => builder,
		}
	}

	/// Sends the request and maps non-2xx answers to errors. A 404 on a
	/// project route becomes [`TapestryError::ProjectNotFound`].
	async fn send(&self, builder: RequestBuilder, project: Option<&str>) -> Result<Response> {
		let response = builder.send().await?;
		let status = response.status();
		if status.is_success() {
			return Ok(response);
		}
		match (status, project) {
			(StatusCode::NOT_FOUND, Some(id)) => Err(TapestryError::ProjectNotFound(id.to_string())),
			_ => Err(TapestryError::Status {
				status: status.as_u16(),
				url: response.url().to_string(),
			}),
		}
	}

	async fn read_json<T: DeserializeOwned>(response: Response) -> Result<T> {
		let body = response.text().await?;
		Ok(serde_json::from_str(&body)?)
	}
}

impl ProjectBackend for HttpBackend {
	async fn list_projects(&self) -> Result<Vec<ProjectSummary>> {
		let response = self.send(self.request(Method::GET, "projects"), None).await?;
		Self::read_json(response).await
	}

	async fn create_project(&self, name: &str) -> Result<ProjectSummary> {
		let body = serde_json::json!({ "name": name, "data": {} });
		let response = self
			.send(self.request(Method::POST, "projects").json(&body), None)
			.await?;
		Self::read_json(response).await
	}

	async fn load_project(&self, id: &str) -> Result<Project> {
		let path = format!("projects/{id}");
		let response = self.send(self.request(Method::GET, &path), Some(id)).await?;
		let record: ProjectRecord = Self::read_json(response).await?;
		Ok(record.into_project())
	}

	async fn save_project(&self, payload: &SavePayload) -> Result<()> {
		let path = format!("projects/{}", payload.id);
		let body = serde_json::json!({ "name": payload.name, "data": payload.data });
		self.send(self.request(Method::PUT, &path).json(&body), Some(&payload.id))
			.await?;
		Ok(())
	}

	async fn delete_project(&self, id: &str) -> Result<()> {
		let path = format!("projects/{id}");
		self.send(self.request(Method::DELETE, &path), Some(id)).await?;
		Ok(())
	}

	async fn weave(&self, request: &WeaveRequest) -> Result<WeaveResponse> {
		let response = self
			.send(self.request(Method::POST, "weave").json(request), None)
			.await?;
		Self::read_json(response).await
	}
}
