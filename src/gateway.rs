use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::Method;
use serde::de::DeserializeOwned;

use crate::config::ClientConfig;
use crate::error::{ApiError, ErrorCode, Operation};
use crate::formats::{
    AuthResponse, BulkAnalyzeAck, BulkAnalyzeRequest, CreateProjectRequest, FindPagesResponse,
    LoginRequest, PageRoute, Project, ProjectsPage, ProjectsPayload, RefreshRequest,
    RefreshResponse, RegisterRequest, User,
};
use crate::session::{Session, SessionContext};

/// The calls the page-analysis workflow needs from the backend.
#[async_trait]
pub trait PageGateway: Send + Sync {
    async fn available_routes(&self, project_id: u64) -> Result<Vec<PageRoute>, ApiError>;
    async fn find_pages(&self, project_id: u64) -> Result<FindPagesResponse, ApiError>;
    async fn bulk_analyze(
        &self,
        project_id: u64,
        ids: &[u64],
    ) -> Result<BulkAnalyzeAck, ApiError>;
}

#[derive(Debug, Clone)]
pub struct GatewayClient {
    client: reqwest::Client,
    config: ClientConfig,
    session: Arc<SessionContext>,
}

struct Call {
    op: Operation,
    method: Method,
    path: String,
    body: Option<serde_json::Value>,
    timeout: Duration,
}

impl GatewayClient {
    pub fn new(config: ClientConfig, session: Arc<SessionContext>) -> anyhow::Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout)
            .build()
            .map_err(|err| anyhow::anyhow!("build gateway http client: {err}"))?;
        Ok(Self {
            client,
            config,
            session,
        })
    }

    pub fn config(&self) -> &ClientConfig {
        &self.config
    }

    pub fn session(&self) -> &Arc<SessionContext> {
        &self.session
    }

    pub async fn register(&self, mut request: RegisterRequest) -> Result<AuthResponse, ApiError> {
        if request.plan == 0 {
            request.plan = 1;
        }
        let call = self.call(Operation::Register, Method::POST, "auth/register/", Some(&request))?;
        let body = self.send_public(&call).await?;
        let auth: AuthResponse = decode(call.op, &body)?;
        self.start_session(&auth).await?;
        Ok(auth)
    }

    pub async fn login(&self, email: &str, password: &str) -> Result<AuthResponse, ApiError> {
        let request = LoginRequest {
            email: email.to_owned(),
            password: password.to_owned(),
        };
        let call = self.call(Operation::Login, Method::POST, "auth/login/", Some(&request))?;
        let body = self.send_public(&call).await?;
        let auth: AuthResponse = decode(call.op, &body)?;
        self.start_session(&auth).await?;
        Ok(auth)
    }

    pub async fn logout(&self) -> anyhow::Result<()> {
        self.session.end().await
    }

    pub async fn current_user(&self) -> Result<User, ApiError> {
        let call = self.call::<()>(Operation::CurrentUser, Method::GET, "auth/user/", None)?;
        let body = self.send_authed(&call).await?;
        let user: User = decode(call.op, &body)?;
        if let Err(err) = self.session.set_user(user.clone()).await {
            tracing::warn!(?err, "failed to store current user in session");
        }
        Ok(user)
    }

    pub async fn list_projects(&self) -> Result<ProjectsPage, ApiError> {
        let call = self.call::<()>(Operation::ListProjects, Method::GET, "projects/", None)?;
        let body = self.send_authed(&call).await?;
        let payload: ProjectsPayload = decode(call.op, &body)?;
        Ok(payload.into())
    }

    /// There is no single-project endpoint; the project is looked up in the list.
    pub async fn get_project(&self, project_id: u64) -> Result<Project, ApiError> {
        self.list_projects()
            .await?
            .results
            .into_iter()
            .find(|p| p.id == project_id)
            .ok_or_else(|| ApiError::new(ErrorCode::NotFound, "Project not found"))
    }

    pub async fn create_project(
        &self,
        request: &CreateProjectRequest,
    ) -> Result<Project, ApiError> {
        let call = self.call(Operation::CreateProject, Method::POST, "projects/", Some(request))?;
        let body = self.send_authed(&call).await?;
        decode(call.op, &body)
    }

    async fn refresh_access(&self) -> Result<String, ApiError> {
        let Some(refresh) = self.session.refresh_token() else {
            return Err(ApiError::new(ErrorCode::Unauthorized, "No refresh token"));
        };
        let call = self.call(
            Operation::RefreshToken,
            Method::POST,
            "auth/token/refresh/",
            Some(&RefreshRequest { refresh }),
        )?;
        let body = self.send_public(&call).await?;
        let fresh: RefreshResponse = decode(call.op, &body)?;
        self.session
            .replace_access(fresh.access.clone())
            .await
            .map_err(|err| ApiError::new(ErrorCode::UnknownError, format!("{err:#}")))?;
        Ok(fresh.access)
    }

    async fn start_session(&self, auth: &AuthResponse) -> Result<(), ApiError> {
        self.session
            .begin(Session::from(auth.clone()))
            .await
            .map_err(|err| {
                ApiError::new(
                    ErrorCode::UnknownError,
                    format!("could not save session: {err:#}"),
                )
            })
    }

    fn call<T: serde::Serialize>(
        &self,
        op: Operation,
        method: Method,
        path: &str,
        body: Option<&T>,
    ) -> Result<Call, ApiError> {
        let body = body
            .map(serde_json::to_value)
            .transpose()
            .map_err(|err| ApiError::new(ErrorCode::UnknownError, format!("encode request: {err}")))?;
        let timeout = match op {
            Operation::FindPages => self.config.discovery_timeout,
            _ => self.config.request_timeout,
        };
        Ok(Call {
            op,
            method,
            path: path.to_owned(),
            body,
            timeout,
        })
    }

    async fn send_public(&self, call: &Call) -> Result<String, ApiError> {
        let (status, body) = self.send(call, None).await?;
        ensure_success(call.op, status, body)
    }

    async fn send_authed(&self, call: &Call) -> Result<String, ApiError> {
        let Some(token) = self.session.access_token() else {
            return Err(ApiError::not_signed_in());
        };
        let (status, body) = self.send(call, Some(&token)).await?;
        if status != 401 {
            return ensure_success(call.op, status, body);
        }

        tracing::info!(op = call.op.name(), "access token rejected, refreshing");
        match self.refresh_access().await {
            Ok(fresh) => {
                let (status, body) = self.send(call, Some(&fresh)).await?;
                ensure_success(call.op, status, body)
            }
            Err(err) => {
                tracing::warn!(op = call.op.name(), %err, "token refresh failed, ending session");
                if let Err(err) = self.session.end().await {
                    tracing::warn!(?err, "failed to clear session");
                }
                Err(call.op.error_for_status(status, &body))
            }
        }
    }

    async fn send(&self, call: &Call, token: Option<&str>) -> Result<(u16, String), ApiError> {
        let url = self.config.endpoint(&call.path).map_err(|err| {
            ApiError::new(ErrorCode::UnknownError, format!("{err:#}"))
        })?;
        tracing::debug!(op = call.op.name(), method = %call.method, %url, "sending request");

        let mut request = self
            .client
            .request(call.method.clone(), url)
            .timeout(call.timeout);
        if let Some(token) = token {
            request = request.bearer_auth(token);
        }
        if let Some(body) = &call.body {
            request = request.json(body);
        }

        let response = request
            .send()
            .await
            .map_err(|err| transport_error(call.op, &err))?;
        let status = response.status().as_u16();
        let body = response
            .text()
            .await
            .map_err(|err| transport_error(call.op, &err))?;
        tracing::debug!(op = call.op.name(), status, "received response");
        Ok((status, body))
    }
}

#[async_trait]
impl PageGateway for GatewayClient {
    async fn available_routes(&self, project_id: u64) -> Result<Vec<PageRoute>, ApiError> {
        let path = format!("projects/{project_id}/available-routes/");
        let call = self.call::<()>(Operation::AvailableRoutes, Method::GET, &path, None)?;
        let body = self.send_authed(&call).await?;
        decode::<Option<Vec<PageRoute>>>(call.op, &body).map(Option::unwrap_or_default)
    }

    async fn find_pages(&self, project_id: u64) -> Result<FindPagesResponse, ApiError> {
        let path = format!("projects/{project_id}/find-url/");
        let call = self.call::<()>(Operation::FindPages, Method::GET, &path, None)?;
        let body = self.send_authed(&call).await?;
        decode(call.op, &body)
    }

    async fn bulk_analyze(
        &self,
        project_id: u64,
        ids: &[u64],
    ) -> Result<BulkAnalyzeAck, ApiError> {
        let path = format!("projects/{project_id}/pages/bulk-action/");
        let request = BulkAnalyzeRequest {
            page_analysis_ids: ids.to_vec(),
        };
        let call = self.call(Operation::BulkAnalyze, Method::POST, &path, Some(&request))?;
        let body = self.send_authed(&call).await?;
        Ok(BulkAnalyzeAck::from_body(ids, &body))
    }
}

fn ensure_success(op: Operation, status: u16, body: String) -> Result<String, ApiError> {
    if (200..300).contains(&status) {
        Ok(body)
    } else {
        Err(op.error_for_status(status, &body))
    }
}

fn decode<T: DeserializeOwned>(op: Operation, body: &str) -> Result<T, ApiError> {
    serde_json::from_str(body).map_err(|err| {
        tracing::debug!(op = op.name(), %err, "unexpected response body");
        op.error_for_status(0, body)
    })
}

fn transport_error(op: Operation, err: &reqwest::Error) -> ApiError {
    tracing::debug!(op = op.name(), %err, "transport error");
    if err.is_builder() {
        return op.error_for_status(0, "");
    }
    ApiError::network()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn ensure_success_passes_2xx_through() {
        assert_eq!(
            ensure_success(Operation::FindPages, 201, "ok".to_owned()).unwrap(),
            "ok"
        );
        let err = ensure_success(Operation::FindPages, 404, String::new()).unwrap_err();
        assert_eq!(err.code, ErrorCode::NotFound);
    }

    #[test]
    fn undecodable_body_is_unknown_error() {
        let err = decode::<FindPagesResponse>(Operation::FindPages, "<html>").unwrap_err();
        assert_eq!(err.code, ErrorCode::UnknownError);
        assert_eq!(err.message, "Failed to find pages");
    }

    #[tokio::test]
    async fn authed_call_without_session_is_local_unauthorized() {
        let client =
            GatewayClient::new(ClientConfig::default(), Arc::new(SessionContext::new())).unwrap();
        let err = client.list_projects().await.unwrap_err();
        assert_eq!(err.code, ErrorCode::Unauthorized);
        assert_eq!(err.message, "You are not signed in");
    }

    #[tokio::test]
    async fn find_pages_uses_discovery_timeout() {
        let mut config = ClientConfig::default();
        config.discovery_timeout = Duration::from_secs(90);
        let client = GatewayClient::new(config, Arc::new(SessionContext::new())).unwrap();
        let call = client
            .call::<()>(Operation::FindPages, Method::GET, "projects/1/find-url/", None)
            .unwrap();
        assert_eq!(call.timeout, Duration::from_secs(90));
        let call = client
            .call::<()>(Operation::AvailableRoutes, Method::GET, "x/", None)
            .unwrap();
        assert_eq!(call.timeout, Duration::from_secs(10));
    }
}
