// Re-export the proto module from the shared `api-shared` crate so callers
// can reference `api_grpc::pb`.
pub use api_shared::pb;

use api_shared::auth::{self, bearer_token};
use api_shared::pb::narratives_server::Narratives;
use api_shared::HealthService;
use ezn_core::forms::{EmsForm, FireForm};
use ezn_core::{Services, UserContext};
use std::sync::Arc;
use tonic::metadata::MetadataMap;
use tonic::service::Interceptor;
use tonic::{Request, Response, Status};

/// Rejects calls whose `x-api-key` metadata does not match the configured key.
#[derive(Clone)]
pub struct ApiKeyInterceptor {
    expected: Arc<str>,
}

impl ApiKeyInterceptor {
    pub fn new(expected: impl Into<Arc<str>>) -> Self {
        Self {
            expected: expected.into(),
        }
    }
}

impl Interceptor for ApiKeyInterceptor {
    #[allow(clippy::result_large_err)]
    fn call(&mut self, req: Request<()>) -> Result<Request<()>, Status> {
        let provided = req
            .metadata()
            .get("x-api-key")
            .and_then(|v| v.to_str().ok());
        auth::validate_api_key(provided, &self.expected)?;
        Ok(req)
    }
}

#[derive(Clone)]
pub struct NarrativesService {
    services: Services,
}

impl NarrativesService {
    pub fn new(services: Services) -> Self {
        Self { services }
    }

    /// Resolve the `authorization: Bearer` metadata to the calling user.
    async fn user(&self, metadata: &MetadataMap) -> Result<UserContext, Status> {
        let header = metadata.get("authorization").and_then(|v| v.to_str().ok());
        let token = bearer_token(header)?;
        Ok(self.services.accounts.authenticate(token).await?)
    }
}

fn log_status(context: &str, status: Status) -> Status {
    if matches!(
        status.code(),
        tonic::Code::Internal | tonic::Code::Unavailable
    ) {
        tracing::error!("{context}: {}", status.message());
    }
    status
}

#[tonic::async_trait]
impl Narratives for NarrativesService {
    async fn health(&self, _req: Request<()>) -> Result<Response<pb::HealthRes>, Status> {
        Ok(Response::new(HealthService::check_health()))
    }

    async fn generate_ems_narrative(
        &self,
        req: Request<pb::GenerateEmsNarrativeReq>,
    ) -> Result<Response<pb::GenerateNarrativeRes>, Status> {
        let user = self.user(req.metadata()).await?;
        let req = req.into_inner();
        let form = EmsForm::from(req.form.unwrap_or_default());

        let generated = self
            .services
            .narratives
            .generate_ems(&user, &form, Some(&req.session_id))
            .await
            .map_err(|e| log_status("generate EMS narrative", e.into()))?;
        Ok(Response::new(generated.into()))
    }

    async fn generate_fire_narrative(
        &self,
        req: Request<pb::GenerateFireNarrativeReq>,
    ) -> Result<Response<pb::GenerateNarrativeRes>, Status> {
        let user = self.user(req.metadata()).await?;
        let req = req.into_inner();
        let form = FireForm::from(req.form.unwrap_or_default());

        let generated = self
            .services
            .narratives
            .generate_fire(&user, &form, Some(&req.session_id))
            .await
            .map_err(|e| log_status("generate fire narrative", e.into()))?;
        Ok(Response::new(generated.into()))
    }

    async fn list_narratives(
        &self,
        req: Request<()>,
    ) -> Result<Response<pb::ListNarrativesRes>, Status> {
        let user = self.user(req.metadata()).await?;
        let narratives = self.services.narratives.list(&user).await?;
        Ok(Response::new(pb::ListNarrativesRes {
            narratives: narratives.into_iter().map(Into::into).collect(),
        }))
    }

    async fn get_narrative(
        &self,
        req: Request<pb::NarrativeIdReq>,
    ) -> Result<Response<pb::Narrative>, Status> {
        let user = self.user(req.metadata()).await?;
        let narrative = self.services.narratives.get(&user, &req.get_ref().id).await?;
        Ok(Response::new(narrative.into()))
    }

    async fn delete_narrative(
        &self,
        req: Request<pb::NarrativeIdReq>,
    ) -> Result<Response<pb::SuccessRes>, Status> {
        let user = self.user(req.metadata()).await?;
        self.services
            .narratives
            .delete(&user, &req.get_ref().id)
            .await?;
        Ok(Response::new(pb::SuccessRes { success: true }))
    }

    async fn sync_offline_cache(
        &self,
        req: Request<()>,
    ) -> Result<Response<pb::SyncOfflineCacheRes>, Status> {
        let user = self.user(req.metadata()).await?;
        let report = self
            .services
            .narratives
            .sync_offline(&user)
            .await
            .map_err(|e| log_status("sync offline cache", e.into()))?;
        Ok(Response::new(report.into()))
    }

    async fn list_sessions(&self, req: Request<()>) -> Result<Response<pb::ListSessionsRes>, Status> {
        let user = self.user(req.metadata()).await?;
        let sessions = self.services.sessions.list(&user).await?;
        Ok(Response::new(pb::ListSessionsRes {
            sessions: sessions.into_iter().map(Into::into).collect(),
        }))
    }

    async fn create_session(&self, req: Request<()>) -> Result<Response<pb::Session>, Status> {
        let user = self.user(req.metadata()).await?;
        let session = self.services.sessions.create(&user).await?;
        Ok(Response::new(session.into()))
    }

    async fn rename_session(
        &self,
        req: Request<pb::RenameSessionReq>,
    ) -> Result<Response<pb::SuccessRes>, Status> {
        let user = self.user(req.metadata()).await?;
        let req = req.into_inner();
        let renamed = self
            .services
            .sessions
            .rename(&user, &req.session_id, &req.name)
            .await?;
        Ok(Response::new(pb::SuccessRes { success: renamed }))
    }

    async fn delete_session(
        &self,
        req: Request<pb::DeleteSessionReq>,
    ) -> Result<Response<pb::DeleteSessionRes>, Status> {
        let user = self.user(req.metadata()).await?;
        let req = req.into_inner();
        let outcome = self
            .services
            .sessions
            .delete(&user, &req.session_id, Some(&req.active_session_id))
            .await?;
        Ok(Response::new(outcome.into()))
    }

    async fn send_chat_message(
        &self,
        req: Request<pb::SendChatMessageReq>,
    ) -> Result<Response<pb::ChatMessage>, Status> {
        let user = self.user(req.metadata()).await?;
        let req = req.into_inner();
        let reply = self
            .services
            .chat
            .send(&user, &req.session_id, &req.content, Some(&req.system_message))
            .await
            .map_err(|e| log_status("chat", e.into()))?;
        Ok(Response::new(reply.into()))
    }

    async fn query_protocol(
        &self,
        req: Request<pb::ProtocolQueryReq>,
    ) -> Result<Response<pb::ProtocolQueryRes>, Status> {
        let user = self.user(req.metadata()).await?;
        let req = req.into_inner();
        let answer = self
            .services
            .knowledge
            .query_protocol(&user, &req.question, &req.sources, Some(req.top_k))
            .await?;
        Ok(Response::new(answer.into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ezn_core::memory::{
        InMemoryAuthProvider, InMemoryKnowledgeStore, InMemoryNarrativeStore,
        InMemorySessionStore, ScriptedCompletionClient,
    };
    use ezn_core::offline::OfflineCache;
    use ezn_core::Backends;

    fn service(dir: &std::path::Path) -> NarrativesService {
        let auth = Arc::new(InMemoryAuthProvider::default());
        auth.add_user("u1", "medic@example.com", "pw", "Pat", false);
        NarrativesService::new(Services::new(Backends {
            auth,
            narratives: Arc::new(InMemoryNarrativeStore::default()),
            sessions: Arc::new(InMemorySessionStore::default()),
            knowledge: Arc::new(InMemoryKnowledgeStore::default()),
            llm: Arc::new(ScriptedCompletionClient::replying("Narrative.")),
            cache: OfflineCache::new(dir),
        }))
    }

    fn authed<T>(msg: T) -> Request<T> {
        let mut req = Request::new(msg);
        req.metadata_mut()
            .insert("authorization", "Bearer token-u1".parse().unwrap());
        req
    }

    #[test]
    fn test_interceptor_checks_api_key() {
        let mut interceptor = ApiKeyInterceptor::new("secret");

        let status = interceptor.call(Request::new(())).unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);

        let mut req = Request::new(());
        req.metadata_mut().insert("x-api-key", "secret".parse().unwrap());
        assert!(interceptor.call(req).is_ok());
    }

    #[tokio::test]
    async fn test_calls_without_bearer_are_unauthenticated() {
        let dir = tempfile::tempdir().unwrap();
        let status = service(dir.path())
            .list_sessions(Request::new(()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::Unauthenticated);
    }

    #[tokio::test]
    async fn test_fire_generation_over_grpc() {
        let dir = tempfile::tempdir().unwrap();
        let svc = service(dir.path());
        let res = svc
            .generate_fire_narrative(authed(pb::GenerateFireNarrativeReq {
                form: Some(pb::FireForm {
                    unit: "Engine 2".into(),
                    emergency_type: "Structure Fire".into(),
                    ..Default::default()
                }),
                session_id: String::new(),
            }))
            .await
            .unwrap()
            .into_inner();
        assert_eq!(res.narrative_text, "Narrative.");
        assert!(!res.narrative_id.is_empty());
    }

    #[tokio::test]
    async fn test_validation_maps_to_invalid_argument() {
        let dir = tempfile::tempdir().unwrap();
        let status = service(dir.path())
            .generate_ems_narrative(authed(pb::GenerateEmsNarrativeReq::default()))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::InvalidArgument);
        assert_eq!(status.message(), "Please enter a unit.");
    }

    #[tokio::test]
    async fn test_missing_narrative_is_not_found() {
        let dir = tempfile::tempdir().unwrap();
        let status = service(dir.path())
            .get_narrative(authed(pb::NarrativeIdReq { id: "99".into() }))
            .await
            .unwrap_err();
        assert_eq!(status.code(), tonic::Code::NotFound);
    }
}
