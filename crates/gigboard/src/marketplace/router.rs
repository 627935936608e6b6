use std::sync::Arc;

use axum::{
    async_trait,
    extract::{rejection::JsonRejection, FromRequest, Path, Query, Request, State},
    http::{HeaderMap, StatusCode},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize};

use super::applications::DecisionRequest;
use super::context::{IdentityProvider, RequestContext};
use super::domain::{
    Application, ApplicationDraft, ApplicationId, Category, CategoryDraft, EntityKind, Job,
    JobDraft, JobId, ProfileDraft, Service, ServiceDraft, ServiceId, User, UserId,
};
use super::error::{FieldError, MarketplaceError};
use super::moderation::{ModeratedEntity, ReviewRequest};
use super::notify::NotificationPublisher;
use super::query::{CategoryFilter, SearchFilter, SortOrder};
use super::rating::RatingSummary;
use super::service::MarketplaceService;
use super::store::MarketplaceStore;

/// Shared handler state: the facade plus the identity provider that builds each
/// request's context.
pub struct MarketplaceState<S, N> {
    pub service: Arc<MarketplaceService<S, N>>,
    pub identity: Arc<dyn IdentityProvider>,
}

impl<S, N> Clone for MarketplaceState<S, N> {
    fn clone(&self) -> Self {
        Self {
            service: Arc::clone(&self.service),
            identity: Arc::clone(&self.identity),
        }
    }
}

impl<S, N> MarketplaceState<S, N> {
    pub fn new(service: Arc<MarketplaceService<S, N>>, identity: Arc<dyn IdentityProvider>) -> Self {
        Self { service, identity }
    }

    fn context(&self, headers: &HeaderMap) -> Result<RequestContext, MarketplaceError> {
        let identity = self.identity.authenticate(headers)?;
        Ok(RequestContext::new(identity, Utc::now()))
    }
}

/// JSON body extractor whose rejections join the marketplace error model, so a
/// malformed payload is a 400 `validation` failure naming what went wrong.
pub(crate) struct JsonBody<T>(pub(crate) T);

#[async_trait]
impl<T, S> FromRequest<S> for JsonBody<T>
where
    T: DeserializeOwned,
    S: Send + Sync,
{
    type Rejection = MarketplaceError;

    async fn from_request(req: Request, state: &S) -> Result<Self, Self::Rejection> {
        match Json::<T>::from_request(req, state).await {
            Ok(Json(value)) => Ok(Self(value)),
            Err(rejection) => Err(body_rejection(rejection)),
        }
    }
}

fn body_rejection(rejection: JsonRejection) -> MarketplaceError {
    let field = match &rejection {
        JsonRejection::MissingJsonContentType(_) => "content-type",
        _ => "body",
    };
    MarketplaceError::ValidationFailed(vec![FieldError::new(field, rejection.body_text())])
}

#[derive(Debug, Default, Deserialize)]
pub struct SearchParams {
    #[serde(default)]
    pub search: Option<String>,
    #[serde(default)]
    pub category: Option<String>,
    #[serde(default)]
    pub sort: Option<SortOrder>,
}

impl SearchParams {
    fn filter(&self) -> SearchFilter {
        SearchFilter::new(
            self.search.clone().unwrap_or_default(),
            CategoryFilter::parse(self.category.as_deref()),
        )
    }
}

#[derive(Debug, Default, Deserialize)]
pub struct TopParams {
    #[serde(default)]
    pub limit: Option<usize>,
}

#[derive(Debug, Deserialize)]
pub struct ScoreRequest {
    pub score: f64,
}

#[derive(Debug, Deserialize)]
pub struct ActiveRequest {
    pub active: bool,
}

#[derive(Debug, Default, Deserialize)]
pub struct SuspensionRequest {
    #[serde(default)]
    pub reason: Option<String>,
}

/// Marketplace HTTP surface under `/api/v1`.
pub fn marketplace_router<S, N>(state: MarketplaceState<S, N>) -> Router
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    Router::new()
        .route("/api/v1/users", post(register_user::<S, N>))
        .route("/api/v1/users/:id", get(get_user::<S, N>))
        .route("/api/v1/users/:id/reviews", post(record_review::<S, N>))
        .route(
            "/api/v1/categories",
            get(list_categories::<S, N>).post(create_category::<S, N>),
        )
        .route(
            "/api/v1/services",
            get(search_services::<S, N>).post(create_service::<S, N>),
        )
        .route("/api/v1/services/:id", get(get_service::<S, N>))
        .route("/api/v1/services/:id/active", post(set_service_active::<S, N>))
        .route("/api/v1/services/:id/apply", post(apply::<S, N>))
        .route(
            "/api/v1/services/:id/applications",
            get(service_applications::<S, N>),
        )
        .route("/api/v1/applications/:id", get(get_application::<S, N>))
        .route("/api/v1/applications/:id/decide", post(decide::<S, N>))
        .route(
            "/api/v1/jobs",
            get(search_jobs::<S, N>).post(create_job::<S, N>),
        )
        .route("/api/v1/jobs/:id", get(get_job::<S, N>))
        .route("/api/v1/freelancers", get(search_freelancers::<S, N>))
        .route("/api/v1/freelancers/top", get(top_freelancers::<S, N>))
        .route("/api/v1/admin/:kind/pending", get(moderation_queue::<S, N>))
        .route("/api/v1/admin/:kind/:id/review", post(review::<S, N>))
        .route("/api/v1/admin/:kind/:id/suspend", post(suspend::<S, N>))
        .route("/api/v1/admin/:kind/:id/reinstate", post(reinstate::<S, N>))
        .with_state(state)
}

fn entity_kind(raw: &str) -> Result<EntityKind, MarketplaceError> {
    raw.parse()
        .map_err(|_| MarketplaceError::not_found("entity type", raw))
}

/// Suspension only applies to user accounts.
fn user_kind(raw: &str) -> Result<(), MarketplaceError> {
    match entity_kind(raw)? {
        EntityKind::User => Ok(()),
        _ => Err(MarketplaceError::not_found("entity type", raw)),
    }
}

pub(crate) async fn register_user<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    headers: HeaderMap,
    JsonBody(draft): JsonBody<ProfileDraft>,
) -> Result<(StatusCode, Json<User>), MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let user = state.service.register_user(&ctx, &draft)?;
    Ok((StatusCode::CREATED, Json(user)))
}

pub(crate) async fn get_user<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<User>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    Ok(Json(state.service.user(&ctx, &UserId(id))?))
}

pub(crate) async fn record_review<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<ScoreRequest>,
) -> Result<Json<RatingSummary>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let summary = state
        .service
        .record_review(&ctx, &UserId(id), request.score)?;
    Ok(Json(summary))
}

pub(crate) async fn list_categories<S, N>(
    State(state): State<MarketplaceState<S, N>>,
) -> Result<Json<Vec<Category>>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    Ok(Json(state.service.categories()?))
}

pub(crate) async fn create_category<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    headers: HeaderMap,
    JsonBody(draft): JsonBody<CategoryDraft>,
) -> Result<(StatusCode, Json<Category>), MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let category = state.service.create_category(&ctx, &draft)?;
    Ok((StatusCode::CREATED, Json(category)))
}

pub(crate) async fn search_services<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Service>>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let services = state
        .service
        .search_services(&params.filter(), params.sort.unwrap_or_default())?;
    Ok(Json(services))
}

pub(crate) async fn create_service<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    headers: HeaderMap,
    JsonBody(draft): JsonBody<ServiceDraft>,
) -> Result<(StatusCode, Json<Service>), MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let service = state.service.create_service(&ctx, &draft)?;
    Ok((StatusCode::CREATED, Json(service)))
}

pub(crate) async fn get_service<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Service>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    Ok(Json(state.service.service(&ctx, &ServiceId(id))?))
}

pub(crate) async fn set_service_active<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<ActiveRequest>,
) -> Result<Json<Service>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let service = state
        .service
        .set_service_active(&ctx, &ServiceId(id), request.active)?;
    Ok(Json(service))
}

pub(crate) async fn apply<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(draft): JsonBody<ApplicationDraft>,
) -> Result<(StatusCode, Json<Application>), MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let application = state.service.apply(&ctx, &ServiceId(id), &draft)?;
    Ok((StatusCode::CREATED, Json(application)))
}

pub(crate) async fn service_applications<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<Application>>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let applications = state
        .service
        .applications_for_service(&ctx, &ServiceId(id))?;
    Ok(Json(applications))
}

pub(crate) async fn get_application<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Application>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    Ok(Json(state.service.application(&ctx, &ApplicationId(id))?))
}

pub(crate) async fn decide<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<DecisionRequest>,
) -> Result<Json<Application>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let application = state
        .service
        .decide(&ctx, &ApplicationId(id), request.outcome)?;
    Ok(Json(application))
}

pub(crate) async fn search_jobs<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<Job>>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let jobs = state
        .service
        .search_jobs(&params.filter(), params.sort.unwrap_or_default())?;
    Ok(Json(jobs))
}

pub(crate) async fn create_job<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    headers: HeaderMap,
    JsonBody(draft): JsonBody<JobDraft>,
) -> Result<(StatusCode, Json<Job>), MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    let job = state.service.create_job(&ctx, &draft)?;
    Ok((StatusCode::CREATED, Json(job)))
}

pub(crate) async fn get_job<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(id): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Job>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let ctx = state.context(&headers)?;
    Ok(Json(state.service.job(&ctx, &JobId(id))?))
}

pub(crate) async fn search_freelancers<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Query(params): Query<SearchParams>,
) -> Result<Json<Vec<User>>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let freelancers = state
        .service
        .search_freelancers(&params.filter(), params.sort.unwrap_or_default())?;
    Ok(Json(freelancers))
}

pub(crate) async fn top_freelancers<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Query(params): Query<TopParams>,
) -> Result<Json<Vec<User>>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    Ok(Json(state.service.top_freelancers(params.limit)?))
}

pub(crate) async fn moderation_queue<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path(kind): Path<String>,
    headers: HeaderMap,
) -> Result<Json<Vec<ModeratedEntity>>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let kind = entity_kind(&kind)?;
    let ctx = state.context(&headers)?;
    Ok(Json(state.service.moderation_queue(&ctx, kind)?))
}

pub(crate) async fn review<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<ReviewRequest>,
) -> Result<Json<ModeratedEntity>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    let kind = entity_kind(&kind)?;
    let ctx = state.context(&headers)?;
    Ok(Json(state.service.review(&ctx, kind, &id, &request)?))
}

pub(crate) async fn suspend<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
    JsonBody(request): JsonBody<SuspensionRequest>,
) -> Result<Json<User>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    user_kind(&kind)?;
    let ctx = state.context(&headers)?;
    let user = state
        .service
        .suspend_user(&ctx, &UserId(id), request.reason.as_deref())?;
    Ok(Json(user))
}

pub(crate) async fn reinstate<S, N>(
    State(state): State<MarketplaceState<S, N>>,
    Path((kind, id)): Path<(String, String)>,
    headers: HeaderMap,
) -> Result<Json<User>, MarketplaceError>
where
    S: MarketplaceStore + 'static,
    N: NotificationPublisher + 'static,
{
    user_kind(&kind)?;
    let ctx = state.context(&headers)?;
    Ok(Json(state.service.reinstate_user(&ctx, &UserId(id))?))
}
