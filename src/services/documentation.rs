use utoipa::OpenApi;

#[derive(OpenApi)]
/// Aggregated OpenAPI specification for Tripflow Back.
#[openapi(
    paths(
        crate::routes::health::healthcheck,
        crate::routes::plan::open_plan,
        crate::routes::plan::save_plan,
        crate::routes::websocket::ws_handler,
    ),
    components(
        schemas(
            crate::dto::health::HealthResponse,
            crate::dto::plan::PlanSnapshot,
            crate::dto::plan::SaveAck,
            crate::dto::ws::UserDescriptor,
            crate::dto::ws::SaveStatus,
            crate::state::plan::Plan,
            crate::state::plan::SectionKind,
        )
    ),
    tags(
        (name = "health", description = "Health check endpoints"),
        (name = "plans", description = "Trip plan snapshots and explicit saves"),
        (name = "realtime", description = "WebSocket operations for collaborative plan editing"),
    )
)]
pub struct ApiDoc;
