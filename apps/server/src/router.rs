use axum::Router;
use larp::kernel::prelude::ApiState;
use tower_http::trace::TraceLayer;
use utoipa::OpenApi;
use utoipa_axum::router::OpenApiRouter;
use utoipa_scalar::{Scalar, Servable};

#[derive(OpenApi)]
#[openapi(info(title = "larp", description = "Character rules engine and campaign records"))]
struct ApiDoc;

#[allow(unreachable_pub)]
pub fn init(state: ApiState) -> Router {
    let (openapi_routes, api_doc) = OpenApiRouter::with_openapi(ApiDoc::openapi())
        .merge(larp::server::router::system_router())
        .merge(larp::server::router::feature_router())
        .layer(TraceLayer::new_for_http())
        .with_state(state)
        .split_for_parts();

    let scalar_routes = Scalar::with_url("/api", api_doc);

    Router::new().merge(openapi_routes).merge(scalar_routes)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;
    use axum::http::{Request, StatusCode};
    use larp::domain::config::ApiConfig;
    use larp::domain::registry::InitializedSlice;
    use larp::features::campaign::Campaigns;
    use tower::ServiceExt;

    fn app() -> Router {
        let state = ApiState::builder()
            .config(ApiConfig::default())
            .register_slice(InitializedSlice::new(Campaigns::default()))
            .build()
            .unwrap();
        init(state)
    }

    #[tokio::test]
    async fn health_and_docs_are_served() {
        let app = app();
        let health = app.clone().oneshot(Request::get("/health").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(health.status(), StatusCode::OK);

        let docs = app.oneshot(Request::get("/api").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(docs.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn slice_routes_are_mounted() {
        let response = app().oneshot(Request::get("/api/campaigns").body(Body::empty()).unwrap()).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        let bytes = axum::body::to_bytes(response.into_body(), usize::MAX).await.unwrap();
        assert_eq!(serde_json::from_slice::<serde_json::Value>(&bytes).unwrap(), serde_json::json!([]));
    }
}
