use crate::{
    handler::{ContactFormError, ContactFormHandler, ContactResponse},
    mailer::MailTransport,
};
use axum::{
    body::Bytes,
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use chrono::Local;
use serde_json::{json, Value};
use std::{any::Any, sync::Arc};
use tower_http::{catch_panic::CatchPanicLayer, cors::CorsLayer, trace::TraceLayer};

pub const CONTACT_PATH: &str = "/api/contact";
pub const HEALTH_PATH: &str = "/api/health";

pub fn router<MailTransportT: MailTransport + 'static>(
    handler: Arc<ContactFormHandler<MailTransportT>>,
    cors: CorsLayer,
) -> Router {
    Router::new()
        .route("/", get(home::<MailTransportT>))
        .route(HEALTH_PATH, get(health))
        .route(CONTACT_PATH, post(contact::<MailTransportT>))
        .with_state(handler)
        .layer(CatchPanicLayer::custom(handle_panic))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
}

async fn home<MailTransportT: MailTransport>(
    State(handler): State<Arc<ContactFormHandler<MailTransportT>>>,
) -> Json<Value> {
    Json(json!({
        "message": format!("{} Contact API - Funcionando correctamente", handler.business_name()),
        "status": "active",
        "endpoints": {
            "contact": format!("{CONTACT_PATH} [POST]"),
            "health": format!("{HEALTH_PATH} [GET]"),
        }
    }))
}

async fn health() -> Json<Value> {
    Json(json!({
        "status": "OK",
        "message": "API funcionando correctamente",
        "timestamp": Local::now().format("%Y-%m-%dT%H:%M:%S%.6f").to_string(),
    }))
}

async fn contact<MailTransportT: MailTransport>(
    State(handler): State<Arc<ContactFormHandler<MailTransportT>>>,
    body: Bytes,
) -> Response {
    match handler.handle(&body).await {
        Ok(()) => (StatusCode::OK, Json(ContactResponse::success())).into_response(),
        Err(error) => {
            error.log();
            error.into_response()
        }
    }
}

fn handle_panic(panic: Box<dyn Any + Send + 'static>) -> Response {
    let detail = panic
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| panic.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    let error = ContactFormError::InternalError(format!("Panic while handling request: {detail}"));
    error.log();
    error.into_response()
}

#[cfg(test)]
mod tests {
    use super::{handle_panic, router};
    use crate::{
        config::{Config, MailConfig},
        email::EmailRenderer,
        handler::{ContactFormHandler, ContactResponse, INTERNAL_ERROR_MESSAGE, SUCCESS_MESSAGE},
        mailer::test_support::FakeMailTransport,
    };
    use axum::{
        body::{to_bytes, Body},
        http::{header, Request, StatusCode},
        response::Response,
        Router,
    };
    use clap::Parser;
    use googletest::prelude::*;
    use serde::de::DeserializeOwned;
    use serde_json::{json, Value};
    use std::sync::Arc;
    use tower::ServiceExt;
    use tower_http::cors::CorsLayer;

    fn app(transport: FakeMailTransport) -> Router {
        app_with_cors(transport, CorsLayer::new())
    }

    fn app_with_cors(transport: FakeMailTransport, cors: CorsLayer) -> Router {
        let handler = ContactFormHandler::new(
            transport,
            EmailRenderer::new(&MailConfig::for_testing()),
        );
        router(Arc::new(handler), cors)
    }

    fn post_contact(body: impl Into<Body>) -> Request<Body> {
        Request::builder()
            .method("POST")
            .uri("/api/contact")
            .header(header::CONTENT_TYPE, "application/json")
            .body(body.into())
            .unwrap()
    }

    fn get(uri: &str) -> Request<Body> {
        Request::builder().uri(uri).body(Body::empty()).unwrap()
    }

    fn allow_origin(response: &Response) -> Option<&str> {
        response
            .headers()
            .get(header::ACCESS_CONTROL_ALLOW_ORIGIN)
            .and_then(|value| value.to_str().ok())
    }

    async fn json_body<T: DeserializeOwned>(response: Response) -> T {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn accepts_valid_submission() -> Result<()> {
        let body = json!({
            "name": "Ana",
            "email": "ana@x.com",
            "projectType": "muebles",
            "message": "Hola"
        });

        let response = app(FakeMailTransport::new())
            .oneshot(post_contact(body.to_string()))
            .await
            .unwrap();

        verify_that!(response.status(), eq(StatusCode::OK))?;
        verify_that!(
            json_body::<ContactResponse>(response).await,
            eq(ContactResponse {
                success: true,
                message: SUCCESS_MESSAGE.into(),
            })
        )
    }

    #[tokio::test]
    async fn accepts_valid_submission_when_mail_fails() -> Result<()> {
        let body = json!({
            "name": "Ana",
            "email": "ana@x.com",
            "projectType": "muebles",
            "message": "Hola"
        });

        let response = app(FakeMailTransport::failing())
            .oneshot(post_contact(body.to_string()))
            .await
            .unwrap();

        verify_that!(response.status(), eq(StatusCode::OK))
    }

    #[tokio::test]
    async fn returns_400_listing_missing_fields() -> Result<()> {
        let response = app(FakeMailTransport::new())
            .oneshot(post_contact(json!({"name": "Ana"}).to_string()))
            .await
            .unwrap();

        verify_that!(response.status(), eq(StatusCode::BAD_REQUEST))?;
        verify_that!(
            json_body::<ContactResponse>(response).await,
            eq(ContactResponse {
                success: false,
                message: "Campos requeridos faltantes: email, projectType, message".into(),
            })
        )
    }

    #[tokio::test]
    async fn returns_400_for_empty_body() -> Result<()> {
        let response = app(FakeMailTransport::new())
            .oneshot(post_contact(Body::empty()))
            .await
            .unwrap();

        verify_that!(response.status(), eq(StatusCode::BAD_REQUEST))?;
        verify_that!(
            json_body::<ContactResponse>(response).await,
            eq(ContactResponse {
                success: false,
                message: "No se recibieron datos".into(),
            })
        )
    }

    #[tokio::test]
    async fn converts_panics_into_generic_500() -> Result<()> {
        let response = handle_panic(Box::new("boom"));

        verify_that!(response.status(), eq(StatusCode::INTERNAL_SERVER_ERROR))?;
        verify_that!(
            json_body::<ContactResponse>(response).await,
            eq(ContactResponse {
                success: false,
                message: INTERNAL_ERROR_MESSAGE.into(),
            })
        )
    }

    #[tokio::test]
    async fn returns_generic_500_when_handler_panics() -> Result<()> {
        let body = json!({
            "name": "Ana",
            "email": "ana@x.com",
            "projectType": "muebles",
            "message": "Hola"
        });

        let response = app(FakeMailTransport::panicking())
            .oneshot(post_contact(body.to_string()))
            .await
            .unwrap();

        verify_that!(response.status(), eq(StatusCode::INTERNAL_SERVER_ERROR))?;
        verify_that!(
            json_body::<ContactResponse>(response).await,
            eq(ContactResponse {
                success: false,
                message: INTERNAL_ERROR_MESSAGE.into(),
            })
        )
    }

    #[tokio::test]
    async fn reports_health() -> Result<()> {
        let response = app(FakeMailTransport::new())
            .oneshot(get("/api/health"))
            .await
            .unwrap();

        verify_that!(response.status(), eq(StatusCode::OK))?;
        let body: Value = json_body(response).await;
        verify_that!(body["status"].as_str(), some(eq("OK")))?;
        verify_that!(
            body["message"].as_str(),
            some(eq("API funcionando correctamente"))
        )?;
        verify_that!(body["timestamp"].as_str(), some(anything()))
    }

    #[tokio::test]
    async fn describes_api_at_root() -> Result<()> {
        let response = app(FakeMailTransport::new())
            .oneshot(get("/"))
            .await
            .unwrap();

        verify_that!(response.status(), eq(StatusCode::OK))?;
        let body: Value = json_body(response).await;
        verify_that!(
            body,
            eq(json!({
                "message": "A Fábrica Contact API - Funcionando correctamente",
                "status": "active",
                "endpoints": {
                    "contact": "/api/contact [POST]",
                    "health": "/api/health [GET]"
                }
            }))
        )
    }

    #[tokio::test]
    async fn production_allows_only_listed_origins() -> Result<()> {
        let config = Config::try_parse_from([
            "contact-form-api",
            "--environment",
            "production",
            "--cors-origins",
            "https://a-fabrica.es",
        ])
        .unwrap();
        let request = |origin: &'static str| {
            Request::builder()
                .uri("/api/health")
                .header(header::ORIGIN, origin)
                .body(Body::empty())
                .unwrap()
        };

        let allowed = app_with_cors(FakeMailTransport::new(), config.cors_layer())
            .oneshot(request("https://a-fabrica.es"))
            .await
            .unwrap();
        let rejected = app_with_cors(FakeMailTransport::new(), config.cors_layer())
            .oneshot(request("https://evil.example"))
            .await
            .unwrap();

        verify_that!(
            allow_origin(&allowed),
            some(eq("https://a-fabrica.es"))
        )?;
        verify_that!(
            allow_origin(&rejected),
            none()
        )
    }

    #[tokio::test]
    async fn development_allows_any_origin() -> Result<()> {
        let config = Config::try_parse_from(["contact-form-api", "--environment", "development"])
            .unwrap();

        let response = app_with_cors(FakeMailTransport::new(), config.cors_layer())
            .oneshot(
                Request::builder()
                    .uri("/api/health")
                    .header(header::ORIGIN, "https://anywhere.example")
                    .body(Body::empty())
                    .unwrap(),
            )
            .await
            .unwrap();

        verify_that!(
            allow_origin(&response),
            some(eq("*"))
        )
    }
}
