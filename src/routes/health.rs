use crate::health::HealthComponent;
use crate::helpers::{json_response, JsonError};
use crate::identity::ComponentIdentity;
use actix_web::{get, post, web, HttpResponse, Result};
use chrono::Utc;

pub const STALE_HEADER: &str = "X-Health-Stale";

#[tracing::instrument(name = "Component identity.", skip(identity))]
#[get("/")]
pub async fn version(identity: web::Data<ComponentIdentity>) -> HttpResponse {
    json_response(HttpResponse::Ok(), identity.get_ref(), true)
}

#[tracing::instrument(name = "All health statuses.", skip(component))]
#[get("/health")]
pub async fn all_statuses(component: web::Data<HealthComponent>) -> Result<HttpResponse> {
    let statuses = component
        .all_statuses()
        .await
        .map_err(JsonError::from)?;
    Ok(json_response(HttpResponse::Ok(), &statuses, false))
}

#[tracing::instrument(name = "Read health checks.", skip(component))]
#[get("/health/{unit}")]
pub async fn read(
    path: web::Path<(String,)>,
    component: web::Data<HealthComponent>,
) -> Result<HttpResponse> {
    let unit = path.into_inner().0;
    let stored = component.read(&unit).await.map_err(JsonError::from)?;

    let Some(stored) = stored else {
        return Ok(json_response(HttpResponse::Ok(), &serde_json::json!([]), false));
    };
    let mut builder = HttpResponse::Ok();
    if stored.is_stale(Utc::now()) {
        builder.insert_header((STALE_HEADER, "true"));
    }
    Ok(json_response(builder, &stored.reports, false))
}

#[tracing::instrument(name = "Execute health checks.", skip(component))]
#[post("/health/{unit}")]
pub async fn exec(
    path: web::Path<(String,)>,
    component: web::Data<HealthComponent>,
) -> Result<HttpResponse> {
    let unit = path.into_inner().0;
    let reports = component.exec(&unit).await.map_err(JsonError::from)?;
    Ok(json_response(HttpResponse::Ok(), &reports, false))
}
