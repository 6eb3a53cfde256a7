// src/api/handlers.rs
use actix_web::{web, HttpResponse};
use std::sync::Arc;

use crate::error::AdmissionError;
use crate::models::{
    AllocationResponse, HealthResponse, ReleaseResponse, ResourceRequest,
    ResourcesForEventRequest,
};
use crate::services::AdmissionService;

pub async fn health_check() -> HttpResponse {
    HttpResponse::Ok().json(HealthResponse {
        status: "healthy".to_string(),
        service: "resource-admission".to_string(),
        version: env!("CARGO_PKG_VERSION").to_string(),
    })
}

fn validate_tenant(tenant: &str) -> Result<(), AdmissionError> {
    if tenant.is_empty() {
        return Err(AdmissionError::InvalidRequest("missing tenant".to_string()));
    }
    Ok(())
}

pub async fn resources_for_event(
    req: web::Json<ResourcesForEventRequest>,
    service: web::Data<Arc<AdmissionService>>,
) -> Result<HttpResponse, AdmissionError> {
    validate_tenant(&req.tenant)?;
    let resources = service
        .resources_for_event(&req.tenant, &req.event, req.usage_ttl_secs)
        .await?;
    Ok(HttpResponse::Ok().json(resources))
}

pub async fn authorize_resources(
    req: web::Json<ResourceRequest>,
    service: web::Data<Arc<AdmissionService>>,
) -> Result<HttpResponse, AdmissionError> {
    validate_tenant(&req.tenant)?;
    let message = service
        .authorize(
            &req.tenant,
            &req.event,
            &req.usage_id,
            req.units_or_default(),
            req.usage_ttl_secs,
        )
        .await?;
    Ok(HttpResponse::Ok().json(AllocationResponse {
        allocation_message: message,
    }))
}

pub async fn allocate_resources(
    req: web::Json<ResourceRequest>,
    service: web::Data<Arc<AdmissionService>>,
) -> Result<HttpResponse, AdmissionError> {
    validate_tenant(&req.tenant)?;
    let message = service
        .allocate(
            &req.tenant,
            &req.event,
            &req.usage_id,
            req.units_or_default(),
            req.usage_ttl_secs,
        )
        .await?;
    Ok(HttpResponse::Ok().json(AllocationResponse {
        allocation_message: message,
    }))
}

pub async fn release_resources(
    req: web::Json<ResourceRequest>,
    service: web::Data<Arc<AdmissionService>>,
) -> Result<HttpResponse, AdmissionError> {
    validate_tenant(&req.tenant)?;
    service
        .release(&req.tenant, &req.event, &req.usage_id, req.usage_ttl_secs)
        .await?;
    Ok(HttpResponse::Ok().json(ReleaseResponse {
        status: "OK".to_string(),
    }))
}

pub async fn get_resource(
    path: web::Path<(String, String)>,
    service: web::Data<Arc<AdmissionService>>,
) -> Result<HttpResponse, AdmissionError> {
    let (tenant, id) = path.into_inner();
    validate_tenant(&tenant)?;
    let resource = service.resource(&tenant, &id).await?;
    Ok(HttpResponse::Ok().json(resource))
}
