//! OpenAPI / Swagger UI Documentation
//!
//! - Swagger UI: `http://localhost:8080/docs`
//! - OpenAPI JSON: `http://localhost:8080/api-docs/openapi.json`

use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

use super::handlers::{GatewayAAck, HealthResponse};
use super::types::{
    AdminActionResponse, ArchiveResponse, CreateDepositRequest, CreateDepositResponse,
    HistoryResponse, NotifyPaidResponse, ResolveReviewRequest, ResolveReviewResponse, ReviewItem,
};
use crate::deposit::types::{IgnoredEvent, StatusHistoryEntry};
use crate::deposit::{ChannelPayload, DepositStatus, PaymentMethod, StatusView};

/// Administrator bearer JWT
struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            let scheme = HttpBuilder::new()
                .scheme(HttpAuthScheme::Bearer)
                .bearer_format("JWT")
                .description(Some(
                    "HS256 token with claim role = \"admin\"; sub is the admin id",
                ))
                .build();
            components.add_security_scheme("admin_jwt", SecurityScheme::Http(scheme));
        }
    }
}

#[derive(OpenApi)]
#[openapi(
    info(
        title = "Rental Deposit API",
        version = "1.0.0",
        description = "Deposit payment lifecycle: creation, gateway callbacks, bank-transfer confirmation and status polling.",
        license(
            name = "MIT"
        )
    ),
    servers(
        (url = "http://localhost:8080", description = "Development"),
    ),
    paths(
        crate::api::handlers::health::health_check,
        crate::api::handlers::deposit::create_deposit,
        crate::api::handlers::deposit::get_deposit_status,
        crate::api::handlers::deposit::notify_paid,
        crate::api::handlers::callback::gateway_a_callback,
        crate::api::handlers::callback::gateway_b_callback,
        crate::api::handlers::admin::confirm_deposit,
        crate::api::handlers::admin::cancel_deposit,
        crate::api::handlers::admin::archive_deposit,
        crate::api::handlers::admin::resolve_review,
        crate::api::handlers::admin::review_queue,
        crate::api::handlers::admin::deposit_history,
    ),
    components(
        schemas(
            HealthResponse,
            CreateDepositRequest,
            CreateDepositResponse,
            NotifyPaidResponse,
            StatusView,
            ChannelPayload,
            DepositStatus,
            PaymentMethod,
            GatewayAAck,
            AdminActionResponse,
            ArchiveResponse,
            ResolveReviewRequest,
            ResolveReviewResponse,
            ReviewItem,
            HistoryResponse,
            StatusHistoryEntry,
            IgnoredEvent,
        )
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Deposit", description = "Tenant deposit creation and polling"),
        (name = "Callback", description = "Payment provider notifications"),
        (name = "Admin", description = "Manual confirmation and review (admin JWT)"),
        (name = "System", description = "Health checks")
    )
)]
pub struct ApiDoc;
