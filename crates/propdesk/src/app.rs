use std::time::Duration;

use axum::{
    http::{header, HeaderName, Method, StatusCode},
    routing::{delete, get, post, put},
    Router,
};
use tower_http::{
    cors::{Any, CorsLayer},
    timeout::TimeoutLayer,
    trace::TraceLayer,
};

use crate::{
    context::{ACTOR_EMAIL, ACTOR_NAME, ACTOR_ORGANIZATION, ACTOR_ROLE},
    handlers::{
        health::{livez, readyz},
        properties::{
            create_property, edit_address, get_property, list_properties, list_property_events,
        },
        technicians::{get_technician, invite_technician, list_technicians},
        users::{
            add_alternate_names, add_tenant_to_property, create_tenant, delete_role, delete_user,
            get_user, invite_manager, list_managers, list_tenants, remove_alternate_names,
            remove_tenant_from_property, set_primary_address,
        },
        work_orders::{
            add_comment, assign_technician, create_work_order, delete_work_order, get_work_order,
            list_work_order_events, list_work_orders, remove_technician, update_status,
        },
    },
    state::AppState,
};

/// Create the application router with all routes and middleware.
pub fn create_app(state: AppState) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods([
            Method::GET,
            Method::POST,
            Method::PUT,
            Method::DELETE,
        ])
        .allow_headers([
            header::CONTENT_TYPE,
            HeaderName::from_static(ACTOR_EMAIL),
            HeaderName::from_static(ACTOR_NAME),
            HeaderName::from_static(ACTOR_ROLE),
            HeaderName::from_static(ACTOR_ORGANIZATION),
        ]);

    let api_routes = Router::new()
        // Users
        .route("/users/{email}", get(get_user).delete(delete_user))
        .route("/users/{email}/roles/{role}", delete(delete_role))
        .route(
            "/me/alternate-names",
            post(add_alternate_names).delete(remove_alternate_names),
        )
        // Tenants
        .route("/tenants", get(list_tenants).post(create_tenant))
        .route(
            "/tenants/{email}/properties/{property_id}",
            put(add_tenant_to_property).delete(remove_tenant_from_property),
        )
        .route(
            "/tenants/{email}/primary/{property_id}",
            put(set_primary_address),
        )
        // Property managers
        .route("/managers", get(list_managers).post(invite_manager))
        // Properties
        .route("/properties", get(list_properties).post(create_property))
        .route("/properties/{id}", get(get_property))
        .route("/properties/{id}/address", put(edit_address))
        .route("/properties/{id}/events", get(list_property_events))
        // Technicians
        .route("/technicians", get(list_technicians).post(invite_technician))
        .route("/technicians/{email}", get(get_technician))
        // Work orders
        .route("/work-orders", get(list_work_orders).post(create_work_order))
        .route(
            "/work-orders/{id}",
            get(get_work_order).delete(delete_work_order),
        )
        .route("/work-orders/{id}/status", put(update_status))
        .route("/work-orders/{id}/technicians", post(assign_technician))
        .route(
            "/work-orders/{id}/technicians/{email}",
            delete(remove_technician),
        )
        .route("/work-orders/{id}/comments", post(add_comment))
        .route("/work-orders/{id}/events", get(list_work_order_events))
        .layer(cors);

    Router::new()
        .route("/livez", get(livez))
        .route("/readyz", get(readyz))
        .nest("/api", api_routes)
        .layer(TraceLayer::new_for_http())
        .layer(TimeoutLayer::with_status_code(
            StatusCode::REQUEST_TIMEOUT,
            Duration::from_secs(10),
        ))
        .with_state(state)
}
