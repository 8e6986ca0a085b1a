use axum::Router;

use crate::state::AppState;

pub mod auth;
pub mod cart;
pub mod dashboard;
pub mod doc;
pub mod events;
pub mod health;
pub mod params;
pub mod products;
pub mod reports;

// Build the API router without binding state; it is provided at the top level.
pub fn create_api_router() -> Router<AppState> {
    Router::new()
        .nest("/auth", auth::router())
        .nest("/products", products::router())
        .nest("/cart", cart::router())
        .nest("/reports", reports::router())
        .nest("/dashboard", dashboard::router())
        .nest("/events", events::router())
}
