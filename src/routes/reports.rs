use axum::{
    Json, Router,
    extract::{Query, State},
    http::{StatusCode, header},
    response::{IntoResponse, Response},
    routing::get,
};

use crate::{
    dto::reports::TransactionReport,
    error::AppResult,
    middleware::auth::AuthUser,
    response::ApiResponse,
    routes::params::TransactionQuery,
    services::report_service,
    state::AppState,
};

pub fn router() -> Router<AppState> {
    Router::new()
        .route("/transactions", get(list_transactions))
        .route("/transactions/export", get(export_transactions))
}

#[utoipa::path(
    get,
    path = "/api/reports/transactions",
    params(
        ("page" = Option<i64>, Query, description = "Page number, default 1"),
        ("per_page" = Option<i64>, Query, description = "Items per page, default 15"),
        ("preset" = Option<String>, Query, description = "today | yesterday | this_week | this_month | this_year"),
        ("date_from" = Option<String>, Query, description = "Inclusive start date (YYYY-MM-DD)"),
        ("date_to" = Option<String>, Query, description = "Inclusive end date (YYYY-MM-DD)"),
        ("payment_method" = Option<String>, Query, description = "cash | qris | transfer | debit"),
        ("q" = Option<String>, Query, description = "Search order number, customer or payment method"),
    ),
    responses(
        (status = 200, description = "Filtered transaction page with summary", body = ApiResponse<TransactionReport>)
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn list_transactions(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<TransactionQuery>,
) -> AppResult<Json<ApiResponse<TransactionReport>>> {
    let resp = report_service::list_transactions(&state, query).await?;
    Ok(Json(resp))
}

#[utoipa::path(
    get,
    path = "/api/reports/transactions/export",
    params(
        ("preset" = Option<String>, Query, description = "today | yesterday | this_week | this_month | this_year"),
        ("date_from" = Option<String>, Query, description = "Inclusive start date (YYYY-MM-DD)"),
        ("date_to" = Option<String>, Query, description = "Inclusive end date (YYYY-MM-DD)"),
        ("payment_method" = Option<String>, Query, description = "cash | qris | transfer | debit"),
        ("q" = Option<String>, Query, description = "Search order number, customer or payment method"),
    ),
    responses(
        (status = 200, description = "Filtered transactions as an HTML report", content_type = "text/html")
    ),
    security(("bearer_auth" = [])),
    tag = "Reports"
)]
pub async fn export_transactions(
    State(state): State<AppState>,
    _user: AuthUser,
    Query(query): Query<TransactionQuery>,
) -> AppResult<Response> {
    let html = report_service::export_transactions(&state, query).await?;
    Ok((
        StatusCode::OK,
        [
            (header::CONTENT_TYPE, "text/html; charset=utf-8"),
            (
                header::CONTENT_DISPOSITION,
                "attachment; filename=\"laporan-transaksi.html\"",
            ),
        ],
        html,
    )
        .into_response())
}
