use std::sync::Arc;

use axum::{
    extract::{Path, State},
    http::StatusCode,
    response::{IntoResponse, Response},
    routing::{get, post},
    Json, Router,
};
use serde::Deserialize;
use serde_json::json;

use super::assignment::AssignmentError;
use super::batch::{BookingDesk, BookingError, RateFetchError, SessionError, SubmissionError};
use super::domain::{BatchId, CarrierId, OrderId, OrderRef, RtoId, WarehouseId};
use super::upstream::RateGateway;

/// Router builder exposing the booking workflow over HTTP.
pub fn booking_router<G>(desk: Arc<BookingDesk<G>>) -> Router
where
    G: RateGateway + 'static,
{
    Router::new()
        .route("/api/v1/bookings", post(open_handler::<G>))
        .route("/api/v1/bookings/:batch_id", get(status_handler::<G>))
        .route(
            "/api/v1/bookings/:batch_id/selection",
            post(select_handler::<G>),
        )
        .route(
            "/api/v1/bookings/:batch_id/selection/toggle",
            post(toggle_handler::<G>),
        )
        .route(
            "/api/v1/bookings/:batch_id/session",
            post(create_session_handler::<G>),
        )
        .route(
            "/api/v1/bookings/:batch_id/rates",
            post(fetch_rates_handler::<G>),
        )
        .route(
            "/api/v1/bookings/:batch_id/assignments/bulk",
            post(bulk_assign_handler::<G>),
        )
        .route(
            "/api/v1/bookings/:batch_id/assignments/order",
            post(individual_assign_handler::<G>),
        )
        .route(
            "/api/v1/bookings/:batch_id/assignments/release",
            post(release_handler::<G>),
        )
        .route(
            "/api/v1/bookings/:batch_id/submit",
            post(submit_handler::<G>),
        )
        .with_state(desk)
}

#[derive(Debug, Deserialize)]
pub(crate) struct OpenBatchRequest {
    pub(crate) orders: Vec<OrderRef>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct SelectRequest {
    pub(crate) order_ids: Vec<OrderId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ToggleRequest {
    pub(crate) order_id: OrderId,
    pub(crate) included: bool,
}

#[derive(Debug, Deserialize)]
pub(crate) struct CreateSessionBody {
    pub(crate) warehouse_id: WarehouseId,
    pub(crate) rto_id: RtoId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct BulkAssignRequest {
    pub(crate) carrier_id: CarrierId,
    pub(crate) order_ids: Vec<OrderId>,
}

#[derive(Debug, Deserialize)]
pub(crate) struct IndividualAssignRequest {
    pub(crate) order_id: OrderId,
    pub(crate) carrier_id: CarrierId,
}

#[derive(Debug, Deserialize)]
pub(crate) struct ReleaseRequest {
    pub(crate) order_id: OrderId,
}

#[derive(Debug, Default, Deserialize)]
pub(crate) struct SubmitRequest {
    #[serde(default)]
    pub(crate) auto_pickup: Option<bool>,
}

pub(crate) async fn open_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Json(payload): Json<OpenBatchRequest>,
) -> Response
where
    G: RateGateway + 'static,
{
    let batch = desk.open_batch(&payload.orders);
    (StatusCode::CREATED, Json(batch.status())).into_response()
}

pub(crate) async fn status_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
) -> Response
where
    G: RateGateway + 'static,
{
    match desk.batch(&BatchId(batch_id)) {
        Some(batch) => (StatusCode::OK, Json(batch.status())).into_response(),
        None => batch_not_found(),
    }
}

pub(crate) async fn select_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
    Json(payload): Json<SelectRequest>,
) -> Response
where
    G: RateGateway + 'static,
{
    let Some(batch) = desk.batch(&BatchId(batch_id)) else {
        return batch_not_found();
    };
    match batch.select_all(&payload.order_ids) {
        Ok(()) => (StatusCode::OK, Json(batch.status())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn toggle_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
    Json(payload): Json<ToggleRequest>,
) -> Response
where
    G: RateGateway + 'static,
{
    let Some(batch) = desk.batch(&BatchId(batch_id)) else {
        return batch_not_found();
    };
    match batch.toggle_order(&payload.order_id, payload.included) {
        Ok(()) => (StatusCode::OK, Json(batch.status())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn create_session_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
    Json(payload): Json<CreateSessionBody>,
) -> Response
where
    G: RateGateway + 'static,
{
    let Some(batch) = desk.batch(&BatchId(batch_id)) else {
        return batch_not_found();
    };
    match batch
        .create_session(payload.warehouse_id, payload.rto_id)
        .await
    {
        Ok(correlation_id) => (
            StatusCode::CREATED,
            Json(json!({ "correlation_id": correlation_id })),
        )
            .into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn fetch_rates_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
) -> Response
where
    G: RateGateway + 'static,
{
    let Some(batch) = desk.batch(&BatchId(batch_id)) else {
        return batch_not_found();
    };
    match batch.fetch_rates().await {
        Ok(offers) => (StatusCode::OK, Json(json!({ "offers": offers }))).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn bulk_assign_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
    Json(payload): Json<BulkAssignRequest>,
) -> Response
where
    G: RateGateway + 'static,
{
    let Some(batch) = desk.batch(&BatchId(batch_id)) else {
        return batch_not_found();
    };
    match batch.apply_bulk(&payload.carrier_id, &payload.order_ids) {
        Ok(report) => (StatusCode::OK, Json(report)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn individual_assign_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
    Json(payload): Json<IndividualAssignRequest>,
) -> Response
where
    G: RateGateway + 'static,
{
    let Some(batch) = desk.batch(&BatchId(batch_id)) else {
        return batch_not_found();
    };
    match batch.apply_individual(&payload.order_id, &payload.carrier_id) {
        Ok(offer) => (StatusCode::OK, Json(offer)).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn release_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
    Json(payload): Json<ReleaseRequest>,
) -> Response
where
    G: RateGateway + 'static,
{
    let Some(batch) = desk.batch(&BatchId(batch_id)) else {
        return batch_not_found();
    };
    match batch.release_order(&payload.order_id) {
        Ok(()) => (StatusCode::OK, Json(batch.status())).into_response(),
        Err(error) => error_response(error),
    }
}

pub(crate) async fn submit_handler<G>(
    State(desk): State<Arc<BookingDesk<G>>>,
    Path(batch_id): Path<String>,
    Json(payload): Json<SubmitRequest>,
) -> Response
where
    G: RateGateway + 'static,
{
    let Some(batch) = desk.batch(&BatchId(batch_id)) else {
        return batch_not_found();
    };
    match batch.submit(payload.auto_pickup.unwrap_or(true)).await {
        Ok(receipt) => {
            let status = if receipt.accepted {
                StatusCode::ACCEPTED
            } else {
                StatusCode::UNPROCESSABLE_ENTITY
            };
            (status, Json(receipt)).into_response()
        }
        Err(error) => error_response(error),
    }
}

fn batch_not_found() -> Response {
    let payload = json!({ "error": "unknown booking batch" });
    (StatusCode::NOT_FOUND, Json(payload)).into_response()
}

fn error_response(error: BookingError) -> Response {
    let status = match &error {
        BookingError::Selection(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BookingError::Assignment(AssignmentError::OffersNotReady) => StatusCode::CONFLICT,
        BookingError::Assignment(_) => StatusCode::UNPROCESSABLE_ENTITY,
        BookingError::Session(SessionError::Upstream(_)) => StatusCode::BAD_GATEWAY,
        BookingError::Session(_) => StatusCode::CONFLICT,
        BookingError::RateFetch(RateFetchError::Superseded) => StatusCode::CONFLICT,
        BookingError::RateFetch(_) => StatusCode::BAD_GATEWAY,
        BookingError::Submission(SubmissionError::AlreadyInFlight) => StatusCode::CONFLICT,
        BookingError::Submission(_) => StatusCode::BAD_GATEWAY,
    };

    let payload = json!({ "error": error.to_string() });
    (status, Json(payload)).into_response()
}
