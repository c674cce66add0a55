use axum::{
    extract::{Json, State},
    routing::get,
    Router,
};

use crate::{
    auth::AuthenticatedUser,
    entities::address,
    errors::ApiError,
    handlers::common::validate_input,
    services::addresses::CreateAddressInput,
    ApiResponse, AppState,
};

pub fn address_routes() -> Router<AppState> {
    Router::new().route("/", get(list_addresses).post(create_address))
}

async fn create_address(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
    Json(payload): Json<CreateAddressInput>,
) -> Result<Json<ApiResponse<address::Model>>, ApiError> {
    validate_input(&payload)?;
    let address = state
        .services
        .addresses
        .create_address(auth.user_id, payload)
        .await?;
    Ok(Json(ApiResponse::success(address)))
}

async fn list_addresses(
    State(state): State<AppState>,
    auth: AuthenticatedUser,
) -> Result<Json<ApiResponse<Vec<address::Model>>>, ApiError> {
    let addresses = state.services.addresses.list_addresses(auth.user_id).await?;
    Ok(Json(ApiResponse::success(addresses)))
}
