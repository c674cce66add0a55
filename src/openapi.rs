use utoipa::OpenApi;

/// Aggregated OpenAPI document served at `/docs`.
#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::auth::register,
        crate::handlers::orders::place_order_cod,
        crate::handlers::orders::place_order_online,
        crate::handlers::payment_webhooks::payment_webhook,
    ),
    components(schemas(
        crate::errors::ErrorResponse,
        crate::handlers::auth::RegisterRequest,
        crate::handlers::auth::LoginRequest,
        crate::handlers::auth::AuthResponse,
        crate::handlers::auth::AuthUserResponse,
        crate::handlers::auth::SellerAuthResponse,
        crate::handlers::orders::OrderLineRequest,
        crate::handlers::orders::PlaceOrderRequest,
        crate::handlers::orders::PlaceOrderResponse,
    )),
    tags(
        (name = "Auth", description = "Account registration and sign-in"),
        (name = "Orders", description = "Checkout and order management"),
        (name = "Payments", description = "Payment gateway reconciliation"),
    ),
    info(
        title = "Oakline API",
        description = "Backend for the Oakline furniture storefront",
    )
)]
pub struct ApiDoc;
