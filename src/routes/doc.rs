use utoipa::{
    Modify, OpenApi,
    openapi::{
        self,
        OpenApi as OpenApiSpec,
        security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    },
};
use utoipa_scalar::{Scalar, Servable};

use crate::{
    dto::{
        auth::{
            ChangePasswordRequest, Claims, LoginRequest, LoginResponse, MeResponse,
            RegisterRequest, TempPasswordIssued, TempPasswordRequest,
        },
        cart::{
            AddItemRequest, CartTotals, CartView, CheckoutRequest, SetCustomerRequest,
            UpdateItemRequest,
        },
        dashboard::{DailyRevenue, DashboardStats, TopProduct},
        products::{
            CategoryList, CreateProductRequest, ProductList, SetAvailabilityRequest,
            UpdateProductRequest,
        },
        reports::{OrderWithItems, TransactionReport, TransactionSummary},
    },
    events::{ChangeAction, ChangeEvent},
    models::{Cart, CartItem, Order, OrderItem, PaymentMethod, Product, StaffProfile, User},
    response::{ApiResponse, Meta},
    routes::{auth, cart, dashboard, events, health, params, products, reports},
};

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut openapi::OpenApi) {
        let components = openapi.components.get_or_insert_with(Default::default);
        components.add_security_scheme(
            "bearer_auth",
            SecurityScheme::Http(
                HttpBuilder::new()
                    .scheme(HttpAuthScheme::Bearer)
                    .bearer_format("JWT")
                    .build(),
            ),
        );
    }
}

#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        auth::register,
        auth::login,
        auth::me,
        auth::temp_password,
        auth::verify_temp_password,
        auth::change_password,
        products::list_products,
        products::list_categories,
        products::get_product,
        products::create_product,
        products::update_product,
        products::set_availability,
        products::delete_product,
        cart::view_cart,
        cart::add_item,
        cart::update_item,
        cart::remove_item,
        cart::set_customer_name,
        cart::clear_cart,
        cart::checkout,
        reports::list_transactions,
        reports::export_transactions,
        dashboard::stats,
        events::subscribe,
    ),
    components(
        schemas(
            User,
            StaffProfile,
            Product,
            Cart,
            CartItem,
            Order,
            OrderItem,
            PaymentMethod,
            RegisterRequest,
            LoginRequest,
            LoginResponse,
            MeResponse,
            TempPasswordRequest,
            TempPasswordIssued,
            ChangePasswordRequest,
            Claims,
            CreateProductRequest,
            UpdateProductRequest,
            SetAvailabilityRequest,
            ProductList,
            CategoryList,
            AddItemRequest,
            UpdateItemRequest,
            SetCustomerRequest,
            CheckoutRequest,
            CartTotals,
            CartView,
            OrderWithItems,
            TransactionSummary,
            TransactionReport,
            DashboardStats,
            TopProduct,
            DailyRevenue,
            ChangeEvent,
            ChangeAction,
            params::Pagination,
            params::ProductQuery,
            params::TransactionQuery,
            params::DatePreset,
            Meta,
            ApiResponse<Product>,
            ApiResponse<ProductList>,
            ApiResponse<CartView>,
            ApiResponse<OrderWithItems>,
            ApiResponse<TransactionReport>,
            ApiResponse<DashboardStats>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Staff accounts and sessions"),
        (name = "Products", description = "Catalog management"),
        (name = "Cart", description = "Point-of-sale cart and checkout"),
        (name = "Reports", description = "Transaction history and export"),
        (name = "Dashboard", description = "Aggregate statistics"),
        (name = "Events", description = "Table change-event stream"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
