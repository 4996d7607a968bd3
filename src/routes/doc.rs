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
        addresses::AddressList,
        auth::LoginResponse,
        cart::{CartItemDto, CartView},
        checkout::CheckoutResponse,
        orders::{OrderList, OrderWithItems},
        products,
        reviews::ReviewList,
        stores::StoreList,
    },
    models::{Address, CartItem, Order, OrderItem, Product, Review, Store, User},
    response::{ApiResponse, Meta},
    routes::{
        addresses, admin, auth, cart, checkout, health, orders, params,
        products as product_routes, stores, webhook,
    },
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
        auth::login,
        auth::register,
        cart::cart_list,
        cart::add_to_cart,
        cart::set_quantity,
        cart::remove_from_cart,
        cart::clear_cart,
        checkout::checkout,
        webhook::payment_webhook,
        product_routes::list_products,
        product_routes::create_product,
        product_routes::get_product,
        product_routes::update_product,
        product_routes::delete_product,
        product_routes::list_reviews,
        product_routes::create_review,
        orders::list_orders,
        orders::get_order,
        orders::update_status,
        orders::cancel_order,
        stores::create_store,
        stores::my_store,
        stores::vendor_orders,
        stores::get_store,
        addresses::list_addresses,
        addresses::create_address,
        addresses::delete_address,
        admin::list_all_orders,
        admin::get_order,
        admin::list_stores,
        admin::moderate_store,
        admin::list_low_stock
    ),
    components(
        schemas(
            User,
            Store,
            Product,
            Address,
            CartItem,
            Order,
            OrderItem,
            Review,
            LoginResponse,
            CartItemDto,
            CartView,
            CheckoutResponse,
            OrderList,
            OrderWithItems,
            StoreList,
            ReviewList,
            AddressList,
            products::ProductList,
            params::Pagination,
            params::ProductQuery,
            params::OrderListQuery,
            params::StoreListQuery,
            params::LowStockQuery,
            Meta,
            ApiResponse<Product>,
            ApiResponse<products::ProductList>,
            ApiResponse<CartView>,
            ApiResponse<CheckoutResponse>,
            ApiResponse<OrderWithItems>,
            ApiResponse<OrderList>,
            ApiResponse<StoreList>,
            ApiResponse<ReviewList>,
            ApiResponse<AddressList>
        )
    ),
    security(
        ("bearer_auth" = [])
    ),
    modifiers(&SecurityAddon),
    tags(
        (name = "Health", description = "Health check endpoint"),
        (name = "Auth", description = "Authentication endpoints"),
        (name = "Products", description = "Catalog endpoints"),
        (name = "Reviews", description = "Product review endpoints"),
        (name = "Cart", description = "Cart endpoints"),
        (name = "Checkout", description = "Checkout session endpoints"),
        (name = "Webhook", description = "Payment provider callbacks"),
        (name = "Orders", description = "Order endpoints"),
        (name = "Stores", description = "Store endpoints"),
        (name = "Addresses", description = "Shipping address endpoints"),
        (name = "Admin", description = "Admin endpoints"),
    )
)]
pub struct ApiDoc;

pub fn scalar_docs() -> Scalar<OpenApiSpec> {
    Scalar::with_url("/docs", ApiDoc::openapi())
}
