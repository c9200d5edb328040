// Server-rendered pages (Askama templates)
// Buyer and seller pages share the session cookie with the JSON API

mod assets;
mod flash;
mod templates;

use askama::Template;
use axum::{
    extract::{DefaultBodyLimit, Multipart, Path, Query, State},
    http::StatusCode,
    middleware,
    response::{Html, IntoResponse, Redirect, Response},
    routing::{get, post},
    Form, Router,
};
use axum_extra::extract::CookieJar;
use serde::Deserialize;
use std::sync::Arc;
use tracing::{error, info};
use uuid::Uuid;

use crate::api::{
    self,
    auth::{authenticate, register_user, start_session},
    products::{create_listing, delete_listing, update_listing},
    rate_limit,
    uploads::{read_multipart, MultipartForm},
    validation::{parse_browse_query, validate_quantity},
};
use crate::auth::{clear_session_cookie, home_for, Buyer, MaybeSession, Seller, SessionUser};
use crate::db::{
    self, AddToCartRequest, BrowseQuery, CartSummary, CheckoutRequest, LoginRequest, PriceField,
    ProductFilter, ProductRequest, RegisterRequest,
};
use crate::error::{ApiError, ErrorCode};
use crate::storage::{delete_images, store_images};
use crate::AppState;

pub use assets::serve_static;
pub use flash::{set_flash, take_flash, Flash};
pub use templates::*;

const HOME_LISTINGS: i64 = 8;

// Helper to render templates and handle errors
fn render_template<T: Template>(template: T) -> Response {
    render_with_status(StatusCode::OK, template)
}

fn render_with_status<T: Template>(status: StatusCode, template: T) -> Response {
    match template.render() {
        Ok(html) => (status, Html(html)).into_response(),
        Err(e) => {
            error!(error = %e, "Template render failed");
            (StatusCode::INTERNAL_SERVER_ERROR, "Template error").into_response()
        }
    }
}

/// A failed page request, rendered as the error page
#[derive(Debug)]
pub struct PageError(ApiError);

impl From<ApiError> for PageError {
    fn from(err: ApiError) -> Self {
        PageError(err)
    }
}

impl IntoResponse for PageError {
    fn into_response(self) -> Response {
        let status = self.0.status();
        if status.is_server_error() {
            error!(code = self.0.code().as_str(), message = %self.0.message(), "Page request failed");
        }
        render_with_status(
            status,
            ErrorTemplate {
                nav: Nav::default(),
                status: status.as_u16(),
                message: self.0.message().to_string(),
            },
        )
    }
}

type PageResult = Result<Response, PageError>;

/// Header state for the current user. The cart badge is best effort.
async fn build_nav(state: &AppState, session: Option<&SessionUser>, flash: Option<Flash>) -> Nav {
    let cart_count = match session {
        Some(s) if s.is_buyer() => db::cart::count(&state.db, s.user_id).await.unwrap_or(0),
        _ => 0,
    };
    Nav::new(session, cart_count, flash)
}

/// Consume the pending flash and build the header in one step
async fn page_nav(
    state: &AppState,
    session: Option<&SessionUser>,
    jar: CookieJar,
) -> (CookieJar, Nav) {
    let (jar, flash) = take_flash(jar);
    (jar, build_nav(state, session, flash).await)
}

fn redirect_with(jar: CookieJar, flash: Flash, to: &str) -> Response {
    (set_flash(jar, flash), Redirect::to(to)).into_response()
}

/// Field messages for a form, or the page error for failures a form can't show
fn form_errors(err: ApiError) -> Result<Vec<String>, PageError> {
    if err.status().is_server_error() {
        return Err(err.into());
    }
    match err.field_errors() {
        Some(fields) => {
            let mut keys: Vec<_> = fields.keys().collect();
            keys.sort();
            Ok(keys
                .into_iter()
                .flat_map(|k| fields[k].iter().cloned())
                .collect())
        }
        None => Ok(vec![err.message().to_string()]),
    }
}

pub fn create_router(state: Arc<AppState>) -> Router<Arc<AppState>> {
    let auth_limit = middleware::from_fn_with_state(state.clone(), rate_limit::rate_limit_auth);

    let buyer = Router::new()
        .route("/browse", get(browse))
        .route("/products/:id", get(product_detail))
        .route("/cart", get(cart_page).post(cart_add))
        .route("/cart/:id", post(cart_update))
        .route("/cart/:id/remove", post(cart_remove))
        .route("/checkout", get(checkout_page).post(checkout_submit))
        .route("/orders", get(orders_page))
        .route("/orders/:id", get(order_detail))
        .route("/orders/:id/cancel", post(order_cancel));

    let body_limit = DefaultBodyLimit::max(api::upload_body_limit(&state));
    let seller = Router::new()
        .route("/dashboard", get(seller_dashboard))
        .route("/products/new", get(product_new))
        .route("/products", post(product_create).layer(body_limit.clone()))
        .route("/products/:id/edit", get(product_edit))
        .route("/products/:id", post(product_save).layer(body_limit))
        .route("/products/:id/delete", post(product_delete))
        .route("/products/:id/toggle", post(product_toggle))
        .route("/sales", get(sales_page));

    Router::new()
        .route("/", get(home))
        .route(
            "/login",
            get(login_page).merge(post(login_submit).layer(auth_limit.clone())),
        )
        .route(
            "/register",
            get(register_page).merge(post(register_submit).layer(auth_limit)),
        )
        .route("/logout", post(logout))
        .nest("/buyer", buyer)
        .nest("/seller", seller)
}

// ---------------------------------------------------------------------------
// Public pages
// ---------------------------------------------------------------------------

async fn home(
    State(state): State<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
) -> PageResult {
    let products = db::products::latest(&state.db, HOME_LISTINGS).await?;
    let (jar, nav) = page_nav(&state, session.as_ref(), jar).await;
    Ok((
        jar,
        render_template(HomeTemplate {
            nav,
            products: products.iter().map(ProductCard::from).collect(),
        }),
    )
        .into_response())
}

async fn login_page(
    State(state): State<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
) -> Response {
    if let Some(session) = session {
        return Redirect::to(session.home()).into_response();
    }
    let (jar, nav) = page_nav(&state, None, jar).await;
    (
        jar,
        render_template(LoginTemplate {
            nav,
            email: String::new(),
            error: None,
        }),
    )
        .into_response()
}

async fn login_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(req): Form<LoginRequest>,
) -> PageResult {
    match authenticate(&state, &req).await {
        Ok(user) => {
            let jar = start_session(&state, jar, &user)?;
            let home = user.role().map(home_for).unwrap_or("/");
            info!(user_id = %user.id, "Signed in");
            Ok(redirect_with(
                jar,
                Flash::success(format!("Welcome back, {}", user.name)),
                home,
            ))
        }
        Err(err) if err.code() == ErrorCode::Unauthorized => {
            let nav = build_nav(&state, None, None).await;
            Ok(render_with_status(
                StatusCode::UNAUTHORIZED,
                LoginTemplate {
                    nav,
                    email: req.email,
                    error: Some(err.message().to_string()),
                },
            ))
        }
        Err(err) => Err(err.into()),
    }
}

async fn register_page(
    State(state): State<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
    jar: CookieJar,
) -> Response {
    if let Some(session) = session {
        return Redirect::to(session.home()).into_response();
    }
    let (jar, nav) = page_nav(&state, None, jar).await;
    (
        jar,
        render_template(RegisterTemplate {
            nav,
            name: String::new(),
            email: String::new(),
            phone: String::new(),
            user_type: "buyer".to_string(),
            errors: Vec::new(),
        }),
    )
        .into_response()
}

async fn register_submit(
    State(state): State<Arc<AppState>>,
    jar: CookieJar,
    Form(req): Form<RegisterRequest>,
) -> PageResult {
    match register_user(&state, &req).await {
        Ok(user) => {
            let jar = start_session(&state, jar, &user)?;
            let home = user.role().map(home_for).unwrap_or("/");
            Ok(redirect_with(
                jar,
                Flash::success("Your account is ready"),
                home,
            ))
        }
        Err(err) => {
            let status = err.status();
            let errors = form_errors(err)?;
            let nav = build_nav(&state, None, None).await;
            Ok(render_with_status(
                status,
                RegisterTemplate {
                    nav,
                    name: req.name,
                    email: req.email,
                    phone: req.phone,
                    user_type: req.user_type,
                    errors,
                },
            ))
        }
    }
}

async fn logout(jar: CookieJar) -> Response {
    let jar = jar.add(clear_session_cookie());
    redirect_with(jar, Flash::success("You have been signed out"), "/")
}

// ---------------------------------------------------------------------------
// Catalogue
// ---------------------------------------------------------------------------

/// Browse URL for another page, keeping the current filters
fn page_url(query: &BrowseQuery, page: u32) -> String {
    let params = [
        ("search", &query.search),
        ("category", &query.category),
        ("product_type", &query.product_type),
        ("condition", &query.condition),
        ("min_price", &query.min_price),
        ("max_price", &query.max_price),
        ("location", &query.location),
        ("sort", &query.sort),
        ("per_page", &query.per_page),
    ];

    let mut parts: Vec<String> = params
        .iter()
        .filter_map(|(key, value)| {
            let value = value.as_deref()?.trim();
            (!value.is_empty()).then(|| format!("{}={}", key, urlencoding::encode(value)))
        })
        .collect();
    parts.push(format!("page={}", page));
    format!("/buyer/browse?{}", parts.join("&"))
}

async fn browse(
    State(state): State<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
    Query(query): Query<BrowseQuery>,
    jar: CookieJar,
) -> PageResult {
    let (filter, errors) = match parse_browse_query(&query) {
        Ok(filter) => (filter, Vec::new()),
        Err(err) => (ProductFilter::default(), form_errors(err)?),
    };
    let page = db::products::browse(&state.db, &filter).await?;
    let (jar, nav) = page_nav(&state, session.as_ref(), jar).await;

    let sort = filter.sort.as_str();
    let template = BrowseTemplate {
        nav,
        products: page.items.iter().map(ProductCard::from).collect(),
        filters: FilterView::from(&filter),
        categories: Choice::categories(filter.category.map(|c| c.as_str()).unwrap_or_default()),
        product_types: Choice::product_types(
            filter.product_type.map(|t| t.as_str()).unwrap_or_default(),
        ),
        conditions: Choice::conditions(filter.condition.map(|c| c.as_str()).unwrap_or_default()),
        sort_orders: Choice::sort_orders(sort),
        total: page.total,
        page: page.page,
        total_pages: page.total_pages,
        prev_url: page.has_previous().then(|| page_url(&query, page.page - 1)),
        next_url: page.has_next().then(|| page_url(&query, page.page + 1)),
        errors,
    };
    Ok((jar, render_template(template)).into_response())
}

async fn product_detail(
    State(state): State<Arc<AppState>>,
    MaybeSession(session): MaybeSession,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> PageResult {
    let found = db::products::find_by_id(&state.db, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let is_owner = session
        .as_ref()
        .is_some_and(|s| s.user_id == found.product.seller_id);
    if !found.product.is_active && !is_owner {
        return Err(ApiError::not_found("Product not found").into());
    }
    let can_buy = found.product.is_active && session.as_ref().is_some_and(SessionUser::is_buyer);

    let (jar, nav) = page_nav(&state, session.as_ref(), jar).await;
    Ok((
        jar,
        render_template(ProductTemplate {
            nav,
            product: ProductView::new(&found.product, &found.seller_name),
            can_buy,
            is_owner,
        }),
    )
        .into_response())
}

// ---------------------------------------------------------------------------
// Buyer: cart, checkout and orders
// ---------------------------------------------------------------------------

#[derive(Debug, Deserialize)]
struct AddToCartForm {
    product_id: Uuid,
    #[serde(default)]
    quantity: String,
}

#[derive(Debug, Deserialize)]
struct QuantityForm {
    quantity: String,
}

fn parse_quantity(raw: &str) -> Result<i32, String> {
    let quantity: i32 = raw
        .trim()
        .parse()
        .map_err(|_| "Quantity must be a whole number".to_string())?;
    validate_quantity(quantity)?;
    Ok(quantity)
}

async fn cart_add(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    jar: CookieJar,
    Form(form): Form<AddToCartForm>,
) -> Response {
    let back = format!("/buyer/products/{}", form.product_id);
    let quantity = if form.quantity.trim().is_empty() {
        Ok(1)
    } else {
        parse_quantity(&form.quantity)
    };
    let quantity = match quantity {
        Ok(q) => q,
        Err(message) => return redirect_with(jar, Flash::error(message), &back),
    };

    let req = AddToCartRequest {
        product_id: form.product_id,
        quantity: Some(quantity),
    };
    match api::add_item(&state, buyer.user_id, &req).await {
        Ok(_) => redirect_with(jar, Flash::success("Added to your cart"), &back),
        Err(err) => redirect_with(jar, Flash::error(err.message()), &back),
    }
}

async fn cart_page(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    jar: CookieJar,
) -> PageResult {
    let cart = CartSummary::from_lines(db::cart::list(&state.db, buyer.user_id).await?);
    let (jar, nav) = page_nav(&state, Some(&buyer), jar).await;
    Ok((
        jar,
        render_template(CartTemplate {
            nav,
            lines: cart.lines.iter().map(CartLineView::from).collect(),
            item_count: cart.item_count,
            total: cart.total_display,
            can_checkout: cart.can_checkout,
        }),
    )
        .into_response())
}

async fn cart_update(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Path(id): Path<Uuid>,
    jar: CookieJar,
    Form(form): Form<QuantityForm>,
) -> Response {
    let quantity = match parse_quantity(&form.quantity) {
        Ok(q) => q,
        Err(message) => return redirect_with(jar, Flash::error(message), "/buyer/cart"),
    };
    match db::cart::update_quantity(&state.db, buyer.user_id, id, quantity).await {
        Ok(_) => redirect_with(jar, Flash::success("Cart updated"), "/buyer/cart"),
        Err(err) => redirect_with(jar, Flash::error(err.message()), "/buyer/cart"),
    }
}

async fn cart_remove(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> Response {
    match db::cart::remove(&state.db, buyer.user_id, id).await {
        Ok(()) => redirect_with(jar, Flash::success("Item removed"), "/buyer/cart"),
        Err(err) => redirect_with(jar, Flash::error(err.message()), "/buyer/cart"),
    }
}

async fn render_checkout(
    state: &AppState,
    buyer: &SessionUser,
    jar: CookieJar,
    status: StatusCode,
    req: CheckoutRequest,
    errors: Vec<String>,
) -> PageResult {
    let cart = CartSummary::from_lines(db::cart::list(&state.db, buyer.user_id).await?);
    if cart.lines.is_empty() {
        return Ok(redirect_with(
            jar,
            Flash::error("Your cart is empty"),
            "/buyer/cart",
        ));
    }
    let (jar, nav) = page_nav(state, Some(buyer), jar).await;
    let page = render_with_status(
        status,
        CheckoutTemplate {
            nav,
            lines: cart.lines.iter().map(CartLineView::from).collect(),
            total: cart.total_display,
            total_cents: cart.total,
            shipping_address: req.shipping_address,
            contact_phone: req.contact_phone,
            errors,
        },
    );
    Ok((jar, page).into_response())
}

async fn checkout_page(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    jar: CookieJar,
) -> PageResult {
    let phone = db::users::find_by_id(&state.db, buyer.user_id)
        .await?
        .map(|u| u.phone)
        .unwrap_or_default();
    let req = CheckoutRequest {
        shipping_address: String::new(),
        contact_phone: phone,
        expected_total: None,
    };
    render_checkout(&state, &buyer, jar, StatusCode::OK, req, Vec::new()).await
}

async fn checkout_submit(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    jar: CookieJar,
    Form(req): Form<CheckoutRequest>,
) -> PageResult {
    match api::checkout_cart(&state, buyer.user_id, &req).await {
        Ok(order) => Ok(redirect_with(
            jar,
            Flash::success("Order placed. Sellers will contact you to arrange payment."),
            &format!("/buyer/orders/{}", order.id),
        )),
        Err(err) if err.code() == ErrorCode::ValidationError => {
            let status = err.status();
            let errors = form_errors(err)?;
            render_checkout(&state, &buyer, jar, status, req, errors).await
        }
        Err(err) if err.status().is_client_error() => Ok(redirect_with(
            jar,
            Flash::error(err.message()),
            "/buyer/cart",
        )),
        Err(err) => Err(err.into()),
    }
}

async fn orders_page(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    jar: CookieJar,
) -> PageResult {
    let orders = db::orders::list_for_buyer(&state.db, buyer.user_id).await?;
    let (jar, nav) = page_nav(&state, Some(&buyer), jar).await;
    Ok((
        jar,
        render_template(OrdersTemplate {
            nav,
            orders: orders.iter().map(OrderRow::from).collect(),
        }),
    )
        .into_response())
}

async fn order_detail(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> PageResult {
    let detail = db::orders::find_for_buyer(&state.db, buyer.user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Order not found"))?;

    let item_count = detail.items.iter().map(|i| i.quantity as i64).sum();
    let (jar, nav) = page_nav(&state, Some(&buyer), jar).await;
    Ok((
        jar,
        render_template(OrderDetailTemplate {
            nav,
            order: OrderRow::new(&detail.order, item_count),
            items: detail.items.iter().map(OrderItemRow::from).collect(),
            shipping_address: detail.order.shipping_address.clone(),
            contact_phone: detail.order.contact_phone.clone(),
            can_cancel: detail.order.is_cancellable(),
        }),
    )
        .into_response())
}

async fn order_cancel(
    State(state): State<Arc<AppState>>,
    Buyer(buyer): Buyer,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> Response {
    let back = format!("/buyer/orders/{}", id);
    match db::orders::cancel(&state.db, buyer.user_id, id).await {
        Ok(order) => {
            info!(order_id = %order.id, buyer_id = %buyer.user_id, "Order cancelled");
            redirect_with(jar, Flash::success("Order cancelled"), &back)
        }
        Err(err) => redirect_with(jar, Flash::error(err.message()), &back),
    }
}

// ---------------------------------------------------------------------------
// Seller pages
// ---------------------------------------------------------------------------

async fn seller_dashboard(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    jar: CookieJar,
) -> PageResult {
    let stats = db::products::seller_stats(&state.db, seller.user_id).await?;
    let products = db::products::list_by_seller(&state.db, seller.user_id).await?;
    let (jar, nav) = page_nav(&state, Some(&seller), jar).await;
    Ok((
        jar,
        render_template(SellerDashboardTemplate {
            nav,
            stats: StatsView::from(&stats),
            products: products.iter().map(SellerProductRow::from).collect(),
        }),
    )
        .into_response())
}

/// Listing form page, either blank or re-rendered with errors
struct ListingForm {
    product_id: Option<Uuid>,
    values: ProductFormValues,
    existing_images: Vec<String>,
    errors: Vec<String>,
}

async fn render_listing_form(
    state: &AppState,
    seller: &SessionUser,
    jar: CookieJar,
    status: StatusCode,
    form: ListingForm,
) -> Response {
    let (jar, nav) = page_nav(state, Some(seller), jar).await;
    let (title, action) = match form.product_id {
        Some(id) => ("Edit listing".to_string(), format!("/seller/products/{}", id)),
        None => ("New listing".to_string(), "/seller/products".to_string()),
    };
    let product_type = if form.values.product_type.is_empty() {
        "sell"
    } else {
        form.values.product_type.as_str()
    };
    let template = ProductFormTemplate {
        nav,
        title,
        action,
        is_edit: form.product_id.is_some(),
        categories: Choice::categories(&form.values.category),
        product_types: Choice::product_types(product_type),
        conditions: Choice::conditions(&form.values.condition),
        form: form.values,
        existing_images: form.existing_images,
        max_images: state.config.storage.max_images,
        errors: form.errors,
    };
    (jar, render_with_status(status, template)).into_response()
}

fn form_values(form: &MultipartForm) -> ProductFormValues {
    ProductFormValues {
        name: form.text("name"),
        description: form.text("description"),
        category: form.text("category"),
        product_type: form.text("product_type"),
        condition: form.text("condition"),
        price: form.text("price"),
        location: form.text("location"),
        contact_number: form.text("contact_number"),
    }
}

fn listing_request(form: &MultipartForm, images: Vec<String>) -> ProductRequest {
    ProductRequest {
        name: form.text("name"),
        description: form.text("description"),
        category: form.text("category"),
        product_type: form.text("product_type"),
        condition: form.text("condition"),
        price: PriceField::Text(form.text("price")),
        images,
        location: form.text("location"),
        contact_number: form.text("contact_number"),
    }
}

async fn product_new(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    jar: CookieJar,
) -> Response {
    let contact_number = db::users::find_by_id(&state.db, seller.user_id)
        .await
        .ok()
        .flatten()
        .map(|u| u.phone)
        .unwrap_or_default();
    let form = ListingForm {
        product_id: None,
        values: ProductFormValues {
            contact_number,
            ..Default::default()
        },
        existing_images: Vec::new(),
        errors: Vec::new(),
    };
    render_listing_form(&state, &seller, jar, StatusCode::OK, form).await
}

async fn product_create(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    jar: CookieJar,
    multipart: Multipart,
) -> PageResult {
    let mut form = read_multipart(multipart).await?;
    let files = std::mem::take(&mut form.files);

    let result = match store_images(
        state.images.as_ref(),
        seller.user_id,
        files,
        &state.config.storage,
    )
    .await
    {
        Ok(urls) => {
            let req = listing_request(&form, urls.clone());
            let created = create_listing(&state, seller.user_id, &req).await;
            if created.is_err() {
                delete_images(state.images.as_ref(), seller.user_id, &urls).await;
            }
            created
        }
        Err(err) => Err(err.into()),
    };

    match result {
        Ok(_) => {
            Ok(redirect_with(
                jar,
                Flash::success("Your listing is live"),
                "/seller/dashboard",
            ))
        }
        Err(err) => {
            let status = err.status();
            let form = ListingForm {
                product_id: None,
                values: form_values(&form),
                existing_images: Vec::new(),
                errors: form_errors(err)?,
            };
            Ok(render_listing_form(&state, &seller, jar, status, form).await)
        }
    }
}

async fn product_edit(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> PageResult {
    let product = db::products::find_owned(&state.db, seller.user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;
    let form = ListingForm {
        product_id: Some(product.id),
        values: ProductFormValues::from(&product),
        existing_images: product.images,
        errors: Vec::new(),
    };
    Ok(render_listing_form(&state, &seller, jar, StatusCode::OK, form).await)
}

async fn product_save(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
    jar: CookieJar,
    multipart: Multipart,
) -> PageResult {
    let existing = db::products::find_owned(&state.db, seller.user_id, id)
        .await?
        .ok_or_else(|| ApiError::not_found("Product not found"))?;

    let mut form = read_multipart(multipart).await?;
    let files = std::mem::take(&mut form.files);

    // No new files keeps the current photos
    let result = if files.is_empty() {
        update_listing(
            &state,
            seller.user_id,
            id,
            &listing_request(&form, existing.images.clone()),
        )
        .await
    } else {
        match store_images(
            state.images.as_ref(),
            seller.user_id,
            files,
            &state.config.storage,
        )
        .await
        {
            Ok(urls) => {
                let req = listing_request(&form, urls.clone());
                let updated = update_listing(&state, seller.user_id, id, &req).await;
                if updated.is_err() {
                    delete_images(state.images.as_ref(), seller.user_id, &urls).await;
                }
                updated
            }
            Err(err) => Err(err.into()),
        }
    };

    match result {
        Ok(_) => Ok(redirect_with(
            jar,
            Flash::success("Listing updated"),
            "/seller/dashboard",
        )),
        Err(err) => {
            let status = err.status();
            let form = ListingForm {
                product_id: Some(id),
                values: form_values(&form),
                existing_images: existing.images,
                errors: form_errors(err)?,
            };
            Ok(render_listing_form(&state, &seller, jar, status, form).await)
        }
    }
}

async fn product_delete(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> Response {
    match delete_listing(&state, seller.user_id, id).await {
        Ok(product) => redirect_with(
            jar,
            Flash::success(format!("Deleted \"{}\"", product.name)),
            "/seller/dashboard",
        ),
        Err(err) => redirect_with(jar, Flash::error(err.message()), "/seller/dashboard"),
    }
}

async fn product_toggle(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    Path(id): Path<Uuid>,
    jar: CookieJar,
) -> Response {
    let toggled = match db::products::find_owned(&state.db, seller.user_id, id).await {
        Ok(Some(product)) => {
            db::products::set_active(&state.db, seller.user_id, id, !product.is_active).await
        }
        Ok(None) => Err(ApiError::not_found("Product not found")),
        Err(err) => Err(err),
    };

    match toggled {
        Ok(product) => {
            let message = if product.is_active {
                "Listing is visible again"
            } else {
                "Listing hidden from buyers"
            };
            redirect_with(jar, Flash::success(message), "/seller/dashboard")
        }
        Err(err) => redirect_with(jar, Flash::error(err.message()), "/seller/dashboard"),
    }
}

async fn sales_page(
    State(state): State<Arc<AppState>>,
    Seller(seller): Seller,
    jar: CookieJar,
) -> PageResult {
    let sales = db::orders::list_sales(&state.db, seller.user_id).await?;
    let (jar, nav) = page_nav(&state, Some(&seller), jar).await;
    Ok((
        jar,
        render_template(SalesTemplate {
            nav,
            sales: sales.iter().map(SaleRow::from).collect(),
        }),
    )
        .into_response())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_page_url_keeps_filters() {
        let query = BrowseQuery {
            search: Some("oak table".to_string()),
            category: Some("furniture".to_string()),
            min_price: Some("".to_string()),
            page: Some("2".to_string()),
            ..Default::default()
        };
        assert_eq!(
            page_url(&query, 3),
            "/buyer/browse?search=oak%20table&category=furniture&page=3"
        );
        assert_eq!(page_url(&BrowseQuery::default(), 1), "/buyer/browse?page=1");
    }

    #[test]
    fn test_parse_quantity() {
        assert_eq!(parse_quantity(" 4 "), Ok(4));
        assert!(parse_quantity("0").is_err());
        assert!(parse_quantity("abc").is_err());
        assert!(parse_quantity("1000").is_err());
    }

    #[test]
    fn test_form_errors_flattens_fields() {
        let mut errors = crate::error::ValidationErrorBuilder::new();
        errors.add("price", "Price must be greater than zero");
        errors.add("name", "Name is required");
        let err = errors.build().unwrap();
        assert_eq!(
            form_errors(err).unwrap(),
            vec![
                "Name is required".to_string(),
                "Price must be greater than zero".to_string()
            ]
        );

        let plain = form_errors(ApiError::conflict("Gone")).unwrap();
        assert_eq!(plain, vec!["Gone".to_string()]);

        assert!(form_errors(ApiError::internal("boom")).is_err());
    }

    #[test]
    fn test_listing_request_from_form() {
        let mut form = MultipartForm::default();
        form.fields.insert("name".to_string(), "Desk lamp".to_string());
        form.fields.insert("price".to_string(), "12.50".to_string());
        let req = listing_request(&form, vec!["/uploads/products/a.jpg".to_string()]);
        assert_eq!(req.name, "Desk lamp");
        assert_eq!(req.price.as_text(), "12.50");
        assert_eq!(req.images.len(), 1);
        assert_eq!(form_values(&form).price, "12.50");
    }
}
