use chrono::Utc;
use sea_orm::ActiveValue::NotSet;
use sea_orm::sea_query::Expr;
use sea_orm::sea_query::extension::postgres::PgExpr;
use sea_orm::{
    ActiveModelTrait, ColumnTrait, Condition, EntityTrait, PaginatorTrait, QueryFilter,
    QueryOrder, QuerySelect, Set,
};
use uuid::Uuid;

use crate::{
    audit::log_audit,
    dto::products::{CategoryList, CreateProductRequest, ProductList, UpdateProductRequest},
    entity::products::{ActiveModel, Column, Entity as Products, Model as ProductModel},
    error::{AppError, AppResult},
    events::ChangeAction,
    middleware::auth::AuthUser,
    models::Product,
    response::{ApiResponse, Meta},
    routes::params::{ProductQuery, ProductSortBy, SortOrder},
    state::AppState,
};

const NAME_MAX: usize = 100;
const CATEGORY_MAX: usize = 50;

/// Trim and bound the product name. Rejected before any write is attempted.
fn validate_name(name: &str) -> Result<String, AppError> {
    let name = name.trim();
    if name.is_empty() {
        return Err(AppError::Validation("name must not be empty".into()));
    }
    if name.chars().count() > NAME_MAX {
        return Err(AppError::Validation(format!(
            "name must be at most {NAME_MAX} characters"
        )));
    }
    Ok(name.to_string())
}

fn validate_price(price: i64) -> Result<i64, AppError> {
    if price <= 0 {
        return Err(AppError::Validation("price must be greater than 0".into()));
    }
    Ok(price)
}

/// Empty categories collapse to NULL so the facet list stays clean.
fn validate_category(category: Option<String>) -> Result<Option<String>, AppError> {
    match category {
        None => Ok(None),
        Some(raw) => {
            let trimmed = raw.trim();
            if trimmed.is_empty() {
                return Ok(None);
            }
            if trimmed.chars().count() > CATEGORY_MAX {
                return Err(AppError::Validation(format!(
                    "category must be at most {CATEGORY_MAX} characters"
                )));
            }
            Ok(Some(trimmed.to_string()))
        }
    }
}

pub async fn list_products(
    state: &AppState,
    query: ProductQuery,
) -> AppResult<ApiResponse<ProductList>> {
    let (page, per_page, offset) = query.pagination.normalize();
    let mut condition = Condition::all();

    if let Some(search) = query.q.as_ref().filter(|s| !s.is_empty()) {
        let pattern = format!("%{}%", search);
        condition = condition.add(
            Condition::any()
                .add(Expr::col(Column::Name).ilike(pattern.clone()))
                .add(Expr::col(Column::Category).ilike(pattern)),
        );
    }

    if let Some(category) = query.category.as_ref().filter(|c| !c.is_empty()) {
        condition = condition.add(Column::Category.eq(category.clone()));
    }

    if let Some(available) = query.available {
        condition = condition.add(Column::IsAvailable.eq(available));
    }

    let sort_by = query.sort_by.unwrap_or(ProductSortBy::CreatedAt);
    let sort_order = query.sort_order.unwrap_or(SortOrder::Desc);
    let sort_col = match sort_by {
        ProductSortBy::CreatedAt => Column::CreatedAt,
        ProductSortBy::Name => Column::Name,
    };

    let mut finder = Products::find().filter(condition);
    finder = match sort_order {
        SortOrder::Asc => finder.order_by_asc(sort_col),
        SortOrder::Desc => finder.order_by_desc(sort_col),
    };

    let total = finder.clone().count(&state.orm).await? as i64;

    let items = finder
        .limit(per_page as u64)
        .offset(offset as u64)
        .all(&state.orm)
        .await?
        .into_iter()
        .map(product_from_entity)
        .collect();

    let meta = Meta::new(page, per_page, total);
    Ok(ApiResponse::success(
        "Products",
        ProductList { items },
        Some(meta),
    ))
}

pub async fn list_categories(state: &AppState) -> AppResult<ApiResponse<CategoryList>> {
    let categories: Vec<String> = sqlx::query_scalar(
        "SELECT DISTINCT category FROM products WHERE category IS NOT NULL ORDER BY category",
    )
    .fetch_all(&state.pool)
    .await?;

    Ok(ApiResponse::success(
        "Categories",
        CategoryList { categories },
        None,
    ))
}

pub async fn get_product(state: &AppState, id: Uuid) -> AppResult<ApiResponse<Product>> {
    let product = Products::find_by_id(id)
        .one(&state.orm)
        .await?
        .map(product_from_entity);
    let product = match product {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };
    Ok(ApiResponse::success("Product", product, None))
}

pub async fn create_product(
    state: &AppState,
    user: &AuthUser,
    payload: CreateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let name = validate_name(&payload.name)?;
    let price = validate_price(payload.price)?;
    let category = validate_category(payload.category)?;

    let active = ActiveModel {
        id: Set(Uuid::new_v4()),
        name: Set(name),
        price: Set(price),
        category: Set(category),
        is_available: Set(true),
        created_at: NotSet,
    };
    let product = active.insert(&state.orm).await?;

    state
        .events
        .publish("products", ChangeAction::Created, product.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_create",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Product created",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn update_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    payload: UpdateProductRequest,
) -> AppResult<ApiResponse<Product>> {
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    if let Some(name) = payload.name {
        active.name = Set(validate_name(&name)?);
    }
    if let Some(price) = payload.price {
        active.price = Set(validate_price(price)?);
    }
    if let Some(category) = payload.category {
        active.category = Set(validate_category(Some(category))?);
    }
    if let Some(is_available) = payload.is_available {
        active.is_available = Set(is_available);
    }

    let product = active.update(&state.orm).await?;

    state
        .events
        .publish("products", ChangeAction::Updated, product.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_update",
        Some("products"),
        Some(serde_json::json!({ "product_id": product.id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn set_availability(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
    is_available: bool,
) -> AppResult<ApiResponse<Product>> {
    let existing = Products::find_by_id(id).one(&state.orm).await?;
    let existing = match existing {
        Some(p) => p,
        None => return Err(AppError::NotFound),
    };

    let mut active: ActiveModel = existing.into();
    active.is_available = Set(is_available);
    let product = active.update(&state.orm).await?;

    state
        .events
        .publish("products", ChangeAction::Updated, product.id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_availability",
        Some("products"),
        Some(serde_json::json!({ "product_id": id, "is_available": is_available })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Availability updated",
        product_from_entity(product),
        Some(Meta::empty()),
    ))
}

pub async fn delete_product(
    state: &AppState,
    user: &AuthUser,
    id: Uuid,
) -> AppResult<ApiResponse<serde_json::Value>> {
    let result = Products::delete_by_id(id).exec(&state.orm).await?;

    if result.rows_affected == 0 {
        return Err(AppError::NotFound);
    }

    state.events.publish("products", ChangeAction::Deleted, id);

    if let Err(err) = log_audit(
        &state.pool,
        Some(user.user_id),
        "product_delete",
        Some("products"),
        Some(serde_json::json!({ "product_id": id })),
    )
    .await
    {
        tracing::warn!(error = %err, "audit log failed");
    }

    Ok(ApiResponse::success(
        "Deleted",
        serde_json::json!({}),
        Some(Meta::empty()),
    ))
}

pub fn product_from_entity(model: ProductModel) -> Product {
    Product {
        id: model.id,
        name: model.name,
        price: model.price,
        category: model.category,
        is_available: model.is_available,
        created_at: model.created_at.with_timezone(&Utc),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn name_is_trimmed_and_bounded() {
        assert_eq!(validate_name("  Mie Ayam  ").unwrap(), "Mie Ayam");
        assert!(validate_name("   ").is_err());
        assert!(validate_name(&"x".repeat(101)).is_err());
        assert!(validate_name(&"x".repeat(100)).is_ok());
    }

    #[test]
    fn price_must_be_positive() {
        assert!(validate_price(0).is_err());
        assert!(validate_price(-500).is_err());
        assert_eq!(validate_price(15000).unwrap(), 15000);
    }

    #[test]
    fn blank_category_collapses_to_none() {
        assert_eq!(validate_category(None).unwrap(), None);
        assert_eq!(validate_category(Some("  ".into())).unwrap(), None);
        assert_eq!(
            validate_category(Some(" Minuman ".into())).unwrap(),
            Some("Minuman".into())
        );
        assert!(validate_category(Some("x".repeat(51))).is_err());
    }
}
