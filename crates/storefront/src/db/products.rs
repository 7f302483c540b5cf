//! Catalog queries for [`PgStore`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{Postgres, QueryBuilder};

use amyfairy_core::ProductId;

use super::{PgStore, ProductRepository, RepositoryError};
use crate::models::page::offset;
use crate::models::{Page, Product, ProductDraft, ProductPatch, ProductQuery, ProductSort};

/// Product columns, selected from `products p`.
macro_rules! product_columns {
    () => {
        "p.id, p.title, p.description, p.price, p.discount_percentage, p.rating, \
         p.stock, p.brand, p.category, p.colors, p.sizes, p.thumbnail, p.images, \
         p.deleted, p.created_at, p.updated_at"
    };
}
pub(super) use product_columns;

/// Discounted price as a SQL expression, matching `apply_discount`.
const DISCOUNTED_PRICE_SQL: &str = "ROUND(p.price * (100 - p.discount_percentage) / 100, 2)";

#[derive(Debug, sqlx::FromRow)]
pub(super) struct ProductRow {
    id: ProductId,
    title: String,
    description: String,
    price: Decimal,
    discount_percentage: Decimal,
    rating: Decimal,
    stock: i32,
    brand: String,
    category: String,
    colors: Vec<String>,
    sizes: Vec<String>,
    thumbnail: String,
    images: Vec<String>,
    deleted: bool,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Self {
            id: row.id,
            title: row.title,
            description: row.description,
            price: row.price,
            discount_percentage: row.discount_percentage,
            rating: row.rating,
            stock: row.stock,
            brand: row.brand,
            category: row.category,
            colors: row.colors,
            sizes: row.sizes,
            thumbnail: row.thumbnail,
            images: row.images,
            deleted: row.deleted,
            created_at: row.created_at,
            updated_at: row.updated_at,
        }
    }
}

/// Escape `LIKE` wildcards in user input.
fn escape_like(input: &str) -> String {
    let mut escaped = String::with_capacity(input.len());
    for c in input.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped
}

fn push_filters(qb: &mut QueryBuilder<'_, Postgres>, query: &ProductQuery) {
    qb.push(" WHERE TRUE");
    if !query.include_deleted {
        qb.push(" AND NOT p.deleted");
    }
    if !query.categories.is_empty() {
        qb.push(" AND p.category = ANY(")
            .push_bind(query.categories.clone())
            .push(")");
    }
    if !query.brands.is_empty() {
        qb.push(" AND p.brand = ANY(")
            .push_bind(query.brands.clone())
            .push(")");
    }
    if let Some(search) = &query.search {
        qb.push(" AND p.title ILIKE ")
            .push_bind(format!("%{}%", escape_like(search)));
    }
    if query.in_stock_only {
        qb.push(" AND p.stock > 0");
    }
}

const fn sort_column(sort: ProductSort) -> &'static str {
    match sort {
        ProductSort::Price => DISCOUNTED_PRICE_SQL,
        ProductSort::Rating => "p.rating",
        ProductSort::Title => "p.title",
        ProductSort::CreatedAt => "p.created_at",
    }
}

#[async_trait]
impl ProductRepository for PgStore {
    async fn get_product(&self, id: ProductId) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products p WHERE p.id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    async fn list_products(&self, query: &ProductQuery) -> Result<Page<Product>, RepositoryError> {
        let mut count = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_filters(&mut count, query);
        let total: i64 = count.build_query_scalar().fetch_one(&self.pool).await?;

        let mut list = QueryBuilder::<Postgres>::new(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products p"
        ));
        push_filters(&mut list, query);
        list.push(" ORDER BY ")
            .push(sort_column(query.sort))
            .push(" ")
            .push(query.order.as_sql())
            .push(", p.id ")
            .push(query.order.as_sql())
            .push(" LIMIT ")
            .push_bind(i64::from(query.per_page))
            .push(" OFFSET ")
            .push_bind(i64::try_from(offset(query.page, query.per_page)).unwrap_or(i64::MAX));

        let rows: Vec<ProductRow> = list.build_query_as().fetch_all(&self.pool).await?;

        Ok(Page {
            items: rows.into_iter().map(Product::from).collect(),
            total: u64::try_from(total).unwrap_or_default(),
            page: query.page,
            per_page: query.per_page,
        })
    }

    async fn brands(&self) -> Result<Vec<String>, RepositoryError> {
        let brands = sqlx::query_scalar(
            "SELECT DISTINCT brand FROM products WHERE NOT deleted ORDER BY brand",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(brands)
    }

    async fn categories(&self) -> Result<Vec<String>, RepositoryError> {
        let categories = sqlx::query_scalar(
            "SELECT DISTINCT category FROM products WHERE NOT deleted ORDER BY category",
        )
        .fetch_all(&self.pool)
        .await?;
        Ok(categories)
    }

    async fn create_product(&self, draft: &ProductDraft) -> Result<Product, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(concat!(
            "INSERT INTO products AS p (title, description, price, discount_percentage, rating, \
             stock, brand, category, colors, sizes, thumbnail, images) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12) \
             RETURNING ",
            product_columns!()
        ))
        .bind(&draft.title)
        .bind(&draft.description)
        .bind(draft.price)
        .bind(draft.discount_percentage)
        .bind(draft.rating)
        .bind(draft.stock)
        .bind(&draft.brand)
        .bind(&draft.category)
        .bind(&draft.colors)
        .bind(&draft.sizes)
        .bind(&draft.thumbnail)
        .bind(&draft.images)
        .fetch_one(&self.pool)
        .await?;

        Ok(row.into())
    }

    async fn update_product(
        &self,
        id: ProductId,
        patch: &ProductPatch,
    ) -> Result<Product, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let current = sqlx::query_as::<_, ProductRow>(concat!(
            "SELECT ",
            product_columns!(),
            " FROM products p WHERE p.id = $1 FOR UPDATE"
        ))
        .bind(id)
        .fetch_optional(&mut *tx)
        .await?
        .ok_or(RepositoryError::NotFound)?;

        let mut product = Product::from(current);
        patch.apply_to(&mut product);

        let row = sqlx::query_as::<_, ProductRow>(concat!(
            "UPDATE products AS p SET title = $2, description = $3, price = $4, \
             discount_percentage = $5, rating = $6, stock = $7, brand = $8, category = $9, \
             colors = $10, sizes = $11, thumbnail = $12, images = $13, updated_at = now() \
             WHERE p.id = $1 RETURNING ",
            product_columns!()
        ))
        .bind(id)
        .bind(&product.title)
        .bind(&product.description)
        .bind(product.price)
        .bind(product.discount_percentage)
        .bind(product.rating)
        .bind(product.stock)
        .bind(&product.brand)
        .bind(&product.category)
        .bind(&product.colors)
        .bind(&product.sizes)
        .bind(&product.thumbnail)
        .bind(&product.images)
        .fetch_one(&mut *tx)
        .await?;

        tx.commit().await?;
        Ok(row.into())
    }

    async fn soft_delete_product(&self, id: ProductId) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE products SET deleted = TRUE, updated_at = now() WHERE id = $1",
        )
        .bind(id)
        .execute(&self.pool)
        .await?;
        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_escape_like() {
        assert_eq!(escape_like("50%_off\\"), "50\\%\\_off\\\\");
        assert_eq!(escape_like("scarf"), "scarf");
    }

    #[test]
    fn test_filters_sql() {
        let query = ProductQuery {
            categories: vec!["tops".to_owned()],
            search: Some("silk".to_owned()),
            in_stock_only: true,
            ..ProductQuery::default()
        };
        let mut qb = QueryBuilder::<Postgres>::new("SELECT COUNT(*) FROM products p");
        push_filters(&mut qb, &query);
        assert_eq!(
            qb.sql(),
            "SELECT COUNT(*) FROM products p WHERE TRUE AND NOT p.deleted \
             AND p.category = ANY($1) AND p.title ILIKE $2 AND p.stock > 0"
        );
    }
}
