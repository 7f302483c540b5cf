//! Catalog product types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use amyfairy_core::{ProductId, apply_discount};

use super::page::SortOrder;

/// A catalog product.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Product {
    pub id: ProductId,
    pub title: String,
    pub description: String,
    /// List price before discount.
    pub price: Decimal,
    /// Percentage in `[0, 100]`.
    pub discount_percentage: Decimal,
    pub rating: Decimal,
    pub stock: i32,
    pub brand: String,
    pub category: String,
    /// Selectable colors. Empty means the product has no color variant.
    pub colors: Vec<String>,
    /// Selectable sizes. Empty means the product has no size variant.
    pub sizes: Vec<String>,
    pub thumbnail: String,
    pub images: Vec<String>,
    pub deleted: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Price after discount, rounded to two decimal places.
    #[must_use]
    pub fn discounted_price(&self) -> Decimal {
        apply_discount(self.price, self.discount_percentage)
    }

    /// Whether `quantity` units can be bought right now.
    #[must_use]
    pub fn has_stock_for(&self, quantity: i32) -> bool {
        !self.deleted && quantity >= 1 && quantity <= self.stock
    }

    /// Check a color/size selection against the product's variant sets.
    ///
    /// A non-empty set requires a selection from it; an empty set requires no
    /// selection.
    ///
    /// # Errors
    ///
    /// Returns a human-readable reason when the selection is invalid.
    pub fn check_variant(&self, color: Option<&str>, size: Option<&str>) -> Result<(), String> {
        check_choice("color", &self.colors, color)?;
        check_choice("size", &self.sizes, size)
    }
}

fn check_choice(kind: &str, options: &[String], chosen: Option<&str>) -> Result<(), String> {
    match (options.is_empty(), chosen) {
        (true, None) => Ok(()),
        (true, Some(value)) => Err(format!("product has no {kind} options, got '{value}'")),
        (false, None) => Err(format!("a {kind} must be selected")),
        (false, Some(value)) if options.iter().any(|o| o == value) => Ok(()),
        (false, Some(value)) => Err(format!(
            "'{value}' is not an available {kind} (choose from {})",
            options.join(", ")
        )),
    }
}

/// Fields for a new catalog product.
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct ProductDraft {
    pub title: String,
    #[serde(default)]
    pub description: String,
    pub price: Decimal,
    #[serde(default)]
    pub discount_percentage: Decimal,
    #[serde(default)]
    pub rating: Decimal,
    pub stock: i32,
    pub brand: String,
    pub category: String,
    #[serde(default)]
    pub colors: Vec<String>,
    #[serde(default)]
    pub sizes: Vec<String>,
    #[serde(default)]
    pub thumbnail: String,
    #[serde(default)]
    pub images: Vec<String>,
}

impl ProductDraft {
    /// Validate catalog constraints.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as a message.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            Some(&self.title),
            Some(self.price),
            Some(self.discount_percentage),
            Some(self.stock),
            Some(self.rating),
        )
    }
}

/// Partial update of a product. `None` leaves the field unchanged.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductPatch {
    pub title: Option<String>,
    pub description: Option<String>,
    pub price: Option<Decimal>,
    pub discount_percentage: Option<Decimal>,
    pub rating: Option<Decimal>,
    pub stock: Option<i32>,
    pub brand: Option<String>,
    pub category: Option<String>,
    pub colors: Option<Vec<String>>,
    pub sizes: Option<Vec<String>>,
    pub thumbnail: Option<String>,
    pub images: Option<Vec<String>>,
}

impl ProductPatch {
    /// Validate the fields that are present.
    ///
    /// # Errors
    ///
    /// Returns the first violated constraint as a message.
    pub fn validate(&self) -> Result<(), String> {
        validate_fields(
            self.title.as_deref(),
            self.price,
            self.discount_percentage,
            self.stock,
            self.rating,
        )
    }

    /// Apply the patch to a product in place.
    pub fn apply_to(&self, product: &mut Product) {
        if let Some(title) = &self.title {
            product.title.clone_from(title);
        }
        if let Some(description) = &self.description {
            product.description.clone_from(description);
        }
        if let Some(price) = self.price {
            product.price = price;
        }
        if let Some(pct) = self.discount_percentage {
            product.discount_percentage = pct;
        }
        if let Some(rating) = self.rating {
            product.rating = rating;
        }
        if let Some(stock) = self.stock {
            product.stock = stock;
        }
        if let Some(brand) = &self.brand {
            product.brand.clone_from(brand);
        }
        if let Some(category) = &self.category {
            product.category.clone_from(category);
        }
        if let Some(colors) = &self.colors {
            product.colors.clone_from(colors);
        }
        if let Some(sizes) = &self.sizes {
            product.sizes.clone_from(sizes);
        }
        if let Some(thumbnail) = &self.thumbnail {
            product.thumbnail.clone_from(thumbnail);
        }
        if let Some(images) = &self.images {
            product.images.clone_from(images);
        }
    }
}

fn validate_fields(
    title: Option<&str>,
    price: Option<Decimal>,
    discount: Option<Decimal>,
    stock: Option<i32>,
    rating: Option<Decimal>,
) -> Result<(), String> {
    if title.is_some_and(|t| t.trim().is_empty()) {
        return Err("title cannot be empty".to_owned());
    }
    if price.is_some_and(|p| p < Decimal::ZERO) {
        return Err("price cannot be negative".to_owned());
    }
    if discount.is_some_and(|d| d < Decimal::ZERO || d > Decimal::ONE_HUNDRED) {
        return Err("discount_percentage must be between 0 and 100".to_owned());
    }
    if stock.is_some_and(|s| s < 0) {
        return Err("stock cannot be negative".to_owned());
    }
    if rating.is_some_and(|r| r < Decimal::ZERO || r > Decimal::from(5)) {
        return Err("rating must be between 0 and 5".to_owned());
    }
    Ok(())
}

/// Product sort keys.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ProductSort {
    /// Discounted price.
    Price,
    Rating,
    Title,
    #[default]
    CreatedAt,
}

/// Catalog listing query, already normalized.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductQuery {
    /// OR-ed category filter. Empty means any.
    pub categories: Vec<String>,
    /// OR-ed brand filter. Empty means any.
    pub brands: Vec<String>,
    /// Case-insensitive title substring.
    pub search: Option<String>,
    pub in_stock_only: bool,
    pub include_deleted: bool,
    pub sort: ProductSort,
    pub order: SortOrder,
    pub page: u32,
    pub per_page: u32,
}

impl Default for ProductQuery {
    fn default() -> Self {
        Self {
            categories: Vec::new(),
            brands: Vec::new(),
            search: None,
            in_stock_only: false,
            include_deleted: false,
            sort: ProductSort::default(),
            order: SortOrder::default(),
            page: 1,
            per_page: super::page::DEFAULT_PER_PAGE,
        }
    }
}

impl ProductQuery {
    /// Whether a product passes every filter of this query.
    #[must_use]
    pub fn matches(&self, product: &Product) -> bool {
        if product.deleted && !self.include_deleted {
            return false;
        }
        if !self.categories.is_empty() && !self.categories.contains(&product.category) {
            return false;
        }
        if !self.brands.is_empty() && !self.brands.contains(&product.brand) {
            return false;
        }
        if self.in_stock_only && product.stock < 1 {
            return false;
        }
        if let Some(search) = &self.search {
            return product
                .title
                .to_lowercase()
                .contains(&search.to_lowercase());
        }
        true
    }
}

/// Split a comma-separated filter value into trimmed, non-empty parts.
#[must_use]
pub fn split_csv(value: Option<&str>) -> Vec<String> {
    value
        .map(|v| {
            v.split(',')
                .map(str::trim)
                .filter(|s| !s.is_empty())
                .map(ToOwned::to_owned)
                .collect()
        })
        .unwrap_or_default()
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
pub(crate) mod tests {
    use super::*;

    pub(crate) fn product(id: i64, price: &str, discount: &str, stock: i32) -> Product {
        let now = Utc::now();
        Product {
            id: ProductId::new(id),
            title: format!("Product {id}"),
            description: String::new(),
            price: price.parse().unwrap(),
            discount_percentage: discount.parse().unwrap(),
            rating: Decimal::from(4),
            stock,
            brand: "Acme".to_owned(),
            category: "tops".to_owned(),
            colors: Vec::new(),
            sizes: Vec::new(),
            thumbnail: String::new(),
            images: Vec::new(),
            deleted: false,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_discounted_price() {
        let p = product(1, "999", "15", 3);
        assert_eq!(p.discounted_price(), "849.15".parse::<Decimal>().unwrap());
    }

    #[test]
    fn test_variant_rule() {
        let mut p = product(1, "10", "0", 3);
        assert!(p.check_variant(None, None).is_ok());
        assert!(p.check_variant(Some("red"), None).is_err());

        p.colors = vec!["red".to_owned(), "blue".to_owned()];
        p.sizes = vec!["M".to_owned()];
        assert!(p.check_variant(Some("red"), Some("M")).is_ok());
        assert!(p.check_variant(None, Some("M")).is_err());
        assert!(p.check_variant(Some("green"), Some("M")).is_err());
        assert!(p.check_variant(Some("blue"), Some("XL")).is_err());
    }

    #[test]
    fn test_has_stock_for() {
        let mut p = product(1, "10", "0", 2);
        assert!(p.has_stock_for(2));
        assert!(!p.has_stock_for(3));
        assert!(!p.has_stock_for(0));
        p.deleted = true;
        assert!(!p.has_stock_for(1));
    }

    #[test]
    fn test_draft_validation() {
        let mut draft = ProductDraft {
            title: "Silk scarf".to_owned(),
            description: String::new(),
            price: Decimal::from(100),
            discount_percentage: Decimal::from(10),
            rating: Decimal::from(4),
            stock: 5,
            brand: "Acme".to_owned(),
            category: "accessories".to_owned(),
            colors: Vec::new(),
            sizes: Vec::new(),
            thumbnail: String::new(),
            images: Vec::new(),
        };
        assert!(draft.validate().is_ok());

        draft.discount_percentage = Decimal::from(101);
        assert!(draft.validate().is_err());
        draft.discount_percentage = Decimal::ZERO;
        draft.stock = -1;
        assert!(draft.validate().is_err());
        draft.stock = 0;
        draft.title = "  ".to_owned();
        assert!(draft.validate().is_err());
    }

    #[test]
    fn test_patch_applies_only_present_fields() {
        let mut p = product(1, "10", "0", 2);
        let patch = ProductPatch {
            price: Some(Decimal::from(12)),
            stock: Some(9),
            ..ProductPatch::default()
        };
        patch.apply_to(&mut p);
        assert_eq!(p.price, Decimal::from(12));
        assert_eq!(p.stock, 9);
        assert_eq!(p.title, "Product 1");
    }

    #[test]
    fn test_query_matches() {
        let p = product(1, "10", "0", 0);
        let mut query = ProductQuery::default();
        assert!(query.matches(&p));

        query.in_stock_only = true;
        assert!(!query.matches(&p));
        query.in_stock_only = false;

        query.search = Some("PRODUCT".to_owned());
        assert!(query.matches(&p));

        query.brands = split_csv(Some("Other, Acme"));
        assert!(query.matches(&p));
        query.categories = split_csv(Some("shoes"));
        assert!(!query.matches(&p));
    }
}
