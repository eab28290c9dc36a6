//! Normalization of the product API's response shapes.
//!
//! The backend has answered with several envelopes over time; every shape it
//! is known to produce is folded into [`ProductPage`] or plain model values
//! here. Individual products that fail to decode are skipped.

use reelshop_model::{Category, Product, ProductPage};
use serde_json::Value;

/// Message of a `{status: "error", message}` body.
pub(crate) fn server_error(body: &Value) -> Option<String> {
    if body.get("status").and_then(Value::as_str) != Some("error") {
        return None;
    }
    Some(
        body.get("message")
            .and_then(Value::as_str)
            .unwrap_or("request failed")
            .to_string(),
    )
}

/// Human-readable message from an error body, if there is one.
pub(crate) fn error_message(body: &Value) -> Option<String> {
    ["message", "error", "detail"]
        .iter()
        .find_map(|key| body.get(*key).and_then(Value::as_str))
        .map(str::to_string)
}

/// Page from the paginated feed endpoint.
pub(crate) fn feed_page(body: Value) -> ProductPage {
    match body {
        Value::Array(items) => {
            let products = parse_products(items);
            let total = products.len() as u64;
            ProductPage {
                products,
                has_more: false,
                total,
                page: 1,
            }
        }
        Value::Object(mut map) => {
            if let Some(Value::Object(data)) = map.get_mut("data")
                && let Some(Value::Array(items)) = data.remove("products")
            {
                let total = data.get("total").and_then(as_u64).unwrap_or(0);
                let products = parse_products(items);
                return ProductPage {
                    has_more: (products.len() as u64) < total,
                    products,
                    total,
                    page: 1,
                };
            }

            let items = match map.remove("products") {
                Some(Value::Array(items)) => Some(items),
                _ => match map.remove("data") {
                    Some(Value::Array(items)) => Some(items),
                    _ => None,
                },
            };
            let Some(items) = items else {
                log::warn!("[ApiClient] unexpected product list shape");
                return ProductPage::empty();
            };

            ProductPage {
                products: parse_products(items),
                has_more: map.get("hasMore").and_then(Value::as_bool).unwrap_or(false),
                total: map.get("total").and_then(as_u64).unwrap_or(0),
                page: map
                    .get("page")
                    .and_then(as_u64)
                    .and_then(|page| u32::try_from(page).ok())
                    .filter(|page| *page > 0)
                    .unwrap_or(1),
            }
        }
        _ => {
            log::warn!("[ApiClient] unexpected product list shape");
            ProductPage::empty()
        }
    }
}

/// Unpaginated product list (search, by-ids).
pub(crate) fn listing(body: Value) -> ProductPage {
    let (items, total) = match body {
        Value::Array(items) => (items, 0),
        Value::Object(mut map) => {
            if let Some(Value::Object(data)) = map.get_mut("data")
                && let Some(Value::Array(items)) = data.remove("products")
            {
                let total = data.get("total").and_then(as_u64).unwrap_or(0);
                (items, total)
            } else if let Some(Value::Array(items)) = map.remove("products") {
                (items, map.get("total").and_then(as_u64).unwrap_or(0))
            } else {
                (Vec::new(), 0)
            }
        }
        _ => (Vec::new(), 0),
    };

    ProductPage::single(parse_products(items), total)
}

pub(crate) fn categories(body: Value) -> Vec<Category> {
    let items = match body {
        Value::Array(items) => items,
        Value::Object(mut map) => {
            if let Some(Value::Object(data)) = map.get_mut("data")
                && let Some(Value::Array(items)) = data.remove("categories")
            {
                items
            } else if let Some(Value::Array(items)) = map.remove("categories") {
                items
            } else {
                Vec::new()
            }
        }
        _ => Vec::new(),
    };

    items.iter().filter_map(category).collect()
}

fn category(value: &Value) -> Option<Category> {
    let name = value
        .get("category_name")
        .or_else(|| value.get("name"))
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|name| !name.is_empty())?;
    let count = value.get("product_count").and_then(as_u64).unwrap_or(0);

    let mut category = Category::from_name(name, count);
    if let Some(id) = value.get("id").and_then(id_string) {
        category.id = id;
    }
    Some(category)
}

/// A single product, bare or wrapped in `data` / `product`.
pub(crate) fn single_product(body: Value) -> Option<Product> {
    let value = match body {
        Value::Object(mut map) if !map.contains_key("product_id") => map
            .remove("data")
            .or_else(|| map.remove("product"))
            .and_then(|inner| match inner {
                Value::Object(mut data) if !data.contains_key("product_id") => {
                    data.remove("product")
                }
                other => Some(other),
            })?,
        other => other,
    };

    match serde_json::from_value::<Product>(value) {
        Ok(product) => Some(product),
        Err(err) => {
            log::warn!("[ApiClient] could not decode product: {}", err);
            None
        }
    }
}

fn parse_products(items: Vec<Value>) -> Vec<Product> {
    let received = items.len();
    let products: Vec<Product> = items
        .into_iter()
        .filter_map(|item| match serde_json::from_value::<Product>(item) {
            Ok(product) if !product.product_id.is_empty() => Some(product),
            Ok(_) => None,
            Err(err) => {
                log::debug!("[ApiClient] skipping product: {}", err);
                None
            }
        })
        .collect();

    if products.len() != received {
        log::warn!(
            "[ApiClient] dropped {} of {} products that failed to decode",
            received - products.len(),
            received
        );
    }
    products
}

fn as_u64(value: &Value) -> Option<u64> {
    match value {
        Value::Number(n) => n
            .as_u64()
            .or_else(|| n.as_f64().filter(|f| *f >= 0.0).map(|f| f as u64)),
        Value::String(s) => s.trim().parse().ok(),
        _ => None,
    }
}

fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
