//! Category and paging types.

use serde::{Deserialize, Serialize};

use crate::product::Product;

/// A filterable category with its product count.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    #[serde(default)]
    pub product_count: u64,
}

impl Category {
    /// Categories are keyed by their display name on the API side.
    pub fn from_name(name: impl Into<String>, product_count: u64) -> Self {
        let name = name.into();
        Self {
            id: name.clone(),
            name,
            product_count,
        }
    }
}

/// One page of products plus paging hints.
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct ProductPage {
    pub products: Vec<Product>,
    pub has_more: bool,
    pub total: u64,
    pub page: u32,
}

impl ProductPage {
    pub fn empty() -> Self {
        Self {
            page: 1,
            ..Self::default()
        }
    }

    pub fn single(products: Vec<Product>, total: u64) -> Self {
        Self {
            products,
            has_more: false,
            total,
            page: 1,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.products.is_empty()
    }
}
