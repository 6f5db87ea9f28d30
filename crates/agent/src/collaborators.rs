use std::path::{Path, PathBuf};
use std::sync::Mutex;

use anyhow::{anyhow, Context, Result};
use async_trait::async_trait;
use cartwise_core::domain::product::{Product, ProductId};
use cartwise_core::domain::ticket::{TicketReceipt, TicketRequest};
use uuid::Uuid;

/// Read-only access to the commerce platform catalog.
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    async fn all_products(&self) -> Result<Vec<Product>>;

    async fn product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.all_products().await?.into_iter().find(|product| &product.id == product_id))
    }
}

#[async_trait]
pub trait TicketService: Send + Sync {
    async fn create_ticket(&self, request: TicketRequest) -> Result<TicketReceipt>;
}

#[derive(Clone, Debug, Default)]
pub struct InMemoryCatalog {
    products: Vec<Product>,
}

impl InMemoryCatalog {
    pub fn new(products: Vec<Product>) -> Self {
        Self { products }
    }
}

#[async_trait]
impl CatalogProvider for InMemoryCatalog {
    async fn all_products(&self) -> Result<Vec<Product>> {
        Ok(self.products.clone())
    }

    async fn product(&self, product_id: &ProductId) -> Result<Option<Product>> {
        Ok(self.products.iter().find(|product| &product.id == product_id).cloned())
    }
}

/// Products read from a JSON array on every call, so edits show up without a restart.
#[derive(Clone, Debug)]
pub struct JsonFileCatalog {
    path: PathBuf,
}

impl JsonFileCatalog {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

pub fn parse_catalog_json(raw: &str) -> Result<Vec<Product>> {
    let value: serde_json::Value = serde_json::from_str(raw).context("catalog is not valid JSON")?;
    let products = match value {
        serde_json::Value::Object(mut object) => object
            .remove("products")
            .ok_or_else(|| anyhow!("catalog object has no `products` key"))?,
        array => array,
    };
    serde_json::from_value(products).context("catalog entries do not match the product shape")
}

#[async_trait]
impl CatalogProvider for JsonFileCatalog {
    async fn all_products(&self) -> Result<Vec<Product>> {
        let raw = tokio::fs::read_to_string(&self.path)
            .await
            .with_context(|| format!("could not read catalog `{}`", self.path.display()))?;
        parse_catalog_json(&raw)
            .with_context(|| format!("could not parse catalog `{}`", self.path.display()))
    }
}

/// Keeps every request and answers with a generated ticket id.
#[derive(Debug, Default)]
pub struct RecordingTicketService {
    requests: Mutex<Vec<TicketRequest>>,
}

impl RecordingTicketService {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn requests(&self) -> Vec<TicketRequest> {
        self.requests.lock().map(|requests| requests.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl TicketService for RecordingTicketService {
    async fn create_ticket(&self, request: TicketRequest) -> Result<TicketReceipt> {
        self.requests
            .lock()
            .map_err(|_| anyhow!("ticket log lock is poisoned"))?
            .push(request);
        Ok(TicketReceipt::created(format!("TCK-{}", Uuid::new_v4().simple())))
    }
}
