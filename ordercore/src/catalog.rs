//! The product catalog service.
//!
//! Thin orchestration over the [`ProductStore`] port: payload validation,
//! merge-with-current-values update semantics, and the soft-delete
//! lifecycle. Stock levels set here are plain field writes; reservations
//! against stock happen only in the order workflow.

use tracing::{info, instrument};

use crate::errors::{WorkflowError, WorkflowResult};
use crate::product::Product;
use crate::store::ProductStore;
use crate::types::ProductId;
use crate::validation::ProductPayload;

/// The catalog service, generic over its store port.
#[derive(Debug, Clone)]
pub struct ProductCatalog<P> {
    products: P,
}

impl<P> ProductCatalog<P>
where
    P: ProductStore,
{
    /// Build a catalog from an explicit store handle.
    pub const fn new(products: P) -> Self {
        Self { products }
    }

    /// All active products, newest first.
    pub async fn all_products(&self) -> WorkflowResult<Vec<Product>> {
        Ok(self.products.find_all(true).await?)
    }

    /// A product by id, active or not.
    pub async fn product(&self, id: ProductId) -> WorkflowResult<Product> {
        self.products
            .find_by_id(id)
            .await?
            .ok_or(WorkflowError::ProductNotFound(id))
    }

    /// Active products in a category.
    pub async fn products_in_category(&self, category: &str) -> WorkflowResult<Vec<Product>> {
        Ok(self.products.find_by_category(category).await?)
    }

    /// Validate a payload and insert the product, active by default.
    #[instrument(skip(self, payload))]
    pub async fn create_product(&self, payload: ProductPayload) -> WorkflowResult<()> {
        let product = payload
            .into_new_product()
            .map_err(WorkflowError::Validation)?;
        self.products.create(product).await?;
        info!("product created");
        Ok(())
    }

    /// Merge a partial payload onto the stored product and overwrite it.
    /// Absent payload fields keep their current values.
    #[instrument(skip(self, payload))]
    pub async fn update_product(
        &self,
        id: ProductId,
        payload: &ProductPayload,
    ) -> WorkflowResult<()> {
        let mut product = self
            .products
            .find_by_id(id)
            .await?
            .ok_or(WorkflowError::ProductNotFound(id))?;
        payload
            .apply_to(&mut product)
            .map_err(WorkflowError::Validation)?;

        if !self.products.update(&product).await? {
            return Err(WorkflowError::ProductNotFound(id));
        }
        info!(product_id = %id, "product updated");
        Ok(())
    }

    /// Retire a product. The row stays behind its cleared active flag so
    /// existing order lines keep a valid reference.
    #[instrument(skip(self))]
    pub async fn delete_product(&self, id: ProductId) -> WorkflowResult<()> {
        if !self.products.soft_delete(id).await? {
            return Err(WorkflowError::ProductNotFound(id));
        }
        info!(product_id = %id, "product deactivated");
        Ok(())
    }
}
