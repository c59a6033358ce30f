//! End-to-end order workflow behavior over the in-memory store.
//!
//! These tests drive `OrderWorkflow` and `ProductCatalog` exactly the way a
//! transport layer would: raw request payloads in, typed results or errors
//! out, with stock levels observed through the store afterwards.

use ordercore::{
    CreateOrderRequest, OrderItemRequest, OrderStatus, OrderWorkflow, ProductCatalog, ProductId,
    ProductPayload, ProductStore, UpdateOrderRequest, UserId, WorkflowError,
};
use ordercore_memory::InMemoryStore;
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tracing_subscriber::EnvFilter;

fn init_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .try_init();
}

fn payload(name: &str, price: Decimal, quantity: i64) -> ProductPayload {
    ProductPayload {
        name: Some(name.to_string()),
        description: Some(format!("{name} description")),
        price: Some(price),
        quantity: Some(quantity),
        image: None,
        category: Some("general".to_string()),
    }
}

fn order_request(user_id: i64, items: &[(i64, u32)]) -> CreateOrderRequest {
    CreateOrderRequest {
        user_id: Some(user_id),
        items: items
            .iter()
            .map(|&(product_id, quantity)| OrderItemRequest {
                product_id: Some(product_id),
                quantity: Some(quantity),
                price: None,
            })
            .collect(),
        shipping_address: None,
        status: None,
        phone: None,
        comment: None,
    }
}

/// Store seeded via the catalog service: Kettle (id 1, 10.00, stock 5) and
/// Mug (id 2, 5.00, stock 3).
async fn seeded() -> (InMemoryStore, OrderWorkflow<InMemoryStore, InMemoryStore>) {
    let store = InMemoryStore::new();
    let catalog = ProductCatalog::new(store.clone());
    catalog
        .create_product(payload("Kettle", dec!(10.00), 5))
        .await
        .unwrap();
    catalog
        .create_product(payload("Mug", dec!(5.00), 3))
        .await
        .unwrap();
    let workflow = OrderWorkflow::new(store.clone(), store.clone());
    (store, workflow)
}

async fn stock_of(store: &InMemoryStore, raw_id: i64) -> u32 {
    store
        .find_by_id(ProductId::try_new(raw_id).unwrap())
        .await
        .unwrap()
        .unwrap()
        .quantity
        .value()
}

#[tokio::test]
async fn create_order_snapshots_prices_and_reserves_stock() {
    init_tracing();
    let (store, workflow) = seeded().await;

    let receipt = workflow
        .create_order(&order_request(7, &[(1, 2), (2, 1)]))
        .await
        .unwrap();
    assert_eq!(receipt.total_amount.amount(), dec!(25.00));

    assert_eq!(stock_of(&store, 1).await, 3);
    assert_eq!(stock_of(&store, 2).await, 2);

    let order = workflow.order(receipt.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Pending);
    assert_eq!(order.total_amount.amount(), dec!(25.00));
    assert_eq!(order.items.len(), 2);
    assert_eq!(order.items[0].price.amount(), dec!(10.00));
    assert_eq!(order.items[0].product_name.as_deref(), Some("Kettle"));
}

#[tokio::test]
async fn create_order_over_stock_fails_without_any_stock_change() {
    let (store, workflow) = seeded().await;

    // The first item fits; the second asks for more mugs than exist. The
    // whole operation aborts and neither product loses stock.
    let error = workflow
        .create_order(&order_request(7, &[(1, 2), (2, 4)]))
        .await
        .unwrap_err();
    match error {
        WorkflowError::InsufficientStock {
            product_name,
            requested,
            available,
            ..
        } => {
            assert_eq!(product_name, "Mug");
            assert_eq!(requested.value(), 4);
            assert_eq!(available.value(), 3);
        }
        other => panic!("expected InsufficientStock, got {other:?}"),
    }

    assert_eq!(stock_of(&store, 1).await, 5);
    assert_eq!(stock_of(&store, 2).await, 3);
    assert!(workflow.all_orders().await.unwrap().is_empty());
}

#[tokio::test]
async fn create_order_unknown_product_fails() {
    let (store, workflow) = seeded().await;
    let error = workflow
        .create_order(&order_request(7, &[(99, 1)]))
        .await
        .unwrap_err();
    assert!(matches!(error, WorkflowError::ProductNotFound(id) if i64::from(id) == 99));
    assert_eq!(stock_of(&store, 1).await, 5);
}

#[tokio::test]
async fn create_order_rejects_malformed_requests() {
    let (_store, workflow) = seeded().await;

    let no_user = CreateOrderRequest {
        items: vec![OrderItemRequest {
            product_id: Some(1),
            quantity: Some(1),
            price: None,
        }],
        ..CreateOrderRequest::default()
    };
    assert!(matches!(
        workflow.create_order(&no_user).await.unwrap_err(),
        WorkflowError::Validation(errors) if errors.message("user_id").is_some()
    ));

    let no_items = CreateOrderRequest {
        user_id: Some(7),
        ..CreateOrderRequest::default()
    };
    assert!(matches!(
        workflow.create_order(&no_items).await.unwrap_err(),
        WorkflowError::Validation(errors) if errors.message("items").is_some()
    ));

    let missing_quantity = CreateOrderRequest {
        user_id: Some(7),
        items: vec![OrderItemRequest {
            product_id: Some(1),
            quantity: None,
            price: None,
        }],
        ..CreateOrderRequest::default()
    };
    assert!(matches!(
        workflow.create_order(&missing_quantity).await.unwrap_err(),
        WorkflowError::Validation(_)
    ));
}

#[tokio::test]
async fn create_order_rejects_unknown_caller_status() {
    let (_store, workflow) = seeded().await;
    let mut request = order_request(7, &[(1, 1)]);
    request.status = Some("shipped".to_string());
    assert!(matches!(
        workflow.create_order(&request).await.unwrap_err(),
        WorkflowError::InvalidStatus(status) if status == "shipped"
    ));
}

#[tokio::test]
async fn create_order_honors_valid_caller_status() {
    let (_store, workflow) = seeded().await;
    let mut request = order_request(7, &[(1, 1)]);
    request.status = Some("processing".to_string());
    let receipt = workflow.create_order(&request).await.unwrap();
    let order = workflow.order(receipt.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
}

#[tokio::test]
async fn cancelling_restores_stock_exactly_once() {
    init_tracing();
    let (store, workflow) = seeded().await;
    let receipt = workflow
        .create_order(&order_request(7, &[(1, 3)]))
        .await
        .unwrap();
    assert_eq!(stock_of(&store, 1).await, 2);

    workflow.cancel_order(receipt.order_id).await.unwrap();
    assert_eq!(stock_of(&store, 1).await, 5);
    let order = workflow.order(receipt.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Cancelled);

    // Cancelling again must not double-restore.
    workflow.cancel_order(receipt.order_id).await.unwrap();
    assert_eq!(stock_of(&store, 1).await, 5);
}

#[tokio::test]
async fn deleting_a_completed_order_leaves_stock_alone() {
    let (store, workflow) = seeded().await;
    let receipt = workflow
        .create_order(&order_request(7, &[(1, 3)]))
        .await
        .unwrap();
    workflow
        .update_order_status(receipt.order_id, "completed")
        .await
        .unwrap();

    workflow.delete_order(receipt.order_id).await.unwrap();
    assert_eq!(stock_of(&store, 1).await, 2);
    assert!(matches!(
        workflow.order(receipt.order_id).await.unwrap_err(),
        WorkflowError::OrderNotFound(_)
    ));
}

#[tokio::test]
async fn deleting_a_pending_order_restores_stock_first() {
    let (store, workflow) = seeded().await;
    let receipt = workflow
        .create_order(&order_request(7, &[(1, 3)]))
        .await
        .unwrap();

    workflow.delete_order(receipt.order_id).await.unwrap();
    assert_eq!(stock_of(&store, 1).await, 5);
    assert!(matches!(
        workflow.order(receipt.order_id).await.unwrap_err(),
        WorkflowError::OrderNotFound(_)
    ));
}

#[tokio::test]
async fn update_status_validates_inputs() {
    let (_store, workflow) = seeded().await;
    let receipt = workflow
        .create_order(&order_request(7, &[(1, 1)]))
        .await
        .unwrap();

    assert!(matches!(
        workflow
            .update_order_status(receipt.order_id, "shipped")
            .await
            .unwrap_err(),
        WorkflowError::InvalidStatus(_)
    ));

    let missing = ordercore::OrderId::try_new(999).unwrap();
    assert!(matches!(
        workflow
            .update_order_status(missing, "completed")
            .await
            .unwrap_err(),
        WorkflowError::OrderNotFound(_)
    ));
}

#[tokio::test]
async fn update_order_merges_fields_without_stock_effects() {
    let (store, workflow) = seeded().await;
    let receipt = workflow
        .create_order(&order_request(7, &[(1, 2)]))
        .await
        .unwrap();

    let request = UpdateOrderRequest {
        status: Some("processing".to_string()),
        shipping_address: Some("12 Main St".to_string()),
    };
    workflow
        .update_order(receipt.order_id, &request)
        .await
        .unwrap();

    let order = workflow.order(receipt.order_id).await.unwrap();
    assert_eq!(order.status, OrderStatus::Processing);
    assert_eq!(order.shipping_address.as_deref(), Some("12 Main St"));
    assert_eq!(order.total_amount.amount(), dec!(20.00));
    assert_eq!(stock_of(&store, 1).await, 3);
}

#[tokio::test]
async fn sequential_orders_share_the_same_stock_pool() {
    let (store, workflow) = seeded().await;

    let receipt = workflow
        .create_order(&order_request(7, &[(1, 3)]))
        .await
        .unwrap();
    assert_eq!(receipt.total_amount.amount(), dec!(30.00));
    assert_eq!(stock_of(&store, 1).await, 2);

    // The same request again would need 3 of the 2 remaining units.
    let error = workflow
        .create_order(&order_request(7, &[(1, 3)]))
        .await
        .unwrap_err();
    assert!(matches!(error, WorkflowError::InsufficientStock { .. }));
    assert_eq!(stock_of(&store, 1).await, 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_orders_cannot_oversell() {
    init_tracing();
    let (store, workflow) = seeded().await;

    // Two racing orders of 3 kettles against a stock of 5: exactly one may
    // win, whichever interleaving the scheduler picks.
    let first = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.create_order(&order_request(7, &[(1, 3)])).await })
    };
    let second = {
        let workflow = workflow.clone();
        tokio::spawn(async move { workflow.create_order(&order_request(8, &[(1, 3)])).await })
    };

    let outcomes = [first.await.unwrap(), second.await.unwrap()];
    let successes = outcomes.iter().filter(|outcome| outcome.is_ok()).count();
    assert_eq!(successes, 1);
    assert!(outcomes.iter().any(|outcome| matches!(
        outcome,
        Err(WorkflowError::InsufficientStock { .. })
    )));
    assert_eq!(stock_of(&store, 1).await, 2);
}

#[tokio::test]
async fn listing_operations_filter_and_parse() {
    let (_store, workflow) = seeded().await;
    workflow
        .create_order(&order_request(7, &[(1, 1)]))
        .await
        .unwrap();
    let second = workflow
        .create_order(&order_request(8, &[(2, 1)]))
        .await
        .unwrap();
    workflow
        .update_order_status(second.order_id, "completed")
        .await
        .unwrap();

    assert_eq!(workflow.all_orders().await.unwrap().len(), 2);
    assert_eq!(
        workflow
            .user_orders(UserId::try_new(7).unwrap())
            .await
            .unwrap()
            .len(),
        1
    );
    assert_eq!(workflow.orders_by_status("completed").await.unwrap().len(), 1);
    assert!(matches!(
        workflow.orders_by_status("bogus").await.unwrap_err(),
        WorkflowError::InvalidStatus(_)
    ));

    let stats = workflow.statistics().await.unwrap();
    assert_eq!(stats.total_orders, 2);
    assert_eq!(stats.total_revenue, dec!(15.00));
    assert_eq!(stats.completed_orders, 1);
    assert_eq!(stats.pending_orders, 1);
}

#[tokio::test]
async fn catalog_validation_surfaces_field_errors() {
    let store = InMemoryStore::new();
    let catalog = ProductCatalog::new(store);

    let error = catalog
        .create_product(ProductPayload::default())
        .await
        .unwrap_err();
    match error {
        WorkflowError::Validation(errors) => {
            assert!(errors.message("name").is_some());
            assert!(errors.message("price").is_some());
            assert!(errors.message("category").is_some());
        }
        other => panic!("expected Validation, got {other:?}"),
    }
}

#[tokio::test]
async fn catalog_update_merges_partial_payloads() {
    let (store, _workflow) = seeded().await;
    let catalog = ProductCatalog::new(store.clone());
    let kettle = ProductId::try_new(1).unwrap();

    let partial = ProductPayload {
        price: Some(dec!(12.50)),
        ..ProductPayload::default()
    };
    catalog.update_product(kettle, &partial).await.unwrap();

    let product = catalog.product(kettle).await.unwrap();
    assert_eq!(product.price.amount(), dec!(12.50));
    assert_eq!(product.name, "Kettle");
    assert_eq!(product.quantity.value(), 5);
}

#[tokio::test]
async fn catalog_delete_is_soft() {
    let (store, workflow) = seeded().await;
    let catalog = ProductCatalog::new(store.clone());
    let kettle = ProductId::try_new(1).unwrap();

    catalog.delete_product(kettle).await.unwrap();
    assert_eq!(catalog.all_products().await.unwrap().len(), 1);

    // A deactivated product still backs existing references and can even be
    // ordered, matching the catalog's display-only notion of active.
    let product = catalog.product(kettle).await.unwrap();
    assert!(!product.is_active);
    assert!(workflow
        .create_order(&order_request(7, &[(1, 1)]))
        .await
        .is_ok());
}
