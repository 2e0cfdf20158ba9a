use std::sync::Arc;

use tracing::{debug, warn};

use shared::{Error, Result};

use crate::domain::{
    Cart, CartItem, ConflictResolution, ItemAdded, MergeSummary, QuantityUpdated, StoredItem,
};
use crate::policy::{CartPolicy, cart_key};
use crate::ports::CartTransport;
use crate::price::Price;
use crate::scripts::{self, AddVerdict, MergeVerdict, UpdateVerdict};

/// Application service that orchestrates cart mutations and reads.
///
/// Every mutation runs as an atomic script on the cache server, so limit
/// checks and the write land in one indivisible step and concurrent calls
/// against the same cart cannot jointly overshoot a limit. Reads aggregate
/// over the stored hash with plain commands.
#[derive(Clone)]
pub struct CartService {
    transport: Arc<dyn CartTransport>,
    policy: CartPolicy,
}

impl CartService {
    pub fn new(transport: Arc<dyn CartTransport>, policy: CartPolicy) -> Self {
        Self { transport, policy }
    }

    pub fn policy(&self) -> CartPolicy {
        self.policy
    }

    /// Add `quantity` of a product, incrementing any existing entry. The
    /// price snapshot overwrites the stored one, so the latest add wins.
    pub async fn add_item(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: u32,
        price: &str,
        variant: Option<&str>,
        is_guest: bool,
    ) -> Result<ItemAdded> {
        require_id("cart_id", cart_id)?;
        require_id("product_id", product_id)?;
        if quantity == 0 {
            return Err(Error::Validation("quantity must be greater than 0".to_string()));
        }
        if quantity > self.policy.max_quantity_per_item {
            return Err(Error::MaxQuantityExceeded {
                limit: self.policy.max_quantity_per_item,
                requested: quantity,
            });
        }
        let price = Price::parse(price)
            .map_err(|error| Error::Validation(format!("price: {error}")))?;
        if !price.is_positive() {
            return Err(Error::Validation("price must be greater than 0".to_string()));
        }

        let key = cart_key(cart_id);
        let ttl = self.policy.ttl_for(is_guest);
        let args = vec![
            product_id.to_string(),
            quantity.to_string(),
            price.to_string(),
            variant.unwrap_or_default().to_string(),
            self.policy.max_items_per_cart.to_string(),
            self.policy.max_quantity_per_item.to_string(),
            ttl.0.to_string(),
        ];
        let reply = self
            .transport
            .invoke_script(scripts::ADD_ITEM_SCRIPT, &[&key], &args)
            .await?;
        match scripts::decode_add(&reply)? {
            AddVerdict::Applied { quantity, is_new } => {
                debug!(product_id, quantity, is_new, "item added");
                Ok(ItemAdded::new(quantity, is_new))
            }
            AddVerdict::QuantityExceeded { limit, requested } => {
                Err(Error::MaxQuantityExceeded { limit, requested })
            }
            AddVerdict::ItemsExceeded { limit, current } => {
                Err(Error::MaxItemsExceeded { limit, current })
            }
        }
    }

    /// Set a product's quantity outright; zero removes the entry and, when it
    /// was the last one, the cart key itself.
    pub async fn update_quantity(
        &self,
        cart_id: &str,
        product_id: &str,
        quantity: u32,
        is_guest: bool,
    ) -> Result<QuantityUpdated> {
        require_id("cart_id", cart_id)?;
        require_id("product_id", product_id)?;
        if quantity > self.policy.max_quantity_per_item {
            return Err(Error::MaxQuantityExceeded {
                limit: self.policy.max_quantity_per_item,
                requested: quantity,
            });
        }

        let key = cart_key(cart_id);
        let ttl = self.policy.ttl_for(is_guest);
        let args = vec![
            product_id.to_string(),
            quantity.to_string(),
            self.policy.max_quantity_per_item.to_string(),
            ttl.0.to_string(),
        ];
        let reply = self
            .transport
            .invoke_script(scripts::UPDATE_QUANTITY_SCRIPT, &[&key], &args)
            .await?;
        match scripts::decode_update(&reply)? {
            UpdateVerdict::Applied { quantity, removed } => {
                debug!(product_id, quantity, removed, "quantity updated");
                Ok(QuantityUpdated::new(quantity, removed))
            }
            UpdateVerdict::QuantityExceeded { limit, requested } => {
                Err(Error::MaxQuantityExceeded { limit, requested })
            }
            UpdateVerdict::ProductMissing => Err(Error::ProductNotFound(product_id.to_string())),
        }
    }

    /// Remove one product; false when it was not in the cart.
    pub async fn remove_item(
        &self,
        cart_id: &str,
        product_id: &str,
        is_guest: bool,
    ) -> Result<bool> {
        require_id("cart_id", cart_id)?;
        require_id("product_id", product_id)?;

        let key = cart_key(cart_id);
        if !self.transport.delete_field(&key, product_id).await? {
            return Ok(false);
        }
        // The cleanup pair is not atomic with the delete; a concurrent add
        // may recreate the key between the two commands.
        if self.transport.field_count(&key).await? > 0 {
            self.transport
                .refresh_expiry(&key, self.policy.ttl_for(is_guest))
                .await?;
        } else {
            self.transport.delete_key(&key).await?;
        }
        Ok(true)
    }

    /// Read a cart with exact decimal totals. Entries that fail to decode are
    /// skipped rather than failing the whole read.
    pub async fn get_cart(&self, cart_id: &str) -> Result<Cart> {
        require_id("cart_id", cart_id)?;

        let key = cart_key(cart_id);
        if !self.transport.key_exists(&key).await? {
            return Err(Error::CartNotFound(cart_id.to_string()));
        }

        let entries = self.transport.hash_entries(&key).await?;
        let mut items = Vec::with_capacity(entries.len());
        let mut total_items: u64 = 0;
        let mut total_price = Price::ZERO;
        for (product_id, payload) in entries {
            let stored: StoredItem = match serde_json::from_str(&payload) {
                Ok(stored) => stored,
                Err(error) => {
                    warn!(%product_id, %error, "skipping cart entry that failed to decode");
                    continue;
                }
            };
            let line_price = match Price::parse(&stored.price_snapshot) {
                Ok(price) => price,
                Err(error) => {
                    warn!(%product_id, %error, "skipping cart entry with an unreadable price");
                    continue;
                }
            };
            let next_total = line_price
                .checked_mul_u32(stored.quantity)
                .and_then(|line| total_price.checked_add(line));
            let Some(next_total) = next_total else {
                warn!(%product_id, "skipping cart entry that overflows the cart total");
                continue;
            };
            total_price = next_total;
            total_items += u64::from(stored.quantity);
            items.push(CartItem::from_stored(product_id, stored));
        }

        Ok(Cart { cart_id: cart_id.to_string(), items, total_items, total_price })
    }

    /// Drop the whole cart; false when there was nothing to drop.
    pub async fn clear_cart(&self, cart_id: &str) -> Result<bool> {
        require_id("cart_id", cart_id)?;
        self.transport.delete_key(&cart_key(cart_id)).await
    }

    /// Merge the source cart into the target cart and delete the source.
    /// Runs at login, so the target keeps the identified-user TTL.
    pub async fn merge_carts(
        &self,
        source_cart_id: &str,
        target_cart_id: &str,
        resolution: ConflictResolution,
    ) -> Result<MergeSummary> {
        require_id("source_cart_id", source_cart_id)?;
        require_id("target_cart_id", target_cart_id)?;
        if source_cart_id == target_cart_id {
            return Err(Error::Validation("cannot merge a cart into itself".to_string()));
        }

        let source_key = cart_key(source_cart_id);
        let target_key = cart_key(target_cart_id);
        // An absent source also merges to nothing inside the script; checking
        // here skips the script call on the common re-invocation path.
        if !self.transport.key_exists(&source_key).await? {
            return Ok(MergeSummary::new(0, 0, resolution));
        }

        let ttl = self.policy.ttl_for(false);
        let args = vec![resolution.as_str().to_string(), ttl.0.to_string()];
        let reply = self
            .transport
            .invoke_script(scripts::MERGE_CARTS_SCRIPT, &[&source_key, &target_key], &args)
            .await?;
        match scripts::decode_merge(&reply)? {
            MergeVerdict::Merged { merged, conflicts } => {
                debug!(merged, conflicts, resolution = %resolution, "carts merged");
                Ok(MergeSummary::new(merged, conflicts, resolution))
            }
        }
    }
}

impl std::fmt::Debug for CartService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CartService").field("policy", &self.policy).finish()
    }
}

fn require_id(field: &str, value: &str) -> Result<()> {
    if value.trim().is_empty() {
        return Err(Error::Validation(format!("{field} must not be empty")));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use redis::Value;
    use shared::TtlSeconds;
    use std::sync::Mutex;
    use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};

    fn bulk(text: &str) -> Value {
        Value::BulkString(text.as_bytes().to_vec())
    }

    #[derive(Default)]
    struct MockTransport {
        reply: Mutex<Option<shared::Result<Value>>>,
        last_script: Mutex<Option<(&'static str, Vec<String>, Vec<String>)>>,
        entries: Mutex<Vec<(String, String)>>,
        key_present: AtomicBool,
        field_present: AtomicBool,
        fields_remaining: AtomicU64,
        deleted_keys: Mutex<Vec<String>>,
        refreshed: Mutex<Vec<(String, u64)>>,
    }

    impl MockTransport {
        fn with_reply(reply: Value) -> Arc<Self> {
            let mock = Self::default();
            *mock.reply.lock().unwrap() = Some(Ok(reply));
            Arc::new(mock)
        }
    }

    #[async_trait]
    impl CartTransport for MockTransport {
        async fn invoke_script(
            &self,
            source: &'static str,
            keys: &[&str],
            args: &[String],
        ) -> shared::Result<Value> {
            *self.last_script.lock().unwrap() = Some((
                source,
                keys.iter().map(|key| key.to_string()).collect(),
                args.to_vec(),
            ));
            self.reply
                .lock()
                .unwrap()
                .take()
                .unwrap_or_else(|| Err(Error::CacheUnavailable("no scripted reply".to_string())))
        }

        async fn hash_entries(&self, _key: &str) -> shared::Result<Vec<(String, String)>> {
            Ok(self.entries.lock().unwrap().clone())
        }

        async fn delete_field(&self, _key: &str, _field: &str) -> shared::Result<bool> {
            Ok(self.field_present.load(Ordering::SeqCst))
        }

        async fn field_count(&self, _key: &str) -> shared::Result<u64> {
            Ok(self.fields_remaining.load(Ordering::SeqCst))
        }

        async fn key_exists(&self, _key: &str) -> shared::Result<bool> {
            Ok(self.key_present.load(Ordering::SeqCst))
        }

        async fn delete_key(&self, key: &str) -> shared::Result<bool> {
            self.deleted_keys.lock().unwrap().push(key.to_string());
            Ok(true)
        }

        async fn refresh_expiry(&self, key: &str, ttl: TtlSeconds) -> shared::Result<bool> {
            self.refreshed.lock().unwrap().push((key.to_string(), ttl.0));
            Ok(true)
        }

        async fn ping(&self) -> shared::Result<()> {
            Ok(())
        }
    }

    fn test_policy() -> CartPolicy {
        CartPolicy {
            max_items_per_cart: 3,
            max_quantity_per_item: 5,
            cart_ttl: TtlSeconds(604_800),
            guest_cart_ttl: TtlSeconds(86_400),
        }
    }

    fn service(transport: Arc<MockTransport>) -> CartService {
        CartService::new(transport, test_policy())
    }

    #[tokio::test]
    async fn test_add_item_invokes_script_with_policy_args() {
        let transport =
            MockTransport::with_reply(Value::Array(vec![bulk("ok"), Value::Int(2), Value::Int(1)]));
        let added = service(transport.clone())
            .add_item("c1", "sku-1", 2, "19.99", Some("size:M"), true)
            .await
            .unwrap();
        assert_eq!(added, ItemAdded::new(2, true));

        let (source, keys, args) = transport.last_script.lock().unwrap().clone().unwrap();
        assert_eq!(source, scripts::ADD_ITEM_SCRIPT);
        assert_eq!(keys, vec!["cart:c1"]);
        assert_eq!(args, vec!["sku-1", "2", "19.99", "size:M", "3", "5", "86400"]);
    }

    #[tokio::test]
    async fn test_add_item_uses_long_ttl_for_identified_users() {
        let transport =
            MockTransport::with_reply(Value::Array(vec![bulk("ok"), Value::Int(1), Value::Int(1)]));
        service(transport.clone())
            .add_item("c1", "sku-1", 1, "5.00", None, false)
            .await
            .unwrap();

        let (_, _, args) = transport.last_script.lock().unwrap().clone().unwrap();
        assert_eq!(args[3], "", "missing variant should be stored as empty");
        assert_eq!(args[6], "604800");
    }

    #[tokio::test]
    async fn test_add_item_validates_before_touching_the_transport() {
        let transport = Arc::new(MockTransport::default());
        let service = service(transport.clone());

        for (cart, product, quantity, price) in [
            ("c1", "sku-1", 0, "5.00"),
            ("c1", "sku-1", 1, "abc"),
            ("c1", "sku-1", 1, "0.00"),
            ("c1", "sku-1", 1, "-2.00"),
            ("", "sku-1", 1, "5.00"),
            ("c1", "  ", 1, "5.00"),
        ] {
            let error = service.add_item(cart, product, quantity, price, None, true).await;
            assert!(
                matches!(error, Err(Error::Validation(_))),
                "expected validation error for {cart:?}/{product:?}/{quantity}/{price:?}"
            );
        }
        assert!(transport.last_script.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_item_checks_quantity_limit_client_side() {
        let transport = Arc::new(MockTransport::default());
        let error = service(transport.clone())
            .add_item("c1", "sku-1", 6, "5.00", None, true)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::MaxQuantityExceeded { limit: 5, requested: 6 }));
        assert!(transport.last_script.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_add_item_surfaces_script_limit_verdicts() {
        let transport = MockTransport::with_reply(Value::Array(vec![
            bulk("err"),
            bulk("MAX_ITEMS_EXCEEDED"),
            Value::Int(3),
            Value::Int(3),
        ]));
        let error = service(transport)
            .add_item("c1", "sku-4", 1, "5.00", None, true)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::MaxItemsExceeded { limit: 3, current: 3 }));
    }

    #[tokio::test]
    async fn test_add_item_unrecognized_reply_is_ambiguous() {
        let transport = MockTransport::with_reply(Value::Okay);
        let error = service(transport)
            .add_item("c1", "sku-1", 1, "5.00", None, true)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::UnknownOutcome(_)));
    }

    #[tokio::test]
    async fn test_update_quantity_invokes_script() {
        let transport =
            MockTransport::with_reply(Value::Array(vec![bulk("ok"), Value::Int(4), Value::Int(0)]));
        let updated = service(transport.clone())
            .update_quantity("c1", "sku-1", 4, false)
            .await
            .unwrap();
        assert_eq!(updated, QuantityUpdated::new(4, false));

        let (source, keys, args) = transport.last_script.lock().unwrap().clone().unwrap();
        assert_eq!(source, scripts::UPDATE_QUANTITY_SCRIPT);
        assert_eq!(keys, vec!["cart:c1"]);
        assert_eq!(args, vec!["sku-1", "4", "5", "604800"]);
    }

    #[tokio::test]
    async fn test_update_to_zero_reports_removal() {
        let transport =
            MockTransport::with_reply(Value::Array(vec![bulk("ok"), Value::Int(0), Value::Int(1)]));
        let updated = service(transport)
            .update_quantity("c1", "sku-1", 0, true)
            .await
            .unwrap();
        assert_eq!(updated, QuantityUpdated::new(0, true));
    }

    #[tokio::test]
    async fn test_update_missing_product_maps_to_product_not_found() {
        let transport =
            MockTransport::with_reply(Value::Array(vec![bulk("err"), bulk("PRODUCT_NOT_FOUND")]));
        let error = service(transport)
            .update_quantity("c1", "sku-9", 2, true)
            .await
            .unwrap_err();
        match error {
            Error::ProductNotFound(product_id) => assert_eq!(product_id, "sku-9"),
            other => panic!("expected ProductNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_remove_item_refreshes_expiry_when_items_remain() {
        let transport = Arc::new(MockTransport::default());
        transport.field_present.store(true, Ordering::SeqCst);
        transport.fields_remaining.store(2, Ordering::SeqCst);

        let removed = service(transport.clone()).remove_item("c1", "sku-1", true).await.unwrap();
        assert!(removed);
        assert_eq!(
            transport.refreshed.lock().unwrap().clone(),
            vec![("cart:c1".to_string(), 86_400)]
        );
        assert!(transport.deleted_keys.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_last_item_deletes_the_cart_key() {
        let transport = Arc::new(MockTransport::default());
        transport.field_present.store(true, Ordering::SeqCst);

        let removed = service(transport.clone()).remove_item("c1", "sku-1", true).await.unwrap();
        assert!(removed);
        assert_eq!(transport.deleted_keys.lock().unwrap().clone(), vec!["cart:c1".to_string()]);
        assert!(transport.refreshed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remove_absent_item_reports_false_without_cleanup() {
        let transport = Arc::new(MockTransport::default());
        let removed = service(transport.clone()).remove_item("c1", "sku-1", true).await.unwrap();
        assert!(!removed);
        assert!(transport.deleted_keys.lock().unwrap().is_empty());
        assert!(transport.refreshed.lock().unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_get_cart_missing_key_is_cart_not_found() {
        let transport = Arc::new(MockTransport::default());
        let error = service(transport).get_cart("ghost").await.unwrap_err();
        match error {
            Error::CartNotFound(cart_id) => assert_eq!(cart_id, "ghost"),
            other => panic!("expected CartNotFound, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_get_cart_aggregates_and_skips_undecodable_entries() {
        let transport = Arc::new(MockTransport::default());
        transport.key_present.store(true, Ordering::SeqCst);
        *transport.entries.lock().unwrap() = vec![
            ("A".to_string(), r#"{"quantity":2,"price_snapshot":"19.99","variant":""}"#.to_string()),
            ("B".to_string(), r#"{"quantity":1,"price_snapshot":"5.00","variant":"blue"}"#.to_string()),
            ("corrupt".to_string(), "not-json".to_string()),
            ("bad-price".to_string(), r#"{"quantity":1,"price_snapshot":"oops","variant":""}"#.to_string()),
        ];

        let cart = service(transport).get_cart("c1").await.unwrap();
        assert_eq!(cart.cart_id, "c1");
        assert_eq!(cart.items.len(), 2);
        assert_eq!(cart.total_items, 3);
        assert_eq!(cart.total_price.to_string(), "44.98");
        assert_eq!(cart.items[1].variant, "blue");
    }

    #[tokio::test]
    async fn test_clear_cart_deletes_the_key() {
        let transport = Arc::new(MockTransport::default());
        assert!(service(transport.clone()).clear_cart("c1").await.unwrap());
        assert_eq!(transport.deleted_keys.lock().unwrap().clone(), vec!["cart:c1".to_string()]);
    }

    #[tokio::test]
    async fn test_merge_missing_source_short_circuits() {
        let transport = Arc::new(MockTransport::default());
        let summary = service(transport.clone())
            .merge_carts("guest-1", "user-1", ConflictResolution::Sum)
            .await
            .unwrap();
        assert_eq!(summary, MergeSummary::new(0, 0, ConflictResolution::Sum));
        assert!(transport.last_script.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_merge_invokes_script_with_user_ttl() {
        let transport =
            MockTransport::with_reply(Value::Array(vec![bulk("ok"), Value::Int(2), Value::Int(1)]));
        transport.key_present.store(true, Ordering::SeqCst);

        let summary = service(transport.clone())
            .merge_carts("guest-1", "user-1", ConflictResolution::LastWriteWins)
            .await
            .unwrap();
        assert_eq!(summary, MergeSummary::new(2, 1, ConflictResolution::LastWriteWins));

        let (source, keys, args) = transport.last_script.lock().unwrap().clone().unwrap();
        assert_eq!(source, scripts::MERGE_CARTS_SCRIPT);
        assert_eq!(keys, vec!["cart:guest-1", "cart:user-1"]);
        assert_eq!(args, vec!["last-write-wins", "604800"]);
    }

    #[tokio::test]
    async fn test_merge_rejects_merging_a_cart_into_itself() {
        let transport = Arc::new(MockTransport::default());
        let error = service(transport.clone())
            .merge_carts("c1", "c1", ConflictResolution::Sum)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::Validation(_)));
        assert!(transport.last_script.lock().unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transport_failures_pass_through() {
        let transport = Arc::new(MockTransport::default());
        *transport.reply.lock().unwrap() =
            Some(Err(Error::CacheUnavailable("EVALSHA failed after 3 attempts".to_string())));
        let error = service(transport)
            .add_item("c1", "sku-1", 1, "5.00", None, true)
            .await
            .unwrap_err();
        assert!(matches!(error, Error::CacheUnavailable(_)));
    }
}
