use redis::Value;
use shared::{Error, Result};

// Scripts reply with flat tagged arrays: {'ok', ...} or {'err', CODE, ...}.
// Lua tables with string keys lose those entries when converted to a Redis
// reply, and Lua booleans collapse to nil, so only arrays of strings and
// integers cross the wire.

/// Lua script for atomically adding a product to a cart.
///
/// Reads the current entry, applies both limits and writes the new payload
/// in one step, so concurrent adds cannot jointly overshoot a limit.
///
/// Replies: `{'ok', quantity, is_new}` with `is_new` as 1/0,
/// `{'err', 'MAX_QUANTITY_EXCEEDED', limit, requested}`,
/// `{'err', 'MAX_ITEMS_EXCEEDED', limit, current}`.
pub const ADD_ITEM_SCRIPT: &str = r"
local cart_key = KEYS[1]
local product_id = ARGV[1]
local quantity = tonumber(ARGV[2])
local price_snapshot = ARGV[3]
local variant = ARGV[4]
local max_items = tonumber(ARGV[5])
local max_quantity = tonumber(ARGV[6])
local ttl = tonumber(ARGV[7])

local item_count = redis.call('HLEN', cart_key)

local existing = redis.call('HGET', cart_key, product_id)
local existing_qty = 0
if existing then
    existing_qty = tonumber(cjson.decode(existing)['quantity']) or 0
end

local new_qty = existing_qty + quantity

if new_qty > max_quantity then
    return {'err', 'MAX_QUANTITY_EXCEEDED', max_quantity, new_qty}
end

-- The distinct-product limit only gates products not already in the cart
if not existing and item_count >= max_items then
    return {'err', 'MAX_ITEMS_EXCEEDED', max_items, item_count}
end

local item = {quantity = new_qty, price_snapshot = price_snapshot, variant = variant}
redis.call('HSET', cart_key, product_id, cjson.encode(item))
redis.call('EXPIRE', cart_key, ttl)

local is_new = 0
if not existing then
    is_new = 1
end
return {'ok', new_qty, is_new}
";

/// Lua script for atomically setting a product's quantity.
///
/// Setting zero deletes the entry, and deletes the whole key when the last
/// entry goes, so an empty cart hash never lingers. Price and variant are
/// preserved from the stored entry on plain quantity changes.
///
/// Replies: `{'ok', quantity, removed}` with `removed` as 1/0,
/// `{'err', 'PRODUCT_NOT_FOUND'}`,
/// `{'err', 'MAX_QUANTITY_EXCEEDED', limit, requested}`.
pub const UPDATE_QUANTITY_SCRIPT: &str = r"
local cart_key = KEYS[1]
local product_id = ARGV[1]
local quantity = tonumber(ARGV[2])
local max_quantity = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local existing = redis.call('HGET', cart_key, product_id)
if not existing then
    return {'err', 'PRODUCT_NOT_FOUND'}
end

if quantity > max_quantity then
    return {'err', 'MAX_QUANTITY_EXCEEDED', max_quantity, quantity}
end

if quantity == 0 then
    redis.call('HDEL', cart_key, product_id)
    if redis.call('HLEN', cart_key) > 0 then
        redis.call('EXPIRE', cart_key, ttl)
    else
        redis.call('DEL', cart_key)
    end
    return {'ok', 0, 1}
end

local item = cjson.decode(existing)
item['quantity'] = quantity
redis.call('HSET', cart_key, product_id, cjson.encode(item))
redis.call('EXPIRE', cart_key, ttl)
return {'ok', quantity, 0}
";

/// Lua script for atomically merging a source cart into a target cart.
///
/// Every written source entry counts toward `merged`; entries that collided
/// with a target entry also count toward `conflicts`. Under `sum` the
/// quantities add and the source supplies price and variant; under
/// `last-write-wins` the source entry replaces the target entry verbatim.
/// The source key is deleted unconditionally, so a second merge of the same
/// source finds nothing and reports zero.
///
/// Replies: `{'ok', merged, conflicts}`.
pub const MERGE_CARTS_SCRIPT: &str = r"
local source_key = KEYS[1]
local target_key = KEYS[2]
local resolution = ARGV[1]
local ttl = tonumber(ARGV[2])

local source_items = redis.call('HGETALL', source_key)
if #source_items == 0 then
    return {'ok', 0, 0}
end

local target_map = {}
local target_items = redis.call('HGETALL', target_key)
for i = 1, #target_items, 2 do
    target_map[target_items[i]] = target_items[i + 1]
end

local merged = 0
local conflicts = 0

for i = 1, #source_items, 2 do
    local product_id = source_items[i]
    local payload = source_items[i + 1]
    local existing = target_map[product_id]
    if existing then
        conflicts = conflicts + 1
        if resolution == 'sum' then
            local item = cjson.decode(payload)
            local target_qty = tonumber(cjson.decode(existing)['quantity']) or 0
            item['quantity'] = (tonumber(item['quantity']) or 0) + target_qty
            payload = cjson.encode(item)
        end
    end
    redis.call('HSET', target_key, product_id, payload)
    merged = merged + 1
end

if redis.call('EXISTS', target_key) == 1 then
    redis.call('EXPIRE', target_key, ttl)
end

redis.call('DEL', source_key)

return {'ok', merged, conflicts}
";

/// Decoded reply of [`ADD_ITEM_SCRIPT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum AddVerdict {
    Applied { quantity: u32, is_new: bool },
    QuantityExceeded { limit: u32, requested: u32 },
    ItemsExceeded { limit: u32, current: u32 },
}

/// Decoded reply of [`UPDATE_QUANTITY_SCRIPT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum UpdateVerdict {
    Applied { quantity: u32, removed: bool },
    QuantityExceeded { limit: u32, requested: u32 },
    ProductMissing,
}

/// Decoded reply of [`MERGE_CARTS_SCRIPT`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum MergeVerdict {
    Merged { merged: u32, conflicts: u32 },
}

enum Reply<'a> {
    Ok(&'a [Value]),
    Err { code: &'a str, fields: &'a [Value] },
}

fn split_reply(value: &Value) -> Option<Reply<'_>> {
    let Value::Array(items) = value else {
        return None;
    };
    let (tag, rest) = items.split_first()?;
    match as_str(tag)? {
        "ok" => Some(Reply::Ok(rest)),
        "err" => {
            let (code, fields) = rest.split_first()?;
            Some(Reply::Err { code: as_str(code)?, fields })
        }
        _ => None,
    }
}

fn as_str(value: &Value) -> Option<&str> {
    match value {
        Value::BulkString(bytes) => std::str::from_utf8(bytes).ok(),
        Value::SimpleString(text) => Some(text),
        _ => None,
    }
}

fn as_u32(value: &Value) -> Option<u32> {
    match value {
        Value::Int(n) => u32::try_from(*n).ok(),
        _ => None,
    }
}

fn unexpected_reply(operation: &str, value: &Value) -> Error {
    Error::UnknownOutcome(format!("{operation} returned an unrecognized reply: {value:?}"))
}

/// Every reply shape the add script can produce, and nothing else. Anything
/// unrecognized means the write may or may not have landed, which callers
/// must treat differently from a definite failure.
pub fn decode_add(value: &Value) -> Result<AddVerdict> {
    match split_reply(value) {
        Some(Reply::Ok([quantity, is_new])) => match (as_u32(quantity), as_u32(is_new)) {
            (Some(quantity), Some(flag)) => {
                Ok(AddVerdict::Applied { quantity, is_new: flag == 1 })
            }
            _ => Err(unexpected_reply("add-item", value)),
        },
        Some(Reply::Err { code: "MAX_QUANTITY_EXCEEDED", fields: [limit, requested] }) => {
            match (as_u32(limit), as_u32(requested)) {
                (Some(limit), Some(requested)) => {
                    Ok(AddVerdict::QuantityExceeded { limit, requested })
                }
                _ => Err(unexpected_reply("add-item", value)),
            }
        }
        Some(Reply::Err { code: "MAX_ITEMS_EXCEEDED", fields: [limit, current] }) => {
            match (as_u32(limit), as_u32(current)) {
                (Some(limit), Some(current)) => Ok(AddVerdict::ItemsExceeded { limit, current }),
                _ => Err(unexpected_reply("add-item", value)),
            }
        }
        _ => Err(unexpected_reply("add-item", value)),
    }
}

pub fn decode_update(value: &Value) -> Result<UpdateVerdict> {
    match split_reply(value) {
        Some(Reply::Ok([quantity, removed])) => match (as_u32(quantity), as_u32(removed)) {
            (Some(quantity), Some(flag)) => {
                Ok(UpdateVerdict::Applied { quantity, removed: flag == 1 })
            }
            _ => Err(unexpected_reply("update-quantity", value)),
        },
        Some(Reply::Err { code: "PRODUCT_NOT_FOUND", fields: [] }) => {
            Ok(UpdateVerdict::ProductMissing)
        }
        Some(Reply::Err { code: "MAX_QUANTITY_EXCEEDED", fields: [limit, requested] }) => {
            match (as_u32(limit), as_u32(requested)) {
                (Some(limit), Some(requested)) => {
                    Ok(UpdateVerdict::QuantityExceeded { limit, requested })
                }
                _ => Err(unexpected_reply("update-quantity", value)),
            }
        }
        _ => Err(unexpected_reply("update-quantity", value)),
    }
}

pub fn decode_merge(value: &Value) -> Result<MergeVerdict> {
    match split_reply(value) {
        Some(Reply::Ok([merged, conflicts])) => match (as_u32(merged), as_u32(conflicts)) {
            (Some(merged), Some(conflicts)) => Ok(MergeVerdict::Merged { merged, conflicts }),
            _ => Err(unexpected_reply("merge-carts", value)),
        },
        _ => Err(unexpected_reply("merge-carts", value)),
    }
}
