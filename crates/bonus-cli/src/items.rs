// Line item parsing for the --item flag
//
// Each item is written as PRODUCT:QUANTITY:UNIT_PRICE, for example
// `espresso:2:250`. The product id may itself contain colons; the last two
// segments are always quantity and price.

use anyhow::{anyhow, Result};
use serde_json::{json, Value};

/// Parses a list of `PRODUCT:QTY:PRICE` strings into the `lineItems` JSON array.
///
/// Only the shape is checked here. Amount rules (positive quantity,
/// non-negative price, positive total) are enforced by the server so the CLI
/// reports exactly what the storefront would.
pub fn parse_items(args: &[String]) -> Result<Value> {
    if args.is_empty() {
        return Err(anyhow!("At least one --item is required"));
    }

    let items = args
        .iter()
        .map(|arg| parse_item(arg))
        .collect::<Result<Vec<_>>>()?;

    Ok(Value::Array(items))
}

/// Parses a single "product:qty:price" string.
fn parse_item(arg: &str) -> Result<Value> {
    let mut parts = arg.rsplitn(3, ':');
    let (price, quantity, product) = match (parts.next(), parts.next(), parts.next()) {
        (Some(price), Some(quantity), Some(product)) => (price, quantity, product),
        _ => {
            return Err(anyhow!(
                "Invalid item format: '{}'. Expected 'product:quantity:price'",
                arg
            ))
        }
    };

    let product = product.trim();
    if product.is_empty() {
        return Err(anyhow!("Empty product id in item: '{}'", arg));
    }

    let quantity: i64 = quantity
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid quantity '{}' in item: '{}'", quantity, arg))?;
    let unit_price: i64 = price
        .trim()
        .parse()
        .map_err(|_| anyhow!("Invalid price '{}' in item: '{}'", price, arg))?;

    Ok(json!({
        "productId": product,
        "quantity": quantity,
        "unitPrice": unit_price,
    }))
}
