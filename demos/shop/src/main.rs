//! Demo shop
//!
//! `shop build` deploys it, `shop serve` runs inside the container.

use kubescript::{App, Context, HandlerError, Invocation, Reply};
use serde::{Deserialize, Serialize};
use std::process::ExitCode;

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
struct CartItem {
    sku: String,
    quantity: u32,
}

#[derive(Debug, Serialize)]
struct OrderCreated {
    items: Vec<CartItem>,
}

async fn show_cart(_req: Invocation, _ctx: Context) -> Result<Reply, HandlerError> {
    Ok(Reply::json(serde_json::json!({ "items": [] })))
}

async fn checkout(req: Invocation, ctx: Context) -> Result<Reply, HandlerError> {
    let items: Vec<CartItem> = serde_json::from_value(req.body)?;
    if items.is_empty() {
        return Err(HandlerError::with_status(422, "cart is empty"));
    }

    let order = OrderCreated { items };
    ctx.emit("order.created", &order).await?;
    Ok(Reply::json(serde_json::json!({ "accepted": order.items.len() })).with_status(201))
}

async fn order_created(req: Invocation, _ctx: Context) -> Result<Reply, HandlerError> {
    tracing::info!(order = %req.body, "Order received");
    Ok(Reply::empty())
}

fn app() -> App {
    let mut app = App::new();
    app.get("/cart", show_cart)
        .post("/cart", checkout)
        .on("order.created", order_created);
    app
}

#[tokio::main]
async fn main() -> ExitCode {
    kubescript::launch(app()).await
}
