use crate::context::AppContext;
use crate::output::{json_line, Format, Status};
use owo_colors::OwoColorize;
use shopverse_core::Result;
use shopverse_tracking::backend::OrderHistory;

pub async fn list(ctx: &AppContext, status: Option<&str>, format: Format) -> Result<()> {
    let history = OrderHistory::new(ctx.client.clone(), ctx.session.clone());
    let orders = history.list(status).await?;

    if format.is_json() {
        json_line(&orders);
        return Ok(());
    }

    if orders.is_empty() {
        Status::info("No orders");
        return Ok(());
    }

    Status::header(&format!("{} orders", orders.len()));
    for order in &orders {
        println!(
            "  {}  {:<10} {:>9.2}  {}",
            order.order_date.dimmed(),
            order.status,
            order.total_price,
            order.order_id.dimmed()
        );
        for item in &order.items {
            println!("      {} x {} ({:.2})", item.quantity, item.name.as_deref().unwrap_or_default(), item.price);
        }
    }
    Ok(())
}
