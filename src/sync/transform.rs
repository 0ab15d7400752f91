//! Turns platform payloads into index documents.
//!
//! The `text` of each document is a compact natural-language rendering that
//! the assistant's retrieval matches against; exact figures ride along in
//! `metadata` for the dashboard to render.

use crate::platform::{CatalogItem, Customer, Order, ShopProfile};
use crate::search_index::IndexDocument;
use serde_json::json;
use std::collections::BTreeMap;

pub(crate) fn shop_profile_documents(profile: &ShopProfile) -> Vec<IndexDocument> {
    let plan = profile.plan.as_deref().unwrap_or("unknown plan");
    let text = format!(
        "{} is a shop at {} trading in {} on the {} plan.",
        profile.name, profile.domain, profile.currency, plan
    );
    vec![
        IndexDocument::new(format!("shop-profile:{}", profile.id), text).with_metadata(json!({
            "name": profile.name,
            "domain": profile.domain,
            "currency": profile.currency,
            "timezone": profile.timezone,
            "plan": profile.plan,
        })),
    ]
}

pub(crate) fn catalog_documents(items: &[CatalogItem]) -> Vec<IndexDocument> {
    items
        .iter()
        .map(|item| {
            let mut text = format!(
                "{}: {:.2}, {} in stock.",
                item.title, item.price, item.inventory_quantity
            );
            if let Some(description) = &item.description {
                text.push(' ');
                text.push_str(description);
            }
            if !item.tags.is_empty() {
                text.push_str(&format!(" Tags: {}.", item.tags.join(", ")));
            }
            IndexDocument::new(format!("product:{}", item.id), text).with_metadata(json!({
                "title": item.title,
                "price": item.price,
                "inventory_quantity": item.inventory_quantity,
                "product_type": item.product_type,
                "vendor": item.vendor,
                "tags": item.tags,
            }))
        })
        .collect()
}

pub(crate) fn order_documents(orders: &[Order]) -> Vec<IndexDocument> {
    orders
        .iter()
        .map(|order| {
            let status = order.financial_status.as_deref().unwrap_or("unknown");
            let items = order
                .line_items
                .iter()
                .map(|line| format!("{}x {}", line.quantity, line.title))
                .collect::<Vec<_>>()
                .join(", ");
            let text = format!(
                "Order #{} placed {} for {:.2} {} ({}): {}.",
                order.order_number, order.created_at, order.total_price, order.currency, status, items
            );
            IndexDocument::new(format!("order:{}", order.id), text).with_metadata(json!({
                "order_number": order.order_number,
                "total_price": order.total_price,
                "currency": order.currency,
                "financial_status": order.financial_status,
                "created_at": order.created_at,
                "customer_id": order.customer_id,
            }))
        })
        .collect()
}

pub(crate) fn customer_documents(customers: &[Customer]) -> Vec<IndexDocument> {
    customers
        .iter()
        .map(|customer| {
            let name = match (&customer.first_name, &customer.last_name) {
                (Some(first), Some(last)) => format!("{first} {last}"),
                (Some(first), None) => first.clone(),
                (None, Some(last)) => last.clone(),
                (None, None) => "Unnamed customer".to_string(),
            };
            let location = match (&customer.city, &customer.country) {
                (Some(city), Some(country)) => format!(" from {city}, {country}"),
                (Some(city), None) => format!(" from {city}"),
                (None, Some(country)) => format!(" from {country}"),
                (None, None) => String::new(),
            };
            let text = format!(
                "{name}{location}: {} orders, {:.2} spent in total.",
                customer.orders_count, customer.total_spent
            );
            IndexDocument::new(format!("customer:{}", customer.id), text).with_metadata(json!({
                "email": customer.email,
                "orders_count": customer.orders_count,
                "total_spent": customer.total_spent,
                "city": customer.city,
                "country": customer.country,
            }))
        })
        .collect()
}

/// Monthly revenue rollups plus a lifetime summary, computed from orders.
///
/// The month key comes from the RFC 3339 `created_at` prefix; timestamps too
/// short to carry one are bucketed under "unknown" rather than dropped.
pub(crate) fn aggregate_documents(orders: &[Order]) -> Vec<IndexDocument> {
    if orders.is_empty() {
        return Vec::new();
    }

    let currency = orders[0].currency.clone();
    let mut months: BTreeMap<String, (usize, f64)> = BTreeMap::new();
    let mut lifetime_revenue = 0.0;

    for order in orders {
        let month = month_key(&order.created_at);
        let entry = months.entry(month).or_insert((0, 0.0));
        entry.0 += 1;
        entry.1 += order.total_price;
        lifetime_revenue += order.total_price;
    }

    let mut documents: Vec<IndexDocument> = months
        .iter()
        .map(|(month, (count, revenue))| {
            let text = format!(
                "Sales for {month}: {count} orders, {revenue:.2} {currency} in revenue."
            );
            IndexDocument::new(format!("aggregate:{month}"), text).with_metadata(json!({
                "month": month,
                "order_count": count,
                "revenue": revenue,
                "currency": currency,
            }))
        })
        .collect();

    documents.push(
        IndexDocument::new(
            "aggregate:lifetime",
            format!(
                "Lifetime sales: {} orders, {lifetime_revenue:.2} {currency} in revenue.",
                orders.len()
            ),
        )
        .with_metadata(json!({
            "order_count": orders.len(),
            "revenue": lifetime_revenue,
            "currency": currency,
        })),
    );

    documents
}

fn month_key(created_at: &str) -> String {
    if created_at.len() >= 7 && created_at.as_bytes()[4] == b'-' {
        created_at[..7].to_string()
    } else {
        "unknown".to_string()
    }
}
