use async_trait::async_trait;
use clap::Args;
use std::sync::Arc;

use shipdesk::error::AppError;
use shipdesk::workflows::booking::{
    BookingDesk, CarrierId, CarrierQuote, CorrelationId, CreateSessionRequest,
    CreateSessionResponse, CreateShipmentsRequest, GetRatesRequest, OrderId, OrderQuotes,
    OrderRef, RateGateway, RateSheet, RateTier, RtoId, ShipmentAck, UpstreamError, WarehouseId,
};

#[derive(Args, Debug, Default)]
pub(crate) struct DemoArgs {
    /// Submit the batch without scheduling an automatic pickup
    #[arg(long)]
    pub(crate) no_auto_pickup: bool,
}

/// Canned upstream for demos: Falcon quotes two of the three orders,
/// SwiftShip quotes all of them.
struct ScriptedGateway;

fn scripted_tier(freight: f64, mode: &str) -> RateTier {
    RateTier {
        freight_charges: Some(freight),
        gst_amount: Some(freight * 0.18),
        gross_amount: Some(freight),
        total_payable: Some(freight * 1.18),
        service_mode: Some(mode.to_string()),
        ..RateTier::default()
    }
}

fn scripted_quote(carrier: &str, name: &str, freight: f64, mode: &str) -> CarrierQuote {
    CarrierQuote {
        courier_partner_id: Some(CarrierId(carrier.to_string())),
        name: Some(name.to_string()),
        rate: vec![scripted_tier(freight, mode)],
    }
}

fn scripted_sheet() -> RateSheet {
    RateSheet {
        orders: vec![
            OrderQuotes {
                id: OrderId("SO-7001".to_string()),
                courier_partner_rates: vec![
                    scripted_quote("falcon", "Falcon Express", 86.0, "surface"),
                    scripted_quote("swiftship", "SwiftShip", 97.0, "air"),
                ],
            },
            OrderQuotes {
                id: OrderId("SO-7002".to_string()),
                courier_partner_rates: vec![
                    scripted_quote("falcon", "Falcon Express", 92.0, "surface"),
                    scripted_quote("swiftship", "SwiftShip", 101.0, "air"),
                ],
            },
            OrderQuotes {
                id: OrderId("SO-7003".to_string()),
                courier_partner_rates: vec![
                    // Falcon declines this lane with a placeholder record.
                    CarrierQuote::default(),
                    scripted_quote("swiftship", "SwiftShip", 88.0, "surface"),
                ],
            },
        ],
    }
}

#[async_trait]
impl RateGateway for ScriptedGateway {
    async fn create_session(
        &self,
        _request: CreateSessionRequest,
    ) -> Result<CreateSessionResponse, UpstreamError> {
        Ok(CreateSessionResponse {
            uuid: CorrelationId("demo-session-1".to_string()),
        })
    }

    async fn fetch_rates(&self, _request: GetRatesRequest) -> Result<RateSheet, UpstreamError> {
        Ok(scripted_sheet())
    }

    async fn create_shipments(
        &self,
        request: CreateShipmentsRequest,
    ) -> Result<ShipmentAck, UpstreamError> {
        Ok(ShipmentAck {
            success: true,
            message: format!("{} shipments queued for pickup", request.order_ids.len()),
        })
    }
}

fn pending_orders() -> Vec<OrderRef> {
    vec![
        OrderRef {
            id: OrderId("SO-7001".to_string()),
            channel_reference: "AMZ-118204".to_string(),
            consignee: "Asha Traders".to_string(),
            destination_pincode: "560001".to_string(),
            payment_mode: "prepaid".to_string(),
            cod_amount: 0.0,
        },
        OrderRef {
            id: OrderId("SO-7002".to_string()),
            channel_reference: "SHP-55612".to_string(),
            consignee: "Meridian Exports".to_string(),
            destination_pincode: "400053".to_string(),
            payment_mode: "cod".to_string(),
            cod_amount: 2149.0,
        },
        OrderRef {
            id: OrderId("SO-7003".to_string()),
            channel_reference: "SHP-55619".to_string(),
            consignee: "Kaveri Home Goods".to_string(),
            destination_pincode: "641002".to_string(),
            payment_mode: "prepaid".to_string(),
            cod_amount: 0.0,
        },
    ]
}

pub(crate) async fn run_demo(args: DemoArgs) -> Result<(), AppError> {
    println!("Bulk rate-shopping and booking demo");

    let desk = BookingDesk::new(Arc::new(ScriptedGateway));
    let listing = pending_orders();
    let batch = desk.open_batch(&listing);
    let order_ids: Vec<OrderId> = listing.iter().map(|order| order.id.clone()).collect();
    batch.select_all(&order_ids)?;
    println!("\nSelected {} pending orders", order_ids.len());

    let correlation = batch
        .create_session(
            WarehouseId("W-DEL-01".to_string()),
            RtoId("RTO-DEL-01".to_string()),
        )
        .await?;
    println!("Rate session opened (correlation {})", correlation.0);

    let offers = batch.fetch_rates().await?;
    println!("\nNormalized offers:");
    for (order_id, order_offers) in &offers {
        if order_offers.is_empty() {
            println!("  {}: no carrier serviceable", order_id.0);
            continue;
        }
        for offer in order_offers {
            println!(
                "  {}: {} ₹{:.2} ({})",
                order_id.0,
                offer.carrier_name,
                offer.total_payable,
                offer.service_mode.as_deref().unwrap_or("surface"),
            );
        }
    }

    let falcon = CarrierId("falcon".to_string());
    let report = batch.apply_bulk(&falcon, &order_ids)?;
    println!(
        "\nBulk pass ({}): {} assigned, {} skipped",
        falcon.0,
        report.assigned.len(),
        report.skipped.len()
    );
    for skipped in &report.skipped {
        println!("  skipped {} ({:?})", skipped.order_id.0, skipped.reason);
    }

    let swiftship = CarrierId("swiftship".to_string());
    let manual = batch.apply_individual(&OrderId("SO-7003".to_string()), &swiftship)?;
    println!(
        "Manual pick for SO-7003: {} ₹{:.2}",
        manual.carrier_name, manual.total_payable
    );

    let receipt = batch.submit(!args.no_auto_pickup).await?;
    println!(
        "\nSubmission {}: {}",
        if receipt.accepted { "accepted" } else { "rejected" },
        receipt.message
    );
    for (order_id, outcome) in &receipt.outcomes {
        println!("  {} -> {}", order_id.0, outcome.label());
    }

    Ok(())
}
