use super::common::*;
use crate::workflows::booking::normalize_rate_sheet;
use crate::workflows::booking::upstream::{CarrierQuote, RateTier};

#[test]
fn placeholder_records_are_dropped() {
    let sheet = sheet(vec![order_quotes(
        "101",
        vec![
            quote("CarrierX", vec![tier(50.0)]),
            // Decline-to-quote: no partner id at all.
            CarrierQuote {
                courier_partner_id: None,
                name: Some("Ghost Freight".to_string()),
                rate: vec![tier(10.0)],
            },
            // Decline-to-quote: blank partner id.
            CarrierQuote {
                courier_partner_id: Some(carrier_id("  ")),
                name: None,
                rate: vec![tier(10.0)],
            },
            // Decline-to-quote: no rate tiers.
            quote("CarrierY", Vec::new()),
        ],
    )]);

    let normalized = normalize_rate_sheet(&sheet);
    let offers = &normalized[&order_id("101")];

    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].carrier_id, carrier_id("CarrierX"));
}

#[test]
fn missing_charges_default_to_zero() {
    let sheet = sheet(vec![order_quotes(
        "101",
        vec![quote(
            "CarrierX",
            vec![RateTier {
                freight_charges: Some(50.0),
                ..RateTier::default()
            }],
        )],
    )]);

    let normalized = normalize_rate_sheet(&sheet);
    let offer = &normalized[&order_id("101")][0];

    assert_eq!(offer.freight, 50.0);
    assert_eq!(offer.insurance, 0.0);
    assert_eq!(offer.cod_charge, 0.0);
    assert_eq!(offer.early_cod_charge, 0.0);
    assert_eq!(offer.gst, 0.0);
    assert_eq!(offer.gross, 0.0);
    assert_eq!(offer.total_payable, 0.0);
}

#[test]
fn tier_name_overrides_carrier_name() {
    let sheet = sheet(vec![order_quotes(
        "101",
        vec![quote(
            "CarrierX",
            vec![RateTier {
                name: Some("CarrierX Surface 2kg".to_string()),
                ..tier(50.0)
            }],
        )],
    )]);

    let normalized = normalize_rate_sheet(&sheet);
    assert_eq!(
        normalized[&order_id("101")][0].carrier_name,
        "CarrierX Surface 2kg"
    );
}

#[test]
fn carrier_name_falls_back_to_partner_id() {
    let sheet = sheet(vec![order_quotes(
        "101",
        vec![CarrierQuote {
            courier_partner_id: Some(carrier_id("CarrierX")),
            name: None,
            rate: vec![tier(50.0)],
        }],
    )]);

    let normalized = normalize_rate_sheet(&sheet);
    assert_eq!(normalized[&order_id("101")][0].carrier_name, "CarrierX");
}

#[test]
fn zero_offer_orders_survive_normalization() {
    let normalized = normalize_rate_sheet(&standard_sheet());

    assert_eq!(normalized[&order_id("101")].len(), 2);
    assert_eq!(normalized[&order_id("102")].len(), 1);
    assert!(normalized[&order_id("103")].is_empty());
}

#[test]
fn duplicate_carrier_keeps_the_first_record() {
    let sheet = sheet(vec![order_quotes(
        "101",
        vec![
            quote("CarrierX", vec![tier(50.0)]),
            quote("CarrierX", vec![tier(99.0)]),
        ],
    )]);

    let normalized = normalize_rate_sheet(&sheet);
    let offers = &normalized[&order_id("101")];

    assert_eq!(offers.len(), 1);
    assert_eq!(offers[0].freight, 50.0);
}

#[test]
fn normalization_is_deterministic() {
    let sheet = standard_sheet();

    let first = serde_json::to_string(&normalize_rate_sheet(&sheet)).expect("serializes");
    let second = serde_json::to_string(&normalize_rate_sheet(&sheet)).expect("serializes");

    assert_eq!(first, second);
}
