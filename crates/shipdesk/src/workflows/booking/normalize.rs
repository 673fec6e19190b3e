use std::collections::{BTreeMap, BTreeSet};

use super::domain::{CarrierId, CarrierOffer, OrderId};
use super::upstream::{CarrierQuote, RateSheet, RateTier};

/// Collapse a raw upstream rate sheet into one canonical offer list per order.
///
/// Pure and deterministic: the same sheet always yields the same map. Orders
/// with no serviceable carrier keep an empty entry rather than disappearing.
pub fn normalize_rate_sheet(sheet: &RateSheet) -> BTreeMap<OrderId, Vec<CarrierOffer>> {
    let mut normalized = BTreeMap::new();

    for order in &sheet.orders {
        let mut offers = Vec::new();
        let mut seen: BTreeSet<CarrierId> = BTreeSet::new();

        for quote in &order.courier_partner_rates {
            let Some(offer) = offer_from_quote(quote) else {
                continue;
            };
            // Upstream occasionally repeats a carrier; the first record wins.
            if !seen.insert(offer.carrier_id.clone()) {
                continue;
            }
            offers.push(offer);
        }

        normalized.insert(order.id.clone(), offers);
    }

    normalized
}

/// A placeholder record is how some carriers signal "decline to quote": no
/// partner id or no rate tiers. Those are dropped, not kept as free offers.
fn offer_from_quote(quote: &CarrierQuote) -> Option<CarrierOffer> {
    let carrier_id = quote
        .courier_partner_id
        .as_ref()
        .filter(|id| !id.0.trim().is_empty())?
        .clone();
    let tier = quote.rate.first()?;

    let carrier_name = tier
        .name
        .as_deref()
        .or(quote.name.as_deref())
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .unwrap_or_else(|| carrier_id.0.clone());

    Some(offer_from_tier(carrier_id, carrier_name, tier))
}

fn offer_from_tier(carrier_id: CarrierId, carrier_name: String, tier: &RateTier) -> CarrierOffer {
    CarrierOffer {
        carrier_id,
        carrier_name,
        freight: tier.freight_charges.unwrap_or(0.0),
        insurance: tier.insurance_charges.unwrap_or(0.0),
        cod_charge: tier.cod_charges.unwrap_or(0.0),
        early_cod_charge: tier.early_cod_charges.unwrap_or(0.0),
        gst: tier.gst_amount.unwrap_or(0.0),
        gross: tier.gross_amount.unwrap_or(0.0),
        total_payable: tier.total_payable.unwrap_or(0.0),
        estimated_pickup: tier.estimated_pickup,
        estimated_delivery: tier.estimated_delivery,
        service_mode: tier.service_mode.clone(),
    }
}
