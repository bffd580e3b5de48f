//! Service and price resolution helpers shared by the flows

use chatdesk_core::Service;
use chatdesk_matching::fuzzy::{best_similarity, normalize};

/// Similarity a service name needs to count as recognized
const SERVICE_MATCH_THRESHOLD: f64 = 0.80;

/// Find the service a free-text message refers to
///
/// Substring containment either way wins first (customers often send just
/// "oil change" or embed the name in a sentence); otherwise the closest name
/// above the fuzzy threshold. First containment hit wins, keeping the result
/// stable under catalog ordering.
pub fn match_service<'a>(services: &'a [Service], text: &str) -> Option<&'a Service> {
    let normalized = normalize(text);
    if normalized.is_empty() {
        return None;
    }

    for service in services {
        let name = normalize(&service.name);
        if name.is_empty() {
            continue;
        }
        // Very short inputs only match in the forward direction, so a stray
        // "hi" cannot select a service whose name happens to contain it
        if normalized.contains(&name) || (normalized.len() >= 3 && name.contains(&normalized)) {
            return Some(service);
        }
    }

    let mut best: Option<(f64, &Service)> = None;
    for service in services {
        let sim = best_similarity(text, &[service.name.as_str()]);
        if sim >= SERVICE_MATCH_THRESHOLD {
            match best {
                Some((score, _)) if sim <= score => {}
                _ => best = Some((sim, service)),
            }
        }
    }
    best.map(|(_, service)| service)
}

/// Resolve a location-specific price by mutual substring containment
///
/// The customer's text may contain the configured location or vice versa
/// ("VI" vs "Victoria Island, VI"). Absence of a match is not an error;
/// location pricing is advisory.
pub fn resolve_location_price(service: &Service, location_text: &str) -> Option<i64> {
    let text = location_text.trim().to_lowercase();
    if text.is_empty() {
        return None;
    }
    service.pricing_rules.iter().find_map(|rule| {
        let rule_loc = rule.location.to_lowercase();
        (text.contains(&rule_loc) || rule_loc.contains(&text)).then_some(rule.price)
    })
}

/// Resolve the fee due at booking confirmation
///
/// An explicit commitment fee always takes precedence over a matched location
/// price, even a numerically larger one: the commitment fee is a flat deposit,
/// independent of the full location-based quote.
pub fn resolve_fee(service: &Service, location_price: Option<i64>) -> i64 {
    if let Some(fee) = service.commitment_fee {
        return fee;
    }
    match location_price {
        Some(price) if price > 0 => price,
        _ => 0,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn catalog() -> Vec<Service> {
        vec![
            Service::new("biz-1", "Oil Change", 45, 25_000),
            Service::new("biz-1", "Wheel Alignment", 60, 40_000),
            Service::new("biz-1", "Pre-purchase Inspection", 90, 0)
                .category("Inspection")
                .pricing_rule("Lekki", 150_000)
                .pricing_rule("Ikeja", 120_000),
        ]
    }

    #[test]
    fn test_service_substring_match() {
        let services = catalog();
        let hit = match_service(&services, "I'd like an oil change please").unwrap();
        assert_eq!(hit.name, "Oil Change");
    }

    #[test]
    fn test_service_fuzzy_match() {
        let services = catalog();
        let hit = match_service(&services, "wheel alignmnt").unwrap();
        assert_eq!(hit.name, "Wheel Alignment");
    }

    #[test]
    fn test_service_no_match() {
        let services = catalog();
        assert!(match_service(&services, "paint my house").is_none());
        assert!(match_service(&services, "").is_none());
    }

    #[test]
    fn test_location_price_mutual_containment() {
        let services = catalog();
        let inspection = &services[2];

        // Customer text contains the rule location
        assert_eq!(
            resolve_location_price(inspection, "somewhere in Lekki phase 1"),
            Some(150_000)
        );
        // Rule location contains the customer text
        assert_eq!(resolve_location_price(inspection, "ikeja"), Some(120_000));
        assert_eq!(resolve_location_price(inspection, "Abuja"), None);
    }

    #[test]
    fn test_commitment_fee_beats_larger_location_price() {
        let service = Service::new("biz-1", "Pre-purchase Inspection", 90, 0)
            .commitment_fee(50_000)
            .pricing_rule("Lekki", 150_000);

        let location_price = resolve_location_price(&service, "Lekki");
        assert_eq!(location_price, Some(150_000));
        assert_eq!(resolve_fee(&service, location_price), 50_000);
    }

    #[test]
    fn test_fee_falls_back_to_location_then_zero() {
        let service = Service::new("biz-1", "Oil Change", 45, 25_000);
        assert_eq!(resolve_fee(&service, Some(30_000)), 30_000);
        assert_eq!(resolve_fee(&service, Some(0)), 0);
        assert_eq!(resolve_fee(&service, None), 0);
    }
}
