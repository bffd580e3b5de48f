//! Templated reply text
//!
//! All customer-facing copy outside the flows lives here, so the processor
//! stays pure orchestration. Templates degrade gracefully when catalog or
//! profile data is missing; they never error.

use chrono::{DateTime, Datelike, Timelike, Utc, Weekday};

use chatdesk_core::{format_money, BusinessProfile, Service};

/// Cap on catalog lines and attached images in a single reply
const CATALOG_LIMIT: usize = 10;
const MEDIA_LIMIT: usize = 3;

pub fn greeting(
    profile: Option<&BusinessProfile>,
    services: &[Service],
    customer_name: Option<&str>,
) -> String {
    let hello = match customer_name {
        Some(name) => format!("Hello {name}!"),
        None => "Hello!".to_string(),
    };
    let welcome = match profile {
        Some(p) => format!("{hello} Welcome to {}.", p.name),
        None => format!("{hello} Welcome."),
    };
    if services.is_empty() {
        return format!("{welcome} How can we help you today?");
    }
    format!(
        "{welcome} Here's what we offer:\n{}\nReply with a service name to book, \
         or ask me anything.",
        render_catalog(services)
    )
}

pub fn render_catalog(services: &[Service]) -> String {
    if services.is_empty() {
        return "Our service list is being updated; reply 'help' to reach our team.".to_string();
    }
    services
        .iter()
        .take(CATALOG_LIMIT)
        .map(|s| {
            format!(
                "- {} ({} mins): {}",
                s.name,
                s.duration_minutes,
                format_money(s.price)
            )
        })
        .collect::<Vec<_>>()
        .join("\n")
}

/// Image attachments for a catalog-style reply
pub fn catalog_media(services: &[Service]) -> Vec<String> {
    services
        .iter()
        .flat_map(|s| s.image_urls.iter().cloned())
        .take(MEDIA_LIMIT)
        .collect()
}

pub fn services_reply(services: &[Service]) -> String {
    format!("Here's what we offer:\n{}", render_catalog(services))
}

pub fn pricing_reply(services: &[Service]) -> String {
    format!(
        "Here are our prices:\n{}\nReply with a service name to book.",
        render_catalog(services)
    )
}

/// Price details for one specific service, including per-location rules
pub fn pricing_for(service: &Service) -> String {
    let mut lines = vec![format!(
        "{}: {} ({} mins)",
        service.name,
        format_money(service.price),
        service.duration_minutes
    )];
    if service.has_location_pricing() {
        lines.push("Pricing by location:".to_string());
        for rule in &service.pricing_rules {
            lines.push(format!("- {}: {}", rule.location, format_money(rule.price)));
        }
    }
    if let Some(fee) = service.commitment_fee {
        lines.push(format!(
            "A {} deposit confirms your booking.",
            format_money(fee)
        ));
    }
    lines.push("Reply 'book' to schedule.".to_string());
    lines.join("\n")
}

pub fn hours_reply(profile: Option<&BusinessProfile>, now: DateTime<Utc>) -> String {
    let Some(profile) = profile else {
        return "Please reach out to our team directly for opening hours.".to_string();
    };
    if profile.hours.is_empty() {
        return format!(
            "Please reach out to {} directly for opening hours.",
            profile.name
        );
    }

    let mut lines = vec![format!("{} opening hours:", profile.name)];
    for entry in &profile.hours {
        if entry.closed {
            lines.push(format!("{}: closed", day_name(entry.day)));
        } else {
            lines.push(format!(
                "{}: {} - {}",
                day_name(entry.day),
                entry.open.format("%H:%M"),
                entry.close.format("%H:%M")
            ));
        }
    }

    let today = now.weekday();
    let minute_now = now.time().num_seconds_from_midnight();
    let open_now = profile.hours.iter().any(|entry| {
        entry.day == today
            && !entry.closed
            && entry.open.num_seconds_from_midnight() <= minute_now
            && minute_now < entry.close.num_seconds_from_midnight()
    });
    lines.push(
        if open_now {
            "We're open right now!"
        } else {
            "We're currently closed."
        }
        .to_string(),
    );
    lines.join("\n")
}

pub fn location_reply(profile: Option<&BusinessProfile>) -> String {
    match profile.and_then(|p| p.address.as_deref()) {
        Some(address) => format!("You can find us at: {address}"),
        None => "Our team will share directions with you shortly.".to_string(),
    }
}

pub fn delivery_reply() -> String {
    "We can arrange pick-up and drop-off for most services. Reply 'book' to \
     schedule, and mention delivery when we ask for your location."
        .to_string()
}

pub fn payment_reply() -> String {
    "To make a payment, use the link we sent with your booking. Reply 'status' \
     to see any outstanding balance, or 'help' to reach our team."
        .to_string()
}

pub fn help_reply() -> String {
    "No problem, connecting you to a human agent now. Someone from our team \
     will be with you shortly."
        .to_string()
}

pub fn clarifying_fallback() -> String {
    "I'm not sure I understood that. You can reply 'book' to schedule a \
     service, 'status' to check on a job, or 'help' to reach our team."
        .to_string()
}

pub fn escalation_fallback() -> String {
    "Sorry, something went wrong on our side. I'm connecting you to our team \
     so you're not kept waiting."
        .to_string()
}

pub fn thank_you_for_rating(code: &str, review_link: Option<&str>) -> String {
    let mut text = format!(
        "Thank you for the great rating! Here's a discount code for your next \
         visit: {code}"
    );
    if let Some(link) = review_link {
        text.push_str(&format!(
            "\nIf you have a minute, we'd love a public review: {link}"
        ));
    }
    text
}

pub fn apology_for_rating() -> String {
    "We're really sorry your experience fell short. Our team has been notified \
     and someone will reach out to make this right."
        .to_string()
}

fn day_name(day: Weekday) -> &'static str {
    match day {
        Weekday::Mon => "Monday",
        Weekday::Tue => "Tuesday",
        Weekday::Wed => "Wednesday",
        Weekday::Thu => "Thursday",
        Weekday::Fri => "Friday",
        Weekday::Sat => "Saturday",
        Weekday::Sun => "Sunday",
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chatdesk_core::DayHours;
    use chrono::{NaiveTime, TimeZone};

    fn profile_with_hours() -> BusinessProfile {
        let mut profile = BusinessProfile::new("biz-1", "AutoFix Garage");
        profile.hours = vec![
            DayHours {
                day: Weekday::Mon,
                open: NaiveTime::from_hms_opt(9, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(17, 0, 0).unwrap(),
                closed: false,
            },
            DayHours {
                day: Weekday::Sun,
                open: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
                close: NaiveTime::from_hms_opt(0, 0, 0).unwrap(),
                closed: true,
            },
        ];
        profile
    }

    #[test]
    fn test_hours_reply_open_now() {
        // Monday 2026-08-31 at 10:00 UTC
        let now = Utc.with_ymd_and_hms(2026, 8, 31, 10, 0, 0).unwrap();
        let text = hours_reply(Some(&profile_with_hours()), now);
        assert!(text.contains("Monday: 09:00 - 17:00"));
        assert!(text.contains("Sunday: closed"));
        assert!(text.contains("open right now"));
    }

    #[test]
    fn test_hours_reply_closed_now() {
        // Sunday
        let now = Utc.with_ymd_and_hms(2026, 8, 30, 10, 0, 0).unwrap();
        let text = hours_reply(Some(&profile_with_hours()), now);
        assert!(text.contains("currently closed"));
    }

    #[test]
    fn test_greeting_includes_catalog() {
        let services = vec![Service::new("biz-1", "Oil Change", 45, 25_000)];
        let text = greeting(Some(&profile_with_hours()), &services, Some("Ada"));
        assert!(text.contains("Hello Ada!"));
        assert!(text.contains("AutoFix Garage"));
        assert!(text.contains("Oil Change"));
    }

    #[test]
    fn test_pricing_for_lists_location_rules_and_deposit() {
        let service = Service::new("biz-1", "Inspection", 90, 0)
            .pricing_rule("Lekki", 150_000)
            .commitment_fee(20_000);
        let text = pricing_for(&service);
        assert!(text.contains("Lekki"));
        assert!(text.contains("₦1,500"));
        assert!(text.contains("deposit"));
    }

    #[test]
    fn test_empty_catalog_degrades() {
        let text = services_reply(&[]);
        assert!(text.contains("being updated"));
    }
}
