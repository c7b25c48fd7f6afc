//! Terminal rendering for scanned payloads and admin API results.

use chrono::DateTime;
use serde_json::Value;

use qrgate_client::{ClientError, DeleteSession, DeleteState, SessionState, ValidationSession};
use qrgate_core::{DecodedPayload, Decryption, Subscription, User};

// ── Payload ──

/// Print a decoded payload as a card: heading, display text, then fields.
pub fn print_payload_card(payload: &DecodedPayload) {
    println!("=== {} ===", payload.kind.label());
    println!("{}", payload.display);
    println!();

    if let Some(Value::Object(fields)) = &payload.fields {
        println!("Fields");
        for (key, value) in fields {
            println!("  {:<26} {}", key, scalar(value));
        }
        println!();
    }

    match &payload.decryption {
        Decryption::NotAttempted => {}
        Decryption::Decrypted => {
            println!("Decryption");
            println!("  {:<26} yes", "decrypted");
            println!();
        }
        Decryption::Failed(reason) => {
            println!("Decryption");
            println!("  {:<26} {}", "error", reason);
            println!();
        }
    }
}

// ── Validation ──

pub fn print_validation(session: &ValidationSession) {
    let marker = match session.state() {
        SessionState::Pending => "…",
        SessionState::Success => "✓",
        SessionState::Failure => "✗",
        SessionState::TimedOut => "⏱",
    };
    println!("Validation");
    println!("  {:<26} {}", "key", session.derived_key());
    println!(
        "  {:<26} {} {}",
        "result",
        marker,
        session.result_message().unwrap_or("Validating...")
    );
    if let Some(data) = session.result_data() {
        if let Some(name) = &data.user_name {
            println!("  {:<26} {}", "user name", name);
        }
        if let Some(uses) = data.remaining_uses {
            println!("  {:<26} {}", "remaining uses", uses);
        }
        if let Some(at) = &data.validated_at {
            println!("  {:<26} {}", "validated at", long_date(at));
        }
    }
    println!();
}

// ── Deletion ──

pub fn print_delete(session: &DeleteSession) {
    let marker = match session.state {
        DeleteState::Deleted => "✓",
        DeleteState::Error => "✗",
        DeleteState::Idle | DeleteState::Deleting => "…",
    };
    println!("Deletion");
    if let Some(id) = &session.subscription_id {
        println!("  {:<26} {}", "subscription", id);
    }
    println!(
        "  {:<26} {} {}",
        "result",
        marker,
        session.message.as_deref().unwrap_or("Deleting...")
    );
    println!();
}

// ── Record lookups ──

pub fn print_user(user: &Result<User, ClientError>) {
    let user = match user {
        Ok(user) => user,
        Err(e) => {
            println!("User Error: {e}");
            println!();
            return;
        }
    };
    println!("User Information");
    println!("  {:<26} {}", "name", user.full_name);
    if let Some(email) = &user.email {
        println!("  {:<26} {}", "email", email);
    }
    if let Some(phone) = &user.phone {
        println!("  {:<26} {}", "phone", phone);
    }
    println!("  {:<26} {}", "member since", long_date(&user.created_at));
    if let Some(counts) = &user.counts
        && let Some(n) = counts.subscriptions
    {
        println!("  {:<26} {}", "subscriptions", n);
    }
    println!("  {:<26} {}", "user id", user.id);
    println!();
}

pub fn print_subscription(subscription: &Result<Subscription, ClientError>) {
    let sub = match subscription {
        Ok(sub) => sub,
        Err(e) => {
            println!("Subscription Error: {e}");
            println!();
            return;
        }
    };
    println!("Subscription Information");
    if let Some(plan) = &sub.plan {
        println!("  {:<26} {}", "plan", plan.name);
        println!("  {:<26} {:.2}", "price", plan.price);
        println!("  {:<26} {} days", "duration", plan.duration_days);
        if !plan.features.is_empty() {
            println!("  {:<26} {}", "features", plan.features.join(", "));
        }
    }
    println!(
        "  {:<26} {}",
        "status",
        if sub.is_active { "● Active" } else { "○ Inactive" }
    );
    println!("  {:<26} {}", "start date", long_date(&sub.start_date));
    println!("  {:<26} {}", "end date", long_date(&sub.end_date));
    println!("  {:<26} {}", "subscription id", sub.id);
    println!();
}

// ── Helpers ──

fn scalar(value: &Value) -> String {
    match value {
        Value::String(s) => s.clone(),
        other => other.to_string(),
    }
}

/// `January 5, 2025` for an RFC 3339 timestamp; anything else as given.
fn long_date(raw: &str) -> String {
    match DateTime::parse_from_rfc3339(raw) {
        Ok(ts) => ts.format("%B %-d, %Y").to_string(),
        Err(_) => raw.to_string(),
    }
}
