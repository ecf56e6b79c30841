//! License key generator for manual testing
//!
//! Run with: cargo run --example generate_hash -- pro 25

use chrono::Utc;
use license_codec::{encode, LicensePayloadV2, Tier};

fn main() {
    let mut args = std::env::args().skip(1);
    let tier_arg = args.next().unwrap_or_else(|| "free".to_string());
    let max_devices: u32 = args
        .next()
        .and_then(|s| s.parse().ok())
        .unwrap_or(if tier_arg.eq_ignore_ascii_case("free") { 1 } else { 10 });

    let tier = if tier_arg.eq_ignore_ascii_case("free") {
        Tier::Free
    } else {
        Tier::Pro(max_devices)
    };

    let secret = std::env::var("LICENSE_SIGNING_SECRET")
        .unwrap_or_else(|_| "dev-only-insecure-secret".to_string());

    let payload = LicensePayloadV2::new(tier, max_devices, Utc::now().date_naive())
        .with_company("Example Customer");

    let key = encode(&payload, secret.as_bytes()).expect("encode");

    println!("Tier: {tier}");
    println!("Max devices: {max_devices}");
    println!("Key: {key}");
    println!();
    println!("SQL INSERT:");
    println!(
        "INSERT INTO licenses (license_key, tier, max_devices, status) VALUES ('{key}', '{tier}', {max_devices}, 'active');"
    );
}
