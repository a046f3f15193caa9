//! Offline unified-order signing example.
//!
//! Builds a NATIVE order, finalizes it with a generated nonce and the host's
//! IPv4 address, and prints the signed request document. Nothing is sent.
//!
//! # Running this example
//!
//! Set the merchant API secret, or fall back to the public sandbox secret:
//! ```bash
//! export WXPAY_KEY=<32-character API secret>
//! cargo run --example sign_order
//! ```

#![allow(
    clippy::print_stdout,
    clippy::print_stderr,
    clippy::uninlined_format_args,
    reason = "examples are allowed to use println and simple formatting"
)]

use std::env;

use wxpay_order::{
    TradeType, UnifiedOrder,
    order::{SignKey, UNIFIED_ORDER_URL},
};

/// Sandbox secret published with the gateway's signing walkthrough.
const SANDBOX_KEY: &str = "192006250b4c09247ec02edce69f6a2d";

/// Loads the signing secret from `WXPAY_KEY`.
///
/// # Security Warning
///
/// Never hardcode production secrets. The sandbox fallback only exists so the
/// example runs without setup.
fn load_secret() -> String {
    env::var("WXPAY_KEY").unwrap_or_else(|_| {
        eprintln!("WXPAY_KEY not set, using the sandbox secret\n");
        SANDBOX_KEY.to_owned()
    })
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    println!("WeChat Pay: Unified Order Signing Example\n");

    // Step 1: Collect order fields
    println!("1. Building order for {}...", UNIFIED_ORDER_URL);
    let secret = load_secret();
    let mut order = UnifiedOrder::new(secret.as_str());
    order
        .appid("wxd930ea5d5a258f4f")
        .mch_id("10000100")
        .sub_mch_id("1900000109")
        .body("Ipad mini 16G")
        .out_trade_no("20150806125346")
        .total_fee(888)
        .notify_url("https://example.com/wxpay/notify")
        .trade_type(TradeType::Native)
        .product_id("12235413214070356458058");
    println!("   {} fields set", order.fields().len());

    // Step 2: Inject nonce and IP, sign, check required fields
    println!("\n2. Finalizing...");
    let signed = order.finalize()?;
    println!("   nonce_str:        {}", signed.nonce().unwrap_or("-"));
    match signed.spbill_create_ip() {
        Some(ip) => println!("   spbill_create_ip: {}", ip),
        None => println!("   spbill_create_ip: -"),
    }
    println!("   sign:             {}", signed.sign());

    // Step 3: Check the signature the way the gateway does
    println!("\n3. Verifying signature...");
    if SignKey::new(secret).verify(signed.as_fields()) {
        println!("   ✓ Signature matches");
    } else {
        return Err("signature did not verify".into());
    }

    // Step 4: Encode the wire document
    println!("\n4. Encoding request document...");
    let document = signed.to_xml(Some("xml"))?;
    println!("   {} bytes\n", document.len());
    println!("{}", String::from_utf8_lossy(&document));

    println!("\n✓ Signing example complete");
    println!("\nNext steps:");
    println!("  - POST the document with Content-Type text/xml;charset=UTF-8");
    println!("  - Or run the CLI with --dry-run to do the same from a config file");

    Ok(())
}
