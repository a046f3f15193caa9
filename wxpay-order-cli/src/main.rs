//! Command-line client for the WeChat Pay unified-order endpoint.
//!
//! Reads merchant settings from a TOML file and the signing key from the environment,
//! builds one order from the command line, and prints the gateway reply.
//!
//! ```text
//! WXPAY_KEY=... wxpay-order --config wxpay.toml \
//!     --body "Ipad mini 16G" --out-trade-no 20150806125346 \
//!     --total-fee 888 --trade-type native --product-id 12235413214070356458058
//! ```

mod observability;

use std::{
    io::{self, Write},
    path::PathBuf,
};

use clap::Parser;
use miette::{IntoDiagnostic, Result};
use tracing::info;
use wxpay_order::{GatewayConfig, TradeType, UnifiedOrderClient};

use crate::observability::{LogFormat, init_observability};

#[derive(Debug, Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Gateway configuration file (TOML)
    #[arg(long, short)]
    config: PathBuf,

    /// Short order description
    #[arg(long)]
    body: String,

    /// Merchant-side order number
    #[arg(long)]
    out_trade_no: String,

    /// Order total in cents
    #[arg(long)]
    total_fee: i64,

    /// Trade type: jsapi, native or app
    #[arg(long)]
    trade_type: TradeType,

    /// Product ID, needed for native payments
    #[arg(long)]
    product_id: Option<String>,

    /// Payer ID, needed for JSAPI payments
    #[arg(long)]
    openid: Option<String>,

    /// Merchant data echoed back by the gateway
    #[arg(long)]
    attach: Option<String>,

    /// Print the signed request document instead of sending it
    #[arg(long)]
    dry_run: bool,

    /// Log format, overrides LOG_FORMAT (pretty or json)
    #[arg(long)]
    log_format: Option<LogFormat>,
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_observability(cli.log_format.unwrap_or_else(LogFormat::from_env));

    let config = GatewayConfig::from_file(&cli.config).into_diagnostic()?;
    let client = UnifiedOrderClient::from_config(config.transport().into_diagnostic()?, &config);

    let mut order = config.new_order().into_diagnostic()?;
    order
        .body(cli.body)
        .out_trade_no(cli.out_trade_no)
        .total_fee(cli.total_fee)
        .trade_type(cli.trade_type);
    if let Some(product_id) = cli.product_id {
        order.product_id(product_id);
    }
    if let Some(openid) = cli.openid {
        order.openid(openid);
    }
    if let Some(attach) = cli.attach {
        order.attach(attach);
    }

    let output = if cli.dry_run {
        let document = client.prepare(&mut order).into_diagnostic()?;
        info!(bytes = document.len(), "dry run, request not sent");
        document
    } else {
        let response = client.submit(&mut order).await.into_diagnostic()?;
        response.text().into_bytes()
    };

    let mut stdout = io::stdout().lock();
    stdout.write_all(&output).into_diagnostic()?;
    writeln!(stdout).into_diagnostic()?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use clap::CommandFactory;

    use super::*;

    #[test]
    fn test_cli_definition() {
        Cli::command().debug_assert();
    }

    #[test]
    fn test_cli_parses_order_flags() {
        let cli = Cli::try_parse_from([
            "wxpay-order",
            "--config",
            "wxpay.toml",
            "--body",
            "Ipad mini 16G",
            "--out-trade-no",
            "20150806125346",
            "--total-fee",
            "888",
            "--trade-type",
            "native",
            "--product-id",
            "12235413214070356458058",
            "--dry-run",
        ])
        .unwrap();

        assert_eq!(cli.config, PathBuf::from("wxpay.toml"));
        assert_eq!(cli.total_fee, 888);
        assert_eq!(cli.trade_type, TradeType::Native);
        assert_eq!(cli.product_id.as_deref(), Some("12235413214070356458058"));
        assert!(cli.dry_run);
        assert!(cli.openid.is_none());
        assert!(cli.log_format.is_none());
    }

    #[test]
    fn test_cli_rejects_unknown_trade_type() {
        let result = Cli::try_parse_from([
            "wxpay-order",
            "--config",
            "wxpay.toml",
            "--body",
            "b",
            "--out-trade-no",
            "1",
            "--total-fee",
            "1",
            "--trade-type",
            "mweb",
        ]);
        assert!(result.is_err());
    }

    #[test]
    fn test_cli_log_format_flag() {
        let cli = Cli::try_parse_from([
            "wxpay-order",
            "-c",
            "wxpay.toml",
            "--body",
            "b",
            "--out-trade-no",
            "1",
            "--total-fee",
            "1",
            "--trade-type",
            "app",
            "--log-format",
            "json",
        ])
        .unwrap();
        assert_eq!(cli.log_format, Some(LogFormat::Json));
    }
}
