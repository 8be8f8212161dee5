use std::sync::Arc;

use alloy::network::EthereumWallet;
use alloy::primitives::TxHash;
use alloy::providers::ProviderBuilder;
use alloy::signers::local::PrivateKeySigner;
use alloy::transports::http::reqwest::Url;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use tokenpay::calldata::parse_address;
use tokenpay::{
    Currency, PayError, PaymentConfig, PaymentIntent, PaymentMachine, PaymentObserver,
    ProviderGateway,
};

/// Prints progress to stderr so stdout stays machine-readable.
struct ConsoleObserver;

impl PaymentObserver for ConsoleObserver {
    fn on_processing_started(&self) {
        eprintln!("Processing payment...");
    }

    fn on_completed(&self, tx: TxHash) {
        eprintln!("Payment submitted: {tx}");
    }

    fn on_failed(&self) {
        eprintln!("Payment failed.");
    }
}

fn required(key: &'static str) -> Result<String, PayError> {
    std::env::var(key)
        .ok()
        .filter(|s| !s.trim().is_empty())
        .ok_or_else(|| PayError::Config(format!("{key} environment variable is required")))
}

fn parse_currency(raw: &str) -> Result<Currency, PayError> {
    match raw.trim().to_ascii_lowercase().as_str() {
        "stable" | "stabletoken" => Ok(Currency::StableToken),
        "custom" | "customtoken" => Ok(Currency::CustomToken),
        other => Err(PayError::Config(format!(
            "TOKENPAY_CURRENCY must be 'stable' or 'custom', got '{other}'"
        ))),
    }
}

async fn run() -> Result<serde_json::Value, PayError> {
    let config = PaymentConfig::from_env()?;

    let signer: PrivateKeySigner = required("EVM_PRIVATE_KEY")?
        .parse()
        .map_err(|e| PayError::Config(format!("invalid EVM_PRIVATE_KEY: {e}")))?;
    let payer = signer.address();

    let recipient = parse_address(&required("TOKENPAY_RECIPIENT")?)?;
    let amount_raw = required("TOKENPAY_AMOUNT_USD")?;
    let amount_usd: Decimal = amount_raw
        .trim()
        .trim_start_matches('$')
        .parse()
        .map_err(|e| {
            PayError::Config(format!("invalid TOKENPAY_AMOUNT_USD '{amount_raw}': {e}"))
        })?;
    let currency = match std::env::var("TOKENPAY_CURRENCY") {
        Ok(raw) => parse_currency(&raw)?,
        Err(_) => Currency::StableToken,
    };
    let order_reference =
        std::env::var("TOKENPAY_ORDER_REF").unwrap_or_else(|_| "cli-checkout".to_string());
    let token = config.token_for(currency)?;

    let rpc_url: Url = config
        .chain
        .rpc_url
        .parse()
        .map_err(|e| PayError::Config(format!("invalid TOKENPAY_RPC_URL: {e}")))?;
    let provider = ProviderBuilder::new()
        .wallet(EthereumWallet::from(signer))
        .connect_http(rpc_url);

    let quote = config.converter.quote(amount_usd, currency)?;
    eprintln!("Paying {amount_usd} USD ({quote} tokens)");
    eprintln!("  Payer:     {payer}");
    eprintln!("  Recipient: {recipient}");
    eprintln!("  Token:     {token}");

    let intent = PaymentIntent::new(amount_usd, currency, recipient, token, payer, order_reference);
    let mut machine = PaymentMachine::new(ProviderGateway::new(provider), intent, config)?
        .with_observer(Arc::new(ConsoleObserver));

    if let Err(e) = machine.refresh_allowance().await {
        eprintln!("Could not read allowance ({e}); approval will be requested.");
    }

    if !machine.sufficient() {
        eprintln!("Allowance below ceiling, sending approval...");
        let approval = machine.request_approval().await?;
        eprintln!("  approval tx: {approval}");
    }

    let tx = machine.request_payment().await?;

    Ok(serde_json::json!({
        "phase": machine.phase(),
        "transaction": tx,
        "explorer": machine.explorer_url(),
        "intent": machine.intent(),
        "transactions": machine.transactions(),
    }))
}

#[tokio::main]
async fn main() {
    dotenvy::dotenv().ok();
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::from_default_env())
        .init();

    let outcome = match run().await {
        Ok(outcome) => outcome,
        Err(e) => {
            eprintln!("Error: {e}");
            std::process::exit(1);
        }
    };
    match serde_json::to_string_pretty(&outcome) {
        Ok(json) => println!("{json}"),
        Err(e) => {
            eprintln!("Error: could not serialize outcome: {e}");
            std::process::exit(1);
        }
    }
}
