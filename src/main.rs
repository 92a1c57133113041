//! OpenSASE Cart - command-line client for a Store API cart

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use opensase_cart_session::config::BASE_URL_VAR;
use opensase_cart_session::{Address, Cart, CartClient, ClientConfig, CustomerUpdate};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

#[derive(Debug, Parser)]
#[command(name = "opensase-cart", version, about = "Inspect and modify a WooCommerce Store API cart")]
struct Cli {
    /// Store API root, e.g. https://shop.example.com/wp-json/wc/store/v1/
    #[arg(long, env = BASE_URL_VAR)]
    base_url: String,

    #[command(subcommand)]
    command: Command,
}

#[derive(Debug, Subcommand)]
enum Command {
    /// Print the current cart
    Show,
    /// Add a product
    Add { product_id: u64, #[arg(default_value_t = 1)] quantity: u32 },
    /// Set an item's quantity; zero or less removes it
    Update { key: String, #[arg(allow_hyphen_values = true)] quantity: i64 },
    /// Remove an item
    Remove { key: String },
    /// Remove every item
    Clear,
    /// Set the shipping address
    Ship {
        #[arg(long)] country: String,
        #[arg(long, default_value = "")] postcode: String,
        #[arg(long, default_value = "")] city: String,
        #[arg(long, default_value = "")] state: String,
    },
    /// List shipping packages and their rates
    Rates,
    /// Choose a shipping rate for a package
    SelectRate { package_id: u64, rate_id: String },
    /// Apply a coupon code
    ApplyCoupon { code: String },
    /// Remove a coupon code
    RemoveCoupon { code: String },
    /// Forget the stored session
    Reset,
}

#[tokio::main]
async fn main() -> Result<()> {
    dotenvy::dotenv().ok();
    tracing_subscriber::registry().with(tracing_subscriber::EnvFilter::try_from_default_env().unwrap_or_else(|_| "info".into())).with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr)).init();

    let cli = Cli::parse();
    let base_url = cli.base_url.clone();
    let config = ClientConfig::from_lookup(|key| if key == BASE_URL_VAR { Some(base_url.clone()) } else { std::env::var(key).ok() })?;
    let store = config.open_store().context("opening token store")?;
    let client = CartClient::new(&config, store)?;
    tracing::info!(base_url = %config.base_url, "🛒 OpenSASE Cart");

    let cart = match cli.command {
        Command::Show => client.get_cart().await?,
        Command::Add { product_id, quantity } => client.add_item(product_id, quantity).await?,
        Command::Update { key, quantity } => client.update_item_quantity(&key, quantity).await?,
        Command::Remove { key } => client.remove_item(&key).await?,
        Command::Clear => client.clear_cart().await?,
        Command::Ship { country, postcode, city, state } => {
            let address = Address { country, postcode, city, state, ..Default::default() };
            client.update_customer(CustomerUpdate { shipping_address: Some(address), billing_address: None }).await?
        }
        Command::Rates => {
            let packages = client.list_shipping_rates().await?;
            println!("{}", serde_json::to_string_pretty(&packages)?);
            return Ok(());
        }
        Command::SelectRate { package_id, rate_id } => client.select_shipping_rate(package_id, &rate_id).await?,
        Command::ApplyCoupon { code } => client.apply_coupon(&code).await?,
        Command::RemoveCoupon { code } => client.remove_coupon(&code).await?,
        Command::Reset => {
            client.reset_session().await;
            return Ok(());
        }
    };
    print_cart(&cart)
}

fn print_cart(cart: &Cart) -> Result<()> {
    if cart.is_empty() {
        println!("Cart is empty");
        return Ok(());
    }
    for item in &cart.items {
        println!("{:>3} x {} (#{}, key {}) {}", item.quantity, item.name, item.id, item.key, item.line_total()?);
    }
    for coupon in &cart.coupons {
        println!("coupon {}", coupon.code);
    }
    println!("items {}", cart.items_total()?);
    println!("total {}", cart.total()?);
    Ok(())
}
