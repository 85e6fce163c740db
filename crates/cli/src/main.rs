//! Tienda CLI - database and back-office tools.
//!
//! # Usage
//!
//! ```bash
//! # Run storefront database migrations
//! tienda migrate
//!
//! # Load products from a YAML catalog
//! tienda seed catalog catalog.yaml
//!
//! # Create a coupon
//! tienda coupon create --code VERANO10 --percent 10
//!
//! # Carrier diagnostics
//! tienda correo customer-id --email tienda@example.com --password '...'
//! tienda correo agencies B
//! tienda correo rates --to 5000 --weight 800 --height 10 --width 20 --length 30
//! ```

#![cfg_attr(not(test), forbid(unsafe_code))]

use std::path::PathBuf;

use chrono::{DateTime, Utc};
use clap::{Parser, Subcommand, ValueEnum};
use rust_decimal::Decimal;
use secrecy::SecretString;
use tienda_correo::DeliveryType;

mod commands;

#[derive(Parser)]
#[command(name = "tienda")]
#[command(author, version, about = "Tienda CLI tools")]
struct Cli {
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run database migrations
    Migrate,
    /// Load data into the database
    Seed {
        #[command(subcommand)]
        target: SeedTarget,
    },
    /// Manage discount coupons
    Coupon {
        #[command(subcommand)]
        action: CouponAction,
    },
    /// Talk to the Correo Argentino API
    Correo {
        #[command(subcommand)]
        action: CorreoAction,
    },
}

#[derive(Subcommand)]
enum SeedTarget {
    /// Upsert products and variants from a YAML file
    Catalog {
        /// Path to the catalog file
        file: PathBuf,
    },
}

#[derive(Subcommand)]
enum CouponAction {
    /// Create a new coupon
    Create {
        /// Code customers type at checkout
        #[arg(short, long)]
        code: String,

        /// Discount percentage, 0 to 100
        #[arg(short, long)]
        percent: Decimal,

        /// Minimum subtotal in ARS
        #[arg(long)]
        min_purchase: Option<Decimal>,

        /// Total redemptions allowed
        #[arg(long)]
        max_uses: Option<i32>,

        /// Expiry as RFC 3339, e.g. 2026-03-01T00:00:00Z
        #[arg(long)]
        expires_at: Option<DateTime<Utc>>,
    },
}

#[derive(Subcommand)]
enum CorreoAction {
    /// Resolve the customer id for a MiCorreo account
    CustomerId {
        #[arg(short, long)]
        email: String,

        #[arg(short, long)]
        password: String,
    },
    /// List agencies in a province
    Agencies {
        /// Province letter, e.g. B for Buenos Aires
        province: String,

        /// Include agencies that are not active
        #[arg(long)]
        all: bool,
    },
    /// Quote a parcel
    Rates {
        /// Destination postal code
        #[arg(long)]
        to: String,

        /// Origin postal code; defaults to `CORREO_ORIGIN_POSTAL_CODE`
        #[arg(long)]
        from: Option<String>,

        /// Only quote one delivery type
        #[arg(long = "type", value_enum)]
        delivery: Option<DeliveryArg>,

        /// Weight in grams
        #[arg(long)]
        weight: u32,

        /// Height in centimeters
        #[arg(long)]
        height: u32,

        /// Width in centimeters
        #[arg(long)]
        width: u32,

        /// Length in centimeters
        #[arg(long)]
        length: u32,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum DeliveryArg {
    /// Home delivery
    Home,
    /// Pickup at an agency
    Agency,
}

impl From<DeliveryArg> for DeliveryType {
    fn from(arg: DeliveryArg) -> Self {
        match arg {
            DeliveryArg::Home => Self::Home,
            DeliveryArg::Agency => Self::Agency,
        }
    }
}

#[tokio::main]
async fn main() {
    // Pick up TIENDA_* / CORREO_* from a local .env
    let _ = dotenvy::dotenv();

    tracing_subscriber::fmt::init();

    let cli = Cli::parse();

    if let Err(e) = run(cli).await {
        tracing::error!("Command failed: {e}");
        std::process::exit(1);
    }
}

async fn run(cli: Cli) -> Result<(), commands::CommandError> {
    match cli.command {
        Commands::Migrate => commands::migrate::run().await?,
        Commands::Seed { target } => match target {
            SeedTarget::Catalog { file } => commands::seed::catalog(&file).await?,
        },
        Commands::Coupon { action } => match action {
            CouponAction::Create {
                code,
                percent,
                min_purchase,
                max_uses,
                expires_at,
            } => {
                commands::coupon::create(commands::coupon::CouponOptions {
                    code,
                    percent,
                    min_purchase,
                    max_uses,
                    expires_at,
                })
                .await?;
            }
        },
        Commands::Correo { action } => match action {
            CorreoAction::CustomerId { email, password } => {
                commands::correo::customer_id(&email, SecretString::from(password)).await?;
            }
            CorreoAction::Agencies { province, all } => {
                commands::correo::agencies(&province, all).await?;
            }
            CorreoAction::Rates {
                to,
                from,
                delivery,
                weight,
                height,
                width,
                length,
            } => {
                commands::correo::rates(commands::correo::RateOptions {
                    from,
                    to,
                    delivery: delivery.map(DeliveryType::from),
                    weight_grams: weight,
                    height_cm: height,
                    width_cm: width,
                    length_cm: length,
                })
                .await?;
            }
        },
    }
    Ok(())
}
