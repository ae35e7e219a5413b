//! Quote a checkout against a YAML coupon catalog.
//!
//! ```text
//! vouch --catalog coupons.yaml --product starter --subtotal 10000 \
//!       --code SAVE10 --code FLAT500
//! ```
//!
//! With no `--code` flags the engine runs its automatic best-deal pass over
//! the catalog's public coupons. `--stats` prints the dashboard summary
//! instead of a quote.

use std::{error::Error, fs, path::PathBuf, process::ExitCode};

use clap::Parser;
use jiff::Timestamp;
use tabled::{builder::Builder, settings::Style};

use vouch::prelude::*;
use vouch::pricing::format_cents;

/// Arguments for the quote demo.
#[derive(Debug, Parser)]
#[command(name = "vouch", about = "Quote a checkout against a coupon catalog")]
struct Args {
    /// Path to the catalog YAML file
    #[clap(short = 'f', long)]
    catalog: PathBuf,

    /// Product being purchased
    #[clap(short, long)]
    product: String,

    /// Client making the purchase
    #[clap(long, default_value = "demo-client")]
    client: String,

    /// Pre-discount subtotal in cents
    #[clap(short, long)]
    subtotal: i64,

    /// Coupon code to apply (repeatable); omit to auto-apply the best deal
    #[clap(short, long = "code")]
    codes: Vec<String>,

    /// Treat this as the client's first purchase
    #[clap(long)]
    first_purchase: bool,

    /// Print catalog stats instead of a quote
    #[clap(long)]
    stats: bool,
}

fn main() -> ExitCode {
    match run(Args::parse()) {
        Ok(()) => ExitCode::SUCCESS,
        Err(error) => {
            eprintln!("error: {error}");
            ExitCode::FAILURE
        }
    }
}

fn run(args: Args) -> Result<(), Box<dyn Error>> {
    let yaml = fs::read_to_string(&args.catalog)?;
    let engine = CouponEngine::new(store_from_yaml(&yaml)?);

    let now = Timestamp::now();

    if args.stats {
        println!("{}", engine.stats(now).render_table());
        return Ok(());
    }

    let mut ctx = CheckoutContext::new(args.client, args.product, args.subtotal, now);

    if args.first_purchase {
        ctx = ctx.first_purchase();
    }

    let quote = if args.codes.is_empty() {
        match engine.best_single(&ctx) {
            Some(best) => {
                println!("best deal applied automatically");
                best
            }
            None => engine.quote(&ctx, &[]),
        }
    } else {
        let codes: Vec<CouponCode> = args.codes.iter().map(CouponCode::new).collect();

        engine.quote(&ctx, &codes)
    };

    print_quote(&quote);

    Ok(())
}

fn print_quote(quote: &Quote) {
    let mut builder = Builder::default();

    builder.push_record(["Coupon", "Deduction"]);

    for line in &quote.breakdown {
        builder.push_record([line.code.to_string(), format_cents(line.deduct_cents)]);
    }

    let mut table = builder.build();
    table.with(Style::rounded());

    println!("{table}");

    for rejected in &quote.rejected_codes {
        println!("{}: {}", rejected.code, rejected.reason);
    }

    println!("subtotal: {}", format_cents(quote.subtotal_cents));
    println!("saved:    {}", format_cents(quote.total_discount_cents()));
    println!("total:    {}", format_cents(quote.final_price_cents));
}
