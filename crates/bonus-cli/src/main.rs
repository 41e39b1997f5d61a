// Bonus CLI - operator tool for the loyalty bonus server

mod client;
mod items;

use anyhow::Result;
use clap::{Parser, Subcommand};
use colored::Colorize;
use serde_json::Value;

use client::BonusClient;

/// Bonus - inspect and operate customer bonus balances
#[derive(Parser)]
#[command(name = "bonus")]
#[command(version, about, long_about = None)]
struct Cli {
    /// Base URL of the bonus server
    #[arg(long, global = true, default_value = "http://localhost:8080")]
    server: String,

    /// Print raw JSON responses
    #[arg(long, global = true)]
    json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Register a new customer with a zero balance
    Register {
        /// Customer key (phone number or account id)
        customer_key: String,
    },
    /// Deactivate a customer; history and balance are kept
    Deactivate { customer_key: String },
    /// Show a customer account
    Show { customer_key: String },
    /// Show a customer's bonus balance
    Balance { customer_key: String },
    /// List recent orders, most recent first
    Orders {
        customer_key: String,

        /// Number of orders to show (1-100)
        #[arg(short, long)]
        limit: Option<i64>,
    },
    /// Place an order
    Order {
        customer_key: String,

        /// Line item as PRODUCT:QTY:PRICE (can be specified multiple times)
        #[arg(short, long = "item", value_name = "PRODUCT:QTY:PRICE", required = true)]
        items: Vec<String>,

        /// Bonus to spend on this order
        #[arg(short, long, default_value_t = 0)]
        spend: i64,
    },
    /// Show the audit ledger of a customer
    Ledger {
        customer_key: String,

        /// Replay the ledger against the stored balance
        #[arg(long)]
        verify: bool,
    },
}

fn main() {
    let cli = Cli::parse();
    let client = BonusClient::new(&cli.server);

    let result = match cli.command {
        Commands::Register { customer_key } => client
            .register(&customer_key)
            .map(|v| print_account(&v, cli.json)),
        Commands::Deactivate { customer_key } => client
            .deactivate(&customer_key)
            .map(|v| print_account(&v, cli.json)),
        Commands::Show { customer_key } => client
            .customer(&customer_key)
            .map(|v| print_account(&v, cli.json)),
        Commands::Balance { customer_key } => client
            .balance(&customer_key)
            .map(|v| print_balance(&customer_key, &v, cli.json)),
        Commands::Orders {
            customer_key,
            limit,
        } => client
            .orders(&customer_key, limit)
            .map(|v| print_orders(&v, cli.json)),
        Commands::Order {
            customer_key,
            items,
            spend,
        } => handle_order(&client, &customer_key, &items, spend, cli.json),
        Commands::Ledger {
            customer_key,
            verify,
        } => handle_ledger(&client, &customer_key, verify, cli.json),
    };

    if let Err(e) = result {
        eprintln!("{} {}", "✗".red().bold(), e);
        std::process::exit(1);
    }
}

fn handle_order(
    client: &BonusClient,
    customer_key: &str,
    items: &[String],
    spend: i64,
    json: bool,
) -> Result<()> {
    let line_items = items::parse_items(items)?;
    let receipt = client.place_order(customer_key, line_items, spend)?;
    if json {
        return print_json(&receipt);
    }

    println!("{} {}", "✓".green().bold(), "Order settled".green());
    println!();
    println!("  Order:        {}", receipt["orderId"].as_str().unwrap_or("-"));
    println!("  Bonus used:   {}", spend);
    println!("  Bonus earned: {}", receipt["bonusEarned"]);
    println!("  New balance:  {}", receipt["newBalance"]);
    Ok(())
}

fn handle_ledger(client: &BonusClient, customer_key: &str, verify: bool, json: bool) -> Result<()> {
    if verify {
        let report = client.verify_ledger(customer_key)?;
        if json {
            return print_json(&report);
        }
        if report["consistent"].as_bool() == Some(true) {
            println!("{} {}", "✓".green().bold(), "Ledger consistent".green());
        } else {
            println!("{} {}", "✗".red().bold(), "Ledger inconsistent".red());
            if let Some(problem) = report["problem"].as_str() {
                println!("  Problem:  {}", problem);
            }
        }
        println!();
        println!("  Stored:   {}", report["storedBalance"]);
        println!("  Replayed: {}", report["replayedBalance"]);
        println!("  Entries:  {}", report["entryCount"]);
        println!("  Digest:   {}", report["digest"].as_str().unwrap_or("-"));
        return Ok(());
    }

    let ledger = client.ledger(customer_key)?;
    if json {
        return print_json(&ledger);
    }
    let entries = ledger["entries"].as_array().cloned().unwrap_or_default();
    if entries.is_empty() {
        println!("No ledger entries for {}", customer_key);
        return Ok(());
    }
    println!("{:>6}  {:<7} {:>10} {:>10}  {}", "SEQ", "REASON", "DELTA", "BALANCE", "AT");
    for entry in entries {
        let delta = entry["delta"].as_i64().unwrap_or_default();
        let delta = if delta < 0 {
            delta.to_string().red()
        } else {
            format!("+{}", delta).green()
        };
        println!(
            "{:>6}  {:<7} {:>10} {:>10}  {}",
            entry["seq"],
            entry["reason"].as_str().unwrap_or("-"),
            delta,
            entry["balanceAfter"],
            entry["createdAt"].as_str().unwrap_or("-"),
        );
    }
    Ok(())
}

fn print_json(value: &Value) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn print_account(account: &Value, json: bool) {
    if json {
        println!("{:#}", account);
        return;
    }
    let status = if account["active"].as_bool() == Some(true) {
        "active".green()
    } else {
        "inactive".red()
    };
    println!("  Customer:  {}", account["customerKey"].as_str().unwrap_or("-"));
    println!("  Status:    {}", status);
    println!("  Balance:   {}", account["balance"]);
    println!("  Orders:    {}", account["lifetimeOrders"]);
    println!("  Updated:   {}", account["updatedAt"].as_str().unwrap_or("-"));
}

fn print_balance(customer_key: &str, balance: &Value, json: bool) {
    if json {
        println!("{:#}", balance);
        return;
    }
    println!("{}: {} bonus", customer_key, balance["balance"].to_string().bold());
}

fn print_orders(orders: &Value, json: bool) {
    if json {
        println!("{:#}", orders);
        return;
    }
    let orders = orders["orders"].as_array().cloned().unwrap_or_default();
    if orders.is_empty() {
        println!("No orders");
        return;
    }
    println!("{:<36}  {:>10} {:>8} {:>8}  {}", "ORDER", "AMOUNT", "USED", "EARNED", "AT");
    for order in orders {
        println!(
            "{:<36}  {:>10} {:>8} {:>8}  {}",
            order["orderId"].as_str().unwrap_or("-"),
            order["amount"],
            order["bonusUsed"],
            order["bonusEarned"],
            order["createdAt"].as_str().unwrap_or("-"),
        );
    }
}
