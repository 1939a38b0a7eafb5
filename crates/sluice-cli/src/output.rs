//! Output formatting utilities.

use colored::Colorize;
use sluice_governance::{ProposalState, SplitPlan};
use sluice_types::{Address, Amount, Hash};
use tabled::{Table, Tabled};

/// Format address (short version).
pub fn format_address_short(addr: &str) -> String {
    if addr.len() > 12 {
        format!("{}...{}", &addr[..10], &addr[addr.len() - 8..])
    } else {
        addr.to_string()
    }
}

pub fn format_address(addr: &Address) -> String {
    format_address_short(&addr.to_string())
}

pub fn format_hash(hash: &Hash) -> String {
    hash.to_string()
}

/// Group digits in threes: `1234567` becomes `1_234_567`.
pub fn format_amount(amount: Amount) -> String {
    let digits = amount.to_string();
    let mut out = String::with_capacity(digits.len() + digits.len() / 3);
    for (i, c) in digits.chars().enumerate() {
        if i > 0 && (digits.len() - i) % 3 == 0 {
            out.push('_');
        }
        out.push(c);
    }
    out
}

pub fn format_state(state: ProposalState) -> String {
    let label = format!("{} ({})", state.name(), state.code());
    match state {
        ProposalState::Succeeded | ProposalState::Executed => label.green().to_string(),
        ProposalState::Defeated => label.red().to_string(),
        ProposalState::Queued => label.yellow().to_string(),
        _ => label.cyan().to_string(),
    }
}

pub fn print_success(msg: &str) {
    println!("{}", format!("✓ {}", msg).green());
}

pub fn print_error(msg: &str) {
    eprintln!("{}", format!("✗ {}", msg).red());
}

pub fn print_info(msg: &str) {
    println!("{}", format!("ℹ {}", msg).blue());
}

pub fn print_header(title: &str) {
    println!("{}", title.bold());
    println!("{}", "=".repeat(50));
}

/// Print a table of labelled balances.
pub fn print_balance_table(balances: &[(String, Address, Amount)]) {
    #[derive(Tabled)]
    struct BalanceRow {
        name: String,
        address: String,
        balance: String,
    }

    let rows: Vec<BalanceRow> = balances
        .iter()
        .map(|(name, addr, bal)| BalanceRow {
            name: name.clone(),
            address: format_address(addr),
            balance: format_amount(*bal),
        })
        .collect();

    println!("{}", Table::new(rows));
}

/// Print each payout of a split.
pub fn print_split(treasury: &Address, plan: &SplitPlan) {
    println!(
        "Split {} at index {}: {} distributed",
        format_address(treasury).bright_cyan(),
        plan.index,
        format_amount(plan.balance).bright_yellow()
    );
    for payout in &plan.payouts {
        println!("  -> {}  {}", format_address(&payout.recipient), format_amount(payout.amount));
    }
}
