use anyhow::{anyhow, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::io::{self, BufRead, Write};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

use smartinvoice::commands::dashboard::{get_dashboard_stats, DashboardFilter};
use smartinvoice::commands::invoices::{
    delete_invoice, get_invoice_detail, get_invoice_summaries, InvoiceFilter, InvoiceSort, SortKey,
};
use smartinvoice::commands::settings::{
    activate_prompt, list_prompts, load_settings, resolve_api_key, save_settings, update_prompt,
    SettingsPayload,
};
use smartinvoice::commands::{masters, require_screen, review, roles};
use smartinvoice::db::Database;
use smartinvoice::models::{Company, ExpenseCategory, Role, Screen, Supplier};
use smartinvoice::services::gemini::GeminiExtractor;
use smartinvoice::services::ingest::ingest_batch;
use smartinvoice::services::permissions::Action;
use smartinvoice::services::state::AppState;
use smartinvoice::utils::format_decimal;

#[derive(Parser)]
#[command(name = "smartinvoice", version, about = "Invoice intake with AI extraction and human review")]
struct Cli {
    /// SQLite database file.
    #[arg(long, env = "SMARTINVOICE_DB", default_value = "smartinvoice.sqlite")]
    db: PathBuf,
    /// Acting user id or email.
    #[arg(long, short, default_value = "u1")]
    user: String,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand)]
enum Command {
    /// Extract documents and review them one by one.
    Ingest {
        #[arg(required = true)]
        paths: Vec<PathBuf>,
    },
    /// List committed invoices.
    Invoices {
        #[arg(long)]
        search: Option<String>,
        #[arg(long)]
        company: Option<i64>,
        #[arg(long)]
        supplier: Option<String>,
        #[arg(long)]
        category: Option<i64>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        from: Option<String>,
        #[arg(long)]
        to: Option<String>,
        #[arg(long, default_value = "date")]
        sort: String,
        #[arg(long)]
        asc: bool,
    },
    /// Show one committed invoice with its line items.
    Show { id: String },
    /// Re-open a committed invoice for review.
    Edit { id: String },
    /// Delete a committed invoice.
    Delete { id: String },
    /// Totals per currency, category and month.
    Dashboard {
        #[arg(long)]
        company: Option<i64>,
        #[arg(long)]
        supplier: Option<String>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        category: Option<i64>,
    },
    /// List, save or delete master data.
    Masters {
        #[arg(value_enum)]
        kind: MasterKind,
        /// Record id; 0 creates a new one.
        #[arg(long, default_value_t = 0)]
        id: i64,
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        tax_id: Option<String>,
        #[arg(long)]
        address: Option<String>,
        #[arg(long)]
        delete: Option<i64>,
    },
    /// Show or toggle role permissions.
    Roles {
        #[arg(long)]
        role: Option<String>,
        #[arg(long)]
        toggle_screen: Option<String>,
        #[arg(long)]
        toggle_action: Option<String>,
    },
    /// Show, edit or activate extraction prompts.
    Prompts {
        #[arg(long)]
        id: Option<i64>,
        #[arg(long)]
        content: Option<String>,
        #[arg(long)]
        activate: Option<i64>,
    },
    /// Show the audit log, newest first.
    Audit {
        #[arg(long, default_value_t = 50)]
        limit: usize,
    },
    /// Show recent extraction attempts.
    Logs {
        #[arg(long, default_value_t = 20)]
        limit: usize,
    },
    /// Show or change settings.
    Config {
        #[arg(long)]
        api_key: Option<String>,
        #[arg(long)]
        model: Option<String>,
        #[arg(long)]
        currency: Option<String>,
        #[arg(long)]
        rate: Option<String>,
    },
}

#[derive(Clone, Copy, ValueEnum)]
enum MasterKind {
    Companies,
    Suppliers,
    Categories,
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_target(false)
        .with_writer(io::stderr)
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    if let Some(parent) = cli.db.parent().filter(|p| !p.as_os_str().is_empty()) {
        std::fs::create_dir_all(parent)?;
    }

    let db = Database::new(&cli.db)?;
    let settings = load_settings(&db)?;
    let mut state = AppState::load(&db, settings)?;
    state.switch_user(&cli.user)?;
    tracing::info!(user = %state.current_user.id, role = %state.current_user.role, "Session started");

    let outcome = run(cli.command, &mut state, &db).await;
    state.save(&db)?;
    outcome
}

async fn run(command: Command, state: &mut AppState, db: &Database) -> Result<()> {
    match command {
        Command::Ingest { paths } => {
            require_screen(state, Screen::Upload)?;
            let api_key = resolve_api_key(&state.settings)?;
            let extractor = GeminiExtractor::new(api_key, state.settings.gemini_model.clone())?;
            let prompt = state
                .active_prompt()
                .map(|p| p.content.clone())
                .ok_or_else(|| anyhow!("No active extraction prompt"))?;
            let items = ingest_batch(&extractor, &prompt, &paths, db).await?;
            review::start_review(state, items)?;
            review_loop(state, db)?;
        }
        Command::Invoices {
            search,
            company,
            supplier,
            category,
            currency,
            from,
            to,
            sort,
            asc,
        } => {
            let filter = InvoiceFilter {
                search,
                company_id: company,
                supplier_name: supplier,
                category_id: category,
                currency,
                date_from: from,
                date_to: to,
            };
            let sort = InvoiceSort {
                key: sort.parse::<SortKey>().map_err(|e| anyhow!(e))?,
                descending: !asc,
            };
            for row in get_invoice_summaries(state, &filter, sort)? {
                println!(
                    "{:<10} {:<12} {:<28} {:<28} {:<14} {:>4} {:>12} {:>14}  {}",
                    row.date,
                    row.invoice_number,
                    row.supplier_name,
                    row.company_name,
                    row.category_name,
                    row.currency,
                    format_decimal(row.total),
                    format_decimal(row.total_local),
                    row.id
                );
            }
        }
        Command::Show { id } => {
            let invoice = get_invoice_detail(state, &id)?;
            println!("Invoice #{} ({})", invoice.invoice_number, invoice.id);
            println!("  supplier  {} {}", invoice.supplier_tax_id, invoice.supplier_name);
            println!("  company   {}", state.company_name(invoice.company_id).unwrap_or("N/A"));
            println!("  category  {}", state.category_name(invoice.category_id).unwrap_or("N/A"));
            println!("  date      {}   control {}", invoice.date, invoice.control_serial);
            println!(
                "  total     {} {} @ {} = {} {}",
                invoice.currency,
                format_decimal(invoice.total),
                format_decimal(invoice.exchange_rate),
                state.settings.local_currency,
                format_decimal(invoice.total_local)
            );
            for item in &invoice.items {
                println!(
                    "    {:>6} x {:<36} {:>12} {:>12}",
                    format_decimal(item.quantity),
                    item.description,
                    format_decimal(item.unit_price),
                    format_decimal(item.line_total)
                );
            }
        }
        Command::Edit { id } => {
            review::edit_invoice(state, &id)?;
            review_loop(state, db)?;
        }
        Command::Delete { id } => {
            let removed = delete_invoice(state, &id)?;
            println!("Deleted invoice #{}", removed.invoice_number);
        }
        Command::Dashboard {
            company,
            supplier,
            currency,
            category,
        } => {
            let filter = DashboardFilter {
                company_id: company,
                supplier_name: supplier,
                currency,
                category_id: category,
            };
            let stats = get_dashboard_stats(state, &filter)?;
            let local = &state.settings.local_currency;
            println!("Invoices: {}", stats.count);
            println!("Total ({}): {}", local, format_decimal(stats.total_local));
            println!("By currency:");
            for entry in &stats.by_currency {
                println!("  {:<10} {:>14}", entry.name, format_decimal(entry.amount));
            }
            println!("By category ({}):", local);
            for entry in &stats.by_category {
                println!("  {:<16} {:>14}", entry.name, format_decimal(entry.amount));
            }
            println!("By month ({}):", local);
            for entry in &stats.by_month {
                println!("  {:<4} {:>14}", entry.name, format_decimal(entry.amount));
            }
        }
        Command::Masters {
            kind,
            id,
            name,
            tax_id,
            address,
            delete,
        } => run_masters(state, kind, id, name, tax_id, address, delete)?,
        Command::Roles {
            role,
            toggle_screen,
            toggle_action,
        } => {
            if let Some(role) = role {
                let role: Role = role.parse().map_err(|e: String| anyhow!(e))?;
                if let Some(screen) = toggle_screen {
                    let screen: Screen = screen.parse().map_err(|e: String| anyhow!(e))?;
                    roles::toggle_screen(state, role, screen)?;
                }
                if let Some(action) = toggle_action {
                    let action: Action = action.parse().map_err(|e: String| anyhow!(e))?;
                    roles::toggle_action(state, role, action)?;
                }
            }
            for (role, perms) in roles::get_role_permissions(state)? {
                let screens: Vec<&str> = perms.allowed_screens.iter().map(|s| s.as_str()).collect();
                println!(
                    "{:<7} edit={} delete={} masters={} system={}  [{}]",
                    role,
                    perms.can_edit_invoices,
                    perms.can_delete_invoices,
                    perms.can_manage_masters,
                    perms.can_manage_system,
                    screens.join(", ")
                );
            }
        }
        Command::Prompts {
            id,
            content,
            activate,
        } => {
            if let (Some(id), Some(content)) = (id, content) {
                update_prompt(state, id, &content)?;
            }
            if let Some(id) = activate {
                activate_prompt(state, id)?;
            }
            for prompt in list_prompts(state)? {
                let marker = if prompt.is_active { "*" } else { " " };
                println!("{} {:>3}  {}", marker, prompt.id, prompt.title);
            }
        }
        Command::Audit { limit } => {
            for entry in roles::list_audit(state, Some(limit))? {
                println!(
                    "{}  {:<6} {:<7} {:<18} {}",
                    entry.timestamp,
                    entry.actor_id,
                    entry.actor_role,
                    entry.action.code(),
                    entry.details
                );
            }
        }
        Command::Logs { limit } => {
            for log in db.get_processing_logs(limit)? {
                println!(
                    "{}  {:<8} {:<28} {}",
                    log.created_at,
                    log.status,
                    log.file_name.unwrap_or_default(),
                    log.message.unwrap_or_default()
                );
            }
        }
        Command::Config {
            api_key,
            model,
            currency,
            rate,
        } => {
            if api_key.is_some() || model.is_some() || currency.is_some() || rate.is_some() {
                save_settings(
                    state,
                    db,
                    SettingsPayload {
                        gemini_api_key: api_key,
                        gemini_model: model,
                        local_currency: currency,
                        default_exchange_rate: rate,
                    },
                )?;
            }
            let settings = &state.settings;
            println!("model:          {}", settings.gemini_model);
            println!("local currency: {}", settings.local_currency);
            println!("exchange rate:  {}", format_decimal(settings.default_exchange_rate));
            println!(
                "api key:        {}",
                if settings.gemini_api_key.is_some() { "stored" } else { "not set" }
            );
        }
    }
    Ok(())
}

fn run_masters(
    state: &mut AppState,
    kind: MasterKind,
    id: i64,
    name: Option<String>,
    tax_id: Option<String>,
    address: Option<String>,
    delete: Option<i64>,
) -> Result<()> {
    let local = state.settings.local_currency.clone();
    match kind {
        MasterKind::Companies => {
            if let Some(id) = delete {
                masters::delete::<Company>(state, id)?;
            } else if let Some(name) = name {
                masters::save(
                    state,
                    Company {
                        id,
                        tax_id: tax_id.unwrap_or_default(),
                        name,
                        address: address.unwrap_or_default(),
                        currencies: vec![local, "USD".to_string()],
                        tax_id_label: "RIF".to_string(),
                    },
                )?;
            }
            for company in masters::list::<Company>(state)? {
                println!("{:>4}  {:<16} {}", company.id, company.tax_id, company.name);
            }
        }
        MasterKind::Suppliers => {
            if let Some(id) = delete {
                masters::delete::<Supplier>(state, id)?;
            } else if let Some(name) = name {
                masters::save(
                    state,
                    Supplier {
                        id,
                        tax_id: tax_id.unwrap_or_default(),
                        name,
                        address: address.unwrap_or_default(),
                    },
                )?;
            }
            for supplier in masters::list::<Supplier>(state)? {
                println!("{:>4}  {:<16} {}", supplier.id, supplier.tax_id, supplier.name);
            }
        }
        MasterKind::Categories => {
            if let Some(id) = delete {
                masters::delete::<ExpenseCategory>(state, id)?;
            } else if let Some(name) = name {
                masters::save(state, ExpenseCategory { id, name, code: None })?;
            }
            for category in masters::list::<ExpenseCategory>(state)? {
                println!("{:>4}  {}", category.id, category.name);
            }
        }
    }
    Ok(())
}

const REVIEW_HELP: &str = "commands: show | set <field> <value> | company | approve | skip | quit";

fn print_draft(state: &AppState) {
    let (Some(draft), Some((position, total))) = (state.draft.as_ref(), state.queue.position()) else {
        return;
    };
    println!();
    println!("Document {} of {}", position, total);
    if draft.flags.is_duplicate {
        println!("  ! an invoice with this supplier and number already exists");
    }
    if draft.flags.is_new_supplier {
        println!("  ! supplier {} is not registered yet", draft.supplier_tax_id);
    }
    if draft.flags.is_new_company {
        println!("  ! receiving company is unknown; `company` registers it");
    }
    println!("  supplier_name    {}", draft.supplier_name);
    println!("  supplier_tax_id  {}", draft.supplier_tax_id);
    println!("  invoice_number   {}", draft.invoice_number);
    println!("  control_serial   {}", draft.control_serial);
    println!("  date             {}", draft.date);
    println!("  company_id       {} ({})", draft.company_id, state.company_name(draft.company_id).unwrap_or("none"));
    println!("  category_id      {} ({})", draft.category_id, state.category_name(draft.category_id).unwrap_or("none"));
    println!("  currency         {}", draft.currency);
    println!("  exchange_rate    {}", format_decimal(draft.exchange_rate));
    println!("  subtotal         {}", format_decimal(draft.subtotal));
    println!("  tax              {}", format_decimal(draft.tax));
    println!("  total            {}", format_decimal(draft.total));
    if let Some(totals) = review::current_totals(state) {
        println!(
            "  = {} {}  (foreign {})",
            state.settings.local_currency,
            format_decimal(totals.total_local),
            format_decimal(totals.total_foreign)
        );
    }
}

fn review_loop(state: &mut AppState, db: &Database) -> Result<()> {
    println!("{}", REVIEW_HELP);
    let stdin = io::stdin();
    let mut input = stdin.lock();
    let mut show = true;

    while !state.queue.is_idle() {
        if show {
            print_draft(state);
        }
        show = false;
        print!("review> ");
        io::stdout().flush()?;

        let mut line = String::new();
        if input.read_line(&mut line)? == 0 {
            break;
        }
        let line = line.trim();
        let (command, rest) = line.split_once(' ').unwrap_or((line, ""));

        let outcome = match command {
            "" | "show" => {
                show = true;
                Ok(())
            }
            "set" => match rest.trim().split_once(' ') {
                Some((field, value)) => review::set_field_by_name(state, field, value.trim()).map(|_| show = true),
                None => {
                    println!("usage: set <field> <value>");
                    Ok(())
                }
            },
            "company" => review::register_company(state).map(|company| {
                println!("Registered company {} ({})", company.name, company.id);
                show = true;
            }),
            "approve" => review::approve(state).map(|invoice| {
                println!("Approved invoice #{} ({})", invoice.invoice_number, invoice.id);
                show = true;
            }),
            "skip" => review::skip(state).map(|_| show = true),
            "quit" | "exit" => break,
            _ => {
                println!("{}", REVIEW_HELP);
                Ok(())
            }
        };

        if let Err(err) = outcome {
            println!("error: {}", err);
        }
        state.save(db)?;
    }

    if state.queue.is_idle() {
        println!("Queue finished.");
    }
    Ok(())
}
