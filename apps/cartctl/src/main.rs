use std::{path::PathBuf, sync::Arc};

use anyhow::{Context, Result};
use cart_client::{CartReconciler, HttpTransport, MemoryPage, SaveOutcome};
use cart_shared::domain::{CartId, OptionId};
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

mod config;

use config::{load_settings, Preset, DEFAULT_SETTINGS_FILE};

#[derive(Parser, Debug)]
#[command(about = "Reconcile a cart page snapshot with the cart save endpoint")]
struct Cli {
    #[arg(long, default_value = DEFAULT_SETTINGS_FILE)]
    config: PathBuf,
    #[arg(long)]
    server_url: Option<String>,
    /// Page snapshot (.toml or .json) to operate on.
    #[arg(long)]
    page: Option<PathBuf>,
    #[arg(long, value_enum)]
    preset: Option<Preset>,
    /// Restrict to the `cart-<id>` container.
    #[arg(long)]
    cart: Option<String>,
    /// Write the resulting page back to the snapshot file in its own format.
    #[arg(long)]
    write: bool,
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Print the running total of the scope.
    Total,
    /// Validate every input in scope and save them in one request.
    SaveAll,
    /// Save one input on its own.
    Save { option_id: String },
    /// Type a quantity into an input and apply the live-edit rules.
    Set { option_id: String, quantity: String },
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .init();

    let cli = Cli::parse();
    let mut settings = load_settings(&cli.config)?;
    if let Some(v) = cli.server_url {
        settings.server_url = v;
    }
    if let Some(v) = cli.page {
        settings.page = v.display().to_string();
    }
    if let Some(v) = cli.preset {
        settings.preset = v;
    }
    if cli.cart.is_some() {
        settings.cart_id = cli.cart;
    }

    let page_path = PathBuf::from(&settings.page);
    let page = Arc::new(
        MemoryPage::load(&page_path)
            .with_context(|| format!("failed to load page '{}'", page_path.display()))?,
    );
    let transport = Arc::new(HttpTransport::new(&settings.server_url)?);
    let config = settings
        .preset
        .reconciler_config(settings.cart_id.map(CartId::new));
    let reconciler = CartReconciler::attach(page.clone(), transport, config);

    match cli.command {
        Command::Total => {}
        Command::SaveAll => report(reconciler.save_all().await),
        Command::Save { option_id } => {
            report(reconciler.save_single(&OptionId::new(option_id)).await)
        }
        Command::Set {
            option_id,
            quantity,
        } => {
            let option_id = OptionId::new(option_id);
            let Some(line) = reconciler
                .collect_line_items()
                .into_iter()
                .find(|line| line.item.option_id == option_id)
            else {
                anyhow::bail!("no quantity input for option {option_id} in scope");
            };
            page.type_into(line.key, &quantity);
            println!("edit: {:?}", reconciler.on_input_change(&option_id));
        }
    }

    for alert in page.take_alerts() {
        println!("alert: {alert}");
    }
    println!("total: {}", reconciler.current_total().display_grouped());

    if cli.write {
        page.snapshot()
            .save(&page_path)
            .with_context(|| format!("failed to write page '{}'", page_path.display()))?;
        println!("wrote {}", page_path.display());
    }

    Ok(())
}

fn report(outcome: SaveOutcome) {
    match outcome {
        SaveOutcome::Saved => println!("saved"),
        SaveOutcome::Failed { kind, message } => println!("save failed ({kind:?}): {message}"),
        SaveOutcome::Invalid(err) => println!("not sent: {err}"),
        SaveOutcome::Busy => println!("not sent: a save is already in flight"),
        SaveOutcome::NothingToSave => println!("nothing to save"),
        SaveOutcome::UnknownInput => println!("no such input in scope"),
    }
}
