use std::{
    io::{self, BufRead, Write},
    path::PathBuf,
    str::FromStr,
    sync::Arc,
};

use anyhow::{anyhow, bail, Context, Result};
use clap::{ArgAction, Args, Parser, Subcommand};
use naqshi_inventory::{
    config::{self, AppConfig},
    errors::ServiceError,
    events::EventSender,
    models::{is_selectable_type, ItemForm, ItemRecord, JewelryType, OTHER_ITEM_TYPE},
    persistence::{
        matches_filters, FixedDestination, JsonFileGateway, SaveOutcome, IMAGE_FILTERS,
        JSON_FILTERS,
    },
    qr::QrPayload,
    services::{
        analytics::InventoryMetrics,
        inventory::{is_issued_id, Committed, InventoryFilter, InventoryStore, Page},
        pricing::{apply_to_form, calculate_total_price, PriceInputs},
    },
};
use rust_decimal::Decimal;
use serde::Serialize;
use tracing::{debug, warn};

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    let json = cli.json;
    let result = run(cli).await;

    if json {
        if let Some(err) = result.as_ref().err().and_then(|e| e.downcast_ref::<ServiceError>()) {
            print_json(&err.report())?;
        }
    }
    result
}

async fn run(cli: Cli) -> Result<()> {
    let mut context = CliContext::initialize(cli.data_dir.clone()).await?;

    match cli.command {
        Commands::New(args) => handle_new(&mut context, args, cli.json).await?,
        Commands::Edit(args) => handle_edit(&mut context, args, cli.json).await?,
        Commands::Delete(args) => handle_delete(&mut context, args, cli.json).await?,
        Commands::Show(args) => handle_show(&context, args, cli.json)?,
        Commands::List(args) => handle_list(&context, args, cli.json)?,
        Commands::NextId => handle_next_id(&context, cli.json)?,
        Commands::Stats => handle_stats(&context, cli.json)?,
        Commands::Export(args) => handle_export(&context, args, cli.json).await?,
        Commands::Import(args) => handle_import(&mut context, args, cli.json).await?,
        Commands::Label(args) => handle_label(&context, args, cli.json).await?,
        Commands::Price(args) => handle_price(args, cli.json)?,
    }

    Ok(())
}

#[derive(Parser)]
#[command(name = "naqshi", about = "Jewelry inventory and QR label manager", version)]
struct Cli {
    #[arg(
        long,
        global = true,
        action = ArgAction::SetTrue,
        help = "Render command output as pretty JSON when available"
    )]
    json: bool,
    #[arg(long, global = true, help = "Data directory; overrides configuration")]
    data_dir: Option<PathBuf>,
    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Add a new item
    New(NewItemArgs),
    /// Change fields of an existing item
    Edit(EditItemArgs),
    /// Remove an item
    Delete(DeleteArgs),
    /// Show one item
    Show(ShowArgs),
    /// List items, filtered and paginated
    List(ListArgs),
    /// Show the id the next new item will receive
    NextId,
    /// Inventory summary
    Stats,
    /// Write a backup snapshot
    Export(ExportArgs),
    /// Replace inventory and settings from a snapshot
    Import(ImportArgs),
    /// Save or display an item's QR label
    Label(LabelArgs),
    /// Gold price calculator
    Price(PriceArgs),
}

#[derive(Args)]
struct ItemFieldArgs {
    #[arg(long, help = "Store name printed on the label")]
    store_name: Option<String>,
    #[arg(
        long = "type",
        value_parser = parse_item_type,
        help = "Item type, e.g. Ring, Necklace, Nose Pin, or Other"
    )]
    item_type: Option<String>,
    #[arg(long, help = "Custom item type; implies --type Other")]
    other: Option<String>,
    #[arg(long, help = "Weight in grams")]
    weight: Option<String>,
    #[arg(long, help = "Purity, e.g. 22K")]
    purity: Option<String>,
    #[arg(long, help = "Total price")]
    total_price: Option<String>,
    #[arg(long)]
    size: Option<String>,
    #[arg(long)]
    color: Option<String>,
    #[arg(long)]
    hallmark: Option<String>,
    #[arg(long)]
    description: Option<String>,
    #[arg(long, value_parser = parse_decimal, help = "Gold rate per gram; derives the total price")]
    gold_rate: Option<Decimal>,
    #[arg(long, value_parser = parse_decimal, help = "Making charges added to the derived price")]
    making_charges: Option<Decimal>,
    #[arg(long, value_parser = parse_decimal, help = "Stone value added to the derived price")]
    stone_value: Option<Decimal>,
    #[arg(long, help = "Also save the item's QR label to this path")]
    label: Option<PathBuf>,
}

#[derive(Args)]
struct NewItemArgs {
    #[arg(long, help = "Item id; defaults to the next issued id")]
    item_id: Option<String>,
    #[command(flatten)]
    fields: ItemFieldArgs,
}

#[derive(Args)]
struct EditItemArgs {
    #[arg(help = "Item id, e.g. NGP0007")]
    id: String,
    #[command(flatten)]
    fields: ItemFieldArgs,
}

#[derive(Args)]
struct DeleteArgs {
    id: String,
    #[arg(long, action = ArgAction::SetTrue, help = "Skip the confirmation prompt")]
    yes: bool,
}

#[derive(Args)]
struct ShowArgs {
    id: String,
}

#[derive(Args)]
struct ListArgs {
    #[arg(long = "type", help = "Only items of this type")]
    item_type: Option<String>,
    #[arg(long, help = "Only items of this purity")]
    purity: Option<String>,
    #[arg(long, help = "Search id, type, description and hallmark")]
    search: Option<String>,
    #[arg(long, default_value_t = 1)]
    page: usize,
}

#[derive(Args)]
struct ExportArgs {
    #[arg(long, help = "Destination; defaults to naqshi-gold-backup-<date>.json")]
    out: Option<PathBuf>,
}

#[derive(Args)]
struct ImportArgs {
    #[arg(help = "Snapshot file (.json)")]
    path: PathBuf,
}

#[derive(Args)]
struct LabelArgs {
    id: String,
    #[arg(long, help = "Destination; defaults to <itemId>_QR.png")]
    out: Option<PathBuf>,
    #[arg(long, action = ArgAction::SetTrue, help = "Draw the QR code in the terminal")]
    terminal: bool,
    #[arg(long, action = ArgAction::SetTrue, help = "Print the label data for copying")]
    copy: bool,
}

#[derive(Args)]
struct PriceArgs {
    #[arg(long, value_parser = parse_decimal)]
    weight: Decimal,
    #[arg(long, value_parser = parse_decimal)]
    gold_rate: Decimal,
    #[arg(long, value_parser = parse_decimal, default_value = "0")]
    making_charges: Decimal,
    #[arg(long, value_parser = parse_decimal, default_value = "0")]
    stone_value: Decimal,
}

struct CliContext {
    config: AppConfig,
    store: InventoryStore,
}

impl CliContext {
    async fn initialize(data_dir: Option<PathBuf>) -> Result<Self> {
        let mut config = config::load_config().context("failed to load application config")?;
        config::init_tracing(config.log_level(), config.log_json);
        if let Some(data_dir) = data_dir {
            config.data_dir = data_dir;
        }

        let gateway = Arc::new(JsonFileGateway::new(
            config.storage_config(),
            config.default_settings(),
        ));

        let (event_sender, mut event_rx) = EventSender::channel(32);
        tokio::spawn(async move {
            while let Some(event) = event_rx.recv().await {
                debug!(target: "naqshi", event = ?event, "received store event");
            }
        });

        let store = InventoryStore::open(gateway, Some(event_sender))
            .await
            .with_page_size(config.page_size);

        Ok(Self { config, store })
    }
}

async fn handle_new(context: &mut CliContext, args: NewItemArgs, json: bool) -> Result<()> {
    let mut form = context.store.blank_form();
    if let Some(item_id) = args.item_id {
        if !is_issued_id(&item_id) {
            warn!(item_id = %item_id, "item id does not follow the NGP sequence");
        }
        form.item_id = item_id;
    }
    apply_fields(&mut form, &args.fields);

    let committed = context.store.create(&form).await?;
    let label_path = save_label_if_requested(context, &committed.value, &args.fields).await?;
    report_committed(&committed, json, "Created", label_path)
}

async fn handle_edit(context: &mut CliContext, args: EditItemArgs, json: bool) -> Result<()> {
    let record = context
        .store
        .get(&args.id)
        .ok_or_else(|| anyhow!("item {} not found", args.id))?;
    let mut form = ItemForm::from_record(record);
    apply_fields(&mut form, &args.fields);

    let committed = context.store.update(&args.id, &form).await?;
    let label_path = save_label_if_requested(context, &committed.value, &args.fields).await?;
    report_committed(&committed, json, "Updated", label_path)
}

async fn handle_delete(context: &mut CliContext, args: DeleteArgs, json: bool) -> Result<()> {
    if context.store.get(&args.id).is_none() {
        bail!("item {} not found", args.id);
    }
    if !args.yes && !confirm(&format!("Delete item {}?", args.id))? {
        println!("Cancelled");
        return Ok(());
    }

    match context.store.delete(&args.id).await {
        Some(committed) => report_committed(&committed, json, "Deleted", None),
        None => Ok(()),
    }
}

fn handle_show(context: &CliContext, args: ShowArgs, json: bool) -> Result<()> {
    let record = context
        .store
        .get(&args.id)
        .ok_or_else(|| anyhow!("item {} not found", args.id))?;
    if json {
        return print_json(record);
    }
    render_record_detail(record);
    Ok(())
}

fn handle_list(context: &CliContext, args: ListArgs, json: bool) -> Result<()> {
    let filter = InventoryFilter {
        item_type: args.item_type,
        purity: args.purity,
        search: args.search,
    };
    let page = context.store.page(&filter, args.page);
    if json {
        return print_json(&page);
    }
    render_page(&page, context.store.len());
    Ok(())
}

fn handle_next_id(context: &CliContext, json: bool) -> Result<()> {
    let item_id = context.store.peek_next_item_id();
    if json {
        return print_json(&serde_json::json!({ "itemId": item_id }));
    }
    println!("{}", item_id);
    Ok(())
}

fn handle_stats(context: &CliContext, json: bool) -> Result<()> {
    let metrics = context.store.metrics();
    if json {
        return print_json(&metrics);
    }
    render_metrics(&metrics);
    Ok(())
}

async fn handle_export(context: &CliContext, args: ExportArgs, json: bool) -> Result<()> {
    let path = args
        .out
        .unwrap_or_else(|| PathBuf::from(context.store.export_snapshot().file_name()));
    let outcome = context.store.export_to(&path).await;
    report_outcome(&outcome, json, "Exported inventory")
}

async fn handle_import(context: &mut CliContext, args: ImportArgs, json: bool) -> Result<()> {
    if !matches_filters(&args.path, JSON_FILTERS) {
        bail!("{} is not a .json file", args.path.display());
    }
    let committed = context
        .store
        .import_from(&args.path)
        .await
        .with_context(|| format!("failed to import {}", args.path.display()))?;

    if json {
        print_json(&committed)?;
    } else {
        match committed.value.items {
            Some(count) => println!("Imported {} items", count),
            None => println!("No inventory in file; items unchanged"),
        }
        if committed.value.settings_replaced {
            println!("Settings replaced");
        }
    }
    ensure_saved(&committed.saved)
}

async fn handle_label(context: &CliContext, args: LabelArgs, json: bool) -> Result<()> {
    let payload = context.store.label_payload(&args.id)?;
    let renderer = context.config.label_renderer();

    if args.terminal {
        println!("{}", renderer.render_terminal(&payload)?);
    }
    if args.copy {
        println!("{}", payload.clipboard_text()?);
    }
    if (args.terminal || args.copy) && args.out.is_none() {
        return Ok(());
    }

    let path = save_label(context, &payload, args.out).await?;
    if json {
        return print_json(&serde_json::json!({ "itemId": payload.item_id, "path": path }));
    }
    println!("Label saved to {}", path.display());
    Ok(())
}

fn handle_price(args: PriceArgs, json: bool) -> Result<()> {
    let inputs = PriceInputs {
        weight: args.weight,
        gold_rate: args.gold_rate,
        making_charges: args.making_charges,
        stone_value: args.stone_value,
    };
    let total = calculate_total_price(&inputs)
        .ok_or_else(|| anyhow!("weight and gold rate must both be greater than zero"))?;
    if json {
        return print_json(&serde_json::json!({ "inputs": inputs, "totalPrice": total }));
    }
    println!("{:.2}", total);
    Ok(())
}

fn apply_fields(form: &mut ItemForm, args: &ItemFieldArgs) {
    let updates = [
        ("storeName", &args.store_name),
        ("itemType", &args.item_type),
        ("weight", &args.weight),
        ("purity", &args.purity),
        ("totalPrice", &args.total_price),
        ("size", &args.size),
        ("color", &args.color),
        ("hallmark", &args.hallmark),
        ("description", &args.description),
    ];
    for (field, value) in updates {
        if let Some(value) = value {
            form.set(field, value.as_str());
        }
    }
    if let Some(custom) = &args.other {
        form.set("itemType", OTHER_ITEM_TYPE);
        form.set("customType", custom.as_str());
    }

    if let Some(gold_rate) = args.gold_rate {
        let inputs = PriceInputs {
            weight: Decimal::from_str(form.weight.trim()).unwrap_or_default(),
            gold_rate,
            making_charges: args.making_charges.unwrap_or_default(),
            stone_value: args.stone_value.unwrap_or_default(),
        };
        if apply_to_form(form, &inputs).is_none() {
            debug!("price inputs incomplete; keeping entered total price");
        }
    }
}

async fn save_label_if_requested(
    context: &CliContext,
    record: &ItemRecord,
    args: &ItemFieldArgs,
) -> Result<Option<PathBuf>> {
    match &args.label {
        Some(path) => {
            let payload = QrPayload::from_record(record);
            Ok(Some(save_label(context, &payload, Some(path.clone())).await?))
        }
        None => Ok(None),
    }
}

async fn save_label(
    context: &CliContext,
    payload: &QrPayload,
    out: Option<PathBuf>,
) -> Result<PathBuf> {
    let path = out.unwrap_or_else(|| PathBuf::from(payload.file_name()));
    if !matches_filters(&path, IMAGE_FILTERS) {
        bail!("{} must end in .png or .pdf", path.display());
    }
    let picker = FixedDestination(Some(path.clone()));
    let outcome = context
        .store
        .save_label(&payload.id, &context.config.label_renderer(), &picker)
        .await?;
    outcome
        .into_result()
        .context("failed to save label")?
        .ok_or_else(|| anyhow!("label save cancelled"))
}

fn confirm(prompt: &str) -> Result<bool> {
    print!("{} [y/N] ", prompt);
    io::stdout().flush()?;
    let mut answer = String::new();
    io::stdin().lock().read_line(&mut answer)?;
    Ok(matches!(answer.trim().to_lowercase().as_str(), "y" | "yes"))
}

fn report_committed(
    committed: &Committed<ItemRecord>,
    json: bool,
    verb: &str,
    label_path: Option<PathBuf>,
) -> Result<()> {
    if json {
        print_json(&serde_json::json!({
            "item": committed.value,
            "saved": committed.saved,
            "labelPath": label_path,
        }))?;
    } else {
        println!("{} item {}", verb, committed.value.item_id);
        render_record(&committed.value);
        if let Some(path) = label_path {
            println!("Label saved to {}", path.display());
        }
    }
    ensure_saved(&committed.saved)
}

fn report_outcome(outcome: &SaveOutcome, json: bool, message: &str) -> Result<()> {
    if json {
        print_json(outcome)?;
    } else if let Some(path) = &outcome.path {
        println!("{} to {}", message, path.display());
    }
    ensure_saved(outcome)
}

fn ensure_saved(outcome: &SaveOutcome) -> Result<()> {
    match &outcome.error {
        Some(error) if !outcome.success => Err(anyhow!("changes could not be saved: {}", error)),
        _ => Ok(()),
    }
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<()> {
    println!("{}", serde_json::to_string_pretty(value)?);
    Ok(())
}

fn render_record(record: &ItemRecord) {
    println!(
        "- {} • {} • {}g • {} • {}",
        record.item_id, record.item_type, record.weight, record.purity, record.total_price
    );
}

fn render_record_detail(record: &ItemRecord) {
    println!("Item        {}", record.item_id);
    println!("Store       {}", record.store_name);
    println!("Type        {}", record.item_type);
    println!("Weight      {} g", record.weight);
    println!("Purity      {}", record.purity);
    println!("Price       {}", record.total_price);
    let optional = [
        ("Size", &record.size),
        ("Color", &record.color),
        ("Hallmark", &record.hallmark),
        ("Description", &record.description),
    ];
    for (label, value) in optional {
        if let Some(value) = value {
            println!("{:<11} {}", label, value);
        }
    }
    println!("Created     {}", record.date_created.to_rfc3339());
    println!("Modified    {}", record.date_modified.to_rfc3339());
}

fn render_page(page: &Page<ItemRecord>, inventory_size: usize) {
    if page.items.is_empty() {
        println!("No items found");
        return;
    }
    for record in &page.items {
        render_record(record);
    }
    println!(
        "Page {} of {} ({} matching, {} in inventory)",
        page.page, page.total_pages, page.total, inventory_size
    );
}

fn render_metrics(metrics: &InventoryMetrics) {
    println!("Items        {}", metrics.total_items);
    println!("Total value  {}", metrics.total_value);
    println!("Types        {}", metrics.distinct_types);
    for entry in &metrics.by_type {
        println!("  {:<10} {}", entry.label, entry.count);
    }
    println!("Purities");
    for entry in &metrics.by_purity {
        println!("  {:<10} {}", entry.label, entry.count);
    }
}

fn parse_decimal(raw: &str) -> Result<Decimal, String> {
    Decimal::from_str(raw).map_err(|_| format!("invalid decimal '{raw}'"))
}

fn parse_item_type(raw: &str) -> Result<String, String> {
    let label = raw.trim();
    if is_selectable_type(label) {
        return Ok(label.to_string());
    }
    Err(format!(
        "unknown item type '{label}'; expected one of {}, {OTHER_ITEM_TYPE} (use --other for anything else)",
        JewelryType::labels().join(", ")
    ))
}
