use std::{fs, process, sync::Arc};

use omnia::{
    application::{AppError, Catalog, Hydrator, ItemWriter, Resource, Resources},
    cache::build_store,
    config::{self, Command, CreateArgs, GetArgs, PayloadArgs, Settings, UpdateArgs},
    infra::{fetcher::HttpFetcher, telemetry, writer::HttpItemTransport},
    types::ResourceId,
};
use serde::Serialize;
use serde_json::{Value, json};
use tokio_util::sync::CancellationToken;
use tracing::{Dispatch, Level, dispatcher, error, info};
use tracing_subscriber::fmt as tracing_fmt;

#[tokio::main]
async fn main() {
    if let Err(error) = run().await {
        report_application_error(&error);
        process::exit(error.exit_code());
    }
}

fn report_application_error(error: &AppError) {
    let report = error.report();
    if dispatcher::has_been_set() {
        error!(source = report.source, error = %report.render(), "application error");
        return;
    }

    let subscriber = tracing_fmt().with_max_level(Level::ERROR).finish();
    let dispatch = Dispatch::new(subscriber);
    dispatcher::with_default(&dispatch, || {
        error!(source = report.source, error = %report.render(), "application error");
    });
}

async fn run() -> Result<(), AppError> {
    let (cli_args, settings) = config::load_with_cli()?;

    telemetry::init(&settings.logging)?;

    match cli_args.command {
        Command::Get(args) => run_get(&settings, args).await,
        Command::Plans => print_json(&plans_overview()),
        Command::Create(args) => run_create(&settings, args).await,
        Command::Update(args) => run_update(&settings, args).await,
    }
}

fn build_resources(settings: &Settings) -> Result<Resources, AppError> {
    let store = build_store(&settings.cache)?;
    let fetcher = HttpFetcher::new(&settings.api)?;
    Ok(Resources::new(Hydrator::new(Arc::new(fetcher), store)))
}

fn build_writer(settings: &Settings) -> Result<ItemWriter, AppError> {
    let transport = HttpItemTransport::new(&settings.api, &settings.write)?;
    Ok(ItemWriter::new(Arc::new(transport)))
}

async fn run_get(settings: &Settings, args: GetArgs) -> Result<(), AppError> {
    let resources = build_resources(settings)?;
    let id = args.id.map(ResourceId::from);

    let cancel = CancellationToken::new();
    let interrupt = {
        let cancel = cancel.clone();
        tokio::spawn(async move {
            if tokio::signal::ctrl_c().await.is_ok() {
                info!("Interrupted; cancelling");
                cancel.cancel();
            }
        })
    };

    let result = resources
        .resource_with(&args.collection, id.clone(), &cancel)
        .await;
    interrupt.abort();

    match result? {
        Resource::Collection(items) => print_json(&*items),
        Resource::Item(item) => print_json(&item),
        Resource::Missing => Err(AppError::NotFound {
            collection: args.collection,
            id: id.map(ResourceId::into_string).unwrap_or_default(),
        }),
    }
}

async fn run_create(settings: &Settings, args: CreateArgs) -> Result<(), AppError> {
    let writer = build_writer(settings)?;
    let payload = read_payload(args.payload)?;
    let item = writer.create_item(&args.resource, payload).await?;
    print_json(&item)
}

async fn run_update(settings: &Settings, args: UpdateArgs) -> Result<(), AppError> {
    let writer = build_writer(settings)?;
    let payload = read_payload(args.payload)?;
    let item = writer.update_item(&args.resource, args.id, payload).await?;
    print_json(&item)
}

fn read_payload(args: PayloadArgs) -> Result<Value, AppError> {
    let text = match (args.data, args.data_file) {
        (_, Some(path)) => fs::read_to_string(&path).map_err(|err| {
            AppError::validation(format!("failed to read {}: {err}", path.display()))
        })?,
        (Some(data), None) => data,
        (None, None) => return Err(AppError::validation("--data or --data-file is required")),
    };
    serde_json::from_str(&text)
        .map_err(|err| AppError::validation(format!("payload is not valid JSON: {err}")))
}

fn plans_overview() -> Vec<Value> {
    Catalog::global()
        .plans()
        .map(|plan| {
            json!({
                "name": plan.name(),
                "type": plan.item_type(),
                "action": plan.action(),
                "references": plan.references(),
            })
        })
        .collect()
}

fn print_json<T: Serialize + ?Sized>(value: &T) -> Result<(), AppError> {
    let out = serde_json::to_string_pretty(value)
        .map_err(|err| AppError::unexpected(format!("failed to render output: {err}")))?;
    println!("{out}");
    Ok(())
}
