use std::io::Write;

use clap::Args;
use eyre::{Result, WrapErr};
use histsync_client::{
    database::Database,
    history_file::HistoryFile,
    record::CommandRecord,
    settings::Settings,
    sync::{ExportOutcome, SyncEngine},
};

#[derive(Args, Debug)]
pub struct ListArgs {
    /// Print records as a JSON array
    #[arg(long)]
    json: bool,
}

#[derive(Args, Debug)]
pub struct SearchArgs {
    /// Commands must start with this text (case sensitive)
    prefix: String,

    /// Print records as a JSON array
    #[arg(long)]
    json: bool,
}

async fn open_db(settings: &Settings) -> Result<Database> {
    Database::new(settings.db_path(), settings.db_timeout)
        .await
        .wrap_err_with(|| format!("could not open database at {}", settings.db_path))
}

async fn engine(settings: &Settings) -> Result<SyncEngine> {
    let db = open_db(settings).await?;

    Ok(SyncEngine::new(HistoryFile::new(settings.history_path()), db))
}

pub async fn import(settings: &Settings) -> Result<()> {
    let engine = engine(settings).await?;

    let imported = engine
        .import_from_file()
        .await
        .wrap_err("could not import history file")?;

    println!(
        "Imported {imported} commands from {}",
        settings.history_path
    );

    engine.db().close().await;
    Ok(())
}

pub async fn export(settings: &Settings) -> Result<()> {
    let engine = engine(settings).await?;

    let outcome = engine
        .export_to_file()
        .await
        .wrap_err("could not export history file")?;

    match outcome {
        ExportOutcome::Skipped => println!("No commands to write"),
        ExportOutcome::Written(n) => {
            println!("Wrote {n} commands to {}", settings.history_path);
        }
    }

    engine.db().close().await;
    Ok(())
}

pub async fn list(settings: &Settings, args: &ListArgs) -> Result<()> {
    let db = open_db(settings).await?;
    let records = db.list_all().await?;

    print_records(&records, args.json)?;

    db.close().await;
    Ok(())
}

pub async fn search(settings: &Settings, args: &SearchArgs) -> Result<()> {
    let db = open_db(settings).await?;
    let records = db.filter_by_prefix(&args.prefix).await?;

    print_records(&records, args.json)?;

    db.close().await;
    Ok(())
}

fn print_records(records: &[CommandRecord], json: bool) -> Result<()> {
    let stdout = std::io::stdout();
    let mut w = stdout.lock();

    if json {
        serde_json::to_writer_pretty(&mut w, records)?;
        writeln!(w)?;
    } else {
        for record in records {
            writeln!(w, "{}\t{}", record.id, record.command)?;
        }
    }

    w.flush()?;
    Ok(())
}
