mod cli;
mod error;
mod logging;

use crate::cli::{Cli, Command};
use crate::error::{ErrorKind, Result};
use clap::Parser;
use exn::ResultExt;
use filedeck_config::{Config, TransportConfig};
use filedeck_manager::{
    Downloader, FileKind, FileList, MetadataClient, Selection, SessionHandle, UploadEvent, Uploader, format_size,
};
use filedeck_store::{FileId, FileMetadata, SqliteStore};
use filedeck_transport::{LocalFile, LocalTransport, RouteTable, UploadTransport};
use futures::StreamExt;
use std::path::{Path, PathBuf};
use std::pin::pin;
use std::process::ExitCode;
use std::sync::Arc;
use time::format_description::BorrowedFormatItem;
use tokio::io::AsyncWriteExt;
use time::macros::format_description;

const DATE: &[BorrowedFormatItem<'static>] = format_description!("[day padding:none] [month repr:short] [year]");

#[tokio::main(flavor = "current_thread")]
async fn main() -> ExitCode {
    let cli = Cli::parse();
    let config = match load_config(cli.config.as_deref()) {
        Ok(config) => config,
        Err(e) => {
            eprintln!("{e:?}");
            return ExitCode::FAILURE;
        },
    };
    logging::init(&config.logging.level);

    match run(cli, config).await {
        Ok(()) => ExitCode::SUCCESS,
        Err(e) => {
            eprintln!("{e:?}");
            ExitCode::FAILURE
        },
    }
}

fn load_config(path: Option<&Path>) -> Result<Config> {
    Config::load(path).or_raise(|| ErrorKind::Config)
}

async fn run(cli: Cli, config: Config) -> Result<()> {
    if let Command::Routes = cli.command {
        print_routes(&config.routes, &config.default_route);
        return Ok(());
    }

    let store = Arc::new(SqliteStore::connect(&config.database.path).await.or_raise(|| ErrorKind::Store)?);
    let transport = Arc::new(open_transport(&config.transport)?);
    let session = cli.user.map(SessionHandle::signed_in).unwrap_or_default();
    let client = MetadataClient::new(store.clone(), session.into_ref());

    let result = match cli.command {
        Command::Upload { route, paths } => {
            let route = route.unwrap_or_else(|| config.default_route.clone());
            upload(client, transport, config.routes, &route, &paths).await
        },
        Command::List { filter, json } => list(client, filter.as_deref(), json).await,
        Command::Show { id } => show(client, FileId::from(id)).await,
        Command::Download { output, id } => download(client, transport, FileId::from(id), output).await,
        Command::Delete { purge, id } => delete(client, &transport, FileId::from(id), purge).await,
        Command::Routes => Ok(()),
    };
    store.close().await;
    result
}

fn open_transport(config: &TransportConfig) -> Result<LocalTransport> {
    let transport = match &config.public_url {
        Some(url) => LocalTransport::new(&config.root, url.clone()),
        None => LocalTransport::with_file_urls(&config.root),
    }
    .or_raise(|| ErrorKind::Transport)?;
    let chunk_size = usize::try_from(config.chunk_size.bytes()).unwrap_or(usize::MAX);
    Ok(transport.with_chunk_size(chunk_size))
}

async fn upload(
    client: MetadataClient,
    transport: Arc<LocalTransport>,
    routes: RouteTable,
    route: &str,
    paths: &[PathBuf],
) -> Result<()> {
    let mut files = Vec::with_capacity(paths.len());
    for path in paths {
        let file = LocalFile::from_path(path)
            .await
            .or_raise(|| ErrorKind::Input(path.display().to_string()))?;
        files.push(file);
    }

    let uploader = Uploader::new(client, transport, Arc::new(routes));
    let mut events = pin!(
        uploader
            .upload(route, Selection::Picker(files))
            .or_raise(|| ErrorKind::Command("upload"))?
    );
    let mut last_error = None;
    while let Some(event) = events.next().await {
        match event {
            Ok(UploadEvent::Started { file_name }) => eprintln!("uploading {file_name}"),
            Ok(UploadEvent::Progress(progress)) => tracing::debug!(progress, "Transfer progress"),
            Ok(UploadEvent::Persisted(file)) => println!("{}\t{}\t{}", file.id, file.name, file.url),
            Ok(UploadEvent::Complete { persisted, failed }) => {
                eprintln!("{persisted} uploaded, {failed} failed");
            },
            Err(e) => {
                eprintln!("error: {}", &*e);
                last_error = Some(e);
            },
        }
    }
    match last_error {
        Some(e) => Err(e.raise(ErrorKind::Command("upload"))),
        None => Ok(()),
    }
}

async fn list(client: MetadataClient, filter: Option<&str>, json: bool) -> Result<()> {
    let list = FileList::load(client).await.or_raise(|| ErrorKind::Command("list"))?;
    let files: Vec<&FileMetadata> = match filter {
        Some(query) => list.filter(query),
        None => list.files().iter().collect(),
    };

    if json {
        let out = serde_json::to_string_pretty(&files).or_raise(|| ErrorKind::Output)?;
        println!("{out}");
        return Ok(());
    }
    for file in &files {
        println!(
            "{}\t{}\t{}\t{}\t{}",
            file.id,
            FileKind::from_mime(&file.mime_type),
            format_size(file.size),
            file.upload_date.format(DATE).unwrap_or_default(),
            file.name,
        );
    }
    if filter.is_none() {
        eprintln!("{} file(s), {}", list.len(), format_size(list.total_size()));
    }
    Ok(())
}

async fn show(client: MetadataClient, id: FileId) -> Result<()> {
    let file = client.get(&id).await.or_raise(|| ErrorKind::Command("show"))?;
    println!("id:       {}", file.id);
    println!("name:     {}", file.name);
    println!("kind:     {}", FileKind::from_mime(&file.mime_type));
    println!("type:     {}", file.mime_type);
    println!("size:     {}", format_size(file.size));
    println!("uploaded: {}", file.upload_date.format(DATE).unwrap_or_default());
    println!("url:      {}", file.url);
    Ok(())
}

async fn download(client: MetadataClient, transport: Arc<LocalTransport>, id: FileId, output: Option<PathBuf>) -> Result<()> {
    let downloader = Downloader::new(client, transport);
    let (file, mut reader) = downloader.open(&id).await.or_raise(|| ErrorKind::Command("download"))?;
    // Stored names are whatever the uploader picked; only the last component is used.
    let output = output.unwrap_or_else(|| {
        Path::new(&file.name)
            .file_name()
            .map_or_else(|| PathBuf::from(file.id.to_string()), PathBuf::from)
    });
    let mut target = tokio::fs::OpenOptions::new()
        .write(true)
        .create_new(true)
        .open(&output)
        .await
        .or_raise(|| ErrorKind::Output)?;
    let copied = tokio::io::copy(&mut reader, &mut target).await.or_raise(|| ErrorKind::Output)?;
    target.flush().await.or_raise(|| ErrorKind::Output)?;
    eprintln!("saved {} ({}) to {}", file.name, format_size(copied), output.display());
    Ok(())
}

async fn delete(client: MetadataClient, transport: &LocalTransport, id: FileId, purge: bool) -> Result<()> {
    let mut list = FileList::load(client).await.or_raise(|| ErrorKind::Command("delete"))?;
    let url = list.get(&id).map(|file| file.url.clone());
    list.on_delete_requested(&id).await.or_raise(|| ErrorKind::Command("delete"))?;

    let Some(url) = url else {
        tracing::info!(id = %id, "Nothing to delete");
        return Ok(());
    };
    if purge {
        let removed = transport.remove(&url).await.or_raise(|| ErrorKind::Command("delete"))?;
        if !removed {
            tracing::warn!(url = %url, "Stored object was already gone");
        }
    }
    eprintln!("deleted {id}");
    Ok(())
}

fn print_routes(routes: &RouteTable, default_route: &str) {
    for (name, route) in routes.iter() {
        let marker = if name == default_route { " (default)" } else { "" };
        println!("{name}{marker}");
        for (category, limits) in route.categories() {
            println!("  {category}: up to {} file(s) of {} each", limits.max_file_count, limits.max_file_size);
        }
    }
}
