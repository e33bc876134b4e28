use super::ui;
use crate::core::{Artifact, Payload, UploadArtifactManager};
use anyhow::{Context, Result};
use comfy_table::Cell;
use std::path::Path;

pub fn display_artifact(artifact: &Artifact) -> String {
    let mut table = ui::new_styled_table();
    table.set_header(vec![ui::header_cell("Field"), ui::header_cell("Value")]);
    table.add_row(vec![Cell::new("Category"), Cell::new(&artifact.category)]);
    table.add_row(vec![Cell::new("Storage key"), Cell::new(&artifact.storage_key)]);
    table.add_row(vec![Cell::new("Locator"), Cell::new(&artifact.public_locator)]);
    table.add_row(vec![Cell::new("Size"), Cell::new(format_size(artifact.size_bytes))]);
    table.add_row(vec![Cell::new("Mime type"), Cell::new(&artifact.mime_type)]);
    table.add_row(vec![Cell::new("Original name"), Cell::new(&artifact.original_name)]);
    table.to_string()
}

fn format_size(bytes: u64) -> String {
    format!("{:.2} KB", bytes as f64 / 1024.0)
}

async fn read_payload(file: &Path) -> Result<Payload> {
    let bytes = tokio::fs::read(file)
        .await
        .with_context(|| format!("Failed to read file: {}", file.display()))?;
    let name = file
        .file_name()
        .and_then(|n| n.to_str())
        .with_context(|| format!("Invalid file name: {}", file.display()))?;
    Ok(Payload::from_named(bytes, name))
}

pub async fn run_upload(uploads: &UploadArtifactManager, file: &Path, category: &str) -> Result<()> {
    let payload = read_payload(file).await?;
    let artifact = uploads.store(&payload, category, None).await?;
    println!("{}", display_artifact(&artifact));
    Ok(())
}

pub async fn run_replace(
    uploads: &UploadArtifactManager,
    locator: &str,
    file: &Path,
    category: &str,
) -> Result<()> {
    let payload = read_payload(file).await?;
    let artifact = uploads
        .replace(Some(locator), &payload, category, None)
        .await?;
    println!("{}", display_artifact(&artifact));
    Ok(())
}

pub async fn run_delete(uploads: &UploadArtifactManager, locator: &str, category: &str) -> Result<()> {
    uploads.delete(locator, category).await?;
    println!(
        "{}",
        ui::style_text(&format!("Deleted {locator}"), ui::StyleType::Success)
    );
    Ok(())
}
