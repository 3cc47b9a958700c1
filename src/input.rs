use anyhow::Context;
use std::path::Path;
use tokio::io::{AsyncBufReadExt, BufReader};

pub async fn read_addresses(path: &Path) -> anyhow::Result<Vec<String>> {
    let file = tokio::fs::File::open(path)
        .await
        .with_context(|| format!("cannot open input {}", path.display()))?;
    let mut reader = BufReader::new(file).lines();
    let mut addresses = Vec::new();
    while let Some(line) = reader
        .next_line()
        .await
        .with_context(|| format!("cannot read input {}", path.display()))?
    {
        if let Some(address) = parse_address(&line) {
            addresses.push(address.to_string());
        }
    }
    Ok(addresses)
}

fn parse_address(line: &str) -> Option<&str> {
    let trimmed = line.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return None;
    }
    Some(trimmed)
}
