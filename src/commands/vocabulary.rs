use anyhow::Result;
use uuid::Uuid;

use agendasync_core::SyncEngine;

pub async fn run(engine: &SyncEngine, instance: Uuid) -> Result<()> {
    let vocabulary = engine.sync_vocabulary(instance).await?;

    let mut types: Vec<_> = vocabulary.types().iter().collect();
    types.sort_by(|a, b| a.0.cmp(b.0));
    println!("Types:");
    for (name, kind) in types {
        println!("  {name} -> {kind}");
    }

    let mut statuses: Vec<_> = vocabulary.statuses().iter().collect();
    statuses.sort_by(|a, b| a.0.cmp(b.0));
    println!("Statuses:");
    for (name, status) in statuses {
        println!("  {name} -> {status}");
    }

    let codes: Vec<_> = vocabulary.type_codes().iter().map(|c| c.as_str()).collect();
    println!("Fetched type codes: {}", codes.join(", "));

    Ok(())
}
