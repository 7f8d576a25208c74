//! Example walking through engine edits, persistence and restore
//!
//! Run with: cargo run --package synthmix-core --example config_demo

use std::sync::Arc;
use synthmix_core::domain::{
    BuiltinFx, BusIndex, BusTarget, ChannelId, ConfigManager, FxKind, MasterEffect, MixerEngine,
    NullHost,
};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt()
        .with_env_filter("synthmix_core=debug,info")
        .init();

    println!("=== SynthMix Configuration Demo ===\n");

    let temp_dir = tempfile::tempdir()?;
    let manager = ConfigManager::new(temp_dir.path().to_path_buf());

    println!("1. Loading (creates the factory default)...");
    let mut config = manager.load().await;
    println!("   Channels: {}", config.mixer.channels.len());

    println!("\n2. Editing the mixer...");
    let mut engine = MixerEngine::new(Arc::new(NullHost));
    engine.restore(&config.mixer);
    let kick = ChannelId::instrument(26)?;
    let snare = ChannelId::instrument(27)?;
    let drums = BusIndex::new(0)?;
    engine.set_bus_target(kick, BusTarget::Bus(drums))?;
    engine.set_bus_target(snare, BusTarget::Bus(drums))?;
    engine.set_bus_names(drums, "Drums".to_string(), "Drum Bus".to_string());
    engine.add_fx(ChannelId::bus(drums), FxKind::Builtin(BuiltinFx::Compressor), None)?;
    engine.set_master_fx_enabled(MasterEffect::Reverb, true);
    engine.set_mute(ChannelId::bus(drums), true);
    println!("   Bus members: {:?}", engine.bus_members(drums));
    println!("   Kick muted by cascade: {}", engine.is_muted(kick));

    println!("\n3. Saving to {}...", manager.config_path().display());
    config.mixer = engine.settings();
    manager.save(&config).await?;

    println!("\n4. Restoring into a fresh engine...");
    let mut restored = MixerEngine::new(Arc::new(NullHost));
    let report = restored.restore(&manager.load().await.mixer);
    println!(
        "   Restored {} channels, {} FX units, complete: {}",
        report.channels,
        report.fx_units,
        report.is_complete()
    );
    println!("   Bus 1 is now called {}", restored.bus_names().full(drums));

    println!("\n=== Demo Complete ===");
    Ok(())
}
