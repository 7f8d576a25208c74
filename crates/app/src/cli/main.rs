//! SynthMix CLI Application

use anyhow::Context;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use synthmix_core::domain::{
    default_names, group_by_vendor, AudioEnumerator, BuiltinFx, BusIndex, BusTarget,
    ChannelId, Command, CommandOutcome, ConfigManager, FxKind, MasterEffect, MixerEngine, NullHost,
    PluginHost, PluginUid, CHANNEL_COUNT,
};
use synthmix_infra::audio::{render_test_tone, CpalEnumerator};
use synthmix_infra::plugin::FactoryHost;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "synthmix")]
#[command(about = "Channel mixer, bus router and FX chain manager", long_about = None)]
struct Cli {
    /// Enable verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Configuration directory (defaults to the user config dir)
    #[arg(long)]
    config_dir: Option<PathBuf>,

    /// Run without the plugin host
    #[arg(long)]
    no_plugins: bool,

    #[command(subcommand)]
    command: CliCommand,
}

#[derive(Subcommand)]
enum CliCommand {
    /// List all channels with their state
    Channels,
    /// List available plugins grouped by vendor
    Plugins,
    /// List output devices
    Devices,
    /// Set a channel's gain (0-100)
    Gain {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        level: i32,
    },
    /// Mute or unmute a channel (buses cascade to their members)
    Mute {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    /// Solo or unsolo a channel (buses cascade to their members)
    Solo {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    /// Route a channel to master or a bus (1-16)
    Route {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        #[arg(value_parser = parse_target)]
        target: BusTarget,
    },
    /// Add an effect: built-in name or plugin unique id
    AddFx {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        #[arg(value_parser = parse_fx_kind)]
        fx: FxKind,
        /// Insert position (appends when omitted)
        #[arg(long)]
        position: Option<usize>,
    },
    /// Remove the effect at an index
    RemoveFx {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        index: usize,
    },
    /// Bypass or enable the effect at an index
    Bypass {
        #[arg(value_parser = parse_channel)]
        channel: ChannelId,
        index: usize,
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    /// Switch a master effect (eq, chorus, reverb) on or off
    Master {
        effect: MasterEffect,
        #[arg(value_parser = parse_switch, action = clap::ArgAction::Set)]
        state: bool,
    },
    /// Select the instrument preset bank (0-10)
    Preset { bank: usize },
    /// Reset every channel to default gain, unmuted and unsoloed
    Reset,
    /// Render a test tone through the current mix and report levels
    Render {
        /// Channels to feed (every instrument channel when omitted)
        #[arg(value_parser = parse_channel)]
        channels: Vec<ChannelId>,
        #[arg(long, default_value_t = 1.0)]
        seconds: f32,
    },
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    let default_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .init();

    let config_dir = match cli.config_dir {
        Some(dir) => dir,
        None => ConfigManager::default_config_dir()?,
    };
    let manager = ConfigManager::new(config_dir);
    let mut config = manager.load().await;

    let host: Arc<dyn PluginHost> = if cli.no_plugins || !config.app.enable_plugins {
        info!("Plugin host disabled");
        Arc::new(NullHost)
    } else {
        Arc::new(FactoryHost::with_bundled())
    };

    let mut engine = MixerEngine::new(Arc::clone(&host));
    let report = engine.restore(&config.mixer);
    if !report.is_complete() {
        warn!(
            fx = report.skipped_fx.len(),
            slots = report.skipped_slots.len(),
            "Some persisted plugins could not be restored"
        );
    }

    let command = match cli.command {
        CliCommand::Channels => {
            print_channels(&engine);
            return Ok(());
        }
        CliCommand::Plugins => {
            print_plugins(host.as_ref());
            return Ok(());
        }
        CliCommand::Devices => {
            print_devices(config.audio.output_device(), config.app.sample_rate)?;
            return Ok(());
        }
        CliCommand::Render { channels, seconds } => {
            let channels = if channels.is_empty() {
                ChannelId::all().filter(|id| !id.is_bus()).collect()
            } else {
                channels
            };
            let result = render_test_tone(&mut engine, &config.app, &channels, seconds);
            println!(
                "Rendered {} frames in {} blocks of {} at {} Hz",
                result.frames, result.blocks, config.app.buffer_size, config.app.sample_rate
            );
            println!("Master peak: {:.3}", result.master_peak);
            let meters = engine.meters();
            for id in channels {
                println!("  {:<24} {:.3}", default_names(id).1, meters.peak(id));
            }
            return Ok(());
        }
        CliCommand::Gain { channel, level } => Command::SetGain { channel, level },
        CliCommand::Mute { channel, state } => Command::SetMute {
            channel,
            muted: state,
        },
        CliCommand::Solo { channel, state } => Command::SetSolo {
            channel,
            solo: state,
        },
        CliCommand::Route { channel, target } => Command::SetBusTarget { channel, target },
        CliCommand::AddFx {
            channel,
            fx,
            position,
        } => Command::AddFx {
            channel,
            kind: fx,
            position,
        },
        CliCommand::RemoveFx { channel, index } => Command::RemoveFx { channel, index },
        CliCommand::Bypass {
            channel,
            index,
            state,
        } => Command::SetFxBypass {
            channel,
            index,
            bypass: state,
        },
        CliCommand::Master { effect, state } => Command::SetMasterFxEnabled {
            effect,
            enabled: state,
        },
        CliCommand::Preset { bank } => Command::SetPresetBank { bank },
        CliCommand::Reset => Command::ResetChannels,
    };

    let outcome = engine.execute(command).context("Command rejected")?;
    match outcome {
        CommandOutcome::FxAdded { channel, index } => {
            println!("Added effect to {} at position {}", channel, index)
        }
        CommandOutcome::FxRemoved { channel, kind } => println!("Removed {} from {}", kind, channel),
        CommandOutcome::Applied => {}
    }

    config.mixer = engine.settings();
    manager.save(&config).await?;
    info!(path = %manager.config_path().display(), "Settings saved");

    Ok(())
}

fn print_channels(engine: &MixerEngine) {
    println!(
        "{:>3}  {:<24} {:>4}  {:<4} {:<4} {:<8} {:>3}",
        "#", "Name", "Gain", "Mute", "Solo", "Output", "FX"
    );
    for channel in engine.channels() {
        let (_, full) = default_names(channel.id);
        let name = match channel.id.as_bus() {
            Some(bus) => engine.bus_names().full(bus).to_string(),
            None => full,
        };
        let output = match (channel.id.is_bus(), channel.bus) {
            (true, _) | (false, BusTarget::Master) => "master".to_string(),
            (false, BusTarget::Bus(bus)) => engine.bus_names().short(bus).to_string(),
        };
        let disabled = if engine.is_channel_enabled(channel.id) {
            ""
        } else {
            " (disabled)"
        };
        println!(
            "{:>3}  {:<24} {:>4}  {:<4} {:<4} {:<8} {:>3}{}",
            channel.id.index(),
            name,
            channel.gain.level(),
            if channel.muted { "on" } else { "-" },
            if channel.solo { "on" } else { "-" },
            output,
            channel.fx.len(),
            disabled
        );
    }
    println!("Preset bank: {}", engine.preset_bank());
    let master: Vec<String> = engine
        .master_fx()
        .enabled()
        .map(|(effect, _)| effect.to_string())
        .collect();
    if !master.is_empty() {
        println!("Master effects: {}", master.join(", "));
    }
}

fn print_plugins(host: &dyn PluginHost) {
    let groups = group_by_vendor(host.list_available());
    if groups.is_empty() {
        println!("No plugins available");
        return;
    }
    for (vendor, plugins) in groups {
        println!("{}", vendor);
        for plugin in plugins {
            println!("  {:<24} {}", plugin.name, plugin.unique_id);
        }
    }
}

/// Devices whose default rate differs from the configured one are flagged
fn print_devices(selected: Option<&str>, sample_rate: u32) -> anyhow::Result<()> {
    let enumerator = CpalEnumerator::new();
    let active = enumerator.select_output(selected).ok();
    for device in enumerator.output_devices()? {
        let marker = if active.as_ref().map(|d| &d.id) == Some(&device.id) {
            "*"
        } else {
            " "
        };
        let rate = match device.default_sample_rate {
            Some(hz) if hz != sample_rate => format!("{} Hz (configured {} Hz)", hz, sample_rate),
            Some(hz) => format!("{} Hz", hz),
            None => String::new(),
        };
        println!("{} {:<40} {}", marker, device.name, rate);
    }
    Ok(())
}

/// Channel by index or by short/full name
fn parse_channel(s: &str) -> Result<ChannelId, String> {
    if let Ok(index) = s.parse::<usize>() {
        return ChannelId::from_index(index).map_err(|e| e.to_string());
    }
    ChannelId::all()
        .find(|id| {
            let (short, full) = default_names(*id);
            short.eq_ignore_ascii_case(s) || full.eq_ignore_ascii_case(s)
        })
        .ok_or_else(|| format!("no channel named '{}' (0-{})", s, CHANNEL_COUNT - 1))
}

fn parse_switch(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "on" | "true" | "1" | "yes" => Ok(true),
        "off" | "false" | "0" | "no" => Ok(false),
        _ => Err(format!("expected on or off, got '{}'", s)),
    }
}

/// `master` or a 1-based bus number
fn parse_target(s: &str) -> Result<BusTarget, String> {
    if s.eq_ignore_ascii_case("master") {
        return Ok(BusTarget::Master);
    }
    let number: usize = s
        .parse()
        .map_err(|_| format!("expected 'master' or a bus number, got '{}'", s))?;
    number
        .checked_sub(1)
        .ok_or_else(|| "bus numbers start at 1".to_string())
        .and_then(|index| BusIndex::new(index).map_err(|e| e.to_string()))
        .map(BusTarget::Bus)
}

fn parse_fx_kind(s: &str) -> Result<FxKind, String> {
    if let Ok(uid) = s.parse::<u32>() {
        return Ok(FxKind::from_uid(uid));
    }
    if let Some(hex) = s.strip_prefix("0x") {
        return u32::from_str_radix(hex, 16)
            .map(|uid| FxKind::Hosted(PluginUid(uid)))
            .map_err(|e| e.to_string());
    }
    let wanted = s.to_ascii_lowercase().replace(['-', '_', ' '], "");
    BuiltinFx::ALL
        .into_iter()
        .find(|fx| fx.name().to_ascii_lowercase().replace(' ', "") == wanted
            || format!("{:?}", fx).to_ascii_lowercase() == wanted)
        .map(FxKind::Builtin)
        .ok_or_else(|| format!("unknown effect '{}'", s))
}
