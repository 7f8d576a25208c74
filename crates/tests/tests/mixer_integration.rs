//! Integration tests for the mixer engine against a real plugin host
//!
//! These cover the cross-module scenarios: bus cascades, FX chain
//! editing with hosted plugins, instance lifetime and bulk restore.

use std::sync::Arc;
use synthmix_core::domain::{
    BuiltinFx, BusIndex, BusTarget, ChannelId, Command, CommandOutcome, FxChainRecord, FxKind,
    MixerEngine, MixerError, MixerEvent, MixerSettings, NoteEvent, NullHost, PluginHost, PluginUid,
};
use synthmix_infra::plugin::GAIN_UID;
use synthmix_tests::{engine_with_host, rendered_engine, test_host, Received, SCALER_UID};

fn piano() -> ChannelId {
    ChannelId::instrument(0).unwrap()
}

fn organ() -> ChannelId {
    ChannelId::instrument(1).unwrap()
}

fn kinds(engine: &MixerEngine, id: ChannelId) -> Vec<FxKind> {
    engine.fx_chain(id).units().iter().map(|u| u.kind()).collect()
}

// ============================================================================
// MUTE / SOLO CASCADE
// ============================================================================

#[test]
fn test_bus_mute_cascades_one_level() {
    let (mut engine, _host) = engine_with_host();
    let bus = BusIndex::new(0).unwrap();
    let bus_channel = ChannelId::bus(bus);
    engine.set_bus_target(piano(), BusTarget::Bus(bus)).unwrap();
    engine.set_bus_target(organ(), BusTarget::Bus(bus)).unwrap();

    let mut events = engine.subscribe();
    engine.set_mute(bus_channel, true);

    assert!(engine.is_muted(bus_channel));
    assert!(engine.is_muted(piano()));
    assert!(engine.is_muted(organ()));
    assert!(!engine.is_muted(ChannelId::instrument(2).unwrap()));

    let mut changed = Vec::new();
    while let Ok(event) = events.try_recv() {
        if let MixerEvent::MuteChanged { channel, muted } = event {
            assert!(muted);
            changed.push(channel);
        }
    }
    assert_eq!(changed, vec![bus_channel, piano(), organ()]);

    // Members can still be toggled on their own
    engine.set_mute(piano(), false);
    assert!(engine.is_muted(bus_channel));
    assert!(!engine.is_muted(piano()));

    // Moving a member off the bus detaches it from future cascades
    engine.set_bus_target(organ(), BusTarget::Master).unwrap();
    engine.set_mute(bus_channel, false);
    assert!(!engine.is_muted(bus_channel));
    assert!(engine.is_muted(organ()));
}

#[test]
fn test_solo_on_member_does_not_touch_bus() {
    let (mut engine, _host) = engine_with_host();
    let bus = BusIndex::new(5).unwrap();
    engine.set_bus_target(piano(), BusTarget::Bus(bus)).unwrap();

    engine.set_solo(piano(), true);
    assert!(engine.is_solo(piano()));
    assert!(!engine.is_solo(ChannelId::bus(bus)));

    engine.set_solo(ChannelId::bus(bus), true);
    engine.set_solo(ChannelId::bus(bus), false);
    assert!(!engine.is_solo(piano()));
}

#[test]
fn test_reset_channels_keeps_routing_and_fx() {
    let (mut engine, _host) = engine_with_host();
    let bus = BusIndex::new(1).unwrap();
    engine.set_gain(piano(), 90);
    engine.set_mute(piano(), true);
    engine.set_solo(organ(), true);
    engine.set_bus_target(piano(), BusTarget::Bus(bus)).unwrap();
    engine
        .add_fx(piano(), FxKind::Builtin(BuiltinFx::Echo), None)
        .unwrap();

    engine.execute(Command::ResetChannels).unwrap();

    assert_eq!(engine.channel(piano()).gain.level(), 50);
    assert!(!engine.is_muted(piano()));
    assert!(!engine.is_solo(organ()));
    assert_eq!(engine.channel(piano()).bus, BusTarget::Bus(bus));
    assert_eq!(engine.fx_chain(piano()).len(), 1);
}

#[test]
fn test_buses_cannot_be_routed() {
    let (mut engine, _host) = engine_with_host();
    let bus_channel = ChannelId::bus(BusIndex::new(3).unwrap());
    let generation = engine.generation();

    let err = engine
        .set_bus_target(bus_channel, BusTarget::Bus(BusIndex::new(4).unwrap()))
        .unwrap_err();
    assert_eq!(err, MixerError::NotRoutable(bus_channel));
    assert_eq!(engine.channel(bus_channel).bus, BusTarget::Master);
    assert_eq!(engine.generation(), generation);
}

// ============================================================================
// FX CHAINS
// ============================================================================

#[test]
fn test_fx_chain_insert_order_and_shift() {
    let (mut engine, _host) = engine_with_host();
    let echo = FxKind::Builtin(BuiltinFx::Echo);
    let reverb = FxKind::Builtin(BuiltinFx::Reverb);
    let scaler = FxKind::Hosted(SCALER_UID);

    engine.add_fx(piano(), echo, None).unwrap();
    assert_eq!(engine.add_fx(piano(), scaler, Some(0)).unwrap(), 0);
    assert_eq!(engine.add_fx(piano(), reverb, Some(1)).unwrap(), 1);
    assert_eq!(kinds(&engine, piano()), vec![scaler, reverb, echo]);

    let err = engine.add_fx(piano(), echo, Some(4)).unwrap_err();
    assert_eq!(err, MixerError::FxIndexOutOfRange { index: 4, len: 3 });

    assert_eq!(engine.remove_fx(piano(), 1).unwrap(), reverb);
    assert_eq!(kinds(&engine, piano()), vec![scaler, echo]);
    assert!(engine.remove_fx(piano(), 2).is_err());
}

#[test]
fn test_unknown_plugin_leaves_chain_untouched() {
    let (mut engine, _host) = engine_with_host();
    engine
        .add_fx(piano(), FxKind::Builtin(BuiltinFx::Chorus), None)
        .unwrap();
    let generation = engine.generation();

    let err = engine
        .add_fx(piano(), FxKind::Hosted(PluginUid(424242)), None)
        .unwrap_err();
    assert_eq!(err, MixerError::UnknownPlugin(PluginUid(424242)));
    assert_eq!(engine.fx_chain(piano()).len(), 1);
    assert_eq!(engine.generation(), generation);
}

#[test]
fn test_hosted_params_program_and_chunk_forwarded() {
    let (host, log) = test_host();
    let mut engine = MixerEngine::new(host);
    engine
        .add_fx(piano(), FxKind::Hosted(SCALER_UID), None)
        .unwrap();

    engine.set_fx_params(piano(), 0, &[0.1, 0.2, 0.3]).unwrap();
    engine.set_fx_params(piano(), 0, &[0.9]).unwrap();
    engine.set_fx_program(piano(), 0, 4).unwrap();
    engine.set_fx_chunk(piano(), 0, vec![1, 2, 3]).unwrap();

    let unit = engine.fx_chain(piano()).get(0).unwrap();
    assert_eq!(unit.params(), &[0.9, 0.2, 0.3]);
    assert_eq!(unit.program(), Some(4));
    assert_eq!(unit.chunk(), Some(&[1u8, 2, 3][..]));

    assert_eq!(
        *log.lock().unwrap(),
        vec![
            Received::Params(vec![0.1, 0.2, 0.3]),
            Received::Params(vec![0.9]),
            Received::Program(4),
            Received::Chunk(vec![1, 2, 3]),
        ]
    );
}

#[test]
fn test_builtin_rejects_program_and_chunk() {
    let (mut engine, _host) = engine_with_host();
    engine
        .add_fx(piano(), FxKind::Builtin(BuiltinFx::Compressor), None)
        .unwrap();
    assert_eq!(
        engine.set_fx_program(piano(), 0, 1),
        Err(MixerError::NotHosted)
    );
    assert_eq!(
        engine.set_fx_chunk(piano(), 0, vec![9]),
        Err(MixerError::NotHosted)
    );
}

#[test]
fn test_null_host_disables_plugin_channels() {
    let mut engine = MixerEngine::new(Arc::new(NullHost));
    let vsti = ChannelId::plugin_instrument(0).unwrap();
    assert!(!engine.is_channel_enabled(vsti));
    assert!(engine.is_channel_enabled(piano()));

    assert_eq!(
        engine.add_fx(piano(), FxKind::Hosted(GAIN_UID), None),
        Err(MixerError::HostUnavailable)
    );
    assert!(engine.fx_chain(piano()).is_empty());

    // Built-ins never need the host
    assert!(engine
        .add_fx(piano(), FxKind::Builtin(BuiltinFx::AutoWah), None)
        .is_ok());
}

// ============================================================================
// INSTANCE LIFETIME
// ============================================================================

#[test]
fn test_destroy_immediate_without_renderer() {
    let (mut engine, host) = engine_with_host();
    engine
        .add_fx(piano(), FxKind::Hosted(GAIN_UID), None)
        .unwrap();
    let handle = engine.fx_instance(piano(), 0).unwrap();
    assert!(host.is_live(handle));

    engine.remove_fx(piano(), 0).unwrap();
    assert!(!host.is_live(handle));
    assert_eq!(engine.pending_destroy(), 0);
}

#[test]
fn test_destroy_deferred_until_render_moves_on() {
    let (mut engine, host, _bridge, mut renderer) = rendered_engine();
    engine
        .add_fx(piano(), FxKind::Hosted(SCALER_UID), None)
        .unwrap();
    let handle = engine.fx_instance(piano(), 0).unwrap();

    let mut out = [0.0f32; 8];
    renderer.render(&[], &mut out);

    let outcome = engine
        .execute(Command::RemoveFx {
            channel: piano(),
            index: 0,
        })
        .unwrap();
    assert_eq!(
        outcome,
        CommandOutcome::FxRemoved {
            channel: piano(),
            kind: FxKind::Hosted(SCALER_UID),
        }
    );

    // The renderer still holds the previous generation
    assert!(host.is_live(handle));
    assert_eq!(engine.pending_destroy(), 1);

    renderer.render(&[], &mut out);
    engine.reclaim();
    assert!(!host.is_live(handle));
    assert_eq!(engine.pending_destroy(), 0);
}

#[test]
fn test_engine_drop_destroys_everything() {
    let (host, _) = test_host();
    {
        let mut engine = MixerEngine::new(host.clone());
        engine
            .add_fx(piano(), FxKind::Hosted(SCALER_UID), None)
            .unwrap();
        engine
            .add_fx(organ(), FxKind::Hosted(GAIN_UID), None)
            .unwrap();
        engine.load_instrument_plugin(2, GAIN_UID).unwrap();
        assert_eq!(host.live_count(), 3);
    }
    assert_eq!(host.live_count(), 0);
}

#[test]
fn test_instrument_slot_replace_destroys_previous() {
    let (mut engine, host) = engine_with_host();
    engine.load_instrument_plugin(0, GAIN_UID).unwrap();
    engine.load_instrument_plugin(0, SCALER_UID).unwrap();
    assert_eq!(host.live_count(), 1);
    assert_eq!(
        engine.instrument_plugin(0).map(|u| u.kind()),
        Some(FxKind::Hosted(SCALER_UID))
    );

    engine.unload_instrument_plugin(0).unwrap();
    assert_eq!(host.live_count(), 0);
    assert_eq!(
        engine.load_instrument_plugin(9, GAIN_UID),
        Err(MixerError::UnknownPluginSlot(9))
    );
}

// ============================================================================
// RESTORE
// ============================================================================

#[test]
fn test_restore_keeps_unknown_plugins_detached() {
    let (mut engine, host) = engine_with_host();
    let mut settings = MixerSettings::default();
    settings.preset_bank = 7;
    settings.channels[0].gain = 80;
    settings.channels[0].bus_target = 2;
    settings.channels[0].fx = FxChainRecord {
        unique_ids: vec![BuiltinFx::Echo.uid(), 987_654, SCALER_UID.0],
        bypass_flags: vec![false, false, true],
        param_sets: vec![vec![0.5], vec![], vec![0.25, 0.75]],
        programs: vec![-1, -1, 3],
        state_blobs: Vec::new(),
    };
    settings.instrument_slots[1].unique_id = 31337;

    let report = engine.restore(&settings);

    assert!(!report.is_complete());
    assert_eq!(report.skipped_fx, vec![(piano(), PluginUid(987_654))]);
    assert_eq!(report.skipped_slots, vec![(1, 31337)]);
    assert_eq!(report.fx_units, 2);

    assert_eq!(engine.preset_bank(), 7);
    assert_eq!(engine.channel(piano()).gain.level(), 80);
    assert_eq!(
        engine.channel(piano()).bus,
        BusTarget::Bus(BusIndex::new(2).unwrap())
    );
    assert_eq!(
        kinds(&engine, piano()),
        vec![
            FxKind::Builtin(BuiltinFx::Echo),
            FxKind::Hosted(PluginUid(987_654)),
            FxKind::Hosted(SCALER_UID)
        ]
    );
    assert!(engine.fx_chain(piano()).get(1).unwrap().is_detached());
    assert_eq!(engine.fx_instance(piano(), 1), None);
    let hosted = engine.fx_chain(piano()).get(2).unwrap();
    assert!(hosted.is_bypassed());
    assert_eq!(hosted.program(), Some(3));
    assert_eq!(hosted.params(), &[0.25, 0.75]);
    assert_eq!(host.live_count(), 1);

    assert_eq!(engine.unresolved_instrument(1), Some(31337));
    let resaved = engine.settings();
    let fx = &resaved.channels[0].fx;
    assert_eq!(fx.unique_ids, settings.channels[0].fx.unique_ids);
    assert_eq!(fx.param_sets, settings.channels[0].fx.param_sets);
    assert_eq!(fx.programs, settings.channels[0].fx.programs);
    assert_eq!(resaved.instrument_slots[1].unique_id, 31337);
}

#[test]
fn test_restore_replaces_previous_state() {
    let (mut engine, host) = engine_with_host();
    engine
        .add_fx(organ(), FxKind::Hosted(GAIN_UID), None)
        .unwrap();
    engine.set_mute(organ(), true);

    let report = engine.restore(&MixerSettings::default());
    assert!(report.is_complete());
    assert!(engine.fx_chain(organ()).is_empty());
    assert!(!engine.is_muted(organ()));
    assert_eq!(host.live_count(), 0);
}

#[test]
fn test_settings_round_trip_through_second_engine() {
    let (mut engine, _host) = engine_with_host();
    let bus = BusIndex::new(9).unwrap();
    engine.set_gain(organ(), 12);
    engine.set_solo(organ(), true);
    engine.set_bus_target(organ(), BusTarget::Bus(bus)).unwrap();
    engine.set_bus_names(bus, "Drums".to_string(), "Drum Group".to_string());
    engine
        .add_fx(organ(), FxKind::Hosted(GAIN_UID), None)
        .unwrap();
    engine.set_fx_chunk(organ(), 0, 0.5f32.to_le_bytes().to_vec()).unwrap();
    engine.set_fx_program(organ(), 0, 1).unwrap();
    engine
        .add_fx(organ(), FxKind::Builtin(BuiltinFx::Eq15Band), None)
        .unwrap();
    engine.set_fx_params(organ(), 1, &[0.1; 15]).unwrap();
    engine.set_preset_bank(10).unwrap();

    let saved = engine.settings();

    let (mut restored, _host) = engine_with_host();
    let report = restored.restore(&saved);
    assert!(report.is_complete());
    assert!(report.bus_names_applied);
    assert_eq!(restored.settings(), saved);
    assert_eq!(restored.bus_names().short(bus), "Drums");
}

// ============================================================================
// METERING
// ============================================================================

#[test]
fn test_note_meters_channel_and_bus() {
    let (engine, _host) = engine_with_host();
    let bus = BusIndex::new(0).unwrap();
    let meters = engine.meters();

    engine.note_triggered(NoteEvent {
        channel: piano(),
        bus: Some(bus),
        note: 60,
        velocity: 127,
    });
    assert!((meters.peak(piano()) - 1.0).abs() < 1e-6);
    assert!((meters.peak(ChannelId::bus(bus)) - 1.0).abs() < 1e-6);

    meters.decay(0.25);
    assert!((meters.peak(piano()) - 0.75).abs() < 1e-6);
}

#[test]
fn test_plugin_listing_through_engine_host() {
    let (engine, _host) = engine_with_host();
    let available: Vec<_> = engine.host().list_available().collect();
    assert!(available.iter().any(|p| p.unique_id == SCALER_UID));
    assert!(available.iter().any(|p| p.unique_id == GAIN_UID));
}
