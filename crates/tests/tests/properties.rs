//! Property tests over random edit sequences

use proptest::prelude::*;
use synthmix_core::domain::{
    BuiltinFx, ChannelId, FxChainRecord, FxKind, MixerEngine, MixerError, PluginUid,
};
use synthmix_infra::plugin::GAIN_UID;
use synthmix_tests::{engine_with_host, DOUBLER_UID, SCALER_UID};

fn fx_kind() -> impl Strategy<Value = FxKind> {
    prop_oneof![
        (0..BuiltinFx::ALL.len()).prop_map(|i| FxKind::Builtin(BuiltinFx::ALL[i])),
        Just(FxKind::Hosted(SCALER_UID)),
        Just(FxKind::Hosted(DOUBLER_UID)),
        Just(FxKind::Hosted(GAIN_UID)),
    ]
}

#[derive(Debug, Clone)]
struct UnitPlan {
    kind: FxKind,
    bypass: bool,
    params: Vec<f32>,
    program: Option<i32>,
    chunk: Vec<u8>,
}

fn unit_plan() -> impl Strategy<Value = UnitPlan> {
    (
        fx_kind(),
        any::<bool>(),
        prop::collection::vec(0.0f32..1.0, 0..6),
        prop::option::of(0i32..8),
        prop::collection::vec(any::<u8>(), 0..8),
    )
        .prop_map(|(kind, bypass, params, program, chunk)| UnitPlan {
            kind,
            bypass,
            params,
            program,
            chunk,
        })
}

/// Applies state in the order a restore replays it, so plugins whose live
/// chunk reflects program and parameter changes still round-trip
fn build(engine: &mut MixerEngine, id: ChannelId, units: &[UnitPlan]) {
    for (i, unit) in units.iter().enumerate() {
        engine.add_fx(id, unit.kind, None).unwrap();
        engine.set_fx_bypass(id, i, unit.bypass).unwrap();
        if unit.kind.is_hosted() {
            engine.set_fx_chunk(id, i, unit.chunk.clone()).unwrap();
            if let Some(program) = unit.program {
                engine.set_fx_program(id, i, program).unwrap();
            }
        }
        if !unit.params.is_empty() {
            engine.set_fx_params(id, i, &unit.params).unwrap();
        }
    }
}

proptest! {
    #[test]
    fn prop_fx_chain_survives_save_and_restore(
        units in prop::collection::vec(unit_plan(), 0..6),
        channel in 0usize..synthmix_core::domain::CHANNEL_COUNT,
    ) {
        let id = ChannelId::from_index(channel).unwrap();
        let (mut engine, _host) = engine_with_host();
        build(&mut engine, id, &units);

        let saved = engine.settings();
        let (mut restored, _host) = engine_with_host();
        let report = restored.restore(&saved);

        prop_assert!(report.is_complete());
        prop_assert_eq!(restored.settings(), saved);
        prop_assert_eq!(restored.fx_chain(id).len(), units.len());
    }

    #[test]
    fn prop_remove_preserves_relative_order(
        kinds in prop::collection::vec(fx_kind(), 1..8),
        pick in any::<prop::sample::Index>(),
    ) {
        let id = ChannelId::instrument(3).unwrap();
        let (mut engine, host) = engine_with_host();
        for kind in &kinds {
            engine.add_fx(id, *kind, None).unwrap();
        }

        let index = pick.index(kinds.len());
        let removed = engine.remove_fx(id, index).unwrap();
        prop_assert_eq!(removed, kinds[index]);

        let mut expected = kinds.clone();
        expected.remove(index);
        let actual: Vec<FxKind> = engine.fx_chain(id).units().iter().map(|u| u.kind()).collect();
        prop_assert_eq!(actual, expected.clone());

        let hosted = expected.iter().filter(|k| k.is_hosted()).count();
        prop_assert_eq!(host.live_count(), hosted);
    }

    #[test]
    fn prop_bypass_is_idempotent(
        kinds in prop::collection::vec(fx_kind(), 1..6),
        flags in prop::collection::vec(any::<bool>(), 1..12),
    ) {
        let id = ChannelId::instrument(0).unwrap();
        let (mut engine, _host) = engine_with_host();
        for kind in &kinds {
            engine.add_fx(id, *kind, None).unwrap();
        }

        for (i, flag) in flags.iter().enumerate() {
            let index = i % kinds.len();
            engine.set_fx_bypass(id, index, *flag).unwrap();
            let once = engine.settings();
            engine.set_fx_bypass(id, index, *flag).unwrap();
            prop_assert_eq!(engine.settings(), once);
            prop_assert_eq!(engine.fx_chain(id).get(index).unwrap().is_bypassed(), *flag);
        }
    }

    #[test]
    fn prop_unknown_uid_never_changes_chain(
        kinds in prop::collection::vec(fx_kind(), 0..5),
        uid in 100_000u32..200_000,
        position in 0usize..6,
    ) {
        let id = ChannelId::instrument(7).unwrap();
        let (mut engine, _host) = engine_with_host();
        for kind in &kinds {
            engine.add_fx(id, *kind, None).unwrap();
        }
        let before = engine.settings();
        let generation = engine.generation();

        let result = engine.add_fx(id, FxKind::Hosted(PluginUid(uid)), Some(position));
        let rejected = matches!(
            result,
            Err(MixerError::UnknownPlugin(_)) | Err(MixerError::FxIndexOutOfRange { .. })
        );
        prop_assert!(rejected, "unexpected result {:?}", result);
        prop_assert_eq!(engine.settings(), before);
        prop_assert_eq!(engine.generation(), generation);
    }

    #[test]
    fn prop_ragged_records_restore_shortest(
        ids in prop::collection::vec(0u32..8, 0..6),
        bypass in prop::collection::vec(any::<bool>(), 0..6),
        params in prop::collection::vec(prop::collection::vec(0.0f32..1.0, 0..3), 0..6),
        programs in prop::collection::vec(-1i32..2, 0..6),
    ) {
        let expected = ids.len().min(bypass.len()).min(params.len()).min(programs.len());
        let record = FxChainRecord {
            unique_ids: ids,
            bypass_flags: bypass,
            param_sets: params,
            programs,
            state_blobs: Vec::new(),
        };
        prop_assert_eq!(record.restorable_len(), expected);

        let mut settings = synthmix_core::domain::MixerSettings::default();
        settings.channels[2].fx = record;
        let (mut engine, _host) = engine_with_host();
        let report = engine.restore(&settings);

        prop_assert_eq!(engine.fx_chain(ChannelId::instrument(2).unwrap()).len(), expected);
        prop_assert_eq!(report.fx_units, expected);
    }
}
