//! Integration-Tests fuer den AudioPlayer mit Headless-Ausgabe

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use fmo_audio::{
    AudioPlayer, EchoDelayLine, HeadlessOutput, ManualClock, OutputClock, OutputFactory,
    PlayerConfig, PlayerState, SampleChunk, ScheduleLog,
};
use fmo_core::{PlaybackPhase, PlayerEvent};
use fmo_protocol::PcmFrame;

const RATE: f64 = 8000.0;

struct Aufbau {
    player: AudioPlayer,
    uhr: ManualClock,
    log: ScheduleLog,
}

fn aufbau(config: PlayerConfig) -> Aufbau {
    let uhr = ManualClock::new();
    let log = ScheduleLog::new();
    let (fabrik_uhr, fabrik_log) = (uhr.clone(), log.clone());
    let factory: OutputFactory = Box::new(move || {
        let out = HeadlessOutput::new(Arc::new(fabrik_uhr.clone())).mit_log(fabrik_log.clone());
        Ok(Box::new(out) as Box<dyn OutputClock>)
    });
    let player = AudioPlayer::new(config, factory, Arc::new(uhr.clone()));
    Aufbau { player, uhr, log }
}

fn ohne_filter() -> PlayerConfig {
    PlayerConfig {
        voice_filter: false,
        ..PlayerConfig::default()
    }
}

fn frame_800() -> PcmFrame {
    PcmFrame::from_samples(&[500i16; 800])
}

/// Laesst die Uhr in Re-Arm-Schritten laufen
fn ticks(a: &mut Aufbau, anzahl: usize) {
    for _ in 0..anzahl {
        a.uhr.advance(Duration::from_millis(60));
        a.player.on_rearm_tick();
    }
}

#[test]
fn zehn_chunks_lueckenlos_geplant() {
    let mut a = aufbau(ohne_filter());
    let rx = a.player.subscribe();
    a.player.unlock().unwrap();
    a.player.on_connected();

    a.player.on_frame(frame_800());
    // Mindestpuffer 0.1 s ist nach dem ersten Chunk erreicht
    assert_eq!(a.player.state(), PlayerState::Playing);

    for _ in 1..10 {
        a.player.on_frame(frame_800());
    }
    ticks(&mut a, 20);

    let eintraege = a.log.eintraege();
    assert_eq!(eintraege.len(), 10);
    for (i, e) in eintraege.iter().enumerate() {
        assert!(
            (e.start - i as f64 * 0.1).abs() < 1e-9,
            "Chunk {} startet bei {}",
            i,
            e.start
        );
    }
    for w in eintraege.windows(2) {
        assert!(w[1].start >= w[0].ende() - 1e-9, "Ueberlappung");
    }
    assert!((a.log.gesamt_dauer() - 1.0).abs() < 1e-9);
    assert_eq!(a.player.stats().samples_verworfen, 0);

    let phasen: Vec<_> = rx
        .try_iter()
        .filter(|e| matches!(e, PlayerEvent::Phase(_)))
        .collect();
    assert_eq!(
        phasen,
        vec![
            PlayerEvent::Phase(PlaybackPhase::Buffering),
            PlayerEvent::Phase(PlaybackPhase::Playing)
        ]
    );
}

#[test]
fn flut_bleibt_in_latenzgrenze() {
    let mut a = aufbau(ohne_filter());
    a.player.unlock().unwrap();
    a.player.on_connected();
    let rx = a.player.subscribe();

    // 200 Chunks (20 s Audio) in Buendeln von 20 alle 100 ms
    for _ in 0..10 {
        for _ in 0..20 {
            a.player.on_frame(frame_800());
            let gepuffert = a.player.queued_samples() as f64 / RATE;
            assert!(gepuffert <= 1.0, "Puffer {} s", gepuffert);
        }
        a.uhr.advance(Duration::from_millis(100));
        a.player.on_rearm_tick();
    }

    let stats = a.player.stats();
    assert!(stats.samples_verworfen > 0);
    let kuerzungen = rx
        .try_iter()
        .filter(|e| matches!(e, PlayerEvent::LatencyTrimmed { .. }))
        .count();
    assert!(kuerzungen > 0);

    // Kein Sample geht unbemerkt verloren
    let geplant = (a.log.gesamt_dauer() * RATE).round() as u64;
    assert_eq!(
        geplant + stats.samples_verworfen + a.player.queued_samples() as u64,
        200 * 800
    );
}

#[test]
fn flut_ohne_ausgabe_kuerzt_auf_vorlauf() {
    let mut a = aufbau(ohne_filter());
    a.player.on_connected();
    let rx = a.player.subscribe();

    for _ in 0..200 {
        a.player.on_frame(frame_800());
        let gepuffert = a.player.queued_samples() as f64 / RATE;
        assert!(gepuffert <= 1.0);
        // Nach jedem Kuerzen bleibt hoechstens Vorlauf + ein Chunk
        let gekuerzt = rx
            .try_iter()
            .any(|e| matches!(e, PlayerEvent::LatencyTrimmed { .. }));
        if gekuerzt {
            assert!(gepuffert <= 0.5 + 0.1);
        }
    }
}

#[test]
fn wiederverbinden_startet_neu_mit_buffering() {
    let mut a = aufbau(ohne_filter());
    let rx = a.player.subscribe();
    a.player.unlock().unwrap();

    for _ in 0..2 {
        a.player.on_connected();
        assert_eq!(a.player.state(), PlayerState::Buffering);
        for _ in 0..3 {
            a.player.on_frame(frame_800());
        }
        ticks(&mut a, 5);
        assert_eq!(a.player.state(), PlayerState::Playing);
        a.player.on_disconnected();
        assert_eq!(a.player.queued_samples(), 0);
        ticks(&mut a, 2);
    }

    let phasen: Vec<_> = rx
        .try_iter()
        .filter_map(|e| match e {
            PlayerEvent::Phase(p) => Some(p),
            _ => None,
        })
        .collect();
    assert_eq!(
        phasen,
        vec![
            PlaybackPhase::Buffering,
            PlaybackPhase::Playing,
            PlaybackPhase::Buffering,
            PlaybackPhase::Playing,
        ]
    );
}

#[test]
fn unterlauf_faellt_nicht_auf_buffering_zurueck() {
    let mut a = aufbau(ohne_filter());
    a.player.unlock().unwrap();
    a.player.on_connected();
    a.player.on_frame(frame_800());
    ticks(&mut a, 30);
    assert_eq!(a.player.state(), PlayerState::Playing);

    // Nach der Pause startet der naechste Chunk nicht in der Vergangenheit
    a.player.on_frame(frame_800());
    let letzter = a.log.eintraege().pop().unwrap();
    assert!((letzter.start - 1.8).abs() < 1e-9);
}

#[test]
fn ausgabe_ueberlebt_wiederverbinden() {
    let mut a = aufbau(ohne_filter());
    a.player.unlock().unwrap();
    a.player.on_connected();
    a.player.on_frame(frame_800());
    a.player.on_disconnected();

    // Waehrend der Trennung steht die Ausgabe-Zeitachse
    a.uhr.advance(Duration::from_secs(10));
    a.player.on_connected();
    a.player.on_frame(frame_800());

    let eintraege = a.log.eintraege();
    assert_eq!(eintraege.len(), 2);
    assert!(eintraege[1].start < 1.0);
    assert!(a.player.output_ready());
}

/// Einfacher deterministischer Zufallsgenerator
struct Lcg(u64);

impl Lcg {
    fn next(&mut self, max: u64) -> u64 {
        self.0 = self.0.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (self.0 >> 33) % max
    }
}

#[test]
fn delay_line_nie_frueh_nie_doppelt() {
    let mut dl = EchoDelayLine::default();
    dl.set_enabled(true);
    let mut zufall = Lcg(42);

    let mut jetzt = Duration::ZERO;
    let mut ankunft = Vec::new();
    let mut freigegeben = HashSet::new();
    let mut unterdrueckt = 0;

    for id in 0..300u32 {
        jetzt += Duration::from_millis(zufall.next(40));
        dl.push(SampleChunk::new(vec![id as f32]), jetzt);
        ankunft.push(jetzt);

        if zufall.next(2) == 0 {
            let sendend = zufall.next(5) == 0;
            let e = dl.drain_ready(jetzt, sendend, |c| {
                let id = c.samples()[0] as usize;
                assert!(jetzt >= ankunft[id] + Duration::from_millis(500), "zu frueh");
                assert!(freigegeben.insert(id), "doppelt freigegeben");
            });
            unterdrueckt += e.unterdrueckt;
        }
    }

    // Restliche Chunks nach Ablauf freigeben
    jetzt += Duration::from_secs(1);
    dl.drain_ready(jetzt, false, |c| {
        assert!(freigegeben.insert(c.samples()[0] as usize));
    });
    assert!(!dl.is_pending());
    assert_eq!(freigegeben.len() + unterdrueckt, 300);
}
