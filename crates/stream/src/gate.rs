//! Connection-Gate: begrenzt gleichzeitige Verbindungen pro Art
//!
//! Jede Art (`control`, `events`, `audio`) hat hoechstens `limit` aktive
//! Slots. Anfragen warten FIFO; eine volle Art blockiert die anderen nicht.
//!
//! Lebenszyklus eines Slots:
//! 1. `request_slot` vergibt eine Reservierung (Zaehler +1)
//! 2. `track_socket` macht daraus eine `SlotLease`, die beim Drop freigibt
//! 3. `release_slot` gibt eine Reservierung ohne Socket zurueck
//!
//! Wird eine Reservierung weder verfolgt noch freigegeben, faellt sie nach
//! `HANDSHAKE_TIMEOUT` automatisch zurueck.

use std::collections::{HashMap, VecDeque};
use std::fmt;
use std::sync::{Arc, Weak};
use std::time::Duration;

use async_trait::async_trait;
use fmo_core::{ConnectionKind, ReservationId};
use parking_lot::Mutex;
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::{StreamError, StreamResult};

/// Standard-Limit gleichzeitiger Verbindungen pro Art
pub const STANDARD_LIMIT: usize = 2;

/// Frist zwischen Vergabe und `track_socket`/`release_slot`
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(5);

// ---------------------------------------------------------------------------
// Trait
// ---------------------------------------------------------------------------

/// Schnittstelle, ueber die die Session Verbindungs-Slots anfordert
#[async_trait]
pub trait ConnectionGate: Send + Sync {
    /// Wartet auf einen freien Slot der gegebenen Art
    async fn request_slot(&self, kind: ConnectionKind) -> StreamResult<ReservationId>;

    /// Bindet die Reservierung an einen Socket
    fn track_socket(&self, id: ReservationId) -> StreamResult<SlotLease>;

    /// Gibt eine Reservierung zurueck, fuer die kein Socket entstanden ist
    fn release_slot(&self, id: ReservationId);
}

// ---------------------------------------------------------------------------
// SlotLease
// ---------------------------------------------------------------------------

type Freigabe = Box<dyn FnOnce() + Send + Sync>;

/// Belegter Slot, solange der Socket lebt
pub struct SlotLease {
    id: ReservationId,
    freigabe: Option<Freigabe>,
}

impl SlotLease {
    pub fn new(id: ReservationId, freigabe: impl FnOnce() + Send + Sync + 'static) -> Self {
        Self {
            id,
            freigabe: Some(Box::new(freigabe)),
        }
    }

    pub fn id(&self) -> ReservationId {
        self.id
    }
}

impl Drop for SlotLease {
    fn drop(&mut self) {
        if let Some(freigabe) = self.freigabe.take() {
            freigabe();
        }
    }
}

impl fmt::Debug for SlotLease {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SlotLease").field("id", &self.id).finish()
    }
}

// ---------------------------------------------------------------------------
// Status
// ---------------------------------------------------------------------------

/// Momentaufnahme des Gates
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct GateStatus {
    pub aktiv: HashMap<ConnectionKind, usize>,
    pub limit: usize,
    pub wartend: usize,
}

impl GateStatus {
    pub fn aktiv(&self, kind: ConnectionKind) -> usize {
        self.aktiv.get(&kind).copied().unwrap_or(0)
    }
}

// ---------------------------------------------------------------------------
// SlotGate
// ---------------------------------------------------------------------------

struct Anfrage {
    kind: ConnectionKind,
    antwort: oneshot::Sender<ReservationId>,
}

struct Reservierung {
    kind: ConnectionKind,
    verfolgt: bool,
    timeout: Option<JoinHandle<()>>,
}

#[derive(Default)]
struct GateZustand {
    aktiv: HashMap<ConnectionKind, usize>,
    warteschlange: VecDeque<Anfrage>,
    reservierungen: HashMap<ReservationId, Reservierung>,
}

impl GateZustand {
    fn aktiv(&self, kind: ConnectionKind) -> usize {
        self.aktiv.get(&kind).copied().unwrap_or(0)
    }

    /// Entfernt Anfragen, deren Aufrufer nicht mehr wartet
    fn verwaiste_entfernen(&mut self) {
        self.warteschlange.retain(|a| !a.antwort.is_closed());
    }
}

struct GateInner {
    limit: usize,
    handshake_timeout: Duration,
    zustand: Mutex<GateZustand>,
}

/// Prozessweites Gate mit festem Limit pro Verbindungsart
#[derive(Clone)]
pub struct SlotGate {
    inner: Arc<GateInner>,
}

impl SlotGate {
    pub fn new(limit: usize) -> Self {
        Self::mit_timeout(limit, HANDSHAKE_TIMEOUT)
    }

    pub fn mit_timeout(limit: usize, handshake_timeout: Duration) -> Self {
        Self {
            inner: Arc::new(GateInner {
                limit: limit.max(1),
                handshake_timeout,
                zustand: Mutex::new(GateZustand::default()),
            }),
        }
    }

    pub fn limit(&self) -> usize {
        self.inner.limit
    }

    pub fn status(&self) -> GateStatus {
        let mut z = self.inner.zustand.lock();
        z.verwaiste_entfernen();
        GateStatus {
            aktiv: ConnectionKind::ALLE
                .iter()
                .map(|k| (*k, z.aktiv(*k)))
                .collect(),
            limit: self.inner.limit,
            wartend: z.warteschlange.len(),
        }
    }
}

impl Default for SlotGate {
    fn default() -> Self {
        Self::new(STANDARD_LIMIT)
    }
}

/// Vergibt Slots an wartende Anfragen, solange ihre Art Platz hat
fn verarbeite_warteschlange(inner: &Arc<GateInner>, z: &mut GateZustand) {
    let mut i = 0;
    while i < z.warteschlange.len() {
        let kind = z.warteschlange[i].kind;
        if z.aktiv(kind) >= inner.limit {
            i += 1;
            continue;
        }
        let Some(anfrage) = z.warteschlange.remove(i) else {
            break;
        };

        let id = ReservationId::new();
        if anfrage.antwort.send(id).is_err() {
            // Anfragender hat aufgegeben
            continue;
        }
        *z.aktiv.entry(kind).or_default() += 1;
        let timeout = starte_timeout(inner, id);
        z.reservierungen.insert(
            id,
            Reservierung {
                kind,
                verfolgt: false,
                timeout,
            },
        );
        debug!(%id, %kind, aktiv = z.aktiv(kind), "Slot vergeben");
    }
}

fn starte_timeout(inner: &Arc<GateInner>, id: ReservationId) -> Option<JoinHandle<()>> {
    let handle = tokio::runtime::Handle::try_current().ok()?;
    let weak: Weak<GateInner> = Arc::downgrade(inner);
    let frist = inner.handshake_timeout;
    Some(handle.spawn(async move {
        tokio::time::sleep(frist).await;
        if let Some(inner) = weak.upgrade() {
            freigeben(&inner, id, true);
        }
    }))
}

/// Gibt eine Reservierung frei; `nur_offen` verschont verfolgte Slots
fn freigeben(inner: &Arc<GateInner>, id: ReservationId, nur_offen: bool) {
    let mut z = inner.zustand.lock();
    match z.reservierungen.get(&id) {
        None => return,
        Some(r) if nur_offen && r.verfolgt => return,
        Some(_) => {}
    }
    let Some(r) = z.reservierungen.remove(&id) else {
        return;
    };
    if nur_offen {
        warn!(%id, kind = %r.kind, "Handshake-Frist abgelaufen, Slot freigegeben");
    } else if let Some(timeout) = r.timeout {
        timeout.abort();
    }
    if let Some(n) = z.aktiv.get_mut(&r.kind) {
        *n = n.saturating_sub(1);
    }
    debug!(%id, kind = %r.kind, aktiv = z.aktiv(r.kind), "Slot freigegeben");
    verarbeite_warteschlange(inner, &mut z);
}

#[async_trait]
impl ConnectionGate for SlotGate {
    async fn request_slot(&self, kind: ConnectionKind) -> StreamResult<ReservationId> {
        let rx = {
            let (tx, rx) = oneshot::channel();
            let mut z = self.inner.zustand.lock();
            z.verwaiste_entfernen();
            z.warteschlange.push_back(Anfrage { kind, antwort: tx });
            verarbeite_warteschlange(&self.inner, &mut z);
            rx
        };
        rx.await.map_err(|_| StreamError::KeinSlot(kind))
    }

    fn track_socket(&self, id: ReservationId) -> StreamResult<SlotLease> {
        {
            let mut z = self.inner.zustand.lock();
            let r = z
                .reservierungen
                .get_mut(&id)
                .filter(|r| !r.verfolgt)
                .ok_or(StreamError::UnbekannteReservierung(id))?;
            r.verfolgt = true;
            if let Some(timeout) = r.timeout.take() {
                timeout.abort();
            }
        }

        let weak = Arc::downgrade(&self.inner);
        Ok(SlotLease::new(id, move || {
            if let Some(inner) = weak.upgrade() {
                freigeben(&inner, id, false);
            }
        }))
    }

    fn release_slot(&self, id: ReservationId) {
        freigeben(&self.inner, id, false);
    }
}

// ---------------------------------------------------------------------------
// Tests
// ---------------------------------------------------------------------------
