//! Cross-hart maintenance broadcast.
//!
//! A hart that needs every hart in a mask to perform some local maintenance
//! (a cache operation or an address-translation fence) posts a copy of the
//! request into each participant's inbox and notifies it with an IPI. The
//! participant performs the action when it services its inbox and then
//! records, in the initiator's channel, the sequence number of the request
//! it retired. The initiator spins until every participant's record shows
//! the sequence number of the current request.
//!
//! Every completion slot has exactly one writer, the participant it belongs
//! to, so no lock guards completion. The inbox lock only orders the posting
//! of a request before its servicing.

use core::sync::atomic::{AtomicUsize, Ordering};

use arrayvec::ArrayVec;
use hart_mask::{HartId, HartMask};
use sbi_abi::{cache_maintenance, rfence};
use snafu::{ResultExt as _, Snafu};
use spin::Mutex;

use crate::{
    cache::{self, CacheOp},
    hal::{HartOps, Ipi, SharedCache},
    poll::{PollPolicy, PollTimeout},
};

/// Requests a hart can hold unserviced.
pub const INBOX_DEPTH: usize = 4;

/// Ranges larger than this are fenced with one full `sfence.vma`.
const SFENCE_RANGE_LIMIT: usize = 4096;
const PAGE_SIZE: usize = 4096;

/// An address-translation or instruction-fetch fence.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceOp {
    FenceI,
    SfenceVma,
    SfenceVmaAsid(usize),
}

impl FenceOp {
    fn apply<H>(self, hart: &H, start: usize, size: usize)
    where
        H: HartOps + ?Sized,
    {
        let asid = match self {
            Self::FenceI => {
                hart.fence_i();
                return;
            }
            Self::SfenceVma => None,
            Self::SfenceVmaAsid(asid) => Some(asid),
        };

        if (start == 0 && size == 0) || size == usize::MAX || size > SFENCE_RANGE_LIMIT {
            hart.sfence_vma(None, asid);
            return;
        }
        let first = start & !(PAGE_SIZE - 1);
        for page in (first..start.saturating_add(size)).step_by(PAGE_SIZE) {
            hart.sfence_vma(Some(page), asid);
        }
    }
}

/// The local action a maintenance request asks for.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Maintenance {
    Cache(CacheOp),
    Fence(FenceOp),
}

impl Maintenance {
    /// The extension the request was made through.
    #[must_use]
    pub fn extension_id(self) -> usize {
        match self {
            Self::Cache(_) => cache_maintenance::EXTENSION_ID,
            Self::Fence(_) => rfence::EXTENSION_ID,
        }
    }
}

/// The part of a request shared by every kind of maintenance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RequestHeader {
    pub start: usize,
    pub size: usize,
    /// The hart that performs the final step, after every participant has
    /// finished its local action.
    pub final_hart: HartId,
    pub participants: HartMask,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MaintenanceRequest {
    pub header: RequestHeader,
    pub action: Maintenance,
}

impl MaintenanceRequest {
    #[must_use]
    pub fn cache(
        op: CacheOp,
        start: usize,
        size: usize,
        participants: HartMask,
        final_hart: HartId,
    ) -> Self {
        Self {
            header: RequestHeader {
                start,
                size,
                final_hart,
                participants,
            },
            action: Maintenance::Cache(op),
        }
    }

    #[must_use]
    pub fn fence(
        op: FenceOp,
        start: usize,
        size: usize,
        participants: HartMask,
        final_hart: HartId,
    ) -> Self {
        Self {
            header: RequestHeader {
                start,
                size,
                final_hart,
                participants,
            },
            action: Maintenance::Fence(op),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Stage {
    Local,
    Final,
}

#[derive(Debug, Clone, Copy)]
struct Posted {
    source: HartId,
    seq: usize,
    stage: Stage,
    request: MaintenanceRequest,
}

struct Channel<const HARTS: usize> {
    inbox: Mutex<ArrayVec<Posted, INBOX_DEPTH>>,
    /// Sequence number of the last request this hart initiated.
    seq: AtomicUsize,
    /// For each hart, the sequence number of the last of this hart's
    /// requests it retired. Written only by that hart.
    retired: [AtomicUsize; HARTS],
}

impl<const HARTS: usize> Channel<HARTS> {
    const fn new() -> Self {
        Self {
            inbox: Mutex::new(ArrayVec::new_const()),
            seq: AtomicUsize::new(0),
            retired: [const { AtomicUsize::new(0) }; HARTS],
        }
    }
}

#[derive(Debug, Snafu)]
pub enum BroadcastError {
    #[snafu(display("inbox of hart {hart} stayed full"))]
    InboxFull {
        hart: HartId,
        source: PollTimeout,
        #[snafu(implicit)]
        location: snafu::Location,
    },
    #[snafu(display("{pending} harts did not retire request {seq}"))]
    NotRetired {
        seq: usize,
        pending: usize,
        source: PollTimeout,
        #[snafu(implicit)]
        location: snafu::Location,
    },
}

/// Maintenance channels of every hart of the platform.
pub struct Broadcaster<'a, const HARTS: usize> {
    hart_count: usize,
    ipi: &'a dyn Ipi,
    shared_cache: Option<&'a dyn SharedCache>,
    poll_policy: PollPolicy,
    channels: [Channel<HARTS>; HARTS],
}

impl<'a, const HARTS: usize> Broadcaster<'a, HARTS> {
    /// # Panics
    ///
    /// Panics if `hart_count` exceeds `HARTS`.
    #[must_use]
    pub fn new(
        hart_count: usize,
        ipi: &'a dyn Ipi,
        shared_cache: Option<&'a dyn SharedCache>,
        poll_policy: PollPolicy,
    ) -> Self {
        assert!(hart_count <= HARTS, "{hart_count} harts exceed capacity {HARTS}");
        Self {
            hart_count,
            ipi,
            shared_cache,
            poll_policy,
            channels: [const { Channel::new() }; HARTS],
        }
    }

    #[must_use]
    pub fn hart_count(&self) -> usize {
        self.hart_count
    }

    /// Has every hart in the request's participant mask perform the action,
    /// then runs the final step on the request's final hart.
    ///
    /// Returns once every participant has retired the request. Requests
    /// addressed to the calling hart are serviced while it waits.
    pub fn broadcast<H>(&self, hart: &H, request: &MaintenanceRequest) -> Result<(), BroadcastError>
    where
        H: HartOps + ?Sized,
    {
        let me = hart.hart_id();
        let header = &request.header;
        let targets = header.participants.without(me);

        let seq = self.post(hart, &targets, Stage::Local, request)?;
        if header.participants.contains(me) {
            Self::execute(hart, self.shared_cache, Stage::Local, request);
        }
        self.wait(hart, &targets, seq)?;

        if self.needs_final_step(request) {
            if header.final_hart == me {
                Self::execute(hart, self.shared_cache, Stage::Final, request);
            } else {
                let finisher = HartMask::only(self.hart_count, header.final_hart);
                let seq = self.post(hart, &finisher, Stage::Final, request)?;
                self.wait(hart, &finisher, seq)?;
            }
        }
        Ok(())
    }

    fn needs_final_step(&self, request: &MaintenanceRequest) -> bool {
        self.shared_cache.is_some() && matches!(request.action, Maintenance::Cache(_))
    }

    /// Queues `request` for every hart in `targets` and notifies them.
    ///
    /// Returns the sequence number the targets retire it under.
    fn post<H>(
        &self,
        hart: &H,
        targets: &HartMask,
        stage: Stage,
        request: &MaintenanceRequest,
    ) -> Result<usize, BroadcastError>
    where
        H: HartOps + ?Sized,
    {
        let me = hart.hart_id();
        let seq = self.channels[me.value()]
            .seq
            .fetch_add(1, Ordering::Relaxed)
            .wrapping_add(1);
        let posted = Posted {
            source: me,
            seq,
            stage,
            request: *request,
        };

        for target in targets {
            let inbox = &self.channels[target.value()].inbox;
            // Two harts posting to each other must keep draining their own
            // inboxes, or neither makes room.
            self.poll_policy
                .wait_until_with(|| inbox.lock().try_push(posted).is_ok(), || self.service(hart))
                .context(InboxFullSnafu { hart: target })?;
            self.ipi.send(target);
        }
        Ok(seq)
    }

    fn wait<H>(&self, hart: &H, targets: &HartMask, seq: usize) -> Result<(), BroadcastError>
    where
        H: HartOps + ?Sized,
    {
        let retired = &self.channels[hart.hart_id().value()].retired;
        let is_retired = |target: &HartId| retired[target.value()].load(Ordering::Acquire) == seq;
        self.poll_policy
            .wait_until_with(|| targets.iter().all(|t| is_retired(&t)), || self.service(hart))
            .with_context(|_| NotRetiredSnafu {
                seq,
                pending: targets.iter().filter(|t| !is_retired(t)).count(),
            })
    }

    /// Performs every request waiting in the calling hart's inbox.
    pub fn service<H>(&self, hart: &H)
    where
        H: HartOps + ?Sized,
    {
        let me = hart.hart_id();
        let inbox = &self.channels[me.value()].inbox;
        loop {
            // The lock is not held while the action runs.
            let Some(posted) = inbox.lock().pop_at(0) else {
                break;
            };
            trace!(
                "servicing request {} from hart {} ({:?})",
                posted.seq,
                posted.source,
                posted.stage
            );
            Self::execute(hart, self.shared_cache, posted.stage, &posted.request);
            self.channels[posted.source.value()].retired[me.value()]
                .store(posted.seq, Ordering::Release);
        }
    }

    fn execute<H>(
        hart: &H,
        shared_cache: Option<&dyn SharedCache>,
        stage: Stage,
        request: &MaintenanceRequest,
    ) where
        H: HartOps + ?Sized,
    {
        let RequestHeader { start, size, .. } = request.header;
        match (stage, request.action) {
            (Stage::Local, Maintenance::Cache(op)) => op.apply_local(hart, start, size),
            (Stage::Local, Maintenance::Fence(op)) => op.apply(hart, start, size),
            (Stage::Final, Maintenance::Cache(op)) => {
                if let Some(shared) = shared_cache {
                    op.apply_shared(shared, hart.hart_id(), start, size, cache::line_size(hart));
                }
            }
            (Stage::Final, Maintenance::Fence(_)) => {}
        }
    }
}
