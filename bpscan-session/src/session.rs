//! Capture-session decoding state
//!
//! A [`Session`] owns every piece of state shared across bundles: the
//! first-sighting map for duplicate detection, the status-report reference
//! map, and the fragment reassembly table. It is constructed at the start
//! of a capture and discarded (or [`Session::reset`]) at its end; all the
//! decode layers below it are pure over their inputs.

use std::collections::BTreeSet;

use ahash::AHashMap;
use bpscan_bundle::{decode_bundle, Bundle, BundleConfig, BundleIdentity, StatusReport};
use bpscan_cbor::{DecodeError, Diagnostics};
use bytes::Bytes;
use tracing::debug;

use crate::reassembly::ReassemblyState;

const CATEGORY: &str = "correlate";

/// Session-level configuration.
#[derive(Debug)]
pub struct SessionConfig {
    /// Per-bundle decode configuration.
    pub bundle: BundleConfig,
    /// Upper bound on fragment offsets, lengths, and totals. Defaults to
    /// the 32-bit range; raise it on hosts with a larger memory budget.
    pub max_fragment_extent: u64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            bundle: BundleConfig::default(),
            max_fragment_extent: u64::from(u32::MAX),
        }
    }
}

/// Where and when an identity was first observed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FirstSighting {
    /// Ordinal of the observation within the session.
    pub frame: u64,
    /// Caller-supplied observation time in milliseconds.
    pub time_ms: u64,
}

/// Everything derived from observing one bundle.
#[derive(Debug)]
pub struct Observation<'a> {
    /// Ordinal of this observation within the session.
    pub frame: u64,
    /// Offset of the bundle within the scanned buffer; zero for single
    /// observations.
    pub offset: usize,
    /// The decoded bundle.
    pub bundle: Bundle<'a>,
    /// Findings accumulated while decoding and correlating.
    pub diagnostics: Diagnostics,
    /// The bundle's identity, when the primary block decoded.
    pub identity: Option<BundleIdentity>,
    /// First sighting of the same identity, when this is a retransmission.
    pub duplicate_of: Option<FirstSighting>,
    /// Status report carried by this bundle, when it is one.
    pub status_report: Option<StatusReport>,
    /// Reassembled payload, when this fragment completed its bundle.
    pub reassembled: Option<Bytes>,
    /// Bytes consumed from the input buffer.
    pub consumed: usize,
}

/// Result of scanning a buffer of concatenated bundles.
#[derive(Debug)]
pub struct ScanOutcome<'a> {
    /// Observations in buffer order.
    pub observations: Vec<Observation<'a>>,
    /// Hard error that ended the scan early, if any.
    pub error: Option<DecodeError>,
}

/// Session-wide decoding and correlation state.
///
/// Not internally synchronized; a multi-threaded host allocates one
/// session per capture.
#[derive(Debug, Default)]
pub struct Session {
    config: SessionConfig,
    seen: AHashMap<BundleIdentity, FirstSighting>,
    status_refs: AHashMap<BundleIdentity, BTreeSet<BundleIdentity>>,
    reassembly: AHashMap<BundleIdentity, ReassemblyState>,
    frames: u64,
}

impl Session {
    /// New session with the given configuration.
    pub fn new(config: SessionConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// The session configuration.
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Drop all cross-bundle state, keeping the configuration.
    pub fn reset(&mut self) {
        self.seen.clear();
        self.status_refs.clear();
        self.reassembly.clear();
        self.frames = 0;
    }

    /// Number of bundles observed so far.
    pub fn frames(&self) -> u64 {
        self.frames
    }

    /// First sighting of an identity, if it has been observed.
    pub fn first_sighting(&self, identity: &BundleIdentity) -> Option<FirstSighting> {
        self.seen.get(identity).copied()
    }

    /// Identities of every status report observed about `subject`.
    pub fn status_reports_about(
        &self,
        subject: &BundleIdentity,
    ) -> Option<&BTreeSet<BundleIdentity>> {
        self.status_refs.get(subject)
    }

    /// Decode one bundle from the front of `buf` and fold it into the
    /// session state. `time_ms` is the caller's observation clock, used
    /// for retransmission deltas.
    pub fn observe<'a>(
        &mut self,
        buf: &'a [u8],
        time_ms: u64,
    ) -> Result<Observation<'a>, DecodeError> {
        let mut diags = Diagnostics::new();
        let bundle = decode_bundle(buf, &self.config.bundle, &mut diags)?;
        let frame = self.frames;
        self.frames += 1;
        debug!(frame, blocks = bundle.blocks.len(), "decoded bundle");

        let identity = bundle.identity();
        let mut duplicate_of = None;
        if let Some(id) = &identity {
            match self.seen.entry(id.clone()) {
                std::collections::hash_map::Entry::Occupied(entry) => {
                    let first = *entry.get();
                    let delta = time_ms.saturating_sub(first.time_ms);
                    diags.note(
                        CATEGORY,
                        0,
                        format!(
                            "retransmission of bundle first seen {delta} ms earlier \
                             (frame {})",
                            first.frame
                        ),
                    );
                    debug!(frame, first_frame = first.frame, delta_ms = delta, "duplicate bundle");
                    duplicate_of = Some(first);
                }
                std::collections::hash_map::Entry::Vacant(entry) => {
                    entry.insert(FirstSighting { frame, time_ms });
                }
            }
        }

        // Status reports link back to the bundle they describe.
        let status_report = bundle.status_report(&self.config.bundle, &mut diags);
        if let (Some(report), Some(reporter)) = (&status_report, &identity) {
            self.status_refs
                .entry(report.subject.clone())
                .or_default()
                .insert(reporter.clone());
            debug!(frame, subject = %report.subject, "status report registered");
        }

        let reassembled = self.fold_payload(&bundle, &identity, &mut diags);

        let consumed = bundle.encoded_len;
        Ok(Observation {
            frame,
            offset: 0,
            bundle,
            diagnostics: diags,
            identity,
            duplicate_of,
            status_report,
            reassembled,
            consumed,
        })
    }

    /// Scan a buffer of concatenated bundles, observing each in order.
    ///
    /// A bundle decoded with diagnostics does not affect the bundles after
    /// it; a hard error ends the scan, since the next framing boundary
    /// cannot be found.
    pub fn scan<'a>(&mut self, buf: &'a [u8], time_ms: u64) -> ScanOutcome<'a> {
        let mut observations = Vec::new();
        let mut error = None;
        let mut offset = 0;
        while offset < buf.len() {
            match self.observe(&buf[offset..], time_ms) {
                Ok(mut observation) => {
                    let consumed = observation.consumed;
                    observation.offset = offset;
                    observations.push(observation);
                    if consumed == 0 {
                        break;
                    }
                    offset += consumed;
                }
                Err(err) => {
                    error = Some(err);
                    break;
                }
            }
        }
        ScanOutcome {
            observations,
            error,
        }
    }

    /// Route the bundle's payload: fragments feed the reassembly table,
    /// complete payloads go to the registered payload decoder.
    fn fold_payload(
        &mut self,
        bundle: &Bundle<'_>,
        identity: &Option<BundleIdentity>,
        diags: &mut Diagnostics,
    ) -> Option<Bytes> {
        let primary = bundle.primary.as_ref()?;
        let payload = bundle.payload_block()?;
        let limits = &self.config.bundle.limits;

        if primary.is_fragment() {
            let id = identity.as_ref()?;
            let (Some(offset), Some(total)) = (primary.fragment_offset, primary.total_adu_length)
            else {
                return None;
            };
            let state = self.reassembly.entry(id.defragmented()).or_default();
            let complete = state.insert(
                offset,
                total,
                &payload.data,
                self.config.max_fragment_extent,
                diags,
            );
            if let Some(assembled) = &complete {
                self.reassembly.remove(&id.defragmented());
                debug!(total = assembled.len(), "fragmented payload reassembled");
                if let Some(destination) = &primary.destination {
                    self.config
                        .bundle
                        .registry
                        .payload_decoder(destination.scheme)
                        .decode(primary, assembled, limits, diags);
                }
            }
            return complete;
        }

        // Complete payload: hand to the type-specific decoder unless the
        // admin-record path already consumed it.
        if !primary.is_admin_record() {
            if let Some(destination) = &primary.destination {
                self.config
                    .bundle
                    .registry
                    .payload_decoder(destination.scheme)
                    .decode(primary, &payload.data, limits, diags);
            }
        }
        None
    }
}

impl<'a> Observation<'a> {
    /// Whether this observation carried no findings above note severity.
    pub fn is_clean(&self) -> bool {
        self.diagnostics.is_clean()
    }
}
