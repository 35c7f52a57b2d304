//! Layout-pass transcript parsing.
//!
//! The layout pass asks AddressSanitizer to describe every pointer parameter
//! and prints `sizeof <param> <bytes>` for its element type. Descriptions come
//! in three forms:
//!
//! ```text
//! 0x00000074bb80 is located 0 bytes inside of global variable 'array' defined in 'global.c:4' (0x74bb80) of size 80
//! 0x507000000090 is located 0 bytes inside of 80-byte region [0x507000000090,0x5070000000e0)
//! Address 0x7ffff3f00048 is located in stack of thread T0 at offset 72 in frame
//!     [32, 112) 'array3' (line 19) <== Memory access at offset 72 is inside this variable
//! ```
//!
//! Descriptions are matched to parameters by order of appearance.

use std::collections::HashMap;

use once_cell::sync::Lazy;
use regex::Regex;

use crate::domain::error::CaptureFailure;
use crate::domain::layout::{RegionKind, ResolvedRegion};

static SIZEOF: Lazy<Regex> =
    Lazy::new(|| Regex::new(r"^sizeof (\S+) (\d+)\s*$").unwrap_or_else(|e| panic!("regex: {e}")));

static GLOBAL: Lazy<Regex> = Lazy::new(|| {
    Regex::new(
        r"is located (\d+) bytes inside of global variable '[^']*' defined in '[^']*' \((0x[0-9a-fA-F]+)\) of size (\d+)",
    )
    .unwrap_or_else(|e| panic!("regex: {e}"))
});

static HEAP: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"is located (\d+) bytes inside of (\d+)-byte region \[(0x[0-9a-fA-F]+),\s*(0x[0-9a-fA-F]+)\)")
        .unwrap_or_else(|e| panic!("regex: {e}"))
});

static STACK_ADDRESS: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"Address (0x[0-9a-fA-F]+) is located in stack of thread \S+ at offset (\d+) in frame")
        .unwrap_or_else(|e| panic!("regex: {e}"))
});

static STACK_VARIABLE: Lazy<Regex> = Lazy::new(|| {
    Regex::new(r"\[(\d+),\s*(\d+)\) '[^']*'.*<== Memory access at offset (\d+) is inside this variable")
        .unwrap_or_else(|e| panic!("regex: {e}"))
});

/// Phrases that open an address description of any kind.
const DESCRIPTION_MARKERS: [&str; 3] = [" is located ", " is a wild pointer", "can not describe address"];

/// Everything the layout pass reported.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct LayoutReport {
    /// One region per described pointer, in query order.
    pub regions: Vec<ResolvedRegion>,
    /// Element type size per parameter name.
    pub element_sizes: HashMap<String, u64>,
}

fn hex(text: &str) -> Option<u64> {
    u64::from_str_radix(text.trim_start_matches("0x").trim_start_matches("0X"), 16).ok()
}

fn dec(text: &str) -> Option<u64> {
    text.parse().ok()
}

/// Parse a complete layout-pass transcript (stdout followed by stderr).
pub fn parse_layout_report(transcript: &str) -> Result<LayoutReport, CaptureFailure> {
    let mut report = LayoutReport::default();
    // (absolute address, frame offset) of a stack description awaiting its variable line
    let mut pending_stack: Option<(u64, u64)> = None;

    for raw in transcript.lines() {
        let line = raw.trim();
        let garbled = || CaptureFailure::UnrecognizedAddress(line.to_string());

        if let Some(caps) = SIZEOF.captures(line) {
            let size = dec(&caps[2]).ok_or_else(garbled)?;
            report.element_sizes.insert(caps[1].to_string(), size);
            continue;
        }

        if let Some(caps) = STACK_VARIABLE.captures(line) {
            let Some((address, _)) = pending_stack.take() else {
                // Frame listings also appear in ordinary error reports.
                continue;
            };
            let lo = dec(&caps[1]).ok_or_else(garbled)?;
            let hi = dec(&caps[2]).ok_or_else(garbled)?;
            let access = dec(&caps[3]).ok_or_else(garbled)?;
            let byte_offset = access.checked_sub(lo).ok_or_else(garbled)?;
            report.regions.push(ResolvedRegion {
                kind: RegionKind::Stack,
                byte_offset,
                byte_size: hi.saturating_sub(lo),
                base_address: address.checked_sub(byte_offset).ok_or_else(garbled)?,
            });
            continue;
        }

        if !DESCRIPTION_MARKERS.iter().any(|m| line.contains(m)) {
            continue;
        }
        if pending_stack.is_some() {
            return Err(CaptureFailure::DanglingStackAddress);
        }

        if let Some(caps) = STACK_ADDRESS.captures(line) {
            let address = hex(&caps[1]).ok_or_else(garbled)?;
            let frame_offset = dec(&caps[2]).ok_or_else(garbled)?;
            pending_stack = Some((address, frame_offset));
        } else if let Some(caps) = GLOBAL.captures(line) {
            report.regions.push(ResolvedRegion {
                kind: RegionKind::Global,
                byte_offset: dec(&caps[1]).ok_or_else(garbled)?,
                byte_size: dec(&caps[3]).ok_or_else(garbled)?,
                base_address: hex(&caps[2]).ok_or_else(garbled)?,
            });
        } else if let Some(caps) = HEAP.captures(line) {
            let lo = hex(&caps[3]).ok_or_else(garbled)?;
            let hi = hex(&caps[4]).ok_or_else(garbled)?;
            report.regions.push(ResolvedRegion {
                kind: RegionKind::Heap,
                byte_offset: dec(&caps[1]).ok_or_else(garbled)?,
                byte_size: hi.saturating_sub(lo),
                base_address: lo,
            });
        } else {
            return Err(garbled());
        }
    }

    if pending_stack.is_some() {
        return Err(CaptureFailure::DanglingStackAddress);
    }
    Ok(report)
}
