// SPDX-License-Identifier: MIT

//! Active-window detection over rendered sample buffers.
//!
//! The sequencer only has to play the stretches of a rendered buffer where
//! any channel or the marker is non-zero; everything else becomes `playZero`
//! waits. Detection works on 16-sample blocks so window boundaries stay
//! aligned to the hardware DMA granularity.

use std::ops::Range;

use anyhow::anyhow;

use crate::seqc_generator::SAMPLE_MULTIPLE;
use crate::{Result, Samples};

/// Zero runs shorter than this many samples are bridged into the enclosing
/// window; longer runs end it. Waiting only pays off once the gap amortizes
/// the sequencer's wave setup overhead.
pub const DEFAULT_BRIDGE_THRESHOLD: Samples = 150_000;

/// Active sample windows of a rendered multi-channel buffer.
///
/// All buffers must share one length that is a multiple of 16. Both ends of
/// every returned window are 16-aligned, and a window always ends with its
/// last active block: trailing zero blocks are never included, no matter how
/// short the run.
pub fn find_active_windows(
    channels: &[Vec<f64>],
    marker: &[f64],
    bridge_threshold: Samples,
) -> Result<Vec<Range<Samples>>> {
    let length = marker.len();
    for (index, channel) in channels.iter().enumerate() {
        if channel.len() != length {
            return Err(anyhow!(
                "channel {index} has {} samples, the marker has {length}",
                channel.len()
            )
            .into());
        }
    }
    if length % SAMPLE_MULTIPLE as usize != 0 {
        return Err(anyhow!(
            "buffer length {length} is not a multiple of {SAMPLE_MULTIPLE}"
        )
        .into());
    }

    let block_active = |block: usize| {
        let samples = block * SAMPLE_MULTIPLE as usize..(block + 1) * SAMPLE_MULTIPLE as usize;
        channels
            .iter()
            .map(|channel| &channel[samples.clone()])
            .chain(std::iter::once(&marker[samples.clone()]))
            .any(|buffer| buffer.iter().any(|v| *v != 0.0))
    };

    let mut windows = Vec::new();
    let mut current: Option<(usize, usize)> = None; // (first, last) active block
    for block in 0..length / SAMPLE_MULTIPLE as usize {
        if !block_active(block) {
            continue;
        }
        current = Some(match current {
            None => (block, block),
            Some((first, last)) => {
                let gap = (block - last - 1) as Samples * SAMPLE_MULTIPLE;
                if gap >= bridge_threshold {
                    windows.push(block_range(first, last));
                    (block, block)
                } else {
                    (first, block)
                }
            }
        });
    }
    if let Some((first, last)) = current {
        windows.push(block_range(first, last));
    }
    Ok(windows)
}

fn block_range(first: usize, last: usize) -> Range<Samples> {
    first as Samples * SAMPLE_MULTIPLE..(last + 1) as Samples * SAMPLE_MULTIPLE
}

#[cfg(test)]
mod tests {
    use super::*;

    fn buffer_with(length: usize, active: &[Range<usize>]) -> Vec<f64> {
        let mut buffer = vec![0.0; length];
        for range in active {
            for v in &mut buffer[range.clone()] {
                *v = 0.5;
            }
        }
        buffer
    }

    #[test]
    fn test_short_gap_is_bridged() {
        // 32 active samples, a 5-sample gap, 16 more active samples: one
        // merged window covering all four blocks.
        let channel = buffer_with(64, &[0..32, 37..53]);
        let windows = find_active_windows(&[channel], &[0.0; 64], 150_000).unwrap();
        assert_eq!(windows, vec![0..64]);
    }

    #[test]
    fn test_long_gap_splits_windows() {
        let channel = buffer_with(160, &[0..16, 128..144]);
        let windows = find_active_windows(&[channel], &[0.0; 160], 64).unwrap();
        assert_eq!(windows, vec![0..16, 128..144]);
    }

    #[test]
    fn test_sub_threshold_block_gap_is_bridged() {
        let channel = buffer_with(160, &[0..16, 128..144]);
        // The 112-sample gap is below the threshold, so it is bridged.
        let windows = find_active_windows(&[channel], &[0.0; 160], 128).unwrap();
        assert_eq!(windows, vec![0..144]);
    }

    #[test]
    fn test_trailing_dead_blocks_excluded() {
        let channel = buffer_with(160, &[20..40]);
        let windows = find_active_windows(&[channel], &[0.0; 160], 150_000).unwrap();
        // Ends at the last active block, 16-aligned on both sides.
        assert_eq!(windows, vec![16..48]);
    }

    #[test]
    fn test_marker_counts_as_activity() {
        let marker = buffer_with(64, &[32..40]);
        let windows = find_active_windows(&[vec![0.0; 64]], &marker, 150_000).unwrap();
        assert_eq!(windows, vec![32..48]);
    }

    #[test]
    fn test_all_zero_buffer_has_no_windows() {
        let windows =
            find_active_windows(&[vec![0.0; 64]], &[0.0; 64], 150_000).unwrap();
        assert!(windows.is_empty());
    }

    #[test]
    fn test_mismatched_lengths_rejected() {
        assert!(find_active_windows(&[vec![0.0; 32]], &[0.0; 64], 150_000).is_err());
        assert!(find_active_windows(&[vec![0.0; 24]], &[0.0; 24], 150_000).is_err());
    }
}
