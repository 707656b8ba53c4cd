//! Brute-force Hamming matching with the distance-ratio test.
//!
//! Every reference descriptor is compared against all candidate descriptors;
//! the two nearest neighbors feed Lowe's ratio test, which rejects ambiguous
//! matches. Repeated or textured regions in lifestyle photography would
//! otherwise produce spurious correspondences.

use crate::features::Descriptor;
use crate::trace::{trace_event, trace_span};

/// An accepted correspondence between a reference and candidate descriptor.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MatchPair {
    /// Index into the reference (logo) descriptor set.
    pub query_idx: usize,
    /// Index into the candidate (campaign image) descriptor set.
    pub train_idx: usize,
    /// Hamming distance of the accepted match.
    pub distance: u32,
}

/// Hamming distance between two 256-bit descriptors.
#[inline]
pub fn hamming_distance(a: &Descriptor, b: &Descriptor) -> u32 {
    let mut total = 0u32;
    for (lane_a, lane_b) in a.chunks_exact(8).zip(b.chunks_exact(8)) {
        let wa = u64::from_le_bytes(lane_a.try_into().expect("8-byte lane"));
        let wb = u64::from_le_bytes(lane_b.try_into().expect("8-byte lane"));
        total += (wa ^ wb).count_ones();
    }
    total
}

/// Matches reference descriptors against candidate descriptors with a 2-NN
/// search and the ratio test: a match is kept only when
/// `best < ratio * second_best`.
///
/// Fewer than two candidate descriptors make the ratio test impossible; the
/// result is then empty and the caller surfaces the not-enough-features
/// condition. Neighbor ties resolve toward the lower candidate index.
pub fn match_descriptors(
    reference: &[Descriptor],
    candidate: &[Descriptor],
    ratio: f32,
) -> Vec<MatchPair> {
    let _span = trace_span!(
        "match_descriptors",
        reference = reference.len(),
        candidate = candidate.len()
    )
    .entered();

    if reference.is_empty() || candidate.len() < 2 {
        return Vec::new();
    }

    let mut accepted = Vec::new();
    for (query_idx, query) in reference.iter().enumerate() {
        let mut best = u32::MAX;
        let mut best_idx = 0usize;
        let mut second = u32::MAX;
        for (train_idx, train) in candidate.iter().enumerate() {
            let distance = hamming_distance(query, train);
            if distance < best {
                second = best;
                best = distance;
                best_idx = train_idx;
            } else if distance < second {
                second = distance;
            }
        }
        if (best as f32) < ratio * (second as f32) {
            accepted.push(MatchPair {
                query_idx,
                train_idx: best_idx,
                distance: best,
            });
        }
    }

    trace_event!("accepted_matches", count = accepted.len());
    accepted
}

#[cfg(test)]
mod tests {
    use super::{hamming_distance, match_descriptors, MatchPair};
    use crate::features::Descriptor;

    fn descriptor_with_bits(bits: &[usize]) -> Descriptor {
        let mut d = [0u8; 32];
        for &bit in bits {
            d[bit / 8] |= 1 << (bit % 8);
        }
        d
    }

    #[test]
    fn hamming_counts_differing_bits() {
        let a = descriptor_with_bits(&[0, 5, 100, 255]);
        let b = descriptor_with_bits(&[0, 5, 101, 255]);
        assert_eq!(hamming_distance(&a, &a), 0);
        assert_eq!(hamming_distance(&a, &b), 2);
        assert_eq!(hamming_distance(&[0u8; 32], &[0xFF; 32]), 256);
    }

    #[test]
    fn ratio_test_accepts_unambiguous_match() {
        let query = [descriptor_with_bits(&[1, 2, 3])];
        let train = [
            descriptor_with_bits(&[1, 2, 3, 4]), // distance 1
            descriptor_with_bits(&[200, 201, 202, 203, 204, 205]), // distance 9
        ];
        let matches = match_descriptors(&query, &train, 0.75);
        assert_eq!(
            matches,
            vec![MatchPair {
                query_idx: 0,
                train_idx: 0,
                distance: 1
            }]
        );
    }

    #[test]
    fn ratio_test_rejects_ambiguous_match() {
        // Distances 3 and 4: 3 < 0.75 * 4 does not hold, so the nearest
        // neighbor is too close to the runner-up to trust.
        let query = [descriptor_with_bits(&[1, 2, 3])];
        let train = [
            descriptor_with_bits(&[1, 2, 3, 4, 5, 6]),    // distance 3
            descriptor_with_bits(&[1, 2, 3, 4, 5, 6, 7]), // distance 4
        ];
        assert!(match_descriptors(&query, &train, 0.75).is_empty());
    }

    #[test]
    fn exact_match_with_distinct_second_is_kept() {
        // Distance 0 always passes the test against any nonzero second-best.
        let query = [descriptor_with_bits(&[10, 20])];
        let train = [
            descriptor_with_bits(&[10, 20]),
            descriptor_with_bits(&[10, 21]),
        ];
        let matches = match_descriptors(&query, &train, 0.75);
        assert_eq!(matches.len(), 1);
        assert_eq!(matches[0].distance, 0);
    }

    #[test]
    fn empty_inputs_yield_no_matches() {
        let d = [descriptor_with_bits(&[1])];
        assert!(match_descriptors(&[], &d, 0.75).is_empty());
        assert!(match_descriptors(&d, &[], 0.75).is_empty());
        // A single candidate cannot supply a second neighbor.
        assert!(match_descriptors(&d, &d[..1], 0.75).is_empty());
    }
}
