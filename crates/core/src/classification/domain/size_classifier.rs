use super::size_range::SizeTiers;

/// Fraction of a tier's span added on each side in the tolerant pass.
pub const DEFAULT_MARGIN_FRACTION: f64 = 0.2;

/// Maps a length/width measurement to a size tier.
///
/// Three passes, first hit wins:
/// 1. strict containment, smallest tier first
/// 2. containment with a margin, non-terminal tiers only
/// 3. nearest centroid among non-terminal tiers
///
/// The terminal tier is only ever reached by strict containment, so a
/// borderline measurement is never promoted into it.
#[derive(Clone, Copy, Debug)]
pub struct SizeClassifier {
    margin_fraction: f64,
}

impl SizeClassifier {
    pub fn new(margin_fraction: f64) -> Self {
        Self { margin_fraction }
    }

    pub fn classify<'a>(&self, tiers: &'a SizeTiers, length: f64, width: f64) -> &'a str {
        if let Some(t) = tiers.iter().find(|t| t.range.contains(length, width)) {
            return &t.name;
        }

        let candidates = tiers.non_terminal();
        if let Some(t) = candidates
            .iter()
            .find(|t| t.range.contains_with_margin(length, width, self.margin_fraction))
        {
            return &t.name;
        }

        // Ties go to the larger tier.
        let mut best = &candidates[0];
        let mut best_dist = f64::INFINITY;
        for t in candidates {
            let (cl, cw) = t.range.centroid();
            let dist = ((length - cl).powi(2) + (width - cw).powi(2)).sqrt();
            if dist <= best_dist {
                best = t;
                best_dist = dist;
            }
        }
        &best.name
    }
}

impl Default for SizeClassifier {
    fn default() -> Self {
        Self::new(DEFAULT_MARGIN_FRACTION)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::classification::domain::size_range::{SizeRange, SizeTier};
    use rstest::rstest;

    fn classify(length: f64, width: f64) -> String {
        SizeClassifier::default()
            .classify(&SizeTiers::default(), length, width)
            .to_string()
    }

    // ── Strict containment ──

    #[rstest]
    #[case::clearly_large(12.0, 5.0, "Large")]
    #[case::clearly_small(3.0, 1.0, "Small")]
    #[case::clearly_medium(7.0, 3.0, "Medium")]
    #[case::small_upper_edge(5.0, 2.0, "Small")]
    #[case::large_lower_edge(10.1, 4.1, "Large")]
    fn test_strict_containment(#[case] l: f64, #[case] w: f64, #[case] expected: &str) {
        assert_eq!(classify(l, w), expected);
    }

    // ── Margin pass ──

    #[test]
    fn test_gap_between_tiers_is_not_large() {
        // Falls between Small and Medium; margin puts it in Small.
        assert_eq!(classify(5.05, 2.05), "Small");
    }

    #[test]
    fn test_margin_catches_slightly_oversized_medium() {
        // Length fits Medium, width 4.05 is in the gap below Large.
        assert_eq!(classify(8.0, 4.05), "Medium");
    }

    // ── Centroid fallback ──

    #[rstest]
    #[case::long_but_thin(12.0, 3.0)]
    #[case::wide_but_short(6.0, 9.0)]
    #[case::huge_length_tiny_width(500.0, 0.5)]
    fn test_fallback_never_yields_terminal_tier(#[case] l: f64, #[case] w: f64) {
        assert_ne!(classify(l, w), "Large");
    }

    #[test]
    fn test_fallback_picks_nearest_centroid() {
        // Small centroid (2.5, 1.0), Medium centroid (7.55, 3.05).
        assert_eq!(classify(12.0, 3.0), "Medium");
        assert_eq!(classify(-3.0, 1.0), "Small");
    }

    #[test]
    fn test_fallback_tie_goes_to_larger_tier() {
        let tiers = SizeTiers::new(vec![
            SizeTier {
                name: "A".into(),
                range: SizeRange::new(0.0, 2.0, 0.0, 2.0),
            },
            SizeTier {
                name: "B".into(),
                range: SizeRange::new(4.0, 6.0, 0.0, 2.0),
            },
            SizeTier {
                name: "C".into(),
                range: SizeRange::new(100.0, 200.0, 100.0, 200.0),
            },
        ])
        .unwrap();
        // Equidistant from A (1,1) and B (5,1), outside every margin.
        let name = SizeClassifier::default().classify(&tiers, 3.0, 10.0);
        assert_eq!(name, "B");
    }

    // ── Properties ──

    #[test]
    fn test_classification_is_deterministic() {
        let inputs = [(12.0, 5.0), (5.05, 2.05), (12.0, 3.0), (0.0, 0.0)];
        for (l, w) in inputs {
            assert_eq!(classify(l, w), classify(l, w));
        }
    }

    #[test]
    fn test_two_tier_configuration() {
        let tiers = SizeTiers::new(vec![
            SizeTier {
                name: "Keep".into(),
                range: SizeRange::new(0.0, 20.0, 0.0, 8.0),
            },
            SizeTier {
                name: "Harvest".into(),
                range: SizeRange::new(20.1, 999.0, 8.1, 999.0),
            },
        ])
        .unwrap();
        let classifier = SizeClassifier::default();
        assert_eq!(classifier.classify(&tiers, 25.0, 9.0), "Harvest");
        assert_eq!(classifier.classify(&tiers, 25.0, 2.0), "Keep");
    }
}
