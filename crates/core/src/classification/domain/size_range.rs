use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::shared::config_error::ConfigError;

/// Upper bound used for the open-ended top tier.
pub const UNBOUNDED_CM: f64 = 999.0;

/// Gap between consecutive tiers when expanding legacy settings.
const LEGACY_STEP_CM: f64 = 0.1;

/// Inclusive length and width bounds in centimetres.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SizeRange {
    pub min_length: f64,
    pub max_length: f64,
    pub min_width: f64,
    pub max_width: f64,
}

impl SizeRange {
    pub fn new(min_length: f64, max_length: f64, min_width: f64, max_width: f64) -> Self {
        Self {
            min_length,
            max_length,
            min_width,
            max_width,
        }
    }

    pub fn contains(&self, length: f64, width: f64) -> bool {
        self.contains_with_margin(length, width, 0.0)
    }

    /// Containment after widening each bound by `fraction` of its span.
    pub fn contains_with_margin(&self, length: f64, width: f64, fraction: f64) -> bool {
        let lm = (self.max_length - self.min_length) * fraction;
        let wm = (self.max_width - self.min_width) * fraction;
        length >= self.min_length - lm
            && length <= self.max_length + lm
            && width >= self.min_width - wm
            && width <= self.max_width + wm
    }

    pub fn centroid(&self) -> (f64, f64) {
        (
            (self.min_length + self.max_length) / 2.0,
            (self.min_width + self.max_width) / 2.0,
        )
    }
}

/// Single reference value per tier, from older settings files.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LegacySize {
    pub length: Option<f64>,
    pub width: Option<f64>,
}

impl LegacySize {
    /// Fills missing values from the built-in tier of the same name
    /// (`small` 5x2, `medium` 10x4). Other names are left as they are.
    fn with_builtin_defaults(self, name: &str) -> Self {
        let defaults = SizeTiers::default();
        match defaults
            .non_terminal()
            .iter()
            .find(|t| t.name.eq_ignore_ascii_case(name))
        {
            Some(builtin) => Self {
                length: self.length.or(Some(builtin.range.max_length)),
                width: self.width.or(Some(builtin.range.max_width)),
            },
            None => self,
        }
    }
}

/// Size settings as stored: either explicit ranges or the legacy
/// single-value form. Normalize once with [`SizeTiers::from_settings`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum SizeSettings {
    Ranges(BTreeMap<String, SizeRange>),
    Legacy(BTreeMap<String, LegacySize>),
}

#[derive(Clone, Debug, PartialEq)]
pub struct SizeTier {
    pub name: String,
    pub range: SizeRange,
}

/// Validated tiers ordered smallest first. The last tier is the terminal
/// (open-ended, highest-value) one.
#[derive(Clone, Debug, PartialEq)]
pub struct SizeTiers {
    tiers: Vec<SizeTier>,
}

impl SizeTiers {
    /// Sorts by minimum length and validates. At least two tiers are
    /// required so that a non-terminal fallback always exists.
    pub fn new(mut tiers: Vec<SizeTier>) -> Result<Self, ConfigError> {
        if tiers.len() < 2 {
            return Err(ConfigError::Invalid(format!(
                "need at least 2 size tiers, got {}",
                tiers.len()
            )));
        }
        for t in &tiers {
            let r = &t.range;
            if !(r.min_length <= r.max_length && r.min_width <= r.max_width) {
                return Err(ConfigError::Invalid(format!(
                    "tier {} has min above max",
                    t.name
                )));
            }
        }
        tiers.sort_by(|a, b| {
            (a.range.min_length, a.range.min_width)
                .partial_cmp(&(b.range.min_length, b.range.min_width))
                .unwrap_or(std::cmp::Ordering::Equal)
        });
        Ok(Self { tiers })
    }

    pub fn from_settings(settings: SizeSettings) -> Result<Self, ConfigError> {
        match settings {
            SizeSettings::Ranges(map) => Self::new(
                map.into_iter()
                    .map(|(name, range)| SizeTier {
                        name: display_name(&name),
                        range,
                    })
                    .collect(),
            ),
            SizeSettings::Legacy(map) => Self::from_legacy(map),
        }
    }

    /// Each legacy value becomes the upper bound of its tier; the next tier
    /// starts just above it and the last one is open-ended.
    fn from_legacy(map: BTreeMap<String, LegacySize>) -> Result<Self, ConfigError> {
        let mut entries: Vec<(String, LegacySize)> = map
            .into_iter()
            .map(|(name, size)| {
                let size = size.with_builtin_defaults(&name);
                (name, size)
            })
            .collect();
        entries.sort_by(|a, b| {
            let la = a.1.length.unwrap_or(f64::INFINITY);
            let lb = b.1.length.unwrap_or(f64::INFINITY);
            la.partial_cmp(&lb).unwrap_or(std::cmp::Ordering::Equal)
        });

        let last = entries.len().saturating_sub(1);
        let mut tiers = Vec::with_capacity(entries.len());
        let (mut prev_len, mut prev_width): (Option<f64>, Option<f64>) = (None, None);
        for (i, (name, size)) in entries.into_iter().enumerate() {
            let (max_length, max_width) = if i == last {
                (UNBOUNDED_CM, UNBOUNDED_CM)
            } else {
                match (size.length, size.width) {
                    (Some(l), Some(w)) => (l, w),
                    _ => {
                        return Err(ConfigError::Invalid(format!(
                            "legacy tier {name} needs length and width"
                        )))
                    }
                }
            };
            tiers.push(SizeTier {
                name: display_name(&name),
                range: SizeRange::new(
                    prev_len.map_or(0.0, |l| l + LEGACY_STEP_CM),
                    max_length,
                    prev_width.map_or(0.0, |w| w + LEGACY_STEP_CM),
                    max_width,
                ),
            });
            prev_len = Some(max_length);
            prev_width = Some(max_width);
        }
        Self::new(tiers)
    }

    /// The range form of these tiers, keyed by lowercase name.
    pub fn to_settings(&self) -> SizeSettings {
        SizeSettings::Ranges(
            self.tiers
                .iter()
                .map(|t| (t.name.to_lowercase(), t.range))
                .collect(),
        )
    }

    pub fn iter(&self) -> impl Iterator<Item = &SizeTier> {
        self.tiers.iter()
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    pub fn terminal(&self) -> &SizeTier {
        &self.tiers[self.tiers.len() - 1]
    }

    /// Every tier except the terminal one.
    pub fn non_terminal(&self) -> &[SizeTier] {
        &self.tiers[..self.tiers.len() - 1]
    }
}

impl Default for SizeTiers {
    /// Small [0,5]x[0,2], Medium [5.1,10]x[2.1,4], Large [10.1,999]x[4.1,999].
    fn default() -> Self {
        Self {
            tiers: vec![
                SizeTier {
                    name: "Small".into(),
                    range: SizeRange::new(0.0, 5.0, 0.0, 2.0),
                },
                SizeTier {
                    name: "Medium".into(),
                    range: SizeRange::new(5.1, 10.0, 2.1, 4.0),
                },
                SizeTier {
                    name: "Large".into(),
                    range: SizeRange::new(10.1, UNBOUNDED_CM, 4.1, UNBOUNDED_CM),
                },
            ],
        }
    }
}

/// `small` -> `Small`.
fn display_name(key: &str) -> String {
    let mut chars = key.chars();
    match chars.next() {
        Some(first) => first.to_uppercase().chain(chars).collect(),
        None => String::new(),
    }
}
