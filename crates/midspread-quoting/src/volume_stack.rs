//! Volume tiers to quote and the volume bands that own resting orders.
//!
//! A stack is either static (one tier carrying the whole configured
//! volume) or loaded from a distribution file:
//!
//! ```json
//! {
//!   "_comment_": "free text",
//!   "volume_distortion": 1.0,
//!   "bp_distortion": 1.0,
//!   "0.002": 0.25,
//!   "0.004": 0.75
//! }
//! ```
//!
//! Distribution volumes are denominated in XBT and converted into the
//! traded base asset through a cross-rate before use.

use std::path::Path;

use midspread_core::{is_settlement_asset, Price, Size};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde_json::Value;
use tracing::{debug, info};

use crate::error::{QuoteError, QuoteResult};

/// Allowed gap between distribution total and configured volume.
pub const VOLUME_TOLERANCE: Decimal = dec!(0.001);

/// Upper-bound slack when matching resting order volumes to a band.
pub const BAND_EPSILON: Decimal = dec!(0.000000001);

const VOLUME_DISTORTION_KEY: &str = "volume_distortion";
const BP_DISTORTION_KEY: &str = "bp_distortion";

/// One quoting tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeTier {
    /// Relative offset from the reference price.
    pub displacement: Decimal,
    pub volume: Size,
}

/// How a stack was built.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StackMode {
    Static,
    Distribution,
}

/// Tiers ordered by ascending displacement (shallowest first).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeStack {
    mode: StackMode,
    tiers: Vec<VolumeTier>,
}

impl VolumeStack {
    /// Single tier holding the full configured volume.
    pub fn static_stack(displacement: Decimal, volume: Size) -> Self {
        Self {
            mode: StackMode::Static,
            tiers: vec![VolumeTier {
                displacement,
                volume,
            }],
        }
    }

    fn from_tiers(mode: StackMode, mut tiers: Vec<VolumeTier>) -> Self {
        tiers.sort_by(|a, b| a.displacement.cmp(&b.displacement));
        Self { mode, tiers }
    }

    pub fn mode(&self) -> StackMode {
        self.mode
    }

    pub fn is_static(&self) -> bool {
        self.mode == StackMode::Static
    }

    pub fn tiers(&self) -> &[VolumeTier] {
        &self.tiers
    }

    pub fn len(&self) -> usize {
        self.tiers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tiers.is_empty()
    }

    /// The first `depth` tiers (all of them if the stack is shallower).
    pub fn shallow(&self, depth: usize) -> &[VolumeTier] {
        &self.tiers[..depth.min(self.tiers.len())]
    }

    pub fn total_volume(&self) -> Size {
        self.tiers.iter().map(|t| t.volume).sum()
    }

    /// Re-key the single static tier to a new displacement.
    ///
    /// Returns `false` and leaves the stack untouched for distribution stacks.
    pub fn set_static_displacement(&mut self, displacement: Decimal) -> bool {
        if self.mode != StackMode::Static {
            return false;
        }
        for tier in &mut self.tiers {
            tier.displacement = displacement;
        }
        true
    }
}

/// Smallest tier volume in a dispatched slice.
pub fn min_volume(tiers: &[VolumeTier]) -> Option<Size> {
    tiers.iter().map(|t| t.volume).min()
}

/// Parsed distribution file, validated but not yet scaled.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VolumeDistribution {
    volume_distortion: Decimal,
    bp_distortion: Decimal,
    tiers: Vec<VolumeTier>,
}

impl VolumeDistribution {
    /// Read and validate a distribution file.
    pub fn load(path: impl AsRef<Path>, expected_total: Size) -> QuoteResult<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)?;
        info!(path = %path.display(), "Loading volume distribution");
        Self::parse(&content, expected_total)
    }

    /// Parse a distribution document.
    ///
    /// # Errors
    /// - `InvalidDistribution` for malformed entries or missing distortion keys
    /// - `StackVolumeMismatch` if raw volumes do not sum to `expected_total`
    ///   within [`VOLUME_TOLERANCE`]
    pub fn parse(content: &str, expected_total: Size) -> QuoteResult<Self> {
        let doc: Value = serde_json::from_str(content)?;
        let Value::Object(entries) = doc else {
            return Err(QuoteError::InvalidDistribution(
                "top level must be an object".to_string(),
            ));
        };

        let mut volume_distortion = None;
        let mut bp_distortion = None;
        let mut tiers = Vec::with_capacity(entries.len());

        for (key, value) in &entries {
            if key.starts_with('_') {
                continue;
            }
            let number = json_decimal(value).ok_or_else(|| {
                QuoteError::InvalidDistribution(format!("'{key}' is not a number"))
            })?;

            match key.as_str() {
                VOLUME_DISTORTION_KEY => volume_distortion = Some(number),
                BP_DISTORTION_KEY => bp_distortion = Some(number),
                _ => {
                    let displacement = parse_decimal(key).ok_or_else(|| {
                        QuoteError::InvalidDistribution(format!(
                            "displacement key '{key}' is not a number"
                        ))
                    })?;
                    if displacement.is_sign_negative() || number <= Decimal::ZERO {
                        return Err(QuoteError::InvalidDistribution(format!(
                            "tier {key} => {number} must have displacement >= 0 and volume > 0"
                        )));
                    }
                    tiers.push(VolumeTier {
                        displacement,
                        volume: Size::new(number),
                    });
                }
            }
        }

        let volume_distortion = volume_distortion.ok_or_else(|| {
            QuoteError::InvalidDistribution(format!("missing '{VOLUME_DISTORTION_KEY}'"))
        })?;
        let bp_distortion = bp_distortion.ok_or_else(|| {
            QuoteError::InvalidDistribution(format!("missing '{BP_DISTORTION_KEY}'"))
        })?;
        if tiers.is_empty() {
            return Err(QuoteError::InvalidDistribution("no tiers".to_string()));
        }
        if volume_distortion <= Decimal::ZERO || bp_distortion.is_sign_negative() {
            return Err(QuoteError::InvalidDistribution(format!(
                "distortions out of range: volume={volume_distortion} bp={bp_distortion}"
            )));
        }

        let actual: Size = tiers.iter().map(|t| t.volume).sum();
        if (actual.inner() - expected_total.inner()).abs() > VOLUME_TOLERANCE {
            return Err(QuoteError::StackVolumeMismatch {
                expected: expected_total.inner(),
                actual: actual.inner(),
            });
        }

        debug!(
            tiers = tiers.len(),
            total = %actual,
            volume_distortion = %volume_distortion,
            bp_distortion = %bp_distortion,
            "Volume distribution validated"
        );

        Ok(Self {
            volume_distortion,
            bp_distortion,
            tiers,
        })
    }

    /// Apply distortions and the settlement-unit conversion factor.
    pub fn build(&self, conversion: Decimal) -> VolumeStack {
        let tiers = self
            .tiers
            .iter()
            .map(|t| VolumeTier {
                displacement: t.displacement * self.bp_distortion,
                volume: t.volume * self.volume_distortion * conversion,
            })
            .collect();
        VolumeStack::from_tiers(StackMode::Distribution, tiers)
    }
}

fn parse_decimal(s: &str) -> Option<Decimal> {
    let s = s.trim();
    s.parse::<Decimal>()
        .ok()
        .or_else(|| Decimal::from_scientific(s).ok())
}

fn json_decimal(value: &Value) -> Option<Decimal> {
    match value {
        Value::Number(n) => parse_decimal(&n.to_string()),
        Value::String(s) => parse_decimal(s),
        _ => None,
    }
}

/// Which leg of the cross pair holds the settlement unit.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CrossLeg {
    /// Pair is `XBT/<asset>`: volume converts by multiplying with the mid.
    Base,
    /// Pair is `<asset>/XBT`: volume converts by dividing by the mid.
    Quote,
}

/// Pair used to convert settlement-unit volume into a traded asset.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CrossPair {
    pub symbol: &'static str,
    pub leg: CrossLeg,
}

impl CrossPair {
    /// Conversion factor given the cross pair's mid price.
    pub fn conversion(&self, mid: Price) -> QuoteResult<Decimal> {
        if !mid.is_positive() {
            return Err(QuoteError::InvalidDistribution(format!(
                "cross-rate mid for {} is not positive: {mid}",
                self.symbol
            )));
        }
        Ok(match self.leg {
            CrossLeg::Base => mid.inner(),
            CrossLeg::Quote => Decimal::ONE / mid.inner(),
        })
    }
}

/// Cross pair for `asset`, or `None` when it is the settlement unit.
///
/// # Errors
/// `UnknownMarket` for assets missing from the lookup table.
pub fn cross_pair(asset: &str) -> QuoteResult<Option<CrossPair>> {
    use CrossLeg::{Base, Quote};

    let (symbol, leg) = match asset {
        a if is_settlement_asset(a) => return Ok(None),
        "DASH" => ("DASHXBT", Quote),
        "USD" | "ZUSD" => ("XXBTZUSD", Base),
        "EUR" | "ZEUR" => ("XXBTZEUR", Base),
        "EOS" => ("EOSXBT", Quote),
        "ETH" | "XETH" => ("XETHXXBT", Quote),
        "BCH" => ("BCHXBT", Quote),
        "XETC" => ("XETCXXBT", Quote),
        "XLTC" => ("XLTCXXBT", Quote),
        "XXLM" => ("XXLMXXBT", Quote),
        "XXMR" => ("XXMRXXBT", Quote),
        "XZEC" => ("XZECXXBT", Quote),
        other => return Err(QuoteError::UnknownMarket(other.to_string())),
    };
    Ok(Some(CrossPair { symbol, leg }))
}

/// Half-open volume range `(lower, upper]` owned by one tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct VolumeBand {
    lower: Decimal,
    upper: Decimal,
}

impl VolumeBand {
    pub fn lower(&self) -> Decimal {
        self.lower
    }

    pub fn upper(&self) -> Decimal {
        self.upper
    }

    pub fn is_empty(&self) -> bool {
        self.upper <= self.lower
    }

    pub fn contains(&self, volume: Size) -> bool {
        let v = volume.inner();
        v > self.lower && v <= self.upper
    }
}

/// Bands for `tiers`, one per tier, pairwise disjoint.
///
/// Each band starts where the widest preceding band ended and reaches up
/// to its tier volume plus [`BAND_EPSILON`]. A tier whose volume does not
/// exceed an earlier one gets an empty band.
pub fn volume_bands(tiers: &[VolumeTier]) -> Vec<VolumeBand> {
    let mut floor = Decimal::ZERO;
    tiers
        .iter()
        .map(|tier| {
            let upper = (tier.volume.inner() + BAND_EPSILON).max(floor);
            let band = VolumeBand {
                lower: floor,
                upper,
            };
            floor = upper;
            band
        })
        .collect()
}
