//! Normalisation curves shared by the score variants.

use crate::normalize::leading_number;

/// RAM tiers in GB -> score; exact at every breakpoint.
pub const RAM_TIERS: [(f64, f64); 5] = [(0.0, 0.0), (2.0, 30.0), (4.0, 50.0), (6.0, 70.0), (8.0, 85.0)];
/// Free storage percentage tiers -> score.
pub const FREE_STORAGE_TIERS: [(f64, f64); 4] = [(0.0, 0.0), (20.0, 40.0), (40.0, 70.0), (60.0, 90.0)];

const RAM_CEILING_BONUS: f64 = 15.0;
const RAM_CEILING_SPAN_GB: f64 = 4.0;
const STORAGE_CEILING_BONUS: f64 = 10.0;
const STORAGE_CEILING_SPAN: f64 = 40.0;

pub fn clamp_score(v: f64) -> f64 {
    if v.is_nan() {
        return 0.0;
    }
    v.clamp(0.0, 100.0)
}

/// Linear interpolation through `points` (sorted by x). Flat beyond both ends.
pub fn piecewise(x: f64, points: &[(f64, f64)]) -> f64 {
    let Some(&(x0, y0)) = points.first() else {
        return 0.0;
    };
    if x <= x0 {
        return y0;
    }
    for w in points.windows(2) {
        let (xa, ya) = w[0];
        let (xb, yb) = w[1];
        if x <= xb {
            return ya + (x - xa) / (xb - xa) * (yb - ya);
        }
    }
    points[points.len() - 1].1
}

/// Tiered RAM score with a soft ceiling above 8 GB.
pub fn ram_tier_score(ram_gb: f64) -> f64 {
    let base = piecewise(ram_gb, &RAM_TIERS);
    let last = RAM_TIERS[RAM_TIERS.len() - 1].0;
    let bonus = if ram_gb > last {
        RAM_CEILING_BONUS * ((ram_gb - last) / RAM_CEILING_SPAN_GB).min(1.0)
    } else {
        0.0
    };
    clamp_score(base + bonus)
}

/// Tiered free-storage score with a soft ceiling above 60% free.
pub fn free_storage_tier_score(free_pct: f64) -> f64 {
    let base = piecewise(free_pct, &FREE_STORAGE_TIERS);
    let last = FREE_STORAGE_TIERS[FREE_STORAGE_TIERS.len() - 1].0;
    let bonus = if free_pct > last {
        STORAGE_CEILING_BONUS * ((free_pct - last) / STORAGE_CEILING_SPAN).min(1.0)
    } else {
        0.0
    };
    clamp_score(base + bonus)
}

/// Deficit curve anchored at `reference_mah`: below the reference penalises,
/// above it never rewards.
pub fn capacity_score(capacity_mah: u32, reference_mah: u32) -> f64 {
    let reference = f64::from(reference_mah.max(1));
    let deficit = ((reference - f64::from(capacity_mah)) / reference * 100.0).max(0.0);
    clamp_score(100.0 - deficit)
}

/// Operating system family guessed from a free-text version string.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OsFamily {
    Android,
    Ios,
}

/// Leading version number and the family it belongs to.
///
/// Anything mentioning "android" with a version below 20 is Android; the rest
/// (including bare numbers of 20 and above) is read on the iOS scale.
pub fn parse_os_version(text: &str) -> Option<(OsFamily, f64)> {
    let v = leading_number(text)?;
    let android = text.to_ascii_lowercase().contains("android") && v < 20.0;
    Some((if android { OsFamily::Android } else { OsFamily::Ios }, v))
}

/// Android 8..14 -> 0..100, iOS 12..17 -> 0..100.
pub fn os_recency_score(family: OsFamily, version: f64) -> f64 {
    match family {
        OsFamily::Android => clamp_score((version - 8.0) / 6.0 * 100.0),
        OsFamily::Ios => clamp_score((version - 12.0) / 5.0 * 100.0),
    }
}

/// Android release for a given API level, for the levels the app supports.
pub fn android_release_for_api(api: u32) -> Option<u32> {
    match api {
        26 | 27 => Some(8),
        28 => Some(9),
        29 => Some(10),
        30 => Some(11),
        31 | 32 => Some(12),
        33 => Some(13),
        34 => Some(14),
        35 => Some(15),
        _ => None,
    }
}
