//! Named features attached to detection reports and tracks.
//!
//! A feature is compared against a feature of the same name to produce a grade
//! in [0, 1], and fused with it when a report is applied to a track. Dispatch
//! is on the pair of kinds; mixing kinds grades 0 and fuses to nothing.

use serde::{Deserialize, Serialize};

pub const COLOR: &str = "Color";
pub const PLATE: &str = "Plate";

/// Norm of (255, 255, 255): the largest possible RGB distance.
const RGB_MAX_DIST: f64 = 441.672_955_930_063_7;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Feature {
    /// Dominant body colour, channels in [0, 255]
    Color { r: f64, g: f64, b: f64 },
    /// Licence plate as read by the sensor
    Plate { text: String },
}

impl Feature {
    pub fn color(r: f64, g: f64, b: f64) -> Self {
        Feature::Color { r, g, b }
    }

    pub fn plate(text: impl Into<String>) -> Self {
        Feature::Plate { text: text.into() }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Feature::Color { .. } => COLOR,
            Feature::Plate { .. } => PLATE,
        }
    }

    /// Similarity grade in [0, 1].
    pub fn compare(&self, other: &Feature) -> f64 {
        match (self, other) {
            (
                Feature::Color { r, g, b },
                Feature::Color {
                    r: r2,
                    g: g2,
                    b: b2,
                },
            ) => {
                let d = ((r - r2).powi(2) + (g - g2).powi(2) + (b - b2).powi(2)).sqrt();
                (1.0 - d / RGB_MAX_DIST).clamp(0.0, 1.0)
            }
            (Feature::Plate { text: a }, Feature::Plate { text: b }) => plate_agreement(a, b),
            _ => 0.0,
        }
    }

    /// Combine with a newer observation of the same feature.
    pub fn fuse(&self, other: &Feature) -> Option<Feature> {
        match (self, other) {
            (
                Feature::Color { r, g, b },
                Feature::Color {
                    r: r2,
                    g: g2,
                    b: b2,
                },
            ) => Some(Feature::Color {
                r: (r + r2) / 2.0,
                g: (g + g2) / 2.0,
                b: (b + b2) / 2.0,
            }),
            (Feature::Plate { .. }, Feature::Plate { .. }) => Some(other.clone()),
            _ => None,
        }
    }
}

fn plate_agreement(a: &str, b: &str) -> f64 {
    let a: Vec<char> = a.chars().flat_map(char::to_lowercase).collect();
    let b: Vec<char> = b.chars().flat_map(char::to_lowercase).collect();
    let longest = a.len().max(b.len());
    if longest == 0 {
        return 0.0;
    }
    let same = a.iter().zip(&b).filter(|(x, y)| x == y).count();
    same as f64 / longest as f64
}

// ---------------------------------------------------------------------------
// FeatureSet
// ---------------------------------------------------------------------------

/// Features keyed by name; at most one feature per name.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FeatureSet(Vec<Feature>);

impl FeatureSet {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Option<&Feature> {
        self.0.iter().find(|f| f.name() == name)
    }

    pub fn iter(&self) -> impl Iterator<Item = &Feature> {
        self.0.iter()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Insert a feature, fusing it with an existing one of the same name.
    pub fn merge(&mut self, feature: &Feature) {
        match self.0.iter_mut().find(|f| f.name() == feature.name()) {
            Some(existing) => {
                if let Some(fused) = existing.fuse(feature) {
                    *existing = fused;
                }
            }
            None => self.0.push(feature.clone()),
        }
    }

    pub fn merge_all(&mut self, other: &FeatureSet) {
        for f in other.iter() {
            self.merge(f);
        }
    }
}

impl FromIterator<Feature> for FeatureSet {
    fn from_iter<I: IntoIterator<Item = Feature>>(iter: I) -> Self {
        let mut set = FeatureSet::new();
        for f in iter {
            set.merge(&f);
        }
        set
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;

    #[test]
    fn color_compare_bounds() {
        let black = Feature::color(0.0, 0.0, 0.0);
        let white = Feature::color(255.0, 255.0, 255.0);
        assert_abs_diff_eq!(black.compare(&black), 1.0, epsilon = 1e-12);
        assert_abs_diff_eq!(black.compare(&white), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn color_fuse_is_mean() {
        let a = Feature::color(10.0, 20.0, 30.0);
        let b = Feature::color(30.0, 40.0, 50.0);
        assert_eq!(a.fuse(&b), Some(Feature::color(20.0, 30.0, 40.0)));
    }

    #[test]
    fn plate_compare_case_insensitive() {
        let a = Feature::plate("AB123");
        let b = Feature::plate("ab124");
        assert_abs_diff_eq!(a.compare(&b), 0.8, epsilon = 1e-12);
        // divided by the longer plate
        assert_abs_diff_eq!(
            Feature::plate("AB").compare(&Feature::plate("AB12")),
            0.5,
            epsilon = 1e-12
        );
        assert_eq!(Feature::plate("").compare(&Feature::plate("")), 0.0);
    }

    #[test]
    fn plate_fuse_keeps_newer() {
        let old = Feature::plate("XY1");
        let new = Feature::plate("XY7");
        assert_eq!(old.fuse(&new), Some(new.clone()));
    }

    #[test]
    fn mixed_kinds() {
        let c = Feature::color(1.0, 2.0, 3.0);
        let p = Feature::plate("A");
        assert_eq!(c.compare(&p), 0.0);
        assert_eq!(p.fuse(&c), None);
    }

    #[test]
    fn set_is_unique_by_name() {
        let set: FeatureSet = vec![
            Feature::color(0.0, 0.0, 0.0),
            Feature::plate("A1"),
            Feature::color(100.0, 100.0, 100.0),
        ]
        .into_iter()
        .collect();
        assert_eq!(set.len(), 2);
        assert_eq!(set.get(COLOR), Some(&Feature::color(50.0, 50.0, 50.0)));
        assert!(set.get("Shape").is_none());
    }

    #[test]
    fn serde_tagged() {
        let json = serde_json::to_string(&Feature::plate("K9")).unwrap();
        assert_eq!(json, r#"{"kind":"plate","text":"K9"}"#);
    }
}
