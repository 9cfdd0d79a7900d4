//! Region catalog
//!
//! Convex polytopes of the (x, z) plane that a contact point may occupy.
//! A region with friction coefficient μ > 0 is a surface the foot can push
//! on; μ = 0 marks free space, where the contact force must vanish.
//!
//! Regions are immutable once added and are referred to by [`RegionId`],
//! their position in the catalog.

use hopper_core::model::{Constraint, Expr};
use hopper_core::Vec2;
use nalgebra::{DMatrix, DVector};
use serde::{Deserialize, Serialize};

use crate::config::ConfigError;

/// Index of a region in its catalog
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct RegionId(pub usize);

/// Convex polytope `A p ≤ b`, optionally intersected with `A_eq p = b_eq`
#[derive(Debug, Clone, PartialEq)]
pub struct Region {
    label: String,
    a: DMatrix<f64>,
    b: DVector<f64>,
    a_eq: Option<DMatrix<f64>>,
    b_eq: Option<DVector<f64>>,
    normal: Vec2,
    mu: f64,
}

impl Region {
    /// Free-space region from inequality rows
    pub fn new(label: impl Into<String>, a: DMatrix<f64>, b: DVector<f64>) -> Result<Self, ConfigError> {
        let label = label.into();
        check_system(&label, &a, &b)?;
        Ok(Self {
            label,
            a,
            b,
            a_eq: None,
            b_eq: None,
            normal: Vec2::zeros(),
            mu: 0.0,
        })
    }

    /// Add an equality sub-system
    pub fn with_equality(mut self, a_eq: DMatrix<f64>, b_eq: DVector<f64>) -> Result<Self, ConfigError> {
        check_system(&self.label, &a_eq, &b_eq)?;
        self.a_eq = Some(a_eq);
        self.b_eq = Some(b_eq);
        Ok(self)
    }

    /// Make the region a frictional contact surface
    pub fn with_contact(mut self, normal: Vec2, mu: f64) -> Result<Self, ConfigError> {
        if !(mu.is_finite() && mu >= 0.0) {
            return Err(self.invalid(format!("friction coefficient {mu} must be finite and >= 0")));
        }
        let length = normal.norm();
        if mu > 0.0 && !(length.is_finite() && length > 0.0) {
            return Err(self.invalid("a contact region needs a non-zero normal".to_string()));
        }
        self.normal = if length > 0.0 { normal / length } else { normal };
        self.mu = mu;
        Ok(self)
    }

    fn invalid(&self, reason: String) -> ConfigError {
        ConfigError::InvalidRegion {
            region: self.label.clone(),
            reason,
        }
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Unit contact normal (zero for free space)
    pub fn normal(&self) -> Vec2 {
        self.normal
    }

    pub fn mu(&self) -> f64 {
        self.mu
    }

    /// Whether the foot can push on this region
    pub fn is_contact(&self) -> bool {
        self.mu > 0.0
    }

    /// Every row as `(a, b)` with `a · p ≤ b`; equalities appear as two
    /// opposing inequalities
    pub fn rows(&self) -> Vec<(Vec2, f64)> {
        let mut rows = inequality_rows(&self.a, &self.b);
        if let (Some(a_eq), Some(b_eq)) = (&self.a_eq, &self.b_eq) {
            for (a, b) in inequality_rows(a_eq, b_eq) {
                rows.push((a, b));
                rows.push((-a, -b));
            }
        }
        rows
    }

    /// Inequality rows pulled inward by `radius`, for placing a disc of that
    /// radius inside the region
    pub fn shrunk_rows(&self, radius: f64) -> Vec<(Vec2, f64)> {
        inequality_rows(&self.a, &self.b)
            .into_iter()
            .map(|(a, b)| (a, b - radius * a.norm()))
            .collect()
    }

    pub fn contains(&self, point: &Vec2, tolerance: f64) -> bool {
        self.rows().iter().all(|(a, b)| a.dot(point) <= b + tolerance)
    }

    /// One constraint per row applied to the point `(x, z)`
    pub fn containment(&self, name: &str, x: &Expr, z: &Expr) -> Vec<Constraint> {
        row_constraints(name, &self.rows(), x, z)
    }

    /// [`Region::containment`] over [`Region::shrunk_rows`]
    pub fn clearance(&self, name: &str, radius: f64, x: &Expr, z: &Expr) -> Vec<Constraint> {
        row_constraints(name, &self.shrunk_rows(radius), x, z)
    }
}

fn check_system(label: &str, a: &DMatrix<f64>, b: &DVector<f64>) -> Result<(), ConfigError> {
    if a.nrows() != b.len() {
        return Err(ConfigError::RegionDimension {
            region: label.to_string(),
            rows: a.nrows(),
            rhs: b.len(),
        });
    }
    if a.ncols() != 2 {
        return Err(ConfigError::InvalidRegion {
            region: label.to_string(),
            reason: format!("rows must have 2 columns (x, z), got {}", a.ncols()),
        });
    }
    if a.iter().chain(b.iter()).any(|v| !v.is_finite()) {
        return Err(ConfigError::InvalidRegion {
            region: label.to_string(),
            reason: "coefficients must be finite".to_string(),
        });
    }
    Ok(())
}

fn inequality_rows(a: &DMatrix<f64>, b: &DVector<f64>) -> Vec<(Vec2, f64)> {
    a.row_iter()
        .zip(b.iter())
        .map(|(row, &rhs)| (Vec2::new(row[0], row[1]), rhs))
        .collect()
}

fn row_constraints(name: &str, rows: &[(Vec2, f64)], x: &Expr, z: &Expr) -> Vec<Constraint> {
    rows.iter()
        .enumerate()
        .map(|(i, (a, b))| {
            let expr = x.clone().scaled(a.x) + z.clone().scaled(a.y);
            Constraint::le(format!("{name}[{i}]"), expr, *b)
        })
        .collect()
}

/// Sides of an axis-aligned free-space block; absent sides are unbounded
#[derive(Debug, Clone, Copy, Default, PartialEq)]
pub struct FreeBlock {
    pub left: Option<f64>,
    pub right: Option<f64>,
    pub top: Option<f64>,
    pub bottom: Option<f64>,
}

/// Ordered collection of regions
#[derive(Debug, Clone, Default)]
pub struct RegionCatalog {
    regions: Vec<Region>,
}

impl RegionCatalog {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, region: Region) -> RegionId {
        self.regions.push(region);
        RegionId(self.regions.len() - 1)
    }

    /// Horizontal contact surface `x ∈ [start, end]`, `z = height`
    pub fn add_platform(&mut self, start: f64, end: f64, height: f64, mu: f64) -> Result<RegionId, ConfigError> {
        let label = format!("platform{}", self.regions.len());
        if start > end {
            return Err(ConfigError::InvalidRegion {
                region: label,
                reason: format!("platform start {start} lies beyond its end {end}"),
            });
        }
        let region = Region::new(
            label,
            DMatrix::from_row_slice(2, 2, &[-1.0, 0.0, 1.0, 0.0]),
            DVector::from_vec(vec![-start, end]),
        )?
        .with_equality(
            DMatrix::from_row_slice(1, 2, &[0.0, 1.0]),
            DVector::from_vec(vec![height]),
        )?
        .with_contact(Vec2::new(0.0, 1.0), mu)?;
        Ok(self.add(region))
    }

    /// Free-space block bounded by the given sides
    pub fn add_free_block(&mut self, block: FreeBlock) -> Result<RegionId, ConfigError> {
        let sides = [
            (block.left, [-1.0, 0.0], -1.0),
            (block.right, [1.0, 0.0], 1.0),
            (block.top, [0.0, 1.0], 1.0),
            (block.bottom, [0.0, -1.0], -1.0),
        ];
        let mut coefficients = Vec::new();
        let mut rhs = Vec::new();
        for (side, row, sign) in sides {
            if let Some(value) = side {
                coefficients.extend_from_slice(&row);
                rhs.push(sign * value);
            }
        }
        if rhs.is_empty() {
            return Err(ConfigError::EmptyFreeBlock);
        }
        let label = format!("free{}", self.regions.len());
        let a = DMatrix::from_row_slice(rhs.len(), 2, &coefficients);
        let region = Region::new(label, a, DVector::from_vec(rhs))?;
        Ok(self.add(region))
    }

    pub fn get(&self, id: RegionId) -> Option<&Region> {
        self.regions.get(id.0)
    }

    pub fn iter(&self) -> impl Iterator<Item = (RegionId, &Region)> {
        self.regions.iter().enumerate().map(|(i, r)| (RegionId(i), r))
    }

    pub fn len(&self) -> usize {
        self.regions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.regions.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_platform_rows() {
        let mut catalog = RegionCatalog::new();
        let id = catalog.add_platform(0.0, 2.0, 0.0, 0.5).unwrap();
        let platform = catalog.get(id).unwrap();

        assert!(platform.is_contact());
        assert_eq!(platform.normal(), Vec2::new(0.0, 1.0));
        // two inequalities plus the equality split in two
        assert_eq!(platform.rows().len(), 4);
        assert!(platform.contains(&Vec2::new(1.0, 0.0), 1e-9));
        assert!(!platform.contains(&Vec2::new(1.0, 0.1), 1e-9));
        assert!(!platform.contains(&Vec2::new(2.5, 0.0), 1e-9));
    }

    #[test]
    fn test_free_block() {
        let mut catalog = RegionCatalog::new();
        let id = catalog
            .add_free_block(FreeBlock {
                bottom: Some(0.0),
                ..FreeBlock::default()
            })
            .unwrap();
        let free = catalog.get(id).unwrap();
        assert!(!free.is_contact());
        assert_eq!(free.rows().len(), 1);
        assert!(free.contains(&Vec2::new(-100.0, 0.5), 0.0));
        assert!(!free.contains(&Vec2::new(0.0, -0.5), 0.0));

        assert_eq!(
            catalog.add_free_block(FreeBlock::default()),
            Err(ConfigError::EmptyFreeBlock)
        );
    }

    #[test]
    fn test_dimension_mismatch_is_rejected() {
        let err = Region::new(
            "bad",
            DMatrix::from_row_slice(2, 2, &[1.0, 0.0, 0.0, 1.0]),
            DVector::from_vec(vec![1.0]),
        )
        .unwrap_err();
        assert_eq!(
            err,
            ConfigError::RegionDimension {
                region: "bad".to_string(),
                rows: 2,
                rhs: 1
            }
        );
    }

    #[test]
    fn test_contact_needs_normal() {
        let region = Region::new(
            "floor",
            DMatrix::from_row_slice(1, 2, &[0.0, -1.0]),
            DVector::from_vec(vec![0.0]),
        )
        .unwrap();
        assert!(region.clone().with_contact(Vec2::zeros(), 0.5).is_err());
        assert!(region.clone().with_contact(Vec2::new(0.0, 1.0), -0.1).is_err());
        let scaled = region.with_contact(Vec2::new(0.0, 3.0), 0.5).unwrap();
        assert_eq!(scaled.normal(), Vec2::new(0.0, 1.0));
    }

    #[test]
    fn test_shrunk_rows_keep_clearance() {
        let mut catalog = RegionCatalog::new();
        let id = catalog
            .add_free_block(FreeBlock {
                bottom: Some(0.0),
                ..FreeBlock::default()
            })
            .unwrap();
        let rows = catalog.get(id).unwrap().shrunk_rows(0.5);
        // -z ≤ -0.5
        assert_eq!(rows, vec![(Vec2::new(0.0, -1.0), -0.5)]);
    }
}
