//! Stamp planning.
//!
//! A [`StampPlan`] fixes where verification tokens land on every page of
//! one document: four mandatory corner positions at constant offsets,
//! plus an optional fifth position when the caller supplies explicit
//! coordinates. The plan is built once per input file and shared by both
//! compositor strategies, so placement parity between them is
//! structural, not coincidental.
//!
//! Coordinates are in page space (origin bottom-left, points) on an
//! assumed A4 page; the offsets keep the full token footprint inside the
//! page boundary.

mod compositor;
pub mod token;

pub use compositor::{StampedDocument, compose_protected, compose_unprotected};
pub use token::{TokenMinter, TokenRef};

use crate::error::Result;

/// Page margin for the corner positions, in points.
pub const CORNER_MARGIN: f64 = 5.0;
/// X offset of the right-hand column of positions.
pub const RIGHT_COLUMN: f64 = 520.0;
/// Y offset of the upper row of positions.
pub const UPPER_ROW: f64 = 770.0;

/// Side length of a token's square footprint, in points.
pub const TOKEN_FOOTPRINT: f64 = 75.0;
/// Side length of the badge icon centered inside each token, in points.
pub const BADGE_SIZE: f64 = 15.0;

/// Offset of the badge inside the token footprint (both axes).
pub const BADGE_INSET: f64 = (TOKEN_FOOTPRINT - BADGE_SIZE) / 2.0;

/// One overlay location with the token that will be drawn there.
#[derive(Debug, Clone)]
pub struct StampPosition {
    /// X coordinate in page space (points)
    pub x: f64,
    /// Y coordinate in page space (points)
    pub y: f64,
    /// The token drawn at this position
    pub token: TokenRef,
}

/// The fixed constellation of stamp positions for one document.
///
/// Invariant: constructed once per input file and reused unmodified
/// across every page, so all pages carry identical placement.
#[derive(Debug, Clone)]
pub struct StampPlan {
    /// Corner position at (5, 5)
    pub top_left: StampPosition,
    /// Corner position at (520, 5)
    pub top_right: StampPosition,
    /// Corner position at (5, 770)
    pub bottom_left: StampPosition,
    /// Corner position at (520, 770)
    pub bottom_right: StampPosition,
    /// Optional caller-supplied fifth position
    pub custom: Option<StampPosition>,
}

impl StampPlan {
    /// Build the plan, minting one fresh token per position.
    ///
    /// Exactly four tokens are minted, five when `custom` coordinates
    /// are supplied; a plan never mints more tokens than positions.
    pub fn generate(minter: &TokenMinter, custom: Option<(f64, f64)>) -> Result<Self> {
        let at = |x: f64, y: f64| -> Result<StampPosition> {
            Ok(StampPosition {
                x,
                y,
                token: minter.mint()?,
            })
        };

        let custom = match custom {
            Some((x, y)) => Some(at(x, y)?),
            None => None,
        };

        Ok(Self {
            top_left: at(CORNER_MARGIN, CORNER_MARGIN)?,
            top_right: at(RIGHT_COLUMN, CORNER_MARGIN)?,
            bottom_left: at(CORNER_MARGIN, UPPER_ROW)?,
            bottom_right: at(RIGHT_COLUMN, UPPER_ROW)?,
            custom,
        })
    }

    /// Every position of the plan, in drawing order. The custom slot
    /// appears only when it exists.
    pub fn positions(&self) -> Vec<&StampPosition> {
        let mut positions = vec![
            &self.top_left,
            &self.top_right,
            &self.bottom_left,
            &self.bottom_right,
        ];
        if let Some(custom) = &self.custom {
            positions.push(custom);
        }
        positions
    }

    /// The tokens minted for this plan.
    pub fn tokens(&self) -> Vec<&TokenRef> {
        self.positions().into_iter().map(|p| &p.token).collect()
    }
}
