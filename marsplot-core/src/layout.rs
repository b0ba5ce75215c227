//! Page and overlay grouping
//!
//! Figures are placed on pages while the script is scanned. Outside `HOLD ON`/`HOLD OFF`
//! every figure gets its own page. Inside, each figure takes the next panel and every
//! earlier panel of the page learns the new panel count. `ADD LINE` chains the next figure
//! onto the previous one: same page, same panel, one level deeper.
//!
//! # Examples
//!
//! ```rust
//! use marsplot_core::layout::PanelTracker;
//!
//! let mut tracker = PanelTracker::default();
//! tracker.hold_on(1, None);
//! for line in [2, 3, 4] {
//!     tracker.place(line).unwrap();
//! }
//! tracker.hold_off(5);
//! let placements = tracker.finish().unwrap();
//! assert!(placements.iter().all(|p| p.panel_count == 3));
//! assert_eq!(placements[2].panel_index, 3);
//! ```

use crate::errors::{MarsPlotError, MarsPlotResult};
use serde::{Deserialize, Serialize};

/// Where a figure is drawn.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct Placement {
    /// 0-based page number
    pub page: usize,
    /// 1-based panel position on the page
    pub panel_index: usize,
    pub panel_count: usize,
    /// 0 for a new panel, n for the n-th figure chained onto it
    pub overlay_depth: usize,
    /// Rows and columns forced by `HOLD ON r,c`
    pub grid: Option<(usize, usize)>,
}

impl Default for Placement {
    fn default() -> Self {
        Self {
            page: 0,
            panel_index: 1,
            panel_count: 1,
            overlay_depth: 0,
            grid: None,
        }
    }
}

impl Placement {
    pub fn is_overlay(&self) -> bool {
        self.overlay_depth > 0
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
enum PanelState {
    Idle,
    Holding {
        line: usize,
        page: Option<usize>,
        page_start: usize,
        next_slot: usize,
        grid: Option<(usize, usize)>,
    },
}

/// Assigns placements to figures in script order.
#[derive(Debug, Clone)]
pub struct PanelTracker {
    state: PanelState,
    pending_overlay: Option<usize>,
    placements: Vec<Placement>,
    pages: usize,
}

impl Default for PanelTracker {
    fn default() -> Self {
        Self {
            state: PanelState::Idle,
            pending_overlay: None,
            placements: Vec::new(),
            pages: 0,
        }
    }
}

impl PanelTracker {
    /// Opens a shared page, optionally with a forced `(rows, cols)` layout.
    pub fn hold_on(&mut self, line: usize, grid: Option<(usize, usize)>) {
        if let PanelState::Holding { line: open, .. } = self.state {
            log::warn!(
                "*** Warning *** line {line}: 'HOLD ON' while the page opened on line {open} is still held, starting a new page"
            );
        }
        self.state = PanelState::Holding {
            line,
            page: None,
            page_start: self.placements.len(),
            next_slot: 1,
            grid,
        };
    }

    pub fn hold_off(&mut self, line: usize) {
        if self.state == PanelState::Idle {
            log::warn!("*** Warning *** line {line}: 'HOLD OFF' without 'HOLD ON'");
        }
        self.state = PanelState::Idle;
    }

    /// Marks the next wanted figure as an overlay.
    pub fn add_line(&mut self, line: usize) {
        self.pending_overlay = Some(line);
    }

    /// Consumes a pending overlay marker without placing a figure.
    pub fn skip(&mut self) {
        self.pending_overlay = None;
    }

    /// Places the next wanted figure and returns its position in placement order.
    pub fn place(&mut self, line: usize) -> MarsPlotResult<usize> {
        let overlay = self.pending_overlay.take();
        let index = self.placements.len();

        if let Some(marker) = overlay {
            let on_page = match self.state {
                PanelState::Holding { next_slot, .. } => next_slot > 1,
                PanelState::Idle => true,
            };
            let previous = self
                .placements
                .last()
                .copied()
                .filter(|_| on_page)
                .ok_or(MarsPlotError::OverlayWithoutFigure { line: marker })?;
            self.placements.push(Placement {
                overlay_depth: previous.overlay_depth + 1,
                ..previous
            });
            return Ok(index);
        }

        let placement = match &mut self.state {
            PanelState::Idle => {
                let page = self.pages;
                self.pages += 1;
                Placement {
                    page,
                    ..Placement::default()
                }
            }
            PanelState::Holding {
                page,
                page_start,
                next_slot,
                grid,
                ..
            } => {
                let page = *page.get_or_insert_with(|| {
                    self.pages += 1;
                    self.pages - 1
                });
                let slot = *next_slot;
                *next_slot += 1;
                for earlier in &mut self.placements[*page_start..] {
                    earlier.panel_count = slot;
                }
                Placement {
                    page,
                    panel_index: slot,
                    panel_count: slot,
                    overlay_depth: 0,
                    grid: *grid,
                }
            }
        };
        log::debug!("line {line}: placed figure at {placement:?}");
        self.placements.push(placement);
        Ok(index)
    }

    /// Checks the script ended cleanly and returns every placement.
    pub fn finish(self) -> MarsPlotResult<Vec<Placement>> {
        if let PanelState::Holding { line, .. } = self.state {
            return Err(MarsPlotError::UnclosedHold { line });
        }
        if let Some(line) = self.pending_overlay {
            return Err(MarsPlotError::DanglingOverlay { line });
        }
        Ok(self.placements)
    }
}

/// True when the page is complete after figure `i`: it fills the last panel and the next
/// figure is not chained onto it.
pub fn closes_page(placements: &[Placement], i: usize) -> bool {
    let Some(current) = placements.get(i) else {
        return false;
    };
    let chained = placements.get(i + 1).is_some_and(Placement::is_overlay);
    current.panel_index == current.panel_count && !chained
}

/// Rows and columns used to lay out `panel_count` panels on a landscape page.
///
/// Vertical pages swap the pair.
pub fn page_grid(panel_count: usize, vertical: bool) -> (usize, usize) {
    let (rows, cols) = match panel_count {
        0 | 1 => (1, 1),
        2 => (1, 2),
        3..=4 => (2, 2),
        5..=6 => (2, 3),
        7..=8 => (2, 4),
        9 => (3, 3),
        10..=12 => (3, 4),
        13..=16 => (4, 4),
        17..=20 => (4, 5),
        21..=25 => (5, 5),
        26..=29 => (5, 6),
        30..=35 => (6, 6),
        36..=41 => (7, 6),
        42..=48 => (7, 7),
        49..=55 => (8, 7),
        56..=64 => (8, 8),
        n => {
            let side = (n as f64).sqrt().ceil() as usize;
            (side, side)
        }
    };
    if vertical {
        (cols, rows)
    } else {
        (rows, cols)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn idle_figures_get_their_own_page() {
        let mut tracker = PanelTracker::default();
        tracker.place(1).unwrap();
        tracker.place(2).unwrap();
        let placements = tracker.finish().unwrap();
        assert_eq!(placements[0].page, 0);
        assert_eq!(placements[1].page, 1);
        assert!(placements.iter().all(|p| p.panel_index == 1 && p.panel_count == 1));
    }

    #[test]
    fn held_page_counts_are_retroactive() {
        let mut tracker = PanelTracker::default();
        tracker.hold_on(1, Some((1, 3)));
        tracker.place(2).unwrap();
        tracker.place(3).unwrap();
        tracker.place(4).unwrap();
        tracker.hold_off(5);
        tracker.place(6).unwrap();
        let placements = tracker.finish().unwrap();
        let indices: Vec<usize> = placements[..3].iter().map(|p| p.panel_index).collect();
        assert_eq!(indices, vec![1, 2, 3]);
        assert!(placements[..3].iter().all(|p| p.panel_count == 3));
        assert!(placements[..3].iter().all(|p| p.grid == Some((1, 3))));
        assert_eq!(placements[3].page, 1);
        assert_eq!(placements[3].panel_count, 1);
    }

    #[test]
    fn overlay_shares_previous_slot() {
        let mut tracker = PanelTracker::default();
        tracker.hold_on(1, None);
        tracker.place(2).unwrap();
        tracker.add_line(3);
        tracker.place(4).unwrap();
        tracker.add_line(5);
        tracker.place(6).unwrap();
        tracker.place(7).unwrap();
        tracker.hold_off(8);
        let placements = tracker.finish().unwrap();
        assert_eq!(placements[1].panel_index, 1);
        assert_eq!(placements[1].overlay_depth, 1);
        assert_eq!(placements[2].overlay_depth, 2);
        assert_eq!(placements[3].panel_index, 2);
        assert_eq!(placements[3].overlay_depth, 0);
        // Overlays placed before the second panel see the final count too
        assert!(placements.iter().all(|p| p.panel_count == 2));
    }

    #[test]
    fn overlay_outside_hold_chains_onto_previous_page() {
        let mut tracker = PanelTracker::default();
        tracker.place(1).unwrap();
        tracker.add_line(2);
        tracker.place(3).unwrap();
        let placements = tracker.finish().unwrap();
        assert_eq!(placements[1].page, 0);
        assert!(placements[1].is_overlay());
    }

    #[test]
    fn unwanted_block_consumes_overlay_marker() {
        let mut tracker = PanelTracker::default();
        tracker.place(1).unwrap();
        tracker.add_line(2);
        tracker.skip();
        tracker.place(4).unwrap();
        let placements = tracker.finish().unwrap();
        assert!(!placements[1].is_overlay());
    }

    #[test]
    fn unclosed_hold_is_fatal() {
        let mut tracker = PanelTracker::default();
        tracker.hold_on(7, None);
        tracker.place(8).unwrap();
        assert!(matches!(
            tracker.finish(),
            Err(MarsPlotError::UnclosedHold { line: 7 })
        ));
    }

    #[test]
    fn dangling_overlay_is_fatal() {
        let mut tracker = PanelTracker::default();
        tracker.place(1).unwrap();
        tracker.add_line(9);
        assert!(matches!(
            tracker.finish(),
            Err(MarsPlotError::DanglingOverlay { line: 9 })
        ));
    }

    #[test]
    fn overlay_needs_a_figure_on_the_page() {
        let mut tracker = PanelTracker::default();
        tracker.add_line(1);
        assert!(tracker.place(2).is_err());

        let mut tracker = PanelTracker::default();
        tracker.place(1).unwrap();
        tracker.hold_on(2, None);
        tracker.add_line(3);
        assert!(matches!(
            tracker.place(4),
            Err(MarsPlotError::OverlayWithoutFigure { line: 3 })
        ));
    }

    #[test]
    fn deferred_save_waits_for_overlay_chain() {
        let mut tracker = PanelTracker::default();
        tracker.place(1).unwrap();
        tracker.add_line(2);
        tracker.place(3).unwrap();
        tracker.hold_on(4, None);
        tracker.place(5).unwrap();
        tracker.place(6).unwrap();
        tracker.hold_off(7);
        let placements = tracker.finish().unwrap();
        let closing: Vec<bool> = (0..placements.len())
            .map(|i| closes_page(&placements, i))
            .collect();
        assert_eq!(closing, vec![false, true, false, true]);
    }

    #[test]
    fn grids() {
        assert_eq!(page_grid(1, false), (1, 1));
        assert_eq!(page_grid(2, false), (1, 2));
        assert_eq!(page_grid(2, true), (2, 1));
        assert_eq!(page_grid(5, false), (2, 3));
        assert_eq!(page_grid(9, false), (3, 3));
        assert_eq!(page_grid(12, false), (3, 4));
        assert_eq!(page_grid(30, false), (6, 6));
        assert_eq!(page_grid(64, false), (8, 8));
        assert_eq!(page_grid(70, false), (9, 9));
    }
}
