/// Paging policy
///
/// The grid only ever shows a `Viewport` (a half-open row range). Rows are
/// fetched in a larger `FetchWindow` so small scrolls are served from rows that
/// are already loaded. A `PagingPolicy` decides how big that window is, clamps
/// viewports into the row count of a freshly compiled query, and tests whether
/// a window still covers a viewport.
///
/// All three operations must be pure.

use serde::{Deserialize, Serialize};

/// Visible row range `[top, bottom)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
pub struct Viewport {
    pub top: usize,
    pub bottom: usize,
}

impl Viewport {
    /// Creates a viewport. A `bottom` above `top` is raised to `top`.
    pub fn new(top: usize, bottom: usize) -> Self {
        Viewport {
            top,
            bottom: bottom.max(top),
        }
    }

    /// Number of visible rows
    pub fn span(&self) -> usize {
        self.bottom.saturating_sub(self.top)
    }

    pub fn is_empty(&self) -> bool {
        self.span() == 0
    }
}

/// Rows requested from the engine: `[offset, offset + limit)`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
pub struct FetchWindow {
    pub offset: usize,
    pub limit: usize,
}

impl FetchWindow {
    pub fn new(offset: usize, limit: usize) -> Self {
        FetchWindow { offset, limit }
    }

    /// One past the last row of the window
    pub fn end(&self) -> usize {
        self.offset.saturating_add(self.limit)
    }

    /// True iff `viewport` lies entirely inside this window
    pub fn contains(&self, viewport: Viewport) -> bool {
        self.offset <= viewport.top && viewport.bottom <= self.end()
    }
}

/// Clamp `viewport` into `[0, row_count)`, keeping its span where it fits.
///
/// A viewport running past the end slides up; a span larger than the row
/// count shrinks to `[0, row_count)`.
pub fn clamp_viewport(row_count: usize, viewport: Viewport) -> Viewport {
    let span = viewport.span();
    if span >= row_count {
        Viewport::new(0, row_count)
    } else if viewport.bottom > row_count {
        Viewport::new(row_count - span, row_count)
    } else {
        viewport
    }
}

/// Window arithmetic consumed by the controller.
pub trait PagingPolicy {
    /// A window covering `viewport`, usually with some margin
    fn fetch_window(&self, viewport: Viewport) -> FetchWindow;

    /// `viewport` moved fully inside `[0, row_count)`
    fn clamp_viewport(&self, row_count: usize, viewport: Viewport) -> Viewport {
        clamp_viewport(row_count, viewport)
    }

    /// True iff `window` covers `viewport`
    fn contains(&self, window: FetchWindow, viewport: Viewport) -> bool {
        window.contains(viewport)
    }
}

/// Fetches the viewport plus `margin` rows above and below it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MarginPaging {
    margin: usize,
}

impl MarginPaging {
    pub fn new(margin: usize) -> Self {
        MarginPaging { margin }
    }

    pub fn margin(&self) -> usize {
        self.margin
    }
}

impl Default for MarginPaging {
    fn default() -> Self {
        MarginPaging::new(crate::config::DEFAULT_FETCH_MARGIN)
    }
}

impl PagingPolicy for MarginPaging {
    fn fetch_window(&self, viewport: Viewport) -> FetchWindow {
        let offset = viewport.top.saturating_sub(self.margin);
        let end = viewport.bottom.saturating_add(self.margin);
        FetchWindow::new(offset, end - offset)
    }
}
