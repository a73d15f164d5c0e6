use std::fmt;
use std::sync::Arc;

/// Produces a panel's body each time the panel is shown.
pub type ContentProducer = Arc<dyn Fn() -> String + Send + Sync>;

/// Surface that renders the top panel.
pub trait PanelView: Send + Sync {
    fn show(&self, title: &str, content: &str, breadcrumbs: &[String]);
    fn hide(&self);
}

#[derive(Clone)]
pub struct PanelFrame {
    pub title: String,
    pub producer: ContentProducer,
    /// Path shown above the panel, root first
    pub breadcrumbs: Vec<String>,
}

impl fmt::Debug for PanelFrame {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PanelFrame")
            .field("title", &self.title)
            .field("breadcrumbs", &self.breadcrumbs)
            .finish_non_exhaustive()
    }
}

/// Drill-down stack of detail panels. Only the top frame is shown.
pub struct PanelStack {
    view: Arc<dyn PanelView>,
    frames: Vec<PanelFrame>,
}

impl PanelStack {
    pub fn new(view: Arc<dyn PanelView>) -> Self {
        Self {
            view,
            frames: Vec::new(),
        }
    }

    /// Push a frame on top and show it.
    pub fn open(&mut self, title: &str, producer: ContentProducer, breadcrumbs: Vec<String>) {
        self.frames.push(PanelFrame {
            title: title.to_string(),
            producer,
            breadcrumbs,
        });
        self.render_top();
    }

    /// Open a frame whose breadcrumbs extend the current top frame's.
    pub fn drill_down(&mut self, title: &str, producer: ContentProducer) {
        let mut breadcrumbs: Vec<String> = self
            .frames
            .last()
            .map(|frame| frame.breadcrumbs.clone())
            .unwrap_or_default();
        breadcrumbs.push(title.to_string());
        self.open(title, producer, breadcrumbs);
    }

    /// Return to the frame at `level` (0 is the root), discarding those above
    /// it and re-running its producer. Out of range levels are ignored.
    pub fn back(&mut self, level: usize) -> bool {
        if level >= self.frames.len() {
            return false;
        }
        self.frames.truncate(level + 1);
        self.render_top();
        true
    }

    pub fn close(&mut self) {
        self.frames.clear();
        self.view.hide();
    }

    pub fn frames(&self) -> &[PanelFrame] {
        &self.frames
    }

    pub fn depth(&self) -> usize {
        self.frames.len()
    }

    pub fn is_open(&self) -> bool {
        !self.frames.is_empty()
    }

    fn render_top(&self) {
        if let Some(frame) = self.frames.last() {
            let content = (frame.producer)();
            self.view.show(&frame.title, &content, &frame.breadcrumbs);
        }
    }
}
