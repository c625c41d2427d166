use anyhow::Result;
use std::sync::mpsc::Sender;
use std::thread;
use tracing::{debug, info, warn};

use crate::compositor::{self, FontLibrary, Surface};
use crate::data::{self, SourceImage};
use crate::export::{self, ExportError};
use crate::layout::{self, Layout};
use crate::style::StyleConfig;

/// Identifies one upload. Only the most recently issued token may replace
/// the session image.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct UploadToken(u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UploadOutcome {
    Applied,
    Stale,
    Failed,
}

/// A finished decode, as delivered by [`spawn_decode`].
pub struct DecodeCompletion {
    pub token: UploadToken,
    pub result: Result<SourceImage>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

/// Sent to subscribers after every repaint.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RenderSummary {
    pub width: u32,
    pub height: u32,
    pub bar_count: usize,
    pub has_image: bool,
}

type Listener = Box<dyn FnMut(&RenderSummary)>;

/// The one input a repaint replaces. Nothing is committed unless layout and
/// render both succeed.
enum Change {
    Image(SourceImage),
    Style(StyleConfig),
    Text(String),
    Refresh,
}

/// Owns the current image, style, text and render target. Every change runs
/// layout and a full repaint, then notifies subscribers. A change that fails
/// to lay out or render leaves the session as it was.
pub struct Session {
    image: Option<SourceImage>,
    latest_upload: u64,
    style: StyleConfig,
    text: String,
    layout: Layout,
    target: Surface,
    fonts: FontLibrary,
    listeners: Vec<(SubscriptionId, Listener)>,
    next_subscription: u64,
}

impl Session {
    pub fn new(style: StyleConfig, fonts: FontLibrary) -> Result<Self> {
        let style = style.clamped();
        let layout = layout::compute_layout(None, "", &style)?;
        let target = Surface::new(layout.surface_width, layout.surface_height)?;
        let mut session = Self {
            image: None,
            latest_upload: 0,
            style,
            text: String::new(),
            layout,
            target,
            fonts,
            listeners: Vec::new(),
            next_subscription: 0,
        };
        session.apply(Change::Refresh)?;
        Ok(session)
    }

    pub fn image(&self) -> Option<&SourceImage> {
        self.image.as_ref()
    }

    pub fn style(&self) -> &StyleConfig {
        &self.style
    }

    pub fn text(&self) -> &str {
        &self.text
    }

    pub fn layout(&self) -> &Layout {
        &self.layout
    }

    pub fn surface(&self) -> &Surface {
        &self.target
    }

    pub fn begin_upload(&mut self) -> UploadToken {
        self.latest_upload += 1;
        UploadToken(self.latest_upload)
    }

    pub fn complete_upload(
        &mut self,
        token: UploadToken,
        result: Result<SourceImage>,
    ) -> Result<UploadOutcome> {
        if token.0 != self.latest_upload {
            debug!(
                "session: discarding upload {} (latest is {})",
                token.0, self.latest_upload
            );
            return Ok(UploadOutcome::Stale);
        }
        match result {
            Ok(image) => {
                info!(
                    "session: image {}x{} loaded (upload {})",
                    image.width(),
                    image.height(),
                    token.0
                );
                self.apply(Change::Image(image))?;
                Ok(UploadOutcome::Applied)
            }
            Err(err) => {
                warn!("session: upload {} failed to decode: {:#}", token.0, err);
                Ok(UploadOutcome::Failed)
            }
        }
    }

    pub fn apply_completion(&mut self, completion: DecodeCompletion) -> Result<UploadOutcome> {
        self.complete_upload(completion.token, completion.result)
    }

    pub fn upload_bytes(&mut self, bytes: &[u8]) -> Result<UploadOutcome> {
        let token = self.begin_upload();
        self.complete_upload(token, data::load_image_from_bytes(bytes))
    }

    /// Out-of-range pixel sizes are clamped before use.
    pub fn set_style(&mut self, style: StyleConfig) -> Result<()> {
        self.apply(Change::Style(style.clamped()))
    }

    pub fn update_style(&mut self, update: impl FnOnce(&mut StyleConfig)) -> Result<()> {
        let mut style = self.style.clone();
        update(&mut style);
        self.set_style(style)
    }

    pub fn set_text(&mut self, text: impl Into<String>) -> Result<()> {
        self.apply(Change::Text(text.into()))
    }

    pub fn push_line(&mut self, line: &str) -> Result<()> {
        let mut text = self.text.clone();
        if !text.is_empty() {
            text.push('\n');
        }
        text.push_str(line);
        self.set_text(text)
    }

    pub fn subscribe(&mut self, listener: impl FnMut(&RenderSummary) + 'static) -> SubscriptionId {
        self.next_subscription += 1;
        let id = SubscriptionId(self.next_subscription);
        self.listeners.push((id, Box::new(listener)));
        id
    }

    pub fn unsubscribe(&mut self, id: SubscriptionId) -> bool {
        let before = self.listeners.len();
        self.listeners.retain(|(existing, _)| *existing != id);
        self.listeners.len() != before
    }

    pub fn export(&self) -> Result<Vec<u8>, ExportError> {
        export::export(&self.target, self.image.as_ref())
    }

    fn apply(&mut self, change: Change) -> Result<()> {
        let image = match &change {
            Change::Image(image) => Some(image),
            _ => self.image.as_ref(),
        };
        let style = match &change {
            Change::Style(style) => style,
            _ => &self.style,
        };
        let text = match &change {
            Change::Text(text) => text.as_str(),
            _ => self.text.as_str(),
        };
        let layout = layout::compute_layout(image, text, style)?;
        let mut target = Surface::new(layout.surface_width, layout.surface_height)?;
        compositor::render(&mut target, image, style, &layout, &self.fonts)?;

        match change {
            Change::Image(image) => self.image = Some(image),
            Change::Style(style) => self.style = style,
            Change::Text(text) => self.text = text,
            Change::Refresh => {}
        }
        self.layout = layout;
        self.target = target;

        let summary = RenderSummary {
            width: self.layout.surface_width,
            height: self.layout.surface_height,
            bar_count: self.layout.bars.len(),
            has_image: self.layout.has_image,
        };
        for (_, listener) in self.listeners.iter_mut() {
            listener(&summary);
        }
        Ok(())
    }
}

/// Decodes `bytes` on a worker thread and sends the completion to `sender`.
/// Completions may arrive in any order; the session drops stale ones.
pub fn spawn_decode(
    token: UploadToken,
    bytes: Vec<u8>,
    sender: Sender<DecodeCompletion>,
) -> thread::JoinHandle<()> {
    thread::spawn(move || {
        let result = data::load_image_from_bytes(&bytes);
        if sender.send(DecodeCompletion { token, result }).is_err() {
            debug!("session: decode finished after receiver closed");
        }
    })
}
