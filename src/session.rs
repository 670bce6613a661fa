//! Session controller: the one place the studio's configuration lives.
//!
//! A [`Session`] owns the content, every style, the uploaded logo and the
//! derived bitmaps.  Derived state is recomputed on demand and cached; any
//! edit drops the stale preview.  Suggestions run on the rayon pool and come
//! back over a channel as [`SuggestionMessage`]s tagged with a ticket so an
//! answer for an older request can be recognised and dropped.

use ab_glyph::FontArc;
use image::RgbaImage;
use std::sync::Arc;
use std::sync::mpsc::Sender;

use crate::ai::{suggest_or_fallback, Suggestion, SuggestionProvider, SuggestionRequest};
use crate::color::Color;
use crate::io;
use crate::ops::export::{export_file_name, export_image, unix_millis};
use crate::ops::logo::compose_logo;
use crate::ops::qr::{render_qr, EmbeddedLogo, QrRenderError};
use crate::style::{
    FrameStyle, LogoStyle, QrStyle, DEFAULT_BACKGROUND, DEFAULT_FOREGROUND, DEFAULT_FRAME_TEXT,
    DEFAULT_LOGO_BACKGROUND,
};

/// A finished export ready to be written out.
#[derive(Clone, Debug)]
pub struct ExportResult {
    pub image: RgbaImage,
    pub file_name: String,
}

#[derive(Debug)]
pub enum SessionError {
    /// The uploaded bytes are not a decodable image.
    Decode(String),
    Qr(QrRenderError),
}

impl std::fmt::Display for SessionError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SessionError::Decode(e) => write!(f, "could not decode logo: {}", e),
            SessionError::Qr(e) => write!(f, "{}", e),
        }
    }
}

impl std::error::Error for SessionError {}

impl From<QrRenderError> for SessionError {
    fn from(e: QrRenderError) -> Self {
        SessionError::Qr(e)
    }
}

impl From<image::ImageError> for SessionError {
    fn from(e: image::ImageError) -> Self {
        SessionError::Decode(e.to_string())
    }
}

/// Identifies one suggestion request and what it was asked about.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SuggestionTicket {
    pub seq: u64,
    pub content: String,
    pub logo_generation: u64,
}

/// Posted by the background worker when a suggestion is ready.
#[derive(Clone, Debug)]
pub struct SuggestionMessage {
    pub ticket: SuggestionTicket,
    pub suggestion: Suggestion,
}

struct ProcessedLogo {
    generation: u64,
    style: LogoStyle,
    image: RgbaImage,
}

#[derive(Default)]
pub struct Session {
    qr: QrStyle,
    logo_style: LogoStyle,
    frame: FrameStyle,

    logo: Option<RgbaImage>,
    /// Bumped on every logo upload or removal.
    logo_generation: u64,
    processed: Option<ProcessedLogo>,
    /// Last rendered QR surface; `None` once any input changes.
    surface: Option<RgbaImage>,

    suggestion: Option<Suggestion>,
    /// Sequence number of the most recently issued ticket.
    suggestion_seq: u64,
    suggestion_loading: bool,
}

impl Session {
    pub fn new() -> Self {
        Self::default()
    }

    // ========================================================================
    // Configuration
    // ========================================================================

    pub fn qr_style(&self) -> &QrStyle {
        &self.qr
    }

    pub fn logo_style(&self) -> &LogoStyle {
        &self.logo_style
    }

    pub fn frame_style(&self) -> &FrameStyle {
        &self.frame
    }

    pub fn set_content(&mut self, content: impl Into<String>) {
        self.qr.content = content.into();
        self.surface = None;
    }

    pub fn set_foreground(&mut self, color: Color) {
        self.qr.foreground_color = color;
        self.surface = None;
    }

    pub fn set_background(&mut self, color: Color) {
        self.qr.background_color = color;
        self.surface = None;
    }

    pub fn set_excavate(&mut self, excavate: bool) {
        self.qr.excavate = excavate;
        self.surface = None;
    }

    /// Edit the logo style in place.  Values are clamped to their ranges afterwards.
    pub fn edit_logo_style(&mut self, edit: impl FnOnce(&mut LogoStyle)) {
        edit(&mut self.logo_style);
        self.logo_style = self.logo_style.clamped();
        self.surface = None;
    }

    /// Edit the frame in place.  The label is cut to its maximum length afterwards.
    pub fn edit_frame(&mut self, edit: impl FnOnce(&mut FrameStyle)) {
        edit(&mut self.frame);
        self.frame.truncate_text();
    }

    /// Restore the starting look.  Content, shape, padding, border color,
    /// frame variant and excavation are kept; the logo is removed and any
    /// in-flight suggestion is orphaned.
    pub fn reset(&mut self) {
        self.qr.foreground_color = DEFAULT_FOREGROUND;
        self.qr.background_color = DEFAULT_BACKGROUND;

        self.frame.enabled = true;
        self.frame.text = DEFAULT_FRAME_TEXT.to_string();
        self.frame.frame_color = DEFAULT_FOREGROUND;

        self.logo_style.background_color = DEFAULT_LOGO_BACKGROUND;
        self.logo_style.border_width_percent = 6;
        self.logo_style.size_pixels = 480;

        self.clear_logo();
        self.suggestion = None;
        self.suggestion_seq += 1;
        self.suggestion_loading = false;
        log_info!("session reset to defaults");
    }

    // ========================================================================
    // Logo
    // ========================================================================

    /// Decode and install an uploaded logo.  On failure the previous logo stays.
    pub fn set_logo_bytes(&mut self, bytes: &[u8]) -> Result<(), SessionError> {
        let image = io::decode_image(bytes)?;
        self.set_logo_image(image);
        Ok(())
    }

    pub fn set_logo_image(&mut self, image: RgbaImage) {
        log_info!("logo loaded: {}x{}", image.width(), image.height());
        self.logo = Some(image);
        self.logo_generation += 1;
        self.processed = None;
        self.surface = None;
    }

    pub fn clear_logo(&mut self) {
        if self.logo.take().is_some() {
            self.logo_generation += 1;
        }
        self.processed = None;
        self.surface = None;
    }

    pub fn has_logo(&self) -> bool {
        self.logo.is_some()
    }

    /// Size of the uploaded logo before compositing.
    pub fn logo_dimensions(&self) -> Option<(u32, u32)> {
        self.logo.as_ref().map(|l| l.dimensions())
    }

    /// The composited logo badge, recomputed only when the logo or its style
    /// changed since the last call.
    pub fn processed_logo(&mut self) -> Option<&RgbaImage> {
        self.refresh_processed_logo();
        self.processed.as_ref().map(|p| &p.image)
    }

    fn refresh_processed_logo(&mut self) {
        let Some(logo) = &self.logo else {
            self.processed = None;
            return;
        };
        let fresh = self
            .processed
            .as_ref()
            .is_some_and(|p| p.generation == self.logo_generation && p.style == self.logo_style);
        if fresh {
            return;
        }

        let start = std::time::Instant::now();
        let image = compose_logo(logo, &self.logo_style);
        log_info!("logo composited in {:.1}ms", start.elapsed().as_secs_f64() * 1000.0);
        self.processed = Some(ProcessedLogo {
            generation: self.logo_generation,
            style: self.logo_style,
            image,
        });
    }

    // ========================================================================
    // Rendering
    // ========================================================================

    /// Render the QR surface (with the processed logo, if any) and keep it as
    /// the current preview.
    pub fn render_qr(&mut self) -> Result<&RgbaImage, SessionError> {
        self.refresh_processed_logo();
        let logo = self.processed.as_ref().map(|p| EmbeddedLogo {
            image: &p.image,
            size: self.logo_style.size_pixels,
            excavate: self.qr.excavate,
        });
        let surface = render_qr(&self.qr, logo)?;
        let surface: &RgbaImage = self.surface.insert(surface);
        Ok(surface)
    }

    /// The surface from the last [`Session::render_qr`], unless something changed since.
    pub fn preview(&self) -> Option<&RgbaImage> {
        self.surface.as_ref()
    }

    /// Compose the framed export from the current preview.  `None` when no
    /// preview has been rendered since the last change.
    pub fn export(&self, font: Option<&FontArc>) -> Option<ExportResult> {
        let image = export_image(self.surface.as_ref(), self.qr.background_color, &self.frame, font)?;
        Some(ExportResult { image, file_name: export_file_name(unix_millis()) })
    }

    // ========================================================================
    // Suggestions
    // ========================================================================

    pub fn suggestion(&self) -> Option<&Suggestion> {
        self.suggestion.as_ref()
    }

    /// Caption shown under the preview once a suggestion has been applied.
    pub fn preview_caption(&self) -> Option<&str> {
        self.suggestion.as_ref().map(|s| s.suggested_description.as_str())
    }

    pub fn is_suggestion_loading(&self) -> bool {
        self.suggestion_loading
    }

    /// Issue a ticket for a new request.  `None` while one is already running
    /// or when there is no content to analyse.
    pub fn begin_suggestion(&mut self) -> Option<SuggestionTicket> {
        if self.suggestion_loading || self.qr.content.is_empty() {
            return None;
        }
        self.suggestion_loading = true;
        self.suggestion_seq += 1;
        Some(SuggestionTicket {
            seq: self.suggestion_seq,
            content: self.qr.content.clone(),
            logo_generation: self.logo_generation,
        })
    }

    /// What gets sent to the model for the current state.
    pub fn suggestion_request(&self) -> SuggestionRequest {
        let logo_png = self.logo.as_ref().and_then(|logo| match io::encode_png(logo) {
            Ok(bytes) => Some(bytes),
            Err(e) => {
                log_warn!("could not encode logo for analysis, sending URL only: {}", e);
                None
            }
        });
        SuggestionRequest { content: self.qr.content.clone(), logo_png }
    }

    /// Start a suggestion request on the rayon pool.  The answer (or the
    /// fallback) is posted to `sender`.  Returns the ticket, or `None` when a
    /// request is already in flight.
    pub fn spawn_suggestion(
        &mut self,
        provider: Arc<dyn SuggestionProvider>,
        sender: Sender<SuggestionMessage>,
    ) -> Option<SuggestionTicket> {
        let ticket = self.begin_suggestion()?;
        let request = self.suggestion_request();
        let job_ticket = ticket.clone();
        rayon::spawn(move || {
            let suggestion = suggest_or_fallback(provider.as_ref(), &request);
            let _ = sender.send(SuggestionMessage { ticket: job_ticket, suggestion });
        });
        Some(ticket)
    }

    /// Apply a finished suggestion if it still describes the current state.
    ///
    /// Answers to anything but the latest ticket are dropped silently.  The
    /// latest ticket always clears the loading flag, but is only applied when
    /// the content and logo are the ones it was issued for.
    pub fn apply_suggestion(&mut self, message: SuggestionMessage) -> bool {
        let SuggestionMessage { ticket, suggestion } = message;
        if ticket.seq != self.suggestion_seq {
            log_info!("discarding suggestion #{} (latest is #{})", ticket.seq, self.suggestion_seq);
            return false;
        }
        self.suggestion_loading = false;

        if ticket.content != self.qr.content || ticket.logo_generation != self.logo_generation {
            log_info!("discarding suggestion #{}: inputs changed while it ran", ticket.seq);
            return false;
        }

        match suggestion.primary_color() {
            Some(color) => {
                self.qr.foreground_color = color;
                self.frame.frame_color = color;
                self.surface = None;
            }
            None => log_warn!("suggestion carried no usable color; palette unchanged"),
        }
        self.suggestion = Some(suggestion);
        true
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::ai::SuggestError;
    use crate::style::{FrameVariant, LogoShape};
    use image::Rgba;
    use std::sync::mpsc;
    use std::time::Duration;

    struct Fixed(Suggestion);

    impl SuggestionProvider for Fixed {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<Suggestion, SuggestError> {
            Ok(self.0.clone())
        }
    }

    struct Offline;

    impl SuggestionProvider for Offline {
        fn suggest(&self, _request: &SuggestionRequest) -> Result<Suggestion, SuggestError> {
            Err(SuggestError::MissingApiKey)
        }
    }

    fn palette(first: &str) -> Suggestion {
        Suggestion {
            suggested_colors: vec![first.to_string(), "#ffffff".to_string()],
            suggested_description: "Fresh coffee daily".to_string(),
            brand_tone: "Warm".to_string(),
        }
    }

    fn logo_png() -> Vec<u8> {
        io::encode_png(&RgbaImage::from_pixel(40, 20, Rgba([10, 20, 30, 255]))).unwrap()
    }

    #[test]
    fn defaults_match_the_starting_look() {
        let s = Session::default();
        assert_eq!(s.qr_style().content, "https://google.com");
        assert_eq!(s.qr_style().foreground_color, DEFAULT_FOREGROUND);
        assert!(s.qr_style().excavate);
        assert_eq!(s.logo_style().shape, LogoShape::Circle);
        assert_eq!(s.logo_style().size_pixels, 480);
        assert!(s.frame_style().is_banner());
        assert_eq!(s.frame_style().text, "SCAN ME");
        assert!(!s.has_logo());
    }

    #[test]
    fn reset_restores_colors_and_drops_logo() {
        let mut s = Session::default();
        s.set_content("https://example.com");
        s.set_foreground(Color::BLACK);
        s.set_logo_bytes(&logo_png()).unwrap();
        s.edit_logo_style(|l| {
            l.border_width_percent = 20;
            l.padding_percent = 30;
            l.size_pixels = 300;
        });
        s.edit_frame(|f| {
            f.enabled = false;
            f.text = "HELLO".into();
            f.variant = FrameVariant::FullBorder;
        });

        s.reset();

        assert_eq!(s.qr_style().foreground_color, DEFAULT_FOREGROUND);
        assert_eq!(s.qr_style().content, "https://example.com");
        assert!(!s.has_logo());
        assert_eq!(s.logo_style().border_width_percent, 6);
        assert_eq!(s.logo_style().size_pixels, 480);
        // Not part of the reset
        assert_eq!(s.logo_style().padding_percent, 30);
        assert_eq!(s.frame_style().variant, FrameVariant::FullBorder);
        assert!(s.frame_style().enabled);
        assert_eq!(s.frame_style().text, "SCAN ME");
    }

    #[test]
    fn bad_logo_bytes_keep_previous_logo() {
        let mut s = Session::default();
        s.set_logo_bytes(&logo_png()).unwrap();
        assert!(matches!(s.set_logo_bytes(b"not an image"), Err(SessionError::Decode(_))));
        assert!(s.has_logo());
        assert!(s.processed_logo().is_some());
    }

    #[test]
    fn edits_are_clamped_and_truncated() {
        let mut s = Session::default();
        s.edit_logo_style(|l| {
            l.border_width_percent = 90;
            l.size_pixels = 1;
        });
        assert_eq!(s.logo_style().border_width_percent, 25);
        assert_eq!(s.logo_style().size_pixels, 200);

        s.edit_frame(|f| f.text = "abcdefghijklmnopqrstuvwxyz".into());
        assert_eq!(s.frame_style().text, "abcdefghijklmno");
    }

    #[test]
    fn processed_logo_follows_style_changes() {
        let mut s = Session::default();
        assert!(s.processed_logo().is_none());

        s.set_logo_bytes(&logo_png()).unwrap();
        let first = s.processed_logo().unwrap().clone();
        assert_eq!(first.dimensions(), (2048, 2048));
        assert_eq!(s.processed_logo().unwrap(), &first);

        s.edit_logo_style(|l| l.shape = LogoShape::Square);
        assert_ne!(s.processed_logo().unwrap(), &first);

        s.clear_logo();
        assert!(s.processed_logo().is_none());
    }

    #[test]
    fn export_needs_a_rendered_preview() {
        let mut s = Session::default();
        assert!(s.export(None).is_none());

        s.render_qr().unwrap();
        let result = s.export(None).unwrap();
        assert_eq!(result.image.dimensions(), (2211, 2785));
        assert!(result.file_name.starts_with("qr-tight-studio-"));
        assert!(result.file_name.ends_with(".png"));

        s.set_background(Color::BLACK);
        assert!(s.preview().is_none());
        assert!(s.export(None).is_none());
    }

    #[test]
    fn empty_content_issues_no_ticket() {
        let mut s = Session::default();
        s.set_content("");
        assert!(s.begin_suggestion().is_none());
        assert!(!s.is_suggestion_loading());

        let (tx, _rx) = mpsc::channel();
        assert!(s.spawn_suggestion(Arc::new(Offline), tx).is_none());

        s.set_content("https://example.com");
        assert!(s.begin_suggestion().is_some());
    }

    #[test]
    fn only_one_suggestion_in_flight() {
        let mut s = Session::default();
        let ticket = s.begin_suggestion().unwrap();
        assert!(s.is_suggestion_loading());
        assert!(s.begin_suggestion().is_none());

        assert!(s.apply_suggestion(SuggestionMessage { ticket, suggestion: palette("#112233") }));
        assert!(!s.is_suggestion_loading());
        assert_eq!(s.qr_style().foreground_color, Color::rgb(0x11, 0x22, 0x33));
        assert_eq!(s.frame_style().frame_color, Color::rgb(0x11, 0x22, 0x33));
        assert_eq!(s.preview_caption(), Some("Fresh coffee daily"));
    }

    #[test]
    fn suggestion_for_old_content_is_dropped() {
        let mut s = Session::default();
        s.set_content("https://a.example");
        let ticket = s.begin_suggestion().unwrap();
        s.set_content("https://b.example");

        assert!(!s.apply_suggestion(SuggestionMessage { ticket, suggestion: palette("#112233") }));
        assert!(!s.is_suggestion_loading());
        assert_eq!(s.qr_style().foreground_color, DEFAULT_FOREGROUND);
        assert!(s.suggestion().is_none());
    }

    #[test]
    fn suggestion_after_logo_swap_is_dropped() {
        let mut s = Session::default();
        let ticket = s.begin_suggestion().unwrap();
        s.set_logo_bytes(&logo_png()).unwrap();
        assert!(!s.apply_suggestion(SuggestionMessage { ticket, suggestion: palette("#112233") }));
    }

    #[test]
    fn reset_orphans_in_flight_request() {
        let mut s = Session::default();
        let old = s.begin_suggestion().unwrap();
        s.reset();
        assert!(!s.is_suggestion_loading());

        let new = s.begin_suggestion().unwrap();
        assert!(new.seq > old.seq);
        assert!(!s.apply_suggestion(SuggestionMessage { ticket: old, suggestion: palette("#112233") }));
        assert!(s.is_suggestion_loading());
        assert!(s.apply_suggestion(SuggestionMessage { ticket: new, suggestion: palette("#445566") }));
        assert_eq!(s.qr_style().foreground_color, Color::rgb(0x44, 0x55, 0x66));
    }

    #[test]
    fn unusable_color_keeps_palette_but_stores_caption() {
        let mut s = Session::default();
        let ticket = s.begin_suggestion().unwrap();
        assert!(s.apply_suggestion(SuggestionMessage { ticket, suggestion: palette("ocean blue") }));
        assert_eq!(s.qr_style().foreground_color, DEFAULT_FOREGROUND);
        assert_eq!(s.preview_caption(), Some("Fresh coffee daily"));
    }

    #[test]
    fn spawned_request_reports_back_over_channel() {
        let mut s = Session::default();
        let (tx, rx) = mpsc::channel();
        let ticket = s.spawn_suggestion(Arc::new(Fixed(palette("#abcdef"))), tx).unwrap();

        let message = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(message.ticket, ticket);
        assert!(s.apply_suggestion(message));
        assert_eq!(s.frame_style().frame_color, Color::rgb(0xab, 0xcd, 0xef));
    }

    #[test]
    fn failed_request_applies_fallback() {
        let mut s = Session::default();
        let (tx, rx) = mpsc::channel();
        s.spawn_suggestion(Arc::new(Offline), tx).unwrap();

        let message = rx.recv_timeout(Duration::from_secs(10)).unwrap();
        assert_eq!(message.suggestion, Suggestion::fallback());
        assert!(s.apply_suggestion(message));
        assert_eq!(s.qr_style().foreground_color, Color::BLACK);
        assert_eq!(s.preview_caption(), Some("Scan to visit"));
    }

    #[test]
    fn request_includes_logo_when_present() {
        let mut s = Session::default();
        assert!(s.suggestion_request().logo_png.is_none());
        s.set_logo_bytes(&logo_png()).unwrap();
        let request = s.suggestion_request();
        assert_eq!(request.content, "https://google.com");
        assert!(request.logo_png.is_some());
    }
}
