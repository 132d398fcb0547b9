use std::cell::OnceCell;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use anyhow::{Context, Result, anyhow, bail};
use textcomposer_core::fonts::{FontCatalog, filter_by_category, is_system_font, search_fonts};
use textcomposer_core::{
    ElementId, ElementPatch, FallbackFonts, FontVariant, TextAlign, TextElement,
};
use textcomposer_export::{
    Background, FontSource, RenderSurface, clear_background, clear_export_size, export_png, load_background,
    restore_background, save_background, save_export_size,
};
use textcomposer_session::{Commit, ComposerError, Gesture, Session, Storage, Transform};

/// Entries shown by the `history` command
const TIMELINE_WINDOW: usize = 8;

/// One line of shell input
#[derive(Debug, Clone, PartialEq)]
pub enum Command {
    Add { x: f64, y: f64 },
    Select(Option<String>),
    Drag { target: String, x: f64, y: f64 },
    Drop { target: String, x: f64, y: f64 },
    Transform { target: String, x: f64, y: f64, width: f64, height: f64, rotation: f64 },
    Nudge { dx: f64, dy: f64 },
    Text(String),
    Size(f64),
    Fill(String),
    Opacity(f64),
    Align(TextAlign),
    Font(String),
    Variant(FontVariant),
    Remove(Option<String>),
    Up(Option<String>),
    Down(Option<String>),
    Top(Option<String>),
    Bottom(Option<String>),
    Undo,
    Redo,
    Reset,
    Clear,
    List,
    History,
    Fonts { category: Option<String>, query: Option<String> },
    Image(PathBuf),
    Export(PathBuf),
    Help,
    Quit,
}

fn number(arg: Option<&str>, what: &str) -> Result<f64> {
    let arg = arg.ok_or_else(|| anyhow!("Missing {}", what))?;
    arg.parse()
        .with_context(|| format!("Invalid {}: {:?}", what, arg))
}

fn target(arg: Option<&str>) -> Result<String> {
    arg.map(str::to_string)
        .ok_or_else(|| anyhow!("Missing element (list index or id)"))
}

impl Command {
    pub fn parse(line: &str) -> Result<Self> {
        let line = line.trim();
        let (name, rest) = line.split_once(char::is_whitespace).unwrap_or((line, ""));
        let rest = rest.trim();
        let mut args = rest.split_whitespace();
        let optional = |s: &str| (!s.is_empty()).then(|| s.to_string());

        let command = match name {
            "add" => Command::Add {
                x: number(args.next(), "x")?,
                y: number(args.next(), "y")?,
            },
            "select" => Command::Select(optional(rest)),
            "drag" => Command::Drag {
                target: target(args.next())?,
                x: number(args.next(), "x")?,
                y: number(args.next(), "y")?,
            },
            "drop" => Command::Drop {
                target: target(args.next())?,
                x: number(args.next(), "x")?,
                y: number(args.next(), "y")?,
            },
            "transform" => Command::Transform {
                target: target(args.next())?,
                x: number(args.next(), "x")?,
                y: number(args.next(), "y")?,
                width: number(args.next(), "width")?,
                height: number(args.next(), "height")?,
                rotation: args.next().map(|r| number(Some(r), "rotation")).transpose()?.unwrap_or(0.0),
            },
            "nudge" => {
                let (dx, dy) = match rest {
                    "left" => (-1.0, 0.0),
                    "right" => (1.0, 0.0),
                    "up" => (0.0, -1.0),
                    "down" => (0.0, 1.0),
                    other => bail!("Unknown direction {:?} (left, right, up, down)", other),
                };
                Command::Nudge { dx, dy }
            }
            "text" => Command::Text(rest.to_string()),
            "size" => Command::Size(number(args.next(), "font size")?),
            "fill" => match args.next() {
                Some(color) => Command::Fill(color.to_string()),
                None => bail!("Missing color"),
            },
            "opacity" => Command::Opacity(number(args.next(), "opacity")?),
            "align" => Command::Align(
                TextAlign::parse(rest).ok_or_else(|| anyhow!("Unknown alignment {:?}", rest))?,
            ),
            "font" => match optional(rest) {
                Some(family) => Command::Font(family),
                None => bail!("Missing font family"),
            },
            "variant" => Command::Variant(
                FontVariant::parse(rest).ok_or_else(|| anyhow!("Unknown variant {:?}", rest))?,
            ),
            "remove" | "rm" => Command::Remove(optional(rest)),
            "up" => Command::Up(optional(rest)),
            "down" => Command::Down(optional(rest)),
            "top" => Command::Top(optional(rest)),
            "bottom" => Command::Bottom(optional(rest)),
            "undo" | "u" => Command::Undo,
            "redo" | "r" => Command::Redo,
            "reset" => Command::Reset,
            "clear" => Command::Clear,
            "list" | "ls" => Command::List,
            "history" => Command::History,
            "fonts" => match rest.strip_prefix("--category") {
                Some(filter) => {
                    let filter = filter.trim_start();
                    let (category, query) =
                        filter.split_once(char::is_whitespace).unwrap_or((filter, ""));
                    if category.is_empty() {
                        bail!("Missing category");
                    }
                    Command::Fonts {
                        category: Some(category.to_string()),
                        query: optional(query.trim()),
                    }
                }
                None => Command::Fonts { category: None, query: optional(rest) },
            },
            "image" if !rest.is_empty() => Command::Image(PathBuf::from(rest)),
            "export" if !rest.is_empty() => Command::Export(PathBuf::from(rest)),
            "image" | "export" => bail!("Missing path"),
            "help" | "?" => Command::Help,
            "quit" | "exit" | "q" => Command::Quit,
            other => bail!("Unknown command {:?} (try help)", other),
        };
        Ok(command)
    }
}

const HELP: &str = "\
add X Y                 create a text element and select it
select [N|ID]           select an element, or deselect
drag N X Y              move while dragging (not recorded)
drop N X Y              finish a drag (recorded)
transform N X Y W H [R] resize/rotate (recorded)
nudge left|right|up|down
text TEXT | size N | opacity F          edit selected (recorded when idle)
fill COLOR | align A | font F | variant V   edit selected (recorded)
remove|up|down|top|bottom [N|ID]
undo | redo | reset | clear
list | history | fonts [--category CAT] [QUERY]
image PATH | export PATH | quit";

pub struct App {
    pub session: Session,
    pub background: Option<Background>,
    pub running: bool,
    pub status_message: Option<String>,
    storage: Arc<dyn Storage>,
    /// Scanned on first export
    fonts: OnceCell<FontSource>,
}

impl App {
    pub fn new(session: Session, storage: Arc<dyn Storage>) -> Self {
        Self {
            session,
            background: None,
            running: true,
            status_message: None,
            storage,
            fonts: OnceCell::new(),
        }
    }

    pub fn set_status(&mut self, msg: impl Into<String>) {
        self.status_message = Some(msg.into());
    }

    pub fn take_status(&mut self) -> Option<String> {
        self.status_message.take()
    }

    /// Bring back the background from the previous run
    pub fn restore_background(&mut self) {
        let config = self.session.config();
        let (max_w, max_h) = (config.max_canvas_width, config.max_canvas_height);
        if let Some(background) = restore_background(self.storage.as_ref(), max_w, max_h) {
            self.session.set_canvas(background.export_size().canvas());
            self.background = Some(background);
        }
    }

    pub fn open_image(&mut self, path: &Path) {
        let config = self.session.config();
        match load_background(path, config.max_canvas_width, config.max_canvas_height) {
            Ok(background) => {
                let size = *background.export_size();
                self.session.set_canvas(size.canvas());
                save_background(self.storage.as_ref(), &background);
                save_export_size(self.storage.as_ref(), &size);
                self.background = Some(background);
                self.set_status(format!(
                    "Opened {} ({}x{}, canvas {}x{})",
                    path.display(),
                    size.original_width,
                    size.original_height,
                    size.width,
                    size.height
                ));
            }
            Err(e) => self.set_status(format!("Error: {}", e)),
        }
    }

    /// Parse and run one line of input
    pub fn execute(&mut self, line: &str, now: Instant) {
        if line.trim().is_empty() {
            return;
        }
        let result = Command::parse(line).and_then(|command| self.run(command, now));
        if let Err(e) = result {
            self.set_status(format!("Error: {:#}", e));
        }
    }

    /// Resolve a list index (1-based), full id or unique id prefix
    fn resolve(&self, reference: &str) -> Result<ElementId> {
        let elements = self.session.elements();
        if let Ok(n) = reference.parse::<usize>() {
            return n
                .checked_sub(1)
                .and_then(|i| elements.get(i))
                .map(|el| el.id.clone())
                .ok_or_else(|| anyhow!("No element #{}", n));
        }
        let matches: Vec<&TextElement> = elements
            .iter()
            .filter(|el| el.id.as_str().starts_with(reference))
            .collect();
        match matches.as_slice() {
            [el] => Ok(el.id.clone()),
            [] => Err(ComposerError::UnknownElement(ElementId::from(reference)).into()),
            _ => bail!("{:?} matches {} elements", reference, matches.len()),
        }
    }

    fn resolve_or_selected(&self, reference: Option<&str>) -> Result<ElementId> {
        match reference {
            Some(reference) => self.resolve(reference),
            None => self.selected(),
        }
    }

    fn selected(&self) -> Result<ElementId> {
        self.session
            .selected()
            .cloned()
            .ok_or_else(|| anyhow!("No element selected"))
    }

    fn edit(&mut self, patch: ElementPatch, commit: Commit, now: Instant) -> Result<()> {
        let id = self.selected()?;
        self.session.handle(Gesture::Edit { id, patch, commit }, now)?;
        Ok(())
    }

    fn run(&mut self, command: Command, now: Instant) -> Result<()> {
        match command {
            Command::Add { x, y } => {
                self.session.handle(Gesture::Create { x, y }, now)?;
                self.set_status(format!("Added #{}", self.session.elements().len()));
            }
            Command::Select(Some(reference)) => {
                let id = self.resolve(&reference)?;
                self.session.handle(Gesture::Select(Some(id.clone())), now)?;
                self.set_status(format!("Selected {}", id));
            }
            Command::Select(None) => {
                self.session.handle(Gesture::Deselect, now)?;
                self.set_status("Deselected");
            }
            Command::Drag { target, x, y } => {
                let id = self.resolve(&target)?;
                self.session.handle(Gesture::DragMove { id, x, y }, now)?;
            }
            Command::Drop { target, x, y } => {
                let id = self.resolve(&target)?;
                self.session.handle(Gesture::DragEnd { id, x, y }, now)?;
                self.set_status("Moved");
            }
            Command::Transform { target, x, y, width, height, rotation } => {
                let id = self.resolve(&target)?;
                let current = self
                    .session
                    .store()
                    .element(&id)
                    .ok_or_else(|| ComposerError::UnknownElement(id.clone()))?;
                let transform = Transform {
                    x,
                    y,
                    width,
                    height,
                    scale_x: current.scale_x,
                    scale_y: current.scale_y,
                    rotation,
                    skew_x: current.skew_x,
                    skew_y: current.skew_y,
                };
                if self.session.handle(Gesture::TransformEnd { id, transform }, now)? {
                    self.set_status("Transformed");
                } else {
                    let min = self.session.config().min_transform_size;
                    self.set_status(format!("Box must be at least {min}x{min}; kept previous size"));
                }
            }
            Command::Nudge { dx, dy } => {
                if !self.session.handle(Gesture::Nudge { dx, dy }, now)? {
                    self.set_status("No element selected");
                }
            }
            Command::Text(text) => self.edit(ElementPatch::text(text), Commit::Debounced, now)?,
            Command::Size(size) => self.edit(ElementPatch::font_size(size), Commit::Debounced, now)?,
            Command::Opacity(opacity) => {
                self.edit(ElementPatch::opacity(opacity), Commit::Debounced, now)?
            }
            Command::Fill(color) => self.edit(ElementPatch::fill(color), Commit::Durable, now)?,
            Command::Align(align) => {
                let patch = ElementPatch { align: Some(align), ..ElementPatch::default() };
                self.edit(patch, Commit::Durable, now)?
            }
            Command::Font(family) => {
                let patch = ElementPatch { font_family: Some(family), ..ElementPatch::default() };
                self.edit(patch, Commit::Durable, now)?
            }
            Command::Variant(variant) => {
                let patch = ElementPatch { font_variant: Some(variant), ..ElementPatch::default() };
                self.edit(patch, Commit::Durable, now)?
            }
            Command::Remove(reference) => {
                let id = self.resolve_or_selected(reference.as_deref())?;
                if self.session.remove(&id) {
                    self.set_status(format!("Removed {}", id));
                }
            }
            Command::Up(reference) => {
                let id = self.resolve_or_selected(reference.as_deref())?;
                let moved = self.session.move_up(&id);
                self.reorder_status(moved, "Moved up", "Already on top");
            }
            Command::Down(reference) => {
                let id = self.resolve_or_selected(reference.as_deref())?;
                let moved = self.session.move_down(&id);
                self.reorder_status(moved, "Moved down", "Already at bottom");
            }
            Command::Top(reference) => {
                let id = self.resolve_or_selected(reference.as_deref())?;
                let moved = self.session.move_to_top(&id);
                self.reorder_status(moved, "Moved to top", "Already on top");
            }
            Command::Bottom(reference) => {
                let id = self.resolve_or_selected(reference.as_deref())?;
                let moved = self.session.move_to_bottom(&id);
                self.reorder_status(moved, "Moved to bottom", "Already at bottom");
            }
            Command::Undo => {
                if self.session.undo() {
                    self.set_status("Undo");
                } else {
                    self.set_status("Nothing to undo");
                }
            }
            Command::Redo => {
                if self.session.redo() {
                    self.set_status("Redo");
                } else {
                    self.set_status("Nothing to redo");
                }
            }
            Command::Reset => {
                self.session.reset_to_initial();
                self.set_status("Reset to initial state (redo to return)");
            }
            Command::Clear => {
                self.session.clear_all();
                self.background = None;
                clear_background(self.storage.as_ref());
                clear_export_size(self.storage.as_ref());
                self.set_status("Editor reset");
            }
            Command::List => {
                let listing = self.listing();
                self.set_status(listing);
            }
            Command::History => {
                let timeline = self.timeline();
                self.set_status(timeline);
            }
            Command::Fonts { category, query } => {
                let fonts = filter_by_category(&FallbackFonts.fonts(), category.as_deref());
                let fonts = match query {
                    Some(query) => search_fonts(&fonts, &query),
                    None => fonts,
                };
                let lines: Vec<String> = fonts
                    .iter()
                    .map(|font| {
                        let system = if is_system_font(&font.family) { ", system" } else { "" };
                        format!("{} ({}{})", font.family, font.category, system)
                    })
                    .collect();
                self.set_status(if lines.is_empty() {
                    "No matching fonts".to_string()
                } else {
                    lines.join("\n")
                });
            }
            Command::Image(path) => self.open_image(&path),
            Command::Export(path) => {
                self.session.commit_pending();
                let fonts = self.fonts.get_or_init(FontSource::system);
                let surface = self
                    .background
                    .as_ref()
                    .map(|background| background.overlay(self.session.elements(), fonts));
                let size = self.background.as_ref().map(Background::export_size);
                let surface_ref = surface.as_ref().map(|s| s as &dyn RenderSurface);
                let (w, h) = export_png(surface_ref, size, &path)?;
                self.set_status(format!("Exported {}x{} to {}", w, h, path.display()));
            }
            Command::Help => self.set_status(HELP),
            Command::Quit => self.running = false,
        }
        Ok(())
    }

    fn reorder_status(&mut self, moved: bool, done: &str, noop: &str) {
        self.set_status(if moved { done } else { noop });
    }

    /// Elements bottom to top, with the selection marked
    pub fn listing(&self) -> String {
        let elements = self.session.elements();
        if elements.is_empty() {
            return "No text elements".to_string();
        }
        let selected = self.session.selected();
        let mut lines: Vec<String> = elements
            .iter()
            .enumerate()
            .map(|(i, el)| {
                let marker = if Some(&el.id) == selected { '*' } else { ' ' };
                format!(
                    "{marker}{:>2} {:<8} {:?} at ({}, {}) {} {}px {} {} opacity {}",
                    i + 1,
                    short_id(&el.id),
                    el.text,
                    el.x,
                    el.y,
                    el.font_family,
                    el.font_size,
                    el.font_variant.as_str(),
                    el.fill,
                    el.opacity
                )
            })
            .collect();
        let store = self.session.store();
        if let Some(info) = selected.and_then(|id| store.order_info(id)) {
            let yes_no = |b: bool| if b { "yes" } else { "no" };
            lines.push(format!(
                "selected #{} of {} (up: {}, down: {})",
                info.index + 1,
                info.total,
                yes_no(info.can_move_up),
                yes_no(info.can_move_down)
            ));
        }
        lines.join("\n")
    }

    pub fn timeline(&self) -> String {
        let history = self.session.store().history();
        let items = history.timeline(TIMELINE_WINDOW);
        let dots: String = items
            .iter()
            .map(|item| match (item.is_current, item.is_active) {
                (true, _) => '@',
                (false, true) => '#',
                (false, false) => '.',
            })
            .collect();
        format!(
            "{dots}  step {} of {}  (undo {}, redo {})",
            history.current_index(),
            history.len().saturating_sub(1),
            if history.is_undo_disabled() { "off" } else { "on" },
            if history.is_redo_disabled() { "off" } else { "on" },
        )
    }
}

fn short_id(id: &ElementId) -> &str {
    let s = id.as_str();
    s.get(..8).unwrap_or(s)
}

#[cfg(test)]
mod tests {
    use textcomposer_session::{Config, MemoryStorage};

    use super::*;

    fn app() -> App {
        let storage: Arc<dyn Storage> = Arc::new(MemoryStorage::new());
        let session = Session::new(storage.clone(), Config::default()).unwrap();
        App::new(session, storage)
    }

    #[test]
    fn parses_commands() {
        assert_eq!(Command::parse("add 10 20").unwrap(), Command::Add { x: 10.0, y: 20.0 });
        assert_eq!(Command::parse("text Hello  world").unwrap(), Command::Text("Hello  world".into()));
        assert_eq!(Command::parse("select").unwrap(), Command::Select(None));
        assert_eq!(Command::parse("variant small-caps").unwrap(), Command::Variant(FontVariant::SmallCaps));
        assert_eq!(
            Command::parse("font Times New Roman").unwrap(),
            Command::Font("Times New Roman".into())
        );
        assert_eq!(
            Command::parse("fonts --category serif new").unwrap(),
            Command::Fonts { category: Some("serif".into()), query: Some("new".into()) }
        );
        assert_eq!(
            Command::parse("fonts cour").unwrap(),
            Command::Fonts { category: None, query: Some("cour".into()) }
        );
        assert!(Command::parse("fonts --category").is_err());
        assert!(Command::parse("add 10").is_err());
        assert!(Command::parse("nudge sideways").is_err());
        assert!(Command::parse("frobnicate").is_err());
    }

    #[test]
    fn add_edit_undo_flow() {
        let mut app = app();
        let now = Instant::now();
        app.execute("add 10 10", now);
        app.execute("fill #ff0000", now);
        assert_eq!(app.session.elements()[0].fill, "#ff0000");

        app.execute("undo", now);
        assert_eq!(app.session.elements()[0].fill, TextElement::DEFAULT_FILL);
        app.execute("undo", now);
        assert!(app.session.elements().is_empty());
        app.execute("undo", now);
        assert_eq!(app.take_status().as_deref(), Some("Nothing to undo"));
    }

    #[test]
    fn references_by_index() {
        let mut app = app();
        let now = Instant::now();
        app.execute("add 0 0", now);
        app.execute("add 50 50", now);
        app.execute("select 1", now);
        assert_eq!(app.session.selected(), Some(&app.session.elements()[0].id));

        app.execute("top", now);
        assert_eq!(app.session.elements()[1].x, 0.0);

        app.execute("select 9", now);
        assert_eq!(app.take_status().as_deref(), Some("Error: No element #9"));
    }

    #[test]
    fn edits_without_selection_report_error() {
        let mut app = app();
        app.execute("text hi", Instant::now());
        assert_eq!(app.take_status().as_deref(), Some("Error: No element selected"));
    }

    #[test]
    fn export_without_image_reports_error() {
        let mut app = app();
        let dir = tempfile::tempdir().unwrap();
        let out = dir.path().join("out.png");
        app.execute(&format!("export {}", out.display()), Instant::now());
        let status = app.take_status().unwrap();
        assert!(status.starts_with("Error: No image loaded"), "{status}");
        assert!(!out.exists());
    }

    #[test]
    fn history_shows_position() {
        let mut app = app();
        let now = Instant::now();
        app.execute("add 0 0", now);
        app.execute("add 1 1", now);
        app.execute("undo", now);
        assert_eq!(app.timeline(), "#@.  step 1 of 2  (undo on, redo on)");
    }

    #[test]
    fn fonts_filter_by_category_and_mark_system_fonts() {
        let mut app = app();
        app.execute("fonts --category serif", Instant::now());
        assert_eq!(
            app.take_status().as_deref(),
            Some("Times New Roman (serif, system)\nGeorgia (serif, system)")
        );

        app.execute("fonts --category cursive", Instant::now());
        assert_eq!(app.take_status().as_deref(), Some("Comic Sans MS (cursive)"));

        app.execute("fonts --category serif courier", Instant::now());
        assert_eq!(app.take_status().as_deref(), Some("No matching fonts"));
    }

    #[test]
    fn list_reports_stack_position_of_selection() {
        let mut app = app();
        let now = Instant::now();
        app.execute("add 0 0", now);
        app.execute("add 10 10", now);
        app.execute("add 20 20", now);
        app.execute("select 2", now);

        let listing = app.listing();
        assert_eq!(listing.lines().count(), 4);
        assert_eq!(listing.lines().last(), Some("selected #2 of 3 (up: yes, down: yes)"));

        app.execute("top", now);
        assert!(app.listing().ends_with("selected #3 of 3 (up: no, down: yes)"));

        app.execute("select", now);
        assert_eq!(app.listing().lines().count(), 3);
    }

    #[test]
    fn export_draws_elements_over_image() {
        let dir = tempfile::tempdir().unwrap();
        let source = dir.path().join("white.png");
        image::RgbaImage::from_pixel(100, 100, image::Rgba([255, 255, 255, 255]))
            .save(&source)
            .unwrap();
        let out = dir.path().join("out.png");

        let mut app = app();
        let now = Instant::now();
        app.execute(&format!("image {}", source.display()), now);
        app.execute("add 10 10", now);
        app.execute("text Hello", now);
        app.execute(&format!("export {}", out.display()), now);
        assert_eq!(
            app.take_status(),
            Some(format!("Exported 100x100 to {}", out.display()))
        );

        let exported = image::open(&out).unwrap().to_rgba8();
        let inked = exported.pixels().filter(|p| p.0 != [255, 255, 255, 255]).count();
        assert!(inked > 0);
    }

    #[test]
    fn clear_forgets_image_and_document() {
        let mut app = app();
        let now = Instant::now();
        app.execute("add 0 0", now);
        app.execute("clear", now);
        assert!(app.session.elements().is_empty());
        assert!(app.background.is_none());
        app.execute("undo", now);
        assert_eq!(app.take_status().as_deref(), Some("Nothing to undo"));
    }
}
