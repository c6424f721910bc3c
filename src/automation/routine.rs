// Per-game routines and the registry that names them
use super::error::{AutomationError, AutomationResult};
use super::session::AutomationSession;
use crate::capture::Frame;
use crate::device::DeviceControl;
use crate::template_matching::{ColorMode, MatchResult, SearchRegion};
use std::collections::BTreeMap;
use std::future::Future;
use std::path::{Path, PathBuf};
use std::pin::Pin;

pub type CycleFuture<'a> = Pin<Box<dyn Future<Output = AutomationResult<()>> + Send + 'a>>;

/// One perception-action step, run by the loop once per cycle with the latest frame.
pub trait Routine<D: DeviceControl>: Send {
    fn name(&self) -> &str;

    fn run_cycle<'a>(
        &'a mut self,
        session: &'a AutomationSession<D>,
        frame: &'a Frame,
    ) -> CycleFuture<'a>;
}

type Factory<D> = Box<dyn Fn() -> Box<dyn Routine<D>> + Send + Sync>;

struct Entry<D> {
    description: String,
    factory: Factory<D>,
}

/// Routine names mapped to factories. Names are checked when registered, not when used.
pub struct RoutineRegistry<D> {
    entries: BTreeMap<String, Entry<D>>,
}

impl<D: DeviceControl> Default for RoutineRegistry<D> {
    fn default() -> Self {
        Self {
            entries: BTreeMap::new(),
        }
    }
}

fn valid_name(name: &str) -> bool {
    !name.is_empty()
        && name
            .chars()
            .all(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || c == '-' || c == '_')
}

impl<D: DeviceControl> RoutineRegistry<D> {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registry preloaded with the built-in routines.
    pub fn with_builtins(templates_dir: impl Into<PathBuf>) -> Self {
        let dir = templates_dir.into();
        let mut registry = Self::new();
        // Fixed name on an empty registry: cannot be rejected
        let _ = registry.register(
            TemplateTapRoutine::NAME,
            "Tap the best-matching *.png template in the templates directory",
            move || -> Box<dyn Routine<D>> { Box::new(TemplateTapRoutine::new(dir.clone())) },
        );
        registry
    }

    pub fn register<F>(&mut self, name: &str, description: &str, factory: F) -> AutomationResult<()>
    where
        F: Fn() -> Box<dyn Routine<D>> + Send + Sync + 'static,
    {
        if !valid_name(name) {
            return Err(AutomationError::InvalidRoutineName(name.to_string()));
        }
        if self.entries.contains_key(name) {
            return Err(AutomationError::DuplicateRoutine(name.to_string()));
        }
        self.entries.insert(
            name.to_string(),
            Entry {
                description: description.to_string(),
                factory: Box::new(factory),
            },
        );
        Ok(())
    }

    pub fn create(&self, name: &str) -> AutomationResult<Box<dyn Routine<D>>> {
        self.entries
            .get(name)
            .map(|entry| (entry.factory)())
            .ok_or_else(|| AutomationError::UnknownRoutine(name.to_string()))
    }

    pub fn contains(&self, name: &str) -> bool {
        self.entries.contains_key(name)
    }

    /// (name, description) pairs in name order.
    pub fn list(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries
            .iter()
            .map(|(name, entry)| (name.as_str(), entry.description.as_str()))
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Sorted `*.png` files directly inside `dir`.
pub fn scan_template_files(dir: &Path) -> std::io::Result<Vec<PathBuf>> {
    let mut templates: Vec<PathBuf> = std::fs::read_dir(dir)?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|path| {
            path.is_file()
                && path
                    .extension()
                    .is_some_and(|ext| ext.eq_ignore_ascii_case("png"))
        })
        .collect();
    templates.sort();
    Ok(templates)
}

/// Finds the best match across every template in a directory and taps its centre.
///
/// A `[x,y,w,h]` suffix in a file name restricts that template's search to the region.
pub struct TemplateTapRoutine {
    dir: PathBuf,
    templates: Option<Vec<PathBuf>>,
}

impl TemplateTapRoutine {
    pub const NAME: &'static str = "tap-templates";

    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            templates: None,
        }
    }

    fn templates(&mut self) -> AutomationResult<&[PathBuf]> {
        if self.templates.is_none() {
            let found = scan_template_files(&self.dir)?;
            if found.is_empty() {
                return Err(AutomationError::Routine {
                    routine: Self::NAME.to_string(),
                    description: format!("no *.png templates in {}", self.dir.display()),
                });
            }
            log::info!("🖼️ {} template(s) in {}", found.len(), self.dir.display());
            self.templates = Some(found);
        }
        Ok(self.templates.as_deref().unwrap_or_default())
    }

    fn best_match<D: DeviceControl>(
        &mut self,
        session: &AutomationSession<D>,
        frame: &Frame,
    ) -> AutomationResult<Option<(String, MatchResult)>> {
        let threshold = session.matcher().config().threshold;
        let mut best: Option<(String, MatchResult)> = None;

        for path in self.templates()? {
            let name = path.to_string_lossy();
            let Some(template) = session.template(&name, ColorMode::Grayscale) else {
                continue;
            };
            let roi = template
                .path()
                .file_name()
                .and_then(|n| SearchRegion::from_filename(&n.to_string_lossy()));
            let found = session.matcher().match_one(
                frame,
                &template,
                threshold,
                ColorMode::Grayscale,
                roi.as_ref(),
                1.0,
            );
            if let Some(found) = found
                && best
                    .as_ref()
                    .is_none_or(|(_, b)| found.confidence > b.confidence)
            {
                best = Some((template.name().to_string(), found));
            }
        }
        Ok(best)
    }
}

impl<D: DeviceControl> Routine<D> for TemplateTapRoutine {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn run_cycle<'a>(
        &'a mut self,
        session: &'a AutomationSession<D>,
        frame: &'a Frame,
    ) -> CycleFuture<'a> {
        Box::pin(async move {
            let Some((name, found)) = self.best_match(session, frame)? else {
                log::debug!("👀 No template matched frame #{}", frame.index());
                return Ok(());
            };
            let (x, y) = found.center();
            if session.driver().tap_once(x as i32, y as i32).await {
                log::info!(
                    "✅ Tapped {name} at ({x}, {y}) - confidence {:.1}%",
                    found.confidence * 100.0
                );
                Ok(())
            } else {
                Err(AutomationError::Routine {
                    routine: Self::NAME.to_string(),
                    description: format!("tap on {name} at ({x}, {y}) failed"),
                })
            }
        })
    }
}
