//! Resolving the application code that issued a query.
//!
//! Queries reach the hook through several layers of SeaORM and async
//! machinery. [`FrameLocator`] walks the stack outward from the hook and
//! reports the first frame that does not belong to any of a configured set of
//! library namespaces.

use backtrace::SymbolName;

/// Default number of frames inspected per lookup.
pub const DEFAULT_DEPTH: usize = 16;

// Frames of the locator itself, skipped before counting depth
const OWN_FRAMES: &str = concat!(module_path!(), "::FrameLocator");

/// Namespaces skipped by default: this crate, the ORM stack and the future
/// polling glue between them.
pub fn default_namespaces() -> Vec<String> {
    [
        env!("CARGO_CRATE_NAME"),
        "sea_orm",
        "sea_query",
        "sqlx",
        "core::future",
        "core::pin",
    ]
    .into_iter()
    .map(String::from)
    .collect()
}

/// A resolved stack frame.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Frame {
    pub function: String,
    pub file: String,
    pub line: u32,
}

/// Finds the caller of a query on the live stack.
#[derive(Debug, Clone)]
pub struct FrameLocator {
    namespaces: Vec<String>,
    depth: usize,
}

impl Default for FrameLocator {
    fn default() -> Self {
        Self::new(default_namespaces(), DEFAULT_DEPTH)
    }
}

impl FrameLocator {
    pub fn new(namespaces: Vec<String>, depth: usize) -> Self {
        Self { namespaces, depth }
    }

    pub fn namespaces(&self) -> &[String] {
        &self.namespaces
    }

    /// Capture up to `depth` frames above the locator and pick the caller.
    ///
    /// Returns `None` only when no frame could be symbolized.
    #[inline(never)]
    pub fn locate(&self) -> Option<Frame> {
        let mut frames = Vec::with_capacity(self.depth);
        let mut seen_own = false;

        backtrace::trace(|raw| {
            // inlined calls resolve to several symbols for one raw frame
            backtrace::resolve_frame(raw, |symbol| {
                if frames.len() >= self.depth {
                    return;
                }
                let Some(name) = symbol.name() else {
                    return;
                };
                let function = demangled(&name);
                if frames.is_empty() {
                    // unwinder and locator frames come first
                    if function.starts_with(OWN_FRAMES) {
                        seen_own = true;
                        return;
                    }
                    if !seen_own {
                        return;
                    }
                }
                frames.push(Frame {
                    function,
                    file: symbol
                        .filename()
                        .map(|path| path.display().to_string())
                        .unwrap_or_default(),
                    line: symbol.lineno().unwrap_or_default(),
                });
            });
            frames.len() < self.depth
        });

        select_frame(frames, &self.namespaces)
    }
}

fn demangled(name: &SymbolName<'_>) -> String {
    // alternate formatting drops the trailing hash
    format!("{name:#}")
}

/// Pick the first frame, innermost first, whose function is outside every
/// namespace. Falls back to the outermost frame when all of them match.
///
/// The returned function name is shortened with [`trim_function`].
pub fn select_frame<I>(frames: I, namespaces: &[String]) -> Option<Frame>
where
    I: IntoIterator<Item = Frame>,
{
    let mut selected = None;
    for frame in frames {
        let in_library = namespaces
            .iter()
            .any(|namespace| frame.function.contains(namespace.as_str()));
        selected = Some(frame);
        if !in_library {
            break;
        }
    }

    selected.map(|frame| Frame {
        function: trim_function(&frame.function).to_owned(),
        ..frame
    })
}

/// Shorten a demangled function path to `module::function`.
///
/// Trailing `{{closure}}` segments are removed first, since async functions
/// show up as closures of the function that defines them. Separators inside
/// `<...>` are not split on.
pub fn trim_function(function: &str) -> &str {
    let mut function = function;
    while let Some(outer) = function.strip_suffix("::{{closure}}") {
        function = outer;
    }

    let bytes = function.as_bytes();
    let mut separators = Vec::new();
    let mut nesting = 0usize;
    let mut i = 0;
    while i < bytes.len() {
        match bytes[i] {
            b'<' => nesting += 1,
            b'>' => nesting = nesting.saturating_sub(1),
            b':' if nesting == 0 && bytes.get(i + 1) == Some(&b':') => {
                separators.push(i);
                i += 1;
            }
            _ => {}
        }
        i += 1;
    }

    match separators.len() {
        0 | 1 => function,
        n => &function[separators[n - 2] + 2..],
    }
}
