//! Log line formatting for the driver daemon.
//!
//! Lines read `[timestamp] [mgmt-component] [hciN] [level] message key=value`.
//! The controller column is filled from an `hci` field and left blank for
//! events that concern no controller.

use std::fmt::{self, Write as _};
use std::io::IsTerminal;
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::fmt::{format::Writer, FmtContext, FormatEvent, FormatFields};
use tracing_subscriber::registry::LookupSpan;

const RESET: &str = "\x1b[0m";
const DIM: &str = "\x1b[90m";
const CYAN: &str = "\x1b[36m";

const COMPONENT_WIDTH: usize = 16;
const CONTROLLER_WIDTH: usize = 6;

/// Log at info level tagged with a component, optionally a controller
#[macro_export]
macro_rules! component_info {
    ($component:expr, hci = $index:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, hci = $index, $($arg)*)
    };
    ($component:expr, $($arg:tt)*) => {
        tracing::info!(component = $component, $($arg)*)
    };
}

/// Log at warn level tagged with a component, optionally a controller
#[macro_export]
macro_rules! component_warn {
    ($component:expr, hci = $index:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, hci = $index, $($arg)*)
    };
    ($component:expr, $($arg:tt)*) => {
        tracing::warn!(component = $component, $($arg)*)
    };
}

/// Log at debug level tagged with a component, optionally a controller
#[macro_export]
macro_rules! component_debug {
    ($component:expr, hci = $index:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, hci = $index, $($arg)*)
    };
    ($component:expr, $($arg:tt)*) => {
        tracing::debug!(component = $component, $($arg)*)
    };
}

/// Formatter producing one aligned line per event
pub struct MgmtLogFormatter {
    service: String,
    color: bool,
}

impl MgmtLogFormatter {
    pub fn new(service: &str) -> Self {
        Self {
            service: service.to_string(),
            color: color_enabled(),
        }
    }

    fn source(&self, component: Option<&str>) -> String {
        let name = match component {
            Some(component) => format!("{}-{}", self.service, component),
            None => self.service.clone(),
        };
        fit(&name, COMPONENT_WIDTH)
    }

    fn controller(index: Option<u64>) -> String {
        let label = index.map(|i| format!("hci{}", i)).unwrap_or_default();
        fit(&label, CONTROLLER_WIDTH)
    }

    fn level(&self, level: &Level) -> (&'static str, &'static str) {
        let label = match *level {
            Level::ERROR => "ERROR",
            Level::WARN => "WARN ",
            Level::INFO => "INFO ",
            Level::DEBUG => "DEBUG",
            Level::TRACE => "TRACE",
        };
        if !self.color {
            return (label, "");
        }
        let color = match *level {
            Level::ERROR => "\x1b[91m",
            Level::WARN => "\x1b[93m",
            Level::INFO => "\x1b[32m",
            Level::DEBUG | Level::TRACE => DIM,
        };
        (label, color)
    }
}

impl<S, N> FormatEvent<S, N> for MgmtLogFormatter
where
    S: Subscriber + for<'a> LookupSpan<'a>,
    N: for<'a> FormatFields<'a> + 'static,
{
    fn format_event(
        &self,
        _ctx: &FmtContext<'_, S, N>,
        mut writer: Writer<'_>,
        event: &Event<'_>,
    ) -> fmt::Result {
        let mut fields = EventFields::default();
        event.record(&mut fields);

        let timestamp = chrono::Local::now().format("%Y-%m-%d %H:%M:%S%.3f");
        let (label, color) = self.level(event.metadata().level());
        let (reset, cyan, dim) = if self.color {
            (RESET, CYAN, DIM)
        } else {
            ("", "", "")
        };

        write!(
            writer,
            "{}[{}]{} [{}] [{}] [{}{}{}] {}",
            cyan,
            timestamp,
            reset,
            self.source(fields.component.as_deref()),
            Self::controller(fields.hci),
            color,
            label,
            reset,
            fields.message
        )?;
        if !fields.extra.is_empty() {
            write!(writer, " {}{}{}", dim, fields.extra, reset)?;
        }
        writeln!(writer)
    }
}

/// Event fields split into the columns of a line
#[derive(Default)]
struct EventFields {
    message: String,
    component: Option<String>,
    hci: Option<u64>,
    extra: String,
}

impl EventFields {
    fn push_extra(&mut self, name: &str, value: fmt::Arguments<'_>) {
        if !self.extra.is_empty() {
            self.extra.push(' ');
        }
        let _ = write!(self.extra, "{}={}", name, value);
    }
}

impl Visit for EventFields {
    fn record_u64(&mut self, field: &Field, value: u64) {
        match field.name() {
            "hci" => self.hci = Some(value),
            name => self.push_extra(name, format_args!("{}", value)),
        }
    }

    fn record_i64(&mut self, field: &Field, value: i64) {
        match (field.name(), u64::try_from(value)) {
            ("hci", Ok(index)) => self.hci = Some(index),
            (name, _) => self.push_extra(name, format_args!("{}", value)),
        }
    }

    fn record_str(&mut self, field: &Field, value: &str) {
        match field.name() {
            "message" => self.message = value.to_string(),
            "component" => self.component = Some(value.to_string()),
            name => self.push_extra(name, format_args!("{:?}", value)),
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        match field.name() {
            "message" => self.message = format!("{:?}", value),
            "component" => self.component = Some(format!("{:?}", value).trim_matches('"').into()),
            name => self.push_extra(name, format_args!("{:?}", value)),
        }
    }
}

/// Pad or cut `text` to exactly `width` characters
fn fit(text: &str, width: usize) -> String {
    if text.chars().count() > width {
        let mut cut: String = text.chars().take(width - 1).collect();
        cut.push('…');
        cut
    } else {
        format!("{:<width$}", text, width = width)
    }
}

fn color_enabled() -> bool {
    std::env::var("TERM").map_or(true, |term| term != "dumb") && std::io::stdout().is_terminal()
}
