//! CSV printer: samples node voltages and active printables to a file.

use std::fs::File;
use std::io::{self, BufWriter, Stdout, Write};

use log::{info, warn};

use crate::circuit::{NodeId, Nodes, PrintFrame, PrintableInfo};
use crate::error::{Result, SimError};

use super::{Component, ConfigContext, SetupContext};

const CSV_PRINTER_HELP: &str = "printer-csv

| argument        | type          |
|-----------------|---------------|
| sampling mode   | string        |
| interval/points | double/size_t |
| file name       | string        |
| print mode      | string        |
| precision       | integer       |
| dump            | bool          |

sampling mode:
  interval: fixed interval in seconds
  points:   fixed number of rows over the run duration

file name:
  \"stdout\" writes to the terminal. Defaults to \"<label>.csv\".

print mode (how the samples of one interval are reduced):
  none, last: the last value
  average:    time-weighted average
  max / min:  largest / smallest value
  max-abs / min-abs:   largest / smallest magnitude, keeping the sign
  max-ampl / min-ampl: largest / smallest magnitude

precision:
  Significant digits after the decimal point (default 10).

dump:
  true writes a row on every iteration.

The printer keeps the simulation alive and shortens steps so that rows
land on the sampling instants.
";

/// How rows are spaced in time.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Sampling {
    /// One row every `interval` seconds
    Interval(f64),
    /// A fixed number of rows over the run duration
    Points(usize),
}

/// How the samples between two rows are reduced to one value.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PrintMode {
    Last,
    Average,
    Max,
    Min,
    MaxAbs,
    MinAbs,
    MaxAmpl,
    MinAmpl,
}

impl PrintMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "none" | "last" => Some(PrintMode::Last),
            "average" => Some(PrintMode::Average),
            "max" => Some(PrintMode::Max),
            "min" => Some(PrintMode::Min),
            "max-abs" => Some(PrintMode::MaxAbs),
            "min-abs" => Some(PrintMode::MinAbs),
            "max-ampl" => Some(PrintMode::MaxAmpl),
            "min-ampl" => Some(PrintMode::MinAmpl),
            _ => None,
        }
    }

    /// Which of `kept` and `candidate` survives the reduction.
    fn select(self, kept: f64, candidate: f64) -> f64 {
        let pick = match self {
            PrintMode::Last | PrintMode::Average => true,
            PrintMode::Max => candidate > kept,
            PrintMode::Min => candidate < kept,
            PrintMode::MaxAbs | PrintMode::MaxAmpl => candidate.abs() > kept.abs(),
            PrintMode::MinAbs | PrintMode::MinAmpl => candidate.abs() < kept.abs(),
        };
        if pick {
            candidate
        } else {
            kept
        }
    }
}

/// Reduction state of one column between two rows.
#[derive(Debug, Clone, Copy)]
struct Column {
    last: f64,
    weighted_sum: f64,
    weight: f64,
    extreme: Option<f64>,
}

impl Column {
    fn new() -> Self {
        Self {
            last: 0.0,
            weighted_sum: 0.0,
            weight: 0.0,
            extreme: None,
        }
    }

    fn push(&mut self, mode: PrintMode, value: f64, time_step: f64) {
        self.last = value;
        self.weighted_sum += value * time_step;
        self.weight += time_step;
        self.extreme = Some(match self.extreme {
            Some(kept) => mode.select(kept, value),
            None => value,
        });
    }

    fn value(&self, mode: PrintMode) -> f64 {
        match mode {
            PrintMode::Last => self.last,
            PrintMode::Average if self.weight > 0.0 => self.weighted_sum / self.weight,
            PrintMode::Average => self.last,
            PrintMode::MaxAmpl | PrintMode::MinAmpl => self.extreme.unwrap_or(self.last).abs(),
            _ => self.extreme.unwrap_or(self.last),
        }
    }

    fn clear(&mut self) {
        self.weighted_sum = 0.0;
        self.weight = 0.0;
        self.extreme = None;
    }
}

#[derive(Debug)]
enum Sink {
    Stdout(Stdout),
    File(BufWriter<File>),
}

impl Write for Sink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            Sink::Stdout(out) => out.write(buf),
            Sink::File(file) => file.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            Sink::Stdout(out) => out.flush(),
            Sink::File(file) => file.flush(),
        }
    }
}

/// Writes a CSV row of node voltages and printables at every sampling instant.
#[derive(Debug)]
pub struct CsvPrinter {
    label: String,
    pub sampling: Sampling,
    pub path: String,
    pub mode: PrintMode,
    pub precision: usize,
    pub dump: bool,

    interval: f64,
    next_print: f64,
    sink: Option<Sink>,
    node_columns: Vec<(NodeId, Column)>,
    printable_columns: Vec<Column>,
}

impl CsvPrinter {
    /// Create a printer writing to `path` ("stdout" for the terminal).
    pub fn new(label: impl Into<String>, sampling: Sampling, path: impl Into<String>) -> Self {
        Self {
            label: label.into(),
            sampling,
            path: path.into(),
            mode: PrintMode::Last,
            precision: 10,
            dump: false,
            interval: 0.0,
            next_print: 0.0,
            sink: None,
            node_columns: Vec::new(),
            printable_columns: Vec::new(),
        }
    }

    pub fn with_mode(mut self, mode: PrintMode) -> Self {
        self.mode = mode;
        self
    }

    pub fn with_precision(mut self, precision: usize) -> Self {
        self.precision = precision;
        self
    }

    pub(crate) fn unconfigured(label: String) -> Self {
        let path = format!("{}.csv", label);
        Self::new(label, Sampling::Interval(10e-3), path)
    }

    fn open(&mut self) -> Result<&mut Sink> {
        let sink = match self.sink.take() {
            Some(sink) => sink,
            None if self.path == "stdout" => Sink::Stdout(io::stdout()),
            None => {
                let file = File::create(&self.path).map_err(|e| SimError::output(&self.path, e))?;
                info!("<printer-csv> {}: writing to {}", self.label, self.path);
                Sink::File(BufWriter::new(file))
            }
        };
        Ok(self.sink.insert(sink))
    }

    fn write_header(&mut self, nodes: &Nodes, printables: &[PrintableInfo]) -> Result<()> {
        let mut header = String::from("time,iteration");
        for (_, node) in nodes.iter().filter(|(_, n)| !n.is_hidden()) {
            header.push(',');
            if node.label().is_empty() {
                header.push_str("undef");
            } else {
                header.push_str(node.label());
            }
        }
        for printable in printables {
            header.push_str(&format!(",{} [{}]", printable.name, printable.unit));
        }
        let path = self.path.clone();
        let sink = self.open()?;
        writeln!(sink, "{}", header).map_err(|e| SimError::output(&path, e))
    }

    fn write_row(&mut self, time: f64, iteration: u64) -> Result<()> {
        let mut row = format!("{:e},{}", time, iteration);
        let columns = self
            .node_columns
            .iter_mut()
            .map(|(_, column)| column)
            .chain(self.printable_columns.iter_mut());
        for column in columns {
            row.push_str(&format!(",{:.*e}", self.precision, column.value(self.mode)));
            column.clear();
        }
        let path = self.path.clone();
        let sink = self.open()?;
        writeln!(sink, "{}", row).map_err(|e| SimError::output(&path, e))
    }
}

impl Component for CsvPrinter {
    fn label(&self) -> &str {
        &self.label
    }

    fn model(&self) -> &'static str {
        "printer-csv"
    }

    fn configure(&mut self, ctx: &mut ConfigContext<'_>) {
        match ctx.word() {
            Some("interval") => {
                let interval = ctx.value("interval", 10e-3);
                if interval <= 0.0 {
                    ctx.error("interval must be greater than 0");
                }
                self.sampling = Sampling::Interval(interval);
            }
            Some("points") => {
                let points = ctx.value("points", 1000.0);
                if points < 1.0 {
                    ctx.error("points must be at least 1");
                }
                self.sampling = Sampling::Points(points as usize);
            }
            _ => {
                ctx.error("sampling mode unknown, available options are \"interval\" and \"points\"");
                return;
            }
        }

        self.path = match ctx.word() {
            Some(path) => path.to_string(),
            None => format!("{}.csv", self.label),
        };

        if let Some(name) = ctx.word() {
            match PrintMode::from_name(name) {
                Some(mode) => self.mode = mode,
                None => ctx.error(format!("print mode \"{}\" unknown", name)),
            }
        }
        self.precision = ctx.value("precision", 10.0).max(0.0) as usize;
        self.dump = ctx.flag("dump", false);
        ctx.info(format!("printing to \"{}\"", self.path));
    }

    fn setup(&mut self, ctx: &mut SetupContext<'_>) {
        self.interval = match self.sampling {
            Sampling::Interval(interval) => interval,
            Sampling::Points(points) => {
                let duration = ctx.config.effective_duration();
                if duration.is_finite() {
                    duration / (points as f64 - 0.5)
                } else {
                    warn!(
                        "<printer-csv> {}: points sampling needs a finite duration, printing every {:e} s",
                        self.label, ctx.config.time_step_max
                    );
                    ctx.config.time_step_max
                }
            }
        };
    }

    fn setup_printer(&mut self, nodes: &Nodes, printables: &[PrintableInfo]) -> Result<()> {
        self.node_columns = nodes
            .iter()
            .filter(|(_, n)| !n.is_hidden())
            .map(|(id, _)| (id, Column::new()))
            .collect();
        self.printable_columns = vec![Column::new(); printables.len()];
        self.write_header(nodes, printables)
    }

    fn clear_variables(&mut self) {
        self.next_print = 0.0;
    }

    fn update(&mut self, _nodes: &mut Nodes, _time: f64, _last_time_step: f64) {}

    fn printer(
        &mut self,
        frame: &PrintFrame<'_>,
        time: f64,
        time_step: f64,
        iteration: u64,
    ) -> Result<()> {
        let mode = self.mode;
        for (id, column) in self.node_columns.iter_mut() {
            column.push(mode, frame.nodes.voltage(*id), time_step);
        }
        for (index, column) in self.printable_columns.iter_mut().enumerate() {
            column.push(mode, frame.value(index), time_step);
        }

        if time >= self.next_print || self.dump {
            self.write_row(time, iteration)?;
            if time >= self.next_print {
                self.next_print += self.interval;
            }
        }
        Ok(())
    }

    fn keep_simulation_alive(&self, _time: f64) -> bool {
        true
    }

    fn time_step_max(&self, time: f64) -> f64 {
        self.next_print - time
    }

    fn simulation_complete(&mut self) -> Result<()> {
        if let Some(mut sink) = self.sink.take() {
            sink.flush().map_err(|e| SimError::output(&self.path, e))?;
        }
        Ok(())
    }

    fn help(&self) -> &'static str {
        CSV_PRINTER_HELP
    }
}
