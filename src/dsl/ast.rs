//! Command types produced by the netlist parser.

/// A parsed netlist: commands in script order.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Netlist {
    pub commands: Vec<Command>,
}

impl Netlist {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.commands.len()
    }

    pub fn is_empty(&self) -> bool {
        self.commands.is_empty()
    }
}

/// One netlist command with the line it came from.
#[derive(Debug, Clone, PartialEq)]
pub struct Command {
    pub kind: CommandKind,
    /// Source line number for error reporting
    pub line: usize,
}

/// Netlist commands.
#[derive(Debug, Clone, PartialEq)]
pub enum CommandKind {
    /// `node <id> <capacitance>`
    Node { label: String, capacitance: f64 },
    /// `component <id> <model> <args...>`
    ///
    /// Arguments stay as raw text; each model parses its own.
    Component {
        label: String,
        model: String,
        args: String,
    },
    /// `edit node <id> <field> <value>`
    EditNode { label: String, edit: NodeEdit },
    /// `param <name> <value>`
    Param { param: SimParam, value: f64 },
    /// `print var <printable> [true|false]`
    PrintVar { name: String, active: bool },
    /// `run`
    Run,
}

/// Node attributes editable after creation.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum NodeEdit {
    Ground(bool),
    Hidden(bool),
    Capacitance(f64),
    VoltageDifferenceMax(f64),
}

/// Simulator parameters settable from a netlist.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SimParam {
    /// `vd-max`: largest voltage change of a node per step
    VoltageDifferenceMax,
    /// `ts-max`: largest time step
    TimeStepMax,
    /// `duration`: run length, 0 runs while a component keeps it alive
    Duration,
}

impl SimParam {
    /// Parse a parameter name.
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "vd-max" => Some(Self::VoltageDifferenceMax),
            "ts-max" => Some(Self::TimeStepMax),
            "duration" => Some(Self::Duration),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::VoltageDifferenceMax => "vd-max",
            Self::TimeStepMax => "ts-max",
            Self::Duration => "duration",
        }
    }
}
