// MIT License - Copyright (c) 2026 Peter Wright

use std::fmt;
use std::time::Duration;

use crate::constants::{
    BRIDGE_INTEGRATION_ID, ButtonAction, FIELD_SEP, KEEPALIVE_SYSTEM_ACTION, MAX_FADE_SECS,
    OutputAction, PROMPT_PREFIX, SIGIL_EXECUTE, SIGIL_QUERY, SIGIL_RESPONSE, SYSVAR_STATE_ACTION,
};
use crate::error::{LutronError, Result};

/// Lines exchanged with the bridge.
///
/// # Grammar
///
/// ```text
/// <sigil><KEYWORD>,<integration id>,<action>[,<operand>...]\r\n
/// ```
///
/// - `#` executes a command, `?` queries a value, `~` is a bridge-originated
///   reply or notification.
/// - `SYSTEM` and `ERROR` carry no integration id (`?SYSTEM,10`, `~ERROR,6`);
///   they decode with id `0`.
/// - The bridge prints a `GNET> ` prompt that can prefix any output line.
///
/// # Examples
///
/// ```text
/// #OUTPUT,4,1,50             set output 4 to 50%
/// #OUTPUT,4,1,75,00:00:05    ... fading over 5 seconds
/// ?OUTPUT,4,1                query output 4
/// ~OUTPUT,4,1,50.00          output 4 is at 50%
/// #DEVICE,1,3,3              press scene button 3 on the bridge
/// ~DEVICE,12,2,3             button 2 of remote 12 pressed
/// ~DEVICE,12,2,4             ... released
/// #SYSVAR,30,1,2             set variable 30 to state 2
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Sigil {
    Execute,
    Query,
    Response,
}

impl Sigil {
    pub fn from_char(c: char) -> Option<Self> {
        match c {
            SIGIL_EXECUTE => Some(Self::Execute),
            SIGIL_QUERY => Some(Self::Query),
            SIGIL_RESPONSE => Some(Self::Response),
            _ => None,
        }
    }

    pub fn as_char(&self) -> char {
        match self {
            Self::Execute => SIGIL_EXECUTE,
            Self::Query => SIGIL_QUERY,
            Self::Response => SIGIL_RESPONSE,
        }
    }
}

/// Operation keyword that follows the sigil.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    /// `OUTPUT` - dimmers, switches, shades, fans
    Output,
    /// `DEVICE` - keypad/remote components, bridge scenes
    Device,
    /// `SYSVAR` - system variables
    SysVar,
    /// `SYSTEM` - bridge-level settings and keep-alive
    System,
    /// `ERROR` - bridge rejected the previous command
    Error,
}

impl Operation {
    pub fn from_keyword(s: &str) -> Option<Self> {
        match s {
            "OUTPUT" => Some(Self::Output),
            "DEVICE" => Some(Self::Device),
            "SYSVAR" => Some(Self::SysVar),
            "SYSTEM" => Some(Self::System),
            "ERROR" => Some(Self::Error),
            _ => None,
        }
    }

    pub fn keyword(&self) -> &'static str {
        match self {
            Self::Output => "OUTPUT",
            Self::Device => "DEVICE",
            Self::SysVar => "SYSVAR",
            Self::System => "SYSTEM",
            Self::Error => "ERROR",
        }
    }

    /// Whether lines of this operation carry an integration id field.
    pub fn has_integration_id(&self) -> bool {
        !matches!(self, Self::System | Self::Error)
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.keyword())
    }
}

/// Routing key shared by pending queries and subscriptions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct DeviceKey {
    pub integration_id: u32,
    pub action: u32,
}

impl DeviceKey {
    pub fn new(integration_id: u32, action: u32) -> Self {
        Self {
            integration_id,
            action,
        }
    }
}

impl fmt::Display for DeviceKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "({}, {})", self.integration_id, self.action)
    }
}

/// Output level in hundredths of a percent (0.00 - 100.00).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct Level(u16);

impl Level {
    pub const OFF: Level = Level(0);
    pub const FULL: Level = Level(10_000);

    /// Whole percent, 0-100.
    pub fn from_percent(percent: u8) -> Option<Self> {
        (percent <= 100).then(|| Level(percent as u16 * 100))
    }

    pub fn from_hundredths(hundredths: u16) -> Option<Self> {
        (hundredths <= 10_000).then_some(Level(hundredths))
    }

    /// Rounds to the nearest hundredth; `None` outside 0-100.
    pub fn from_f64(value: f64) -> Option<Self> {
        if !value.is_finite() || !(0.0..=100.0).contains(&value) {
            return None;
        }
        Some(Level((value * 100.0).round() as u16))
    }

    pub fn hundredths(&self) -> u16 {
        self.0
    }

    pub fn as_f64(&self) -> f64 {
        self.0 as f64 / 100.0
    }

    /// Nearest whole percent.
    pub fn percent(&self) -> u8 {
        ((self.0 + 50) / 100) as u8
    }

    pub fn is_off(&self) -> bool {
        self.0 == 0
    }

    fn parse(field: &'static str, s: &str) -> std::result::Result<Self, ParseError> {
        if s.is_empty() || !s.chars().all(|c| c.is_ascii_digit() || c == '.') {
            return Err(ParseError::InvalidNumber {
                field,
                value: s.to_string(),
            });
        }
        let value: f64 = s.parse().map_err(|_| ParseError::InvalidNumber {
            field,
            value: s.to_string(),
        })?;
        Level::from_f64(value).ok_or_else(|| ParseError::OutOfRange {
            field,
            value: s.to_string(),
        })
    }
}

impl fmt::Display for Level {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_multiple_of(100) {
            write!(f, "{}", self.0 / 100)
        } else {
            write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
        }
    }
}

/// Fade or delay time, in hundredths of a second.
///
/// Capped at 4 hours. Values of a minute or more are whole seconds, which is
/// the resolution of the `hh:mm:ss` wire form.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FadeTime(u32);

impl FadeTime {
    pub const ZERO: FadeTime = FadeTime(0);

    pub fn from_secs(secs: u32) -> Self {
        FadeTime(secs.min(MAX_FADE_SECS) * 100)
    }

    /// Clamps to 0..=4h and rounds to the wire resolution.
    pub fn from_secs_f64(secs: f64) -> Self {
        if !secs.is_finite() || secs <= 0.0 {
            return Self::ZERO;
        }
        let secs = secs.min(MAX_FADE_SECS as f64);
        Self::normalized((secs * 100.0).round() as u32)
    }

    pub fn from_duration(duration: Duration) -> Self {
        Self::from_secs_f64(duration.as_secs_f64())
    }

    fn normalized(hundredths: u32) -> Self {
        let hundredths = hundredths.min(MAX_FADE_SECS * 100);
        if hundredths >= 6_000 {
            FadeTime((hundredths + 50) / 100 * 100)
        } else {
            FadeTime(hundredths)
        }
    }

    pub fn hundredths(&self) -> u32 {
        self.0
    }

    pub fn as_duration(&self) -> Duration {
        Duration::from_millis(self.0 as u64 * 10)
    }

    fn parse(field: &'static str, s: &str) -> std::result::Result<Self, ParseError> {
        let invalid = || ParseError::InvalidNumber {
            field,
            value: s.to_string(),
        };
        let out_of_range = || ParseError::OutOfRange {
            field,
            value: s.to_string(),
        };
        let parts: Vec<&str> = s.split(':').collect();
        if parts.len() > 3 || parts.iter().any(|p| p.is_empty()) {
            return Err(invalid());
        }

        // Only the seconds component may carry a fraction.
        let (whole, last) = parts.split_at(parts.len() - 1);
        let mut total: u64 = 0;
        for part in whole {
            if !part.chars().all(|c| c.is_ascii_digit()) {
                return Err(invalid());
            }
            let v: u64 = part.parse().map_err(|_| out_of_range())?;
            total = total
                .checked_add(v)
                .and_then(|t| t.checked_mul(60))
                .ok_or_else(out_of_range)?;
        }
        let secs = last[0];
        let (int_part, frac_part) = match secs.split_once('.') {
            Some((i, f)) => (i, f),
            None => (secs, ""),
        };
        if int_part.is_empty()
            || !int_part.chars().all(|c| c.is_ascii_digit())
            || !frac_part.chars().all(|c| c.is_ascii_digit())
            || frac_part.len() > 2
        {
            return Err(invalid());
        }
        let int_secs: u64 = int_part.parse().map_err(|_| out_of_range())?;
        let frac: u64 = match frac_part.len() {
            0 => 0,
            1 => frac_part.parse::<u64>().map_err(|_| invalid())? * 10,
            _ => frac_part.parse().map_err(|_| invalid())?,
        };
        let hundredths = total
            .checked_add(int_secs)
            .and_then(|t| t.checked_mul(100))
            .and_then(|t| t.checked_add(frac))
            .filter(|&h| h <= MAX_FADE_SECS as u64 * 100)
            .ok_or_else(out_of_range)?;
        Ok(Self::normalized(hundredths as u32))
    }
}

impl fmt::Display for FadeTime {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.0.is_multiple_of(100) {
            let secs = self.0 / 100;
            write!(f, "{:02}:{:02}:{:02}", secs / 3600, (secs / 60) % 60, secs % 60)
        } else {
            write!(f, "{}.{:02}", self.0 / 100, self.0 % 100)
        }
    }
}

/// Fan speeds, expressed on the wire as fixed output levels.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum FanSpeed {
    Off,
    Low,
    Medium,
    MediumHigh,
    High,
}

impl FanSpeed {
    pub fn level(&self) -> Level {
        let percent = match self {
            Self::Off => 0,
            Self::Low => 25,
            Self::Medium => 50,
            Self::MediumHigh => 75,
            Self::High => 100,
        };
        Level(percent * 100)
    }

    /// Nearest speed for a reported level.
    pub fn from_level(level: Level) -> Self {
        match level.hundredths() {
            0 => Self::Off,
            1..=3_749 => Self::Low,
            3_750..=6_249 => Self::Medium,
            6_250..=8_749 => Self::MediumHigh,
            _ => Self::High,
        }
    }

    pub fn from_name(s: &str) -> Option<Self> {
        match s.to_lowercase().as_str() {
            "off" => Some(Self::Off),
            "low" => Some(Self::Low),
            "medium" => Some(Self::Medium),
            "medium_high" | "mediumhigh" => Some(Self::MediumHigh),
            "high" => Some(Self::High),
            _ => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Off => "off",
            Self::Low => "low",
            Self::Medium => "medium",
            Self::MediumHigh => "medium_high",
            Self::High => "high",
        }
    }
}

/// A single operand value.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Operand {
    Integer(i64),
    Level(Level),
    Fade(FadeTime),
    Text(String),
}

impl Operand {
    pub fn as_integer(&self) -> Option<i64> {
        match self {
            Self::Integer(v) => Some(*v),
            _ => None,
        }
    }

    pub fn as_level(&self) -> Option<Level> {
        match self {
            Self::Level(l) => Some(*l),
            _ => None,
        }
    }

    pub fn as_fade(&self) -> Option<FadeTime> {
        match self {
            Self::Fade(t) => Some(*t),
            _ => None,
        }
    }
}

impl fmt::Display for Operand {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Integer(v) => write!(f, "{}", v),
            Self::Level(l) => write!(f, "{}", l),
            Self::Fade(t) => write!(f, "{}", t),
            Self::Text(s) => f.write_str(s),
        }
    }
}

/// How a decoded message was routed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MessageKind {
    /// Completed one of our queries.
    QueryReply,
    /// Anything else: state changes, button events, echoes.
    Notification,
}

/// A decoded protocol line.
#[derive(Debug, Clone, PartialEq)]
pub struct Message {
    pub sigil: Sigil,
    pub kind: MessageKind,
    pub operation: Operation,
    pub integration_id: u32,
    pub action: u32,
    pub operands: Vec<Operand>,
}

impl Message {
    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(self.integration_id, self.action)
    }

    pub fn operand(&self, index: usize) -> Option<&Operand> {
        self.operands.get(index)
    }

    /// First operand as a level (OUTPUT set/query replies).
    pub fn level(&self) -> Option<Level> {
        self.operands.first().and_then(Operand::as_level)
    }

    /// First operand as an integer (DEVICE actions, SYSVAR states).
    pub fn value(&self) -> Option<i64> {
        self.operands.first().and_then(Operand::as_integer)
    }

    /// Button action carried by a DEVICE line.
    pub fn button_action(&self) -> Option<ButtonAction> {
        if self.operation != Operation::Device {
            return None;
        }
        self.value().and_then(ButtonAction::from_value)
    }
}

/// A client-originated line, validated so that it decodes back to itself.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Command {
    sigil: Sigil,
    operation: Operation,
    integration_id: u32,
    action: u32,
    operands: Vec<Operand>,
}

impl Command {
    /// Build and validate an arbitrary command.
    pub fn new(
        sigil: Sigil,
        operation: Operation,
        integration_id: u32,
        action: u32,
        operands: Vec<Operand>,
    ) -> Result<Self> {
        if sigil == Sigil::Response {
            return Err(invalid_command("response lines are bridge-originated"));
        }
        if operation == Operation::Error {
            return Err(invalid_command("ERROR lines are bridge-originated"));
        }
        if !operation.has_integration_id() && integration_id != 0 {
            return Err(invalid_command(format!(
                "{} takes no integration id (got {})",
                operation, integration_id
            )));
        }
        for (index, operand) in operands.iter().enumerate() {
            let rendered = operand.to_string();
            if rendered.is_empty()
                || rendered.trim() != rendered
                || rendered.contains([FIELD_SEP, '\r', '\n'])
                || decode_operand(operation, action, index, &rendered).as_ref() != Ok(operand)
            {
                return Err(invalid_command(format!(
                    "operand {} ({:?}) does not fit {} action {}",
                    index, operand, operation, action
                )));
            }
        }
        Ok(Self {
            sigil,
            operation,
            integration_id,
            action,
            operands,
        })
    }

    fn unchecked(
        sigil: Sigil,
        operation: Operation,
        integration_id: u32,
        action: u32,
        operands: Vec<Operand>,
    ) -> Self {
        Self {
            sigil,
            operation,
            integration_id,
            action,
            operands,
        }
    }

    /// `#OUTPUT,<id>,1,<level>[,<fade>[,<delay>]]`
    pub fn set_level(
        integration_id: u32,
        level: Level,
        fade: Option<FadeTime>,
        delay: Option<FadeTime>,
    ) -> Self {
        let mut operands = vec![Operand::Level(level)];
        match (fade, delay) {
            (fade, Some(delay)) => {
                operands.push(Operand::Fade(fade.unwrap_or(FadeTime::ZERO)));
                operands.push(Operand::Fade(delay));
            }
            (Some(fade), None) => operands.push(Operand::Fade(fade)),
            (None, None) => {}
        }
        Self::unchecked(
            Sigil::Execute,
            Operation::Output,
            integration_id,
            OutputAction::Set.number(),
            operands,
        )
    }

    /// `?OUTPUT,<id>,1`
    pub fn query_output(integration_id: u32) -> Self {
        Self::unchecked(
            Sigil::Query,
            Operation::Output,
            integration_id,
            OutputAction::Set.number(),
            Vec::new(),
        )
    }

    /// `#OUTPUT,<id>,2`
    pub fn raise(integration_id: u32) -> Self {
        Self::output_action(integration_id, OutputAction::Raise)
    }

    /// `#OUTPUT,<id>,3`
    pub fn lower(integration_id: u32) -> Self {
        Self::output_action(integration_id, OutputAction::Lower)
    }

    /// `#OUTPUT,<id>,4`
    pub fn stop(integration_id: u32) -> Self {
        Self::output_action(integration_id, OutputAction::Stop)
    }

    fn output_action(integration_id: u32, action: OutputAction) -> Self {
        Self::unchecked(
            Sigil::Execute,
            Operation::Output,
            integration_id,
            action.number(),
            Vec::new(),
        )
    }

    pub fn set_fan_speed(integration_id: u32, speed: FanSpeed) -> Self {
        Self::set_level(integration_id, speed.level(), None, None)
    }

    /// `#DEVICE,<id>,<component>,3`
    pub fn press_button(integration_id: u32, component: u32) -> Self {
        Self::button(integration_id, component, ButtonAction::Press)
    }

    /// `#DEVICE,<id>,<component>,4`
    pub fn release_button(integration_id: u32, component: u32) -> Self {
        Self::button(integration_id, component, ButtonAction::Release)
    }

    fn button(integration_id: u32, component: u32, action: ButtonAction) -> Self {
        Self::unchecked(
            Sigil::Execute,
            Operation::Device,
            integration_id,
            component,
            vec![Operand::Integer(action.value())],
        )
    }

    /// Scenes are buttons on the bridge itself.
    pub fn activate_scene(scene_id: u32) -> Self {
        Self::press_button(BRIDGE_INTEGRATION_ID, scene_id)
    }

    /// `#SYSVAR,<id>,1,<state>`
    pub fn set_sysvar(integration_id: u32, state: i64) -> Self {
        Self::unchecked(
            Sigil::Execute,
            Operation::SysVar,
            integration_id,
            SYSVAR_STATE_ACTION,
            vec![Operand::Integer(state)],
        )
    }

    /// `?SYSVAR,<id>,1`
    pub fn query_sysvar(integration_id: u32) -> Self {
        Self::unchecked(
            Sigil::Query,
            Operation::SysVar,
            integration_id,
            SYSVAR_STATE_ACTION,
            Vec::new(),
        )
    }

    /// Keep-alive `?SYSTEM,10`.
    pub fn ping() -> Self {
        Self::unchecked(
            Sigil::Query,
            Operation::System,
            0,
            KEEPALIVE_SYSTEM_ACTION,
            Vec::new(),
        )
    }

    pub fn sigil(&self) -> Sigil {
        self.sigil
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn integration_id(&self) -> u32 {
        self.integration_id
    }

    pub fn action(&self) -> u32 {
        self.action
    }

    pub fn operands(&self) -> &[Operand] {
        &self.operands
    }

    pub fn key(&self) -> DeviceKey {
        DeviceKey::new(self.integration_id, self.action)
    }

    /// Wire representation without the line terminator.
    pub fn to_wire_string(&self) -> String {
        encode(self)
    }
}

impl fmt::Display for Command {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&encode(self))
    }
}

fn invalid_command(details: impl Into<String>) -> LutronError {
    LutronError::InvalidCommand {
        details: details.into(),
    }
}

/// Why an inbound line was dropped.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ParseError {
    #[error("empty line")]
    Empty,

    #[error("unknown sigil {0:?}")]
    UnknownSigil(char),

    #[error("unknown operation {0:?}")]
    UnknownOperation(String),

    #[error("missing {0}")]
    MissingField(&'static str),

    #[error("empty operand at position {position}")]
    EmptyField { position: usize },

    #[error("invalid {field}: {value:?}")]
    InvalidNumber { field: &'static str, value: String },

    #[error("{field} out of range: {value:?}")]
    OutOfRange { field: &'static str, value: String },
}

/// Encode a command into its wire line (without CR LF).
pub fn encode(command: &Command) -> String {
    let mut line = String::with_capacity(32);
    line.push(command.sigil.as_char());
    line.push_str(command.operation.keyword());
    if command.operation.has_integration_id() {
        line.push(FIELD_SEP);
        line.push_str(&command.integration_id.to_string());
    }
    line.push(FIELD_SEP);
    line.push_str(&command.action.to_string());
    for operand in &command.operands {
        line.push(FIELD_SEP);
        line.push_str(&operand.to_string());
    }
    line
}

/// Strip line terminators and any leading `GNET> ` prompts.
pub fn strip_prompt(line: &str) -> &str {
    let mut line = line.trim_end_matches(['\r', '\n']);
    while let Some(rest) = line.strip_prefix(PROMPT_PREFIX) {
        line = rest;
    }
    line.trim()
}

/// Decode a single line into a [`Message`].
pub fn decode(line: &str) -> std::result::Result<Message, ParseError> {
    let line = strip_prompt(line);
    let mut chars = line.chars();
    let first = chars.next().ok_or(ParseError::Empty)?;
    let sigil = Sigil::from_char(first).ok_or(ParseError::UnknownSigil(first))?;

    let mut fields = chars.as_str().split(FIELD_SEP);
    let keyword = fields.next().unwrap_or_default();
    let operation = Operation::from_keyword(keyword)
        .ok_or_else(|| ParseError::UnknownOperation(keyword.to_string()))?;

    let integration_id = if operation.has_integration_id() {
        parse_u32("integration id", fields.next())?
    } else {
        0
    };
    let action = parse_u32("action number", fields.next())?;

    let operands = fields
        .enumerate()
        .map(|(index, field)| decode_operand(operation, action, index, field))
        .collect::<std::result::Result<Vec<_>, _>>()?;

    Ok(Message {
        sigil,
        kind: MessageKind::Notification,
        operation,
        integration_id,
        action,
        operands,
    })
}

fn parse_u32(field: &'static str, value: Option<&str>) -> std::result::Result<u32, ParseError> {
    let value = value.ok_or(ParseError::MissingField(field))?;
    if value.is_empty() {
        return Err(ParseError::MissingField(field));
    }
    if !value.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber {
            field,
            value: value.to_string(),
        });
    }
    value.parse().map_err(|_| ParseError::OutOfRange {
        field,
        value: value.to_string(),
    })
}

fn parse_integer(field: &'static str, s: &str) -> std::result::Result<i64, ParseError> {
    let digits = s.strip_prefix('-').unwrap_or(s);
    if digits.is_empty() || !digits.chars().all(|c| c.is_ascii_digit()) {
        return Err(ParseError::InvalidNumber {
            field,
            value: s.to_string(),
        });
    }
    s.parse().map_err(|_| ParseError::OutOfRange {
        field,
        value: s.to_string(),
    })
}

/// Coerce one operand field according to its position.
fn decode_operand(
    operation: Operation,
    action: u32,
    index: usize,
    field: &str,
) -> std::result::Result<Operand, ParseError> {
    if field.is_empty() {
        return Err(ParseError::EmptyField { position: index });
    }
    let is_set = action == OutputAction::Set.number();
    match (operation, index) {
        (Operation::Output, 0) if is_set => Level::parse("level", field).map(Operand::Level),
        (Operation::Output, 1) if is_set => FadeTime::parse("fade time", field).map(Operand::Fade),
        (Operation::Output, 2) if is_set => {
            FadeTime::parse("delay time", field).map(Operand::Fade)
        }
        (Operation::Device, 0) => parse_integer("device action", field).map(Operand::Integer),
        (Operation::SysVar, 0) if action == SYSVAR_STATE_ACTION => {
            parse_integer("variable state", field).map(Operand::Integer)
        }
        _ => Ok(decode_generic(field)),
    }
}

fn decode_generic(field: &str) -> Operand {
    if let Ok(v) = parse_integer("operand", field) {
        return Operand::Integer(v);
    }
    match Level::parse("operand", field) {
        Ok(level) => Operand::Level(level),
        Err(_) => Operand::Text(field.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn assert_round_trip(command: &Command) {
        let line = encode(command);
        let message = decode(&line).unwrap_or_else(|e| panic!("{line}: {e}"));
        assert_eq!(message.sigil, command.sigil(), "{line}");
        assert_eq!(message.operation, command.operation(), "{line}");
        assert_eq!(message.integration_id, command.integration_id(), "{line}");
        assert_eq!(message.action, command.action(), "{line}");
        assert_eq!(message.operands, command.operands(), "{line}");
    }

    #[test]
    fn test_set_level_wire_format() {
        let cmd = Command::set_level(4, Level::from_percent(50).unwrap(), None, None);
        assert_eq!(cmd.to_wire_string(), "#OUTPUT,4,1,50");

        let cmd = Command::set_level(
            4,
            Level::from_f64(33.33).unwrap(),
            Some(FadeTime::from_secs(5)),
            None,
        );
        assert_eq!(cmd.to_wire_string(), "#OUTPUT,4,1,33.33,00:00:05");

        let cmd = Command::set_level(7, Level::FULL, None, Some(FadeTime::from_secs(90)));
        assert_eq!(cmd.to_wire_string(), "#OUTPUT,7,1,100,00:00:00,00:01:30");
    }

    #[test]
    fn test_other_command_wire_formats() {
        assert_eq!(Command::query_output(4).to_wire_string(), "?OUTPUT,4,1");
        assert_eq!(Command::raise(5).to_wire_string(), "#OUTPUT,5,2");
        assert_eq!(Command::lower(5).to_wire_string(), "#OUTPUT,5,3");
        assert_eq!(Command::stop(5).to_wire_string(), "#OUTPUT,5,4");
        assert_eq!(Command::activate_scene(3).to_wire_string(), "#DEVICE,1,3,3");
        assert_eq!(Command::release_button(12, 2).to_wire_string(), "#DEVICE,12,2,4");
        assert_eq!(Command::set_sysvar(30, 2).to_wire_string(), "#SYSVAR,30,1,2");
        assert_eq!(Command::query_sysvar(30).to_wire_string(), "?SYSVAR,30,1");
        assert_eq!(Command::ping().to_wire_string(), "?SYSTEM,10");
        assert_eq!(
            Command::set_fan_speed(9, FanSpeed::MediumHigh).to_wire_string(),
            "#OUTPUT,9,1,75"
        );
    }

    #[test]
    fn test_round_trip() {
        let commands = [
            Command::set_level(4, Level::from_percent(50).unwrap(), None, None),
            Command::set_level(
                4,
                Level::from_hundredths(1).unwrap(),
                Some(FadeTime::from_secs_f64(2.5)),
                Some(FadeTime::from_secs(3600)),
            ),
            Command::query_output(123),
            Command::stop(5),
            Command::press_button(12, 4),
            Command::set_sysvar(30, -1),
            Command::ping(),
            Command::new(
                Sigil::Execute,
                Operation::Device,
                12,
                14,
                vec![
                    Operand::Integer(14),
                    Operand::Level(Level::from_f64(12.5).unwrap()),
                    Operand::Text("00:00:02".to_string()),
                ],
            )
            .unwrap(),
            Command::new(
                Sigil::Query,
                Operation::System,
                0,
                1,
                Vec::new(),
            )
            .unwrap(),
        ];
        for command in &commands {
            assert_round_trip(command);
        }
    }

    #[test]
    fn test_decode_notification() {
        let msg = decode("~OUTPUT,4,1,50.00\r\n").unwrap();
        assert_eq!(msg.sigil, Sigil::Response);
        assert_eq!(msg.kind, MessageKind::Notification);
        assert_eq!(msg.operation, Operation::Output);
        assert_eq!(msg.key(), DeviceKey::new(4, 1));
        assert_eq!(msg.level(), Level::from_percent(50));
    }

    #[test]
    fn test_decode_strips_prompt() {
        let msg = decode("GNET> GNET> ~OUTPUT,4,1,0.00").unwrap();
        assert_eq!(msg.level(), Some(Level::OFF));
        assert_eq!(strip_prompt("GNET> "), "");
        assert_eq!(decode("GNET> "), Err(ParseError::Empty));
    }

    #[test]
    fn test_decode_button_bitmask_value_untouched() {
        let msg = decode("~DEVICE,12,2,19").unwrap();
        assert_eq!(msg.operation, Operation::Device);
        assert_eq!(msg.key(), DeviceKey::new(12, 2));
        assert_eq!(msg.value(), Some(19));
        assert_eq!(msg.button_action(), None);

        let press = decode("~DEVICE,12,2,3").unwrap();
        assert_eq!(press.button_action(), Some(ButtonAction::Press));
    }

    #[test]
    fn test_decode_error_and_system_lines() {
        let msg = decode("~ERROR,6").unwrap();
        assert_eq!(msg.operation, Operation::Error);
        assert_eq!(msg.integration_id, 0);
        assert_eq!(msg.action, 6);
        assert!(msg.operands.is_empty());

        let msg = decode("~SYSTEM,1,12:30:05").unwrap();
        assert_eq!(msg.operation, Operation::System);
        assert_eq!(msg.action, 1);
        assert_eq!(msg.operands, vec![Operand::Text("12:30:05".to_string())]);
    }

    #[test]
    fn test_decode_malformed_lines() {
        assert_eq!(decode(""), Err(ParseError::Empty));
        assert_eq!(decode("OUTPUT,4,1"), Err(ParseError::UnknownSigil('O')));
        assert_eq!(
            decode("~OUTP"),
            Err(ParseError::UnknownOperation("OUTP".to_string()))
        );
        assert_eq!(
            decode("~OUTPUT,4,"),
            Err(ParseError::MissingField("action number"))
        );
        assert_eq!(
            decode("~OUTPUT,4"),
            Err(ParseError::MissingField("action number"))
        );
        assert_eq!(
            decode("~OUTPUT,4,1,"),
            Err(ParseError::EmptyField { position: 0 })
        );
        assert!(matches!(
            decode("~OUTPUT,x,1,50"),
            Err(ParseError::InvalidNumber { field: "integration id", .. })
        ));
        assert!(matches!(
            decode("~OUTPUT,4,1,150"),
            Err(ParseError::OutOfRange { field: "level", .. })
        ));
        assert!(matches!(
            decode("~DEVICE,12,2,x"),
            Err(ParseError::InvalidNumber { field: "device action", .. })
        ));
    }

    #[test]
    fn test_level_formatting() {
        assert_eq!(Level::from_percent(100).unwrap().to_string(), "100");
        assert_eq!(Level::from_f64(0.5).unwrap().to_string(), "0.50");
        assert_eq!(Level::from_f64(99.999).unwrap().to_string(), "100");
        assert!(Level::from_percent(101).is_none());
        assert!(Level::from_f64(-1.0).is_none());
        assert!(Level::from_f64(f64::NAN).is_none());
        assert_eq!(Level::from_f64(49.6).unwrap().percent(), 50);
    }

    #[test]
    fn test_fade_time_formatting_and_parsing() {
        assert_eq!(FadeTime::from_secs(5).to_string(), "00:00:05");
        assert_eq!(FadeTime::from_secs(3725).to_string(), "01:02:05");
        assert_eq!(FadeTime::from_secs_f64(1.25).to_string(), "1.25");
        assert_eq!(FadeTime::from_secs_f64(61.4).to_string(), "00:01:01");
        assert_eq!(
            FadeTime::from_secs(5 * 60 * 60),
            FadeTime::from_secs(MAX_FADE_SECS)
        );

        assert_eq!(FadeTime::parse("fade", "0"), Ok(FadeTime::ZERO));
        assert_eq!(FadeTime::parse("fade", "2.5"), Ok(FadeTime::from_secs_f64(2.5)));
        assert_eq!(FadeTime::parse("fade", "01:30"), Ok(FadeTime::from_secs(90)));
        assert_eq!(FadeTime::parse("fade", "75.5"), Ok(FadeTime::from_secs(76)));
        assert!(FadeTime::parse("fade", "1:2:3:4").is_err());
        assert!(FadeTime::parse("fade", "05:").is_err());
        assert!(matches!(
            FadeTime::parse("fade", "05:00:00"),
            Err(ParseError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_huge_fade_components_are_out_of_range() {
        for fade in [
            "999999999999999999",
            "999999999999999999.5",
            "99999999999999999999999",
            "999999999999999999:00",
            "307445734561825860:00",
            "1:999999999999999999:00",
        ] {
            assert!(
                matches!(FadeTime::parse("fade", fade), Err(ParseError::OutOfRange { .. })),
                "{fade}"
            );
        }
        assert!(matches!(
            decode("~OUTPUT,4,1,50,999999999999999999"),
            Err(ParseError::OutOfRange { .. })
        ));
    }

    #[test]
    fn test_fan_speed_levels() {
        assert_eq!(FanSpeed::from_level(FanSpeed::Low.level()), FanSpeed::Low);
        assert_eq!(FanSpeed::from_level(Level::from_percent(30).unwrap()), FanSpeed::Low);
        assert_eq!(FanSpeed::from_level(Level::from_percent(60).unwrap()), FanSpeed::Medium);
        assert_eq!(FanSpeed::from_level(Level::OFF), FanSpeed::Off);
        assert_eq!(FanSpeed::from_level(Level::FULL), FanSpeed::High);
        assert_eq!(FanSpeed::from_name("MEDIUM_HIGH"), Some(FanSpeed::MediumHigh));
        assert_eq!(FanSpeed::from_name("turbo"), None);
    }

    #[test]
    fn test_command_validation() {
        assert!(matches!(
            Command::new(Sigil::Response, Operation::Output, 4, 1, Vec::new()),
            Err(LutronError::InvalidCommand { .. })
        ));
        assert!(Command::new(Sigil::Execute, Operation::Error, 0, 1, Vec::new()).is_err());
        assert!(Command::new(Sigil::Query, Operation::System, 3, 10, Vec::new()).is_err());
        // Text that reads back as a level.
        assert!(
            Command::new(
                Sigil::Execute,
                Operation::Output,
                4,
                1,
                vec![Operand::Text("50".to_string())]
            )
            .is_err()
        );
        assert!(
            Command::new(
                Sigil::Execute,
                Operation::SysVar,
                4,
                1,
                vec![Operand::Text("a,b".to_string())]
            )
            .is_err()
        );
        assert!(
            Command::new(
                Sigil::Execute,
                Operation::Output,
                4,
                1,
                vec![Operand::Level(Level::from_percent(20).unwrap())]
            )
            .is_ok()
        );
    }

    #[test]
    fn test_padded_text_operands_are_rejected() {
        for text in ["abc ", " abc", "abc\t"] {
            let result = Command::new(
                Sigil::Execute,
                Operation::SysVar,
                30,
                2,
                vec![Operand::Text(text.to_string())],
            );
            assert!(matches!(result, Err(LutronError::InvalidCommand { .. })), "{text:?}");
        }
        let inner = Command::new(
            Sigil::Execute,
            Operation::SysVar,
            30,
            2,
            vec![Operand::Text("a b".to_string())],
        )
        .unwrap();
        assert_round_trip(&inner);
    }
}
