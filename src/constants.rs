// MIT License - Copyright (c) 2026 Peter Wright

/// Line sigils.
pub const SIGIL_EXECUTE: char = '#';
pub const SIGIL_QUERY: char = '?';
pub const SIGIL_RESPONSE: char = '~';

/// Field delimiter inside a line.
pub const FIELD_SEP: char = ',';

/// Line terminator used in both directions.
pub const LINE_END: &str = "\r\n";

/// Default Telnet port of the bridge.
pub const DEFAULT_PORT: u16 = 23;

/// Factory integration credentials.
pub const DEFAULT_USER: &str = "lutron";
pub const DEFAULT_PASSWORD: &str = "integration";

/// Login handshake markers.
pub const LOGIN_PROMPT: &[u8] = b"login: ";
pub const PASSWORD_PROMPT: &[u8] = b"password: ";
pub const COMMAND_PROMPT: &[u8] = b"GNET> ";
pub const LOGIN_INCORRECT: &[u8] = b"login incorrect";

/// Prompt text as it may prefix bridge output lines.
pub const PROMPT_PREFIX: &str = "GNET> ";

/// Integration ID of the bridge itself. Its buttons are scenes.
pub const BRIDGE_INTEGRATION_ID: u32 = 1;

/// SYSTEM action used as keep-alive (`?SYSTEM,10`).
pub const KEEPALIVE_SYSTEM_ACTION: u32 = 10;

/// Upper bound for a buffered, unterminated line before it is discarded.
pub const MAX_LINE_LEN: usize = 4096;

/// Read chunk size for the socket.
pub const READ_SIZE: usize = 1024;

/// Longest fade/delay the bridge accepts, in seconds (4 hours).
pub const MAX_FADE_SECS: u32 = 4 * 60 * 60;

/// OUTPUT action numbers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(u32)]
pub enum OutputAction {
    /// Set (or query) level / position / speed
    Set = 1,
    /// Start raising
    Raise = 2,
    /// Start lowering
    Lower = 3,
    /// Stop raising/lowering
    Stop = 4,
}

impl OutputAction {
    pub fn from_u32(v: u32) -> Option<Self> {
        match v {
            1 => Some(Self::Set),
            2 => Some(Self::Raise),
            3 => Some(Self::Lower),
            4 => Some(Self::Stop),
            _ => None,
        }
    }

    pub fn number(self) -> u32 {
        self as u32
    }
}

/// DEVICE component actions for keypad and remote buttons.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
#[repr(i64)]
pub enum ButtonAction {
    Press = 3,
    Release = 4,
}

impl ButtonAction {
    pub fn from_value(v: i64) -> Option<Self> {
        match v {
            3 => Some(Self::Press),
            4 => Some(Self::Release),
            _ => None,
        }
    }

    pub fn value(self) -> i64 {
        self as i64
    }
}

/// SYSVAR action for the variable state.
pub const SYSVAR_STATE_ACTION: u32 = 1;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_output_action_numbers() {
        assert_eq!(OutputAction::Set.number(), 1);
        assert_eq!(OutputAction::from_u32(4), Some(OutputAction::Stop));
        assert_eq!(OutputAction::from_u32(9), None);
    }

    #[test]
    fn test_button_action_values() {
        assert_eq!(ButtonAction::from_value(3), Some(ButtonAction::Press));
        assert_eq!(ButtonAction::from_value(4), Some(ButtonAction::Release));
        assert_eq!(ButtonAction::from_value(5), None);
    }
}
