pub const IAC: u8 = 0xff;
pub const DONT: u8 = 0xfe;
pub const DO: u8 = 0xfd;
pub const WONT: u8 = 0xfc;
pub const WILL: u8 = 0xfb;
pub const SB: u8 = 0xfa;
pub const SE: u8 = 0xf0;

pub const OPT_ECHO: u8 = 1;
pub const OPT_SUPPRESS_GO_AHEAD: u8 = 3;

const NUL: u8 = 0x00;

/// One decoder decision per input byte.
#[derive(Debug, PartialEq, Eq)]
pub enum Decoded {
    /// A payload byte for the client.
    Data(u8),
    /// Byte consumed with nothing to show (stripped NUL, collapsed LF,
    /// escape prefix).
    Nothing,
    /// A completed command sequence, reported so the caller can log it.
    /// The option is present for WILL/WONT/DO/DONT.
    Command { command: u8, option: Option<u8> },
}

#[derive(Debug, Default)]
enum DecoderState {
    #[default]
    Normal,
    AfterCr,
    SawIac,
    SawOption(u8),
}

/// Inbound telnet decoder.
///
/// Strips NUL bytes, folds CR and CR LF into a single LF (a lone LF passes
/// through untouched), and consumes IAC sequences without acting on them.
/// State persists across input chunks, so sequences split at any boundary
/// decode the same as contiguous ones.
#[derive(Debug, Default)]
pub struct TelnetDecoder {
    state: DecoderState,
}

impl TelnetDecoder {
    pub fn decode(&mut self, byte: u8) -> Decoded {
        match self.state {
            DecoderState::Normal => self.decode_normal(byte),
            DecoderState::AfterCr => {
                // NUL is transparent even here, so CR NUL LF still folds.
                if byte == NUL {
                    return Decoded::Nothing;
                }
                self.state = DecoderState::Normal;
                if byte == b'\n' {
                    Decoded::Nothing
                } else {
                    self.decode_normal(byte)
                }
            }
            DecoderState::SawIac => match byte {
                WILL | WONT | DO | DONT => {
                    self.state = DecoderState::SawOption(byte);
                    Decoded::Nothing
                }
                other => {
                    self.state = DecoderState::Normal;
                    Decoded::Command {
                        command: other,
                        option: None,
                    }
                }
            },
            DecoderState::SawOption(command) => {
                self.state = DecoderState::Normal;
                Decoded::Command {
                    command,
                    option: Some(byte),
                }
            }
        }
    }

    fn decode_normal(&mut self, byte: u8) -> Decoded {
        match byte {
            IAC => {
                self.state = DecoderState::SawIac;
                Decoded::Nothing
            }
            b'\r' => {
                self.state = DecoderState::AfterCr;
                Decoded::Data(b'\n')
            }
            NUL => Decoded::Nothing,
            other => Decoded::Data(other),
        }
    }
}

/// Command byte name for log output.
pub fn command_name(command: u8) -> &'static str {
    match command {
        WILL => "WILL",
        WONT => "WONT",
        DO => "DO",
        DONT => "DONT",
        SB => "SB",
        SE => "SE",
        IAC => "IAC",
        _ => "other",
    }
}
