//! Codec trait and the text codec for omok wire lines.
//!
//! A "codec" (coder/decoder) converts between [`Message`] values and the
//! text lines that travel on the socket. The transport layer doesn't care
//! HOW a message is spelled; it just needs something that implements the
//! [`Codec`] trait.
//!
//! # Grammar
//!
//! ```text
//! line      := header body?
//! header    := "play:" | "play_ack:" | "move:" | "move_ack:" | "quit:"
//! body      := intfield ("," intfield)*
//! intfield  := optional whitespace, decimal integer, optional whitespace
//! ```
//!
//! The codec never emits or expects the trailing `\n`; line framing is the
//! transport's job.
//!
//! # Decoding never fails
//!
//! A line that can't be understood decodes to [`Message::Unknown`] rather
//! than an error, so one bad line can't take down a receive loop. How
//! forgiving the decoder is about the *numbers* inside a body is chosen
//! with [`ParsePolicy`].

use serde::{Deserialize, Serialize};

use crate::{Message, MessageKind, PlayAnswer, ProtocolError};

/// Value substituted for an integer field that doesn't parse.
///
/// Under [`ParsePolicy::Permissive`] this flows downstream as an ordinary
/// coordinate or flag. `-1` is never a legal board cell, so the rule
/// engine rejects it; as a flag it is non-zero and therefore "true".
const SENTINEL: i32 = -1;

// Headers in the order the decoder tries them. Longer headers come before
// any shorter sibling they share a prefix with.
const QUIT: &str = "quit:";
const PLAY_ACK: &str = "play_ack:";
const PLAY: &str = "play:";
const MOVE_ACK: &str = "move_ack:";
const MOVE: &str = "move:";

// ---------------------------------------------------------------------------
// Codec trait
// ---------------------------------------------------------------------------

/// Converts messages to wire lines and back.
///
/// `Send + Sync + 'static` because a single codec is shared between the
/// caller threads that send and the task that receives.
pub trait Codec: Send + Sync + 'static {
    /// Encodes a message as one line of text, without the trailing newline.
    ///
    /// # Errors
    /// Returns [`ProtocolError::NotEncodable`] for [`Message::Unknown`] and
    /// [`Message::Closed`], which have no wire form.
    fn encode(&self, message: &Message) -> Result<String, ProtocolError>;

    /// Decodes one line of text (newline already stripped).
    ///
    /// Anything the codec doesn't understand becomes [`Message::Unknown`].
    fn decode(&self, line: &str) -> Message;
}

// ---------------------------------------------------------------------------
// ParsePolicy
// ---------------------------------------------------------------------------

/// How the decoder treats malformed numbers in a message body.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize,
)]
#[serde(rename_all = "snake_case")]
pub enum ParsePolicy {
    /// Wire-compatible with every deployed peer.
    ///
    /// - An unparsable integer becomes `-1`.
    /// - Any accepted-flag other than a literal `0` counts as accepted,
    ///   and the same goes for the turn flag.
    /// - Extra fields are ignored.
    #[default]
    Permissive,

    /// Rejects anything that isn't exactly what a well-behaved peer sends.
    ///
    /// - Bodies must have exactly two fields (none for `play:`/`quit:`).
    /// - Flags must be `0` or `1`.
    /// - Coordinates must be non-negative integers.
    ///
    /// Violations decode to [`Message::Unknown`].
    Strict,
}

// ---------------------------------------------------------------------------
// TextCodec
// ---------------------------------------------------------------------------

/// The line-oriented text [`Codec`] used on the wire.
///
/// ## Example
///
/// ```rust
/// use omok_protocol::{Codec, Message, PlayAnswer, TextCodec};
///
/// let codec = TextCodec::permissive();
///
/// let line = codec.encode(&Message::Move { col: 3, row: 4 }).unwrap();
/// assert_eq!(line, "move:3,4");
///
/// let ack = codec.decode("play_ack:1,1");
/// assert_eq!(
///     ack,
///     Message::PlayAck(PlayAnswer::Accepted { requester_first: true })
/// );
/// ```
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TextCodec {
    policy: ParsePolicy,
}

impl TextCodec {
    /// Creates a codec with the given parse policy.
    pub fn new(policy: ParsePolicy) -> Self {
        Self { policy }
    }

    /// A codec with [`ParsePolicy::Permissive`].
    pub fn permissive() -> Self {
        Self::new(ParsePolicy::Permissive)
    }

    /// A codec with [`ParsePolicy::Strict`].
    pub fn strict() -> Self {
        Self::new(ParsePolicy::Strict)
    }

    /// The parse policy this codec decodes with.
    pub fn policy(&self) -> ParsePolicy {
        self.policy
    }

    fn decode_empty(&self, body: &str, message: Message) -> Message {
        match self.policy {
            ParsePolicy::Permissive => message,
            ParsePolicy::Strict if body.trim().is_empty() => message,
            ParsePolicy::Strict => Message::Unknown,
        }
    }

    fn decode_play_ack(&self, body: &str) -> Message {
        let fields = fields(body);
        let answer = match self.policy {
            ParsePolicy::Permissive => {
                let Some(first) = fields.first() else {
                    return Message::Unknown;
                };
                if parse_permissive(first) == 0 {
                    PlayAnswer::Rejected
                } else {
                    // The turn slot is only read for an acceptance. A
                    // missing one is a truncated line, not a default.
                    let Some(second) = fields.get(1) else {
                        return Message::Unknown;
                    };
                    PlayAnswer::Accepted {
                        requester_first: parse_permissive(second) != 0,
                    }
                }
            }
            ParsePolicy::Strict => {
                let [accepted, turn] = fields.as_slice() else {
                    return Message::Unknown;
                };
                match (parse_flag(accepted), parse_flag(turn)) {
                    (Some(false), Some(_)) => PlayAnswer::Rejected,
                    (Some(true), Some(requester_first)) => {
                        PlayAnswer::Accepted { requester_first }
                    }
                    _ => return Message::Unknown,
                }
            }
        };
        Message::PlayAck(answer)
    }

    fn decode_coords(&self, body: &str) -> Option<(i32, i32)> {
        let fields = fields(body);
        match self.policy {
            ParsePolicy::Permissive => match fields.as_slice() {
                [col, row, ..] => {
                    Some((parse_permissive(col), parse_permissive(row)))
                }
                _ => None,
            },
            ParsePolicy::Strict => match fields.as_slice() {
                [col, row] => {
                    let col = parse_strict(col).filter(|v| *v >= 0)?;
                    let row = parse_strict(row).filter(|v| *v >= 0)?;
                    Some((col, row))
                }
                _ => None,
            },
        }
    }
}

impl Codec for TextCodec {
    fn encode(&self, message: &Message) -> Result<String, ProtocolError> {
        let line = match message {
            Message::Play => PLAY.to_string(),
            Message::Quit => QUIT.to_string(),
            Message::PlayAck(answer) => format!(
                "{PLAY_ACK}{},{}",
                u8::from(answer.is_accepted()),
                u8::from(answer.requester_first()),
            ),
            Message::Move { col, row } => format!("{MOVE}{col},{row}"),
            Message::MoveAck { col, row } => format!("{MOVE_ACK}{col},{row}"),
            Message::Unknown => {
                return Err(ProtocolError::NotEncodable(MessageKind::Unknown));
            }
            Message::Closed => {
                return Err(ProtocolError::NotEncodable(MessageKind::Closed));
            }
        };
        Ok(line)
    }

    fn decode(&self, line: &str) -> Message {
        if let Some(body) = line.strip_prefix(QUIT) {
            self.decode_empty(body, Message::Quit)
        } else if let Some(body) = line.strip_prefix(PLAY_ACK) {
            self.decode_play_ack(body)
        } else if let Some(body) = line.strip_prefix(PLAY) {
            self.decode_empty(body, Message::Play)
        } else if let Some(body) = line.strip_prefix(MOVE_ACK) {
            self.decode_coords(body)
                .map_or(Message::Unknown, |(col, row)| Message::MoveAck {
                    col,
                    row,
                })
        } else if let Some(body) = line.strip_prefix(MOVE) {
            self.decode_coords(body)
                .map_or(Message::Unknown, |(col, row)| Message::Move {
                    col,
                    row,
                })
        } else {
            Message::Unknown
        }
    }
}

/// Encodes with the default (permissive) [`TextCodec`].
pub fn encode(message: &Message) -> Result<String, ProtocolError> {
    TextCodec::default().encode(message)
}

/// Decodes with the default (permissive) [`TextCodec`].
pub fn decode(line: &str) -> Message {
    TextCodec::default().decode(line)
}

// ---------------------------------------------------------------------------
// Field helpers
// ---------------------------------------------------------------------------

/// Splits a body on `,`, dropping trailing empty fields.
///
/// `"3,"` yields one field, not two: a dangling comma doesn't invent a
/// value. Interior empties are kept (`"3,,4"` has three fields).
fn fields(body: &str) -> Vec<&str> {
    let mut fields: Vec<&str> = body.split(',').collect();
    while fields.last().is_some_and(|f| f.is_empty()) {
        fields.pop();
    }
    fields
}

fn parse_strict(field: &str) -> Option<i32> {
    field.trim().parse().ok()
}

fn parse_permissive(field: &str) -> i32 {
    parse_strict(field).unwrap_or(SENTINEL)
}

fn parse_flag(field: &str) -> Option<bool> {
    match parse_strict(field)? {
        0 => Some(false),
        1 => Some(true),
        _ => None,
    }
}

// =========================================================================
// Tests
// =========================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn accepted(requester_first: bool) -> Message {
        Message::PlayAck(PlayAnswer::Accepted { requester_first })
    }

    // =====================================================================
    // Encoding
    // =====================================================================

    #[test]
    fn test_encode_exact_lines() {
        assert_eq!(encode(&Message::Play).unwrap(), "play:");
        assert_eq!(encode(&Message::Quit).unwrap(), "quit:");
        assert_eq!(encode(&accepted(true)).unwrap(), "play_ack:1,1");
        assert_eq!(encode(&accepted(false)).unwrap(), "play_ack:1,0");
        assert_eq!(
            encode(&Message::PlayAck(PlayAnswer::Rejected)).unwrap(),
            "play_ack:0,0"
        );
        assert_eq!(
            encode(&Message::Move { col: 3, row: 4 }).unwrap(),
            "move:3,4"
        );
        assert_eq!(
            encode(&Message::MoveAck { col: 0, row: 14 }).unwrap(),
            "move_ack:0,14"
        );
    }

    #[test]
    fn test_encode_local_only_kinds_is_an_error() {
        assert_eq!(
            encode(&Message::Unknown),
            Err(ProtocolError::NotEncodable(MessageKind::Unknown))
        );
        assert_eq!(
            encode(&Message::Closed),
            Err(ProtocolError::NotEncodable(MessageKind::Closed))
        );
    }

    #[test]
    fn test_decode_reverses_encode() {
        let messages = [
            Message::Play,
            Message::Quit,
            Message::PlayAck(PlayAnswer::Rejected),
            accepted(true),
            accepted(false),
            Message::Move { col: 3, row: 4 },
            Message::Move { col: -7, row: i32::MAX },
            Message::MoveAck { col: 14, row: 0 },
        ];
        for codec in [TextCodec::permissive(), TextCodec::strict()] {
            for msg in messages {
                // Strict rejects negative coordinates.
                if codec.policy() == ParsePolicy::Strict
                    && matches!(msg, Message::Move { col, .. } if col < 0)
                {
                    continue;
                }
                let line = codec.encode(&msg).unwrap();
                assert_eq!(codec.decode(&line), msg, "line {line:?}");
            }
        }
    }

    // =====================================================================
    // Header matching
    // =====================================================================

    #[test]
    fn test_quit_header_wins_regardless_of_body() {
        assert_eq!(decode("quit:"), Message::Quit);
        assert_eq!(decode("quit:move:1,2"), Message::Quit);
        assert_eq!(decode("quit:play_ack:1,1"), Message::Quit);
    }

    #[test]
    fn test_unknown_headers() {
        assert_eq!(decode(""), Message::Unknown);
        assert_eq!(decode("hello"), Message::Unknown);
        assert_eq!(decode("PLAY:"), Message::Unknown);
        assert_eq!(decode(" play:"), Message::Unknown);
        assert_eq!(decode("play"), Message::Unknown);
    }

    #[test]
    fn test_play_ignores_body_when_permissive() {
        assert_eq!(decode("play:"), Message::Play);
        assert_eq!(decode("play: now"), Message::Play);
    }

    // =====================================================================
    // play_ack
    // =====================================================================

    #[test]
    fn test_play_ack_rejection_ignores_turn_flag() {
        assert_eq!(decode("play_ack:0,0"), Message::PlayAck(PlayAnswer::Rejected));
        assert_eq!(decode("play_ack:0,1"), Message::PlayAck(PlayAnswer::Rejected));
        assert_eq!(decode("play_ack:0"), Message::PlayAck(PlayAnswer::Rejected));
    }

    #[test]
    fn test_play_ack_any_nonzero_flag_counts_as_true() {
        assert_eq!(decode("play_ack:1,1"), accepted(true));
        assert_eq!(decode("play_ack:2,0"), accepted(false));
        // Unparsable flags fall to the -1 sentinel, which is non-zero.
        assert_eq!(decode("play_ack:yes,no"), accepted(true));
        assert_eq!(decode("play_ack: 1 , 0 "), accepted(false));
    }

    #[test]
    fn test_play_ack_truncated_bodies_are_unknown() {
        assert_eq!(decode("play_ack:"), Message::Unknown);
        assert_eq!(decode("play_ack:1"), Message::Unknown);
        assert_eq!(decode("play_ack:1,"), Message::Unknown);
    }

    // =====================================================================
    // move / move_ack
    // =====================================================================

    #[test]
    fn test_move_with_unparsable_field_uses_sentinel() {
        assert_eq!(decode("move:3,x"), Message::Move { col: 3, row: -1 });
        assert_eq!(decode("move_ack:?,4"), Message::MoveAck { col: -1, row: 4 });
    }

    #[test]
    fn test_move_fields_are_trimmed() {
        assert_eq!(decode("move: 3 , 4"), Message::Move { col: 3, row: 4 });
        assert_eq!(decode("move_ack:\t5,6 "), Message::MoveAck { col: 5, row: 6 });
    }

    #[test]
    fn test_move_needs_two_fields() {
        assert_eq!(decode("move:"), Message::Unknown);
        assert_eq!(decode("move:3"), Message::Unknown);
        assert_eq!(decode("move:3,"), Message::Unknown);
        assert_eq!(decode("move_ack:7"), Message::Unknown);
    }

    #[test]
    fn test_move_extra_fields_are_ignored_when_permissive() {
        assert_eq!(decode("move:1,2,3"), Message::Move { col: 1, row: 2 });
    }

    #[test]
    fn test_move_ack_is_not_mistaken_for_move() {
        assert_eq!(decode("move_ack:1,2"), Message::MoveAck { col: 1, row: 2 });
    }

    // =====================================================================
    // Strict policy
    // =====================================================================

    #[test]
    fn test_strict_rejects_malformed_numbers() {
        let codec = TextCodec::strict();
        assert_eq!(codec.decode("move:3,x"), Message::Unknown);
        assert_eq!(codec.decode("move:-1,4"), Message::Unknown);
        assert_eq!(codec.decode("move:1,2,3"), Message::Unknown);
        assert_eq!(codec.decode("move: 3 , 4 "), Message::Move { col: 3, row: 4 });
    }

    #[test]
    fn test_strict_play_ack_needs_binary_flags() {
        let codec = TextCodec::strict();
        assert_eq!(codec.decode("play_ack:2,0"), Message::Unknown);
        assert_eq!(codec.decode("play_ack:yes,no"), Message::Unknown);
        assert_eq!(codec.decode("play_ack:0"), Message::Unknown);
        assert_eq!(
            codec.decode("play_ack:0,1"),
            Message::PlayAck(PlayAnswer::Rejected)
        );
        assert_eq!(codec.decode("play_ack:1,0"), accepted(false));
    }

    #[test]
    fn test_strict_bodyless_headers_must_be_bare() {
        let codec = TextCodec::strict();
        assert_eq!(codec.decode("play:"), Message::Play);
        assert_eq!(codec.decode("quit: "), Message::Quit);
        assert_eq!(codec.decode("play: now"), Message::Unknown);
    }

    #[test]
    fn test_parse_policy_defaults_to_permissive() {
        assert_eq!(ParsePolicy::default(), ParsePolicy::Permissive);
    }

    #[test]
    fn test_fields_drop_only_trailing_empties() {
        assert_eq!(fields(""), Vec::<&str>::new());
        assert_eq!(fields("3,"), vec!["3"]);
        assert_eq!(fields("3,,4"), vec!["3", "", "4"]);
        assert_eq!(fields(" , "), vec![" ", " "]);
    }
}
