use crate::link::LinkError;
use rosc::{OscMessage, OscPacket, OscType};
use serde::Serialize;

/// A key event from the grid. `value` is 1 on press and 0 on release.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct GridPress {
    pub x: u8,
    pub y: u8,
    pub value: i32,
}

impl GridPress {
    pub fn new(x: u8, y: u8, value: i32) -> Self {
        Self { x, y, value }
    }

    pub fn is_press(&self) -> bool {
        self.value == 1
    }

    pub fn is_release(&self) -> bool {
        self.value == 0
    }
}

// Message types received from the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum IncomingMessage {
    Press(GridPress),
}

impl IncomingMessage {
    pub fn from_osc(msg: &OscMessage, prefix: &str) -> Result<Self, LinkError> {
        if msg.addr != format!("{}/press", prefix) {
            return Err(LinkError::UnknownAddress(msg.addr.clone()));
        }

        let ints = msg
            .args
            .iter()
            .map(osc_int)
            .collect::<Option<Vec<i32>>>()
            .ok_or_else(|| {
                LinkError::Malformed(format!("non-integer press arguments: {:?}", msg.args))
            })?;

        // Emulators differ on whether a device id leads the coordinates
        let (x, y, value) = match ints.as_slice() {
            [x, y, v] | [_, x, y, v] => (*x, *y, *v),
            _ => {
                return Err(LinkError::Malformed(format!(
                    "press expects 3 or 4 arguments, got {}",
                    ints.len()
                )))
            }
        };

        let coordinate = |c: i32| {
            u8::try_from(c)
                .map_err(|_| LinkError::Malformed(format!("press coordinate out of range: {}", c)))
        };

        Ok(IncomingMessage::Press(GridPress {
            x: coordinate(x)?,
            y: coordinate(y)?,
            value,
        }))
    }
}

fn osc_int(arg: &OscType) -> Option<i32> {
    match arg {
        OscType::Int(v) => Some(*v),
        OscType::Long(v) => i32::try_from(*v).ok(),
        OscType::Float(v) if v.fract() == 0.0 => Some(*v as i32),
        _ => None,
    }
}

// Message types sent to the grid
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OutgoingMessage {
    SysPrefix(String),
    Led { x: u8, y: u8, on: bool },
    LedRow { y: u8, mask: u32 },
    LedCol { x: u8, mask: u32 },
}

impl OutgoingMessage {
    pub fn address(&self, prefix: &str) -> String {
        match self {
            OutgoingMessage::SysPrefix(_) => "/sys/prefix".to_string(),
            OutgoingMessage::Led { .. } => format!("{}/led", prefix),
            OutgoingMessage::LedRow { .. } => format!("{}/led_row", prefix),
            OutgoingMessage::LedCol { .. } => format!("{}/led_col", prefix),
        }
    }

    pub fn to_packet(&self, prefix: &str) -> OscPacket {
        let args = match self {
            OutgoingMessage::SysPrefix(p) => vec![OscType::String(p.clone())],
            OutgoingMessage::Led { x, y, on } => vec![
                OscType::Int(*x as i32),
                OscType::Int(*y as i32),
                OscType::Int(*on as i32),
            ],
            OutgoingMessage::LedRow { y, mask } => {
                vec![OscType::Int(*y as i32), OscType::Int(*mask as i32)]
            }
            OutgoingMessage::LedCol { x, mask } => {
                vec![OscType::Int(*x as i32), OscType::Int(*mask as i32)]
            }
        };

        OscPacket::Message(OscMessage {
            addr: self.address(prefix),
            args,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn press_message(args: Vec<OscType>) -> OscMessage {
        OscMessage {
            addr: "/ableton/press".to_string(),
            args,
        }
    }

    #[test]
    fn test_press_with_three_ints() {
        let msg = press_message(vec![OscType::Int(3), OscType::Int(5), OscType::Int(1)]);
        let parsed = IncomingMessage::from_osc(&msg, "/ableton").unwrap();
        assert_eq!(parsed, IncomingMessage::Press(GridPress::new(3, 5, 1)));
    }

    #[test]
    fn test_press_with_leading_device_id() {
        let msg = press_message(vec![
            OscType::Int(0),
            OscType::Int(7),
            OscType::Int(0),
            OscType::Int(0),
        ]);
        let parsed = IncomingMessage::from_osc(&msg, "/ableton").unwrap();
        assert_eq!(parsed, IncomingMessage::Press(GridPress::new(7, 0, 0)));
    }

    #[test]
    fn test_press_accepts_whole_floats() {
        let msg = press_message(vec![
            OscType::Float(2.0),
            OscType::Float(1.0),
            OscType::Float(1.0),
        ]);
        let parsed = IncomingMessage::from_osc(&msg, "/ableton").unwrap();
        assert_eq!(parsed, IncomingMessage::Press(GridPress::new(2, 1, 1)));
    }

    #[test]
    fn test_press_rejections() {
        let wrong_prefix = OscMessage {
            addr: "/other/press".to_string(),
            args: vec![OscType::Int(0), OscType::Int(0), OscType::Int(1)],
        };
        assert!(matches!(
            IncomingMessage::from_osc(&wrong_prefix, "/ableton"),
            Err(LinkError::UnknownAddress(addr)) if addr == "/other/press"
        ));

        let too_short = press_message(vec![OscType::Int(0), OscType::Int(1)]);
        assert!(matches!(
            IncomingMessage::from_osc(&too_short, "/ableton"),
            Err(LinkError::Malformed(_))
        ));

        let negative = press_message(vec![OscType::Int(-1), OscType::Int(0), OscType::Int(1)]);
        assert!(matches!(
            IncomingMessage::from_osc(&negative, "/ableton"),
            Err(LinkError::Malformed(_))
        ));

        let text = press_message(vec![
            OscType::String("x".to_string()),
            OscType::Int(0),
            OscType::Int(1),
        ]);
        assert!(matches!(
            IncomingMessage::from_osc(&text, "/ableton"),
            Err(LinkError::Malformed(_))
        ));
    }

    #[test]
    fn test_outgoing_message_packets() {
        let prefix = OutgoingMessage::SysPrefix("/ableton".to_string()).to_packet("/ableton");
        assert_eq!(
            prefix,
            OscPacket::Message(OscMessage {
                addr: "/sys/prefix".to_string(),
                args: vec![OscType::String("/ableton".to_string())],
            })
        );

        let row = OutgoingMessage::LedRow { y: 2, mask: 0b101 }.to_packet("/ableton");
        assert_eq!(
            row,
            OscPacket::Message(OscMessage {
                addr: "/ableton/led_row".to_string(),
                args: vec![OscType::Int(2), OscType::Int(5)],
            })
        );

        let led = OutgoingMessage::Led { x: 7, y: 7, on: true }.to_packet("/grid");
        assert_eq!(
            led,
            OscPacket::Message(OscMessage {
                addr: "/grid/led".to_string(),
                args: vec![OscType::Int(7), OscType::Int(7), OscType::Int(1)],
            })
        );

        assert_eq!(
            OutgoingMessage::LedCol { x: 3, mask: 0 }.address("/ableton"),
            "/ableton/led_col"
        );
    }
}
