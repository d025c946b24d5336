//! Cursor command implementation.

use serde::Serialize;
use tailfeed_protocol::Timestamp;

/// Decoded cursor representation for output.
#[derive(Debug, Serialize, PartialEq, Eq)]
pub struct CursorInfo {
    /// Cursor in wire form.
    pub cursor: String,
    /// Seconds since the Unix epoch.
    pub seconds: u32,
    /// Increment within the second.
    pub increment: u32,
}

impl From<Timestamp> for CursorInfo {
    fn from(ts: Timestamp) -> Self {
        Self {
            cursor: ts.encode(),
            seconds: ts.high,
            increment: ts.low,
        }
    }
}

/// Runs `cursor decode`.
pub fn decode(cursor: &str, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    let info = CursorInfo::from(Timestamp::decode(cursor)?);
    print_info(&info, format)
}

/// Runs `cursor now`.
pub fn now(format: &str) -> Result<(), Box<dyn std::error::Error>> {
    print_info(&CursorInfo::from(Timestamp::now()), format)
}

fn print_info(info: &CursorInfo, format: &str) -> Result<(), Box<dyn std::error::Error>> {
    match format {
        "json" => println!("{}", serde_json::to_string_pretty(info)?),
        _ => print!("{}", render_text(info)),
    }
    Ok(())
}

fn render_text(info: &CursorInfo) -> String {
    format!(
        "Cursor:    {}\nSeconds:   {}\nIncrement: {}\n",
        info.cursor, info.seconds, info.increment
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn info_from_timestamp() {
        let info = CursorInfo::from(Timestamp::new(1_700_000_000, 7));
        assert_eq!(info.cursor, "1700000000_7");
        assert_eq!(info.seconds, 1_700_000_000);
        assert_eq!(info.increment, 7);
    }

    #[test]
    fn text_output() {
        let info = CursorInfo::from(Timestamp::new(100, 2));
        assert_eq!(
            render_text(&info),
            "Cursor:    100_2\nSeconds:   100\nIncrement: 2\n"
        );
    }

    #[test]
    fn decode_rejects_garbage() {
        assert!(decode("abc", "text").is_err());
        assert!(decode("100_2", "json").is_ok());
    }
}
