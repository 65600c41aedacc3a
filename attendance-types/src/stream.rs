use serde::{Deserialize, Serialize};

use crate::error::Error;

/// The viewer-facing stream kind. Chosen by priority `Attendance > Headcount > Ot`
/// when multiple stream types have active viewers on the same camera.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StreamType {
    Attendance,
    Headcount,
    Ot,
}

impl StreamType {
    pub fn priority(&self) -> u8 {
        match self {
            StreamType::Attendance => 2,
            StreamType::Headcount => 1,
            StreamType::Ot => 0,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            StreamType::Attendance => "attendance",
            StreamType::Headcount => "headcount",
            StreamType::Ot => "ot",
        }
    }

    pub fn parse(value: &str) -> Result<Self, Error> {
        match value.trim().to_ascii_lowercase().as_str() {
            "attendance" => Ok(StreamType::Attendance),
            "headcount" => Ok(StreamType::Headcount),
            "ot" => Ok(StreamType::Ot),
            other => Err(Error::UnknownStreamType(other.to_string())),
        }
    }

    /// Like [`Self::parse`], but falls back to `Attendance` on any unrecognized
    /// or missing value, matching the original service's permissive behavior.
    pub fn normalize(value: Option<&str>) -> Self {
        value
            .and_then(|v| Self::parse(v).ok())
            .unwrap_or(StreamType::Attendance)
    }

    /// Picks the highest-priority stream type among currently active viewers.
    pub fn active_of(counts: impl IntoIterator<Item = (StreamType, u32)>) -> Option<StreamType> {
        counts
            .into_iter()
            .filter(|(_, count)| *count > 0)
            .max_by_key(|(stream_type, _)| stream_type.priority())
            .map(|(stream_type, _)| stream_type)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn unknown_stream_type_normalizes_to_attendance() {
        assert_eq!(StreamType::normalize(Some("bogus")), StreamType::Attendance);
        assert_eq!(StreamType::normalize(None), StreamType::Attendance);
    }

    #[test]
    fn active_stream_type_picks_highest_priority() {
        let active = StreamType::active_of([
            (StreamType::Ot, 3),
            (StreamType::Headcount, 1),
            (StreamType::Attendance, 0),
        ]);
        assert_eq!(active, Some(StreamType::Headcount));
    }

    #[test]
    fn no_active_viewers_yields_none() {
        let active = StreamType::active_of([(StreamType::Attendance, 0)]);
        assert_eq!(active, None);
    }
}
