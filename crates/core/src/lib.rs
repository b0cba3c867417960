#![forbid(unsafe_code)]

pub mod outline;
pub mod roster;

pub mod ids {
    /// Stable team identifier. The only key that survives re-sorting and
    /// re-filtering of the roster.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct TeamId(i64);

    impl TeamId {
        pub fn new(value: i64) -> Self {
            Self(value)
        }

        pub fn get(self) -> i64 {
            self.0
        }
    }

    /// Homologation zone identifier. Each zone carries its own checklist
    /// and its own edit scope within a team.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct ZoneId(i64);

    impl ZoneId {
        pub fn new(value: i64) -> Self {
            Self(value)
        }

        pub fn get(self) -> i64 {
            self.0
        }
    }

    /// Checklist point identifier (sections and leaf points share the
    /// same id space).
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct PointId(i64);

    impl PointId {
        pub fn new(value: i64) -> Self {
            Self(value)
        }

        pub fn get(self) -> i64 {
            self.0
        }
    }

    /// 1-based position of a team row under one filter/sort snapshot.
    ///
    /// Deliberately a distinct type from [`TeamId`]: a row position is only
    /// meaningful against the roster query that produced it and must be
    /// resolved back to a `TeamId` immediately before any mutating
    /// operation.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord)]
    pub struct RowPosition(i64);

    impl RowPosition {
        pub fn new(value: i64) -> Self {
            Self(value)
        }

        pub fn get(self) -> i64 {
            self.0
        }
    }

    /// Identity of one judging station, used as the lock holder recorded
    /// in the shared store.
    #[derive(Clone, Debug, PartialEq, Eq, Hash)]
    pub struct StationId(String);

    impl StationId {
        pub fn as_str(&self) -> &str {
            &self.0
        }

        pub fn try_new(value: impl Into<String>) -> Result<Self, StationIdError> {
            let value = value.into();
            validate_station_id(&value)?;
            Ok(Self(value))
        }
    }

    #[derive(Clone, Debug, PartialEq, Eq)]
    pub enum StationIdError {
        Empty,
        TooLong,
        InvalidFirstChar,
        InvalidChar { ch: char, index: usize },
    }

    impl StationIdError {
        pub fn message(&self) -> &'static str {
            match self {
                Self::Empty => "station id must not be empty",
                Self::TooLong => "station id is too long",
                Self::InvalidFirstChar => "station id must start with an ascii letter or digit",
                Self::InvalidChar { .. } => "station id contains an invalid character",
            }
        }
    }

    fn validate_station_id(value: &str) -> Result<(), StationIdError> {
        if value.is_empty() {
            return Err(StationIdError::Empty);
        }
        if value.len() > 64 {
            return Err(StationIdError::TooLong);
        }
        let mut chars = value.chars();
        let Some(first) = chars.next() else {
            return Err(StationIdError::Empty);
        };
        if !first.is_ascii_alphanumeric() {
            return Err(StationIdError::InvalidFirstChar);
        }
        for (index, ch) in value.chars().enumerate() {
            if index == 0 {
                continue;
            }
            if ch.is_ascii_alphanumeric() || matches!(ch, '.' | '_' | '-') {
                continue;
            }
            return Err(StationIdError::InvalidChar { ch, index });
        }
        Ok(())
    }
}

pub mod checklist {
    use crate::ids::PointId;

    /// A cleared point: the robot passed this check. Sections with this
    /// value keep their descendants collapsed.
    pub const CLEARED: i64 = 0;
    /// A pending point: still to be reviewed (the initial state).
    pub const PENDING: i64 = 1;

    /// One flat row of a team's checklist for a zone, as read from the
    /// store ordered by (level, sort_key, point_id).
    #[derive(Clone, Debug, PartialEq, Eq)]
    pub struct ChecklistItem {
        pub point_id: PointId,
        pub parent_section_id: Option<PointId>,
        pub level: u32,
        pub is_section: bool,
        /// 0 (cleared), 1 (pending) or NULL (not applicable).
        pub value: Option<i64>,
        pub description: String,
    }

    /// The value a toggle moves to: 1 becomes 0, anything else (0 or
    /// NULL) becomes 1.
    pub fn toggled(value: Option<i64>) -> i64 {
        if value == Some(PENDING) { CLEARED } else { PENDING }
    }
}
