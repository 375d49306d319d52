//! Status helper enums mapping to SMALLINT lookup tables.
//!
//! Each variant's discriminant matches the seed data in the corresponding
//! `*_statuses` table.

/// Status ID type matching SMALLINT/SMALLSERIAL in the database.
pub type StatusId = i16;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:expr => $label:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[repr(i16)]
        #[derive(Debug, Clone, Copy, PartialEq, Eq)]
        pub enum $name {
            $( $(#[$vmeta])* $variant = $val ),+
        }

        impl $name {
            /// Return the database status ID.
            pub fn id(self) -> StatusId {
                self as StatusId
            }

            /// Lower-case name as seeded in the lookup table.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $label ),+
                }
            }

            pub fn from_id(id: StatusId) -> Option<Self> {
                match id {
                    $( x if x == $val => Some($name::$variant), )+
                    _ => None,
                }
            }
        }

        impl From<$name> for StatusId {
            fn from(value: $name) -> Self {
                value as StatusId
            }
        }
    };
}

define_status_enum! {
    /// Comparison job lifecycle.
    ComparisonJobStatus {
        Pending = 1 => "pending",
        Processing = 2 => "processing",
        Completed = 3 => "completed",
        Failed = 4 => "failed",
    }
}

impl ComparisonJobStatus {
    /// Pending or processing.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Pending | Self::Processing)
    }
}

/// Stored `ai_analysis_status` values.
pub mod ai_status {
    pub const PENDING: &str = "pending";
    pub const PROCESSING: &str = "processing";
    pub const COMPLETED: &str = "completed";
    pub const FAILED: &str = "failed";

    pub fn is_in_flight(value: Option<&str>) -> bool {
        matches!(value, Some(PENDING) | Some(PROCESSING))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn comparison_job_status_ids_match_seed_data() {
        assert_eq!(ComparisonJobStatus::Pending.id(), 1);
        assert_eq!(ComparisonJobStatus::Processing.id(), 2);
        assert_eq!(ComparisonJobStatus::Completed.id(), 3);
        assert_eq!(ComparisonJobStatus::Failed.id(), 4);
    }

    #[test]
    fn status_into_status_id() {
        let id: StatusId = ComparisonJobStatus::Processing.into();
        assert_eq!(id, 2);
    }

    #[test]
    fn from_id_round_trips() {
        for status in [
            ComparisonJobStatus::Pending,
            ComparisonJobStatus::Processing,
            ComparisonJobStatus::Completed,
            ComparisonJobStatus::Failed,
        ] {
            assert_eq!(ComparisonJobStatus::from_id(status.id()), Some(status));
        }
        assert_eq!(ComparisonJobStatus::from_id(9), None);
        assert_eq!(ComparisonJobStatus::Failed.as_str(), "failed");
    }

    #[test]
    fn only_pending_and_processing_are_active() {
        assert!(ComparisonJobStatus::Pending.is_active());
        assert!(ComparisonJobStatus::Processing.is_active());
        assert!(!ComparisonJobStatus::Completed.is_active());
        assert!(ai_status::is_in_flight(Some("processing")));
        assert!(!ai_status::is_in_flight(Some("failed")));
        assert!(!ai_status::is_in_flight(None));
    }
}
