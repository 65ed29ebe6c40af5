//! Lifecycle status enums.
//!
//! Each status is stored as lowercase text in the database and travels as the
//! same string on the wire. `TryFrom<String>` lets `sqlx::FromRow` decode the
//! column directly via `#[sqlx(try_from = "String")]`.

use crate::error::CoreError;

macro_rules! define_status_enum {
    (
        $(#[$meta:meta])*
        $name:ident {
            $( $(#[$vmeta:meta])* $variant:ident = $val:literal ),+ $(,)?
        }
    ) => {
        $(#[$meta])*
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
        pub enum $name {
            $( $(#[$vmeta])* #[serde(rename = $val)] $variant ),+
        }

        impl $name {
            /// Return the stored string form.
            pub fn as_str(self) -> &'static str {
                match self {
                    $( $name::$variant => $val ),+
                }
            }
        }

        impl std::fmt::Display for $name {
            fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
                f.write_str(self.as_str())
            }
        }

        impl std::str::FromStr for $name {
            type Err = CoreError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $( $val => Ok($name::$variant), )+
                    other => Err(CoreError::Validation(format!(
                        concat!("unknown ", stringify!($name), " '{}'"),
                        other
                    ))),
                }
            }
        }

        impl TryFrom<String> for $name {
            type Error = CoreError;

            fn try_from(value: String) -> Result<Self, Self::Error> {
                value.parse()
            }
        }
    };
}

define_status_enum! {
    /// Node lifecycle status.
    NodeStatus {
        Registered = "registered",
        Active = "active",
        Inactive = "inactive",
        Drained = "drained",
    }
}

define_status_enum! {
    /// Outcome a node reports after applying a configuration.
    ConfigAckStatus {
        Applied = "applied",
        Failed = "failed",
    }
}

define_status_enum! {
    /// Task status, derived from its job on every terminal write.
    TaskStatus {
        Pending = "pending",
        Running = "running",
        Completed = "completed",
        Failed = "failed",
        Cancelled = "cancelled",
    }
}

define_status_enum! {
    /// Job execution status.
    JobStatus {
        Queued = "queued",
        Running = "running",
        Completed = "completed",
        Failed = "failed",
        Cancelled = "cancelled",
        /// Reserved for a future reclaim path; nothing writes it today.
        LeaseExpired = "lease_expired",
    }
}

impl JobStatus {
    /// Task status mirrored from a terminal job status.
    pub fn task_status(self) -> TaskStatus {
        match self {
            JobStatus::Queued => TaskStatus::Pending,
            JobStatus::Running => TaskStatus::Running,
            JobStatus::Completed => TaskStatus::Completed,
            JobStatus::Cancelled => TaskStatus::Cancelled,
            JobStatus::Failed | JobStatus::LeaseExpired => TaskStatus::Failed,
        }
    }

    pub fn is_terminal(self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;

    #[test]
    fn status_strings_parse_back() {
        assert_eq!("lease_expired".parse::<JobStatus>().unwrap(), JobStatus::LeaseExpired);
        assert_eq!(NodeStatus::Drained.as_str(), "drained");
        assert_eq!(
            NodeStatus::try_from("active".to_string()).unwrap(),
            NodeStatus::Active
        );
    }

    #[test]
    fn unknown_status_is_a_validation_error() {
        assert_matches!("paused".parse::<TaskStatus>(), Err(CoreError::Validation(_)));
    }

    #[test]
    fn serde_uses_lowercase_names() {
        let json = serde_json::to_string(&ConfigAckStatus::Applied).unwrap();
        assert_eq!(json, "\"applied\"");
        let parsed: JobStatus = serde_json::from_str("\"completed\"").unwrap();
        assert_eq!(parsed, JobStatus::Completed);
    }

    #[test]
    fn terminal_job_status_maps_onto_task() {
        assert_eq!(JobStatus::Completed.task_status(), TaskStatus::Completed);
        assert_eq!(JobStatus::Failed.task_status(), TaskStatus::Failed);
        assert!(!JobStatus::Running.is_terminal());
    }
}
