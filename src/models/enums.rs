use crate::db::DatabaseError;
use serde::{Deserialize, Serialize};

/// Macro to generate enum with as_str + std::str::FromStr pattern
macro_rules! str_enum {
    ($name:ident { $($variant:ident => $s:literal),+ $(,)? }) => {
        #[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
        pub enum $name {
            $($variant),+
        }

        impl $name {
            pub fn as_str(&self) -> &'static str {
                match self {
                    $(Self::$variant => $s),+
                }
            }
        }

        impl std::str::FromStr for $name {
            type Err = DatabaseError;

            fn from_str(s: &str) -> Result<Self, Self::Err> {
                match s {
                    $($s => Ok(Self::$variant)),+,
                    _ => Err(DatabaseError::InvalidEnum {
                        field: stringify!($name).into(),
                        value: s.into(),
                    }),
                }
            }
        }
    };
}

str_enum!(RequestStatus {
    Draft => "draft",
    Pending => "pending",
    Sent => "sent",
    Received => "received",
    Verifying => "verifying",
    Completed => "completed",
    Expired => "expired",
});

impl RequestStatus {
    /// Position on the forward ladder. The lifecycle tracker only moves
    /// status to a higher rank; `expired` sits outside the ladder.
    pub fn rank(&self) -> u8 {
        match self {
            Self::Draft => 0,
            Self::Pending => 1,
            Self::Sent => 2,
            Self::Received => 3,
            Self::Verifying => 4,
            Self::Completed => 5,
            Self::Expired => 6,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Completed | Self::Expired)
    }

    /// A request still awaiting documents — the correlator's candidate set.
    pub fn is_open(&self) -> bool {
        !self.is_terminal()
    }
}

str_enum!(Verdict {
    Verified => "verified",
    NeedsReview => "needs_review",
    Rejected => "rejected",
});

str_enum!(ValidationStatus {
    Pending => "pending",
    Verified => "verified",
    NeedsReview => "needs_review",
    Rejected => "rejected",
});

impl From<Verdict> for ValidationStatus {
    fn from(v: Verdict) -> Self {
        match v {
            Verdict::Verified => Self::Verified,
            Verdict::NeedsReview => Self::NeedsReview,
            Verdict::Rejected => Self::Rejected,
        }
    }
}

str_enum!(ExpiryStatus {
    Valid => "valid",
    ExpiringSoon => "expiring_soon",
    Expired => "expired",
    Unknown => "unknown",
});

str_enum!(JobStatus {
    Queued => "queued",
    Processing => "processing",
    Succeeded => "succeeded",
    DeadLettered => "dead_lettered",
});

str_enum!(StorageProvider {
    Local => "local",
    ObjectStore => "object_store",
    Drive => "drive",
});

str_enum!(TriggeredBy {
    Manual => "manual",
    Queue => "queue",
    Inline => "inline",
});

str_enum!(AuditOutcome {
    Success => "success",
    Failure => "failure",
});
